use super::*;
use serde_json::json;

// =================================================================
// PostToolUse input deserialization
// =================================================================

#[test]
fn deserialize_post_tool_use_bash() {
    let input = json!({
        "session_id": "sess-1",
        "transcript_path": "/tmp/transcript.jsonl",
        "cwd": "/home/user/project",
        "hook_event_name": "PostToolUse",
        "tool_name": "Bash",
        "tool_input": { "command": "./gradlew test --tests \"*CalculatorTest\"" },
        "tool_response": { "stdout": "BUILD SUCCESSFUL", "stderr": "" },
        "tool_use_id": "toolu_01"
    });

    let hook: PostToolUseInput = serde_json::from_value(input).unwrap();
    assert_eq!(hook.tool_name, "Bash");
    assert_eq!(hook.transcript_path, "/tmp/transcript.jsonl");
    assert_eq!(hook.cwd.as_deref(), Some("/home/user/project"));
    assert_eq!(hook.stdout(), "BUILD SUCCESSFUL");
    match hook.tool_call() {
        ToolCall::Bash(b) => assert!(b.command.starts_with("./gradlew test")),
        other => panic!("Expected Bash, got {:?}", other),
    }
}

#[test]
fn deserialize_minimal_input() {
    let hook: PostToolUseInput = serde_json::from_value(json!({})).unwrap();
    assert!(hook.tool_name.is_empty());
    assert!(hook.transcript_path.is_empty());
    assert!(hook.tool_input.is_null());
}

// =================================================================
// Stdout extraction
// =================================================================

#[test]
fn stdout_from_plain_string() {
    assert_eq!(extract_stdout(&json!("all good")), "all good");
}

#[test]
fn stdout_prefers_stdout_field() {
    let response = json!({ "stdout": "out", "content": "ignored" });
    assert_eq!(extract_stdout(&response), "out");
}

#[test]
fn stdout_falls_back_to_content_field() {
    assert_eq!(extract_stdout(&json!({ "content": "from content" })), "from content");
    // Non-string content is rendered as JSON text.
    assert_eq!(extract_stdout(&json!({ "content": [1, 2] })), "[1,2]");
}

#[test]
fn stdout_joins_text_blocks() {
    let response = json!([
        { "type": "text", "text": "first" },
        { "type": "image", "source": {} },
        { "type": "text", "text": "second" }
    ]);
    assert_eq!(extract_stdout(&response), "first\nsecond");
}

#[test]
fn stdout_from_unexpected_shape() {
    assert_eq!(extract_stdout(&json!(42)), "42");
    assert_eq!(extract_stdout(&json!({ "exit": 0 })), r#"{"exit":0}"#);
}

// =================================================================
// ToolCall parsing
// =================================================================

#[test]
fn parse_write_tool() {
    let call = ToolCall::parse(
        "Write",
        &json!({ "file_path": "/src/test/CalculatorTest.java", "content": "class X {}" }),
    );
    let write = call.file_write().unwrap();
    assert_eq!(write.path, "/src/test/CalculatorTest.java");
    assert_eq!(write.file_name(), "CalculatorTest.java");
    assert_eq!(write.text, "class X {}");
}

#[test]
fn parse_edit_tool_uses_new_string() {
    let call = ToolCall::parse(
        "Edit",
        &json!({
            "file_path": "/src/main/Calculator.java",
            "old_string": "return 0;",
            "new_string": "return a + b;"
        }),
    );
    assert!(matches!(call, ToolCall::Edit(_)));
    assert_eq!(call.file_write().unwrap().text, "return a + b;");
}

#[test]
fn parse_multi_edit_joins_new_strings() {
    let call = ToolCall::parse(
        "MultiEdit",
        &json!({
            "file_path": "Calculator.java",
            "edits": [
                { "old_string": "a", "new_string": "b" },
                { "old_string": "c", "new_string": "d" }
            ]
        }),
    );
    let write = call.file_write().unwrap();
    assert_eq!(write.file_name(), "Calculator.java");
    assert_eq!(write.text, "b\nd");
}

#[test]
fn malformed_known_tool_falls_back_to_other() {
    let call = ToolCall::parse("Write", &json!({ "content": "no path" }));
    match &call {
        ToolCall::Other { tool_name, .. } => assert_eq!(tool_name, "Write"),
        other => panic!("Expected Other, got {:?}", other),
    }
    assert!(call.file_write().is_none());
}

#[test]
fn empty_path_is_not_a_file_write() {
    let call = ToolCall::parse("Write", &json!({ "file_path": "", "content": "x" }));
    assert!(call.file_write().is_none());
}

#[test]
fn unknown_tool_keeps_raw_input() {
    let input = json!({ "command": "make test" });
    let call = ToolCall::parse("mcp__shell__run", &input);
    assert_eq!(call.name(), "mcp__shell__run");
    assert_eq!(call.shell_command(), Some("make test"));
    assert!(call.file_write().is_none());
}

#[test]
fn bash_without_command_has_no_shell_command() {
    let call = ToolCall::parse("Bash", &json!({ "description": "nothing" }));
    assert_eq!(call.name(), "Bash");
    assert_eq!(call.shell_command(), None);
}
