#![allow(dead_code)]

use serde_json::{Value, json};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

pub const GRADLE_TEST: &str = r#"./gradlew test --tests "*CalculatorTest""#;

pub const GRADLE_SUCCESS: &str = "\
> Task :test

CalculatorTest > add() PASSED

BUILD SUCCESSFUL in 2s
4 actionable tasks: 2 executed, 2 up-to-date
";

/// Run the binary with `stdin_json`, extra args and env vars. Credentials and
/// overrides from the outer environment are cleared first.
pub fn run_cli_with(args: &[&str], stdin_json: &str, envs: &[(&str, &str)]) -> (i32, String, String) {
    let mut command = Command::new(env!("CARGO_BIN_EXE_tdd-notion-logger"));
    command
        .args(args)
        .env_remove("NOTION_API_KEY")
        .env_remove("NOTION_PAGE_ID")
        .env_remove("TDD_NOTION_LOG")
        .envs(envs.iter().copied())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = command.spawn().expect("failed to spawn binary");

    child
        .stdin
        .as_mut()
        .unwrap()
        .write_all(stdin_json.as_bytes())
        .unwrap();

    let output = child.wait_with_output().unwrap();
    (
        output.status.code().unwrap_or(-1),
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
    )
}

pub fn run_cli(stdin_json: &str) -> (i32, String, String) {
    run_cli_with(&[], stdin_json, &[])
}

/// A project directory with a transcript file inside it.
pub struct Project {
    pub dir: tempfile::TempDir,
    pub transcript: PathBuf,
}

impl Project {
    pub fn new(transcript_lines: &[Value]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let transcript = dir.path().join("transcript.jsonl");
        let mut contents = String::new();
        for line in transcript_lines {
            contents.push_str(&line.to_string());
            contents.push('\n');
        }
        fs::write(&transcript, contents).unwrap();
        Self { dir, transcript }
    }

    pub fn cwd(&self) -> &Path {
        self.dir.path()
    }

    /// Write `.claude/tdd-notion-logger.toml` under the project.
    pub fn write_config(&self, toml: &str) {
        let claude = self.dir.path().join(".claude");
        fs::create_dir_all(&claude).unwrap();
        fs::write(claude.join("tdd-notion-logger.toml"), toml).unwrap();
    }

    /// A PostToolUse event for a Bash call in this project.
    pub fn event(&self, command: &str, stdout: &str) -> String {
        post_tool_use(
            self.cwd().to_str().unwrap(),
            self.transcript.to_str().unwrap(),
            "Bash",
            json!({ "command": command }),
            json!({ "stdout": stdout, "stderr": "", "interrupted": false }),
        )
    }
}

pub fn post_tool_use(
    cwd: &str,
    transcript_path: &str,
    tool_name: &str,
    tool_input: Value,
    tool_response: Value,
) -> String {
    json!({
        "session_id": "test-session",
        "transcript_path": transcript_path,
        "cwd": cwd,
        "permission_mode": "default",
        "hook_event_name": "PostToolUse",
        "tool_name": tool_name,
        "tool_input": tool_input,
        "tool_response": tool_response,
    })
    .to_string()
}

// -------------------------------------------------------------------
// Transcript lines
// -------------------------------------------------------------------

pub fn user_text(text: &str) -> Value {
    json!({
        "type": "user",
        "uuid": "u",
        "message": { "role": "user", "content": text }
    })
}

pub fn assistant(content: Value) -> Value {
    json!({
        "type": "assistant",
        "uuid": "a",
        "message": { "role": "assistant", "content": content }
    })
}

pub fn text(t: &str) -> Value {
    json!({ "type": "text", "text": t })
}

pub fn write_file(path: &str, content: &str) -> Value {
    json!({
        "type": "tool_use",
        "id": "toolu_write",
        "name": "Write",
        "input": { "file_path": path, "content": content }
    })
}

pub fn edit_file(path: &str, old: &str, new: &str) -> Value {
    json!({
        "type": "tool_use",
        "id": "toolu_edit",
        "name": "Edit",
        "input": { "file_path": path, "old_string": old, "new_string": new }
    })
}

pub fn test_run() -> Value {
    assistant(json!([{
        "type": "tool_use",
        "id": "toolu_bash",
        "name": "Bash",
        "input": { "command": GRADLE_TEST }
    }]))
}

/// Red, Green and Refactor between two passing runs.
pub fn full_cycle() -> Vec<Value> {
    vec![
        user_text("Add an add() method"),
        test_run(),
        assistant(json!([
            text("Start with a failing test for `add`."),
            write_file(
                "/p/src/test/java/CalculatorTest.java",
                "class CalculatorTest {\n    @Test\n    void add() {}\n}\n",
            ),
        ])),
        assistant(json!([
            text("Minimal implementation."),
            write_file("/p/src/main/java/Calculator.java", "int add(int a, int b) { return 3; }"),
        ])),
        assistant(json!([
            text("Replace the constant with a real sum."),
            edit_file("/p/src/main/java/Calculator.java", "return 3;", "return a + b;"),
        ])),
        test_run(),
    ]
}
