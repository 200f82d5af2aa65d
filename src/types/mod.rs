use serde::Deserialize;

// ===================================================================
// Hook Input (received via stdin, snake_case JSON)
// ===================================================================

/// The `PostToolUse` payload Claude Code writes to the hook's stdin.
///
/// Every field is defaulted: the hook must never fail the tool call it
/// observes, so a payload missing a field simply turns out ineligible.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostToolUseInput {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub hook_event_name: Option<String>,
    #[serde(default)]
    pub transcript_path: String,
    #[serde(default)]
    pub tool_name: String,
    #[serde(default)]
    pub tool_input: serde_json::Value,
    #[serde(default)]
    pub tool_response: serde_json::Value,
}

impl PostToolUseInput {
    /// Parse `tool_name` + `tool_input` into a typed `ToolCall`.
    pub fn tool_call(&self) -> ToolCall {
        ToolCall::parse(&self.tool_name, &self.tool_input)
    }

    /// The text the tool printed, flattened from whichever shape
    /// `tool_response` arrived in.
    pub fn stdout(&self) -> String {
        extract_stdout(&self.tool_response)
    }
}

/// Flatten a tool response into plain text.
///
/// Accepts a bare string, an object carrying `stdout` (or `content`), or an
/// array of typed content blocks whose `text` parts are joined by newlines.
pub fn extract_stdout(response: &serde_json::Value) -> String {
    use serde_json::Value;

    fn as_text(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    match response {
        Value::String(s) => s.clone(),
        Value::Object(map) => {
            if let Some(stdout) = map.get("stdout") {
                as_text(stdout)
            } else if let Some(content) = map.get("content") {
                as_text(content)
            } else {
                response.to_string()
            }
        }
        Value::Array(items) => items
            .iter()
            .filter(|item| item["type"] == "text")
            .map(|item| item["text"].as_str().unwrap_or(""))
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

// ===================================================================
// Tool-Specific Input Types
// ===================================================================

/// Parsed tool call, matching a tool name to a typed input.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    Bash(BashToolInput),
    Write(WriteToolInput),
    Edit(EditToolInput),
    MultiEdit(MultiEditToolInput),
    /// MCP tools, tools we don't inspect, and known tools whose input didn't
    /// have the expected shape. Keeps the raw JSON.
    Other {
        tool_name: String,
        tool_input: serde_json::Value,
    },
}

impl ToolCall {
    /// Never fails: an input that doesn't deserialize into its tool's shape
    /// falls back to `Other`.
    pub fn parse(tool_name: &str, tool_input: &serde_json::Value) -> Self {
        let typed = match tool_name {
            "Bash" => serde_json::from_value(tool_input.clone()).map(Self::Bash),
            "Write" => serde_json::from_value(tool_input.clone()).map(Self::Write),
            "Edit" => serde_json::from_value(tool_input.clone()).map(Self::Edit),
            "MultiEdit" => serde_json::from_value(tool_input.clone()).map(Self::MultiEdit),
            _ => return Self::other(tool_name, tool_input),
        };
        typed.unwrap_or_else(|_| Self::other(tool_name, tool_input))
    }

    fn other(tool_name: &str, tool_input: &serde_json::Value) -> Self {
        Self::Other {
            tool_name: tool_name.to_string(),
            tool_input: tool_input.clone(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Bash(_) => "Bash",
            Self::Write(_) => "Write",
            Self::Edit(_) => "Edit",
            Self::MultiEdit(_) => "MultiEdit",
            Self::Other { tool_name, .. } => tool_name,
        }
    }

    /// The shell command, for `Bash` or any other tool carrying a string
    /// `command` field.
    pub fn shell_command(&self) -> Option<&str> {
        match self {
            Self::Bash(b) => Some(&b.command),
            Self::Other { tool_input, .. } => tool_input["command"].as_str(),
            _ => None,
        }
    }

    /// The file touched by a write or edit, with the text it put there.
    /// Returns `None` for anything that isn't a file modification or has an
    /// empty path.
    pub fn file_write(&self) -> Option<FileWrite<'_>> {
        let (path, text) = match self {
            Self::Write(w) => (w.file_path.as_str(), w.content.clone()),
            Self::Edit(e) => (e.file_path.as_str(), e.new_string.clone()),
            Self::MultiEdit(m) => (
                m.file_path.as_str(),
                m.edits
                    .iter()
                    .map(|e| e.new_string.as_str())
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            _ => return None,
        };
        if path.is_empty() {
            return None;
        }
        Some(FileWrite { path, text })
    }
}

/// A file modification extracted from a `Write`/`Edit`/`MultiEdit` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileWrite<'a> {
    pub path: &'a str,
    /// New file content for `Write`, replacement text for edits.
    pub text: String,
}

impl FileWrite<'_> {
    /// Final path component, or the whole path if it has none.
    pub fn file_name(&self) -> &str {
        std::path::Path::new(self.path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(self.path)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BashToolInput {
    pub command: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WriteToolInput {
    pub file_path: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EditToolInput {
    pub file_path: String,
    #[serde(default)]
    pub old_string: String,
    #[serde(default)]
    pub new_string: String,
    #[serde(default)]
    pub replace_all: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MultiEditToolInput {
    pub file_path: String,
    #[serde(default)]
    pub edits: Vec<EditOperation>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EditOperation {
    #[serde(default)]
    pub old_string: String,
    #[serde(default)]
    pub new_string: String,
}

#[cfg(test)]
mod tests;
