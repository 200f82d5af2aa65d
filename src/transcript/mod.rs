use crate::types::ToolCall;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

// ===================================================================
// Top-level transcript entry, one per JSONL line
// ===================================================================

/// A single line in a Claude Code `.jsonl` transcript file.
///
/// Only conversation entries are typed. Everything else (`system`,
/// `progress`, `file-history-snapshot`, …) collapses into `Other`, which
/// still occupies its position in the log.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum TranscriptEntry {
    #[serde(rename = "user")]
    User(ConversationEntry),
    #[serde(rename = "assistant")]
    Assistant(ConversationEntry),
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationEntry {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub message: Message,
}

// ===================================================================
// Message
// ===================================================================

#[derive(Debug, Default, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub content: MessageContent,
}

/// `message.content` can be a plain string (user text) or an array of
/// content blocks (assistant responses, tool results).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Blocks(Vec::new())
    }
}

// ===================================================================
// Content blocks inside message.content[]
// ===================================================================

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text(TextBlock),
    #[serde(rename = "thinking")]
    Thinking(ThinkingBlock),
    #[serde(rename = "tool_use")]
    ToolUse(ToolUseBlock),
    /// `tool_result`, `image`, `redacted_thinking`, …
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct TextBlock {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct ThinkingBlock {
    #[serde(default)]
    pub thinking: String,
}

#[derive(Debug, Deserialize)]
pub struct ToolUseBlock {
    pub name: String,
    #[serde(default)]
    pub input: serde_json::Value,
}

impl ToolUseBlock {
    pub fn call(&self) -> ToolCall {
        ToolCall::parse(&self.name, &self.input)
    }
}

impl TranscriptEntry {
    pub fn uuid(&self) -> Option<&str> {
        match self {
            TranscriptEntry::User(conv) | TranscriptEntry::Assistant(conv) => conv.uuid.as_deref(),
            TranscriptEntry::Other => None,
        }
    }

    /// Text of a user entry typed as a plain prompt.
    pub fn user_prompt(&self) -> Option<&str> {
        match self {
            TranscriptEntry::User(conv) => match &conv.message.content {
                MessageContent::Text(t) => Some(t.as_str()),
                MessageContent::Blocks(_) => None,
            },
            _ => None,
        }
    }

    /// Content blocks of an assistant entry; `None` for anything else.
    pub fn assistant_blocks(&self) -> Option<&[ContentBlock]> {
        match self {
            TranscriptEntry::Assistant(conv) => match &conv.message.content {
                MessageContent::Blocks(b) => Some(b.as_slice()),
                MessageContent::Text(_) => None,
            },
            _ => None,
        }
    }

    /// `tool_use` blocks of an assistant entry, in order.
    pub fn tool_uses(&self) -> impl Iterator<Item = &ToolUseBlock> {
        self.assistant_blocks()
            .unwrap_or_default()
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse(tu) => Some(tu),
                _ => None,
            })
    }
}

// ===================================================================
// Transcript: parsed JSONL, in file order
// ===================================================================

pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    /// An empty transcript (no entries).
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Parse a JSONL transcript string. Returns the transcript and any
    /// lines that failed to parse (with 1-based line number and error).
    ///
    /// Lines that aren't JSON are dropped. Lines that are JSON but don't
    /// match the typed shape are kept as `Other` so positions line up with
    /// the log.
    pub fn parse(contents: &str) -> (Self, Vec<(usize, String)>) {
        let mut entries = Vec::new();
        let mut errors = Vec::new();

        for (i, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<serde_json::Value>(line) {
                Ok(val) => match serde_json::from_value::<TranscriptEntry>(val) {
                    Ok(entry) => entries.push(entry),
                    Err(e) => {
                        errors.push((i + 1, format!("{e}")));
                        entries.push(TranscriptEntry::Other);
                    }
                },
                Err(e) => errors.push((i + 1, format!("{e}"))),
            }
        }

        (Self { entries }, errors)
    }

    /// Read a transcript file and keep its most recent `max_entries`.
    pub fn read_recent(path: &Path, max_entries: usize) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading transcript {}", path.display()))?;
        let (mut transcript, errors) = Self::parse(&contents);
        for (line, err) in &errors {
            tracing::debug!(line, %err, "skipping transcript line");
        }
        transcript.keep_recent(max_entries);
        Ok(transcript)
    }

    /// Drop all but the last `max_entries` entries.
    pub fn keep_recent(&mut self, max_entries: usize) {
        let excess = self.entries.len().saturating_sub(max_entries);
        self.entries.drain(..excess);
    }

    /// All typed entries in file order.
    #[cfg(test)]
    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    // ---------------------------------------------------------------
    // Cycle window
    // ---------------------------------------------------------------

    /// Positions of assistant entries that invoke a test run.
    pub fn test_run_indices(&self, is_test_run: impl Fn(&ToolCall) -> bool) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.tool_uses().any(|tu| is_test_run(&tu.call())))
            .map(|(i, _)| i)
            .collect()
    }

    /// The entries belonging to the cycle that ended with the latest test run.
    ///
    /// With no test run the whole transcript is returned; with one, everything
    /// before it; with two or more, the entries strictly between the last two.
    pub fn cycle_window(&self, is_test_run: impl Fn(&ToolCall) -> bool) -> &[TranscriptEntry] {
        let runs = self.test_run_indices(is_test_run);
        match runs.as_slice() {
            [] => &self.entries,
            [only] => &self.entries[..*only],
            [.., previous, last] => &self.entries[previous + 1..*last],
        }
    }
}
