use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const FILENAME: &str = "tdd-notion-logger.toml";

/// Environment variable that overrides `notion.page_id`.
pub const PAGE_ID_ENV: &str = "NOTION_PAGE_ID";

/// Hook configuration, stored in `<project>/.claude/tdd-notion-logger.toml`.
///
/// Every key is optional; missing keys fall back to the defaults below, which
/// describe a Gradle/JUnit project logging to a Korean-language page.
///
/// ```toml
/// [notion]
/// page_id = "2fc2e1bd53b2809cbd5ed9009dc775bd"
///
/// [trigger]
/// command_pattern = "gradlew.*test"
///
/// [render.phrases]
/// red = "{{ names }} tests written"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub notion: NotionConfig,
    pub trigger: TriggerConfig,
    pub transcript: TranscriptConfig,
    pub classifier: ClassifierConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotionConfig {
    /// Page whose children the log blocks are appended to.
    pub page_id: String,
    /// Value of the `Notion-Version` header.
    pub api_version: String,
    pub base_url: String,
    pub timeout_secs: u64,
    /// Name of the environment variable holding the integration secret.
    pub credential_env: String,
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            page_id: "2fc2e1bd53b2809cbd5ed9009dc775bd".into(),
            api_version: "2022-06-28".into(),
            base_url: "https://api.notion.com".into(),
            timeout_secs: 15,
            credential_env: "NOTION_API_KEY".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Tool that runs shell commands.
    pub tool_name: String,
    /// Regex searched anywhere in the command to recognize a test run.
    pub command_pattern: String,
    /// Substring of the output that marks a passing run.
    pub success_marker: String,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            tool_name: "Bash".into(),
            command_pattern: "gradlew.*test".into(),
            success_marker: "BUILD SUCCESSFUL".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptConfig {
    /// Only this many trailing transcript entries are considered.
    pub max_entries: usize,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self { max_entries: 500 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Regex a file name must match to count as a test file.
    pub test_file_pattern: String,
    /// Regex a non-test file name must match to count as implementation.
    pub source_file_pattern: String,
    /// Length cap for reasoning recovered from thinking blocks.
    pub reasoning_fallback_chars: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            test_file_pattern: r".*Test\.java$".into(),
            source_file_pattern: r".*\.java$".into(),
            reasoning_fallback_chars: 800,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Upper bound on top-level blocks per request. Clamped to the API limit.
    pub max_blocks: usize,
    /// Upper bound on characters per rich-text run. Clamped to the API limit.
    pub max_text_len: usize,
    /// Offset from UTC used for the heading timestamp.
    pub utc_offset_hours: i8,
    pub phrases: Phrases,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_blocks: 100,
            max_text_len: 1900,
            utc_offset_hours: 9,
            phrases: Phrases::default(),
        }
    }
}

/// Display text for the log. `heading`, `red` and `file` are minijinja
/// templates; the rest are literal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Phrases {
    /// Rendered with `subject` and `timestamp`.
    pub heading: String,
    /// Rendered with `names`, the backtick-quoted test names joined by ", ".
    pub red: String,
    /// Used when no test names are known.
    pub red_generic: String,
    pub green_implemented: String,
    pub green_verified: String,
    pub refactor: String,
    pub result: String,
    pub reasoning_title: String,
    /// Rendered with `file`.
    pub file: String,
}

impl Default for Phrases {
    fn default() -> Self {
        Self {
            heading: "{{ subject }} ({{ timestamp }})".into(),
            red: "{{ names }} 테스트 작성".into(),
            red_generic: "테스트 작성".into(),
            green_implemented: "테스트 통과를 위한 구현".into(),
            green_verified: "테스트 통과 확인".into(),
            refactor: "코드 품질 개선".into(),
            result: "BUILD SUCCESSFUL".into(),
            reasoning_title: "AI Reasoning".into(),
            file: "파일: {{ file }}".into(),
        }
    }
}

impl Config {
    /// Load the configuration.
    ///
    /// An explicit path must exist. Otherwise `<cwd>/.claude/tdd-notion-logger.toml`
    /// is used when present, and defaults when not. Environment overrides are
    /// applied last.
    pub fn load(explicit: Option<&Path>, cwd: Option<&str>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::read(path)?,
            None => match cwd.map(Self::project_path) {
                Some(path) => Self::read_optional(&path)?.unwrap_or_default(),
                None => Self::default(),
            },
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// The per-project config file path.
    pub fn project_path(cwd: &str) -> PathBuf {
        Path::new(cwd).join(".claude").join(FILENAME)
    }

    fn read(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
    }

    fn read_optional(path: &Path) -> Result<Option<Self>> {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let config = toml::from_str(&contents)
                    .with_context(|| format!("parsing {}", path.display()))?;
                Ok(Some(config))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(page_id) = lookup(PAGE_ID_ENV).filter(|v| !v.trim().is_empty()) {
            self.notion.page_id = page_id.trim().to_string();
        }
    }
}
