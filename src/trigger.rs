use crate::config::TriggerConfig;
use crate::types::{PostToolUseInput, ToolCall};
use anyhow::{Context, Result};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

const UNKNOWN_SUBJECT: &str = "UnknownTest";

static TEST_SELECTOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"--tests\s+"?\*?([A-Za-z0-9_.]+)"?"#).unwrap());

static PASSED_METHOD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s+(\w+)\(\)\s+PASSED").unwrap());

/// Recognizes a tool call that runs the test suite. Used both to gate the
/// hook and to find earlier test runs in the transcript.
#[derive(Debug, Clone)]
pub struct TestRunMatcher {
    tool_name: String,
    command: Regex,
}

impl TestRunMatcher {
    pub fn new(tool_name: &str, command_pattern: &str) -> Result<Self> {
        let command = Regex::new(command_pattern)
            .with_context(|| format!("invalid test command pattern {command_pattern:?}"))?;
        Ok(Self {
            tool_name: tool_name.to_string(),
            command,
        })
    }

    pub fn is_shell_tool(&self, call: &ToolCall) -> bool {
        call.name() == self.tool_name
    }

    pub fn is_test_command(&self, command: &str) -> bool {
        self.command.is_match(command)
    }

    pub fn matches(&self, call: &ToolCall) -> bool {
        self.is_shell_tool(call) && call.shell_command().is_some_and(|c| self.is_test_command(c))
    }
}

/// Why an event was not logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ineligible {
    WrongTool,
    NotATestRun,
    NoSuccessMarker,
}

impl fmt::Display for Ineligible {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ineligible::WrongTool => write!(f, "not a shell tool call"),
            Ineligible::NotATestRun => write!(f, "command is not a test run"),
            Ineligible::NoSuccessMarker => write!(f, "output has no success marker"),
        }
    }
}

/// A passing test run, with what the renderer needs from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRun {
    pub command: String,
    pub stdout: String,
}

impl TestRun {
    /// Test class the run was filtered to.
    pub fn subject(&self) -> String {
        extract_subject(&self.command)
    }

    /// Methods the runner reported as passed, in output order.
    pub fn passed_methods(&self) -> Vec<String> {
        extract_passed_methods(&self.stdout)
    }
}

#[derive(Debug, Clone)]
pub struct TriggerFilter {
    test_run: TestRunMatcher,
    success_marker: String,
}

impl TriggerFilter {
    pub fn new(config: &TriggerConfig) -> Result<Self> {
        Ok(Self {
            test_run: TestRunMatcher::new(&config.tool_name, &config.command_pattern)?,
            success_marker: config.success_marker.clone(),
        })
    }

    pub fn test_run(&self) -> &TestRunMatcher {
        &self.test_run
    }

    /// Decide whether this event is a passing test run.
    pub fn check(&self, input: &PostToolUseInput) -> Result<TestRun, Ineligible> {
        let call = input.tool_call();
        if !self.test_run.is_shell_tool(&call) {
            return Err(Ineligible::WrongTool);
        }
        let command = call.shell_command().unwrap_or_default();
        if !self.test_run.is_test_command(command) {
            return Err(Ineligible::NotATestRun);
        }
        let stdout = input.stdout();
        if !stdout.contains(&self.success_marker) {
            return Err(Ineligible::NoSuccessMarker);
        }
        Ok(TestRun {
            command: command.to_string(),
            stdout,
        })
    }
}

/// Pull the test class out of a `--tests` selector, dropping any package
/// prefix and leading wildcard. Falls back to `UnknownTest`.
pub fn extract_subject(command: &str) -> String {
    TEST_SELECTOR
        .captures(command)
        .and_then(|c| c.get(1))
        .map(|m| {
            let name = m.as_str();
            name.rsplit('.').next().unwrap_or(name).to_string()
        })
        .unwrap_or_else(|| UNKNOWN_SUBJECT.to_string())
}

/// Collect `name` from every `> name() PASSED` line.
pub fn extract_passed_methods(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| PASSED_METHOD.captures(line))
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect()
}
