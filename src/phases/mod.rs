use crate::config::ClassifierConfig;
use crate::render::truncate;
use crate::transcript::{ContentBlock, TranscriptEntry};
use anyhow::{Context, Result};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// `@Test` or `@DisplayName`, an optional `("display name")`, and an
/// optional `void method` on the following line.
static ANNOTATED_TEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:@Test|@DisplayName)\s*(?:\("([^"]+)"\))?\s*\n\s*(?:void\s+(\w+))?"#).unwrap()
});

static VOID_METHOD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"void\s+(\w+)\s*\(").unwrap());

// ===================================================================
// Phase entries and buckets
// ===================================================================

/// One classified unit of work: why the assistant did it, which files it
/// touched, and which tests it named.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseEntry {
    pub reasoning: String,
    pub files: Vec<String>,
    pub test_names: Vec<String>,
}

#[derive(Debug, Default)]
pub struct PhaseBuckets {
    pub red: Vec<PhaseEntry>,
    pub green: Vec<PhaseEntry>,
    pub refactor: Vec<PhaseEntry>,
    /// Source files written during Green, in first-seen order.
    pub implemented: Vec<String>,
}

impl PhaseBuckets {
    /// Test names across all Red entries, in entry order.
    pub fn red_test_names(&self) -> impl Iterator<Item = &str> {
        self.red
            .iter()
            .flat_map(|e| e.test_names.iter().map(String::as_str))
    }
}

// ===================================================================
// Green-vs-Refactor strategy
// ===================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourcePhase {
    Green,
    Refactor,
}

/// Decides whether an entry that touched implementation files made a test
/// pass or cleaned up after one.
pub trait PhaseStrategy {
    /// `seen` holds every source file already classified Green in this
    /// window; `touched` the source files of the current entry.
    fn classify(&self, seen: &HashSet<String>, touched: &[String]) -> SourcePhase;
}

/// The first write of a file is the minimal implementation; an entry that
/// only revisits already-implemented files is a refactor.
///
/// An entry mixing a new file with seen ones counts as Green as a whole.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstTouch;

impl PhaseStrategy for FirstTouch {
    fn classify(&self, seen: &HashSet<String>, touched: &[String]) -> SourcePhase {
        if !seen.is_empty() && touched.iter().all(|f| seen.contains(f)) {
            SourcePhase::Refactor
        } else {
            SourcePhase::Green
        }
    }
}

// ===================================================================
// File classification
// ===================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Test,
    Source,
}

#[derive(Debug, Clone)]
pub struct FilePatterns {
    test: Regex,
    source: Regex,
}

impl FilePatterns {
    pub fn new(test_pattern: &str, source_pattern: &str) -> Result<Self> {
        Ok(Self {
            test: compile_anchored(test_pattern)
                .with_context(|| format!("invalid test file pattern {test_pattern:?}"))?,
            source: compile_anchored(source_pattern)
                .with_context(|| format!("invalid source file pattern {source_pattern:?}"))?,
        })
    }

    /// Test files take precedence; names matching neither pattern are ignored.
    pub fn classify(&self, file_name: &str) -> Option<FileKind> {
        if self.test.is_match(file_name) {
            Some(FileKind::Test)
        } else if self.source.is_match(file_name) {
            Some(FileKind::Source)
        } else {
            None
        }
    }
}

/// File patterns match from the start of the name.
fn compile_anchored(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{pattern})"))
}

// ===================================================================
// Classifier
// ===================================================================

pub struct Classifier<S = FirstTouch> {
    patterns: FilePatterns,
    reasoning_fallback_chars: usize,
    strategy: S,
}

impl Classifier<FirstTouch> {
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        Ok(Self {
            patterns: FilePatterns::new(&config.test_file_pattern, &config.source_file_pattern)?,
            reasoning_fallback_chars: config.reasoning_fallback_chars,
            strategy: FirstTouch,
        })
    }
}

impl<S: PhaseStrategy> Classifier<S> {
    /// Swap in a different Green-vs-Refactor policy.
    pub fn with_strategy<T: PhaseStrategy>(self, strategy: T) -> Classifier<T> {
        Classifier {
            patterns: self.patterns,
            reasoning_fallback_chars: self.reasoning_fallback_chars,
            strategy,
        }
    }

    /// Walk a cycle window and bucket every assistant entry that wrote test
    /// or source files.
    pub fn classify(&self, window: &[TranscriptEntry]) -> PhaseBuckets {
        let mut buckets = PhaseBuckets::default();
        let mut seen: HashSet<String> = HashSet::new();

        for entry in window {
            let Some(blocks) = entry.assistant_blocks() else {
                continue;
            };
            let touched = self.touched_files(entry);
            if touched.test_files.is_empty() && touched.source_files.is_empty() {
                continue;
            }

            let reasoning = extract_reasoning(blocks, self.reasoning_fallback_chars);

            if !touched.test_files.is_empty() {
                buckets.red.push(PhaseEntry {
                    reasoning: reasoning.clone(),
                    files: touched.test_files,
                    test_names: touched.test_names,
                });
            }

            if !touched.source_files.is_empty() {
                let phase = self.strategy.classify(&seen, &touched.source_files);
                let phase_entry = PhaseEntry {
                    reasoning,
                    files: touched.source_files,
                    test_names: Vec::new(),
                };
                match phase {
                    SourcePhase::Refactor => buckets.refactor.push(phase_entry),
                    SourcePhase::Green => {
                        for file in &phase_entry.files {
                            if seen.insert(file.clone()) {
                                buckets.implemented.push(file.clone());
                            }
                        }
                        buckets.green.push(phase_entry);
                    }
                }
            }
        }

        buckets
    }

    fn touched_files(&self, entry: &TranscriptEntry) -> TouchedFiles {
        let mut touched = TouchedFiles::default();
        for tool_use in entry.tool_uses() {
            let call = tool_use.call();
            let Some(write) = call.file_write() else {
                continue;
            };
            let name = write.file_name().to_string();
            match self.patterns.classify(&name) {
                Some(FileKind::Test) => {
                    push_unique(&mut touched.test_files, name);
                    for test_name in extract_test_names(&write.text) {
                        push_unique(&mut touched.test_names, test_name);
                    }
                }
                Some(FileKind::Source) => push_unique(&mut touched.source_files, name),
                None => {}
            }
        }
        touched
    }
}

#[derive(Default)]
struct TouchedFiles {
    test_files: Vec<String>,
    source_files: Vec<String>,
    test_names: Vec<String>,
}

fn push_unique(items: &mut Vec<String>, item: String) {
    if !items.contains(&item) {
        items.push(item);
    }
}

// ===================================================================
// Extraction helpers
// ===================================================================

/// The assistant's visible narration for an entry, falling back to a capped
/// excerpt of its thinking.
pub fn extract_reasoning(blocks: &[ContentBlock], fallback_chars: usize) -> String {
    let mut text_parts: Vec<&str> = Vec::new();
    let mut thinking_parts: Vec<&str> = Vec::new();

    for block in blocks {
        match block {
            ContentBlock::Text(t) => {
                let t = t.text.trim();
                if !t.is_empty() {
                    text_parts.push(t);
                }
            }
            ContentBlock::Thinking(t) => {
                let t = t.thinking.trim();
                if !t.is_empty() {
                    thinking_parts.push(t);
                }
            }
            _ => {}
        }
    }

    if !text_parts.is_empty() {
        return text_parts.join("\n");
    }
    if !thinking_parts.is_empty() {
        return truncate(&thinking_parts.join("\n"), fallback_chars);
    }
    String::new()
}

/// Test identifiers declared in a chunk of JUnit source.
///
/// Annotated tests win: a `@DisplayName("...")` string, else the annotated
/// method's name. Only when no annotation yields a name are bare
/// `void name(` declarations used. Deduplicated, in first-seen order.
pub fn extract_test_names(source: &str) -> Vec<String> {
    let mut names = Vec::new();
    if source.is_empty() {
        return names;
    }

    for caps in ANNOTATED_TEST.captures_iter(source) {
        if let Some(name) = caps.get(1).or_else(|| caps.get(2)) {
            push_unique(&mut names, name.as_str().to_string());
        }
    }

    if names.is_empty() {
        for caps in VOID_METHOD.captures_iter(source) {
            push_unique(&mut names, caps[1].to_string());
        }
    }

    names
}
