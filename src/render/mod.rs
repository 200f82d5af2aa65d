use crate::config::{Phrases, RenderConfig};
use crate::phases::{PhaseBuckets, PhaseEntry};
use anyhow::{Context, Result};
use minijinja::{context, Environment};
use regex::Regex;
use std::sync::LazyLock;

/// Maximum children per append request accepted by the Notion API.
pub const NOTION_MAX_BLOCKS: usize = 100;

/// Maximum characters in a single Notion rich-text run.
pub const NOTION_TEXT_LIMIT: usize = 2000;

/// Maximum rich-text runs in a single block.
pub const NOTION_MAX_RUNS: usize = 100;

const ELLIPSIS: &str = "...";

/// Red summary lists at most this many test names.
const MAX_SUMMARY_NAMES: usize = 5;

static CODE_SPAN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`[^`]+`").unwrap());

/// Truncate a string to `max` chars, appending "..." if truncated.
pub fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((byte_idx, _)) => format!("{}{ELLIPSIS}", &s[..byte_idx]),
    }
}

// ===================================================================
// Display blocks
// ===================================================================

/// A run of text with uniform styling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    pub content: String,
    pub bold: bool,
    pub code: bool,
}

impl TextRun {
    pub fn plain(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            bold: false,
            code: false,
        }
    }

    pub fn bold(content: impl Into<String>) -> Self {
        Self {
            bold: true,
            ..Self::plain(content)
        }
    }

    pub fn code(content: impl Into<String>) -> Self {
        Self {
            code: true,
            ..Self::plain(content)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    RedBackground,
    GreenBackground,
    BlueBackground,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayBlock {
    Heading(Vec<TextRun>),
    Paragraph(Vec<TextRun>),
    Bullet(Vec<TextRun>),
    Toggle {
        title: Vec<TextRun>,
        color: Color,
        children: Vec<DisplayBlock>,
    },
    Divider,
}

impl DisplayBlock {
    /// Concatenated text of the block's own runs (toggle title for toggles).
    #[cfg(test)]
    pub fn plain_text(&self) -> String {
        let runs = match self {
            DisplayBlock::Heading(r) | DisplayBlock::Paragraph(r) | DisplayBlock::Bullet(r) => r,
            DisplayBlock::Toggle { title, .. } => title,
            DisplayBlock::Divider => return String::new(),
        };
        runs.iter().map(|r| r.content.as_str()).collect()
    }
}

// ===================================================================
// Renderer
// ===================================================================

/// Everything one log section is built from.
pub struct LogContext<'a> {
    pub subject: &'a str,
    pub timestamp: &'a str,
    pub phases: &'a PhaseBuckets,
    /// Methods the test runner reported as passed.
    pub passed_methods: &'a [String],
}

pub struct Renderer {
    env: Environment<'static>,
    phrases: Phrases,
    max_blocks: usize,
    max_text_len: usize,
}

impl Renderer {
    /// Build a renderer, rejecting phrase templates that don't parse.
    ///
    /// Limits above the API's are clamped down to them.
    pub fn new(config: &RenderConfig) -> Result<Self> {
        let phrases = config.phrases.clone();
        for (name, source) in [
            ("heading", &phrases.heading),
            ("red", &phrases.red),
            ("file", &phrases.file),
        ] {
            Environment::new()
                .template_from_str(source)
                .map(drop)
                .with_context(|| format!("parsing {name} phrase template"))?;
        }
        Ok(Self {
            env: Environment::new(),
            phrases,
            max_blocks: config.max_blocks.min(NOTION_MAX_BLOCKS),
            max_text_len: config
                .max_text_len
                .min(NOTION_TEXT_LIMIT - ELLIPSIS.len()),
        })
    }

    /// Lay out the cycle as heading, Red, Green, optional Refactor, result
    /// line and divider. At most `max_blocks` blocks are returned; the tail
    /// is dropped.
    pub fn render(&self, ctx: &LogContext<'_>) -> Result<Vec<DisplayBlock>> {
        let mut blocks = Vec::new();

        let heading = self.render_phrase(
            &self.phrases.heading,
            context! { subject => ctx.subject, timestamp => ctx.timestamp },
        )?;
        blocks.push(DisplayBlock::Heading(vec![self.run(TextRun::plain(heading))]));

        // --- Red ---
        let red_summary = self.red_summary(ctx)?;
        blocks.push(self.paragraph(Some("Red: "), &red_summary));
        self.expand_entries(&mut blocks, &ctx.phases.red, Color::RedBackground)?;

        // --- Green ---
        let green_summary = if ctx.phases.green.is_empty() {
            &self.phrases.green_verified
        } else {
            &self.phrases.green_implemented
        };
        blocks.push(self.paragraph(Some("Green: "), green_summary));
        self.expand_entries(&mut blocks, &ctx.phases.green, Color::GreenBackground)?;

        // --- Refactor ---
        if !ctx.phases.refactor.is_empty() {
            blocks.push(self.paragraph(Some("Refactor: "), &self.phrases.refactor));
            self.expand_entries(&mut blocks, &ctx.phases.refactor, Color::BlueBackground)?;
        }

        // --- Result ---
        blocks.push(self.paragraph(Some("Result: "), &self.phrases.result));
        blocks.push(DisplayBlock::Divider);

        blocks.truncate(self.max_blocks);
        Ok(blocks)
    }

    fn red_summary(&self, ctx: &LogContext<'_>) -> Result<String> {
        let mut names: Vec<&str> = ctx.phases.red_test_names().take(MAX_SUMMARY_NAMES).collect();
        if names.is_empty() {
            names = ctx
                .passed_methods
                .iter()
                .take(MAX_SUMMARY_NAMES)
                .map(String::as_str)
                .collect();
        }
        if names.is_empty() {
            return Ok(self.phrases.red_generic.clone());
        }
        let names = names
            .iter()
            .map(|n| format!("`{n}`"))
            .collect::<Vec<_>>()
            .join(", ");
        self.render_phrase(&self.phrases.red, context! { names })
    }

    /// Reasoning toggle (when there is reasoning) and one bullet per file,
    /// for each entry.
    fn expand_entries(
        &self,
        blocks: &mut Vec<DisplayBlock>,
        entries: &[PhaseEntry],
        color: Color,
    ) -> Result<()> {
        for entry in entries {
            if !entry.reasoning.is_empty() {
                blocks.push(DisplayBlock::Toggle {
                    title: vec![self.run(TextRun::plain(self.phrases.reasoning_title.as_str()))],
                    color,
                    children: vec![self.paragraph(None, &entry.reasoning)],
                });
            }
            for file in &entry.files {
                let label = self.render_phrase(&self.phrases.file, context! { file })?;
                blocks.push(DisplayBlock::Bullet(vec![self.run(TextRun::plain(label))]));
            }
        }
        Ok(())
    }

    /// A paragraph with an optional bold prefix, where `` `code` `` spans
    /// in `text` become monospace runs.
    ///
    /// `text` is capped as a whole before it is split, and the run count is
    /// capped at the API limit.
    fn paragraph(&self, bold_prefix: Option<&str>, text: &str) -> DisplayBlock {
        let text = truncate(text, self.max_text_len);
        let text = text.as_str();
        let mut runs = Vec::new();
        if let Some(prefix) = bold_prefix {
            runs.push(self.run(TextRun::bold(prefix)));
        }

        let mut last = 0;
        for span in CODE_SPAN.find_iter(text) {
            if span.start() > last {
                runs.push(self.run(TextRun::plain(&text[last..span.start()])));
            }
            let inner = &span.as_str()[1..span.len() - 1];
            runs.push(self.run(TextRun::code(inner)));
            last = span.end();
        }
        if last < text.len() {
            runs.push(self.run(TextRun::plain(&text[last..])));
        }

        runs.truncate(NOTION_MAX_RUNS);
        DisplayBlock::Paragraph(runs)
    }

    fn run(&self, mut run: TextRun) -> TextRun {
        run.content = truncate(&run.content, self.max_text_len);
        run
    }

    fn render_phrase(&self, source: &str, ctx: minijinja::Value) -> Result<String> {
        self.env
            .render_str(source, ctx)
            .with_context(|| format!("rendering phrase {source:?}"))
    }
}
