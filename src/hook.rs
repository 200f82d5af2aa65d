use crate::config::{Config, NotionConfig};
use crate::notion::{DryRun, NotionClient, Publisher};
use crate::phases::Classifier;
use crate::render::{DisplayBlock, LogContext, Renderer, truncate};
use crate::transcript::{Transcript, TranscriptEntry};
use crate::trigger::{Ineligible, TestRun, TriggerFilter};
use crate::types::PostToolUseInput;
use anyhow::{Context, Result};
use jiff::Timestamp;
use jiff::tz::{Offset, TimeZone};
use std::path::Path;
use tracing::{debug, error, info, warn};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Where the rendered log goes.
pub enum Delivery {
    /// Append to the configured page. `api_key` is `None` when the credential
    /// variable is unset or empty.
    Notion { api_key: Option<String> },
    /// Print the request body to stdout.
    DryRun,
}

impl Delivery {
    /// Resolve the credential from the environment variable named in config.
    pub fn from_env(dry_run: bool, config: &NotionConfig) -> Self {
        if dry_run {
            return Delivery::DryRun;
        }
        let api_key = std::env::var(&config.credential_env)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        Delivery::Notion { api_key }
    }
}

/// What a single invocation ended up doing.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Ineligible(Ineligible),
    MissingCredential,
    MissingTranscript,
    Published { blocks: usize },
    DeliveryFailed,
}

/// The pipeline for one PostToolUse event: filter, window, classify, render,
/// publish.
pub struct LogHook {
    notion: NotionConfig,
    max_entries: usize,
    offset: Offset,
    trigger: TriggerFilter,
    classifier: Classifier,
    renderer: Renderer,
}

impl LogHook {
    /// Compile every pattern and template in `config` up front.
    pub fn new(config: Config) -> Result<Self> {
        let offset = Offset::from_hours(config.render.utc_offset_hours).with_context(|| {
            format!("invalid utc_offset_hours {}", config.render.utc_offset_hours)
        })?;
        Ok(Self {
            trigger: TriggerFilter::new(&config.trigger)?,
            classifier: Classifier::new(&config.classifier)?,
            renderer: Renderer::new(&config.render)?,
            max_entries: config.transcript.max_entries,
            notion: config.notion,
            offset,
        })
    }

    pub async fn handle(&self, input: &PostToolUseInput, delivery: Delivery) -> Result<Outcome> {
        let run = match self.trigger.check(input) {
            Ok(run) => run,
            Err(reason) => {
                debug!(tool = %input.tool_name, %reason, "ignoring event");
                return Ok(Outcome::Ineligible(reason));
            }
        };

        if let Delivery::Notion { api_key: None } = delivery {
            warn!(
                "{} is not set; skipping Notion log",
                self.notion.credential_env
            );
            return Ok(Outcome::MissingCredential);
        }

        let transcript_path = Path::new(&input.transcript_path);
        if input.transcript_path.is_empty() || !transcript_path.is_file() {
            warn!(path = %input.transcript_path, "transcript not found; skipping Notion log");
            return Ok(Outcome::MissingTranscript);
        }

        let blocks = self.build_log(&run, transcript_path, Timestamp::now())?;

        match delivery {
            Delivery::DryRun => Ok(self.publish(&DryRun, &blocks).await),
            Delivery::Notion { api_key } => {
                let client = NotionClient::new(&self.notion, api_key.unwrap_or_default())
                    .context("building HTTP client")?;
                Ok(self.publish(&client, &blocks).await)
            }
        }
    }

    /// Render the log section for `run` from the transcript's current cycle.
    ///
    /// An unreadable transcript yields an empty cycle rather than an error.
    pub fn build_log(
        &self,
        run: &TestRun,
        transcript_path: &Path,
        now: Timestamp,
    ) -> Result<Vec<DisplayBlock>> {
        let transcript = Transcript::read_recent(transcript_path, self.max_entries)
            .unwrap_or_else(|err| {
                warn!("{err:#}; logging without transcript context");
                Transcript::empty()
            });

        let matcher = self.trigger.test_run();
        let window = transcript.cycle_window(|call| matcher.matches(call));
        debug!(
            entries = window.len(),
            first = ?window.first().and_then(TranscriptEntry::uuid),
            last = ?window.last().and_then(TranscriptEntry::uuid),
            prompt = ?window
                .iter()
                .find_map(TranscriptEntry::user_prompt)
                .map(|p| truncate(p, 80)),
            "selected cycle window"
        );

        let phases = self.classifier.classify(window);
        debug!(
            red = phases.red.len(),
            green = phases.green.len(),
            refactor = phases.refactor.len(),
            implemented = ?phases.implemented,
            "classified cycle"
        );

        let subject = run.subject();
        let passed_methods = run.passed_methods();
        let timestamp = format_timestamp(now, self.offset);
        self.renderer.render(&LogContext {
            subject: &subject,
            timestamp: &timestamp,
            phases: &phases,
            passed_methods: &passed_methods,
        })
    }

    pub async fn publish<P: Publisher>(&self, publisher: &P, blocks: &[DisplayBlock]) -> Outcome {
        match publisher.append(&self.notion.page_id, blocks).await {
            Ok(()) => {
                info!(page_id = %self.notion.page_id, blocks = blocks.len(), "logged TDD cycle");
                Outcome::Published {
                    blocks: blocks.len(),
                }
            }
            Err(err) => {
                error!("{err}");
                Outcome::DeliveryFailed
            }
        }
    }
}

pub fn format_timestamp(now: Timestamp, offset: Offset) -> String {
    now.to_zoned(TimeZone::fixed(offset))
        .strftime(TIMESTAMP_FORMAT)
        .to_string()
}
