use crate::config::NotionConfig;
use crate::render::{Color, DisplayBlock, TextRun};
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Notion API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Notion API connection error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Appends rendered blocks to a page. One attempt, no retry.
pub trait Publisher {
    async fn append(&self, page_id: &str, blocks: &[DisplayBlock]) -> Result<(), PublishError>;
}

// ===================================================================
// Wire format
// ===================================================================

/// Request body for `PATCH /v1/blocks/{id}/children`.
pub fn append_body(blocks: &[DisplayBlock]) -> Value {
    json!({ "children": blocks.iter().map(block_json).collect::<Vec<_>>() })
}

fn block_json(block: &DisplayBlock) -> Value {
    match block {
        DisplayBlock::Heading(runs) => typed_block("heading_2", json!({ "rich_text": rich_text(runs) })),
        DisplayBlock::Paragraph(runs) => typed_block("paragraph", json!({ "rich_text": rich_text(runs) })),
        DisplayBlock::Bullet(runs) => {
            typed_block("bulleted_list_item", json!({ "rich_text": rich_text(runs) }))
        }
        DisplayBlock::Toggle {
            title,
            color,
            children,
        } => typed_block(
            "toggle",
            json!({
                "rich_text": rich_text(title),
                "color": color_name(*color),
                "children": children.iter().map(block_json).collect::<Vec<_>>(),
            }),
        ),
        DisplayBlock::Divider => typed_block("divider", json!({})),
    }
}

fn typed_block(block_type: &str, body: Value) -> Value {
    json!({ "object": "block", "type": block_type, block_type: body })
}

fn rich_text(runs: &[TextRun]) -> Value {
    runs.iter()
        .map(|run| {
            let mut text = json!({ "type": "text", "text": { "content": run.content } });
            let mut annotations = serde_json::Map::new();
            if run.bold {
                annotations.insert("bold".into(), Value::Bool(true));
            }
            if run.code {
                annotations.insert("code".into(), Value::Bool(true));
            }
            if !annotations.is_empty() {
                text["annotations"] = Value::Object(annotations);
            }
            text
        })
        .collect()
}

fn color_name(color: Color) -> &'static str {
    match color {
        Color::RedBackground => "red_background",
        Color::GreenBackground => "green_background",
        Color::BlueBackground => "blue_background",
    }
}

// ===================================================================
// HTTP client
// ===================================================================

pub struct NotionClient {
    client: Client,
    base_url: String,
    api_version: String,
    api_key: String,
}

impl NotionClient {
    pub fn new(config: &NotionConfig, api_key: String) -> Result<Self, PublishError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            api_key,
        })
    }
}

impl Publisher for NotionClient {
    async fn append(&self, page_id: &str, blocks: &[DisplayBlock]) -> Result<(), PublishError> {
        let url = format!("{}/v1/blocks/{page_id}/children", self.base_url);
        tracing::debug!(%url, blocks = blocks.len(), "appending blocks");

        let response = self
            .client
            .patch(&url)
            .bearer_auth(&self.api_key)
            .header("Notion-Version", &self.api_version)
            .json(&append_body(blocks))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(PublishError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

/// Prints the request body to stdout instead of sending it.
pub struct DryRun;

impl Publisher for DryRun {
    async fn append(&self, page_id: &str, blocks: &[DisplayBlock]) -> Result<(), PublishError> {
        tracing::info!(page_id, blocks = blocks.len(), "dry run, not sending");
        println!("{:#}", append_body(blocks));
        Ok(())
    }
}
