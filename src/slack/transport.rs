use std::path::{Path, PathBuf};

use async_trait::async_trait;
use colored::Colorize;
use tracing::{debug, info, instrument};

use super::{Block, SlackError, SlackMessage};

/// Delivers a rendered message.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn deliver(&self, message: &SlackMessage) -> Result<(), SlackError>;
}

/// Posts to a Slack incoming webhook.
#[derive(Debug, Clone)]
pub struct WebhookTransport {
    client: reqwest::Client,
    url: String,
}

impl WebhookTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Transport for WebhookTransport {
    #[instrument(skip_all, fields(blocks = message.blocks.len()))]
    async fn deliver(&self, message: &SlackMessage) -> Result<(), SlackError> {
        debug!("posting message to webhook");
        self.client
            .post(&self.url)
            .json(message)
            .send()
            .await?
            .error_for_status()?;
        info!("message delivered");
        Ok(())
    }
}

/// Prints a preview to the terminal and writes the JSON payload to a file
/// instead of posting it.
#[derive(Debug, Clone)]
pub struct DryRunTransport {
    payload_path: PathBuf,
}

impl DryRunTransport {
    pub fn new(payload_path: impl Into<PathBuf>) -> Self {
        Self {
            payload_path: payload_path.into(),
        }
    }

    pub fn payload_path(&self) -> &Path {
        &self.payload_path
    }
}

#[async_trait]
impl Transport for DryRunTransport {
    #[instrument(skip_all, fields(path = %self.payload_path.display()))]
    async fn deliver(&self, message: &SlackMessage) -> Result<(), SlackError> {
        print_preview(message);
        let json = serde_json::to_string_pretty(message)?;
        tokio::fs::write(&self.payload_path, json).await?;
        info!("dry run: payload written instead of posted");
        Ok(())
    }
}

fn print_preview(message: &SlackMessage) {
    println!();
    for block in &message.blocks {
        match block {
            Block::Header { text } => println!("{}", text.as_str().bold()),
            Block::Divider => println!("{}", "─".repeat(40).dimmed()),
            Block::Context { .. } => {
                if let Some(text) = block.text() {
                    println!("{}", text.italic().dimmed());
                }
            }
            Block::Section { text } => println!("{}", text.as_str()),
        }
    }
    println!();
}
