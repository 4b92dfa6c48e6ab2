use serde::{Deserialize, Serialize};

/// Slack caps a message at 50 blocks.
pub const MAX_BLOCKS: usize = 50;

/// Text object inside a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Text {
    PlainText { text: String, emoji: bool },
    Mrkdwn { text: String },
}

impl Text {
    pub fn plain(text: impl Into<String>) -> Self {
        Text::PlainText {
            text: text.into(),
            emoji: true,
        }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Text::Mrkdwn { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Text::PlainText { text, .. } | Text::Mrkdwn { text } => text,
        }
    }
}

/// The subset of Block Kit this tool renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Header { text: Text },
    Section { text: Text },
    Divider,
    Context { elements: Vec<Text> },
}

impl Block {
    pub fn header(text: impl Into<String>) -> Self {
        Block::Header {
            text: Text::plain(text),
        }
    }

    pub fn section(text: impl Into<String>) -> Self {
        Block::Section {
            text: Text::mrkdwn(text),
        }
    }

    pub fn context(text: impl Into<String>) -> Self {
        Block::Context {
            elements: vec![Text::mrkdwn(text)],
        }
    }

    /// Visible text of the block, if it has any.
    pub fn text(&self) -> Option<String> {
        match self {
            Block::Header { text } | Block::Section { text } => Some(text.as_str().to_string()),
            Block::Context { elements } => Some(
                elements
                    .iter()
                    .map(Text::as_str)
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            Block::Divider => None,
        }
    }
}

/// Incoming-webhook payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackMessage {
    /// Fallback shown in notifications and by clients without Block Kit.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub text: Option<String>,
    pub blocks: Vec<Block>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_json_shape() {
        let message = SlackMessage {
            text: None,
            blocks: vec![Block::header("PR Updates"), Block::Divider, Block::section("*hi*")],
        };
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "blocks": [
                    {"type": "header", "text": {"type": "plain_text", "text": "PR Updates", "emoji": true}},
                    {"type": "divider"},
                    {"type": "section", "text": {"type": "mrkdwn", "text": "*hi*"}}
                ]
            })
        );
    }

    #[test]
    fn test_block_text() {
        assert_eq!(Block::Divider.text(), None);
        assert_eq!(Block::context("_more_").text().as_deref(), Some("_more_"));
    }
}
