use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::relevance::actor::DEFAULT_BOT_FRAGMENTS;

/// Default config file looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = ".pr-notifier.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{0} is required (set it in the environment or in .pr-notifier.toml)")]
    Missing(&'static str),
}

/// Top-level configuration loaded from .pr-notifier.toml.
/// All fields are optional in the file; credentials usually come from the environment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub github: GitHubConfig,

    #[serde(default)]
    pub slack: SlackConfig,

    #[serde(default)]
    pub notify: NotifyConfig,

    /// Dry-run mode: never post to the webhook, never persist the ledger.
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubConfig {
    /// GitHub API token. Overridden by GITHUB_TOKEN when set.
    pub token: Option<String>,
    /// Login of the user notifications are computed for. Overridden by GITHUB_USERNAME.
    pub username: Option<String>,
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            username: None,
            api_url: default_api_url(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlackConfig {
    /// Incoming webhook URL. Overridden by SLACK_WEBHOOK_URL.
    pub webhook_url: Option<String>,
    /// Where dry runs write the rendered payload. Defaults to the temp dir.
    pub payload_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    #[serde(default = "default_lookback_minutes")]
    pub lookback_minutes: i64,

    #[serde(default = "default_dry_run_lookback_minutes")]
    pub dry_run_lookback_minutes: i64,

    /// Case-insensitive login fragments that mark an account as a bot.
    #[serde(default = "default_bot_fragments")]
    pub bot_fragments: Vec<String>,

    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            lookback_minutes: default_lookback_minutes(),
            dry_run_lookback_minutes: default_dry_run_lookback_minutes(),
            bot_fragments: default_bot_fragments(),
            state_file: default_state_file(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

// 30 minute schedule plus a 5 minute buffer.
fn default_lookback_minutes() -> i64 {
    35
}

fn default_dry_run_lookback_minutes() -> i64 {
    24 * 60
}

fn default_bot_fragments() -> Vec<String> {
    DEFAULT_BOT_FRAGMENTS.iter().map(|s| s.to_string()).collect()
}

fn default_state_file() -> PathBuf {
    PathBuf::from(".pr-notifier-state.json")
}

/// Credentials validated up front, before any request is made.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub token: String,
    pub username: String,
    /// `None` only in dry-run mode.
    pub webhook_url: Option<String>,
}

impl Config {
    /// Load configuration from `path`, or from .pr-notifier.toml in the current
    /// directory. A missing file yields the defaults. Environment variables
    /// (including ones from a local `.env`) override file values.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        dotenvy::dotenv().ok();

        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let mut config = if path.exists() {
            Self::load_from(path)?
        } else {
            Config::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from a specific path without consulting the environment.
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Overlay environment values. Takes a lookup function so tests don't
    /// have to mutate the process environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = non_empty("GITHUB_TOKEN") {
            self.github.token = Some(token);
        }
        if let Some(username) = non_empty("GITHUB_USERNAME") {
            self.github.username = Some(username);
        }
        if let Some(url) = non_empty("SLACK_WEBHOOK_URL") {
            self.slack.webhook_url = Some(url);
        }
        if non_empty("TESTING").as_deref() == Some("true") {
            self.dry_run = true;
        }
    }

    /// Lookback used for the relevance cutoff in the current mode.
    pub fn lookback_minutes(&self) -> i64 {
        if self.dry_run {
            self.notify.dry_run_lookback_minutes
        } else {
            self.notify.lookback_minutes
        }
    }

    pub fn payload_path(&self) -> PathBuf {
        self.slack
            .payload_path
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("slack-payload.json"))
    }

    /// Check that everything a run needs is present.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        let token = self
            .github
            .token
            .clone()
            .ok_or(ConfigError::Missing("GITHUB_TOKEN"))?;
        let username = self
            .github
            .username
            .clone()
            .ok_or(ConfigError::Missing("GITHUB_USERNAME"))?;
        let webhook_url = match (&self.slack.webhook_url, self.dry_run) {
            (Some(url), _) => Some(url.clone()),
            (None, true) => None,
            (None, false) => return Err(ConfigError::Missing("SLACK_WEBHOOK_URL")),
        };

        Ok(Credentials {
            token,
            username,
            webhook_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.github.token.is_none());
        assert_eq!(config.github.api_url, "https://api.github.com");
        assert_eq!(config.notify.lookback_minutes, 35);
        assert!(config.notify.bot_fragments.contains(&"dependabot".to_string()));
        assert!(!config.dry_run);
    }

    #[test]
    fn test_parse_config_toml() {
        let toml_str = r#"
[github]
username = "alice"

[notify]
lookback_minutes = 65
bot_fragments = ["sonarcloud"]
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.github.username.as_deref(), Some("alice"));
        assert_eq!(config.github.api_url, "https://api.github.com");
        assert_eq!(config.notify.lookback_minutes, 65);
        assert_eq!(config.notify.dry_run_lookback_minutes, 1440);
        assert_eq!(config.notify.bot_fragments, vec!["sonarcloud".to_string()]);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notifier.toml");
        std::fs::write(&path, "dry_run = true\n[slack]\nwebhook_url = \"https://hooks.example/x\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert!(config.dry_run);
        assert_eq!(config.slack.webhook_url.as_deref(), Some("https://hooks.example/x"));
    }

    #[test]
    fn test_load_from_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notifier.toml");
        std::fs::write(&path, "[notify\nlookback_minutes = ").unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = Config::default();
        config.github.username = Some("from-file".to_string());
        config.apply_env(env(&[
            ("GITHUB_TOKEN", "ghp_x"),
            ("GITHUB_USERNAME", "alice"),
            ("TESTING", "true"),
        ]));
        assert_eq!(config.github.token.as_deref(), Some("ghp_x"));
        assert_eq!(config.github.username.as_deref(), Some("alice"));
        assert!(config.dry_run);
        assert_eq!(config.lookback_minutes(), 1440);
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let mut config = Config::default();
        config.github.token = Some("kept".to_string());
        config.apply_env(env(&[("GITHUB_TOKEN", "  ")]));
        assert_eq!(config.github.token.as_deref(), Some("kept"));
    }

    #[test]
    fn test_credentials_require_webhook_outside_dry_run() {
        let mut config = Config::default();
        config.apply_env(env(&[("GITHUB_TOKEN", "t"), ("GITHUB_USERNAME", "alice")]));
        assert!(matches!(
            config.credentials(),
            Err(ConfigError::Missing("SLACK_WEBHOOK_URL"))
        ));

        config.dry_run = true;
        let creds = config.credentials().unwrap();
        assert_eq!(creds.username, "alice");
        assert!(creds.webhook_url.is_none());
    }

    #[test]
    fn test_credentials_require_token() {
        let config = Config::default();
        assert!(matches!(
            config.credentials(),
            Err(ConfigError::Missing("GITHUB_TOKEN"))
        ));
    }
}
