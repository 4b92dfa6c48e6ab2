use crate::github::User;

/// Marker GitHub appends to app account logins, e.g. `dependabot[bot]`.
pub const BOT_SUFFIX: &str = "[bot]";

pub const DEFAULT_BOT_FRAGMENTS: &[&str] = &[
    "dependabot",
    "renovate",
    "github-actions",
    "codecov",
    "vercel",
    "coderabbitai",
];

/// Classifies actors as bot or human.
///
/// A login is a bot when it contains [`BOT_SUFFIX`] or any configured
/// fragment, both compared case-insensitively.
#[derive(Debug, Clone)]
pub struct BotClassifier {
    fragments: Vec<String>,
}

impl BotClassifier {
    pub fn new<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            fragments: fragments
                .into_iter()
                .map(|f| f.as_ref().trim().to_lowercase())
                .filter(|f| !f.is_empty())
                .collect(),
        }
    }

    pub fn is_bot(&self, login: &str) -> bool {
        let login = login.to_lowercase();
        login.contains(BOT_SUFFIX) || self.fragments.iter().any(|f| login.contains(f.as_str()))
    }

    /// Like [`is_bot`](Self::is_bot), but also trusts the account type GitHub reports.
    pub fn is_bot_user(&self, user: &User) -> bool {
        user.kind.as_deref() == Some("Bot") || self.is_bot(&user.login)
    }
}

impl Default for BotClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_BOT_FRAGMENTS)
    }
}
