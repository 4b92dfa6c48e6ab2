pub mod actor;
pub mod engine;
pub mod events;
pub mod outstanding;
pub mod review_state;

pub use actor::BotClassifier;
pub use engine::compute_relevant_notifications;
pub use events::TracingSink;
pub use outstanding::count_outstanding;
pub use review_state::{fold_review_states, ReviewStatus};

use chrono::{DateTime, Duration, Utc};

use crate::github::{Comment, PrKey, PullRequestDetail, Review, User};
use crate::ledger::review_key;

/// Identity and classification rules the engine evaluates against.
/// Passed explicitly so several configurations can coexist in one process.
#[derive(Debug, Clone)]
pub struct RelevanceConfig {
    pub username: String,
    pub bots: BotClassifier,
}

impl RelevanceConfig {
    pub fn new(username: impl Into<String>, bots: BotClassifier) -> Self {
        Self {
            username: username.into(),
            bots,
        }
    }

    pub fn mention(&self) -> String {
        format!("@{}", self.username)
    }
}

/// The run's clock: `now` and the cutoff below which activity counts as seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub now: DateTime<Utc>,
    pub cutoff: DateTime<Utc>,
}

impl TimeWindow {
    pub fn lookback(now: DateTime<Utc>, minutes: i64) -> Self {
        Self {
            now,
            cutoff: now - Duration::minutes(minutes),
        }
    }
}

/// A pull request as the engine sees it.
#[derive(Debug, Clone)]
pub struct PullRequestRef {
    /// "owner/repo"
    pub repo: String,
    pub number: u64,
    pub title: String,
    pub url: String,
    pub author: User,
    pub created_at: DateTime<Utc>,
    pub requested_reviewers: Vec<User>,
    pub requested_teams: Vec<String>,
}

impl PullRequestRef {
    pub fn from_detail(repo: impl Into<String>, detail: PullRequestDetail) -> Self {
        Self {
            repo: repo.into(),
            number: detail.number,
            title: detail.title,
            url: detail.html_url,
            author: detail.user,
            created_at: detail.created_at,
            requested_reviewers: detail.requested_reviewers,
            requested_teams: detail.requested_teams.into_iter().map(|t| t.slug).collect(),
        }
    }

    pub fn key(&self) -> PrKey {
        PrKey {
            repo: self.repo.clone(),
            number: self.number,
        }
    }
}

/// Everything fetched for one candidate pull request.
#[derive(Debug, Clone)]
pub struct PrActivity {
    pub pr: PullRequestRef,
    /// Issue comments since the cutoff.
    pub issue_comments: Vec<Comment>,
    /// Code-review line comments since the cutoff.
    pub review_comments: Vec<Comment>,
    /// All reviews, unfiltered by time.
    pub reviews: Vec<Review>,
}

/// A pull request with activity worth announcing.
#[derive(Debug, Clone, PartialEq)]
pub struct RelevantNotification {
    pub repo: String,
    pub number: u64,
    pub title: String,
    pub url: String,
    pub is_my_pr: bool,
    pub is_reviewer: bool,
    /// Only set when the PR is new and the user is a requested reviewer.
    pub is_new_pr: bool,
    pub comments: Vec<Comment>,
    pub review_comments: Vec<Comment>,
    pub review_level_comments: Vec<Review>,
    pub approvals: Vec<Review>,
}

impl RelevantNotification {
    pub fn key(&self) -> PrKey {
        PrKey {
            repo: self.repo.clone(),
            number: self.number,
        }
    }

    /// Ledger keys for the announced reviews that are deduplicated through
    /// the ledger, i.e. reviews on the user's own PRs.
    pub fn ledger_keys(&self) -> Vec<String> {
        if !self.is_my_pr {
            return Vec::new();
        }
        let key = self.key();
        self.approvals
            .iter()
            .chain(&self.review_level_comments)
            .map(|r| review_key(&key, r.id))
            .collect()
    }
}
