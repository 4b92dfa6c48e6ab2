use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A GitHub account as embedded in PRs, reviews and comments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub login: String,
    /// Account type ("User", "Bot", "Organization"). Absent in some payloads.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[cfg(test)]
impl User {
    pub fn new(login: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            kind: None,
        }
    }
}

/// Verdict of a single review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    Commented,
    Dismissed,
    Pending,
    #[serde(other)]
    Other,
}

/// GET /repos/{repo}/pulls/{number}/reviews
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: u64,
    pub user: User,
    pub state: ReviewState,
    #[serde(default)]
    pub body: Option<String>,
    /// Pending reviews have no submission time.
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub html_url: Option<String>,
}

impl Review {
    pub fn body_text(&self) -> &str {
        self.body.as_deref().unwrap_or("")
    }
}

/// Issue comment or code-review line comment; both share this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub user: User,
    #[serde(default)]
    pub body: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Team {
    pub slug: String,
}

/// GET /repos/{repo}/pulls/{number}
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestDetail {
    pub number: u64,
    pub user: User,
    pub title: String,
    pub html_url: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub requested_reviewers: Vec<User>,
    #[serde(default)]
    pub requested_teams: Vec<Team>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationSubject {
    /// API URL of the subject; absent for some subject types.
    pub url: Option<String>,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationRepository {
    pub full_name: String,
}

/// GET /notifications
#[derive(Debug, Clone, Deserialize)]
pub struct Notification {
    pub subject: NotificationSubject,
    pub repository: NotificationRepository,
    pub reason: String,
}

impl Notification {
    /// The pull request this notification is about, if any.
    pub fn pull_request(&self) -> Option<PrKey> {
        if self.subject.kind != "PullRequest" {
            return None;
        }
        let url = self.subject.url.as_deref()?;
        let (_, number) = url.rsplit_once("/pulls/")?;
        let number = number.trim_end_matches('/').parse().ok()?;
        Some(PrKey {
            repo: self.repository.full_name.clone(),
            number,
        })
    }
}

/// One entry of GET /search/issues.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchItem {
    pub number: u64,
    pub title: String,
    pub html_url: String,
    pub repository_url: String,
    pub user: User,
    pub created_at: DateTime<Utc>,
}

impl SearchItem {
    /// "owner/repo", recovered from `repository_url`.
    pub fn repo_full_name(&self) -> String {
        match self.repository_url.split_once("/repos/") {
            Some((_, name)) => name.to_string(),
            None => self.repository_url.clone(),
        }
    }

    pub fn key(&self) -> PrKey {
        PrKey {
            repo: self.repo_full_name(),
            number: self.number,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    pub total_count: u64,
    pub items: Vec<SearchItem>,
}

/// Identifies a pull request across repositories.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrKey {
    /// "owner/repo"
    pub repo: String,
    pub number: u64,
}

impl std::fmt::Display for PrKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.repo, self.number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_state_deserialize() {
        let state: ReviewState = serde_json::from_str("\"CHANGES_REQUESTED\"").unwrap();
        assert_eq!(state, ReviewState::ChangesRequested);
        let state: ReviewState = serde_json::from_str("\"SOMETHING_NEW\"").unwrap();
        assert_eq!(state, ReviewState::Other);
    }

    #[test]
    fn test_review_with_null_fields() {
        let review: Review = serde_json::from_value(serde_json::json!({
            "id": 7,
            "user": {"login": "bob", "type": "User"},
            "state": "PENDING",
            "body": null,
            "submitted_at": null
        }))
        .unwrap();
        assert_eq!(review.body_text(), "");
        assert!(review.html_url.is_none());
        assert!(review.submitted_at.is_none());
        assert_eq!(review.user.kind.as_deref(), Some("User"));
    }

    #[test]
    fn test_comment_html_url() {
        let comment: Comment = serde_json::from_value(serde_json::json!({
            "user": {"login": "carol"},
            "body": "ping",
            "created_at": "2024-05-01T10:10:00Z",
            "html_url": "https://github.com/org/repo/pull/42#issuecomment-1"
        }))
        .unwrap();
        assert_eq!(
            comment.html_url.as_deref(),
            Some("https://github.com/org/repo/pull/42#issuecomment-1")
        );
    }

    #[test]
    fn test_notification_pull_request_key() {
        let notification: Notification = serde_json::from_value(serde_json::json!({
            "subject": {
                "url": "https://api.github.com/repos/org/repo/pulls/42",
                "title": "Add feature",
                "type": "PullRequest"
            },
            "repository": {"full_name": "org/repo"},
            "reason": "review_requested"
        }))
        .unwrap();
        let key = notification.pull_request().unwrap();
        assert_eq!(key.to_string(), "org/repo#42");
    }

    #[test]
    fn test_notification_for_issue_is_ignored() {
        let notification: Notification = serde_json::from_value(serde_json::json!({
            "subject": {
                "url": "https://api.github.com/repos/org/repo/issues/3",
                "title": "Bug",
                "type": "Issue"
            },
            "repository": {"full_name": "org/repo"},
            "reason": "mention"
        }))
        .unwrap();
        assert!(notification.pull_request().is_none());
    }

    #[test]
    fn test_search_item_repo_full_name() {
        let item: SearchItem = serde_json::from_value(serde_json::json!({
            "number": 5,
            "title": "Fix",
            "html_url": "https://github.com/org/repo/pull/5",
            "repository_url": "https://api.github.com/repos/org/repo",
            "user": {"login": "alice"},
            "created_at": "2024-05-01T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(item.repo_full_name(), "org/repo");
        assert_eq!(item.key().number, 5);
    }
}
