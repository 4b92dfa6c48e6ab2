pub mod types;

pub use types::{
    Comment, Notification, PrKey, PullRequestDetail, Review, ReviewState, SearchResponse, User,
};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{HeaderMap, LINK};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument};

const USER_AGENT: &str = "pr-notifier";
const PER_PAGE: &str = "100";

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("GitHub API request failed: {0}")]
    ApiRequest(#[from] reqwest::Error),

    #[error("GitHub resource not found: {0}")]
    NotFound(String),
}

/// Everything a run reads from the source-control host.
///
/// Implemented by [`GitHubClient`]; the pipeline only sees this trait so a run
/// can be driven from canned data.
#[async_trait]
pub trait ActivitySource: Send + Sync {
    /// Participating notifications updated since `since`.
    async fn notifications(&self, since: DateTime<Utc>) -> Result<Vec<Notification>, GitHubError>;

    /// Issue search restricted to pull requests, most recently updated first.
    async fn search_pull_requests(&self, query: &str) -> Result<SearchResponse, GitHubError>;

    async fn pull_request(&self, pr: &PrKey) -> Result<PullRequestDetail, GitHubError>;

    async fn issue_comments(
        &self,
        pr: &PrKey,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Comment>, GitHubError>;

    async fn review_comments(
        &self,
        pr: &PrKey,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Comment>, GitHubError>;

    /// All reviews of the PR, unfiltered by time.
    async fn reviews(&self, pr: &PrKey) -> Result<Vec<Review>, GitHubError>;
}

/// Thin REST client over `reqwest`.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl GitHubClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, GitHubError> {
        let url = format!("{}{}", self.base_url, path);
        let (value, _) = self.get_page(&url, query, path).await?;
        Ok(value)
    }

    /// One GET, returning the body and the `rel="next"` URL if there is one.
    async fn get_page<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        path: &str,
    ) -> Result<(T, Option<String>), GitHubError> {
        debug!(%url, "GET");
        let response = self
            .client
            .get(url)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json")
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(GitHubError::NotFound(path.to_string()));
        }
        let response = response.error_for_status()?;
        let next = next_link(response.headers());
        let value = response.json::<T>().await?;
        Ok((value, next))
    }

    /// Every page of a list endpoint, following `Link` headers.
    async fn get_all<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, GitHubError> {
        let first = format!("{}{}", self.base_url, path);
        let (mut items, mut next): (Vec<T>, _) = self.get_page(&first, query, path).await?;
        while let Some(url) = next {
            // The next URL already carries the query string.
            let (page, following): (Vec<T>, _) = self.get_page(&url, &[], path).await?;
            items.extend(page);
            next = following;
        }
        Ok(items)
    }

    async fn comments(
        &self,
        path: String,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Comment>, GitHubError> {
        let mut query = vec![("per_page", PER_PAGE.to_string())];
        if let Some(since) = since {
            query.push(("since", iso8601(since)));
        }
        self.get_all(&path, &query).await
    }
}

#[async_trait]
impl ActivitySource for GitHubClient {
    #[instrument(skip(self))]
    async fn notifications(&self, since: DateTime<Utc>) -> Result<Vec<Notification>, GitHubError> {
        let notifications: Vec<Notification> = self
            .get_all(
                "/notifications",
                &[
                    ("since", iso8601(since)),
                    ("participating", "true".to_string()),
                    ("per_page", PER_PAGE.to_string()),
                ],
            )
            .await?;
        debug!(count = notifications.len(), "received notifications");
        Ok(notifications)
    }

    #[instrument(skip(self))]
    async fn search_pull_requests(&self, query: &str) -> Result<SearchResponse, GitHubError> {
        let first = format!("{}/search/issues", self.base_url);
        let params = [
            ("q", query.to_string()),
            ("per_page", PER_PAGE.to_string()),
            ("sort", "updated".to_string()),
            ("order", "desc".to_string()),
        ];
        let (mut response, mut next): (SearchResponse, _) =
            self.get_page(&first, &params, "/search/issues").await?;
        while let Some(url) = next {
            let (page, following): (SearchResponse, _) =
                self.get_page(&url, &[], "/search/issues").await?;
            response.items.extend(page.items);
            next = following;
        }
        debug!(total = response.total_count, "search results");
        Ok(response)
    }

    #[instrument(skip(self, pr), fields(pr = %pr))]
    async fn pull_request(&self, pr: &PrKey) -> Result<PullRequestDetail, GitHubError> {
        self.get_json(&format!("/repos/{}/pulls/{}", pr.repo, pr.number), &[])
            .await
    }

    #[instrument(skip(self, pr), fields(pr = %pr))]
    async fn issue_comments(
        &self,
        pr: &PrKey,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Comment>, GitHubError> {
        self.comments(format!("/repos/{}/issues/{}/comments", pr.repo, pr.number), since)
            .await
    }

    #[instrument(skip(self, pr), fields(pr = %pr))]
    async fn review_comments(
        &self,
        pr: &PrKey,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Comment>, GitHubError> {
        self.comments(format!("/repos/{}/pulls/{}/comments", pr.repo, pr.number), since)
            .await
    }

    #[instrument(skip(self, pr), fields(pr = %pr))]
    async fn reviews(&self, pr: &PrKey) -> Result<Vec<Review>, GitHubError> {
        self.get_all(
            &format!("/repos/{}/pulls/{}/reviews", pr.repo, pr.number),
            &[("per_page", PER_PAGE.to_string())],
        )
        .await
    }
}

/// URL of the `rel="next"` entry in a GitHub `Link` header.
fn next_link(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(LINK)?.to_str().ok()?;
    link.split(',').find_map(|entry| {
        let (url, params) = entry.split_once(';')?;
        params
            .split(';')
            .any(|param| param.trim() == "rel=\"next\"")
            .then(|| url.trim().trim_start_matches('<').trim_end_matches('>').to_string())
    })
}

fn iso8601(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Search query for the user's PRs updated on or after the cutoff's date.
pub fn authored_since_query(username: &str, cutoff: DateTime<Utc>) -> String {
    format!(
        "type:pr author:{} updated:>={}",
        username,
        cutoff.format("%Y-%m-%d")
    )
}

pub fn open_authored_query(username: &str) -> String {
    format!("type:pr author:{} state:open", username)
}

pub fn review_requested_query(username: &str) -> String {
    format!("type:pr review-requested:{} state:open", username)
}
