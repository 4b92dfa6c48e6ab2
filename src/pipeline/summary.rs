use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use super::PipelineError;
use crate::github::{open_authored_query, review_requested_query, ActivitySource, GitHubError};
use crate::relevance::{count_outstanding, fold_review_states, RelevanceConfig, ReviewStatus};
use crate::slack::{build_summary_message, Transport};

/// One of the user's open pull requests.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnPullRequest {
    pub repo: String,
    pub number: u64,
    pub title: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub status: ReviewStatus,
    pub outstanding_comments: usize,
}

/// An open pull request waiting on the user's review.
#[derive(Debug, Clone, PartialEq)]
pub struct AwaitingReview {
    pub repo: String,
    pub number: u64,
    pub title: String,
    pub url: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailySummary {
    pub my_prs: Vec<OwnPullRequest>,
    pub awaiting_review: Vec<AwaitingReview>,
}

/// Gather the user's open PRs with folded review status and outstanding
/// comments, plus the PRs waiting on their review.
#[instrument(skip_all, fields(user = %relevance.username))]
pub async fn collect_summary(
    source: &dyn ActivitySource,
    relevance: &RelevanceConfig,
) -> Result<DailySummary, GitHubError> {
    let username = relevance.username.as_str();

    let open = source
        .search_pull_requests(&open_authored_query(username))
        .await?;
    info!(count = open.items.len(), "fetched open pull requests");

    let mut my_prs = Vec::with_capacity(open.items.len());
    for item in open.items {
        let key = item.key();
        let (reviews, issue_comments, review_comments) = tokio::try_join!(
            source.reviews(&key),
            source.issue_comments(&key, None),
            source.review_comments(&key, None),
        )?;

        let mut comments = issue_comments;
        comments.extend(review_comments);
        let status = fold_review_states(&reviews, &relevance.bots);
        let outstanding_comments = count_outstanding(&comments, username, &relevance.bots);
        debug!(pr = %key, %status, outstanding_comments, "summarised pull request");

        my_prs.push(OwnPullRequest {
            repo: key.repo,
            number: item.number,
            title: item.title,
            url: item.html_url,
            created_at: item.created_at,
            status,
            outstanding_comments,
        });
    }

    let requested = source
        .search_pull_requests(&review_requested_query(username))
        .await?;
    info!(count = requested.items.len(), "fetched pull requests awaiting review");

    let awaiting_review = requested
        .items
        .into_iter()
        .map(|item| AwaitingReview {
            repo: item.repo_full_name(),
            number: item.number,
            title: item.title,
            url: item.html_url,
            author: item.user.login,
            created_at: item.created_at,
        })
        .collect();

    Ok(DailySummary {
        my_prs,
        awaiting_review,
    })
}

/// Collect and deliver the daily summary. Sent even when both lists are empty.
pub async fn run_summary(
    source: &dyn ActivitySource,
    transport: &dyn Transport,
    relevance: &RelevanceConfig,
    now: DateTime<Utc>,
) -> Result<DailySummary, PipelineError> {
    let summary = collect_summary(source, relevance).await?;
    let message = build_summary_message(&summary, now);
    transport.deliver(&message).await?;
    Ok(summary)
}
