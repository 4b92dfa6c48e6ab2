pub mod summary;

use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::github::{authored_since_query, ActivitySource, GitHubError, PrKey};
use crate::ledger::{LedgerError, LedgerStore};
use crate::relevance::{
    compute_relevant_notifications, PrActivity, PullRequestRef, RelevanceConfig, TimeWindow,
    TracingSink,
};
use crate::slack::{build_notification_message, SlackError, Transport};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    GitHub(#[from] GitHubError),

    #[error(transparent)]
    Slack(#[from] SlackError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// What a notification run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub candidates: usize,
    pub skipped: usize,
    pub notified: usize,
    pub recorded: usize,
    pub pruned: usize,
}

/// One live notification run: load and prune the ledger, fetch candidate
/// activity, filter it, deliver the digest and record what was announced.
///
/// Reviews are recorded only after delivery succeeds. With `persist_ledger`
/// off (dry runs) the ledger file is left untouched.
#[instrument(skip_all, fields(user = %relevance.username, cutoff = %window.cutoff))]
pub async fn run_notifications(
    source: &dyn ActivitySource,
    transport: &dyn Transport,
    store: &LedgerStore,
    relevance: &RelevanceConfig,
    window: TimeWindow,
    persist_ledger: bool,
) -> Result<RunReport, PipelineError> {
    let mut report = RunReport::default();

    let mut ledger = store.load();
    report.pruned = ledger.prune(window.now);
    debug!(entries = ledger.len(), pruned = report.pruned, "ledger ready");

    let keys = collect_candidates(source, &relevance.username, &window).await?;
    report.candidates = keys.len();
    info!(candidates = keys.len(), "collected candidate pull requests");

    let activities = fetch_activity(source, &keys, &window).await?;
    report.skipped = keys.len() - activities.len();

    let notifications = compute_relevant_notifications(
        &activities,
        &ledger.keys(),
        relevance,
        &window,
        &mut TracingSink,
    );
    report.notified = notifications.len();

    if notifications.is_empty() {
        info!("no relevant notifications to send");
    } else {
        let message = build_notification_message(&notifications, &relevance.username);
        info!(notifications = notifications.len(), "sending notifications");
        transport.deliver(&message).await?;

        let announced: Vec<String> = notifications.iter().flat_map(|n| n.ledger_keys()).collect();
        report.recorded = announced.len();
        ledger.record(announced, window.now);
    }

    if persist_ledger {
        store.save(&ledger)?;
    } else {
        debug!("ledger not persisted");
    }

    Ok(report)
}

/// Pull requests worth evaluating: PR notifications since the cutoff, then the
/// user's own PRs updated since the cutoff date. First occurrence wins.
#[instrument(skip(source, window))]
pub async fn collect_candidates(
    source: &dyn ActivitySource,
    username: &str,
    window: &TimeWindow,
) -> Result<Vec<PrKey>, GitHubError> {
    let mut seen = HashSet::new();
    let mut keys = Vec::new();

    for notification in source.notifications(window.cutoff).await? {
        match notification.pull_request() {
            Some(key) => {
                debug!(pr = %key, reason = %notification.reason, title = %notification.subject.title, "notification");
                if seen.insert(key.clone()) {
                    keys.push(key);
                }
            }
            None => debug!(kind = %notification.subject.kind, "ignoring non-PR notification"),
        }
    }

    let authored = source
        .search_pull_requests(&authored_since_query(username, window.cutoff))
        .await?;
    debug!(total = authored.total_count, "authored pull requests updated in window");
    for item in authored.items {
        let key = item.key();
        if seen.insert(key.clone()) {
            keys.push(key);
        }
    }

    Ok(keys)
}

/// Fetch detail, comments and reviews for each candidate. A PR whose detail
/// cannot be fetched is skipped; any other failure aborts the run.
pub async fn fetch_activity(
    source: &dyn ActivitySource,
    keys: &[PrKey],
    window: &TimeWindow,
) -> Result<Vec<PrActivity>, GitHubError> {
    let mut activities = Vec::with_capacity(keys.len());
    for key in keys {
        let detail = match source.pull_request(key).await {
            Ok(detail) => detail,
            Err(e) => {
                warn!(pr = %key, error = %e, "failed to fetch pull request, skipping");
                continue;
            }
        };

        let (issue_comments, review_comments, reviews) = tokio::try_join!(
            source.issue_comments(key, Some(window.cutoff)),
            source.review_comments(key, Some(window.cutoff)),
            source.reviews(key),
        )?;
        debug!(
            pr = %key,
            issue_comments = issue_comments.len(),
            review_comments = review_comments.len(),
            reviews = reviews.len(),
            "fetched activity"
        );

        activities.push(PrActivity {
            pr: PullRequestRef::from_detail(key.repo.clone(), detail),
            issue_comments,
            review_comments,
            reviews,
        });
    }
    Ok(activities)
}
