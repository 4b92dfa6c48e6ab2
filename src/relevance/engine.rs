use std::collections::HashSet;

use super::events::{EngineEvent, EventSink, SkipReason};
use super::{PrActivity, RelevanceConfig, RelevantNotification, TimeWindow};
use crate::github::{Comment, Review, ReviewState};
use crate::ledger::review_key;

/// Decide which candidate pull requests have activity to announce.
///
/// Pure over its inputs: no I/O, and `ledger_keys` is only read. Output keeps
/// the candidate order. Reviews on the user's own PRs are deduplicated
/// through the ledger regardless of age; reviews on other PRs only count when
/// submitted after the cutoff.
pub fn compute_relevant_notifications(
    candidates: &[PrActivity],
    ledger_keys: &HashSet<String>,
    config: &RelevanceConfig,
    window: &TimeWindow,
    sink: &mut dyn EventSink,
) -> Vec<RelevantNotification> {
    candidates
        .iter()
        .filter_map(|activity| evaluate(activity, ledger_keys, config, window, sink))
        .collect()
}

fn evaluate(
    activity: &PrActivity,
    ledger_keys: &HashSet<String>,
    config: &RelevanceConfig,
    window: &TimeWindow,
    sink: &mut dyn EventSink,
) -> Option<RelevantNotification> {
    let pr = &activity.pr;
    let key = pr.key();
    let label = key.to_string();

    let is_my_pr = pr.author.login == config.username;
    let is_reviewer = pr
        .requested_reviewers
        .iter()
        .any(|u| u.login == config.username)
        || !pr.requested_teams.is_empty();
    let is_new_pr = pr.created_at > window.cutoff;
    sink.emit(EngineEvent::Evaluated {
        pr: label.clone(),
        is_my_pr,
        is_reviewer,
        is_new_pr,
    });

    let mut approvals = Vec::new();
    let mut review_level_comments = Vec::new();
    for review in &activity.reviews {
        let skip = if config.bots.is_bot_user(&review.user) {
            Some(SkipReason::Bot)
        } else if review.user.login == config.username {
            Some(SkipReason::OwnActivity)
        } else if is_my_pr {
            // Polling windows can miss reviews at their edges, so own PRs
            // rely on the ledger instead of the cutoff.
            ledger_keys
                .contains(&review_key(&key, review.id))
                .then_some(SkipReason::AlreadyNotified)
        } else if !submitted_after(review, window) {
            Some(SkipReason::BeforeCutoff)
        } else {
            None
        };
        if let Some(reason) = skip {
            sink.emit(EngineEvent::ReviewSkipped {
                pr: label.clone(),
                review_id: review.id,
                reason,
            });
            continue;
        }

        if review.state == ReviewState::Approved {
            approvals.push(review.clone());
        } else if !review.body_text().trim().is_empty() {
            review_level_comments.push(review.clone());
        } else {
            sink.emit(EngineEvent::ReviewSkipped {
                pr: label.clone(),
                review_id: review.id,
                reason: SkipReason::EmptyBody,
            });
        }
    }

    let involved = is_my_pr || is_reviewer;
    let comments = relevant_comments(&activity.issue_comments, &label, config, window, involved, sink);
    let review_comments =
        relevant_comments(&activity.review_comments, &label, config, window, involved, sink);

    let has_activity = !comments.is_empty()
        || !review_comments.is_empty()
        || !review_level_comments.is_empty()
        || !approvals.is_empty();
    if !has_activity && !(is_new_pr && is_reviewer) {
        sink.emit(EngineEvent::Excluded { pr: label });
        return None;
    }

    sink.emit(EngineEvent::Included {
        pr: label,
        comments: comments.len(),
        review_comments: review_comments.len(),
        review_level_comments: review_level_comments.len(),
        approvals: approvals.len(),
    });
    Some(RelevantNotification {
        repo: pr.repo.clone(),
        number: pr.number,
        title: pr.title.clone(),
        url: pr.url.clone(),
        is_my_pr,
        is_reviewer,
        is_new_pr: is_new_pr && is_reviewer,
        comments,
        review_comments,
        review_level_comments,
        approvals,
    })
}

fn submitted_after(review: &Review, window: &TimeWindow) -> bool {
    review.submitted_at.is_some_and(|at| at > window.cutoff)
}

fn relevant_comments(
    comments: &[Comment],
    label: &str,
    config: &RelevanceConfig,
    window: &TimeWindow,
    involved: bool,
    sink: &mut dyn EventSink,
) -> Vec<Comment> {
    let mut kept = Vec::new();
    for comment in comments {
        match comment_skip_reason(comment, config, window, involved) {
            Some(reason) => sink.emit(EngineEvent::CommentSkipped {
                pr: label.to_string(),
                author: comment.user.login.clone(),
                reason,
            }),
            None => kept.push(comment.clone()),
        }
    }
    kept
}

fn comment_skip_reason(
    comment: &Comment,
    config: &RelevanceConfig,
    window: &TimeWindow,
    involved: bool,
) -> Option<SkipReason> {
    // `since` on the comment endpoints matches edits too, so an old comment
    // edited inside the window comes back.
    if comment.created_at < window.cutoff {
        Some(SkipReason::BeforeCutoff)
    } else if config.bots.is_bot_user(&comment.user) {
        Some(SkipReason::Bot)
    } else if comment.user.login == config.username {
        Some(SkipReason::OwnActivity)
    } else if involved || comment.body.contains(&config.mention()) {
        None
    } else {
        Some(SkipReason::NotRelevant)
    }
}
