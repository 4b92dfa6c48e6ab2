use std::collections::HashSet;

use super::actor::BotClassifier;
use crate::github::{Review, ReviewState};

/// Pull-request level review status, folded from individual reviews.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewStatus {
    ChangesRequested,
    Approved,
    Reviewed,
    Waiting,
}

impl ReviewStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ReviewStatus::ChangesRequested => "changes requested",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Reviewed => "reviewed, awaiting approval",
            ReviewStatus::Waiting => "waiting for review",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            ReviewStatus::ChangesRequested => "🔄",
            ReviewStatus::Approved => "✅",
            ReviewStatus::Reviewed => "💬",
            ReviewStatus::Waiting => "⏳",
        }
    }
}

impl std::fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Fold reviews into one status. Only each human reviewer's most recent
/// review counts; an outstanding change request outranks any approval.
pub fn fold_review_states(reviews: &[Review], bots: &BotClassifier) -> ReviewStatus {
    let mut sorted: Vec<&Review> = reviews
        .iter()
        .filter(|r| !bots.is_bot_user(&r.user))
        .collect();
    // Newest first. Unsubmitted reviews (None) sort last.
    sorted.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));

    let mut seen = HashSet::new();
    let latest: Vec<ReviewState> = sorted
        .into_iter()
        .filter(|r| seen.insert(r.user.login.as_str()))
        .map(|r| r.state)
        .collect();

    if latest.contains(&ReviewState::ChangesRequested) {
        ReviewStatus::ChangesRequested
    } else if latest.contains(&ReviewState::Approved) {
        ReviewStatus::Approved
    } else if !latest.is_empty() {
        ReviewStatus::Reviewed
    } else {
        ReviewStatus::Waiting
    }
}
