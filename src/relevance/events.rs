use tracing::debug;

/// Why the engine dropped a review or comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Bot,
    OwnActivity,
    AlreadyNotified,
    BeforeCutoff,
    EmptyBody,
    NotRelevant,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            SkipReason::Bot => "bot",
            SkipReason::OwnActivity => "own activity",
            SkipReason::AlreadyNotified => "already notified",
            SkipReason::BeforeCutoff => "before cutoff",
            SkipReason::EmptyBody => "empty body",
            SkipReason::NotRelevant => "not relevant",
        };
        f.write_str(text)
    }
}

/// Decisions the relevance engine reports while evaluating candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Evaluated {
        pr: String,
        is_my_pr: bool,
        is_reviewer: bool,
        is_new_pr: bool,
    },
    ReviewSkipped {
        pr: String,
        review_id: u64,
        reason: SkipReason,
    },
    CommentSkipped {
        pr: String,
        author: String,
        reason: SkipReason,
    },
    Included {
        pr: String,
        comments: usize,
        review_comments: usize,
        review_level_comments: usize,
        approvals: usize,
    },
    Excluded {
        pr: String,
    },
}

/// Receives engine decisions. Keeps logging out of the filtering code.
pub trait EventSink {
    fn emit(&mut self, event: EngineEvent);
}

/// Forwards engine decisions to `tracing` at debug level.
#[derive(Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Evaluated {
                pr,
                is_my_pr,
                is_reviewer,
                is_new_pr,
            } => debug!(%pr, is_my_pr, is_reviewer, is_new_pr, "evaluating pull request"),
            EngineEvent::ReviewSkipped {
                pr,
                review_id,
                reason,
            } => debug!(%pr, review_id, %reason, "skipping review"),
            EngineEvent::CommentSkipped { pr, author, reason } => {
                debug!(%pr, %author, %reason, "skipping comment")
            }
            EngineEvent::Included {
                pr,
                comments,
                review_comments,
                review_level_comments,
                approvals,
            } => debug!(
                %pr,
                comments,
                review_comments,
                review_level_comments,
                approvals,
                "pull request has relevant activity"
            ),
            EngineEvent::Excluded { pr } => debug!(%pr, "no relevant activity"),
        }
    }
}

impl EventSink for Vec<EngineEvent> {
    fn emit(&mut self, event: EngineEvent) {
        self.push(event);
    }
}
