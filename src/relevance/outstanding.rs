use chrono::{DateTime, Utc};

use super::actor::BotClassifier;
use crate::github::Comment;

/// Count human comments posted after the author's most recent comment.
pub fn count_outstanding(comments: &[Comment], author: &str, bots: &BotClassifier) -> usize {
    let humans: Vec<&Comment> = comments
        .iter()
        .filter(|c| !bots.is_bot_user(&c.user))
        .collect();

    let last_reply = humans
        .iter()
        .filter(|c| c.user.login == author)
        .map(|c| c.created_at)
        .max()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

    humans
        .iter()
        .filter(|c| c.user.login != author && c.created_at > last_reply)
        .count()
}
