pub mod transport;
pub mod types;

pub use transport::{DryRunTransport, Transport, WebhookTransport};
pub use types::{Block, SlackMessage, MAX_BLOCKS};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::github::{Comment, Review, ReviewState};
use crate::pipeline::summary::{AwaitingReview, DailySummary, OwnPullRequest};
use crate::relevance::RelevantNotification;

/// Comment and review bodies are cut to this many characters.
pub const BODY_PREVIEW_CHARS: usize = 200;

/// Slack rejects section text over 3000 characters.
pub const MAX_TEXT_CHARS: usize = 2900;

#[derive(Debug, Error)]
pub enum SlackError {
    #[error("Slack webhook request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Failed to write payload file: {0}")]
    PayloadWrite(#[from] std::io::Error),

    #[error("Failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Render the live digest: one section per pull request with its approvals,
/// review-level comments, issue comments and code-review comments.
pub fn build_notification_message(
    notifications: &[RelevantNotification],
    username: &str,
) -> SlackMessage {
    let title = format!("🔔 PR Updates ({})", notifications.len());
    let mut blocks = vec![Block::header(title.clone()), Block::Divider];

    let chunks = notifications
        .iter()
        .map(|n| notification_blocks(n, username))
        .collect();
    push_limited(&mut blocks, chunks, "pull requests");

    SlackMessage {
        text: Some(title),
        blocks,
    }
}

fn notification_blocks(n: &RelevantNotification, username: &str) -> Vec<Block> {
    let mention = format!("@{}", username);
    let mut blocks = Vec::new();

    let mut tags = String::new();
    if n.is_my_pr {
        tags.push_str(" (Your PR)");
    }
    if n.is_new_pr {
        tags.push_str(" 🆕 New PR, review requested");
    } else if n.is_reviewer && !n.is_my_pr {
        tags.push_str(" (Review requested)");
    }
    blocks.push(Block::section(capped(format!(
        "*<{}|{}#{}>*{}\n{}",
        n.url,
        n.repo,
        n.number,
        tags,
        escape_text(&n.title)
    ))));

    for approval in &n.approvals {
        let quote = match approval.body_text().trim() {
            "" => String::new(),
            body => format!("\n>{}", preview(body)),
        };
        blocks.push(Block::section(capped(format!(
            "✅ *Approved* by {}{}{}",
            approval.user.login,
            quote,
            view_link(approval.html_url.as_deref(), "View approval")
        ))));
    }

    for review in &n.review_level_comments {
        blocks.push(Block::section(capped(review_line(review))));
    }

    for comment in &n.comments {
        blocks.push(Block::section(capped(comment_line(comment, &mention, ""))));
    }

    for comment in &n.review_comments {
        blocks.push(Block::section(capped(comment_line(
            comment,
            &mention,
            " (code review)",
        ))));
    }

    blocks.push(Block::Divider);
    blocks
}

fn review_line(review: &Review) -> String {
    let (emoji, verb) = match review.state {
        ReviewState::ChangesRequested => ("🔄", "requested changes"),
        _ => ("📝", "reviewed"),
    };
    format!(
        "{} *{}* {}: {}{}",
        emoji,
        review.user.login,
        verb,
        preview(review.body_text()),
        view_link(review.html_url.as_deref(), "View review")
    )
}

fn comment_line(comment: &Comment, mention: &str, suffix: &str) -> String {
    let marker = if comment.body.contains(mention) { "📢 " } else { "" };
    let icon = if suffix.is_empty() { "💬" } else { "💭" };
    format!(
        "{}{} *{}*{}: {}{}",
        marker,
        icon,
        comment.user.login,
        suffix,
        preview(&comment.body),
        view_link(comment.html_url.as_deref(), "View comment")
    )
}

fn view_link(url: Option<&str>, label: &str) -> String {
    match url {
        Some(url) => format!("\n<{}|{}>", url, label),
        None => String::new(),
    }
}

/// Render the daily summary of the user's open PRs and review queue.
pub fn build_summary_message(summary: &DailySummary, now: DateTime<Utc>) -> SlackMessage {
    let mut blocks = vec![
        Block::section("*:clipboard: Daily PR Summary*"),
        Block::Divider,
        Block::section(format!("*Your Open PRs ({})*", summary.my_prs.len())),
    ];

    if summary.my_prs.is_empty() {
        blocks.push(Block::section("_No open PRs_"));
    }
    let own: Vec<Vec<Block>> = summary
        .my_prs
        .iter()
        .map(|pr| vec![Block::section(capped(own_pr_line(pr, now)))])
        .collect();
    // Leave room for the second half of the summary.
    let budget = MAX_BLOCKS.saturating_sub(5);
    push_limited_to(&mut blocks, own, "open PRs", budget);

    blocks.push(Block::Divider);
    blocks.push(Block::section(format!(
        "*Awaiting Your Review ({})*",
        summary.awaiting_review.len()
    )));
    if summary.awaiting_review.is_empty() {
        blocks.push(Block::section("_No PRs awaiting your review_"));
    }
    let awaiting: Vec<Vec<Block>> = summary
        .awaiting_review
        .iter()
        .map(|pr| vec![Block::section(capped(awaiting_line(pr, now)))])
        .collect();
    push_limited_to(&mut blocks, awaiting, "PRs awaiting review", MAX_BLOCKS - 1);
    blocks.push(Block::Divider);

    SlackMessage {
        text: Some(format!(
            "Daily PR Summary: {} open, {} awaiting your review",
            summary.my_prs.len(),
            summary.awaiting_review.len()
        )),
        blocks,
    }
}

fn own_pr_line(pr: &OwnPullRequest, now: DateTime<Utc>) -> String {
    let comments = match pr.outstanding_comments {
        0 => String::new(),
        1 => ", 1 comment".to_string(),
        n => format!(", {} comments", n),
    };
    format!(
        "{} <{}|{}#{}> — {} ({}{}, {})",
        pr.status.emoji(),
        pr.url,
        escape_text(repo_short(&pr.repo)),
        pr.number,
        escape_text(&pr.title),
        pr.status.label(),
        comments,
        format_age(pr.created_at, now)
    )
}

fn awaiting_line(pr: &AwaitingReview, now: DateTime<Utc>) -> String {
    format!(
        ":eyes: <{}|{}#{}> — {} (by {}, {})",
        pr.url,
        escape_text(repo_short(&pr.repo)),
        pr.number,
        escape_text(&pr.title),
        escape_text(&pr.author),
        format_age(pr.created_at, now)
    )
}

/// Append chunks while the message stays under [`MAX_BLOCKS`], then note how
/// many were left out.
fn push_limited(blocks: &mut Vec<Block>, chunks: Vec<Vec<Block>>, noun: &str) {
    push_limited_to(blocks, chunks, noun, MAX_BLOCKS);
}

fn push_limited_to(blocks: &mut Vec<Block>, chunks: Vec<Vec<Block>>, noun: &str, limit: usize) {
    // One slot stays free for the overflow note.
    let room = limit.saturating_sub(1);
    let total = chunks.len();
    let mut shown = 0;
    for mut chunk in chunks {
        let free = room.saturating_sub(blocks.len());
        if chunk.len() > free {
            // An oversized first chunk is cut rather than dropped entirely.
            if shown == 0 && free > 0 {
                chunk.truncate(free);
                blocks.extend(chunk);
                shown += 1;
            }
            break;
        }
        blocks.extend(chunk);
        shown += 1;
    }
    if shown < total {
        blocks.push(Block::context(format!("_...and {} more {}_", total - shown, noun)));
    }
}

/// Escape text for mrkdwn: normalise newlines, escape `&`, `<` and `>`
/// except around `<http...>` links.
pub fn escape_text(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut out = String::with_capacity(text.len());
    let mut in_link = false;
    for (i, ch) in text.char_indices() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' if !in_link && text[i + 1..].starts_with("http") => {
                in_link = true;
                out.push(ch);
            }
            '<' => out.push_str("&lt;"),
            '>' if in_link => {
                in_link = false;
                out.push(ch);
            }
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Cut to `max` characters, appending `...` when anything was removed.
pub fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

fn preview(body: &str) -> String {
    escape_text(&truncate(body, BODY_PREVIEW_CHARS))
}

fn capped(text: String) -> String {
    match text.char_indices().nth(MAX_TEXT_CHARS) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text,
    }
}

/// "3h ago" under a day, "2d ago" beyond.
pub fn format_age(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let hours = (now - created_at).num_hours().max(0);
    if hours < 24 {
        format!("{}h ago", hours)
    } else {
        format!("{}d ago", hours / 24)
    }
}

fn repo_short(repo: &str) -> &str {
    repo.rsplit('/').next().unwrap_or(repo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relevance::tests::{at, comment, review};
    use crate::relevance::ReviewStatus;
    use chrono::Duration;

    fn notification() -> RelevantNotification {
        RelevantNotification {
            repo: "org/repo".to_string(),
            number: 42,
            title: "Add <feature> & docs".to_string(),
            url: "https://github.com/org/repo/pull/42".to_string(),
            is_my_pr: true,
            is_reviewer: false,
            is_new_pr: false,
            comments: vec![comment("carol", "ping @alice", at(1))],
            review_comments: vec![comment("bob", "nit", at(2))],
            review_level_comments: vec![review(
                3,
                "erin",
                ReviewState::ChangesRequested,
                "rename this",
                at(3),
            )],
            approvals: vec![review(9, "bob", ReviewState::Approved, "", at(4))],
        }
    }

    fn with_links(mut n: RelevantNotification) -> RelevantNotification {
        let pr = "https://github.com/org/repo/pull/42";
        n.comments[0].html_url = Some(format!("{}#issuecomment-1", pr));
        n.review_comments[0].html_url = Some(format!("{}#discussion_r2", pr));
        n.review_level_comments[0].html_url = Some(format!("{}#pullrequestreview-3", pr));
        n.approvals[0].html_url = Some(format!("{}#pullrequestreview-9", pr));
        n
    }

    fn texts(message: &SlackMessage) -> Vec<String> {
        message.blocks.iter().filter_map(Block::text).collect()
    }

    #[test]
    fn test_notification_message_layout() {
        let message = build_notification_message(&[notification()], "alice");
        let texts = texts(&message);
        assert_eq!(texts[0], "🔔 PR Updates (1)");
        assert!(texts[1].starts_with("*<https://github.com/org/repo/pull/42|org/repo#42>* (Your PR)"));
        assert!(texts[1].ends_with("\nAdd &lt;feature&gt; &amp; docs"));
        assert_eq!(texts[2], "✅ *Approved* by bob");
        assert_eq!(texts[3], "🔄 *erin* requested changes: rename this");
        assert_eq!(texts[4], "📢 💬 *carol*: ping @alice");
        assert_eq!(texts[5], "💭 *bob* (code review): nit");
        assert_eq!(message.blocks.last(), Some(&Block::Divider));
    }

    #[test]
    fn test_item_links() {
        let message = build_notification_message(&[with_links(notification())], "alice");
        let texts = texts(&message);
        let pr = "https://github.com/org/repo/pull/42";
        assert_eq!(
            texts[2],
            format!("✅ *Approved* by bob\n<{}#pullrequestreview-9|View approval>", pr)
        );
        assert_eq!(
            texts[3],
            format!(
                "🔄 *erin* requested changes: rename this\n<{}#pullrequestreview-3|View review>",
                pr
            )
        );
        assert_eq!(
            texts[4],
            format!("📢 💬 *carol*: ping @alice\n<{}#issuecomment-1|View comment>", pr)
        );
        assert_eq!(
            texts[5],
            format!("💭 *bob* (code review): nit\n<{}#discussion_r2|View comment>", pr)
        );
    }

    #[test]
    fn test_new_pr_tag() {
        let mut n = notification();
        n.is_my_pr = false;
        n.is_reviewer = true;
        n.is_new_pr = true;
        let message = build_notification_message(&[n], "alice");
        assert!(texts(&message)[1].contains("🆕 New PR, review requested"));
    }

    #[test]
    fn test_approval_body_is_quoted() {
        let mut n = notification();
        n.approvals[0].body = Some("great work".to_string());
        let message = build_notification_message(&[n], "alice");
        assert_eq!(texts(&message)[2], "✅ *Approved* by bob\n>great work");
    }

    #[test]
    fn test_message_never_exceeds_block_limit() {
        let many: Vec<RelevantNotification> = (0..40).map(|_| notification()).collect();
        let message = build_notification_message(&many, "alice");
        assert!(message.blocks.len() <= MAX_BLOCKS);
        match message.blocks.last() {
            Some(Block::Context { elements }) => {
                assert!(elements[0].as_str().contains("more pull requests"))
            }
            other => panic!("expected overflow note, got {:?}", other),
        }
    }

    #[test]
    fn test_oversized_single_notification_is_cut() {
        let mut n = notification();
        n.comments = (0..80).map(|i| comment("carol", &format!("c{}", i), at(i))).collect();
        let message = build_notification_message(&[n], "alice");
        // one slot is reserved for an overflow note
        assert_eq!(message.blocks.len(), MAX_BLOCKS - 1);
    }

    #[test]
    fn test_escape_text() {
        assert_eq!(escape_text("a & b"), "a &amp; b");
        assert_eq!(escape_text("x < y"), "x &lt; y");
        assert_eq!(escape_text("<https://x.io|link>"), "<https://x.io|link>");
        assert_eq!(escape_text("> quoted"), "&gt; quoted");
        assert_eq!(escape_text("see <https://x.io> -> ok"), "see <https://x.io> -&gt; ok");
        assert_eq!(escape_text("one\r\ntwo\rthree"), "one\ntwo\nthree");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 200), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("ééééé", 2), "éé...");
        let long = "x".repeat(250);
        assert_eq!(preview(&long).chars().count(), 203);
    }

    #[test]
    fn test_capped_text_length() {
        let text = capped("y".repeat(5000));
        assert_eq!(text.chars().count(), MAX_TEXT_CHARS);
    }

    #[test]
    fn test_format_age() {
        let now = at(0);
        assert_eq!(format_age(now - Duration::minutes(30), now), "0h ago");
        assert_eq!(format_age(now - Duration::hours(5), now), "5h ago");
        assert_eq!(format_age(now - Duration::hours(50), now), "2d ago");
        assert_eq!(format_age(now + Duration::hours(1), now), "0h ago");
    }

    #[test]
    fn test_summary_message() {
        let now = at(0);
        let summary = DailySummary {
            my_prs: vec![OwnPullRequest {
                repo: "org/api".to_string(),
                number: 5,
                title: "Speed up".to_string(),
                url: "https://github.com/org/api/pull/5".to_string(),
                created_at: now - Duration::hours(3),
                status: ReviewStatus::ChangesRequested,
                outstanding_comments: 2,
            }],
            awaiting_review: vec![],
        };
        let message = build_summary_message(&summary, now);
        let texts = texts(&message);
        assert_eq!(texts[0], "*:clipboard: Daily PR Summary*");
        assert_eq!(texts[1], "*Your Open PRs (1)*");
        assert_eq!(
            texts[2],
            "🔄 <https://github.com/org/api/pull/5|api#5> — Speed up (changes requested, 2 comments, 3h ago)"
        );
        assert_eq!(texts[3], "*Awaiting Your Review (0)*");
        assert_eq!(texts[4], "_No PRs awaiting your review_");
    }

    #[test]
    fn test_summary_awaiting_line() {
        let now = at(0);
        let summary = DailySummary {
            my_prs: vec![],
            awaiting_review: vec![AwaitingReview {
                repo: "org/web".to_string(),
                number: 8,
                title: "Dark mode".to_string(),
                url: "https://github.com/org/web/pull/8".to_string(),
                author: "dave".to_string(),
                created_at: now - Duration::days(3),
            }],
        };
        let texts = texts(&build_summary_message(&summary, now));
        assert_eq!(texts[2], "_No open PRs_");
        assert_eq!(
            texts[4],
            ":eyes: <https://github.com/org/web/pull/8|web#8> — Dark mode (by dave, 3d ago)"
        );
    }
}
