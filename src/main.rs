mod config;
mod github;
mod ledger;
mod pipeline;
mod relevance;
mod slack;

use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, info_span};
use tracing_subscriber::EnvFilter;

use crate::github::GitHubClient;
use crate::ledger::LedgerStore;
use crate::relevance::{BotClassifier, RelevanceConfig, TimeWindow};
use crate::slack::{DryRunTransport, Transport, WebhookTransport};

/// PR Notifier: polls GitHub for pull request activity relevant to one user
/// and posts a digest to a Slack webhook.
#[derive(Parser, Debug)]
#[command(name = "pr-notifier", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file (defaults to .pr-notifier.toml in the current directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print and save the Slack payload instead of posting it; uses the longer lookback
    #[arg(long, global = true)]
    dry_run: bool,

    /// Ledger file used to avoid announcing the same review twice
    #[arg(long, global = true)]
    state_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Announce new comments, reviews and approvals since the last poll
    Notify,
    /// Post a summary of your open PRs and the PRs awaiting your review
    Summary,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    info!("loading configuration");
    let mut config = config::Config::load(cli.config.as_deref())?;
    if cli.dry_run {
        config.dry_run = true;
    }
    if let Some(state_file) = cli.state_file {
        config.notify.state_file = state_file;
    }
    let credentials = config.credentials()?;

    let source = GitHubClient::new(&config.github.api_url, &credentials.token);
    let transport: Box<dyn Transport> = match credentials.webhook_url.filter(|_| !config.dry_run) {
        Some(url) => Box::new(WebhookTransport::new(url)),
        None => {
            let dry_run = DryRunTransport::new(config.payload_path());
            info!(path = %dry_run.payload_path().display(), "dry run, payload will not be posted");
            Box::new(dry_run)
        }
    };
    let relevance = RelevanceConfig::new(
        credentials.username,
        BotClassifier::new(&config.notify.bot_fragments),
    );
    let now = Utc::now();

    match cli.command {
        Command::Notify => {
            let _span = info_span!("notify", user = %relevance.username).entered();
            let window = TimeWindow::lookback(now, config.lookback_minutes());
            info!(since = %window.cutoff, "checking for pull request activity");

            let store = LedgerStore::new(&config.notify.state_file);
            info!(ledger = %store.path().display(), "using ledger");
            let report = pipeline::run_notifications(
                &source,
                transport.as_ref(),
                &store,
                &relevance,
                window,
                !config.dry_run,
            )
            .await?;
            info!(
                candidates = report.candidates,
                skipped = report.skipped,
                notified = report.notified,
                recorded = report.recorded,
                pruned = report.pruned,
                "done"
            );
        }
        Command::Summary => {
            let _span = info_span!("summary", user = %relevance.username).entered();
            let summary =
                pipeline::summary::run_summary(&source, transport.as_ref(), &relevance, now).await?;
            info!(
                open = summary.my_prs.len(),
                awaiting_review = summary.awaiting_review.len(),
                "daily summary sent"
            );
        }
    }

    Ok(())
}
