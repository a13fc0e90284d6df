//! Extras repository status and self-update.
//!
//! The marker file records the upstream `pushed_at` the local checkout was
//! last synced to; comparing it with GitHub tells whether an update exists.

use std::path::Path;
use std::process::Output;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tracing::{info, warn};

use crate::commands::{AppState, CommandContext, CommandError};
use crate::config::timeouts;
use crate::http::github::Commit;
use crate::storage::{LocalVersion, UpdateMarker, format_marker_date};
use crate::telegram::OutgoingMessage;
use crate::telegram::html::escape;

const PLAIN_UB_URL: &str = "https://github.com/thedragonsinn/plain-ub";
const MARKER_INIT_DELAY: Duration = Duration::from_secs(15);
const GIT_TIMEOUT: Duration = timeouts::MEDIUM;
const CHANGELOG_LIMIT: usize = 10;

/// Local marker compared with the upstream push date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    UpToDate,
    Unknown(LocalVersion),
    Available,
}

impl UpdateStatus {
    #[must_use]
    pub fn of(local: &LocalVersion, remote: &str) -> Self {
        if local.matches(remote) {
            Self::UpToDate
        } else if local.is_known() {
            Self::Available
        } else {
            Self::Unknown(local.clone())
        }
    }

    /// One-line form used by `modrepo`.
    #[must_use]
    pub fn short(&self) -> String {
        match self {
            Self::UpToDate => "✅ Up to date".to_owned(),
            Self::Unknown(local) => format!("❓ Unknown ({local})"),
            Self::Available => "⚠️ Update available!".to_owned(),
        }
    }
}

fn marker(app: &AppState) -> UpdateMarker {
    UpdateMarker::new(app.settings.update_marker_path())
}

fn repo_name(repo: &str) -> &str {
    repo.rsplit('/').next().unwrap_or(repo)
}

async fn remote_push_date(app: &AppState) -> Result<String, CommandError> {
    let info = app.github.repo(&app.settings.extras_repo).await?;
    Ok(format_marker_date(&info.pushed_at))
}

/// Creates the marker from the upstream push date when it is missing.
///
/// Runs once, shortly after startup.
pub async fn init_marker(app: Arc<AppState>) {
    tokio::time::sleep(MARKER_INIT_DELAY).await;
    let marker = marker(&app);
    if marker.exists() {
        return;
    }

    info!("{} not found, creating it", marker.path().display());
    match remote_push_date(&app).await {
        Ok(date) => match marker.write(&date) {
            Ok(()) => info!("Update marker created with date {}", date),
            Err(e) => warn!("Could not write update marker: {}", e),
        },
        Err(e) => warn!("Could not fetch upstream push date: {}", e),
    }
}

async fn refresh_marker(app: Arc<AppState>) {
    match remote_push_date(&app).await {
        Ok(date) => {
            if let Err(e) = marker(&app).write(&date) {
                warn!("Could not write update marker: {}", e);
            }
        }
        Err(e) => warn!("Could not refresh update marker: {}", e),
    }
}

pub async fn check_update(ctx: &CommandContext) -> Result<(), CommandError> {
    let progress = ctx.reply("<code>Checking for updates...</code>").await?;
    let remote = match remote_push_date(&ctx.app).await {
        Ok(remote) => remote,
        Err(e) => return ctx.edit_error(progress, e).await,
    };
    let local = marker(&ctx.app).read();

    let status = match UpdateStatus::of(&local, &remote) {
        UpdateStatus::UpToDate => "✅ <b>You are up to date!</b>".to_owned(),
        UpdateStatus::Unknown(local) => format!(
            "❓ <b>Could not determine local version.</b>\nReason: <code>{local}</code>"
        ),
        UpdateStatus::Available => format!(
            "⚠️ <b>A new update is available!</b>\nUse <code>{}extupdate</code> command to update {}",
            escape(&ctx.settings().command_prefix),
            escape(repo_name(&ctx.settings().extras_repo))
        ),
    };

    ctx.edit(
        progress,
        format!(
            "{status}\n\n<b>Latest Version:</b>\n<code>{remote}</code>\n\n<b>Your Version:</b>\n<code>{}</code>",
            escape(&local.to_string())
        ),
    )
    .await
}

pub async fn mod_repo(ctx: &CommandContext) -> Result<(), CommandError> {
    let progress = ctx
        .reply("<code>Fetching repository information and checking update...</code>")
        .await?;
    let repo = &ctx.settings().extras_repo;
    let info = match ctx.app.github.repo(repo).await {
        Ok(info) => info,
        Err(e) => return ctx.edit_error(progress, e.into()).await,
    };
    let remote = format_marker_date(&info.pushed_at);
    let local = marker(&ctx.app).read();
    let status = UpdateStatus::of(&local, &remote);

    let text = format!(
        "<a href='{}'><b>{}</b></a>, additional modules and features designed for use with <a href='{PLAIN_UB_URL}'>Plain-UB</a>.\n\n \
         › Stars : <code>{}</code>\n \
         › Forks : <code>{}</code>\n \
         › Open Issues : <code>{}</code>\n \
         › Last Commit : <code>{remote}</code>\n \
         › Your Version : <code>{}</code>\n\n \
         › Status : <code>{}</code>",
        escape(&info.html_url),
        escape(repo_name(repo)),
        info.stargazers_count,
        info.forks_count,
        info.open_issues_count,
        escape(&local.to_string()),
        status.short()
    );
    ctx.edit_with(progress, OutgoingMessage::new(text).no_preview())
        .await
}

fn combined_output(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).trim().to_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(stderr.trim());
    }
    text
}

/// Runs `git` in `dir`, returning its combined output.
async fn git(dir: &Path, args: &[&str]) -> Result<String, CommandError> {
    let run = Command::new("git")
        .args(args)
        .current_dir(dir)
        .kill_on_drop(true)
        .output();
    match tokio::time::timeout(GIT_TIMEOUT, run).await {
        Ok(output) => Ok(combined_output(&output?)),
        Err(_) => Err(CommandError::usage_for(
            format!("<code>git {}</code> timed out.", args.join(" ")),
            timeouts::LONG,
        )),
    }
}

pub async fn ext_update(ctx: &CommandContext) -> Result<(), CommandError> {
    let output = git(&ctx.settings().modules_dir, &["pull"]).await?;
    report_pull(ctx, &output).await
}

/// Replies with the pull output and requests a restart if anything changed.
///
/// The restart ends the process, so the marker refresh completes first.
async fn report_pull(ctx: &CommandContext, output: &str) -> Result<(), CommandError> {
    let ((), reply) = tokio::join!(
        refresh_marker(Arc::clone(&ctx.app)),
        ctx.reply(format!("<pre language=shell>{}</pre>", escape(output)))
    );
    reply?;

    if output.trim() != "Already up to date." {
        info!("Extras updated, requesting restart");
        ctx.app.restart.notify_one();
    }
    Ok(())
}

/// HTML changelog of up to ten commits, newest first.
pub fn render_changelog(commits: &[Commit]) -> String {
    if commits.is_empty() {
        return "Could not retrieve new commits or comparison failed.".to_owned();
    }
    let shown = &commits[..commits.len().min(CHANGELOG_LIMIT)];
    let mut text: String = shown
        .iter()
        .rev()
        .map(|c| {
            format!(
                "  - <code>[{}]</code>: {} - <i>by {}</i>\n",
                c.short_sha(),
                escape(c.title()),
                escape(&c.commit.author.name)
            )
        })
        .collect();
    if commits.len() > CHANGELOG_LIMIT {
        text.push_str(&format!(
            "\n<i>...and {} more commits.</i>",
            commits.len() - CHANGELOG_LIMIT
        ));
    }
    text
}

pub async fn mod_grade(ctx: &CommandContext) -> Result<(), CommandError> {
    let progress = ctx.reply("<code>Checking for updates...</code>").await?;
    let settings = ctx.settings();

    let local = match git(&settings.modules_dir, &["rev-parse", "HEAD"]).await {
        Ok(hash) if hash.len() >= 7 && hash.chars().all(|c| c.is_ascii_hexdigit()) => hash,
        Ok(_) => {
            return ctx
                .edit(
                    progress,
                    "<code>ERROR: This script is not running in a Git repository.</code>",
                )
                .await;
        }
        Err(e) => return ctx.edit_error(progress, e).await,
    };

    let remote = match ctx
        .app
        .github
        .branch_head(&settings.extras_repo, &settings.extras_branch)
        .await
    {
        Ok(commit) => commit,
        Err(e) => {
            warn!("Could not fetch upstream head: {}", e);
            return ctx
                .edit(
                    progress,
                    "<code>Could not fetch update info from GitHub. Please try again later.</code>",
                )
                .await;
        }
    };

    let local_short = &local[..7];
    if remote.sha == local {
        return ctx
            .edit(
                progress,
                format!(
                    "<b>✅ Your bot is up-to-date!</b>\n\n<b>Installed Version:</b>\n  - <code>{local_short}</code>"
                ),
            )
            .await;
    }

    let changelog = match ctx
        .app
        .github
        .compare(&settings.extras_repo, &local, &remote.sha)
        .await
    {
        Ok(comparison) => render_changelog(&comparison.commits),
        Err(e) => {
            warn!("Could not fetch changelog: {}", e);
            "Failed to fetch the changelog.".to_owned()
        }
    };

    ctx.edit_with(
        progress,
        OutgoingMessage::new(format!(
            "<b>⚠️ A new update is available!</b>\n\n<b>Your Version (Local):</b>\n  - <code>{local_short}</code>\n\n\
             <b>Latest Version (Remote):</b>\n  - <code>{}</code>\n\n<b>Changelog:</b>\n{changelog}\n\n\
             To update, please use <code>{}extupdate</code>.",
            remote.short_sha(),
            escape(&settings.command_prefix)
        ))
        .no_preview(),
    )
    .await
}
