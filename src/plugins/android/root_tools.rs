//! Latest Magisk and KernelSU releases from GitHub.

use crate::commands::{CommandContext, CommandError};
use crate::config::timeouts;
use crate::http::github::Release;
use crate::telegram::OutgoingMessage;
use crate::telegram::html::escape;

/// A GitHub project publishing root solutions.
#[derive(Debug, Clone, Copy)]
pub struct RootTool {
    pub display_name: &'static str,
    pub repo: &'static str,
    /// Show the newest stable and pre-release instead of just the newest.
    pub show_both: bool,
}

pub const MAGISK: RootTool = RootTool {
    display_name: "Magisk",
    repo: "topjohnwu/Magisk",
    show_both: true,
};

pub const KERNELSU: RootTool = RootTool {
    display_name: "KernelSU",
    repo: "tiann/KernelSU",
    show_both: true,
};

pub const KERNELSU_NEXT: RootTool = RootTool {
    display_name: "KernelSU-Next",
    repo: "KernelSU-Next/KernelSU-Next",
    show_both: false,
};

fn release_line(label: &str, release: &Release) -> String {
    format!(
        "\n<b>{label}:</b> <a href='{}'>{}</a>\n└ <code>{}</code>",
        escape(&release.html_url),
        escape(&release.tag_name),
        release.published_day()
    )
}

/// Formats the release summary; `None` when nothing fits.
pub fn render_releases(tool: RootTool, releases: &[Release]) -> Option<String> {
    let mut lines = vec![format!("<b>📦 Latest {} Releases:</b>", tool.display_name)];

    if tool.show_both {
        let stable = releases.iter().find(|r| !r.prerelease);
        let pre = releases.iter().find(|r| r.prerelease);
        if stable.is_none() && pre.is_none() {
            return None;
        }
        lines.extend(stable.map(|r| release_line("Stable", r)));
        lines.extend(pre.map(|r| release_line("Pre-release", r)));
    } else {
        lines.push(release_line("Latest", releases.first()?));
    }
    Some(lines.join("\n"))
}

pub async fn latest_releases(ctx: &CommandContext, tool: RootTool) -> Result<(), CommandError> {
    let progress = ctx
        .reply(format!(
            "<code>Checking for latest {} releases...</code>",
            tool.display_name
        ))
        .await?;

    let text = match ctx.app.github.releases(tool.repo).await {
        Ok(releases) => render_releases(tool, &releases),
        Err(e) => {
            return ctx
                .edit_temp(
                    progress,
                    format!(
                        "<b>An error occurred:</b>\n<code>{}</code>",
                        escape(&e.to_string())
                    ),
                    timeouts::LARGE,
                )
                .await;
        }
    };

    match text {
        Some(text) => {
            ctx.edit_with(progress, OutgoingMessage::new(text).no_preview())
                .await
        }
        None => {
            ctx.edit_temp(
                progress,
                "<b>An error occurred:</b>\n<code>No releases found for this repository.</code>",
                timeouts::LARGE,
            )
            .await
        }
    }
}
