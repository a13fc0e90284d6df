//! Selection-based federation ban.
//!
//! The operator picks which connected feds to ban in, the ban command is
//! sent to each chosen fed chat in turn and the fed bot's acknowledgement
//! decides success.

use std::time::Duration;

use lazy_regex::regex_is_match;
use tracing::{info, warn};

use crate::commands::{CommandContext, CommandError, Target};
use crate::config::timeouts;
use crate::storage::{FED_COLLECTION, FedRecord};
use crate::telegram::html::escape;
use crate::telegram::types::{ChatKind, message_link};
use crate::telegram::{
    ChatInfo, IncomingMessage, ListenError, MessageId, OutgoingMessage, UserId,
};

const CHOICE_TIMEOUT: Duration = Duration::from_secs(90);
const FED_BOT_TIMEOUT: Duration = Duration::from_secs(8);
const SUMMARY_TIMEOUT: Duration = Duration::from_secs(8);
const UPDATE_REASON_PROMPT: &str = "Would you like to update this reason";

/// Parses the operator's fed choice into sorted zero-based indices.
///
/// Accepts a single number, a range `a-b` or a comma list, all 1-based and
/// within `1..=total`. Spaces are ignored.
pub fn parse_selection(text: &str, total: usize) -> Option<Vec<usize>> {
    let text: String = text.chars().filter(|c| *c != ' ').collect();
    let number = |part: &str| -> Option<usize> {
        if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        part.parse().ok().filter(|n| (1..=total).contains(n))
    };

    if let Some((start, end)) = text.split_once('-') {
        let (start, end) = (number(start)?, number(end)?);
        if start > end {
            return None;
        }
        return Some((start - 1..end).collect());
    }

    if text.contains(',') {
        let mut picked = text
            .split(',')
            .map(|part| number(part).map(|n| n - 1))
            .collect::<Option<Vec<_>>>()?;
        picked.sort_unstable();
        picked.dedup();
        return Some(picked);
    }

    number(&text).map(|n| vec![n - 1])
}

/// Returns true for fed bot messages acknowledging a ban.
pub fn is_fban_response(text: &str) -> bool {
    regex_is_match!(
        r"(?i)(New FedBan|starting a federation ban|start a federation ban|FedBan Reason update|FedBan reason updated|Would you like to update this reason)",
        text
    )
}

/// `cfban` and `cfbanp`.
pub async fn fed_ban(ctx: &CommandContext, with_proof: bool) -> Result<(), CommandError> {
    let progress = ctx.reply("❯").await?;

    let (target, reason) = match ctx.extract_user_and_reason().await {
        Ok(found) => found,
        Err(CommandError::Usage { message, .. }) => return ctx.edit(progress, message).await,
        Err(e) => return Err(e),
    };

    if ctx.app.is_privileged(target.id) {
        return ctx.edit(progress, "Cannot Fban Owner/Sudo users.").await;
    }

    let mut reason = if reason.is_empty() {
        "Not specified".to_owned()
    } else {
        escape(&reason)
    };

    if with_proof {
        let Some(replied) = &ctx.replied else {
            return ctx
                .edit(progress, "Reply to a message to use it as proof.")
                .await;
        };
        let Some(log_channel) = ctx.settings().fban_log_channel else {
            return ctx
                .edit(progress, "FBAN_LOG_CHANNEL is not configured.")
                .await;
        };
        let forwarded = ctx
            .api()
            .forward_messages(log_channel, replied.chat.id, &[replied.id])
            .await?;
        if let Some(proof) = forwarded.first() {
            let channel = ChatInfo {
                id: log_channel,
                kind: ChatKind::Channel,
                ..ChatInfo::default()
            };
            reason.push('\n');
            reason.push_str(&message_link(&channel, *proof));
        }
    }

    let feds = ctx
        .app
        .store
        .collection::<FedRecord>(FED_COLLECTION)
        .find()?;
    if feds.is_empty() {
        return ctx
            .edit(progress, "You don't have any Feds Connected.")
            .await;
    }

    let mut listing = String::from("<b>List Of Connected Feds:</b>\n");
    for (i, fed) in feds.iter().enumerate() {
        listing.push_str(&format!("{}. {}\n", i + 1, escape(&fed.name)));
    }
    listing.push_str(
        "\nReply with number, range (e.g. 1-5), or list (e.g. 1,3,5).\nType <code>cancel</code> to abort.",
    );
    ctx.edit(progress, listing).await?;

    let Some(choice) = await_choice(ctx, progress).await? else {
        return Ok(());
    };

    if let Err(e) = ctx.api().delete_messages(ctx.chat_id(), &[choice.id]).await {
        warn!("Could not delete fed choice message: {}", e);
    }

    if choice.text.trim().eq_ignore_ascii_case("cancel") {
        return ctx
            .edit_temp(progress, "<code>Cancelled.</code>", timeouts::SMALL)
            .await;
    }

    let Some(selected) = parse_selection(&choice.text, feds.len()) else {
        return ctx
            .edit_temp(progress, "Invalid selection format.", timeouts::SMALL)
            .await;
    };
    let selected: Vec<&FedRecord> = selected.into_iter().map(|i| &feds[i]).collect();

    ctx.edit(progress, "❯❯").await?;

    let failed = ban_in_feds(ctx, target.id, &reason, &selected).await;
    info!(
        "Fbanned {} in {}/{} chosen feds",
        target.id,
        selected.len() - failed.len(),
        selected.len()
    );

    let summary = summary_text(ctx, &target, &reason, selected.len(), failed.len());

    if let Some(log_channel) = ctx.settings().fban_log_channel {
        let mut log = summary.clone();
        if !failed.is_empty() {
            log.push_str("\n• ");
            log.push_str(&failed.join("\n• "));
        }
        if !ctx.issued_by_owner() {
            if let Some(sender) = &ctx.message.sender {
                log.push_str(&format!("\n\n<b>By</b>: {}", escape(&sender.full_name())));
            }
        }
        if let Err(e) = ctx
            .api()
            .send_message(log_channel, OutgoingMessage::new(log).no_preview())
            .await
        {
            warn!("Could not send fban log: {}", e);
        }
    }

    ctx.edit_with(progress, OutgoingMessage::new(summary).no_preview())
        .await?;
    ctx.delete_later(progress, SUMMARY_TIMEOUT);
    Ok(())
}

/// Waits for the operator's fed choice; `None` after reporting a timeout.
async fn await_choice(
    ctx: &CommandContext,
    progress: MessageId,
) -> Result<Option<IncomingMessage>, CommandError> {
    let sender = ctx.message.sender_id();
    let outgoing = ctx.message.outgoing;
    let result = ctx
        .app
        .listeners
        .wait_for(
            ctx.chat_id(),
            move |m| m.id != progress && (m.sender_id() == sender || (outgoing && m.outgoing)),
            CHOICE_TIMEOUT,
        )
        .await;

    match result {
        Ok(choice) => Ok(Some(choice)),
        Err(ListenError::Timeout(_)) => {
            ctx.edit_temp(progress, "Timeout. No choice was made.", timeouts::SMALL)
                .await?;
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Sends the ban to every fed in order; returns names of feds that failed.
async fn ban_in_feds(
    ctx: &CommandContext,
    user: UserId,
    reason: &str,
    feds: &[&FedRecord],
) -> Vec<String> {
    let command = format!("/fban <a href='tg://user?id={user}'>{user}</a> {reason}");
    let mut failed = Vec::new();

    for fed in feds {
        ctx.app.fanout.wait_and_acquire().await;
        match ban_in_fed(ctx, fed, &command).await {
            Ok(true) => {}
            Ok(false) => failed.push(fed.name.clone()),
            Err(e) => {
                warn!(
                    "An error occurred while fbanning in chosen fed {} [{}]: {}",
                    fed.name, fed.chat_id, e
                );
                failed.push(fed.name.clone());
            }
        }
    }
    failed
}

async fn ban_in_fed(
    ctx: &CommandContext,
    fed: &FedRecord,
    command: &str,
) -> Result<bool, CommandError> {
    let bots = ctx.settings().fed_bots.clone();
    let subscription = ctx
        .app
        .listeners
        .listen(fed.chat_id, move |m| {
            m.sender_id().is_some_and(|id| bots.contains(&id)) && is_fban_response(&m.text)
        })
        .await;

    ctx.api()
        .send_message(fed.chat_id, OutgoingMessage::new(command).no_preview())
        .await?;

    let response = match subscription.recv(FED_BOT_TIMEOUT).await {
        Ok(response) => response,
        Err(ListenError::Timeout(_)) => return Ok(false),
        Err(e) => return Err(e.into()),
    };

    if response.text.contains(UPDATE_REASON_PROMPT) {
        if let Some(index) = response.button_index("Update reason") {
            ctx.api()
                .click_button(fed.chat_id, response.id, index)
                .await?;
        }
    }
    Ok(true)
}

fn summary_text(
    ctx: &CommandContext,
    target: &Target,
    reason: &str,
    total: usize,
    failed: usize,
) -> String {
    let status = if failed > 0 {
        format!("<b>Failed in:</b> {failed}/{total} chosen feds.")
    } else {
        format!("<b>Status:</b> Fbanned in <b>{total}</b> chosen fed(s).")
    };
    format!(
        "❯❯❯ <b>Fbanned</b> {}\n<b>ID:</b> <code>{}</code>\n<b>Reason:</b> {}\n<b>Initiated in:</b> {}\n{}",
        target.mention(),
        target.id,
        reason,
        escape(ctx.message.chat.display_title()),
        status
    )
}
