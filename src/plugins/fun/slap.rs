use rand::seq::SliceRandom;

use crate::commands::{CommandContext, CommandError};
use crate::telegram::OutgoingMessage;
use crate::telegram::html::escape;

const SLAP_TEXTS: [&str; 30] = [
    "{slapper} installs SLAP v2.0 and executes it on {slappee} with maximum efficiency 💥",
    "{slapper} slaps {slappee} so hard, their Wi-Fi disconnects.",
    "{slapper} uploads a 500GB slap.zip directly to {slappee}'s face.",
    "{slapper} pings {slappee} with /slap, latency: 0ms, damage: 9999.",
    "{slapper} slaps {slappee} using pure JavaScript. No framework, no mercy.",
    "{slapper} throws {slappee} into /dev/null and calls it a day.",
    "{slapper} smacks {slappee} with a keyboard screaming '404: Respect not found!'",
    "{slapper} launches a tactical slap drone targeting {slappee}... hit confirmed 🎯",
    "{slapper} slaps {slappee} so hard, even Clippy asks if they need help.",
    "{slapper} imports 'slap' from chaos.py and executes it flawlessly on {slappee}.",
    "{slapper} slaps {slappee} with a freshly baked baguette of justice 🥖",
    "{slapper} performs a full system reboot on {slappee} via open-palm protocol.",
    "{slapper} activates turbo slap mode. {slappee} can’t alt+F4 fast enough.",
    "{slapper} slaps {slappee} so hard their cookies get deleted 🍪",
    "{slapper} uses slap.exe. Critical hit! {slappee} is now experiencing lag IRL.",
    "{slapper} sends {slappee} a slap.mp4 in 4K, 60FPS, Dolby Surround.",
    "{slapper} throws {slappee} into the recycle bin and empties it 💀",
    "{slapper} slaps {slappee} with the power of a corrupted Windows update.",
    "{slapper} just ran 'sudo slap {slappee}' and got admin privileges.",
    "{slapper} activates anime mode. <i>\"Nani?!\"</i> {slappee} gets slapped across 3 dimensions.",
    "{slapper} connects to {slappee}’s Bluetooth just to send a virtual slap.",
    "{slapper} slaps {slappee} so hard their antivirus flags it as a trojan.",
    "{slapper} spawns a Minecraft piston and smacks {slappee} into the void.",
    "{slapper} downloads extra RAM just to slap {slappee} faster.",
    "{slapper} slaps {slappee} so hard their Google search history gets wiped.",
    "{slapper} summons a BSOD just to slap {slappee} with the sound of despair.",
    "{slapper} slaps {slappee} using only binary code: 01010011 01001100 01000001 01010000!",
    "{slapper} hacks into the matrix and inserts one legendary slap on {slappee}.",
    "{slapper} launches an orbital slap strike. {slappee} is now a crater.",
    "{slapper} slaps {slappee} so hard their phone autocorrects pain to '{slapper}'.",
];

/// Fills a template with already rendered mentions.
pub fn render(template: &str, slapper: &str, slappee: &str) -> String {
    template
        .replace("{slapper}", slapper)
        .replace("{slappee}", slappee)
}

fn random_template() -> &'static str {
    SLAP_TEXTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(SLAP_TEXTS[0])
}

pub async fn slap(ctx: &CommandContext) -> Result<(), CommandError> {
    let slapper = ctx
        .message
        .sender
        .as_ref()
        .map_or_else(|| "Someone".to_owned(), |u| u.mention());

    let replied_sender = ctx.replied.as_ref().and_then(|m| m.sender.as_ref());
    let slappee = if let Some(user) = replied_sender {
        user.mention()
    } else if ctx.input.is_empty() {
        slapper.clone()
    } else {
        match ctx.api().resolve_user(&ctx.input).await {
            Ok(Some(user)) => user.mention(),
            _ => escape(&ctx.input),
        }
    };

    let text = render(random_template(), &slapper, &slappee);
    let reply_to = ctx.replied.as_ref().map(|m| m.id);
    ctx.api()
        .send_message(ctx.chat_id(), OutgoingMessage::new(text).reply_to_opt(reply_to))
        .await?;
    ctx.delete_command().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::commands::BotCommand;
    use crate::commands::testing::{context, test_app};
    use crate::telegram::UserInfo;
    use crate::telegram::mock::{MockApi, incoming};

    #[test]
    fn test_every_template_names_both_sides() {
        for template in SLAP_TEXTS {
            assert!(template.contains("{slapper}") && template.contains("{slappee}"));
        }
        assert_eq!(render("{slapper} hits {slappee}", "A", "B"), "A hits B");
    }

    #[tokio::test]
    async fn test_slap_free_text_target() {
        let api = Arc::new(MockApi::new());
        let (app, _dir) = test_app(api.clone());
        let ctx = context(&app, BotCommand::Slap, incoming(-5, 4, ".slap <everyone>"), "<everyone>", None);
        slap(&ctx).await.unwrap();

        assert!(api.last_text().contains("&lt;everyone&gt;"));
        assert_eq!(api.recorded.lock().unwrap().deleted, vec![(-5, 4)]);
    }

    #[tokio::test]
    async fn test_slap_replies_to_target() {
        let api = Arc::new(MockApi::new());
        let (app, _dir) = test_app(api.clone());
        let mut replied = incoming(-5, 3, "hey");
        replied.sender = Some(UserInfo::new(77, "Victim"));
        let ctx = context(&app, BotCommand::Slap, incoming(-5, 4, ".slap"), "", Some(replied));
        slap(&ctx).await.unwrap();

        let recorded = api.recorded.lock().unwrap();
        let (_, _, message) = &recorded.sent[0];
        assert_eq!(message.reply_to, Some(3));
        assert!(message.html.contains("tg://user?id=77"));
    }
}
