use rand::seq::SliceRandom;

use crate::commands::{CommandContext, CommandError};

const RESPONSES: [&str; 10] = [
    "Yes, definitely.",
    "No, absolutely not.",
    "Maybe, think about it.",
    "The answer is unclear, try again.",
    "Go for it!",
    "I wouldn't recommend it.",
    "Signs point to yes.",
    "Don't count on it.",
    "Without a doubt.",
    "My sources say no.",
];

fn pick() -> &'static str {
    RESPONSES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(RESPONSES[0])
}

pub async fn decide(ctx: &CommandContext) -> Result<(), CommandError> {
    let text = format!("🤔 <b>My decision is:</b>\n\n» <i>{}</i>", pick());
    // Only our own messages can be edited.
    if ctx.message.outgoing {
        ctx.edit(ctx.message.id, text).await
    } else {
        ctx.reply(text).await.map(drop)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::commands::BotCommand;
    use crate::commands::testing::{context, test_app};
    use crate::telegram::mock::{MockApi, incoming};

    #[tokio::test]
    async fn test_decide_edits_command_message() {
        let api = Arc::new(MockApi::new());
        let (app, _dir) = test_app(api.clone());
        let ctx = context(&app, BotCommand::Decide, incoming(5, 9, ".decide"), "", None);
        decide(&ctx).await.unwrap();

        let recorded = api.recorded.lock().unwrap();
        let (chat, id, message) = &recorded.edits[0];
        assert_eq!((*chat, *id), (5, 9));
        assert!(RESPONSES.iter().any(|r| message.html.contains(r)));
    }
}
