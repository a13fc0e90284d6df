//! Connected fed list: `addfed`, `delfed`, `listfeds`.

use crate::commands::{CommandContext, CommandError};
use crate::config::timeouts;
use crate::storage::{FED_COLLECTION, FedRecord};
use crate::telegram::ChatId;
use crate::telegram::html::escape;

pub async fn add_fed(ctx: &CommandContext) -> Result<(), CommandError> {
    let chat = &ctx.message.chat;
    if !chat.is_group() {
        return Err(CommandError::usage("Use this inside the fed chat you want to connect."));
    }

    let name = if ctx.input.is_empty() {
        chat.display_title().to_owned()
    } else {
        ctx.input.clone()
    };
    let added = ctx
        .app
        .store
        .collection::<FedRecord>(FED_COLLECTION)
        .add_data(FedRecord {
            chat_id: chat.id,
            name: name.clone(),
        })?;

    let verb = if added { "Connected" } else { "Updated" };
    ctx.reply_temp(
        format!("{verb} <b>{}</b> (<code>{}</code>).", escape(&name), chat.id),
        timeouts::MEDIUM,
    )
    .await?;
    Ok(())
}

pub async fn del_fed(ctx: &CommandContext) -> Result<(), CommandError> {
    let chat_id: ChatId = if ctx.input.is_empty() {
        ctx.chat_id()
    } else {
        ctx.input
            .parse()
            .map_err(|_| CommandError::usage("Give a numeric chat id."))?
    };

    let removed = ctx
        .app
        .store
        .collection::<FedRecord>(FED_COLLECTION)
        .delete_data(&chat_id)?;

    let text = if removed {
        format!("Disconnected fed <code>{chat_id}</code>.")
    } else {
        format!("<code>{chat_id}</code> is not a connected fed.")
    };
    ctx.reply_temp(text, timeouts::MEDIUM).await?;
    Ok(())
}

pub async fn list_feds(ctx: &CommandContext) -> Result<(), CommandError> {
    let feds = ctx
        .app
        .store
        .collection::<FedRecord>(FED_COLLECTION)
        .find()?;
    if feds.is_empty() {
        ctx.reply_temp("You don't have any Feds Connected.", timeouts::SMALL)
            .await?;
        return Ok(());
    }

    let mut text = String::from("<b>List Of Connected Feds:</b>\n");
    for (i, fed) in feds.iter().enumerate() {
        text.push_str(&format!(
            "{}. {} (<code>{}</code>)\n",
            i + 1,
            escape(&fed.name),
            fed.chat_id
        ));
    }
    ctx.reply(text).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::commands::BotCommand;
    use crate::commands::testing::{context, test_app};
    use crate::telegram::mock::{MockApi, incoming};

    #[tokio::test]
    async fn test_add_list_and_delete_fed() {
        let api = Arc::new(MockApi::new());
        let (app, _dir) = test_app(api.clone());

        let ctx = context(&app, BotCommand::AddFed, incoming(-5, 1, ".addfed"), "", None);
        add_fed(&ctx).await.unwrap();
        assert_eq!(api.last_text(), "Connected <b>Test Group</b> (<code>-5</code>).");

        let ctx = context(&app, BotCommand::AddFed, incoming(-5, 2, ".addfed Spam Fed"), "Spam Fed", None);
        add_fed(&ctx).await.unwrap();
        assert!(api.last_text().starts_with("Updated <b>Spam Fed</b>"));

        let ctx = context(&app, BotCommand::ListFeds, incoming(5, 3, ".listfeds"), "", None);
        list_feds(&ctx).await.unwrap();
        assert!(api.last_text().contains("1. Spam Fed (<code>-5</code>)"));

        let ctx = context(&app, BotCommand::DelFed, incoming(5, 4, ".delfed -5"), "-5", None);
        del_fed(&ctx).await.unwrap();
        assert_eq!(api.last_text(), "Disconnected fed <code>-5</code>.");

        let feds = app.store.collection::<FedRecord>(FED_COLLECTION);
        assert!(feds.find().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_fed_in_private_chat_is_rejected() {
        let api = Arc::new(MockApi::new());
        let (app, _dir) = test_app(api);

        let ctx = context(&app, BotCommand::AddFed, incoming(5, 1, ".addfed"), "", None);
        assert!(matches!(add_fed(&ctx).await, Err(CommandError::Usage { .. })));
    }
}
