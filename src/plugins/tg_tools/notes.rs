//! Saved notes: `save`, `get`, `delnote`, `notes`.
//!
//! Replied messages are copied to Saved Messages and the note keeps the
//! id of that copy, so the note outlives the original message.

use tracing::warn;

use crate::commands::{CommandContext, CommandError};
use crate::config::timeouts;
use crate::storage::{NOTES_COLLECTION, NoteContent, NoteRecord, normalize_name};
use crate::telegram::OutgoingMessage;
use crate::telegram::html::escape;

const MISSING_MEDIA: &str = "<i>Error: The saved media for this note could not be found or has been deleted from Saved Messages.</i>";

fn note_name(ctx: &CommandContext, action: &str) -> Result<String, CommandError> {
    ctx.input
        .split_whitespace()
        .next()
        .map(normalize_name)
        .ok_or_else(|| CommandError::usage(format!("You need to specify which note to {action}.")))
}

pub async fn save_note(ctx: &CommandContext) -> Result<(), CommandError> {
    let (name, body) = match ctx.input.split_once(char::is_whitespace) {
        Some((name, body)) => (name, body.trim()),
        None => (ctx.input.as_str(), ""),
    };
    if name.is_empty() {
        return Err(CommandError::usage("You need to provide a name for the note."));
    }

    let content = if let Some(replied) = &ctx.replied {
        let copy = ctx
            .api()
            .copy_message(ctx.app.owner_id, replied.chat.id, replied.id, None)
            .await?;
        NoteContent::Message(copy)
    } else if !body.is_empty() {
        NoteContent::Text(body.to_owned())
    } else {
        return Err(CommandError::usage(
            "You need to provide content for the note or reply to a message.",
        ));
    };

    let note = NoteRecord::new(name, content);
    let text = format!("Note <code>{}</code> saved successfully.", escape(&note.name));
    ctx.app
        .store
        .collection::<NoteRecord>(NOTES_COLLECTION)
        .add_data(note)?;

    ctx.reply_temp(text, timeouts::SMALL).await?;
    ctx.delete_command().await;
    Ok(())
}

pub async fn get_note(ctx: &CommandContext) -> Result<(), CommandError> {
    let name = note_name(ctx, "get")?;
    let note = ctx
        .app
        .store
        .collection::<NoteRecord>(NOTES_COLLECTION)
        .find_one(&name)?
        .ok_or_else(|| {
            CommandError::usage(format!("Note <code>{}</code> not found.", escape(&name)))
        })?;

    ctx.delete_command().await;

    let reply_to = ctx.message.reply_to;
    match note.content {
        NoteContent::Message(id) => {
            if let Err(e) = ctx
                .api()
                .copy_message(ctx.chat_id(), ctx.app.owner_id, id, reply_to)
                .await
            {
                warn!("Note {} points at a missing message {}: {}", name, id, e);
                ctx.api()
                    .send_message(ctx.chat_id(), OutgoingMessage::new(MISSING_MEDIA))
                    .await?;
            }
        }
        NoteContent::Text(text) => {
            ctx.api()
                .send_message(ctx.chat_id(), OutgoingMessage::new(text).reply_to_opt(reply_to))
                .await?;
        }
    }
    Ok(())
}

pub async fn delete_note(ctx: &CommandContext) -> Result<(), CommandError> {
    let name = note_name(ctx, "delete")?;
    let deleted = ctx
        .app
        .store
        .collection::<NoteRecord>(NOTES_COLLECTION)
        .delete_data(&name)?;

    let text = if deleted {
        format!("Note <code>{}</code> has been deleted.", escape(&name))
    } else {
        format!("Note <code>{}</code> not found.", escape(&name))
    };
    ctx.reply_temp(text, timeouts::SMALL).await?;
    Ok(())
}

pub async fn list_notes(ctx: &CommandContext) -> Result<(), CommandError> {
    let mut names: Vec<String> = ctx
        .app
        .store
        .collection::<NoteRecord>(NOTES_COLLECTION)
        .find()?
        .into_iter()
        .map(|note| note.name)
        .collect();
    if names.is_empty() {
        ctx.reply("You have no saved notes.").await?;
        return Ok(());
    }
    names.sort();

    let mut text = String::from("<b>Your saved notes:</b>\n\n");
    for name in names {
        text.push_str(&format!("• <code>{}</code>\n", escape(&name)));
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
    async fn test_text_note_lifecycle() {
        let api = Arc::new(MockApi::new());
        let (app, _dir) = test_app(api.clone());

        let ctx = context(&app, BotCommand::SaveNote, incoming(-5, 1, ".save Rules be nice"), "Rules be nice", None);
        save_note(&ctx).await.unwrap();
        assert_eq!(api.last_text(), "Note <code>rules</code> saved successfully.");

        let ctx = context(&app, BotCommand::GetNote, incoming(-5, 2, ".get RULES"), "RULES", None);
        get_note(&ctx).await.unwrap();
        assert_eq!(api.last_text(), "be nice");
        assert!(api.recorded.lock().unwrap().deleted.contains(&(-5, 2)));

        let ctx = context(&app, BotCommand::Notes, incoming(-5, 3, ".notes"), "", None);
        list_notes(&ctx).await.unwrap();
        assert_eq!(api.last_text(), "<b>Your saved notes:</b>\n\n• <code>rules</code>\n");

        let ctx = context(&app, BotCommand::DelNote, incoming(-5, 4, ".delnote rules"), "rules", None);
        delete_note(&ctx).await.unwrap();
        assert_eq!(api.last_text(), "Note <code>rules</code> has been deleted.");

        let ctx = context(&app, BotCommand::DelNote, incoming(-5, 5, ".delnote rules"), "rules", None);
        delete_note(&ctx).await.unwrap();
        assert_eq!(api.last_text(), "Note <code>rules</code> not found.");
    }

    #[tokio::test]
    async fn test_replied_note_is_copied_to_saved_messages() {
        let api = Arc::new(MockApi::new());
        let source = incoming(-5, 10, "a photo");
        api.add_message(source.clone());
        let (app, _dir) = test_app(api.clone());

        let ctx = context(&app, BotCommand::SaveNote, incoming(-5, 11, ".save pic"), "pic", Some(source));
        save_note(&ctx).await.unwrap();

        let stored = app
            .store
            .collection::<NoteRecord>(NOTES_COLLECTION)
            .find_one("pic")
            .unwrap()
            .unwrap();
        let NoteContent::Message(copy_id) = stored.content else {
            panic!("expected a message note");
        };
        assert_eq!(api.recorded.lock().unwrap().copied, vec![(1, -5, 10)]);

        // The copy is gone from Saved Messages.
        let ctx = context(&app, BotCommand::GetNote, incoming(-5, 12, ".get pic"), "pic", None);
        get_note(&ctx).await.unwrap();
        assert_eq!(api.last_text(), MISSING_MEDIA);

        api.add_message(incoming(1, copy_id, "a photo"));
        let ctx = context(&app, BotCommand::GetNote, incoming(-5, 13, ".get pic"), "pic", None);
        get_note(&ctx).await.unwrap();
        assert_eq!(api.recorded.lock().unwrap().copied.last(), Some(&(-5, 1, copy_id)));
    }

    #[tokio::test]
    async fn test_save_requires_name_and_content() {
        let api = Arc::new(MockApi::new());
        let (app, _dir) = test_app(api);

        let ctx = context(&app, BotCommand::SaveNote, incoming(-5, 1, ".save"), "", None);
        let err = save_note(&ctx).await.unwrap_err();
        assert_eq!(err.to_string(), "You need to provide a name for the note.");

        let ctx = context(&app, BotCommand::SaveNote, incoming(-5, 1, ".save x"), "x", None);
        let err = save_note(&ctx).await.unwrap_err();
        assert!(err.to_string().starts_with("You need to provide content"));

        let ctx = context(&app, BotCommand::GetNote, incoming(-5, 1, ".get nope"), "nope", None);
        let err = get_note(&ctx).await.unwrap_err();
        assert_eq!(err.to_string(), "Note <code>nope</code> not found.");
    }
}
