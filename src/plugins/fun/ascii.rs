use figlet_rs::FIGfont;

use crate::commands::{CommandContext, CommandError};
use crate::telegram::html::escape;

/// Renders `text` in the standard figlet font.
fn render(text: &str) -> Option<String> {
    let font = FIGfont::standard().ok()?;
    font.convert(text).map(|figure| figure.to_string())
}

pub async fn ascii(ctx: &CommandContext) -> Result<(), CommandError> {
    if ctx.input.is_empty() {
        return Err(CommandError::usage("What am I supposed to say?"));
    }
    let Some(art) = render(&ctx.input) else {
        return Err(CommandError::usage("Could not render that text."));
    };
    ctx.reply(format!("<pre>{}</pre>", escape(&art))).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::commands::BotCommand;
    use crate::commands::testing::{context, test_app};
    use crate::telegram::mock::{MockApi, incoming};

    #[test]
    fn test_render_is_multiline() {
        let art = render("Hi").unwrap();
        assert!(art.lines().count() >= 5);
        assert!(art.contains('|'));
    }

    #[tokio::test]
    async fn test_ascii_replies_with_preformatted_art() {
        let api = Arc::new(MockApi::new());
        let (app, _dir) = test_app(api.clone());
        let ctx = context(&app, BotCommand::Ascii, incoming(5, 1, ".ascii a<b"), "a<b", None);
        ascii(&ctx).await.unwrap();

        let text = api.last_text();
        assert!(text.starts_with("<pre>"));
        assert!(text.ends_with("</pre>"));
        assert!(!text[5..text.len() - 6].contains('<'));
    }

    #[tokio::test]
    async fn test_ascii_without_text() {
        let api = Arc::new(MockApi::new());
        let (app, _dir) = test_app(api.clone());
        let ctx = context(&app, BotCommand::Ascii, incoming(5, 1, ".ascii"), "", None);
        let err = ascii(&ctx).await.unwrap_err();
        assert!(
            matches!(err, CommandError::Usage { ref message, .. } if message == "What am I supposed to say?")
        );
    }
}
