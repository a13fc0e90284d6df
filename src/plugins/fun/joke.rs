use serde::Deserialize;

use crate::commands::{CommandContext, CommandError};
use crate::config::timeouts;
use crate::http::RequestBuilderExt;
use crate::telegram::html::escape;

const API_URL: &str = "https://official-joke-api.appspot.com/random_joke";

#[derive(Debug, Deserialize)]
struct Joke {
    setup: Option<String>,
    punchline: Option<String>,
}

pub async fn joke(ctx: &CommandContext) -> Result<(), CommandError> {
    let progress = ctx.reply("<code>Finding a good joke...</code>").await?;

    let joke = match ctx.app.http.get(API_URL).read_json::<Joke>().await {
        Ok(Joke {
            setup: Some(setup),
            punchline: Some(punchline),
        }) if !setup.is_empty() && !punchline.is_empty() => (setup, punchline),
        Ok(_) => {
            return ctx
                .edit_temp(
                    progress,
                    "<b>Error:</b> Could not fetch a joke.\n<code>Invalid joke format received.</code>",
                    timeouts::LONG,
                )
                .await;
        }
        Err(e) => {
            return ctx
                .edit_temp(
                    progress,
                    format!(
                        "<b>Error:</b> Could not fetch a joke.\n<code>{}</code>",
                        escape(&e.to_string())
                    ),
                    timeouts::LONG,
                )
                .await;
        }
    };

    let (setup, punchline) = (escape(&joke.0), escape(&joke.1));
    ctx.edit(progress, format!("<b>{setup}</b>")).await?;
    tokio::time::sleep(timeouts::TINY).await;
    ctx.edit(progress, format!("<b>{setup}</b>\n\n<i>...{punchline}</i>"))
        .await
}
