//! Samsung firmware and model lookups.

use lazy_regex::regex_captures;

use super::{fetch_spec_sheet, format_spec_sheet};
use crate::commands::{CommandContext, CommandError};
use crate::config::timeouts;
use crate::http::{HttpError, RequestBuilderExt};
use crate::telegram::html::escape;

const SAMSUNG_API_URL: &str = "https://api.rev-tech.me/v1/samsung/details/";

/// Latest release announced in a FOTA `version.xml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Firmware {
    pub pda: String,
    pub csc: Option<String>,
    pub phone: Option<String>,
    pub os: Option<String>,
}

/// Parses the `<latest o="OS">PDA/CSC/PHONE</latest>` element.
pub fn parse_firmware(xml: &str) -> Option<Firmware> {
    let (_, attributes, version) = regex_captures!(r"<latest([^>]*)>([^<]*)</latest>", xml)?;
    let version = version.trim();
    if version.is_empty() {
        return None;
    }

    let os = regex_captures!(r#"\bo="([^"]*)""#, attributes)
        .map(|(_, os)| os.to_owned())
        .filter(|os| !os.is_empty());

    let mut parts = version.split('/').map(str::to_owned);
    let pda = parts.next().unwrap_or_default();
    Some(Firmware {
        pda,
        csc: parts.next().filter(|p| !p.is_empty()),
        phone: parts.next().filter(|p| !p.is_empty()),
        os,
    })
}

/// Uppercases and adds the `SM-` prefix when missing.
pub fn normalize_model(model: &str) -> String {
    let model = model.to_uppercase();
    if model.starts_with("SM-") {
        model
    } else {
        format!("SM-{model}")
    }
}

fn usage(ctx: &CommandContext, args: &str) -> CommandError {
    CommandError::usage_for(
        format!(
            "<b>Usage:</b> <code>{}{}</code>",
            escape(&ctx.settings().command_prefix),
            args
        ),
        timeouts::MEDIUM,
    )
}

pub async fn check_firmware(ctx: &CommandContext) -> Result<(), CommandError> {
    let args: Vec<&str> = ctx.input.split_whitespace().collect();
    let [model, csc] = args.as_slice() else {
        return Err(usage(ctx, "checkfw [model] [csc]"));
    };
    let model = escape(&normalize_model(model));
    let csc = escape(&csc.to_uppercase());

    let progress = ctx
        .reply(format!(
            "<code>Checking official Samsung servers for {model}/{csc}...</code>"
        ))
        .await?;

    let url = format!("https://fota-cloud-dn.ospserver.net/firmware/{csc}/{model}/version.xml");
    let xml = match ctx.app.http.get(url).read_text().await {
        Ok(xml) => xml,
        Err(HttpError::BadStatus { .. }) => {
            return ctx
                .edit_temp(
                    progress,
                    format!("<b>Error:</b> No firmware found for <code>{model}/{csc}</code>."),
                    timeouts::LONG,
                )
                .await;
        }
        Err(e) => return ctx.edit_error(progress, e.into()).await,
    };

    let Some(firmware) = parse_firmware(&xml) else {
        return ctx
            .edit_temp(
                progress,
                format!("<b>Error:</b> No public release found for <code>{model}/{csc}</code>."),
                timeouts::LONG,
            )
            .await;
    };

    let mut lines = vec![
        format!("<b>📱 Latest Firmware for {model} ({csc})</b>\n"),
        format!("<b>PDA:</b> <code>{}</code>", escape(&firmware.pda)),
        format!(
            "<b>CSC:</b> <code>{}</code>",
            escape(firmware.csc.as_deref().unwrap_or("N/A"))
        ),
    ];
    if let Some(phone) = &firmware.phone {
        lines.push(format!("<b>Phone:</b> <code>{}</code>", escape(phone)));
    }
    lines.push(format!(
        "<b>Android:</b> <code>{}</code>",
        escape(firmware.os.as_deref().unwrap_or("N/A"))
    ));
    ctx.edit(progress, lines.join("\n")).await
}

pub async fn model_name(ctx: &CommandContext) -> Result<(), CommandError> {
    if ctx.input.is_empty() {
        return Err(usage(ctx, "sm [model_code]"));
    }
    let code = ctx.input.to_uppercase();
    let progress = ctx
        .reply(format!("<code>Looking up {}...</code>", escape(&code)))
        .await?;

    match fetch_spec_sheet(&ctx.app.http, &format!("{SAMSUNG_API_URL}{code}")).await {
        Ok(Some(sheet)) => {
            ctx.edit(
                progress,
                format!(
                    "Code <code>{}</code> belongs to <b>{}</b>.",
                    escape(&code),
                    escape(&sheet.name)
                ),
            )
            .await
        }
        Ok(None) => {
            ctx.edit_temp(
                progress,
                format!(
                    "<b>Error:</b> Could not find a device for code <code>{}</code>.",
                    escape(&code)
                ),
                timeouts::LONG,
            )
            .await
        }
        Err(e) => ctx.edit_error(progress, e.into()).await,
    }
}

pub async fn specs(ctx: &CommandContext) -> Result<(), CommandError> {
    if ctx.input.is_empty() {
        return Err(usage(ctx, "sspecs [model_code]"));
    }
    let query = escape(&ctx.input);
    let progress = ctx
        .reply(format!("<code>Searching for '{query}'...</code>"))
        .await?;

    let url = format!("{SAMSUNG_API_URL}{}", ctx.input.to_uppercase());
    match fetch_spec_sheet(&ctx.app.http, &url).await {
        Ok(Some(sheet)) => {
            let header = format!("<b>📱 Specs for {}</b>", escape(&sheet.name));
            ctx.edit(progress, format_spec_sheet(&header, &sheet)).await
        }
        Ok(None) => {
            ctx.edit_temp(
                progress,
                format!("<b>Error:</b> Could not find specs for '<code>{query}</code>'."),
                timeouts::LONG,
            )
            .await
        }
        Err(e) => ctx.edit_error(progress, e.into()).await,
    }
}
