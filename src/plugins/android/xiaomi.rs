//! Xiaomi codename and spec lookups.
//!
//! The device list is downloaded on first use and kept for the life of the
//! process. A failed download is reported and retried on the next command.

use std::collections::BTreeSet;

use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::info;

use super::{fetch_spec_sheet, format_spec_sheet};
use crate::commands::{CommandContext, CommandError};
use crate::config::timeouts;
use crate::http::{HttpError, RequestBuilderExt};
use crate::telegram::OutgoingMessage;
use crate::telegram::html::{escape, truncate_message};

const DEVICES_JSON_URL: &str =
    "https://raw.githubusercontent.com/XiaomiFirmwareUpdater/mi-firmware-updater/master/data/devices.json";
const SPECS_API_URL: &str = "https://api.rev-tech.me/v1/devices/details/";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Names {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct RawDevice {
    codename: String,
    #[serde(default)]
    name: Option<Names>,
}

/// One entry of the device list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawDevice")]
pub struct Device {
    pub codename: String,
    pub names: Vec<String>,
}

impl From<RawDevice> for Device {
    fn from(raw: RawDevice) -> Self {
        let names = match raw.name {
            Some(Names::One(name)) => vec![name],
            Some(Names::Many(names)) => names,
            None => Vec::new(),
        };
        Self {
            codename: raw.codename,
            names,
        }
    }
}

impl Device {
    #[must_use]
    pub fn display_name(&self) -> String {
        self.names.join(" / ")
    }

    fn name_contains(&self, term: &str) -> bool {
        self.names.iter().any(|n| n.to_lowercase().contains(term))
    }
}

/// Lazily loaded device list.
#[derive(Debug, Default)]
pub struct DeviceCache {
    devices: OnceCell<Vec<Device>>,
}

impl DeviceCache {
    #[cfg(test)]
    pub fn preloaded(devices: Vec<Device>) -> Self {
        Self {
            devices: OnceCell::new_with(Some(devices)),
        }
    }

    /// Returns the device list, downloading it on first use.
    pub async fn get(&self, http: &reqwest::Client) -> Result<&[Device], HttpError> {
        self.devices
            .get_or_try_init(|| async {
                let devices: Vec<Device> = http.get(DEVICES_JSON_URL).read_json().await?;
                info!("Loaded {} Xiaomi devices", devices.len());
                Ok(devices)
            })
            .await
            .map(Vec::as_slice)
    }
}

/// Exact codename match first, else the first device whose name contains
/// the query.
pub fn find_device<'a>(devices: &'a [Device], query: &str) -> Option<&'a Device> {
    let query = query.trim().to_lowercase();
    devices
        .iter()
        .find(|d| d.codename.to_lowercase() == query)
        .or_else(|| devices.iter().find(|d| d.name_contains(&query)))
}

/// Unique `name is codename` lines for every device matching `term`.
pub fn codename_matches(devices: &[Device], term: &str) -> (usize, Vec<String>) {
    let term = term.to_lowercase();
    let matches: Vec<&Device> = devices.iter().filter(|d| d.name_contains(&term)).collect();
    let lines: BTreeSet<String> = matches
        .iter()
        .map(|d| {
            format!(
                "<code>{}</code> is <b>{}</b>",
                escape(&d.display_name()),
                escape(&d.codename)
            )
        })
        .collect();
    (matches.len(), lines.into_iter().collect())
}

async fn load(ctx: &CommandContext) -> Result<&[Device], CommandError> {
    ctx.app.devices.get(&ctx.app.http).await.map_err(|e| {
        CommandError::usage_for(
            format!(
                "<b>Error:</b> Could not load device database. <code>{}</code>",
                escape(&e.to_string())
            ),
            timeouts::LONG,
        )
    })
}

pub async fn what_is(ctx: &CommandContext) -> Result<(), CommandError> {
    if ctx.input.is_empty() {
        return Err(CommandError::usage_for(
            "Please provide a device codename.",
            timeouts::MEDIUM,
        ));
    }
    let progress = ctx.reply("<code>Searching...</code>").await?;
    let devices = match load(ctx).await {
        Ok(devices) => devices,
        Err(e) => return ctx.edit_error(progress, e).await,
    };

    let Some(device) = find_device(devices, &ctx.input) else {
        return ctx
            .edit_temp(
                progress,
                format!(
                    "<b>Error:</b> Codename <code>{}</code> not found.",
                    escape(&ctx.input)
                ),
                timeouts::LONG,
            )
            .await;
    };

    let text = format!(
        "<b>Codename:</b> <code>{}</code>\n<b>Device:</b> {}\n\n<a href='https://xiaomifirmwareupdater.com/firmware/{}/'>› Download Firmware</a>",
        escape(&device.codename),
        escape(&device.display_name()),
        escape(&device.codename)
    );
    ctx.edit_with(progress, OutgoingMessage::new(text).no_preview())
        .await
}

pub async fn codename(ctx: &CommandContext) -> Result<(), CommandError> {
    if ctx.input.is_empty() {
        return Err(CommandError::usage_for(
            "Please provide a marketing name to search for.",
            timeouts::MEDIUM,
        ));
    }
    let progress = ctx.reply("<code>Searching...</code>").await?;
    let devices = match load(ctx).await {
        Ok(devices) => devices,
        Err(e) => return ctx.edit_error(progress, e).await,
    };

    let (count, lines) = codename_matches(devices, &ctx.input);
    if count == 0 {
        return ctx
            .edit_temp(
                progress,
                format!(
                    "<b>Error:</b> No devices found matching '<code>{}</code>'.",
                    escape(&ctx.input.to_lowercase())
                ),
                timeouts::LONG,
            )
            .await;
    }

    let text = truncate_message(
        format!(
            "<b>🔍 Found {count} matching devices:</b>\n\n{}",
            lines.join("\n")
        ),
        "\n\n<b>...and more results. Refine your search.</b>",
    );
    ctx.edit_with(progress, OutgoingMessage::new(text).no_preview())
        .await
}

pub async fn specs(ctx: &CommandContext) -> Result<(), CommandError> {
    if ctx.input.is_empty() {
        return Err(CommandError::usage_for(
            "Please provide a device codename or name.",
            timeouts::MEDIUM,
        ));
    }
    let progress = ctx.reply("<code>Searching for device...</code>").await?;
    let devices = match load(ctx).await {
        Ok(devices) => devices,
        Err(e) => return ctx.edit_error(progress, e).await,
    };

    let Some(device) = find_device(devices, &ctx.input) else {
        return ctx
            .edit_temp(
                progress,
                format!(
                    "<b>Error:</b> Device '<code>{}</code>' not found.",
                    escape(&ctx.input)
                ),
                timeouts::LONG,
            )
            .await;
    };

    ctx.edit(progress, "<code>Found device, fetching specifications...</code>")
        .await?;

    let url = format!("{SPECS_API_URL}{}", device.codename);
    match fetch_spec_sheet(&ctx.app.http, &url).await {
        Ok(Some(sheet)) => {
            let codename = sheet.codename.as_deref().unwrap_or(&device.codename);
            let header = format!(
                "<b>📱 Specs for {}</b> (<code>{}</code>)",
                escape(&sheet.name),
                escape(codename)
            );
            ctx.edit(progress, format_spec_sheet(&header, &sheet)).await
        }
        Ok(None) => {
            ctx.edit_temp(
                progress,
                "<b>Error:</b> Could not fetch specifications. <code>API returned no data or an error.</code>",
                timeouts::LONG,
            )
            .await
        }
        Err(e) => ctx.edit_error(progress, e.into()).await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::commands::BotCommand;
    use crate::commands::testing::{context, test_app};
    use crate::telegram::mock::{MockApi, incoming};

    fn devices() -> Vec<Device> {
        serde_json::from_str(
            r#"[
                {"codename": "onyx", "name": ["POCO F5 Pro", "Redmi K60"]},
                {"codename": "marble", "name": ["POCO F5", "Redmi Note 12 Turbo"]},
                {"codename": "garnet", "name": "Redmi Note 13 Pro 5G"},
                {"codename": "marblein", "name": ["POCO F5"]}
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_find_prefers_exact_codename() {
        let devices = devices();
        assert_eq!(find_device(&devices, "Marble").unwrap().codename, "marble");
        assert_eq!(find_device(&devices, "k60").unwrap().codename, "onyx");
        assert_eq!(find_device(&devices, "note 13").unwrap().codename, "garnet");
        assert!(find_device(&devices, "pixel").is_none());
    }

    #[test]
    fn test_codename_matches_are_unique_and_sorted() {
        let (count, lines) = codename_matches(&devices(), "poco f5");
        assert_eq!(count, 3);
        assert_eq!(
            lines,
            vec![
                "<code>POCO F5 / Redmi Note 12 Turbo</code> is <b>marble</b>",
                "<code>POCO F5 Pro / Redmi K60</code> is <b>onyx</b>",
                "<code>POCO F5</code> is <b>marblein</b>",
            ]
        );
    }

    #[tokio::test]
    async fn test_whatis_uses_preloaded_list() {
        let api = Arc::new(MockApi::new());
        let (app, _dir) = test_app(api.clone());
        let app = Arc::new(crate::commands::AppState {
            devices: DeviceCache::preloaded(devices()),
            ..Arc::try_unwrap(app).unwrap()
        });

        let ctx = context(&app, BotCommand::WhatIs, incoming(5, 1, ".whatis onyx"), "onyx", None);
        what_is(&ctx).await.unwrap();
        let text = api.last_text();
        assert!(text.contains("<b>Device:</b> POCO F5 Pro / Redmi K60"));
        assert!(text.contains("firmware/onyx/"));
    }
}
