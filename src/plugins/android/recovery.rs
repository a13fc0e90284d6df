//! Latest custom recovery builds: OrangeFox and TWRP.

use std::collections::BTreeMap;

use chrono::DateTime;
use serde::Deserialize;
use tracing::warn;

use crate::commands::{CommandContext, CommandError};
use crate::config::timeouts;
use crate::http::{HttpError, RequestBuilderExt};
use crate::telegram::OutgoingMessage;
use crate::telegram::html::escape;

const ORANGEFOX_API: &str = "https://api.orangefox.download/v3";

#[derive(Debug, Deserialize)]
struct ReleaseList {
    #[serde(default)]
    data: Vec<ReleaseRef>,
}

#[derive(Debug, Deserialize)]
struct ReleaseRef {
    #[serde(rename = "_id")]
    id: String,
}

/// Details of one OrangeFox release.
#[derive(Debug, Deserialize)]
pub struct FoxRelease {
    pub full_name: Option<String>,
    pub version: Option<String>,
    #[serde(rename = "type")]
    pub build_type: Option<String>,
    pub filename: Option<String>,
    #[serde(default)]
    pub size: f64,
    #[serde(default)]
    pub date: i64,
    pub md5: Option<String>,
    #[serde(default)]
    pub mirrors: BTreeMap<String, String>,
}

impl FoxRelease {
    pub fn render(&self, codename: &str) -> String {
        let na = |v: &Option<String>| escape(v.as_deref().unwrap_or("N/A"));
        let date = DateTime::from_timestamp(self.date, 0)
            .map_or_else(|| "N/A".to_owned(), |d| d.format("%Y-%m-%d").to_string());
        format!(
            "🦊 <b>Latest OrangeFox for {}</b>\n\n<b>Version:</b> <code>{} ({})</code>\n<b>File:</b> <code>{}</code>\n<b>Size:</b> <code>{:.2} MB</code>\n<b>Date:</b> <code>{}</code>\n<b>MD5:</b> <code>{}</code>",
            escape(self.full_name.as_deref().unwrap_or(codename)),
            na(&self.version),
            na(&self.build_type),
            na(&self.filename),
            self.size / 1024.0 / 1024.0,
            date,
            na(&self.md5)
        )
    }
}

/// Device page of the TWRP site.
#[derive(Debug, Deserialize)]
pub struct TwrpDevice {
    pub pretty_name: Option<String>,
    pub maintainer: Option<String>,
    pub version: Option<String>,
    #[serde(default)]
    pub downloads: Vec<String>,
}

enum Lookup<T> {
    Found(T),
    Missing,
}

async fn latest_orangefox(
    http: &reqwest::Client,
    codename: &str,
) -> Result<Lookup<FoxRelease>, HttpError> {
    let list: ReleaseList = http
        .get(format!("{ORANGEFOX_API}/releases/"))
        .query(&[
            ("codename", codename),
            ("sort", "date_desc"),
            ("limit", "1"),
        ])
        .read_json()
        .await?;
    let Some(latest) = list.data.first() else {
        return Ok(Lookup::Missing);
    };

    let release = http
        .get(format!("{ORANGEFOX_API}/releases/get"))
        .query(&[("_id", latest.id.as_str())])
        .read_json()
        .await?;
    Ok(Lookup::Found(release))
}

fn usage(ctx: &CommandContext, name: &str) -> CommandError {
    CommandError::usage_for(
        format!(
            "<b>Usage:</b> <code>{}{name} [codename]</code>",
            escape(&ctx.settings().command_prefix)
        ),
        timeouts::MEDIUM,
    )
}

pub async fn orangefox(ctx: &CommandContext) -> Result<(), CommandError> {
    if ctx.input.is_empty() {
        return Err(usage(ctx, "orangefox"));
    }
    let codename = ctx.input.to_lowercase();
    let progress = ctx
        .reply(format!(
            "<code>Searching for OrangeFox releases for {}...</code>",
            escape(&codename)
        ))
        .await?;

    let failure = match latest_orangefox(&ctx.app.http, &codename).await {
        Ok(Lookup::Found(release)) => {
            let mut message = OutgoingMessage::new(release.render(&codename));
            if let Some(link) = release.mirrors.values().next() {
                message = message.url_button("Download", link.clone());
            }
            return ctx.edit_with(progress, message).await;
        }
        Ok(Lookup::Missing) => format!(
            "<b>Sorry:</b> No official OrangeFox release found for <code>{}</code>.",
            escape(&codename)
        ),
        Err(e) => {
            warn!("OrangeFox lookup for {} failed: {}", codename, e);
            format!(
                "<b>Error:</b> Could not fetch OrangeFox release for <code>{}</code>.",
                escape(&codename)
            )
        }
    };
    ctx.edit_temp(progress, failure, timeouts::LONG).await
}

pub async fn twrp(ctx: &CommandContext) -> Result<(), CommandError> {
    if ctx.input.is_empty() {
        return Err(usage(ctx, "twrp"));
    }
    let codename = ctx.input.to_lowercase();
    let progress = ctx
        .reply(format!(
            "<code>Searching for TWRP releases for {}...</code>",
            escape(&codename)
        ))
        .await?;

    let url = format!("https://twrp.me/devices/data/{codename}.json");
    let failure = match ctx.app.http.get(url).read_json::<TwrpDevice>().await {
        Ok(device) if !device.downloads.is_empty() => {
            let text = format!(
                "📱 <b>Latest TWRP for {}</b>\n\n<b>Maintainer:</b> <code>{}</code>\n<b>Version:</b> <code>{}</code>",
                escape(device.pretty_name.as_deref().unwrap_or(&codename)),
                escape(device.maintainer.as_deref().unwrap_or("N/A")),
                escape(device.version.as_deref().unwrap_or("N/A"))
            );
            let message = OutgoingMessage::new(text)
                .url_button("Download Page", format!("https://twrp.me{}", device.downloads[0]));
            return ctx.edit_with(progress, message).await;
        }
        Err(HttpError::BadStatus { .. }) => format!(
            "<b>Sorry:</b> No official TWRP release found for <code>{}</code>.",
            escape(&codename)
        ),
        Ok(_) | Err(_) => format!(
            "<b>Error:</b> Could not fetch TWRP release for <code>{}</code>.",
            escape(&codename)
        ),
    };
    ctx.edit_temp(progress, failure, timeouts::LONG).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orangefox_render() {
        let release: FoxRelease = serde_json::from_str(
            r#"{"full_name":"Xiaomi Redmi Note 10","version":"R11.1_4","type":"Stable",
                "filename":"OrangeFox-R11.1_4-Stable-mojito.zip","size":104857600,
                "date":1700000000,"md5":"abc123",
                "mirrors":{"DL":"https://dl.orangefox.download/x"}}"#,
        )
        .unwrap();
        let text = release.render("mojito");
        assert!(text.contains("for Xiaomi Redmi Note 10</b>"));
        assert!(text.contains("<code>R11.1_4 (Stable)</code>"));
        assert!(text.contains("<code>100.00 MB</code>"));
        assert!(text.contains("<code>2023-11-14</code>"));
        assert_eq!(
            release.mirrors.values().next().map(String::as_str),
            Some("https://dl.orangefox.download/x")
        );
    }

    #[test]
    fn test_orangefox_render_missing_fields() {
        let release: FoxRelease = serde_json::from_str("{}").unwrap();
        let text = release.render("mojito");
        assert!(text.contains("for mojito</b>"));
        assert!(text.contains("<code>N/A (N/A)</code>"));
        assert!(text.contains("<code>1970-01-01</code>"));
    }

    #[test]
    fn test_twrp_device_parsing() {
        let device: TwrpDevice = serde_json::from_str(
            r#"{"pretty_name":"Google Pixel 7","maintainer":"TWRP","version":"3.7.0",
                "downloads":["/devices/googlepixel7.html"]}"#,
        )
        .unwrap();
        assert_eq!(device.downloads[0], "/devices/googlepixel7.html");
        assert_eq!(device.pretty_name.as_deref(), Some("Google Pixel 7"));
    }
}
