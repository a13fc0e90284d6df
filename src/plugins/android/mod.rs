//! Android device lookups: firmware, spec sheets, recoveries, root tools.

pub mod recovery;
pub mod root_tools;
pub mod samsung;
pub mod xiaomi;

use reqwest::StatusCode;
use serde::Deserialize;

use crate::http::{HttpError, RequestBuilderExt};
use crate::telegram::html::{escape, truncate_message};

pub use xiaomi::DeviceCache;

/// Device details served by the rev-tech API.
#[derive(Debug, Clone, Deserialize)]
pub struct SpecSheet {
    pub name: String,
    #[serde(default)]
    pub codename: Option<String>,
    #[serde(default)]
    pub specifications: Vec<SpecGroup>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpecGroup {
    pub name: String,
    #[serde(default)]
    pub details: Vec<SpecDetail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpecDetail {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
struct SpecResponse {
    #[serde(default)]
    success: bool,
    data: Option<SpecSheet>,
}

/// Fetches a spec sheet; `None` when the API does not know the device.
pub async fn fetch_spec_sheet(
    http: &reqwest::Client,
    url: &str,
) -> Result<Option<SpecSheet>, HttpError> {
    match http.get(url).read_json::<SpecResponse>().await {
        Ok(SpecResponse {
            success: true,
            data,
        }) => Ok(data),
        Ok(_) => Ok(None),
        Err(e) if e.status() == Some(StatusCode::NOT_FOUND) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Renders a sheet under `header`, cut down when over the message limit.
pub fn format_spec_sheet(header: &str, sheet: &SpecSheet) -> String {
    let mut lines = vec![format!("{header}\n")];
    for group in &sheet.specifications {
        lines.push(format!("\n<b>{}</b>", escape(&group.name)));
        for detail in &group.details {
            lines.push(format!(
                "  - <b>{}:</b> <code>{}</code>",
                escape(&detail.name),
                escape(&detail.value)
            ));
        }
    }
    truncate_message(lines.join("\n"), "\n\n<b>...and more specifications.</b>")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(groups: usize, details: usize) -> SpecSheet {
        SpecSheet {
            name: "Galaxy S24".to_owned(),
            codename: None,
            specifications: (0..groups)
                .map(|g| SpecGroup {
                    name: format!("Group {g}"),
                    details: (0..details)
                        .map(|d| SpecDetail {
                            name: format!("Key {d}"),
                            value: "<value>".to_owned(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_spec_sheet_layout() {
        let text = format_spec_sheet("<b>Specs</b>", &sheet(1, 2));
        assert_eq!(
            text,
            "<b>Specs</b>\n\n\n<b>Group 0</b>\n  - <b>Key 0:</b> <code>&lt;value&gt;</code>\n  - <b>Key 1:</b> <code>&lt;value&gt;</code>"
        );
    }

    #[test]
    fn test_long_spec_sheet_is_truncated() {
        let text = format_spec_sheet("<b>Specs</b>", &sheet(20, 20));
        assert!(text.ends_with("\n\n<b>...and more specifications.</b>"));
        assert_eq!(
            text.chars().count(),
            4000 + "\n\n<b>...and more specifications.</b>".len()
        );
    }

    #[test]
    fn test_spec_response_parsing() {
        let raw = r#"{"success":true,"data":{"name":"Redmi Note 13","codename":"gold",
            "specifications":[{"name":"Display","details":[{"name":"Size","value":"6.67"}]}]}}"#;
        let parsed: SpecResponse = serde_json::from_str(raw).unwrap();
        let sheet = parsed.data.unwrap();
        assert_eq!(sheet.codename.as_deref(), Some("gold"));
        assert_eq!(sheet.specifications[0].details[0].value, "6.67");
    }
}
