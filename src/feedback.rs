use crate::model::Entry;
use crate::service::QueryResult;
use serde::Serialize;

/// Picker items, serialised as `{"items": [...]}`.
#[derive(Debug, Serialize)]
pub struct Feedback {
    pub items: Vec<Item>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Item {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    pub title: String,
    pub subtitle: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arg: Option<String>,
    pub valid: bool,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub item_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<Icon>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<Text>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Icon {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub icon_type: Option<&'static str>,
    pub path: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Text {
    pub copy: String,
}

const ICON_WARNING: &str =
    "/System/Library/CoreServices/CoreTypes.bundle/Contents/Resources/AlertCautionIcon.icns";

impl Item {
    fn placeholder(title: &str, subtitle: &str) -> Self {
        Self {
            uid: None,
            title: title.to_string(),
            subtitle: subtitle.to_string(),
            arg: None,
            valid: false,
            item_type: None,
            icon: Some(Icon {
                icon_type: None,
                path: ICON_WARNING.to_string(),
            }),
            text: None,
        }
    }
}

impl From<&Entry> for Item {
    fn from(entry: &Entry) -> Self {
        Self {
            uid: Some(entry.path().to_string()),
            title: entry.name().to_string(),
            subtitle: entry.display_path().to_string(),
            arg: Some(entry.path().to_string()),
            valid: true,
            item_type: Some("file"),
            icon: Some(Icon {
                icon_type: Some("fileicon"),
                path: entry.path().to_string(),
            }),
            text: Some(Text {
                copy: entry.path().to_string(),
            }),
        }
    }
}

pub fn render(result: &QueryResult) -> Feedback {
    let items = match result {
        QueryResult::NotReady => vec![Item::placeholder(
            "Waiting for data…",
            "Favourites and recent items are being loaded. Try again in a moment.",
        )],
        QueryResult::Entries(entries) if entries.is_empty() => {
            vec![Item::placeholder("Nothing found", "Try a different query?")]
        }
        QueryResult::Entries(entries) => entries.iter().map(Item::from).collect(),
    };
    Feedback { items }
}
