//! Push payload handling.
//!
//! Payloads arrive as raw bytes and may be JSON (either the provider's
//! nested `notification`/`data` envelope or a flat object) or plain text.
//! Parsing never fails: anything unreadable degrades to a generic
//! notification so a delivered event is always displayed.

use serde_json::Value;

pub const FALLBACK_TITLE: &str = "HemoLink";
pub const FALLBACK_BODY: &str = "You have a new notification.";

/// A push event reduced to what display needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PushMessage {
    pub id: Option<String>,
    pub title: String,
    pub body: String,
    pub icon: Option<String>,
    pub link: Option<String>,
}

pub fn parse_push_payload(payload: &[u8]) -> PushMessage {
    if let Ok(value) = serde_json::from_slice::<Value>(payload) {
        if value.is_object() {
            return from_json(&value);
        }
    }

    // Not JSON: a non-empty UTF-8 body becomes the message text.
    match std::str::from_utf8(payload) {
        Ok(text) if !text.trim().is_empty() => PushMessage {
            id: None,
            title: FALLBACK_TITLE.to_string(),
            body: text.trim().to_string(),
            icon: None,
            link: None,
        },
        _ => generic(),
    }
}

fn from_json(value: &Value) -> PushMessage {
    let notification = &value["notification"];

    let title = pick_str(&[&notification["title"], &value["title"]])
        .unwrap_or_else(|| FALLBACK_TITLE.to_string());
    let body = pick_str(&[&notification["body"], &value["body"]])
        .unwrap_or_else(|| FALLBACK_BODY.to_string());
    let icon = pick_str(&[&notification["icon"], &value["icon"]]);
    let link = pick_str(&[
        &value["data"]["url"],
        &value["fcmOptions"]["link"],
        &value["url"],
    ]);
    let id = pick_str(&[&value["messageId"], &value["data"]["id"]]);

    PushMessage {
        id,
        title,
        body,
        icon,
        link,
    }
}

fn pick_str(candidates: &[&Value]) -> Option<String> {
    candidates
        .iter()
        .filter_map(|value| value.as_str())
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn generic() -> PushMessage {
    PushMessage {
        id: None,
        title: FALLBACK_TITLE.to_string(),
        body: FALLBACK_BODY.to_string(),
        icon: None,
        link: None,
    }
}
