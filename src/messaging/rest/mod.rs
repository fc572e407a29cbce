//! Wire types and helpers for the notification backend.

use serde::{Deserialize, Serialize};

use crate::messaging::types::FeedNotification;

mod client;

pub use client::BackendClient;

#[derive(Clone, Serialize)]
pub(crate) struct TokenBody<'a> {
    pub token: &'a str,
}

/// One page of the persisted notification feed.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPage {
    #[serde(default)]
    pub notifications: Vec<FeedNotification>,
    #[serde(default)]
    pub unread_count: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MissedResponse {
    #[serde(default)]
    pub missed_notifications: u32,
}

/// Statuses worth retrying on a later pass, as opposed to rejections.
pub(crate) fn is_retriable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

#[cfg(test)]
mod status_tests {
    use super::is_retriable_status;

    #[test]
    fn server_trouble_is_retriable_rejections_are_not() {
        assert!(is_retriable_status(503));
        assert!(is_retriable_status(429));
        assert!(!is_retriable_status(400));
        assert!(!is_retriable_status(401));
        assert!(!is_retriable_status(404));
    }
}
