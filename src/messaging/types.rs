use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Display fields of a push message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub title: Option<String>,
    pub body: Option<String>,
    pub icon: Option<String>,
    pub image: Option<String>,
}

/// A push message as delivered to a focused page.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub notification: Option<NotificationPayload>,
    #[serde(default)]
    pub data: HashMap<String, String>,
    /// Deep link to open when the user acts on the message.
    pub link: Option<String>,
    /// Provider-assigned durable id; absent for some transports, in which
    /// case the router synthesizes one.
    pub message_id: Option<String>,
}

impl MessagePayload {
    pub fn title(&self) -> Option<&str> {
        self.notification.as_ref()?.title.as_deref()
    }

    pub fn body(&self) -> Option<&str> {
        self.notification.as_ref()?.body.as_deref()
    }
}

pub type MessageHandler = Arc<dyn Fn(MessagePayload) + Send + Sync + 'static>;

pub type Unsubscribe = Box<dyn FnOnce() + Send + 'static>;

/// One record of the persisted notification feed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedNotification {
    pub id: String,
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}
