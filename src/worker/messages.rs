//! Typed page ↔ worker message contract.
//!
//! The worker script cannot read build-time secrets, so the page pushes the
//! provider credentials over the message channel after registration and the
//! worker acknowledges to that page alone. Signals flowing the other way
//! (activation, sync-driven reconciliation requests) are broadcast.

use serde::{Deserialize, Serialize};

/// Sync-event tag asking pages to reconcile missed notifications.
pub const SYNC_CHECK_MISSED_TAG: &str = "hemolink-check-missed";

/// Push-provider credentials delivered from a page context.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vapid_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
}

/// Messages a page sends to the worker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PageMessage {
    #[serde(rename = "FIREBASE_CONFIG")]
    ProviderConfig { config: ProviderConfig },
}

/// Signals the worker sends to page contexts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkerSignal {
    /// Acknowledges a [`PageMessage::ProviderConfig`]; sent only to the
    /// page that delivered the config.
    #[serde(rename = "FIREBASE_CONFIG_RECEIVED")]
    ConfigReceived,
    /// Broadcast once the worker reaches the activated state.
    #[serde(rename = "SW_ACTIVATED")]
    Activated,
    /// Broadcast when a sync event asks pages to check for missed
    /// notifications.
    #[serde(rename = "CHECK_MISSED_NOTIFICATIONS")]
    MissedCheckRequested,
}
