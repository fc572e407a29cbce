//! Durable persistence of the device token record.
//!
//! The record lives in client-durable storage so page loads reuse the token
//! without re-minting. A record that fails to parse is discarded and treated
//! as absent; the pipeline then mints a fresh token.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::logger::Logger;
use crate::messaging::constants::STORAGE_KEY_TOKEN;
use crate::messaging::error::{internal_error, MessagingResult};
use crate::platform::web::KeyValueStorage;

/// Client-side view of one device registration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    pub token: String,
    /// Sender the token was minted against; a mismatch forces a re-mint.
    pub sender_id: String,
    pub registered_at: DateTime<Utc>,
    pub last_refreshed_at: DateTime<Utc>,
    /// False while the backend registration call has not yet succeeded.
    /// Local persistence always precedes registration, so a crash between
    /// the two is recovered by retrying registration alone.
    pub backend_synced: bool,
}

impl TokenRecord {
    pub fn new(token: String, sender_id: String, now: DateTime<Utc>) -> Self {
        Self {
            token,
            sender_id,
            registered_at: now,
            last_refreshed_at: now,
            backend_synced: false,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now.signed_duration_since(self.last_refreshed_at) >= ttl
    }

    pub fn matches_sender(&self, sender_id: &str) -> bool {
        self.sender_id == sender_id
    }
}

pub fn read_token(storage: &dyn KeyValueStorage, logger: &Logger) -> Option<TokenRecord> {
    let raw = storage.get(STORAGE_KEY_TOKEN)?;
    match serde_json::from_str::<TokenRecord>(&raw) {
        Ok(record) => Some(record),
        Err(err) => {
            logger.warn(format!("discarding unreadable token record: {err}"));
            storage.remove(STORAGE_KEY_TOKEN);
            None
        }
    }
}

pub fn write_token(storage: &dyn KeyValueStorage, record: &TokenRecord) -> MessagingResult<()> {
    let raw = serde_json::to_string(record)
        .map_err(|err| internal_error(format!("failed to serialize token record: {err}")))?;
    storage.set(STORAGE_KEY_TOKEN, &raw);
    Ok(())
}

/// Removes the stored record; true when one existed.
pub fn remove_token(storage: &dyn KeyValueStorage) -> bool {
    let existed = storage.get(STORAGE_KEY_TOKEN).is_some();
    if existed {
        storage.remove(STORAGE_KEY_TOKEN);
    }
    existed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::memory::MemoryStorage;

    fn logger() -> Logger {
        let logger = Logger::new("test");
        logger.set_log_level(crate::logger::LogLevel::Silent);
        logger
    }

    #[test]
    fn record_round_trips_through_storage() {
        let storage = MemoryStorage::new();
        let record = TokenRecord::new("tok-1".into(), "sender".into(), Utc::now());

        write_token(&storage, &record).unwrap();
        assert_eq!(read_token(&storage, &logger()), Some(record));
        assert!(remove_token(&storage));
        assert!(!remove_token(&storage));
    }

    #[test]
    fn unreadable_record_is_discarded() {
        let storage = MemoryStorage::new();
        storage.set(STORAGE_KEY_TOKEN, "not json");

        assert!(read_token(&storage, &logger()).is_none());
        assert!(storage.get(STORAGE_KEY_TOKEN).is_none());
    }

    #[test]
    fn expiry_is_measured_from_last_refresh() {
        let minted = Utc::now();
        let mut record = TokenRecord::new("tok".into(), "sender".into(), minted);
        let ttl = Duration::days(7);

        assert!(!record.is_expired(minted + Duration::days(6), ttl));
        assert!(record.is_expired(minted + Duration::days(7), ttl));

        record.last_refreshed_at = minted + Duration::days(5);
        assert!(!record.is_expired(minted + Duration::days(7), ttl));
    }

    #[test]
    fn sender_mismatch_is_detected() {
        let record = TokenRecord::new("tok".into(), "sender-a".into(), Utc::now());
        assert!(record.matches_sender("sender-a"));
        assert!(!record.matches_sender("sender-b"));
    }
}
