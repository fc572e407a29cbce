//! Client-side cache of the persisted notification feed.
//!
//! Pages are fetched from the backend ordered by creation time descending;
//! page 1 replaces the cache, later pages append. Mutations are optimistic:
//! local state flips first, the backend call follows, and a backend failure
//! is logged while the optimistic state is retained — the interaction is
//! never blocked or rolled back, accepting eventual drift by design of the
//! UI contract.

use std::sync::{Arc, Mutex};

use crate::logger::Logger;
use crate::messaging::error::MessagingResult;
use crate::messaging::rest::BackendClient;
use crate::messaging::types::FeedNotification;

#[derive(Clone, Debug, Default)]
pub struct FeedSnapshot {
    pub items: Vec<FeedNotification>,
    pub unread: u32,
    pub has_more: bool,
}

#[derive(Default)]
struct FeedState {
    items: Vec<FeedNotification>,
    unread: u32,
    has_more: bool,
}

#[derive(Clone)]
pub struct FeedStore {
    inner: Arc<FeedInner>,
}

struct FeedInner {
    backend: Arc<BackendClient>,
    state: Mutex<FeedState>,
    logger: Logger,
}

impl FeedStore {
    pub fn new(backend: Arc<BackendClient>) -> Self {
        Self {
            inner: Arc::new(FeedInner {
                backend,
                state: Mutex::new(FeedState::default()),
                logger: Logger::new("push-feed"),
            }),
        }
    }

    pub fn logger(&self) -> &Logger {
        &self.inner.logger
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        let state = self.inner.state.lock().unwrap();
        FeedSnapshot {
            items: state.items.clone(),
            unread: state.unread,
            has_more: state.has_more,
        }
    }

    pub fn unread_count(&self) -> u32 {
        self.inner.state.lock().unwrap().unread
    }

    /// Fetches one feed page. Page 1 replaces the cache and adopts the
    /// server's unread count; later pages append, skipping ids already
    /// present (for instance items that arrived live in the meantime).
    pub async fn load(&self, page: u32, limit: u32) -> MessagingResult<FeedSnapshot> {
        let fetched = self.inner.backend.fetch_feed(page, limit).await?;
        let has_more = fetched.notifications.len() as u32 == limit && limit > 0;

        let mut state = self.inner.state.lock().unwrap();
        if page <= 1 {
            state.items = fetched.notifications;
            state.unread = fetched.unread_count;
        } else {
            for item in fetched.notifications {
                if !state.items.iter().any(|existing| existing.id == item.id) {
                    state.items.push(item);
                }
            }
        }
        state.has_more = has_more;

        Ok(FeedSnapshot {
            items: state.items.clone(),
            unread: state.unread,
            has_more: state.has_more,
        })
    }

    /// Inserts a live-delivered record at the front. A record whose id is
    /// already cached is ignored so the unread count never double-counts.
    pub fn prepend_live(&self, record: FeedNotification) -> bool {
        let mut state = self.inner.state.lock().unwrap();
        if state.items.iter().any(|existing| existing.id == record.id) {
            return false;
        }
        if !record.is_read {
            state.unread += 1;
        }
        state.items.insert(0, record);
        true
    }

    /// Optimistically marks a record read. Unknown or already-read ids are
    /// no-ops (no backend call), making rapid repeated clicks safe.
    pub async fn mark_as_read(&self, id: &str) -> bool {
        let flipped = {
            let mut state = self.inner.state.lock().unwrap();
            let flipped = match state.items.iter_mut().find(|item| item.id == id) {
                Some(item) if !item.is_read => {
                    item.is_read = true;
                    true
                }
                _ => false,
            };
            if flipped {
                state.unread = state.unread.saturating_sub(1);
            }
            flipped
        };
        if !flipped {
            return false;
        }

        if let Err(err) = self.inner.backend.mark_read(id).await {
            self.inner
                .logger
                .warn(format!("mark-as-read of {id} failed on the backend: {err}"));
        }
        true
    }

    /// Optimistic bulk flip with a single backend call. Returns how many
    /// records flipped locally.
    pub async fn mark_all_as_read(&self) -> u32 {
        let flipped = {
            let mut state = self.inner.state.lock().unwrap();
            let mut flipped = 0;
            for item in state.items.iter_mut() {
                if !item.is_read {
                    item.is_read = true;
                    flipped += 1;
                }
            }
            state.unread = 0;
            flipped
        };

        if let Err(err) = self.inner.backend.mark_all_read().await {
            self.inner
                .logger
                .warn(format!("mark-all-read failed on the backend: {err}"));
        }
        flipped
    }

    /// Optimistically removes a record; an unread removal decrements the
    /// counter. Unknown ids are no-ops.
    pub async fn remove(&self, id: &str) -> bool {
        let removed = {
            let mut state = self.inner.state.lock().unwrap();
            match state.items.iter().position(|item| item.id == id) {
                Some(index) => {
                    let item = state.items.remove(index);
                    if !item.is_read {
                        state.unread = state.unread.saturating_sub(1);
                    }
                    true
                }
                None => false,
            }
        };
        if !removed {
            return false;
        }

        if let Err(err) = self.inner.backend.delete_notification(id).await {
            self.inner
                .logger
                .warn(format!("delete of {id} failed on the backend: {err}"));
        }
        true
    }

    /// Asks the backend how many notifications arrived since the last
    /// session. Used by passive reconciliation after a gap.
    pub async fn check_missed(&self) -> MessagingResult<u32> {
        self.inner.backend.check_missed().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::LogLevel;
    use chrono::Utc;
    use httpmock::prelude::*;
    use serde_json::json;

    fn store(server: &MockServer) -> FeedStore {
        let backend = Arc::new(BackendClient::new(&server.base_url(), "session").unwrap());
        let store = FeedStore::new(backend);
        store.logger().set_log_level(LogLevel::Silent);
        store
    }

    fn feed_item(id: &str, is_read: bool) -> serde_json::Value {
        json!({
            "id": id,
            "title": format!("Notification {id}"),
            "body": "body",
            "isRead": is_read,
            "createdAt": "2026-07-01T10:15:00Z"
        })
    }

    fn live_record(id: &str) -> FeedNotification {
        FeedNotification {
            id: id.to_string(),
            title: format!("Live {id}"),
            body: "body".to_string(),
            url: None,
            is_read: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn first_page_replaces_and_adopts_server_unread_count() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/notifications")
                .query_param("page", "1");
            then.status(200).json_body(json!({
                "notifications": [feed_item("n-1", false), feed_item("n-2", true)],
                "unreadCount": 5
            }));
        });

        let store = store(&server);
        store.prepend_live(live_record("stale"));

        let snapshot = store.load(1, 2).await.unwrap();
        assert_eq!(snapshot.items.len(), 2);
        assert_eq!(snapshot.unread, 5);
        assert!(snapshot.has_more);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn short_page_clears_has_more() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/notifications");
            then.status(200).json_body(json!({
                "notifications": [feed_item("n-1", true)],
                "unreadCount": 0
            }));
        });

        let snapshot = store(&server).load(1, 20).await.unwrap();
        assert!(!snapshot.has_more);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn later_pages_append_and_skip_live_duplicates() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/notifications")
                .query_param("page", "2");
            then.status(200).json_body(json!({
                "notifications": [feed_item("live-1", false), feed_item("n-3", false)],
                "unreadCount": 2
            }));
        });

        let store = store(&server);
        assert!(store.prepend_live(live_record("live-1")));
        assert_eq!(store.unread_count(), 1);

        let snapshot = store.load(2, 2).await.unwrap();
        // live-1 was already present: appended page contributes only n-3,
        // and the unread count is not double-bumped.
        assert_eq!(snapshot.items.len(), 2);
        assert_eq!(snapshot.unread, 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn duplicate_live_prepend_is_ignored() {
        let server = MockServer::start();
        let store = store(&server);

        assert!(store.prepend_live(live_record("live-1")));
        assert!(!store.prepend_live(live_record("live-1")));
        assert_eq!(store.unread_count(), 1);
        assert_eq!(store.snapshot().items.len(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn mark_as_read_is_idempotent_and_tolerates_unknown_ids() {
        let server = MockServer::start();
        let mark = server.mock(|when, then| {
            when.method("PATCH").path("/notifications/live-1/read");
            then.status(200).json_body(json!({"success": true}));
        });

        let store = store(&server);
        store.prepend_live(live_record("live-1"));

        assert!(store.mark_as_read("live-1").await);
        assert_eq!(store.unread_count(), 0);

        // Second click before/after the first resolved: no-op, no extra call.
        assert!(!store.mark_as_read("live-1").await);
        assert!(!store.mark_as_read("missing").await);
        mark.assert_hits(1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn backend_failure_keeps_optimistic_state() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("PATCH").path("/notifications/live-1/read");
            then.status(503);
        });

        let store = store(&server);
        store.prepend_live(live_record("live-1"));

        assert!(store.mark_as_read("live-1").await);
        // Local state stays flipped despite the backend failure.
        assert!(store.snapshot().items[0].is_read);
        assert_eq!(store.unread_count(), 0);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn mark_all_flips_everything_with_one_call() {
        let server = MockServer::start();
        let mark_all = server.mock(|when, then| {
            when.method(POST).path("/notifications/read-all");
            then.status(200).json_body(json!({"success": true}));
        });

        let store = store(&server);
        store.prepend_live(live_record("a"));
        store.prepend_live(live_record("b"));

        assert_eq!(store.mark_all_as_read().await, 2);
        assert_eq!(store.unread_count(), 0);
        assert!(store.snapshot().items.iter().all(|item| item.is_read));
        mark_all.assert_hits(1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn remove_decrements_unread_only_for_unread_items() {
        let server = MockServer::start();
        let delete = server.mock(|when, then| {
            when.method(DELETE).path_matches(Regex::new("/notifications/.*").unwrap());
            then.status(200).json_body(json!({"success": true}));
        });

        let store = store(&server);
        store.prepend_live(live_record("a"));
        store.prepend_live(live_record("b"));
        store.mark_as_read("a").await;
        assert_eq!(store.unread_count(), 1);

        assert!(store.remove("a").await);
        assert_eq!(store.unread_count(), 1);
        assert!(store.remove("b").await);
        assert_eq!(store.unread_count(), 0);
        assert!(!store.remove("b").await);
        delete.assert_hits(2);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn check_missed_reports_backend_counter() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/notifications/check-missed");
            then.status(200).json_body(json!({"missedNotifications": 7}));
        });

        assert_eq!(store(&server).check_missed().await.unwrap(), 7);
    }
}
