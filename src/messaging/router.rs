//! Foreground message routing.
//!
//! While a tab is focused the provider delivers push events in-page instead
//! of through the worker, so no native notification is shown for them — the
//! router turns each payload into a feed record and a toast. De-duplication
//! against the worker's native display relies on that foreground/background
//! split; the router never asks the worker to display anything.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_channel::{Receiver, Sender};
use chrono::Utc;

use crate::logger::Logger;
use crate::messaging::feed::FeedStore;
use crate::messaging::types::{
    FeedNotification, MessageHandler, MessagePayload, Unsubscribe,
};
use crate::util::ids::synthesized_message_id;
use crate::worker::events::{FALLBACK_BODY, FALLBACK_TITLE};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToastKind {
    /// A live notification arrived.
    Incoming,
    /// A user-initiated operation failed; carries a human-readable reason.
    Failure,
}

/// A visual alert for the embedding UI to render.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToastEvent {
    pub kind: ToastKind,
    pub title: String,
    pub body: String,
    pub link: Option<String>,
}

struct HandlerEntry {
    id: usize,
    handler: MessageHandler,
}

#[derive(Clone)]
pub struct ForegroundRouter {
    inner: Arc<RouterInner>,
}

struct RouterInner {
    feed: FeedStore,
    handler: Mutex<Option<HandlerEntry>>,
    next_handler_id: AtomicUsize,
    toast_tx: Sender<ToastEvent>,
    toast_rx: Receiver<ToastEvent>,
    logger: Logger,
}

impl ForegroundRouter {
    pub fn new(feed: FeedStore) -> Self {
        let (toast_tx, toast_rx) = async_channel::unbounded();
        Self {
            inner: Arc::new(RouterInner {
                feed,
                handler: Mutex::new(None),
                next_handler_id: AtomicUsize::new(1),
                toast_tx,
                toast_rx,
                logger: Logger::new("push-router"),
            }),
        }
    }

    pub fn logger(&self) -> &Logger {
        &self.inner.logger
    }

    /// Toast stream for the UI layer. Receivers are independent consumers
    /// of one queue; a single subscriber sees every toast.
    pub fn subscribe_toasts(&self) -> Receiver<ToastEvent> {
        self.inner.toast_rx.clone()
    }

    /// Installs the in-page message handler, replacing any previous one.
    /// The returned closure removes it again unless a newer handler took
    /// over in the meantime.
    pub fn on_message(&self, handler: MessageHandler) -> Unsubscribe {
        let id = self.inner.next_handler_id.fetch_add(1, Ordering::SeqCst);
        {
            let mut slot = self.inner.handler.lock().unwrap();
            *slot = Some(HandlerEntry { id, handler });
        }

        let inner = self.inner.clone();
        Box::new(move || {
            let mut slot = inner.handler.lock().unwrap();
            if slot.as_ref().map(|entry| entry.id) == Some(id) {
                *slot = None;
            }
        })
    }

    /// Dispatches one foreground payload: prepend to the feed (bumping the
    /// unread count), emit a toast, and invoke the registered handler.
    pub fn deliver(&self, payload: MessagePayload) {
        let id = payload
            .message_id
            .clone()
            .unwrap_or_else(synthesized_message_id);
        let title = payload
            .title()
            .unwrap_or(FALLBACK_TITLE)
            .to_string();
        let body = payload.body().unwrap_or(FALLBACK_BODY).to_string();
        let link = payload
            .link
            .clone()
            .or_else(|| payload.data.get("url").cloned());

        let record = FeedNotification {
            id,
            title: title.clone(),
            body: body.clone(),
            url: link.clone(),
            is_read: false,
            created_at: Utc::now(),
        };
        if !self.inner.feed.prepend_live(record) {
            self.inner
                .logger
                .debug("duplicate foreground message ignored by the feed");
        }

        self.emit_toast(ToastEvent {
            kind: ToastKind::Incoming,
            title,
            body,
            link,
        });

        let handler = {
            self.inner
                .handler
                .lock()
                .unwrap()
                .as_ref()
                .map(|entry| entry.handler.clone())
        };
        if let Some(handler) = handler {
            handler(payload);
        }
    }

    /// Surfaces a failure of an explicit user action as a toast.
    pub fn emit_failure(&self, title: &str, reason: &str) {
        self.emit_toast(ToastEvent {
            kind: ToastKind::Failure,
            title: title.to_string(),
            body: reason.to_string(),
            link: None,
        });
    }

    fn emit_toast(&self, toast: ToastEvent) {
        // Unbounded channel: try_send only fails once every receiver,
        // including the router's own, is gone.
        if self.inner.toast_tx.try_send(toast).is_err() {
            self.inner.logger.debug("toast dropped, channel closed");
        }
    }
}
