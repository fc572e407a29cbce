//! The service-worker lifecycle controller.

use std::sync::{Arc, Mutex};

use async_channel::{Receiver, Sender};
use once_cell::sync::Lazy;
use url::Url;
use uuid::Uuid;

use crate::logger::Logger;
use crate::platform::web::{
    CacheStore, Network, NotificationDisplay, ShownNotification, WebRequest, WebResponse,
    WindowClients,
};
use crate::util::ids::synthesized_message_id;
use crate::worker::cache::{self, OFFLINE_PAGE_PATH};
use crate::worker::error::{invalid_scope, WorkerResult};
use crate::worker::events::parse_push_payload;
use crate::worker::lifecycle::{WorkerRegistration, WorkerState};
use crate::worker::messages::{PageMessage, ProviderConfig, WorkerSignal, SYNC_CHECK_MISSED_TAG};

static LOGGER: Lazy<Logger> = Lazy::new(|| Logger::new("push-worker"));

/// Host surfaces available inside the worker context.
#[derive(Clone)]
pub struct WorkerEnv {
    pub network: Arc<dyn Network>,
    pub caches: Arc<dyn CacheStore>,
    pub notifications: Arc<dyn NotificationDisplay>,
    pub windows: Arc<dyn WindowClients>,
}

impl WorkerEnv {
    /// In-process environment used on native targets and in tests.
    pub fn memory() -> Self {
        use crate::platform::memory::{
            MemoryCaches, MemoryNetwork, MemoryNotifications, MemoryWindows,
        };
        Self {
            network: Arc::new(MemoryNetwork::new()),
            caches: Arc::new(MemoryCaches::new()),
            notifications: Arc::new(MemoryNotifications::new()),
            windows: Arc::new(MemoryWindows::new()),
        }
    }
}

struct PageLink {
    id: String,
    sender: Sender<WorkerSignal>,
}

/// Owns the worker registration for one scope and implements every worker
/// event handler. All other components reach the registration only through
/// this controller.
pub struct ServiceWorkerController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    env: WorkerEnv,
    scope: Url,
    assets: Vec<String>,
    cache_version: String,
    // Async mutex: held across install/activate awaits so concurrent
    // register() calls collapse onto one registration.
    registration: async_lock::Mutex<Option<WorkerRegistration>>,
    pages: Mutex<Vec<PageLink>>,
    provider_config: Mutex<Option<ProviderConfig>>,
}

impl Clone for ServiceWorkerController {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl ServiceWorkerController {
    pub fn new(
        env: WorkerEnv,
        scope: Url,
        assets: Vec<String>,
        cache_version: impl Into<String>,
    ) -> WorkerResult<Self> {
        if scope.cannot_be_a_base() {
            return Err(invalid_scope(format!(
                "worker scope '{scope}' cannot be a base URL"
            )));
        }
        Ok(Self {
            inner: Arc::new(ControllerInner {
                env,
                scope,
                assets,
                cache_version: cache_version.into(),
                registration: async_lock::Mutex::new(None),
                pages: Mutex::new(Vec::new()),
                provider_config: Mutex::new(None),
            }),
        })
    }

    pub fn scope(&self) -> &Url {
        &self.inner.scope
    }

    fn cache_name(&self) -> String {
        cache::cache_name(&self.inner.cache_version)
    }

    /// Attaches a page context and returns its signal channel. The page sees
    /// every broadcast plus acknowledgements addressed to it.
    pub fn connect_page(&self) -> (String, Receiver<WorkerSignal>) {
        let (sender, receiver) = async_channel::unbounded();
        let id = Uuid::new_v4().to_string();
        self.inner.pages.lock().unwrap().push(PageLink {
            id: id.clone(),
            sender,
        });
        (id, receiver)
    }

    pub fn disconnect_page(&self, page_id: &str) {
        self.inner
            .pages
            .lock()
            .unwrap()
            .retain(|link| link.id != page_id);
    }

    /// Registers the worker for this controller's scope.
    ///
    /// Idempotent: an existing live registration is returned untouched, and
    /// concurrent callers share one install. A fresh install pre-populates
    /// the offline cache, activates immediately (skip-waiting), purges
    /// caches from older deployments, and broadcasts [`WorkerSignal::Activated`].
    pub async fn register(&self) -> WorkerResult<WorkerRegistration> {
        let mut slot = self.inner.registration.lock().await;
        if let Some(existing) = slot.as_ref() {
            if existing.state() != WorkerState::Redundant {
                return Ok(existing.clone());
            }
        }

        let registration = WorkerRegistration::new(self.inner.scope.clone());
        registration.transition(WorkerState::Installing)?;

        let cache_name = self.cache_name();
        if let Err(err) = cache::precache(
            &self.inner.env.network,
            &self.inner.env.caches,
            &cache_name,
            &self.inner.scope,
            &self.inner.assets,
        )
        .await
        {
            LOGGER.warn(format!("worker install failed: {err}"));
            let _ = registration.transition(WorkerState::Redundant);
            return Err(err);
        }
        registration.transition(WorkerState::Installed)?;

        // Skip waiting: activate without waiting for open tabs to close.
        registration.transition(WorkerState::Activating)?;
        let purged = cache::purge_stale(&self.inner.env.caches, &cache_name).await;
        if purged > 0 {
            LOGGER.debug(format!("purged {purged} stale offline cache(s)"));
        }
        registration.transition(WorkerState::Activated)?;

        *slot = Some(registration.clone());
        drop(slot);

        self.broadcast(WorkerSignal::Activated);
        Ok(registration)
    }

    /// The current registration, if one reached activation.
    pub async fn registration(&self) -> Option<WorkerRegistration> {
        self.inner.registration.lock().await.clone()
    }

    /// Push event handler. Malformed payloads degrade to a generic
    /// notification; this never fails and never panics.
    pub async fn handle_push(&self, payload: &[u8]) {
        let message = parse_push_payload(payload);
        let tag = message
            .id
            .clone()
            .unwrap_or_else(synthesized_message_id);
        self.inner.env.notifications.show(ShownNotification {
            tag,
            title: message.title,
            body: message.body,
            icon: message.icon,
            link: message.link,
        });
    }

    /// Notification-click handler: close, then focus an existing tab already
    /// at the target URL or open a new one.
    pub async fn handle_notification_click(&self, tag: &str, link: Option<&str>) {
        self.inner.env.notifications.close(tag);

        let target = link
            .map(str::to_string)
            .unwrap_or_else(|| self.inner.scope.to_string());

        let existing = self
            .inner
            .env
            .windows
            .list()
            .into_iter()
            .find(|client| client.url == target);

        match existing {
            Some(client) => {
                if !self.inner.env.windows.focus(&client.id) {
                    self.inner.env.windows.open(&target);
                }
            }
            None => {
                self.inner.env.windows.open(&target);
            }
        }
    }

    /// Fetch handler: network-first for same-origin GETs with cache
    /// fallback, then the offline page for navigations or a synthetic 503.
    /// Returns `None` for requests the worker does not intercept.
    pub async fn handle_fetch(&self, request: &WebRequest) -> Option<WebResponse> {
        if request.method != "GET" || request.url.origin() != self.inner.scope.origin() {
            return None;
        }

        let cache_name = self.cache_name();
        match self.inner.env.network.fetch(request).await {
            Ok(response) => {
                if response.status == 200 {
                    self.inner
                        .env
                        .caches
                        .put(&cache_name, &request.url, response.clone())
                        .await;
                }
                Some(response)
            }
            Err(err) => {
                LOGGER.debug(format!("network-first fetch failed, trying cache: {err}"));
                if let Some(cached) = self
                    .inner
                    .env
                    .caches
                    .lookup(&cache_name, &request.url)
                    .await
                {
                    return Some(cached);
                }
                if request.is_navigation {
                    if let Ok(offline_url) = cache::resolve_asset(&self.inner.scope, OFFLINE_PAGE_PATH)
                    {
                        if let Some(page) =
                            self.inner.env.caches.lookup(&cache_name, &offline_url).await
                        {
                            return Some(page);
                        }
                    }
                }
                Some(WebResponse::status_only(503))
            }
        }
    }

    /// Message handler: stores delivered provider credentials and
    /// acknowledges to the sending page only.
    pub async fn handle_message(&self, page_id: &str, message: PageMessage) {
        match message {
            PageMessage::ProviderConfig { config } => {
                *self.inner.provider_config.lock().unwrap() = Some(config);
                if !self.send_to(page_id, WorkerSignal::ConfigReceived) {
                    LOGGER.debug(format!(
                        "config acknowledgement dropped, page {page_id} is gone"
                    ));
                }
            }
        }
    }

    /// Sync handler: the missed-check tag asks every page to reconcile its
    /// feed; unknown tags are ignored.
    pub async fn handle_sync(&self, tag: &str) {
        if tag == SYNC_CHECK_MISSED_TAG {
            self.broadcast(WorkerSignal::MissedCheckRequested);
        } else {
            LOGGER.debug(format!("ignoring sync event with tag '{tag}'"));
        }
    }

    pub fn provider_config(&self) -> Option<ProviderConfig> {
        self.inner.provider_config.lock().unwrap().clone()
    }

    fn broadcast(&self, signal: WorkerSignal) {
        self.inner
            .pages
            .lock()
            .unwrap()
            .retain(|link| link.sender.try_send(signal.clone()).is_ok());
    }

    fn send_to(&self, page_id: &str, signal: WorkerSignal) -> bool {
        let pages = self.inner.pages.lock().unwrap();
        match pages.iter().find(|link| link.id == page_id) {
            Some(link) => link.sender.try_send(signal).is_ok(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::memory::{
        MemoryCaches, MemoryNetwork, MemoryNotifications, MemoryWindows,
    };
    use crate::worker::events::FALLBACK_TITLE;

    struct Harness {
        controller: ServiceWorkerController,
        network: MemoryNetwork,
        caches: MemoryCaches,
        notifications: MemoryNotifications,
        windows: MemoryWindows,
    }

    fn scope() -> Url {
        Url::parse("https://app.test/").unwrap()
    }

    fn assets() -> Vec<String> {
        vec!["/".to_string(), OFFLINE_PAGE_PATH.to_string()]
    }

    fn harness() -> Harness {
        let network = MemoryNetwork::new();
        let caches = MemoryCaches::new();
        let notifications = MemoryNotifications::new();
        let windows = MemoryWindows::new();

        for asset in assets() {
            let url = scope().join(&asset).unwrap();
            network.route(&url, WebResponse::ok("text/html", asset));
        }

        let env = WorkerEnv {
            network: Arc::new(network.clone()),
            caches: Arc::new(caches.clone()),
            notifications: Arc::new(notifications.clone()),
            windows: Arc::new(windows.clone()),
        };
        let controller =
            ServiceWorkerController::new(env, scope(), assets(), "v2").expect("controller");

        Harness {
            controller,
            network,
            caches,
            notifications,
            windows,
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn register_installs_precaches_and_activates() {
        let h = harness();
        let registration = h.controller.register().await.unwrap();

        assert!(registration.is_active());
        assert_eq!(h.caches.entry_count(&cache::cache_name("v2")), 2);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn register_is_idempotent() {
        let h = harness();
        let first = h.controller.register().await.unwrap();
        let requests_after_first = h.network.requests().len();
        let second = h.controller.register().await.unwrap();

        assert_eq!(first.state(), second.state());
        // No second install pass hit the network.
        assert_eq!(h.network.requests().len(), requests_after_first);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn concurrent_registers_share_one_install() {
        let h = harness();
        let (_page, signals) = h.controller.connect_page();

        let (a, b) = tokio::join!(h.controller.register(), h.controller.register());
        assert!(a.unwrap().is_active());
        assert!(b.unwrap().is_active());

        // One install => one set of precache fetches and one activation
        // broadcast.
        assert_eq!(h.network.requests().len(), assets().len());
        assert_eq!(signals.try_recv().unwrap(), WorkerSignal::Activated);
        assert!(signals.try_recv().is_err());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn failed_install_is_reported_and_retryable() {
        let h = harness();
        h.network.set_offline(true);

        let err = h.controller.register().await.unwrap_err();
        assert_eq!(err.code_str(), "worker/install-failed");
        assert!(h.controller.registration().await.is_none());

        h.network.set_offline(false);
        let registration = h.controller.register().await.unwrap();
        assert!(registration.is_active());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn activation_purges_stale_version_caches() {
        let h = harness();
        let old = cache::cache_name("v1");
        h.caches
            .put(&old, &scope(), WebResponse::ok("text/html", "old"))
            .await;

        h.controller.register().await.unwrap();

        let names = h.caches.names().await;
        assert!(!names.contains(&old));
        assert!(names.contains(&cache::cache_name("v2")));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn push_shows_native_notification_with_link() {
        let h = harness();
        h.controller
            .handle_push(br#"{"notification": {"title": "Blood needed", "body": "O-"}, "data": {"url": "/requests/42"}}"#)
            .await;

        let shown = h.notifications.shown();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].title, "Blood needed");
        assert_eq!(shown[0].link.as_deref(), Some("/requests/42"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn malformed_push_still_displays_a_notification() {
        let h = harness();
        h.controller.handle_push(&[0xff, 0x00, 0x80]).await;

        let shown = h.notifications.shown();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].title, FALLBACK_TITLE);
        assert!(!shown[0].title.is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn one_push_yields_one_notification_even_after_concurrent_registers() {
        let h = harness();
        let (a, b) = tokio::join!(h.controller.register(), h.controller.register());
        a.unwrap();
        b.unwrap();

        h.controller.handle_push(b"plain text alert").await;
        assert_eq!(h.notifications.shown().len(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn click_focuses_existing_tab_with_target_url() {
        let h = harness();
        let open = h.windows.add_client("https://app.test/requests/42");

        h.controller
            .handle_notification_click("tag-1", Some("https://app.test/requests/42"))
            .await;

        assert_eq!(h.windows.focused().unwrap().id, open.id);
        assert_eq!(h.windows.list().len(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn click_opens_new_tab_when_none_matches() {
        let h = harness();
        h.windows.add_client("https://app.test/blog");

        h.controller
            .handle_notification_click("tag-1", Some("https://app.test/requests/42"))
            .await;

        let clients = h.windows.list();
        assert_eq!(clients.len(), 2);
        assert_eq!(
            h.windows.focused().unwrap().url,
            "https://app.test/requests/42"
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn click_closes_the_notification() {
        let h = harness();
        h.controller.handle_push(b"note").await;
        let tag = h.notifications.shown()[0].tag.clone();

        h.controller.handle_notification_click(&tag, None).await;
        assert!(h.notifications.shown().is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn fetch_caches_successful_responses_for_offline_use() {
        let h = harness();
        h.controller.register().await.unwrap();

        let url = scope().join("/requests").unwrap();
        h.network.route(&url, WebResponse::ok("text/html", "requests"));
        let request = WebRequest::get(url);

        let online = h.controller.handle_fetch(&request).await.unwrap();
        assert_eq!(online.status, 200);

        h.network.set_offline(true);
        let offline = h.controller.handle_fetch(&request).await.unwrap();
        assert_eq!(offline.body, b"requests");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn offline_navigation_without_cache_falls_back_to_offline_page() {
        let h = harness();
        h.controller.register().await.unwrap();
        h.network.set_offline(true);

        let request = WebRequest::navigation(scope().join("/never-seen").unwrap());
        let response = h.controller.handle_fetch(&request).await.unwrap();

        assert_eq!(response.body, OFFLINE_PAGE_PATH.as_bytes());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn offline_subresource_without_cache_gets_a_503() {
        let h = harness();
        h.controller.register().await.unwrap();
        h.network.set_offline(true);

        let request = WebRequest::get(scope().join("/api/not-cached.js").unwrap());
        let response = h.controller.handle_fetch(&request).await.unwrap();
        assert_eq!(response.status, 503);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn cross_origin_and_non_get_requests_pass_through() {
        let h = harness();
        h.controller.register().await.unwrap();

        let cross = WebRequest::get(Url::parse("https://cdn.other.test/lib.js").unwrap());
        assert!(h.controller.handle_fetch(&cross).await.is_none());

        let post = WebRequest::post(scope().join("/api/reviews").unwrap());
        assert!(h.controller.handle_fetch(&post).await.is_none());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn config_message_is_acked_to_sender_only() {
        let h = harness();
        let (page_a, signals_a) = h.controller.connect_page();
        let (_page_b, signals_b) = h.controller.connect_page();

        h.controller
            .handle_message(
                &page_a,
                PageMessage::ProviderConfig {
                    config: ProviderConfig {
                        sender_id: Some("473829110".to_string()),
                        ..Default::default()
                    },
                },
            )
            .await;

        assert_eq!(signals_a.try_recv().unwrap(), WorkerSignal::ConfigReceived);
        assert!(signals_b.try_recv().is_err());
        assert_eq!(
            h.controller.provider_config().unwrap().sender_id.as_deref(),
            Some("473829110")
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn sync_with_missed_tag_broadcasts_reconciliation_request() {
        let h = harness();
        let (_page, signals) = h.controller.connect_page();

        h.controller.handle_sync("unrelated-tag").await;
        assert!(signals.try_recv().is_err());

        h.controller.handle_sync(SYNC_CHECK_MISSED_TAG).await;
        assert_eq!(
            signals.try_recv().unwrap(),
            WorkerSignal::MissedCheckRequested
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn disconnected_pages_stop_receiving_broadcasts() {
        let h = harness();
        let (page, signals) = h.controller.connect_page();
        h.controller.disconnect_page(&page);
        drop(signals);

        h.controller.register().await.unwrap();
        // Nothing to assert beyond not panicking on the closed channel.
        assert!(h.controller.registration().await.is_some());
    }
}
