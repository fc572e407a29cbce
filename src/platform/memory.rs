//! In-process implementations of the [`web`](super::web) seams.
//!
//! These back the SDK on native targets and give tests a scriptable host:
//! the permission surface replays a configured user response, the network
//! serves programmed routes and can be switched offline, and the
//! notification/window surfaces record what the worker asked the host to do.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use url::Url;
use uuid::Uuid;

use crate::platform::web::{
    CacheStore, Capabilities, KeyValueStorage, NativePermission, Network, NetworkError,
    NotificationDisplay, PageClient, PermissionSurface, ShownNotification, WebRequest, WebResponse,
    WindowClients,
};

#[derive(Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries.lock().unwrap().remove(key);
    }
}

#[derive(Clone)]
pub struct MemoryPermission {
    inner: Arc<MemoryPermissionInner>,
}

struct MemoryPermissionInner {
    capabilities: Mutex<Capabilities>,
    current: Mutex<NativePermission>,
    /// What the simulated user answers when prompted.
    response: Mutex<NativePermission>,
    prompts_shown: Mutex<u32>,
}

impl MemoryPermission {
    /// Permission surface in the undecided state whose simulated user grants
    /// when prompted.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryPermissionInner {
                capabilities: Mutex::new(Capabilities::all()),
                current: Mutex::new(NativePermission::Default),
                response: Mutex::new(NativePermission::Granted),
                prompts_shown: Mutex::new(0),
            }),
        }
    }

    pub fn set_capabilities(&self, capabilities: Capabilities) {
        *self.inner.capabilities.lock().unwrap() = capabilities;
    }

    pub fn set_current(&self, permission: NativePermission) {
        *self.inner.current.lock().unwrap() = permission;
    }

    /// Scripts the user's answer to the next prompt.
    pub fn respond_with(&self, permission: NativePermission) {
        *self.inner.response.lock().unwrap() = permission;
    }

    pub fn prompts_shown(&self) -> u32 {
        *self.inner.prompts_shown.lock().unwrap()
    }
}

impl Default for MemoryPermission {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PermissionSurface for MemoryPermission {
    fn capabilities(&self) -> Capabilities {
        *self.inner.capabilities.lock().unwrap()
    }

    fn current_permission(&self) -> NativePermission {
        *self.inner.current.lock().unwrap()
    }

    async fn request_permission(&self) -> NativePermission {
        *self.inner.prompts_shown.lock().unwrap() += 1;
        let response = *self.inner.response.lock().unwrap();
        // The prompt only ever narrows an undecided state.
        if self.current_permission() == NativePermission::Default {
            *self.inner.current.lock().unwrap() = response;
        }
        self.current_permission()
    }
}

#[derive(Clone, Default)]
pub struct MemoryNetwork {
    inner: Arc<MemoryNetworkInner>,
}

#[derive(Default)]
struct MemoryNetworkInner {
    routes: Mutex<HashMap<String, WebResponse>>,
    offline: AtomicBool,
    requests: Mutex<Vec<WebRequest>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&self, url: &Url, response: WebResponse) {
        self.inner
            .routes
            .lock()
            .unwrap()
            .insert(url.to_string(), response);
    }

    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<WebRequest> {
        self.inner.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Network for MemoryNetwork {
    async fn fetch(&self, request: &WebRequest) -> Result<WebResponse, NetworkError> {
        self.inner.requests.lock().unwrap().push(request.clone());
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(NetworkError::Offline);
        }
        match self.inner.routes.lock().unwrap().get(request.url.as_str()) {
            Some(response) => Ok(response.clone()),
            None => Ok(WebResponse::status_only(404)),
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryCaches {
    caches: Arc<Mutex<HashMap<String, HashMap<String, WebResponse>>>>,
}

impl MemoryCaches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry_count(&self, cache: &str) -> usize {
        self.caches
            .lock()
            .unwrap()
            .get(cache)
            .map(|entries| entries.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl CacheStore for MemoryCaches {
    async fn put(&self, cache: &str, url: &Url, response: WebResponse) {
        self.caches
            .lock()
            .unwrap()
            .entry(cache.to_string())
            .or_default()
            .insert(url.to_string(), response);
    }

    async fn lookup(&self, cache: &str, url: &Url) -> Option<WebResponse> {
        self.caches
            .lock()
            .unwrap()
            .get(cache)
            .and_then(|entries| entries.get(url.as_str()).cloned())
    }

    async fn names(&self) -> Vec<String> {
        self.caches.lock().unwrap().keys().cloned().collect()
    }

    async fn remove(&self, cache: &str) -> bool {
        self.caches.lock().unwrap().remove(cache).is_some()
    }
}

#[derive(Clone, Default)]
pub struct MemoryNotifications {
    inner: Arc<Mutex<Vec<ShownNotification>>>,
}

impl MemoryNotifications {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shown(&self) -> Vec<ShownNotification> {
        self.inner.lock().unwrap().clone()
    }
}

impl NotificationDisplay for MemoryNotifications {
    fn show(&self, notification: ShownNotification) {
        self.inner.lock().unwrap().push(notification);
    }

    fn close(&self, tag: &str) {
        self.inner.lock().unwrap().retain(|n| n.tag != tag);
    }
}

#[derive(Clone, Default)]
pub struct MemoryWindows {
    clients: Arc<Mutex<Vec<PageClient>>>,
}

impl MemoryWindows {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates a page the user already has open.
    pub fn add_client(&self, url: &str) -> PageClient {
        let client = PageClient {
            id: Uuid::new_v4().to_string(),
            url: url.to_string(),
            focused: false,
        };
        self.clients.lock().unwrap().push(client.clone());
        client
    }

    pub fn focused(&self) -> Option<PageClient> {
        self.clients
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.focused)
            .cloned()
    }
}

impl WindowClients for MemoryWindows {
    fn list(&self) -> Vec<PageClient> {
        self.clients.lock().unwrap().clone()
    }

    fn focus(&self, id: &str) -> bool {
        let mut clients = self.clients.lock().unwrap();
        let exists = clients.iter().any(|c| c.id == id);
        if exists {
            for client in clients.iter_mut() {
                client.focused = client.id == id;
            }
        }
        exists
    }

    fn open(&self, url: &str) -> Option<PageClient> {
        let client = PageClient {
            id: Uuid::new_v4().to_string(),
            url: url.to_string(),
            focused: true,
        };
        let mut clients = self.clients.lock().unwrap();
        for existing in clients.iter_mut() {
            existing.focused = false;
        }
        clients.push(client.clone());
        Some(client)
    }
}
