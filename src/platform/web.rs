//! Trait seams over the browser-like host environment.

use async_trait::async_trait;
use url::Url;

/// Native notification permission as reported by the host.
///
/// `Default` means the user has not decided; only an explicit user response
/// moves it to `Granted` or `Denied`, never the application.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NativePermission {
    Default,
    Granted,
    Denied,
}

/// Host capabilities the push pipeline depends on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub notifications: bool,
    pub push: bool,
    pub service_worker: bool,
    pub durable_storage: bool,
}

impl Capabilities {
    pub fn all() -> Self {
        Self {
            notifications: true,
            push: true,
            service_worker: true,
            durable_storage: true,
        }
    }

    /// True when every API required for push delivery is present.
    pub fn push_ready(&self) -> bool {
        self.notifications && self.push && self.service_worker && self.durable_storage
    }
}

/// The host's notification-permission surface.
#[async_trait]
pub trait PermissionSurface: Send + Sync {
    fn capabilities(&self) -> Capabilities;

    /// Current permission without prompting.
    fn current_permission(&self) -> NativePermission;

    /// Shows the native permission prompt and resolves with the user's
    /// response. May pend indefinitely if the user never responds.
    async fn request_permission(&self) -> NativePermission;
}

/// Durable string key/value storage scoped to the browser profile.
pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// A request as seen by the worker fetch handler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebRequest {
    pub method: String,
    pub url: Url,
    /// True for top-level HTML navigations, which fall back to the offline
    /// page rather than a synthetic error response.
    pub is_navigation: bool,
}

impl WebRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: "GET".to_string(),
            url,
            is_navigation: false,
        }
    }

    pub fn navigation(url: Url) -> Self {
        Self {
            method: "GET".to_string(),
            url,
            is_navigation: true,
        }
    }

    pub fn post(url: Url) -> Self {
        Self {
            method: "POST".to_string(),
            url,
            is_navigation: false,
        }
    }
}

/// A response flowing through the worker fetch handler or a cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl WebResponse {
    pub fn ok(content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            content_type: Some(content_type.to_string()),
            body: body.into(),
        }
    }

    pub fn status_only(status: u16) -> Self {
        Self {
            status,
            content_type: None,
            body: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetworkError {
    /// The host is offline or the connection could not be established.
    Offline,
    Failed(String),
}

impl std::fmt::Display for NetworkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkError::Offline => write!(f, "network unreachable"),
            NetworkError::Failed(reason) => write!(f, "request failed: {reason}"),
        }
    }
}

impl std::error::Error for NetworkError {}

/// Raw fetch as available inside a worker context.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &WebRequest) -> Result<WebResponse, NetworkError>;
}

/// Named response caches (the CacheStorage surface).
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn put(&self, cache: &str, url: &Url, response: WebResponse);
    async fn lookup(&self, cache: &str, url: &Url) -> Option<WebResponse>;
    async fn names(&self) -> Vec<String>;
    async fn remove(&self, cache: &str) -> bool;
}

/// A native notification as handed to the host for display.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShownNotification {
    /// Host-side identity; closing and click events refer to it.
    pub tag: String,
    pub title: String,
    pub body: String,
    pub icon: Option<String>,
    /// Deep link carried in the notification data, opened on click.
    pub link: Option<String>,
}

pub trait NotificationDisplay: Send + Sync {
    fn show(&self, notification: ShownNotification);
    fn close(&self, tag: &str);
}

/// An open page (window client) of the application origin.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageClient {
    pub id: String,
    pub url: String,
    pub focused: bool,
}

pub trait WindowClients: Send + Sync {
    fn list(&self) -> Vec<PageClient>;
    /// Focuses the client with the given id; false when it no longer exists.
    fn focus(&self, id: &str) -> bool;
    fn open(&self, url: &str) -> Option<PageClient>;
}
