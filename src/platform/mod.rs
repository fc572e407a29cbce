//! Host-environment seams.
//!
//! Everything the SDK needs from a browser-like host — durable key/value
//! storage, the notification permission surface, network fetch, named
//! response caches, native notification display, and window clients — is a
//! trait defined in [`web`]. The [`memory`] module ships in-process
//! implementations used on native targets and throughout the test suite; a
//! web shell substitutes bindings to the real platform.

pub mod memory;
pub mod runtime;
pub mod web;

pub use memory::{
    MemoryCaches, MemoryNetwork, MemoryNotifications, MemoryPermission, MemoryStorage,
    MemoryWindows,
};
pub use web::{
    CacheStore, Capabilities, KeyValueStorage, NativePermission, Network, NetworkError,
    NotificationDisplay, PageClient, PermissionSurface, ShownNotification, WebRequest, WebResponse,
    WindowClients,
};
