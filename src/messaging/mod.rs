//! Page-context push messaging: permission state, token lifecycle,
//! foreground routing, and the notification feed.
//!
//! [`Messaging`] is the per-application facade; obtain it through
//! [`get_messaging`] (component-managed, in-memory host environment) or
//! [`Messaging::with_deps`] when supplying custom host seams.

mod api;
pub mod constants;
pub mod error;
mod feed;
mod gateway;
mod permission;
mod rest;
mod router;
mod support;
mod token_manager;
pub(crate) mod token_store;
mod types;

pub use api::{get_messaging, register_messaging_component, Messaging, MessagingDeps};
pub use error::{MessagingError, MessagingErrorCode, MessagingResult};
pub use feed::{FeedSnapshot, FeedStore};
pub use gateway::{LocalGateway, PushGateway};
pub use permission::{
    NativeState, PermissionMachine, PermissionSnapshot, PromptOutcome, SuppressedReason,
};
pub use rest::{BackendClient, FeedPage};
pub use router::{ForegroundRouter, ToastEvent, ToastKind};
pub use support::is_supported;
pub use token_manager::{AcquireOutcome, TokenManager, TokenTiming};
pub use token_store::TokenRecord;
pub use types::{
    FeedNotification, MessageHandler, MessagePayload, NotificationPayload, Unsubscribe,
};
