//! Service-worker side of the push pipeline.
//!
//! The [`ServiceWorkerController`] owns the single registration per scope,
//! drives install → activate (with skip-waiting semantics), pre-populates
//! the versioned offline cache, and implements the push, notification-click,
//! fetch, sync, and message event handlers. Page contexts talk to it only
//! through [`messages`] payloads and the signals it broadcasts; worker-side
//! failures are logged, never thrown across the boundary.

pub mod cache;
pub mod controller;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod messages;

pub use controller::{ServiceWorkerController, WorkerEnv};
pub use error::{WorkerError, WorkerErrorCode, WorkerResult};
pub use events::PushMessage;
pub use lifecycle::{WorkerRegistration, WorkerState};
pub use messages::{PageMessage, ProviderConfig, WorkerSignal, SYNC_CHECK_MISSED_TAG};
