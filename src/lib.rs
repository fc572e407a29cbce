//! Client-side push-notification delivery manager for the HemoLink donor
//! community platform.
//!
//! The crate is organised around five cooperating pieces:
//!
//! * [`worker`] — service-worker lifecycle, offline caching, and the
//!   push / notification-click / fetch / sync / message event handlers.
//! * [`messaging::PermissionMachine`] — reconciles the browser permission
//!   with the in-app notification preference and drives prompt policy.
//! * [`messaging::TokenManager`] — single-flight device-token acquisition
//!   with bounded retry, durable persistence, and backend registration.
//! * [`messaging::ForegroundRouter`] — turns foreground push payloads into
//!   toasts and feed records.
//! * [`messaging::FeedStore`] — paginated notification-feed cache with
//!   optimistic mark-read / delete.
//!
//! [`messaging::Messaging`] ties the pieces together per application
//! instance; applications are created through [`app::initialize_app`] and
//! services resolved through the [`component`] container.
//!
//! The browser boundary lives behind the trait seams in [`platform`], with
//! in-memory implementations shipped for native targets and tests.

pub mod app;
pub mod component;
pub mod logger;
pub mod messaging;
pub mod platform;
pub mod util;
pub mod worker;
