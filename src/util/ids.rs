//! Identifier helpers.

use uuid::Uuid;

/// Collision-resistant fallback id for a push message the provider delivered
/// without a durable message id.
///
/// The id is local to this device and never round-trips through the backend,
/// so two devices synthesizing ids for the same event is acceptable; two
/// rapid messages on one device colliding is not, hence a UUID rather than a
/// timestamp.
pub fn synthesized_message_id() -> String {
    format!("local-{}", Uuid::new_v4())
}
