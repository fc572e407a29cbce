//! Environment capability check.
//!
//! Consumers guard messaging calls with [`is_supported`]; an environment
//! missing any required API is a permanent "not available" state, detected
//! once and never retried.

use crate::platform::web::PermissionSurface;

/// Returns true when the host exposes every API push delivery requires:
/// notifications, push subscriptions, service workers, and durable storage.
pub fn is_supported(surface: &dyn PermissionSurface) -> bool {
    surface.capabilities().push_ready()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::memory::MemoryPermission;
    use crate::platform::web::Capabilities;

    #[test]
    fn full_capabilities_are_supported() {
        let surface = MemoryPermission::new();
        assert!(is_supported(&surface));
    }

    #[test]
    fn any_missing_api_is_unsupported() {
        let surface = MemoryPermission::new();
        surface.set_capabilities(Capabilities {
            service_worker: false,
            ..Capabilities::all()
        });
        assert!(!is_supported(&surface));
    }
}
