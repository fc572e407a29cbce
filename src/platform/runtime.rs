use std::time::Duration;

/// Asynchronously waits for the provided duration.
///
/// Wraps the runtime timer so callers never import it directly; a web shell
/// swaps this for a host-scheduler sleep.
pub async fn sleep(duration: Duration) {
    if duration.is_zero() {
        return;
    }

    tokio::time::sleep(duration).await;
}
