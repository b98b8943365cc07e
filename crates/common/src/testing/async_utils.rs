//! Async test helpers

use std::future::Future;
use std::time::Duration;

/// Poll `condition` every `interval` until it returns true or `timeout`
/// elapses. Returns whether the condition was met.
pub async fn poll_until<F, Fut>(timeout: Duration, interval: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = std::time::Instant::now();

    while start.elapsed() < timeout {
        if condition().await {
            return true;
        }
        tokio::time::sleep(interval).await;
    }

    condition().await
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;

    /// Validates `poll_until` observes a flag flipped by a background task.
    ///
    /// Assertions:
    /// - Ensures the poll returns true before the timeout.
    #[tokio::test]
    async fn poll_until_sees_background_update() {
        let flag = Arc::new(AtomicBool::new(false));
        let flag_clone = flag.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            flag_clone.store(true, Ordering::SeqCst);
        });

        let result = poll_until(Duration::from_secs(1), Duration::from_millis(5), || async {
            flag.load(Ordering::SeqCst)
        })
        .await;

        assert!(result);
    }

    /// Validates `poll_until` gives up after the timeout.
    ///
    /// Assertions:
    /// - Ensures the poll returns false for a condition that never holds.
    #[tokio::test]
    async fn poll_until_times_out() {
        let result =
            poll_until(Duration::from_millis(30), Duration::from_millis(5), || async { false })
                .await;
        assert!(!result);
    }
}
