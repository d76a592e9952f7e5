//! Utilities (spec §2, §5): wait/poll, id generation, assertion. Text
//! truncation lives alongside its one call site in
//! [`crate::dom::serializer`]; id generation is `uuid::Uuid::new_v4()` at
//! each task start (`src/agent/mod.rs`).

use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

/// Poll interval for [`wait_until`] (spec §5: "`waitUntil(predicate)` polls
/// at ~100 ms").
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Polls `predicate` at [`POLL_INTERVAL`] until it returns `Ok(true)` or
/// `deadline` elapses, failing with a timeout error in the latter case
/// (spec §5). `predicate` returns a boxed future so it may borrow its
/// environment freely; `Err` from a single poll propagates immediately
/// rather than being retried.
pub async fn wait_until<'a, F>(deadline: Duration, mut predicate: F) -> Result<()>
where
    F: FnMut() -> Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>>,
{
    let start = Instant::now();
    loop {
        if predicate().await? {
            return Ok(());
        }
        if start.elapsed() >= deadline {
            return Err(anyhow!("wait_until: condition not met within {:?}", deadline));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn returns_ok_once_predicate_becomes_true() {
        let calls = AtomicU32::new(0);
        let result = wait_until(Duration::from_secs(1), || {
            Box::pin(async {
                Ok(calls.fetch_add(1, Ordering::SeqCst) >= 2)
            })
        })
        .await;
        assert!(result.is_ok());
        assert!(calls.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn times_out_if_predicate_never_becomes_true() {
        let result = wait_until(Duration::from_millis(250), || Box::pin(async { Ok(false) })).await;
        assert!(result.is_err());
    }
}
