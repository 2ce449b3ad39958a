//! Async timeout wrappers

use crate::error::{ProtocolError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Default time to wait for a reply from the server
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Run `future` with a deadline, mapping expiry to `ProtocolError::Timeout`
pub async fn with_timeout_error<F, T>(future: F, duration: Duration) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => {
            warn!(timeout_ms = duration.as_millis() as u64, "Operation timed out");
            Err(ProtocolError::Timeout)
        }
    }
}
