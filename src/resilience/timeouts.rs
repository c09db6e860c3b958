//! Deadline enforcement for upstream calls.

use std::future::Future;
use std::time::Duration;

use crate::error::{GatewayError, GatewayResult};

/// Run `fut` with a deadline; expiry becomes `UpstreamTimeout` and drops `fut`.
pub async fn with_deadline<T, F>(deadline: Duration, fut: F) -> GatewayResult<T>
where
    F: Future<Output = GatewayResult<T>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::UpstreamTimeout(deadline)),
    }
}
