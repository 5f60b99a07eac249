//! Timeout defaults and an async timeout wrapper.

use std::future::Future;
use std::time::Duration;

use crate::error::{ProtocolError, Result};

/// Idle timeout when heartbeats are disabled.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(5000);

/// Heartbeat interval used by [`ConnectionConfig::default`](crate::config::ConnectionConfig).
/// Zero disables the heartbeat loop.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::ZERO;

/// Timeout for establishing an outbound TCP connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a server waits for open connections during shutdown.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Idle budget for a connection: twice the heartbeat interval when heartbeats run,
/// leaving room for one lost or delayed beat, otherwise `fallback`.
pub fn idle_timeout_for(heartbeat_interval: Duration, fallback: Duration) -> Duration {
    if heartbeat_interval.is_zero() {
        fallback
    } else {
        heartbeat_interval.saturating_mul(2)
    }
}

/// Await `fut`, mapping an elapsed deadline to [`ProtocolError::Timeout`].
pub async fn with_timeout_error<F, T>(fut: F, duration: Duration) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProtocolError::Timeout),
    }
}
