//! Default deadlines and a helper for optional timeouts.
//!
//! This core only classifies timeouts; the deadlines themselves are enforced here, at the
//! transport edge, and surface as [`ProtocolError::ConnectTimeout`],
//! [`ProtocolError::ReadTimeout`] or [`ProtocolError::WriteTimeout`].

use std::future::Future;
use std::time::Duration;

use crate::error::{ProtocolError, Result};

/// Deadline for establishing a connection
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum silence on an established connection before it is dropped
pub const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum time a single frame may take to leave the socket
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Time a server waits for sessions to close during shutdown
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Time a closing channel still gives an in-flight write before shutting the socket
pub const CLOSE_FLUSH_GRACE: Duration = Duration::from_secs(1);

/// Await `future`, failing with `elapsed` if `deadline` passes first.
///
/// `None` waits indefinitely.
pub async fn with_deadline<F, T>(
    deadline: Option<Duration>,
    elapsed: ProtocolError,
    future: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match deadline {
        Some(duration) => tokio::time::timeout(duration, future)
            .await
            .unwrap_or(Err(elapsed)),
        None => future.await,
    }
}

/// Treat a zero duration as "no deadline"
pub fn non_zero(duration: Duration) -> Option<Duration> {
    (!duration.is_zero()).then_some(duration)
}
