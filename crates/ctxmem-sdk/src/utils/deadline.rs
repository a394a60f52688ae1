//! Operation deadlines

use std::future::Future;
use std::time::Duration;

use crate::{SDKError, SDKResult};

/// Run `fut` under an optional deadline.
///
/// `None` runs the future to completion. When the deadline passes the future
/// is dropped, which aborts whatever I/O it was waiting on; writes already
/// issued are not rolled back.
pub async fn within<T, F>(deadline: Option<Duration>, fut: F) -> SDKResult<T>
where
    F: Future<Output = SDKResult<T>>,
{
    match deadline {
        None => fut.await,
        Some(duration) => match tokio::time::timeout(duration, fut).await {
            Ok(result) => result,
            Err(_) => Err(SDKError::timeout(duration.as_millis() as u64)),
        },
    }
}
