//! SQLite access from async code

use crate::error::Result;

/// Run blocking store work on tokio's blocking pool
pub(crate) async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await?
}
