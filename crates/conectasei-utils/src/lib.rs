//! Shared, dependency-light helpers: retry/backoff, time formatting and the
//! cancellation primitive threaded through every long-running task.

pub mod retry;
pub mod time;

pub use retry::RetryPolicy;
/// Re-exported so `extractor`/`downloader`/`scheduler` don't each pull
/// `tokio-util` directly for the single type they need.
pub use tokio_util::sync::CancellationToken;
