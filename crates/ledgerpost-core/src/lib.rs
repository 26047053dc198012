//! Ledgerpost Core - Common infrastructure for batch posting jobs
//!
//! This crate provides the reusable pieces the posting engine is built on:
//! a bounded blocking queue, a cooperative cancellation token, contention
//! backoff helpers, and logging/progress reporting.

pub mod cancel;
pub mod logging;
pub mod progress;
pub mod queue;
pub mod retry;

// Re-exports for convenience
pub use cancel::CancelToken;
pub use logging::{BridgeLogger, init_logging};
pub use progress::{ProgressContext, SharedProgress, fmt_num};
pub use queue::Bounded;
pub use retry::contention_backoff;
