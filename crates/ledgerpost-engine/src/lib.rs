//! Batch interest-posting engine.
//!
//! Applies interest to a large population of active deposit accounts in
//! bounded time: pages of eligible accounts are prefetched one ahead while
//! the current page is partitioned into per-worker sub-batches and posted
//! in parallel. Sub-batch boundaries are adjusted so no account's rows are
//! ever split across two workers, which makes the parallel posting safe
//! without per-account locking.

pub mod account;
pub mod directory;
pub mod driver;
pub mod ledger;
pub mod params;
pub mod report;
pub mod split;
pub mod worker;

// Re-exports for convenience
pub use account::{AccountRecord, AccountStatus, Page};
pub use directory::{AccountDirectory, DirectoryError, FetchCriteria};
pub use driver::{RunError, run_posting_job};
pub use ledger::{LedgerClient, PostError};
pub use params::JobParameters;
pub use report::{AccountFailure, CompletionReport};
pub use split::{SubBatch, split};
pub use worker::{SubBatchOutcome, SubBatchStats};
