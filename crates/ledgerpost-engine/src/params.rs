//! Per-run job parameters, supplied once by the scheduler.

use std::time::Duration;

use chrono::NaiveDate;

/// Immutable configuration for one posting run.
#[derive(Clone, Debug)]
pub struct JobParameters {
    /// Worker pool size, fixed for the whole run.
    pub thread_pool_size: usize,
    /// Ideal accounts per worker per page; page size is derived from it.
    pub batch_size: usize,
    /// Whether accounts with pending backdated transactions are eligible.
    pub include_backdated: bool,
    /// Close-of-business date the interest is posted for.
    pub posting_date: NaiveDate,
    /// Exclusive lower bound for the first fetch: only accounts with an id
    /// above this are posted. Commonly 0 (whole population).
    pub cursor_floor: u64,
    /// Max retries per account on write contention before recording failure.
    pub max_account_retries: u32,
    /// Base delay between contention retries (jitter multiplies this).
    pub retry_delay: Duration,
    /// Upper bound on the random jitter multiplier (0..=steps extra delays).
    pub retry_jitter_steps: u32,
}

impl JobParameters {
    pub fn new(thread_pool_size: usize, batch_size: usize, posting_date: NaiveDate) -> Self {
        Self {
            thread_pool_size,
            batch_size,
            include_backdated: false,
            posting_date,
            cursor_floor: 0,
            max_account_retries: 3,
            retry_delay: Duration::from_secs(1),
            retry_jitter_steps: 9,
        }
    }

    /// Rows fetched per page: one ideal batch for every worker.
    pub fn page_size(&self) -> usize {
        self.batch_size * self.thread_pool_size
    }

    /// Reject parameters that would make the run degenerate.
    pub fn validate(&self) -> Result<(), String> {
        if self.thread_pool_size == 0 {
            return Err("thread_pool_size must be > 0".to_string());
        }
        if self.batch_size == 0 {
            return Err("batch_size must be > 0".to_string());
        }
        Ok(())
    }
}
