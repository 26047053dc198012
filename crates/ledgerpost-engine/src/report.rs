//! Run-level completion accounting.
//!
//! One report per run, appended to (under a mutex) as sub-batches finish and
//! read once by the scheduler. The run itself reports completion even when
//! individual accounts failed — callers inspect the report to detect partial
//! failure.

use std::time::Duration;

use ledgerpost_core::fmt_num;

use crate::ledger::PostError;
use crate::worker::SubBatchOutcome;

/// One account that could not be posted, with the last error seen for it.
#[derive(Clone, Debug)]
pub struct AccountFailure {
    pub account_id: u64,
    pub error: PostError,
}

/// Accumulated outcome of a posting run.
#[derive(Debug, Default)]
pub struct CompletionReport {
    pub pages: usize,
    pub sub_batches: usize,
    pub aborted_sub_batches: usize,
    pub accounts_posted: usize,
    pub rows_processed: usize,
    pub failures: Vec<AccountFailure>,
    /// Highest account id dispatched for processing.
    pub max_processed_id: u64,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl CompletionReport {
    /// Fold one sub-batch outcome into the report.
    pub fn absorb(&mut self, outcome: SubBatchOutcome) {
        self.sub_batches += 1;
        let stats = match outcome {
            SubBatchOutcome::Completed(stats) => stats,
            SubBatchOutcome::Aborted { stats, .. } => {
                self.aborted_sub_batches += 1;
                stats
            }
        };
        self.accounts_posted += stats.accounts_posted;
        self.rows_processed += stats.rows_processed;
        self.failures.extend(stats.failures);
    }

    pub fn success_count(&self) -> usize {
        self.accounts_posted
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Last error recorded, if any — the headline for alerting.
    pub fn last_error(&self) -> Option<&PostError> {
        self.failures.last().map(|f| &f.error)
    }

    /// Ids the scheduler should feed into a targeted retry run: the cursor
    /// has already moved past these accounts and a plain re-run will not
    /// revisit them.
    pub fn failed_account_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.failures.iter().map(|f| f.account_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Log minimal summary (non-TTY mode).
    pub fn log(&self) {
        log::info!(
            "posting run complete: {} accounts posted, {} failed, {} pages, {} sub-batches ({} aborted) [{:.1}s]",
            fmt_num(self.accounts_posted),
            fmt_num(self.failure_count()),
            self.pages,
            self.sub_batches,
            self.aborted_sub_batches,
            self.elapsed.as_secs_f64()
        );
        if let Some(e) = self.last_error() {
            log::warn!("last posting error: {e}");
        }
    }
}
