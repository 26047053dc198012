//! Sub-batch posting — groups rows per account and drives the ledger client.

use std::time::{Duration, Instant};

use indicatif::ProgressBar;
use ledgerpost_core::contention_backoff;

use crate::account::{AccountRecord, Page};
use crate::ledger::{LedgerClient, PostError};
use crate::params::JobParameters;
use crate::report::AccountFailure;
use crate::split::SubBatch;

/// Per-sub-batch result counters, merged into the run report on completion.
#[derive(Debug, Default)]
pub struct SubBatchStats {
    pub accounts_posted: usize,
    pub rows_processed: usize,
    pub failures: Vec<AccountFailure>,
    pub elapsed: Duration,
}

/// Outcome of posting one sub-batch.
///
/// Per-account rejections never abort the sub-batch; they live inside the
/// stats. `Aborted` is reserved for a sub-batch-fatal condition (ledger
/// unreachable) and carries the stats accumulated up to that point, with the
/// not-attempted accounts already recorded as failures.
#[derive(Debug)]
pub enum SubBatchOutcome {
    Completed(SubBatchStats),
    Aborted {
        stats: SubBatchStats,
        error: PostError,
    },
}

impl SubBatchOutcome {
    pub fn stats(&self) -> &SubBatchStats {
        match self {
            Self::Completed(stats) | Self::Aborted { stats, .. } => stats,
        }
    }
}

/// Post interest for every account in `sub_batch`.
///
/// Rows sharing an id are grouped into one ledger call. Contention errors are
/// retried with jittered backoff up to `params.max_account_retries`; a
/// rejection or exhausted retry is recorded and the worker moves on.
pub fn post_sub_batch<L: LedgerClient>(
    page: &Page,
    sub_batch: SubBatch,
    ledger: &L,
    params: &JobParameters,
    pb: &ProgressBar,
) -> SubBatchOutcome {
    let start = Instant::now();
    let mut stats = SubBatchStats::default();
    let rows = &page.rows()[sub_batch.from..sub_batch.to];

    let mut groups = AccountGroups::new(rows);
    while let Some(group) = groups.next_group() {
        match post_account(group, ledger, params) {
            Ok(()) => {
                stats.accounts_posted += 1;
                stats.rows_processed += group.len();
            }
            Err(e) if e.is_fatal() => {
                // Record the failing account and everything not attempted,
                // then give up on this sub-batch.
                log::error!(
                    "sub-batch [{}, {}): ledger unreachable at account {}: {e}",
                    sub_batch.from,
                    sub_batch.to,
                    group[0].id
                );
                stats.failures.push(AccountFailure {
                    account_id: group[0].id,
                    error: e.clone(),
                });
                while let Some(skipped) = groups.next_group() {
                    stats.failures.push(AccountFailure {
                        account_id: skipped[0].id,
                        error: PostError::Unavailable("not attempted".to_string()),
                    });
                }
                stats.elapsed = start.elapsed();
                return SubBatchOutcome::Aborted { stats, error: e };
            }
            Err(e) => {
                log::warn!("interest posting failed for account {}: {e}", group[0].id);
                stats.failures.push(AccountFailure {
                    account_id: group[0].id,
                    error: e,
                });
                stats.rows_processed += group.len();
            }
        }
        pb.inc(1);
    }

    stats.elapsed = start.elapsed();
    log::debug!(
        "sub-batch [{}, {}): {} accounts posted, {} failed [{:.1}s]",
        sub_batch.from,
        sub_batch.to,
        stats.accounts_posted,
        stats.failures.len(),
        stats.elapsed.as_secs_f64()
    );
    SubBatchOutcome::Completed(stats)
}

/// One ledger call with contention retries.
fn post_account<L: LedgerClient>(
    rows: &[AccountRecord],
    ledger: &L,
    params: &JobParameters,
) -> Result<(), PostError> {
    let mut attempt = 0u32;
    loop {
        match ledger.post_interest(rows, params) {
            Ok(()) => return Ok(()),
            Err(e) if e.is_retryable() && attempt < params.max_account_retries => {
                attempt += 1;
                log::info!(
                    "account {}: contention, retry {attempt}/{}",
                    rows[0].id,
                    params.max_account_retries
                );
                std::thread::sleep(contention_backoff(
                    params.retry_delay,
                    params.retry_jitter_steps,
                ));
            }
            Err(e) => return Err(e),
        }
    }
}

/// Iterator over runs of rows sharing one account id.
struct AccountGroups<'a> {
    rows: &'a [AccountRecord],
    pos: usize,
}

impl<'a> AccountGroups<'a> {
    fn new(rows: &'a [AccountRecord]) -> Self {
        Self { rows, pos: 0 }
    }

    fn next_group(&mut self) -> Option<&'a [AccountRecord]> {
        if self.pos >= self.rows.len() {
            return None;
        }
        let start = self.pos;
        let id = self.rows[start].id;
        let mut end = start + 1;
        while end < self.rows.len() && self.rows[end].id == id {
            end += 1;
        }
        self.pos = end;
        Some(&self.rows[start..end])
    }
}
