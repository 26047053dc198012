//! Top-level run orchestration: fetch → split → dispatch → prefetch-next.
//!
//! One named producer thread keeps the bounded page queue topped up (one
//! page ahead) while the driver drains it, splitting each page and fanning
//! the sub-batches out over a fixed-size worker pool. A page's sub-batches
//! are all awaited before the next page is dispatched, so posting order is
//! non-decreasing by id at the page level.

use std::sync::Mutex;
use std::time::Instant;

use ledgerpost_core::{Bounded, CancelToken, SharedProgress, fmt_num};

use crate::account::Page;
use crate::directory::{AccountDirectory, DirectoryError, FetchCriteria};
use crate::ledger::LedgerClient;
use crate::params::JobParameters;
use crate::report::CompletionReport;
use crate::split::split;
use crate::worker::{SubBatchOutcome, post_sub_batch};

/// How many pages the prefetcher may run ahead of the driver.
const PREFETCH_DEPTH: usize = 1;

/// Lifecycle of a posting run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RunPhase {
    FetchingFirstPage,
    Running,
    Draining,
    Done,
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::FetchingFirstPage => "fetching-first-page",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Done => "done",
        };
        f.write_str(s)
    }
}

/// Errors that abort a run. Accumulated per-account posting failures are not
/// run errors — they live in the [`CompletionReport`].
#[derive(Debug)]
pub enum RunError {
    InvalidParameters(String),
    Directory(DirectoryError),
    WorkerPool(String),
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidParameters(msg) => write!(f, "invalid job parameters: {msg}"),
            Self::Directory(e) => write!(f, "{e}"),
            Self::WorkerPool(msg) => write!(f, "worker pool: {msg}"),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Directory(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DirectoryError> for RunError {
    fn from(e: DirectoryError) -> Self {
        Self::Directory(e)
    }
}

/// A page whose rows are ordered but do not reach past the cursor violates
/// the directory contract just like unordered rows do.
fn stuck_cursor(cursor: u64, last_id: u64) -> DirectoryError {
    DirectoryError::Malformed(format!(
        "page did not advance past cursor {cursor} (last id {last_id})"
    ))
}

/// Run one interest-posting job to completion.
///
/// The run always finishes `Done` with a report, even when some accounts
/// failed; only a directory failure or bad parameters produce `Err`. The
/// cancellation token is checked at each page boundary — sub-batches already
/// dispatched run to completion.
pub fn run_posting_job<D, L>(
    directory: &D,
    ledger: &L,
    params: &JobParameters,
    progress: &SharedProgress,
    cancel: &CancelToken,
) -> Result<CompletionReport, RunError>
where
    D: AccountDirectory + Sync,
    L: LedgerClient + Sync,
{
    params.validate().map_err(RunError::InvalidParameters)?;
    let criteria = FetchCriteria {
        include_backdated: params.include_backdated,
        ..FetchCriteria::default()
    };
    let page_size = params.page_size();
    let start = Instant::now();

    let mut phase = RunPhase::FetchingFirstPage;
    log::debug!("phase: {phase}");
    log::info!(
        "interest posting starting: posting_date={}, workers={}, batch_size={}, page_size={}, backdated={}",
        params.posting_date,
        params.thread_pool_size,
        params.batch_size,
        page_size,
        params.include_backdated,
    );

    let mut report = CompletionReport::default();
    let first = directory.fetch_eligible_page(&criteria, params.cursor_floor, page_size)?;
    if first.is_empty() {
        phase = RunPhase::Done;
        log::info!("no eligible accounts, nothing to post (phase: {phase})");
        report.elapsed = start.elapsed();
        return Ok(report);
    }
    let first_last = first.last_id().expect("first page checked non-empty");
    if first_last <= params.cursor_floor {
        return Err(RunError::Directory(stuck_cursor(
            params.cursor_floor,
            first_last,
        )));
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(params.thread_pool_size)
        .build()
        .map_err(|e| RunError::WorkerPool(e.to_string()))?;

    let queue: Bounded<Result<Page, DirectoryError>> = Bounded::new(PREFETCH_DEPTH);
    let status = progress.status_line("posting");

    let run_result: Result<(), RunError> = std::thread::scope(|s| {
        // Producer: fetch ahead of the driver, one page at a time. Closes
        // the queue on exhaustion, fatal error, or cancellation.
        let spawned = std::thread::Builder::new()
            .name("page-prefetch".into())
            .spawn_scoped(s, {
                let queue = &queue;
                let criteria = &criteria;
                let mut cursor = first_last;
                move || {
                    loop {
                        if cancel.is_cancelled() {
                            break;
                        }
                        match directory.fetch_eligible_page(criteria, cursor, page_size) {
                            Ok(page) if page.is_empty() => break,
                            Ok(page) => {
                                let last = page.last_id().expect("non-empty page has a last id");
                                if last <= cursor {
                                    // refetching would loop on the same rows
                                    let _ = queue.push(Err(stuck_cursor(cursor, last)));
                                    break;
                                }
                                cursor = last;
                                if queue.push(Ok(page)).is_err() {
                                    // driver stopped consuming
                                    break;
                                }
                            }
                            Err(e) => {
                                let _ = queue.push(Err(e));
                                break;
                            }
                        }
                    }
                    queue.close();
                }
            });
        if let Err(e) = spawned {
            queue.close();
            return Err(RunError::WorkerPool(format!(
                "failed to spawn prefetch thread: {e}"
            )));
        }

        phase = RunPhase::Running;
        log::debug!("phase: {phase}");

        let mut next_page = Some(first);
        let mut page_no = 0usize;
        let result = loop {
            let page = match next_page.take() {
                Some(page) => page,
                None => match queue.pop() {
                    Some(Ok(page)) => page,
                    Some(Err(e)) => break Err(RunError::Directory(e)),
                    None => {
                        phase = RunPhase::Draining;
                        log::debug!("phase: {phase}");
                        // per-page await means nothing is outstanding here
                        break Ok(());
                    }
                },
            };

            if cancel.is_cancelled() {
                log::warn!("cancellation requested, stopping at page boundary");
                report.cancelled = true;
                break Ok(());
            }

            page_no += 1;
            let batches = split(&page, params.thread_pool_size);
            log::debug!(
                "page {page_no}: {} rows, {} accounts, {} sub-batches",
                page.len(),
                page.account_count(),
                batches.len()
            );

            let pb = progress.page_bar(page_no, page.account_count());
            let outcomes: Mutex<Vec<SubBatchOutcome>> = Mutex::new(Vec::new());
            pool.install(|| {
                rayon::scope(|sc| {
                    for &sub_batch in &batches {
                        let page = &page;
                        let pb = &pb;
                        let outcomes = &outcomes;
                        sc.spawn(move |_| {
                            let outcome = post_sub_batch(page, sub_batch, ledger, params, pb);
                            outcomes
                                .lock()
                                .expect("worker thread panicked")
                                .push(outcome);
                        });
                    }
                });
            });
            pb.finish_and_clear();

            for outcome in outcomes.into_inner().expect("worker thread panicked") {
                report.absorb(outcome);
            }
            report.pages += 1;
            if let Some(last) = page.last_id() {
                report.max_processed_id = report.max_processed_id.max(last);
            }
            status.set_message(format!(
                "{} accounts posted, {} failed",
                fmt_num(report.accounts_posted),
                fmt_num(report.failure_count())
            ));
        };

        // Unblock the producer if it is still waiting to push, then let the
        // scope join it.
        queue.close();
        result
    });

    status.finish_and_clear();
    run_result?;

    phase = RunPhase::Done;
    report.elapsed = start.elapsed();
    log::debug!("phase: {phase}");
    if !progress.is_tty() {
        report.log();
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_display_names() {
        assert_eq!(RunPhase::FetchingFirstPage.to_string(), "fetching-first-page");
        assert_eq!(RunPhase::Running.to_string(), "running");
        assert_eq!(RunPhase::Draining.to_string(), "draining");
        assert_eq!(RunPhase::Done.to_string(), "done");
    }

    #[test]
    fn run_error_display() {
        let e = RunError::InvalidParameters("batch_size must be > 0".to_string());
        assert!(format!("{e}").contains("invalid job parameters"));
        let e = RunError::Directory(DirectoryError::Unavailable("down".to_string()));
        assert!(format!("{e}").contains("unavailable"));
    }
}
