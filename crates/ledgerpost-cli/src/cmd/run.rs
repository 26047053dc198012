//! Run subcommand - execute one interest posting job over a snapshot

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Args;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;

use ledgerpost_core::{CancelToken, SharedProgress, fmt_num};
use ledgerpost_engine::{JobParameters, run_posting_job};

use crate::config::Config;
use crate::feed::{JsonlLedger, SnapshotDirectory};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Account snapshot file (JSONL, sorted by id)
    pub snapshot: PathBuf,

    /// Close-of-business date to post interest for (YYYY-MM-DD)
    #[arg(short = 'd', long, value_parser = parse_date)]
    pub posting_date: NaiveDate,

    /// Output file for posted transactions (default: <output dir>/postings-<date>.jsonl)
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Write failed account ids to this file (JSON array)
    #[arg(long)]
    pub failed_out: Option<PathBuf>,

    /// Number of posting workers
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Ideal accounts per worker per page
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Include accounts with pending backdated transactions
    #[arg(long)]
    pub include_backdated: bool,

    /// Only post accounts with an id above this (exclusive)
    #[arg(long, default_value_t = 0)]
    pub cursor_floor: u64,
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("Invalid date format: {e}"))
}

pub fn run(args: RunArgs, config: &Config, progress: &SharedProgress) -> Result<ExitCode> {
    let workers = args
        .workers
        .unwrap_or(config.workers.default)
        .min(config.workers.max);
    let batch_size = args.batch_size.unwrap_or(config.posting.batch_size);

    let mut params = JobParameters::new(workers, batch_size, args.posting_date);
    params.include_backdated = args.include_backdated || config.posting.include_backdated;
    params.cursor_floor = args.cursor_floor;
    params.max_account_retries = config.posting.max_account_retries;
    params.retry_delay = Duration::from_millis(config.posting.retry_delay_ms);
    params.retry_jitter_steps = config.posting.retry_jitter_steps;

    let out = args.out.unwrap_or_else(|| {
        config
            .output
            .default_dir
            .join(format!("postings-{}.jsonl", args.posting_date))
    });

    log::info!("Interest posting run");
    log::info!("  Snapshot: {}", args.snapshot.display());
    log::info!("  Output: {}", out.display());

    let directory = SnapshotDirectory::load(&args.snapshot)?;
    let ledger = JsonlLedger::create(&out)?;

    // Ctrl-C / SIGTERM request a stop at the next page boundary.
    let cancel = CancelToken::new();
    let mut signals =
        Signals::new([SIGINT, SIGTERM]).context("Failed to install signal handler")?;
    let signal_handle = signals.handle();
    {
        let cancel = cancel.clone();
        std::thread::Builder::new()
            .name("signal-watch".to_string())
            .spawn(move || {
                if signals.forever().next().is_some() {
                    log::warn!("Stop requested, finishing current page");
                    cancel.cancel();
                }
            })
            .context("Failed to spawn signal thread")?;
    }

    let report = run_posting_job(&directory, &ledger, &params, progress, &cancel)?;
    signal_handle.close();
    ledger.finalize()?;

    if let Some(path) = &args.failed_out {
        let ids = report.failed_account_ids();
        let json = serde_json::to_string_pretty(&ids)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("Wrote {} failed account ids to {}", ids.len(), path.display());
    }

    print_summary(&report, &out);

    if report.cancelled {
        return Ok(ExitCode::from(130));
    }
    if report.has_failures() {
        return Ok(ExitCode::from(1));
    }
    Ok(ExitCode::SUCCESS)
}

/// Print the completion table on stderr
fn print_summary(report: &ledgerpost_engine::CompletionReport, out: &PathBuf) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Interest Posting").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    table.add_row(vec![Cell::new("Pages"), Cell::new(report.pages.to_string())]);
    table.add_row(vec![
        Cell::new("Sub-batches"),
        Cell::new(format!(
            "{} ({} aborted)",
            report.sub_batches, report.aborted_sub_batches
        )),
    ]);
    table.add_row(vec![
        Cell::new("Accounts posted").fg(Color::Green),
        Cell::new(fmt_num(report.accounts_posted)).fg(Color::Green),
    ]);
    let failures_color = if report.has_failures() {
        Color::Red
    } else {
        Color::Reset
    };
    table.add_row(vec![
        Cell::new("Accounts failed").fg(failures_color),
        Cell::new(fmt_num(report.failure_count())).fg(failures_color),
    ]);
    table.add_row(vec![
        Cell::new("Postings file"),
        Cell::new(out.display().to_string()),
    ]);
    table.add_row(vec![
        Cell::new("Time"),
        Cell::new(format!("{:.1}s", report.elapsed.as_secs_f64())),
    ]);
    if report.cancelled {
        table.add_row(vec![
            Cell::new("Cancelled").fg(Color::Yellow),
            Cell::new("stopped at a page boundary").fg(Color::Yellow),
        ]);
    }
    if let Some(e) = report.last_error() {
        table.add_row(vec![
            Cell::new("Last error").fg(Color::Red),
            Cell::new(e.to_string()).fg(Color::Red),
        ]);
    }

    eprintln!("\n{table}");
}
