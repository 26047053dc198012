//! File-backed directory and ledger for running the engine standalone.
//!
//! The snapshot is a JSONL export of the account directory, one row per line,
//! sorted by account id. Postings are written back out as JSONL, one line per
//! row posted.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use ledgerpost_engine::{
    AccountDirectory, AccountRecord, AccountStatus, DirectoryError, FetchCriteria, JobParameters,
    LedgerClient, Page, PostError,
};

fn default_status() -> AccountStatus {
    AccountStatus::Active
}

/// One line of the snapshot file.
#[derive(Debug, Deserialize)]
struct SnapshotRow {
    id: u64,
    account_no: String,
    currency_code: String,
    #[serde(default = "default_status")]
    status: AccountStatus,
}

/// Directory over a snapshot loaded fully into memory, partitioned by
/// status at load time so each page fetch only searches its own slice.
#[derive(Debug)]
pub struct SnapshotDirectory {
    by_status: HashMap<u16, Vec<AccountRecord>>,
    row_count: usize,
}

impl SnapshotDirectory {
    /// Load and validate a JSONL snapshot. Rows must be sorted by id.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open snapshot: {}", path.display()))?;
        let reader = BufReader::new(file);

        let mut by_status: HashMap<u16, Vec<AccountRecord>> = HashMap::new();
        let mut row_count = 0usize;
        let mut prev_id: Option<u64> = None;
        for (line_no, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
            if line.trim().is_empty() {
                continue;
            }
            let row: SnapshotRow = serde_json::from_str(&line)
                .with_context(|| format!("{}:{}: invalid snapshot row", path.display(), line_no + 1))?;
            if let Some(prev) = prev_id {
                if row.id < prev {
                    bail!(
                        "{}:{}: snapshot not sorted by id ({} after {})",
                        path.display(),
                        line_no + 1,
                        row.id,
                        prev
                    );
                }
            }
            prev_id = Some(row.id);
            by_status
                .entry(row.status.code())
                .or_default()
                .push(AccountRecord {
                    id: row.id,
                    account_no: row.account_no,
                    currency_code: row.currency_code,
                });
            row_count += 1;
        }

        log::info!("Loaded {row_count} snapshot rows from {}", path.display());
        Ok(Self {
            by_status,
            row_count,
        })
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }
}

impl AccountDirectory for SnapshotDirectory {
    fn fetch_eligible_page(
        &self,
        criteria: &FetchCriteria,
        after_id: u64,
        page_size: usize,
    ) -> Result<Page, DirectoryError> {
        let eligible: &[AccountRecord] = self
            .by_status
            .get(&criteria.status.code())
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        let start = eligible.partition_point(|r| r.id <= after_id);
        let mut end = (start + page_size).min(eligible.len());
        // never leave part of an account behind the cursor
        while end > start && end < eligible.len() && eligible[end].id == eligible[end - 1].id {
            end += 1;
        }

        Page::from_rows(eligible[start..end].to_vec())
    }
}

/// One posted transaction, as written to the output file.
#[derive(Debug, Serialize)]
struct PostingLine<'a> {
    account_id: u64,
    account_no: &'a str,
    currency_code: &'a str,
    posting_date: chrono::NaiveDate,
    transaction: &'static str,
}

/// Ledger that appends postings to a JSONL file.
///
/// Workers post concurrently; the writer is serialized behind a mutex so each
/// posting lands as one intact line.
pub struct JsonlLedger {
    writer: Mutex<BufWriter<File>>,
}

impl JsonlLedger {
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        let file = File::create(path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Flush buffered postings. Call once after the run.
    pub fn finalize(&self) -> Result<()> {
        let mut writer = self.writer.lock().expect("ledger writer poisoned");
        writer.flush().context("Failed to flush postings")?;
        Ok(())
    }
}

impl LedgerClient for JsonlLedger {
    fn post_interest(
        &self,
        rows: &[AccountRecord],
        params: &JobParameters,
    ) -> Result<(), PostError> {
        let mut writer = self.writer.lock().expect("ledger writer poisoned");
        for row in rows {
            let line = PostingLine {
                account_id: row.id,
                account_no: &row.account_no,
                currency_code: &row.currency_code,
                posting_date: params.posting_date,
                transaction: "interest_posting",
            };
            let json = serde_json::to_string(&line)
                .map_err(|e| PostError::Rejected(format!("unserializable posting: {e}")))?;
            writeln!(writer, "{json}").map_err(|e| PostError::Unavailable(e.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn write_snapshot(lines: &[&str]) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), lines.join("\n")).unwrap();
        file
    }

    #[test]
    fn load_and_page_snapshot() {
        let file = write_snapshot(&[
            r#"{"id": 1, "account_no": "SA-01", "currency_code": "USD"}"#,
            r#"{"id": 2, "account_no": "SA-02", "currency_code": "USD"}"#,
            r#"{"id": 2, "account_no": "SA-02", "currency_code": "EUR"}"#,
            r#"{"id": 3, "account_no": "SA-03", "currency_code": "USD", "status": "closed"}"#,
        ]);
        let directory = SnapshotDirectory::load(file.path()).unwrap();
        assert_eq!(directory.row_count(), 4);

        // closed account filtered out, duplicate run kept whole
        let page = directory
            .fetch_eligible_page(&FetchCriteria::default(), 0, 2)
            .unwrap();
        assert_eq!(page.len(), 3);
        assert_eq!(page.last_id(), Some(2));

        let rest = directory
            .fetch_eligible_page(&FetchCriteria::default(), 2, 2)
            .unwrap();
        assert!(rest.is_empty());
    }

    #[test]
    fn unsorted_snapshot_rejected() {
        let file = write_snapshot(&[
            r#"{"id": 5, "account_no": "SA-05", "currency_code": "USD"}"#,
            r#"{"id": 4, "account_no": "SA-04", "currency_code": "USD"}"#,
        ]);
        let err = SnapshotDirectory::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("not sorted"));
    }

    #[test]
    fn invalid_json_rejected_with_line_number() {
        let file = write_snapshot(&[
            r#"{"id": 1, "account_no": "SA-01", "currency_code": "USD"}"#,
            "not json",
        ]);
        let err = SnapshotDirectory::load(file.path()).unwrap_err();
        assert!(err.to_string().contains(":2"));
    }

    #[test]
    fn ledger_writes_one_line_per_row() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("postings.jsonl");
        let ledger = JsonlLedger::create(&out).unwrap();

        let rows = vec![
            AccountRecord {
                id: 7,
                account_no: "SA-07".to_string(),
                currency_code: "USD".to_string(),
            },
            AccountRecord {
                id: 7,
                account_no: "SA-07".to_string(),
                currency_code: "EUR".to_string(),
            },
        ];
        let params = JobParameters::new(1, 10, NaiveDate::from_ymd_opt(2026, 3, 31).unwrap());
        ledger.post_interest(&rows, &params).unwrap();
        ledger.finalize().unwrap();

        let written = std::fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["account_id"], 7);
        assert_eq!(first["posting_date"], "2026-03-31");
    }
}
