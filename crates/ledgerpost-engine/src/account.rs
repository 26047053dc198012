//! Account rows, status filter, and the page type the engine consumes.

use serde::{Deserialize, Serialize};

/// One row as returned by the account directory query.
///
/// An account can appear as several consecutive rows (one per currency
/// representation); those rows are not independently postable and must stay
/// together in one sub-batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: u64,
    pub account_no: String,
    pub currency_code: String,
}

/// Deposit account lifecycle status, used as the directory eligibility filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    SubmittedAndPendingApproval,
    Approved,
    Active,
    Closed,
}

impl AccountStatus {
    /// Parse CLI/config string into enum
    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "submitted" => Some(Self::SubmittedAndPendingApproval),
            "approved" => Some(Self::Approved),
            "active" => Some(Self::Active),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }

    /// Platform status code as stored in the directory.
    pub fn code(self) -> u16 {
        match self {
            Self::SubmittedAndPendingApproval => 100,
            Self::Approved => 200,
            Self::Active => 300,
            Self::Closed => 600,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::SubmittedAndPendingApproval => "submitted",
            Self::Approved => "approved",
            Self::Active => "active",
            Self::Closed => "closed",
        }
    }
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One fetched, ordered batch of eligible account rows.
///
/// Immutable after construction; consumed exactly once by the splitter.
#[derive(Clone, Debug, Default)]
pub struct Page {
    rows: Vec<AccountRecord>,
}

impl Page {
    /// Build a page from directory rows, enforcing the ordering contract.
    ///
    /// Rows must be sorted by `id` ascending (equal ids are allowed and
    /// expected); anything else is a malformed directory response.
    pub fn from_rows(rows: Vec<AccountRecord>) -> Result<Self, crate::DirectoryError> {
        if let Some(w) = rows.windows(2).find(|w| w[0].id > w[1].id) {
            return Err(crate::DirectoryError::Malformed(format!(
                "rows out of order: id {} before id {}",
                w[0].id, w[1].id
            )));
        }
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[AccountRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Highest id in the page — the next fetch cursor. `None` when empty.
    pub fn last_id(&self) -> Option<u64> {
        self.rows.last().map(|r| r.id)
    }

    /// Number of distinct accounts in the page (consecutive same-id rows
    /// collapse to one).
    pub fn account_count(&self) -> usize {
        let mut count = 0;
        let mut prev = None;
        for row in &self.rows {
            if prev != Some(row.id) {
                count += 1;
                prev = Some(row.id);
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub fn record(id: u64) -> AccountRecord {
        AccountRecord {
            id,
            account_no: format!("SA-{id:06}"),
            currency_code: "USD".to_string(),
        }
    }

    #[test]
    fn status_from_name() {
        assert_eq!(AccountStatus::from_name("active"), Some(AccountStatus::Active));
        assert_eq!(AccountStatus::from_name("closed"), Some(AccountStatus::Closed));
        assert_eq!(AccountStatus::from_name("Active"), None);
        assert_eq!(AccountStatus::from_name(""), None);
    }

    #[test]
    fn status_codes() {
        assert_eq!(AccountStatus::SubmittedAndPendingApproval.code(), 100);
        assert_eq!(AccountStatus::Approved.code(), 200);
        assert_eq!(AccountStatus::Active.code(), 300);
        assert_eq!(AccountStatus::Closed.code(), 600);
    }

    #[test]
    fn page_accepts_ordered_rows_with_duplicates() {
        let page = Page::from_rows(vec![record(1), record(1), record(2)]).unwrap();
        assert_eq!(page.len(), 3);
        assert_eq!(page.last_id(), Some(2));
        assert_eq!(page.account_count(), 2);
    }

    #[test]
    fn page_rejects_unordered_rows() {
        let err = Page::from_rows(vec![record(2), record(1)]).unwrap_err();
        assert!(matches!(err, crate::DirectoryError::Malformed(_)));
    }

    #[test]
    fn empty_page() {
        let page = Page::from_rows(vec![]).unwrap();
        assert!(page.is_empty());
        assert_eq!(page.last_id(), None);
        assert_eq!(page.account_count(), 0);
    }
}
