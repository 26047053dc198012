//! Account directory service contract — the engine's page source.

use crate::account::{AccountStatus, Page};

/// Query parameters that select which accounts are eligible for posting.
#[derive(Clone, Copy, Debug)]
pub struct FetchCriteria {
    pub status: AccountStatus,
    /// Whether accounts with backdated transactions pending are included.
    pub include_backdated: bool,
}

impl Default for FetchCriteria {
    fn default() -> Self {
        Self {
            status: AccountStatus::Active,
            include_backdated: false,
        }
    }
}

/// Supplies pages of eligible accounts, ordered by id ascending.
///
/// `fetch_eligible_page` must return rows strictly after `after_id`, at most
/// `page_size` of them, and an empty page (not an error) once exhausted.
/// Repeated calls with the same cursor must be safe (idempotent read).
pub trait AccountDirectory {
    fn fetch_eligible_page(
        &self,
        criteria: &FetchCriteria,
        after_id: u64,
        page_size: usize,
    ) -> Result<Page, DirectoryError>;
}

/// Error from the account directory. Both variants abort the run; the engine
/// never retries a fetch.
#[derive(Debug)]
pub enum DirectoryError {
    /// Directory service unreachable or query failed.
    Unavailable(String),
    /// Response violated the contract (e.g. rows out of order).
    Malformed(String),
}

impl std::fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(msg) => write!(f, "directory unavailable: {msg}"),
            Self::Malformed(msg) => write!(f, "malformed directory response: {msg}"),
        }
    }
}

impl std::error::Error for DirectoryError {}
