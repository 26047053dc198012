//! Ledger/posting service contract — performs the actual interest write.

use crate::account::AccountRecord;
use crate::params::JobParameters;

/// Posts interest for one account.
///
/// `rows` holds every row of a single account (same id throughout) — the
/// worker groups them before calling. Implementations own write consistency
/// for the account; the engine only guarantees that no two of its workers
/// target the same account concurrently.
pub trait LedgerClient {
    fn post_interest(&self, rows: &[AccountRecord], params: &JobParameters)
    -> Result<(), PostError>;
}

/// Typed posting outcome, replacing exception-based flow control: the worker
/// branches on the variant instead of catching error subclasses.
#[derive(Clone, Debug)]
pub enum PostError {
    /// Domain-level rejection for this account (invalid state, already
    /// posted). Recorded; the worker moves on to the next account.
    Rejected(String),
    /// Write contention (row lock / optimistic-lock failure). Retried with
    /// jittered backoff before being recorded as a failure.
    Contention(String),
    /// Ledger service unreachable. Fatal for the whole sub-batch; remaining
    /// accounts are not attempted.
    Unavailable(String),
}

impl PostError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Contention(_))
    }

    /// Whether this error aborts the rest of the sub-batch.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl std::fmt::Display for PostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected(msg) => write!(f, "rejected: {msg}"),
            Self::Contention(msg) => write!(f, "contention: {msg}"),
            Self::Unavailable(msg) => write!(f, "ledger unavailable: {msg}"),
        }
    }
}

impl std::error::Error for PostError {}
