//! Retrying unit-of-work execution.
//!
//! `execute_in_transaction` opens a transaction, runs the unit of work, and
//! commits. Transient store conflicts (serialization failures, deadlocks, lock
//! wait timeouts) roll the attempt back and replay the whole unit of work after
//! an exponential backoff, up to `RetryPolicy::max_attempts`. The unit of work
//! must not have effects outside the transaction.

use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::store::{CommitReceipt, StockStore, StockTransaction, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    pub max_attempts: u32,
    #[serde(with = "millis")]
    pub base_backoff: Duration,
    #[serde(with = "millis")]
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_millis(20),
            max_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// No backoff between attempts (tests).
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay before retrying after failed attempt number `attempt` (1-based):
    /// `base * 2^(attempt-1)`, capped at `max_backoff`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let pow = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_backoff.saturating_mul(pow).min(self.max_backoff)
    }
}

pub(crate) mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis().min(u64::MAX as u128) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Error types a unit of work may fail with.
///
/// The helper needs to tell transient store conflicts apart from terminal
/// failures, and to report an exhausted retry budget in the caller's error type.
pub trait TransactionFailure: From<StoreError> {
    /// The store conflict behind this error, if it is one worth retrying.
    fn transient_cause(&self) -> Option<&StoreError>;

    fn retries_exhausted(attempts: u32, last_error: StoreError) -> Self;
}

/// Run `work` in a fresh transaction per attempt and commit it.
///
/// Returns the unit of work's value together with the commit receipt. Errors that
/// are not transient abort immediately (the transaction is rolled back by drop).
pub fn execute_in_transaction<S, T, E, F>(store: &S, policy: &RetryPolicy, mut work: F) -> Result<(T, CommitReceipt), E>
where
    S: StockStore + ?Sized,
    E: TransactionFailure,
    F: FnMut(&mut dyn StockTransaction) -> Result<T, E>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let result = run_once(store, &mut work);
        let err = match result {
            Ok(done) => return Ok(done),
            Err(err) => err,
        };

        let Some(cause) = err.transient_cause().cloned() else {
            return Err(err);
        };
        if attempt >= max_attempts {
            warn!(attempts = attempt, error = %cause, "transaction retries exhausted");
            return Err(E::retries_exhausted(attempt, cause));
        }

        let delay = policy.backoff_for(attempt);
        warn!(
            attempt,
            max_attempts,
            backoff_ms = delay.as_millis() as u64,
            error = %cause,
            "transient store conflict, retrying transaction"
        );
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }
}

fn run_once<S, T, E, F>(store: &S, work: &mut F) -> Result<(T, CommitReceipt), E>
where
    S: StockStore + ?Sized,
    E: TransactionFailure,
    F: FnMut(&mut dyn StockTransaction) -> Result<T, E>,
{
    let mut tx = store.begin()?;
    let value = work(tx.as_mut())?;
    let receipt = tx.commit()?;
    Ok((value, receipt))
}
