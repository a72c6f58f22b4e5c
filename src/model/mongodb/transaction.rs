//! Retrying transactions that lose a write conflict.

use std::future::Future;
use std::time::{Duration, Instant};

use mongodb::{error::Error as DbError, ClientSession};
use rand::Rng;
use rocket::tokio::time::sleep;

use super::errors::{is_transient_transaction_error, is_unknown_commit_result};
use crate::error::{Error, Result};

/// Default time spent retrying a conflicting transaction, as in the driver's
/// own convenient transaction API.
pub const DEFAULT_RETRY_WINDOW: Duration = Duration::from_secs(120);

/// How many times an ambiguous commit is retried before giving up.
const MAX_COMMIT_RETRIES: u32 = 3;

const BASE_DELAY_MS: u64 = 5;
const MAX_DELAY_MS: u64 = 250;

/// Randomised exponential backoff before the given retry (counting from 1).
pub fn retry_delay(retry: u32) -> Duration {
    let ceiling = BASE_DELAY_MS
        .saturating_mul(1 << retry.min(16))
        .min(MAX_DELAY_MS);
    Duration::from_millis(rand::thread_rng().gen_range(ceiling / 2..=ceiling))
}

/// Run `transaction` until it succeeds, fails with anything other than a
/// transient transaction error, or `window` has elapsed.
///
/// Each call of `transaction` must start and finish its own transaction.
pub async fn retry_transient<T, F, Fut>(
    what: &str,
    window: Duration,
    mut transaction: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let started = Instant::now();
    let mut retry = 0;
    loop {
        match transaction().await {
            Err(Error::Db(e)) if is_transient_transaction_error(&e) => {
                retry += 1;
                if started.elapsed() >= window {
                    error!("{what} still conflicting after {retry} attempt(s): {e}");
                    return Err(e.into());
                }
                let delay = retry_delay(retry);
                warn!("{what} hit a transient conflict, retrying in {delay:?}");
                sleep(delay).await;
            }
            result => return result,
        }
    }
}

/// Commit the session's transaction if `result` is a success, otherwise abort it.
pub async fn finish<T>(session: &mut ClientSession, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            commit(session).await?;
            Ok(value)
        }
        Err(e) => {
            abort(session).await;
            Err(e)
        }
    }
}

/// Commit, retrying while the server cannot say whether the commit applied.
async fn commit(session: &mut ClientSession) -> std::result::Result<(), DbError> {
    let mut retries = 0;
    loop {
        match session.commit_transaction().await {
            Ok(()) => return Ok(()),
            Err(e) if is_unknown_commit_result(&e) && retries < MAX_COMMIT_RETRIES => {
                retries += 1;
                warn!("Commit outcome unknown, retrying commit ({retries}): {e}");
            }
            Err(e) => return Err(e),
        }
    }
}

/// Abort the transaction. The server may already have aborted it, in which case
/// there is nothing left to undo.
async fn abort(session: &mut ClientSession) {
    if let Err(e) = session.abort_transaction().await {
        debug!("Abort after a failed transaction reported: {e}");
    }
}
