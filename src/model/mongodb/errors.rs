//! For some reason, the mongodb crate doesn't provide error code constants.
//! This module fills in the gaps, and classifies the failures that the
//! vote ledger treats specially.

use mongodb::error::{
    Error as DbError, ErrorKind, WriteFailure, TRANSIENT_TRANSACTION_ERROR,
    UNKNOWN_TRANSACTION_COMMIT_RESULT,
};

pub const DUPLICATE_KEY: i32 = 11000;
pub const WRITE_CONFLICT: i32 = 112;

/// Return true if the given error is a duplicate key write error.
pub fn is_duplicate_key_error(err: &DbError) -> bool {
    match *err.kind {
        ErrorKind::Write(WriteFailure::WriteError(ref e)) => e.code == DUPLICATE_KEY,
        ErrorKind::Command(ref e) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}

/// Return true if the whole transaction should be retried from the start.
pub fn is_transient_transaction_error(err: &DbError) -> bool {
    if err.contains_label(TRANSIENT_TRANSACTION_ERROR) {
        return true;
    }
    match *err.kind {
        ErrorKind::Command(ref e) => e.code == WRITE_CONFLICT,
        _ => false,
    }
}

/// Return true if a commit may or may not have been applied, and should be retried.
pub fn is_unknown_commit_result(err: &DbError) -> bool {
    err.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT)
}
