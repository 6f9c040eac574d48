//! # Persistence Module
//!
//! Durable sinks for scoring records and participant intake.
//!
//! ## Key Components:
//! - **AnalysisStore**: PostgreSQL table writes (append-only analysis rows,
//!   idempotent participant registration)
//! - **FileStore**: per-subject flat files (transcript summary, JSON
//!   artifacts, CSV ledger)
//!
//! ## Failure policy:
//! Persistence failures are isolated from the request path. Scoring always
//! happens before persistence; a sink error is logged by the caller and the
//! scoring result still reaches the client. This trades durability for
//! availability of the assessment flow, which is the documented intent of
//! the service, not a general recommendation.

pub mod files;
pub mod store;

pub use files::FileStore;
pub use store::{AnalysisStore, ParticipantRecord};

use std::fmt;

/// Errors raised by the persistence adapters.
///
/// A sink that is not configured at all does not error; it is simply absent
/// from `AppState`. These variants only describe configured sinks that
/// failed to take a write.
#[derive(Debug)]
pub enum PersistError {
    /// The database rejected the operation or could not be reached.
    Database(String),

    /// A flat-file sink failed (missing directory, permissions, disk).
    Io(String),
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistError::Database(msg) => write!(f, "Database error: {}", msg),
            PersistError::Io(msg) => write!(f, "File sink error: {}", msg),
        }
    }
}

impl std::error::Error for PersistError {}

impl From<sqlx::Error> for PersistError {
    fn from(err: sqlx::Error) -> Self {
        PersistError::Database(err.to_string())
    }
}

impl From<std::io::Error> for PersistError {
    fn from(err: std::io::Error) -> Self {
        PersistError::Io(err.to_string())
    }
}
