//! Embedded document store for users, startups and funding requests
//!
//! This is the in-process counterpart of the marketplace API: every call
//! takes the caller's [`Session`](crate::core::session::Session) and applies
//! the same role gates a remote service would.

mod requests;
mod schema;
mod startups;
mod users;

pub use requests::RequestView;
pub use startups::ProfileSubmitter;
pub use users::AuthResponse;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::debug;

use crate::core::identity::{RecordId, RecordPrefix};
use crate::entities::{Role, TerminalStateError};

/// Current store schema version
const SCHEMA_VERSION: i32 = 1;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("this action requires the {required} role (signed in as {actual})")]
    Forbidden { required: Role, actual: Role },

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("an account with email '{0}' already exists")]
    EmailTaken(String),

    #[error("not signed in or session expired; run 'fundr auth login'")]
    Unauthorized,

    #[error(transparent)]
    Terminal(#[from] TerminalStateError),

    #[error("invalid input: {0}")]
    Invalid(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("stored data is malformed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store schema version {found} is not supported (expected {expected})")]
    SchemaVersion { found: i32, expected: i32 },
}

/// The document store backed by SQLite
pub struct Backend {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend").finish_non_exhaustive()
    }
}

impl Backend {
    /// Open or create the store at `path`
    pub fn open(path: &Path) -> Result<Self, ApiError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ApiError::Invalid(format!("cannot create {}: {}", parent.display(), e)))?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        debug!(path = %path.display(), "opened store");
        Self::from_connection(conn)
    }

    /// A throwaway store, used by tests
    pub fn open_in_memory() -> Result<Self, ApiError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, ApiError> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        schema::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Fixed-width timestamps so stored values sort chronologically
fn stamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_time(s: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| ApiError::Invalid(format!("bad timestamp '{}': {}", s, e)))
}

fn parse_id(s: &str, prefix: RecordPrefix) -> Result<RecordId, ApiError> {
    RecordId::parse_as(s, prefix).map_err(|e| ApiError::Invalid(e.to_string()))
}
