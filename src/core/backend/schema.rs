//! Store schema initialization

use rusqlite::{params, Connection, OptionalExtension};

use super::{ApiError, SCHEMA_VERSION};

/// Create tables on first use and refuse stores from another schema version
pub(super) fn init_schema(conn: &Connection) -> Result<(), ApiError> {
    conn.execute_batch(
        r#"
        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );

        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            role TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            salt TEXT NOT NULL,
            created TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_users_role ON users(role);

        -- Only SHA-256 digests of session tokens are stored
        CREATE TABLE IF NOT EXISTS sessions (
            token_hash TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            created TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS startups (
            id TEXT PRIMARY KEY,
            founder_id TEXT NOT NULL,
            company_name TEXT NOT NULL,
            description TEXT,
            team_size INTEGER,
            tech_stack TEXT NOT NULL,
            funding_needed REAL,
            milestones TEXT NOT NULL,
            documents TEXT NOT NULL,
            profile TEXT NOT NULL,
            created TEXT NOT NULL,
            FOREIGN KEY (founder_id) REFERENCES users(id)
        );
        CREATE INDEX IF NOT EXISTS idx_startups_founder ON startups(founder_id);

        CREATE TABLE IF NOT EXISTS funding_requests (
            id TEXT PRIMARY KEY,
            startup_id TEXT NOT NULL,
            investor_id TEXT NOT NULL,
            status TEXT NOT NULL,
            notes TEXT,
            meeting_schedule TEXT,
            created TEXT NOT NULL,
            updated TEXT NOT NULL,
            FOREIGN KEY (startup_id) REFERENCES startups(id),
            FOREIGN KEY (investor_id) REFERENCES users(id)
        );
        CREATE INDEX IF NOT EXISTS idx_requests_investor ON funding_requests(investor_id);
        CREATE INDEX IF NOT EXISTS idx_requests_startup ON funding_requests(startup_id);
        CREATE INDEX IF NOT EXISTS idx_requests_status ON funding_requests(status);
        "#,
    )?;

    let found: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .optional()?;
    match found {
        None => {
            conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )?;
            Ok(())
        }
        Some(v) if v == SCHEMA_VERSION => Ok(()),
        Some(found) => Err(ApiError::SchemaVersion {
            found,
            expected: SCHEMA_VERSION,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_other_version_is_refused() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn.execute("UPDATE schema_version SET version = 99", []).unwrap();
        assert!(matches!(
            init_schema(&conn).unwrap_err(),
            ApiError::SchemaVersion { found: 99, .. }
        ));
    }
}
