//! SQLite schema, versioned in `schema_migrations`.
//!
//! [`MIGRATIONS`] lists the schema steps in order; step `n` takes the
//! database to version `n + 1`. Pending steps run in one transaction.

use rusqlite::{params, Connection, Transaction};

use crate::error::{Result, StoreError};

/// Schema steps, oldest first.
const MIGRATIONS: &[&str] = &[V1_AUTHORIZATIONS];

/// Schema version this build writes.
pub const CURRENT_VERSION: u32 = MIGRATIONS.len() as u32;

const V1_AUTHORIZATIONS: &str = r#"
    -- Every grant ever made, in insertion order
    CREATE TABLE authorization_records (
        record_id INTEGER PRIMARY KEY AUTOINCREMENT,
        package_name TEXT NOT NULL,
        identity TEXT NOT NULL,
        granted_at INTEGER NOT NULL,      -- Unix ms
        expires_at INTEGER NOT NULL,      -- Unix ms, valid while now < expires_at
        revoked INTEGER NOT NULL DEFAULT 0,
        revoked_at INTEGER,               -- Unix ms, set together with revoked
        superseded INTEGER NOT NULL DEFAULT 0
    );

    -- The one current record per (package, identity)
    CREATE TABLE current_authorizations (
        package_name TEXT NOT NULL,
        identity TEXT NOT NULL,
        record_id INTEGER NOT NULL UNIQUE
            REFERENCES authorization_records(record_id) ON DELETE CASCADE,
        PRIMARY KEY (package_name, identity)
    );

    CREATE INDEX idx_records_package
        ON authorization_records(package_name, granted_at, record_id);
    CREATE INDEX idx_records_pair ON authorization_records(package_name, identity);
"#;

/// Bring the schema up to [`CURRENT_VERSION`]. Safe to call on every open.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
    )?;

    let found = schema_version(conn)?;
    if found > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "schema version {} was written by a newer build (this one knows {})",
            found, CURRENT_VERSION
        )));
    }
    if found == CURRENT_VERSION {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for (index, sql) in MIGRATIONS.iter().enumerate().skip(found as usize) {
        record_step(&tx, index as u32 + 1, sql)?;
    }
    tx.commit()?;

    tracing::info!(from = found, to = CURRENT_VERSION, "migrated sqlite schema");
    Ok(())
}

/// Highest applied version, `0` for a fresh database.
pub fn schema_version(conn: &Connection) -> Result<u32> {
    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

fn record_step(tx: &Transaction<'_>, version: u32, sql: &str) -> Result<()> {
    tx.execute_batch(sql)
        .map_err(|e| StoreError::Migration(format!("schema step {}: {}", version, e)))?;
    tx.execute(
        "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        params![version, unix_millis()],
    )?;
    Ok(())
}

fn unix_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::ErrorCode;

    fn migrated() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", "ON").unwrap();
        migrate(&mut conn).unwrap();
        conn
    }

    fn insert_record(conn: &Connection, package: &str, identity: &str) -> i64 {
        conn.execute(
            "INSERT INTO authorization_records (package_name, identity, granted_at, expires_at)
             VALUES (?1, ?2, 0, 1000)",
            params![package, identity],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    fn point_current(
        conn: &Connection,
        package: &str,
        identity: &str,
        record_id: i64,
    ) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT INTO current_authorizations (package_name, identity, record_id)
             VALUES (?1, ?2, ?3)",
            params![package, identity, record_id],
        )
    }

    fn constraint_violation(err: rusqlite::Error) -> bool {
        err.sqlite_error_code() == Some(ErrorCode::ConstraintViolation)
    }

    #[test]
    fn test_pair_has_one_current_pointer() {
        let conn = migrated();
        let first = insert_record(&conn, "left-pad", "dev@example.com");
        let second = insert_record(&conn, "left-pad", "dev@example.com");

        point_current(&conn, "left-pad", "dev@example.com", first).unwrap();
        let err = point_current(&conn, "left-pad", "dev@example.com", second).unwrap_err();
        assert!(constraint_violation(err));

        // Another identity on the same package gets its own pointer.
        let other = insert_record(&conn, "left-pad", "alice@x.com");
        point_current(&conn, "left-pad", "alice@x.com", other).unwrap();
    }

    #[test]
    fn test_record_is_current_for_at_most_one_pair() {
        let conn = migrated();
        let record = insert_record(&conn, "left-pad", "dev@example.com");

        point_current(&conn, "left-pad", "dev@example.com", record).unwrap();
        let err = point_current(&conn, "pkg-b", "dev@example.com", record).unwrap_err();
        assert!(constraint_violation(err));
    }

    #[test]
    fn test_pointer_requires_existing_record_and_follows_deletes() {
        let conn = migrated();
        let err = point_current(&conn, "left-pad", "dev@example.com", 42).unwrap_err();
        assert!(constraint_violation(err));

        let record = insert_record(&conn, "left-pad", "dev@example.com");
        point_current(&conn, "left-pad", "dev@example.com", record).unwrap();
        conn.execute("DELETE FROM authorization_records", []).unwrap();

        let pointers: i64 = conn
            .query_row("SELECT COUNT(*) FROM current_authorizations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(pointers, 0);
    }

    #[test]
    fn test_record_ids_not_reused_after_delete() {
        let conn = migrated();
        let first = insert_record(&conn, "left-pad", "dev@example.com");
        conn.execute("DELETE FROM authorization_records", []).unwrap();

        let second = insert_record(&conn, "left-pad", "dev@example.com");
        assert!(second > first);
    }

    #[test]
    fn test_reopen_keeps_version_and_rows() {
        let mut conn = migrated();
        insert_record(&conn, "left-pad", "dev@example.com");

        migrate(&mut conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), CURRENT_VERSION);
        let steps: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(steps, i64::from(CURRENT_VERSION));
        let records: i64 = conn
            .query_row("SELECT COUNT(*) FROM authorization_records", [], |row| row.get(0))
            .unwrap();
        assert_eq!(records, 1);
    }

    #[test]
    fn test_newer_schema_rejected() {
        let mut conn = migrated();
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, 0)",
            params![CURRENT_VERSION + 1],
        )
        .unwrap();

        let err = migrate(&mut conn).unwrap_err();
        assert!(matches!(err, StoreError::Migration(_)));
    }
}
