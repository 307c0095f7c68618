//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend for KAM. It uses rusqlite with
//! bundled SQLite, wrapped in async via tokio::spawn_blocking.
//!
//! A file-backed store holds two connections: one for writes and a
//! read-only one for queries. In WAL mode a query runs against the last
//! committed snapshot, so reads do not wait for a write's fsync.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{
    params, Connection, ErrorCode, OpenFlags, OptionalExtension, TransactionBehavior,
};

use kam_core::{AuthorizationRecord, Identity, NewGrant, PackageName, RecordId};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{RevokeResult, Store};

/// How long a writer waits on a lock held by another connection.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const RECORD_COLUMNS: &str = "r.record_id, r.package_name, r.identity, r.granted_at, \
                              r.expires_at, r.revoked, r.revoked_at, r.superseded";

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// Connection for mutations, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
    /// Connection for queries. The same connection as `conn` for in-memory
    /// databases, which cannot be shared between connections.
    reader: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file (and its parent directory) and runs migrations if it
    /// doesn't exist. The journal runs in WAL mode with full fsync so a
    /// committed grant survives a crash.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut conn = Connection::open(path)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        if !mode.eq_ignore_ascii_case("wal") {
            tracing::warn!(%mode, path = %path.display(), "sqlite refused WAL journal mode");
        }
        conn.pragma_update(None, "synchronous", "FULL")?;
        Self::configure(&mut conn)?;

        // Opened after migration so the schema is already in place.
        let reader = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        reader.busy_timeout(BUSY_TIMEOUT)?;

        tracing::debug!(path = %path.display(), "opened sqlite store");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            reader: Arc::new(Mutex::new(reader)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        Self::configure(&mut conn)?;
        let conn = Arc::new(Mutex::new(conn));
        Ok(Self {
            reader: Arc::clone(&conn),
            conn,
        })
    }

    fn configure(conn: &mut Connection) -> Result<()> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migration::migrate(conn)
    }

    /// Run a mutation on the write connection off the async runtime.
    async fn run<F, T>(&self, op: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        Self::blocking(self.conn.clone(), op, f).await
    }

    /// Run a query on the read connection.
    async fn read<F, T>(&self, op: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        Self::blocking(self.reader.clone(), op, f).await
    }

    async fn blocking<F, T>(conn: Arc<Mutex<Connection>>, op: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Unavailable(format!("mutex poisoned: {}", e)))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("{}: spawn_blocking failed: {}", op, e)))?
    }
}

fn conversion_error(
    column: usize,
    ty: Type,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, ty, Box::new(err))
}

// Helper to convert a row to AuthorizationRecord
fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuthorizationRecord> {
    let record_id: i64 = row.get(0)?;
    let package_name: String = row.get(1)?;
    let identity: String = row.get(2)?;

    let record_id = u64::try_from(record_id).map_err(|e| conversion_error(0, Type::Integer, e))?;
    let package_name =
        PackageName::new(package_name).map_err(|e| conversion_error(1, Type::Text, e))?;
    let identity = Identity::new(identity).map_err(|e| conversion_error(2, Type::Text, e))?;

    Ok(AuthorizationRecord {
        record_id: RecordId::new(record_id),
        package_name,
        identity,
        granted_at: row.get(3)?,
        expires_at: row.get(4)?,
        revoked: row.get(5)?,
        revoked_at: row.get(6)?,
        superseded: row.get(7)?,
    })
}

fn select_current(
    conn: &Connection,
    package_name: &PackageName,
    identity: &Identity,
) -> rusqlite::Result<Option<AuthorizationRecord>> {
    conn.query_row(
        &format!(
            "SELECT {RECORD_COLUMNS} FROM current_authorizations c
             JOIN authorization_records r ON r.record_id = c.record_id
             WHERE c.package_name = ?1 AND c.identity = ?2"
        ),
        params![package_name.as_str(), identity.as_str()],
        row_to_record,
    )
    .optional()
}

// Constraint violations on the current table mean another writer raced us.
fn map_write_error(
    err: rusqlite::Error,
    package_name: &PackageName,
    identity: &Identity,
) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(e, msg) if e.code == ErrorCode::ConstraintViolation => {
            StoreError::Conflict {
                package_name: package_name.to_string(),
                identity: identity.to_string(),
                detail: msg.clone().unwrap_or_else(|| e.to_string()),
            }
        }
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_grant(&self, grant: NewGrant) -> Result<AuthorizationRecord> {
        self.run("insert_grant", move |conn| {
            let package_name = grant.package_name.clone();
            let identity = grant.identity.clone();

            let write = |conn: &mut Connection| -> rusqlite::Result<i64> {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

                // Retire the previous current record
                tx.execute(
                    "UPDATE authorization_records SET superseded = 1
                     WHERE record_id = (
                         SELECT record_id FROM current_authorizations
                         WHERE package_name = ?1 AND identity = ?2
                     )",
                    params![grant.package_name.as_str(), grant.identity.as_str()],
                )?;

                tx.execute(
                    "INSERT INTO authorization_records (
                        package_name, identity, granted_at, expires_at, revoked, superseded
                    ) VALUES (?1, ?2, ?3, ?4, 0, 0)",
                    params![
                        grant.package_name.as_str(),
                        grant.identity.as_str(),
                        grant.granted_at,
                        grant.expires_at,
                    ],
                )?;
                let record_id = tx.last_insert_rowid();

                tx.execute(
                    "INSERT INTO current_authorizations (package_name, identity, record_id)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT(package_name, identity)
                     DO UPDATE SET record_id = excluded.record_id",
                    params![grant.package_name.as_str(), grant.identity.as_str(), record_id],
                )?;

                tx.commit()?;
                Ok(record_id)
            };

            let record_id = write(conn).map_err(|e| map_write_error(e, &package_name, &identity))?;
            let record_id = u64::try_from(record_id)
                .map_err(|_| StoreError::InvalidData(format!("negative record id {}", record_id)))?;

            Ok(AuthorizationRecord::from_grant(RecordId::new(record_id), grant))
        })
        .await
    }

    async fn revoke_current(
        &self,
        package_name: &PackageName,
        identity: &Identity,
        at: i64,
    ) -> Result<RevokeResult> {
        let package_name = package_name.clone();
        let identity = identity.clone();

        self.run("revoke_current", move |conn| {
            let write = |conn: &mut Connection| -> rusqlite::Result<RevokeResult> {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

                let Some(mut record) = select_current(&tx, &package_name, &identity)? else {
                    return Ok(RevokeResult::NotFound);
                };

                if record.revoked {
                    return Ok(RevokeResult::AlreadyRevoked(record));
                }

                tx.execute(
                    "UPDATE authorization_records SET revoked = 1, revoked_at = ?1
                     WHERE record_id = ?2",
                    params![at, record.record_id.get() as i64],
                )?;
                tx.commit()?;

                record.revoked = true;
                record.revoked_at = Some(at);
                Ok(RevokeResult::Revoked(record))
            };

            write(conn).map_err(|e| map_write_error(e, &package_name, &identity))
        })
        .await
    }

    async fn reset(&self) -> Result<u64> {
        self.run("reset", |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            tx.execute("DELETE FROM current_authorizations", [])?;
            let removed = tx.execute("DELETE FROM authorization_records", [])?;
            tx.commit()?;
            Ok(removed as u64)
        })
        .await
    }

    async fn current_record(
        &self,
        package_name: &PackageName,
        identity: &Identity,
    ) -> Result<Option<AuthorizationRecord>> {
        let package_name = package_name.clone();
        let identity = identity.clone();

        self.read("current_record", move |conn| {
            Ok(select_current(conn, &package_name, &identity)?)
        })
        .await
    }

    async fn get_record(&self, id: RecordId) -> Result<Option<AuthorizationRecord>> {
        self.read("get_record", move |conn| {
            let record = conn
                .query_row(
                    &format!(
                        "SELECT {RECORD_COLUMNS} FROM authorization_records r
                         WHERE r.record_id = ?1"
                    ),
                    params![id.get() as i64],
                    row_to_record,
                )
                .optional()?;
            Ok(record)
        })
        .await
    }

    async fn records_for_package(
        &self,
        package_name: &PackageName,
    ) -> Result<Vec<AuthorizationRecord>> {
        let package_name = package_name.clone();

        self.read("records_for_package", move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RECORD_COLUMNS} FROM authorization_records r
                 WHERE r.package_name = ?1
                 ORDER BY r.granted_at, r.record_id"
            ))?;

            let records = stmt
                .query_map(params![package_name.as_str()], row_to_record)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(records)
        })
        .await
    }

    async fn all_records(&self) -> Result<BTreeMap<PackageName, Vec<AuthorizationRecord>>> {
        self.read("all_records", |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RECORD_COLUMNS} FROM authorization_records r
                 ORDER BY r.package_name, r.granted_at, r.record_id"
            ))?;

            let mut packages: BTreeMap<PackageName, Vec<AuthorizationRecord>> = BTreeMap::new();
            for record in stmt.query_map([], row_to_record)? {
                let record = record?;
                packages
                    .entry(record.package_name.clone())
                    .or_default()
                    .push(record);
            }

            Ok(packages)
        })
        .await
    }

    async fn record_count(&self) -> Result<u64> {
        self.read("record_count", |conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM authorization_records", [], |row| {
                    row.get(0)
                })?;
            Ok(count as u64)
        })
        .await
    }
}
