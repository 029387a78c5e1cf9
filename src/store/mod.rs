//! SQLite-backed license records.
//!
//! A [`LicenseStore`] owns one connection to one database file at a time. The
//! connection sits behind a mutex so that [`LicenseStore::switch`] is observed
//! by every other operation as a single step: each call runs entirely against
//! either the old database or the new one.

mod record;
mod schema;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, DatabaseName, ErrorCode, OptionalExtension, TransactionBehavior};

pub use record::{LicenseId, LicenseRecord};

use crate::error::{Error, Result};
use crate::license::SignedLicense;
use record::{record_from_row, SELECT_LICENSE};

struct ActiveStore {
    path: PathBuf,
    conn: Connection,
}

pub struct LicenseStore {
    active: Mutex<Option<ActiveStore>>,
}

impl std::fmt::Debug for LicenseStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LicenseStore").field("path", &self.path()).finish()
    }
}

fn sqlite_error_string(err: &rusqlite::Error) -> String {
    if let rusqlite::Error::SqliteFailure(failure, msg) = err {
        return format!(
            "{:?} (extended code {}): {}",
            failure.code,
            failure.extended_code,
            msg.as_deref().unwrap_or("no message")
        );
    }
    err.to_string()
}

fn map_sqlite_error(path: &Path, err: &rusqlite::Error) -> Error {
    let detail = format!("{}: {}", path.display(), sqlite_error_string(err));
    match err {
        rusqlite::Error::SqliteFailure(code, _)
            if matches!(code.code, ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt) =>
        {
            Error::StoreCorrupt(detail)
        }
        rusqlite::Error::FromSqlConversionFailure(..)
        | rusqlite::Error::InvalidColumnType(..)
        | rusqlite::Error::IntegralValueOutOfRange(..) => Error::StoreCorrupt(detail),
        _ => Error::StoreUnavailable(detail),
    }
}

/// Opens `path` for read/write, creating the file and its parent directory when
/// missing, and makes sure the `licenses` table is usable.
fn open_connection(path: &Path) -> Result<Connection> {
    if path.is_dir() {
        return Err(Error::StoreUnavailable(format!(
            "{} is a directory, not a database file",
            path.display()
        )));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            Error::StoreUnavailable(format!("cannot create {}: {e}", parent.display()))
        })?;
    }

    let conn = Connection::open(path).map_err(|e| map_sqlite_error(path, &e))?;
    schema::configure_sqlite(&conn).map_err(|e| map_sqlite_error(path, &e))?;
    if conn
        .is_readonly(DatabaseName::Main)
        .map_err(|e| map_sqlite_error(path, &e))?
    {
        return Err(Error::StoreUnavailable(format!(
            "{} cannot be opened for writing",
            path.display()
        )));
    }
    schema::init_schema(&conn).map_err(|e| map_sqlite_error(path, &e))?;

    let missing = schema::missing_columns(&conn).map_err(|e| map_sqlite_error(path, &e))?;
    if !missing.is_empty() {
        return Err(Error::StoreCorrupt(format!(
            "{}: licenses table lacks columns {}",
            path.display(),
            missing.join(", ")
        )));
    }
    Ok(conn)
}

impl LicenseStore {
    /// Connects to the database at `path`, creating it when absent.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = open_connection(&path)?;
        tracing::info!(path = %path.display(), "Opened license store");
        Ok(Self {
            active: Mutex::new(Some(ActiveStore { path, conn })),
        })
    }

    /// A store with no backing file. Every record operation fails with
    /// [`Error::StoreUnavailable`] until [`switch`](Self::switch) succeeds.
    pub fn disconnected() -> Self {
        Self {
            active: Mutex::new(None),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.lock().map(|g| g.is_some()).unwrap_or(false)
    }

    /// Path of the database currently in use.
    pub fn path(&self) -> Option<PathBuf> {
        self.lock()
            .ok()
            .and_then(|g| g.as_ref().map(|a| a.path.clone()))
    }

    /// Makes `new_path` the active database.
    ///
    /// The new database is fully opened before the old one is released, so a
    /// failure leaves the current database connected and untouched.
    pub fn switch(&self, new_path: impl AsRef<Path>) -> Result<()> {
        let path = new_path.as_ref().to_path_buf();
        let conn = match open_connection(&path) {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "License store switch failed");
                return Err(e);
            }
        };

        let previous = {
            let mut guard = self.lock()?;
            guard.replace(ActiveStore {
                path: path.clone(),
                conn,
            })
        };
        if let Some(old) = previous {
            if let Err((_, e)) = old.conn.close() {
                tracing::warn!(path = %old.path.display(), error = %e, "Closing previous license store failed");
            }
        }
        tracing::info!(path = %path.display(), "Switched license store");
        Ok(())
    }

    /// Persists `license` and returns its newly assigned identifier.
    pub fn add(&self, license: &SignedLicense) -> Result<LicenseId> {
        let id = self.with_conn("add", |conn| {
            let c = &license.claims;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            tx.execute(
                r#"INSERT INTO licenses (customer, product, issued_at, expires_at, features, hwid, signature, canonical)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
                params![
                    c.customer,
                    c.product,
                    c.issued_at_str(),
                    c.expires_at_str(),
                    c.features,
                    c.hwid,
                    license.signature,
                    license.canonical,
                ],
            )?;
            let id = tx.last_insert_rowid();
            tx.commit()?;
            Ok(id)
        })?;
        tracing::info!(id, hwid = %license.claims.hwid, "Added license");
        Ok(id)
    }

    pub fn get(&self, id: LicenseId) -> Result<Option<LicenseRecord>> {
        self.with_conn("get", |conn| {
            conn.query_row(
                &format!("{SELECT_LICENSE} WHERE id = ?1"),
                params![id],
                record_from_row,
            )
            .optional()
        })
    }

    /// All records in insertion order.
    pub fn list(&self) -> Result<Vec<LicenseRecord>> {
        self.with_conn("list", |conn| {
            let mut stmt = conn.prepare(&format!("{SELECT_LICENSE} ORDER BY id ASC"))?;
            let rows = stmt.query_map([], record_from_row)?;
            rows.collect()
        })
    }

    /// Records where any displayed field contains `query`, ignoring case.
    /// The query is matched as given, surrounding whitespace included.
    pub fn search(&self, query: &str) -> Result<Vec<LicenseRecord>> {
        let needle = query.to_lowercase();
        Ok(self
            .list()?
            .into_iter()
            .filter(|r| r.matches_lowercase(&needle))
            .collect())
    }

    /// Removes a record. Returns `false` when no record had that identifier.
    pub fn delete(&self, id: LicenseId) -> Result<bool> {
        let removed = self.with_conn("delete", |conn| {
            Ok(conn.execute("DELETE FROM licenses WHERE id = ?1", params![id])? > 0)
        })?;
        if removed {
            tracing::info!(id, "Deleted license");
        }
        Ok(removed)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<ActiveStore>>> {
        self.active
            .lock()
            .map_err(|_| Error::StoreUnavailable("store mutex poisoned".to_string()))
    }

    fn with_conn<T, F>(&self, op_name: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T, rusqlite::Error>,
    {
        let mut guard = self.lock()?;
        let active = guard
            .as_mut()
            .ok_or_else(|| Error::StoreUnavailable("no license database open".to_string()))?;
        f(&mut active.conn).map_err(|e| {
            let err = map_sqlite_error(&active.path, &e);
            tracing::warn!(op = op_name, error = %err, "License store operation failed");
            err
        })
    }
}
