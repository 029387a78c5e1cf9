use std::time::Duration;

use rusqlite::Connection;

const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Columns every license database must provide.
pub(crate) const LICENSE_COLUMNS: [&str; 9] = [
    "id",
    "customer",
    "product",
    "issued_at",
    "expires_at",
    "features",
    "hwid",
    "signature",
    "canonical",
];

pub(crate) fn configure_sqlite(conn: &Connection) -> Result<(), rusqlite::Error> {
    // journal_mode cannot change inside a transaction, and it answers with the
    // mode now in effect.
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    conn.busy_timeout(BUSY_TIMEOUT)
}

/// Creates the `licenses` table when missing. AUTOINCREMENT keeps identifiers
/// from being handed out twice, even after the newest row is deleted.
pub(crate) fn init_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS licenses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            customer TEXT,
            product TEXT,
            issued_at TEXT,
            expires_at TEXT,
            features TEXT,
            hwid TEXT NOT NULL,
            signature TEXT NOT NULL,
            canonical TEXT NOT NULL
        );
        "#,
    )
}

/// Columns of [`LICENSE_COLUMNS`] the existing `licenses` table lacks.
pub(crate) fn missing_columns(conn: &Connection) -> Result<Vec<&'static str>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('licenses')")?;
    let present = stmt
        .query_map([], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(LICENSE_COLUMNS
        .into_iter()
        .filter(|c| !present.iter().any(|p| p == c))
        .collect())
}
