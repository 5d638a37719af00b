//! Database module with project, ticket, timer, session and variable queries plus migrations.

mod migrations;
mod project;
mod sessions;
mod timer;
mod vars;

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::error::Result;

// Re-export all public functions
pub use migrations::{SCHEMA_VERSION, run_migrations, schema_version};
pub use project::{
    query_projects, query_ticket_by_id, query_tickets, replace_remote_cache,
    ticket_exists,
};
pub use sessions::{
    close_open_sessions, create_session, query_sessions_by_timer, update_session_end,
    update_session_start,
};
pub use timer::{
    create_timer, delete_timer, mark_posted, query_timer_by_id, query_timer_ids,
    update_timer_ticket,
};
pub use vars::{get_var, last_synced, set_last_synced, set_var};

/// Opens (or creates) the SQLite database and runs migrations.
pub fn init(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).ok();
        }
    }
    let conn = Connection::open(db_path)?;
    configure(&conn)?;
    run_migrations(&conn)?;
    tracing::debug!(path = %db_path.display(), "database ready");
    Ok(conn)
}

/// Opens a private in-memory database with the full schema.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    run_migrations(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(())
}

/// The per-user data directory for qtimer.
pub fn data_dir() -> PathBuf {
    match dirs::data_local_dir() {
        Some(dir) => dir.join("qtimer"),
        None => PathBuf::from("."),
    }
}

/// Returns the default database path inside the user's data directory.
/// Falls back to `./qtimer.db` when no data dir is found.
pub fn default_db_path() -> PathBuf {
    data_dir().join("qtimer.db")
}

/// Runs `body` inside a write transaction that takes the database lock up
/// front. Commits when `body` succeeds, rolls back and hands the error back
/// otherwise.
pub fn write_transaction<T, F>(conn: &Connection, body: F) -> Result<T>
where
    F: FnOnce(&Transaction<'_>) -> Result<T>,
{
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    match body(&tx) {
        Ok(value) => {
            tx.commit()?;
            Ok(value)
        }
        Err(err) => {
            tracing::warn!("rolling back transaction: {err}");
            if let Err(rollback_err) = tx.rollback() {
                tracing::error!("rollback failed: {rollback_err}");
            }
            Err(err)
        }
    }
}

pub(crate) fn format_time(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub(crate) fn parse_time(column: usize, raw: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                Box::new(err),
            )
        })
}

/// Builds a `LIKE` pattern matching `needle` anywhere, with wildcards escaped.
/// Use together with `ESCAPE '\'`.
pub(crate) fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn escapes_like_wildcards() {
        assert_eq!(contains_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn failed_body_rolls_back() {
        let conn = open_in_memory().unwrap();
        let result: Result<()> = write_transaction(&conn, |tx| {
            create_timer("discarded", None, tx)?;
            Err(Error::InvalidState("abort".into()))
        });
        assert!(result.is_err());
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM timers", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn successful_body_commits() {
        let conn = open_in_memory().unwrap();
        let id = write_transaction(&conn, |tx| create_timer("kept", None, tx)).unwrap();
        assert!(query_timer_by_id(id, &conn).unwrap().is_some());
    }

    #[test]
    fn timestamps_survive_storage() {
        let stored = DateTime::parse_from_rfc3339("2024-02-03T04:05:06Z")
            .unwrap()
            .with_timezone(&Utc);
        let raw = format_time(stored);
        assert_eq!(raw, "2024-02-03T04:05:06Z");
        assert_eq!(parse_time(0, raw).unwrap().to_rfc3339(), "2024-02-03T04:05:06+00:00");
    }
}
