//! Database migrations and schema management.

use rusqlite::{Connection, OptionalExtension};

use crate::error::Result;

/// Version written by the newest migration below.
pub const SCHEMA_VERSION: i64 = 3;

/// Brings the schema up to `SCHEMA_VERSION`, one versioned step at a time.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL
        );",
    )?;
    let current = schema_version(conn)?;
    if current < 1 {
        migrate_v1(conn)?;
    }
    if current < 2 {
        migrate_v2(conn)?;
    }
    if current < 3 {
        migrate_v3(conn)?;
    }
    if current < SCHEMA_VERSION {
        tracing::info!(from = current, to = SCHEMA_VERSION, "database schema upgraded");
    }
    Ok(())
}

/// Returns 0 for a fresh database.
pub fn schema_version(conn: &Connection) -> Result<i64> {
    let version = conn
        .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get::<_, Option<i64>>(0)
        })
        .optional()?
        .flatten();
    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i64) -> Result<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS projects (
            id          INTEGER PRIMARY KEY,
            name        TEXT    NOT NULL
        );

        CREATE TABLE IF NOT EXISTS tickets (
            id          INTEGER PRIMARY KEY,
            ticket_id   INTEGER NOT NULL,
            name        TEXT    NOT NULL,
            project_id  INTEGER NOT NULL,
            FOREIGN KEY (project_id) REFERENCES projects(id)
        );

        CREATE TABLE IF NOT EXISTS timers (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            name            TEXT    NOT NULL,
            ticket_id       INTEGER,
            posted          INTEGER NOT NULL DEFAULT 0,
            billable_status INTEGER,
            FOREIGN KEY (ticket_id) REFERENCES tickets(id)
        );

        CREATE TABLE IF NOT EXISTS sessions (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            timer_id    INTEGER NOT NULL,
            start_time  TEXT    NOT NULL,
            end_time    TEXT,
            FOREIGN KEY (timer_id) REFERENCES timers(id)
        );

        CREATE TABLE IF NOT EXISTS persistent_vars (
            name        TEXT    PRIMARY KEY,
            value       TEXT    NOT NULL
        );
        ",
    )?;
    set_schema_version(&tx, 1)?;
    tx.commit()?;
    Ok(())
}

fn migrate_v2(conn: &Connection) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_tickets_project ON tickets(project_id);
        CREATE INDEX IF NOT EXISTS idx_tickets_ticket_id ON tickets(ticket_id);
        CREATE INDEX IF NOT EXISTS idx_sessions_timer_start ON sessions(timer_id, start_time);
        CREATE INDEX IF NOT EXISTS idx_sessions_end ON sessions(end_time);
        -- a timer can only be running once
        CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_single_open
            ON sessions(timer_id) WHERE end_time IS NULL;
        ",
    )?;
    set_schema_version(&tx, 2)?;
    tx.commit()?;
    Ok(())
}

/// `posted_ticket_id` keeps the ticket a timer was posted against. It has no
/// foreign key, so it outlives the ticket leaving the mirror.
fn migrate_v3(conn: &Connection) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "
        ALTER TABLE timers ADD COLUMN posted_ticket_id INTEGER;
        UPDATE timers SET posted_ticket_id = ticket_id WHERE posted = 1;
        ",
    )?;
    set_schema_version(&tx, 3)?;
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_database_reaches_latest_version() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn upgrades_from_version_one() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE schema_version (version INTEGER NOT NULL);")
            .unwrap();
        migrate_v1(&conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), 1);

        conn.execute("INSERT INTO timers (name, ticket_id, posted) VALUES ('old', 5, 1)", [])
            .unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), SCHEMA_VERSION);
        let posted_ticket: Option<i64> = conn
            .query_row("SELECT posted_ticket_id FROM timers", [], |row| row.get(0))
            .unwrap();
        assert_eq!(posted_ticket, Some(5));
        let index: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name = 'idx_sessions_single_open'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(index, 1);
    }
}
