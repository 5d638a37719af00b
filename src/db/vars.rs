//! Name/value store for state that must survive restarts.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};

use crate::error::Result;

use super::{format_time, parse_time};

const LAST_SYNCED: &str = "internal.lastSynced";

pub fn get_var(name: &str, conn: &Connection) -> Result<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM persistent_vars WHERE name = ?1",
            [name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

pub fn set_var(name: &str, value: &str, conn: &Connection) -> Result<()> {
    conn.execute(
        "INSERT INTO persistent_vars (name, value) VALUES (?1, ?2)
         ON CONFLICT(name) DO UPDATE SET value = excluded.value",
        (name, value),
    )?;
    Ok(())
}

pub fn last_synced(conn: &Connection) -> Result<Option<DateTime<Utc>>> {
    match get_var(LAST_SYNCED, conn)? {
        Some(raw) => Ok(Some(parse_time(0, raw)?)),
        None => Ok(None),
    }
}

pub fn set_last_synced(at: DateTime<Utc>, conn: &Connection) -> Result<()> {
    set_var(LAST_SYNCED, &format_time(at), conn)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::db::open_in_memory;

    #[test]
    fn last_synced_is_unset_on_a_new_database() {
        let conn = open_in_memory().unwrap();
        assert_eq!(last_synced(&conn).unwrap(), None);
    }

    #[test]
    fn setting_twice_overwrites() {
        let conn = open_in_memory().unwrap();
        let first = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 1, 2, 8, 0, 0).unwrap();
        set_last_synced(first, &conn).unwrap();
        set_last_synced(second, &conn).unwrap();
        assert_eq!(last_synced(&conn).unwrap(), Some(second));
    }
}
