//! Session queries. A session is one start/stop interval of a timer.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params_from_iter};

use crate::error::Result;
use crate::types::{Session, SessionId, TimerId};

use super::{format_time, parse_time};

pub fn query_sessions_by_timer(timer_id: TimerId, conn: &Connection) -> Result<Vec<Session>> {
    let mut stmt = conn.prepare(
        "SELECT id, timer_id, start_time, end_time FROM sessions
         WHERE timer_id = ?1
         ORDER BY start_time, id",
    )?;
    let rows = stmt.query_map([timer_id], session_from_row)?;
    let mut result = Vec::new();
    for row in rows {
        result.push(row?);
    }
    Ok(result)
}

pub fn create_session(timer_id: TimerId, start: DateTime<Utc>, conn: &Connection) -> Result<Session> {
    conn.execute(
        "INSERT INTO sessions (timer_id, start_time) VALUES (?1, ?2)",
        rusqlite::params![timer_id, format_time(start)],
    )?;
    Ok(Session {
        id: conn.last_insert_rowid(),
        timer_id,
        start,
        end: None,
    })
}

/// Closes every open session of the given timers at `end` (never before the
/// session's own start). Posted timers are left alone. Returns the number of
/// sessions closed.
pub fn close_open_sessions(
    timer_ids: &[TimerId],
    end: DateTime<Utc>,
    conn: &Connection,
) -> Result<usize> {
    if timer_ids.is_empty() {
        return Ok(0);
    }
    let placeholders = vec!["?"; timer_ids.len()].join(", ");
    let sql = format!(
        "UPDATE sessions SET end_time = MAX(?, start_time)
         WHERE end_time IS NULL
           AND timer_id IN ({placeholders})
           AND timer_id IN (SELECT id FROM timers WHERE posted = 0)"
    );
    let end = rusqlite::types::Value::Text(format_time(end));
    let params = std::iter::once(end).chain(
        timer_ids
            .iter()
            .map(|id| rusqlite::types::Value::Integer(*id)),
    );
    Ok(conn.execute(&sql, params_from_iter(params))?)
}

pub fn update_session_start(id: SessionId, start: DateTime<Utc>, conn: &Connection) -> Result<()> {
    conn.execute(
        "UPDATE sessions SET start_time = ?1 WHERE id = ?2",
        rusqlite::params![format_time(start), id],
    )?;
    Ok(())
}

pub fn update_session_end(id: SessionId, end: DateTime<Utc>, conn: &Connection) -> Result<()> {
    conn.execute(
        "UPDATE sessions SET end_time = ?1 WHERE id = ?2",
        rusqlite::params![format_time(end), id],
    )?;
    Ok(())
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        timer_id: row.get(1)?,
        start: parse_time(2, row.get(2)?)?,
        end: row
            .get::<_, Option<String>>(3)?
            .map(|raw| parse_time(3, raw))
            .transpose()?,
    })
}
