//! Timer queries. Sessions are loaded alongside each timer.

use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params_from_iter};

use crate::error::Result;
use crate::types::{BillableStatus, TicketId, Timer, TimerFilter, TimerId};

use super::contains_pattern;
use super::sessions::query_sessions_by_timer;

pub fn create_timer(name: &str, ticket_id: Option<TicketId>, conn: &Connection) -> Result<TimerId> {
    conn.execute(
        "INSERT INTO timers (name, ticket_id) VALUES (?1, ?2)",
        (name, ticket_id),
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn query_timer_by_id(id: TimerId, conn: &Connection) -> Result<Option<Timer>> {
    let timer = conn
        .query_row(
            "SELECT id, name, COALESCE(ticket_id, posted_ticket_id), posted, billable_status
             FROM timers WHERE id = ?1",
            [id],
            |row| {
                Ok(Timer {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    ticket_id: row.get(2)?,
                    posted: row.get(3)?,
                    billable_status: row
                        .get::<_, Option<i64>>(4)?
                        .and_then(BillableStatus::from_code),
                    sessions: Vec::new(),
                })
            },
        )
        .optional()?;
    match timer {
        Some(mut timer) => {
            timer.sessions = query_sessions_by_timer(timer.id, conn)?;
            Ok(Some(timer))
        }
        None => Ok(None),
    }
}

/// Ids of the timers matching the store-side parts of `filter`, ascending.
/// The derived-status filter is applied by the caller once sessions are loaded.
pub fn query_timer_ids(filter: &TimerFilter, conn: &Connection) -> Result<Vec<TimerId>> {
    let mut sql = String::from(
        "SELECT t.id FROM timers t
         LEFT JOIN tickets k ON k.id = t.ticket_id
         LEFT JOIN projects p ON p.id = k.project_id
         WHERE 1 = 1",
    );
    let mut params = Vec::new();

    if let Some(id) = filter.id {
        sql.push_str(" AND t.id = ?");
        params.push(Value::Integer(id));
    }
    if let Some(name) = filter.name.as_deref() {
        sql.push_str(" AND t.name LIKE ? ESCAPE '\\'");
        params.push(Value::Text(contains_pattern(name)));
    }
    if let Some(ticket) = filter.ticket.as_deref() {
        sql.push_str(" AND k.name LIKE ? ESCAPE '\\'");
        params.push(Value::Text(contains_pattern(ticket)));
    }
    if let Some(project) = filter.project.as_deref() {
        sql.push_str(" AND p.name LIKE ? ESCAPE '\\'");
        params.push(Value::Text(contains_pattern(project)));
    }
    if filter.with_ticket {
        sql.push_str(" AND COALESCE(t.ticket_id, t.posted_ticket_id) IS NOT NULL");
    }
    if filter.active {
        sql.push_str(
            " AND EXISTS (SELECT 1 FROM sessions s WHERE s.timer_id = t.id AND s.end_time IS NULL)",
        );
    }
    if filter.inactive {
        sql.push_str(
            " AND NOT EXISTS (SELECT 1 FROM sessions s WHERE s.timer_id = t.id AND s.end_time IS NULL)",
        );
    }
    sql.push_str(" ORDER BY t.id");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(params), |row| row.get(0))?;
    let mut ids = Vec::new();
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}

pub fn update_timer_ticket(id: TimerId, ticket_id: Option<TicketId>, conn: &Connection) -> Result<()> {
    conn.execute(
        "UPDATE timers SET ticket_id = ?1 WHERE id = ?2",
        (ticket_id, id),
    )?;
    Ok(())
}

/// Removes a timer and its sessions.
pub fn delete_timer(id: TimerId, conn: &Connection) -> Result<usize> {
    conn.execute("DELETE FROM sessions WHERE timer_id = ?1", [id])?;
    Ok(conn.execute("DELETE FROM timers WHERE id = ?1", [id])?)
}

/// Flags the given timers as posted in a single statement and pins the
/// ticket each one was posted against.
pub fn mark_posted(ids: &[TimerId], conn: &Connection) -> Result<usize> {
    if ids.is_empty() {
        return Ok(0);
    }
    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!("UPDATE timers SET posted = 1, posted_ticket_id = ticket_id
         WHERE posted = 0 AND id IN ({placeholders})");
    Ok(conn.execute(&sql, params_from_iter(ids.iter()))?)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::db::{close_open_sessions, create_session, open_in_memory, replace_remote_cache};
    use crate::types::{Project, Ticket};

    fn seeded() -> Connection {
        let conn = open_in_memory().unwrap();
        replace_remote_cache(
            &[Project {
                id: 1,
                name: "Website".into(),
            }],
            &[Ticket {
                id: 10,
                ticket_id: 3,
                name: "Landing page".into(),
                project_id: 1,
            }],
            &conn,
        )
        .unwrap();
        conn
    }

    #[test]
    fn filters_combine() {
        let conn = seeded();
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let a = create_timer("landing copy", Some(10), &conn).unwrap();
        let b = create_timer("landing images", None, &conn).unwrap();
        let c = create_timer("standup", None, &conn).unwrap();
        for id in [a, b, c] {
            create_session(id, start, &conn).unwrap();
        }
        close_open_sessions(&[b], start, &conn).unwrap();

        let by_name = TimerFilter {
            name: Some("LANDING".into()),
            ..Default::default()
        };
        assert_eq!(query_timer_ids(&by_name, &conn).unwrap(), vec![a, b]);

        let active_landing = TimerFilter {
            active: true,
            ..by_name.clone()
        };
        assert_eq!(query_timer_ids(&active_landing, &conn).unwrap(), vec![a]);

        let inactive = TimerFilter {
            inactive: true,
            ..Default::default()
        };
        assert_eq!(query_timer_ids(&inactive, &conn).unwrap(), vec![b]);

        let by_project = TimerFilter {
            project: Some("web".into()),
            ..Default::default()
        };
        assert_eq!(query_timer_ids(&by_project, &conn).unwrap(), vec![a]);
    }

    #[test]
    fn unknown_ticket_violates_foreign_key() {
        let conn = seeded();
        assert!(create_timer("orphan", Some(404), &conn).is_err());
    }

    #[test]
    fn mark_posted_skips_already_posted() {
        let conn = seeded();
        let a = create_timer("a", None, &conn).unwrap();
        let b = create_timer("b", None, &conn).unwrap();
        assert_eq!(mark_posted(&[a], &conn).unwrap(), 1);
        assert_eq!(mark_posted(&[a, b], &conn).unwrap(), 1);
        assert!(query_timer_by_id(b, &conn).unwrap().unwrap().posted);
    }

    #[test]
    fn delete_removes_sessions() {
        let conn = seeded();
        let id = create_timer("gone", None, &conn).unwrap();
        create_session(id, Utc::now(), &conn).unwrap();
        assert_eq!(delete_timer(id, &conn).unwrap(), 1);
        let left: i64 = conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(left, 0);
    }
}
