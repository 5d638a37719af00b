//! Project and ticket queries. Both tables mirror the external source.

use rusqlite::{Connection, OptionalExtension, Row};

use crate::error::Result;
use crate::types::{Project, Ticket, TicketId};

use super::contains_pattern;

/// Truncates the mirrored projects and tickets and loads the given set.
/// Unposted timers pointing at tickets that no longer exist lose their
/// association; the count of those is returned. Posted timers drop only the
/// foreign key and keep reporting their ticket through `posted_ticket_id`.
///
/// Must run inside a transaction; foreign key checks are deferred to commit.
pub fn replace_remote_cache(
    projects: &[Project],
    tickets: &[Ticket],
    conn: &Connection,
) -> Result<usize> {
    conn.pragma_update(None, "defer_foreign_keys", true)?;
    conn.execute("DELETE FROM tickets", [])?;
    conn.execute("DELETE FROM projects", [])?;

    let mut insert_project = conn.prepare("INSERT INTO projects (id, name) VALUES (?1, ?2)")?;
    for project in projects {
        insert_project.execute((project.id, &project.name))?;
    }

    let mut insert_ticket = conn.prepare(
        "INSERT INTO tickets (id, ticket_id, name, project_id) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for ticket in tickets {
        insert_ticket.execute((ticket.id, ticket.ticket_id, &ticket.name, ticket.project_id))?;
    }

    let detached = conn.execute(
        "UPDATE timers SET ticket_id = NULL
         WHERE posted = 0 AND ticket_id IS NOT NULL AND ticket_id NOT IN (SELECT id FROM tickets)",
        [],
    )?;
    conn.execute(
        "UPDATE timers SET ticket_id = NULL
         WHERE posted = 1 AND ticket_id IS NOT NULL AND ticket_id NOT IN (SELECT id FROM tickets)",
        [],
    )?;
    Ok(detached)
}

pub fn query_projects(name: Option<&str>, conn: &Connection) -> Result<Vec<Project>> {
    let mut stmt = conn.prepare(
        "SELECT id, name FROM projects
         WHERE ?1 IS NULL OR name LIKE ?1 ESCAPE '\\'
         ORDER BY name, id",
    )?;
    let rows = stmt.query_map([name.map(contains_pattern)], project_from_row)?;
    let mut projects = Vec::new();
    for row in rows {
        projects.push(row?);
    }
    Ok(projects)
}

/// Tickets whose name contains `name` and whose project name contains `project`.
pub fn query_tickets(
    name: Option<&str>,
    project: Option<&str>,
    conn: &Connection,
) -> Result<Vec<Ticket>> {
    let mut stmt = conn.prepare(
        "SELECT t.id, t.ticket_id, t.name, t.project_id
         FROM tickets t
         JOIN projects p ON p.id = t.project_id
         WHERE (?1 IS NULL OR t.name LIKE ?1 ESCAPE '\\')
           AND (?2 IS NULL OR p.name LIKE ?2 ESCAPE '\\')
         ORDER BY t.project_id, t.name, t.id",
    )?;
    let rows = stmt.query_map(
        [name.map(contains_pattern), project.map(contains_pattern)],
        ticket_from_row,
    )?;
    let mut tickets = Vec::new();
    for row in rows {
        tickets.push(row?);
    }
    Ok(tickets)
}

pub fn query_ticket_by_id(id: TicketId, conn: &Connection) -> Result<Option<Ticket>> {
    let ticket = conn
        .query_row(
            "SELECT id, ticket_id, name, project_id FROM tickets WHERE id = ?1",
            [id],
            ticket_from_row,
        )
        .optional()?;
    Ok(ticket)
}

pub fn ticket_exists(id: TicketId, conn: &Connection) -> Result<bool> {
    let mut stmt = conn.prepare("SELECT 1 FROM tickets WHERE id = ?1")?;
    Ok(stmt.exists([id])?)
}

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}

fn ticket_from_row(row: &Row<'_>) -> rusqlite::Result<Ticket> {
    Ok(Ticket {
        id: row.get(0)?,
        ticket_id: row.get(1)?,
        name: row.get(2)?,
        project_id: row.get(3)?,
    })
}
