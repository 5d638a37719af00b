//! Timer lifecycle: start, restart, stop, edit, delete, post and find.
//!
//! Status is derived from the session log, never stored. Every mutation runs
//! in its own write transaction; posting talks to the source outside of it
//! and only records the successes afterwards.

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::clock::{Clock, round_duration, round_time};
use crate::db;
use crate::error::{Error, Result};
use crate::source::{ExternalSource, TimerRecord};
use crate::types::{
    PostReport, Project, Ticket, TicketId, Timer, TimerEdit, TimerFilter, TimerId, TimerRow,
    TimerSelector,
};

pub struct TimerManager<'a> {
    conn: &'a Connection,
    clock: &'a dyn Clock,
    rounding: u32,
}

impl<'a> TimerManager<'a> {
    /// `rounding` is the interval, in seconds, that session boundaries and
    /// displayed durations snap to.
    pub fn new(conn: &'a Connection, clock: &'a dyn Clock, rounding: u32) -> Self {
        Self {
            conn,
            clock,
            rounding,
        }
    }

    fn now(&self) -> DateTime<Utc> {
        round_time(self.clock.now(), self.rounding)
    }

    /// Creates a timer and opens its first session.
    pub fn start(&self, name: &str, ticket_id: Option<TicketId>) -> Result<Timer> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidState("a timer needs a name".into()));
        }
        let started = self.now();
        let timer = db::write_transaction(self.conn, |tx| {
            if let Some(ticket_id) = ticket_id {
                ensure_ticket(ticket_id, tx)?;
            }
            let id = db::create_timer(name, ticket_id, tx)?;
            db::create_session(id, started, tx)?;
            load(id, tx)
        })?;
        tracing::info!(timer_id = timer.id, name = %timer.name, "timer started");
        Ok(timer)
    }

    /// Opens a new session on an idle timer.
    pub fn restart(&self, id: TimerId) -> Result<Timer> {
        let started = self.now();
        let timer = db::write_transaction(self.conn, |tx| {
            let timer = load(id, tx)?;
            if timer.posted {
                return Err(Error::InvalidState(format!(
                    "timer {id} has been posted and cannot be restarted"
                )));
            }
            if timer.open_session().is_some() {
                return Err(Error::InvalidState(format!("timer {id} is already running")));
            }
            db::create_session(id, started, tx)?;
            load(id, tx)
        })?;
        tracing::info!(timer_id = id, "timer restarted");
        Ok(timer)
    }

    /// Closes the open session of every matched timer. Returns how many
    /// sessions were closed; nothing open is not an error.
    pub fn stop(&self, selector: &TimerSelector) -> Result<usize> {
        let ended = self.now();
        let closed = db::write_transaction(self.conn, |tx| {
            let ids = match selector {
                TimerSelector::Id(id) => {
                    load(*id, tx)?;
                    vec![*id]
                }
                TimerSelector::Name(name) => {
                    let filter = TimerFilter {
                        name: Some(name.clone()),
                        active: true,
                        ..Default::default()
                    };
                    db::query_timer_ids(&filter, tx)?
                }
            };
            db::close_open_sessions(&ids, ended, tx)
        })?;
        tracing::info!(?selector, closed, "timers stopped");
        Ok(closed)
    }

    /// Applies a partial update. `start` moves the earliest session's start,
    /// `end` sets the latest session's end (closing it if it is running).
    pub fn edit(&self, id: TimerId, edit: &TimerEdit) -> Result<Timer> {
        if edit.is_empty() {
            return self.get(id);
        }
        let start = edit.start.map(|at| round_time(at, self.rounding));
        let end = edit.end.map(|at| round_time(at, self.rounding));

        let timer = db::write_transaction(self.conn, |tx| {
            let timer = load(id, tx)?;
            if timer.posted {
                return Err(Error::ImmutableTimer(id));
            }
            if let Some(Some(ticket_id)) = edit.ticket {
                ensure_ticket(ticket_id, tx)?;
            }

            if start.is_some() || end.is_some() {
                let (Some(first), Some(last)) = (timer.sessions.first(), timer.sessions.last())
                else {
                    return Err(Error::InvalidState(format!("timer {id} has no sessions")));
                };
                let first_start = start.unwrap_or(first.start);
                let first_end = if first.id == last.id {
                    end.or(first.end)
                } else {
                    first.end
                };
                if first_end.is_some_and(|first_end| first_start > first_end) {
                    return Err(Error::InvalidState(format!(
                        "timer {id} would start after its first session ended"
                    )));
                }
                let last_start = if first.id == last.id {
                    first_start
                } else {
                    last.start
                };
                if end.is_some_and(|end| end < last_start) {
                    return Err(Error::InvalidState(format!(
                        "timer {id} would end before its last session started"
                    )));
                }

                if let Some(start) = start {
                    db::update_session_start(first.id, start, tx)?;
                }
                if let Some(end) = end {
                    db::update_session_end(last.id, end, tx)?;
                }
            }

            if let Some(ticket_id) = edit.ticket {
                db::update_timer_ticket(id, ticket_id, tx)?;
            }
            load(id, tx)
        })?;
        tracing::info!(timer_id = id, "timer edited");
        Ok(timer)
    }

    /// Removes a timer with all of its sessions.
    pub fn delete(&self, id: TimerId) -> Result<()> {
        db::write_transaction(self.conn, |tx| {
            let timer = load(id, tx)?;
            if timer.posted {
                return Err(Error::ImmutableTimer(id));
            }
            db::delete_timer(id, tx)?;
            Ok(())
        })?;
        tracing::info!(timer_id = id, "timer deleted");
        Ok(())
    }

    /// Posts every matched, idle timer that has a ticket. One timer failing
    /// does not stop the rest; the successes are marked posted together.
    pub fn post(
        &self,
        filter: &TimerFilter,
        source: Option<&dyn ExternalSource>,
    ) -> Result<PostReport> {
        let source = source.ok_or_else(|| {
            Error::Configuration(
                "no external source configured; set [account] type, url and token".into(),
            )
        })?;

        let mut report = PostReport::default();
        let now = self.clock.now();
        let wanted = filter.status.as_deref().map(str::to_lowercase);
        for id in db::query_timer_ids(filter, self.conn)? {
            let Some(timer) = db::query_timer_by_id(id, self.conn)? else {
                continue;
            };
            if timer.posted || !status_matches(&timer, wanted.as_deref()) {
                continue;
            }
            match self.post_one(&timer, now, source) {
                Ok(()) => report.succeeded.push(id),
                Err(reason) => {
                    tracing::error!(timer_id = id, %reason, "could not post timer");
                    report.failed.push((id, reason));
                }
            }
        }

        if !report.succeeded.is_empty() {
            db::write_transaction(self.conn, |tx| db::mark_posted(&report.succeeded, tx))?;
        }
        tracing::info!(
            posted = report.succeeded.len(),
            failed = report.failed.len(),
            source = source.name(),
            "post finished"
        );
        Ok(report)
    }

    fn post_one(
        &self,
        timer: &Timer,
        now: DateTime<Utc>,
        source: &dyn ExternalSource,
    ) -> Result<(), String> {
        if timer.open_session().is_some() {
            return Err(
                Error::InvalidState(format!("timer {} is running; stop it first", timer.id))
                    .to_string(),
            );
        }
        let Some(ticket_id) = timer.ticket_id else {
            return Err(format!("timer {} has no ticket", timer.id));
        };
        let ticket = db::query_ticket_by_id(ticket_id, self.conn)
            .map_err(|err| err.to_string())?
            .ok_or_else(|| {
                Error::ReferentialIntegrity {
                    entity: "ticket",
                    id: ticket_id,
                }
                .to_string()
            })?;

        let record = TimerRecord {
            timer_id: timer.id,
            name: timer.name.clone(),
            ticket_id: ticket.ticket_id,
            start: timer.start().unwrap_or(now),
            duration: round_duration(timer.duration(now), self.rounding),
            billable_status: timer.billable_status,
        };
        source
            .post_timer(ticket.project_id, ticket.ticket_id, &record)
            .map_err(|err| err.to_string())
    }

    pub fn get(&self, id: TimerId) -> Result<Timer> {
        load(id, self.conn)
    }

    /// Matching timers in id order. Each row is read from the store when
    /// the iterator reaches it; call again to see later changes.
    pub fn find(&self, filter: &TimerFilter) -> Result<TimerRows<'a>> {
        let ids = db::query_timer_ids(filter, self.conn)?;
        Ok(TimerRows {
            conn: self.conn,
            clock: self.clock,
            rounding: self.rounding,
            status: filter.status.as_deref().map(str::to_lowercase),
            ids: ids.into_iter(),
        })
    }

    pub fn find_projects(&self, name: Option<&str>) -> Result<Vec<Project>> {
        db::query_projects(name, self.conn)
    }

    pub fn find_tickets(&self, name: Option<&str>, project: Option<&str>) -> Result<Vec<Ticket>> {
        db::query_tickets(name, project, self.conn)
    }
}

fn load(id: TimerId, conn: &Connection) -> Result<Timer> {
    db::query_timer_by_id(id, conn)?.ok_or(Error::TimerNotFound(id))
}

fn ensure_ticket(id: TicketId, conn: &Connection) -> Result<()> {
    if db::ticket_exists(id, conn)? {
        Ok(())
    } else {
        Err(Error::ReferentialIntegrity { entity: "ticket", id })
    }
}

/// `wanted` is already lowercased.
fn status_matches(timer: &Timer, wanted: Option<&str>) -> bool {
    wanted.is_none_or(|wanted| timer.status().as_str().contains(wanted))
}

/// Lazy result of [`TimerManager::find`].
pub struct TimerRows<'a> {
    conn: &'a Connection,
    clock: &'a dyn Clock,
    rounding: u32,
    status: Option<String>,
    ids: std::vec::IntoIter<TimerId>,
}

impl TimerRows<'_> {
    fn row(&self, id: TimerId) -> Result<Option<TimerRow>> {
        let Some(timer) = db::query_timer_by_id(id, self.conn)? else {
            return Ok(None);
        };
        if !status_matches(&timer, self.status.as_deref()) {
            return Ok(None);
        }
        let status = timer.status();
        let ticket = match timer.ticket_id {
            Some(ticket_id) => db::query_ticket_by_id(ticket_id, self.conn)?,
            None => None,
        };
        let duration = round_duration(timer.duration(self.clock.now()), self.rounding);
        Ok(Some(TimerRow {
            id: timer.id,
            start: timer.start(),
            name: timer.name,
            ticket,
            duration,
            status,
            posted: timer.posted,
        }))
    }
}

impl Iterator for TimerRows<'_> {
    type Item = Result<TimerRow>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let id = self.ids.next()?;
            match self.row(id) {
                Ok(Some(row)) => return Some(Ok(row)),
                Ok(None) => continue,
                Err(err) => return Some(Err(err)),
            }
        }
    }
}
