//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::Connection;

use qtimer::clock::ManualClock;
use qtimer::source::{AdapterError, ExternalSource, TimerRecord};
use qtimer::types::{Project, ProjectId, Ticket, TimerId};

pub fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, h, m, s).unwrap()
}

pub fn morning_clock() -> ManualClock {
    ManualClock::new(at(9, 0, 0))
}

pub fn memory_db() -> Connection {
    qtimer::db::open_in_memory().unwrap()
}

/// Every timer and session row, rendered as text, for before/after checks.
pub fn snapshot(conn: &Connection) -> Vec<String> {
    let mut rows = Vec::new();
    let mut stmt = conn
        .prepare("SELECT id, name, ticket_id, posted, billable_status FROM timers ORDER BY id")
        .unwrap();
    let timers = stmt
        .query_map([], |row| {
            Ok(format!(
                "timer {} {} {:?} {} {:?}",
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<i64>>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, Option<i64>>(4)?,
            ))
        })
        .unwrap();
    rows.extend(timers.map(Result::unwrap));

    let mut stmt = conn
        .prepare("SELECT id, timer_id, start_time, end_time FROM sessions ORDER BY id")
        .unwrap();
    let sessions = stmt
        .query_map([], |row| {
            Ok(format!(
                "session {} {} {} {:?}",
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })
        .unwrap();
    rows.extend(sessions.map(Result::unwrap));
    rows
}

/// A scripted in-process source.
#[derive(Default)]
pub struct FakeSource {
    projects: Mutex<Vec<Project>>,
    tickets: Mutex<HashMap<ProjectId, Vec<Ticket>>>,
    failing_project: Mutex<Option<ProjectId>>,
    failing_timers: Mutex<HashSet<TimerId>>,
    posted: Mutex<Vec<(ProjectId, i64, TimerRecord)>>,
    list_calls: Mutex<usize>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_project(&self, id: ProjectId, name: &str) {
        self.projects.lock().unwrap().push(Project {
            id,
            name: name.to_string(),
        });
    }

    pub fn add_ticket(&self, id: i64, ticket_id: i64, name: &str, project_id: ProjectId) {
        self.tickets
            .lock()
            .unwrap()
            .entry(project_id)
            .or_default()
            .push(Ticket {
                id,
                ticket_id,
                name: name.to_string(),
                project_id,
            });
    }

    /// Forgets every project and ticket.
    pub fn clear(&self) {
        self.projects.lock().unwrap().clear();
        self.tickets.lock().unwrap().clear();
    }

    pub fn fail_tickets_of(&self, project_id: ProjectId) {
        *self.failing_project.lock().unwrap() = Some(project_id);
    }

    pub fn fail_post_of(&self, timer_id: TimerId) {
        self.failing_timers.lock().unwrap().insert(timer_id);
    }

    pub fn posted(&self) -> Vec<(ProjectId, i64, TimerRecord)> {
        self.posted.lock().unwrap().clone()
    }

    pub fn posted_timer_ids(&self) -> Vec<TimerId> {
        self.posted()
            .into_iter()
            .map(|(_, _, record)| record.timer_id)
            .collect()
    }

    pub fn list_calls(&self) -> usize {
        *self.list_calls.lock().unwrap()
    }
}

impl ExternalSource for FakeSource {
    fn name(&self) -> &str {
        "fake"
    }

    fn list_projects(&self) -> Result<Vec<Project>, AdapterError> {
        *self.list_calls.lock().unwrap() += 1;
        Ok(self.projects.lock().unwrap().clone())
    }

    fn list_tickets(&self, project_id: ProjectId) -> Result<Vec<Ticket>, AdapterError> {
        if *self.failing_project.lock().unwrap() == Some(project_id) {
            return Err(AdapterError::Rejected(format!(
                "tickets of project {project_id} are unavailable"
            )));
        }
        Ok(self
            .tickets
            .lock()
            .unwrap()
            .get(&project_id)
            .cloned()
            .unwrap_or_default())
    }

    fn post_timer(
        &self,
        project_id: ProjectId,
        ticket_id: i64,
        record: &TimerRecord,
    ) -> Result<(), AdapterError> {
        if self.failing_timers.lock().unwrap().contains(&record.timer_id) {
            return Err(AdapterError::Rejected(format!(
                "timer {} was refused",
                record.timer_id
            )));
        }
        self.posted
            .lock()
            .unwrap()
            .push((project_id, ticket_id, record.clone()));
        Ok(())
    }
}

/// A source with one project holding two tickets (ids 10 and 11).
pub fn seeded_source() -> FakeSource {
    let source = FakeSource::new();
    source.add_project(1, "Website");
    source.add_ticket(10, 1, "Landing page", 1);
    source.add_ticket(11, 2, "Contact form", 1);
    source
}
