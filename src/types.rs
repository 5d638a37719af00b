use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub type ProjectId = i64;
pub type TicketId = i64;
pub type TimerId = i64;
pub type SessionId = i64;

/// A remote project, mirrored locally until the next sync.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
}

/// A remote ticket. `id` comes from the source and is stable across syncs;
/// `ticket_id` is only unique within its project and is what the source
/// expects when time is posted against it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub ticket_id: i64,
    pub name: String,
    pub project_id: ProjectId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BillableStatus {
    Billable,
    NonBillable,
}

impl BillableStatus {
    pub fn code(self) -> i64 {
        match self {
            BillableStatus::Billable => 0,
            BillableStatus::NonBillable => 1,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(BillableStatus::Billable),
            1 => Some(BillableStatus::NonBillable),
            _ => None,
        }
    }
}

/// Derived lifecycle state of a timer. Never stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    Active,
    Idle,
    Posted,
}

impl TimerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TimerStatus::Active => "active",
            TimerStatus::Idle => "idle",
            TimerStatus::Posted => "posted",
        }
    }
}

impl fmt::Display for TimerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One contiguous start/stop interval of a timer. `end == None` means running.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub timer_id: TimerId,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    pub fn duration(&self, now: DateTime<Utc>) -> Duration {
        self.end.unwrap_or(now).signed_duration_since(self.start)
    }
}

/// A named unit of tracked work with its sessions ordered by `start`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timer {
    pub id: TimerId,
    pub name: String,
    pub ticket_id: Option<TicketId>,
    pub posted: bool,
    pub billable_status: Option<BillableStatus>,
    pub sessions: Vec<Session>,
}

impl Timer {
    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.sessions.first().map(|session| session.start)
    }

    /// Sum of all session lengths, open sessions counted up to `now`.
    pub fn duration(&self, now: DateTime<Utc>) -> Duration {
        self.sessions
            .iter()
            .fold(Duration::zero(), |acc, session| acc + session.duration(now))
    }

    pub fn status(&self) -> TimerStatus {
        if self.posted {
            TimerStatus::Posted
        } else if self.open_session().is_some() {
            TimerStatus::Active
        } else {
            TimerStatus::Idle
        }
    }

    pub fn open_session(&self) -> Option<&Session> {
        self.sessions.iter().find(|session| session.is_open())
    }
}

/// Picks the timers an operation applies to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TimerSelector {
    Id(TimerId),
    /// Substring match on the timer name; may hit several timers.
    Name(String),
}

/// Filters accepted by `find`. Every populated field narrows the result.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TimerFilter {
    pub id: Option<TimerId>,
    pub name: Option<String>,
    pub ticket: Option<String>,
    pub project: Option<String>,
    /// Only timers with an open session.
    pub active: bool,
    /// Only timers without an open session.
    pub inactive: bool,
    /// Only timers associated with a ticket.
    pub with_ticket: bool,
    /// Case-insensitive substring of the derived status.
    pub status: Option<String>,
}

impl From<TimerSelector> for TimerFilter {
    fn from(selector: TimerSelector) -> Self {
        match selector {
            TimerSelector::Id(id) => TimerFilter {
                id: Some(id),
                ..Default::default()
            },
            TimerSelector::Name(name) => TimerFilter {
                name: Some(name),
                ..Default::default()
            },
        }
    }
}

/// Partial update for `edit`. `ticket: Some(None)` clears the association.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TimerEdit {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub ticket: Option<Option<TicketId>>,
}

impl TimerEdit {
    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none() && self.ticket.is_none()
    }
}

/// A display row produced by `find`; duration is computed when the row is read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimerRow {
    pub id: TimerId,
    pub name: String,
    pub ticket: Option<Ticket>,
    pub start: Option<DateTime<Utc>>,
    pub duration: Duration,
    pub status: TimerStatus,
    pub posted: bool,
}

/// Outcome of a batch post.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PostReport {
    pub succeeded: Vec<TimerId>,
    pub failed: Vec<(TimerId, String)>,
}
