//! External project-management sources.
//!
//! A source supplies the projects and tickets that are mirrored locally and
//! accepts posted time. Which implementation is used is decided by
//! `[account] type` through the table in [`from_account`].

mod activecollab;
mod offline;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::config::{AccountConfig, AccountType};
use crate::error::{Error, Result};
use crate::types::{BillableStatus, Project, ProjectId, Ticket, TimerId};

pub use activecollab::ActiveCollabSource;
pub use offline::OfflineSource;

/// The three calls qtimer needs from a project-management backend.
pub trait ExternalSource: Send + Sync {
    /// Short identifier used in log lines.
    fn name(&self) -> &str;

    fn list_projects(&self) -> Result<Vec<Project>, AdapterError>;

    fn list_tickets(&self, project_id: ProjectId) -> Result<Vec<Ticket>, AdapterError>;

    /// `ticket_id` is the project-scoped id from [`Ticket::ticket_id`].
    fn post_timer(
        &self,
        project_id: ProjectId,
        ticket_id: i64,
        record: &TimerRecord,
    ) -> Result<(), AdapterError>;
}

/// What gets submitted when a timer is posted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimerRecord {
    pub timer_id: TimerId,
    pub name: String,
    pub ticket_id: i64,
    pub start: DateTime<Utc>,
    /// Already rounded to the configured interval.
    pub duration: Duration,
    pub billable_status: Option<BillableStatus>,
}

impl TimerRecord {
    pub fn hours(&self) -> f64 {
        self.duration.num_seconds() as f64 / 3600.0
    }
}

#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("request for '{path}' failed: {source}")]
    Http {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("'{path}' answered with HTTP {status}")]
    Status { path: String, status: u16 },

    #[error("'{path}' did not answer with valid JSON: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not decode response for '{path}': {message}")]
    Decode { path: String, message: String },

    #[error("source rejected the request: {0}")]
    Rejected(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

type AdapterFactory = fn(&AccountConfig, &str, &str) -> Result<Box<dyn ExternalSource>>;

const REGISTRY: &[(AccountType, AdapterFactory)] = &[
    (AccountType::ActiveCollab, activecollab::build),
    (AccountType::Offline, offline::build),
];

/// Builds the source configured in `[account]`. Type, url and token must all
/// be present, whatever the type.
pub fn from_account(account: &AccountConfig) -> Result<Box<dyn ExternalSource>> {
    let (Some(kind), Some(url), Some(token)) = (
        account.kind,
        account.url.as_deref(),
        account.token.as_deref(),
    ) else {
        return Err(Error::Configuration(
            "account type, url and token must all be set to talk to a remote source".into(),
        ));
    };
    let factory = REGISTRY
        .iter()
        .find(|(registered, _)| *registered == kind)
        .map(|(_, factory)| factory)
        .ok_or_else(|| {
            Error::Configuration(format!("no source registered for '{}'", kind.as_str()))
        })?;
    let source = factory(account, url, token)?;
    tracing::debug!(source = source.name(), "external source ready");
    Ok(source)
}
