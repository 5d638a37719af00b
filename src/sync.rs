//! Keeps the local project/ticket mirror in step with the external source.
//!
//! Everything is fetched first, outside any transaction. The replacement
//! and the `lastSynced` stamp are then written in one transaction, so a
//! failure at any point leaves the previous mirror in place.

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;

use crate::clock::Clock;
use crate::db;
use crate::error::{Error, Result};
use crate::source::ExternalSource;
use crate::types::{Project, Ticket};

/// What a successful sync wrote.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncSummary {
    pub projects: usize,
    pub tickets: usize,
    /// Timers whose ticket disappeared remotely and were unassigned.
    pub detached_timers: usize,
    pub synced_at: DateTime<Utc>,
}

pub struct SyncEngine<'a> {
    conn: &'a Connection,
    source: Option<&'a dyn ExternalSource>,
    clock: &'a dyn Clock,
    cache_lifetime: Duration,
}

impl<'a> SyncEngine<'a> {
    pub fn new(
        conn: &'a Connection,
        source: Option<&'a dyn ExternalSource>,
        clock: &'a dyn Clock,
        cache_lifetime: Duration,
    ) -> Self {
        Self {
            conn,
            source,
            clock,
            cache_lifetime,
        }
    }

    pub fn last_synced(&self) -> Result<Option<DateTime<Utc>>> {
        db::last_synced(self.conn)
    }

    /// Syncs when the mirror is older than the cache lifetime or was never
    /// synced. Returns the summary when a sync ran.
    pub fn sync_conditionally(&self) -> Result<Option<SyncSummary>> {
        let source = self.require_source()?;
        let now = self.clock.now();
        if let Some(last) = self.last_synced()? {
            let age = now.signed_duration_since(last);
            if age <= self.cache_lifetime {
                tracing::debug!(
                    age_secs = age.num_seconds(),
                    lifetime_secs = self.cache_lifetime.num_seconds(),
                    "remote cache still fresh"
                );
                return Ok(None);
            }
        }
        self.sync_with(source).map(Some)
    }

    /// Replaces the mirror unconditionally.
    pub fn sync(&self) -> Result<SyncSummary> {
        let source = self.require_source()?;
        self.sync_with(source)
    }

    fn require_source(&self) -> Result<&'a dyn ExternalSource> {
        self.source.ok_or_else(|| {
            Error::Configuration(
                "no external source configured; set [account] type, url and token".into(),
            )
        })
    }

    fn sync_with(&self, source: &dyn ExternalSource) -> Result<SyncSummary> {
        tracing::info!(source = source.name(), "syncing projects and tickets");
        let (projects, tickets) = fetch_all(source)?;

        let synced_at = self.clock.now();
        let detached_timers = db::write_transaction(self.conn, |tx| {
            let detached = db::replace_remote_cache(&projects, &tickets, tx)?;
            db::set_last_synced(synced_at, tx)?;
            Ok(detached)
        })
        .map_err(|err| match err {
            Error::SyncFailure { .. } => err,
            other => Error::sync_failure("could not store the remote cache", other),
        })?;

        if detached_timers > 0 {
            tracing::warn!(
                count = detached_timers,
                "timers lost their ticket because it no longer exists remotely"
            );
        }
        tracing::info!(
            projects = projects.len(),
            tickets = tickets.len(),
            "sync finished"
        );
        Ok(SyncSummary {
            projects: projects.len(),
            tickets: tickets.len(),
            detached_timers,
            synced_at,
        })
    }
}

fn fetch_all(source: &dyn ExternalSource) -> Result<(Vec<Project>, Vec<Ticket>)> {
    let projects = source
        .list_projects()
        .map_err(|err| Error::sync_failure("could not list projects", err))?;

    let mut tickets = Vec::new();
    for project in &projects {
        let listed = source.list_tickets(project.id).map_err(|err| {
            Error::sync_failure(
                format!("could not list tickets of project {} ({})", project.id, project.name),
                err,
            )
        })?;
        // The mirror files every ticket under the project it was listed for.
        tickets.extend(listed.into_iter().map(|ticket| Ticket {
            project_id: project.id,
            ..ticket
        }));
    }
    Ok((projects, tickets))
}
