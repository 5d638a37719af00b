//! Wires the store, configuration, clock and external source together.
//!
//! Everything is built up front and handed to the timer manager and sync
//! engine on request, so nothing is looked up lazily later.

use rusqlite::Connection;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::db;
use crate::error::{Error, Result};
use crate::source::{self, ExternalSource};
use crate::sync::SyncEngine;
use crate::timers::TimerManager;

pub struct Core {
    conn: Connection,
    config: Config,
    clock: Box<dyn Clock>,
    source: Option<Box<dyn ExternalSource>>,
}

impl Core {
    pub fn new(
        conn: Connection,
        config: Config,
        clock: Box<dyn Clock>,
        source: Option<Box<dyn ExternalSource>>,
    ) -> Self {
        Self {
            conn,
            config,
            clock,
            source,
        }
    }

    /// Opens the configured database and builds the configured source.
    /// A missing or incomplete `[account]` only disables remote operations.
    pub fn open(config: Config) -> Result<Self> {
        let conn = db::init(&config.database_path())?;
        let source = match source::from_account(&config.account) {
            Ok(source) => Some(source),
            Err(Error::Configuration(reason)) => {
                tracing::debug!(%reason, "running without an external source");
                None
            }
            Err(err) => return Err(err),
        };
        Ok(Self::new(conn, config, Box::new(SystemClock), source))
    }

    pub fn timers(&self) -> TimerManager<'_> {
        TimerManager::new(&self.conn, self.clock.as_ref(), self.config.timers.rounding)
    }

    pub fn sync_engine(&self) -> SyncEngine<'_> {
        SyncEngine::new(
            &self.conn,
            self.source.as_deref(),
            self.clock.as_ref(),
            self.config.cache_lifetime(),
        )
    }

    /// The configured source, or a configuration error naming what is missing.
    pub fn source(&self) -> Result<&dyn ExternalSource> {
        self.source.as_deref().ok_or_else(|| {
            Error::Configuration(
                "no external source configured; set [account] type, url and token".into(),
            )
        })
    }

    pub fn source_opt(&self) -> Option<&dyn ExternalSource> {
        self.source.as_deref()
    }

    /// Closes the database, reporting any error SQLite has on the way out.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, err)| Error::Database(err))
    }
}
