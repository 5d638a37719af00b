//! Error types shared by the store, the sync engine and the timer lifecycle.

use thiserror::Error;

use crate::source::AdapterError;
use crate::types::TimerId;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid external-source settings.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{entity} {id} does not exist")]
    ReferentialIntegrity { entity: &'static str, id: i64 },

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("timer {0} has been posted and can no longer be changed")]
    ImmutableTimer(TimerId),

    #[error("timer {0} not found")]
    TimerNotFound(TimerId),

    /// The remote cache could not be refreshed; the local cache is untouched.
    #[error("sync failed: {reason}")]
    SyncFailure {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl Error {
    pub(crate) fn sync_failure(
        reason: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Error::SyncFailure {
            reason: reason.into(),
            source: Some(Box::new(source)),
        }
    }
}
