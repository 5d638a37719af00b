use crate::config::AccountConfig;
use crate::error::Result;
use crate::types::{Project, ProjectId, Ticket};

use super::{AdapterError, ExternalSource, TimerRecord};

/// A source with nothing in it that accepts every post. Useful when timers
/// are only tracked locally.
pub struct OfflineSource;

pub(super) fn build(_account: &AccountConfig, _url: &str, _token: &str) -> Result<Box<dyn ExternalSource>> {
    Ok(Box::new(OfflineSource))
}

impl ExternalSource for OfflineSource {
    fn name(&self) -> &str {
        "offline"
    }

    fn list_projects(&self) -> Result<Vec<Project>, AdapterError> {
        Ok(Vec::new())
    }

    fn list_tickets(&self, _project_id: ProjectId) -> Result<Vec<Ticket>, AdapterError> {
        Ok(Vec::new())
    }

    fn post_timer(
        &self,
        project_id: ProjectId,
        ticket_id: i64,
        record: &TimerRecord,
    ) -> Result<(), AdapterError> {
        tracing::debug!(
            project_id,
            ticket_id,
            timer_id = record.timer_id,
            "offline source accepted timer"
        );
        Ok(())
    }
}
