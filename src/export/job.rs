//! Export job lifecycle

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{ExportError, ExportSelection};
use crate::models::{ExportFormat, ResourceType};

/// State of an export job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportState {
    Pending,
    Generating,
    Ready,
    Failed,
}

impl ExportState {
    /// Ready and failed are final
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExportState::Ready | ExportState::Failed)
    }

    /// Allowed moves: pending to generating, generating to ready or failed
    pub fn can_transition_to(&self, next: ExportState) -> bool {
        matches!(
            (self, next),
            (ExportState::Pending, ExportState::Generating)
                | (ExportState::Generating, ExportState::Ready)
                | (ExportState::Generating, ExportState::Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportState::Pending => "pending",
            ExportState::Generating => "generating",
            ExportState::Ready => "ready",
            ExportState::Failed => "failed",
        }
    }
}

impl fmt::Display for ExportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One export request
///
/// Jobs are independent of each other and hold no shared state. A job is
/// dropped once its artifact is delivered or its failure reported.
#[derive(Debug, Clone, Serialize)]
pub struct ExportJob {
    id: Uuid,
    selection: ExportSelection,
    format: ExportFormat,
    resource_type: ResourceType,
    state: ExportState,
    created_at: DateTime<Utc>,
}

impl ExportJob {
    /// Create a pending job
    ///
    /// The job's resource type is that of the first selected record.
    pub fn new(selection: ExportSelection, format: ExportFormat) -> Result<Self, ExportError> {
        let resource_type = selection
            .records()
            .first()
            .map(|record| record.resource_type.clone())
            .ok_or(ExportError::EmptySelection)?;
        Ok(Self {
            id: Uuid::new_v4(),
            selection,
            format,
            resource_type,
            state: ExportState::Pending,
            created_at: Utc::now(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn selection(&self) -> &ExportSelection {
        &self.selection
    }

    pub fn format(&self) -> ExportFormat {
        self.format
    }

    pub fn resource_type(&self) -> &ResourceType {
        &self.resource_type
    }

    pub fn state(&self) -> ExportState {
        self.state
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Move to `next`, rejecting moves out of terminal states or skipped steps
    pub fn transition(&mut self, next: ExportState) -> Result<(), ExportError> {
        if !self.state.can_transition_to(next) {
            return Err(ExportError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::debug!(job_id = %self.id, from = %self.state, to = %next, "Export job state change");
        self.state = next;
        Ok(())
    }
}
