use chrono::{DateTime, Utc};
use entitygraph_storage::LifecycleStatus;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{IngestError, Result};

/// Ingest state of a queue item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IngestState {
    Queued,
    Ingesting,
    IngestFailed,
}

impl IngestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestState::Queued => "QUEUED",
            IngestState::Ingesting => "INGESTING",
            IngestState::IngestFailed => "INGEST_FAILED",
        }
    }

    /// Coarse lifecycle reported to clients while the item is queued
    pub fn lifecycle(&self) -> LifecycleStatus {
        match self {
            IngestState::Queued | IngestState::Ingesting => LifecycleStatus::Ingesting,
            IngestState::IngestFailed => LifecycleStatus::IngestFailed,
        }
    }

    /// Failed items stay until an operator removes them
    pub fn is_terminal(&self) -> bool {
        matches!(self, IngestState::IngestFailed)
    }
}

impl FromStr for IngestState {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "QUEUED" => Ok(IngestState::Queued),
            "INGESTING" => Ok(IngestState::Ingesting),
            "INGEST_FAILED" => Ok(IngestState::IngestFailed),
            _ => Err(IngestError::serialization(format!(
                "Invalid ingest state: {}",
                s
            ))),
        }
    }
}

impl std::fmt::Display for IngestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Queue item as tracked by the drain loop
#[derive(Debug, Clone, PartialEq)]
pub struct QueueItem {
    pub id: String,
    pub state: IngestState,
    pub updated_at: DateTime<Utc>,
    /// Last failure message, kept for operator inspection
    pub error: Option<String>,
}

impl QueueItem {
    pub fn new_queued(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: IngestState::Queued,
            updated_at: Utc::now(),
            error: None,
        }
    }

    pub fn with_state(id: impl Into<String>, state: IngestState) -> Self {
        Self {
            state,
            ..Self::new_queued(id)
        }
    }
}

/// Queue item state machine
///
/// ```text
/// QUEUED → INGESTING → (deleted) | INGEST_FAILED
///              ↓
///           QUEUED        (recovery after an interrupted drain)
/// ```
pub struct IngestStateMachine {
    item: QueueItem,
}

impl IngestStateMachine {
    pub fn new(item: QueueItem) -> Self {
        Self { item }
    }

    pub fn item(&self) -> &QueueItem {
        &self.item
    }

    pub fn into_item(self) -> QueueItem {
        self.item
    }

    /// Transition: QUEUED → INGESTING
    pub fn start(&mut self) -> Result<()> {
        self.transition(IngestState::Queued, IngestState::Ingesting)
    }

    /// Transition: INGESTING → INGEST_FAILED
    pub fn fail(&mut self, error: impl Into<String>) -> Result<()> {
        self.transition(IngestState::Ingesting, IngestState::IngestFailed)?;
        self.item.error = Some(error.into());
        Ok(())
    }

    /// Transition: INGESTING → QUEUED
    pub fn requeue(&mut self) -> Result<()> {
        self.transition(IngestState::Ingesting, IngestState::Queued)
    }

    fn transition(&mut self, expected: IngestState, next: IngestState) -> Result<()> {
        if self.item.state != expected {
            return Err(IngestError::InvalidStateTransition {
                from: self.item.state.to_string(),
                to: next.to_string(),
            });
        }
        self.item.state = next;
        self.item.updated_at = Utc::now();
        Ok(())
    }
}
