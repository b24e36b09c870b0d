/*
 * EntityGraph Orchestration - Async Ingest
 *
 * Parks entities in a persistent queue and ingests them in the background.
 *
 * Architecture:
 * - Queue items stored as JSON datastreams (queue/{id})
 * - Item State Machine (QUEUED -> INGESTING -> removed | INGEST_FAILED)
 * - Interval-driven drain worker with re-entrancy guard
 * - YAML service configuration
 */

// Public modules
pub mod config;
pub mod error;
pub mod job;
pub mod queue;
pub mod worker;

// Re-exports
pub use config::{BackendKind, ConfigError, ServiceConfig};
pub use error::{IngestError, Result};
pub use job::{IngestState, IngestStateMachine, QueueItem};
pub use queue::{DrainReport, IngestQueue};
pub use worker::IngestWorker;
