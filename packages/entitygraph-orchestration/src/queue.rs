//! Async ingest queue
//!
//! Entities are parked as JSON datastreams under `queue/{id}` and linked from
//! the queue root via `hasItem`. The drain loop ingests every QUEUED item
//! through the entity store; each state change commits in its own session so
//! a failed item never takes the rest of the batch down with it.

use entitygraph_storage::domain::vocab::{
    PROP_HAS_INGEST_STATE, PROP_HAS_ITEM, PROP_HAS_LIFECYCLE_DETAILS,
};
use entitygraph_storage::domain::{
    path_from_subject, subject_for, Binary, GraphUpdate, Node, NodeType, RdfTerm,
};
use entitygraph_storage::{
    EntityStore, IntellectualEntity, LifecycleState, RepoPath, Session, StorageError,
};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{IngestError, Result};
use crate::job::{IngestState, IngestStateMachine, QueueItem};

const QUEUE_ITEM_MIME_TYPE: &str = "application/json";

/// Outcome of one drain pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub ingested: usize,
    pub failed: usize,
}

impl DrainReport {
    pub fn total(&self) -> usize {
        self.ingested + self.failed
    }
}

pub struct IngestQueue {
    store: Arc<EntityStore>,
}

impl IngestQueue {
    pub fn new(store: Arc<EntityStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<EntityStore> {
        &self.store
    }

    /// Create the queue root if missing and settle items left INGESTING by an
    /// interrupted drain. Returns the number of recovered items.
    pub async fn init(&self) -> Result<usize> {
        let mut session = self.store.session();
        session
            .find_or_create_object(&RepoPath::queue(), NodeType::Queue)
            .await?;
        session.save().await?;

        let mut recovered = 0;
        for item in self.items(&session).await? {
            if item.state != IngestState::Ingesting {
                continue;
            }
            // The entity commit landed before the item was removed
            if session.exists(&RepoPath::entity(&item.id)?).await? {
                self.remove_item(&item.id).await?;
            } else {
                let mut machine = IngestStateMachine::new(item);
                machine.requeue()?;
                self.write_state(machine.item()).await?;
            }
            recovered += 1;
        }

        info!(recovered, "Ingest queue initialized");
        Ok(recovered)
    }

    /// Park an entity for asynchronous ingest and return its id.
    ///
    /// `Conflict` when an entity or a queue item with that id exists. The
    /// checks are not atomic with the write; a concurrent enqueue of the same
    /// id fails with `Conflict` at commit.
    pub async fn enqueue(&self, session: &mut Session, entity: &IntellectualEntity) -> Result<String> {
        let result = self.stage_enqueue(session, entity).await;
        let id = session.finish(result).await?;
        info!(item_id = %id, "Entity queued for ingest");
        Ok(id)
    }

    async fn stage_enqueue(
        &self,
        session: &mut Session,
        entity: &IntellectualEntity,
    ) -> entitygraph_storage::Result<String> {
        let id = entity
            .explicit_identifier()
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let item_path = RepoPath::queue_item(&id)?;

        if session.exists(&RepoPath::entity(&id)?).await? {
            return Err(StorageError::conflict(format!(
                "Unable to queue {}: an entity with that id already exists",
                id
            )));
        }
        if session.exists(&item_path).await? {
            return Err(StorageError::conflict(format!(
                "Unable to queue {}: an item with that id is already queued",
                id
            )));
        }

        let queue_path = RepoPath::queue();
        session
            .find_or_create_object(&queue_path, NodeType::Queue)
            .await?;

        let payload = entity.clone().with_identifier(id.as_str()).into_content();
        session
            .create_datastream(
                &item_path,
                NodeType::QueueItem,
                Binary::new(QUEUE_ITEM_MIME_TYPE, serde_json::to_vec(&payload)?),
            )
            .await?;
        session
            .update_graph(
                GraphUpdate::for_path(&item_path)
                    .insert_literal(PROP_HAS_INGEST_STATE, IngestState::Queued.as_str()),
            )
            .await?;
        session
            .update_graph(
                GraphUpdate::for_path(&queue_path)
                    .insert_resource(PROP_HAS_ITEM, subject_for(&item_path)),
            )
            .await?;
        Ok(id)
    }

    /// Ingest every QUEUED item once. No-op when the queue root is absent.
    pub async fn poll_and_drain(&self) -> Result<DrainReport> {
        let queued: Vec<QueueItem> = {
            let session = self.store.session();
            if !session.exists(&RepoPath::queue()).await? {
                return Ok(DrainReport::default());
            }
            self.items(&session)
                .await?
                .into_iter()
                .filter(|item| item.state == IngestState::Queued)
                .collect()
        };

        let mut report = DrainReport::default();
        for item in queued {
            let id = item.id.clone();
            match self.drain_item(item).await {
                Ok(()) => {
                    report.ingested += 1;
                    info!(item_id = %id, "Queued entity ingested");
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(item_id = %id, error = %e, "Queued entity failed to ingest");
                }
            }
        }

        if report.total() > 0 {
            info!(
                ingested = report.ingested,
                failed = report.failed,
                "Drained ingest queue"
            );
        }
        Ok(report)
    }

    /// Lifecycle of a queued or stored entity.
    ///
    /// Queued and in-flight items report INGESTING; failed items report
    /// INGEST_FAILED. Otherwise the entity's own lifecycle is returned.
    pub async fn fetch_lifecycle_state(
        &self,
        session: &Session,
        id: &str,
    ) -> Result<LifecycleState> {
        if let Some(node) = self.listed_item(session, id).await? {
            let item = item_from_node(&node)?;
            return Ok(LifecycleState::new(item.state.lifecycle(), ""));
        }
        match self.store.fetch_entity_lifecycle(session, id).await? {
            Some(lifecycle) => Ok(lifecycle),
            None => Err(StorageError::corrupt_state(format!(
                "Entity {} has no lifecycle state",
                id
            ))
            .into()),
        }
    }

    /// Items currently linked from the queue root, in queue order
    pub async fn list_items(&self) -> Result<Vec<QueueItem>> {
        let session = self.store.session();
        self.items(&session).await
    }

    async fn drain_item(&self, item: QueueItem) -> Result<()> {
        let mut machine = IngestStateMachine::new(item);
        machine.start()?;
        self.write_state(machine.item()).await?;

        if let Err(e) = self.ingest(&machine.item().id).await {
            machine.fail(e.to_string())?;
            self.write_state(machine.item()).await?;
            return Err(e);
        }
        self.remove_item(&machine.item().id).await
    }

    async fn ingest(&self, id: &str) -> Result<()> {
        let mut session = self.store.session();
        let item_path = RepoPath::queue_item(id)?;
        let payload = session
            .read_datastream(&item_path)
            .await?
            .ok_or_else(|| StorageError::not_found(&item_path))?;
        let entity: IntellectualEntity =
            serde_json::from_slice(&payload.bytes).map_err(IngestError::serialization)?;
        self.store.add_entity(&mut session, &entity, Some(id)).await?;
        Ok(())
    }

    async fn write_state(&self, item: &QueueItem) -> Result<()> {
        let mut session = self.store.session();
        let mut update = GraphUpdate::for_path(&RepoPath::queue_item(&item.id)?)
            .delete_all(PROP_HAS_INGEST_STATE)
            .delete_all(PROP_HAS_LIFECYCLE_DETAILS)
            .insert_literal(PROP_HAS_INGEST_STATE, item.state.as_str());
        if let Some(error) = &item.error {
            update = update.insert_literal(PROP_HAS_LIFECYCLE_DETAILS, error.as_str());
        }
        session.update_graph(update).await?;
        session.save().await?;
        debug!(item_id = %item.id, state = %item.state, "Queue item state written");
        Ok(())
    }

    async fn remove_item(&self, id: &str) -> Result<()> {
        let mut session = self.store.session();
        let item_path = RepoPath::queue_item(id)?;
        session.delete(&item_path).await?;
        session
            .update_graph(
                GraphUpdate::for_path(&RepoPath::queue())
                    .delete(PROP_HAS_ITEM, RdfTerm::resource(subject_for(&item_path))),
            )
            .await?;
        session.save().await?;
        Ok(())
    }

    async fn listed_item(&self, session: &Session, id: &str) -> Result<Option<Node>> {
        let item_path = RepoPath::queue_item(id)?;
        let Some(queue) = session.node(&RepoPath::queue()).await? else {
            return Ok(None);
        };
        let subject = subject_for(&item_path);
        if !queue.properties.resources(PROP_HAS_ITEM).any(|s| s == subject) {
            return Ok(None);
        }
        Ok(session.node(&item_path).await?)
    }

    async fn items(&self, session: &Session) -> Result<Vec<QueueItem>> {
        let Some(queue) = session.node(&RepoPath::queue()).await? else {
            return Ok(Vec::new());
        };
        let paths = queue
            .properties
            .resources(PROP_HAS_ITEM)
            .map(path_from_subject)
            .collect::<entitygraph_storage::Result<Vec<_>>>()?;

        let mut items = Vec::with_capacity(paths.len());
        for path in paths {
            match session.node(&path).await? {
                Some(node) => items.push(item_from_node(&node)?),
                None => warn!(path = %path, "Queue lists a missing item"),
            }
        }
        Ok(items)
    }
}

fn item_from_node(node: &Node) -> Result<QueueItem> {
    let state: IngestState = node
        .properties
        .single_literal(PROP_HAS_INGEST_STATE)?
        .parse()?;
    let mut item = QueueItem::with_state(node.path.last_segment(), state);
    item.error = node
        .properties
        .first_literal(PROP_HAS_LIFECYCLE_DETAILS)
        .map(str::to_string);
    Ok(item)
}
