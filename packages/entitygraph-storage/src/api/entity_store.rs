//! Entity Graph Mapper
//!
//! Maps the `IntellectualEntity` tree onto the repository layout:
//!
//! ```text
//! entities/{id}                                  lifecycle, hasVersion*, currentVersion
//! entities/{id}/version-{n}                      DESCRIPTIVE, hasRepresentation*
//! entities/{id}/version-{n}/{rep}                TECHNICAL|SOURCE|PROVENANCE|RIGHTS, hasFile*
//! entities/{id}/version-{n}/{rep}/{file}         TECHNICAL, DATA, hasBitStream*
//! entities/{id}/version-{n}/{rep}/{file}/{bs}    TECHNICAL
//! ```
//!
//! Versions are immutable. Every update, including a single metadata edit,
//! writes a complete `version-{n+1}` and re-points `currentVersion`.
//!
//! Write operations stage everything in the caller's [`Session`] and commit
//! once at the end; on error the staged changes are discarded.

use chrono::Utc;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use super::metadata_path::MetadataTarget;
use super::versions::{current_version_path, resolve_version_path, version_list};
use crate::config::StoreConfig;
use crate::domain::vocab::*;
use crate::domain::{
    path_for, path_from_subject, subject_for, validate_identifier, Binary, BinaryContent,
    BitStream, BitStreamType, ContentLoader, EntityCollection, File, GraphUpdate,
    IntellectualEntity, LifecycleState, LifecycleStatus, Metadata, MetadataSlot, NodeAddress,
    NodeType, PropertyGraph, RepoPath, Representation, RepositoryBackend, VersionList,
    DEFAULT_MIME_TYPE, METADATA_MIME_TYPE,
};
use crate::error::{Result, StorageError};
use crate::infrastructure::LocalFileLoader;
use crate::session::Session;

pub struct EntityStore {
    backend: Arc<dyn RepositoryBackend>,
    loader: Arc<dyn ContentLoader>,
    config: StoreConfig,
}

impl EntityStore {
    pub fn new(backend: Arc<dyn RepositoryBackend>, config: StoreConfig) -> Self {
        Self {
            backend,
            loader: Arc::new(LocalFileLoader::new()),
            config,
        }
    }

    /// Replace the loader used to fetch file bytes at ingest
    pub fn with_content_loader(mut self, loader: Arc<dyn ContentLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn backend(&self) -> &Arc<dyn RepositoryBackend> {
        &self.backend
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Fresh unit of work against this store's backend
    pub fn session(&self) -> Session {
        Session::new(self.backend.clone())
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Ingest a new entity as `version-1` and return its id.
    ///
    /// The id is `explicit_id`, else the entity's own identifier, else a
    /// generated UUID. `Conflict` when `entities/{id}` already exists.
    pub async fn add_entity(
        &self,
        session: &mut Session,
        entity: &IntellectualEntity,
        explicit_id: Option<&str>,
    ) -> Result<String> {
        let result = self.stage_new_entity(session, entity, explicit_id).await;
        let id = session.finish(result).await?;
        info!(entity_id = %id, "Entity ingested");
        Ok(id)
    }

    /// Write `entity` as the next version of `entity_id`; returns the new
    /// version number
    pub async fn update_entity(
        &self,
        session: &mut Session,
        entity_id: &str,
        entity: &IntellectualEntity,
    ) -> Result<u32> {
        let result = self.stage_next_version(session, entity_id, entity).await;
        let version = session.finish(result).await?;
        info!(entity_id = %entity_id, version, "Entity updated");
        Ok(version)
    }

    pub async fn update_representation(
        &self,
        session: &mut Session,
        entity_id: &str,
        rep_id: &str,
        representation: Representation,
    ) -> Result<u32> {
        let updated = self
            .current_content(session, entity_id)
            .await?
            .splice_representation(rep_id, representation)?;
        self.update_entity(session, entity_id, &updated).await
    }

    pub async fn update_file(
        &self,
        session: &mut Session,
        entity_id: &str,
        rep_id: &str,
        file_id: &str,
        file: File,
    ) -> Result<u32> {
        let updated = self
            .current_content(session, entity_id)
            .await?
            .splice_file(rep_id, file_id, file)?;
        self.update_entity(session, entity_id, &updated).await
    }

    pub async fn update_bitstream(
        &self,
        session: &mut Session,
        entity_id: &str,
        rep_id: &str,
        file_id: &str,
        bitstream_id: &str,
        bitstream: BitStream,
    ) -> Result<u32> {
        let updated = self
            .current_content(session, entity_id)
            .await?
            .splice_bitstream(rep_id, file_id, bitstream_id, bitstream)?;
        self.update_entity(session, entity_id, &updated).await
    }

    /// Replace the entity's descriptive metadata
    pub async fn update_entity_metadata(
        &self,
        session: &mut Session,
        entity_id: &str,
        descriptive: Option<Metadata>,
    ) -> Result<u32> {
        let updated = self
            .current_content(session, entity_id)
            .await?
            .with_descriptive(descriptive);
        self.update_entity(session, entity_id, &updated).await
    }

    /// Replace one metadata slot addressed by a client path such as
    /// `{entity}/{rep}/{file}/TECHNICAL`
    pub async fn update_metadata(
        &self,
        session: &mut Session,
        path: &str,
        payload: Metadata,
    ) -> Result<u32> {
        let target = MetadataTarget::parse(path)?;
        let entity = self.current_content(session, target.entity_id()).await?;

        let updated = match &target {
            MetadataTarget::Entity { .. } => entity.with_descriptive(Some(payload)),
            MetadataTarget::Representation { rep_id, slot, .. } => {
                let representation = entity
                    .representation(rep_id)
                    .cloned()
                    .ok_or_else(|| StorageError::not_found(format!("representation {}", rep_id)))?
                    .with_metadata(*slot, Some(payload))?;
                entity.splice_representation(rep_id, representation)?
            }
            MetadataTarget::File {
                rep_id, file_id, ..
            } => {
                let file = existing_file(&entity, rep_id, file_id)?.with_technical(Some(payload));
                entity.splice_file(rep_id, file_id, file)?
            }
            MetadataTarget::Bitstream {
                rep_id,
                file_id,
                bitstream_id,
                ..
            } => {
                let bitstream = existing_file(&entity, rep_id, file_id)?
                    .bitstream(bitstream_id)
                    .cloned()
                    .ok_or_else(|| StorageError::not_found(format!("bitstream {}", bitstream_id)))?
                    .with_technical(Some(payload));
                entity.splice_bitstream(rep_id, file_id, bitstream_id, bitstream)?
            }
        };

        self.update_entity(session, target.entity_id(), &updated).await
    }

    async fn current_content(
        &self,
        session: &Session,
        entity_id: &str,
    ) -> Result<IntellectualEntity> {
        Ok(self.fetch_entity(session, entity_id, None).await?.into_content())
    }

    async fn stage_new_entity(
        &self,
        session: &mut Session,
        entity: &IntellectualEntity,
        explicit_id: Option<&str>,
    ) -> Result<String> {
        let id = match non_blank(explicit_id).or_else(|| entity.explicit_identifier()) {
            Some(id) => id.to_string(),
            None => Uuid::new_v4().to_string(),
        };
        let entity_path = RepoPath::entity(&id)?;
        if session.exists(&entity_path).await? {
            return Err(StorageError::conflict(format!("Entity already exists: {}", id)));
        }

        session
            .create_object(&entity_path, NodeType::IntellectualEntity)
            .await?;
        let version_path = self.stage_version(session, &id, 1, entity).await?;
        let version = subject_for(&version_path);

        session
            .update_graph(
                GraphUpdate::for_path(&entity_path)
                    .insert_literal(PROP_HAS_TYPE, TYPE_INTELLECTUAL_ENTITY)
                    .insert_resource(PROP_HAS_VERSION, version.clone())
                    .insert_resource(PROP_CURRENT_VERSION, version)
                    .insert_literal(PROP_HAS_LIFECYCLE_STATE, LifecycleStatus::Ingested.as_str())
                    .insert_literal(
                        PROP_HAS_LIFECYCLE_DETAILS,
                        format!("successfully ingested at {}", Utc::now().to_rfc3339()),
                    ),
            )
            .await?;
        Ok(id)
    }

    async fn stage_next_version(
        &self,
        session: &mut Session,
        entity_id: &str,
        entity: &IntellectualEntity,
    ) -> Result<u32> {
        let entity_path = RepoPath::entity(entity_id)?;
        let entity_node = session.require_object(&entity_path).await?;
        let current = current_version_path(&entity_node.properties)?.version_number()?;
        let next = current
            .checked_add(1)
            .ok_or_else(|| StorageError::corrupt_state("Version number overflow"))?;

        let version_path = self.stage_version(session, entity_id, next, entity).await?;
        let version = subject_for(&version_path);

        session
            .update_graph(
                GraphUpdate::for_path(&entity_path)
                    .delete_all(PROP_CURRENT_VERSION)
                    .delete_all(PROP_HAS_LIFECYCLE_STATE)
                    .delete_all(PROP_HAS_LIFECYCLE_DETAILS)
                    .insert_resource(PROP_HAS_VERSION, version.clone())
                    .insert_resource(PROP_CURRENT_VERSION, version)
                    .insert_literal(PROP_HAS_LIFECYCLE_STATE, LifecycleStatus::Ingested.as_str())
                    .insert_literal(
                        PROP_HAS_LIFECYCLE_DETAILS,
                        format!("version {} ingested at {}", next, Utc::now().to_rfc3339()),
                    ),
            )
            .await?;
        Ok(next)
    }

    /// Stage `entities/{id}/version-{n}` and the full tree beneath it.
    ///
    /// Children are written before the edges that link them, so the edge
    /// update of each level is the last write for that level.
    async fn stage_version(
        &self,
        session: &mut Session,
        entity_id: &str,
        version: u32,
        entity: &IntellectualEntity,
    ) -> Result<RepoPath> {
        let version_path = RepoPath::version(entity_id, version)?;
        session
            .create_object(&version_path, NodeType::Version)
            .await?;
        self.write_metadata(
            session,
            &version_path,
            MetadataSlot::Descriptive,
            entity.descriptive.as_ref(),
        )
        .await?;

        let mut edges = GraphUpdate::for_path(&version_path);
        for representation in &entity.representations {
            let rep_path = self
                .stage_representation(session, &version_path, representation)
                .await?;
            edges = edges.insert_resource(PROP_HAS_REPRESENTATION, subject_for(&rep_path));
        }
        session.update_graph(edges).await?;

        debug!(path = %version_path, "Staged version");
        Ok(version_path)
    }

    async fn stage_representation(
        &self,
        session: &mut Session,
        version_path: &RepoPath,
        representation: &Representation,
    ) -> Result<RepoPath> {
        let rep_path = version_path.child(&element_id(representation.identifier.as_deref())?)?;
        session
            .create_object(&rep_path, NodeType::Representation)
            .await?;
        for slot in Representation::SLOTS {
            self.write_metadata(session, &rep_path, slot, representation.metadata(slot))
                .await?;
        }

        let mut update =
            GraphUpdate::for_path(&rep_path).insert_literal(PROP_HAS_TYPE, TYPE_REPRESENTATION);
        if let Some(title) = &representation.title {
            update = update.insert_literal(PROP_HAS_TITLE, title.as_str());
        }
        for file in &representation.files {
            let file_path = self.stage_file(session, &rep_path, file).await?;
            update = update.insert_resource(PROP_HAS_FILE, subject_for(&file_path));
        }
        session.update_graph(update).await?;
        Ok(rep_path)
    }

    async fn stage_file(
        &self,
        session: &mut Session,
        rep_path: &RepoPath,
        file: &File,
    ) -> Result<RepoPath> {
        let file_path = rep_path.child(&element_id(file.identifier.as_deref())?)?;
        session.create_object(&file_path, NodeType::File).await?;
        self.write_metadata(
            session,
            &file_path,
            MetadataSlot::Technical,
            file.technical.as_ref(),
        )
        .await?;

        let mut update = GraphUpdate::for_path(&file_path).insert_literal(PROP_HAS_TYPE, TYPE_FILE);
        for bitstream in &file.bitstreams {
            let bs_path = self.stage_bitstream(session, &file_path, bitstream).await?;
            update = update.insert_resource(PROP_HAS_BITSTREAM, subject_for(&bs_path));
        }

        let uri = non_blank(file.uri.as_deref()).map(normalize_uri);
        let filename = non_blank(file.filename.as_deref())
            .map(str::to_string)
            .or_else(|| uri.as_deref().and_then(filename_from_uri));
        if let Some(filename) = filename {
            update = update.insert_literal(PROP_HAS_FILENAME, filename);
        }
        let mimetype = non_blank(file.mimetype.as_deref()).unwrap_or(DEFAULT_MIME_TYPE);
        update = update.insert_literal(PROP_HAS_MIMETYPE, mimetype);

        if let Some(uri) = uri {
            let ingest_source = self
                .stage_file_content(session, &file_path, &uri, mimetype)
                .await?;
            update = update.insert_literal(PROP_HAS_INGEST_SOURCE, ingest_source);
            if self.config.referenced_content {
                update = update.insert_literal(PROP_HAS_REFERENCED_CONTENT, uri);
            }
        }
        session.update_graph(update).await?;
        Ok(file_path)
    }

    /// Store the file's bytes under `{file}/DATA` and return the ingest
    /// source to record. Referenced content is left where it is.
    async fn stage_file_content(
        &self,
        session: &mut Session,
        file_path: &RepoPath,
        uri: &str,
        mimetype: &str,
    ) -> Result<String> {
        if self.config.referenced_content {
            return Ok(uri.to_string());
        }

        // A URL handed out by this store points at an earlier version's binary
        if let Some(stored) = self.config.parse_file_url(uri) {
            let source_path = path_for(&NodeAddress::File {
                entity_id: &stored.entity_id,
                version: stored.version,
                rep_id: &stored.rep_id,
                file_id: &stored.file_id,
            })?;
            let source = session.require_object(&source_path).await?;
            let content = session
                .read_datastream(&source_path.data())
                .await?
                .ok_or_else(|| StorageError::not_found(source_path.data()))?;
            self.write_data(session, file_path, Binary::new(mimetype, content.bytes))
                .await?;
            let ingest_source = source
                .properties
                .first_literal(PROP_HAS_INGEST_SOURCE)
                .unwrap_or(uri);
            return Ok(ingest_source.to_string());
        }

        let bytes = self.loader.load(uri).await?;
        debug!(uri = %uri, bytes = bytes.len(), "Loaded file content");
        self.write_data(session, file_path, Binary::new(mimetype, bytes))
            .await?;
        Ok(uri.to_string())
    }

    async fn write_data(
        &self,
        session: &mut Session,
        file_path: &RepoPath,
        content: Binary,
    ) -> Result<()> {
        let checksum = format!("{:x}", Sha256::digest(&content.bytes));
        let data_path = file_path.data();
        session
            .write_datastream(&data_path, NodeType::BinaryData, content)
            .await?;
        session
            .update_graph(
                GraphUpdate::for_path(&data_path)
                    .delete_all(PROP_HAS_CHECKSUM)
                    .insert_literal(PROP_HAS_CHECKSUM, checksum),
            )
            .await
    }

    async fn stage_bitstream(
        &self,
        session: &mut Session,
        file_path: &RepoPath,
        bitstream: &BitStream,
    ) -> Result<RepoPath> {
        let bs_path = file_path.child(&element_id(bitstream.identifier.as_deref())?)?;
        session
            .create_object(&bs_path, NodeType::Bitstream)
            .await?;
        self.write_metadata(
            session,
            &bs_path,
            MetadataSlot::Technical,
            bitstream.technical.as_ref(),
        )
        .await?;
        session
            .update_graph(
                GraphUpdate::for_path(&bs_path)
                    .insert_literal(PROP_HAS_TYPE, TYPE_BITSTREAM)
                    .insert_literal(PROP_HAS_BITSTREAM_TYPE, bitstream.bitstream_type.as_str()),
            )
            .await?;
        Ok(bs_path)
    }

    /// Write one slot as its own datastream, tagged with its classification.
    /// An absent payload writes nothing.
    async fn write_metadata(
        &self,
        session: &mut Session,
        owner: &RepoPath,
        slot: MetadataSlot,
        payload: Option<&Metadata>,
    ) -> Result<()> {
        let Some(payload) = payload else {
            return Ok(());
        };
        let path = owner.metadata(slot);
        let bytes = serde_json::to_vec(payload)?;
        session
            .write_datastream(&path, NodeType::Metadata, Binary::new(METADATA_MIME_TYPE, bytes))
            .await?;

        let classification = payload.classify();
        session
            .update_graph(
                GraphUpdate::for_path(&path)
                    .delete_all(PROP_HAS_TYPE)
                    .delete_all(PROP_HAS_SCHEMA)
                    .insert_literal(PROP_HAS_TYPE, classification.type_name)
                    .insert_literal(PROP_HAS_SCHEMA, classification.schema_uri),
            )
            .await
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Reconstruct an entity from the given version, or the current one
    pub async fn fetch_entity(
        &self,
        session: &Session,
        entity_id: &str,
        version: Option<u32>,
    ) -> Result<IntellectualEntity> {
        let version_path = resolve_version_path(session, entity_id, version).await?;
        let entity_node = session.require_object(&RepoPath::entity(entity_id)?).await?;
        let version_no = version_path.version_number()?;

        let graph = session.read_graph(&version_path).await?;
        let descriptive =
            read_metadata(session, &version_path.metadata(MetadataSlot::Descriptive)).await?;
        let mut entity = IntellectualEntity::new(entity_id).with_descriptive(descriptive);
        for rep_path in linked_paths(&graph, PROP_HAS_REPRESENTATION)? {
            let representation = self
                .read_representation(session, &rep_path, entity_id, version_no)
                .await?;
            entity = entity.with_representation(representation);
        }
        entity.lifecycle = read_lifecycle(&entity_node.properties)?;
        entity.version = Some(version_no);

        debug!(entity_id = %entity_id, version = version_no, "Fetched entity");
        Ok(entity)
    }

    pub async fn fetch_representation(
        &self,
        session: &Session,
        entity_id: &str,
        rep_id: &str,
        version: Option<u32>,
    ) -> Result<Representation> {
        let version_path = resolve_version_path(session, entity_id, version).await?;
        let rep_path = version_path.child(rep_id)?;
        session.require_object(&rep_path).await?;
        self.read_representation(session, &rep_path, entity_id, version_path.version_number()?)
            .await
    }

    pub async fn fetch_file(
        &self,
        session: &Session,
        entity_id: &str,
        rep_id: &str,
        file_id: &str,
        version: Option<u32>,
    ) -> Result<File> {
        let version_path = resolve_version_path(session, entity_id, version).await?;
        let file_path = version_path.child(rep_id)?.child(file_id)?;
        session.require_object(&file_path).await?;
        self.read_file(
            session,
            &file_path,
            entity_id,
            rep_id,
            version_path.version_number()?,
        )
        .await
    }

    pub async fn fetch_bitstream(
        &self,
        session: &Session,
        entity_id: &str,
        rep_id: &str,
        file_id: &str,
        bitstream_id: &str,
        version: Option<u32>,
    ) -> Result<BitStream> {
        let version_path = resolve_version_path(session, entity_id, version).await?;
        let bs_path = version_path
            .child(rep_id)?
            .child(file_id)?
            .child(bitstream_id)?;
        session.require_object(&bs_path).await?;
        read_bitstream(session, &bs_path).await
    }

    /// Metadata slot of the current version, addressed like
    /// [`EntityStore::update_metadata`]
    pub async fn fetch_current_metadata(&self, session: &Session, path: &str) -> Result<Metadata> {
        let target = MetadataTarget::parse(path)?;
        let version_path = resolve_version_path(session, target.entity_id(), None).await?;
        let datastream = target.datastream_path(&version_path)?;
        read_metadata(session, &datastream)
            .await?
            .ok_or_else(|| StorageError::not_found(&datastream))
    }

    /// Current versions of several entities; each path is `entities/{id}`
    /// or a bare id
    pub async fn fetch_entities<S: AsRef<str>>(
        &self,
        session: &Session,
        paths: &[S],
    ) -> Result<EntityCollection> {
        let mut collection = EntityCollection::default();
        for path in paths {
            let trimmed = path.as_ref().trim_matches('/');
            let entity_id = trimmed
                .strip_prefix(crate::domain::paths::ENTITY_ROOT)
                .and_then(|rest| rest.strip_prefix('/'))
                .unwrap_or(trimmed);
            collection
                .entities
                .push(self.fetch_entity(session, entity_id, None).await?);
        }
        Ok(collection)
    }

    pub async fn fetch_version_list(&self, session: &Session, entity_id: &str) -> Result<VersionList> {
        version_list(session, entity_id).await
    }

    /// Lifecycle recorded on the entity node; `NotFound` without an entity
    pub async fn fetch_entity_lifecycle(
        &self,
        session: &Session,
        entity_id: &str,
    ) -> Result<Option<LifecycleState>> {
        let node = session.require_object(&RepoPath::entity(entity_id)?).await?;
        read_lifecycle(&node.properties)
    }

    /// Stored bytes of a file. Only valid when content is held by the store.
    pub async fn fetch_binary(
        &self,
        session: &Session,
        entity_id: &str,
        rep_id: &str,
        file_id: &str,
        version: Option<u32>,
    ) -> Result<BinaryContent> {
        if self.config.referenced_content {
            return Err(StorageError::unsupported_operation(
                "File content is referenced externally; follow the file URI instead",
            ));
        }
        let version_path = resolve_version_path(session, entity_id, version).await?;
        let file_path = version_path.child(rep_id)?.child(file_id)?;
        session.require_object(&file_path).await?;

        let data_path = file_path.data();
        let node = session
            .node(&data_path)
            .await?
            .ok_or_else(|| StorageError::not_found(&data_path))?;
        let checksum = node
            .properties
            .first_literal(PROP_HAS_CHECKSUM)
            .map(str::to_string);
        let content = node
            .content
            .ok_or_else(|| StorageError::corrupt_state(format!("No content at {}", data_path)))?;

        Ok(BinaryContent {
            mime_type: content.mime_type,
            bytes: content.bytes,
            checksum,
        })
    }

    async fn read_representation(
        &self,
        session: &Session,
        rep_path: &RepoPath,
        entity_id: &str,
        version: u32,
    ) -> Result<Representation> {
        let graph = session.read_graph(rep_path).await?;
        let rep_id = rep_path.last_segment();
        let mut representation = Representation::new(rep_id);
        representation.title = graph.first_literal(PROP_HAS_TITLE).map(str::to_string);
        for slot in Representation::SLOTS {
            let payload = read_metadata(session, &rep_path.metadata(slot)).await?;
            representation = representation.with_metadata(slot, payload)?;
        }
        for file_path in linked_paths(&graph, PROP_HAS_FILE)? {
            let file = self
                .read_file(session, &file_path, entity_id, rep_id, version)
                .await?;
            representation = representation.with_file(file);
        }
        Ok(representation)
    }

    async fn read_file(
        &self,
        session: &Session,
        file_path: &RepoPath,
        entity_id: &str,
        rep_id: &str,
        version: u32,
    ) -> Result<File> {
        let graph = session.read_graph(file_path).await?;
        let file_id = file_path.last_segment();

        let uri = match graph.first_literal(PROP_HAS_REFERENCED_CONTENT) {
            Some(referenced) => Some(referenced.to_string()),
            None if session.exists(&file_path.data()).await? => {
                Some(self.config.file_url(entity_id, rep_id, file_id, version))
            }
            None => None,
        };

        let mut file = File::new(file_id).with_technical(
            read_metadata(session, &file_path.metadata(MetadataSlot::Technical)).await?,
        );
        file.filename = graph.first_literal(PROP_HAS_FILENAME).map(str::to_string);
        file.mimetype = graph.first_literal(PROP_HAS_MIMETYPE).map(str::to_string);
        file.uri = uri;
        for bs_path in linked_paths(&graph, PROP_HAS_BITSTREAM)? {
            file = file.with_bitstream(read_bitstream(session, &bs_path).await?);
        }
        Ok(file)
    }
}

async fn read_bitstream(session: &Session, bs_path: &RepoPath) -> Result<BitStream> {
    let graph = session.read_graph(bs_path).await?;
    let bitstream_type = graph
        .first_literal(PROP_HAS_BITSTREAM_TYPE)
        .map(|tag| BitStreamType::from(tag.to_string()))
        .unwrap_or_default();
    Ok(BitStream::new(bs_path.last_segment())
        .with_type(bitstream_type)
        .with_technical(read_metadata(session, &bs_path.metadata(MetadataSlot::Technical)).await?))
}

/// Deserialized slot payload; `None` when no datastream is present
async fn read_metadata(session: &Session, path: &RepoPath) -> Result<Option<Metadata>> {
    match session.read_datastream(path).await? {
        Some(content) => serde_json::from_slice(&content.bytes).map(Some).map_err(|e| {
            StorageError::corrupt_state(format!("Unreadable metadata at {}", path)).with_source(e)
        }),
        None => Ok(None),
    }
}

fn read_lifecycle(entity_graph: &PropertyGraph) -> Result<Option<LifecycleState>> {
    if entity_graph.first_literal(PROP_HAS_LIFECYCLE_STATE).is_none() {
        return Ok(None);
    }
    let state: LifecycleStatus = entity_graph.single_literal(PROP_HAS_LIFECYCLE_STATE)?.parse()?;
    let details = entity_graph
        .first_literal(PROP_HAS_LIFECYCLE_DETAILS)
        .unwrap_or_default();
    Ok(Some(LifecycleState::new(state, details)))
}

fn linked_paths(graph: &PropertyGraph, predicate: &str) -> Result<Vec<RepoPath>> {
    graph.resources(predicate).map(path_from_subject).collect()
}

fn existing_file(entity: &IntellectualEntity, rep_id: &str, file_id: &str) -> Result<File> {
    entity
        .representation(rep_id)
        .ok_or_else(|| StorageError::not_found(format!("representation {}", rep_id)))?
        .file(file_id)
        .cloned()
        .ok_or_else(|| StorageError::not_found(format!("file {}", file_id)))
}

/// Supplied child id (validated) or a generated one
fn element_id(identifier: Option<&str>) -> Result<String> {
    match non_blank(identifier) {
        Some(id) => {
            validate_identifier(id)?;
            Ok(id.to_string())
        }
        None => Ok(Uuid::new_v4().to_string()),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Scheme-less URIs are local file references
fn normalize_uri(uri: &str) -> String {
    if has_scheme(uri) {
        uri.to_string()
    } else {
        format!("file:{}", uri)
    }
}

fn has_scheme(uri: &str) -> bool {
    match uri.split_once(':') {
        Some((scheme, _)) => {
            let mut chars = scheme.chars();
            chars.next().is_some_and(|c| c.is_ascii_alphabetic())
                && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

/// Last path segment of a URI, without query or fragment
fn filename_from_uri(uri: &str) -> Option<String> {
    let path = match uri.split_once(':') {
        Some((_, rest)) if has_scheme(uri) => rest,
        _ => uri,
    };
    let path = path.split(['?', '#']).next().unwrap_or(path);
    path.rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .map(|name| {
            urlencoding::decode(name)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| name.to_string())
        })
}
