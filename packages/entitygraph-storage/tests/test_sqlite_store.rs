//! End-to-end tests against the SQLite backend
//!
//! Verifies that committed entities survive reopening the database and that
//! full-text search is served from the rebuilt index with the same matching
//! rules as the in-memory backend.

#![cfg(feature = "sqlite")]

use entitygraph_storage::{
    EntityStore, File, InMemoryBackend, IntellectualEntity, LifecycleStatus, Metadata, RepoPath,
    Representation, RepositoryBackend, SqliteBackend, StoreConfig,
};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

fn manuscript() -> IntellectualEntity {
    IntellectualEntity::new("ms-42")
        .with_descriptive(Some(Metadata::DublinCore(json!({"title": "Voynich facsimile"}))))
        .with_representation(
            Representation::new("scans")
                .with_title("Folio scans")
                .with_file(File::new("folio-1").with_filename("folio-1.jp2")),
        )
}

#[tokio::test]
async fn test_entity_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("repository.db");

    {
        let backend = Arc::new(SqliteBackend::new(&db_path).unwrap());
        let store = EntityStore::new(backend, StoreConfig::default());
        let mut session = store.session();
        store.add_entity(&mut session, &manuscript(), None).await.unwrap();
        store
            .update_entity_metadata(
                &mut session,
                "ms-42",
                Some(Metadata::DublinCore(json!({"title": "Voynich facsimile, rev."}))),
            )
            .await
            .unwrap();
    }

    let backend = Arc::new(SqliteBackend::new(&db_path).unwrap());
    let store = EntityStore::new(backend.clone(), StoreConfig::default());
    let session = store.session();

    let entity = store.fetch_entity(&session, "ms-42", None).await.unwrap();
    assert_eq!(entity.version, Some(2));
    assert_eq!(entity.lifecycle.unwrap().state, LifecycleStatus::Ingested);
    assert_eq!(
        entity.representations[0].files[0].filename.as_deref(),
        Some("folio-1.jp2")
    );

    let stats = backend.stats().await.unwrap();
    assert!(stats.objects >= 7);
    assert!(stats.datastreams >= 2);
}

#[tokio::test]
async fn test_search_after_reopen() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("repository.db");
    {
        let store = EntityStore::new(
            Arc::new(SqliteBackend::new(&db_path).unwrap()),
            StoreConfig::default(),
        );
        let mut session = store.session();
        store.add_entity(&mut session, &manuscript(), None).await.unwrap();
        store
            .add_entity(&mut session, &IntellectualEntity::new("other"), None)
            .await
            .unwrap();
    }

    let store = EntityStore::new(
        Arc::new(SqliteBackend::new(&db_path).unwrap()),
        StoreConfig::default(),
    );
    let session = store.session();

    let entities = store.search_entities(&session, "voynich", 0, 0).await.unwrap();
    assert_eq!(entities, vec![RepoPath::entity("ms-42").unwrap()]);

    let files = store.search_files(&session, "folio", 0, 10).await.unwrap();
    assert_eq!(
        files,
        vec![RepoPath::parse("entities/ms-42/version-1/scans/folio-1").unwrap()]
    );

    let all = store.search_entities(&session, "", 0, 0).await.unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn test_backends_agree_on_query_text() {
    let entity = IntellectualEntity::new("e1")
        .with_representation(Representation::new("r1").with_title("alpha"))
        .with_representation(Representation::new("r2").with_title("gamma"))
        .with_representation(Representation::new("r3").with_title("alpha or gamma"));
    let rep = |id: &str| RepoPath::parse(format!("entities/e1/version-1/{}", id)).unwrap();

    let backends: Vec<Arc<dyn RepositoryBackend>> = vec![
        Arc::new(InMemoryBackend::new()),
        Arc::new(SqliteBackend::in_memory().unwrap()),
    ];
    for backend in backends {
        let store = EntityStore::new(backend, StoreConfig::default());
        let mut session = store.session();
        store.add_entity(&mut session, &entity, None).await.unwrap();

        let either = store
            .search_representations(&session, "alpha OR gamma", 0, 0)
            .await
            .unwrap();
        assert_eq!(either, vec![rep("r3")]);

        let mut unbalanced = store
            .search_representations(&session, "alpha)", 0, 0)
            .await
            .unwrap();
        unbalanced.sort();
        assert_eq!(unbalanced, vec![rep("r1"), rep("r3")]);

        let syntax = store
            .search_representations(&session, "-gamma text:alpha", 0, 0)
            .await
            .unwrap();
        assert!(syntax.is_empty());
    }
}
