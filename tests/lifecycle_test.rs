//! Lifecycle manager tests: single live handle, failure handling, timeouts
//! and concurrent access, all against the in-crate mock backend.

use std::sync::Arc;
use std::time::Duration;

use lm_runtime::engine::{LoadError, MockLoader};
use lm_runtime::models::{ArtifactStore, LifecycleManager, LifecycleState, ManagerConfig, ModelError};
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

fn write_artifact(root: &std::path::Path, name: &str, file: &str, body: &[u8]) {
    let dir = root.join(name);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(file), body).unwrap();
}

fn manager_with(loader: MockLoader, config: ManagerConfig) -> (TempDir, Arc<LifecycleManager>) {
    let dir = tempfile::tempdir().unwrap();
    write_artifact(dir.path(), "tiny", "tiny.gguf", b"GGUF tiny");
    write_artifact(dir.path(), "small", "small.gguf", b"GGUF small");
    write_artifact(dir.path(), "broken", "broken.gguf", b"GGUF CORRUPT");
    let store = Arc::new(ArtifactStore::new(dir.path()));
    let manager = Arc::new(LifecycleManager::new(store, Arc::new(loader), config));
    (dir, manager)
}

fn manager(loader: MockLoader) -> (TempDir, Arc<LifecycleManager>) {
    manager_with(loader, ManagerConfig::default())
}

#[tokio::test]
async fn test_end_to_end_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let loader = MockLoader::new();
    let store = Arc::new(ArtifactStore::new(dir.path().join("store")));
    let manager = LifecycleManager::new(store, Arc::new(loader.clone()), ManagerConfig::default());

    assert!(manager.request_list().await.unwrap().is_empty());

    let source = dir.path().join("fileA.gguf");
    std::fs::write(&source, b"GGUF weights").unwrap();
    manager.request_download(source, "tiny").await.unwrap();

    let names: Vec<String> = manager
        .request_list()
        .await
        .unwrap()
        .iter()
        .map(|n| n.as_str().to_string())
        .collect();
    assert_eq!(names, vec!["tiny".to_string()]);

    manager.request_load("tiny").await.unwrap();
    assert_eq!(manager.state(), LifecycleState::Loaded);

    let completion = manager.request_completion("Hello", 16).await.unwrap();
    assert!(!completion.text.is_empty());

    manager.request_unload().await.unwrap();
    let err = manager.request_completion("Hello", 16).await.unwrap_err();
    assert!(matches!(err, ModelError::NotReady { state: LifecycleState::Unloaded }));
    assert_eq!(loader.live(), 0);
}

#[tokio::test]
async fn test_load_missing_on_empty_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ArtifactStore::new(dir.path()));
    let manager = LifecycleManager::new(store, Arc::new(MockLoader::new()), ManagerConfig::default());

    let err = manager.request_load("missing").await.unwrap_err();
    assert!(matches!(err, ModelError::NotFound(_)));
    assert_eq!(manager.state(), LifecycleState::Unloaded);
}

#[tokio::test]
async fn test_failed_resolution_keeps_current_model() {
    let loader = MockLoader::new();
    let (_dir, manager) = manager(loader.clone());
    manager.request_load("tiny").await.unwrap();

    let err = assert_err!(manager.request_load("ghost").await);
    assert!(matches!(err, ModelError::NotFound(_)));

    assert_eq!(manager.state(), LifecycleState::Loaded);
    assert_eq!(manager.status().model.unwrap().as_str(), "tiny");
    assert_ok!(manager.request_completion("still here", 8).await);
    assert_eq!(loader.closed(), 0);
}

#[tokio::test]
async fn test_sequential_loads_never_overlap() {
    let loader = MockLoader::new();
    let (_dir, manager) = manager(loader.clone());

    for name in ["tiny", "small", "tiny", "small"] {
        assert_ok!(manager.request_load(name).await);
        assert_eq!(loader.live(), 1);
    }
    assert_eq!(loader.peak_live(), 1);
    assert_eq!(loader.opened(), 4);
    assert_eq!(loader.closed(), 3);
}

#[tokio::test]
async fn test_concurrent_load_is_rejected_while_transitioning() {
    let loader = MockLoader::new().with_open_delay(Duration::from_millis(200));
    let (_dir, manager) = manager(loader.clone());

    let first = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.request_load("tiny").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = manager.request_load("small").await.unwrap_err();
    assert!(matches!(err, ModelError::TransitionInProgress));
    let err = manager.request_unload().await.unwrap_err();
    assert!(matches!(err, ModelError::TransitionInProgress));

    first.await.unwrap().unwrap();
    assert_eq!(manager.status().model.unwrap().as_str(), "tiny");
    assert_eq!(loader.peak_live(), 1);
}

#[tokio::test]
async fn test_completion_while_loading_is_not_ready() {
    let loader = MockLoader::new().with_open_delay(Duration::from_millis(200));
    let (_dir, manager) = manager(loader);

    let load = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.request_load("tiny").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(manager.state(), LifecycleState::Loading);
    assert_eq!(manager.status().loading.unwrap().as_str(), "tiny");
    let err = manager.request_completion("Hello", 4).await.unwrap_err();
    assert!(matches!(err, ModelError::NotReady { state: LifecycleState::Loading }));

    load.await.unwrap().unwrap();
    assert!(manager.request_completion("Hello", 4).await.is_ok());
}

#[tokio::test]
async fn test_concurrent_completions_without_model_fail_fast() {
    let (_dir, manager) = manager(MockLoader::new());

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let manager = manager.clone();
            tokio::spawn(async move { manager.request_completion(&format!("prompt {i}"), 8).await })
        })
        .collect();
    let results = tokio::time::timeout(Duration::from_secs(2), async {
        let mut results = Vec::with_capacity(tasks.len());
        for task in tasks {
            results.push(task.await.unwrap());
        }
        results
    })
    .await
    .expect("completions without a model must not block");

    assert_eq!(results.len(), 8);
    for result in results {
        let err = assert_err!(result);
        assert!(matches!(err, ModelError::NotReady { state: LifecycleState::Unloaded }));
    }
}

#[tokio::test]
async fn test_abandoned_load_still_completes() {
    let loader = MockLoader::new().with_open_delay(Duration::from_millis(400));
    let (_dir, manager) = manager(loader.clone());

    let caller = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.request_load("tiny").await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    caller.abort();
    assert!(caller.await.unwrap_err().is_cancelled());

    // The load keeps running after its caller went away.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(manager.state(), LifecycleState::Loading);
    let err = assert_err!(manager.request_load("small").await);
    assert!(matches!(err, ModelError::TransitionInProgress));

    tokio::time::sleep(Duration::from_millis(450)).await;
    let status = manager.status();
    assert_eq!(status.state, LifecycleState::Loaded);
    assert_eq!(status.model.unwrap().as_str(), "tiny");
    assert!(status.loading.is_none());
    assert_eq!(loader.opened(), 1);
    assert_eq!(loader.peak_live(), 1);

    assert_ok!(manager.request_load("small").await);
    assert_eq!(loader.peak_live(), 1);
}

#[tokio::test]
async fn test_open_failure_ends_unloaded_and_records_error() {
    let loader = MockLoader::new();
    let (_dir, manager) = manager(loader.clone());
    manager.request_load("tiny").await.unwrap();

    let err = manager.request_load("broken").await.unwrap_err();
    assert!(matches!(err, ModelError::Load(LoadError::Backend(_))));

    let status = manager.status();
    assert_eq!(status.state, LifecycleState::Unloaded);
    assert!(status.model.is_none());
    assert!(status.last_error.unwrap().contains("broken"));
    // The previous model was closed before the failed open.
    assert_eq!(loader.live(), 0);

    manager.request_load("small").await.unwrap();
    assert!(manager.status().last_error.is_none());
}

#[tokio::test]
async fn test_backend_unavailable_reported_as_load_error() {
    let loader = MockLoader::new();
    let (_dir, manager) = manager(loader.clone());
    loader.set_fail_open(true);

    let err = manager.request_load("tiny").await.unwrap_err();
    assert_eq!(err.category(), "load_error");
    assert_eq!(manager.state(), LifecycleState::Unloaded);

    loader.set_fail_open(false);
    manager.request_load("tiny").await.unwrap();
}

#[tokio::test]
async fn test_load_timeout_closes_late_handle() {
    let loader = MockLoader::new().with_open_delay(Duration::from_millis(300));
    let config = ManagerConfig {
        load_timeout: Duration::from_millis(50),
        ..Default::default()
    };
    let (_dir, manager) = manager_with(loader.clone(), config);

    let err = manager.request_load("tiny").await.unwrap_err();
    assert!(matches!(err, ModelError::Load(LoadError::Timeout(_))));
    assert_eq!(manager.state(), LifecycleState::Unloaded);

    // The orphaned open still holds the transition lock.
    let err = manager.request_load("small").await.unwrap_err();
    assert!(matches!(err, ModelError::TransitionInProgress));

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(loader.opened(), 1);
    assert_eq!(loader.closed(), 1);
    assert_eq!(loader.live(), 0);
    assert_eq!(manager.state(), LifecycleState::Unloaded);
}

#[tokio::test]
async fn test_parallel_completions_share_one_handle() {
    let loader = MockLoader::new().with_generate_delay(Duration::from_millis(50));
    let (_dir, manager) = manager(loader.clone());
    manager.request_load("tiny").await.unwrap();

    let tasks: Vec<_> = (0..4)
        .map(|i| {
            let manager = manager.clone();
            tokio::spawn(async move { manager.request_completion(&format!("prompt {i}"), 8).await })
        })
        .collect();
    for task in tasks {
        let completion = task.await.unwrap().unwrap();
        assert_eq!(completion.model.as_str(), "tiny");
    }
    assert_eq!(loader.generations(), 4);
    assert_eq!(loader.peak_live(), 1);
}

#[tokio::test]
async fn test_unload_waits_for_in_flight_generation() {
    let loader = MockLoader::new().with_generate_delay(Duration::from_millis(200));
    let (_dir, manager) = manager(loader.clone());
    manager.request_load("tiny").await.unwrap();

    let completion = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.request_completion("Hello", 8).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    manager.request_unload().await.unwrap();
    assert_eq!(loader.live(), 0);

    match completion.await.unwrap() {
        Ok(c) => assert!(!c.text.is_empty()),
        Err(ModelError::NotReady { .. }) => {}
        Err(other) => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_shutdown_closes_loaded_model() {
    let loader = MockLoader::new();
    let (_dir, manager) = manager(loader.clone());
    manager.request_load("small").await.unwrap();

    let closed = manager.shutdown().await;
    assert_eq!(closed.unwrap().as_str(), "small");
    assert_eq!(loader.live(), 0);
    assert!(manager.shutdown().await.is_none());
}

#[tokio::test]
async fn test_store_operations_ignore_lifecycle_state() {
    let loader = MockLoader::new();
    let (dir, manager) = manager(loader);
    manager.request_load("tiny").await.unwrap();

    let source = dir.path().join("incoming.bin");
    std::fs::write(&source, b"weights").unwrap();
    manager.request_download(source, "fresh").await.unwrap();

    let names = manager.request_list().await.unwrap();
    assert!(names.iter().any(|n| n.as_str() == "fresh"));
    assert_eq!(manager.state(), LifecycleState::Loaded);
}
