//! Helpers shared by handler tests.

use crate::{
    Application,
    config::{Config, StorageBackend},
    storage::{InMemoryObjectStore, ObjectStore},
};
use axum_test::TestServer;
use std::sync::Arc;

pub const TEST_BUCKET: &str = "uploads";

/// Memory backend with `uploads` as the default bucket and `incoming` as key prefix
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.storage.backend = StorageBackend::Memory;
    config.storage.bucket = TEST_BUCKET.to_string();
    config.storage.key_prefix = "incoming".to_string();
    config
}

/// App over a fresh memory store in which the default bucket already exists
pub async fn create_test_app() -> (TestServer, Arc<InMemoryObjectStore>) {
    let store = Arc::new(InMemoryObjectStore::new());
    store
        .create_bucket(TEST_BUCKET)
        .await
        .expect("Failed to create test bucket");
    let server = create_test_app_with_store(test_config(), store.clone());
    (server, store)
}

pub fn create_test_app_with_store(config: Config, store: Arc<dyn ObjectStore>) -> TestServer {
    Application::new_with_store(config, store)
        .expect("Failed to build test application")
        .into_test_server()
}

/// App with the backend built from `config`, as in production
pub fn create_test_app_with_config(config: Config) -> TestServer {
    Application::new(config)
        .expect("Failed to build test application")
        .into_test_server()
}
