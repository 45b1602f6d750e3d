//! Shared test helpers for tgstate handler tests.

use std::sync::Arc;
use std::time::Duration;

use crate::assembler::ChunkRetry;
use crate::config::{Config, NodeConfig, TelegramConfig, UploadMode};
use crate::gateway::{BackendGateway, ContentFetcher, MemoryGateway};
use crate::storage::ShortIdStore;
use crate::AppState;

pub fn test_config(temp_dir: &tempfile::TempDir) -> Config {
    Config {
        node: NodeConfig {
            bind_address: "127.0.0.1:0".to_string(),
            data_dir: temp_dir.path().join("data").to_string_lossy().to_string(),
        },
        telegram: TelegramConfig {
            bot_token: "test-token".to_string(),
            target: "@test".to_string(),
            ..Default::default()
        },
        base_url: Some("https://files.example.com".to_string()),
        password: None,
        mode: UploadMode::Drive,
        max_upload_size: 1024 * 1024, // 1MB for tests
        chunk_retry: ChunkRetry {
            attempts: 3,
            backoff_unit: Duration::from_millis(1),
        },
    }
}

/// Create a test AppState backed by a temporary store and an in-memory gateway.
pub fn test_state(temp_dir: &tempfile::TempDir) -> (Arc<AppState>, Arc<MemoryGateway>) {
    test_state_with(temp_dir, |_| {})
}

/// Like [`test_state`], letting the caller adjust the config first.
pub fn test_state_with(
    temp_dir: &tempfile::TempDir,
    configure: impl FnOnce(&mut Config),
) -> (Arc<AppState>, Arc<MemoryGateway>) {
    let mut config = test_config(temp_dir);
    configure(&mut config);

    let store = ShortIdStore::open(&config.node.data_dir).expect("Failed to open test store");
    let gateway = Arc::new(MemoryGateway::new());
    let backend: Arc<dyn BackendGateway> = gateway.clone();
    let fetcher: Arc<dyn ContentFetcher> = gateway.clone();

    let state = Arc::new(AppState::new(config, store, backend, fetcher));

    (state, gateway)
}
