//! tgstate - short public links for files stored on Telegram
//!
//! This crate provides:
//! - A redb-backed store mapping 6-character short IDs to Telegram file references
//! - A retrieval pipeline that streams content back, reassembling chunked blobs
//!   from their manifests
//! - A Telegram Bot API gateway and an in-memory stand-in for tests
//! - An HTTP surface for downloads and password-protected uploads
//! - A chat bot that answers file messages with their public links

pub mod api;
pub mod assembler;
pub mod bot;
pub mod config;
pub mod gateway;
pub mod storage;
#[cfg(test)]
pub mod testutil;

use std::sync::Arc;

use assembler::BlobAssembler;
use config::Config;
use gateway::{BackendGateway, ContentFetcher};
use storage::ShortIdStore;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub store: ShortIdStore,
    pub gateway: Arc<dyn BackendGateway>,
    pub assembler: BlobAssembler,
}

impl AppState {
    pub fn new(
        config: Config,
        store: ShortIdStore,
        gateway: Arc<dyn BackendGateway>,
        fetcher: Arc<dyn ContentFetcher>,
    ) -> Self {
        let assembler = BlobAssembler::new(
            store.clone(),
            Arc::clone(&gateway),
            fetcher,
            config.chunk_retry,
        );

        Self {
            config,
            store,
            gateway,
            assembler,
        }
    }
}
