//! In-memory backend for development and tests.
//!
//! Serves fixture objects under `memory://<file_ref>` URLs and can be told to
//! fail URL resolution or expire content, so the retrieval pipeline can be
//! driven deterministically without a network. Bot updates are queued by hand
//! and replies recorded.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use super::{
    BackendGateway, BotChannel, BotUpdate, ChatMessage, ContentFetcher, FetchError,
    FetchedContent, GatewayError, UploadedFile,
};

const URL_SCHEME: &str = "memory://";

/// Bodies are handed out in slices this small to exercise stream boundaries.
const SLICE_LEN: usize = 4;

/// A caption edit recorded by [`MemoryGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caption {
    pub chat_ref: i64,
    pub msg_ref: i64,
    pub text: String,
}

/// A bot reply recorded by [`MemoryGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotReply {
    pub chat_id: i64,
    pub reply_to: i64,
    pub text: String,
}

struct MemoryObject {
    content: Bytes,
    content_type: Option<String>,
    expired: bool,
}

#[derive(Default)]
struct Inner {
    objects: HashMap<String, MemoryObject>,
    url_failures: HashMap<String, u32>,
    url_attempts: HashMap<String, u32>,
    captions: Vec<Caption>,
    uploads: u64,
    updates: VecDeque<BotUpdate>,
    next_update_id: i64,
    replies: Vec<BotReply>,
}

#[derive(Default)]
pub struct MemoryGateway {
    inner: Mutex<Inner>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store `content` under `file_ref` with no reported content type.
    pub fn insert(&self, file_ref: &str, content: impl Into<Bytes>) {
        self.insert_object(file_ref, content.into(), None);
    }

    /// Store `content` under `file_ref`, reporting `content_type` when fetched.
    pub fn insert_with_type(&self, file_ref: &str, content: impl Into<Bytes>, content_type: &str) {
        self.insert_object(file_ref, content.into(), Some(content_type.to_string()));
    }

    fn insert_object(&self, file_ref: &str, content: Bytes, content_type: Option<String>) {
        self.lock().objects.insert(
            file_ref.to_string(),
            MemoryObject {
                content,
                content_type,
                expired: false,
            },
        );
    }

    /// Make fetches of `file_ref` answer 404, like content Telegram no longer serves.
    pub fn expire(&self, file_ref: &str) {
        if let Some(object) = self.lock().objects.get_mut(file_ref) {
            object.expired = true;
        }
    }

    /// Fail the next `times` URL resolutions for `file_ref`.
    pub fn fail_url_lookups(&self, file_ref: &str, times: u32) {
        self.lock().url_failures.insert(file_ref.to_string(), times);
    }

    /// How many times a download URL was requested for `file_ref`.
    pub fn url_attempts(&self, file_ref: &str) -> u32 {
        self.lock().url_attempts.get(file_ref).copied().unwrap_or(0)
    }

    pub fn captions(&self) -> Vec<Caption> {
        self.lock().captions.clone()
    }

    pub fn content(&self, file_ref: &str) -> Option<Bytes> {
        self.lock().objects.get(file_ref).map(|o| o.content.clone())
    }

    /// Queue an incoming chat message for the next poll. Returns its update id.
    pub fn push_message(&self, message: ChatMessage) -> i64 {
        let mut inner = self.lock();
        inner.next_update_id += 1;
        let update_id = inner.next_update_id;
        inner.updates.push_back(BotUpdate {
            update_id,
            message: Some(message),
        });
        update_id
    }

    pub fn replies(&self) -> Vec<BotReply> {
        self.lock().replies.clone()
    }
}

#[async_trait]
impl BackendGateway for MemoryGateway {
    async fn upload(&self, name: &str, content: Bytes) -> Result<UploadedFile, GatewayError> {
        let msg_ref = {
            let mut inner = self.lock();
            inner.uploads += 1;
            inner.uploads as i64
        };
        let file_ref = format!("file-{msg_ref}");
        tracing::debug!(name = %name, file_ref = %file_ref, "Stored upload in memory");
        self.insert(&file_ref, content);

        Ok(UploadedFile {
            file_ref,
            chat_ref: 1,
            msg_ref,
        })
    }

    async fn download_url(&self, file_ref: &str) -> Option<String> {
        let mut inner = self.lock();
        *inner.url_attempts.entry(file_ref.to_string()).or_default() += 1;

        if let Some(remaining) = inner.url_failures.get_mut(file_ref) {
            if *remaining > 0 {
                *remaining -= 1;
                return None;
            }
        }

        inner
            .objects
            .contains_key(file_ref)
            .then(|| format!("{URL_SCHEME}{file_ref}"))
    }

    async fn edit_caption(
        &self,
        chat_ref: i64,
        msg_ref: i64,
        text: &str,
    ) -> Result<(), GatewayError> {
        self.lock().captions.push(Caption {
            chat_ref,
            msg_ref,
            text: text.to_string(),
        });
        Ok(())
    }
}

#[async_trait]
impl ContentFetcher for MemoryGateway {
    async fn fetch(&self, url: &str) -> Result<FetchedContent, FetchError> {
        let file_ref = url
            .strip_prefix(URL_SCHEME)
            .ok_or_else(|| FetchError::Unavailable(url.to_string()))?;

        let inner = self.lock();
        let object = inner
            .objects
            .get(file_ref)
            .ok_or_else(|| FetchError::Unavailable(url.to_string()))?;

        if object.expired {
            return Ok(FetchedContent {
                status: StatusCode::NOT_FOUND,
                content_type: Some("application/json".to_string()),
                body: Box::pin(futures::stream::empty()),
            });
        }

        let content = object.content.clone();
        let slices: Vec<Result<Bytes, std::io::Error>> = (0..content.len())
            .step_by(SLICE_LEN)
            .map(|start| Ok(content.slice(start..(start + SLICE_LEN).min(content.len()))))
            .collect();

        Ok(FetchedContent {
            status: StatusCode::OK,
            content_type: object.content_type.clone(),
            body: Box::pin(futures::stream::iter(slices)),
        })
    }
}

#[async_trait]
impl BotChannel for MemoryGateway {
    async fn updates(
        &self,
        offset: i64,
        _timeout_secs: u64,
    ) -> Result<Vec<BotUpdate>, GatewayError> {
        let mut inner = self.lock();
        // Like getUpdates, asking from an offset confirms everything before it
        inner.updates.retain(|u| u.update_id >= offset);
        Ok(inner.updates.iter().cloned().collect())
    }

    async fn reply(&self, chat_id: i64, reply_to: i64, text: &str) -> Result<(), GatewayError> {
        self.lock().replies.push(BotReply {
            chat_id,
            reply_to,
            text: text.to_string(),
        });
        Ok(())
    }
}
