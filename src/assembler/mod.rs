//! Short ID -> bytes retrieval, including reassembly of chunked blobs.
//!
//! Every object is probed for [`BLOB_MAGIC`]. Plain objects are streamed
//! through as-is; manifests are parsed and their chunks streamed back to back
//! in manifest order.
//!
//! Once a [`Retrieval`] is handed to the caller its headers are final. A chunk
//! that cannot be resolved or fetched afterwards surfaces as an error item in
//! the body stream, which aborts the response mid-flight.

mod manifest;
mod peek;
mod sniff;

pub use manifest::{BlobManifest, ManifestError, BLOB_MAGIC, MAGIC_LEN};
pub use peek::PeekedStream;
pub use sniff::{is_specific, sniff_content_type, OCTET_STREAM};

use async_stream::try_stream;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use reqwest::StatusCode;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::gateway::{BackendGateway, ByteStream, ContentFetcher};
use crate::storage::{DatabaseError, ShortIdStore};

/// Manifests are small; anything larger is not one we wrote.
pub const MAX_MANIFEST_LEN: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Short ID not found: {0}")]
    NotFound(String),
    #[error("Content expired or unavailable on the backend: {0}")]
    Expired(String),
    #[error("Backend unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("Malformed blob manifest: {0}")]
    DataCorruption(#[from] ManifestError),
    #[error("Chunk {0} has no registered file reference")]
    ChunkUnresolvable(String),
    #[error("Failed to fetch chunk {short_id}: {reason}")]
    ChunkFetchFailed { short_id: String, reason: String },
    #[error("Store error: {0}")]
    Store(#[from] DatabaseError),
}

impl RetrievalError {
    /// Whether the caller should see this as a missing resource rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RetrievalError::NotFound(_) | RetrievalError::Expired(_))
    }
}

/// Retry policy for resolving chunk download URLs.
///
/// Before the n-th retry the pipeline waits `n * 2` backoff units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRetry {
    pub attempts: u32,
    pub backoff_unit: Duration,
}

impl Default for ChunkRetry {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

impl ChunkRetry {
    pub fn delay_before(&self, retry: u32) -> Duration {
        self.backoff_unit * retry * 2
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Inline,
    Attachment { filename: String },
}

impl Disposition {
    pub fn header_value(&self) -> String {
        match self {
            Disposition::Inline => "inline".to_string(),
            Disposition::Attachment { filename } => {
                format!("attachment; filename=\"{}\"", quote_filename(filename))
            }
        }
    }
}

/// A resolved object, ready to be written as a response.
pub struct Retrieval {
    pub content_type: String,
    pub disposition: Disposition,
    /// Set only when a manifest declared the total size.
    pub content_length: Option<u64>,
    pub body: ByteStream,
}

impl fmt::Debug for Retrieval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retrieval")
            .field("content_type", &self.content_type)
            .field("disposition", &self.disposition)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct BlobAssembler {
    store: ShortIdStore,
    gateway: Arc<dyn BackendGateway>,
    fetcher: Arc<dyn ContentFetcher>,
    retry: ChunkRetry,
}

impl BlobAssembler {
    pub fn new(
        store: ShortIdStore,
        gateway: Arc<dyn BackendGateway>,
        fetcher: Arc<dyn ContentFetcher>,
        retry: ChunkRetry,
    ) -> Self {
        Self {
            store,
            gateway,
            fetcher,
            retry,
        }
    }

    /// Resolve `short_id` and open its content.
    pub async fn retrieve(&self, short_id: &str) -> Result<Retrieval, RetrievalError> {
        let file_ref = self
            .store
            .lookup(short_id)?
            .ok_or_else(|| RetrievalError::NotFound(short_id.to_string()))?;

        let url = self.gateway.download_url(&file_ref).await.ok_or_else(|| {
            RetrievalError::UpstreamUnavailable(format!("no download URL for {file_ref}"))
        })?;

        let fetched = self
            .fetcher
            .fetch(&url)
            .await
            .map_err(|e| RetrievalError::UpstreamUnavailable(e.to_string()))?;

        if fetched.status == StatusCode::NOT_FOUND {
            return Err(RetrievalError::Expired(file_ref));
        }
        if !fetched.status.is_success() {
            return Err(RetrievalError::UpstreamUnavailable(format!(
                "backend returned {} for {file_ref}",
                fetched.status
            )));
        }
        // Telegram answers some failures with an HTML page and a 200
        if fetched
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.contains("text/html"))
        {
            tracing::warn!(short_id = %short_id, file_ref = %file_ref, "Backend returned an HTML page");
            return Err(RetrievalError::Expired(file_ref));
        }

        let peeked = PeekedStream::peek(fetched.body, MAGIC_LEN)
            .await
            .map_err(|e| RetrievalError::UpstreamUnavailable(e.to_string()))?;

        if peeked.head() == BLOB_MAGIC.as_bytes() {
            let manifest = read_manifest(peeked.into_stream()).await?;
            tracing::info!(
                short_id = %short_id,
                filename = %manifest.filename,
                chunks = manifest.chunks.len(),
                "Reassembling chunked blob"
            );
            return Ok(self.assemble(manifest));
        }

        let content_type = fetched
            .content_type
            .filter(|ct| is_specific(ct))
            .unwrap_or_else(|| sniff_content_type(peeked.head()));

        Ok(Retrieval {
            content_type,
            disposition: Disposition::Inline,
            content_length: None,
            body: peeked.into_stream(),
        })
    }

    fn assemble(&self, manifest: BlobManifest) -> Retrieval {
        Retrieval {
            content_type: OCTET_STREAM.to_string(),
            disposition: Disposition::Attachment {
                filename: manifest.filename,
            },
            content_length: manifest.size,
            body: Box::pin(self.clone().chunk_stream(manifest.chunks)),
        }
    }

    /// Emit every chunk in order. Each chunk's body is dropped before the
    /// next one is opened.
    fn chunk_stream(
        self,
        chunks: Vec<String>,
    ) -> impl Stream<Item = std::io::Result<Bytes>> + Send + 'static {
        try_stream! {
            for chunk_id in chunks {
                let mut body = self.open_chunk(&chunk_id).await.map_err(|e| {
                    tracing::warn!(chunk = %chunk_id, error = %e, "Aborting blob response");
                    std::io::Error::other(e)
                })?;
                while let Some(bytes) = body.next().await {
                    yield bytes?;
                }
            }
        }
    }

    async fn open_chunk(&self, short_id: &str) -> Result<ByteStream, RetrievalError> {
        let file_ref = self
            .store
            .lookup(short_id)?
            .ok_or_else(|| RetrievalError::ChunkUnresolvable(short_id.to_string()))?;

        let url = self.chunk_url(short_id, &file_ref).await?;

        let fetched = self.fetcher.fetch(&url).await.map_err(|e| {
            RetrievalError::ChunkFetchFailed {
                short_id: short_id.to_string(),
                reason: e.to_string(),
            }
        })?;

        if !fetched.status.is_success() {
            return Err(RetrievalError::ChunkFetchFailed {
                short_id: short_id.to_string(),
                reason: format!("backend returned {}", fetched.status),
            });
        }

        Ok(fetched.body)
    }

    async fn chunk_url(&self, short_id: &str, file_ref: &str) -> Result<String, RetrievalError> {
        for attempt in 0..self.retry.attempts {
            if attempt > 0 {
                tracing::info!(chunk = %short_id, file_ref = %file_ref, retry = attempt, "Retrying chunk download URL");
                tokio::time::sleep(self.retry.delay_before(attempt)).await;
            }
            if let Some(url) = self.gateway.download_url(file_ref).await {
                return Ok(url);
            }
        }

        Err(RetrievalError::ChunkFetchFailed {
            short_id: short_id.to_string(),
            reason: format!("no download URL after {} attempts", self.retry.attempts),
        })
    }
}

async fn read_manifest(mut body: ByteStream) -> Result<BlobManifest, RetrievalError> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| RetrievalError::UpstreamUnavailable(e.to_string()))?;
        if buf.len() + chunk.len() > MAX_MANIFEST_LEN {
            return Err(ManifestError::TooLarge(MAX_MANIFEST_LEN).into());
        }
        buf.extend_from_slice(&chunk);
    }

    let text = std::str::from_utf8(&buf).map_err(|_| ManifestError::NotUtf8)?;
    Ok(BlobManifest::parse(text)?)
}

/// Keep a filename usable inside a quoted header parameter.
fn quote_filename(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_control())
        .flat_map(|c| match c {
            '"' | '\\' => vec!['\\', c],
            _ => vec![c],
        })
        .collect()
}
