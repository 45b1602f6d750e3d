mod http;
mod memory;
mod telegram;

pub use http::HttpFetcher;
pub use memory::{BotReply, Caption, MemoryGateway};
pub use telegram::TelegramGateway;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use reqwest::StatusCode;
use std::pin::Pin;
use thiserror::Error;

/// Streamed body of a fetched backend object.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),
    #[error("Telegram API error: {0}")]
    Api(String),
    #[error("Telegram response carried no file reference")]
    MissingFileRef,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),
    #[error("Content unavailable: {0}")]
    Unavailable(String),
}

// Bot API and file URLs embed the bot token, so it is stripped before the
// error can reach a log line.
impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        GatewayError::Http(e.without_url())
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Http(e.without_url())
    }
}

/// Where an upload landed on the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_ref: String,
    pub chat_ref: i64,
    pub msg_ref: i64,
}

/// Abstraction over the chat platform that actually holds the bytes.
/// File references are opaque; download URLs are short-lived.
#[async_trait]
pub trait BackendGateway: Send + Sync {
    async fn upload(&self, name: &str, content: Bytes) -> Result<UploadedFile, GatewayError>;
    /// Resolve a file reference to a signed download URL. `None` on any failure.
    async fn download_url(&self, file_ref: &str) -> Option<String>;
    async fn edit_caption(&self, chat_ref: i64, msg_ref: i64, text: &str)
        -> Result<(), GatewayError>;
}

/// Response of a fetched download URL, before its body is consumed.
pub struct FetchedContent {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: ByteStream,
}

/// Streams the bytes behind a download URL.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedContent, FetchError>;
}

/// A chat message seen by the bot, reduced to what link registration needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatMessage {
    pub chat_id: i64,
    pub message_id: i64,
    /// Sending user. Absent for channel posts.
    pub from_id: Option<i64>,
    pub text: String,
    pub media: MessageMedia,
    pub reply_to: Option<Box<ChatMessage>>,
}

/// File references attached to a message, by media kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageMedia {
    pub document: Option<String>,
    pub video: Option<String>,
    pub sticker: Option<String>,
    /// Largest size of a photo.
    pub photo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotUpdate {
    pub update_id: i64,
    /// A direct message or a channel post. `None` for update kinds the bot ignores.
    pub message: Option<ChatMessage>,
}

/// Incoming chat traffic for the link bot.
#[async_trait]
pub trait BotChannel: Send + Sync {
    /// Long-poll for updates with an id of at least `offset`.
    async fn updates(&self, offset: i64, timeout_secs: u64)
        -> Result<Vec<BotUpdate>, GatewayError>;
    async fn reply(&self, chat_id: i64, reply_to: i64, text: &str) -> Result<(), GatewayError>;
}
