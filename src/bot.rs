//! Chat-side link registration.
//!
//! The bot long-polls for updates and answers two kinds of message with a
//! public link:
//! - `get` sent as a reply to a message carrying a file
//! - a photo or document sent directly by the target user
//!
//! When the target is a numeric user id only that user is served. When it is
//! a channel or group, `get` is open to anyone and direct uploads are ignored.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::config::relative_link;
use crate::gateway::{BotChannel, ChatMessage, GatewayError};
use crate::storage::ShortIdStore;

/// Seconds the Bot API holds a poll open when there is nothing to deliver.
pub const LONG_POLL_SECS: u64 = 60;

/// Pause after a failed poll before trying again.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

const GET_COMMAND: &str = "get";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotTarget {
    /// Uploads go to a private chat with this user.
    User(i64),
    /// Uploads go to a channel or group.
    Chat,
}

impl BotTarget {
    pub fn parse(target: &str) -> Self {
        if target.starts_with('@') {
            return BotTarget::Chat;
        }
        match target.parse::<i64>() {
            Ok(id) => BotTarget::User(id),
            Err(_) => {
                tracing::warn!(chat_target = %target, "Target is not a user id; direct uploads to the bot are ignored");
                BotTarget::Chat
            }
        }
    }

    fn allows(&self, message: &ChatMessage) -> bool {
        match self {
            BotTarget::User(id) => message.from_id == Some(*id),
            BotTarget::Chat => true,
        }
    }
}

pub struct LinkBot {
    store: ShortIdStore,
    channel: Arc<dyn BotChannel>,
    target: BotTarget,
    base_url: Option<String>,
}

impl LinkBot {
    pub fn new(
        store: ShortIdStore,
        channel: Arc<dyn BotChannel>,
        target: &str,
        base_url: Option<String>,
    ) -> Self {
        Self {
            store,
            channel,
            target: BotTarget::parse(target),
            base_url,
        }
    }

    /// Poll until the shutdown signal is received.
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) {
        tracing::info!(chat_target = ?self.target, "Link bot listening for updates");
        let mut offset = 0;

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let delay = tokio::select! {
                polled = self.poll_once(offset) => match polled {
                    Ok(next) => {
                        offset = next;
                        None
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to poll bot updates");
                        Some(POLL_RETRY_DELAY)
                    }
                },
                _ = shutdown_rx.changed() => break,
            };

            if let Some(delay) = delay {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown_rx.changed() => break,
                }
            }
        }

        tracing::info!("Link bot stopped");
    }

    /// Fetch one batch of updates and answer them. Returns the next offset.
    pub async fn poll_once(&self, offset: i64) -> Result<i64, GatewayError> {
        let updates = self.channel.updates(offset, LONG_POLL_SECS).await?;

        let mut next = offset;
        for update in updates {
            next = next.max(update.update_id + 1);
            let Some(message) = update.message else {
                continue;
            };
            let Some(text) = self.handle(&message) else {
                continue;
            };
            if let Err(e) = self
                .channel
                .reply(message.chat_id, message.message_id, &text)
                .await
            {
                tracing::warn!(chat_id = message.chat_id, error = %e, "Failed to send bot reply");
            }
        }

        Ok(next)
    }

    /// Register the file a message points at and build the reply text.
    /// `None` when the message is not for the bot.
    pub fn handle(&self, message: &ChatMessage) -> Option<String> {
        if message.text == GET_COMMAND {
            if let Some(replied) = message.reply_to.as_deref() {
                return self.handle_get(message, replied);
            }
        }

        let media = &message.media;
        if (media.photo.is_some() || media.document.is_some()) && !message.text.starts_with('/') {
            return self.handle_direct(message);
        }

        None
    }

    fn handle_get(&self, message: &ChatMessage, replied: &ChatMessage) -> Option<String> {
        let media = &replied.media;
        let file_ref = media
            .document
            .as_ref()
            .or(media.video.as_ref())
            .or(media.sticker.as_ref())
            .or(media.photo.as_ref())?;

        if !self.target.allows(message) {
            tracing::info!(from = ?message.from_id, "Ignoring get from a user other than the target");
            return None;
        }

        let reply = match self.store.generate_and_save(file_ref) {
            Ok(short_id) => match &self.base_url {
                Some(base) => format!("{base}{}", relative_link(&short_id)),
                None => format!("{} (set URL to get a full link)", relative_link(&short_id)),
            },
            Err(e) => {
                tracing::error!(file_ref = %file_ref, error = %e, "Failed to create short ID for get");
                "Failed to create short link".to_string()
            }
        };
        Some(reply)
    }

    fn handle_direct(&self, message: &ChatMessage) -> Option<String> {
        if !matches!(self.target, BotTarget::User(_)) || !self.target.allows(message) {
            tracing::info!(
                chat_id = message.chat_id,
                from = ?message.from_id,
                "Ignoring direct upload outside the target user chat"
            );
            return None;
        }

        let media = &message.media;
        let file_ref = media.photo.as_ref().or(media.document.as_ref())?;
        tracing::info!(file_ref = %file_ref, "Received file from target user");

        let reply = match self.store.generate_and_save(file_ref) {
            Ok(short_id) => match &self.base_url {
                Some(base) => format!("{base}{}", relative_link(&short_id)),
                None => format!(
                    "Saved, but URL is not set so no full link can be built.\nShortID: {}",
                    relative_link(&short_id)
                ),
            },
            Err(e) => {
                tracing::error!(file_ref = %file_ref, error = %e, "Failed to create short ID for bot upload");
                "Failed to process file, no short link was created.".to_string()
            }
        };
        Some(reply)
    }
}
