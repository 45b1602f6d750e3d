use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{
    BackendGateway, BotChannel, BotUpdate, ChatMessage, GatewayError, MessageMedia, UploadedFile,
};

/// Telegram Bot API backend.
pub struct TelegramGateway {
    api_base: String,
    chat_id: String,
    client: Client,
    token: String,
}

#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<Message>,
    #[serde(default)]
    channel_post: Option<Message>,
}

#[derive(Deserialize)]
struct Message {
    message_id: i64,
    #[serde(default)]
    chat: Option<Chat>,
    #[serde(default)]
    from: Option<User>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    reply_to_message: Option<Box<Message>>,
    #[serde(default)]
    document: Option<FileObject>,
    #[serde(default)]
    audio: Option<FileObject>,
    #[serde(default)]
    video: Option<FileObject>,
    #[serde(default)]
    sticker: Option<FileObject>,
    #[serde(default)]
    photo: Option<Vec<FileObject>>,
}

#[derive(Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Deserialize)]
struct User {
    id: i64,
}

#[derive(Deserialize)]
struct FileObject {
    file_id: String,
}

#[derive(Deserialize)]
struct TelegramFile {
    #[serde(default)]
    file_path: Option<String>,
}

fn file_id(file: Option<&FileObject>) -> Option<String> {
    file.map(|f| f.file_id.clone())
        .filter(|id| !id.is_empty())
}

impl Message {
    /// Telegram files the upload under whichever media kind it recognised.
    fn file_ref(&self) -> Option<&str> {
        self.document
            .as_ref()
            .or(self.audio.as_ref())
            .or(self.video.as_ref())
            .or(self.sticker.as_ref())
            .or_else(|| self.photo.as_ref().and_then(|sizes| sizes.last()))
            .map(|f| f.file_id.as_str())
    }

    fn into_chat_message(self) -> ChatMessage {
        let media = MessageMedia {
            document: file_id(self.document.as_ref()),
            video: file_id(self.video.as_ref()),
            sticker: file_id(self.sticker.as_ref()),
            photo: file_id(self.photo.as_ref().and_then(|sizes| sizes.last())),
        };

        ChatMessage {
            chat_id: self.chat.as_ref().map(|c| c.id).unwrap_or_default(),
            message_id: self.message_id,
            from_id: self.from.as_ref().map(|u| u.id),
            text: self.text.unwrap_or_default(),
            media,
            reply_to: self
                .reply_to_message
                .map(|m| Box::new(m.into_chat_message())),
        }
    }
}

impl Update {
    fn into_bot_update(self) -> BotUpdate {
        BotUpdate {
            update_id: self.update_id,
            message: self
                .message
                .or(self.channel_post)
                .map(Message::into_chat_message),
        }
    }
}

impl TelegramGateway {
    pub fn new(api_base: &str, token: &str, chat_id: &str) -> Result<Self, GatewayError> {
        let client = Client::builder().build()?;

        Ok(Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            chat_id: chat_id.to_string(),
            client,
            token: token.to_string(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.api_base, self.token, file_path)
    }

    /// Send a Bot API request and unwrap its `{ok, result}` envelope.
    /// Telegram reports failures with 4xx statuses *and* a JSON body, so the
    /// body is always decoded.
    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, GatewayError> {
        let resp: ApiResponse<T> = request.send().await?.json().await?;

        if !resp.ok {
            return Err(GatewayError::Api(
                resp.description
                    .unwrap_or_else(|| "request rejected".to_string()),
            ));
        }

        resp.result
            .ok_or_else(|| GatewayError::Api("response carried no result".to_string()))
    }
}

#[async_trait]
impl BackendGateway for TelegramGateway {
    async fn upload(&self, name: &str, content: Bytes) -> Result<UploadedFile, GatewayError> {
        let part = Part::bytes(content.to_vec()).file_name(name.to_string());
        let form = Form::new()
            .text("chat_id", self.chat_id.clone())
            .part("document", part);

        let message: Message = self
            .call(self.client.post(self.method_url("sendDocument")).multipart(form))
            .await?;

        let chat = message
            .chat
            .as_ref()
            .filter(|_| message.message_id != 0)
            .ok_or_else(|| {
                GatewayError::Api("response carried no message or chat id".to_string())
            })?;

        let file_ref = message.file_ref().ok_or(GatewayError::MissingFileRef)?;

        Ok(UploadedFile {
            file_ref: file_ref.to_string(),
            chat_ref: chat.id,
            msg_ref: message.message_id,
        })
    }

    async fn download_url(&self, file_ref: &str) -> Option<String> {
        let request = self
            .client
            .get(self.method_url("getFile"))
            .query(&[("file_id", file_ref)]);

        match self.call::<TelegramFile>(request).await {
            Ok(TelegramFile {
                file_path: Some(path),
            }) => {
                tracing::debug!(file_ref = %file_ref, "Resolved download URL");
                Some(self.file_url(&path))
            }
            Ok(_) => {
                tracing::warn!(file_ref = %file_ref, "getFile returned no file_path");
                None
            }
            Err(e) => {
                tracing::warn!(file_ref = %file_ref, error = %e, "Failed to resolve download URL");
                None
            }
        }
    }

    async fn edit_caption(
        &self,
        chat_ref: i64,
        msg_ref: i64,
        text: &str,
    ) -> Result<(), GatewayError> {
        let body = serde_json::json!({
            "chat_id": chat_ref,
            "message_id": msg_ref,
            "caption": text,
        });

        // Result is either the edited Message or `true`
        let _: serde_json::Value = self
            .call(
                self.client
                    .post(self.method_url("editMessageCaption"))
                    .json(&body),
            )
            .await?;

        Ok(())
    }
}

#[async_trait]
impl BotChannel for TelegramGateway {
    async fn updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> Result<Vec<BotUpdate>, GatewayError> {
        let request = self.client.get(self.method_url("getUpdates")).query(&[
            ("offset", offset.to_string()),
            ("timeout", timeout_secs.to_string()),
        ]);

        let updates: Vec<Update> = self.call(request).await?;
        Ok(updates.into_iter().map(Update::into_bot_update).collect())
    }

    async fn reply(&self, chat_id: i64, reply_to: i64, text: &str) -> Result<(), GatewayError> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "reply_to_message_id": reply_to,
        });

        let _: serde_json::Value = self
            .call(self.client.post(self.method_url("sendMessage")).json(&body))
            .await?;

        Ok(())
    }
}
