use axum::extract::{Multipart, State};
use axum::Json;
use bytes::Bytes;
use std::sync::Arc;

use crate::api::response::{UploadError, UploadReply};
use crate::config::{relative_link, UploadMode};
use crate::gateway::GatewayError;
use crate::AppState;

/// Multipart field carrying the file.
const FILE_FIELD: &str = "image";

/// Upload a file to Telegram and hand back its short link.
/// Route: POST /api
///
/// The reply is final once the short ID is registered. Embedding the link in
/// the Telegram caption happens afterwards and never affects the outcome.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadReply>, UploadError> {
    let limit = state.config.upload_limit();
    let mut upload: Option<(String, Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::bad_request(format!("Invalid multipart data: {e}")))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or("file").to_string();
        let data = field.bytes().await.map_err(|e| {
            UploadError::payload_too_large(format!("Unable to read file: {e}"))
        })?;
        upload = Some((file_name, data));
        break;
    }

    let (file_name, data) = upload.ok_or_else(|| UploadError::bad_request("Unable to get file"))?;

    if data.len() as u64 > limit {
        return Err(UploadError::payload_too_large(format!(
            "File size exceeds {} MB limit",
            limit / (1024 * 1024)
        )));
    }

    if state.config.mode == UploadMode::Images && !has_image_extension(&file_name) {
        return Err(UploadError::bad_request(
            "Invalid file type. Only images and common video formats are allowed.",
        ));
    }

    let uploaded = state
        .gateway
        .upload(&file_name, data)
        .await
        .map_err(|e| {
            tracing::error!(file_name = %file_name, error = %e, "Failed to upload file to Telegram");
            UploadError::internal(upload_failure_message(&e))
        })?;

    if uploaded.file_ref.is_empty() {
        tracing::error!(file_name = %file_name, "Telegram returned an empty file reference");
        return Err(UploadError::internal(
            "Failed to get file ID from Telegram after upload",
        ));
    }

    let short_id = state
        .store
        .generate_and_save(&uploaded.file_ref)
        .map_err(|e| {
            tracing::error!(file_ref = %uploaded.file_ref, error = %e, "Failed to create short ID");
            UploadError::internal("Failed to create short ID")
        })?;

    let url = match state.config.public_link(&short_id) {
        Ok(link) => {
            if uploaded.chat_ref != 0 && uploaded.msg_ref != 0 {
                spawn_caption_edit(&state, uploaded.chat_ref, uploaded.msg_ref, link.clone());
            }
            link
        }
        Err(e) => {
            tracing::warn!(short_id = %short_id, error = %e, "Skipping caption edit");
            String::new()
        }
    };

    tracing::info!(short_id = %short_id, file_ref = %uploaded.file_ref, "Uploaded file");
    Ok(UploadReply::success(relative_link(&short_id), url))
}

fn spawn_caption_edit(state: &AppState, chat_ref: i64, msg_ref: i64, link: String) {
    let gateway = Arc::clone(&state.gateway);
    tokio::spawn(async move {
        match gateway.edit_caption(chat_ref, msg_ref, &link).await {
            Ok(()) => tracing::debug!(chat_ref, msg_ref, "Edited caption"),
            Err(e) => {
                tracing::warn!(chat_ref, msg_ref, error = %e, "Failed to edit caption")
            }
        }
    });
}

fn has_image_extension(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    UploadMode::IMAGE_EXTENSIONS
        .iter()
        .any(|ext| lower.ends_with(ext))
}

fn upload_failure_message(e: &GatewayError) -> &'static str {
    let text = e.to_string();
    if text.contains("wrong file identifier") {
        "Telegram error: Invalid file identifier or file too big."
    } else if text.contains("timeout") || text.contains("timed out") {
        "Telegram timeout during upload."
    } else {
        "Failed to upload file to Telegram"
    }
}
