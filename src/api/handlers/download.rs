use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use std::sync::Arc;

use crate::api::response::ApiError;
use crate::storage::is_valid_short_id;
use crate::AppState;

/// Stream the content behind a short ID.
/// Route: GET /d/:short_id
///
/// Chunked blobs are reassembled on the fly. Failures after the headers are
/// sent can only abort the body.
pub async fn serve_short(
    State(state): State<Arc<AppState>>,
    Path(short_id): Path<String>,
) -> Result<Response, ApiError> {
    if !is_valid_short_id(&short_id) {
        return Err(ApiError::not_found("Invalid ID"));
    }

    let retrieval = state.assembler.retrieve(&short_id).await.map_err(|e| {
        if e.is_not_found() {
            tracing::debug!(short_id = %short_id, error = %e, "Short ID not served");
        } else {
            tracing::error!(short_id = %short_id, error = %e, "Failed to retrieve content");
        }
        ApiError::from(e)
    })?;

    let mut response = Response::new(Body::from_stream(retrieval.body));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();

    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&retrieval.content_type)
            .unwrap_or(HeaderValue::from_static("application/octet-stream")),
    );

    match HeaderValue::from_str(&retrieval.disposition.header_value()) {
        Ok(value) => {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
        Err(_) => {
            headers.insert(
                header::CONTENT_DISPOSITION,
                HeaderValue::from_static("attachment"),
            );
        }
    }

    // Absent for unsized content so the body can stream without a length
    if let Some(length) = retrieval.content_length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    }

    Ok(response)
}
