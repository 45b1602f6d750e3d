use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::{Form, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::auth::PASSWORD_COOKIE;
use crate::api::response::{ApiError, JSend};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub short_ids: u64,
    pub status: String,
    pub version: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordForm {
    #[serde(default)]
    pub p: String,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn health(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<HealthResponse>>, ApiError> {
    let short_ids = state
        .store
        .count()
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok(JSend::success(HealthResponse {
        short_ids,
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

/// Store the submitted password in a cookie and return to the index.
/// Route: POST /pwd
pub async fn set_password_cookie(
    State(state): State<Arc<AppState>>,
    Form(form): Form<PasswordForm>,
) -> impl IntoResponse {
    let secure = state
        .config
        .base_url
        .as_deref()
        .is_some_and(|u| u.starts_with("https://"));

    let mut cookie = format!(
        "{PASSWORD_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax",
        urlencoding::encode(&form.p)
    );
    if secure {
        cookie.push_str("; Secure");
    }

    (
        StatusCode::SEE_OTHER,
        [(header::SET_COOKIE, cookie), (header::LOCATION, "/".to_string())],
    )
}
