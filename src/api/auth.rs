//! Password guard for the upload API.
//!
//! A request passes when the `p` cookie or the `pass` query parameter matches
//! the configured password. Without a configured password everything passes.

use axum::extract::{Query, Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use std::sync::Arc;

use super::response::UploadError;
use crate::AppState;

pub const PASSWORD_COOKIE: &str = "p";

#[derive(Debug, Deserialize)]
pub struct PasswordQuery {
    #[serde(default)]
    pub pass: Option<String>,
}

pub async fn require_password(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PasswordQuery>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.config.password.as_deref() else {
        return next.run(request).await;
    };

    let by_cookie = cookie_value(request.headers(), PASSWORD_COOKIE)
        .and_then(|v| urlencoding::decode(v).ok())
        .is_some_and(|v| v == expected);
    let by_param = query.pass.as_deref() == Some(expected);

    if by_cookie || by_param {
        return next.run(request).await;
    }

    tracing::debug!(path = %request.uri().path(), "Rejected upload API request without password");
    UploadError::unauthorized("Unauthorized: invalid or missing password").into_response()
}

/// Find a cookie by name across all `Cookie` headers. The value is returned
/// as sent, still percent-encoded.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}
