//! HTTP routing and the submission handler.
//!
//! ## Request checks (in order)
//!
//! | Check | Failure |
//! |-------|---------|
//! | `Content-Type: application/secevent+jwt` | 415 |
//! | `Accept` admits `application/json` | 406 |
//! | API key identifies a client | 401 `authentication_failed` |
//! | Client has a registration | 403 `access_denied` |
//! | Token validates and is enqueued | 400 / 429 / 503 |
//!
//! Success is `202 Accepted` with an empty body.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use std::sync::Arc;
use tl_02_ingestion::{IngestionApi, SubmitOutcome};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

use crate::auth::ApiKeyAuthenticator;
use crate::domain::error::Rejection;
use crate::registry::ClientRegistry;

pub const SECEVENT_CONTENT_TYPE: &str = "application/secevent+jwt";

/// Application state shared across handlers
#[derive(Clone)]
pub struct GatewayState {
    pub ingestion: Arc<dyn IngestionApi>,
    pub registry: Arc<ClientRegistry>,
    pub authenticator: Arc<ApiKeyAuthenticator>,
    pub retry_after_secs: u64,
}

/// Build the router: `POST path` only; everything else is 404.
pub fn build_router(path: &str, max_body_bytes: usize, state: GatewayState) -> Router {
    Router::new()
        .route(path, post(handle_submission).fallback(not_found))
        .fallback(not_found)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn handle_submission(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match submit(&state, &headers, &body).await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(rejection) => rejection.into_response(),
    }
}

async fn submit(state: &GatewayState, headers: &HeaderMap, body: &[u8]) -> Result<(), Rejection> {
    if !has_secevent_content_type(headers) {
        return Err(Rejection::UnsupportedMediaType);
    }
    if !accepts_json(headers) {
        return Err(Rejection::NotAcceptable);
    }

    let client_id = state
        .authenticator
        .authenticate(headers)
        .ok_or(Rejection::AuthenticationFailed)?;

    let policy = match state.registry.resolve(&client_id).await {
        Some(policy) => policy,
        None => {
            warn!(client = %client_id, "No registration for authenticated client");
            return Err(Rejection::AccessDenied);
        }
    };

    match state.ingestion.submit(&client_id, body, &policy).await {
        Ok(SubmitOutcome::Accepted) => Ok(()),
        Ok(SubmitOutcome::AlreadyRecorded) => {
            debug!(client = %client_id, "Token already recorded");
            Ok(())
        }
        Err(e) => {
            let rejection = Rejection::from_ingest(&e, state.retry_after_secs);
            match rejection {
                Rejection::Internal => error!(client = %client_id, error = %e, "Submission failed"),
                _ => debug!(client = %client_id, error = %e, "Submission rejected"),
            }
            Err(rejection)
        }
    }
}

/// Media type of `value` without parameters, lowercased.
fn media_type(value: &str) -> String {
    value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn has_secevent_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| media_type(v) == SECEVENT_CONTENT_TYPE)
        .unwrap_or(false)
}

fn accepts_json(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(media_type)
        .any(|range| range == "application/json" || range == "application/*" || range == "*/*")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn with(name: header::HeaderName, value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_content_type_ignores_parameters_and_case() {
        assert!(has_secevent_content_type(&with(
            header::CONTENT_TYPE,
            "Application/SecEvent+JWT; charset=utf-8"
        )));
        assert!(!has_secevent_content_type(&with(
            header::CONTENT_TYPE,
            "application/jwt"
        )));
        assert!(!has_secevent_content_type(&HeaderMap::new()));
    }

    #[test]
    fn test_accept_ranges() {
        assert!(accepts_json(&with(header::ACCEPT, "application/json")));
        assert!(accepts_json(&with(header::ACCEPT, "text/html, application/json;q=0.9")));
        assert!(accepts_json(&with(header::ACCEPT, "*/*")));
        assert!(!accepts_json(&with(header::ACCEPT, "text/plain")));
        assert!(!accepts_json(&HeaderMap::new()));
    }
}
