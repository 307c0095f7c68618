//! HTTP routes over the registry.
//!
//! Handlers are stateless: every request reads or writes the registry and
//! nothing else.

use std::sync::Arc;

use axum::body::{to_bytes, Bytes};
use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::header::{ALLOW, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::middleware::map_response;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use kam::store::Store;
use kam::{AuthorizationRecord, RecordId, Registry, RevokeResult};
use kam_core::wire::{
    AllRecords, AuthorizeRequest, CheckRequest, CheckResponse, HealthResponse, PackageRecords,
    ResetResponse, RevokeRequest, RevokeResponse,
};
use serde::de::DeserializeOwned;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::error::ApiError;

/// Shared handler state.
pub struct AppState<S: Store> {
    pub registry: Arc<Registry<S>>,
}

impl<S: Store> AppState<S> {
    pub fn new(registry: Registry<S>) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }
}

impl<S: Store> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

pub fn router<S: Store + 'static>(state: AppState<S>, config: &ServerConfig) -> Router {
    Router::new()
        .route("/authorize", post(authorize::<S>))
        .route("/revoke", post(revoke::<S>))
        .route("/check", get(check_query::<S>).post(check_body::<S>))
        .route("/packages/:package_name", get(list_package::<S>))
        .route("/records/:record_id", get(get_record::<S>))
        .route("/all", get(list_all::<S>))
        .route("/health", get(health::<S>))
        .route("/admin/reset", post(reset::<S>))
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(map_response(structured_errors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve<S: Store + 'static>(
    listener: tokio::net::TcpListener,
    state: AppState<S>,
    config: &ServerConfig,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    axum::serve(listener, router(state, config))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Error bodies the HTTP layer produces are plain text or empty; give
/// them the `{error, message}` shape the handlers use.
async fn structured_errors(response: Response) -> Response {
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) || is_json(&response) {
        return response;
    }

    let (parts, body) = response.into_parts();
    let message = match to_bytes(body, MAX_ERROR_TEXT).await {
        Ok(text) if !text.is_empty() => String::from_utf8_lossy(&text).into_owned(),
        _ => status.canonical_reason().unwrap_or("request failed").to_string(),
    };

    let mut rewritten = ApiError::from_status(status, message).into_response();
    if let Some(allow) = parts.headers.get(ALLOW) {
        rewritten.headers_mut().insert(ALLOW, allow.clone());
    }
    rewritten
}

const MAX_ERROR_TEXT: usize = 4096;

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"))
}

fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError::validation(format!("invalid JSON body: {}", e)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Mutations
// ─────────────────────────────────────────────────────────────────────────────

async fn authorize<S: Store + 'static>(
    State(state): State<AppState<S>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let req: AuthorizeRequest = parse_json(&body)?;
    let record = state
        .registry
        .grant(&req.package_name, &req.identity, req.ttl_seconds)
        .await?;
    Ok((StatusCode::CREATED, Json(record)).into_response())
}

async fn revoke<S: Store + 'static>(
    State(state): State<AppState<S>>,
    body: Bytes,
) -> Result<Json<RevokeResponse>, ApiError> {
    let req: RevokeRequest = parse_json(&body)?;
    let result = state
        .registry
        .revoke_detailed(&req.package_name, &req.identity)
        .await?;
    let response = match result {
        RevokeResult::Revoked(record) => RevokeResponse {
            revoked: true,
            record: Some(record),
        },
        RevokeResult::AlreadyRevoked(_) | RevokeResult::NotFound => RevokeResponse {
            revoked: false,
            record: None,
        },
    };
    Ok(Json(response))
}

async fn reset<S: Store + 'static>(
    State(state): State<AppState<S>>,
) -> Result<Json<ResetResponse>, ApiError> {
    let removed = state.registry.reset().await?;
    Ok(Json(ResetResponse { removed }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Queries
// ─────────────────────────────────────────────────────────────────────────────

async fn check_query<S: Store + 'static>(
    State(state): State<AppState<S>>,
    query: Result<Query<CheckRequest>, QueryRejection>,
) -> Result<Json<CheckResponse>, ApiError> {
    let Query(req) = query.map_err(|e| ApiError::validation(e.body_text()))?;
    check(&state, req).await
}

async fn check_body<S: Store + 'static>(
    State(state): State<AppState<S>>,
    body: Bytes,
) -> Result<Json<CheckResponse>, ApiError> {
    let req: CheckRequest = parse_json(&body)?;
    check(&state, req).await
}

async fn check<S: Store + 'static>(
    state: &AppState<S>,
    req: CheckRequest,
) -> Result<Json<CheckResponse>, ApiError> {
    let registry = &state.registry;
    let at = req.at_time.unwrap_or_else(|| registry.now());
    let outcome = registry.check_at(&req.package_name, &req.identity, at).await?;
    Ok(Json(CheckResponse::new(req.package_name, req.identity, outcome)))
}

async fn list_package<S: Store + 'static>(
    State(state): State<AppState<S>>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<PackageRecords>, ApiError> {
    let Path(package_name) = path.map_err(|e| ApiError::validation(e.body_text()))?;
    let records = state.registry.list_for_package(&package_name).await?;
    Ok(Json(PackageRecords {
        package_name,
        records,
    }))
}

async fn get_record<S: Store + 'static>(
    State(state): State<AppState<S>>,
    path: Result<Path<u64>, PathRejection>,
) -> Result<Json<AuthorizationRecord>, ApiError> {
    let Path(id) = path.map_err(|e| ApiError::validation(e.body_text()))?;
    let record = state.registry.get_record(RecordId::new(id)).await?;
    Ok(Json(record))
}

async fn list_all<S: Store + 'static>(
    State(state): State<AppState<S>>,
) -> Result<Json<AllRecords>, ApiError> {
    let packages = state.registry.list_all().await?;
    Ok(Json(AllRecords { packages }))
}

async fn health<S: Store + 'static>(State(state): State<AppState<S>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: state.registry.now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kam_core::wire::ErrorBody;

    async fn error_body(response: Response) -> ErrorBody {
        let bytes = to_bytes(response.into_body(), MAX_ERROR_TEXT).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_empty_timeout_gets_error_body() {
        let response = structured_errors(StatusCode::REQUEST_TIMEOUT.into_response()).await;
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        assert!(is_json(&response));

        let body = error_body(response).await;
        assert_eq!(body.error, "request_timeout");
        assert_eq!(body.message, "Request Timeout");
    }

    #[tokio::test]
    async fn test_plain_text_error_keeps_its_message() {
        let plain = (StatusCode::PAYLOAD_TOO_LARGE, "length limit exceeded").into_response();
        let body = error_body(structured_errors(plain).await).await;
        assert_eq!(body.error, "payload_too_large");
        assert_eq!(body.message, "length limit exceeded");
    }

    #[tokio::test]
    async fn test_handler_errors_pass_through() {
        let handled = ApiError::validation("bad ttl").into_response();
        let body = error_body(structured_errors(handled).await).await;
        assert_eq!(body.error, "validation_error");
        assert_eq!(body.message, "bad ttl");

        let ok = structured_errors(StatusCode::OK.into_response()).await;
        assert_eq!(ok.status(), StatusCode::OK);
        assert!(!is_json(&ok));
    }
}
