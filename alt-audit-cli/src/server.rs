//! Admin HTTP surface.
//!
//! - `GET /nonce` issues export and download tokens to administrators
//! - `POST /export` runs an export from the admin form
//! - `GET /download?file=&nonce=` streams a report
//!
//! The caller is identified by the `x-alt-audit-session` header, or the
//! `alt_audit_session` cookie for plain browser links.

use std::sync::Arc;

use alt_audit::{
    AuthorizationFailure, Capability, Caller, DownloadGateway, DownloadRequest, ErrorKind,
    ExportError, ExportForm, ExportResponse, ExportService, NonceAction, log_export_failure,
};
use anyhow::Context;
use axum::extract::{Query, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router, middleware};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::logging::LoggingMiddleware;

/// Header carrying the caller's session.
pub const SESSION_HEADER: &str = "x-alt-audit-session";

/// Cookie consulted when the session header is absent.
pub const SESSION_COOKIE: &str = "alt_audit_session";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    service: Arc<ExportService>,
    gateway: Arc<DownloadGateway>,
}

impl AppState {
    #[must_use]
    pub fn new(service: ExportService) -> Self {
        let gateway = service.download_gateway();
        Self {
            service: Arc::new(service),
            gateway: Arc::new(gateway),
        }
    }
}

/// Build the admin router.
#[must_use]
pub fn build_router(state: AppState, verbose: u8) -> Router {
    let logging = LoggingMiddleware::new(verbose);
    Router::new()
        .route("/nonce", get(issue_nonces))
        .route("/export", post(export))
        .route("/download", get(download))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(
            move |request: Request, next: middleware::Next| logging.handle(request, next),
        ))
}

/// Bind `addr` and serve until the process is stopped.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(state: AppState, addr: &str, verbose: u8) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr = %listener.local_addr()?, "admin server listening");
    axum::serve(listener, build_router(state, verbose)).await?;
    Ok(())
}

/// HTTP status for a request-level failure.
#[must_use]
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Authorization => StatusCode::FORBIDDEN,
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn caller_from(headers: &HeaderMap) -> Caller {
    let from_header = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let session = from_header.or_else(|| {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find_map(|(name, value)| (name == SESSION_COOKIE).then_some(value))
    });
    Caller::new(session.unwrap_or_default())
}

fn envelope(response: ExportResponse) -> Response {
    let status = response.failure.map_or(StatusCode::OK, status_for);
    (status, Json(response)).into_response()
}

#[derive(Debug, Serialize)]
struct NonceResponse {
    export_nonce: String,
    download_nonce: String,
}

async fn issue_nonces(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let caller = caller_from(&headers);
    if !state
        .service
        .authorizer()
        .has_capability(&caller, Capability::ManageOptions)
    {
        let err = ExportError::from(AuthorizationFailure::MissingCapability);
        log_export_failure(&err, &caller);
        return envelope(ExportResponse::from_result(&Err(err)));
    }
    let nonces = state.service.nonces();
    Json(NonceResponse {
        export_nonce: nonces.issue(NonceAction::Export, &caller),
        download_nonce: nonces.issue(NonceAction::Download, &caller),
    })
    .into_response()
}

async fn export(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<ExportForm>,
) -> Response {
    let request = form.into_request(caller_from(&headers));
    let service = Arc::clone(&state.service);
    let caller = request.caller.clone();

    let response = tokio::task::spawn_blocking(move || service.respond(&request))
        .await
        .unwrap_or_else(|e| {
            let err = ExportError::UnexpectedScan(e.into());
            log_export_failure(&err, &caller);
            ExportResponse::from_result(&Err(err))
        });
    envelope(response)
}

#[derive(Debug, Default, Deserialize)]
struct DownloadQuery {
    #[serde(default)]
    file: String,
    #[serde(default)]
    nonce: String,
}

async fn download(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<DownloadQuery>,
) -> Response {
    let request = DownloadRequest {
        caller: caller_from(&headers),
        nonce: query.nonce,
        file: query.file,
    };
    let gateway = Arc::clone(&state.gateway);
    let session = request.caller.session.clone();

    let result = tokio::task::spawn_blocking(move || gateway.fetch(&request))
        .await
        .unwrap_or_else(|e| Err(ExportError::UnexpectedScan(e.into())));

    match result {
        Ok(report) => {
            let headers = [
                (header::CONTENT_TYPE, report.content_type().to_owned()),
                (header::CONTENT_DISPOSITION, report.content_disposition()),
                (header::CONTENT_LENGTH, report.content_length().to_string()),
                (header::PRAGMA, "no-cache".to_owned()),
                (header::EXPIRES, "0".to_owned()),
            ];
            (headers, report.body).into_response()
        }
        Err(err) => {
            warn!(session = %session, error = %err, "download refused");
            (status_for(err.kind()), err.user_message()).into_response()
        }
    }
}
