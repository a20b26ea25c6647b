//! HTTP adapters for the authentication guard
//!
//! Two axum middlewares sit in front of the routes:
//! - `require_auth` refuses the request unless the guard allows it, and
//!   exposes the caller as an `Extension<Identity>`
//! - `optional_auth` never refuses; handlers read `Extension<CurrentUser>`
//!
//! Denials are rendered as `{ "success": false, "error": ... }` with the
//! guard's status code and, on 401, a `WWW-Authenticate` challenge.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashguard_core::{Decision, Denial, Identity};
use std::net::SocketAddr;

use crate::web::{ApiResponse, DashboardState};

/// Caller identity on routes where authentication is optional
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Option<Identity>);

/// Middleware for routes that must be authenticated
pub async fn require_auth(
    State(state): State<DashboardState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    mut req: Request,
    next: Next,
) -> Response {
    let decision = state
        .guard()
        .require_auth(peer.ip(), authorization(req.headers()));

    match decision {
        Decision::Allow(identity) => {
            tracing::debug!("Authenticated {} from {}", identity.username, peer);
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        Decision::Deny(denial) => denial_response(&denial),
    }
}

/// Middleware for routes that work with or without credentials
pub async fn optional_auth(
    State(state): State<DashboardState>,
    mut req: Request,
    next: Next,
) -> Response {
    let identity = state.guard().optional_auth(authorization(req.headers()));
    req.extensions_mut().insert(CurrentUser(identity));
    next.run(req).await
}

/// Render a denial as a JSON error response
pub fn denial_response(denial: &Denial) -> Response {
    let status = StatusCode::from_u16(denial.status_code()).unwrap_or(StatusCode::UNAUTHORIZED);
    let mut response = (status, Json(ApiResponse::error(denial.reason()))).into_response();

    if let Some(challenge) = &denial.challenge {
        match HeaderValue::from_str(challenge) {
            Ok(value) => {
                response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
            }
            Err(e) => tracing::error!("Invalid challenge header {:?}: {}", challenge, e),
        }
    }

    response
}

/// Non-UTF-8 header values are treated like a missing header
fn authorization(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
}
