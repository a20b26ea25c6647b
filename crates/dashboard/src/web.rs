//! Web server for the protected dashboard
//!
//! Routes:
//! - `GET /`            dashboard page (authenticated)
//! - `GET /api/me`      current user (authenticated)
//! - `GET /api/session` whether the caller is signed in (optional auth)
//! - `GET /health`      liveness probe (public)
//!
//! # SECURITY
//! Basic credentials travel in cleartext. Binding anything but loopback is
//! allowed, but only behind a TLS-terminating proxy.

use anyhow::{Context, Result};
use axum::{
    extract::State,
    middleware,
    response::Html,
    routing::get,
    Extension, Json, Router,
};
use dashguard_core::{AuthGuard, Identity};
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::auth::{self, CurrentUser};

/// State shared across request handlers
#[derive(Clone)]
pub struct DashboardState {
    guard: Arc<AuthGuard>,
}

impl DashboardState {
    pub fn new(guard: AuthGuard) -> Self {
        Self {
            guard: Arc::new(guard),
        }
    }

    pub fn guard(&self) -> &AuthGuard {
        &self.guard
    }
}

/// JSON envelope shared by every API response
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
struct SessionResponse {
    success: bool,
    authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<String>,
}

#[derive(Debug, Serialize)]
struct UserResponse {
    success: bool,
    user: String,
}

/// Dashboard HTML (Catppuccin Mocha theme)
pub struct HtmlTemplate;

impl HtmlTemplate {
    pub fn render(username: &str, max_attempts: u32, lockout_minutes: u64) -> String {
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Dashboard</title>
    <style>
        :root {{
            --ctp-base: #1E1E2E;
            --ctp-surface: #313244;
            --ctp-primary: #CBA6F7;
            --ctp-text: #CDD6F4;
            --ctp-green: #A6E3A1;
        }}
        body {{
            background-color: var(--ctp-base);
            color: var(--ctp-text);
            font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
            display: flex;
            justify-content: center;
            align-items: center;
            min-height: 100vh;
            margin: 0;
        }}
        .container {{
            background-color: var(--ctp-surface);
            padding: 2rem;
            border-radius: 12px;
            text-align: center;
            max-width: 500px;
            width: 90%;
        }}
        h1 {{ color: var(--ctp-primary); }}
        .user {{ color: var(--ctp-green); }}
        .info {{ font-size: 0.8rem; opacity: 0.6; margin-top: 2rem; }}
    </style>
</head>
<body>
    <div class="container">
        <h1>Dashboard</h1>
        <p>Signed in as <span class="user">{}</span></p>
        <p class="info">Sign-in is blocked for {} minutes after {} failed attempts</p>
    </div>
</body>
</html>"#,
            escape_html(username),
            lockout_minutes,
            max_attempts
        )
    }
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Dashboard page handler
pub async fn dashboard_page(
    State(state): State<DashboardState>,
    Extension(identity): Extension<Identity>,
) -> Html<String> {
    let policy = state.guard().tracker().policy();
    Html(HtmlTemplate::render(
        &identity.username,
        policy.max_attempts(),
        policy.lockout_duration().as_secs() / 60,
    ))
}

async fn current_user(Extension(identity): Extension<Identity>) -> Json<UserResponse> {
    Json(UserResponse {
        success: true,
        user: identity.username,
    })
}

async fn session(Extension(CurrentUser(identity)): Extension<CurrentUser>) -> Json<SessionResponse> {
    Json(SessionResponse {
        success: true,
        authenticated: identity.is_some(),
        user: identity.map(|i| i.username),
    })
}

async fn health() -> Json<ApiResponse> {
    Json(ApiResponse::ok())
}

/// Build the application router
pub fn router(state: DashboardState) -> Router {
    let protected = Router::new()
        .route("/", get(dashboard_page))
        .route("/api/me", get(current_user))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_auth));

    let public = Router::new()
        .route("/api/session", get(session))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::optional_auth))
        .route("/health", get(health));

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Web server for the dashboard
pub struct WebServer {
    state: DashboardState,
}

impl WebServer {
    pub fn new(state: DashboardState) -> Self {
        Self { state }
    }

    /// Serve until `shutdown` resolves
    pub async fn run<F>(self, bind_addr: SocketAddr, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if !bind_addr.ip().is_loopback() {
            warn!(
                "Binding to non-loopback address {}; Basic credentials are sent in cleartext, terminate TLS in front of this server",
                bind_addr
            );
        }

        let listener = tokio::net::TcpListener::bind(bind_addr)
            .await
            .with_context(|| format!("Failed to bind {}", bind_addr))?;
        let local_addr = listener.local_addr().context("Failed to read bound address")?;
        info!("Dashboard listening on http://{}", local_addr);

        axum::serve(
            listener,
            router(self.state).into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
        .context("Web server failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        extract::ConnectInfo,
        http::{header, HeaderMap, Request, StatusCode},
    };
    use dashguard_core::{AttemptTracker, CredentialSource, Credentials, LockoutPolicy};
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    const CLIENT: [u8; 4] = [1, 2, 3, 4];

    fn app() -> (Router, Arc<AttemptTracker>) {
        let source = CredentialSource::resolve(
            Some("admin".to_string()),
            Some("s3cret".to_string()),
            None,
        );
        let policy = LockoutPolicy::new(5, Duration::from_secs(15 * 60)).unwrap();
        let tracker = Arc::new(AttemptTracker::new(policy));
        let guard = AuthGuard::new(&source, Arc::clone(&tracker));
        (router(DashboardState::new(guard)), tracker)
    }

    fn basic(name: &str, pass: &str) -> String {
        Credentials::new(name, pass).to_authorization()
    }

    async fn send(
        app: &Router,
        uri: &str,
        client: [u8; 4],
        authorization: Option<&str>,
    ) -> (StatusCode, HeaderMap, Vec<u8>) {
        let mut builder = Request::builder().uri(uri);
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        let mut req = builder.body(Body::empty()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from((client, 52000))));

        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, body.to_vec())
    }

    fn json(body: &[u8]) -> Value {
        serde_json::from_slice(body).unwrap()
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let (app, _) = app();
        let (status, _, body) = send(&app, "/health", CLIENT, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body), serde_json::json!({ "success": true }));
    }

    #[tokio::test]
    async fn test_missing_credentials_challenged() {
        let (app, tracker) = app();
        let (status, headers, body) = send(&app, "/api/me", CLIENT, None).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            headers.get(header::WWW_AUTHENTICATE).unwrap(),
            "Basic realm=\"Dashboard\""
        );
        assert_eq!(
            json(&body),
            serde_json::json!({ "success": false, "error": "authentication required" })
        );
        assert_eq!(tracker.failure_count("1.2.3.4"), 0);
    }

    #[tokio::test]
    async fn test_wrong_credentials_counted() {
        let (app, tracker) = app();
        let wrong = basic("admin", "guess");
        let (status, headers, body) = send(&app, "/api/me", CLIENT, Some(&wrong)).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(headers.get(header::WWW_AUTHENTICATE).is_some());
        assert_eq!(json(&body)["error"], "invalid credentials");
        assert_eq!(tracker.failure_count("1.2.3.4"), 1);
    }

    #[tokio::test]
    async fn test_correct_credentials_first_time() {
        let (app, tracker) = app();
        let right = basic("admin", "s3cret");
        let (status, _, body) = send(&app, "/api/me", CLIENT, Some(&right)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json(&body),
            serde_json::json!({ "success": true, "user": "admin" })
        );
        assert!(tracker.is_empty());
    }

    #[tokio::test]
    async fn test_dashboard_page_requires_auth() {
        let (app, _) = app();
        let (status, _, _) = send(&app, "/", CLIENT, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let right = basic("admin", "s3cret");
        let (status, _, body) = send(&app, "/", CLIENT, Some(&right)).await;
        assert_eq!(status, StatusCode::OK);
        let html = String::from_utf8(body).unwrap();
        assert!(html.contains("Signed in as <span class=\"user\">admin</span>"));
        assert!(html.contains("15 minutes after 5 failed attempts"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lockout_scenario() {
        let (app, tracker) = app();
        let wrong = basic("admin", "wrong");
        let right = basic("admin", "s3cret");

        for _ in 0..5 {
            let (status, _, _) = send(&app, "/api/me", CLIENT, Some(&wrong)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
        }

        let (status, headers, body) = send(&app, "/api/me", CLIENT, Some(&right)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(headers.get(header::WWW_AUTHENTICATE).is_none());
        assert_eq!(
            json(&body),
            serde_json::json!({ "success": false, "error": "too many failed attempts" })
        );

        // Other clients are unaffected
        let (status, _, _) = send(&app, "/api/me", [5, 6, 7, 8], Some(&right)).await;
        assert_eq!(status, StatusCode::OK);

        tokio::time::advance(Duration::from_secs(16 * 60)).await;

        let (status, _, _) = send(&app, "/api/me", CLIENT, Some(&right)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(tracker.failure_count("1.2.3.4"), 0);
        assert!(tracker.is_empty());
    }

    #[tokio::test]
    async fn test_session_never_denies() {
        let (app, tracker) = app();

        let (status, _, body) = send(&app, "/api/session", CLIENT, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json(&body),
            serde_json::json!({ "success": true, "authenticated": false })
        );

        let wrong = basic("admin", "wrong");
        for _ in 0..6 {
            let (status, _, body) = send(&app, "/api/session", CLIENT, Some(&wrong)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(json(&body)["authenticated"], false);
        }
        assert!(tracker.is_empty());

        let right = basic("admin", "s3cret");
        let (_, _, body) = send(&app, "/api/session", CLIENT, Some(&right)).await;
        assert_eq!(
            json(&body),
            serde_json::json!({ "success": true, "authenticated": true, "user": "admin" })
        );
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<script>\"a\" & 'b'</script>"),
            "&lt;script&gt;&quot;a&quot; &amp; &#39;b&#39;&lt;/script&gt;"
        );
    }
}
