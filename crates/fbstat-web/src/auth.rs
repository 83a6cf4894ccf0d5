//! Access logging and Basic Auth for the refresh endpoint.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine;
use tracing::{debug, info, warn};

// ============================================================
// Access log
// ============================================================

#[derive(Clone)]
pub(crate) struct AccessLogLayer;

impl<S> tower::Layer<S> for AccessLogLayer {
    type Service = AccessLogService<S>;
    fn layer(&self, inner: S) -> Self::Service {
        AccessLogService { inner }
    }
}

#[derive(Clone)]
pub(crate) struct AccessLogService<S> {
    inner: S,
}

impl<S> tower::Service<Request> for AccessLogService<S>
where
    S: tower::Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let method = req.method().clone();
        let path = req.uri().path().to_owned();
        let client = req
            .extensions()
            .get::<axum::extract::ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string())
            .unwrap_or_else(|| "-".to_owned());
        let t0 = Instant::now();

        let mut inner = self.inner.clone();
        Box::pin(async move {
            let response = inner.call(req).await?;
            let latency_ms = t0.elapsed().as_millis() as u64;
            let status = response.status().as_u16();
            // Scrapes and health checks are periodic; keep them out of INFO.
            if path == "/metrics" || path == "/api/v1/health" {
                debug!(client, status, latency_ms, "{method} {path}");
            } else {
                info!(client, status, latency_ms, "{method} {path}");
            }
            Ok(response)
        })
    }
}

// ============================================================
// Basic Auth
// ============================================================

/// Username and password a mutating request must present.
pub(crate) struct Credentials {
    pub(crate) user: String,
    pub(crate) password: String,
}

/// Rejects unauthenticated `PUT` requests; reads pass through.
pub(crate) async fn refresh_auth_middleware(
    State(creds): State<Arc<Credentials>>,
    req: Request,
    next: Next,
) -> Response {
    if req.method() != Method::PUT {
        return next.run(req).await;
    }
    let path = req.uri().path().to_owned();

    match req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(parse_basic_credentials)
    {
        Some((user, password)) if user == creds.user && password == creds.password => {
            debug!(user = %user, path = %path, "authenticated");
            next.run(req).await
        }
        Some((user, _)) => {
            warn!(user = %user, path = %path, "auth failed: invalid credentials");
            unauthorized()
        }
        None => {
            warn!(path = %path, "auth failed: missing or malformed authorization header");
            unauthorized()
        }
    }
}

/// Decodes `Basic <base64(user:password)>`.
fn parse_basic_credentials(value: &HeaderValue) -> Option<(String, String)> {
    let encoded = value.to_str().ok()?.strip_prefix("Basic ")?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_owned(), password.to_owned()))
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Basic realm=\"fbstat\"")],
        "Unauthorized",
    )
        .into_response()
}
