//! HTTP front end: routes, middleware, and mapping fetch errors to statuses.

use crate::dist;
use axum::Router;
use axum::body::Body;
use axum::extract::{ConnectInfo, Path, RawQuery, Request, State};
use axum::http::header::{AUTHORIZATION, CONTENT_ENCODING, CONTENT_TYPE, HeaderValue, WWW_AUTHENTICATE};
use axum::http::{HeaderMap, HeaderName, Method, StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use skycache_fetch::error::{Error as FetchError, ErrorKind as FetchErrorKind};
use skycache_fetch::{AssetRequest, AssetResponse, AssetService};
use std::net::SocketAddr;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tower_http::compression::CompressionLayer;

const COOP: HeaderName = HeaderName::from_static("cross-origin-opener-policy");
const COEP: HeaderName = HeaderName::from_static("cross-origin-embedder-policy");

/// Basic auth credentials.
#[derive(Clone)]
pub struct Credentials {
    login: String,
    password: String,
}

impl Credentials {
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
        }
    }

    /// Whether an `Authorization` header carries these credentials. Both
    /// halves are always compared, in constant time.
    fn verify(&self, header: Option<&HeaderValue>) -> bool {
        let Some((scheme, encoded)) = header.and_then(|v| v.to_str().ok()).and_then(|v| v.split_once(' ')) else {
            return false;
        };
        if !scheme.eq_ignore_ascii_case("basic") {
            return false;
        }
        let Ok(decoded) = STANDARD.decode(encoded.trim()) else {
            return false;
        };
        let Some((login, password)) = std::str::from_utf8(&decoded).ok().and_then(|s| s.split_once(':')) else {
            return false;
        };
        let login_ok = login.as_bytes().ct_eq(self.login.as_bytes());
        let password_ok = password.as_bytes().ct_eq(self.password.as_bytes());
        (login_ok & password_ok).into()
    }
}

/// The full application. Middleware, outermost first: request log,
/// cross-origin isolation headers, gzip, then basic auth if configured.
pub fn router(assets: AssetService, auth: Option<Credentials>) -> Router {
    let mut router = Router::new()
        .route("/vcsky/{*path}", any(proxy))
        .route("/", get(index))
        .fallback(bundled)
        .with_state(assets);
    if let Some(credentials) = auth {
        router = router.layer(middleware::from_fn_with_state(Arc::new(credentials), basic_auth));
    }
    router
        .layer(CompressionLayer::new())
        .layer(middleware::from_fn(isolation_headers))
        .layer(middleware::from_fn(log_request))
}

async fn proxy(
    State(assets): State<AssetService>,
    method: Method,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    let request = AssetRequest {
        method,
        path,
        query,
        headers,
    };
    match assets.serve(request).await {
        Ok(response) => into_response(response),
        Err(err) => error_response(&err),
    }
}

fn into_response(asset: AssetResponse) -> Response {
    let mut response = Response::new(Body::from_stream(asset.body));
    *response.status_mut() = asset.status;
    *response.headers_mut() = asset.headers;
    response
}

fn error_response(err: &FetchError) -> Response {
    match &**err {
        FetchErrorKind::NotFound(_) | FetchErrorKind::InvalidRequest(_) => {
            tracing::debug!(error = ?err, "asset not found");
            StatusCode::NOT_FOUND.into_response()
        },
        FetchErrorKind::UpstreamTooLarge(_) => {
            tracing::warn!(error = ?err, "proxy response too large");
            (StatusCode::BAD_GATEWAY, "Response too large").into_response()
        },
        FetchErrorKind::UpstreamUnavailable(_)
        | FetchErrorKind::UpstreamBadStatus(_)
        | FetchErrorKind::UnsupportedEncoding(_)
        | FetchErrorKind::PartialTransfer => {
            tracing::warn!(error = ?err, "proxy error");
            (StatusCode::BAD_GATEWAY, format!("Proxy error: {err}")).into_response()
        },
        FetchErrorKind::LocalIo | FetchErrorKind::CacheWriteFailed(_) | FetchErrorKind::BulkIncomplete { .. } => {
            tracing::error!(error = ?err, "failed to serve asset");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        },
    }
}

async fn index() -> Response {
    match dist::get(dist::INDEX) {
        Some(data) => ([(CONTENT_TYPE, dist::content_type(dist::INDEX))], data).into_response(),
        None => {
            tracing::error!("bundle has no index.html");
            (StatusCode::NOT_FOUND, "index.html not found").into_response()
        },
    }
}

async fn bundled(uri: Uri) -> Response {
    let path = uri.path().trim_start_matches('/');
    if path.contains("..") {
        tracing::warn!(path = uri.path(), "path traversal attempt blocked");
        return StatusCode::NOT_FOUND.into_response();
    }
    match dist::get(path) {
        Some(data) => ([(CONTENT_TYPE, dist::content_type(path))], data).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn basic_auth(State(credentials): State<Arc<Credentials>>, request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS || credentials.verify(request.headers().get(AUTHORIZATION)) {
        return next.run(request).await;
    }
    (
        StatusCode::UNAUTHORIZED,
        [(WWW_AUTHENTICATE, "Basic realm=\"Restricted\"")],
        "Unauthorized",
    )
        .into_response()
}

async fn isolation_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(COOP, HeaderValue::from_static("same-origin"));
    headers.insert(COEP, HeaderValue::from_static("require-corp"));
    response
}

/// One line per request: `remote method path status [encoding]`.
async fn log_request(request: Request, next: Next) -> Response {
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "-".to_string());
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let response = next.run(request).await;
    let encoding = match response.headers().get(CONTENT_ENCODING).and_then(|v| v.to_str().ok()) {
        Some(e @ ("br" | "gzip")) => format!(" {e}"),
        _ => String::new(),
    };
    tracing::info!("{remote} {method} {path} {}{encoding}", response.status().as_u16());
    response
}
