// Fake origin server shared by the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::{Stream, StreamExt, stream};
use tokio::net::TcpListener;

/// How the fake origin answers one path.
#[derive(Clone)]
pub enum Reply {
    /// 200 with a `Content-Length`.
    Ok(Vec<u8>),
    /// 200 with the given `Content-Encoding`.
    Encoded(&'static str, Vec<u8>),
    /// 200, chunked, no `Content-Length`.
    Chunked(Vec<u8>),
    /// 200 after a delay.
    Slow(Duration, Vec<u8>),
    /// 200 with the full `Content-Length`; the connection drops shortly
    /// after the first half of the body.
    Truncated(Vec<u8>),
    /// 200 with the full `Content-Length`; the first half of the body, then
    /// nothing, forever.
    Stalled(Vec<u8>),
    /// Bare status code.
    Status(u16),
}

#[derive(Clone, Default)]
struct Shared {
    routes: Arc<HashMap<String, Reply>>,
    hits: Arc<Mutex<HashMap<String, usize>>>,
}

pub struct FakeOrigin {
    pub base: String,
    shared: Shared,
}

impl FakeOrigin {
    pub async fn spawn(routes: impl IntoIterator<Item = (&'static str, Reply)>) -> Self {
        let shared = Shared {
            routes: Arc::new(routes.into_iter().map(|(path, reply)| (path.to_string(), reply)).collect()),
            hits: Arc::default(),
        };
        let app = Router::new().fallback(handle).with_state(shared.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            base: format!("http://{addr}/"),
            shared,
        }
    }

    /// Number of requests the origin has received for `path`.
    pub fn hits(&self, path: &str) -> usize {
        self.shared.hits.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    pub fn origin(&self) -> skycache_fetch::Origin {
        skycache_fetch::Origin::new(&self.base).unwrap()
    }
}

async fn handle(State(shared): State<Shared>, uri: Uri) -> Response {
    let path = uri.path().trim_start_matches('/').to_string();
    *shared.hits.lock().unwrap().entry(path.clone()).or_default() += 1;
    let Some(reply) = shared.routes.get(&path).cloned() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    match reply {
        Reply::Ok(body) => body.into_response(),
        Reply::Encoded(encoding, body) => ([(header::CONTENT_ENCODING, encoding)], body).into_response(),
        Reply::Chunked(body) => {
            let chunks: Vec<Result<Bytes, std::io::Error>> =
                body.chunks(4).map(|c| Ok(Bytes::copy_from_slice(c))).collect();
            Body::from_stream(stream::iter(chunks)).into_response()
        },
        Reply::Slow(delay, body) => {
            tokio::time::sleep(delay).await;
            body.into_response()
        },
        Reply::Truncated(body) => {
            // Headers and the first half must reach the client before the
            // error, or hyper fails the whole response instead of the body.
            let rest = stream::once(async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Err(std::io::Error::other("origin went away"))
            });
            half_then(&body, rest)
        },
        Reply::Stalled(body) => half_then(&body, stream::pending()),
        Reply::Status(status) => StatusCode::from_u16(status).unwrap().into_response(),
    }
}

fn half_then<S>(body: &[u8], rest: S) -> Response
where
    S: Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static,
{
    let half = Bytes::copy_from_slice(&body[..body.len() / 2]);
    let stream = stream::once(async move { Ok(half) }).chain(rest);
    ([(header::CONTENT_LENGTH, body.len())], Body::from_stream(stream)).into_response()
}

/// Deterministic test payload.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Every file name under `dir`, recursively, relative to it.
pub fn files(dir: &Path) -> Vec<String> {
    fn walk(root: &Path, dir: &Path, out: &mut Vec<String>) {
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(root, &path, out);
            } else {
                out.push(path.strip_prefix(root).unwrap().to_string_lossy().into_owned());
            }
        }
    }
    let mut out = Vec::new();
    walk(dir, dir, &mut out);
    out.sort();
    out
}
