//! Reverse proxy to the bundler's serve endpoint.
//!
//! Navigation requests (the entry document or any extensionless path) are fetched
//! as `index.html` and rewritten on the way through; everything else is streamed
//! back untouched. Failures never escape a request: the browser gets a plain 404,
//! or the error page when the bundler reports a failed build.

use axum::body::{to_bytes, Body};
use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;
use std::path::Path;
use tokio::sync::watch;

use crate::config::{DevConfig, INDEX_FILE_NAME};
use crate::dev::error_overlay;
use crate::error::{CliError, Result};
use crate::index_html::inject_into_index;

const NOT_FOUND_BODY: &str = "404 - Not Found";

/// Request bodies are buffered before forwarding.
const MAX_REQUEST_BODY: usize = 64 * 1024 * 1024;

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Proxies requests to whichever bundler instance is currently published.
#[derive(Clone)]
pub struct Proxy {
    client: reqwest::Client,
    upstream: watch::Receiver<Option<SocketAddr>>,
    secure: bool,
    entry_file_name: String,
    assets_dir: String,
    public_url: String,
}

/// Where one request goes upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyTarget {
    /// Path and query without the leading slash
    pub path_and_query: String,
    /// Whether the response is the entry document
    pub is_entry: bool,
}

impl ProxyTarget {
    /// Map a request path to its upstream path.
    pub fn for_request(path: &str, query: Option<&str>) -> Self {
        let is_entry = is_navigation(path);
        let path = if is_entry {
            INDEX_FILE_NAME
        } else {
            path.trim_start_matches('/')
        };
        let path_and_query = match query {
            Some(q) if !q.is_empty() => format!("{}?{}", path, q),
            _ => path.to_string(),
        };

        Self {
            path_and_query,
            is_entry,
        }
    }
}

/// The entry document itself, or a path without an extension (SPA route).
pub fn is_navigation(path: &str) -> bool {
    let last = path.rsplit('/').next().unwrap_or_default();
    last == INDEX_FILE_NAME || Path::new(last).extension().is_none()
}

impl Proxy {
    /// Build the proxy for `config`, following address updates from `upstream`.
    pub fn new(config: &DevConfig, upstream: watch::Receiver<Option<SocketAddr>>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.proxy_timeout())
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .build()
            .map_err(|e| CliError::Server(format!("failed to build proxy client: {}", e)))?;

        Ok(Self {
            client,
            upstream,
            secure: config.tls_enabled(),
            entry_file_name: config.entry_file_name.clone(),
            assets_dir: config.assets_dir.clone(),
            public_url: config.public_url.clone(),
        })
    }

    /// Forward one request. Always produces a response.
    pub async fn forward(&self, req: Request, client_addr: Option<SocketAddr>) -> Response {
        let target = ProxyTarget::for_request(req.uri().path(), req.uri().query());

        let Some(upstream) = *self.upstream.borrow() else {
            tracing::debug!(path = %req.uri().path(), "bundler is restarting");
            return not_found();
        };
        let url = format!("http://{}/{}", upstream, target.path_and_query);

        let (parts, body) = req.into_parts();
        let headers = self.forward_headers(&parts.headers, client_addr, target.is_entry);

        let mut outgoing = self.client.request(parts.method.clone(), &url).headers(headers);
        if parts.method != Method::GET && parts.method != Method::HEAD {
            match to_bytes(body, MAX_REQUEST_BODY).await {
                Ok(bytes) => outgoing = outgoing.body(bytes),
                Err(err) => {
                    tracing::warn!(%url, error = %err, "failed to read request body");
                    return StatusCode::BAD_REQUEST.into_response();
                }
            }
        }

        let upstream_response = match outgoing.send().await {
            Ok(response) => response,
            Err(err) if is_broken_pipe(&err) => {
                // The client went away mid-request. A handler still has to return
                // something, so the empty 502 stands in for "nothing sent".
                tracing::debug!(%url, "connection closed while proxying");
                return StatusCode::BAD_GATEWAY.into_response();
            }
            Err(err) => {
                tracing::warn!(%url, error = %err, "upstream request failed");
                return not_found();
            }
        };

        let status = upstream_response.status();
        if !matches!(status.as_u16(), 200 | 204 | 206) {
            return self.failure(target.is_entry, upstream_response).await;
        }

        if target.is_entry {
            self.entry_document(upstream_response).await
        } else {
            stream_through(upstream_response)
        }
    }

    fn forward_headers(
        &self,
        incoming: &HeaderMap,
        client_addr: Option<SocketAddr>,
        is_entry: bool,
    ) -> HeaderMap {
        let mut headers = HeaderMap::with_capacity(incoming.len() + 3);
        for (name, value) in incoming {
            if is_hop_by_hop(name) || is_conditional(name) || name == header::CONTENT_LENGTH {
                continue;
            }
            // The entry body is rewritten as text.
            if is_entry && name == header::ACCEPT_ENCODING {
                continue;
            }
            headers.append(name.clone(), value.clone());
        }

        if let Some(host) = incoming.get(header::HOST) {
            headers.insert(X_FORWARDED_HOST, host.clone());
        }

        if let Some(addr) = client_addr {
            let ip = addr.ip().to_string();
            let forwarded_for = match incoming.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok())
            {
                Some(prior) => format!("{}, {}", prior, ip),
                None => ip,
            };
            if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
                headers.insert(X_FORWARDED_FOR, value);
            }
        }

        let proto = if self.secure { "https" } else { "http" };
        headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static(proto));
        headers
    }

    async fn failure(&self, is_entry: bool, response: reqwest::Response) -> Response {
        let status = response.status();
        let is_text = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/plain"));

        if is_entry && status == StatusCode::SERVICE_UNAVAILABLE && is_text {
            let message = match response.text().await {
                Ok(text) => text,
                Err(err) => {
                    tracing::warn!(error = %err, "failed to read build error");
                    "Error: cannot build app".to_string()
                }
            };
            tracing::debug!("serving build error page");
            return (
                status,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                error_overlay::render(&message),
            )
                .into_response();
        }

        tracing::debug!(%status, url = %response.url(), "upstream returned an error status");
        not_found()
    }

    async fn entry_document(&self, response: reqwest::Response) -> Response {
        let status = response.status();
        let mut headers = copy_headers(response.headers());

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!(error = %err, "failed to read entry document");
                return not_found();
            }
        };

        let html = match std::str::from_utf8(&body) {
            Ok(html) => std::borrow::Cow::Borrowed(html),
            Err(err) => {
                tracing::warn!(error = %err, "entry document is not valid UTF-8, invalid bytes replaced");
                String::from_utf8_lossy(&body)
            }
        };
        let (html, _) = inject_into_index(
            &html,
            &self.entry_file_name,
            &self.assets_dir,
            &self.public_url,
        );

        // The rewritten body differs from what the validators describe.
        headers.remove(header::CONTENT_RANGE);
        headers.remove(header::ETAG);
        headers.remove(header::LAST_MODIFIED);
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(html.len()));

        let mut out = Response::new(Body::from(html));
        *out.status_mut() = status;
        *out.headers_mut() = headers;
        out
    }
}

fn stream_through(response: reqwest::Response) -> Response {
    let status = response.status();
    let headers = copy_headers(response.headers());

    let mut out = Response::new(Body::from_stream(response.bytes_stream()));
    *out.status_mut() = status;
    *out.headers_mut() = headers;
    out
}

/// Copy upstream headers; a repeated name keeps its last value.
fn copy_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(upstream.len());
    for (name, value) in upstream {
        if is_hop_by_hop(name) {
            continue;
        }
        headers.insert(name.clone(), value.clone());
    }
    headers
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-connection"
            | "transfer-encoding"
            | "te"
            | "trailer"
            | "upgrade"
    )
}

/// Validators are not forwarded: a 304 from upstream is not a success, and the
/// entry document is rewritten anyway.
fn is_conditional(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "if-none-match" | "if-modified-since" | "if-match" | "if-unmodified-since" | "if-range"
    )
}

fn is_broken_pipe(err: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = std::error::Error::source(err);
    while let Some(current) = source {
        if let Some(io) = current.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::BrokenPipe {
                return true;
            }
        }
        source = current.source();
    }
    false
}

/// Plain-text 404 used for every upstream failure that has no better answer.
pub fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        NOT_FOUND_BODY,
    )
        .into_response()
}
