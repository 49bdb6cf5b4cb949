//! Development HTTP server.
//!
//! Routes:
//! - [`RELOAD_PATH`]: reload event stream
//! - everything else: a file from the static directory, or the bundler via [`Proxy`]
//!
//! Navigation requests never touch the static directory, so the entry document
//! always comes from the bundler and gets rewritten.

use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;
use tower::ServiceExt;
use tower_http::services::ServeDir;

use crate::config::DevConfig;
use crate::dev::proxy::{is_navigation, Proxy};
use crate::dev::{tls, Broker, RELOAD_PATH};
use crate::error::{CliError, Result};

/// Task running the accept loop; resolves only on a fatal server error.
pub type ServerHandle = JoinHandle<Result<()>>;

#[derive(Clone)]
struct AppState {
    broker: Broker,
    proxy: Proxy,
    static_files: ServeDir,
}

/// Build the router serving reload streams, static files and the proxy.
pub fn router(broker: Broker, proxy: Proxy, static_root: PathBuf) -> Router {
    let state = AppState {
        broker,
        proxy,
        static_files: ServeDir::new(static_root).append_index_html_on_directories(false),
    };

    Router::new()
        .route(RELOAD_PATH, get(reload_stream))
        .fallback(handle_request)
        .with_state(state)
}

async fn reload_stream(State(state): State<AppState>) -> impl IntoResponse {
    state.broker.sse_response()
}

async fn handle_request(State(state): State<AppState>, req: Request) -> Response {
    let client_addr = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    tracing::debug!(method = %req.method(), path = %req.uri().path(), "request");

    let readable = req.method() == Method::GET || req.method() == Method::HEAD;
    if readable && !is_navigation(req.uri().path()) {
        if let Some(response) = serve_static(&state.static_files, probe_request(&req)).await {
            return response;
        }
    }

    state.proxy.forward(req, client_addr).await
}

/// Bodiless copy of `req` for the static file service.
fn probe_request(req: &Request) -> Request {
    let mut probe = Request::new(Body::empty());
    *probe.method_mut() = req.method().clone();
    *probe.uri_mut() = req.uri().clone();
    *probe.headers_mut() = req.headers().clone();
    probe
}

/// A file from the static directory, or `None` on a miss.
async fn serve_static(files: &ServeDir, probe: Request) -> Option<Response> {
    let response = match files.clone().oneshot(probe).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    if response.status() == StatusCode::NOT_FOUND {
        return None;
    }
    Some(response.map(Body::new))
}

/// A bound, not yet serving, dev server.
pub struct DevServer {
    listener: TcpListener,
    tls: Option<TlsAcceptor>,
    app: Router,
    host: String,
}

impl DevServer {
    /// Bind the listener and load TLS material.
    ///
    /// When the configured port is taken and `strictPort` is off, an OS-assigned
    /// port is used instead and reported.
    ///
    /// # Errors
    ///
    /// `CliError::Server` when binding fails, `CliError::Tls` for bad certificates.
    pub async fn bind(config: &DevConfig, broker: Broker, proxy: Proxy) -> Result<Self> {
        let tls = match (&config.tls.cert, &config.tls.key) {
            (Some(cert), Some(key)) => Some(tls::load_acceptor(
                &config.resolve(cert),
                &config.resolve(key),
            )?),
            _ => None,
        };

        let listener = bind_listener(&config.host, config.port, config.strict_port).await?;

        Ok(Self {
            listener,
            tls,
            app: router(broker, proxy, config.static_root()),
            host: config.host.clone(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Browser URL of the server.
    pub fn url(&self) -> Result<String> {
        let scheme = if self.tls.is_some() { "https" } else { "http" };
        Ok(format!(
            "{}://{}:{}/",
            scheme,
            self.host,
            self.local_addr()?.port()
        ))
    }

    pub fn spawn(self) -> ServerHandle {
        tokio::spawn(self.serve())
    }

    /// Serve until a fatal error.
    pub async fn serve(self) -> Result<()> {
        match self.tls {
            Some(acceptor) => serve_tls(self.listener, acceptor, self.app).await,
            None => axum::serve(
                self.listener,
                self.app
                    .into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .map_err(|e| CliError::Server(e.to_string())),
        }
    }
}

async fn bind_listener(host: &str, port: u16, strict_port: bool) -> Result<TcpListener> {
    match TcpListener::bind((host, port)).await {
        Ok(listener) => Ok(listener),
        Err(err) if err.kind() == std::io::ErrorKind::AddrInUse && !strict_port => {
            let listener = TcpListener::bind((host, 0))
                .await
                .map_err(|e| CliError::Server(format!("failed to bind {}: {}", host, e)))?;
            let actual = listener.local_addr()?.port();
            tracing::warn!(requested = port, actual, "port in use, using a free port");
            crate::ui::warning(&format!(
                "Port {} is in use, serving on {} instead",
                port, actual
            ));
            Ok(listener)
        }
        Err(err) => Err(CliError::Server(format!(
            "failed to bind {}:{}: {}",
            host, port, err
        ))),
    }
}

async fn serve_tls(listener: TcpListener, acceptor: TlsAcceptor, app: Router) -> Result<()> {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                tracing::warn!(error = %err, "failed to accept connection");
                tokio::time::sleep(Duration::from_millis(50)).await;
                continue;
            }
        };

        let acceptor = acceptor.clone();
        let app = app.clone();
        tokio::spawn(async move {
            let stream = match acceptor.accept(stream).await {
                Ok(stream) => stream,
                Err(err) => {
                    tracing::debug!(%peer, error = %err, "TLS handshake failed");
                    return;
                }
            };

            let service = hyper::service::service_fn(move |mut req: Request<hyper::body::Incoming>| {
                req.extensions_mut().insert(ConnectInfo(peer));
                app.clone().oneshot(req)
            });

            if let Err(err) = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                .serve_connection_with_upgrades(TokioIo::new(stream), service)
                .await
            {
                tracing::debug!(%peer, error = %err, "connection closed with error");
            }
        });
    }
}
