//! Integration tests for the development server.
//!
//! A fake bundler (an in-process axum server) stands in for esbuild so the whole
//! session runs: watcher, broker, proxy and static serving.

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use nrb_cli::config::DevConfig;
use nrb_cli::dev::{BuildEngine, DevSession, RunningEngine, RELOAD_EVENT, RELOAD_PATH};
use nrb_cli::error::{CliError, Result};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Duration};

#[derive(Default)]
struct Upstream {
    hits: Mutex<Vec<String>>,
    broken: AtomicBool,
    starts: AtomicUsize,
    disposals: AtomicUsize,
}

impl Upstream {
    fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }
}

struct FakeBundler(Arc<Upstream>);

struct FakeRunning {
    addr: SocketAddr,
    task: JoinHandle<()>,
    upstream: Arc<Upstream>,
}

#[async_trait]
impl BuildEngine for FakeBundler {
    async fn start(&self) -> Result<Box<dyn RunningEngine>> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = Router::new().fallback(upstream).with_state(self.0.clone());
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        self.0.starts.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeRunning {
            addr,
            task,
            upstream: self.0.clone(),
        }))
    }
}

#[async_trait]
impl RunningEngine for FakeRunning {
    fn addr(&self) -> SocketAddr {
        self.addr
    }

    async fn dispose(self: Box<Self>) -> Result<()> {
        self.task.abort();
        self.upstream.disposals.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FailingBundler;

#[async_trait]
impl BuildEngine for FailingBundler {
    async fn start(&self) -> Result<Box<dyn RunningEngine>> {
        Err(CliError::Upstream("esbuild exited with status 1".to_string()))
    }
}

async fn upstream(State(state): State<Arc<Upstream>>, uri: Uri) -> Response {
    state.hits.lock().unwrap().push(uri.path().to_string());
    match uri.path() {
        "/index.html" if state.broken.load(Ordering::SeqCst) => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            "Build failed: Expected \";\" but found \"}\"",
        )
            .into_response(),
        "/index.html" => (
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            "<html><head></head><body><div id=\"root\"></div></body></html>",
        )
            .into_response(),
        "/assets/index.js" => (
            [(header::CONTENT_TYPE, "application/javascript")],
            "console.log('app')",
        )
            .into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

fn project() -> (TempDir, DevConfig) {
    let temp = TempDir::new().unwrap();
    let dir = temp.path();
    fs::create_dir_all(dir.join("src/pages")).unwrap();
    fs::write(dir.join("src/index.tsx"), "export {};").unwrap();
    fs::create_dir_all(dir.join("public")).unwrap();
    fs::write(dir.join("public/foo.png"), b"\x89PNG fake").unwrap();

    let config = DevConfig {
        base_dir: dir.canonicalize().unwrap(),
        host: "127.0.0.1".to_string(),
        port: 0,
        ping_interval_secs: 1,
        ..DevConfig::default()
    };
    (temp, config)
}

struct Running {
    addr: SocketAddr,
    broker: nrb_cli::dev::Broker,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl Running {
    async fn start(config: &DevConfig, upstream: &Arc<Upstream>) -> Self {
        let session = DevSession::start_with_engine(config, Box::new(FakeBundler(upstream.clone())))
            .await
            .unwrap();
        let addr = session.local_addr();
        let broker = session.broker().clone();
        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(session.run_until(async {
            let _ = stopped.await;
        }));
        Self {
            addr,
            broker,
            stop: Some(stop),
            task,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.task.await.unwrap().unwrap();
    }
}

async fn wait_for_clients(broker: &nrb_cli::dev::Broker, expected: usize) {
    let mut clients = broker.clients();
    timeout(
        Duration::from_secs(10),
        clients.wait_for(|count| *count == expected),
    )
    .await
    .expect("client count never reached the expected value")
    .unwrap();
}

/// Read SSE chunks until `needle` shows up.
async fn read_until(response: &mut reqwest::Response, needle: &str) -> String {
    let mut seen = String::new();
    timeout(Duration::from_secs(5), async {
        while !seen.contains(needle) {
            match response.chunk().await.unwrap() {
                Some(chunk) => seen.push_str(&String::from_utf8_lossy(&chunk)),
                None => break,
            }
        }
    })
    .await
    .expect("event never arrived");
    seen
}

fn touch(path: &Path, contents: &str) {
    fs::write(path, contents).unwrap();
}

#[tokio::test]
async fn test_rapid_writes_produce_one_reload() {
    let (temp, config) = project();
    let upstream = Arc::new(Upstream::default());
    let running = Running::start(&config, &upstream).await;
    let mut subscription = running.broker.subscribe();

    for i in 0..5 {
        touch(&temp.path().join("src/pages/home.tsx"), &format!("// {}", i));
        sleep(Duration::from_millis(10)).await;
    }

    let payload = timeout(Duration::from_secs(3), subscription.recv())
        .await
        .expect("no reload after the writes")
        .unwrap();
    assert_eq!(&*payload, RELOAD_EVENT);

    let second = timeout(Duration::from_millis(400), subscription.recv()).await;
    assert!(second.is_err(), "more than one reload for one burst");

    running.stop().await;
    assert_eq!(upstream.disposals.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_sse_stream_delivers_reload() {
    let (temp, config) = project();
    let upstream = Arc::new(Upstream::default());
    let running = Running::start(&config, &upstream).await;

    let mut response = reqwest::get(running.url(RELOAD_PATH)).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE.as_str()],
        "text/event-stream"
    );
    assert!(read_until(&mut response, "retry:").await.starts_with("retry: 10000"));
    wait_for_clients(&running.broker, 1).await;

    touch(&temp.path().join("src/index.tsx"), "export const x = 1;");
    let frames = read_until(&mut response, "data: ").await;
    assert!(frames.contains("data: update\n\n"));

    running.stop().await;
}

#[tokio::test]
async fn test_build_error_page_for_entry() {
    let (_temp, config) = project();
    let upstream = Arc::new(Upstream::default());
    upstream.broken.store(true, Ordering::SeqCst);
    let running = Running::start(&config, &upstream).await;

    let response = reqwest::get(running.url("/dashboard")).await.unwrap();
    assert_eq!(response.status(), 503);
    assert!(response.headers()[header::CONTENT_TYPE.as_str()]
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    let body = response.text().await.unwrap();
    assert!(body.contains("Build failed"));
    assert!(body.contains(RELOAD_PATH));

    running.stop().await;
}

#[tokio::test]
async fn test_static_hit_never_proxied_and_navigation_always_is() {
    let (_temp, config) = project();
    let upstream = Arc::new(Upstream::default());
    let running = Running::start(&config, &upstream).await;

    let png = reqwest::get(running.url("/foo.png")).await.unwrap();
    assert_eq!(png.status(), 200);
    assert_eq!(png.bytes().await.unwrap().as_ref(), b"\x89PNG fake");

    let page = reqwest::get(running.url("/dashboard")).await.unwrap();
    assert_eq!(page.status(), 200);
    let html = page.text().await.unwrap();
    assert!(html.contains("<script type=\"module\" src=\"/assets/index.js\"></script>"));

    let script = reqwest::get(running.url("/assets/index.js")).await.unwrap();
    assert_eq!(script.text().await.unwrap(), "console.log('app')");

    let missing = reqwest::get(running.url("/missing.css")).await.unwrap();
    assert_eq!(missing.status(), 404);

    let hits = upstream.hits();
    assert!(!hits.iter().any(|p| p == "/foo.png"));
    assert_eq!(
        hits,
        vec!["/index.html", "/assets/index.js", "/missing.css"]
    );

    running.stop().await;
}

#[tokio::test]
async fn test_disconnected_client_leaves_registry() {
    let (_temp, config) = project();
    let upstream = Arc::new(Upstream::default());
    let running = Running::start(&config, &upstream).await;

    let mut first = reqwest::get(running.url(RELOAD_PATH)).await.unwrap();
    let second = reqwest::get(running.url(RELOAD_PATH)).await.unwrap();
    wait_for_clients(&running.broker, 2).await;

    drop(second);
    wait_for_clients(&running.broker, 1).await;

    running.broker.notify("reload");
    let frames = read_until(&mut first, "data: ").await;
    assert!(frames.contains("data: reload\n\n"));
    assert_eq!(running.broker.client_count(), 1);

    running.stop().await;
}

#[tokio::test]
async fn test_config_change_restarts_bundler() {
    let (temp, config) = project();
    let upstream = Arc::new(Upstream::default());
    let running = Running::start(&config, &upstream).await;
    let mut subscription = running.broker.subscribe();

    touch(&temp.path().join("tsconfig.json"), "{}");

    let payload = timeout(Duration::from_secs(5), subscription.recv())
        .await
        .expect("no reload after config change")
        .unwrap();
    assert_eq!(&*payload, RELOAD_EVENT);
    assert!(upstream.starts.load(Ordering::SeqCst) >= 2);

    // Create and write may each restart; wait for quiet.
    while timeout(Duration::from_millis(500), subscription.recv())
        .await
        .is_ok()
    {}

    let page = reqwest::get(running.url("/")).await.unwrap();
    assert_eq!(page.status(), 200);

    running.stop().await;
    assert_eq!(
        upstream.starts.load(Ordering::SeqCst),
        upstream.disposals.load(Ordering::SeqCst)
    );
}

#[tokio::test]
async fn test_upstream_start_failure_is_fatal() {
    let (_temp, config) = project();
    let result = DevSession::start_with_engine(&config, Box::new(FailingBundler)).await;
    assert!(matches!(result, Err(CliError::Upstream(_))));
}

#[tokio::test]
async fn test_setup_failure_disposes_bundler() {
    let (_temp, mut config) = project();
    config.source_dir = "does-not-exist".into();
    let upstream = Arc::new(Upstream::default());

    let result =
        DevSession::start_with_engine(&config, Box::new(FakeBundler(upstream.clone()))).await;
    assert!(result.is_err());
    assert_eq!(upstream.starts.load(Ordering::SeqCst), 1);
    assert_eq!(upstream.disposals.load(Ordering::SeqCst), 1);
}
