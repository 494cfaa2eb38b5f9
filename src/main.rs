//! dispatch-engine demo server.
//!
//! Loads configuration, builds a small application on the dispatch engine
//! and serves it over the plain or TLS transport until SIGINT/SIGTERM.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use http::header::HeaderValue;
use serde_json::{json, Value};

use dispatch_engine::config::{load_config, EngineConfig};
use dispatch_engine::http::{InputError, X_REQUEST_ID};
use dispatch_engine::lifecycle::wait_for_signal;
use dispatch_engine::observability::{init_logging, metrics};
use dispatch_engine::pipeline::{Handler, HandlerResult};
use dispatch_engine::routing::RouteTable;
use dispatch_engine::transport::{PlainTransport, TlsTransport};
use dispatch_engine::{Application, Driver, Engine};

#[derive(Parser)]
#[command(name = "dispatch-engine")]
#[command(about = "Request dispatch engine demo server", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address
    #[arg(short, long)]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind.to_string();
    }

    init_logging(&config.observability)?;
    tracing::info!("dispatch-engine v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?);
    }

    let app = Arc::new(demo_app(&config)?);
    let engine = Engine::new(app, &config.dispatch);
    let addr: SocketAddr = config.listener.bind_address.parse()?;

    let driver = match &config.listener.tls {
        Some(tls) => {
            let transport = TlsTransport::from_pem_files(Path::new(&tls.cert_path), Path::new(&tls.key_path)).await?;
            Driver::new(engine, transport)
        }
        None => Driver::new(engine, PlainTransport),
    }
    .with_max_connections(config.listener.max_connections);

    let handle = driver.start(addr.ip(), addr.port()).await?;
    tracing::info!(url = %handle, "Serving");

    let signal = wait_for_signal().await;
    tracing::info!(signal, "Shutdown signal received");
    driver.close().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn demo_app(config: &EngineConfig) -> Result<Application, Box<dyn std::error::Error>> {
    let routes = RouteTable::new()
        .get("/", vec![Handler::value(HandlerResult::Text("dispatch-engine".into()))])
        .get(
            "/hello/:name",
            vec![Handler::from_fn(|req| async move {
                let name = req.param("name").unwrap_or("world");
                Ok(HandlerResult::Text(format!("hello, {}", name)))
            })],
        )
        .post(
            "/echo",
            vec![Handler::from_fn(|req| async move {
                let body: Value = req.json()?;
                Ok(HandlerResult::Json(json!({ "echo": body })))
            })],
        )
        .get(
            "/square/:n",
            vec![Handler::from_fn(|req| async move {
                let n: i64 = req
                    .param("n")
                    .ok_or_else(|| InputError::new("missing n"))?
                    .parse()?;
                Ok(HandlerResult::Json(json!({ "n": n, "square": n.saturating_mul(n) })))
            })],
        );

    let app = Application::builder()
        .configure(config)?
        .resolver(routes)
        .finalizer(|req, res| {
            Box::pin(async move {
                res.headers_mut()
                    .insert(X_REQUEST_ID, HeaderValue::from_str(&req.id().to_string())?);
                Ok(())
            })
        })
        .on_startup(|app| {
            Box::pin(async move {
                tracing::info!(codecs = ?app.codecs().keys().collect::<Vec<_>>(), "Application starting");
                Ok(())
            })
        })
        .on_shutdown(|_app| {
            Box::pin(async move {
                tracing::info!("Application stopped");
                Ok(())
            })
        })
        .build();
    Ok(app)
}
