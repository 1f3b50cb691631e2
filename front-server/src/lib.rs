pub mod allocation;
pub mod api;
pub mod chunker;
pub mod config;
pub mod download;
pub mod error;
pub mod registry;
pub mod upload;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{extract::Extension, http::Uri, routing::get, Router, Server};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::allocation::AllocationMap;
use crate::config::Config;
use crate::error::{ErrorKind, ServerResult};
use crate::registry::Registry;

/// Deadline for every outbound request to a chunk server.
pub(crate) const CHUNK_SERVER_TIMEOUT: Duration = Duration::from_secs(30);

/// Global server state.
#[derive(Debug, Clone)]
pub struct State {
    /// The front server configuration.
    config: Config,
    /// Catalog of registered chunk servers.
    registry: Arc<Registry>,
    /// Placement record of uploaded files.
    allocation_map: Arc<AllocationMap>,
    /// HTTP client shared by the upload and download pipelines.
    http_client: reqwest::Client,
}
impl State {
    fn new(config: Config) -> Result<Arc<Self>> {
        let http_client = reqwest::Client::builder()
            .timeout(CHUNK_SERVER_TIMEOUT)
            .build()?;

        Ok(Arc::new(Self {
            config,
            registry: Arc::new(Registry::new()),
            allocation_map: Arc::new(AllocationMap::new()),
            http_client,
        }))
    }
    /// Returns a handle to the chunk server registry.
    fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }
    /// Returns a handle to the allocation map.
    fn allocation_map(&self) -> Arc<AllocationMap> {
        Arc::clone(&self.allocation_map)
    }
}

/// A front server bound to a local address, serving in the background.
///
/// Lets tests run the coordinator on an ephemeral port.
pub struct RunningServer {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<Result<()>>,
}
impl RunningServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
    /// Stops the server and waits for in-flight requests to finish.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown.send(());
        self.task.await?
    }
    /// Waits for the server to exit on its own.
    pub async fn wait(self) -> Result<()> {
        self.task.await?
    }
}

/// Binds the API server and serves it in a background task.
pub async fn start(config: Config) -> Result<RunningServer> {
    let listen = config.listen;
    let state = State::new(config)?;
    let app = router(state);

    let server = Server::try_bind(&listen)?.serve(app.into_make_service());
    let addr = server.local_addr();

    let (shutdown, rx) = oneshot::channel();
    let graceful = server.with_graceful_shutdown(async move {
        tokio::select! {
            _ = shutdown_signal() => {},
            _ = rx => {},
        }
    });
    let task = tokio::spawn(async move { graceful.await.map_err(Into::into) });

    Ok(RunningServer {
        addr,
        shutdown,
        task,
    })
}

/// Runs the API server until interrupted.
pub async fn run_api_server(config: Config) -> Result<()> {
    tracing::info!("Starting front server...");

    let server = start(config).await?;
    tracing::info!("Listening on {:?}...", server.addr());
    server.wait().await
}

fn router(state: Arc<State>) -> Router {
    Router::new()
        .merge(api::router(&state.config))
        .route("/", get(home))
        .fallback(fallback)
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "Failed to listen for the shutdown signal");
        std::future::pending::<()>().await;
    }
}

/// The home route.
async fn home() -> String {
    format!("Front server {}", env!("CARGO_PKG_VERSION"))
}

/// The fallback route.
#[axum_macros::debug_handler]
async fn fallback(_: Uri) -> ServerResult<()> {
    Err(ErrorKind::NotFound.into())
}
