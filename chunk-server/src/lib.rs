pub mod api;
pub mod config;
pub mod error;
pub mod register;
pub mod storage;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{extract::Extension, http::Uri, routing::get, Router, Server};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::{ErrorKind, ServerResult};
use crate::storage::LocalStorage;

/// Global server state.
#[derive(Debug, Clone)]
pub struct State {
    /// Handle to the shard store on disk.
    storage: Arc<LocalStorage>,
}
impl State {
    async fn new(config: &Config) -> Result<Arc<Self>> {
        let storage = Arc::new(LocalStorage::new(config.upload_dir.clone()).await?);

        Ok(Arc::new(Self { storage }))
    }
    /// Returns a handle to the shard store.
    fn storage(&self) -> Arc<LocalStorage> {
        Arc::clone(&self.storage)
    }
}

/// A chunk server bound to a local address, serving in the background.
///
/// Lets tests run the server on an ephemeral port without the
/// self-registration loop.
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
    let listen = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = State::new(&config).await?;
    let app = router(&config, state);

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

/// Runs the chunk server until interrupted, registering it with the
/// front server once the listener is bound.
pub async fn run_api_server(config: Config) -> Result<()> {
    tracing::info!("Starting chunk server...");

    let registration = register::Registration::from_config(&config);
    let server = start(config).await?;

    // The listener is up; the front server can reach us as soon as the
    // registration lands.
    tokio::spawn(register::run(registration));

    tracing::info!("Listening on {:?}...", server.addr());
    server.wait().await
}

fn router(config: &Config, state: Arc<State>) -> Router {
    Router::new()
        .merge(api::router(config))
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
    format!("Chunk server {}", env!("CARGO_PKG_VERSION"))
}

/// The fallback route.
#[axum_macros::debug_handler]
async fn fallback(_: Uri) -> ServerResult<()> {
    Err(ErrorKind::NotFound.into())
}
