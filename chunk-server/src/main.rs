use anyhow::Result;

use chunk_server::{config::Config, run_api_server};

#[tokio::main]
async fn main() -> Result<()> {
    dump_version();
    tracing_subscriber::fmt::init();

    let config = Config::load()?;

    run_api_server(config).await?;

    Ok(())
}

fn dump_version() {
    #[cfg(debug_assertions)]
    eprintln!("Chunk server {} (debug)", env!("CARGO_PKG_VERSION"));
    #[cfg(not(debug_assertions))]
    eprintln!("Chunk server {} (release)", env!("CARGO_PKG_VERSION"));
}
