//! Self-registration with the front server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use backoff::ExponentialBackoff;
use reqwest::multipart::Form;
use reqwest::StatusCode;

use crate::config::Config;

/// Deadline for a single registration request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// What the registration loop needs to know about this server.
#[derive(Debug, Clone)]
pub struct Registration {
    front_server_address: String,
    port: u16,
}

impl Registration {
    pub fn from_config(config: &Config) -> Self {
        Self {
            front_server_address: config.front_server_address.clone(),
            port: config.port,
        }
    }
}

/// Registers this chunk server with the front server under exponential
/// backoff, terminating the process when the budget is exhausted.
pub async fn run(registration: Registration) {
    if let Err(error) = register_with_backoff(&registration).await {
        tracing::error!(%error, "Failed to register chunk server");
        std::process::exit(1);
    }
}

async fn register_with_backoff(registration: &Registration) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()?;

    let hostname = gethostname::gethostname();
    let url = format!("http://{}:{}", hostname.to_string_lossy(), registration.port);
    let endpoint = format!(
        "{}/register_chunk_server",
        registration.front_server_address
    );

    let attempt = AtomicUsize::new(0);
    backoff::future::retry(ExponentialBackoff::default(), || {
        let n = attempt.fetch_add(1, Ordering::SeqCst) + 1;
        let client = client.clone();
        let endpoint = endpoint.clone();
        let url = url.clone();

        async move {
            register(&client, &endpoint, &url).await.map_err(|error| {
                tracing::error!(attempt = n, %error, "Failed to register chunk server");
                backoff::Error::transient(error)
            })
        }
    })
    .await?;

    Ok(())
}

async fn register(client: &reqwest::Client, endpoint: &str, url: &str) -> Result<()> {
    tracing::info!(front_server = endpoint, url, "Registering chunk server");

    let form = Form::new().text("url", url.to_string());
    let response = client
        .put(endpoint)
        .multipart(form)
        .send()
        .await
        .map_err(|e| anyhow!(e).context("failed to send PUT request"))?;

    if response.status() != StatusCode::OK {
        bail!("received non-OK HTTP status: {}", response.status());
    }
    Ok(())
}
