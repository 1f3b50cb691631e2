//! Failure-injection tests driving the upload pipeline against scripted
//! chunk servers.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use axum::extract::{Extension, Multipart, Query};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete as delete_method, get as get_method, put as put_method};
use axum::Router;
use bytes::Bytes;
use rand::RngCore;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use common::FileId;

/// A scripted chunk server that can fail its first `fail_puts` PUT
/// attempts and records every DELETE it sees.
#[derive(Default)]
struct MockChunkServer {
    fail_puts: usize,
    put_attempts: AtomicUsize,
    store: Mutex<HashMap<String, Bytes>>,
    deletes: Mutex<Vec<String>>,
}

#[derive(Deserialize)]
struct UuidParams {
    uuid: String,
}

async fn mock_put(
    Extension(state): Extension<Arc<MockChunkServer>>,
    mut multipart: Multipart,
) -> StatusCode {
    let mut uuid = None;
    let mut payload = None;
    while let Some(field) = multipart.next_field().await.unwrap() {
        match field.name() {
            Some("uuid") => uuid = Some(field.text().await.unwrap()),
            Some("file") => payload = Some(field.bytes().await.unwrap()),
            _ => {}
        }
    }

    let attempt = state.put_attempts.fetch_add(1, Ordering::SeqCst) + 1;
    if attempt <= state.fail_puts {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }

    state
        .store
        .lock()
        .unwrap()
        .insert(uuid.unwrap(), payload.unwrap());
    StatusCode::OK
}

async fn mock_get(
    Extension(state): Extension<Arc<MockChunkServer>>,
    Query(params): Query<UuidParams>,
) -> Response {
    match state.store.lock().unwrap().get(&params.uuid) {
        Some(bytes) => bytes.clone().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn mock_delete(
    Extension(state): Extension<Arc<MockChunkServer>>,
    Query(params): Query<UuidParams>,
) -> StatusCode {
    state.deletes.lock().unwrap().push(params.uuid.clone());
    if state.store.lock().unwrap().remove(&params.uuid).is_some() {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn start_mock(fail_puts: usize) -> (Arc<MockChunkServer>, String) {
    let state = Arc::new(MockChunkServer {
        fail_puts,
        ..Default::default()
    });
    let app = Router::new()
        .route("/put", put_method(mock_put))
        .route("/get", get_method(mock_get))
        .route("/delete", delete_method(mock_delete))
        .layer(Extension(Arc::clone(&state)));

    let server =
        axum::Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0))).serve(app.into_make_service());
    let addr = server.local_addr();
    tokio::spawn(server);

    (state, format!("http://{addr}"))
}

struct TestFront {
    base_url: String,
    client: reqwest::Client,
    _server: front_server::RunningServer,
}

async fn start_front(num_parts: usize) -> Result<TestFront> {
    let config = front_server::config::Config {
        listen: SocketAddr::from(([127, 0, 0, 1], 0)),
        num_parts,
        max_upload_size: 10 << 20,
    };
    let server = front_server::start(config).await?;

    Ok(TestFront {
        base_url: format!("http://{}", server.addr()),
        client: reqwest::Client::new(),
        _server: server,
    })
}

impl TestFront {
    async fn register(&self, url: &str) -> Result<()> {
        let response = self
            .client
            .put(format!("{}/register_chunk_server", self.base_url))
            .multipart(Form::new().text("url", url.to_string()))
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }

    async fn upload(&self, payload: Vec<u8>) -> Result<reqwest::Response> {
        let form = Form::new().part("file", Part::bytes(payload).file_name("file"));
        Ok(self
            .client
            .put(format!("{}/put", self.base_url))
            .multipart(form)
            .send()
            .await?)
    }
}

fn random_payload(len: usize) -> Vec<u8> {
    let mut payload = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut payload);
    payload
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn retries_absorb_a_transient_shard_failure() -> Result<()> {
    let front = start_front(6).await?;

    let mut mocks = Vec::new();
    for i in 0..6 {
        // One server 500s its first two PUT attempts, then recovers.
        let (mock, url) = start_mock(if i == 0 { 2 } else { 0 }).await;
        front.register(&url).await?;
        mocks.push(mock);
    }

    let payload = random_payload(1000);
    let response = front.upload(payload.clone()).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await?;
    let uuid = body["uuid"].as_str().expect("uuid field").to_string();

    assert!(mocks[0].put_attempts.load(Ordering::SeqCst) >= 3);

    let get = front
        .client
        .get(format!("{}/get?uuid={uuid}", front.base_url))
        .send()
        .await?;
    assert_eq!(get.status(), StatusCode::OK);
    assert_eq!(get.bytes().await?.as_ref(), payload.as_slice());

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn permanent_shard_failure_compensates_with_deletes() -> Result<()> {
    let front = start_front(6).await?;

    let mut mocks = Vec::new();
    for i in 0..6 {
        // One server never accepts a PUT.
        let (mock, url) = start_mock(if i == 0 { usize::MAX } else { 0 }).await;
        front.register(&url).await?;
        mocks.push(mock);
    }

    let response = front.upload(random_payload(1000)).await?;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    // The PUT retry budget was spent against the broken server.
    assert_eq!(mocks[0].put_attempts.load(Ordering::SeqCst), 6);

    // Every server in the plan saw a compensating delete for the same
    // file id, and nothing is left on disk anywhere.
    let uuid = {
        let deletes = mocks[0].deletes.lock().unwrap();
        assert!(!deletes.is_empty());
        deletes[0].clone()
    };
    assert!(FileId::new(uuid.clone()).is_ok());

    for mock in &mocks {
        let deletes = mock.deletes.lock().unwrap();
        assert!(!deletes.is_empty(), "server saw no delete");
        assert!(deletes.iter().all(|d| d == &uuid));
        assert!(mock.store.lock().unwrap().is_empty());
    }

    // No placement was recorded.
    let probe = front
        .client
        .get(format!("{}/get?uuid={uuid}", front.base_url))
        .send()
        .await?;
    assert_eq!(probe.status(), StatusCode::NOT_FOUND);

    Ok(())
}
