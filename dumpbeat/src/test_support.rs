//! Fake collection API and Consul agent for tests.

use crate::dump::Dump;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::{post, put};
use axum::{Json, Router};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Received {
    pub app: String,
    pub authorization: Option<String>,
    pub dump: Dump,
}

#[derive(Clone)]
struct CollectorState {
    status: StatusCode,
    received: Arc<Mutex<Vec<Received>>>,
}

/// HTTP server answering every `POST /{app}/add` with a fixed status.
pub struct Collector {
    pub url: String,
    received: Arc<Mutex<Vec<Received>>>,
}

impl Collector {
    pub async fn start(status: StatusCode) -> Self {
        let received = Arc::new(Mutex::new(Vec::new()));
        let state = CollectorState {
            status,
            received: received.clone(),
        };

        let app = Router::new()
            .route("/{app}/add", post(add_dump))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{}", addr),
            received,
        }
    }

    pub fn received(&self) -> Vec<Received> {
        self.received.lock().clone()
    }
}

async fn add_dump(
    State(state): State<CollectorState>,
    Path(app): Path<String>,
    headers: HeaderMap,
    Json(dump): Json<Dump>,
) -> StatusCode {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    state.received.lock().push(Received {
        app,
        authorization,
        dump,
    });

    state.status
}

#[derive(Clone)]
struct ConsulState {
    status: StatusCode,
    registered: Arc<Mutex<Vec<serde_json::Value>>>,
    deregistered: Arc<Mutex<Vec<String>>>,
}

/// Consul agent answering register and deregister calls with a fixed status.
pub struct FakeConsul {
    /// `host:port` of the agent
    pub host: String,
    registered: Arc<Mutex<Vec<serde_json::Value>>>,
    deregistered: Arc<Mutex<Vec<String>>>,
}

impl FakeConsul {
    pub async fn start(status: StatusCode) -> Self {
        let state = ConsulState {
            status,
            registered: Arc::new(Mutex::new(Vec::new())),
            deregistered: Arc::new(Mutex::new(Vec::new())),
        };
        let registered = state.registered.clone();
        let deregistered = state.deregistered.clone();

        let app = Router::new()
            .route("/v1/agent/service/register", put(register_service))
            .route("/v1/agent/service/deregister/{id}", put(deregister_service))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            host: addr.to_string(),
            registered,
            deregistered,
        }
    }

    pub fn registered(&self) -> Vec<serde_json::Value> {
        self.registered.lock().clone()
    }

    pub fn deregistered(&self) -> Vec<String> {
        self.deregistered.lock().clone()
    }
}

async fn register_service(State(state): State<ConsulState>, Json(body): Json<serde_json::Value>) -> StatusCode {
    state.registered.lock().push(body);
    state.status
}

async fn deregister_service(State(state): State<ConsulState>, Path(id): Path<String>) -> StatusCode {
    state.deregistered.lock().push(id);
    state.status
}
