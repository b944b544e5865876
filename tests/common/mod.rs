//! Stub explorer and analysis endpoints for exercising the HTTP clients.
//!
//! An axum router serves `GET /api` and `POST /command` from one queue of
//! canned responses (the last one repeats) and records every request.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use tokio::net::TcpListener;

/// Request as seen by the stub
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedRequest {
    /// `GET /api` with its query string
    Explorer(HashMap<String, String>),
    /// `POST /command` with its JSON body
    Command(Value),
}

impl RecordedRequest {
    pub fn query(&self) -> Option<&HashMap<String, String>> {
        match self {
            RecordedRequest::Explorer(query) => Some(query),
            RecordedRequest::Command(_) => None,
        }
    }

    pub fn json(&self) -> Option<&Value> {
        match self {
            RecordedRequest::Command(body) => Some(body),
            RecordedRequest::Explorer(_) => None,
        }
    }
}

/// Canned reply
#[derive(Debug, Clone)]
pub struct StubResponse {
    pub status: u16,
    /// Sent verbatim, so it may be deliberately invalid JSON
    pub body: String,
    /// Delay before answering
    pub delay: Duration,
}

impl StubResponse {
    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Clone)]
struct StubState {
    responses: Arc<Mutex<VecDeque<StubResponse>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl StubState {
    fn next_response(&self) -> StubResponse {
        let mut queue = self.responses.lock().unwrap();
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap()
        }
    }

    async fn reply(&self, request: RecordedRequest) -> Response {
        self.requests.lock().unwrap().push(request);
        let response = self.next_response();

        if !response.delay.is_zero() {
            tokio::time::sleep(response.delay).await;
        }

        let status = StatusCode::from_u16(response.status).unwrap();
        (status, [(header::CONTENT_TYPE, "application/json")], response.body).into_response()
    }
}

async fn explorer(
    State(state): State<StubState>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    state.reply(RecordedRequest::Explorer(query)).await
}

async fn command(State(state): State<StubState>, Json(body): Json<Value>) -> Response {
    state.reply(RecordedRequest::Command(body)).await
}

pub struct StubServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl StubServer {
    pub async fn start(responses: Vec<StubResponse>) -> Self {
        assert!(!responses.is_empty(), "stub needs at least one response");

        let state = StubState {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            requests: Arc::new(Mutex::new(Vec::new())),
        };
        let requests = state.requests.clone();

        let app = Router::new()
            .route("/api", get(explorer))
            .route("/command", post(command))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, requests }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

/// Address nothing listens on
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/api", addr)
}
