//! Shared helpers for the test suite: a real server on an ephemeral port, a
//! scriptable execution backend, and view-condition waiting.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::auth::SignupRequest;
use crate::client::ApiClient;
use crate::error::Result;
use crate::executor::{ExecutionBackend, ExecutionRequest, ExecutionResult};
use crate::http_server;
use crate::state::AppState;
use crate::sync::{SessionView, SyncHandle};

/// Execution backend that records requests and returns a canned result after
/// an optional delay. Tracks the maximum number of concurrent executions.
pub struct MockBackend {
    pub result: Mutex<ExecutionResult>,
    pub delay: Duration,
    pub calls: Mutex<Vec<ExecutionRequest>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Self::with_delay(Duration::ZERO)
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            result: Mutex::new(ExecutionResult::ok("ok\n")),
            delay,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn last_code(&self) -> Option<String> {
        self.calls.lock().unwrap().last().map(|req| req.code.clone())
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ExecutionBackend for MockBackend {
    async fn execute(&self, req: &ExecutionRequest) -> Result<ExecutionResult> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.calls.lock().unwrap().push(req.clone());

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(self.result.lock().unwrap().clone())
    }
}

pub struct TestServer {
    pub base_url: String,
    pub state: AppState,
}

/// Binds the real router to an ephemeral port.
pub async fn spawn_server(executor: Arc<dyn ExecutionBackend>) -> TestServer {
    let state = AppState::new(executor);
    let app = http_server::router(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    TestServer {
        base_url: format!("http://{addr}"),
        state,
    }
}

/// Signs up a fresh user and returns a client authenticated as them.
pub async fn authed_client(server: &TestServer, username: &str) -> ApiClient {
    let res = ApiClient::signup(
        &server.base_url,
        &SignupRequest {
            username: username.to_string(),
            email: format!("{username}-{}@example.com", Uuid::new_v4()),
            password: "correct-horse-battery".to_string(),
        },
    )
    .await
    .unwrap();
    ApiClient::new(server.base_url.clone(), res.access_token)
}

/// Server whose single canned response the test can swap at any time. Every
/// method and path gets the current response; useful for driving a sync
/// client through failure and recovery sequences.
pub struct ScriptedServer {
    pub base_url: String,
    response: Arc<Mutex<(u16, String)>>,
}

impl ScriptedServer {
    pub async fn start(status: u16, body: impl Into<String>) -> Self {
        let response = Arc::new(Mutex::new((status, body.into())));
        let handler_response = response.clone();
        let handler = move || {
            let response = handler_response.clone();
            async move {
                let (status, body) = response.lock().unwrap().clone();
                (
                    axum::http::StatusCode::from_u16(status).unwrap(),
                    [(axum::http::header::CONTENT_TYPE, "application/json")],
                    body,
                )
            }
        };
        let app = axum::Router::new().fallback(handler);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            base_url: format!("http://{addr}"),
            response,
        }
    }

    pub fn respond_with(&self, status: u16, body: impl Into<String>) {
        *self.response.lock().unwrap() = (status, body.into());
    }
}

/// Waits until the published view satisfies the predicate, or panics after a
/// generous timeout.
pub async fn wait_for<F>(handle: &SyncHandle, pred: F) -> SessionView
where
    F: Fn(&SessionView) -> bool,
{
    let mut rx = handle.subscribe();
    tokio::time::timeout(Duration::from_secs(5), async move {
        loop {
            {
                let view = rx.borrow_and_update().clone();
                if pred(&view) {
                    return view;
                }
            }
            if rx.changed().await.is_err() {
                panic!("view channel closed before the condition was met");
            }
        }
    })
    .await
    .expect("condition not reached within timeout")
}
