//! HTTP server implementation using Axum.

#[cfg(test)]
#[path = "http_server_test.rs"]
mod tests;

use axum::async_trait;
use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::{AuthResponse, LoginRequest, SignupRequest, TokenVerifier};
use crate::error::{Error, Result};
use crate::executor::{ExecutionRequest, ExecutionResult};
use crate::state::AppState;
use crate::store::{
    Language, Participant, Session, SessionPage, SessionUpdate, DEFAULT_PAGE_SIZE,
};

// Request types

#[derive(Deserialize)]
struct CreateSessionRequest {
    title: String,
    language: Language,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize)]
struct ListParams {
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
}

fn default_limit() -> usize {
    DEFAULT_PAGE_SIZE
}

/// The identity behind the request's bearer token. Rejects with 401 when the
/// header is missing or the external verifier does not accept the token.
pub struct AuthedUser(pub Participant);

#[async_trait]
impl FromRequestParts<AppState> for AuthedUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| Error::unauthorized("missing bearer token"))?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| Error::unauthorized("authorization header is not a bearer token"))?;

        let identity = state.auth.verify(token).await?;
        Ok(AuthedUser(identity))
    }
}

/// Builds the application router. Split from [`run_server`] so tests can bind
/// it to an ephemeral port.
pub fn router(state: AppState) -> Router {
    Router::new()
        // Identity (stand-in for the external provider)
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        // Session store
        .route("/sessions", post(create_session))
        .route("/sessions", get(list_sessions))
        .route("/sessions/:id", get(get_session))
        .route("/sessions/:id", put(update_session))
        .route("/sessions/:id", delete(delete_session))
        .route("/sessions/:id/execute", post(execute_code))
        .route("/sessions/:id/participants", get(get_participants))
        // Health check
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the HTTP server on the given port with the provided state.
pub async fn run_server(port: u16, state: AppState) {
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

async fn health() -> &'static str {
    "OK"
}

async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let res = state.auth.signup(req).await?;
    info!(user_id = %res.user.id, "signed up user");
    Ok((StatusCode::CREATED, Json(res)))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let res = state.auth.login(req).await?;
    Ok(Json(res))
}

async fn create_session(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<Session>)> {
    let session = state
        .store
        .create(&req.title, req.description, req.language, &user)
        .await?;
    info!(session_id = %session.id, "created session");
    Ok((StatusCode::CREATED, Json(session)))
}

async fn list_sessions(
    State(state): State<AppState>,
    AuthedUser(_): AuthedUser,
    Query(params): Query<ListParams>,
) -> Json<SessionPage> {
    Json(state.store.list(params.limit, params.offset).await)
}

async fn get_session(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
    Path(id): Path<String>,
) -> Result<Json<Session>> {
    // Viewing a session is joining it; repeat views are no-ops.
    state.store.add_participant(&id, &user).await?;
    let session = state.store.get(&id).await?;
    Ok(Json(session))
}

async fn update_session(
    State(state): State<AppState>,
    AuthedUser(_): AuthedUser,
    Path(id): Path<String>,
    Json(update): Json<SessionUpdate>,
) -> Result<Json<Session>> {
    let session = state.store.update(&id, update).await?;
    Ok(Json(session))
}

async fn delete_session(
    State(state): State<AppState>,
    AuthedUser(_): AuthedUser,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.store.delete(&id).await?;
    info!(session_id = %id, "deleted session");
    Ok(StatusCode::NO_CONTENT)
}

async fn execute_code(
    State(state): State<AppState>,
    AuthedUser(_): AuthedUser,
    Path(id): Path<String>,
    Json(req): Json<ExecutionRequest>,
) -> Result<Json<ExecutionResult>> {
    // The session must exist, but execution never touches its stored state.
    state.store.get(&id).await?;
    let result = state.executor.execute(&req).await?;
    Ok(Json(result))
}

async fn get_participants(
    State(state): State<AppState>,
    AuthedUser(_): AuthedUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<Participant>>> {
    let session = state.store.get(&id).await?;
    Ok(Json(session.participants))
}
