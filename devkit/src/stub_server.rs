/**
 * STUB SERVER - Local HTTP rendition of the Conch REST contract
 *
 * ROLE: Serves a `MockApi` over axum so `HttpApi` can be exercised end to end
 * (cookies, status mapping, JSON shapes) without a real backend.
 *
 * SESSION: `POST /login` checks the mock's users and sets a `conch_session`
 * cookie. Every other route goes through `require_session`; a missing or
 * unknown cookie gets 401 with `{"error":"unauthorized"}`.
 *
 * The mock's failure queue and holds apply here too, since every handler
 * goes through the mock's `ConchApi` implementation.
 */

use crate::mock_api::MockApi;
use axum::extract::{Path, Query, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use conch_rack::models::{Assignments, Feedback, LoginRequest};
use conch_rack::{ConchApi, ConchError};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const SESSION_COOKIE: &str = "conch_session";

#[derive(Clone)]
struct StubState {
    api: MockApi,
    sessions: Arc<Mutex<HashSet<String>>>,
}

struct ApiError(ConchError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ConchError::Unauthorized => StatusCode::UNAUTHORIZED,
            ConchError::NotFound(_) => StatusCode::NOT_FOUND,
            ConchError::Conflict(_) => StatusCode::CONFLICT,
            ConchError::Status { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match &self.0 {
            ConchError::Unauthorized => "unauthorized".to_string(),
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<ConchError> for ApiError {
    fn from(e: ConchError) -> Self {
        ApiError(e)
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn unauthorized() -> Response {
    ApiError(ConchError::Unauthorized).into_response()
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
}

async fn require_session(State(stub): State<StubState>, req: Request, next: Next) -> Response {
    if req.uri().path() == "/login" {
        return next.run(req).await;
    }
    let valid = session_token(req.headers())
        .map(|token| stub.sessions.lock().unwrap().contains(&token))
        .unwrap_or(false);
    if !valid {
        log::info!("[stub] rejected {} {}: no session", req.method(), req.uri().path());
        return unauthorized();
    }
    next.run(req).await
}

pub fn build_router(api: MockApi) -> Router {
    let stub = StubState { api, sessions: Arc::new(Mutex::new(HashSet::new())) };
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(|| async { Json(json!({})) }))
        .route("/workspace", get(workspaces))
        .route("/workspace/{ws}/rack", get(rooms))
        .route("/workspace/{ws}/rack/{id}", get(rack))
        .route("/workspace/{ws}/rack/{id}/layout", post(layout))
        .route("/workspace/{ws}/relay", get(relays))
        .route("/device/{id}/location", get(location))
        .route("/feedback", post(feedback))
        .layer(middleware::from_fn_with_state(stub.clone(), require_session))
        .with_state(stub)
}

async fn login(State(stub): State<StubState>, Json(body): Json<LoginRequest>) -> Response {
    if !stub.api.verify_user(&body.user, &body.password) {
        return unauthorized();
    }
    let token = uuid::Uuid::new_v4().to_string();
    stub.sessions.lock().unwrap().insert(token.clone());
    log::info!("[stub] session opened for {}", body.user);
    (
        [(header::SET_COOKIE, format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly"))],
        Json(json!({})),
    )
        .into_response()
}

async fn logout(State(stub): State<StubState>, headers: HeaderMap) -> StatusCode {
    if let Some(token) = session_token(&headers) {
        stub.sessions.lock().unwrap().remove(&token);
    }
    StatusCode::NO_CONTENT
}

async fn workspaces(State(stub): State<StubState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(stub.api.workspaces().await?))
}

async fn rooms(State(stub): State<StubState>, Path(ws): Path<String>) -> ApiResult<impl IntoResponse> {
    Ok(Json(stub.api.rack_rooms(&ws).await?))
}

async fn rack(
    State(stub): State<StubState>,
    Path((ws, id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(stub.api.rack(&ws, &id).await?))
}

async fn layout(
    State(stub): State<StubState>,
    Path((ws, id)): Path<(String, String)>,
    Json(body): Json<Assignments>,
) -> ApiResult<StatusCode> {
    stub.api.assign_layout(&ws, &id, &body).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct RelayParams {
    active: Option<u8>,
}

async fn relays(
    State(stub): State<StubState>,
    Path(ws): Path<String>,
    Query(params): Query<RelayParams>,
) -> ApiResult<impl IntoResponse> {
    let active_only = params.active.unwrap_or(0) != 0;
    Ok(Json(stub.api.relays(&ws, active_only).await?))
}

async fn location(State(stub): State<StubState>, Path(id): Path<String>) -> ApiResult<Response> {
    match stub.api.device_location(&id).await? {
        Some(loc) => Ok(Json(loc).into_response()),
        None => Ok((StatusCode::CONFLICT, Json(json!({ "error": "device has no location" }))).into_response()),
    }
}

async fn feedback(State(stub): State<StubState>, Json(body): Json<Feedback>) -> ApiResult<StatusCode> {
    stub.api.send_feedback(&body).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Stub bound to an ephemeral localhost port. Stops when dropped.
pub struct StubServer {
    base_url: String,
    handle: JoinHandle<()>,
}

impl StubServer {
    pub async fn start(api: MockApi) -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = build_router(api);
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                log::error!("[stub] server stopped: {}", e);
            }
        });
        log::info!("[stub] listening on {}", addr);
        Ok(Self { base_url: format!("http://{addr}"), handle })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
