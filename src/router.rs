use std::net::TcpListener;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::error::ServiceError;
use crate::models::{
  FallbackRequest, HealthResponse, IdentifyRequest, Language, SessionCreated, SessionSpeechRequest,
  SpeechStartRequest,
};
use crate::service::LandmarkService;

const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

pub struct RouterState {
  pub started_at: Instant,
  pub service: LandmarkService,
}

pub fn build_router(state: RouterState) -> Router {
  Router::new()
    .route("/health", get(health))
    .route("/v1/sessions", post(create_session))
    .route("/v1/sessions/:id", get(get_session).delete(delete_session))
    .route("/v1/sessions/:id/identify", post(identify))
    .route("/v1/sessions/:id/fallback", post(fallback))
    .route("/v1/sessions/:id/speech", post(session_speech))
    .route("/v1/speech/start", post(speech_start))
    .route("/v1/speech/stop", post(speech_stop))
    .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
    .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
    .with_state(Arc::new(state))
}

pub async fn run_router(listener: TcpListener, state: RouterState) -> anyhow::Result<()> {
  let app = build_router(state);
  listener.set_nonblocking(true)?;
  let listener = tokio::net::TcpListener::from_std(listener)?;
  axum::serve(listener, app).await?;
  Ok(())
}

async fn health(State(state): State<Arc<RouterState>>) -> Json<HealthResponse> {
  Json(HealthResponse {
    status: "ok".to_string(),
    version: env!("CARGO_PKG_VERSION").to_string(),
    uptime_ms: state.started_at.elapsed().as_millis(),
    credential_configured: state.service.credential_configured(),
  })
}

async fn create_session(State(state): State<Arc<RouterState>>) -> impl IntoResponse {
  let session_id = state.service.create_session();
  (StatusCode::CREATED, Json(SessionCreated { session_id }))
}

type SessionPath = Result<Path<Uuid>, PathRejection>;

fn session_id(path: SessionPath) -> Result<Uuid, Response> {
  path
    .map(|Path(id)| id)
    .map_err(|rejection| {
      error_response(StatusCode::BAD_REQUEST, "invalid_session_id", &rejection.body_text())
    })
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
  body
    .map(|Json(value)| value)
    .map_err(|rejection| {
      error_response(rejection.status(), "invalid_request", &rejection.body_text())
    })
}

fn language(tag: Option<&str>) -> Result<Language, Response> {
  Language::from_request(tag).map_err(service_error)
}

async fn get_session(State(state): State<Arc<RouterState>>, path: SessionPath) -> Response {
  let id = match session_id(path) {
    Ok(id) => id,
    Err(resp) => return resp,
  };
  match state.service.session_view(id) {
    Ok(view) => (StatusCode::OK, Json(view)).into_response(),
    Err(err) => service_error(err),
  }
}

async fn delete_session(State(state): State<Arc<RouterState>>, path: SessionPath) -> Response {
  let id = match session_id(path) {
    Ok(id) => id,
    Err(resp) => return resp,
  };
  match state.service.delete_session(id) {
    Ok(()) => StatusCode::NO_CONTENT.into_response(),
    Err(err) => service_error(err),
  }
}

async fn identify(
  State(state): State<Arc<RouterState>>,
  path: SessionPath,
  body: Result<Json<IdentifyRequest>, JsonRejection>,
) -> Response {
  let (id, req, lang) = match session_id(path).and_then(|id| {
    let req = json_body(body)?;
    let lang = language(req.language.as_deref())?;
    Ok((id, req, lang))
  }) {
    Ok(parts) => parts,
    Err(resp) => return resp,
  };
  match state.service.identify(id, &req.image, lang).await {
    Ok(view) => (StatusCode::OK, Json(view)).into_response(),
    Err(err) => service_error(err),
  }
}

async fn fallback(
  State(state): State<Arc<RouterState>>,
  path: SessionPath,
  body: Result<Json<FallbackRequest>, JsonRejection>,
) -> Response {
  let (id, req, lang) = match session_id(path).and_then(|id| {
    let req = json_body(body)?;
    let lang = language(req.language.as_deref())?;
    Ok((id, req, lang))
  }) {
    Ok(parts) => parts,
    Err(resp) => return resp,
  };
  match state.service.fallback(id, &req.name, lang).await {
    Ok(view) => (StatusCode::OK, Json(view)).into_response(),
    Err(err) => service_error(err),
  }
}

async fn session_speech(
  State(state): State<Arc<RouterState>>,
  path: SessionPath,
  body: Result<Json<SessionSpeechRequest>, JsonRejection>,
) -> Response {
  let (id, lang) = match session_id(path).and_then(|id| {
    let req = json_body(body)?;
    Ok((id, language(req.language.as_deref())?))
  }) {
    Ok(parts) => parts,
    Err(resp) => return resp,
  };
  match state.service.speak(id, lang) {
    Ok(()) => StatusCode::NO_CONTENT.into_response(),
    Err(err) => service_error(err),
  }
}

async fn speech_start(
  State(state): State<Arc<RouterState>>,
  body: Result<Json<SpeechStartRequest>, JsonRejection>,
) -> Response {
  match json_body(body) {
    Ok(req) => {
      state.service.speak_text(&req.text, &req.language);
      StatusCode::NO_CONTENT.into_response()
    }
    Err(resp) => resp,
  }
}

async fn speech_stop(State(state): State<Arc<RouterState>>) -> StatusCode {
  state.service.stop_speech();
  StatusCode::NO_CONTENT
}

fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
  let body = Json(serde_json::json!({ "error": message, "code": code }));
  (status, body).into_response()
}

fn service_error(err: ServiceError) -> Response {
  error_response(err.status(), err.code(), &err.to_string())
}
