//! HTTP API surface.
//!
//! Every route maps 1:1 onto an orchestrator operation and answers with a
//! `{"success": true, ...}` envelope, or `{"success": false, "message"}` with
//! a status derived from the error class.

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::info;

use wa_core::{Error, SessionManager};

pub fn router(manager: SessionManager) -> Router {
	Router::new()
		.route("/api/status", get(status))
		.route("/api/qrcode", get(qrcode))
		.route("/api/sessions", get(list_sessions).post(create_session))
		.route("/api/sessions/{name}", axum::routing::delete(delete_session))
		.route("/api/contacts", get(contacts))
		.route("/api/messages", post(send_message))
		.route("/api/check-number", get(check_number))
		.with_state(manager)
}

/// Serves the API until `shutdown` resolves, then drains all sessions.
pub async fn serve(
	manager: SessionManager,
	listener: TcpListener,
	shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
	let app = router(manager.clone());
	info!(target = "wa.http", addr = %listener.local_addr()?, "listening");

	axum::serve(listener, app.into_make_service())
		.with_graceful_shutdown(shutdown)
		.await?;

	info!(target = "wa.http", "shutdown signal received; draining sessions");
	manager.shutdown_all().await;
	Ok(())
}

/// Orchestrator error carried out of a handler.
struct ApiError(Error);

impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		Self(err)
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let status = status_for(&self.0);
		let body = json!({ "success": false, "message": self.0.to_string() });
		(status, axum::Json(body)).into_response()
	}
}

fn status_for(err: &Error) -> StatusCode {
	match err {
		Error::Validation(_) => StatusCode::BAD_REQUEST,
		Error::SessionNotFound(_) => StatusCode::NOT_FOUND,
		Error::AlreadyExists(_) | Error::SessionNotReady(_) => StatusCode::CONFLICT,
		Error::QrTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
		Error::DestroyFailed { .. } | Error::Upstream(_) => StatusCode::BAD_GATEWAY,
	}
}

type ApiResult = std::result::Result<Response, ApiError>;

fn ok(body: serde_json::Value) -> Response {
	axum::Json(body).into_response()
}

fn default_session() -> String {
	"default".to_string()
}

#[derive(Deserialize)]
struct SessionQuery {
	#[serde(default = "default_session")]
	session: String,
}

async fn status(State(manager): State<SessionManager>) -> Response {
	ok(json!({
		"status": "API Online",
		"sessions": manager.registry().len(),
		"clients": manager.registry().names(),
	}))
}

async fn qrcode(
	State(manager): State<SessionManager>,
	Query(query): Query<SessionQuery>,
) -> ApiResult {
	let payload = manager.await_qr(&query.session).await?;
	Ok(ok(json!({
		"success": true,
		"session": query.session,
		"qrCode": payload,
	})))
}

async fn list_sessions(State(manager): State<SessionManager>) -> Response {
	ok(json!({
		"success": true,
		"sessions": manager.registry().summaries(),
	}))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionBody {
	#[serde(default)]
	session_name: String,
}

async fn create_session(
	State(manager): State<SessionManager>,
	axum::Json(body): axum::Json<CreateSessionBody>,
) -> ApiResult {
	manager.create_session(&body.session_name)?;
	let body = json!({
		"success": true,
		"message": "Session created. Scan the QR code to connect.",
	});
	Ok((StatusCode::CREATED, axum::Json(body)).into_response())
}

async fn delete_session(
	State(manager): State<SessionManager>,
	Path(name): Path<String>,
) -> ApiResult {
	manager.destroy_session(&name).await?;
	Ok(ok(json!({
		"success": true,
		"message": format!("Session '{name}' disconnected"),
	})))
}

async fn contacts(
	State(manager): State<SessionManager>,
	Query(query): Query<SessionQuery>,
) -> ApiResult {
	let contacts = manager.list_contacts(&query.session).await?;
	Ok(ok(json!({
		"success": true,
		"total": contacts.len(),
		"contacts": contacts,
	})))
}

#[derive(Deserialize)]
struct SendMessageBody {
	#[serde(default)]
	number: String,
	#[serde(default)]
	message: String,
	#[serde(default = "default_session")]
	session: String,
}

async fn send_message(
	State(manager): State<SessionManager>,
	axum::Json(body): axum::Json<SendMessageBody>,
) -> ApiResult {
	let message_id = manager
		.send_message(&body.session, &body.number, &body.message)
		.await?;
	Ok(ok(json!({
		"success": true,
		"message": "Message sent",
		"messageId": message_id,
	})))
}

#[derive(Deserialize)]
struct CheckNumberQuery {
	#[serde(default)]
	number: String,
	#[serde(default = "default_session")]
	session: String,
}

async fn check_number(
	State(manager): State<SessionManager>,
	Query(query): Query<CheckNumberQuery>,
) -> ApiResult {
	let registered = manager.check_registered(&query.session, &query.number).await?;
	Ok(ok(json!({
		"success": true,
		"registered": registered,
	})))
}
