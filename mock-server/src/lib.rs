use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// Date layout the service uses on the wire.
pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

/// Error key returned when a user with the same name already exists.
pub const DUPLICATE_KEY: &str = "already_exists_tckn";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub created_at: String,
}

#[derive(Deserialize)]
pub struct CreateUser {
    pub name: String,
}

/// Error body shared by every failing route.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error_key: String,
    pub title: String,
    pub status: u16,
    pub path: String,
}

pub type Db = Arc<RwLock<HashMap<Uuid, User>>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/{id}", get(get_user).delete(delete_user))
        .route("/health", get(health))
        .route("/broken", get(broken))
        .route("/unavailable", get(unavailable))
        .route("/garbage", get(garbage))
        .route("/slow", get(slow))
        .route("/echo", post(echo))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub fn format_date(date: &DateTime<Utc>) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn service_error(status: StatusCode, error_key: &str, path: &str) -> Response {
    let body = ErrorBody {
        error_key: error_key.to_string(),
        title: status.canonical_reason().unwrap_or("Error").to_string(),
        status: status.as_u16(),
        path: path.to_string(),
    };
    (status, Json(body)).into_response()
}

async fn list_users(State(db): State<Db>) -> Json<Vec<User>> {
    let users = db.read().await;
    let mut users: Vec<User> = users.values().cloned().collect();
    users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Json(users)
}

async fn create_user(State(db): State<Db>, Json(input): Json<CreateUser>) -> Response {
    if input.name.trim().is_empty() {
        return service_error(StatusCode::BAD_REQUEST, "invalid_name", "/users");
    }
    let mut users = db.write().await;
    if users.values().any(|user| user.name == input.name) {
        return service_error(StatusCode::CONFLICT, DUPLICATE_KEY, "/users");
    }
    let user = User {
        id: Uuid::new_v4(),
        name: input.name,
        created_at: format_date(&Utc::now()),
    };
    users.insert(user.id, user.clone());
    tracing::info!(id = %user.id, "user created");
    (StatusCode::CREATED, Json(user)).into_response()
}

async fn get_user(State(db): State<Db>, Path(id): Path<Uuid>) -> Response {
    let users = db.read().await;
    match users.get(&id) {
        Some(user) => Json(user.clone()).into_response(),
        None => service_error(StatusCode::NOT_FOUND, "not_found", &format!("/users/{id}")),
    }
}

async fn delete_user(State(db): State<Db>, Path(id): Path<Uuid>) -> Response {
    let mut users = db.write().await;
    match users.remove(&id) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => service_error(StatusCode::NOT_FOUND, "not_found", &format!("/users/{id}")),
    }
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn broken() -> Response {
    service_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "/broken")
}

async fn unavailable() -> StatusCode {
    StatusCode::SERVICE_UNAVAILABLE
}

async fn garbage() -> &'static str {
    "not json"
}

async fn slow() -> StatusCode {
    tokio::time::sleep(Duration::from_secs(2)).await;
    StatusCode::OK
}

/// Reject the request, returning its body verbatim as the error body.
async fn echo(body: Bytes) -> (StatusCode, Bytes) {
    (StatusCode::UNPROCESSABLE_ENTITY, body)
}
