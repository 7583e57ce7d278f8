use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Todo {
    pub id: String,
    pub title: String,
    pub completed: bool,
}

#[derive(Deserialize)]
pub struct CreateTodo {
    pub title: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Deserialize)]
pub struct UpdateTodo {
    pub title: Option<String>,
    pub completed: Option<bool>,
}

/// Insertion-ordered store; list responses follow this order.
pub type Db = Arc<RwLock<Vec<Todo>>>;

type ApiError = (StatusCode, Json<Value>);

pub fn app() -> Router {
    app_with(Vec::new())
}

/// Router preloaded with the demo todos.
pub fn seeded_app() -> Router {
    app_with(seed_todos())
}

pub fn app_with(todos: Vec<Todo>) -> Router {
    let db: Db = Arc::new(RwLock::new(todos));
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/todos", get(list_todos).post(create_todo))
        .route(
            "/api/v1/todos/{id}",
            get(get_todo).put(update_todo).delete(delete_todo),
        )
        .with_state(db)
}

pub fn seed_todos() -> Vec<Todo> {
    [
        ("Learn Go Gin", false),
        ("Build a REST API", true),
        ("Write Unit Tests", false),
    ]
    .into_iter()
    .map(|(title, completed)| Todo {
        id: Uuid::new_v4().to_string(),
        title: title.to_string(),
        completed,
    })
    .collect()
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_seeded(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, seeded_app()).await
}

fn bad_request(message: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({"error": message.into()})))
}

fn not_found() -> ApiError {
    (StatusCode::NOT_FOUND, Json(json!({"error": "Todo not found"})))
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn list_todos(State(db): State<Db>) -> Json<Vec<Todo>> {
    Json(db.read().await.clone())
}

async fn create_todo(
    State(db): State<Db>,
    input: Result<Json<CreateTodo>, JsonRejection>,
) -> Result<(StatusCode, Json<Todo>), ApiError> {
    let Json(input) = input.map_err(|rejection| bad_request(rejection.body_text()))?;
    if input.title.trim().is_empty() {
        return Err(bad_request("title is required"));
    }
    let todo = Todo {
        id: Uuid::new_v4().to_string(),
        title: input.title,
        completed: input.completed,
    };
    db.write().await.push(todo.clone());
    tracing::info!(id = %todo.id, "created todo");
    Ok((StatusCode::CREATED, Json(todo)))
}

async fn get_todo(State(db): State<Db>, Path(id): Path<String>) -> Result<Json<Todo>, ApiError> {
    let todos = db.read().await;
    todos
        .iter()
        .find(|t| t.id == id)
        .cloned()
        .map(Json)
        .ok_or_else(not_found)
}

async fn update_todo(
    State(db): State<Db>,
    Path(id): Path<String>,
    input: Result<Json<UpdateTodo>, JsonRejection>,
) -> Result<Json<Todo>, ApiError> {
    let Json(input) = input.map_err(|rejection| bad_request(rejection.body_text()))?;
    let mut todos = db.write().await;
    let todo = todos.iter_mut().find(|t| t.id == id).ok_or_else(not_found)?;
    if let Some(title) = input.title {
        todo.title = title;
    }
    if let Some(completed) = input.completed {
        todo.completed = completed;
    }
    tracing::info!(%id, "updated todo");
    Ok(Json(todo.clone()))
}

async fn delete_todo(State(db): State<Db>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    let mut todos = db.write().await;
    let index = todos.iter().position(|t| t.id == id).ok_or_else(not_found)?;
    todos.remove(index);
    tracing::info!(%id, "deleted todo");
    Ok(StatusCode::NO_CONTENT)
}
