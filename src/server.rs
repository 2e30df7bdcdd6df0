//! Thin HTTP/WebSocket surface for the operator UI.
//!
//! The UI itself lives elsewhere; this module only exposes what the
//! backup engine offers it: queueing tasks, reading fleet status,
//! restarting workers, and the progress-event stream.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use gy_core::EventBus;
use gy_db::queries::accounts;
use gy_db::{get_conn, DbPool};

use crate::scheduler::Scheduler;
use crate::tasks::{Task, TaskKind};

/// Shared state for all routes.
#[derive(Clone)]
pub struct AppContext {
    pub pool: DbPool,
    pub scheduler: Arc<Scheduler>,
    pub bus: Arc<EventBus>,
}

pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/api/tasks", post(add_tasks).get(list_tasks))
        .route("/api/workers", get(list_workers))
        .route("/api/workers/restart", post(restart_workers))
        .route("/api/events", get(events_ws))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Serve until the process ends.
pub async fn serve(listener: TcpListener, ctx: AppContext) -> std::io::Result<()> {
    axum::serve(listener, router(ctx)).await
}

// ---------------------------------------------------------------------------
// Task queue
// ---------------------------------------------------------------------------

/// `POST /api/tasks` payload: one task is created per
/// (task name, account id) pair.
#[derive(Debug, Deserialize)]
struct AddTasksRequest {
    tasks: Vec<String>,
    accounts: Vec<i64>,
}

#[derive(Debug, Serialize)]
struct AddTasksResponse {
    queued: usize,
    rejected: usize,
}

async fn add_tasks(
    State(ctx): State<AppContext>,
    Json(request): Json<AddTasksRequest>,
) -> impl IntoResponse {
    let mut queued = 0usize;
    let mut rejected = 0usize;

    for task_name in &request.tasks {
        let Some(kind) = TaskKind::from_name(task_name) else {
            tracing::warn!(task_name, "unknown task name ignored");
            rejected += request.accounts.len();
            continue;
        };
        for account_id in &request.accounts {
            let known = get_conn(&ctx.pool)
                .ok()
                .and_then(|conn| accounts::get_account(&conn, *account_id).ok())
                .flatten()
                .is_some();
            if !known {
                tracing::warn!(account_id, "unknown account ignored");
                rejected += 1;
                continue;
            }
            if ctx.scheduler.add_task(Task::new(kind, *account_id), false) {
                queued += 1;
            } else {
                rejected += 1;
            }
        }
    }

    ctx.scheduler.push_task();
    Json(AddTasksResponse { queued, rejected })
}

async fn list_tasks(State(ctx): State<AppContext>) -> impl IntoResponse {
    Json(ctx.scheduler.queued_tasks())
}

// ---------------------------------------------------------------------------
// Workers
// ---------------------------------------------------------------------------

async fn list_workers(State(ctx): State<AppContext>) -> impl IntoResponse {
    Json(ctx.scheduler.workers_status())
}

async fn restart_workers(State(ctx): State<AppContext>) -> impl IntoResponse {
    ctx.scheduler.stop_workers();
    match ctx.scheduler.start_workers() {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => {
            tracing::error!(error = %e, "worker restart failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// Progress events
// ---------------------------------------------------------------------------

async fn events_ws(State(ctx): State<AppContext>, upgrade: WebSocketUpgrade) -> impl IntoResponse {
    upgrade.on_upgrade(move |socket| forward_events(socket, ctx))
}

/// Forward every progress event to the subscriber verbatim.
async fn forward_events(mut socket: WebSocket, ctx: AppContext) {
    let mut events = ctx.bus.subscribe();
    loop {
        tokio::select! {
            event = events.recv() => {
                let Ok(event) = event else { break };
                let Ok(payload) = serde_json::to_string(&event) else { continue };
                if socket.send(Message::Text(payload)).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                // Subscribers only listen; any close or error ends the stream.
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
        }
    }
}
