use axum::{
    Router,
    extract::{Path, State},
    routing::{get, post},
};
use cart_shared::auth::MessageResponse;
use cart_shared::tasks::TaskSchema;
use tracing::info;

use crate::auth::claims::Claims;
use crate::response::{ServerAppResult, ServerError, ServerResponse};
use crate::util::app_state::AppState;

pub fn create_route() -> Router<AppState> {
    Router::new()
        .route("/tasks", get(get_tasks))
        .route("/tasks/{name}/run", post(run_task))
}

async fn get_tasks(claims: Claims, State(state): State<AppState>) -> ServerAppResult<Vec<TaskSchema>> {
    claims.require_scope("tasks.run")?;

    Ok(ServerResponse::builder().body(state.tasks.list()).build())
}

async fn run_task(
    claims: Claims,
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ServerAppResult<MessageResponse> {
    claims.require_scope("tasks.run")?;

    let task = state
        .tasks
        .get(&name)
        .ok_or_else(|| ServerError::not_found(&format!("No task named {}", name)))?;
    if !task.manual_run() {
        return Err(ServerError::bad_request(&format!(
            "Task {} cannot be run manually",
            name
        )));
    }

    info!("Running task {} for {}", name, claims.username);
    task.run().await?;
    Ok(ServerResponse::builder()
        .body(MessageResponse {
            msg: format!("Task {} launched", name),
        })
        .accepted()
        .build())
}
