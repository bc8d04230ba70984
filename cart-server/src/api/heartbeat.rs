use axum::{Router, extract::State, routing::get};
use cart_shared::heartbeat::HeartbeatResponse;

use crate::response::{ServerAppResult, ServerResponse};
use crate::updates::VERSION;
use crate::util::app_state::AppState;
use crate::watcher;

pub fn create_route() -> Router<AppState> {
    Router::new().route("/heartbeat", get(get_heartbeat))
}

/// Unauthenticated: the web UI polls this before anyone has logged in.
/// Field names and presence are a fixed contract; subsystems fill their
/// slots with whatever shape they report.
async fn get_heartbeat(State(state): State<AppState>) -> ServerAppResult<HeartbeatResponse> {
    Ok(ServerResponse::builder()
        .body(HeartbeatResponse {
            version: VERSION.to_string(),
            new_version: state.updates.new_version(),
            watcher: watcher::status(&state.config),
            scheduler: state.tasks.heartbeat_report(),
            any_source_enabled: state.metadata.any_enabled(),
            metadata_sources: state.metadata.heartbeat_report(),
        })
        .build())
}
