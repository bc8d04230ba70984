use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, put},
};
use cart_shared::config::{AddExclusionBody, ConfigResponse};
use cart_shared::roles::Role;
use serde::Deserialize;

use crate::auth::claims::Claims;
use crate::response::{ServerAppResult, ServerResponse};
use crate::util::app_state::AppState;

pub fn create_route() -> Router<AppState> {
    Router::new()
        .route("/config", get(get_config))
        .route(
            "/config/exclusions",
            put(add_exclusion).delete(remove_exclusion),
        )
        .route("/config/platforms", put(bind_platform))
        .route("/config/platforms/{fs_slug}", delete(unbind_platform))
}

#[derive(Debug, Deserialize)]
struct BindPlatformBody {
    fs_slug: String,
    slug: String,
}

/// Unauthenticated, like the heartbeat: the UI needs the folder names
/// and exclusion lists before login.
async fn get_config(State(state): State<AppState>) -> ServerAppResult<ConfigResponse> {
    Ok(ServerResponse::builder()
        .body(state.library_config.to_response())
        .build())
}

async fn add_exclusion(
    claims: Claims,
    State(state): State<AppState>,
    Json(body): Json<AddExclusionBody>,
) -> ServerAppResult<ConfigResponse> {
    claims.require_role(Role::Admin)?;

    state
        .library_config
        .add_exclusion(&body.exclusion_type, &body.exclusion_value)?;
    Ok(ServerResponse::builder()
        .body(state.library_config.to_response())
        .build())
}

async fn remove_exclusion(
    claims: Claims,
    State(state): State<AppState>,
    Json(body): Json<AddExclusionBody>,
) -> ServerAppResult<ConfigResponse> {
    claims.require_role(Role::Admin)?;

    state
        .library_config
        .remove_exclusion(&body.exclusion_type, &body.exclusion_value)?;
    Ok(ServerResponse::builder()
        .body(state.library_config.to_response())
        .build())
}

async fn bind_platform(
    claims: Claims,
    State(state): State<AppState>,
    Json(body): Json<BindPlatformBody>,
) -> ServerAppResult<ConfigResponse> {
    claims.require_role(Role::Admin)?;

    state
        .library_config
        .add_platform_binding(&body.fs_slug, &body.slug)?;
    Ok(ServerResponse::builder()
        .body(state.library_config.to_response())
        .build())
}

async fn unbind_platform(
    claims: Claims,
    State(state): State<AppState>,
    Path(fs_slug): Path<String>,
) -> ServerAppResult<ConfigResponse> {
    claims.require_role(Role::Admin)?;

    state.library_config.remove_platform_binding(&fs_slug)?;
    Ok(ServerResponse::builder()
        .body(state.library_config.to_response())
        .build())
}
