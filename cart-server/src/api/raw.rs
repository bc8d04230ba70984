use std::path::Component;

use axum::{Router, extract::{Path, State}, response::Response, routing::get};

use crate::api::roms::stream_file;
use crate::auth::claims::Claims;
use crate::response::ServerError;
use crate::util::app_state::AppState;

pub fn create_route() -> Router<AppState> {
    Router::new().route("/raw/assets/{*path}", get(get_raw_asset))
}

/// Serves a file from the assets tree by the relative path stored on the
/// asset documents. Path traversal outside the tree is rejected.
async fn get_raw_asset(
    claims: Claims,
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, ServerError> {
    claims.require_scope("assets.read")?;

    let rel = std::path::Path::new(&path);
    if rel
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(ServerError::bad_request("Invalid asset path"));
    }

    let file_name = rel
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ServerError::bad_request("Invalid asset path"))?
        .to_string();

    stream_file(&state.config.assets_path.join(rel), &file_name).await
}
