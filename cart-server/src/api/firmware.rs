use axum::{
    Router,
    extract::{Path, Query, State},
    response::Response,
    routing::get,
};
use cart_shared::firmware::FirmwareSchema;
use mongodb::bson::oid::ObjectId;
use serde::Deserialize;

use crate::api::roms::stream_file;
use crate::auth::claims::Claims;
use crate::models::firmware::FirmwareDoc;
use crate::response::{ServerAppResult, ServerError, ServerResponse};
use crate::util::app_state::AppState;

pub fn create_route() -> Router<AppState> {
    Router::new()
        .route("/firmware", get(get_firmware))
        .route("/firmware/{id}/content", get(download_firmware))
}

#[derive(Debug, Deserialize, Default)]
struct FirmwareQuery {
    #[serde(default)]
    platform_id: Option<String>,
}

async fn get_firmware(
    claims: Claims,
    State(state): State<AppState>,
    Query(query): Query<FirmwareQuery>,
) -> ServerAppResult<Vec<FirmwareSchema>> {
    claims.require_scope("firmware.read")?;

    let platform_id = match &query.platform_id {
        Some(id) => Some(ObjectId::parse_str(id)?),
        None => None,
    };

    let firmware = FirmwareDoc::list(&state.db, platform_id.as_ref())
        .await?
        .into_iter()
        .map(FirmwareDoc::to_schema)
        .collect();
    Ok(ServerResponse::builder().body(firmware).build())
}

async fn download_firmware(
    claims: Claims,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServerError> {
    claims.require_scope("firmware.read")?;

    let id = ObjectId::parse_str(&id)?;
    let firmware = FirmwareDoc::get(&state.db, &id)
        .await?
        .ok_or_else(|| ServerError::not_found("Firmware not found"))?;

    let path = state
        .config
        .library_path
        .join(&firmware.file_path)
        .join(&firmware.file_name);
    stream_file(&path, &firmware.file_name).await
}
