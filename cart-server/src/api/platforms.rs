use axum::{
    Router,
    extract::{Path, State},
    routing::get,
};
use cart_shared::platform::PlatformSchema;
use mongodb::bson::oid::ObjectId;

use crate::auth::claims::Claims;
use crate::models::platform::PlatformDoc;
use crate::response::{ServerAppResult, ServerError, ServerResponse};
use crate::util::app_state::AppState;

pub fn create_route() -> Router<AppState> {
    Router::new()
        .route("/platforms", get(get_platforms))
        .route("/platforms/{id}", get(get_platform).delete(delete_platform))
}

async fn get_platforms(
    claims: Claims,
    State(state): State<AppState>,
) -> ServerAppResult<Vec<PlatformSchema>> {
    claims.require_scope("platforms.read")?;

    let mut schemas = Vec::new();
    for platform in PlatformDoc::list(&state.db).await? {
        let rom_count = match &platform.id {
            Some(id) => PlatformDoc::rom_count(&state.db, id).await?,
            None => 0,
        };
        schemas.push(platform.to_schema(rom_count));
    }
    Ok(ServerResponse::builder().body(schemas).build())
}

async fn get_platform(
    claims: Claims,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerAppResult<PlatformSchema> {
    claims.require_scope("platforms.read")?;

    let id = ObjectId::parse_str(&id)?;
    let platform = PlatformDoc::get(&state.db, &id)
        .await?
        .ok_or_else(|| ServerError::not_found("Platform not found"))?;
    let rom_count = PlatformDoc::rom_count(&state.db, &id).await?;
    Ok(ServerResponse::builder()
        .body(platform.to_schema(rom_count))
        .build())
}

/// Removes the platform and all its roms, firmware and user assets from
/// the database. Files on disk are left alone.
async fn delete_platform(
    claims: Claims,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerAppResult<()> {
    claims.require_scope("platforms.write")?;

    let id = ObjectId::parse_str(&id)?;
    PlatformDoc::delete_cascade(&state.db, &id).await?;
    Ok(ServerResponse::builder().no_content().build())
}
