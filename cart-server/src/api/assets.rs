use axum::{
    Router,
    extract::{Multipart, Path, Query, State},
    routing::get,
};
use cart_shared::assets::{SaveSchema, ScreenshotSchema, StateSchema};
use mongodb::bson::{DateTime, oid::ObjectId};
use serde::Deserialize;

use crate::auth::claims::Claims;
use crate::models::assets::{SaveDoc, ScreenshotDoc, StateDoc};
use crate::models::rom::RomDoc;
use crate::response::{ServerAppResult, ServerError, ServerResponse, ServerResult};
use crate::scanner::filename;
use crate::util::app_state::AppState;

pub fn create_route() -> Router<AppState> {
    Router::new()
        .route("/saves", get(get_saves).post(upload_save))
        .route("/saves/{id}", axum::routing::delete(delete_save))
        .route("/states", get(get_states).post(upload_state))
        .route("/states/{id}", axum::routing::delete(delete_state))
        .route("/screenshots", get(get_screenshots).post(upload_screenshot))
        .route("/screenshots/{id}", axum::routing::delete(delete_screenshot))
}

#[derive(Debug, Deserialize)]
struct AssetQuery {
    rom_id: String,
    #[serde(default)]
    emulator: Option<String>,
}

/// Uploaded names must be plain file names; anything that could step out
/// of the assets tree is rejected.
pub(super) fn safe_upload_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('/') && !name.contains('\\') && !name.contains("..")
}

/// A multipart upload written to disk, with the name fields every asset
/// document shares.
struct UploadedAsset {
    file_name: String,
    file_name_no_tags: String,
    file_name_no_ext: String,
    file_extension: String,
    file_path: String,
    file_size_bytes: u64,
}

/// Writes the first multipart field under
/// `{kind}/{platform_slug}/{rom_file_name_no_ext}/{username}`.
async fn store_upload(
    state: &AppState,
    kind: &str,
    rom: &RomDoc,
    username: &str,
    multipart: &mut Multipart,
) -> ServerResult<UploadedAsset> {
    let field = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::bad_request(&format!("Invalid multipart body: {}", e)))?
        .ok_or_else(|| ServerError::bad_request("Missing file"))?;

    let file_name = field
        .file_name()
        .map(str::to_string)
        .filter(|n| safe_upload_name(n))
        .ok_or_else(|| ServerError::bad_request("Missing or invalid file name"))?;
    let data = field
        .bytes()
        .await
        .map_err(|e| ServerError::bad_request(&format!("Invalid multipart body: {}", e)))?;

    let rel_dir = format!(
        "{}/{}/{}/{}",
        kind, rom.platform_slug, rom.file_name_no_ext, username
    );
    let dir = state.config.assets_path.join(&rel_dir);
    tokio::fs::create_dir_all(&dir).await?;
    tokio::fs::write(dir.join(&file_name), &data).await?;

    let parsed = filename::parse(&file_name);
    Ok(UploadedAsset {
        file_name,
        file_name_no_tags: parsed.no_tags,
        file_name_no_ext: parsed.no_ext,
        file_extension: parsed.extension,
        file_path: rel_dir,
        file_size_bytes: data.len() as u64,
    })
}

async fn resolve_rom(state: &AppState, raw_id: &str) -> ServerResult<(ObjectId, RomDoc)> {
    let rom_id = ObjectId::parse_str(raw_id)?;
    let rom = RomDoc::get(&state.db, &rom_id)
        .await?
        .ok_or_else(|| ServerError::not_found("Rom not found"))?;
    Ok((rom_id, rom))
}

async fn get_saves(
    claims: Claims,
    State(state): State<AppState>,
    Query(query): Query<AssetQuery>,
) -> ServerAppResult<Vec<SaveSchema>> {
    claims.require_scope("assets.read")?;

    let (rom_id, _) = resolve_rom(&state, &query.rom_id).await?;
    let saves = SaveDoc::list_for_rom(&state.db, &rom_id, &claims.user_id)
        .await?
        .into_iter()
        .map(SaveDoc::to_schema)
        .collect();
    Ok(ServerResponse::builder().body(saves).build())
}

async fn upload_save(
    claims: Claims,
    State(state): State<AppState>,
    Query(query): Query<AssetQuery>,
    mut multipart: Multipart,
) -> ServerAppResult<SaveSchema> {
    claims.require_scope("assets.write")?;

    let (rom_id, rom) = resolve_rom(&state, &query.rom_id).await?;
    let upload = store_upload(&state, "saves", &rom, &claims.username, &mut multipart).await?;

    let now = DateTime::now();
    let save = SaveDoc::upsert(
        &state.db,
        SaveDoc {
            id: None,
            rom_id,
            user_id: claims.user_id,
            file_name: upload.file_name,
            file_name_no_tags: upload.file_name_no_tags,
            file_name_no_ext: upload.file_name_no_ext,
            file_extension: upload.file_extension,
            file_path: upload.file_path,
            file_size_bytes: upload.file_size_bytes,
            emulator: query.emulator,
            created_at: now,
            updated_at: now,
        },
    )
    .await?;
    Ok(ServerResponse::builder()
        .body(save.to_schema())
        .created()
        .build())
}

async fn delete_save(
    claims: Claims,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerAppResult<()> {
    claims.require_scope("assets.write")?;

    let id = ObjectId::parse_str(&id)?;
    let save = SaveDoc::get(&state.db, &id)
        .await?
        .ok_or_else(|| ServerError::not_found("Save not found"))?;
    if save.user_id != claims.user_id {
        return Err(ServerError::forbidden("Not your save"));
    }

    let path = state
        .config
        .assets_path
        .join(&save.file_path)
        .join(&save.file_name);
    if let Err(e) = tokio::fs::remove_file(&path).await {
        tracing::warn!("Could not delete {}: {}", path.display(), e);
    }
    SaveDoc::delete(&state.db, &id).await?;
    Ok(ServerResponse::builder().no_content().build())
}

async fn get_states(
    claims: Claims,
    State(state): State<AppState>,
    Query(query): Query<AssetQuery>,
) -> ServerAppResult<Vec<StateSchema>> {
    claims.require_scope("assets.read")?;

    let (rom_id, _) = resolve_rom(&state, &query.rom_id).await?;
    let states = StateDoc::list_for_rom(&state.db, &rom_id, &claims.user_id)
        .await?
        .into_iter()
        .map(StateDoc::to_schema)
        .collect();
    Ok(ServerResponse::builder().body(states).build())
}

async fn upload_state(
    claims: Claims,
    State(state): State<AppState>,
    Query(query): Query<AssetQuery>,
    mut multipart: Multipart,
) -> ServerAppResult<StateSchema> {
    claims.require_scope("assets.write")?;

    let (rom_id, rom) = resolve_rom(&state, &query.rom_id).await?;
    let upload = store_upload(&state, "states", &rom, &claims.username, &mut multipart).await?;

    let now = DateTime::now();
    let stored = StateDoc::upsert(
        &state.db,
        StateDoc {
            id: None,
            rom_id,
            user_id: claims.user_id,
            file_name: upload.file_name,
            file_name_no_tags: upload.file_name_no_tags,
            file_name_no_ext: upload.file_name_no_ext,
            file_extension: upload.file_extension,
            file_path: upload.file_path,
            file_size_bytes: upload.file_size_bytes,
            emulator: query.emulator,
            created_at: now,
            updated_at: now,
        },
    )
    .await?;
    Ok(ServerResponse::builder()
        .body(stored.to_schema())
        .created()
        .build())
}

async fn delete_state(
    claims: Claims,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerAppResult<()> {
    claims.require_scope("assets.write")?;

    let id = ObjectId::parse_str(&id)?;
    let stored = StateDoc::get(&state.db, &id)
        .await?
        .ok_or_else(|| ServerError::not_found("State not found"))?;
    if stored.user_id != claims.user_id {
        return Err(ServerError::forbidden("Not your state"));
    }

    let path = state
        .config
        .assets_path
        .join(&stored.file_path)
        .join(&stored.file_name);
    if let Err(e) = tokio::fs::remove_file(&path).await {
        tracing::warn!("Could not delete {}: {}", path.display(), e);
    }
    StateDoc::delete(&state.db, &id).await?;
    Ok(ServerResponse::builder().no_content().build())
}

async fn get_screenshots(
    claims: Claims,
    State(state): State<AppState>,
    Query(query): Query<AssetQuery>,
) -> ServerAppResult<Vec<ScreenshotSchema>> {
    claims.require_scope("assets.read")?;

    let (rom_id, _) = resolve_rom(&state, &query.rom_id).await?;
    let screenshots = ScreenshotDoc::list_for_rom(&state.db, &rom_id, &claims.user_id)
        .await?
        .into_iter()
        .map(ScreenshotDoc::to_schema)
        .collect();
    Ok(ServerResponse::builder().body(screenshots).build())
}

async fn upload_screenshot(
    claims: Claims,
    State(state): State<AppState>,
    Query(query): Query<AssetQuery>,
    mut multipart: Multipart,
) -> ServerAppResult<ScreenshotSchema> {
    claims.require_scope("assets.write")?;

    let (rom_id, rom) = resolve_rom(&state, &query.rom_id).await?;
    let upload =
        store_upload(&state, "screenshots", &rom, &claims.username, &mut multipart).await?;

    let now = DateTime::now();
    let stored = ScreenshotDoc::upsert(
        &state.db,
        ScreenshotDoc {
            id: None,
            rom_id,
            user_id: claims.user_id,
            file_name: upload.file_name,
            file_name_no_tags: upload.file_name_no_tags,
            file_name_no_ext: upload.file_name_no_ext,
            file_extension: upload.file_extension,
            file_path: upload.file_path,
            file_size_bytes: upload.file_size_bytes,
            created_at: now,
            updated_at: now,
        },
    )
    .await?;
    Ok(ServerResponse::builder()
        .body(stored.to_schema())
        .created()
        .build())
}

async fn delete_screenshot(
    claims: Claims,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerAppResult<()> {
    claims.require_scope("assets.write")?;

    let id = ObjectId::parse_str(&id)?;
    let stored = ScreenshotDoc::get(&state.db, &id)
        .await?
        .ok_or_else(|| ServerError::not_found("Screenshot not found"))?;
    if stored.user_id != claims.user_id {
        return Err(ServerError::forbidden("Not your screenshot"));
    }

    let path = state
        .config
        .assets_path
        .join(&stored.file_path)
        .join(&stored.file_name);
    if let Err(e) = tokio::fs::remove_file(&path).await {
        tracing::warn!("Could not delete {}: {}", path.display(), e);
    }
    ScreenshotDoc::delete(&state.db, &id).await?;
    Ok(ServerResponse::builder().no_content().build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traversal_names_are_rejected() {
        assert!(!safe_upload_name("../../../etc/anything"));
        assert!(!safe_upload_name("..\\..\\boot.ini"));
        assert!(!safe_upload_name("nested/name.srm"));
        assert!(!safe_upload_name(".."));
        assert!(!safe_upload_name(""));
    }

    #[test]
    fn plain_file_names_pass() {
        assert!(safe_upload_name("avatar.png"));
        assert!(safe_upload_name("Super Mario 64 (USA).srm"));
        assert!(safe_upload_name(".hidden"));
    }
}
