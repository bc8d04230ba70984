use axum::{
    Json, Router,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, header},
    response::Response,
    routing::{get, post, put},
};
use cart_shared::rom::{DeleteRomsBody, NoteSchema, RomSchema, UpdateNoteBody, UpdateRomBody};
use mongodb::bson::oid::ObjectId;
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tracing::info;

use crate::auth::claims::Claims;
use crate::models::assets::{SaveDoc, ScreenshotDoc, StateDoc};
use crate::models::note::NoteDoc;
use crate::models::rom::{RomDoc, RomFilter};
use crate::response::{
    ResponsePagination, ServerAppResult, ServerError, ServerResponse, ServerResult,
};
use crate::util::app_state::AppState;
use crate::util::pagination::RequestPagination;

pub fn create_route() -> Router<AppState> {
    Router::new()
        .route("/roms", get(get_roms))
        .route("/roms/delete", post(delete_roms))
        .route("/roms/{id}", get(get_rom).put(update_rom))
        .route("/roms/{id}/content", get(download_rom))
        .route("/roms/{id}/note", put(update_note).get(get_note).delete(delete_note))
}

#[derive(Debug, Deserialize, Default)]
struct RomListQuery {
    #[serde(default)]
    platform_id: Option<String>,
    #[serde(default)]
    search_term: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct DownloadQuery {
    /// For multi-part games, the single part to download instead of the
    /// whole directory listing.
    #[serde(default)]
    file_name: Option<String>,
}

/// Paginated listing. The per-user asset lists are left empty here and
/// only populated on the detail endpoint.
async fn get_roms(
    claims: Claims,
    State(state): State<AppState>,
    pagination: RequestPagination,
    Query(query): Query<RomListQuery>,
) -> ServerAppResult<Vec<RomSchema>> {
    claims.require_scope("roms.read")?;

    let filter = RomFilter {
        platform_id: match &query.platform_id {
            Some(id) => Some(ObjectId::parse_str(id)?),
            None => None,
        },
        search_term: query.search_term.clone().filter(|t| !t.trim().is_empty()),
    };

    let (roms, total) = RomDoc::list(&state.db, &filter, pagination.offset, pagination.limit).await?;
    let schemas: Vec<RomSchema> = roms
        .into_iter()
        .map(|rom| rom.to_schema(Vec::new(), Vec::new(), Vec::new()))
        .collect();

    Ok(ServerResponse::builder()
        .body(schemas)
        .pagination(ResponsePagination {
            count: total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
        .build())
}

async fn get_rom(
    claims: Claims,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerAppResult<RomSchema> {
    claims.require_scope("roms.read")?;

    let id = ObjectId::parse_str(&id)?;
    let rom = RomDoc::get(&state.db, &id)
        .await?
        .ok_or_else(|| ServerError::not_found("Rom not found"))?;

    let saves = SaveDoc::list_for_rom(&state.db, &id, &claims.user_id)
        .await?
        .into_iter()
        .map(SaveDoc::to_schema)
        .collect();
    let states = StateDoc::list_for_rom(&state.db, &id, &claims.user_id)
        .await?
        .into_iter()
        .map(StateDoc::to_schema)
        .collect();
    let screenshots = ScreenshotDoc::list_for_rom(&state.db, &id, &claims.user_id)
        .await?
        .into_iter()
        .map(ScreenshotDoc::to_schema)
        .collect();

    Ok(ServerResponse::builder()
        .body(rom.to_schema(saves, states, screenshots))
        .build())
}

/// Manual edit. A changed file name renames the file (or directory, for
/// multi-part games) on disk before the database is touched.
async fn update_rom(
    claims: Claims,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateRomBody>,
) -> ServerAppResult<RomSchema> {
    claims.require_scope("roms.write")?;

    let id = ObjectId::parse_str(&id)?;
    let rom = RomDoc::get(&state.db, &id)
        .await?
        .ok_or_else(|| ServerError::not_found("Rom not found"))?;

    if let Some(new_name) = &body.file_name {
        if new_name.contains('/') || new_name.contains("..") {
            return Err(ServerError::bad_request("Invalid file name"));
        }
        if new_name != &rom.file_name {
            let dir = state.config.library_path.join(&rom.file_path);
            let from = dir.join(&rom.file_name);
            let to = dir.join(new_name);
            if to.exists() {
                return Err(ServerError::bad_request(&format!(
                    "A file named {} already exists",
                    new_name
                )));
            }
            tokio::fs::rename(&from, &to).await?;
            info!("Renamed {} to {}", from.display(), to.display());
        }
    }

    let updated = RomDoc::apply_update(&state.db, &id, &body).await?;
    Ok(ServerResponse::builder()
        .body(updated.to_schema(Vec::new(), Vec::new(), Vec::new()))
        .build())
}

async fn delete_roms(
    claims: Claims,
    State(state): State<AppState>,
    Json(body): Json<DeleteRomsBody>,
) -> ServerAppResult<()> {
    claims.require_scope("roms.write")?;

    let mut ids = Vec::with_capacity(body.roms.len());
    for raw in &body.roms {
        ids.push(ObjectId::parse_str(raw)?);
    }

    if body.delete_from_fs {
        for id in &ids {
            let Some(rom) = RomDoc::get(&state.db, id).await? else {
                continue;
            };
            let path = state
                .config
                .library_path
                .join(&rom.file_path)
                .join(&rom.file_name);
            let result = if rom.multi {
                tokio::fs::remove_dir_all(&path).await
            } else {
                tokio::fs::remove_file(&path).await
            };
            if let Err(e) = result {
                return Err(ServerError::internal_error(&format!(
                    "Could not delete {}: {}",
                    path.display(),
                    e
                )));
            }
        }
    }

    let deleted = RomDoc::bulk_delete(&state.db, &ids).await?;
    info!("Deleted {} roms", deleted);
    Ok(ServerResponse::builder().no_content().build())
}

/// Streams the rom file. Multi-part games need a `file_name` query
/// parameter selecting which part to download.
async fn download_rom(
    claims: Claims,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ServerError> {
    claims.require_scope("roms.read")?;

    let id = ObjectId::parse_str(&id)?;
    let rom = RomDoc::get(&state.db, &id)
        .await?
        .ok_or_else(|| ServerError::not_found("Rom not found"))?;

    let (path, download_name) = if rom.multi {
        let part = query
            .file_name
            .as_deref()
            .ok_or_else(|| ServerError::bad_request("file_name is required for multi-part games"))?;
        if !rom.files.iter().any(|f| f.filename == part) {
            return Err(ServerError::not_found("No such file in this game"));
        }
        (
            state
                .config
                .library_path
                .join(&rom.file_path)
                .join(&rom.file_name)
                .join(part),
            part.to_string(),
        )
    } else {
        (
            state
                .config
                .library_path
                .join(&rom.file_path)
                .join(&rom.file_name),
            rom.file_name.clone(),
        )
    };

    stream_file(&path, &download_name).await
}

pub(super) async fn stream_file(
    path: &std::path::Path,
    download_name: &str,
) -> Result<Response, ServerError> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|_| ServerError::not_found("File not found on disk"))?;
    let size = file.metadata().await?.len();

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(header::CONTENT_LENGTH, size.into());
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", download_name))
            .map_err(|_| ServerError::bad_request("Invalid file name"))?,
    );

    let body = Body::from_stream(ReaderStream::new(file));
    let mut response = Response::new(body);
    *response.headers_mut() = headers;
    Ok(response)
}

async fn get_note(
    claims: Claims,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerAppResult<NoteSchema> {
    claims.require_scope("roms.read")?;

    let id = ObjectId::parse_str(&id)?;
    let note = NoteDoc::get_for(&state.db, &id, &claims.user_id)
        .await?
        .ok_or_else(|| ServerError::not_found("Note not found"))?;
    Ok(ServerResponse::builder().body(note.to_schema()).build())
}

async fn update_note(
    claims: Claims,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateNoteBody>,
) -> ServerAppResult<NoteSchema> {
    claims.require_scope("me.write")?;

    let id = ObjectId::parse_str(&id)?;
    ensure_rom_exists(&state, &id).await?;

    let note =
        NoteDoc::upsert_for(&state.db, &id, &claims.user_id, &claims.username, &body).await?;
    Ok(ServerResponse::builder().body(note.to_schema()).build())
}

async fn delete_note(
    claims: Claims,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerAppResult<()> {
    claims.require_scope("me.write")?;

    let id = ObjectId::parse_str(&id)?;
    NoteDoc::delete_for(&state.db, &id, &claims.user_id).await?;
    Ok(ServerResponse::builder().no_content().build())
}

async fn ensure_rom_exists(state: &AppState, id: &ObjectId) -> ServerResult<()> {
    RomDoc::get(&state.db, id)
        .await?
        .map(|_| ())
        .ok_or_else(|| ServerError::not_found("Rom not found"))
}
