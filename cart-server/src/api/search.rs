use axum::{
    Router,
    extract::{Query, State},
    routing::get,
};
use cart_shared::search::SearchRomSchema;
use mongodb::bson::oid::ObjectId;
use serde::Deserialize;
use tracing::info;

use crate::auth::claims::Claims;
use crate::models::platform::PlatformDoc;
use crate::models::rom::RomDoc;
use crate::response::{ServerAppResult, ServerError, ServerResponse};
use crate::util::app_state::AppState;

pub fn create_route() -> Router<AppState> {
    Router::new().route("/search/roms", get(search_roms))
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    rom_id: String,
    source: String,
    #[serde(default)]
    search_term: Option<String>,
    /// `name` (default) or `id`.
    #[serde(default = "default_search_by")]
    search_by: String,
}

fn default_search_by() -> String {
    "name".to_string()
}

/// Searches one metadata source for manual matching. The term defaults
/// to the rom's tag-stripped file name.
async fn search_roms(
    claims: Claims,
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ServerAppResult<Vec<SearchRomSchema>> {
    claims.require_scope("roms.read")?;

    let rom_id = ObjectId::parse_str(&query.rom_id)?;
    let rom = RomDoc::get(&state.db, &rom_id)
        .await?
        .ok_or_else(|| ServerError::not_found("Rom not found"))?;
    let platform = PlatformDoc::get(&state.db, &rom.platform_id)
        .await?
        .ok_or_else(|| ServerError::not_found("Platform not found"))?;

    let term = query
        .search_term
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or(&rom.file_name_no_tags);

    info!(
        "Searching {} for '{}' by {}",
        query.source, term, query.search_by
    );

    let results = state
        .metadata
        .search(
            &query.source,
            &query.search_by,
            term,
            platform.igdb_id,
            platform.moby_id,
        )
        .await?;
    Ok(ServerResponse::builder().body(results).build())
}
