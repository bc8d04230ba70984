use axum::{Router, extract::State, routing::get};
use cart_shared::stats::StatsResponse;
use mongodb::bson::doc;

use crate::auth::claims::Claims;
use crate::models::rom::RomDoc;
use crate::response::{ServerAppResult, ServerResponse};
use crate::util::app_state::AppState;

pub fn create_route() -> Router<AppState> {
    Router::new().route("/stats", get(get_stats))
}

/// Library-wide counts. Any authenticated user may read them.
async fn get_stats(_claims: Claims, State(state): State<AppState>) -> ServerAppResult<StatsResponse> {
    let db = &state.db;
    let stats = StatsResponse {
        platforms: db.platforms().count_documents(doc! {}).await?,
        roms: db.roms().count_documents(doc! {}).await?,
        saves: db.saves().count_documents(doc! {}).await?,
        states: db.states().count_documents(doc! {}).await?,
        screenshots: db.screenshots().count_documents(doc! {}).await?,
        filesize: RomDoc::total_size(db).await?,
    };
    Ok(ServerResponse::builder().body(stats).build())
}
