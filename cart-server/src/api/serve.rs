use std::time::Duration;

use axum::{
    Router,
    http::{Method, header},
    routing::get,
};
use tokio::net::TcpListener;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    sensitive_headers::SetSensitiveHeadersLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

use crate::api::{
    assets, auth, config, firmware, heartbeat, platforms, raw, roms, search, stats, tasks, users,
    ws,
};
use crate::response::ServerResult;
use crate::util::app_state::AppState;

pub async fn serve(state: AppState) -> ServerResult<()> {
    // The web UI runs on another origin during development; credentials
    // ride in the Authorization header or the session cookie.
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    // REST routes live under /api; the scan socket at /ws mirrors the
    // mount point the web UI expects.
    let api = Router::new()
        .merge(heartbeat::create_route())
        .merge(auth::create_route())
        .merge(users::create_route())
        .merge(platforms::create_route())
        .merge(roms::create_route())
        .merge(firmware::create_route())
        .merge(assets::create_route())
        .merge(search::create_route())
        .merge(config::create_route())
        .merge(stats::create_route())
        .merge(tasks::create_route())
        .merge(raw::create_route());

    let host = state.config.host.clone();
    let port = state.config.port;

    let app = Router::new()
        .nest("/api", api)
        .route("/ws", get(ws::scan_socket))
        .with_state(state)
        .layer(cors)
        .layer(SetSensitiveHeadersLayer::new(std::iter::once(
            header::AUTHORIZATION,
        )))
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new());

    let listener = TcpListener::bind((host.as_str(), port)).await?;
    info!("Listening on {}:{}", host, port);
    axum::serve(listener, app).await?;
    Ok(())
}
