pub mod api;
pub mod breakout;
pub mod config;
pub mod error;
pub mod estimation;
pub mod reaper;
pub mod registry;
pub mod retro;
pub mod state;
pub mod ws;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};

use config::HuddleConfig;
pub use reaper::spawn_room_reaper;
use state::AppState;

/// Build the Axum router and application state from a config.
pub fn build_app(config: HuddleConfig) -> (Router<()>, AppState) {
    let web_root = config.web_root.clone();
    let state = AppState::new(config);

    let api_routes = Router::new()
        .route("/validate-access", axum::routing::post(api::validate_access))
        .route("/health", axum::routing::get(api::health))
        .layer(CorsLayer::permissive());

    // Unknown paths fall through to index.html so room links like
    // /room/ABC123 load the client app
    let index = format!("{web_root}/index.html");
    let static_files = ServeDir::new(&web_root).fallback(ServeFile::new(index));

    let app = Router::new()
        .route("/ws", axum::routing::get(ws::ws_handler))
        .nest("/api", api_routes)
        .fallback_service(static_files)
        .with_state(state.clone());

    (app, state)
}
