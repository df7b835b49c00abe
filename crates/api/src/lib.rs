pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;

use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use state::AppState;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.settings.app.cors_origins);

    // Meeting routes
    let meeting_routes = Router::new()
        .route("/", get(routes::meeting::list).post(routes::meeting::create))
        .route(
            "/{meeting_id}",
            get(routes::meeting::get)
                .put(routes::meeting::update)
                .delete(routes::meeting::delete),
        )
        .route("/{meeting_id}/start", post(routes::meeting::start))
        .route("/{meeting_id}/end", post(routes::meeting::end))
        .route("/{meeting_id}/cancel", post(routes::meeting::cancel))
        .route(
            "/{meeting_id}/invite-code",
            post(routes::meeting::rotate_invite_code),
        )
        .route("/{meeting_id}/lock", post(routes::meeting::lock))
        .route("/{meeting_id}/unlock", post(routes::meeting::unlock))
        .route(
            "/{meeting_id}/transfer-host",
            post(routes::meeting::transfer_host),
        )
        .route("/{meeting_id}/leave", post(routes::participant::leave));

    // Participant routes (under meeting)
    let participant_routes = Router::new()
        .route("/", get(routes::participant::list))
        .route("/{participant_id}/admit", post(routes::participant::admit))
        .route("/{participant_id}/remove", post(routes::participant::remove));

    // Recording routes (under meeting)
    let recording_routes = Router::new()
        .route(
            "/",
            get(routes::recording::info).delete(routes::recording::purge),
        )
        .route("/start", post(routes::recording::start))
        .route("/pause", post(routes::recording::pause))
        .route("/resume", post(routes::recording::resume))
        .route("/stop", post(routes::recording::stop));

    // Compose API
    let api = Router::new()
        .nest("/meeting", meeting_routes)
        .nest("/meeting/{meeting_id}/participant", participant_routes)
        .nest("/meeting/{meeting_id}/recording", recording_routes)
        .route("/join/{code}", post(routes::participant::join))
        .route("/hooks/capture", post(routes::hooks::capture));

    // Health check
    let health = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api)
        .merge(health)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(origins)
    }
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
