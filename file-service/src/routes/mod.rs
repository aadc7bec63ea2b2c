pub mod context;
pub mod diff;
pub mod env;
pub mod files;
pub mod health;
pub mod sessions;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/sessions", post(sessions::create_session).get(sessions::list_sessions))
        .route(
            "/sessions/{id}",
            get(sessions::get_session).delete(sessions::delete_session),
        )
        .route("/sessions/{id}/cwd", put(sessions::set_working_dir))
        .route("/sessions/{id}/env", get(env::list_env).put(env::set_env))
        .route(
            "/sessions/{id}/env/{key}",
            get(env::get_env).delete(env::unset_env),
        )
        .route(
            "/sessions/{id}/files",
            get(files::read_path)
                .post(files::create_file)
                .put(files::update_file)
                .delete(files::delete_file),
        )
        .route("/sessions/{id}/files/metadata", get(files::get_metadata))
        .route("/sessions/{id}/files/batch-read", post(files::batch_read))
        .route("/sessions/{id}/files/batch-create", post(files::batch_create))
        .route("/sessions/{id}/files/search", get(files::search_files))
        .route("/sessions/{id}/structure", get(files::export_structure))
        .route("/sessions/{id}/diff", post(diff::generate_diff))
        .route("/sessions/{id}/patch", post(diff::apply_patch))
        .route("/sessions/{id}/context", get(context::report))
        .route("/sessions/{id}/context/summary", get(context::summary))
        .route("/health", get(health::health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(tower::limit::ConcurrencyLimitLayer::new(
            state.config.server.max_connections,
        ))
        .with_state(state)
}
