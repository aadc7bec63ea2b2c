pub mod commands;
pub mod env;
pub mod history;
pub mod processes;
pub mod sessions;
pub mod system;

use axum::routing::{delete, get, post, put};
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
        .route("/sessions/{id}/commands", post(commands::exec))
        .route("/sessions/{id}/commands/batch", post(commands::batch_exec))
        .route(
            "/sessions/{id}/processes",
            post(processes::start_process).get(processes::list_processes),
        )
        .route("/sessions/{id}/processes/{pid}", get(processes::get_process))
        .route(
            "/sessions/{id}/processes/{pid}/output",
            get(processes::get_output),
        )
        .route(
            "/sessions/{id}/processes/{pid}/input",
            post(processes::send_input),
        )
        .route(
            "/sessions/{id}/processes/{pid}/signal",
            post(processes::signal_process),
        )
        .route(
            "/sessions/{id}/history",
            get(history::list_history).delete(history::clear_history),
        )
        .route("/sessions/{id}/history/search", get(history::search_history))
        .route("/system/info", get(system::info))
        .route("/system/shells", get(system::shells))
        .route("/health", get(system::health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(tower::limit::ConcurrencyLimitLayer::new(
            state.config.server.max_connections,
        ))
        .with_state(state)
}
