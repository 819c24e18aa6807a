mod health;
mod proxy;
mod session;

use axum::middleware as axum_mw;
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::route_guard::route_guard;
use crate::state::AppState;

/// Build the edge router. Everything that is not served here is forwarded to
/// the page renderer, after the route guard has had its say.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/session", get(session::get_session))
        .layer(CorsLayer::permissive());

    Router::new()
        .route("/health", get(health::health))
        .route("/version", get(health::version))
        .nest("/api", api)
        .fallback(proxy::forward)
        .layer(axum_mw::from_fn_with_state(state.clone(), route_guard))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
