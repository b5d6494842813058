pub mod auth;
pub mod billing;
pub mod error;
pub mod gateway;
pub mod items;
pub mod middleware;
pub mod retros;
pub mod state;
pub mod timer;
pub mod users;

use axum::{
    Json, Router,
    middleware::from_fn_with_state,
    routing::{get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use state::{AppState, AppStateInner, BillingConfig};

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// The full HTTP surface: public auth routes, the gateway socket and every
/// bearer-protected resource.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/gateway", get(gateway::upgrade));

    let protected_routes = Router::new()
        .route("/users", get(users::get_all).post(users::add))
        .route("/users/me", get(users::get_logged_in))
        .route("/users/me/subscription", get(users::subscription_status))
        .route("/users/{user_id}", put(users::edit).delete(users::delete))
        .route("/retros", get(retros::list).post(retros::create))
        .route(
            "/retros/{retro_id}",
            get(retros::get).put(retros::update).delete(retros::delete),
        )
        .route("/retros/{retro_id}/join", post(retros::join))
        .route("/retros/{retro_id}/phase/advance", post(retros::advance_phase))
        .route("/retros/{retro_id}/discussion", get(retros::discussion))
        .route("/retros/{retro_id}/timer", get(timer::get_timer))
        .route("/retros/{retro_id}/timer/start", post(timer::start))
        .route("/retros/{retro_id}/timer/reset", post(timer::reset))
        .route("/retros/{retro_id}/items", get(items::list).post(items::create))
        .route("/items/{item_id}", put(items::edit).delete(items::delete))
        .route("/items/{item_id}/vote", post(items::vote))
        .route("/billing/checkout", post(billing::checkout))
        .route("/billing/portal", post(billing::portal))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
