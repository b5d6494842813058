use axum::{
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
};

use retro_gateway::connection;

use crate::state::AppState;

/// GET /gateway. Authentication happens inside the socket via `Identify`.
pub async fn upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let dispatcher = state.dispatcher.clone();
    let jwt_secret = state.jwt_secret.clone();
    ws.on_upgrade(move |socket| connection::handle_connection(socket, dispatcher, jwt_secret))
}
