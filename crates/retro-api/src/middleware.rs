use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::TypedHeader;
use axum_extra::headers::{Authorization, authorization::Bearer};
use axum_extra::typed_header::TypedHeaderRejection;
use jsonwebtoken::{DecodingKey, Validation, decode};

use retro_types::api::Claims;

use crate::error::ApiError;
use crate::state::AppState;

/// Extract and validate the bearer JWT, then hand the claims to the handler
/// as an `Extension<Claims>`.
pub async fn require_auth(
    State(state): State<AppState>,
    bearer: Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let TypedHeader(Authorization(bearer)) =
        bearer.map_err(|_| ApiError::Unauthorized("Not authenticated".into()))?;

    let token_data = decode::<Claims>(
        bearer.token(),
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Unauthorized("Invalid or expired token".into()))?;

    req.extensions_mut().insert(token_data.claims);
    Ok(next.run(req).await)
}
