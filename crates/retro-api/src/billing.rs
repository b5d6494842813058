//! Hosted checkout and billing-portal redirects. The provider pages do the
//! actual work; this only builds the URL the client should open.

use axum::{Extension, Json, extract::State};
use uuid::Uuid;

use retro_types::api::{BillingUrlResponse, CheckoutRequest, Claims};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::users::current_user;

pub async fn checkout(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CheckoutRequest>,
) -> ApiResult<Json<BillingUrlResponse>> {
    let base = state
        .billing
        .checkout_url
        .as_deref()
        .ok_or_else(|| ApiError::Unavailable("billing checkout is not configured".into()))?;

    let tier = req.tier.trim();
    if tier.is_empty() || !tier.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(ApiError::Validation("tier must be a plain identifier".into()));
    }

    let user = current_user(&state, &claims).await?;
    Ok(Json(BillingUrlResponse {
        url: checkout_url(base, user.id, tier),
    }))
}

pub async fn portal(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<BillingUrlResponse>> {
    let base = state
        .billing
        .portal_url
        .as_deref()
        .ok_or_else(|| ApiError::Unavailable("billing portal is not configured".into()))?;

    let user = current_user(&state, &claims).await?;
    Ok(Json(BillingUrlResponse {
        url: portal_url(base, user.id),
    }))
}

fn separator(base: &str) -> char {
    if base.contains('?') { '&' } else { '?' }
}

fn checkout_url(base: &str, user_id: Uuid, tier: &str) -> String {
    format!(
        "{base}{}client_reference_id={user_id}&tier={tier}",
        separator(base)
    )
}

fn portal_url(base: &str, user_id: Uuid) -> String {
    format!("{base}{}customer={user_id}", separator(base))
}
