use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::SubsecRound;
use tracing::info;
use uuid::Uuid;

use retro_types::api::{Claims, CreateUserRequest, SubscriptionStatusResponse, UpdateUserRequest};
use retro_types::models::{Role, User};

use crate::auth::normalize_email;
use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, run_db};

/// Load the account behind the token. A token can outlive its account.
pub async fn current_user(state: &AppState, claims: &Claims) -> ApiResult<User> {
    let id = claims.sub;
    run_db(state, move |db| db.get_user(id))
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Could not find user".into()))
}

/// Only the account itself or an admin may change or delete it.
fn ensure_self_or_admin(caller: &User, target: Uuid) -> ApiResult<()> {
    if caller.id == target || caller.is_admin() {
        Ok(())
    } else {
        Err(ApiError::Forbidden("not allowed to modify another user".into()))
    }
}

pub async fn get_logged_in(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<User>> {
    Ok(Json(current_user(&state, &claims).await?))
}

/// Everyone the caller has shared a retrospective with.
pub async fn get_all(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<User>>> {
    let me = claims.sub;
    let users = run_db(&state, move |db| db.list_co_participants(me)).await?;
    Ok(Json(users))
}

pub async fn add(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = normalize_email(&req.email)?;
    if req.subscription_type.trim().is_empty() {
        return Err(ApiError::Validation("subscription_type is required".into()));
    }

    let lookup = email.clone();
    if run_db(&state, move |db| db.get_user_row_by_email(&lookup)).await?.is_some() {
        return Err(ApiError::Conflict("email is already registered".into()));
    }

    let user = User {
        id: Uuid::new_v4(),
        email,
        name: req.name,
        image: None,
        role: Role::User,
        subscription_type: req.subscription_type.trim().to_string(),
        subscription_expires: req.subscription_expires.map(|at| at.trunc_subsecs(3)),
        stripe_subscription_status: None,
        created_at: state.now(),
    };

    let stored = user.clone();
    run_db(&state, move |db| db.create_user(&stored, None)).await?;
    info!("Added user {}", user.id);

    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn edit(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<Json<User>> {
    let caller = current_user(&state, &claims).await?;
    ensure_self_or_admin(&caller, user_id)?;

    let email = normalize_email(&req.email)?;
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::Validation("name is required".into()));
    }

    let existing = run_db(&state, move |db| db.get_user(user_id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("user {} not found", user_id)))?;

    let lookup = email.clone();
    if let Some(other) = run_db(&state, move |db| db.get_user_row_by_email(&lookup)).await? {
        if other.id != user_id.to_string() {
            return Err(ApiError::Conflict("email is already registered".into()));
        }
    }

    let updated = User {
        email,
        name: Some(name),
        image: req.image.or(existing.image.clone()),
        subscription_type: req
            .subscription_type
            .unwrap_or_else(|| existing.subscription_type.clone()),
        subscription_expires: req
            .subscription_expires
            .map(|at| at.trunc_subsecs(3))
            .or(existing.subscription_expires),
        ..existing
    };

    let stored = updated.clone();
    if !run_db(&state, move |db| db.update_user(&stored)).await? {
        return Err(ApiError::NotFound(format!("user {} not found", user_id)));
    }

    Ok(Json(updated))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<StatusCode> {
    let caller = current_user(&state, &claims).await?;
    ensure_self_or_admin(&caller, user_id)?;

    if !run_db(&state, move |db| db.delete_user(user_id)).await? {
        return Err(ApiError::NotFound(format!("user {} not found", user_id)));
    }

    info!("Deleted user {} (by {})", user_id, caller.id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn subscription_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<SubscriptionStatusResponse>> {
    let user = current_user(&state, &claims).await?;
    let tier = user.account_tier(state.now());

    Ok(Json(SubscriptionStatusResponse {
        status: user.stripe_subscription_status,
        tier,
    }))
}
