use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{error, info};
use uuid::Uuid;

use retro_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use retro_types::models::{FREE_SUBSCRIPTION, Role, User};

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, run_db};

const MIN_PASSWORD_LEN: usize = 8;
const MAX_EMAIL_LEN: usize = 254;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = normalize_email(&req.email)?;
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let lookup = email.clone();
    if run_db(&state, move |db| db.get_user_row_by_email(&lookup))
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("email is already registered".into()));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Password hashing failed: {}", e);
            ApiError::Internal(anyhow::anyhow!("password hashing failed"))
        })?
        .to_string();

    let user = User {
        id: Uuid::new_v4(),
        email,
        name: req.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
        image: None,
        role: Role::User,
        subscription_type: FREE_SUBSCRIPTION.into(),
        subscription_expires: None,
        stripe_subscription_status: None,
        created_at: state.now(),
    };

    let token = create_token(&state.jwt_secret, user.id, &user.email)?;
    let user_id = user.id;

    run_db(&state, move |db| db.create_user(&user, Some(password_hash.as_str()))).await?;
    info!("Registered user {}", user_id);

    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id, token })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let invalid = || ApiError::Unauthorized("invalid email or password".into());

    let email = req.email.trim().to_lowercase();
    let row = run_db(&state, move |db| db.get_user_row_by_email(&email))
        .await?
        .ok_or_else(invalid)?;

    // Accounts added by another user have no password and cannot log in
    let stored = row.password.as_deref().ok_or_else(invalid)?;

    let parsed_hash = PasswordHash::new(stored)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt password hash: {}", e)))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| invalid())?;

    let user_id: Uuid = row
        .id
        .parse()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt user id: {}", e)))?;

    let token = create_token(&state.jwt_secret, user_id, &row.email)?;

    Ok(Json(LoginResponse {
        user_id,
        email: row.email,
        token,
    }))
}

/// Issue a 30-day HS256 token for `user_id`.
pub fn create_token(secret: &str, user_id: Uuid, email: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Trim and lowercase, then apply a minimal shape check.
pub fn normalize_email(raw: &str) -> ApiResult<String> {
    let email = raw.trim().to_lowercase();
    let well_formed = email.len() <= MAX_EMAIL_LEN
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !well_formed {
        return Err(ApiError::Validation("a valid email address is required".into()));
    }
    Ok(email)
}
