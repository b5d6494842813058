use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::SubsecRound;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use retro_core::discussion::DiscussionCursor;
use retro_core::phase;
use retro_types::api::{Claims, CreateRetroRequest, DiscussionView, UpdateRetroRequest};
use retro_types::events::GatewayEvent;
use retro_types::models::{Phase, Retrospective};

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, run_db};
use crate::users::current_user;

const MAX_NAME_LEN: usize = 120;

pub(crate) async fn load_retro(state: &AppState, id: Uuid) -> ApiResult<Retrospective> {
    run_db(state, move |db| db.get_retrospective(id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("retrospective {} not found", id)))
}

fn validate_name(raw: &str) -> ApiResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ApiError::Validation("name is required".into()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::Validation(format!(
            "name must be at most {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

pub async fn list(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<Retrospective>>> {
    let me = claims.sub;
    let retros = run_db(&state, move |db| db.list_retrospectives_for_user(me)).await?;
    Ok(Json(retros))
}

/// New retrospectives start in WRITING with an already-expired timer.
pub async fn create(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateRetroRequest>,
) -> ApiResult<impl IntoResponse> {
    let name = validate_name(&req.name)?;
    let owner = current_user(&state, &claims).await?;
    let now = state.now();

    let retro = Retrospective {
        id: Uuid::new_v4(),
        name,
        date: req.date.unwrap_or_else(|| now.date_naive()),
        phase: Phase::Writing,
        timer_expiration: now,
        owner_id: owner.id,
        created_at: now,
    };

    let stored = retro.clone();
    run_db(&state, move |db| db.create_retrospective(&stored)).await?;
    info!("{} created retrospective {}", owner.id, retro.id);

    Ok((StatusCode::CREATED, Json(retro)))
}

pub async fn get(
    State(state): State<AppState>,
    Path(retro_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<Json<Retrospective>> {
    Ok(Json(load_retro(&state, retro_id).await?))
}

/// Replace name, date, phase and timer in one go. Concurrent updates are
/// not detected: whichever lands last is what everyone sees.
pub async fn update(
    State(state): State<AppState>,
    Path(retro_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
    Json(req): Json<UpdateRetroRequest>,
) -> ApiResult<Json<Retrospective>> {
    let name = validate_name(&req.name)?;
    if req.phase == Phase::Grouping {
        return Err(ApiError::Validation("phase GROUPING is not in use".into()));
    }

    let existing = load_retro(&state, retro_id).await?;
    let updated = Retrospective {
        name,
        date: req.date,
        phase: req.phase,
        timer_expiration: req.timer_expiration.trunc_subsecs(3),
        ..existing
    };

    let stored = updated.clone();
    if !run_db(&state, move |db| db.update_retrospective(&stored)).await? {
        return Err(ApiError::NotFound(format!("retrospective {} not found", retro_id)));
    }

    state
        .dispatcher
        .publish(GatewayEvent::RetroUpdated {
            retrospective: updated.clone(),
        })
        .await;

    Ok(Json(updated))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(retro_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<StatusCode> {
    let caller = current_user(&state, &claims).await?;
    let retro = load_retro(&state, retro_id).await?;

    if retro.owner_id != caller.id && !caller.is_admin() {
        return Err(ApiError::Forbidden(
            "only the owner or an admin can delete a retrospective".into(),
        ));
    }

    if !run_db(&state, move |db| db.delete_retrospective(retro_id)).await? {
        return Err(ApiError::NotFound(format!("retrospective {} not found", retro_id)));
    }

    state
        .dispatcher
        .publish(GatewayEvent::RetroDeleted {
            retrospective_id: retro_id,
        })
        .await;

    info!("{} deleted retrospective {}", caller.id, retro_id);
    Ok(StatusCode::NO_CONTENT)
}

/// Anyone holding the link may join.
pub async fn join(
    State(state): State<AppState>,
    Path(retro_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Retrospective>> {
    let caller = current_user(&state, &claims).await?;
    let retro = load_retro(&state, retro_id).await?;
    let now = state.now();

    let user_id = caller.id;
    if run_db(&state, move |db| db.add_participant(retro_id, user_id, now)).await? {
        info!("{} joined retrospective {}", user_id, retro_id);
    }

    Ok(Json(retro))
}

pub async fn advance_phase(
    State(state): State<AppState>,
    Path(retro_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<Json<Retrospective>> {
    let current = load_retro(&state, retro_id).await?;
    let next = phase::advance_phase(&current);

    if next.phase == current.phase {
        return Ok(Json(current));
    }

    let new_phase = next.phase;
    if !run_db(&state, move |db| db.set_phase(retro_id, new_phase)).await? {
        return Err(ApiError::NotFound(format!("retrospective {} not found", retro_id)));
    }
    info!("Retrospective {} moved {} -> {}", retro_id, current.phase, new_phase);

    state
        .dispatcher
        .publish(GatewayEvent::RetroUpdated {
            retrospective: next.clone(),
        })
        .await;

    Ok(Json(next))
}

#[derive(Debug, Deserialize)]
pub struct DiscussionQuery {
    #[serde(default)]
    pub position: usize,
}

pub async fn discussion(
    State(state): State<AppState>,
    Path(retro_id): Path<Uuid>,
    Query(query): Query<DiscussionQuery>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<Json<DiscussionView>> {
    load_retro(&state, retro_id).await?;
    let items = run_db(&state, move |db| db.list_items(retro_id)).await?;

    let mut cursor = DiscussionCursor::new(items);
    let current = cursor.seek(query.position).cloned();

    Ok(Json(DiscussionView {
        index: cursor.index(),
        has_previous: cursor.has_previous(),
        has_next: cursor.has_next(),
        current,
        items: cursor.into_items(),
    }))
}
