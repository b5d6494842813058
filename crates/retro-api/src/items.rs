use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use retro_core::phase;
use retro_core::voting::VoteOutcome;
use retro_db::CastVote;
use retro_types::api::{Claims, CreateItemRequest, UpdateItemRequest};
use retro_types::events::GatewayEvent;
use retro_types::models::{RetroItem, Retrospective};

use crate::error::{ApiError, ApiResult};
use crate::retros::load_retro;
use crate::state::{AppState, run_db};
use crate::users::current_user;

const MAX_CONTENT_LEN: usize = 2000;

fn validate_content(raw: &str) -> ApiResult<String> {
    let content = raw.trim();
    if content.is_empty() {
        return Err(ApiError::Validation("content is required".into()));
    }
    if content.chars().count() > MAX_CONTENT_LEN {
        return Err(ApiError::Validation(format!(
            "content must be at most {} characters",
            MAX_CONTENT_LEN
        )));
    }
    Ok(content.to_string())
}

async fn load_item(state: &AppState, id: Uuid) -> ApiResult<RetroItem> {
    run_db(state, move |db| db.get_item(id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("item {} not found", id)))
}

fn ensure_writing(retro: &Retrospective) -> ApiResult<()> {
    if phase::accepts_items(retro.phase) {
        Ok(())
    } else {
        Err(ApiError::Conflict(format!(
            "items can only be changed during WRITING (retrospective is {})",
            retro.phase
        )))
    }
}

/// Every item of the retrospective, oldest first. Clients without a gateway
/// connection poll this.
pub async fn list(
    State(state): State<AppState>,
    Path(retro_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<Json<Vec<RetroItem>>> {
    load_retro(&state, retro_id).await?;
    let items = run_db(&state, move |db| db.list_items(retro_id)).await?;
    Ok(Json(items))
}

pub async fn create(
    State(state): State<AppState>,
    Path(retro_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateItemRequest>,
) -> ApiResult<impl IntoResponse> {
    let content = validate_content(&req.content)?;
    let author = current_user(&state, &claims).await?;
    let retro = load_retro(&state, retro_id).await?;
    ensure_writing(&retro)?;

    let item = RetroItem {
        id: Uuid::new_v4(),
        retrospective_id: retro_id,
        author_id: author.id,
        content,
        item_type: req.item_type,
        created_at: state.now(),
        votes: 0,
        voters: vec![],
    };

    let stored = item.clone();
    run_db(&state, move |db| db.create_item(&stored)).await?;

    state
        .dispatcher
        .publish(GatewayEvent::ItemCreated { item: item.clone() })
        .await;

    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn edit(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateItemRequest>,
) -> ApiResult<Json<RetroItem>> {
    let content = validate_content(&req.content)?;
    let item = load_item(&state, item_id).await?;
    if item.author_id != claims.sub {
        return Err(ApiError::Forbidden("only the author can edit an item".into()));
    }
    let retro = load_retro(&state, item.retrospective_id).await?;
    ensure_writing(&retro)?;

    let item_type = req.item_type;
    let updated = run_db(&state, move |db| db.update_item(item_id, &content, item_type))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("item {} not found", item_id)))?;

    state
        .dispatcher
        .publish(GatewayEvent::ItemUpdated {
            item: updated.clone(),
        })
        .await;

    Ok(Json(updated))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<StatusCode> {
    let caller = current_user(&state, &claims).await?;
    let item = load_item(&state, item_id).await?;
    let retro = load_retro(&state, item.retrospective_id).await?;

    if item.author_id != caller.id && retro.owner_id != caller.id && !caller.is_admin() {
        return Err(ApiError::Forbidden(
            "only the author or the retrospective owner can delete an item".into(),
        ));
    }
    ensure_writing(&retro)?;

    if !run_db(&state, move |db| db.delete_item(item_id)).await? {
        return Err(ApiError::NotFound(format!("item {} not found", item_id)));
    }

    state
        .dispatcher
        .publish(GatewayEvent::ItemDeleted {
            retrospective_id: retro.id,
            item_id,
        })
        .await;

    Ok(StatusCode::NO_CONTENT)
}

/// One vote per user per item, only while the retrospective is voting. The
/// phase is checked in the same transaction that stores the vote.
pub async fn vote(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<RetroItem>> {
    let voter = current_user(&state, &claims).await?;

    let now = state.now();
    let user_id = voter.id;
    let item = match run_db(&state, move |db| db.cast_vote(item_id, user_id, now)).await? {
        CastVote::NoItem => {
            return Err(ApiError::NotFound(format!("item {} not found", item_id)));
        }
        CastVote::Closed(current) => {
            return Err(ApiError::Conflict(format!(
                "votes are only accepted during VOTING (retrospective is {})",
                current
            )));
        }
        CastVote::Counted(VoteOutcome::AlreadyVoted, _) => {
            return Err(ApiError::Conflict("you have already voted on this item".into()));
        }
        CastVote::Counted(VoteOutcome::Recorded, item) => item,
    };

    info!("{} voted on item {} ({} votes)", user_id, item_id, item.votes);
    state
        .dispatcher
        .publish(GatewayEvent::ItemUpdated { item: item.clone() })
        .await;

    Ok(Json(item))
}
