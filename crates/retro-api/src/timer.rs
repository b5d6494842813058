use axum::{
    Extension, Json,
    extract::{Path, State},
};
use tracing::info;
use uuid::Uuid;

use retro_core::timer::{self, TimerStart};
use retro_types::api::{Claims, StartTimerRequest, TimerResponse, TimerView};
use retro_types::events::GatewayEvent;

use crate::error::{ApiError, ApiResult};
use crate::retros::load_retro;
use crate::state::{AppState, run_db};

/// The minutes field takes two digits.
pub const MAX_TIMER_MINUTES: u32 = 99;

pub async fn get_timer(
    State(state): State<AppState>,
    Path(retro_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<Json<TimerView>> {
    let retro = load_retro(&state, retro_id).await?;
    Ok(Json(timer::view(retro.timer_expiration, state.now())))
}

/// Start the shared countdown, or adopt the one already running.
pub async fn start(
    State(state): State<AppState>,
    Path(retro_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<StartTimerRequest>,
) -> ApiResult<Json<TimerResponse>> {
    if req.minutes > MAX_TIMER_MINUTES {
        return Err(ApiError::Validation(format!(
            "minutes must be between 0 and {}",
            MAX_TIMER_MINUTES
        )));
    }

    let now = state.now();
    let retro = load_retro(&state, retro_id).await?;

    let changed = match timer::start(&retro, req.minutes, now) {
        TimerStart::AlreadyRunning(_) => false,
        // The conditional write loses if another participant started the
        // timer since we read the row; we then adopt theirs below.
        TimerStart::Started(expiration) => {
            run_db(&state, move |db| db.start_timer_if_stopped(retro_id, expiration, now)).await?
        }
    };

    let retro = load_retro(&state, retro_id).await?;
    if changed {
        info!(
            "{} started timer on {} until {}",
            claims.sub, retro_id, retro.timer_expiration
        );
        state
            .dispatcher
            .publish(GatewayEvent::TimerUpdated {
                retrospective_id: retro_id,
                timer_expiration: retro.timer_expiration,
            })
            .await;
    }

    Ok(Json(TimerResponse {
        timer: timer::view(retro.timer_expiration, now),
        retrospective: retro,
        changed,
    }))
}

/// Stop the countdown for everybody by storing an expired deadline.
pub async fn reset(
    State(state): State<AppState>,
    Path(retro_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<TimerResponse>> {
    let now = state.now();
    let expiration = timer::reset(now);

    if !run_db(&state, move |db| db.set_timer_expiration(retro_id, expiration)).await? {
        return Err(ApiError::NotFound(format!("retrospective {} not found", retro_id)));
    }
    info!("{} reset timer on {}", claims.sub, retro_id);

    let retro = load_retro(&state, retro_id).await?;
    state
        .dispatcher
        .publish(GatewayEvent::TimerUpdated {
            retrospective_id: retro_id,
            timer_expiration: retro.timer_expiration,
        })
        .await;

    Ok(Json(TimerResponse {
        timer: timer::view(retro.timer_expiration, now),
        retrospective: retro,
        changed: true,
    }))
}
