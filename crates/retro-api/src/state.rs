use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use tracing::error;

use retro_core::Clock;
use retro_db::Database;
use retro_gateway::Dispatcher;

use crate::error::{ApiError, ApiResult};

pub type AppState = Arc<AppStateInner>;

/// Hosted billing pages. Either may be missing in development setups.
#[derive(Debug, Clone, Default)]
pub struct BillingConfig {
    pub checkout_url: Option<String>,
    pub portal_url: Option<String>,
}

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub dispatcher: Dispatcher,
    pub clock: Arc<dyn Clock>,
    pub billing: BillingConfig,
}

impl AppStateInner {
    /// Current time at the precision the store keeps (milliseconds), so a
    /// record returned from a handler matches what later reads load.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now().trunc_subsecs(3)
    }
}

/// Run blocking DB work off the async runtime.
pub async fn run_db<F, T>(state: &AppState, f: F) -> ApiResult<T>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("blocking task failed"))
        })?
        .map_err(ApiError::Internal)
}
