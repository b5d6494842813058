use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{RetroItem, Retrospective};

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid },

    /// Any field of the retrospective changed (phase, name, date, timer)
    RetroUpdated { retrospective: Retrospective },

    /// The shared countdown was started or reset
    TimerUpdated {
        retrospective_id: Uuid,
        timer_expiration: DateTime<Utc>,
    },

    RetroDeleted { retrospective_id: Uuid },

    ItemCreated { item: RetroItem },

    /// Content edit or a new vote
    ItemUpdated { item: RetroItem },

    ItemDeleted { retrospective_id: Uuid, item_id: Uuid },
}

impl GatewayEvent {
    /// The retrospective this event belongs to. `Ready` is connection-scoped
    /// and returns `None`.
    pub fn retrospective_id(&self) -> Option<Uuid> {
        match self {
            Self::Ready { .. } => None,
            Self::RetroUpdated { retrospective } => Some(retrospective.id),
            Self::TimerUpdated { retrospective_id, .. } => Some(*retrospective_id),
            Self::RetroDeleted { retrospective_id } => Some(*retrospective_id),
            Self::ItemCreated { item } | Self::ItemUpdated { item } => Some(item.retrospective_id),
            Self::ItemDeleted { retrospective_id, .. } => Some(*retrospective_id),
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },

    /// Follow a single retrospective. Replaces any previous subscription.
    Subscribe { retrospective_id: Uuid },

    Unsubscribe,
}
