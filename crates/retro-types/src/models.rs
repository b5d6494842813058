use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored string did not match any variant of the named enum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Lifecycle phase of a retrospective.
///
/// `Grouping` is part of the value space so stored rows and clients can name
/// it, but no transition ever enters or leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Writing,
    Grouping,
    Voting,
    Discussing,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Writing => "WRITING",
            Self::Grouping => "GROUPING",
            Self::Voting => "VOTING",
            Self::Discussing => "DISCUSSING",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WRITING" => Ok(Self::Writing),
            "GROUPING" => Ok(Self::Grouping),
            "VOTING" => Ok(Self::Voting),
            "DISCUSSING" => Ok(Self::Discussing),
            other => Err(ParseEnumError {
                kind: "phase",
                value: other.to_string(),
            }),
        }
    }
}

/// Column a retro item is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemType {
    WentWell,
    ToImprove,
    ActionItem,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WentWell => "WENT_WELL",
            Self::ToImprove => "TO_IMPROVE",
            Self::ActionItem => "ACTION_ITEM",
        }
    }
}

impl FromStr for ItemType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WENT_WELL" => Ok(Self::WentWell),
            "TO_IMPROVE" => Ok(Self::ToImprove),
            "ACTION_ITEM" => Ok(Self::ActionItem),
            other => Err(ParseEnumError {
                kind: "item type",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Admin => "ADMIN",
        }
    }
}

impl FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(Self::User),
            "ADMIN" => Ok(Self::Admin),
            other => Err(ParseEnumError {
                kind: "role",
                value: other.to_string(),
            }),
        }
    }
}

/// Subscription type assigned to every account that never paid.
pub const FREE_SUBSCRIPTION: &str = "FREE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountTier {
    Free,
    Pro,
    Lapsed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
    pub role: Role,
    pub subscription_type: String,
    pub subscription_expires: Option<DateTime<Utc>>,
    pub stripe_subscription_status: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Label the account for display. A paid subscription without an expiry
    /// counts as active.
    pub fn account_tier(&self, now: DateTime<Utc>) -> AccountTier {
        if self.subscription_type.eq_ignore_ascii_case(FREE_SUBSCRIPTION) {
            return AccountTier::Free;
        }
        match self.subscription_expires {
            Some(expires) if expires <= now => AccountTier::Lapsed,
            _ => AccountTier::Pro,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Retrospective {
    pub id: Uuid,
    pub name: String,
    pub date: NaiveDate,
    pub phase: Phase,
    /// Shared countdown deadline. A value at or before "now" means the timer
    /// is not running.
    pub timer_expiration: DateTime<Utc>,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetroItem {
    pub id: Uuid,
    pub retrospective_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub item_type: ItemType,
    pub created_at: DateTime<Utc>,
    pub votes: u32,
    pub voters: Vec<Uuid>,
}
