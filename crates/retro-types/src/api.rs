use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{AccountTier, ItemType, Phase, RetroItem, Retrospective};

// -- JWT Claims --

/// JWT claims shared by the REST middleware and the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub name: Option<String>,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub email: String,
    pub token: String,
}

// -- Users --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateUserRequest {
    pub email: String,
    pub name: Option<String>,
    pub subscription_type: String,
    pub subscription_expires: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateUserRequest {
    pub name: String,
    pub email: String,
    pub image: Option<String>,
    pub subscription_type: Option<String>,
    pub subscription_expires: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubscriptionStatusResponse {
    pub status: Option<String>,
    pub tier: AccountTier,
}

// -- Retrospectives --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateRetroRequest {
    pub name: String,
    /// Defaults to today when omitted.
    pub date: Option<NaiveDate>,
}

/// Full replacement of the mutable fields. Whatever arrives last wins.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateRetroRequest {
    pub name: String,
    pub date: NaiveDate,
    pub phase: Phase,
    pub timer_expiration: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StartTimerRequest {
    pub minutes: u32,
}

/// Countdown derived from the shared expiration at the moment of the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerView {
    pub expires_at: DateTime<Utc>,
    pub running: bool,
    pub remaining_seconds: i64,
    /// Zero-padded `MM:SS`.
    pub display: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TimerResponse {
    pub retrospective: Retrospective,
    pub timer: TimerView,
    /// False when a start request adopted a countdown that was already running.
    pub changed: bool,
}

// -- Items --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateItemRequest {
    pub content: String,
    pub item_type: ItemType,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateItemRequest {
    pub content: String,
    pub item_type: ItemType,
}

/// Discussion-phase walk through the items, most voted first.
#[derive(Debug, Serialize, Deserialize)]
pub struct DiscussionView {
    pub items: Vec<RetroItem>,
    pub index: usize,
    pub current: Option<RetroItem>,
    pub has_previous: bool,
    pub has_next: bool,
}

// -- Billing --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckoutRequest {
    pub tier: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BillingUrlResponse {
    pub url: String,
}
