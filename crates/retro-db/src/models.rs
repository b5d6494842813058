//! Database row types. These map directly to SQLite rows and are converted
//! into `retro-types` models at the crate boundary.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use uuid::Uuid;

use retro_types::models::{RetroItem, Retrospective, User};

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
    pub password: Option<String>,
    pub role: String,
    pub subscription_type: String,
    pub subscription_expires: Option<String>,
    pub stripe_subscription_status: Option<String>,
    pub created_at: String,
}

pub struct RetrospectiveRow {
    pub id: String,
    pub name: String,
    pub date: String,
    pub phase: String,
    pub timer_expiration: i64,
    pub owner_id: String,
    pub created_at: String,
}

pub struct RetroItemRow {
    pub id: String,
    pub retrospective_id: String,
    pub author_id: String,
    pub content: String,
    pub item_type: String,
    pub created_at: String,
}

pub const USER_COLUMNS: &str = "id, email, name, image, password, role, subscription_type, \
     subscription_expires, stripe_subscription_status, created_at";

pub const RETRO_COLUMNS: &str = "id, name, date, phase, timer_expiration, owner_id, created_at";

pub const ITEM_COLUMNS: &str = "id, retrospective_id, author_id, content, item_type, created_at";

impl UserRow {
    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            email: row.get(1)?,
            name: row.get(2)?,
            image: row.get(3)?,
            password: row.get(4)?,
            role: row.get(5)?,
            subscription_type: row.get(6)?,
            subscription_expires: row.get(7)?,
            stripe_subscription_status: row.get(8)?,
            created_at: row.get(9)?,
        })
    }

    pub fn into_model(self) -> Result<User> {
        Ok(User {
            id: parse_uuid(&self.id)?,
            email: self.email,
            name: self.name,
            image: self.image,
            role: self.role.parse()?,
            subscription_type: self.subscription_type,
            subscription_expires: self
                .subscription_expires
                .as_deref()
                .map(parse_timestamp)
                .transpose()?,
            stripe_subscription_status: self.stripe_subscription_status,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

impl RetrospectiveRow {
    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            date: row.get(2)?,
            phase: row.get(3)?,
            timer_expiration: row.get(4)?,
            owner_id: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    pub fn into_model(self) -> Result<Retrospective> {
        Ok(Retrospective {
            id: parse_uuid(&self.id)?,
            date: NaiveDate::parse_from_str(&self.date, "%Y-%m-%d")
                .with_context(|| format!("Corrupt date '{}' on retrospective {}", self.date, self.id))?,
            phase: self.phase.parse()?,
            timer_expiration: from_millis(self.timer_expiration)?,
            owner_id: parse_uuid(&self.owner_id)?,
            created_at: parse_timestamp(&self.created_at)?,
            name: self.name,
        })
    }
}

impl RetroItemRow {
    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            retrospective_id: row.get(1)?,
            author_id: row.get(2)?,
            content: row.get(3)?,
            item_type: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    /// Attach the voter list. `votes` is its length by construction.
    pub fn into_model(self, voters: Vec<Uuid>) -> Result<RetroItem> {
        Ok(RetroItem {
            id: parse_uuid(&self.id)?,
            retrospective_id: parse_uuid(&self.retrospective_id)?,
            author_id: parse_uuid(&self.author_id)?,
            item_type: self.item_type.parse()?,
            created_at: parse_timestamp(&self.created_at)?,
            content: self.content,
            votes: u32::try_from(voters.len())?,
            voters,
        })
    }
}

pub fn parse_uuid(raw: &str) -> Result<Uuid> {
    raw.parse().with_context(|| format!("Corrupt id '{}'", raw))
}

/// Timestamps are written as RFC 3339 with millisecond precision, which also
/// sorts correctly as text. Rows written by hand through the sqlite shell
/// may carry `datetime('now')` output instead, so accept that too.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .with_context(|| format!("Corrupt timestamp '{}'", raw))
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| anyhow!("Timestamp out of range: {}", ms))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
