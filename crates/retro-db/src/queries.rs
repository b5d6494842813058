use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;
use uuid::Uuid;

use retro_core::phase;
use retro_core::voting::{self, VoteOutcome};
use retro_types::models::{ItemType, Phase, RetroItem, Retrospective, User};

use crate::Database;
use crate::models::{
    ITEM_COLUMNS, RETRO_COLUMNS, RetroItemRow, RetrospectiveRow, USER_COLUMNS, UserRow,
    format_date, format_timestamp, parse_uuid,
};

/// Result of `Database::cast_vote`.
#[derive(Debug, Clone, PartialEq)]
pub enum CastVote {
    NoItem,
    /// The owning retrospective is not collecting votes.
    Closed(Phase),
    Counted(VoteOutcome, RetroItem),
}

impl Database {
    // -- Users --

    /// Insert a user. `password_hash` is absent for accounts created by
    /// another user rather than through registration.
    pub fn create_user(&self, user: &User, password_hash: Option<&str>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, name, image, password, role, subscription_type,
                                    subscription_expires, stripe_subscription_status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    user.id.to_string(),
                    user.email,
                    user.name,
                    user.image,
                    password_hash,
                    user.role.as_str(),
                    user.subscription_type,
                    user.subscription_expires.map(format_timestamp),
                    user.stripe_subscription_status,
                    format_timestamp(user.created_at),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_user_row_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                    [email],
                    UserRow::from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        self.with_conn(|conn| query_user(conn, id))
    }

    /// Everyone who shares at least one retrospective with `user_id`,
    /// excluding `user_id` itself.
    pub fn list_co_participants(&self, user_id: Uuid) -> Result<Vec<User>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users
                 WHERE id != ?1
                   AND id IN (
                       SELECT p.user_id FROM retro_participants p
                       JOIN retro_participants mine
                         ON mine.retrospective_id = p.retrospective_id
                       WHERE mine.user_id = ?1
                   )
                 ORDER BY email"
            ))?;

            let rows = stmt
                .query_map([user_id.to_string()], UserRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter().map(UserRow::into_model).collect()
        })
    }

    /// Overwrite profile fields. Returns false when no such user exists.
    pub fn update_user(&self, user: &User) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users
                 SET email = ?2, name = ?3, image = ?4, subscription_type = ?5,
                     subscription_expires = ?6, stripe_subscription_status = ?7
                 WHERE id = ?1",
                params![
                    user.id.to_string(),
                    user.email,
                    user.name,
                    user.image,
                    user.subscription_type,
                    user.subscription_expires.map(format_timestamp),
                    user.stripe_subscription_status,
                ],
            )?;
            Ok(changed > 0)
        })
    }

    /// Removes the user along with everything they own (cascades).
    pub fn delete_user(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM users WHERE id = ?1", [id.to_string()])?;
            Ok(changed > 0)
        })
    }

    // -- Retrospectives --

    /// Insert a retrospective and enrol its owner as the first participant.
    pub fn create_retrospective(&self, retro: &Retrospective) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO retrospectives (id, name, date, phase, timer_expiration, owner_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    retro.id.to_string(),
                    retro.name,
                    format_date(retro.date),
                    retro.phase.as_str(),
                    retro.timer_expiration.timestamp_millis(),
                    retro.owner_id.to_string(),
                    format_timestamp(retro.created_at),
                ],
            )?;
            tx.execute(
                "INSERT INTO retro_participants (retrospective_id, user_id, joined_at) VALUES (?1, ?2, ?3)",
                params![
                    retro.id.to_string(),
                    retro.owner_id.to_string(),
                    format_timestamp(retro.created_at),
                ],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_retrospective(&self, id: Uuid) -> Result<Option<Retrospective>> {
        self.with_conn(|conn| query_retrospective(conn, id))
    }

    /// Retrospectives `user_id` takes part in, newest first.
    pub fn list_retrospectives_for_user(&self, user_id: Uuid) -> Result<Vec<Retrospective>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT r.id, r.name, r.date, r.phase, r.timer_expiration, r.owner_id, r.created_at
                 FROM retrospectives r
                 JOIN retro_participants p ON p.retrospective_id = r.id
                 WHERE p.user_id = ?1
                 ORDER BY r.date DESC, r.created_at DESC",
            )?;

            let rows = stmt
                .query_map([user_id.to_string()], RetrospectiveRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter().map(RetrospectiveRow::into_model).collect()
        })
    }

    /// Write every mutable field. No version check: the last writer wins.
    pub fn update_retrospective(&self, retro: &Retrospective) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE retrospectives
                 SET name = ?2, date = ?3, phase = ?4, timer_expiration = ?5
                 WHERE id = ?1",
                params![
                    retro.id.to_string(),
                    retro.name,
                    format_date(retro.date),
                    retro.phase.as_str(),
                    retro.timer_expiration.timestamp_millis(),
                ],
            )?;
            Ok(changed > 0)
        })
    }

    /// Move the retrospective to `phase` without touching the other columns,
    /// so a concurrent timer change is not clobbered.
    pub fn set_phase(&self, id: Uuid, phase: Phase) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE retrospectives SET phase = ?2 WHERE id = ?1",
                params![id.to_string(), phase.as_str()],
            )?;
            Ok(changed > 0)
        })
    }

    /// Store a new timer deadline only if the stored one is not in the
    /// future relative to `now`. Returns whether the row changed.
    ///
    /// The check and the write happen in one statement, so two participants
    /// racing to start the same timer cannot both extend it.
    pub fn start_timer_if_stopped(
        &self,
        id: Uuid,
        expiration: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE retrospectives SET timer_expiration = ?2
                 WHERE id = ?1 AND timer_expiration <= ?3",
                params![
                    id.to_string(),
                    expiration.timestamp_millis(),
                    now.timestamp_millis(),
                ],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn set_timer_expiration(&self, id: Uuid, expiration: DateTime<Utc>) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE retrospectives SET timer_expiration = ?2 WHERE id = ?1",
                params![id.to_string(), expiration.timestamp_millis()],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_retrospective(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let changed =
                conn.execute("DELETE FROM retrospectives WHERE id = ?1", [id.to_string()])?;
            Ok(changed > 0)
        })
    }

    /// Returns true when the user was not yet a participant.
    pub fn add_participant(&self, retro_id: Uuid, user_id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO retro_participants (retrospective_id, user_id, joined_at)
                 VALUES (?1, ?2, ?3)",
                params![retro_id.to_string(), user_id.to_string(), format_timestamp(now)],
            )?;
            Ok(changed > 0)
        })
    }

    // -- Items --

    pub fn create_item(&self, item: &RetroItem) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO retro_items (id, retrospective_id, author_id, content, item_type, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    item.id.to_string(),
                    item.retrospective_id.to_string(),
                    item.author_id.to_string(),
                    item.content,
                    item.item_type.as_str(),
                    format_timestamp(item.created_at),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_item(&self, id: Uuid) -> Result<Option<RetroItem>> {
        self.with_conn(|conn| query_item(conn, id))
    }

    /// All items of a retrospective in creation order.
    pub fn list_items(&self, retro_id: Uuid) -> Result<Vec<RetroItem>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ITEM_COLUMNS} FROM retro_items
                 WHERE retrospective_id = ?1
                 ORDER BY created_at ASC, rowid ASC"
            ))?;
            let rows = stmt
                .query_map([retro_id.to_string()], RetroItemRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            // Batch-fetch voters for the whole retrospective in one query
            let mut votes = conn.prepare(
                "SELECT v.item_id, v.user_id FROM item_votes v
                 JOIN retro_items i ON i.id = v.item_id
                 WHERE i.retrospective_id = ?1
                 ORDER BY v.rowid ASC",
            )?;
            let vote_rows = votes
                .query_map([retro_id.to_string()], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut voters: std::collections::HashMap<String, Vec<Uuid>> =
                std::collections::HashMap::new();
            for (item_id, user_id) in vote_rows {
                voters.entry(item_id).or_default().push(parse_uuid(&user_id)?);
            }

            rows.into_iter()
                .map(|row| {
                    let item_voters = voters.remove(&row.id).unwrap_or_default();
                    row.into_model(item_voters)
                })
                .collect()
        })
    }

    pub fn update_item(&self, id: Uuid, content: &str, item_type: ItemType) -> Result<Option<RetroItem>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE retro_items SET content = ?2, item_type = ?3 WHERE id = ?1",
                params![id.to_string(), content, item_type.as_str()],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_item(conn, id)
        })
    }

    pub fn delete_item(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM retro_items WHERE id = ?1", [id.to_string()])?;
            Ok(changed > 0)
        })
    }

    /// Count a vote atomically: read the item and its retrospective's phase,
    /// apply the one-vote-per-user rule and store the vote inside a single
    /// transaction, so a phase change cannot slip in between check and write.
    ///
    /// On `AlreadyVoted` the returned item is the unchanged stored state.
    pub fn cast_vote(&self, item_id: Uuid, user_id: Uuid, now: DateTime<Utc>) -> Result<CastVote> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let Some(mut item) = query_item(&tx, item_id)? else {
                return Ok(CastVote::NoItem);
            };

            let stored: String = tx.query_row(
                "SELECT phase FROM retrospectives WHERE id = ?1",
                [item.retrospective_id.to_string()],
                |row| row.get(0),
            )?;
            let current: Phase = stored.parse()?;
            if !phase::accepts_votes(current) {
                return Ok(CastVote::Closed(current));
            }

            let outcome = voting::record_vote(&mut item, user_id);
            if outcome == VoteOutcome::Recorded {
                tx.execute(
                    "INSERT INTO item_votes (item_id, user_id, created_at) VALUES (?1, ?2, ?3)",
                    params![item_id.to_string(), user_id.to_string(), format_timestamp(now)],
                )?;
            }
            tx.commit()?;

            debug!("vote on item {} by {}: {:?}", item_id, user_id, outcome);
            Ok(CastVote::Counted(outcome, item))
        })
    }
}

fn query_user(conn: &Connection, id: Uuid) -> Result<Option<User>> {
    let row = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            [id.to_string()],
            UserRow::from_row,
        )
        .optional()?;

    row.map(UserRow::into_model).transpose()
}

fn query_retrospective(conn: &Connection, id: Uuid) -> Result<Option<Retrospective>> {
    let row = conn
        .query_row(
            &format!("SELECT {RETRO_COLUMNS} FROM retrospectives WHERE id = ?1"),
            [id.to_string()],
            RetrospectiveRow::from_row,
        )
        .optional()?;

    row.map(RetrospectiveRow::into_model).transpose()
}

fn query_item(conn: &Connection, id: Uuid) -> Result<Option<RetroItem>> {
    let row = conn
        .query_row(
            &format!("SELECT {ITEM_COLUMNS} FROM retro_items WHERE id = ?1"),
            [id.to_string()],
            RetroItemRow::from_row,
        )
        .optional()?;

    let Some(row) = row else {
        return Ok(None);
    };

    let mut stmt =
        conn.prepare("SELECT user_id FROM item_votes WHERE item_id = ?1 ORDER BY rowid ASC")?;
    let voters = stmt
        .query_map([id.to_string()], |r| r.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?
        .iter()
        .map(|raw| parse_uuid(raw))
        .collect::<Result<Vec<_>>>()?;

    row.into_model(voters).map(Some)
}
