use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id                          TEXT PRIMARY KEY,
            email                       TEXT NOT NULL UNIQUE,
            name                        TEXT,
            image                       TEXT,
            password                    TEXT,
            role                        TEXT NOT NULL DEFAULT 'USER'
                                            CHECK (role IN ('USER', 'ADMIN')),
            subscription_type           TEXT NOT NULL DEFAULT 'FREE',
            subscription_expires        TEXT,
            stripe_subscription_status  TEXT,
            created_at                  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS retrospectives (
            id                  TEXT PRIMARY KEY,
            name                TEXT NOT NULL,
            date                TEXT NOT NULL,
            phase               TEXT NOT NULL DEFAULT 'WRITING'
                                    CHECK (phase IN ('WRITING', 'GROUPING', 'VOTING', 'DISCUSSING')),
            -- unix milliseconds, compared numerically when starting the timer
            timer_expiration    INTEGER NOT NULL,
            owner_id            TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at          TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS retro_participants (
            retrospective_id    TEXT NOT NULL REFERENCES retrospectives(id) ON DELETE CASCADE,
            user_id             TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            joined_at           TEXT NOT NULL,
            PRIMARY KEY (retrospective_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_participants_user
            ON retro_participants(user_id);

        CREATE TABLE IF NOT EXISTS retro_items (
            id                  TEXT PRIMARY KEY,
            retrospective_id    TEXT NOT NULL REFERENCES retrospectives(id) ON DELETE CASCADE,
            author_id           TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            content             TEXT NOT NULL,
            item_type           TEXT NOT NULL
                                    CHECK (item_type IN ('WENT_WELL', 'TO_IMPROVE', 'ACTION_ITEM')),
            created_at          TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_items_retro
            ON retro_items(retrospective_id, created_at);

        -- One row per (item, voter). The vote count is derived from this table.
        CREATE TABLE IF NOT EXISTS item_votes (
            item_id     TEXT NOT NULL REFERENCES retro_items(id) ON DELETE CASCADE,
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at  TEXT NOT NULL,
            PRIMARY KEY (item_id, user_id)
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
