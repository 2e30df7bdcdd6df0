//! Embedded SQL migrations and runner.
//!
//! Migrations are stored as `&str` constants and executed in order. A
//! `schema_migrations` table tracks which versions have been applied.
//!
//! Every archived entity lives in two tables: the current table and an
//! append-only `*_historical` table carrying the same data columns plus
//! `<origin>_id` and `deleted_at`. Origin columns are deliberately plain
//! integers (no FK): reconciliation deletes current rows while their
//! archived copies remain.

use rusqlite::Connection;
use gy_core::{Error, Result};

/// V1: initial schema -- accounts, users, subjects, interests, notes,
/// albums, broadcasts, relations, favorites, attachments, settings.
const V1_INITIAL: &str = r#"
-- Crawl accounts
CREATE TABLE account (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    name         TEXT NOT NULL,
    user_id      INTEGER REFERENCES user(id),
    session      TEXT NOT NULL,
    is_activated INTEGER NOT NULL DEFAULT 0,
    is_invalid   INTEGER NOT NULL DEFAULT 0,
    created_at   TEXT NOT NULL
);

-- Site users
CREATE TABLE user (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    douban_id    INTEGER NOT NULL UNIQUE,
    unique_name  TEXT NOT NULL UNIQUE,
    name         TEXT,
    created      TEXT,
    loc_name     TEXT,
    signature    TEXT,
    description  TEXT,
    avatar       TEXT,
    large_avatar TEXT,
    alt          TEXT,
    kind         TEXT,
    version      INTEGER NOT NULL DEFAULT 1,
    updated_at   TEXT NOT NULL
);

CREATE TABLE user_historical (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    douban_id    INTEGER,
    unique_name  TEXT,
    name         TEXT,
    created      TEXT,
    loc_name     TEXT,
    signature    TEXT,
    description  TEXT,
    avatar       TEXT,
    large_avatar TEXT,
    alt          TEXT,
    kind         TEXT,
    version      INTEGER,
    updated_at   TEXT,
    user_id      INTEGER NOT NULL,
    deleted_at   TEXT NOT NULL
);

-- Counter sidecar, refreshed separately from the profile
CREATE TABLE user_extra (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id         INTEGER NOT NULL UNIQUE,
    following_count INTEGER,
    follower_count  INTEGER,
    statuses_count  INTEGER,
    updated_at      TEXT NOT NULL
);

-- Subjects
CREATE TABLE book (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    douban_id    INTEGER NOT NULL UNIQUE,
    title        TEXT,
    subtitle     TEXT,
    alt_title    TEXT,
    author       TEXT,
    translator   TEXT,
    publisher    TEXT,
    origin_title TEXT,
    pubdate      TEXT,
    isbn10       TEXT,
    isbn13       TEXT,
    price        TEXT,
    pages        TEXT,
    binding      TEXT,
    rating       TEXT,
    image        TEXT,
    summary      TEXT,
    alt          TEXT,
    version      INTEGER NOT NULL DEFAULT 1,
    updated_at   TEXT NOT NULL
);

CREATE TABLE book_historical (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    douban_id    INTEGER,
    title        TEXT,
    subtitle     TEXT,
    alt_title    TEXT,
    author       TEXT,
    translator   TEXT,
    publisher    TEXT,
    origin_title TEXT,
    pubdate      TEXT,
    isbn10       TEXT,
    isbn13       TEXT,
    price        TEXT,
    pages        TEXT,
    binding      TEXT,
    rating       TEXT,
    image        TEXT,
    summary      TEXT,
    alt          TEXT,
    version      INTEGER,
    updated_at   TEXT,
    book_id      INTEGER NOT NULL,
    deleted_at   TEXT NOT NULL
);

CREATE TABLE movie (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    douban_id  INTEGER NOT NULL UNIQUE,
    title      TEXT,
    alt_title  TEXT,
    rating     TEXT,
    image      TEXT,
    summary    TEXT,
    attrs      TEXT,
    alt        TEXT,
    tags       TEXT,
    version    INTEGER NOT NULL DEFAULT 1,
    updated_at TEXT NOT NULL
);

CREATE TABLE movie_historical (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    douban_id  INTEGER,
    title      TEXT,
    alt_title  TEXT,
    rating     TEXT,
    image      TEXT,
    summary    TEXT,
    attrs      TEXT,
    alt        TEXT,
    tags       TEXT,
    version    INTEGER,
    updated_at TEXT,
    movie_id   INTEGER NOT NULL,
    deleted_at TEXT NOT NULL
);

CREATE TABLE music (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    douban_id  INTEGER NOT NULL UNIQUE,
    title      TEXT,
    alt_title  TEXT,
    author     TEXT,
    rating     TEXT,
    image      TEXT,
    summary    TEXT,
    attrs      TEXT,
    alt        TEXT,
    tags       TEXT,
    version    INTEGER NOT NULL DEFAULT 1,
    updated_at TEXT NOT NULL
);

CREATE TABLE music_historical (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    douban_id  INTEGER,
    title      TEXT,
    alt_title  TEXT,
    author     TEXT,
    rating     TEXT,
    image      TEXT,
    summary    TEXT,
    attrs      TEXT,
    alt        TEXT,
    tags       TEXT,
    version    INTEGER,
    updated_at TEXT,
    music_id   INTEGER NOT NULL,
    deleted_at TEXT NOT NULL
);

-- Interests (the user's shelf per subject kind)
CREATE TABLE my_book (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     INTEGER NOT NULL REFERENCES user(id),
    book_id     INTEGER NOT NULL REFERENCES book(id),
    rating      TEXT,
    tags        TEXT,
    comment     TEXT,
    create_time TEXT,
    status      TEXT,
    version     INTEGER NOT NULL DEFAULT 1,
    updated_at  TEXT NOT NULL,
    UNIQUE (user_id, book_id)
);

CREATE TABLE my_book_historical (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     INTEGER,
    book_id     INTEGER,
    rating      TEXT,
    tags        TEXT,
    comment     TEXT,
    create_time TEXT,
    status      TEXT,
    version     INTEGER,
    updated_at  TEXT,
    my_book_id  INTEGER NOT NULL,
    deleted_at  TEXT NOT NULL
);

CREATE TABLE my_movie (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     INTEGER NOT NULL REFERENCES user(id),
    movie_id    INTEGER NOT NULL REFERENCES movie(id),
    rating      TEXT,
    tags        TEXT,
    comment     TEXT,
    create_time TEXT,
    status      TEXT,
    version     INTEGER NOT NULL DEFAULT 1,
    updated_at  TEXT NOT NULL,
    UNIQUE (user_id, movie_id)
);

CREATE TABLE my_movie_historical (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     INTEGER,
    movie_id    INTEGER,
    rating      TEXT,
    tags        TEXT,
    comment     TEXT,
    create_time TEXT,
    status      TEXT,
    version     INTEGER,
    updated_at  TEXT,
    my_movie_id INTEGER NOT NULL,
    deleted_at  TEXT NOT NULL
);

CREATE TABLE my_music (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     INTEGER NOT NULL REFERENCES user(id),
    music_id    INTEGER NOT NULL REFERENCES music(id),
    rating      TEXT,
    tags        TEXT,
    comment     TEXT,
    create_time TEXT,
    status      TEXT,
    version     INTEGER NOT NULL DEFAULT 1,
    updated_at  TEXT NOT NULL,
    UNIQUE (user_id, music_id)
);

CREATE TABLE my_music_historical (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     INTEGER,
    music_id    INTEGER,
    rating      TEXT,
    tags        TEXT,
    comment     TEXT,
    create_time TEXT,
    status      TEXT,
    version     INTEGER,
    updated_at  TEXT,
    my_music_id INTEGER NOT NULL,
    deleted_at  TEXT NOT NULL
);

-- Notes
CREATE TABLE note (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    douban_id    INTEGER NOT NULL UNIQUE,
    user_id      INTEGER REFERENCES user(id),
    title        TEXT,
    introduction TEXT,
    content      TEXT,
    created      TEXT,
    updated      TEXT,
    version      INTEGER NOT NULL DEFAULT 1,
    updated_at   TEXT NOT NULL
);

CREATE TABLE note_historical (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    douban_id    INTEGER,
    user_id      INTEGER,
    title        TEXT,
    introduction TEXT,
    content      TEXT,
    created      TEXT,
    updated      TEXT,
    version      INTEGER,
    updated_at   TEXT,
    note_id      INTEGER NOT NULL,
    deleted_at   TEXT NOT NULL
);

-- Photo albums and their pictures
CREATE TABLE photo_album (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    douban_id    INTEGER NOT NULL UNIQUE,
    user_id      INTEGER REFERENCES user(id),
    title        TEXT,
    description  TEXT,
    cover        TEXT,
    total        INTEGER,
    last_updated TEXT,
    version      INTEGER NOT NULL DEFAULT 1,
    updated_at   TEXT NOT NULL
);

CREATE TABLE photo_album_historical (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    douban_id      INTEGER,
    user_id        INTEGER,
    title          TEXT,
    description    TEXT,
    cover          TEXT,
    total          INTEGER,
    last_updated   TEXT,
    version        INTEGER,
    updated_at     TEXT,
    photo_album_id INTEGER NOT NULL,
    deleted_at     TEXT NOT NULL
);

CREATE TABLE photo_picture (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    album_id    INTEGER NOT NULL REFERENCES photo_album(id),
    src         TEXT NOT NULL,
    description TEXT,
    updated_at  TEXT NOT NULL,
    UNIQUE (album_id, src)
);

-- Broadcasts (status posts) and the per-user timeline
CREATE TABLE broadcast (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    douban_id      INTEGER NOT NULL UNIQUE,
    user_id        INTEGER REFERENCES user(id),
    created        TEXT,
    content        TEXT,
    blockquote     TEXT,
    status_url     TEXT,
    kind           TEXT,
    is_noreply     INTEGER NOT NULL DEFAULT 0,
    reshared_id    INTEGER,
    images         TEXT,
    reshared_count INTEGER,
    like_count     INTEGER,
    comments_count INTEGER,
    version        INTEGER NOT NULL DEFAULT 1,
    updated_at     TEXT NOT NULL
);

CREATE TABLE broadcast_historical (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    douban_id      INTEGER,
    user_id        INTEGER,
    created        TEXT,
    content        TEXT,
    blockquote     TEXT,
    status_url     TEXT,
    kind           TEXT,
    is_noreply     INTEGER,
    reshared_id    INTEGER,
    images         TEXT,
    reshared_count INTEGER,
    like_count     INTEGER,
    comments_count INTEGER,
    version        INTEGER,
    updated_at     TEXT,
    broadcast_id   INTEGER NOT NULL,
    deleted_at     TEXT NOT NULL
);

CREATE INDEX idx_broadcast_user_created ON broadcast (user_id, created);

CREATE TABLE timeline (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id      INTEGER NOT NULL REFERENCES user(id),
    broadcast_id INTEGER NOT NULL REFERENCES broadcast(id),
    updated_at   TEXT NOT NULL,
    UNIQUE (user_id, broadcast_id)
);

-- Comments on a backed-up target
CREATE TABLE comment (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    target_type      TEXT NOT NULL,
    target_douban_id INTEGER NOT NULL,
    douban_id        INTEGER NOT NULL,
    author_name      TEXT,
    author_url       TEXT,
    content          TEXT,
    like_count       INTEGER,
    created          TEXT,
    updated_at       TEXT NOT NULL,
    UNIQUE (target_type, target_douban_id, douban_id)
);

-- Set-valued relations, reconciled against fresh snapshots
CREATE TABLE following (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id        INTEGER NOT NULL REFERENCES user(id),
    name           TEXT NOT NULL,
    target_user_id INTEGER REFERENCES user(id),
    version        INTEGER NOT NULL DEFAULT 1,
    updated_at     TEXT NOT NULL,
    UNIQUE (user_id, name)
);

CREATE TABLE following_historical (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id        INTEGER,
    name           TEXT,
    target_user_id INTEGER,
    version        INTEGER,
    updated_at     TEXT,
    following_id   INTEGER NOT NULL,
    deleted_at     TEXT NOT NULL
);

CREATE TABLE follower (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id        INTEGER NOT NULL REFERENCES user(id),
    name           TEXT NOT NULL,
    target_user_id INTEGER REFERENCES user(id),
    version        INTEGER NOT NULL DEFAULT 1,
    updated_at     TEXT NOT NULL,
    UNIQUE (user_id, name)
);

CREATE TABLE follower_historical (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id        INTEGER,
    name           TEXT,
    target_user_id INTEGER,
    version        INTEGER,
    updated_at     TEXT,
    follower_id    INTEGER NOT NULL,
    deleted_at     TEXT NOT NULL
);

CREATE TABLE block_user (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id        INTEGER NOT NULL REFERENCES user(id),
    name           TEXT NOT NULL,
    target_user_id INTEGER REFERENCES user(id),
    version        INTEGER NOT NULL DEFAULT 1,
    updated_at     TEXT NOT NULL,
    UNIQUE (user_id, name)
);

CREATE TABLE block_user_historical (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id        INTEGER,
    name           TEXT,
    target_user_id INTEGER,
    version        INTEGER,
    updated_at     TEXT,
    block_user_id  INTEGER NOT NULL,
    deleted_at     TEXT NOT NULL
);

-- Likes
CREATE TABLE favorite (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id          INTEGER NOT NULL REFERENCES user(id),
    target_type      TEXT NOT NULL,
    target_douban_id INTEGER NOT NULL,
    title            TEXT,
    tags             TEXT,
    version          INTEGER NOT NULL DEFAULT 1,
    updated_at       TEXT NOT NULL,
    UNIQUE (user_id, target_type, target_douban_id)
);

CREATE TABLE favorite_historical (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id          INTEGER,
    target_type      TEXT,
    target_douban_id INTEGER,
    title            TEXT,
    tags             TEXT,
    version          INTEGER,
    updated_at       TEXT,
    favorite_id      INTEGER NOT NULL,
    deleted_at       TEXT NOT NULL
);

-- Binary attachments, materialized under the cache directory on demand
CREATE TABLE attachment (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    url        TEXT NOT NULL UNIQUE,
    mime_type  TEXT,
    local      TEXT,
    ref_count  INTEGER NOT NULL DEFAULT 0,
    retries    INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

-- Runtime configuration
CREATE TABLE setting (
    name  TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

struct Migration {
    version: usize,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial",
    sql: V1_INITIAL,
}];

fn init_migrations_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY NOT NULL,
            name       TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;
    Ok(())
}

fn get_current_version(conn: &Connection) -> rusqlite::Result<usize> {
    conn.query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
        row.get::<_, Option<usize>>(0)
    })
    .map(|v| v.unwrap_or(0))
}

/// Run all pending migrations, each in its own transaction.
///
/// Returns the number of migrations applied.
pub fn run_migrations(conn: &Connection) -> Result<usize> {
    init_migrations_table(conn).map_err(|e| Error::database(e.to_string()))?;

    let current_version =
        get_current_version(conn).map_err(|e| Error::database(e.to_string()))?;

    let mut applied_count = 0;
    for migration in MIGRATIONS.iter().filter(|m| m.version > current_version) {
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| Error::database(e.to_string()))?;

        tx.execute_batch(migration.sql).map_err(|e| {
            Error::database(format!(
                "migration {} ({}) failed: {e}",
                migration.version, migration.name
            ))
        })?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
            rusqlite::params![migration.version, migration.name],
        )
        .map_err(|e| Error::database(e.to_string()))?;

        tx.commit().map_err(|e| Error::database(e.to_string()))?;

        tracing::info!("Applied migration {}: {}", migration.version, migration.name);
        applied_count += 1;
    }

    Ok(applied_count)
}

/// Get the current schema version without applying migrations.
pub fn current_version(conn: &Connection) -> Result<usize> {
    init_migrations_table(conn).map_err(|e| Error::database(e.to_string()))?;
    get_current_version(conn).map_err(|e| Error::database(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_conn() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    #[test]
    fn applies_all_migrations_once() {
        let conn = memory_conn();
        assert_eq!(run_migrations(&conn).unwrap(), MIGRATIONS.len());
        assert_eq!(run_migrations(&conn).unwrap(), 0);
        assert_eq!(current_version(&conn).unwrap(), MIGRATIONS.len());
    }

    #[test]
    fn historical_tables_exist() {
        let conn = memory_conn();
        run_migrations(&conn).unwrap();

        for table in [
            "user_historical",
            "book_historical",
            "movie_historical",
            "music_historical",
            "my_book_historical",
            "my_movie_historical",
            "my_music_historical",
            "note_historical",
            "photo_album_historical",
            "broadcast_historical",
            "following_historical",
            "follower_historical",
            "block_user_historical",
            "favorite_historical",
        ] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {table}");
        }
    }
}
