//! Rust structs mapping to database tables.
//!
//! Each model implements `from_row` for constructing itself from a
//! `rusqlite::Row`, in the column order of its query module's `COLS`
//! constant.

use serde::{Deserialize, Serialize};

/// A crawl account: the login session on whose behalf backups run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub user_id: Option<i64>,
    pub session: String,
    pub is_activated: bool,
    pub is_invalid: bool,
    pub created_at: String,
}

impl Account {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            user_id: row.get(2)?,
            session: row.get(3)?,
            is_activated: row.get(4)?,
            is_invalid: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

/// A site user (the owner or anyone referenced by the archive).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub douban_id: i64,
    pub unique_name: String,
    pub name: Option<String>,
    pub created: Option<String>,
    pub loc_name: Option<String>,
    pub signature: Option<String>,
    pub description: Option<String>,
    pub avatar: Option<String>,
    pub large_avatar: Option<String>,
    pub alt: Option<String>,
    pub kind: Option<String>,
    pub version: i64,
    pub updated_at: String,
}

impl User {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            douban_id: row.get(1)?,
            unique_name: row.get(2)?,
            name: row.get(3)?,
            created: row.get(4)?,
            loc_name: row.get(5)?,
            signature: row.get(6)?,
            description: row.get(7)?,
            avatar: row.get(8)?,
            large_avatar: row.get(9)?,
            alt: row.get(10)?,
            kind: row.get(11)?,
            version: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }
}

/// Subject row in its lightest form: enough for TTL checks and linking.
#[derive(Debug, Clone)]
pub struct SubjectRef {
    pub id: i64,
    pub douban_id: i64,
    pub updated_at: String,
}

impl SubjectRef {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            douban_id: row.get(1)?,
            updated_at: row.get(2)?,
        })
    }
}

/// A note row (TTL metadata only; content stays in the store).
#[derive(Debug, Clone)]
pub struct NoteRef {
    pub id: i64,
    pub douban_id: i64,
    pub updated_at: String,
}

impl NoteRef {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            douban_id: row.get(1)?,
            updated_at: row.get(2)?,
        })
    }
}

/// A photo album row.
#[derive(Debug, Clone)]
pub struct PhotoAlbum {
    pub id: i64,
    pub douban_id: i64,
    pub user_id: Option<i64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub cover: Option<String>,
    pub total: Option<i64>,
    pub last_updated: Option<String>,
    pub version: i64,
    pub updated_at: String,
}

impl PhotoAlbum {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            douban_id: row.get(1)?,
            user_id: row.get(2)?,
            title: row.get(3)?,
            description: row.get(4)?,
            cover: row.get(5)?,
            total: row.get(6)?,
            last_updated: row.get(7)?,
            version: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}

/// A status post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Broadcast {
    pub id: i64,
    pub douban_id: i64,
    pub user_id: Option<i64>,
    pub created: Option<String>,
    pub content: Option<String>,
    pub blockquote: Option<String>,
    pub status_url: Option<String>,
    pub kind: Option<String>,
    pub is_noreply: bool,
    pub reshared_id: Option<i64>,
    pub images: Option<String>,
    pub reshared_count: Option<i64>,
    pub like_count: Option<i64>,
    pub comments_count: Option<i64>,
    pub version: i64,
    pub updated_at: String,
}

impl Broadcast {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            douban_id: row.get(1)?,
            user_id: row.get(2)?,
            created: row.get(3)?,
            content: row.get(4)?,
            blockquote: row.get(5)?,
            status_url: row.get(6)?,
            kind: row.get(7)?,
            is_noreply: row.get(8)?,
            reshared_id: row.get(9)?,
            images: row.get(10)?,
            reshared_count: row.get(11)?,
            like_count: row.get(12)?,
            comments_count: row.get(13)?,
            version: row.get(14)?,
            updated_at: row.get(15)?,
        })
    }
}

/// A binary attachment referenced from the archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: i64,
    pub url: String,
    pub mime_type: Option<String>,
    pub local: Option<String>,
    pub ref_count: i64,
    pub retries: i64,
    pub created_at: String,
}

impl Attachment {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            url: row.get(1)?,
            mime_type: row.get(2)?,
            local: row.get(3)?,
            ref_count: row.get(4)?,
            retries: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}
