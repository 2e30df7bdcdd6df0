//! Page decoders producing canonical records.
//!
//! Decoders are pure functions from an HTTP body (plus minimal context)
//! to typed records carrying the union of observed fields. They are
//! tolerant by construction: a missing sub-element yields a `None` field,
//! never a panic, and a record missing its identifying field is skipped.
//! Records lower themselves into [`Fields`] maps; columns a given table
//! does not declare are dropped at insert time.

pub mod html;
pub mod json;
pub mod text;

use gy_db::tables::{self, TableSpec};
use gy_db::Fields;

// ---------------------------------------------------------------------------
// Subjects
// ---------------------------------------------------------------------------

/// The three subject kinds sharing the interests pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectKind {
    Book,
    Movie,
    Music,
}

impl SubjectKind {
    /// Name used by the mobile interests API.
    pub fn api_name(&self) -> &'static str {
        match self {
            SubjectKind::Book => "book",
            SubjectKind::Movie => "movie",
            SubjectKind::Music => "music",
        }
    }

    /// Spec of the subject table.
    pub fn spec(&self) -> &'static TableSpec {
        match self {
            SubjectKind::Book => &tables::BOOK,
            SubjectKind::Movie => &tables::MOVIE,
            SubjectKind::Music => &tables::MUSIC,
        }
    }

    /// Spec of the per-user interest table.
    pub fn my_spec(&self) -> &'static TableSpec {
        match self {
            SubjectKind::Book => &tables::MY_BOOK,
            SubjectKind::Movie => &tables::MY_MOVIE,
            SubjectKind::Music => &tables::MY_MUSIC,
        }
    }

    /// Column of the interest table referencing the subject row.
    pub fn link_column(&self) -> &'static str {
        match self {
            SubjectKind::Book => "book_id",
            SubjectKind::Movie => "movie_id",
            SubjectKind::Music => "music_id",
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A user profile as decoded from the mobile API.
#[derive(Debug, Clone, Default)]
pub struct UserRecord {
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
    // counter sidecar, persisted separately
    pub following_count: Option<i64>,
    pub follower_count: Option<i64>,
    pub statuses_count: Option<i64>,
}

impl UserRecord {
    pub fn fields(&self) -> Fields {
        Fields::new()
            .with("douban_id", self.douban_id)
            .with("unique_name", self.unique_name.clone())
            .with("name", self.name.clone())
            .with("created", self.created.clone())
            .with("loc_name", self.loc_name.clone())
            .with("signature", self.signature.clone())
            .with("description", self.description.clone())
            .with("avatar", self.avatar.clone())
            .with("large_avatar", self.large_avatar.clone())
            .with("alt", self.alt.clone())
            .with("kind", self.kind.clone())
    }

    /// Counter sidecar fields, keyed by the stored user row.
    pub fn extra_fields(&self, user_id: i64) -> Option<Fields> {
        if self.following_count.is_none()
            && self.follower_count.is_none()
            && self.statuses_count.is_none()
        {
            return None;
        }
        Some(
            Fields::new()
                .with("user_id", user_id)
                .with("following_count", self.following_count)
                .with("follower_count", self.follower_count)
                .with("statuses_count", self.statuses_count),
        )
    }
}

/// A subject (book / movie / music) carrying the union of observed
/// fields; tables drop whatever they do not declare.
#[derive(Debug, Clone, Default)]
pub struct SubjectRecord {
    pub douban_id: i64,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub alt_title: Option<String>,
    pub origin_title: Option<String>,
    /// JSON-encoded list.
    pub author: Option<String>,
    /// JSON-encoded list.
    pub translator: Option<String>,
    pub publisher: Option<String>,
    pub pubdate: Option<String>,
    pub isbn10: Option<String>,
    pub isbn13: Option<String>,
    pub price: Option<String>,
    pub pages: Option<String>,
    pub binding: Option<String>,
    /// JSON-encoded rating object.
    pub rating: Option<String>,
    pub image: Option<String>,
    pub summary: Option<String>,
    /// JSON-encoded free-form attribute object.
    pub attrs: Option<String>,
    pub alt: Option<String>,
    /// JSON-encoded tag list.
    pub tags: Option<String>,
}

impl SubjectRecord {
    pub fn fields(&self) -> Fields {
        Fields::new()
            .with("douban_id", self.douban_id)
            .with("title", self.title.clone())
            .with("subtitle", self.subtitle.clone())
            .with("alt_title", self.alt_title.clone())
            .with("origin_title", self.origin_title.clone())
            .with("author", self.author.clone())
            .with("translator", self.translator.clone())
            .with("publisher", self.publisher.clone())
            .with("pubdate", self.pubdate.clone())
            .with("isbn10", self.isbn10.clone())
            .with("isbn13", self.isbn13.clone())
            .with("price", self.price.clone())
            .with("pages", self.pages.clone())
            .with("binding", self.binding.clone())
            .with("rating", self.rating.clone())
            .with("image", self.image.clone())
            .with("summary", self.summary.clone())
            .with("attrs", self.attrs.clone())
            .with("alt", self.alt.clone())
            .with("tags", self.tags.clone())
    }
}

/// One element of an interests-API page.
#[derive(Debug, Clone)]
pub struct InterestRecord {
    pub subject_id: i64,
    /// Embedded subject, when the API inlines it.
    pub subject: Option<SubjectRecord>,
    /// JSON-encoded rating object.
    pub rating: Option<String>,
    /// JSON-encoded tag list.
    pub tags: Option<String>,
    pub comment: Option<String>,
    pub create_time: Option<String>,
    pub status: String,
}

impl InterestRecord {
    pub fn fields(&self, user_id: i64, link_column: &'static str, subject_row: i64) -> Fields {
        Fields::new()
            .with("user_id", user_id)
            .with(link_column, subject_row)
            .with("rating", self.rating.clone())
            .with("tags", self.tags.clone())
            .with("comment", self.comment.clone())
            .with("create_time", self.create_time.clone())
            .with("status", self.status.clone())
    }
}

/// One page of the interests API.
#[derive(Debug, Clone, Default)]
pub struct InterestsPage {
    pub interests: Vec<InterestRecord>,
    pub total: i64,
    pub start: i64,
    pub count: i64,
}

/// An entry of a following / followers / block-list page.
#[derive(Debug, Clone)]
pub struct UserListEntry {
    pub unique_name: String,
    pub display_name: Option<String>,
    pub avatar: Option<String>,
}

/// What flavor of status post a broadcast is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastKind {
    /// Quotes another status.
    Reshare,
    /// Free text, possibly with image attachments.
    Saying,
    /// Anything else (subject recommendations etc.).
    Plain,
}

impl BroadcastKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BroadcastKind::Reshare => "reshare",
            BroadcastKind::Saying => "saying",
            BroadcastKind::Plain => "plain",
        }
    }
}

/// A status post as decoded from the statuses stream.
#[derive(Debug, Clone)]
pub struct BroadcastRecord {
    pub douban_id: i64,
    /// Author's unique name, from the profile link.
    pub author_name: Option<String>,
    pub created: Option<String>,
    pub content: Option<String>,
    pub blockquote: Option<String>,
    pub status_url: Option<String>,
    pub kind: BroadcastKind,
    pub is_noreply: bool,
    pub images: Vec<String>,
    /// Inner status for reshares; persisted before the outer one.
    pub reshared: Option<Box<BroadcastRecord>>,
    pub reshared_count: Option<i64>,
    pub like_count: Option<i64>,
    pub comments_count: Option<i64>,
}

impl BroadcastRecord {
    pub fn fields(&self, user_id: Option<i64>) -> Fields {
        let images = if self.images.is_empty() {
            None
        } else {
            serde_json::to_string(&self.images).ok()
        };
        Fields::new()
            .with("douban_id", self.douban_id)
            .with("user_id", user_id)
            .with("created", self.created.clone())
            .with("content", self.content.clone())
            .with("blockquote", self.blockquote.clone())
            .with("status_url", self.status_url.clone())
            .with("kind", self.kind.as_str().to_string())
            .with("is_noreply", self.is_noreply)
            .with(
                "reshared_id",
                self.reshared.as_ref().map(|inner| inner.douban_id),
            )
            .with("images", images)
            .with("reshared_count", self.reshared_count)
            .with("like_count", self.like_count)
            .with("comments_count", self.comments_count)
    }
}

/// A comment under a backed-up target.
#[derive(Debug, Clone)]
pub struct CommentRecord {
    pub douban_id: i64,
    pub author_name: Option<String>,
    pub author_url: Option<String>,
    pub content: Option<String>,
    pub like_count: Option<i64>,
    pub created: Option<String>,
}

impl CommentRecord {
    pub fn fields(&self, target_type: &str, target_douban_id: i64) -> Fields {
        Fields::new()
            .with("target_type", target_type.to_string())
            .with("target_douban_id", target_douban_id)
            .with("douban_id", self.douban_id)
            .with("author_name", self.author_name.clone())
            .with("author_url", self.author_url.clone())
            .with("content", self.content.clone())
            .with("like_count", self.like_count)
            .with("created", self.created.clone())
    }
}

/// A notes-list entry; the full note is fetched per item.
#[derive(Debug, Clone)]
pub struct NoteEntry {
    pub douban_id: i64,
    pub title: Option<String>,
    pub url: Option<String>,
}

/// A full note page.
#[derive(Debug, Clone)]
pub struct NoteRecord {
    pub douban_id: i64,
    pub title: Option<String>,
    pub introduction: Option<String>,
    pub content: Option<String>,
    pub created: Option<String>,
    pub updated: Option<String>,
    pub images: Vec<String>,
}

impl NoteRecord {
    pub fn fields(&self, user_id: Option<i64>) -> Fields {
        Fields::new()
            .with("douban_id", self.douban_id)
            .with("user_id", user_id)
            .with("title", self.title.clone())
            .with("introduction", self.introduction.clone())
            .with("content", self.content.clone())
            .with("created", self.created.clone())
            .with("updated", self.updated.clone())
    }
}

/// An album as listed on the photos page.
#[derive(Debug, Clone)]
pub struct AlbumEntry {
    pub douban_id: i64,
    pub title: Option<String>,
    pub description: Option<String>,
    pub cover: Option<String>,
    pub total: Option<i64>,
    pub last_updated: Option<String>,
}

impl AlbumEntry {
    pub fn fields(&self, user_id: Option<i64>) -> Fields {
        Fields::new()
            .with("douban_id", self.douban_id)
            .with("user_id", user_id)
            .with("title", self.title.clone())
            .with("description", self.description.clone())
            .with("cover", self.cover.clone())
            .with("total", self.total)
            .with("last_updated", self.last_updated.clone())
    }
}

/// One picture inside an album.
#[derive(Debug, Clone)]
pub struct PictureRecord {
    pub src: String,
    pub description: Option<String>,
}

impl PictureRecord {
    pub fn fields(&self, album_id: i64) -> Fields {
        Fields::new()
            .with("album_id", album_id)
            .with("src", self.src.clone())
            .with("description", self.description.clone())
    }
}

/// A like, keyed by the site's numeric target-type code.
#[derive(Debug, Clone)]
pub struct LikeRecord {
    pub target_type: String,
    pub target_douban_id: i64,
    pub title: Option<String>,
    /// JSON-encoded tag list.
    pub tags: Option<String>,
}

impl LikeRecord {
    pub fn fields(&self, user_id: i64) -> Fields {
        Fields::new()
            .with("user_id", user_id)
            .with("target_type", self.target_type.clone())
            .with("target_douban_id", self.target_douban_id)
            .with("title", self.title.clone())
            .with("tags", self.tags.clone())
    }
}

/// A decoded listing page plus the relative URL of the next page, if the
/// paginator advertises one.
#[derive(Debug, Clone)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub next: Option<String>,
}

impl<T> Default for Paged<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            next: None,
        }
    }
}
