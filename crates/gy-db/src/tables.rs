//! Table specifications driving the parametric upsert protocol.
//!
//! A [`TableSpec`] declares what the upsert machinery needs to know about
//! an entity: its insertable columns, the subset that defines semantic
//! equality (the compared attributes), the natural-key columns used to
//! locate the current row on conflict, and the historical table archived
//! rows are cloned into.

/// Static description of one archived entity.
#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    /// Current table name.
    pub table: &'static str,
    /// Append-only archive table, if the entity keeps history.
    pub historical: Option<&'static str>,
    /// Column in the historical table pointing back at the current row.
    pub origin_column: &'static str,
    /// Insertable data columns (excluding `id`, `version`, `updated_at`).
    pub columns: &'static [&'static str],
    /// Columns that define semantic equality for the version bump.
    pub compared: &'static [&'static str],
    /// Columns forming the unique natural key.
    pub natural_key: &'static [&'static str],
    /// Whether the table carries a monotonically increasing `version`.
    pub versioned: bool,
}

pub static USER: TableSpec = TableSpec {
    table: "user",
    historical: Some("user_historical"),
    origin_column: "user_id",
    columns: &[
        "douban_id",
        "unique_name",
        "name",
        "created",
        "loc_name",
        "signature",
        "description",
        "avatar",
        "large_avatar",
        "alt",
        "kind",
    ],
    compared: &[
        "name",
        "unique_name",
        "created",
        "loc_name",
        "signature",
        "description",
        "avatar",
        "large_avatar",
        "alt",
        "kind",
    ],
    natural_key: &["douban_id"],
    versioned: true,
};

pub static USER_EXTRA: TableSpec = TableSpec {
    table: "user_extra",
    historical: None,
    origin_column: "user_extra_id",
    columns: &["user_id", "following_count", "follower_count", "statuses_count"],
    compared: &["following_count", "follower_count", "statuses_count"],
    natural_key: &["user_id"],
    versioned: false,
};

pub static BOOK: TableSpec = TableSpec {
    table: "book",
    historical: Some("book_historical"),
    origin_column: "book_id",
    columns: &[
        "douban_id",
        "title",
        "subtitle",
        "alt_title",
        "author",
        "translator",
        "publisher",
        "origin_title",
        "pubdate",
        "isbn10",
        "isbn13",
        "price",
        "pages",
        "binding",
        "rating",
        "image",
        "summary",
        "alt",
    ],
    compared: &[
        "title",
        "subtitle",
        "alt_title",
        "author",
        "translator",
        "publisher",
        "origin_title",
        "pubdate",
        "isbn10",
        "isbn13",
        "price",
        "pages",
        "binding",
        "rating",
        "image",
        "summary",
        "alt",
    ],
    natural_key: &["douban_id"],
    versioned: true,
};

pub static MOVIE: TableSpec = TableSpec {
    table: "movie",
    historical: Some("movie_historical"),
    origin_column: "movie_id",
    columns: &[
        "douban_id",
        "title",
        "alt_title",
        "rating",
        "image",
        "summary",
        "attrs",
        "alt",
        "tags",
    ],
    compared: &[
        "title",
        "alt_title",
        "rating",
        "image",
        "summary",
        "attrs",
        "alt",
        "tags",
    ],
    natural_key: &["douban_id"],
    versioned: true,
};

pub static MUSIC: TableSpec = TableSpec {
    table: "music",
    historical: Some("music_historical"),
    origin_column: "music_id",
    columns: &[
        "douban_id",
        "title",
        "alt_title",
        "author",
        "rating",
        "image",
        "summary",
        "attrs",
        "alt",
        "tags",
    ],
    compared: &[
        "rating",
        "author",
        "alt_title",
        "image",
        "title",
        "summary",
        "attrs",
        "alt",
        "tags",
    ],
    natural_key: &["douban_id"],
    versioned: true,
};

pub static MY_BOOK: TableSpec = TableSpec {
    table: "my_book",
    historical: Some("my_book_historical"),
    origin_column: "my_book_id",
    columns: &[
        "user_id",
        "book_id",
        "rating",
        "tags",
        "comment",
        "create_time",
        "status",
    ],
    compared: &["rating", "tags", "comment", "create_time", "status"],
    natural_key: &["user_id", "book_id"],
    versioned: true,
};

pub static MY_MOVIE: TableSpec = TableSpec {
    table: "my_movie",
    historical: Some("my_movie_historical"),
    origin_column: "my_movie_id",
    columns: &[
        "user_id",
        "movie_id",
        "rating",
        "tags",
        "comment",
        "create_time",
        "status",
    ],
    compared: &["rating", "tags", "comment", "create_time", "status"],
    natural_key: &["user_id", "movie_id"],
    versioned: true,
};

pub static MY_MUSIC: TableSpec = TableSpec {
    table: "my_music",
    historical: Some("my_music_historical"),
    origin_column: "my_music_id",
    columns: &[
        "user_id",
        "music_id",
        "rating",
        "tags",
        "comment",
        "create_time",
        "status",
    ],
    compared: &["rating", "tags", "comment", "create_time", "status"],
    natural_key: &["user_id", "music_id"],
    versioned: true,
};

pub static NOTE: TableSpec = TableSpec {
    table: "note",
    historical: Some("note_historical"),
    origin_column: "note_id",
    columns: &[
        "douban_id",
        "user_id",
        "title",
        "introduction",
        "content",
        "created",
        "updated",
    ],
    compared: &["title", "introduction", "content", "updated"],
    natural_key: &["douban_id"],
    versioned: true,
};

pub static PHOTO_ALBUM: TableSpec = TableSpec {
    table: "photo_album",
    historical: Some("photo_album_historical"),
    origin_column: "photo_album_id",
    columns: &[
        "douban_id",
        "user_id",
        "title",
        "description",
        "cover",
        "total",
        "last_updated",
    ],
    compared: &["title", "description", "cover", "total", "last_updated"],
    natural_key: &["douban_id"],
    versioned: true,
};

pub static PHOTO_PICTURE: TableSpec = TableSpec {
    table: "photo_picture",
    historical: None,
    origin_column: "photo_picture_id",
    columns: &["album_id", "src", "description"],
    compared: &["description"],
    natural_key: &["album_id", "src"],
    versioned: false,
};

pub static BROADCAST: TableSpec = TableSpec {
    table: "broadcast",
    historical: Some("broadcast_historical"),
    origin_column: "broadcast_id",
    columns: &[
        "douban_id",
        "user_id",
        "created",
        "content",
        "blockquote",
        "status_url",
        "kind",
        "is_noreply",
        "reshared_id",
        "images",
        "reshared_count",
        "like_count",
        "comments_count",
    ],
    compared: &[
        "content",
        "blockquote",
        "reshared_count",
        "like_count",
        "comments_count",
    ],
    natural_key: &["douban_id"],
    versioned: true,
};

pub static TIMELINE: TableSpec = TableSpec {
    table: "timeline",
    historical: None,
    origin_column: "timeline_id",
    columns: &["user_id", "broadcast_id"],
    compared: &[],
    natural_key: &["user_id", "broadcast_id"],
    versioned: false,
};

pub static COMMENT: TableSpec = TableSpec {
    table: "comment",
    historical: None,
    origin_column: "comment_id",
    columns: &[
        "target_type",
        "target_douban_id",
        "douban_id",
        "author_name",
        "author_url",
        "content",
        "like_count",
        "created",
    ],
    compared: &["content", "like_count"],
    natural_key: &["target_type", "target_douban_id", "douban_id"],
    versioned: false,
};

pub static FOLLOWING: TableSpec = TableSpec {
    table: "following",
    historical: Some("following_historical"),
    origin_column: "following_id",
    columns: &["user_id", "name", "target_user_id"],
    compared: &["target_user_id"],
    natural_key: &["user_id", "name"],
    versioned: true,
};

pub static FOLLOWER: TableSpec = TableSpec {
    table: "follower",
    historical: Some("follower_historical"),
    origin_column: "follower_id",
    columns: &["user_id", "name", "target_user_id"],
    compared: &["target_user_id"],
    natural_key: &["user_id", "name"],
    versioned: true,
};

pub static BLOCK_USER: TableSpec = TableSpec {
    table: "block_user",
    historical: Some("block_user_historical"),
    origin_column: "block_user_id",
    columns: &["user_id", "name", "target_user_id"],
    compared: &["target_user_id"],
    natural_key: &["user_id", "name"],
    versioned: true,
};

pub static FAVORITE: TableSpec = TableSpec {
    table: "favorite",
    historical: Some("favorite_historical"),
    origin_column: "favorite_id",
    columns: &["user_id", "target_type", "target_douban_id", "title", "tags"],
    compared: &["tags"],
    natural_key: &["user_id", "target_type", "target_douban_id"],
    versioned: true,
};
