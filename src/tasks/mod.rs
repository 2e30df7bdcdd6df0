//! The task runtime: task identity, settings injection, session setup,
//! and the fetch-or-reuse helpers shared by all backup jobs.
//!
//! A [`Task`] is one backup job bound to one account; the scheduler
//! deduplicates tasks via [`Task::equals`] (same kind + same account).
//! A [`TaskContext`] bundles the fetcher, the store handle, the settings
//! snapshot, and the cache directory for one invocation.

mod album;
mod attachment;
mod broadcast;
mod comment;
mod following;
mod interests;
mod like;
mod note;

pub use attachment::cache_path;

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

use gy_core::{Error, Result, WorkerSettings};
use gy_db::models::{Account, User};
use gy_db::queries::{accounts, subjects, users};
use gy_db::tables::{self, TableSpec};
use gy_db::{atomic, get_conn, now_ts, parse_ts, upsert, DbPool, PooledConnection};

use crate::fetcher::Fetcher;
use crate::parser::{self, json, SubjectKind};

// ---------------------------------------------------------------------------
// Task identity
// ---------------------------------------------------------------------------

/// The concrete backup jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    FollowingFollower,
    Book,
    Movie,
    Music,
    Broadcast,
    BroadcastComment,
    Note,
    PhotoAlbum,
    Like,
}

impl TaskKind {
    pub const ALL: [TaskKind; 9] = [
        TaskKind::FollowingFollower,
        TaskKind::Book,
        TaskKind::Movie,
        TaskKind::Music,
        TaskKind::Broadcast,
        TaskKind::BroadcastComment,
        TaskKind::Note,
        TaskKind::PhotoAlbum,
        TaskKind::Like,
    ];

    /// Stable name used by the HTTP surface.
    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::FollowingFollower => "following_follower",
            TaskKind::Book => "book",
            TaskKind::Movie => "movie",
            TaskKind::Music => "music",
            TaskKind::Broadcast => "broadcast",
            TaskKind::BroadcastComment => "broadcast_comment",
            TaskKind::Note => "note",
            TaskKind::PhotoAlbum => "photo_album",
            TaskKind::Like => "like",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.name() == name)
    }

    fn seq(&self) -> u64 {
        static SEQS: [AtomicU64; 9] = [
            AtomicU64::new(0),
            AtomicU64::new(0),
            AtomicU64::new(0),
            AtomicU64::new(0),
            AtomicU64::new(0),
            AtomicU64::new(0),
            AtomicU64::new(0),
            AtomicU64::new(0),
            AtomicU64::new(0),
        ];
        let index = Self::ALL
            .iter()
            .position(|kind| kind == self)
            .unwrap_or(0);
        SEQS[index].fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// One backup job bound to one account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub kind: TaskKind,
    pub account_id: i64,
    /// Display name, `"{kind}#{seq}"`.
    pub name: String,
}

impl Task {
    pub fn new(kind: TaskKind, account_id: i64) -> Self {
        let name = format!("{}#{}", kind.name(), kind.seq());
        Self {
            kind,
            account_id,
            name,
        }
    }

    /// Two tasks are the same job iff they share kind and account.
    pub fn equals(&self, other: &Task) -> bool {
        self.kind == other.kind && self.account_id == other.account_id
    }

    /// Run the job to completion within `ctx`.
    pub async fn run(&self, ctx: &mut TaskContext) -> Result<()> {
        tracing::info!(task = %self.name, account = ctx.account.id, "task started");
        match self.kind {
            TaskKind::FollowingFollower => following::run(ctx).await,
            TaskKind::Book => interests::run(ctx, SubjectKind::Book).await,
            TaskKind::Movie => interests::run(ctx, SubjectKind::Movie).await,
            TaskKind::Music => interests::run(ctx, SubjectKind::Music).await,
            TaskKind::Broadcast => broadcast::run(ctx).await,
            TaskKind::BroadcastComment => comment::run(ctx).await,
            TaskKind::Note => note::run(ctx).await,
            TaskKind::PhotoAlbum => album::run(ctx).await,
            TaskKind::Like => like::run(ctx).await,
        }
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

// ---------------------------------------------------------------------------
// TaskContext
// ---------------------------------------------------------------------------

/// Everything one task invocation needs.
pub struct TaskContext {
    pub pool: DbPool,
    pub fetcher: Fetcher,
    pub settings: WorkerSettings,
    pub cache_dir: PathBuf,
    pub account: Account,
}

impl TaskContext {
    pub fn new(
        pool: DbPool,
        fetcher: Fetcher,
        settings: WorkerSettings,
        cache_dir: PathBuf,
        account: Account,
    ) -> Self {
        Self {
            pool,
            fetcher,
            settings,
            cache_dir,
            account,
        }
    }

    pub fn conn(&self) -> Result<PooledConnection> {
        get_conn(&self.pool)
    }

    /// Whether a stored row is still within the local-object freshness
    /// window.
    pub fn is_fresh(&self, updated_at: &str) -> bool {
        let Some(updated) = parse_ts(updated_at) else {
            return false;
        };
        let age = chrono::Utc::now().signed_duration_since(updated);
        age.num_milliseconds() <= self.settings.local_object_duration * 1000
    }

    /// Fetch a user by unique name, store-first with TTL. Falls back to
    /// the stale local copy when the remote fetch yields nothing.
    pub async fn fetch_user(&self, unique_name: &str) -> Result<Option<User>> {
        let cached = {
            let conn = self.conn()?;
            users::get_by_unique_name(&conn, unique_name)?
        };
        if let Some(user) = &cached {
            if self.is_fresh(&user.updated_at) {
                return Ok(cached);
            }
        }

        let url = format!("rexxar/api/v2/user/{unique_name}");
        let Some(page) = self.fetcher.get_mobile(&url).await? else {
            return Ok(cached);
        };
        let Some(record) = json::parse_user(&page.body) else {
            tracing::warn!(unique_name, "unparseable user payload");
            return Ok(cached);
        };

        let conn = self.conn()?;
        let douban_id = record.douban_id;
        atomic(&conn, |tx| {
            let applied = upsert::apply(tx, &tables::USER, &record.fields())?;
            if let Some(extra) = record.extra_fields(applied.id()) {
                upsert::apply(tx, &tables::USER_EXTRA, &extra)?;
            }
            Ok(())
        })?;
        users::get_by_douban_id(&conn, douban_id)
    }

    /// Fetch a subject by external id, store-first with TTL. Returns the
    /// subject's row id, or `None` when neither the store nor the remote
    /// side can produce it.
    pub async fn fetch_subject(
        &self,
        kind: SubjectKind,
        douban_id: i64,
    ) -> Result<Option<i64>> {
        let cached = {
            let conn = self.conn()?;
            subjects::get_by_douban_id(&conn, kind.spec(), douban_id)?
        };
        if let Some(subject) = &cached {
            if self.is_fresh(&subject.updated_at) {
                return Ok(Some(subject.id));
            }
        }

        let url = format!("rexxar/api/v2/{}/{}", kind.api_name(), douban_id);
        let Some(page) = self.fetcher.get_mobile(&url).await? else {
            return Ok(cached.map(|subject| subject.id));
        };
        let Some(record) = json::parse_subject(&page.body) else {
            return Ok(cached.map(|subject| subject.id));
        };

        let conn = self.conn()?;
        let applied = atomic(&conn, |tx| upsert::apply(tx, kind.spec(), &record.fields()))?;
        Ok(Some(applied.id()))
    }

    /// Store an already-parsed subject, bypassing the network.
    pub fn store_subject(
        &self,
        kind: SubjectKind,
        record: &parser::SubjectRecord,
    ) -> Result<i64> {
        let conn = self.conn()?;
        let applied = atomic(&conn, |tx| upsert::apply(tx, kind.spec(), &record.fields()))?;
        Ok(applied.id())
    }

    /// Ensure the account's owning user is fetched and bound, and return
    /// it. Every task starts here.
    pub async fn sync_account(&mut self) -> Result<User> {
        if let Some(user_id) = self.account.user_id {
            let conn = self.conn()?;
            if let Some(user) = users::get_user(&conn, user_id)? {
                return Ok(user);
            }
        }

        let name = self.account.name.clone();
        let user = self
            .fetch_user(&name)
            .await?
            .ok_or_else(|| Error::internal(format!("cannot resolve owner user {name}")))?;

        let conn = self.conn()?;
        accounts::bind_user(&conn, self.account.id, user.id)?;
        self.account.user_id = Some(user.id);
        Ok(user)
    }

    /// Snapshot-reconcile one set table in a single transaction.
    pub fn reconcile_set(
        &self,
        spec: &TableSpec,
        scope: &[(&'static str, Value)],
        started_at: &str,
    ) -> Result<usize> {
        let conn = self.conn()?;
        atomic(&conn, |tx| upsert::reconcile(tx, spec, scope, started_at))
    }

    /// Realize queued attachments until none are left, when the image
    /// cache is enabled.
    pub async fn realize_attachments(&self) -> Result<()> {
        if !self.settings.image_local_cache {
            return Ok(());
        }
        while attachment::fetch_attachment(self).await? {}
        Ok(())
    }
}

/// Timestamp taken at the start of a snapshot pass; rows untouched since
/// then are the ones that disappeared.
pub fn snapshot_started() -> String {
    now_ts()
}

/// Resolve a paginator `next` href against the page it came from.
pub(crate) fn next_url(page: &crate::fetcher::Page, next: Option<&str>) -> Option<String> {
    next.and_then(|href| page.url.join(href).ok())
        .map(|url| url.to_string())
}
