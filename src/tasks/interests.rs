//! Book / movie / music interests backup.
//!
//! The mobile interests API wants a `frodotk` token cookie, acquired by
//! hitting the mobile site once and merged into the session. Each status
//! (`mark`, `doing`, `done`) is paged through separately; the interest
//! set is reconciled over the union of the three statuses.

use rusqlite::types::Value;

use gy_core::Result;
use gy_db::{atomic, upsert};

use crate::parser::{json, SubjectKind};
use crate::tasks::{snapshot_started, TaskContext};

/// API page size.
const PAGE_COUNT: i64 = 50;

const STATUSES: [&str; 3] = ["mark", "doing", "done"];

/// Mobile token cookie required by the interests API.
const TOKEN_COOKIE: &str = "frodotk";

pub async fn run(ctx: &mut TaskContext, kind: SubjectKind) -> Result<()> {
    let owner = ctx.sync_account().await?;
    let owner_name = owner.unique_name.clone();

    if !ctx.fetcher.has_cookie(TOKEN_COOKIE) {
        if let Some(token) = ctx
            .fetcher
            .acquire_mobile_cookie("mine/", TOKEN_COOKIE)
            .await?
        {
            ctx.fetcher.merge_cookie(TOKEN_COOKIE, &token);
        }
    }

    let started = snapshot_started();

    for status in STATUSES {
        let mut start = 0i64;
        loop {
            let url = format!(
                "rexxar/api/v2/user/{owner_name}/interests?type={}&status={status}&start={start}&count={PAGE_COUNT}",
                kind.api_name()
            );
            let Some(page) = ctx.fetcher.get_mobile(&url).await? else {
                break;
            };
            let Some(parsed) = json::parse_interests(&page.body) else {
                tracing::warn!(status, start, "unparseable interests payload");
                break;
            };
            if parsed.interests.is_empty() {
                break;
            }

            for interest in &parsed.interests {
                // Prefer the embedded subject; fall back to a per-id fetch.
                let subject_row = match &interest.subject {
                    Some(record) => Some(ctx.store_subject(kind, record)?),
                    None => ctx.fetch_subject(kind, interest.subject_id).await?,
                };
                let Some(subject_row) = subject_row else {
                    tracing::warn!(subject_id = interest.subject_id, "subject unresolvable; skipped");
                    continue;
                };

                let conn = ctx.conn()?;
                let fields = interest.fields(owner.id, kind.link_column(), subject_row);
                atomic(&conn, |tx| upsert::apply(tx, kind.my_spec(), &fields))?;
            }

            start += PAGE_COUNT;
            if start >= parsed.total {
                break;
            }
        }
    }

    let archived = ctx.reconcile_set(
        kind.my_spec(),
        &[("user_id", Value::Integer(owner.id))],
        &started,
    )?;
    if archived > 0 {
        tracing::info!(
            table = kind.my_spec().table,
            archived,
            "interests disappeared from snapshot"
        );
    }

    Ok(())
}
