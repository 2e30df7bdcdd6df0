//! Likes backup.
//!
//! Pages through the likes list and reconciles the favorite set per
//! target type.

use rusqlite::types::Value;

use gy_core::Result;
use gy_db::tables;
use gy_db::{atomic, upsert};

use crate::parser::html;
use crate::tasks::{snapshot_started, TaskContext};

/// Target-type codes the archive surfaces: notes and photo albums.
const FAVORITE_TYPES: [&str; 2] = ["1015", "1026"];

pub async fn run(ctx: &mut TaskContext) -> Result<()> {
    let owner = ctx.sync_account().await?;
    let owner_name = owner.unique_name.clone();
    let started = snapshot_started();

    let mut url = format!("people/{owner_name}/likes");
    loop {
        let Some(page) = ctx.fetcher.get(&url).await? else {
            break;
        };
        let parsed = html::parse_likes(&page.body);
        if parsed.items.is_empty() {
            break;
        }

        let conn = ctx.conn()?;
        atomic(&conn, |tx| {
            for like in &parsed.items {
                upsert::apply(tx, &tables::FAVORITE, &like.fields(owner.id))?;
            }
            Ok(())
        })?;

        match crate::tasks::next_url(&page, parsed.next.as_deref()) {
            Some(next) => url = next,
            None => break,
        }
    }

    for target_type in FAVORITE_TYPES {
        let archived = ctx.reconcile_set(
            &tables::FAVORITE,
            &[
                ("user_id", Value::Integer(owner.id)),
                ("target_type", Value::Text(target_type.to_string())),
            ],
            &started,
        )?;
        if archived > 0 {
            tracing::info!(target_type, archived, "likes disappeared from snapshot");
        }
    }

    ctx.realize_attachments().await
}
