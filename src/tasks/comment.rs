//! Broadcast comment backup.
//!
//! Scans the owner's timeline for broadcasts created within the active
//! window and walks each one's comment pagination.

use chrono::{Duration, Utc};

use gy_core::Result;
use gy_db::queries::broadcasts;
use gy_db::tables;
use gy_db::{atomic, upsert};

use crate::parser::html;
use crate::tasks::TaskContext;

/// Comment target-type code for statuses.
const TARGET_TYPE_STATUS: &str = "status";

pub async fn run(ctx: &mut TaskContext) -> Result<()> {
    let owner = ctx.sync_account().await?;
    let owner_name = owner.unique_name.clone();

    let cutoff = (Utc::now() - Duration::seconds(ctx.settings.broadcast_active_duration))
        .format("%Y-%m-%d %H:%M:%S")
        .to_string();

    let active = {
        let conn = ctx.conn()?;
        broadcasts::active_on_timeline(&conn, owner.id, &cutoff)?
    };
    tracing::debug!(count = active.len(), "broadcasts in the active window");

    for broadcast in active {
        let mut url = format!(
            "people/{owner_name}/status/{}/?full=1",
            broadcast.douban_id
        );
        loop {
            let Some(page) = ctx.fetcher.get(&url).await? else {
                break;
            };
            let parsed = html::parse_status_comments(&page.body);
            if parsed.items.is_empty() {
                break;
            }

            let conn = ctx.conn()?;
            atomic(&conn, |tx| {
                for comment in &parsed.items {
                    upsert::apply(
                        tx,
                        &tables::COMMENT,
                        &comment.fields(TARGET_TYPE_STATUS, broadcast.douban_id),
                    )?;
                }
                Ok(())
            })?;

            match crate::tasks::next_url(&page, parsed.next.as_deref()) {
                Some(next) => url = next,
                None => break,
            }
        }
    }

    Ok(())
}
