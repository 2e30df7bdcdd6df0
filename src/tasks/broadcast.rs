//! Broadcast (statuses stream) backup.
//!
//! Pages through the owner's chronological feed. Reshared inner statuses
//! are persisted before their outer record so the back-reference
//! resolves. Attachments discovered in saying-type statuses are enqueued;
//! when the image cache is on they are materialized at the end.
//!
//! Incremental mode exploits the feed being chronological with a
//! contiguous previously-backed-up tail: a run of upserts that keep
//! hitting existing broadcasts owned by the current user means the tail
//! has been reached, and the task stops.

use std::collections::HashMap;

use gy_core::Result;
use gy_db::queries::attachments;
use gy_db::tables;
use gy_db::{atomic, upsert, Fields};

use crate::parser::html;
use crate::parser::BroadcastRecord;
use crate::tasks::TaskContext;

/// Consecutive already-stored own broadcasts needed to stop.
const CONFLICT_WINDOW: u32 = 10;

pub async fn run(ctx: &mut TaskContext) -> Result<()> {
    let owner = ctx.sync_account().await?;
    let owner_name = owner.unique_name.clone();
    let incremental = ctx.settings.broadcast_incremental_backup;

    let mut conflict_count = 0u32;
    let mut page_no = 1u32;

    'pages: loop {
        let url = format!("people/{owner_name}/statuses?p={page_no}");
        let Some(page) = ctx.fetcher.get(&url).await? else {
            break;
        };
        let records = html::parse_statuses(&page.body);
        if records.is_empty() {
            break;
        }

        // Resolve authors (TTL-gated) before the page transaction.
        let mut authors: HashMap<String, i64> = HashMap::new();
        authors.insert(owner_name.clone(), owner.id);
        for record in &records {
            for name in record_author_names(record) {
                if !authors.contains_key(&name) {
                    if let Some(user) = ctx.fetch_user(&name).await? {
                        authors.insert(name, user.id);
                    }
                }
            }
        }

        let conn = ctx.conn()?;
        let outcomes = atomic(&conn, |tx| {
            let mut outcomes = Vec::with_capacity(records.len());
            for record in &records {
                // Inner reshared status first, so the outer row's
                // back-reference points at stored data.
                if let Some(inner) = &record.reshared {
                    let inner_author = inner
                        .author_name
                        .as_ref()
                        .and_then(|name| authors.get(name))
                        .copied();
                    upsert::apply(tx, &tables::BROADCAST, &inner.fields(inner_author))?;
                    for image in &inner.images {
                        attachments::enqueue(tx, image)?;
                    }
                }

                let author_id = record
                    .author_name
                    .as_ref()
                    .and_then(|name| authors.get(name))
                    .copied();
                let applied = upsert::apply(tx, &tables::BROADCAST, &record.fields(author_id))?;
                for image in &record.images {
                    attachments::enqueue(tx, image)?;
                }

                upsert::apply(
                    tx,
                    &tables::TIMELINE,
                    &Fields::new()
                        .with("user_id", owner.id)
                        .with("broadcast_id", applied.id()),
                )?;

                let existing_own = !applied.is_created() && author_id == Some(owner.id);
                outcomes.push(existing_own);
            }
            Ok(outcomes)
        })?;

        if incremental {
            for existing_own in outcomes {
                if existing_own {
                    conflict_count += 1;
                } else {
                    conflict_count = 0;
                }
                if conflict_count >= CONFLICT_WINDOW {
                    tracing::info!(
                        page = page_no,
                        "conflict window reached; incremental backup stops"
                    );
                    break 'pages;
                }
            }
        }

        page_no += 1;
    }

    ctx.realize_attachments().await
}

fn record_author_names(record: &BroadcastRecord) -> Vec<String> {
    let mut names = Vec::new();
    if let Some(name) = &record.author_name {
        names.push(name.clone());
    }
    if let Some(inner) = &record.reshared {
        if let Some(name) = &inner.author_name {
            names.push(name.clone());
        }
    }
    names
}
