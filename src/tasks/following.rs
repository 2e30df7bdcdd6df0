//! Following / followers / block-list backup.
//!
//! Walks the three contact lists page by page, fetches every referenced
//! user (TTL-gated, which also refreshes the counter sidecar), then
//! reconciles each set against the fresh snapshot.

use rusqlite::types::Value;

use gy_core::Result;
use gy_db::tables::{self, TableSpec};
use gy_db::{atomic, upsert, Fields};

use crate::parser::html;
use crate::tasks::{snapshot_started, TaskContext};

struct ContactList {
    first_page: &'static str,
    spec: &'static TableSpec,
}

const LISTS: [ContactList; 3] = [
    ContactList {
        first_page: "contacts/list",
        spec: &tables::FOLLOWING,
    },
    ContactList {
        first_page: "contacts/rlist",
        spec: &tables::FOLLOWER,
    },
    ContactList {
        first_page: "contacts/blacklist",
        spec: &tables::BLOCK_USER,
    },
];

pub async fn run(ctx: &mut TaskContext) -> Result<()> {
    let owner = ctx.sync_account().await?;
    let started = snapshot_started();

    for list in LISTS {
        let mut url = list.first_page.to_string();
        loop {
            let Some(page) = ctx.fetcher.get(&url).await? else {
                break;
            };
            let parsed = html::parse_user_list(&page.body);
            if parsed.items.is_empty() {
                break;
            }

            // Resolve users first; their writes commit independently.
            let mut resolved = Vec::with_capacity(parsed.items.len());
            for entry in &parsed.items {
                let user = ctx.fetch_user(&entry.unique_name).await?;
                resolved.push((entry.unique_name.clone(), user.map(|u| u.id)));
            }

            let conn = ctx.conn()?;
            atomic(&conn, |tx| {
                for (name, target_user_id) in &resolved {
                    let fields = Fields::new()
                        .with("user_id", owner.id)
                        .with("name", name.clone())
                        .with("target_user_id", *target_user_id);
                    upsert::apply(tx, list.spec, &fields)?;
                }
                Ok(())
            })?;

            match crate::tasks::next_url(&page, parsed.next.as_deref()) {
                Some(next) => url = next,
                None => break,
            }
        }
    }

    for list in LISTS {
        let archived = ctx.reconcile_set(
            list.spec,
            &[("user_id", Value::Integer(owner.id))],
            &started,
        )?;
        if archived > 0 {
            tracing::info!(
                table = list.spec.table,
                archived,
                "relations disappeared from snapshot"
            );
        }
    }

    Ok(())
}
