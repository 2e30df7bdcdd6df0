//! Note backup.
//!
//! Pages through the notes listing; each entry is fetched in full unless
//! the local copy is still fresh. Images referenced from note content are
//! enqueued as attachments.

use gy_core::Result;
use gy_db::queries::{attachments, notes};
use gy_db::tables;
use gy_db::{atomic, upsert};

use crate::parser::html;
use crate::tasks::TaskContext;

pub async fn run(ctx: &mut TaskContext) -> Result<()> {
    let owner = ctx.sync_account().await?;
    let owner_name = owner.unique_name.clone();

    let mut url = format!("people/{owner_name}/notes");
    loop {
        let Some(page) = ctx.fetcher.get(&url).await? else {
            break;
        };
        let parsed = html::parse_notes(&page.body);
        if parsed.items.is_empty() {
            break;
        }

        for entry in &parsed.items {
            let fresh = {
                let conn = ctx.conn()?;
                notes::get_by_douban_id(&conn, entry.douban_id)?
                    .map(|note| ctx.is_fresh(&note.updated_at))
                    .unwrap_or(false)
            };
            if fresh {
                continue;
            }

            let note_url = entry
                .url
                .clone()
                .unwrap_or_else(|| format!("note/{}/", entry.douban_id));
            let Some(note_page) = ctx.fetcher.get(&note_url).await? else {
                continue;
            };
            let Some(record) = html::parse_note(&note_page.body, note_page.url.as_str()) else {
                tracing::warn!(douban_id = entry.douban_id, "unparseable note page; skipped");
                continue;
            };

            let conn = ctx.conn()?;
            atomic(&conn, |tx| {
                upsert::apply(tx, &tables::NOTE, &record.fields(Some(owner.id)))?;
                for image in &record.images {
                    attachments::enqueue(tx, image)?;
                }
                Ok(())
            })?;
        }

        match crate::tasks::next_url(&page, parsed.next.as_deref()) {
            Some(next) => url = next,
            None => break,
        }
    }

    ctx.realize_attachments().await
}
