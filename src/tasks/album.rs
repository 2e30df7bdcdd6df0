//! Photo album backup.
//!
//! Pages through the albums listing. An album's pictures are re-fetched
//! when the album is new, the site-reported `last_updated` moved, or the
//! local copy fell out of the freshness window.

use gy_core::Result;
use gy_db::queries::{albums, attachments};
use gy_db::tables;
use gy_db::{atomic, upsert};

use crate::parser::html;
use crate::parser::AlbumEntry;
use crate::tasks::TaskContext;

pub async fn run(ctx: &mut TaskContext) -> Result<()> {
    let owner = ctx.sync_account().await?;
    let owner_name = owner.unique_name.clone();

    let mut url = format!("people/{owner_name}/photos");
    loop {
        let Some(page) = ctx.fetcher.get(&url).await? else {
            break;
        };
        let parsed = html::parse_albums(&page.body);
        if parsed.items.is_empty() {
            break;
        }

        for entry in &parsed.items {
            let needs_pictures = {
                let conn = ctx.conn()?;
                match albums::get_by_douban_id(&conn, entry.douban_id)? {
                    None => true,
                    Some(stored) => {
                        stored.last_updated != entry.last_updated
                            || !ctx.is_fresh(&stored.updated_at)
                    }
                }
            };

            let album_id = {
                let conn = ctx.conn()?;
                atomic(&conn, |tx| {
                    upsert::apply(tx, &tables::PHOTO_ALBUM, &entry.fields(Some(owner.id)))
                })?
                .id()
            };

            if let Some(cover) = &entry.cover {
                let conn = ctx.conn()?;
                attachments::enqueue(&conn, cover)?;
            }

            if needs_pictures {
                fetch_album_pictures(ctx, entry, album_id).await?;
            }
        }

        match crate::tasks::next_url(&page, parsed.next.as_deref()) {
            Some(next) => url = next,
            None => break,
        }
    }

    ctx.realize_attachments().await
}

async fn fetch_album_pictures(
    ctx: &TaskContext,
    entry: &AlbumEntry,
    album_id: i64,
) -> Result<()> {
    let mut url = format!("photos/album/{}/", entry.douban_id);
    loop {
        let Some(page) = ctx.fetcher.get(&url).await? else {
            break;
        };
        let parsed = html::parse_album_photos(&page.body);
        if parsed.items.is_empty() {
            break;
        }

        let conn = ctx.conn()?;
        atomic(&conn, |tx| {
            for picture in &parsed.items {
                upsert::apply(tx, &tables::PHOTO_PICTURE, &picture.fields(album_id))?;
                attachments::enqueue(tx, &picture.src)?;
            }
            Ok(())
        })?;

        match crate::tasks::next_url(&page, parsed.next.as_deref()) {
            Some(next) => url = next,
            None => break,
        }
    }
    Ok(())
}
