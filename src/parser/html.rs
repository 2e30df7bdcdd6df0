//! CSS-selector decoders for pages without a JSON API.
//!
//! Covers the contact lists (following / followers / block list), the
//! statuses stream with its nested reshares, status comments, note
//! listings (standard and small-site layouts), note pages, photo albums,
//! and the likes list. Extraction is tolerant throughout: anything
//! missing becomes `None`, and entries without an identifying id are
//! dropped.

use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

use super::text::{douban_id_from_url, leading_count, username_from_url};
use super::{
    AlbumEntry, BroadcastKind, BroadcastRecord, CommentRecord, LikeRecord, NoteEntry, NoteRecord,
    Paged, PictureRecord, UserListEntry,
};

macro_rules! selector {
    ($name:ident, $css:expr) => {
        static $name: LazyLock<Selector> =
            LazyLock::new(|| Selector::parse($css).expect("valid selector"));
    };
}

selector!(NEXT_PAGE, ".paginator span.next a");

selector!(USER_ITEM, "ul.user-list > li");
selector!(USER_INFO_LINK, ".info a");
selector!(USER_AVATAR, ".avatar img");

selector!(STREAM_ITEM, "div.stream-items > div.status-item");
selector!(STATUS_AUTHOR, ".hd a.lnk-people");
selector!(STATUS_CREATED, ".hd span.created-at");
selector!(STATUS_TEXT, ".bd p.text");
selector!(STATUS_QUOTE, ".bd blockquote.quote");
selector!(STATUS_PICS, ".pics img");
selector!(STATUS_RESHARED, "div.status-real-wrapper > div.status-item");
selector!(STATUS_LINK, "a.status-link");
selector!(COUNT_RESHARE, ".actions span.reshare");
selector!(COUNT_LIKE, ".actions span.like");
selector!(COUNT_REPLY, ".actions span.reply");

selector!(COMMENT_ITEM, "div.comment-item");
selector!(COMMENT_AUTHOR, "a.comment-author");
selector!(COMMENT_TIME, "span.pubtime");
selector!(COMMENT_TEXT, "p.comment-text");
selector!(COMMENT_VOTE, "span.comment-vote");

selector!(NOTE_CONTAINER, "div.note-container");
selector!(NOTE_CONTAINER_LINK, "h3 a");
selector!(NOTE_SMALL_ITEM, "div.note-item");
selector!(NOTE_SMALL_LINK, "a.note-title");
selector!(NOTE_TITLE, "h1.note-title");
selector!(NOTE_DATE, "span.pub-date");
selector!(NOTE_CONTENT, "div.note-content");
selector!(NOTE_INTRO, "div.introduction");
selector!(IMG, "img");

selector!(ALBUM_ITEM, "div.album-item");
selector!(ALBUM_TITLE, ".info a.album-title");
selector!(ALBUM_COVER, "a.album-link img");
selector!(ALBUM_COUNT, ".info span.count");
selector!(ALBUM_UPDATED, ".info span.update-time");
selector!(ALBUM_DESC, ".info p.description");

selector!(PHOTO_ITEM, "div.photo-list div.photo-item");
selector!(PHOTO_DESC, "div.description");

selector!(FAV_ITEM, "div.fav-item");
selector!(FAV_TITLE, "a.fav-title");
selector!(FAV_TAGS, "span.tags");

fn element_text(parent: &ElementRef, selector: &Selector) -> Option<String> {
    parent.select(selector).next().map(|el| {
        el.text()
            .collect::<String>()
            .trim()
            .to_string()
    })
    .filter(|s| !s.is_empty())
}

fn element_attr(parent: &ElementRef, selector: &Selector, attr: &str) -> Option<String> {
    parent
        .select(selector)
        .next()
        .and_then(|el| el.value().attr(attr))
        .map(str::to_string)
}

fn next_page(document: &Html) -> Option<String> {
    document
        .select(&NEXT_PAGE)
        .next()
        .and_then(|el| el.value().attr("href"))
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// contact lists
// ---------------------------------------------------------------------------

/// Decode a following / followers / block-list page.
pub fn parse_user_list(body: &str) -> Paged<UserListEntry> {
    let document = Html::parse_document(body);
    let items = document
        .select(&USER_ITEM)
        .filter_map(|item| {
            let link = item.select(&USER_INFO_LINK).next()?;
            let unique_name = username_from_url(link.value().attr("href")?)?;
            let display_name = {
                let text = link.text().collect::<String>().trim().to_string();
                (!text.is_empty()).then_some(text)
            };
            Some(UserListEntry {
                unique_name,
                display_name,
                avatar: element_attr(&item, &USER_AVATAR, "src"),
            })
        })
        .collect();

    Paged {
        items,
        next: next_page(&document),
    }
}

// ---------------------------------------------------------------------------
// statuses
// ---------------------------------------------------------------------------

fn parse_status_item(item: &ElementRef) -> Option<BroadcastRecord> {
    // The external id is required; skip anything without one.
    let douban_id = item
        .value()
        .attr("data-sid")
        .and_then(|sid| sid.parse().ok())
        .or_else(|| {
            element_attr(item, &STATUS_LINK, "href")
                .as_deref()
                .and_then(douban_id_from_url)
        })?;

    let author_name = item
        .select(&STATUS_AUTHOR)
        .next()
        .and_then(|el| el.value().attr("href"))
        .and_then(username_from_url);

    let reshared = item
        .select(&STATUS_RESHARED)
        .next()
        .and_then(|inner| parse_status_item(&inner))
        .map(Box::new);

    let images: Vec<String> = item
        .select(&STATUS_PICS)
        .filter_map(|img| img.value().attr("src"))
        .map(str::to_string)
        .collect();

    let kind = if reshared.is_some() {
        BroadcastKind::Reshare
    } else if !images.is_empty() {
        BroadcastKind::Saying
    } else {
        BroadcastKind::Plain
    };

    Some(BroadcastRecord {
        douban_id,
        author_name,
        created: element_attr(item, &STATUS_CREATED, "title"),
        content: element_text(item, &STATUS_TEXT),
        blockquote: element_text(item, &STATUS_QUOTE),
        status_url: element_attr(item, &STATUS_LINK, "href"),
        kind,
        is_noreply: item.value().attr("data-noreply") == Some("1"),
        images,
        reshared,
        reshared_count: element_text(item, &COUNT_RESHARE)
            .as_deref()
            .and_then(leading_count),
        like_count: element_text(item, &COUNT_LIKE)
            .as_deref()
            .and_then(leading_count),
        comments_count: element_text(item, &COUNT_REPLY)
            .as_deref()
            .and_then(leading_count),
    })
}

/// Decode one page of a user's statuses stream. Reshared inner statuses
/// come back nested in their outer record.
pub fn parse_statuses(body: &str) -> Vec<BroadcastRecord> {
    let document = Html::parse_document(body);
    document
        .select(&STREAM_ITEM)
        .filter_map(|item| parse_status_item(&item))
        .collect()
}

// ---------------------------------------------------------------------------
// comments
// ---------------------------------------------------------------------------

/// Decode a page of comments under a status.
pub fn parse_status_comments(body: &str) -> Paged<CommentRecord> {
    let document = Html::parse_document(body);
    let items = document
        .select(&COMMENT_ITEM)
        .filter_map(|item| {
            let douban_id = item.value().attr("data-cid")?.parse().ok()?;
            let author = item.select(&COMMENT_AUTHOR).next();
            Some(CommentRecord {
                douban_id,
                author_name: author.map(|a| a.text().collect::<String>().trim().to_string()),
                author_url: author
                    .and_then(|a| a.value().attr("href"))
                    .map(str::to_string),
                content: element_text(&item, &COMMENT_TEXT),
                like_count: element_text(&item, &COMMENT_VOTE)
                    .as_deref()
                    .and_then(leading_count),
                created: element_text(&item, &COMMENT_TIME),
            })
        })
        .collect();

    Paged {
        items,
        next: next_page(&document),
    }
}

// ---------------------------------------------------------------------------
// notes
// ---------------------------------------------------------------------------

/// Decode a notes listing. The standard layout is tried first, then the
/// small-site layout.
pub fn parse_notes(body: &str) -> Paged<NoteEntry> {
    let document = Html::parse_document(body);

    let mut items: Vec<NoteEntry> = document
        .select(&NOTE_CONTAINER)
        .filter_map(|item| {
            let link = item.select(&NOTE_CONTAINER_LINK).next()?;
            note_entry_from_link(&link)
        })
        .collect();

    if items.is_empty() {
        items = document
            .select(&NOTE_SMALL_ITEM)
            .filter_map(|item| {
                let link = item.select(&NOTE_SMALL_LINK).next()?;
                note_entry_from_link(&link)
            })
            .collect();
    }

    Paged {
        items,
        next: next_page(&document),
    }
}

fn note_entry_from_link(link: &ElementRef) -> Option<NoteEntry> {
    let href = link.value().attr("href")?;
    let douban_id = douban_id_from_url(href)?;
    let title = {
        let text = link.text().collect::<String>().trim().to_string();
        (!text.is_empty()).then_some(text)
    };
    Some(NoteEntry {
        douban_id,
        title,
        url: Some(href.to_string()),
    })
}

/// Decode a full note page. Returns `None` when the note id cannot be
/// recovered from `url`.
pub fn parse_note(body: &str, url: &str) -> Option<NoteRecord> {
    let douban_id = douban_id_from_url(url)?;
    let document = Html::parse_document(body);
    let root = document.root_element();

    let content_el = document.select(&NOTE_CONTENT).next();
    let images = content_el
        .map(|content| {
            content
                .select(&IMG)
                .filter_map(|img| img.value().attr("src"))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Some(NoteRecord {
        douban_id,
        title: element_text(&root, &NOTE_TITLE),
        introduction: element_text(&root, &NOTE_INTRO),
        content: content_el.map(|el| el.inner_html().trim().to_string()),
        created: element_text(&root, &NOTE_DATE),
        updated: None,
        images,
    })
}

// ---------------------------------------------------------------------------
// photo albums
// ---------------------------------------------------------------------------

/// Decode the albums listing of a user's photos page.
pub fn parse_albums(body: &str) -> Paged<AlbumEntry> {
    let document = Html::parse_document(body);
    let items = document
        .select(&ALBUM_ITEM)
        .filter_map(|item| {
            let title_link = item.select(&ALBUM_TITLE).next()?;
            let douban_id = douban_id_from_url(title_link.value().attr("href")?)?;
            let title = {
                let text = title_link.text().collect::<String>().trim().to_string();
                (!text.is_empty()).then_some(text)
            };
            Some(AlbumEntry {
                douban_id,
                title,
                description: element_text(&item, &ALBUM_DESC),
                cover: element_attr(&item, &ALBUM_COVER, "src"),
                total: element_text(&item, &ALBUM_COUNT)
                    .as_deref()
                    .and_then(leading_count),
                last_updated: element_text(&item, &ALBUM_UPDATED),
            })
        })
        .collect();

    Paged {
        items,
        next: next_page(&document),
    }
}

/// Decode the pictures of one album page.
pub fn parse_album_photos(body: &str) -> Paged<PictureRecord> {
    let document = Html::parse_document(body);
    let items = document
        .select(&PHOTO_ITEM)
        .filter_map(|item| {
            let src = item.select(&IMG).next()?.value().attr("src")?.to_string();
            Some(PictureRecord {
                src,
                description: element_text(&item, &PHOTO_DESC),
            })
        })
        .collect();

    Paged {
        items,
        next: next_page(&document),
    }
}

// ---------------------------------------------------------------------------
// likes
// ---------------------------------------------------------------------------

/// Decode a page of the likes list. Each entry carries the site's
/// numeric target-type code.
pub fn parse_likes(body: &str) -> Paged<LikeRecord> {
    let document = Html::parse_document(body);
    let items = document
        .select(&FAV_ITEM)
        .filter_map(|item| {
            let target_douban_id = item.value().attr("data-tid")?.parse().ok()?;
            let target_type = item.value().attr("data-type")?.to_string();
            let tags = element_text(&item, &FAV_TAGS).and_then(|text| {
                let tags: Vec<&str> = text.split_whitespace().collect();
                serde_json::to_string(&tags).ok()
            });
            Some(LikeRecord {
                target_type,
                target_douban_id,
                title: element_text(&item, &FAV_TITLE),
                tags,
            })
        })
        .collect();

    Paged {
        items,
        next: next_page(&document),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_list_with_pagination() {
        let body = r#"
        <ul class="user-list">
          <li>
            <div class="avatar"><a href="https://www.douban.com/people/alice/"><img src="a.jpg"/></a></div>
            <div class="info"><a href="https://www.douban.com/people/alice/">Alice</a></div>
          </li>
          <li>
            <div class="info"><a href="https://www.douban.com/people/bob/">Bob</a></div>
          </li>
          <li><div class="info"><span>no link, skipped</span></div></li>
        </ul>
        <div class="paginator"><span class="next"><a href="?start=20">后页</a></span></div>
        "#;
        let page = parse_user_list(body);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].unique_name, "alice");
        assert_eq!(page.items[0].avatar.as_deref(), Some("a.jpg"));
        assert_eq!(page.items[1].display_name.as_deref(), Some("Bob"));
        assert_eq!(page.next.as_deref(), Some("?start=20"));
    }

    #[test]
    fn statuses_with_reshare_and_counts() {
        let body = r#"
        <div class="stream-items">
          <div class="status-item" data-sid="1001">
            <div class="hd">
              <a class="lnk-people" href="https://www.douban.com/people/alice/">Alice</a>
              <span class="created-at" title="2024-01-02 10:00:00"></span>
            </div>
            <div class="bd">
              <p class="text">look at this</p>
              <div class="status-real-wrapper">
                <div class="status-item" data-sid="900">
                  <div class="hd">
                    <a class="lnk-people" href="https://www.douban.com/people/bob/">Bob</a>
                  </div>
                  <div class="bd">
                    <p class="text">original saying</p>
                    <div class="pics"><img src="https://img9.douban.com/p1.jpg"/></div>
                  </div>
                </div>
              </div>
              <div class="actions">
                <span class="reshare">3转发</span>
                <span class="like">5赞</span>
                <span class="reply">2回应</span>
              </div>
              <a class="status-link" href="https://www.douban.com/people/alice/status/1001/"></a>
            </div>
          </div>
        </div>
        "#;
        let records = parse_statuses(body);
        assert_eq!(records.len(), 1);
        let outer = &records[0];
        assert_eq!(outer.douban_id, 1001);
        assert_eq!(outer.kind, BroadcastKind::Reshare);
        assert_eq!(outer.author_name.as_deref(), Some("alice"));
        assert_eq!(outer.reshared_count, Some(3));
        assert_eq!(outer.like_count, Some(5));
        assert_eq!(outer.comments_count, Some(2));

        let inner = outer.reshared.as_ref().unwrap();
        assert_eq!(inner.douban_id, 900);
        assert_eq!(inner.kind, BroadcastKind::Saying);
        assert_eq!(inner.images, vec!["https://img9.douban.com/p1.jpg"]);
    }

    #[test]
    fn statuses_without_sid_are_skipped() {
        let body = r#"
        <div class="stream-items">
          <div class="status-item">
            <div class="bd"><p class="text">no id anywhere</p></div>
          </div>
        </div>
        "#;
        assert!(parse_statuses(body).is_empty());
    }

    #[test]
    fn noreply_flag() {
        let body = r#"
        <div class="stream-items">
          <div class="status-item" data-sid="7" data-noreply="1">
            <div class="bd"><p class="text">quiet</p></div>
          </div>
        </div>
        "#;
        let records = parse_statuses(body);
        assert!(records[0].is_noreply);
    }

    #[test]
    fn comments_page() {
        let body = r#"
        <div class="comments">
          <div class="comment-item" data-cid="555">
            <a class="comment-author" href="https://www.douban.com/people/bob/">Bob</a>
            <span class="pubtime">2024-01-03 09:00:00</span>
            <p class="comment-text">nice</p>
            <span class="comment-vote">7赞</span>
          </div>
          <div class="comment-item"><p class="comment-text">no id</p></div>
        </div>
        "#;
        let page = parse_status_comments(body);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].douban_id, 555);
        assert_eq!(page.items[0].author_name.as_deref(), Some("Bob"));
        assert_eq!(page.items[0].like_count, Some(7));
        assert!(page.next.is_none());
    }

    #[test]
    fn notes_standard_and_small_site_layouts() {
        let standard = r#"
        <div class="note-container">
          <h3><a href="https://www.douban.com/note/123/">My note</a></h3>
        </div>
        "#;
        let page = parse_notes(standard);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].douban_id, 123);

        let small = r#"
        <div class="note-item">
          <a class="note-title" href="https://site.douban.com/widget/notes/1/note/456/">Small-site note</a>
        </div>
        "#;
        let page = parse_notes(small);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].douban_id, 456);
    }

    #[test]
    fn note_page_content_and_images() {
        let body = r#"
        <h1 class="note-title">Travel log</h1>
        <span class="pub-date">2024-02-01 08:00:00</span>
        <div class="introduction">short intro</div>
        <div class="note-content"><p>day one</p><img src="https://img9.douban.com/n1.jpg"/></div>
        "#;
        let note = parse_note(body, "https://www.douban.com/note/321/").unwrap();
        assert_eq!(note.douban_id, 321);
        assert_eq!(note.title.as_deref(), Some("Travel log"));
        assert_eq!(note.images, vec!["https://img9.douban.com/n1.jpg"]);
        assert!(note.content.as_deref().unwrap().contains("day one"));

        assert!(parse_note(body, "https://www.douban.com/people/alice/").is_none());
    }

    #[test]
    fn albums_listing() {
        let body = r#"
        <div class="album-item">
          <a class="album-link" href="https://www.douban.com/photos/album/42/"><img src="cover.jpg"/></a>
          <div class="info">
            <a class="album-title" href="https://www.douban.com/photos/album/42/">Trip</a>
            <span class="count">共12张</span>
            <span class="update-time">2024-05-01</span>
            <p class="description">a trip</p>
          </div>
        </div>
        "#;
        let page = parse_albums(body);
        assert_eq!(page.items.len(), 1);
        let album = &page.items[0];
        assert_eq!(album.douban_id, 42);
        assert_eq!(album.total, Some(12));
        assert_eq!(album.last_updated.as_deref(), Some("2024-05-01"));
        assert_eq!(album.cover.as_deref(), Some("cover.jpg"));
    }

    #[test]
    fn album_photos() {
        let body = r#"
        <div class="photo-list">
          <div class="photo-item"><img src="p1.jpg"/><div class="description">cap</div></div>
          <div class="photo-item"><img src="p2.jpg"/></div>
        </div>
        "#;
        let page = parse_album_photos(body);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].description.as_deref(), Some("cap"));
        assert!(page.items[1].description.is_none());
    }

    #[test]
    fn likes_with_type_codes() {
        let body = r#"
        <div class="fav-list">
          <div class="fav-item" data-tid="123" data-type="1015">
            <a class="fav-title" href="https://www.douban.com/note/123/">liked note</a>
            <span class="tags">travel food</span>
          </div>
          <div class="fav-item" data-tid="42" data-type="1026">
            <a class="fav-title" href="https://www.douban.com/photos/album/42/">liked album</a>
          </div>
        </div>
        "#;
        let page = parse_likes(body);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].target_type, "1015");
        assert_eq!(page.items[0].tags.as_deref(), Some(r#"["travel","food"]"#));
        assert_eq!(page.items[1].target_type, "1026");
        assert!(page.items[1].tags.is_none());
    }
}
