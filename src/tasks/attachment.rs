//! Attachment realization: content-addressed materialization of queued
//! binary attachments under the cache directory.
//!
//! The cache path is a two-level directory shard of an MD5 digest,
//! preserving the URL's extension: `HH/HH/REST.EXT`. The digest input is
//! the URL itself on the first attempt and `"{retries}|{url}"` on
//! re-attempts, so a failed write lands on a fresh path.

use std::path::{Path, PathBuf};

use md5::{Digest, Md5};

use gy_core::{Error, Result};
use gy_db::queries::attachments;

use crate::tasks::TaskContext;

/// Derive the cache-relative path for an attachment URL.
pub fn cache_path(url: &str, retries: i64) -> PathBuf {
    let input = if retries == 0 {
        url.to_string()
    } else {
        format!("{retries}|{url}")
    };
    let digest = hex::encode(Md5::digest(input.as_bytes()));

    let extension = url
        .rsplit('/')
        .next()
        .and_then(|segment| {
            let name = segment.split(['?', '#']).next().unwrap_or(segment);
            Path::new(name)
                .extension()
                .and_then(|ext| ext.to_str())
        })
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default();

    PathBuf::from(&digest[..2])
        .join(&digest[2..4])
        .join(format!("{}{extension}", &digest[4..]))
}

/// Materialize one queued attachment. Returns `false` when nothing is
/// left to do.
pub async fn fetch_attachment(ctx: &TaskContext) -> Result<bool> {
    let pending = {
        let conn = ctx.conn()?;
        attachments::next_unrealized(&conn)?
    };
    let Some(attachment) = pending else {
        return Ok(false);
    };

    let resource = match ctx.fetcher.get_bytes(&attachment.url).await {
        Ok(Some(resource)) => resource,
        Ok(None) => {
            let conn = ctx.conn()?;
            attachments::bump_retries(&conn, attachment.id)?;
            return Ok(true);
        }
        Err(e) => return Err(e),
    };

    let relative = cache_path(&attachment.url, attachment.retries);
    let absolute = ctx.cache_dir.join(&relative);
    if let Some(parent) = absolute.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Create-exclusive: a concurrent writer for the same URL either wins
    // the race or observes the finished file.
    match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&absolute)
    {
        Ok(mut file) => {
            use std::io::Write;
            if let Err(e) = file.write_all(&resource.bytes) {
                drop(file);
                let _ = std::fs::remove_file(&absolute);
                let conn = ctx.conn()?;
                attachments::bump_retries(&conn, attachment.id)?;
                tracing::warn!(url = %attachment.url, error = %e, "attachment write failed");
                return Ok(true);
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
        Err(e) => {
            let conn = ctx.conn()?;
            attachments::bump_retries(&conn, attachment.id)?;
            tracing::warn!(url = %attachment.url, error = %e, "attachment open failed");
            return Ok(true);
        }
    }

    if !absolute.exists() {
        return Err(Error::internal(format!(
            "attachment file vanished: {}",
            absolute.display()
        )));
    }

    let conn = ctx.conn()?;
    let relative_str = relative.to_string_lossy().replace('\\', "/");
    attachments::set_local(
        &conn,
        attachment.id,
        &relative_str,
        resource.content_type.as_deref(),
    )?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_attempt_hashes_plain_url() {
        let url = "https://img9.douban.com/view/photo/p123.jpg";
        let digest = hex::encode(Md5::digest(url.as_bytes()));
        let expected: PathBuf = PathBuf::from(&digest[..2])
            .join(&digest[2..4])
            .join(format!("{}.jpg", &digest[4..]));
        assert_eq!(cache_path(url, 0), expected);
    }

    #[test]
    fn retries_change_the_path() {
        let url = "https://img9.douban.com/view/photo/p123.jpg";
        assert_ne!(cache_path(url, 0), cache_path(url, 1));
        assert_ne!(cache_path(url, 1), cache_path(url, 2));
    }

    #[test]
    fn extension_is_preserved_and_query_ignored() {
        let path = cache_path("https://img9.douban.com/p1.png?size=l", 0);
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("png"));

        let bare = cache_path("https://img9.douban.com/nosuffix", 0);
        assert!(bare.extension().is_none());
    }
}
