//! Decoders for the site's mobile JSON APIs.
//!
//! The APIs are not stable enough for rigid struct deserialization (ids
//! arrive as strings or numbers, optional blocks come and go), so the
//! decoders walk a `serde_json::Value` and pick out what they recognize.

use serde_json::Value;

use super::{InterestRecord, InterestsPage, SubjectRecord, UserRecord};

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn get_i64(object: &Value, key: &str) -> Option<i64> {
    object.get(key).and_then(as_i64)
}

fn get_str(object: &Value, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Re-encode a JSON sub-tree for storage, skipping null/absent values.
fn get_json(object: &Value, key: &str) -> Option<String> {
    match object.get(key) {
        None | Some(Value::Null) => None,
        Some(value) => serde_json::to_string(value).ok(),
    }
}

// ---------------------------------------------------------------------------
// user
// ---------------------------------------------------------------------------

/// Decode a mobile-API user payload.
///
/// Returns `None` when the identifying `id` or `uid` is missing.
pub fn parse_user(body: &str) -> Option<UserRecord> {
    let value: Value = serde_json::from_str(body).ok()?;
    parse_user_value(&value)
}

pub fn parse_user_value(value: &Value) -> Option<UserRecord> {
    let douban_id = get_i64(value, "id")?;
    let unique_name = get_str(value, "uid")?;

    let loc_name = value
        .get("loc")
        .and_then(|loc| get_str(loc, "name"))
        .or_else(|| get_str(value, "loc_name"));

    Some(UserRecord {
        douban_id,
        unique_name,
        name: get_str(value, "name"),
        created: get_str(value, "reg_time").or_else(|| get_str(value, "created")),
        loc_name,
        signature: get_str(value, "signature").or_else(|| get_str(value, "intro")),
        description: get_str(value, "desc"),
        avatar: get_str(value, "avatar"),
        large_avatar: get_str(value, "large_avatar"),
        alt: get_str(value, "alt").or_else(|| get_str(value, "url")),
        kind: get_str(value, "type"),
        following_count: get_i64(value, "following_count"),
        follower_count: get_i64(value, "followers_count")
            .or_else(|| get_i64(value, "follower_count")),
        statuses_count: get_i64(value, "statuses_count"),
    })
}

// ---------------------------------------------------------------------------
// subjects
// ---------------------------------------------------------------------------

/// Decode a subject payload (book / movie / music alike; the record
/// carries the union and tables drop what they do not declare).
pub fn parse_subject(body: &str) -> Option<SubjectRecord> {
    let value: Value = serde_json::from_str(body).ok()?;
    parse_subject_value(&value)
}

pub fn parse_subject_value(value: &Value) -> Option<SubjectRecord> {
    let douban_id = get_i64(value, "id")?;

    // Alternate titles arrive as a list or a single string.
    let alt_title = match value.get("alt_title") {
        Some(Value::Array(titles)) => {
            let joined: Vec<&str> = titles.iter().filter_map(Value::as_str).collect();
            if joined.is_empty() {
                None
            } else {
                Some(joined.join(" / "))
            }
        }
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    };

    // Cover image: either a plain URL or an object of sizes.
    let image = get_str(value, "image").or_else(|| {
        value
            .get("images")
            .and_then(|images| get_str(images, "large").or_else(|| get_str(images, "small")))
    });

    // Music performers live under "author" too; keep whatever exists.
    let author = get_json(value, "author").or_else(|| get_json(value, "singer"));

    // Tags normalize to a plain list of names.
    let tags = value.get("tags").and_then(|tags| match tags {
        Value::Array(entries) => {
            let names: Vec<String> = entries
                .iter()
                .map(|entry| match entry {
                    Value::String(s) => Some(s.clone()),
                    object => get_str(object, "name"),
                })
                .collect::<Option<_>>()?;
            serde_json::to_string(&names).ok()
        }
        _ => None,
    });

    Some(SubjectRecord {
        douban_id,
        title: get_str(value, "title"),
        subtitle: get_str(value, "subtitle"),
        alt_title,
        origin_title: get_str(value, "origin_title"),
        author,
        translator: get_json(value, "translator"),
        publisher: get_str(value, "publisher"),
        pubdate: get_str(value, "pubdate"),
        isbn10: get_str(value, "isbn10"),
        isbn13: get_str(value, "isbn13"),
        price: get_str(value, "price"),
        pages: get_str(value, "pages"),
        binding: get_str(value, "binding"),
        rating: get_json(value, "rating"),
        image,
        summary: get_str(value, "summary"),
        attrs: get_json(value, "attrs"),
        alt: get_str(value, "alt").or_else(|| get_str(value, "url")),
        tags,
    })
}

// ---------------------------------------------------------------------------
// interests
// ---------------------------------------------------------------------------

/// Decode one page of the mobile interests API.
///
/// Entries without a resolvable subject id are skipped.
pub fn parse_interests(body: &str) -> Option<InterestsPage> {
    let value: Value = serde_json::from_str(body).ok()?;
    let entries = value.get("interests")?.as_array()?;

    let interests = entries
        .iter()
        .filter_map(|entry| {
            let subject = entry.get("subject");
            let subject_id = subject
                .and_then(|s| get_i64(s, "id"))
                .or_else(|| get_i64(entry, "subject_id"))?;
            Some(InterestRecord {
                subject_id,
                subject: subject.and_then(parse_subject_value),
                rating: get_json(entry, "rating"),
                tags: get_json(entry, "tags"),
                comment: get_str(entry, "comment"),
                create_time: get_str(entry, "create_time"),
                status: get_str(entry, "status").unwrap_or_else(|| "mark".to_string()),
            })
        })
        .collect();

    Some(InterestsPage {
        interests,
        total: get_i64(&value, "total").unwrap_or(0),
        start: get_i64(&value, "start").unwrap_or(0),
        count: get_i64(&value, "count").unwrap_or(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_with_string_id_and_loc() {
        let body = r#"{
            "id": "123456",
            "uid": "tabris17",
            "name": "tabris",
            "loc": {"id": "108288", "name": "北京"},
            "signature": "hello",
            "avatar": "https://img1.douban.com/icon/u123456.jpg",
            "reg_time": "2008-09-01 12:00:00",
            "statuses_count": 42,
            "following_count": 10,
            "followers_count": 7
        }"#;
        let user = parse_user(body).unwrap();
        assert_eq!(user.douban_id, 123456);
        assert_eq!(user.unique_name, "tabris17");
        assert_eq!(user.loc_name.as_deref(), Some("北京"));
        assert_eq!(user.statuses_count, Some(42));
        assert_eq!(user.follower_count, Some(7));
    }

    #[test]
    fn user_without_id_is_skipped() {
        assert!(parse_user(r#"{"uid": "alice"}"#).is_none());
        assert!(parse_user("not json").is_none());
    }

    #[test]
    fn book_subject_roundtrip() {
        let body = r#"{
            "id": "1084336",
            "title": "小王子",
            "subtitle": "",
            "author": ["圣埃克苏佩里"],
            "translator": ["马振聘"],
            "publisher": "人民文学出版社",
            "pubdate": "2003-8",
            "isbn10": "7020042414",
            "isbn13": "9787020042418",
            "price": "22.00元",
            "pages": "97",
            "binding": "平装",
            "rating": {"max": 10, "average": "9.0", "numRaters": 1000},
            "images": {"small": "s.jpg", "large": "l.jpg"},
            "summary": "...",
            "alt": "https://book.douban.com/subject/1084336/",
            "tags": [{"count": 49322, "name": "童话"}, {"count": 41381, "name": "小王子"}]
        }"#;
        let subject = parse_subject(body).unwrap();
        assert_eq!(subject.douban_id, 1084336);
        assert_eq!(subject.title.as_deref(), Some("小王子"));
        // empty strings are treated as absent
        assert!(subject.subtitle.is_none());
        assert_eq!(subject.image.as_deref(), Some("l.jpg"));
        assert_eq!(
            subject.tags.as_deref(),
            Some(r#"["童话","小王子"]"#)
        );
        assert!(subject.rating.as_deref().unwrap().contains("numRaters"));
    }

    #[test]
    fn interests_page_with_embedded_subjects() {
        let body = r#"{
            "total": 3,
            "start": 0,
            "count": 50,
            "interests": [
                {
                    "status": "done",
                    "rating": {"value": 5},
                    "tags": ["sf"],
                    "comment": "great",
                    "create_time": "2020-01-02 10:00:00",
                    "subject": {"id": "26389", "title": "三体"}
                },
                {
                    "status": "mark",
                    "subject": {"title": "no id, skipped"}
                }
            ]
        }"#;
        let page = parse_interests(body).unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.interests.len(), 1);
        let interest = &page.interests[0];
        assert_eq!(interest.subject_id, 26389);
        assert_eq!(interest.status, "done");
        assert_eq!(interest.subject.as_ref().unwrap().title.as_deref(), Some("三体"));
        assert_eq!(interest.tags.as_deref(), Some(r#"["sf"]"#));
    }
}
