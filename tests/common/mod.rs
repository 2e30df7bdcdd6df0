//! Shared harness for the end-to-end backup scenarios: an in-memory
//! store plus a mock site standing in for the remote service.

use std::path::PathBuf;

use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use graveyard::fetcher::{Fetcher, FetcherConfig};
use graveyard::tasks::TaskContext;
use gy_core::WorkerSettings;
use gy_db::models::Account;
use gy_db::queries::accounts;
use gy_db::{init_memory_pool, DbPool};

pub struct Harness {
    pub pool: DbPool,
    pub site: MockServer,
    pub cache_dir: TempDir,
}

impl Harness {
    pub async fn new() -> Self {
        Self {
            pool: init_memory_pool().unwrap(),
            site: MockServer::start().await,
            cache_dir: TempDir::new().unwrap(),
        }
    }

    /// Create an account whose crawls will hit the mock site.
    pub fn create_account(&self, name: &str) -> Account {
        let conn = self.pool.get().unwrap();
        accounts::create_account(&conn, name, "bid=test-session").unwrap()
    }

    /// Re-read an account (user binding, invalid flag).
    pub fn account(&self, id: i64) -> Account {
        let conn = self.pool.get().unwrap();
        accounts::get_account(&conn, id).unwrap().unwrap()
    }

    /// Build a task context whose fetcher points at the mock site.
    pub fn ctx(&self, account_id: i64, settings: WorkerSettings) -> TaskContext {
        let account = self.account(account_id);
        let mut config = FetcherConfig::new(account.session.clone(), None, 60_000);
        config.site_root = self.site.uri() + "/";
        config.mobile_root = self.site.uri() + "/";
        let fetcher = Fetcher::new(config).unwrap();
        TaskContext::new(
            self.pool.clone(),
            fetcher,
            settings,
            PathBuf::from(self.cache_dir.path()),
            account,
        )
    }

    /// Mount a mobile-API user payload.
    pub async fn mock_user(&self, unique_name: &str, douban_id: i64, signature: &str) {
        let body = serde_json::json!({
            "id": douban_id.to_string(),
            "uid": unique_name,
            "name": unique_name,
            "signature": signature,
            "following_count": 2,
            "followers_count": 1,
            "statuses_count": 10,
        });
        Mock::given(method("GET"))
            .and(path(format!("/rexxar/api/v2/user/{unique_name}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.site)
            .await;
    }

    /// Mount a contact-list page (following / followers / block list).
    pub async fn mock_contacts(&self, page_path: &str, names: &[&str]) {
        Mock::given(method("GET"))
            .and(path(page_path))
            .respond_with(ResponseTemplate::new(200).set_body_string(user_list_html(names)))
            .mount(&self.site)
            .await;
    }

    pub fn count(&self, table: &str) -> i64 {
        let conn = self.pool.get().unwrap();
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
            .unwrap()
    }
}

pub fn user_list_html(names: &[&str]) -> String {
    let items: String = names
        .iter()
        .map(|name| {
            format!(
                r#"<li>
                     <div class="avatar"><a href="https://www.douban.com/people/{name}/"><img src="https://img1.douban.com/icon/{name}.jpg"/></a></div>
                     <div class="info"><a href="https://www.douban.com/people/{name}/">{name}</a></div>
                   </li>"#
            )
        })
        .collect();
    format!(r#"<ul class="user-list">{items}</ul>"#)
}

/// Statuses-stream page: every status authored by `author`, one
/// status-item per id.
pub fn statuses_html(author: &str, ids: &[i64]) -> String {
    let items: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<div class="status-item" data-sid="{id}">
                     <div class="hd">
                       <a class="lnk-people" href="https://www.douban.com/people/{author}/">{author}</a>
                       <span class="created-at" title="2024-06-01 12:00:00"></span>
                     </div>
                     <div class="bd">
                       <p class="text">status number {id}</p>
                       <a class="status-link" href="https://www.douban.com/people/{author}/status/{id}/"></a>
                     </div>
                   </div>"#
            )
        })
        .collect();
    format!(r#"<div class="stream-items">{items}</div>"#)
}
