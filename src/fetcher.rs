//! Per-worker HTTP client.
//!
//! One [`Fetcher`] exists per worker. It carries the account's session
//! cookie, an optional proxy, and the pacing clock that enforces the
//! per-worker requests-per-minute budget. Transport errors are retried
//! per URL; HTTP error statuses are logged and surface as `None`; a
//! redirect onto the login wall invalidates the session and aborts the
//! running task.

use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderValue, COOKIE, SET_COOKIE};
use reqwest::{Client, Proxy};
use url::Url;

use gy_core::{Error, Result};

/// Desktop site root; relative fetch URLs resolve against it.
pub const SITE_ROOT: &str = "https://www.douban.com/";
/// Mobile site root, used by the JSON APIs.
pub const MOBILE_ROOT: &str = "https://m.douban.com/";

/// A redirect chain ending here means the session hit the login wall.
const LOGIN_MARKER: &str = "accounts/login";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 6.1; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/60.0.3112.105 Safari/537.36";
const ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8";
const ACCEPT_LANGUAGE: &str = "zh-CN,zh;q=0.8";

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
/// Attempts per URL before giving up on transport errors.
const MAX_RETRIES: usize = 5;

/// Fetcher construction parameters.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Account session cookie string, sent verbatim.
    pub cookie: String,
    /// Optional proxy URL.
    pub proxy: Option<String>,
    /// Pacing budget for this worker.
    pub requests_per_minute: u32,
    /// Desktop site root. Overridable for tests.
    pub site_root: String,
    /// Mobile site root. Overridable for tests.
    pub mobile_root: String,
}

impl FetcherConfig {
    pub fn new(cookie: impl Into<String>, proxy: Option<String>, requests_per_minute: u32) -> Self {
        Self {
            cookie: cookie.into(),
            proxy,
            requests_per_minute,
            site_root: SITE_ROOT.to_string(),
            mobile_root: MOBILE_ROOT.to_string(),
        }
    }
}

/// A fetched page: decoded body plus the final URL after redirects.
#[derive(Debug, Clone)]
pub struct Page {
    pub body: String,
    pub url: Url,
}

/// Raw bytes of a fetched resource plus its reported content type.
#[derive(Debug, Clone)]
pub struct Resource {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

pub struct Fetcher {
    client: Client,
    site_root: Url,
    mobile_root: Url,
    cookie: std::sync::Mutex<String>,
    min_interval: Duration,
    last_request_at: tokio::sync::Mutex<Option<Instant>>,
}

impl Fetcher {
    pub fn new(config: FetcherConfig) -> Result<Self> {
        let site_root = Url::parse(&config.site_root)
            .map_err(|e| Error::Validation(format!("site root: {e}")))?;
        let mobile_root = Url::parse(&config.mobile_root)
            .map_err(|e| Error::Validation(format!("mobile root: {e}")))?;

        let mut headers = HeaderMap::new();
        headers.insert("User-Agent", HeaderValue::from_static(USER_AGENT));
        headers.insert("Accept", HeaderValue::from_static(ACCEPT));
        headers.insert("Accept-Language", HeaderValue::from_static(ACCEPT_LANGUAGE));
        headers.insert("Pragma", HeaderValue::from_static("no-cache"));
        if let Ok(referer) = HeaderValue::from_str(site_root.as_str()) {
            headers.insert("Referer", referer);
        }

        let mut builder = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers);
        if let Some(proxy_url) = &config.proxy {
            let proxy = Proxy::all(proxy_url)
                .map_err(|e| Error::Validation(format!("proxy {proxy_url}: {e}")))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| Error::http(format!("failed to build HTTP client: {e}")))?;

        let rpm = config.requests_per_minute.max(1);
        Ok(Self {
            client,
            site_root,
            mobile_root,
            cookie: std::sync::Mutex::new(config.cookie),
            min_interval: Duration::from_secs_f64(60.0 / rpm as f64),
            last_request_at: tokio::sync::Mutex::new(None),
        })
    }

    pub fn site_root(&self) -> &Url {
        &self.site_root
    }

    pub fn mobile_root(&self) -> &Url {
        &self.mobile_root
    }

    /// Append a cookie to the session (e.g. the mobile API token).
    pub fn merge_cookie(&self, name: &str, value: &str) {
        let mut cookie = self.cookie.lock().unwrap_or_else(|e| e.into_inner());
        if !cookie.is_empty() && !cookie.trim_end().ends_with(';') {
            cookie.push_str("; ");
        }
        cookie.push_str(&format!("{name}={value}"));
    }

    pub fn has_cookie(&self, name: &str) -> bool {
        let cookie = self.cookie.lock().unwrap_or_else(|e| e.into_inner());
        cookie
            .split(';')
            .any(|part| part.trim_start().starts_with(&format!("{name}=")))
    }

    /// Sleep whatever remains of the pacing interval, then stamp the
    /// clock. For N requests at budget r this guarantees a total elapsed
    /// time of at least (N-1) * 60/r seconds.
    async fn pace(&self) {
        let mut last = self.last_request_at.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.min_interval;
            let now = Instant::now();
            if ready_at > now {
                tokio::time::sleep(ready_at - now).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn request(&self, url: &Url) -> Result<Option<reqwest::Response>> {
        for attempt in 1..=MAX_RETRIES {
            self.pace().await;

            let cookie = self.cookie.lock().unwrap_or_else(|e| e.into_inner()).clone();
            let send = self
                .client
                .get(url.clone())
                .header(COOKIE, cookie)
                .send()
                .await;

            match send {
                Ok(response) => {
                    if response.url().as_str().contains(LOGIN_MARKER) {
                        tracing::warn!(url = %url, "redirected to the login wall");
                        return Err(Error::SessionInvalid);
                    }
                    if response.status().is_success() {
                        return Ok(Some(response));
                    }
                    // HTTP errors are not retried.
                    tracing::warn!(url = %url, status = %response.status(), "request failed");
                    return Ok(None);
                }
                Err(e) if e.is_redirect() => {
                    tracing::warn!(url = %url, "redirect loop; treating session as forbidden");
                    return Err(Error::SessionInvalid);
                }
                Err(e) => {
                    tracing::debug!(url = %url, attempt, error = %e, "transport error");
                }
            }
        }
        tracing::warn!(url = %url, "giving up after {MAX_RETRIES} attempts");
        Ok(None)
    }

    fn resolve(&self, base: &Url, url: &str) -> Result<Url> {
        base.join(url)
            .map_err(|e| Error::Validation(format!("bad url {url}: {e}")))
    }

    /// GET a page, resolving `url` against the desktop site root.
    pub async fn get(&self, url: &str) -> Result<Option<Page>> {
        let resolved = self.resolve(&self.site_root.clone(), url)?;
        self.get_absolute(resolved).await
    }

    /// GET a page, resolving `url` against the mobile site root.
    pub async fn get_mobile(&self, url: &str) -> Result<Option<Page>> {
        let resolved = self.resolve(&self.mobile_root.clone(), url)?;
        self.get_absolute(resolved).await
    }

    async fn get_absolute(&self, url: Url) -> Result<Option<Page>> {
        let Some(response) = self.request(&url).await? else {
            return Ok(None);
        };
        let final_url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| Error::http(format!("reading body of {final_url}: {e}")))?;
        Ok(Some(Page {
            body,
            url: final_url,
        }))
    }

    /// GET raw bytes (attachment realization).
    pub async fn get_bytes(&self, url: &str) -> Result<Option<Resource>> {
        let resolved = self.resolve(&self.site_root.clone(), url)?;
        let Some(response) = self.request(&resolved).await? else {
            return Ok(None);
        };
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::http(format!("reading bytes of {resolved}: {e}")))?;
        Ok(Some(Resource {
            bytes: bytes.to_vec(),
            content_type,
        }))
    }

    /// GET a mobile page and pull a named cookie out of the response.
    pub async fn acquire_mobile_cookie(&self, url: &str, name: &str) -> Result<Option<String>> {
        let resolved = self.resolve(&self.mobile_root.clone(), url)?;
        let Some(response) = self.request(&resolved).await? else {
            return Ok(None);
        };
        let prefix = format!("{name}=");
        for header in response.headers().get_all(SET_COOKIE) {
            let Ok(raw) = header.to_str() else { continue };
            let Some(pair) = raw.split(';').next() else {
                continue;
            };
            if let Some(value) = pair.trim().strip_prefix(&prefix) {
                return Ok(Some(value.to_string()));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_fetcher(rpm: u32) -> Fetcher {
        Fetcher::new(FetcherConfig::new("bid=abc", None, rpm)).unwrap()
    }

    #[test]
    fn cookie_merge_and_lookup() {
        let fetcher = test_fetcher(60);
        assert!(fetcher.has_cookie("bid"));
        assert!(!fetcher.has_cookie("frodotk"));

        fetcher.merge_cookie("frodotk", "tok123");
        assert!(fetcher.has_cookie("frodotk"));

        let cookie = fetcher.cookie.lock().unwrap().clone();
        assert_eq!(cookie, "bid=abc; frodotk=tok123");
    }

    #[test]
    fn relative_urls_resolve_against_site_root() {
        let fetcher = test_fetcher(60);
        let url = fetcher
            .resolve(&fetcher.site_root.clone(), "people/alice/statuses?p=2")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.douban.com/people/alice/statuses?p=2"
        );

        // absolute URLs pass through untouched
        let absolute = fetcher
            .resolve(&fetcher.site_root.clone(), "https://img9.douban.com/x.jpg")
            .unwrap();
        assert_eq!(absolute.as_str(), "https://img9.douban.com/x.jpg");
    }

    #[tokio::test]
    async fn pacing_spaces_requests() {
        let fetcher = test_fetcher(600); // 100ms interval
        let started = Instant::now();
        for _ in 0..3 {
            fetcher.pace().await;
        }
        // 3 paced slots => at least 2 intervals
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn first_request_is_not_delayed() {
        let fetcher = test_fetcher(1); // one request a minute
        let started = Instant::now();
        fetcher.pace().await;
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
