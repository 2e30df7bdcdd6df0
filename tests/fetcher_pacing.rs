//! Fetcher behavior against a live mock server: request pacing and the
//! retry-then-give-up path.

use std::time::Instant;

use graveyard::fetcher::{Fetcher, FetcherConfig};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn fetcher_for(site: &MockServer, requests_per_minute: u32) -> Fetcher {
    let mut config = FetcherConfig::new("bid=test", None, requests_per_minute);
    config.site_root = site.uri() + "/";
    config.mobile_root = site.uri() + "/";
    Fetcher::new(config).unwrap()
}

#[tokio::test]
async fn n_requests_take_at_least_n_minus_one_intervals() {
    let site = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&site)
        .await;

    // 600 rpm -> 100ms interval
    let fetcher = fetcher_for(&site, 600).await;

    let started = Instant::now();
    for _ in 0..3 {
        let page = fetcher.get("page").await.unwrap().unwrap();
        assert_eq!(page.body, "ok");
    }
    assert!(
        started.elapsed() >= std::time::Duration::from_millis(200),
        "3 requests at 600 rpm must span at least two intervals"
    );
}

#[tokio::test]
async fn http_errors_yield_none_without_retries() {
    let site = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&site)
        .await;

    let fetcher = fetcher_for(&site, 60_000).await;
    let result = fetcher.get("missing").await.unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn cookies_ride_along_on_every_request() {
    let site = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .and(wiremock::matchers::header("Cookie", "bid=test"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&site)
        .await;

    let fetcher = fetcher_for(&site, 60_000).await;
    assert!(fetcher.get("page").await.unwrap().is_some());
}
