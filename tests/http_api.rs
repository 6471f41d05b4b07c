use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::Value;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tower::ServiceExt;

use codefolio::{
    application::{
        profiles::ProfileFormatter,
        refresh::{RefreshCoordinator, RefreshTrigger},
        scrape::ScrapeService,
        scrapers::{PlatformScraper, ScrapeError},
    },
    domain::{entities::PlatformProfile, types::Platform},
    infra::{
        http::{HttpState, REQUEST_ID_HEADER, build_router},
        store::ProfileStore,
    },
};

const HANDLE: &str = "alice";

struct StubScraper {
    platform: Platform,
    fail: bool,
    delay: Duration,
}

impl StubScraper {
    fn ok(platform: Platform) -> Arc<Self> {
        Arc::new(Self {
            platform,
            fail: false,
            delay: Duration::ZERO,
        })
    }

    fn failing(platform: Platform) -> Arc<Self> {
        Arc::new(Self {
            platform,
            fail: true,
            delay: Duration::ZERO,
        })
    }

    fn slow(platform: Platform, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            platform,
            fail: false,
            delay,
        })
    }
}

#[async_trait]
impl PlatformScraper for StubScraper {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn fetch(&self, handle: &str) -> Result<PlatformProfile, ScrapeError> {
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return Err(ScrapeError::Upstream {
                platform: self.platform.as_str(),
                message: "request timed out".to_string(),
            });
        }
        let mut profile = PlatformProfile::seed_for(self.platform, handle);
        profile.problems_solved.easy = 10;
        profile.problems_solved.medium = 5;
        profile.problems_solved.hard = 1;
        profile.problems_solved.total = 16;
        profile.contests.attended = 3;
        profile.profile.rating = Some(1500);
        Ok(profile)
    }
}

struct TestApp {
    _dir: tempfile::TempDir,
    store: ProfileStore,
    scrapes: ScrapeService,
    coordinator: Arc<RefreshCoordinator>,
    router: Router,
}

fn app_with(scrapers: Vec<Arc<StubScraper>>, allowed_origins: &[String]) -> TestApp {
    let dir = tempfile::tempdir().expect("temp dir");
    let store = ProfileStore::new(dir.path().to_path_buf()).expect("store");

    let mut builder = ScrapeService::builder(store.clone());
    for scraper in scrapers {
        builder = builder.register(HANDLE, scraper);
    }
    let scrapes = builder.build();

    let formatter = ProfileFormatter::new(store.clone(), |_| HANDLE.to_string());
    let coordinator = Arc::new(RefreshCoordinator::new(scrapes.clone()));
    let state = HttpState::new(formatter, coordinator.clone());
    let router = build_router(state, allowed_origins);

    TestApp {
        _dir: dir,
        store,
        scrapes,
        coordinator,
        router,
    }
}

fn app(scrapers: Vec<Arc<StubScraper>>) -> TestApp {
    app_with(scrapers, &[])
}

async fn send(router: &Router, method: Method, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request");
    let response = router.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}

fn assert_count(value: &Value, path: &str) {
    let count = value
        .pointer(path)
        .unwrap_or_else(|| panic!("missing {path}"));
    assert!(count.is_u64(), "{path} must be a non-negative integer, got {count}");
}

#[tokio::test]
async fn scraped_records_match_the_profile_schema_on_every_platform() {
    let app = app(Platform::ALL.into_iter().map(StubScraper::ok).collect());
    let report = app
        .coordinator
        .run_now(RefreshTrigger::Manual)
        .await
        .unwrap();
    assert_eq!(report.succeeded, Platform::ALL.to_vec());

    for platform in Platform::ALL {
        let uri = format!("/api/codingPlatforms/{}", platform.as_str());
        let (status, body) = send(&app.router, Method::GET, &uri).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_eq!(body["success"], true);

        let data = &body["data"];
        for key in [
            "handle",
            "profile",
            "problemsSolved",
            "contests",
            "achievements",
            "lastUpdated",
        ] {
            assert!(data.get(key).is_some(), "{platform}: missing {key}");
        }
        assert_eq!(data["handle"], HANDLE);
        for tier in ["total", "easy", "medium", "hard"] {
            assert_count(data, &format!("/problemsSolved/{tier}"));
        }
        assert_count(data, "/contests/attended");
        assert!(data["achievements"]["badges"].is_array());

        let stamp = data["lastUpdated"].as_str().expect("lastUpdated string");
        assert!(OffsetDateTime::parse(stamp, &Rfc3339).is_ok());
    }
}

#[tokio::test]
async fn leetcode_ok_and_codeforces_failed_reports_a_warning() {
    let app = app(vec![
        StubScraper::ok(Platform::LeetCode),
        StubScraper::failing(Platform::Codeforces),
        StubScraper::ok(Platform::CodeChef),
        StubScraper::ok(Platform::Gfg),
    ]);
    let report = app
        .coordinator
        .run_now(RefreshTrigger::Manual)
        .await
        .unwrap();
    assert_eq!(report.failed, vec![Platform::Codeforces]);

    let (status, body) = send(&app.router, Method::GET, "/api/codingPlatforms/all").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["data"]["codeforces"].is_null());
    assert_eq!(body["data"]["leetcode"]["handle"], HANDLE);
    assert!(body["data"]["codechef"].is_object());
    assert!(body["data"]["gfg"].is_object());
    assert_eq!(body["warnings"], "Failed to fetch data from: codeforces");
}

#[tokio::test]
async fn aggregate_warnings_list_exactly_the_missing_platforms() {
    let app = app(vec![
        StubScraper::ok(Platform::LeetCode),
        StubScraper::ok(Platform::Gfg),
    ]);
    app.coordinator
        .run_now(RefreshTrigger::Manual)
        .await
        .unwrap();

    let (status, body) = send(&app.router, Method::GET, "/api/codingPlatforms/all").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["warnings"],
        "Failed to fetch data from: codeforces, codechef"
    );
    assert!(body["data"]["codeforces"].is_null());
    assert!(body["data"]["codechef"].is_null());
}

#[tokio::test]
async fn aggregate_without_failures_has_no_warnings() {
    let app = app(Platform::ALL.into_iter().map(StubScraper::ok).collect());
    app.coordinator
        .run_now(RefreshTrigger::Manual)
        .await
        .unwrap();

    let (status, body) = send(&app.router, Method::GET, "/api/codingPlatforms/all").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("warnings").is_none());
}

#[tokio::test]
async fn all_files_missing_returns_service_unavailable() {
    let app = app(Vec::new());

    let (status, body) = send(&app.router, Method::GET, "/api/codingPlatforms/all").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], false);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn single_platform_without_cache_is_not_found() {
    let app = app(Vec::new());

    let (status, body) = send(&app.router, Method::GET, "/api/codingPlatforms/leetcode").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn unknown_platform_is_not_found() {
    let app = app(Vec::new());

    let (status, body) = send(&app.router, Method::GET, "/api/codingPlatforms/topcoder").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Unknown platform: topcoder");
}

#[tokio::test]
async fn partial_cache_file_is_served_with_seed_defaults() {
    let app = app(Vec::new());
    std::fs::write(
        app.store.path_for(Platform::Codeforces),
        r#"{ "handle": "alice", "problemsSolved": { "total": 7, "easy": 7 },
             "lastUpdated": "2024-01-02T03:04:05Z" }"#,
    )
    .unwrap();

    let (status, body) = send(&app.router, Method::GET, "/api/codingPlatforms/codeforces").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["problemsSolved"]["total"], 7);
    assert_eq!(body["data"]["problemsSolved"]["unrated"], 0);
    assert_eq!(body["data"]["contests"]["attended"], 0);
    assert!(body["data"]["profile"]["rating"].is_null());
}

#[tokio::test]
async fn null_cache_file_is_not_served_as_a_profile() {
    let app = app(vec![StubScraper::ok(Platform::LeetCode)]);
    app.coordinator
        .run_now(RefreshTrigger::Manual)
        .await
        .unwrap();
    std::fs::write(app.store.path_for(Platform::LeetCode), "null").unwrap();

    let (status, body) = send(&app.router, Method::GET, "/api/codingPlatforms/leetcode").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    let (status, body) = send(&app.router, Method::GET, "/api/codingPlatforms/all").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn rescraping_moves_last_updated_strictly_forward() {
    let app = app(vec![StubScraper::ok(Platform::CodeChef)]);

    let mut stamps = Vec::new();
    for _ in 0..3 {
        app.coordinator
            .run_now(RefreshTrigger::Manual)
            .await
            .unwrap();
        let (_, body) = send(&app.router, Method::GET, "/api/codingPlatforms/codechef").await;
        let raw = body["data"]["lastUpdated"].as_str().unwrap().to_string();
        stamps.push(OffsetDateTime::parse(&raw, &Rfc3339).unwrap());
    }

    assert!(stamps[0] < stamps[1]);
    assert!(stamps[1] < stamps[2]);
}

#[tokio::test]
async fn unconfigured_handle_returns_none_without_writing() {
    let app = app(vec![StubScraper::ok(Platform::Gfg)]);

    let result = app.scrapes.scrape(Platform::Gfg, "someone-else").await;
    assert!(result.is_none());
    assert!(!app.store.path_for(Platform::Gfg).exists());

    let (status, _) = send(&app.router, Method::GET, "/api/codingPlatforms/gfg").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn manual_trigger_runs_in_background_and_rejects_overlap() {
    let app = app(vec![
        StubScraper::slow(Platform::LeetCode, Duration::from_millis(300)),
        StubScraper::failing(Platform::Codeforces),
    ]);

    let (status, body) = send(&app.router, Method::POST, "/api/admin/trigger-update").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["success"], true);

    let (status, body) = send(&app.router, Method::POST, "/api/admin/trigger-update").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);

    let (_, body) = send(&app.router, Method::GET, "/api/admin/update-status").await;
    assert_eq!(body["data"]["isRunning"], true);

    let mut waited = Duration::ZERO;
    while app.coordinator.is_running() {
        assert!(waited < Duration::from_secs(5), "refresh never finished");
        tokio::time::sleep(Duration::from_millis(20)).await;
        waited += Duration::from_millis(20);
    }

    let (status, body) = send(&app.router, Method::GET, "/api/admin/update-status").await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["isRunning"], false);
    assert_eq!(data["totalRuns"], 1);
    assert_eq!(data["platforms"]["leetcode"]["outcome"], "succeeded");
    assert_eq!(data["platforms"]["codeforces"]["outcome"], "failed");
    assert!(data["platforms"]["codeforces"]["lastUpdated"].is_null());
    assert!(data["lastFinishedAt"].is_string());
}

#[tokio::test]
async fn health_reports_uptime_and_memory() {
    let app = app(Vec::new());

    let (status, body) = send(&app.router, Method::GET, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["uptimeSeconds"].is_u64());
    assert!(body["timestamp"].is_string());
    for key in ["rssBytes", "systemUsedBytes", "systemTotalBytes"] {
        assert!(body["memory"][key].is_u64(), "memory.{key}");
    }
}

#[tokio::test]
async fn unknown_route_is_a_json_404() {
    let app = app(Vec::new());

    let (status, body) = send(&app.router, Method::GET, "/api/nothing-here").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let app = app(Vec::new());

    let request = Request::builder()
        .uri("/health")
        .header(&REQUEST_ID_HEADER, "trace-123")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(
        response.headers().get(&REQUEST_ID_HEADER).unwrap(),
        "trace-123"
    );

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert!(response.headers().contains_key(&REQUEST_ID_HEADER));
}

#[tokio::test]
async fn cors_allows_only_configured_origins() {
    let app = app_with(Vec::new(), &["https://portfolio.example".to_string()]);

    let allowed = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "https://portfolio.example")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(allowed).await.unwrap();
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "https://portfolio.example"
    );

    let denied = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "https://elsewhere.example")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(denied).await.unwrap();
    assert!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none()
    );
}

#[tokio::test]
async fn cors_allows_any_origin_when_unconfigured() {
    let app = app(Vec::new());

    let request = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "https://anywhere.example")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "*"
    );
}
