//! Session invalidation: a redirect chain ending on the login wall
//! flags the account, surfaces a worker error event, and leaves the
//! worker alive for the next task.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::Harness;
use graveyard::scheduler::Scheduler;
use graveyard::tasks::{Task, TaskKind};
use gy_core::{EventBus, ProgressEvent, WorkerPhase};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn login_wall_invalidates_the_account_and_reports_the_error() {
    let harness = Harness::new().await;
    let account = harness.create_account("owner");

    // Any profile fetch bounces to the login wall.
    Mock::given(method("GET"))
        .and(path("/rexxar/api/v2/user/owner"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", "/accounts/login"),
        )
        .mount(&harness.site)
        .await;
    Mock::given(method("GET"))
        .and(path("/accounts/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&harness.site)
        .await;

    let bus = Arc::new(EventBus::default());
    let root = harness.site.uri() + "/";
    let (scheduler, events_rx) = Scheduler::with_site_roots(
        harness.pool.clone(),
        harness.cache_dir.path().to_path_buf(),
        bus.clone(),
        &root,
        &root,
    );
    let mut progress = bus.subscribe();

    scheduler.start_workers().unwrap();
    tokio::spawn(scheduler.clone().run_event_loop(events_rx));

    assert!(scheduler.add_task(Task::new(TaskKind::FollowingFollower, account.id), false));
    scheduler.push_task();

    // Expect ready -> working -> error on the progress stream.
    let mut phases = Vec::new();
    let mut error_message = None;
    for _ in 0..8 {
        let Ok(Ok(event)) =
            tokio::time::timeout(Duration::from_secs(10), progress.recv()).await
        else {
            break;
        };
        if let ProgressEvent::Worker {
            event, message, ..
        } = event
        {
            phases.push(event);
            if event == WorkerPhase::Error {
                error_message = message;
                break;
            }
        }
    }
    assert!(phases.contains(&WorkerPhase::Ready));
    assert!(phases.contains(&WorkerPhase::Working));
    assert!(phases.contains(&WorkerPhase::Error));
    assert!(
        error_message
            .as_deref()
            .unwrap_or_default()
            .contains("session"),
        "error event should mention the session: {error_message:?}"
    );

    // the account was flagged
    assert!(harness.account(account.id).is_invalid);

    // the worker survived the failure and can take the next task
    let statuses = scheduler.workers_status();
    assert_eq!(statuses[0].state, "running");
    assert!(statuses[0].current_task.is_none());

    scheduler.stop_workers();
}
