//! End-to-end backup scenarios over a mock site: fresh backup,
//! idempotent rerun, drop-one reconciliation, and profile version bump.

mod common;

use common::Harness;
use graveyard::tasks::{Task, TaskKind};
use gy_core::WorkerSettings;

async fn mount_fixture(harness: &Harness) {
    harness.mock_user("owner", 1, "the owner").await;
    harness.mock_user("alice", 2, "hi").await;
    harness.mock_user("bob", 3, "").await;
    harness.mock_user("carol", 4, "").await;
    harness.mock_user("dave", 5, "").await;
    harness.mock_contacts("/contacts/list", &["alice", "bob"]).await;
    harness.mock_contacts("/contacts/rlist", &["carol"]).await;
    harness.mock_contacts("/contacts/blacklist", &["dave"]).await;
}

fn refetch_settings() -> WorkerSettings {
    // Zero freshness so every run re-fetches users from the mock site.
    WorkerSettings {
        local_object_duration: 0,
        ..WorkerSettings::default()
    }
}

#[tokio::test]
async fn fresh_backup_then_idempotent_rerun_then_drop_one() {
    let harness = Harness::new().await;
    let account = harness.create_account("owner");
    mount_fixture(&harness).await;

    let task = Task::new(TaskKind::FollowingFollower, account.id);

    // --- scenario: fresh user backup -----------------------------------
    let mut ctx = harness.ctx(account.id, refetch_settings());
    task.run(&mut ctx).await.unwrap();

    assert_eq!(harness.count("user"), 5); // owner + alice/bob/carol/dave
    assert_eq!(harness.count("following"), 2);
    assert_eq!(harness.count("follower"), 1);
    assert_eq!(harness.count("block_user"), 1);
    assert_eq!(harness.count("user_historical"), 0);
    assert_eq!(harness.count("following_historical"), 0);
    assert_eq!(harness.count("follower_historical"), 0);
    assert_eq!(harness.count("block_user_historical"), 0);

    {
        let conn = harness.pool.get().unwrap();
        let max_version: i64 = conn
            .query_row(
                "SELECT MAX(v) FROM (
                     SELECT MAX(version) AS v FROM user
                     UNION ALL SELECT MAX(version) FROM following
                     UNION ALL SELECT MAX(version) FROM follower
                     UNION ALL SELECT MAX(version) FROM block_user
                 )",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(max_version, 1, "fresh backup leaves version=1 everywhere");
    }

    // the account got its owner bound
    assert!(harness.account(account.id).user_id.is_some());

    // counter sidecars arrived with the profiles
    assert_eq!(harness.count("user_extra"), 5);

    // --- scenario: idempotent rerun ------------------------------------
    let mut ctx = harness.ctx(account.id, refetch_settings());
    task.run(&mut ctx).await.unwrap();

    assert_eq!(harness.count("user"), 5);
    assert_eq!(harness.count("following"), 2);
    assert_eq!(harness.count("user_historical"), 0);
    assert_eq!(harness.count("following_historical"), 0);
    {
        let conn = harness.pool.get().unwrap();
        let max_version: i64 = conn
            .query_row("SELECT MAX(version) FROM user", [], |r| r.get(0))
            .unwrap();
        assert_eq!(max_version, 1);
    }

    // --- scenario: drop-one reconciliation -----------------------------
    harness.site.reset().await;
    harness.mock_user("owner", 1, "the owner").await;
    harness.mock_user("alice", 2, "hi").await;
    harness.mock_user("carol", 4, "").await;
    harness.mock_user("dave", 5, "").await;
    harness.mock_contacts("/contacts/list", &["alice"]).await;
    harness.mock_contacts("/contacts/rlist", &["carol"]).await;
    harness.mock_contacts("/contacts/blacklist", &["dave"]).await;

    let mut ctx = harness.ctx(account.id, refetch_settings());
    task.run(&mut ctx).await.unwrap();

    assert_eq!(harness.count("following"), 1);
    assert_eq!(harness.count("following_historical"), 1);
    {
        let conn = harness.pool.get().unwrap();
        let (name, deleted_at): (String, String) = conn
            .query_row(
                "SELECT name, deleted_at FROM following_historical",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(name, "bob");
        assert!(gy_db::parse_ts(&deleted_at).is_some());

        let remaining: String = conn
            .query_row("SELECT name FROM following", [], |r| r.get(0))
            .unwrap();
        assert_eq!(remaining, "alice");
    }
    // the other two sets were untouched
    assert_eq!(harness.count("follower"), 1);
    assert_eq!(harness.count("follower_historical"), 0);
}

#[tokio::test]
async fn changed_profile_bumps_version_and_archives_the_old_row() {
    let harness = Harness::new().await;
    let account = harness.create_account("owner");

    harness.mock_user("owner", 1, "the owner").await;
    harness.mock_user("alice", 2, "hi").await;
    harness.mock_contacts("/contacts/list", &["alice"]).await;
    harness.mock_contacts("/contacts/rlist", &[]).await;
    harness.mock_contacts("/contacts/blacklist", &[]).await;

    let task = Task::new(TaskKind::FollowingFollower, account.id);
    let mut ctx = harness.ctx(account.id, refetch_settings());
    task.run(&mut ctx).await.unwrap();

    // alice comes back with a changed signature
    harness.site.reset().await;
    harness.mock_user("owner", 1, "the owner").await;
    harness.mock_user("alice", 2, "bye").await;
    harness.mock_contacts("/contacts/list", &["alice"]).await;
    harness.mock_contacts("/contacts/rlist", &[]).await;
    harness.mock_contacts("/contacts/blacklist", &[]).await;

    let mut ctx = harness.ctx(account.id, refetch_settings());
    task.run(&mut ctx).await.unwrap();

    let conn = harness.pool.get().unwrap();
    let (current_signature, current_version, alice_id): (String, i64, i64) = conn
        .query_row(
            "SELECT signature, version, id FROM user WHERE unique_name = 'alice'",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .unwrap();
    assert_eq!(current_signature, "bye");
    assert_eq!(current_version, 2);

    let (old_signature, origin): (String, i64) = conn
        .query_row(
            "SELECT signature, user_id FROM user_historical",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .unwrap();
    assert_eq!(old_signature, "hi");
    assert_eq!(origin, alice_id);
}
