//! End-to-end tests for the SQLite-backed client
//!
//! Every test builds real service state over SQLite, either in memory or in a
//! temporary state directory, and moves shares between clients that share one
//! loopback swarm.

use std::time::Duration;

use chrono::Utc;
use tempfile::TempDir;
use uuid::Uuid;

use common::engine::LoopbackSwarm;
use common::share::{ContentBlob, NewShare, Share, ShareError, ShareKind};
use common::store::ShareStore;
use shush_daemon::service_state::StateSetupError;
use shush_daemon::{AppState, Database, DatabaseSetupError, ServiceConfig, ServiceState};

fn init_state_dir() -> (TempDir, ServiceConfig) {
    let tmp = TempDir::new().unwrap();
    let state = AppState::init(Some(tmp.path().join("shush")), None).unwrap();
    let config = ServiceConfig::from_app_state(&state).unwrap();
    (tmp, config)
}

async fn in_memory_client(swarm: &LoopbackSwarm) -> ServiceState {
    ServiceState::with_swarm(&ServiceConfig::default(), swarm.clone())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_shares_survive_restart() {
    let (_tmp, config) = init_state_dir();
    let swarm = LoopbackSwarm::default();

    let first = ServiceState::with_swarm(&config, swarm.clone()).await.unwrap();
    let created = first
        .shares()
        .create_share(
            NewShare::new("hello.txt", ShareKind::File).description("greeting"),
            b"hello from disk".to_vec(),
            None,
        )
        .await
        .unwrap();
    first.shares().shutdown().await;
    first.database().close().await;
    assert_eq!(swarm.seeder_count(&created.identifier.info_hash), 0);

    let second = ServiceState::with_swarm(&config, swarm.clone()).await.unwrap();
    let report = second.shares().resume_all().await.unwrap();
    assert_eq!(report.resumed, vec![created.share.id]);

    let identifier = second
        .shares()
        .identifier(created.share.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(identifier.info_hash, created.identifier.info_hash);
    assert_eq!(identifier.short_token, created.identifier.short_token);

    let receiver = in_memory_client(&swarm).await;
    let fetched = receiver
        .shares()
        .fetch_share(&created.link.to_string(), None)
        .await
        .unwrap();
    assert_eq!(fetched.content, b"hello from disk");
    assert_eq!(fetched.share.description, "greeting");

    second.shares().shutdown().await;
}

#[tokio::test]
async fn test_accounts_survive_restart() {
    let (_tmp, config) = init_state_dir();

    let first = ServiceState::from_config(&config).await.unwrap();
    first.vault().create_account("alice", "hunter2").await.unwrap();
    first.database().close().await;

    let second = ServiceState::from_config(&config).await.unwrap();
    assert!(!second.vault().authenticate("alice", "hunter3").await.unwrap());
    assert!(!second.vault().is_signed_in());
    assert!(second.vault().authenticate("alice", "hunter2").await.unwrap());
    assert_eq!(second.vault().session().unwrap().username(), "alice");
}

#[tokio::test]
async fn test_encrypted_share_between_clients() {
    let swarm = LoopbackSwarm::default();
    let sender = in_memory_client(&swarm).await;
    let receiver = in_memory_client(&swarm).await;

    let created = sender
        .shares()
        .create_share(
            NewShare::new("https://example.com/private", ShareKind::Url).encrypted(true),
            b"https://example.com/private".to_vec(),
            Some("correct horse"),
        )
        .await
        .unwrap();

    let stored = sender.database().content_for(created.share.id).await.unwrap().unwrap();
    assert_ne!(stored.bytes, b"https://example.com/private");

    let wrong = receiver
        .shares()
        .fetch_share(created.link.token().as_str(), Some("battery staple"))
        .await;
    assert!(matches!(wrong, Err(ShareError::AuthenticationFailure)));

    let missing = receiver
        .shares()
        .fetch_share(created.link.token().as_str(), None)
        .await;
    assert!(matches!(missing, Err(ShareError::PasswordRequired)));

    let fetched = receiver
        .shares()
        .fetch_share(created.link.token().as_str(), Some("correct horse"))
        .await
        .unwrap();
    assert_eq!(fetched.share.kind, ShareKind::Url);
    assert_eq!(fetched.content, b"https://example.com/private");

    sender.shares().shutdown().await;
}

#[tokio::test]
async fn test_resume_destroys_expired_share() {
    let swarm = LoopbackSwarm::default();
    let client = in_memory_client(&swarm).await;

    let share = Share {
        id: Uuid::new_v4(),
        name: "stale".to_string(),
        description: String::new(),
        notes: None,
        expires_at: Some(Utc::now() - chrono::Duration::minutes(5)),
        kind: ShareKind::File,
        encrypted: false,
        nonce: None,
        enabled: true,
        self_destruct: Some(false),
    };
    let blob = ContentBlob {
        id: Uuid::new_v4(),
        share_id: share.id,
        bytes: b"old".to_vec(),
    };
    client.database().insert_share(&share, &blob).await.unwrap();

    let report = client.shares().resume_all().await.unwrap();
    assert_eq!(report.expired, vec![share.id]);
    assert!(report.resumed.is_empty());
    assert!(client.database().get_share(share.id).await.unwrap().is_none());
    assert!(client.database().content_for(share.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_self_destruct_after_download() {
    let swarm = LoopbackSwarm::default();
    let sender = in_memory_client(&swarm).await;
    let receiver = in_memory_client(&swarm).await;

    let created = sender
        .shares()
        .create_share(
            NewShare::new("once.bin", ShareKind::File).self_destruct(true),
            vec![7u8; 40 * 1024],
            None,
        )
        .await
        .unwrap();

    let fetched = receiver
        .shares()
        .fetch_share(&created.link.to_string(), None)
        .await
        .unwrap();
    assert_eq!(fetched.content.len(), 40 * 1024);

    let id = created.share.id;
    tokio::time::timeout(Duration::from_secs(5), async {
        while sender.database().get_share(id).await.unwrap().is_some() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();
    assert!(!sender.shares().is_active(&id));
    assert_eq!(swarm.seeder_count(&created.identifier.info_hash), 0);
}

#[tokio::test]
async fn test_disabled_share_is_not_reachable() {
    let swarm = LoopbackSwarm::default();
    let sender = in_memory_client(&swarm).await;
    let receiver = in_memory_client(&swarm).await;

    let created = sender
        .shares()
        .create_share(NewShare::new("a.txt", ShareKind::File), b"a".to_vec(), None)
        .await
        .unwrap();
    sender.shares().set_enabled(created.share.id, false).await.unwrap();

    let result = receiver
        .shares()
        .fetch_share(&created.link.to_string(), None)
        .await;
    assert!(matches!(result, Err(ShareError::EngineFailure(_))));

    let report = sender.shares().resume_all().await.unwrap();
    assert!(report.resumed.is_empty());

    sender.shares().set_enabled(created.share.id, true).await.unwrap();
    let fetched = receiver
        .shares()
        .fetch_share(&created.link.to_string(), None)
        .await
        .unwrap();
    assert_eq!(fetched.content, b"a");

    sender.shares().shutdown().await;
}

#[tokio::test]
async fn test_setup_errors() {
    let url = url::Url::parse("postgres://localhost/shush").unwrap();
    let result = Database::connect(&url).await;
    assert!(matches!(result, Err(DatabaseSetupError::UnknownDbType(s)) if s == "postgres"));

    let config = ServiceConfig {
        sqlite_path: Some(std::path::PathBuf::from("/nonexistent/shush/db.sqlite")),
        ..Default::default()
    };
    let result = ServiceState::from_config(&config).await;
    assert!(matches!(result, Err(StateSetupError::DatabasePathDoesNotExist)));
}
