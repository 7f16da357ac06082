//! Moving shares between two clients over one swarm

mod common;

use std::time::Duration;

use ::common::identifier::{build_magnet_uri, expand_token, shorten_info_hash, ShareLink};
use ::common::engine::{LoopbackEngine, LoopbackSwarm};
use ::common::share::{NewShare, ShareError, ShareKind, ShareManager, ShareManagerConfig};

#[tokio::test(start_paused = true)]
async fn test_every_link_form_reaches_the_share() {
    let (sender, _store, receiver, _swarm) = common::pair();
    let created = sender
        .create_share(
            NewShare::new("plan.md", ShareKind::File).notes("draft"),
            b"# plan".to_vec(),
            None,
        )
        .await
        .unwrap();

    let token = created.identifier.short_token.to_string();
    let forms = [
        created.link.to_string(),
        format!("/s/{}", token),
        format!("https://mirror.example.org/anything/{}", token),
        token.clone(),
    ];
    for form in forms {
        let fetched = receiver.fetch_share(&form, None).await.unwrap();
        assert_eq!(fetched.content, b"# plan");
        assert_eq!(fetched.share.notes.as_deref(), Some("draft"));
    }

    let hex = expand_token(&token).unwrap();
    assert_eq!(hex, created.identifier.info_hash.to_hex());
    assert_eq!(shorten_info_hash(&hex).unwrap(), token);
    assert_eq!(
        created.identifier.magnet_uri,
        build_magnet_uri(&created.identifier.info_hash)
    );

    let parsed = ShareLink::parse(&created.link.to_string()).unwrap();
    assert_eq!(parsed, created.link);
}

#[tokio::test(start_paused = true)]
async fn test_stats_follow_uploads() {
    let (sender, _store, receiver, _swarm) = common::pair();
    let created = sender
        .create_share(
            NewShare::new("big.bin", ShareKind::File),
            vec![0xab; 64 * 1024],
            None,
        )
        .await
        .unwrap();

    let before = sender.get_stats(&created.share.id).unwrap();
    assert_eq!(before.uploaded_bytes, 0);
    assert_eq!(before.peer_count, 0);

    receiver
        .fetch_share(&created.link.to_string(), None)
        .await
        .unwrap();
    // let the observer drain the seeder's events
    tokio::time::sleep(Duration::from_millis(50)).await;

    let after = sender.get_stats(&created.share.id).unwrap();
    assert!(after.uploaded_bytes >= 64 * 1024);
    assert!(after.ratio > 0.0);

    sender.stop_share(created.share.id).await;
    assert!(sender.get_stats(&created.share.id).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_destroyed_share_is_gone_for_everyone() {
    let (sender, store, receiver, swarm) = common::pair();
    let created = sender
        .create_share(NewShare::new("x", ShareKind::Url), b"https://x.example".to_vec(), None)
        .await
        .unwrap();
    assert_eq!(swarm.seeder_count(&created.identifier.info_hash), 1);

    sender.destroy_share(created.share.id).await.unwrap();
    assert_eq!(store.share_row_count(), 0);
    assert_eq!(swarm.seeder_count(&created.identifier.info_hash), 0);

    let result = receiver.fetch_share(&created.link.to_string(), None).await;
    assert!(matches!(result, Err(ShareError::EngineFailure(_))));
    assert!(matches!(
        sender.get_share(created.share.id).await,
        Err(ShareError::NotFound(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_same_files_same_identifier_across_clients() {
    let swarm = LoopbackSwarm::default();
    let (a, store_a) = common::client(&swarm);
    let (b, _) = common::client(&swarm);

    let created = a
        .create_share(NewShare::new("n", ShareKind::File), b"payload".to_vec(), None)
        .await
        .unwrap();
    a.shutdown().await;

    // a second manager over the same store re-derives the same identifier
    let again = ShareManager::new(
        store_a.clone(),
        LoopbackEngine::new(swarm.clone()),
        ShareManagerConfig::default(),
    );
    let report = again.resume_all().await.unwrap();
    assert_eq!(report.resumed, vec![created.share.id]);
    let identifier = again.identifier(created.share.id).await.unwrap().unwrap();
    assert_eq!(identifier, created.identifier);

    let fetched = b.fetch_share(identifier.short_token.as_str(), None).await.unwrap();
    assert_eq!(fetched.share.id, created.share.id);
}
