use pretty_assertions::assert_eq;
use std::ffi::c_void;
use torii_client::browser::mock::MockBridge;
use torii_client::ffi::{CArray, CFieldElement, CModel};
use torii_client::{
    Backend, BrowserBackend, ClientConfig, MainThreadQueue, Platform, ToriiError, ToriiEvent,
};
use torii_types::{Entity, FieldElement, KeysClause, Member, Model, Primitive, Query, Ty};

fn felt(value: u64) -> FieldElement {
    FieldElement::from_u64(value)
}

fn connect(bridge: &MockBridge) -> BrowserBackend<MockBridge> {
    BrowserBackend::connect(bridge.clone(), &ClientConfig::default()).unwrap()
}

fn score(player: u64, points: u64) -> Model {
    Model {
        name: "arena-Score".into(),
        members: vec![
            Member {
                name: "player".into(),
                ty: Ty::Primitive(Primitive::ContractAddress(felt(player))),
                key: true,
            },
            Member {
                name: "points".into(),
                ty: Ty::Primitive(Primitive::U64(points)),
                key: false,
            },
            Member {
                name: "total".into(),
                ty: Ty::Primitive(Primitive::U128(u128::MAX)),
                key: false,
            },
        ],
    }
}

fn score_query(player: u64) -> KeysClause {
    KeysClause::new("arena-Score", vec![felt(player)])
}

#[test]
fn connect_and_disconnect() {
    let bridge = MockBridge::new();
    let mut backend = connect(&bridge);
    assert_eq!(backend.platform(), Platform::Browser);
    assert!(backend.is_connected());
    assert_eq!(bridge.live_clients(), 1);

    backend.disconnect().unwrap();
    assert!(!backend.is_connected());
    assert!(matches!(
        backend.disconnect(),
        Err(ToriiError::InvariantViolation(_))
    ));

    drop(backend);
    assert_eq!(bridge.freed_clients(), 1);
}

#[test]
fn connect_failure() {
    let bridge = MockBridge::new();
    bridge.reject_connect("invalid world address");

    let err = BrowserBackend::connect(bridge.clone(), &ClientConfig::default())
        .err()
        .unwrap();

    assert!(matches!(&err, ToriiError::Connect(msg) if msg == "invalid world address"));
    assert_eq!(bridge.live_clients(), 0);
}

#[test]
fn drop_frees_client() {
    let bridge = MockBridge::new();
    drop(connect(&bridge));
    assert_eq!(bridge.freed_clients(), 1);
}

#[tokio::test]
async fn model_lookup_round_trips_json() {
    let bridge = MockBridge::new();
    let ty = score(3, 12).into_ty();
    bridge.insert_model(score_query(3), ty.clone());
    let backend = connect(&bridge);

    assert_eq!(backend.model(&score_query(3)).await.unwrap(), Some(ty));
    assert_eq!(backend.model(&score_query(4)).await.unwrap(), None);
}

#[tokio::test]
async fn model_error_is_remote_call() {
    let bridge = MockBridge::new();
    bridge.fail("model", "fetch failed");
    let backend = connect(&bridge);

    let err = backend.model(&score_query(3)).await.unwrap_err();
    assert!(matches!(&err, ToriiError::RemoteCall(msg) if msg == "fetch failed"));
}

#[tokio::test]
async fn entities_paginate() {
    let bridge = MockBridge::new();
    let all: Vec<Entity> = (0..6)
        .map(|i| Entity {
            hashed_keys: felt(500 + i),
            models: vec![score(i, i * 10)],
        })
        .collect();
    bridge.set_entities(all.clone());
    let backend = connect(&bridge);

    let page = backend
        .entities(&Query::new().with_limit(2).with_offset(1))
        .await
        .unwrap();

    assert_eq!(page, all[1..3].to_vec());
    let sent = bridge.last_query().unwrap();
    assert!(sent.contains("\"limit\":2"));
    assert!(sent.contains("\"offset\":1"));
}

#[tokio::test]
async fn sync_set_round_trip() {
    let bridge = MockBridge::new();
    let mut backend = connect(&bridge);

    backend
        .add_models_to_sync(&[score_query(1), score_query(2)])
        .await
        .unwrap();
    backend.remove_models_to_sync(&[score_query(1)]).await.unwrap();

    assert_eq!(backend.subscribed_models().await.unwrap(), vec![score_query(2)]);
}

#[tokio::test]
async fn empty_model_lists_never_reach_the_bridge() {
    let bridge = MockBridge::new();
    let mut backend = connect(&bridge);

    assert!(matches!(
        backend.add_models_to_sync(&[]).await,
        Err(ToriiError::InvariantViolation(_))
    ));
    assert!(matches!(
        backend.remove_models_to_sync(&[]).await,
        Err(ToriiError::InvariantViolation(_))
    ));
    assert_eq!(bridge.call_count("add_models_to_sync"), 0);
    assert_eq!(bridge.call_count("remove_models_to_sync"), 0);
}

#[tokio::test]
async fn start_subscription_once() {
    let bridge = MockBridge::new();
    let mut backend = connect(&bridge);

    backend.start_subscription().await.unwrap();
    assert!(matches!(
        backend.start_subscription().await,
        Err(ToriiError::InvariantViolation(_))
    ));
    assert_eq!(bridge.start_count(), 1);
}

#[tokio::test]
async fn operations_after_disconnect_fail() {
    let bridge = MockBridge::new();
    let mut backend = connect(&bridge);
    backend.disconnect().unwrap();

    assert!(matches!(
        backend.model(&score_query(1)).await,
        Err(ToriiError::InvariantViolation(_))
    ));
    assert!(matches!(
        backend.entities(&Query::new()).await,
        Err(ToriiError::InvariantViolation(_))
    ));
    assert!(matches!(
        backend.world_metadata(),
        Err(ToriiError::InvariantViolation(_))
    ));
    let entity = unsafe {
        backend.on_entity_state_update_raw(&[felt(1)], ignore_entity, std::ptr::null_mut())
    };
    let sync = unsafe {
        backend.on_sync_model_update_raw(&score_query(1), ignore_sync, std::ptr::null_mut())
    };
    assert!(matches!(entity, Err(ToriiError::InvariantViolation(_))));
    assert!(matches!(sync, Err(ToriiError::InvariantViolation(_))));
    assert_eq!(bridge.call_count("model"), 0);
    assert_eq!(bridge.subscription_count(), 0);
}

#[test]
fn world_metadata_is_unsupported() {
    let bridge = MockBridge::new();
    let backend = connect(&bridge);

    let err = backend.world_metadata().unwrap_err();

    assert!(err.is_unsupported());
    assert!(matches!(
        err,
        ToriiError::UnsupportedPlatform {
            platform: Platform::Browser,
            operation: "world_metadata",
        }
    ));
}

unsafe extern "C" fn ignore_entity(_: *mut c_void, _: CFieldElement, _: CArray<CModel>) {}

unsafe extern "C" fn ignore_sync(_: *mut c_void) {}

#[test]
fn raw_callbacks_are_unsupported() {
    let bridge = MockBridge::new();
    let mut backend = connect(&bridge);

    let entity = unsafe {
        backend.on_entity_state_update_raw(&[felt(1)], ignore_entity, std::ptr::null_mut())
    };
    let sync = unsafe {
        backend.on_sync_model_update_raw(&score_query(1), ignore_sync, std::ptr::null_mut())
    };

    assert!(entity.unwrap_err().is_unsupported());
    assert!(sync.unwrap_err().is_unsupported());
    assert_eq!(bridge.subscription_count(), 0);
}

#[test]
fn entity_updates_are_decoded_and_queued() {
    let bridge = MockBridge::new();
    let mut backend = connect(&bridge);
    let mut queue = MainThreadQueue::new();

    let id = backend
        .on_entity_state_update(&[felt(1)], queue.delivery())
        .unwrap();
    assert_eq!(bridge.emit_entity_update(felt(1), &[score(1, 7)]), 1);
    assert_eq!(bridge.emit_entity_update(felt(2), &[score(2, 7)]), 0);

    let events = queue.drain();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].registration, id);
    assert_eq!(
        events[0].event,
        ToriiEvent::EntityUpdated {
            key: felt(1),
            models: vec![score(1, 7)],
        }
    );
}

#[test]
fn malformed_entity_update_is_dropped() {
    let bridge = MockBridge::new();
    let mut backend = connect(&bridge);
    let mut queue = MainThreadQueue::new();
    backend.on_entity_state_update(&[], queue.delivery()).unwrap();

    bridge.emit_raw_entity_update(felt(1), "0x1", "{not json");
    bridge.emit_raw_entity_update(felt(1), "not a felt", "[]");

    assert!(queue.is_empty());
}

#[test]
fn sync_model_update_and_unregister() {
    let bridge = MockBridge::new();
    let mut backend = connect(&bridge);
    let mut queue = MainThreadQueue::new();

    let id = backend
        .on_sync_model_update(&score_query(1), queue.delivery())
        .unwrap();
    bridge.emit_sync_model_update(&score_query(1));
    backend.unregister(id).unwrap();
    assert_eq!(bridge.emit_sync_model_update(&score_query(1)), 0);

    let events = queue.drain();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, ToriiEvent::SyncModelUpdated);
    assert!(matches!(
        backend.unregister(id),
        Err(ToriiError::InvariantViolation(_))
    ));
}

#[test]
fn disconnect_cancels_subscriptions() {
    let bridge = MockBridge::new();
    let mut backend = connect(&bridge);
    let mut queue = MainThreadQueue::new();
    backend.on_entity_state_update(&[], queue.delivery()).unwrap();
    backend
        .on_sync_model_update(&score_query(1), queue.delivery())
        .unwrap();

    backend.disconnect().unwrap();

    assert_eq!(bridge.subscription_count(), 0);
    assert_eq!(backend.registration_count(), 0);
    assert_eq!(bridge.emit_entity_update(felt(1), &[]), 0);
    assert!(queue.drain().is_empty());
}
