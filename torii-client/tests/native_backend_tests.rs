use pretty_assertions::assert_eq;
use std::ffi::c_void;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use torii_client::ffi::{CArray, CFieldElement, CModel, NativeApi};
use torii_client::native::mock::{ConnectArgs, MockNative};
use torii_client::{ClientConfig, NativeBackend, ToriiError};
use torii_types::{
    Clause, ComparisonOperator, CompositeClause, Entity, EnumOption, EnumValue, FieldElement,
    KeysClause, LogicalOperator, Member, MemberClause, Model, ModelMetadata, Primitive, Query,
    Struct, Ty, WorldMetadata,
};

fn felt(value: u64) -> FieldElement {
    FieldElement::from_u64(value)
}

fn connect(api: &Arc<MockNative>) -> NativeBackend<MockNative> {
    NativeBackend::connect(Arc::clone(api), &ClientConfig::default()).unwrap()
}

fn position(player: u64, x: u32, y: u32) -> Model {
    Model {
        name: "dojo_starter-Position".into(),
        members: vec![
            Member {
                name: "player".into(),
                ty: Ty::Primitive(Primitive::ContractAddress(felt(player))),
                key: true,
            },
            Member {
                name: "vec".into(),
                ty: Ty::Struct(Struct {
                    name: "Vec2".into(),
                    children: vec![
                        Member {
                            name: "x".into(),
                            ty: Ty::Primitive(Primitive::U32(x)),
                            key: false,
                        },
                        Member {
                            name: "y".into(),
                            ty: Ty::Primitive(Primitive::U32(y)),
                            key: false,
                        },
                    ],
                }),
                key: false,
            },
        ],
    }
}

fn moves(player: u64, remaining: u8) -> Model {
    Model {
        name: "dojo_starter-Moves".into(),
        members: vec![
            Member {
                name: "player".into(),
                ty: Ty::Primitive(Primitive::ContractAddress(felt(player))),
                key: true,
            },
            Member {
                name: "remaining".into(),
                ty: Ty::Primitive(Primitive::U8(remaining)),
                key: false,
            },
            Member {
                name: "last_direction".into(),
                ty: Ty::Enum(EnumValue {
                    name: "Direction".into(),
                    option: 1,
                    options: vec![
                        EnumOption {
                            name: "Left".into(),
                            ty: Ty::Tuple(vec![]),
                        },
                        EnumOption {
                            name: "Right".into(),
                            ty: Ty::Tuple(vec![]),
                        },
                    ],
                }),
                key: false,
            },
            Member {
                name: "label".into(),
                ty: Ty::ByteArray("wanderer".into()),
                key: false,
            },
            Member {
                name: "balance".into(),
                ty: Ty::Primitive(Primitive::I128(-42)),
                key: false,
            },
        ],
    }
}

fn entities(count: u64) -> Vec<Entity> {
    (0..count)
        .map(|i| Entity {
            hashed_keys: felt(1000 + i),
            models: vec![position(i, i as u32, 2 * i as u32), moves(i, 10)],
        })
        .collect()
}

fn position_query(player: u64) -> KeysClause {
    KeysClause::new("dojo_starter-Position", vec![felt(player)])
}

// ── Connection lifecycle ─────────────────────────────────────────

#[test]
fn connect_passes_config_to_library() {
    let api = Arc::new(MockNative::new());
    let config = ClientConfig::new("http://torii:8080", "http://katana:5050", "0x1234");
    let backend = NativeBackend::connect(Arc::clone(&api), &config).unwrap();

    assert!(backend.is_connected());
    assert_eq!(
        api.last_connect(),
        Some(ConnectArgs {
            torii_url: "http://torii:8080".into(),
            rpc_url: "http://katana:5050".into(),
            world_address: "0x1234".into(),
        })
    );
    assert_eq!(api.clients_created(), 1);
}

#[test]
fn connect_failure_carries_native_message() {
    let api = Arc::new(MockNative::new());
    api.reject_connect("world not found");

    let err = NativeBackend::connect(Arc::clone(&api), &ClientConfig::default())
        .err()
        .unwrap();

    assert!(matches!(&err, ToriiError::Connect(msg) if msg == "world not found"));
    assert_eq!(api.clients_created(), 0);
    assert_eq!(api.allocations(), api.releases());
}

#[test]
fn connect_rejects_interior_nul() {
    let api = Arc::new(MockNative::new());
    let config = ClientConfig::new("http://torii\0:8080", "http://localhost:5050", "0x1");

    let err = NativeBackend::connect(Arc::clone(&api), &config).err().unwrap();

    assert!(matches!(err, ToriiError::InvalidInput(_)));
    assert_eq!(api.call_count("client_new"), 0);
}

#[test]
fn disconnect_frees_client_exactly_once() {
    let api = Arc::new(MockNative::new());
    let mut backend = connect(&api);

    backend.disconnect().unwrap();
    assert!(!backend.is_connected());
    assert_eq!(api.clients_freed(), 1);

    let second = backend.disconnect();
    assert!(matches!(second, Err(ToriiError::InvariantViolation(_))));

    drop(backend);
    assert_eq!(api.clients_freed(), 1);
    assert_eq!(api.call_count("client_free"), 1);
}

#[test]
fn drop_frees_connected_client() {
    let api = Arc::new(MockNative::new());
    let backend = connect(&api);
    drop(backend);

    assert_eq!(api.clients_created(), 1);
    assert_eq!(api.clients_freed(), 1);
}

#[test]
fn operations_after_disconnect_are_invariant_violations() {
    let api = Arc::new(MockNative::new());
    let mut backend = connect(&api);
    backend.disconnect().unwrap();
    let calls_before = api.total_calls();

    let is_violation = |result: Result<(), ToriiError>| {
        matches!(result, Err(ToriiError::InvariantViolation(_)))
    };
    assert!(is_violation(backend.model(&position_query(1)).map(drop)));
    assert!(is_violation(backend.entities(&Query::new()).map(drop)));
    assert!(is_violation(backend.subscribed_models().map(drop)));
    assert!(is_violation(backend.world_metadata().map(drop)));
    assert!(is_violation(backend.add_models_to_sync(&[position_query(1)])));
    assert!(is_violation(backend.remove_models_to_sync(&[position_query(1)])));
    assert!(is_violation(backend.start_subscription()));
    assert!(is_violation(
        backend
            .on_entity_state_update(&[felt(1)], torii_client::Delivery::inline(|_| {}))
            .map(drop)
    ));

    assert_eq!(api.total_calls(), calls_before);
}

// ── Query façade ─────────────────────────────────────────────────

#[test]
fn entities_copies_every_record_and_releases_buffer() {
    let api = Arc::new(MockNative::new());
    api.set_entities(entities(25));
    let backend = connect(&api);

    let fetched = backend.entities(&Query::new()).unwrap();

    assert_eq!(fetched, entities(25));
    assert_eq!(api.call_count("entities_free"), 1);
    assert_eq!(api.allocations(), api.releases());
}

#[test]
fn entities_releases_buffer_when_copy_fails() {
    let api = Arc::new(MockNative::new());
    api.set_entities(entities(5));
    api.corrupt_felts(true);
    let backend = connect(&api);

    let err = backend.entities(&Query::new()).unwrap_err();

    assert!(matches!(err, ToriiError::Decode(_)));
    assert_eq!(api.call_count("entities_free"), 1);
    assert_eq!(api.allocations(), api.releases());
}

#[test]
fn entities_remote_error_is_retryable() {
    let api = Arc::new(MockNative::new());
    api.fail("client_entities", "indexer unavailable");
    let backend = connect(&api);

    let err = backend.entities(&Query::new()).unwrap_err();

    assert!(matches!(&err, ToriiError::RemoteCall(msg) if msg == "indexer unavailable"));
    assert!(err.is_retryable());
    assert_eq!(api.call_count("error_free"), 1);
    assert_eq!(api.allocations(), api.releases());
}

#[test]
fn entities_forwards_pagination_and_clause() {
    let api = Arc::new(MockNative::new());
    api.set_entities(entities(10));
    let backend = connect(&api);
    let query = Query::new()
        .with_limit(3)
        .with_offset(4)
        .with_clause(Clause::Composite(CompositeClause {
            model: "dojo_starter-Moves".into(),
            operator: LogicalOperator::Or,
            clauses: vec![
                Clause::Keys(KeysClause::new("dojo_starter-Moves", vec![felt(1), felt(2)])),
                Clause::Member(MemberClause {
                    model: "dojo_starter-Moves".into(),
                    member: "remaining".into(),
                    operator: ComparisonOperator::Gte,
                    value: Primitive::U8(5),
                }),
            ],
        }));

    let fetched = backend.entities(&query).unwrap();

    assert_eq!(fetched, entities(10)[4..7].to_vec());
    assert_eq!(api.last_query(), Some(query));
}

#[test]
fn entities_empty_result() {
    let api = Arc::new(MockNative::new());
    let backend = connect(&api);

    assert!(backend.entities(&Query::new()).unwrap().is_empty());
    assert_eq!(api.allocations(), api.releases());
}

#[test]
fn model_found() {
    let api = Arc::new(MockNative::new());
    let ty = position(7, 3, 4).into_ty();
    api.insert_model(position_query(7), ty.clone());
    let backend = connect(&api);

    assert_eq!(backend.model(&position_query(7)).unwrap(), Some(ty));
    assert_eq!(api.call_count("ty_free"), 1);
    assert_eq!(api.allocations(), api.releases());
}

#[test]
fn model_absent_is_none_not_error() {
    let api = Arc::new(MockNative::new());
    api.insert_model(position_query(7), position(7, 3, 4).into_ty());
    let backend = connect(&api);

    assert_eq!(backend.model(&position_query(8)).unwrap(), None);
    assert_eq!(api.allocations(), 0);
}

#[test]
fn model_transport_error_is_remote_call() {
    let api = Arc::new(MockNative::new());
    api.fail("client_model", "connection reset");
    let backend = connect(&api);

    let err = backend.model(&position_query(7)).unwrap_err();

    assert!(matches!(&err, ToriiError::RemoteCall(msg) if msg == "connection reset"));
    assert_eq!(api.allocations(), api.releases());
}

#[test]
fn model_releases_ty_when_decode_fails() {
    let api = Arc::new(MockNative::new());
    api.insert_model(position_query(7), position(7, 3, 4).into_ty());
    api.corrupt_felts(true);
    let backend = connect(&api);

    let err = backend.model(&position_query(7)).unwrap_err();

    assert!(matches!(err, ToriiError::Decode(_)));
    assert_eq!(api.call_count("ty_free"), 1);
    assert_eq!(api.allocations(), api.releases());
}

#[test]
fn subscribed_models_releases_array_when_copy_fails() {
    let api = Arc::new(MockNative::new());
    let mut backend = connect(&api);
    backend
        .add_models_to_sync(&[position_query(1), position_query(2)])
        .unwrap();
    api.corrupt_felts(true);

    let err = backend.subscribed_models().unwrap_err();

    assert!(matches!(err, ToriiError::Decode(_)));
    assert_eq!(api.call_count("keys_clauses_free"), 1);
    assert_eq!(api.allocations(), api.releases());
}

#[test]
fn subscribed_models_remote_error_frees_native_error() {
    let api = Arc::new(MockNative::new());
    api.fail("client_subscribed_models", "stream closed");
    let backend = connect(&api);

    let err = backend.subscribed_models().unwrap_err();

    assert!(matches!(&err, ToriiError::RemoteCall(msg) if msg == "stream closed"));
    assert_eq!(api.call_count("error_free"), 1);
    assert_eq!(api.call_count("keys_clauses_free"), 0);
    assert_eq!(api.allocations(), api.releases());
}

#[test]
fn model_name_with_nul_is_rejected_locally() {
    let api = Arc::new(MockNative::new());
    let backend = connect(&api);

    let err = backend
        .model(&KeysClause::new("dojo\0starter", vec![]))
        .unwrap_err();

    assert!(matches!(err, ToriiError::InvalidInput(_)));
    assert_eq!(api.call_count("client_model"), 0);
}

#[test]
fn world_metadata_is_copied_and_released() {
    let api = Arc::new(MockNative::new());
    let metadata = WorldMetadata {
        world_address: felt(0xdead),
        world_class_hash: felt(0xbeef),
        models: vec![ModelMetadata {
            name: "dojo_starter-Position".into(),
            class_hash: felt(0x42),
            packed_size: 2,
            unpacked_size: 3,
            schema: position(0, 0, 0).into_ty(),
        }],
    };
    api.set_metadata(metadata.clone());
    let backend = connect(&api);

    assert_eq!(backend.world_metadata().unwrap(), metadata);
    assert_eq!(api.call_count("world_metadata_free"), 1);
    assert_eq!(api.allocations(), api.releases());
}

#[test]
fn world_metadata_unavailable_is_remote_call() {
    let api = Arc::new(MockNative::new());
    let backend = connect(&api);

    assert!(matches!(
        backend.world_metadata(),
        Err(ToriiError::RemoteCall(_))
    ));
    assert_eq!(api.allocations(), api.releases());
}

// ── Subscription registry ────────────────────────────────────────

#[test]
fn empty_model_lists_never_reach_the_library() {
    let api = Arc::new(MockNative::new());
    let mut backend = connect(&api);
    let calls_before = api.total_calls();

    assert!(matches!(
        backend.add_models_to_sync(&[]),
        Err(ToriiError::InvariantViolation(_))
    ));
    assert!(matches!(
        backend.remove_models_to_sync(&[]),
        Err(ToriiError::InvariantViolation(_))
    ));

    assert_eq!(api.total_calls(), calls_before);
}

#[test]
fn add_and_remove_models_to_sync() {
    let api = Arc::new(MockNative::new());
    let mut backend = connect(&api);
    let a = position_query(1);
    let b = position_query(2);

    backend.add_models_to_sync(&[a.clone(), b.clone()]).unwrap();
    assert_eq!(api.synced_models(), vec![a.clone(), b.clone()]);
    assert_eq!(backend.subscribed_models().unwrap(), vec![a.clone(), b.clone()]);

    backend.remove_models_to_sync(&[a]).unwrap();
    assert_eq!(backend.subscribed_models().unwrap(), vec![b]);
    assert_eq!(api.allocations(), api.releases());
}

#[test]
fn add_models_remote_failure() {
    let api = Arc::new(MockNative::new());
    api.fail("client_add_models_to_sync", "model not registered");
    let mut backend = connect(&api);

    let err = backend.add_models_to_sync(&[position_query(1)]).unwrap_err();

    assert!(matches!(err, ToriiError::RemoteCall(_)));
    assert!(api.synced_models().is_empty());
}

#[test]
fn declined_call_is_remote_call() {
    let api = Arc::new(MockNative::new());
    api.decline("client_remove_models_to_sync");
    let mut backend = connect(&api);

    let err = backend.remove_models_to_sync(&[position_query(1)]).unwrap_err();
    assert!(matches!(err, ToriiError::RemoteCall(_)));
}

#[test]
fn start_subscription_twice_is_rejected_locally() {
    let api = Arc::new(MockNative::new());
    let mut backend = connect(&api);

    backend.start_subscription().unwrap();
    let second = backend.start_subscription();

    assert!(matches!(second, Err(ToriiError::InvariantViolation(_))));
    assert_eq!(api.start_count(), 1);
    assert_eq!(api.call_count("client_start_subscription"), 1);
}

#[test]
fn failed_start_can_be_retried() {
    let api = Arc::new(MockNative::new());
    api.fail("client_start_subscription", "busy");
    let mut backend = connect(&api);

    assert!(backend.start_subscription().unwrap_err().is_retryable());
    api.clear_failure("client_start_subscription");
    backend.start_subscription().unwrap();
    assert_eq!(api.start_count(), 1);
}

#[test]
fn unregister_unknown_id() {
    let api = Arc::new(MockNative::new());
    let mut backend = connect(&api);

    let err = backend
        .unregister(torii_client::RegistrationId::new(99))
        .unwrap_err();
    assert!(matches!(err, ToriiError::InvariantViolation(_)));
}

#[test]
fn failed_registration_is_not_tracked() {
    let api = Arc::new(MockNative::new());
    api.fail("client_on_entity_state_update", "too many subscriptions");
    let mut backend = connect(&api);

    let err = backend
        .on_entity_state_update(&[felt(1)], torii_client::Delivery::inline(|_| {}))
        .unwrap_err();

    assert!(matches!(err, ToriiError::RemoteCall(_)));
    assert_eq!(backend.registration_count(), 0);
    assert_eq!(api.subscription_count(), 0);
}

#[test]
fn disconnect_cancels_registrations_before_freeing_client() {
    let api = Arc::new(MockNative::new());
    let mut backend = connect(&api);
    backend
        .on_entity_state_update(&[felt(1)], torii_client::Delivery::inline(|_| {}))
        .unwrap();
    backend
        .on_sync_model_update(&position_query(1), torii_client::Delivery::inline(|_| {}))
        .unwrap();
    assert_eq!(api.subscription_count(), 2);

    backend.disconnect().unwrap();

    let calls = api.calls();
    let free_at = calls.iter().position(|c| *c == "client_free").unwrap();
    let cancels: Vec<usize> = calls
        .iter()
        .enumerate()
        .filter(|(_, c)| **c == "subscription_cancel")
        .map(|(i, _)| i)
        .collect();
    assert_eq!(cancels.len(), 2);
    assert!(cancels.iter().all(|i| *i < free_at));
    assert_eq!(api.subscription_count(), 0);
    assert_eq!(backend.registration_count(), 0);
}

#[test]
fn drop_cancels_registrations_before_freeing_client() {
    let api = Arc::new(MockNative::new());
    let mut backend = connect(&api);
    backend
        .on_entity_state_update(&[], torii_client::Delivery::inline(|_| {}))
        .unwrap();

    drop(backend);

    let calls = api.calls();
    assert_eq!(
        &calls[calls.len() - 2..],
        &["subscription_cancel", "client_free"]
    );
}

// ── Raw callbacks ────────────────────────────────────────────────

struct RawSink {
    api: Arc<MockNative>,
    seen: Mutex<Vec<([u8; 32], usize)>>,
}

unsafe extern "C" fn raw_entity_callback(
    ctx: *mut c_void,
    key: CFieldElement,
    models: CArray<CModel>,
) {
    let sink = unsafe { &*(ctx as *const RawSink) };
    sink.seen.lock().unwrap().push((key.data, models.data_len));
    unsafe { sink.api.models_free(models) };
}

unsafe extern "C" fn raw_sync_callback(ctx: *mut c_void) {
    let counter = unsafe { &*(ctx as *const AtomicUsize) };
    counter.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn raw_entity_callback_owns_native_array() {
    let api = Arc::new(MockNative::new());
    let mut backend = connect(&api);
    let sink = Box::new(RawSink {
        api: Arc::clone(&api),
        seen: Mutex::new(Vec::new()),
    });
    let ctx = &*sink as *const RawSink as *mut c_void;

    let id = unsafe { backend.on_entity_state_update_raw(&[felt(5)], raw_entity_callback, ctx) }
        .unwrap();
    assert_eq!(api.emit_entity_update(felt(5), &[position(5, 1, 1), moves(5, 3)]), 1);
    assert_eq!(api.emit_entity_update(felt(6), &[position(6, 1, 1)]), 0);

    backend.unregister(id).unwrap();
    assert_eq!(api.emit_entity_update(felt(5), &[position(5, 1, 1)]), 0);

    assert_eq!(*sink.seen.lock().unwrap(), vec![(felt(5).to_bytes_be(), 2)]);
    assert_eq!(api.allocations(), api.releases());
}

#[test]
fn raw_sync_model_callback() {
    let api = Arc::new(MockNative::new());
    let mut backend = connect(&api);
    let counter = Box::new(AtomicUsize::new(0));
    let ctx = &*counter as *const AtomicUsize as *mut c_void;

    unsafe { backend.on_sync_model_update_raw(&position_query(1), raw_sync_callback, ctx) }
        .unwrap();
    api.emit_sync_model_update(&position_query(1));
    api.emit_sync_model_update(&position_query(1));
    api.emit_sync_model_update(&position_query(2));

    backend.disconnect().unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}
