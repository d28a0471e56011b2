//! In-process stand-in for the native library.
//!
//! [`MockNative`] implements [`NativeApi`] on the Rust heap and counts every
//! allocation it hands out and every release it receives, so tests can assert
//! that each native buffer is freed exactly once. Registered callbacks are
//! invoked by [`MockNative::emit_entity_update`] and
//! [`MockNative::emit_sync_model_update`], from whatever thread calls them.
//!
//! Emitting holds the subscription table lock for the duration of the
//! callbacks, so `subscription_cancel` blocks until in-flight invocations
//! return. Inline handlers must therefore not register or cancel
//! subscriptions on the same mock.
//!
//! Misuse (double free, cancelling twice, calls on a freed client) panics.

use crate::ffi::{
    CArray, CEntity, CEnum, CEnumOption, CError, CFieldElement, CKeysClause, CMember, CModel,
    CModelMetadata, COption, CPrimitive, CQuery, CResult, CStruct, CTy, CWorldMetadata,
    EntityUpdateFn, NativeApi, NativeClient, NativeSubscription, SyncModelUpdateFn,
};
use crate::wire::{felt_from_c, felt_to_c, keys_clause_from_c, primitive_to_c, query_from_c};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ffi::{CStr, CString, c_char, c_void};
use std::ptr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use torii_types::{
    Entity, FieldElement, KeysClause, Member, Model, ModelMetadata, Query, Ty, WorldMetadata,
};

const CORRUPT_KEY: CFieldElement = CFieldElement { data: [0xff; 32] };

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The urls and world a client was created with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectArgs {
    pub torii_url: String,
    pub rpc_url: String,
    pub world_address: String,
}

#[derive(Default)]
struct MockState {
    reject_connect: Option<String>,
    last_connect: Option<ConnectArgs>,
    models: HashMap<KeysClause, Ty>,
    entities: Vec<Entity>,
    metadata: Option<WorldMetadata>,
    synced: Vec<KeysClause>,
    failures: HashMap<&'static str, String>,
    declines: HashSet<&'static str>,
    live_clients: HashSet<usize>,
    started: usize,
    last_query: Option<Query>,
    corrupt_felts: bool,
}

enum Filter {
    Entity {
        keys: Vec<FieldElement>,
        callback: EntityUpdateFn,
    },
    SyncModel {
        model: KeysClause,
        callback: SyncModelUpdateFn,
    },
}

struct MockSubscription {
    client: usize,
    filter: Filter,
    ctx: SendPtr,
}

struct SendPtr(*mut c_void);

// SAFETY: callback contexts are required to be usable from any thread.
unsafe impl Send for SendPtr {}

/// Instrumented fake of the native Torii library.
#[derive(Default)]
pub struct MockNative {
    state: Mutex<MockState>,
    subscriptions: Mutex<BTreeMap<u64, MockSubscription>>,
    next_client: AtomicUsize,
    next_subscription: AtomicU64,
    allocations: AtomicUsize,
    releases: AtomicUsize,
    clients_created: AtomicUsize,
    clients_freed: AtomicUsize,
    calls: Mutex<Vec<&'static str>>,
}

impl MockNative {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Scripting ────────────────────────────────────────────────

    /// Makes the next `client_new` calls fail with `message`.
    pub fn reject_connect(&self, message: impl Into<String>) {
        lock(&self.state).reject_connect = Some(message.into());
    }

    /// Serves `ty` for lookups with exactly this clause.
    pub fn insert_model(&self, query: KeysClause, ty: Ty) {
        lock(&self.state).models.insert(query, ty);
    }

    pub fn set_entities(&self, entities: Vec<Entity>) {
        lock(&self.state).entities = entities;
    }

    pub fn set_metadata(&self, metadata: WorldMetadata) {
        lock(&self.state).metadata = Some(metadata);
    }

    /// Makes `operation` (e.g. `"client_model"`) return a native error.
    pub fn fail(&self, operation: &'static str, message: impl Into<String>) {
        lock(&self.state).failures.insert(operation, message.into());
    }

    /// Makes `operation` succeed with `false`.
    pub fn decline(&self, operation: &'static str) {
        lock(&self.state).declines.insert(operation);
    }

    /// Hands out a field element outside the field in entity keys, model
    /// values, synced clauses and emitted updates, so decoding them fails
    /// after the valid part has been copied.
    pub fn corrupt_felts(&self, corrupt: bool) {
        lock(&self.state).corrupt_felts = corrupt;
    }

    pub fn clear_failure(&self, operation: &'static str) {
        let mut state = lock(&self.state);
        state.failures.remove(operation);
        state.declines.remove(operation);
    }

    // ── Inspection ───────────────────────────────────────────────

    /// Buffers handed to the caller, including error messages.
    pub fn allocations(&self) -> usize {
        self.allocations.load(Ordering::SeqCst)
    }

    /// Buffers handed back through a `*_free` call.
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn outstanding(&self) -> usize {
        self.allocations() - self.releases()
    }

    pub fn clients_created(&self) -> usize {
        self.clients_created.load(Ordering::SeqCst)
    }

    pub fn clients_freed(&self) -> usize {
        self.clients_freed.load(Ordering::SeqCst)
    }

    /// How many times `operation` was called.
    pub fn call_count(&self, operation: &str) -> usize {
        lock(&self.calls).iter().filter(|c| **c == operation).count()
    }

    /// Every boundary call so far, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        lock(&self.calls).clone()
    }

    /// Total boundary calls, frees included.
    pub fn total_calls(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Live (not cancelled) subscriptions.
    pub fn subscription_count(&self) -> usize {
        lock(&self.subscriptions).len()
    }

    pub fn start_count(&self) -> usize {
        lock(&self.state).started
    }

    pub fn synced_models(&self) -> Vec<KeysClause> {
        lock(&self.state).synced.clone()
    }

    pub fn last_query(&self) -> Option<Query> {
        lock(&self.state).last_query.clone()
    }

    pub fn last_connect(&self) -> Option<ConnectArgs> {
        lock(&self.state).last_connect.clone()
    }

    // ── Push notifications ───────────────────────────────────────

    /// Invokes every entity callback whose key filter matches `key`.
    ///
    /// An empty filter matches every key. Each invocation receives its own
    /// freshly allocated model array. Returns the number of invocations.
    pub fn emit_entity_update(&self, key: FieldElement, models: &[Model]) -> usize {
        let (live, corrupt) = {
            let state = lock(&self.state);
            (state.live_clients.clone(), state.corrupt_felts)
        };
        let c_key = if corrupt { CORRUPT_KEY } else { felt_to_c(&key) };
        let subscriptions = lock(&self.subscriptions);
        let mut invoked = 0;
        for subscription in subscriptions.values() {
            if !live.contains(&subscription.client) {
                continue;
            }
            if let Filter::Entity { keys, callback } = &subscription.filter {
                if !keys.is_empty() && !keys.contains(&key) {
                    continue;
                }
                let array = self.hand_out(c_array(models.iter().map(model_to_c).collect()));
                unsafe { (*callback)(subscription.ctx.0, c_key, array) };
                invoked += 1;
            }
        }
        invoked
    }

    /// Invokes every sync-model callback registered for `model`.
    pub fn emit_sync_model_update(&self, model: &KeysClause) -> usize {
        let live = lock(&self.state).live_clients.clone();
        let subscriptions = lock(&self.subscriptions);
        let mut invoked = 0;
        for subscription in subscriptions.values() {
            if !live.contains(&subscription.client) {
                continue;
            }
            if let Filter::SyncModel { model: filter, callback } = &subscription.filter {
                if filter != model {
                    continue;
                }
                unsafe { (*callback)(subscription.ctx.0) };
                invoked += 1;
            }
        }
        invoked
    }

    // ── Internals ────────────────────────────────────────────────

    fn record(&self, operation: &'static str) {
        lock(&self.calls).push(operation);
    }

    fn hand_out<T>(&self, value: T) -> T {
        self.allocations.fetch_add(1, Ordering::SeqCst);
        value
    }

    fn take_back(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }

    fn error(&self, message: &str) -> CError {
        self.hand_out(CError {
            message: c_string(message),
        })
    }

    /// Returns the scripted outcome for `operation`, if any.
    fn scripted<T>(&self, operation: &'static str, declined: T) -> Option<CResult<T>> {
        let state = lock(&self.state);
        if let Some(message) = state.failures.get(operation) {
            let message = message.clone();
            drop(state);
            return Some(CResult::Err(self.error(&message)));
        }
        if state.declines.contains(operation) {
            return Some(CResult::Ok(declined));
        }
        None
    }

    fn check_client(&self, client: *mut NativeClient) -> usize {
        let id = client as usize;
        assert!(
            lock(&self.state).live_clients.contains(&id),
            "call on a freed or unknown client"
        );
        id
    }

    fn subscribe(
        &self,
        client: usize,
        filter: Filter,
        ctx: *mut c_void,
    ) -> *mut NativeSubscription {
        let id = self.next_subscription.fetch_add(1, Ordering::SeqCst) + 1;
        lock(&self.subscriptions).insert(
            id,
            MockSubscription {
                client,
                filter,
                ctx: SendPtr(ctx),
            },
        );
        id as usize as *mut NativeSubscription
    }
}

unsafe impl NativeApi for MockNative {
    unsafe fn client_new(
        &self,
        torii_url: *const c_char,
        rpc_url: *const c_char,
        world: *const c_char,
    ) -> CResult<*mut NativeClient> {
        self.record("client_new");
        let args = ConnectArgs {
            torii_url: unsafe { read_str(torii_url) },
            rpc_url: unsafe { read_str(rpc_url) },
            world_address: unsafe { read_str(world) },
        };
        let mut state = lock(&self.state);
        state.last_connect = Some(args);
        if let Some(message) = state.reject_connect.clone() {
            drop(state);
            return CResult::Err(self.error(&message));
        }
        let id = self.next_client.fetch_add(1, Ordering::SeqCst) + 1;
        state.live_clients.insert(id);
        self.clients_created.fetch_add(1, Ordering::SeqCst);
        CResult::Ok(id as *mut NativeClient)
    }

    unsafe fn client_free(&self, client: *mut NativeClient) {
        self.record("client_free");
        assert!(
            lock(&self.state).live_clients.remove(&(client as usize)),
            "client freed twice"
        );
        self.clients_freed.fetch_add(1, Ordering::SeqCst);
    }

    unsafe fn client_metadata(&self, client: *mut NativeClient) -> CResult<*mut CWorldMetadata> {
        self.record("client_metadata");
        self.check_client(client);
        if let Some(outcome) = self.scripted("client_metadata", ptr::null_mut()) {
            return outcome;
        }
        let metadata = lock(&self.state).metadata.clone();
        match metadata {
            Some(metadata) => {
                CResult::Ok(self.hand_out(Box::into_raw(Box::new(metadata_to_c(&metadata)))))
            }
            None => CResult::Err(self.error("world metadata unavailable")),
        }
    }

    unsafe fn client_model(
        &self,
        client: *mut NativeClient,
        query: *const CKeysClause,
    ) -> CResult<COption<*mut CTy>> {
        self.record("client_model");
        self.check_client(client);
        if let Some(message) = lock(&self.state).failures.get("client_model").cloned() {
            return CResult::Err(self.error(&message));
        }
        let query = match unsafe { keys_clause_from_c(&*query) } {
            Ok(query) => query,
            Err(e) => return CResult::Err(self.error(&e.to_string())),
        };
        let (found, corrupt) = {
            let state = lock(&self.state);
            (state.models.get(&query).cloned(), state.corrupt_felts)
        };
        match found {
            Some(ty) => {
                let mut c_ty = ty_to_c(&ty);
                if corrupt {
                    c_ty = CTy::Tuple(c_array(vec![
                        c_ty,
                        CTy::Primitive(CPrimitive::Felt252(CORRUPT_KEY)),
                    ]));
                }
                CResult::Ok(COption::Some(self.hand_out(Box::into_raw(Box::new(c_ty)))))
            }
            None => CResult::Ok(COption::None),
        }
    }

    unsafe fn client_entities(
        &self,
        client: *mut NativeClient,
        query: *const CQuery,
    ) -> CResult<CArray<CEntity>> {
        self.record("client_entities");
        self.check_client(client);
        if let Some(message) = lock(&self.state).failures.get("client_entities").cloned() {
            return CResult::Err(self.error(&message));
        }
        let query = match unsafe { query_from_c(&*query) } {
            Ok(query) => query,
            Err(e) => return CResult::Err(self.error(&e.to_string())),
        };
        let mut state = lock(&self.state);
        let mut page: Vec<CEntity> = state
            .entities
            .iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .map(entity_to_c)
            .collect();
        if state.corrupt_felts {
            if let Some(last) = page.last_mut() {
                last.hashed_keys = CORRUPT_KEY;
            }
        }
        state.last_query = Some(query);
        drop(state);
        CResult::Ok(self.hand_out(c_array(page)))
    }

    unsafe fn client_subscribed_models(
        &self,
        client: *mut NativeClient,
    ) -> CResult<CArray<CKeysClause>> {
        self.record("client_subscribed_models");
        self.check_client(client);
        if let Some(message) = lock(&self.state)
            .failures
            .get("client_subscribed_models")
            .cloned()
        {
            return CResult::Err(self.error(&message));
        }
        let state = lock(&self.state);
        let mut synced: Vec<CKeysClause> = state.synced.iter().map(keys_clause_to_c).collect();
        if state.corrupt_felts {
            synced.push(CKeysClause {
                model: c_string("corrupt-Clause"),
                keys: c_array(vec![CORRUPT_KEY]),
            });
        }
        drop(state);
        CResult::Ok(self.hand_out(c_array(synced)))
    }

    unsafe fn client_add_models_to_sync(
        &self,
        client: *mut NativeClient,
        models: *const CKeysClause,
        models_len: usize,
    ) -> CResult<bool> {
        self.record("client_add_models_to_sync");
        self.check_client(client);
        if let Some(outcome) = self.scripted("client_add_models_to_sync", false) {
            return outcome;
        }
        let models = match unsafe { read_clauses(models, models_len) } {
            Ok(models) => models,
            Err(message) => return CResult::Err(self.error(&message)),
        };
        let mut state = lock(&self.state);
        for model in models {
            if !state.synced.contains(&model) {
                state.synced.push(model);
            }
        }
        CResult::Ok(true)
    }

    unsafe fn client_remove_models_to_sync(
        &self,
        client: *mut NativeClient,
        models: *const CKeysClause,
        models_len: usize,
    ) -> CResult<bool> {
        self.record("client_remove_models_to_sync");
        self.check_client(client);
        if let Some(outcome) = self.scripted("client_remove_models_to_sync", false) {
            return outcome;
        }
        let models = match unsafe { read_clauses(models, models_len) } {
            Ok(models) => models,
            Err(message) => return CResult::Err(self.error(&message)),
        };
        lock(&self.state).synced.retain(|m| !models.contains(m));
        CResult::Ok(true)
    }

    unsafe fn client_start_subscription(&self, client: *mut NativeClient) -> CResult<bool> {
        self.record("client_start_subscription");
        self.check_client(client);
        if let Some(outcome) = self.scripted("client_start_subscription", false) {
            return outcome;
        }
        lock(&self.state).started += 1;
        CResult::Ok(true)
    }

    unsafe fn client_on_entity_state_update(
        &self,
        client: *mut NativeClient,
        keys: *const CFieldElement,
        keys_len: usize,
        callback: EntityUpdateFn,
        ctx: *mut c_void,
    ) -> CResult<*mut NativeSubscription> {
        self.record("client_on_entity_state_update");
        let client = self.check_client(client);
        if let Some(message) = lock(&self.state)
            .failures
            .get("client_on_entity_state_update")
            .cloned()
        {
            return CResult::Err(self.error(&message));
        }
        let raw = if keys_len == 0 {
            &[][..]
        } else {
            unsafe { std::slice::from_raw_parts(keys, keys_len) }
        };
        let keys = match raw.iter().map(felt_from_c).collect::<Result<Vec<_>, _>>() {
            Ok(keys) => keys,
            Err(e) => return CResult::Err(self.error(&e.to_string())),
        };
        CResult::Ok(self.subscribe(client, Filter::Entity { keys, callback }, ctx))
    }

    unsafe fn client_on_sync_model_update(
        &self,
        client: *mut NativeClient,
        model: *const CKeysClause,
        callback: SyncModelUpdateFn,
        ctx: *mut c_void,
    ) -> CResult<*mut NativeSubscription> {
        self.record("client_on_sync_model_update");
        let client = self.check_client(client);
        if let Some(message) = lock(&self.state)
            .failures
            .get("client_on_sync_model_update")
            .cloned()
        {
            return CResult::Err(self.error(&message));
        }
        let model = match unsafe { keys_clause_from_c(&*model) } {
            Ok(model) => model,
            Err(e) => return CResult::Err(self.error(&e.to_string())),
        };
        CResult::Ok(self.subscribe(client, Filter::SyncModel { model, callback }, ctx))
    }

    unsafe fn subscription_cancel(&self, subscription: *mut NativeSubscription) {
        self.record("subscription_cancel");
        let id = subscription as usize as u64;
        assert!(
            lock(&self.subscriptions).remove(&id).is_some(),
            "subscription cancelled twice"
        );
    }

    unsafe fn world_metadata_free(&self, metadata: *mut CWorldMetadata) {
        self.record("world_metadata_free");
        self.take_back();
        unsafe { free_metadata(*Box::from_raw(metadata)) };
    }

    unsafe fn ty_free(&self, ty: *mut CTy) {
        self.record("ty_free");
        self.take_back();
        unsafe { free_ty(*Box::from_raw(ty)) };
    }

    unsafe fn entities_free(&self, entities: CArray<CEntity>) {
        self.record("entities_free");
        self.take_back();
        for entity in unsafe { take_array(entities) } {
            unsafe { free_models(entity.models) };
        }
    }

    unsafe fn keys_clauses_free(&self, clauses: CArray<CKeysClause>) {
        self.record("keys_clauses_free");
        self.take_back();
        for clause in unsafe { take_array(clauses) } {
            unsafe { free_keys_clause(clause) };
        }
    }

    unsafe fn models_free(&self, models: CArray<CModel>) {
        self.record("models_free");
        self.take_back();
        unsafe { free_models(models) };
    }

    unsafe fn error_free(&self, error: CError) {
        self.record("error_free");
        self.take_back();
        unsafe { free_string(error.message) };
    }
}

// ── Heap encoding ────────────────────────────────────────────────

fn c_string(s: &str) -> *const c_char {
    CString::new(s.replace('\0', "")).unwrap_or_default().into_raw()
}

unsafe fn read_str(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

unsafe fn read_clauses(models: *const CKeysClause, len: usize) -> Result<Vec<KeysClause>, String> {
    if len == 0 {
        return Ok(Vec::new());
    }
    unsafe { std::slice::from_raw_parts(models, len) }
        .iter()
        .map(|clause| unsafe { keys_clause_from_c(clause) }.map_err(|e| e.to_string()))
        .collect()
}

fn c_array<T>(items: Vec<T>) -> CArray<T> {
    let boxed = items.into_boxed_slice();
    let data_len = boxed.len();
    CArray {
        data: Box::into_raw(boxed).cast::<T>(),
        data_len,
    }
}

fn boxed_ty(ty: &Ty) -> *mut CTy {
    Box::into_raw(Box::new(ty_to_c(ty)))
}

fn ty_to_c(ty: &Ty) -> CTy {
    match ty {
        Ty::Primitive(p) => CTy::Primitive(primitive_to_c(p)),
        Ty::Struct(s) => CTy::Struct(CStruct {
            name: c_string(&s.name),
            children: c_array(s.children.iter().map(member_to_c).collect()),
        }),
        Ty::Enum(e) => CTy::Enum(CEnum {
            name: c_string(&e.name),
            option: e.option,
            options: c_array(
                e.options
                    .iter()
                    .map(|option| CEnumOption {
                        name: c_string(&option.name),
                        ty: boxed_ty(&option.ty),
                    })
                    .collect(),
            ),
        }),
        Ty::Tuple(items) => CTy::Tuple(c_array(items.iter().map(ty_to_c).collect())),
        Ty::ByteArray(s) => CTy::ByteArray(c_string(s)),
    }
}

fn member_to_c(member: &Member) -> CMember {
    CMember {
        name: c_string(&member.name),
        ty: boxed_ty(&member.ty),
        key: member.key,
    }
}

fn model_to_c(model: &Model) -> CModel {
    CModel {
        name: c_string(&model.name),
        members: c_array(model.members.iter().map(member_to_c).collect()),
    }
}

fn entity_to_c(entity: &Entity) -> CEntity {
    CEntity {
        hashed_keys: felt_to_c(&entity.hashed_keys),
        models: c_array(entity.models.iter().map(model_to_c).collect()),
    }
}

fn keys_clause_to_c(clause: &KeysClause) -> CKeysClause {
    CKeysClause {
        model: c_string(&clause.model),
        keys: c_array(clause.keys.iter().map(felt_to_c).collect()),
    }
}

fn model_metadata_to_c(model: &ModelMetadata) -> CModelMetadata {
    CModelMetadata {
        name: c_string(&model.name),
        class_hash: felt_to_c(&model.class_hash),
        packed_size: model.packed_size,
        unpacked_size: model.unpacked_size,
        schema: boxed_ty(&model.schema),
    }
}

fn metadata_to_c(metadata: &WorldMetadata) -> CWorldMetadata {
    CWorldMetadata {
        world_address: felt_to_c(&metadata.world_address),
        world_class_hash: felt_to_c(&metadata.world_class_hash),
        models: c_array(metadata.models.iter().map(model_metadata_to_c).collect()),
    }
}

// ── Heap release ─────────────────────────────────────────────────

unsafe fn take_array<T>(array: CArray<T>) -> Vec<T> {
    if array.data.is_null() {
        return Vec::new();
    }
    unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(array.data, array.data_len)) }.into_vec()
}

unsafe fn free_string(ptr: *const c_char) {
    if !ptr.is_null() {
        drop(unsafe { CString::from_raw(ptr.cast_mut()) });
    }
}

unsafe fn free_boxed_ty(ty: *mut CTy) {
    if !ty.is_null() {
        unsafe { free_ty(*Box::from_raw(ty)) };
    }
}

unsafe fn free_ty(ty: CTy) {
    match ty {
        CTy::Primitive(_) => {}
        CTy::Struct(s) => unsafe {
            free_string(s.name);
            free_members(s.children);
        },
        CTy::Enum(e) => unsafe {
            free_string(e.name);
            for option in take_array(e.options) {
                free_string(option.name);
                free_boxed_ty(option.ty);
            }
        },
        CTy::Tuple(items) => {
            for item in unsafe { take_array(items) } {
                unsafe { free_ty(item) };
            }
        }
        CTy::ByteArray(s) => unsafe { free_string(s) },
    }
}

unsafe fn free_members(members: CArray<CMember>) {
    for member in unsafe { take_array(members) } {
        unsafe {
            free_string(member.name);
            free_boxed_ty(member.ty);
        }
    }
}

unsafe fn free_models(models: CArray<CModel>) {
    for model in unsafe { take_array(models) } {
        unsafe {
            free_string(model.name);
            free_members(model.members);
        }
    }
}

unsafe fn free_keys_clause(clause: CKeysClause) {
    unsafe {
        free_string(clause.model);
        drop(take_array(clause.keys));
    }
}

unsafe fn free_metadata(metadata: CWorldMetadata) {
    for model in unsafe { take_array(metadata.models) } {
        unsafe {
            free_string(model.name);
            free_boxed_ty(model.schema);
        }
    }
}
