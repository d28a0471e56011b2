//! Native backend: the C library behind [`NativeApi`].
//!
//! All calls block the calling thread for the FFI round trip. Returned
//! buffers are deep-copied into owned values and handed back to the library
//! before the call returns, on success and error paths alike.
//!
//! Callbacks run on the library's threads. Each registration owns the
//! context its trampoline reads; the context is freed only after
//! `subscription_cancel` has returned.

mod callbacks;
mod connection;
mod guard;
pub mod mock;

use crate::backend::Backend;
use crate::config::ClientConfig;
use crate::dispatch::{Delivery, RegistrationId, RegistrationIds};
use crate::error::{ToriiError, ToriiResult};
use crate::ffi::{
    CFieldElement, COption, CResult, EntityUpdateFn, NativeApi, NativeSubscription,
    SyncModelUpdateFn,
};
use crate::platform::Platform;
use crate::wire::{
    WireArena, entity_from_c, felt_to_c, keys_clause_from_c, slice_from_c, ty_ptr_from_c,
    world_metadata_from_c,
};
use async_trait::async_trait;
use callbacks::{
    CallbackSlot, EntityCallbackState, Registration, SyncModelCallbackState,
    entity_update_trampoline, sync_model_update_trampoline,
};
use connection::NativeConnection;
use guard::{NativeGuard, take_error};
use std::collections::HashMap;
use std::ffi::c_void;
use std::sync::Arc;
use torii_types::{Entity, FieldElement, KeysClause, Query, Ty, WorldMetadata};
use tracing::{debug, info};

/// A client connected through the native library.
///
/// `Send` but not `Sync`: calls on one client must not overlap.
pub struct NativeBackend<N: NativeApi> {
    registrations: HashMap<RegistrationId, Registration<N>>,
    connection: NativeConnection<N>,
    api: Arc<N>,
    ids: RegistrationIds,
    subscription_started: bool,
}

impl<N: NativeApi> NativeBackend<N> {
    /// Opens a native client. Blocks for the connection handshake.
    pub fn connect(api: Arc<N>, config: &ClientConfig) -> ToriiResult<Self> {
        let connection = NativeConnection::open(Arc::clone(&api), config)?;
        Ok(Self {
            registrations: HashMap::new(),
            connection,
            api,
            ids: RegistrationIds::default(),
            subscription_started: false,
        })
    }

    /// The function table this client calls through.
    pub fn api(&self) -> &Arc<N> {
        &self.api
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_open()
    }

    pub fn registration_count(&self) -> usize {
        self.registrations.len()
    }

    fn check<T>(&self, result: CResult<T>) -> ToriiResult<T> {
        match result {
            CResult::Ok(value) => Ok(value),
            CResult::Err(error) => {
                let message = unsafe { take_error(self.api.as_ref(), error) };
                Err(ToriiError::RemoteCall(message))
            }
        }
    }

    fn accepted(operation: &str, accepted: bool) -> ToriiResult<()> {
        if accepted {
            Ok(())
        } else {
            Err(ToriiError::RemoteCall(format!(
                "{operation} was declined by the remote"
            )))
        }
    }

    pub fn world_metadata(&self) -> ToriiResult<WorldMetadata> {
        let client = self.connection.handle()?;
        let metadata = self.check(unsafe { self.api.client_metadata(client) })?;
        let guard = unsafe { NativeGuard::new(self.api.as_ref(), metadata) };
        let metadata = *guard.get();
        if metadata.is_null() {
            return Err(ToriiError::Decode("null world metadata".into()));
        }
        unsafe { world_metadata_from_c(&*metadata) }
    }

    pub fn model(&self, query: &KeysClause) -> ToriiResult<Option<Ty>> {
        let client = self.connection.handle()?;
        let mut arena = WireArena::new();
        let clause = arena.keys_clause(query)?;

        match self.check(unsafe { self.api.client_model(client, &clause) })? {
            COption::None => Ok(None),
            COption::Some(ty) => {
                let guard = unsafe { NativeGuard::new(self.api.as_ref(), ty) };
                unsafe { ty_ptr_from_c(*guard.get()) }.map(Some)
            }
        }
    }

    pub fn entities(&self, query: &Query) -> ToriiResult<Vec<Entity>> {
        let client = self.connection.handle()?;
        let mut arena = WireArena::new();
        let c_query = arena.query(query)?;

        let array = self.check(unsafe { self.api.client_entities(client, &c_query) })?;
        let guard = unsafe { NativeGuard::new(self.api.as_ref(), array) };
        let entities = unsafe { slice_from_c(guard.get())? }
            .iter()
            .map(|entity| unsafe { entity_from_c(entity) })
            .collect::<ToriiResult<Vec<_>>>()?;
        debug!(count = entities.len(), "fetched entities");
        Ok(entities)
    }

    pub fn subscribed_models(&self) -> ToriiResult<Vec<KeysClause>> {
        let client = self.connection.handle()?;
        let array = self.check(unsafe { self.api.client_subscribed_models(client) })?;
        let guard = unsafe { NativeGuard::new(self.api.as_ref(), array) };
        unsafe { slice_from_c(guard.get())? }
            .iter()
            .map(|clause| unsafe { keys_clause_from_c(clause) })
            .collect()
    }

    pub fn add_models_to_sync(&mut self, models: &[KeysClause]) -> ToriiResult<()> {
        if models.is_empty() {
            return Err(ToriiError::InvariantViolation(
                "add_models_to_sync needs at least one model".into(),
            ));
        }
        let client = self.connection.handle()?;
        let mut arena = WireArena::new();
        let clauses = arena.keys_clauses(models)?;

        let accepted = self.check(unsafe {
            self.api
                .client_add_models_to_sync(client, clauses.as_ptr(), clauses.len())
        })?;
        Self::accepted("add_models_to_sync", accepted)?;
        debug!(count = models.len(), "models added to sync");
        Ok(())
    }

    pub fn remove_models_to_sync(&mut self, models: &[KeysClause]) -> ToriiResult<()> {
        if models.is_empty() {
            return Err(ToriiError::InvariantViolation(
                "remove_models_to_sync needs at least one model".into(),
            ));
        }
        let client = self.connection.handle()?;
        let mut arena = WireArena::new();
        let clauses = arena.keys_clauses(models)?;

        let accepted = self.check(unsafe {
            self.api
                .client_remove_models_to_sync(client, clauses.as_ptr(), clauses.len())
        })?;
        Self::accepted("remove_models_to_sync", accepted)?;
        debug!(count = models.len(), "models removed from sync");
        Ok(())
    }

    pub fn start_subscription(&mut self) -> ToriiResult<()> {
        let client = self.connection.handle()?;
        if self.subscription_started {
            return Err(ToriiError::InvariantViolation(
                "subscription already started".into(),
            ));
        }
        let accepted = self.check(unsafe { self.api.client_start_subscription(client) })?;
        Self::accepted("start_subscription", accepted)?;
        self.subscription_started = true;
        info!("model subscription started");
        Ok(())
    }

    /// Subscribes to state changes of the entities with the given keys.
    ///
    /// An empty key list is passed to the library unchanged; what it
    /// matches is up to the remote.
    pub fn on_entity_state_update(
        &mut self,
        keys: &[FieldElement],
        delivery: Delivery,
    ) -> ToriiResult<RegistrationId> {
        let client = self.connection.handle()?;
        if keys.is_empty() {
            debug!("entity subscription without keys, forwarding unfiltered");
        }
        let id = self.ids.next();
        let slot = CallbackSlot::new(EntityCallbackState {
            api: Arc::clone(&self.api),
            registration: id,
            delivery,
        });
        let c_keys: Vec<CFieldElement> = keys.iter().map(felt_to_c).collect();

        let subscription = self.check(unsafe {
            self.api.client_on_entity_state_update(
                client,
                c_keys.as_ptr(),
                c_keys.len(),
                entity_update_trampoline::<N>,
                slot.context(),
            )
        })?;
        self.track(id, subscription, Some(slot))
    }

    /// Subscribes to changes of the synced model matching `model`.
    pub fn on_sync_model_update(
        &mut self,
        model: &KeysClause,
        delivery: Delivery,
    ) -> ToriiResult<RegistrationId> {
        let client = self.connection.handle()?;
        let id = self.ids.next();
        let slot = CallbackSlot::new(SyncModelCallbackState {
            registration: id,
            delivery,
        });
        let mut arena = WireArena::new();
        let clause = arena.keys_clause(model)?;

        let subscription = self.check(unsafe {
            self.api.client_on_sync_model_update(
                client,
                &clause,
                sync_model_update_trampoline,
                slot.context(),
            )
        })?;
        self.track(id, subscription, Some(slot))
    }

    /// Registers a caller-supplied callback with no copying or dispatch.
    ///
    /// # Safety
    /// - `ctx` must stay valid until [`unregister`](Self::unregister) or
    ///   [`disconnect`](Self::disconnect) for this registration returns, and
    ///   be safe to use from any thread.
    /// - `callback` owns each model array it receives and must release it
    ///   exactly once through [`NativeApi::models_free`] on the same library.
    /// - `callback` must not unwind.
    pub unsafe fn on_entity_state_update_raw(
        &mut self,
        keys: &[FieldElement],
        callback: EntityUpdateFn,
        ctx: *mut c_void,
    ) -> ToriiResult<RegistrationId> {
        let client = self.connection.handle()?;
        let id = self.ids.next();
        let c_keys: Vec<CFieldElement> = keys.iter().map(felt_to_c).collect();

        let subscription = self.check(unsafe {
            self.api
                .client_on_entity_state_update(client, c_keys.as_ptr(), c_keys.len(), callback, ctx)
        })?;
        self.track(id, subscription, None)
    }

    /// Registers a caller-supplied sync-model callback.
    ///
    /// # Safety
    /// `ctx` must stay valid until the registration is cancelled, and
    /// `callback` must not unwind.
    pub unsafe fn on_sync_model_update_raw(
        &mut self,
        model: &KeysClause,
        callback: SyncModelUpdateFn,
        ctx: *mut c_void,
    ) -> ToriiResult<RegistrationId> {
        let client = self.connection.handle()?;
        let id = self.ids.next();
        let mut arena = WireArena::new();
        let clause = arena.keys_clause(model)?;

        let subscription = self.check(unsafe {
            self.api
                .client_on_sync_model_update(client, &clause, callback, ctx)
        })?;
        self.track(id, subscription, None)
    }

    fn track(
        &mut self,
        id: RegistrationId,
        subscription: *mut NativeSubscription,
        context: Option<CallbackSlot>,
    ) -> ToriiResult<RegistrationId> {
        if subscription.is_null() {
            return Err(ToriiError::RemoteCall(
                "library returned a null subscription".into(),
            ));
        }
        self.registrations.insert(
            id,
            Registration::new(Arc::clone(&self.api), id, subscription, context),
        );
        debug!(registration = %id, "callback registered");
        Ok(id)
    }

    /// Cancels one registration. Blocks until an in-flight callback finishes.
    pub fn unregister(&mut self, id: RegistrationId) -> ToriiResult<()> {
        self.connection.handle()?;
        match self.registrations.remove(&id) {
            Some(registration) => {
                drop(registration);
                Ok(())
            }
            None => Err(ToriiError::InvariantViolation(format!(
                "unknown registration {id}"
            ))),
        }
    }

    /// Cancels every registration, then frees the native client.
    pub fn disconnect(&mut self) -> ToriiResult<()> {
        if !self.connection.is_open() {
            return Err(ToriiError::disconnected());
        }
        let cancelled = self.registrations.len();
        self.registrations.clear();
        self.connection.release();
        info!(cancelled, "torii client disconnected");
        Ok(())
    }
}

impl<N: NativeApi> Drop for NativeBackend<N> {
    fn drop(&mut self) {
        self.registrations.clear();
        self.connection.release();
    }
}

#[async_trait(?Send)]
impl<N: NativeApi> Backend for NativeBackend<N> {
    fn platform(&self) -> Platform {
        Platform::Native
    }

    fn is_connected(&self) -> bool {
        NativeBackend::is_connected(self)
    }

    fn world_metadata(&self) -> ToriiResult<WorldMetadata> {
        NativeBackend::world_metadata(self)
    }

    async fn model(&self, query: &KeysClause) -> ToriiResult<Option<Ty>> {
        NativeBackend::model(self, query)
    }

    async fn entities(&self, query: &Query) -> ToriiResult<Vec<Entity>> {
        NativeBackend::entities(self, query)
    }

    async fn subscribed_models(&self) -> ToriiResult<Vec<KeysClause>> {
        NativeBackend::subscribed_models(self)
    }

    async fn add_models_to_sync(&mut self, models: &[KeysClause]) -> ToriiResult<()> {
        NativeBackend::add_models_to_sync(self, models)
    }

    async fn remove_models_to_sync(&mut self, models: &[KeysClause]) -> ToriiResult<()> {
        NativeBackend::remove_models_to_sync(self, models)
    }

    async fn start_subscription(&mut self) -> ToriiResult<()> {
        NativeBackend::start_subscription(self)
    }

    fn on_entity_state_update(
        &mut self,
        keys: &[FieldElement],
        delivery: Delivery,
    ) -> ToriiResult<RegistrationId> {
        NativeBackend::on_entity_state_update(self, keys, delivery)
    }

    fn on_sync_model_update(
        &mut self,
        model: &KeysClause,
        delivery: Delivery,
    ) -> ToriiResult<RegistrationId> {
        NativeBackend::on_sync_model_update(self, model, delivery)
    }

    unsafe fn on_entity_state_update_raw(
        &mut self,
        keys: &[FieldElement],
        callback: EntityUpdateFn,
        ctx: *mut c_void,
    ) -> ToriiResult<RegistrationId> {
        unsafe { NativeBackend::on_entity_state_update_raw(self, keys, callback, ctx) }
    }

    unsafe fn on_sync_model_update_raw(
        &mut self,
        model: &KeysClause,
        callback: SyncModelUpdateFn,
        ctx: *mut c_void,
    ) -> ToriiResult<RegistrationId> {
        unsafe { NativeBackend::on_sync_model_update_raw(self, model, callback, ctx) }
    }

    fn unregister(&mut self, id: RegistrationId) -> ToriiResult<()> {
        NativeBackend::unregister(self, id)
    }

    fn registration_count(&self) -> usize {
        NativeBackend::registration_count(self)
    }

    fn disconnect(&mut self) -> ToriiResult<()> {
        NativeBackend::disconnect(self)
    }
}
