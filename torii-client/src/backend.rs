//! The capability set every platform backend provides.

use crate::dispatch::{Delivery, RegistrationId};
use crate::error::{ToriiError, ToriiResult};
use crate::ffi::{EntityUpdateFn, SyncModelUpdateFn};
use crate::platform::Platform;
use async_trait::async_trait;
use std::ffi::c_void;
use torii_types::{Entity, FieldElement, KeysClause, Query, Ty, WorldMetadata};

/// A connected Torii backend.
///
/// Query calls are `async` because the browser backend awaits the JS side;
/// the native backend completes them on first poll. Capabilities a backend
/// lacks return [`ToriiError::UnsupportedPlatform`] while connected and
/// `InvariantViolation` after disconnect, like every other operation.
#[async_trait(?Send)]
pub trait Backend {
    fn platform(&self) -> Platform;

    fn is_connected(&self) -> bool;

    /// World address, class hash and model schemas.
    fn world_metadata(&self) -> ToriiResult<WorldMetadata> {
        Err(missing(self, "world_metadata"))
    }

    /// Looks up one model by keys. `Ok(None)` when it does not exist.
    async fn model(&self, query: &KeysClause) -> ToriiResult<Option<Ty>>;

    async fn entities(&self, query: &Query) -> ToriiResult<Vec<Entity>>;

    async fn subscribed_models(&self) -> ToriiResult<Vec<KeysClause>>;

    /// Fails with `InvariantViolation` on empty input, before any remote call.
    async fn add_models_to_sync(&mut self, models: &[KeysClause]) -> ToriiResult<()>;

    /// Fails with `InvariantViolation` on empty input, before any remote call.
    async fn remove_models_to_sync(&mut self, models: &[KeysClause]) -> ToriiResult<()>;

    /// Starts the model sync stream. A second call is an `InvariantViolation`.
    async fn start_subscription(&mut self) -> ToriiResult<()>;

    fn on_entity_state_update(
        &mut self,
        keys: &[FieldElement],
        delivery: Delivery,
    ) -> ToriiResult<RegistrationId>;

    fn on_sync_model_update(
        &mut self,
        model: &KeysClause,
        delivery: Delivery,
    ) -> ToriiResult<RegistrationId>;

    /// Registers `callback` directly with the native library.
    ///
    /// # Safety
    /// See [`NativeBackend::on_entity_state_update_raw`](crate::native::NativeBackend::on_entity_state_update_raw).
    unsafe fn on_entity_state_update_raw(
        &mut self,
        _keys: &[FieldElement],
        _callback: EntityUpdateFn,
        _ctx: *mut c_void,
    ) -> ToriiResult<RegistrationId> {
        Err(missing(self, "on_entity_state_update_raw"))
    }

    /// Registers `callback` directly with the native library.
    ///
    /// # Safety
    /// See [`NativeBackend::on_sync_model_update_raw`](crate::native::NativeBackend::on_sync_model_update_raw).
    unsafe fn on_sync_model_update_raw(
        &mut self,
        _model: &KeysClause,
        _callback: SyncModelUpdateFn,
        _ctx: *mut c_void,
    ) -> ToriiResult<RegistrationId> {
        Err(missing(self, "on_sync_model_update_raw"))
    }

    /// Cancels one registration. No event for it is delivered once this returns.
    fn unregister(&mut self, id: RegistrationId) -> ToriiResult<()>;

    fn registration_count(&self) -> usize;

    /// Cancels every registration, then releases the connection.
    fn disconnect(&mut self) -> ToriiResult<()>;
}

fn missing<B: Backend + ?Sized>(backend: &B, operation: &'static str) -> ToriiError {
    if backend.is_connected() {
        ToriiError::unsupported(backend.platform(), operation)
    } else {
        ToriiError::disconnected()
    }
}
