//! The public façade over a platform backend.

use crate::backend::Backend;
use crate::config::ClientConfig;
use crate::dispatch::{Delivery, RegistrationId};
use crate::error::ToriiResult;
use crate::ffi::{EntityUpdateFn, SyncModelUpdateFn};
use crate::platform::{self, Platform};
use std::ffi::c_void;
use torii_types::{Entity, FieldElement, KeysClause, Query, Ty, WorldMetadata};

/// Ordered, de-duplicated set of models the client wants synced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionSet {
    models: Vec<KeysClause>,
}

impl SubscriptionSet {
    pub fn as_slice(&self) -> &[KeysClause] {
        &self.models
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn contains(&self, model: &KeysClause) -> bool {
        self.models.contains(model)
    }

    pub(crate) fn insert_all(&mut self, models: &[KeysClause]) {
        for model in models {
            if !self.models.contains(model) {
                self.models.push(model.clone());
            }
        }
    }

    pub(crate) fn remove_all(&mut self, models: &[KeysClause]) {
        self.models.retain(|m| !models.contains(m));
    }
}

/// A connected Torii client.
///
/// Dropping it cancels every registration and releases the connection.
pub struct ToriiClient {
    backend: Box<dyn Backend>,
    models_to_sync: SubscriptionSet,
}

impl ToriiClient {
    /// Wraps an already connected backend.
    pub fn new(backend: impl Backend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            models_to_sync: SubscriptionSet::default(),
        }
    }

    /// Connects with the backend compiled in for the current platform.
    pub fn connect(config: &ClientConfig) -> ToriiResult<Self> {
        Ok(Self {
            backend: platform::connect_current(config)?,
            models_to_sync: SubscriptionSet::default(),
        })
    }

    pub fn platform(&self) -> Platform {
        self.backend.platform()
    }

    pub fn is_connected(&self) -> bool {
        self.backend.is_connected()
    }

    pub fn world_metadata(&self) -> ToriiResult<WorldMetadata> {
        self.backend.world_metadata()
    }

    /// Looks up one model. `Ok(None)` when it does not exist.
    pub async fn model(&self, query: &KeysClause) -> ToriiResult<Option<Ty>> {
        self.backend.model(query).await
    }

    pub async fn entities(&self, query: &Query) -> ToriiResult<Vec<Entity>> {
        self.backend.entities(query).await
    }

    /// What the remote reports as synced.
    pub async fn subscribed_models(&self) -> ToriiResult<Vec<KeysClause>> {
        self.backend.subscribed_models().await
    }

    /// The locally committed sync set. Only updated after the remote accepted
    /// a change.
    pub fn models_to_sync(&self) -> &SubscriptionSet {
        &self.models_to_sync
    }

    pub async fn add_models_to_sync(&mut self, models: &[KeysClause]) -> ToriiResult<()> {
        self.backend.add_models_to_sync(models).await?;
        self.models_to_sync.insert_all(models);
        Ok(())
    }

    pub async fn remove_models_to_sync(&mut self, models: &[KeysClause]) -> ToriiResult<()> {
        self.backend.remove_models_to_sync(models).await?;
        self.models_to_sync.remove_all(models);
        Ok(())
    }

    pub async fn start_subscription(&mut self) -> ToriiResult<()> {
        self.backend.start_subscription().await
    }

    pub fn on_entity_state_update(
        &mut self,
        keys: &[FieldElement],
        delivery: Delivery,
    ) -> ToriiResult<RegistrationId> {
        self.backend.on_entity_state_update(keys, delivery)
    }

    pub fn on_sync_model_update(
        &mut self,
        model: &KeysClause,
        delivery: Delivery,
    ) -> ToriiResult<RegistrationId> {
        self.backend.on_sync_model_update(model, delivery)
    }

    /// # Safety
    /// See [`NativeBackend::on_entity_state_update_raw`](crate::native::NativeBackend::on_entity_state_update_raw).
    pub unsafe fn on_entity_state_update_raw(
        &mut self,
        keys: &[FieldElement],
        callback: EntityUpdateFn,
        ctx: *mut c_void,
    ) -> ToriiResult<RegistrationId> {
        unsafe { self.backend.on_entity_state_update_raw(keys, callback, ctx) }
    }

    /// # Safety
    /// See [`NativeBackend::on_sync_model_update_raw`](crate::native::NativeBackend::on_sync_model_update_raw).
    pub unsafe fn on_sync_model_update_raw(
        &mut self,
        model: &KeysClause,
        callback: SyncModelUpdateFn,
        ctx: *mut c_void,
    ) -> ToriiResult<RegistrationId> {
        unsafe { self.backend.on_sync_model_update_raw(model, callback, ctx) }
    }

    pub fn unregister(&mut self, id: RegistrationId) -> ToriiResult<()> {
        self.backend.unregister(id)
    }

    pub fn registration_count(&self) -> usize {
        self.backend.registration_count()
    }

    pub fn disconnect(&mut self) -> ToriiResult<()> {
        self.backend.disconnect()
    }
}
