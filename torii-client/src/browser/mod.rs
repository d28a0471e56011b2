//! Browser backend: the Torii client running in a JS host.
//!
//! Values cross the JS boundary as JSON text through a [`BrowserBridge`].
//! The host is single-threaded, so callbacks always run on the consumer
//! thread. World metadata and raw native arrays are not available.

pub mod mock;
#[cfg(all(target_arch = "wasm32", feature = "wasm"))]
mod wasm;

#[cfg(all(target_arch = "wasm32", feature = "wasm"))]
pub use wasm::WasmBridge;

use crate::backend::Backend;
use crate::config::ClientConfig;
use crate::dispatch::{
    Delivery, DispatchedEvent, RegistrationId, RegistrationIds, ToriiEvent,
};
use crate::error::{ToriiError, ToriiResult};
use crate::platform::Platform;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use torii_types::{Entity, FieldElement, KeysClause, Model, Query, Ty};
use tracing::{debug, info, warn};

/// Handle of a client living on the JS side.
pub type ClientId = u32;

/// Handle of a callback subscription living on the JS side.
pub type SubscriptionId = u32;

/// Entity update callback: hex key and JSON-encoded `Vec<Model>`.
pub type EntityUpdateCallback = Box<dyn Fn(&str, &str)>;

/// Sync model callback.
pub type SyncModelUpdateCallback = Box<dyn Fn()>;

/// The JS interop surface. Errors are the host's message text.
#[async_trait(?Send)]
pub trait BrowserBridge {
    fn create_client(
        &self,
        torii_url: &str,
        rpc_url: &str,
        world_address: &str,
    ) -> Result<ClientId, String>;

    fn free_client(&self, client: ClientId);

    /// JSON `KeysClause` in, JSON `Ty` out, `None` when absent.
    async fn model(&self, client: ClientId, query: &str) -> Result<Option<String>, String>;

    /// JSON `Query` in, JSON `Vec<Entity>` out.
    async fn entities(&self, client: ClientId, query: &str) -> Result<String, String>;

    /// JSON `Vec<KeysClause>` out.
    async fn subscribed_models(&self, client: ClientId) -> Result<String, String>;

    async fn add_models_to_sync(&self, client: ClientId, models: &str) -> Result<(), String>;

    async fn remove_models_to_sync(&self, client: ClientId, models: &str) -> Result<(), String>;

    async fn start_subscription(&self, client: ClientId) -> Result<(), String>;

    /// JSON `Vec<FieldElement>` filter.
    fn on_entity_updated(
        &self,
        client: ClientId,
        keys: &str,
        callback: EntityUpdateCallback,
    ) -> Result<SubscriptionId, String>;

    /// JSON `KeysClause` filter.
    fn on_sync_model_updated(
        &self,
        client: ClientId,
        model: &str,
        callback: SyncModelUpdateCallback,
    ) -> Result<SubscriptionId, String>;

    /// No callback for `subscription` runs after this returns.
    fn cancel_subscription(&self, subscription: SubscriptionId);
}

fn decode<T: DeserializeOwned>(what: &str, json: &str) -> ToriiResult<T> {
    serde_json::from_str(json).map_err(|e| ToriiError::Decode(format!("{what}: {e}")))
}

fn remote<T>(result: Result<T, String>) -> ToriiResult<T> {
    result.map_err(ToriiError::RemoteCall)
}

fn decode_entity_update(key: &str, models: &str) -> ToriiResult<ToriiEvent> {
    let key = key
        .parse::<FieldElement>()
        .map_err(|e| ToriiError::Decode(format!("entity key: {e}")))?;
    let models: Vec<Model> = decode("entity models", models)?;
    Ok(ToriiEvent::EntityUpdated { key, models })
}

/// A client connected through a [`BrowserBridge`].
pub struct BrowserBackend<B: BrowserBridge> {
    bridge: B,
    client: Option<ClientId>,
    registrations: HashMap<RegistrationId, SubscriptionId>,
    ids: RegistrationIds,
    subscription_started: bool,
}

impl<B: BrowserBridge> BrowserBackend<B> {
    pub fn connect(bridge: B, config: &ClientConfig) -> ToriiResult<Self> {
        let client = bridge
            .create_client(&config.torii_url, &config.rpc_url, &config.world_address)
            .map_err(ToriiError::Connect)?;
        info!(
            torii_url = %config.torii_url,
            world = %config.world_address,
            "torii client connected"
        );
        Ok(Self {
            bridge,
            client: Some(client),
            registrations: HashMap::new(),
            ids: RegistrationIds::default(),
            subscription_started: false,
        })
    }

    pub fn bridge(&self) -> &B {
        &self.bridge
    }

    fn client(&self) -> ToriiResult<ClientId> {
        self.client.ok_or_else(ToriiError::disconnected)
    }

    fn track(&mut self, subscription: SubscriptionId, id: RegistrationId) -> RegistrationId {
        self.registrations.insert(id, subscription);
        debug!(registration = %id, "callback registered");
        id
    }

    fn cancel_all(&mut self) {
        for (_, subscription) in self.registrations.drain() {
            self.bridge.cancel_subscription(subscription);
        }
    }
}

impl<B: BrowserBridge> Drop for BrowserBackend<B> {
    fn drop(&mut self) {
        self.cancel_all();
        if let Some(client) = self.client.take() {
            self.bridge.free_client(client);
        }
    }
}

#[async_trait(?Send)]
impl<B: BrowserBridge> Backend for BrowserBackend<B> {
    fn platform(&self) -> Platform {
        Platform::Browser
    }

    fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    async fn model(&self, query: &KeysClause) -> ToriiResult<Option<Ty>> {
        let client = self.client()?;
        let query = serde_json::to_string(query)?;
        match remote(self.bridge.model(client, &query).await)? {
            Some(json) => decode("model", &json).map(Some),
            None => Ok(None),
        }
    }

    async fn entities(&self, query: &Query) -> ToriiResult<Vec<Entity>> {
        let client = self.client()?;
        let query = serde_json::to_string(query)?;
        let json = remote(self.bridge.entities(client, &query).await)?;
        decode("entities", &json)
    }

    async fn subscribed_models(&self) -> ToriiResult<Vec<KeysClause>> {
        let client = self.client()?;
        let json = remote(self.bridge.subscribed_models(client).await)?;
        decode("subscribed models", &json)
    }

    async fn add_models_to_sync(&mut self, models: &[KeysClause]) -> ToriiResult<()> {
        if models.is_empty() {
            return Err(ToriiError::InvariantViolation(
                "add_models_to_sync needs at least one model".into(),
            ));
        }
        let client = self.client()?;
        let models = serde_json::to_string(models)?;
        remote(self.bridge.add_models_to_sync(client, &models).await)
    }

    async fn remove_models_to_sync(&mut self, models: &[KeysClause]) -> ToriiResult<()> {
        if models.is_empty() {
            return Err(ToriiError::InvariantViolation(
                "remove_models_to_sync needs at least one model".into(),
            ));
        }
        let client = self.client()?;
        let models = serde_json::to_string(models)?;
        remote(self.bridge.remove_models_to_sync(client, &models).await)
    }

    async fn start_subscription(&mut self) -> ToriiResult<()> {
        let client = self.client()?;
        if self.subscription_started {
            return Err(ToriiError::InvariantViolation(
                "subscription already started".into(),
            ));
        }
        remote(self.bridge.start_subscription(client).await)?;
        self.subscription_started = true;
        info!("model subscription started");
        Ok(())
    }

    fn on_entity_state_update(
        &mut self,
        keys: &[FieldElement],
        delivery: Delivery,
    ) -> ToriiResult<RegistrationId> {
        let client = self.client()?;
        if keys.is_empty() {
            debug!("entity subscription without keys, forwarding unfiltered");
        }
        let keys = serde_json::to_string(keys)?;
        let id = self.ids.next();
        let callback: EntityUpdateCallback = Box::new(move |key: &str, models: &str| {
            match decode_entity_update(key, models) {
                Ok(event) => delivery.deliver(DispatchedEvent {
                    registration: id,
                    event,
                }),
                Err(e) => warn!(registration = %id, error = %e, "dropping malformed entity update"),
            }
        });
        let subscription = remote(self.bridge.on_entity_updated(client, &keys, callback))?;
        Ok(self.track(subscription, id))
    }

    fn on_sync_model_update(
        &mut self,
        model: &KeysClause,
        delivery: Delivery,
    ) -> ToriiResult<RegistrationId> {
        let client = self.client()?;
        let model = serde_json::to_string(model)?;
        let id = self.ids.next();
        let callback: SyncModelUpdateCallback = Box::new(move || {
            delivery.deliver(DispatchedEvent {
                registration: id,
                event: ToriiEvent::SyncModelUpdated,
            })
        });
        let subscription = remote(self.bridge.on_sync_model_updated(client, &model, callback))?;
        Ok(self.track(subscription, id))
    }

    fn unregister(&mut self, id: RegistrationId) -> ToriiResult<()> {
        self.client()?;
        let subscription = self.registrations.remove(&id).ok_or_else(|| {
            ToriiError::InvariantViolation(format!("unknown registration {id}"))
        })?;
        self.bridge.cancel_subscription(subscription);
        debug!(registration = %id, "subscription cancelled");
        Ok(())
    }

    fn registration_count(&self) -> usize {
        self.registrations.len()
    }

    fn disconnect(&mut self) -> ToriiResult<()> {
        let client = self.client()?;
        let cancelled = self.registrations.len();
        self.cancel_all();
        self.bridge.free_client(client);
        self.client = None;
        info!(cancelled, "torii client disconnected");
        Ok(())
    }
}
