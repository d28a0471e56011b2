//! In-process [`BrowserBridge`] for tests.
//!
//! Speaks the same JSON as the JS shim and keeps its state typed, so a round
//! trip through [`MockBridge`] exercises the whole wire format. Clones share
//! state, which lets a test keep a handle after moving one into a backend.

use super::{
    BrowserBridge, ClientId, EntityUpdateCallback, SubscriptionId, SyncModelUpdateCallback,
};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;
use torii_types::{Entity, FieldElement, KeysClause, Model, Query, Ty};

enum Callback {
    Entity {
        keys: Vec<FieldElement>,
        callback: Rc<dyn Fn(&str, &str)>,
    },
    SyncModel {
        model: KeysClause,
        callback: Rc<dyn Fn()>,
    },
}

struct Subscription {
    client: ClientId,
    callback: Callback,
}

#[derive(Default)]
struct BridgeState {
    reject_connect: Option<String>,
    next_client: ClientId,
    next_subscription: SubscriptionId,
    live_clients: HashSet<ClientId>,
    freed_clients: usize,
    models: HashMap<KeysClause, Ty>,
    entities: Vec<Entity>,
    synced: Vec<KeysClause>,
    started: usize,
    failures: HashMap<&'static str, String>,
    subscriptions: BTreeMap<SubscriptionId, Subscription>,
    calls: Vec<&'static str>,
    last_query: Option<String>,
}

/// Scriptable stand-in for the JS interop shim.
#[derive(Clone, Default)]
pub struct MockBridge {
    state: Rc<RefCell<BridgeState>>,
}

impl MockBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject_connect(&self, message: impl Into<String>) {
        self.state.borrow_mut().reject_connect = Some(message.into());
    }

    pub fn insert_model(&self, query: KeysClause, ty: Ty) {
        self.state.borrow_mut().models.insert(query, ty);
    }

    pub fn set_entities(&self, entities: Vec<Entity>) {
        self.state.borrow_mut().entities = entities;
    }

    /// Makes `operation` (e.g. `"entities"`) fail with `message`.
    pub fn fail(&self, operation: &'static str, message: impl Into<String>) {
        self.state
            .borrow_mut()
            .failures
            .insert(operation, message.into());
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|c| **c == operation)
            .count()
    }

    pub fn live_clients(&self) -> usize {
        self.state.borrow().live_clients.len()
    }

    pub fn freed_clients(&self) -> usize {
        self.state.borrow().freed_clients
    }

    pub fn subscription_count(&self) -> usize {
        self.state.borrow().subscriptions.len()
    }

    pub fn synced_models(&self) -> Vec<KeysClause> {
        self.state.borrow().synced.clone()
    }

    pub fn start_count(&self) -> usize {
        self.state.borrow().started
    }

    /// The JSON text of the last `entities` query.
    pub fn last_query(&self) -> Option<String> {
        self.state.borrow().last_query.clone()
    }

    /// Invokes matching entity callbacks with JSON-encoded models.
    pub fn emit_entity_update(&self, key: FieldElement, models: &[Model]) -> usize {
        let models = serde_json::to_string(models).unwrap_or_default();
        self.emit_raw_entity_update(key, &key.to_string(), &models)
    }

    /// Invokes matching entity callbacks with arbitrary payload text.
    pub fn emit_raw_entity_update(&self, key: FieldElement, key_text: &str, models: &str) -> usize {
        let callbacks: Vec<Rc<dyn Fn(&str, &str)>> = {
            let state = self.state.borrow();
            state
                .subscriptions
                .values()
                .filter(|s| state.live_clients.contains(&s.client))
                .filter_map(|s| match &s.callback {
                    Callback::Entity { keys, callback }
                        if keys.is_empty() || keys.contains(&key) =>
                    {
                        Some(Rc::clone(callback))
                    }
                    _ => None,
                })
                .collect()
        };
        for callback in &callbacks {
            callback(key_text, models);
        }
        callbacks.len()
    }

    pub fn emit_sync_model_update(&self, model: &KeysClause) -> usize {
        let callbacks: Vec<Rc<dyn Fn()>> = {
            let state = self.state.borrow();
            state
                .subscriptions
                .values()
                .filter(|s| state.live_clients.contains(&s.client))
                .filter_map(|s| match &s.callback {
                    Callback::SyncModel { model: filter, callback } if filter == model => {
                        Some(Rc::clone(callback))
                    }
                    _ => None,
                })
                .collect()
        };
        for callback in &callbacks {
            callback();
        }
        callbacks.len()
    }

    fn enter(&self, operation: &'static str, client: ClientId) -> Result<(), String> {
        let mut state = self.state.borrow_mut();
        state.calls.push(operation);
        if !state.live_clients.contains(&client) {
            return Err(format!("unknown client {client}"));
        }
        match state.failures.get(operation) {
            Some(message) => Err(message.clone()),
            None => Ok(()),
        }
    }

    fn subscribe(&self, client: ClientId, callback: Callback) -> SubscriptionId {
        let mut state = self.state.borrow_mut();
        state.next_subscription += 1;
        let id = state.next_subscription;
        state.subscriptions.insert(id, Subscription { client, callback });
        id
    }
}

fn parse<T: DeserializeOwned>(json: &str) -> Result<T, String> {
    serde_json::from_str(json).map_err(|e| e.to_string())
}

fn render<T: Serialize + ?Sized>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| e.to_string())
}

#[async_trait(?Send)]
impl BrowserBridge for MockBridge {
    fn create_client(
        &self,
        _torii_url: &str,
        _rpc_url: &str,
        _world_address: &str,
    ) -> Result<ClientId, String> {
        let mut state = self.state.borrow_mut();
        state.calls.push("create_client");
        if let Some(message) = state.reject_connect.clone() {
            return Err(message);
        }
        state.next_client += 1;
        let client = state.next_client;
        state.live_clients.insert(client);
        Ok(client)
    }

    fn free_client(&self, client: ClientId) {
        let mut state = self.state.borrow_mut();
        state.calls.push("free_client");
        assert!(state.live_clients.remove(&client), "client freed twice");
        state.freed_clients += 1;
    }

    async fn model(&self, client: ClientId, query: &str) -> Result<Option<String>, String> {
        self.enter("model", client)?;
        let query: KeysClause = parse(query)?;
        let found = self.state.borrow().models.get(&query).cloned();
        found.map(|ty| render(&ty)).transpose()
    }

    async fn entities(&self, client: ClientId, query: &str) -> Result<String, String> {
        self.enter("entities", client)?;
        self.state.borrow_mut().last_query = Some(query.to_owned());
        let query: Query = parse(query)?;
        let state = self.state.borrow();
        let page: Vec<&Entity> = state
            .entities
            .iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect();
        render(&page)
    }

    async fn subscribed_models(&self, client: ClientId) -> Result<String, String> {
        self.enter("subscribed_models", client)?;
        render(&self.state.borrow().synced)
    }

    async fn add_models_to_sync(&self, client: ClientId, models: &str) -> Result<(), String> {
        self.enter("add_models_to_sync", client)?;
        let models: Vec<KeysClause> = parse(models)?;
        let mut state = self.state.borrow_mut();
        for model in models {
            if !state.synced.contains(&model) {
                state.synced.push(model);
            }
        }
        Ok(())
    }

    async fn remove_models_to_sync(&self, client: ClientId, models: &str) -> Result<(), String> {
        self.enter("remove_models_to_sync", client)?;
        let models: Vec<KeysClause> = parse(models)?;
        self.state
            .borrow_mut()
            .synced
            .retain(|m| !models.contains(m));
        Ok(())
    }

    async fn start_subscription(&self, client: ClientId) -> Result<(), String> {
        self.enter("start_subscription", client)?;
        self.state.borrow_mut().started += 1;
        Ok(())
    }

    fn on_entity_updated(
        &self,
        client: ClientId,
        keys: &str,
        callback: EntityUpdateCallback,
    ) -> Result<SubscriptionId, String> {
        self.enter("on_entity_updated", client)?;
        let keys: Vec<FieldElement> = parse(keys)?;
        Ok(self.subscribe(
            client,
            Callback::Entity {
                keys,
                callback: Rc::from(callback),
            },
        ))
    }

    fn on_sync_model_updated(
        &self,
        client: ClientId,
        model: &str,
        callback: SyncModelUpdateCallback,
    ) -> Result<SubscriptionId, String> {
        self.enter("on_sync_model_updated", client)?;
        let model: KeysClause = parse(model)?;
        Ok(self.subscribe(
            client,
            Callback::SyncModel {
                model,
                callback: Rc::from(callback),
            },
        ))
    }

    fn cancel_subscription(&self, subscription: SubscriptionId) {
        let mut state = self.state.borrow_mut();
        state.calls.push("cancel_subscription");
        assert!(
            state.subscriptions.remove(&subscription).is_some(),
            "subscription cancelled twice"
        );
    }
}
