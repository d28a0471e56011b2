//! [`BrowserBridge`] over the `ToriiWasmInterop` JS shim.

use super::{
    BrowserBridge, ClientId, EntityUpdateCallback, SubscriptionId, SyncModelUpdateCallback,
};
use async_trait::async_trait;
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

#[wasm_bindgen(js_namespace = ToriiWasmInterop)]
extern "C" {
    #[wasm_bindgen(js_name = createClient, catch)]
    fn create_client(torii_url: &str, rpc_url: &str, world_address: &str) -> Result<u32, JsValue>;

    #[wasm_bindgen(js_name = freeClient)]
    fn free_client(client: u32);

    #[wasm_bindgen(js_name = getModelValue, catch)]
    fn get_model_value(client: u32, query: &str) -> Result<js_sys::Promise, JsValue>;

    #[wasm_bindgen(js_name = getEntities, catch)]
    fn get_entities(client: u32, query: &str) -> Result<js_sys::Promise, JsValue>;

    #[wasm_bindgen(js_name = getSubscribedModels, catch)]
    fn get_subscribed_models(client: u32) -> Result<js_sys::Promise, JsValue>;

    #[wasm_bindgen(js_name = addModelsToSync, catch)]
    fn add_models_to_sync(client: u32, models: &str) -> Result<js_sys::Promise, JsValue>;

    #[wasm_bindgen(js_name = removeModelsToSync, catch)]
    fn remove_models_to_sync(client: u32, models: &str) -> Result<js_sys::Promise, JsValue>;

    #[wasm_bindgen(js_name = startSubscription, catch)]
    fn start_subscription(client: u32) -> Result<js_sys::Promise, JsValue>;

    #[wasm_bindgen(js_name = onEntityUpdated, catch)]
    fn on_entity_updated(
        client: u32,
        keys: &str,
        callback: &Closure<dyn Fn(String, String)>,
    ) -> Result<u32, JsValue>;

    #[wasm_bindgen(js_name = onSyncModelUpdated, catch)]
    fn on_sync_model_updated(
        client: u32,
        model: &str,
        callback: &Closure<dyn Fn()>,
    ) -> Result<u32, JsValue>;

    #[wasm_bindgen(js_name = cancelSubscription)]
    fn cancel_subscription(subscription: u32);
}

fn js_error(value: JsValue) -> String {
    if let Some(error) = value.dyn_ref::<js_sys::Error>() {
        return String::from(error.message());
    }
    value
        .as_string()
        .unwrap_or_else(|| format!("{value:?}"))
}

async fn settle(promise: Result<js_sys::Promise, JsValue>) -> Result<JsValue, String> {
    let promise = promise.map_err(js_error)?;
    JsFuture::from(promise).await.map_err(js_error)
}

fn text(value: JsValue) -> Result<String, String> {
    value
        .as_string()
        .ok_or_else(|| "expected a JSON string from the host".to_owned())
}

/// The wasm-bindgen bridge. Keeps each registered closure alive until its
/// subscription is cancelled.
#[derive(Default)]
pub struct WasmBridge {
    closures: RefCell<HashMap<SubscriptionId, Box<dyn Any>>>,
}

impl WasmBridge {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait(?Send)]
impl BrowserBridge for WasmBridge {
    fn create_client(
        &self,
        torii_url: &str,
        rpc_url: &str,
        world_address: &str,
    ) -> Result<ClientId, String> {
        create_client(torii_url, rpc_url, world_address).map_err(js_error)
    }

    fn free_client(&self, client: ClientId) {
        free_client(client);
    }

    async fn model(&self, client: ClientId, query: &str) -> Result<Option<String>, String> {
        let value = settle(get_model_value(client, query)).await?;
        if value.is_null() || value.is_undefined() {
            return Ok(None);
        }
        text(value).map(Some)
    }

    async fn entities(&self, client: ClientId, query: &str) -> Result<String, String> {
        text(settle(get_entities(client, query)).await?)
    }

    async fn subscribed_models(&self, client: ClientId) -> Result<String, String> {
        text(settle(get_subscribed_models(client)).await?)
    }

    async fn add_models_to_sync(&self, client: ClientId, models: &str) -> Result<(), String> {
        settle(add_models_to_sync(client, models)).await.map(drop)
    }

    async fn remove_models_to_sync(&self, client: ClientId, models: &str) -> Result<(), String> {
        settle(remove_models_to_sync(client, models)).await.map(drop)
    }

    async fn start_subscription(&self, client: ClientId) -> Result<(), String> {
        settle(start_subscription(client)).await.map(drop)
    }

    fn on_entity_updated(
        &self,
        client: ClientId,
        keys: &str,
        callback: EntityUpdateCallback,
    ) -> Result<SubscriptionId, String> {
        let closure = Closure::<dyn Fn(String, String)>::new(move |key: String, models: String| {
            callback(&key, &models)
        });
        let subscription = on_entity_updated(client, keys, &closure).map_err(js_error)?;
        self.closures
            .borrow_mut()
            .insert(subscription, Box::new(closure));
        Ok(subscription)
    }

    fn on_sync_model_updated(
        &self,
        client: ClientId,
        model: &str,
        callback: SyncModelUpdateCallback,
    ) -> Result<SubscriptionId, String> {
        let closure = Closure::<dyn Fn()>::new(move || callback());
        let subscription = on_sync_model_updated(client, model, &closure).map_err(js_error)?;
        self.closures
            .borrow_mut()
            .insert(subscription, Box::new(closure));
        Ok(subscription)
    }

    fn cancel_subscription(&self, subscription: SubscriptionId) {
        cancel_subscription(subscription);
        self.closures.borrow_mut().remove(&subscription);
    }
}
