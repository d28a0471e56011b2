//! Client runtime for the Torii indexer.
//!
//! Wraps the native Torii library (or, on `wasm32`, its JS counterpart)
//! behind a safe API: typed queries go in, owned values come out, and push
//! notifications from the library's threads reach the consumer through a
//! queue it drains on its own thread.
//!
//! # Components
//!
//! - **Transport handle**: [`NativeBackend`] / [`BrowserBackend`] own the
//!   remote client and release it exactly once.
//! - **Query façade**: [`ToriiClient::model`], [`ToriiClient::entities`],
//!   [`ToriiClient::subscribed_models`].
//! - **Subscription registry**: models to sync plus per-entity and
//!   per-model callback registrations, each cancelled before the client is
//!   freed.
//! - **Update dispatcher**: [`Delivery`] chooses between running a handler
//!   on the callback thread and queueing onto a [`MainThreadQueue`].
//! - **Platform adapter**: the [`Backend`] trait, selected once per
//!   [`Platform`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use torii_client::native::mock::MockNative;
//! use torii_client::{ClientConfig, MainThreadQueue, NativeBackend, ToriiClient};
//! use torii_types::FieldElement;
//!
//! let backend = NativeBackend::connect(Arc::new(MockNative::new()), &ClientConfig::default())?;
//! let mut client = ToriiClient::new(backend);
//! let mut queue = MainThreadQueue::new();
//! client.on_entity_state_update(&[FieldElement::from(7u64)], queue.delivery())?;
//!
//! // Once per frame:
//! for event in queue.drain() {
//!     println!("{} -> {:?}", event.registration, event.event);
//! }
//! # Ok::<(), torii_client::ToriiError>(())
//! ```

pub mod backend;
pub mod browser;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod ffi;
pub mod logging;
pub mod native;
pub mod platform;
mod wire;

pub use backend::Backend;
pub use browser::{BrowserBackend, BrowserBridge};
pub use client::{SubscriptionSet, ToriiClient};
pub use config::{ClientConfig, ConfigError};
pub use dispatch::{
    Delivery, DispatchedEvent, EventHandler, EventSender, MainThreadQueue, RegistrationId,
    ToriiEvent,
};
pub use error::{ToriiError, ToriiResult};
pub use logging::init_logging;
pub use native::NativeBackend;
pub use platform::Platform;
