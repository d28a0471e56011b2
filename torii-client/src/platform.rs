//! Backend selection.

use crate::backend::Backend;
use crate::config::ClientConfig;
use crate::error::ToriiResult;
use std::fmt;

/// The host execution environment a backend targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// Native library, callbacks may arrive on any thread.
    Native,
    /// Browser runtime, single-threaded and cooperative.
    Browser,
}

impl Platform {
    /// The platform this build runs on.
    pub const fn current() -> Self {
        if cfg!(target_arch = "wasm32") {
            Self::Browser
        } else {
            Self::Native
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => write!(f, "native"),
            Self::Browser => write!(f, "browser"),
        }
    }
}

/// Connects the backend compiled in for the current platform.
#[cfg(all(not(target_arch = "wasm32"), feature = "dojo-c"))]
pub(crate) fn connect_current(config: &ClientConfig) -> ToriiResult<Box<dyn Backend>> {
    use crate::ffi::DojoC;
    use crate::native::NativeBackend;
    use std::sync::Arc;

    let backend = NativeBackend::connect(Arc::new(DojoC), config)?;
    Ok(Box::new(backend))
}

/// Connects the backend compiled in for the current platform.
#[cfg(all(target_arch = "wasm32", feature = "wasm"))]
pub(crate) fn connect_current(config: &ClientConfig) -> ToriiResult<Box<dyn Backend>> {
    use crate::browser::{BrowserBackend, WasmBridge};

    let backend = BrowserBackend::connect(WasmBridge::new(), config)?;
    Ok(Box::new(backend))
}

#[cfg(not(any(
    all(not(target_arch = "wasm32"), feature = "dojo-c"),
    all(target_arch = "wasm32", feature = "wasm")
)))]
pub(crate) fn connect_current(_config: &ClientConfig) -> ToriiResult<Box<dyn Backend>> {
    Err(crate::error::ToriiError::unsupported(Platform::current(), "connect"))
}
