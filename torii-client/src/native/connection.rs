//! Transport handle: ownership of one native client.

use super::guard::take_error;
use crate::config::ClientConfig;
use crate::error::{ToriiError, ToriiResult};
use crate::ffi::{CResult, NativeApi, NativeClient};
use crate::wire::c_string;
use std::ptr;
use std::sync::Arc;
use tracing::{debug, info};

/// An open native client. Freed exactly once, by [`release`](Self::release)
/// or on drop.
pub(crate) struct NativeConnection<N: NativeApi> {
    api: Arc<N>,
    handle: *mut NativeClient,
}

// SAFETY: the native client may be used from any thread as long as calls do
// not overlap. `NativeConnection` is not `Sync`.
unsafe impl<N: NativeApi> Send for NativeConnection<N> {}

impl<N: NativeApi> NativeConnection<N> {
    pub(crate) fn open(api: Arc<N>, config: &ClientConfig) -> ToriiResult<Self> {
        let torii_url = c_string(&config.torii_url)?;
        let rpc_url = c_string(&config.rpc_url)?;
        let world = c_string(&config.world_address)?;

        let result =
            unsafe { api.client_new(torii_url.as_ptr(), rpc_url.as_ptr(), world.as_ptr()) };
        let handle = match result {
            CResult::Ok(handle) => handle,
            CResult::Err(error) => {
                let message = unsafe { take_error(api.as_ref(), error) };
                return Err(ToriiError::Connect(message));
            }
        };
        if handle.is_null() {
            return Err(ToriiError::Connect("library returned a null client".into()));
        }

        info!(
            torii_url = %config.torii_url,
            world = %config.world_address,
            "torii client connected"
        );
        Ok(Self { api, handle })
    }

    /// The live handle, or an error if the client was already released.
    pub(crate) fn handle(&self) -> ToriiResult<*mut NativeClient> {
        if self.handle.is_null() {
            Err(ToriiError::disconnected())
        } else {
            Ok(self.handle)
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        !self.handle.is_null()
    }

    /// Frees the native client. Returns `false` if it was already freed.
    pub(crate) fn release(&mut self) -> bool {
        let handle = std::mem::replace(&mut self.handle, ptr::null_mut());
        if handle.is_null() {
            return false;
        }
        unsafe { self.api.client_free(handle) };
        debug!("torii client freed");
        true
    }
}

impl<N: NativeApi> Drop for NativeConnection<N> {
    fn drop(&mut self) {
        self.release();
    }
}
