//! Callback trampolines and registration lifetimes.
//!
//! A registration hands the library a trampoline plus a context pointer into
//! a heap-pinned [`CallbackSlot`]. The slot is owned by the [`Registration`],
//! whose drop cancels the native subscription first and frees the slot only
//! after the cancel call has returned.

use super::guard::NativeGuard;
use crate::dispatch::{Delivery, DispatchedEvent, RegistrationId, ToriiEvent};
use crate::ffi::{CArray, CFieldElement, CModel, NativeApi, NativeSubscription};
use crate::wire::{felt_from_c, models_from_c};
use std::ffi::c_void;
use std::panic::{self, AssertUnwindSafe};
use std::ptr::NonNull;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Type-erased, heap-pinned callback state.
pub(crate) struct CallbackSlot {
    ptr: NonNull<c_void>,
    drop_state: unsafe fn(*mut c_void),
}

// SAFETY: only constructed from `T: Send + Sync`.
unsafe impl Send for CallbackSlot {}

impl CallbackSlot {
    pub(crate) fn new<T: Send + Sync + 'static>(state: T) -> Self {
        let ptr = NonNull::from(Box::leak(Box::new(state))).cast::<c_void>();
        Self {
            ptr,
            drop_state: drop_boxed::<T>,
        }
    }

    /// The pointer handed to the library as callback context.
    pub(crate) fn context(&self) -> *mut c_void {
        self.ptr.as_ptr()
    }
}

unsafe fn drop_boxed<T>(ptr: *mut c_void) {
    drop(unsafe { Box::from_raw(ptr.cast::<T>()) });
}

impl Drop for CallbackSlot {
    fn drop(&mut self) {
        unsafe { (self.drop_state)(self.ptr.as_ptr()) }
    }
}

/// Context of an entity-state-update registration.
pub(crate) struct EntityCallbackState<N: NativeApi> {
    pub(crate) api: Arc<N>,
    pub(crate) registration: RegistrationId,
    pub(crate) delivery: Delivery,
}

/// Context of a sync-model-update registration.
pub(crate) struct SyncModelCallbackState {
    pub(crate) registration: RegistrationId,
    pub(crate) delivery: Delivery,
}

/// Entry point for entity-state updates.
///
/// Copies the models out, releases the native array, then delivers.
///
/// # Safety
/// `ctx` must point to a live `EntityCallbackState<N>` and `models` must be
/// owned by the caller of this function.
pub(crate) unsafe extern "C" fn entity_update_trampoline<N: NativeApi>(
    ctx: *mut c_void,
    key: CFieldElement,
    models: CArray<CModel>,
) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let state = unsafe { &*ctx.cast::<EntityCallbackState<N>>() };
        let decoded = {
            let guard = unsafe { NativeGuard::new(state.api.as_ref(), models) };
            unsafe { models_from_c(guard.get()) }
        };

        let models = match decoded {
            Ok(models) => models,
            Err(e) => {
                warn!(
                    registration = %state.registration,
                    error = %e,
                    "dropping malformed entity update"
                );
                return;
            }
        };
        let key = match felt_from_c(&key) {
            Ok(key) => key,
            Err(e) => {
                warn!(
                    registration = %state.registration,
                    error = %e,
                    "dropping entity update with invalid key"
                );
                return;
            }
        };

        state.delivery.deliver(DispatchedEvent {
            registration: state.registration,
            event: ToriiEvent::EntityUpdated { key, models },
        });
    }));
    if outcome.is_err() {
        error!("panic in entity update callback, event dropped");
    }
}

/// Entry point for sync-model updates.
///
/// # Safety
/// `ctx` must point to a live `SyncModelCallbackState`.
pub(crate) unsafe extern "C" fn sync_model_update_trampoline(ctx: *mut c_void) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let state = unsafe { &*ctx.cast::<SyncModelCallbackState>() };
        state.delivery.deliver(DispatchedEvent {
            registration: state.registration,
            event: ToriiEvent::SyncModelUpdated,
        });
    }));
    if outcome.is_err() {
        error!("panic in sync model callback, event dropped");
    }
}

/// A live native subscription and the context it points into.
pub(crate) struct Registration<N: NativeApi> {
    api: Arc<N>,
    id: RegistrationId,
    subscription: *mut NativeSubscription,
    // Dropped after `Drop::drop` has cancelled the subscription.
    _context: Option<CallbackSlot>,
}

// SAFETY: the subscription handle is only passed back to `subscription_cancel`.
unsafe impl<N: NativeApi> Send for Registration<N> {}

impl<N: NativeApi> Registration<N> {
    pub(crate) fn new(
        api: Arc<N>,
        id: RegistrationId,
        subscription: *mut NativeSubscription,
        context: Option<CallbackSlot>,
    ) -> Self {
        Self {
            api,
            id,
            subscription,
            _context: context,
        }
    }
}

impl<N: NativeApi> Drop for Registration<N> {
    fn drop(&mut self) {
        if !self.subscription.is_null() {
            unsafe { self.api.subscription_cancel(self.subscription) };
        }
        debug!(registration = %self.id, "subscription cancelled");
    }
}
