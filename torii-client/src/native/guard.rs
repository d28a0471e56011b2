//! Scoped release of native-owned values.
//!
//! Every pointer or array the library hands back is wrapped in a
//! [`NativeGuard`] before it is read, so the matching `*_free` call runs
//! exactly once on every exit path, including early returns from a failed
//! decode.

use crate::ffi::{CArray, CEntity, CError, CKeysClause, CModel, CTy, CWorldMetadata, NativeApi};
use std::ffi::CStr;
use std::mem::ManuallyDrop;

/// A value that must be handed back to the native library.
pub(crate) trait NativeOwned {
    /// # Safety
    /// `self` must have been returned by `api` and not released yet.
    unsafe fn release<N: NativeApi>(self, api: &N);
}

impl NativeOwned for CArray<CEntity> {
    unsafe fn release<N: NativeApi>(self, api: &N) {
        unsafe { api.entities_free(self) }
    }
}

impl NativeOwned for CArray<CKeysClause> {
    unsafe fn release<N: NativeApi>(self, api: &N) {
        unsafe { api.keys_clauses_free(self) }
    }
}

impl NativeOwned for CArray<CModel> {
    unsafe fn release<N: NativeApi>(self, api: &N) {
        unsafe { api.models_free(self) }
    }
}

impl NativeOwned for *mut CTy {
    unsafe fn release<N: NativeApi>(self, api: &N) {
        if !self.is_null() {
            unsafe { api.ty_free(self) }
        }
    }
}

impl NativeOwned for *mut CWorldMetadata {
    unsafe fn release<N: NativeApi>(self, api: &N) {
        if !self.is_null() {
            unsafe { api.world_metadata_free(self) }
        }
    }
}

impl NativeOwned for CError {
    unsafe fn release<N: NativeApi>(self, api: &N) {
        unsafe { api.error_free(self) }
    }
}

/// Releases the wrapped value through `api` when dropped.
pub(crate) struct NativeGuard<'a, N: NativeApi, T: NativeOwned> {
    api: &'a N,
    value: ManuallyDrop<T>,
}

impl<'a, N: NativeApi, T: NativeOwned> NativeGuard<'a, N, T> {
    /// # Safety
    /// `value` must have been returned by `api` and not released yet.
    pub(crate) unsafe fn new(api: &'a N, value: T) -> Self {
        Self {
            api,
            value: ManuallyDrop::new(value),
        }
    }

    pub(crate) fn get(&self) -> &T {
        &self.value
    }
}

impl<N: NativeApi, T: NativeOwned> Drop for NativeGuard<'_, N, T> {
    fn drop(&mut self) {
        // SAFETY: the value is taken exactly once, here.
        let value = unsafe { ManuallyDrop::take(&mut self.value) };
        // SAFETY: guaranteed by the constructor's contract.
        unsafe { value.release(self.api) }
    }
}

/// Copies the message out of a native error, then frees it.
///
/// # Safety
/// `error` must have been returned by `api` and not released yet.
pub(crate) unsafe fn take_error<N: NativeApi>(api: &N, error: CError) -> String {
    let message = if error.message.is_null() {
        "unknown native error".to_owned()
    } else {
        unsafe { CStr::from_ptr(error.message) }
            .to_string_lossy()
            .into_owned()
    };
    unsafe { error.release(api) };
    message
}
