//! C ABI contract with the native Torii library.
//!
//! Every value that crosses the boundary is one of the `#[repr(C)]` types
//! below. Ownership rules:
//!
//! - Calls return a [`CResult`]: a success payload or a [`CError`] whose
//!   message belongs to the caller and must be released with
//!   [`NativeApi::error_free`].
//! - Arrays carry an explicit length. An array, `Ty` or metadata pointer
//!   returned by the library is owned by the caller until handed back to its
//!   matching `*_free` call, exactly once.
//! - Inputs (queries, key lists) are borrowed by the library for the duration
//!   of the call only.
//! - A callback is a function pointer plus an opaque context pointer. The
//!   library may invoke it from any thread until [`NativeApi::subscription_cancel`]
//!   (or `client_free`) returns, and never afterwards.

use std::ffi::{c_char, c_void};
use std::marker::{PhantomData, PhantomPinned};

/// Opaque native client.
#[repr(C)]
pub struct NativeClient {
    _data: [u8; 0],
    _marker: PhantomData<(*mut u8, PhantomPinned)>,
}

/// Opaque native callback subscription.
#[repr(C)]
pub struct NativeSubscription {
    _data: [u8; 0],
    _marker: PhantomData<(*mut u8, PhantomPinned)>,
}

/// A length-prefixed array.
#[repr(C)]
#[derive(Debug)]
pub struct CArray<T> {
    pub data: *mut T,
    pub data_len: usize,
}

impl<T> CArray<T> {
    pub fn len(&self) -> usize {
        self.data_len
    }

    pub fn is_empty(&self) -> bool {
        self.data_len == 0
    }
}

#[repr(C)]
#[derive(Debug)]
pub struct CError {
    pub message: *const c_char,
}

#[repr(C)]
pub enum CResult<T> {
    Ok(T),
    Err(CError),
}

#[repr(C)]
pub enum COption<T> {
    Some(T),
    None,
}

/// Big-endian field element bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CFieldElement {
    pub data: [u8; 32],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CPrimitive {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    /// Big-endian two's complement.
    I128([u8; 16]),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    /// Big-endian.
    U128([u8; 16]),
    USize(u32),
    Bool(bool),
    Felt252(CFieldElement),
    ClassHash(CFieldElement),
    ContractAddress(CFieldElement),
}

#[repr(C)]
pub enum CTy {
    Primitive(CPrimitive),
    Struct(CStruct),
    Enum(CEnum),
    Tuple(CArray<CTy>),
    ByteArray(*const c_char),
}

#[repr(C)]
pub struct CStruct {
    pub name: *const c_char,
    pub children: CArray<CMember>,
}

#[repr(C)]
pub struct CMember {
    pub name: *const c_char,
    pub ty: *mut CTy,
    pub key: bool,
}

#[repr(C)]
pub struct CEnum {
    pub name: *const c_char,
    pub option: u8,
    pub options: CArray<CEnumOption>,
}

#[repr(C)]
pub struct CEnumOption {
    pub name: *const c_char,
    pub ty: *mut CTy,
}

#[repr(C)]
pub struct CModel {
    pub name: *const c_char,
    pub members: CArray<CMember>,
}

#[repr(C)]
pub struct CEntity {
    pub hashed_keys: CFieldElement,
    pub models: CArray<CModel>,
}

#[repr(C)]
pub struct CKeysClause {
    pub model: *const c_char,
    pub keys: CArray<CFieldElement>,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CComparisonOperator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CLogicalOperator {
    And,
    Or,
}

#[repr(C)]
pub struct CMemberClause {
    pub model: *const c_char,
    pub member: *const c_char,
    pub operator: CComparisonOperator,
    pub value: CPrimitive,
}

#[repr(C)]
pub struct CCompositeClause {
    pub model: *const c_char,
    pub operator: CLogicalOperator,
    pub clauses: CArray<CClause>,
}

#[repr(C)]
pub enum CClause {
    Keys(CKeysClause),
    Member(CMemberClause),
    Composite(CCompositeClause),
}

#[repr(C)]
pub struct CQuery {
    pub limit: u32,
    pub offset: u32,
    pub clause: COption<CClause>,
}

#[repr(C)]
pub struct CModelMetadata {
    pub name: *const c_char,
    pub class_hash: CFieldElement,
    pub packed_size: u32,
    pub unpacked_size: u32,
    pub schema: *mut CTy,
}

#[repr(C)]
pub struct CWorldMetadata {
    pub world_address: CFieldElement,
    pub world_class_hash: CFieldElement,
    pub models: CArray<CModelMetadata>,
}

/// Entity-state-update callback. The receiver owns `models`.
pub type EntityUpdateFn =
    unsafe extern "C" fn(ctx: *mut c_void, key: CFieldElement, models: CArray<CModel>);

/// Sync-model-update callback.
pub type SyncModelUpdateFn = unsafe extern "C" fn(ctx: *mut c_void);

/// The native function table.
///
/// # Safety
///
/// Implementations must follow the ownership rules in the module docs; in
/// particular a callback must never be invoked after its subscription was
/// cancelled or its client freed.
pub unsafe trait NativeApi: Send + Sync + 'static {
    unsafe fn client_new(
        &self,
        torii_url: *const c_char,
        rpc_url: *const c_char,
        world: *const c_char,
    ) -> CResult<*mut NativeClient>;

    unsafe fn client_free(&self, client: *mut NativeClient);

    unsafe fn client_metadata(&self, client: *mut NativeClient) -> CResult<*mut CWorldMetadata>;

    unsafe fn client_model(
        &self,
        client: *mut NativeClient,
        query: *const CKeysClause,
    ) -> CResult<COption<*mut CTy>>;

    unsafe fn client_entities(
        &self,
        client: *mut NativeClient,
        query: *const CQuery,
    ) -> CResult<CArray<CEntity>>;

    unsafe fn client_subscribed_models(
        &self,
        client: *mut NativeClient,
    ) -> CResult<CArray<CKeysClause>>;

    unsafe fn client_add_models_to_sync(
        &self,
        client: *mut NativeClient,
        models: *const CKeysClause,
        models_len: usize,
    ) -> CResult<bool>;

    unsafe fn client_remove_models_to_sync(
        &self,
        client: *mut NativeClient,
        models: *const CKeysClause,
        models_len: usize,
    ) -> CResult<bool>;

    unsafe fn client_start_subscription(&self, client: *mut NativeClient) -> CResult<bool>;

    unsafe fn client_on_entity_state_update(
        &self,
        client: *mut NativeClient,
        keys: *const CFieldElement,
        keys_len: usize,
        callback: EntityUpdateFn,
        ctx: *mut c_void,
    ) -> CResult<*mut NativeSubscription>;

    unsafe fn client_on_sync_model_update(
        &self,
        client: *mut NativeClient,
        model: *const CKeysClause,
        callback: SyncModelUpdateFn,
        ctx: *mut c_void,
    ) -> CResult<*mut NativeSubscription>;

    /// Blocks until any in-flight invocation of the callback has returned.
    unsafe fn subscription_cancel(&self, subscription: *mut NativeSubscription);

    unsafe fn world_metadata_free(&self, metadata: *mut CWorldMetadata);

    unsafe fn ty_free(&self, ty: *mut CTy);

    unsafe fn entities_free(&self, entities: CArray<CEntity>);

    unsafe fn keys_clauses_free(&self, clauses: CArray<CKeysClause>);

    unsafe fn models_free(&self, models: CArray<CModel>);

    unsafe fn error_free(&self, error: CError);
}

#[cfg(feature = "dojo-c")]
pub use dojo_c::DojoC;

#[cfg(feature = "dojo-c")]
mod dojo_c {
    use super::*;

    mod sys {
        use super::*;

        #[link(name = "dojo_c")]
        unsafe extern "C" {
            pub fn client_new(
                torii_url: *const c_char,
                rpc_url: *const c_char,
                world: *const c_char,
            ) -> CResult<*mut NativeClient>;
            pub fn client_free(client: *mut NativeClient);
            pub fn client_metadata(client: *mut NativeClient) -> CResult<*mut CWorldMetadata>;
            pub fn client_model(
                client: *mut NativeClient,
                query: *const CKeysClause,
            ) -> CResult<COption<*mut CTy>>;
            pub fn client_entities(
                client: *mut NativeClient,
                query: *const CQuery,
            ) -> CResult<CArray<CEntity>>;
            pub fn client_subscribed_models(
                client: *mut NativeClient,
            ) -> CResult<CArray<CKeysClause>>;
            pub fn client_add_models_to_sync(
                client: *mut NativeClient,
                models: *const CKeysClause,
                models_len: usize,
            ) -> CResult<bool>;
            pub fn client_remove_models_to_sync(
                client: *mut NativeClient,
                models: *const CKeysClause,
                models_len: usize,
            ) -> CResult<bool>;
            pub fn client_start_subscription(client: *mut NativeClient) -> CResult<bool>;
            pub fn client_on_entity_state_update(
                client: *mut NativeClient,
                keys: *const CFieldElement,
                keys_len: usize,
                callback: EntityUpdateFn,
                ctx: *mut c_void,
            ) -> CResult<*mut NativeSubscription>;
            pub fn client_on_sync_model_update(
                client: *mut NativeClient,
                model: *const CKeysClause,
                callback: SyncModelUpdateFn,
                ctx: *mut c_void,
            ) -> CResult<*mut NativeSubscription>;
            pub fn subscription_cancel(subscription: *mut NativeSubscription);
            pub fn world_metadata_free(metadata: *mut CWorldMetadata);
            pub fn ty_free(ty: *mut CTy);
            pub fn carray_entity_free(entities: CArray<CEntity>);
            pub fn carray_keys_clause_free(clauses: CArray<CKeysClause>);
            pub fn carray_model_free(models: CArray<CModel>);
            pub fn error_free(error: CError);
        }
    }

    /// The linked `dojo_c` library.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct DojoC;

    unsafe impl NativeApi for DojoC {
        unsafe fn client_new(
            &self,
            torii_url: *const c_char,
            rpc_url: *const c_char,
            world: *const c_char,
        ) -> CResult<*mut NativeClient> {
            unsafe { sys::client_new(torii_url, rpc_url, world) }
        }

        unsafe fn client_free(&self, client: *mut NativeClient) {
            unsafe { sys::client_free(client) }
        }

        unsafe fn client_metadata(
            &self,
            client: *mut NativeClient,
        ) -> CResult<*mut CWorldMetadata> {
            unsafe { sys::client_metadata(client) }
        }

        unsafe fn client_model(
            &self,
            client: *mut NativeClient,
            query: *const CKeysClause,
        ) -> CResult<COption<*mut CTy>> {
            unsafe { sys::client_model(client, query) }
        }

        unsafe fn client_entities(
            &self,
            client: *mut NativeClient,
            query: *const CQuery,
        ) -> CResult<CArray<CEntity>> {
            unsafe { sys::client_entities(client, query) }
        }

        unsafe fn client_subscribed_models(
            &self,
            client: *mut NativeClient,
        ) -> CResult<CArray<CKeysClause>> {
            unsafe { sys::client_subscribed_models(client) }
        }

        unsafe fn client_add_models_to_sync(
            &self,
            client: *mut NativeClient,
            models: *const CKeysClause,
            models_len: usize,
        ) -> CResult<bool> {
            unsafe { sys::client_add_models_to_sync(client, models, models_len) }
        }

        unsafe fn client_remove_models_to_sync(
            &self,
            client: *mut NativeClient,
            models: *const CKeysClause,
            models_len: usize,
        ) -> CResult<bool> {
            unsafe { sys::client_remove_models_to_sync(client, models, models_len) }
        }

        unsafe fn client_start_subscription(&self, client: *mut NativeClient) -> CResult<bool> {
            unsafe { sys::client_start_subscription(client) }
        }

        unsafe fn client_on_entity_state_update(
            &self,
            client: *mut NativeClient,
            keys: *const CFieldElement,
            keys_len: usize,
            callback: EntityUpdateFn,
            ctx: *mut c_void,
        ) -> CResult<*mut NativeSubscription> {
            unsafe { sys::client_on_entity_state_update(client, keys, keys_len, callback, ctx) }
        }

        unsafe fn client_on_sync_model_update(
            &self,
            client: *mut NativeClient,
            model: *const CKeysClause,
            callback: SyncModelUpdateFn,
            ctx: *mut c_void,
        ) -> CResult<*mut NativeSubscription> {
            unsafe { sys::client_on_sync_model_update(client, model, callback, ctx) }
        }

        unsafe fn subscription_cancel(&self, subscription: *mut NativeSubscription) {
            unsafe { sys::subscription_cancel(subscription) }
        }

        unsafe fn world_metadata_free(&self, metadata: *mut CWorldMetadata) {
            unsafe { sys::world_metadata_free(metadata) }
        }

        unsafe fn ty_free(&self, ty: *mut CTy) {
            unsafe { sys::ty_free(ty) }
        }

        unsafe fn entities_free(&self, entities: CArray<CEntity>) {
            unsafe { sys::carray_entity_free(entities) }
        }

        unsafe fn keys_clauses_free(&self, clauses: CArray<CKeysClause>) {
            unsafe { sys::carray_keys_clause_free(clauses) }
        }

        unsafe fn models_free(&self, models: CArray<CModel>) {
            unsafe { sys::carray_model_free(models) }
        }

        unsafe fn error_free(&self, error: CError) {
            unsafe { sys::error_free(error) }
        }
    }
}
