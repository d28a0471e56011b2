//! Owned domain types for the Torii client bridge.
//!
//! Everything the runtime hands to a caller is one of these types: values are
//! deep-copied out of native buffers (or decoded from the browser wire format)
//! before the caller ever sees them, so none of them borrow native memory.
//!
//! - [`FieldElement`]: 252-bit keys
//! - [`Ty`], [`Primitive`], [`Struct`], [`EnumValue`]: typed values
//! - [`Model`], [`Entity`]: state attached to a hashed key
//! - [`KeysClause`], [`Query`], [`Clause`]: request descriptors
//! - [`WorldMetadata`]: world and model registration data

mod felt;
mod metadata;
mod model;
mod query;
mod ty;

pub use felt::FieldElement;
pub use metadata::{ModelMetadata, WorldMetadata};
pub use model::{Entity, Model};
pub use query::{
    Clause, ComparisonOperator, CompositeClause, DEFAULT_QUERY_LIMIT, KeysClause, LogicalOperator,
    MemberClause, Query,
};
pub use ty::{EnumOption, EnumValue, Member, Primitive, Struct, Ty};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur constructing or decoding domain types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("field element out of range: {0}")]
    FeltOutOfRange(String),

    #[error("invalid hex: {0:?}")]
    InvalidHex(String),
}
