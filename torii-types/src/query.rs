//! Query descriptors.
//!
//! A [`KeysClause`] selects one model instance by explicit key; a [`Query`]
//! selects a filtered, paginated set of entities.

use crate::{FieldElement, Primitive};
use serde::{Deserialize, Serialize};

/// Default page size for set queries.
pub const DEFAULT_QUERY_LIMIT: u32 = 100;

/// Selects a model by name and ordered key fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeysClause {
    pub model: String,
    pub keys: Vec<FieldElement>,
}

impl KeysClause {
    pub fn new(model: impl Into<String>, keys: Vec<FieldElement>) -> Self {
        Self {
            model: model.into(),
            keys,
        }
    }
}

/// Comparison applied by a [`MemberClause`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOperator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// Combinator applied by a [`CompositeClause`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOperator {
    And,
    Or,
}

/// Compares one member of a model against a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberClause {
    pub model: String,
    pub member: String,
    pub operator: ComparisonOperator,
    pub value: Primitive,
}

/// Combines sub-clauses on one model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeClause {
    pub model: String,
    pub operator: LogicalOperator,
    pub clauses: Vec<Clause>,
}

/// A filter predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Clause {
    Keys(KeysClause),
    Member(MemberClause),
    Composite(CompositeClause),
}

/// A filtered, paginated set query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub limit: u32,
    pub offset: u32,
    pub clause: Option<Clause>,
}

impl Query {
    /// An unfiltered query for the first page.
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_clause(mut self, clause: Clause) -> Self {
        self.clause = Some(clause);
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }
}

impl Default for Query {
    fn default() -> Self {
        Self {
            limit: DEFAULT_QUERY_LIMIT,
            offset: 0,
            clause: None,
        }
    }
}
