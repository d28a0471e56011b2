//! Conversion between owned domain types and the C wire structures.
//!
//! Outbound values (queries, key lists) are encoded into a [`WireArena`] that
//! owns every string and array the C structures point into; the arena must
//! outlive the native call. Inbound values are deep-copied into owned types
//! and never retain a pointer into native memory.

use crate::error::{ToriiError, ToriiResult};
use crate::ffi::{
    CArray, CClause, CComparisonOperator, CCompositeClause, CEntity, CEnum, CFieldElement,
    CKeysClause, CLogicalOperator, CMember, CMemberClause, CModel, COption, CPrimitive, CQuery,
    CTy, CWorldMetadata,
};
use std::ffi::{CStr, CString, c_char};
use torii_types::{
    Clause, ComparisonOperator, CompositeClause, Entity, EnumOption, EnumValue, FieldElement,
    KeysClause, LogicalOperator, Member, MemberClause, Model, ModelMetadata, Primitive, Query,
    Struct, Ty, WorldMetadata,
};

// ── Outbound ─────────────────────────────────────────────────────

/// Owns the backing storage of encoded C structures.
#[derive(Default)]
pub(crate) struct WireArena {
    strings: Vec<CString>,
    felts: Vec<Vec<CFieldElement>>,
    clauses: Vec<Vec<CClause>>,
}

impl WireArena {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn string(&mut self, s: &str) -> ToriiResult<*const c_char> {
        let owned = c_string(s)?;
        let ptr = owned.as_ptr();
        self.strings.push(owned);
        Ok(ptr)
    }

    pub(crate) fn felts(&mut self, keys: &[FieldElement]) -> CArray<CFieldElement> {
        let mut encoded: Vec<CFieldElement> = keys.iter().map(felt_to_c).collect();
        let array = CArray {
            data: encoded.as_mut_ptr(),
            data_len: encoded.len(),
        };
        self.felts.push(encoded);
        array
    }

    pub(crate) fn keys_clause(&mut self, clause: &KeysClause) -> ToriiResult<CKeysClause> {
        Ok(CKeysClause {
            model: self.string(&clause.model)?,
            keys: self.felts(&clause.keys),
        })
    }

    pub(crate) fn keys_clauses(&mut self, clauses: &[KeysClause]) -> ToriiResult<Vec<CKeysClause>> {
        clauses.iter().map(|c| self.keys_clause(c)).collect()
    }

    pub(crate) fn clause(&mut self, clause: &Clause) -> ToriiResult<CClause> {
        Ok(match clause {
            Clause::Keys(keys) => CClause::Keys(self.keys_clause(keys)?),
            Clause::Member(member) => CClause::Member(CMemberClause {
                model: self.string(&member.model)?,
                member: self.string(&member.member)?,
                operator: comparison_to_c(member.operator),
                value: primitive_to_c(&member.value),
            }),
            Clause::Composite(composite) => {
                let mut nested = composite
                    .clauses
                    .iter()
                    .map(|c| self.clause(c))
                    .collect::<ToriiResult<Vec<_>>>()?;
                let clauses = CArray {
                    data: nested.as_mut_ptr(),
                    data_len: nested.len(),
                };
                self.clauses.push(nested);
                CClause::Composite(CCompositeClause {
                    model: self.string(&composite.model)?,
                    operator: logical_to_c(composite.operator),
                    clauses,
                })
            }
        })
    }

    pub(crate) fn query(&mut self, query: &Query) -> ToriiResult<CQuery> {
        let clause = match &query.clause {
            Some(clause) => COption::Some(self.clause(clause)?),
            None => COption::None,
        };
        Ok(CQuery {
            limit: query.limit,
            offset: query.offset,
            clause,
        })
    }
}

pub(crate) fn c_string(s: &str) -> ToriiResult<CString> {
    CString::new(s).map_err(|_| ToriiError::InvalidInput(format!("interior NUL byte in {s:?}")))
}

pub(crate) fn felt_to_c(felt: &FieldElement) -> CFieldElement {
    CFieldElement {
        data: felt.to_bytes_be(),
    }
}

pub(crate) fn primitive_to_c(value: &Primitive) -> CPrimitive {
    match *value {
        Primitive::I8(v) => CPrimitive::I8(v),
        Primitive::I16(v) => CPrimitive::I16(v),
        Primitive::I32(v) => CPrimitive::I32(v),
        Primitive::I64(v) => CPrimitive::I64(v),
        Primitive::I128(v) => CPrimitive::I128(v.to_be_bytes()),
        Primitive::U8(v) => CPrimitive::U8(v),
        Primitive::U16(v) => CPrimitive::U16(v),
        Primitive::U32(v) => CPrimitive::U32(v),
        Primitive::U64(v) => CPrimitive::U64(v),
        Primitive::U128(v) => CPrimitive::U128(v.to_be_bytes()),
        Primitive::USize(v) => CPrimitive::USize(v),
        Primitive::Bool(v) => CPrimitive::Bool(v),
        Primitive::Felt252(f) => CPrimitive::Felt252(felt_to_c(&f)),
        Primitive::ClassHash(f) => CPrimitive::ClassHash(felt_to_c(&f)),
        Primitive::ContractAddress(f) => CPrimitive::ContractAddress(felt_to_c(&f)),
    }
}

fn comparison_to_c(op: ComparisonOperator) -> CComparisonOperator {
    match op {
        ComparisonOperator::Eq => CComparisonOperator::Eq,
        ComparisonOperator::Neq => CComparisonOperator::Neq,
        ComparisonOperator::Gt => CComparisonOperator::Gt,
        ComparisonOperator::Gte => CComparisonOperator::Gte,
        ComparisonOperator::Lt => CComparisonOperator::Lt,
        ComparisonOperator::Lte => CComparisonOperator::Lte,
    }
}

fn logical_to_c(op: LogicalOperator) -> CLogicalOperator {
    match op {
        LogicalOperator::And => CLogicalOperator::And,
        LogicalOperator::Or => CLogicalOperator::Or,
    }
}

// ── Inbound ──────────────────────────────────────────────────────

fn decode_err(what: impl Into<String>) -> ToriiError {
    ToriiError::Decode(what.into())
}

/// # Safety
/// `ptr` must be null or point to a NUL-terminated string.
pub(crate) unsafe fn string_from_c(ptr: *const c_char) -> ToriiResult<String> {
    if ptr.is_null() {
        return Err(decode_err("null string pointer"));
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map(str::to_owned)
        .map_err(|_| decode_err("string is not valid UTF-8"))
}

/// # Safety
/// `array` must describe `data_len` initialized elements, or be empty.
pub(crate) unsafe fn slice_from_c<T>(array: &CArray<T>) -> ToriiResult<&[T]> {
    if array.data_len == 0 {
        return Ok(&[]);
    }
    if array.data.is_null() {
        return Err(decode_err(format!(
            "null array pointer with length {}",
            array.data_len
        )));
    }
    Ok(unsafe { std::slice::from_raw_parts(array.data, array.data_len) })
}

pub(crate) fn felt_from_c(felt: &CFieldElement) -> ToriiResult<FieldElement> {
    FieldElement::from_bytes_be(felt.data).map_err(|e| decode_err(e.to_string()))
}

pub(crate) fn primitive_from_c(value: &CPrimitive) -> ToriiResult<Primitive> {
    Ok(match *value {
        CPrimitive::I8(v) => Primitive::I8(v),
        CPrimitive::I16(v) => Primitive::I16(v),
        CPrimitive::I32(v) => Primitive::I32(v),
        CPrimitive::I64(v) => Primitive::I64(v),
        CPrimitive::I128(b) => Primitive::I128(i128::from_be_bytes(b)),
        CPrimitive::U8(v) => Primitive::U8(v),
        CPrimitive::U16(v) => Primitive::U16(v),
        CPrimitive::U32(v) => Primitive::U32(v),
        CPrimitive::U64(v) => Primitive::U64(v),
        CPrimitive::U128(b) => Primitive::U128(u128::from_be_bytes(b)),
        CPrimitive::USize(v) => Primitive::USize(v),
        CPrimitive::Bool(v) => Primitive::Bool(v),
        CPrimitive::Felt252(ref f) => Primitive::Felt252(felt_from_c(f)?),
        CPrimitive::ClassHash(ref f) => Primitive::ClassHash(felt_from_c(f)?),
        CPrimitive::ContractAddress(ref f) => Primitive::ContractAddress(felt_from_c(f)?),
    })
}

/// # Safety
/// `ty` and everything it points to must be valid native data.
pub(crate) unsafe fn ty_from_c(ty: &CTy) -> ToriiResult<Ty> {
    Ok(match ty {
        CTy::Primitive(p) => Ty::Primitive(primitive_from_c(p)?),
        CTy::Struct(s) => Ty::Struct(Struct {
            name: unsafe { string_from_c(s.name)? },
            children: unsafe { members_from_c(&s.children)? },
        }),
        CTy::Enum(e) => Ty::Enum(unsafe { enum_from_c(e)? }),
        CTy::Tuple(items) => Ty::Tuple(
            unsafe { slice_from_c(items)? }
                .iter()
                .map(|item| unsafe { ty_from_c(item) })
                .collect::<ToriiResult<_>>()?,
        ),
        CTy::ByteArray(s) => Ty::ByteArray(unsafe { string_from_c(*s)? }),
    })
}

/// # Safety
/// `ty` must be null or point to valid native data.
pub(crate) unsafe fn ty_ptr_from_c(ty: *const CTy) -> ToriiResult<Ty> {
    if ty.is_null() {
        return Err(decode_err("null type pointer"));
    }
    unsafe { ty_from_c(&*ty) }
}

unsafe fn enum_from_c(e: &CEnum) -> ToriiResult<EnumValue> {
    let options = unsafe { slice_from_c(&e.options)? }
        .iter()
        .map(|option| -> ToriiResult<EnumOption> {
            Ok(EnumOption {
                name: unsafe { string_from_c(option.name)? },
                ty: unsafe { ty_ptr_from_c(option.ty)? },
            })
        })
        .collect::<ToriiResult<_>>()?;
    Ok(EnumValue {
        name: unsafe { string_from_c(e.name)? },
        option: e.option,
        options,
    })
}

unsafe fn members_from_c(members: &CArray<CMember>) -> ToriiResult<Vec<Member>> {
    unsafe { slice_from_c(members)? }
        .iter()
        .map(|member| -> ToriiResult<Member> {
            Ok(Member {
                name: unsafe { string_from_c(member.name)? },
                ty: unsafe { ty_ptr_from_c(member.ty)? },
                key: member.key,
            })
        })
        .collect()
}

/// # Safety
/// `model` must be valid native data.
pub(crate) unsafe fn model_from_c(model: &CModel) -> ToriiResult<Model> {
    Ok(Model {
        name: unsafe { string_from_c(model.name)? },
        members: unsafe { members_from_c(&model.members)? },
    })
}

/// # Safety
/// `models` must be a valid native model array.
pub(crate) unsafe fn models_from_c(models: &CArray<CModel>) -> ToriiResult<Vec<Model>> {
    unsafe { slice_from_c(models)? }
        .iter()
        .map(|model| unsafe { model_from_c(model) })
        .collect()
}

/// # Safety
/// `entity` must be valid native data.
pub(crate) unsafe fn entity_from_c(entity: &CEntity) -> ToriiResult<Entity> {
    Ok(Entity {
        hashed_keys: felt_from_c(&entity.hashed_keys)?,
        models: unsafe { models_from_c(&entity.models)? },
    })
}

/// # Safety
/// `clause` must be valid native data.
pub(crate) unsafe fn keys_clause_from_c(clause: &CKeysClause) -> ToriiResult<KeysClause> {
    let keys = unsafe { slice_from_c(&clause.keys)? }
        .iter()
        .map(felt_from_c)
        .collect::<ToriiResult<_>>()?;
    Ok(KeysClause {
        model: unsafe { string_from_c(clause.model)? },
        keys,
    })
}

/// # Safety
/// `clause` must be valid native data.
pub(crate) unsafe fn clause_from_c(clause: &CClause) -> ToriiResult<Clause> {
    Ok(match clause {
        CClause::Keys(keys) => Clause::Keys(unsafe { keys_clause_from_c(keys)? }),
        CClause::Member(member) => Clause::Member(MemberClause {
            model: unsafe { string_from_c(member.model)? },
            member: unsafe { string_from_c(member.member)? },
            operator: comparison_from_c(member.operator),
            value: primitive_from_c(&member.value)?,
        }),
        CClause::Composite(composite) => Clause::Composite(CompositeClause {
            model: unsafe { string_from_c(composite.model)? },
            operator: match composite.operator {
                CLogicalOperator::And => LogicalOperator::And,
                CLogicalOperator::Or => LogicalOperator::Or,
            },
            clauses: unsafe { slice_from_c(&composite.clauses)? }
                .iter()
                .map(|c| unsafe { clause_from_c(c) })
                .collect::<ToriiResult<_>>()?,
        }),
    })
}

/// # Safety
/// `query` must be valid native data.
pub(crate) unsafe fn query_from_c(query: &CQuery) -> ToriiResult<Query> {
    let clause = match &query.clause {
        COption::Some(clause) => Some(unsafe { clause_from_c(clause)? }),
        COption::None => None,
    };
    Ok(Query {
        limit: query.limit,
        offset: query.offset,
        clause,
    })
}

fn comparison_from_c(op: CComparisonOperator) -> ComparisonOperator {
    match op {
        CComparisonOperator::Eq => ComparisonOperator::Eq,
        CComparisonOperator::Neq => ComparisonOperator::Neq,
        CComparisonOperator::Gt => ComparisonOperator::Gt,
        CComparisonOperator::Gte => ComparisonOperator::Gte,
        CComparisonOperator::Lt => ComparisonOperator::Lt,
        CComparisonOperator::Lte => ComparisonOperator::Lte,
    }
}

/// # Safety
/// `metadata` must be valid native data.
pub(crate) unsafe fn world_metadata_from_c(
    metadata: &CWorldMetadata,
) -> ToriiResult<WorldMetadata> {
    let models = unsafe { slice_from_c(&metadata.models)? }
        .iter()
        .map(|model| -> ToriiResult<ModelMetadata> {
            Ok(ModelMetadata {
                name: unsafe { string_from_c(model.name)? },
                class_hash: felt_from_c(&model.class_hash)?,
                packed_size: model.packed_size,
                unpacked_size: model.unpacked_size,
                schema: unsafe { ty_ptr_from_c(model.schema)? },
            })
        })
        .collect::<ToriiResult<_>>()?;
    Ok(WorldMetadata {
        world_address: felt_from_c(&metadata.world_address)?,
        world_class_hash: felt_from_c(&metadata.world_class_hash)?,
        models,
    })
}
