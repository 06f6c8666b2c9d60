//! Binary form of a schema rule as stored in a schema record.
//!
//! ```text
//! kind: u8 (1 index, 2 constraint)
//! name: varint length, UTF-8 bytes
//! entity: u8 (0 node, 1 relationship)
//! token: zigzag varint
//! properties: varint count, zigzag varint each
//! index:      unique: u8, owning constraint: zigzag varint (-1 none)
//! constraint: kind: u8 (0 uniqueness, 1 node key, 2 existence),
//!             owned index: zigzag varint (-1 none)
//! ```

use thiserror::Error;

use crate::primitives::bytes::buf::Cursor;
use crate::primitives::bytes::var;
use crate::store::NO_ID;

use super::rule::{
    ConstraintKind, ConstraintRule, EntityKind, IndexRule, SchemaDescriptor, SchemaRule,
};

const KIND_INDEX: u8 = 1;
const KIND_CONSTRAINT: u8 = 2;

/// Why a schema record payload is not a rule.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleDecodeError {
    /// Payload ends before the rule does.
    #[error("payload truncated")]
    Truncated,
    /// Bytes left after a complete rule.
    #[error("{0} trailing bytes")]
    TrailingBytes(usize),
    /// Unknown rule kind byte.
    #[error("unknown rule kind {0}")]
    UnknownKind(u8),
    /// Unknown entity byte.
    #[error("unknown entity kind {0}")]
    UnknownEntity(u8),
    /// Unknown constraint kind byte.
    #[error("unknown constraint kind {0}")]
    UnknownConstraintKind(u8),
    /// Name bytes are not UTF-8.
    #[error("rule name is not valid UTF-8")]
    InvalidName,
    /// Descriptor names no property keys.
    #[error("schema descriptor without properties")]
    NoProperties,
    /// Negative token or rule id other than "none".
    #[error("illegal id {0}")]
    IllegalId(i64),
    /// Only unique indexes can back a constraint.
    #[error("non-unique index declares owning constraint {0}")]
    OwnerOfNonUniqueIndex(i64),
    /// Existence constraints are not index backed.
    #[error("existence constraint declares owned index {0}")]
    IndexOfExistenceConstraint(i64),
}

/// Serializes `rule`.
pub fn encode_rule(rule: &SchemaRule) -> Vec<u8> {
    let mut out = Vec::new();
    match rule {
        SchemaRule::Index(index) => {
            out.push(KIND_INDEX);
            encode_common(&index.name, &index.schema, &mut out);
            out.push(u8::from(index.unique));
            var::encode_i64(index.owning_constraint.unwrap_or(NO_ID), &mut out);
        }
        SchemaRule::Constraint(constraint) => {
            out.push(KIND_CONSTRAINT);
            encode_common(&constraint.name, &constraint.schema, &mut out);
            out.push(encode_constraint_kind(constraint.kind));
            var::encode_i64(constraint.owned_index.unwrap_or(NO_ID), &mut out);
        }
    }
    out
}

/// Parses the rule stored in schema record `id`.
pub fn decode_rule(id: i64, data: &[u8]) -> Result<SchemaRule, RuleDecodeError> {
    let mut cursor = Cursor::new(data);
    let kind = cursor.u8().ok_or(RuleDecodeError::Truncated)?;
    if kind != KIND_INDEX && kind != KIND_CONSTRAINT {
        return Err(RuleDecodeError::UnknownKind(kind));
    }
    let name = decode_name(&mut cursor)?;
    let schema = decode_schema(&mut cursor)?;
    let flag = cursor.u8().ok_or(RuleDecodeError::Truncated)?;
    let reference = optional_id(&mut cursor)?;
    let rule = if kind == KIND_INDEX {
        let unique = flag != 0;
        if let (false, Some(owner)) = (unique, reference) {
            return Err(RuleDecodeError::OwnerOfNonUniqueIndex(owner));
        }
        SchemaRule::Index(IndexRule {
            id,
            name,
            schema,
            unique,
            owning_constraint: reference,
        })
    } else {
        let kind = decode_constraint_kind(flag)?;
        if let (false, Some(index)) = (kind.is_index_backed(), reference) {
            return Err(RuleDecodeError::IndexOfExistenceConstraint(index));
        }
        SchemaRule::Constraint(ConstraintRule {
            id,
            name,
            schema,
            kind,
            owned_index: reference,
        })
    };
    match cursor.remaining() {
        0 => Ok(rule),
        left => Err(RuleDecodeError::TrailingBytes(left)),
    }
}

fn encode_common(name: &str, schema: &SchemaDescriptor, out: &mut Vec<u8>) {
    var::encode_u64(name.len() as u64, out);
    out.extend_from_slice(name.as_bytes());
    out.push(encode_entity(schema.entity));
    var::encode_i64(schema.token, out);
    var::encode_u64(schema.properties.len() as u64, out);
    for key in &schema.properties {
        var::encode_i64(*key, out);
    }
}

fn decode_name(cursor: &mut Cursor<'_>) -> Result<String, RuleDecodeError> {
    let len = cursor.var_u64().ok_or(RuleDecodeError::Truncated)?;
    let len = usize::try_from(len).map_err(|_| RuleDecodeError::Truncated)?;
    let bytes = cursor.take(len).ok_or(RuleDecodeError::Truncated)?;
    String::from_utf8(bytes.to_vec()).map_err(|_| RuleDecodeError::InvalidName)
}

fn decode_schema(cursor: &mut Cursor<'_>) -> Result<SchemaDescriptor, RuleDecodeError> {
    let entity = decode_entity(cursor.u8().ok_or(RuleDecodeError::Truncated)?)?;
    let token = legal_id(cursor)?;
    let count = cursor.var_u64().ok_or(RuleDecodeError::Truncated)?;
    if count == 0 {
        return Err(RuleDecodeError::NoProperties);
    }
    // Each key takes at least one byte.
    if count > cursor.remaining() as u64 {
        return Err(RuleDecodeError::Truncated);
    }
    let properties = (0..count)
        .map(|_| legal_id(cursor))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(SchemaDescriptor {
        entity,
        token,
        properties,
    })
}

fn legal_id(cursor: &mut Cursor<'_>) -> Result<i64, RuleDecodeError> {
    match cursor.var_i64().ok_or(RuleDecodeError::Truncated)? {
        id if id < 0 => Err(RuleDecodeError::IllegalId(id)),
        id => Ok(id),
    }
}

fn optional_id(cursor: &mut Cursor<'_>) -> Result<Option<i64>, RuleDecodeError> {
    match cursor.var_i64().ok_or(RuleDecodeError::Truncated)? {
        NO_ID => Ok(None),
        id if id < 0 => Err(RuleDecodeError::IllegalId(id)),
        id => Ok(Some(id)),
    }
}

fn encode_entity(entity: EntityKind) -> u8 {
    match entity {
        EntityKind::Node => 0,
        EntityKind::Relationship => 1,
    }
}

fn decode_entity(byte: u8) -> Result<EntityKind, RuleDecodeError> {
    match byte {
        0 => Ok(EntityKind::Node),
        1 => Ok(EntityKind::Relationship),
        other => Err(RuleDecodeError::UnknownEntity(other)),
    }
}

fn encode_constraint_kind(kind: ConstraintKind) -> u8 {
    match kind {
        ConstraintKind::Uniqueness => 0,
        ConstraintKind::NodeKey => 1,
        ConstraintKind::Existence => 2,
    }
}

fn decode_constraint_kind(byte: u8) -> Result<ConstraintKind, RuleDecodeError> {
    match byte {
        0 => Ok(ConstraintKind::Uniqueness),
        1 => Ok(ConstraintKind::NodeKey),
        2 => Ok(ConstraintKind::Existence),
        other => Err(RuleDecodeError::UnknownConstraintKind(other)),
    }
}
