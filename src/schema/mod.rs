//! Schema rules and their cross-rule consistency.
//!
//! Rules reference each other: a unique index names the constraint it
//! backs and the constraint names the index it owns. [`SchemaChecker`]
//! verifies these claims in two phases, the first producing an immutable
//! [`SchemaIndex`] that the second and the record checks consume.

mod checker;
pub mod codec;
mod rule;

pub use checker::{AllOnline, IndexAccessor, OnlineSet, SchemaChecker, SchemaIndex};
pub use codec::{decode_rule, encode_rule, RuleDecodeError};
pub use rule::{
    ConstraintKind, ConstraintRule, EntityKind, IndexRule, SchemaDescriptor, SchemaRule,
};
