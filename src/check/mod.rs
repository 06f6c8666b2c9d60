//! Record checks.
//!
//! Every record kind has a [`RecordCheck`] that validates what the record
//! shows on its own and queues [`ComparativeChecker`]s for every field that
//! points at another record. The [`CheckerEngine`] resolves the queue,
//! either from a record already at hand, from the store, or not at all when
//! the reference belongs to another pass.

pub mod chain;
mod dynamic;
mod engine;
mod group;
mod mandatory;
mod node;
pub mod ownership;
mod primitive;
mod property;
mod relationship;
pub mod relationship_chain;
mod token;

pub use dynamic::{DynamicCheck, DynamicComparison};
pub use engine::{
    check_record, CheckerEngine, ComparativeChecker, FindingSink, PendingCheck, RecordCheck,
    Reference, Referenced, ResolveStats,
};
pub use group::{GroupCheck, GroupComparison};
pub use mandatory::{MandatoryProperties, MandatoryPropertyScope};
pub use node::{NodeCheck, NodeComparison};
pub use ownership::{OwnerClaims, OwnerRegistry, Owning, OwnershipStats};
pub use primitive::{GraphCheck, GraphComparison};
pub use property::{PropertyCheck, PropertyComparison};
pub use relationship::{RelationshipCheck, RelationshipComparison};
pub use relationship_chain::{ChainComparison, RelationshipChainCheck, ScanDirection};
pub use token::{TokenCheck, TokenComparison};

use crate::error::{ConsistencyError, Result};
use crate::store::{
    AnyRecord, DynamicRecord, NodeRecord, PropertyRecord, RelationshipGroupRecord,
    RelationshipRecord, StoreKind, TokenRecord,
};

fn unexpected(expected: StoreKind, referenced: &Referenced) -> ConsistencyError {
    ConsistencyError::UnexpectedRecord {
        expected,
        found: referenced.key().store,
    }
}

macro_rules! expect_record {
    ($name:ident, $variant:ident, $ty:ty, $store:expr) => {
        pub(crate) fn $name(referenced: &Referenced) -> Result<&$ty> {
            match referenced {
                Referenced::Authoritative(AnyRecord::$variant(record)) => Ok(record),
                other => Err(unexpected($store, other)),
            }
        }
    };
}

expect_record!(expect_node, Node, NodeRecord, StoreKind::Node);
expect_record!(
    expect_relationship,
    Relationship,
    RelationshipRecord,
    StoreKind::Relationship
);
expect_record!(
    expect_group,
    RelationshipGroup,
    RelationshipGroupRecord,
    StoreKind::RelationshipGroup
);
expect_record!(expect_property, Property, PropertyRecord, StoreKind::Property);
expect_record!(expect_token, Token, TokenRecord, StoreKind::LabelToken);
expect_record!(expect_dynamic, Dynamic, DynamicRecord, StoreKind::String);
