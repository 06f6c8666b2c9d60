//! Record model and the accessor interface the checker reads through.
//!
//! The checker never decodes pages itself. Whatever owns the physical store
//! implements [`RecordAccess`]; [`InMemoryStore`] is the bundled
//! implementation used by tests, benches and embedders that decode records
//! up front.

mod access;
mod memory;
mod record;

pub use access::{PropertyChain, RecordAccess};
pub use memory::InMemoryStore;
pub use record::{
    is_none, AnyRecord, DynamicRecord, GraphRecord, GroupDirection, LabelField, Link, NodeRecord,
    PropertyBlock, PropertyOwner, PropertyRecord, PropertyValue, Record, RecordKey,
    RelationshipGroupRecord, RelationshipRecord, SchemaRecord, Side, StoreKind, TokenRecord,
    NO_ID,
};
