use crate::error::{ConsistencyError, Result};

use super::record::{
    AnyRecord, DynamicRecord, GraphRecord, NodeRecord, PropertyRecord, RecordKey,
    RelationshipGroupRecord, RelationshipRecord, SchemaRecord, StoreKind, TokenRecord, NO_ID,
};

/// Read access to every store the checker verifies.
///
/// Lookups never fail for free slots: an id that is out of range, negative
/// or not in use yields a record with `in_use == false`. Errors are reserved
/// for the backend being unable to read at all.
pub trait RecordAccess: Send + Sync {
    /// Reads a node record.
    fn node(&self, id: i64) -> Result<NodeRecord>;
    /// Reads a relationship record.
    fn relationship(&self, id: i64) -> Result<RelationshipRecord>;
    /// Reads a relationship group record.
    fn relationship_group(&self, id: i64) -> Result<RelationshipGroupRecord>;
    /// Reads a property record.
    fn property(&self, id: i64) -> Result<PropertyRecord>;
    /// Reads a token record from one of the token stores.
    fn token(&self, store: StoreKind, id: i64) -> Result<TokenRecord>;
    /// Reads a block from one of the dynamic stores.
    fn dynamic(&self, store: StoreKind, id: i64) -> Result<DynamicRecord>;
    /// Reads a schema record.
    fn schema(&self, id: i64) -> Result<SchemaRecord>;
    /// Reads the global graph record.
    fn graph(&self) -> Result<GraphRecord>;
    /// One past the highest id ever allocated in `store`.
    fn high_id(&self, store: StoreKind) -> i64;

    /// Reads the record behind a key, whatever its store.
    fn load(&self, key: RecordKey) -> Result<AnyRecord> {
        let record = match key.store {
            StoreKind::Node => AnyRecord::Node(self.node(key.id)?),
            StoreKind::Relationship => AnyRecord::Relationship(self.relationship(key.id)?),
            StoreKind::RelationshipGroup => {
                AnyRecord::RelationshipGroup(self.relationship_group(key.id)?)
            }
            StoreKind::Property => AnyRecord::Property(self.property(key.id)?),
            StoreKind::Schema => AnyRecord::Schema(self.schema(key.id)?),
            StoreKind::Graph => AnyRecord::Graph(self.graph()?),
            store if store.is_token() => AnyRecord::Token(self.token(store, key.id)?),
            store => AnyRecord::Dynamic(self.dynamic(store, key.id)?),
        };
        Ok(record)
    }
}

impl dyn RecordAccess + '_ {
    /// Raw iterator over a property chain starting at `first`.
    ///
    /// Follows `next` pointers without any cycle detection; callers walking
    /// untrusted chains track visited ids themselves.
    pub fn property_chain(&self, first: i64) -> PropertyChain<'_> {
        PropertyChain {
            records: self,
            next: first,
        }
    }
}

/// Raw walk over the `next` pointers of a property chain.
pub struct PropertyChain<'a> {
    records: &'a dyn RecordAccess,
    next: i64,
}

impl Iterator for PropertyChain<'_> {
    type Item = Result<PropertyRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next == NO_ID {
            return None;
        }
        match self.records.property(self.next) {
            Ok(record) => {
                self.next = record.next;
                Some(Ok(record))
            }
            Err(err) => {
                self.next = NO_ID;
                Some(Err(err))
            }
        }
    }
}

pub(crate) fn expect_token_store(store: StoreKind, id: i64) -> Result<()> {
    if store.is_token() {
        Ok(())
    } else {
        Err(ConsistencyError::Store {
            store,
            id,
            message: "not a token store".into(),
        })
    }
}

pub(crate) fn expect_dynamic_store(store: StoreKind, id: i64) -> Result<()> {
    if store.is_dynamic() {
        Ok(())
    } else {
        Err(ConsistencyError::Store {
            store,
            id,
            message: "not a dynamic store".into(),
        })
    }
}
