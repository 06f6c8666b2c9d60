use crate::error::Result;
use crate::report::Inconsistency;
use crate::store::{
    PropertyOwner, PropertyRecord, PropertyValue, RecordAccess, RecordKey, StoreKind, NO_ID,
};

use super::chain::dynamic::walk_dynamic_chain;
use super::chain::owner::check_owner;
use super::engine::{
    CheckerEngine, ComparativeChecker, FindingSink, RecordCheck, Reference, Referenced,
};
use super::{expect_dynamic, expect_property, expect_token, unexpected};

/// Checks of a property record: block keys and values, the neighbours in
/// its chain and, optionally, that its owner's chain reaches it.
#[derive(Debug, Default, Clone, Copy)]
pub struct PropertyCheck {
    check_owners: bool,
}

impl PropertyCheck {
    /// A property check without the owner walk.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables walking the owner's chain for every property record.
    pub fn check_owners(mut self, enabled: bool) -> Self {
        self.check_owners = enabled;
        self
    }
}

/// Comparative checks queued by [`PropertyCheck`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyComparison {
    /// Key token of a block.
    Key,
    /// First dynamic block of a string or array value stored under `key`.
    Value {
        /// Key of the block holding the value.
        key: i64,
    },
    /// Previous record of the chain.
    Prev,
    /// Next record of the chain.
    Next,
    /// The owning node, relationship or graph record.
    Owner,
}

impl RecordCheck<PropertyRecord> for PropertyCheck {
    type Comparison = PropertyComparison;

    fn check(
        &self,
        record: &PropertyRecord,
        engine: &mut CheckerEngine<'_, PropertyRecord, PropertyComparison>,
        _records: &dyn RecordAccess,
    ) -> Result<()> {
        if !record.in_use {
            return Ok(());
        }

        for block in &record.blocks {
            if block.key < 0 {
                engine.report(Inconsistency::InvalidPropertyKey { key: block.key });
            } else {
                engine.comparative_check(
                    Reference::Lookup(RecordKey::new(StoreKind::PropertyKeyToken, block.key)),
                    PropertyComparison::Key,
                );
            }
            let dynamic = match block.value {
                PropertyValue::String(first) => Some((StoreKind::String, first)),
                PropertyValue::Array(first) => Some((StoreKind::Array, first)),
                PropertyValue::Invalid(type_byte) => {
                    engine.report(Inconsistency::InvalidPropertyType {
                        key: block.key,
                        type_byte,
                    });
                    None
                }
                _ => None,
            };
            if let Some((store, first)) = dynamic {
                engine.comparative_check(
                    Reference::Lookup(RecordKey::new(store, first)),
                    PropertyComparison::Value { key: block.key },
                );
            }
        }

        if record.prev != NO_ID {
            engine.comparative_check(
                Reference::Lookup(RecordKey::new(StoreKind::Property, record.prev)),
                PropertyComparison::Prev,
            );
        }
        if record.next != NO_ID {
            engine.comparative_check(
                Reference::Lookup(RecordKey::new(StoreKind::Property, record.next)),
                PropertyComparison::Next,
            );
        }

        if self.check_owners {
            let owner = match record.owner {
                PropertyOwner::Node(id) => Some(RecordKey::new(StoreKind::Node, id)),
                PropertyOwner::Relationship(id) => {
                    Some(RecordKey::new(StoreKind::Relationship, id))
                }
                PropertyOwner::Graph => Some(RecordKey::new(StoreKind::Graph, 0)),
                PropertyOwner::Unknown => None,
            };
            if let Some(owner) = owner {
                engine.comparative_check(Reference::Lookup(owner), PropertyComparison::Owner);
            }
        }
        Ok(())
    }
}

impl ComparativeChecker<PropertyRecord> for PropertyComparison {
    fn check_reference(
        &self,
        record: &PropertyRecord,
        referenced: &Referenced,
        engine: &mut CheckerEngine<'_, PropertyRecord, Self>,
        records: &dyn RecordAccess,
    ) -> Result<()> {
        match *self {
            PropertyComparison::Key => {
                let token = expect_token(referenced)?;
                if !token.in_use {
                    engine.report(Inconsistency::PropertyKeyNotInUse { key: token.id });
                }
            }
            PropertyComparison::Value { key } => {
                let first = expect_dynamic(referenced)?.clone();
                let (store, first_id) = (first.store, first.id);
                let empty = first.in_use && first.data.is_empty();
                let chain = walk_dynamic_chain(first, records)?;
                for &block in &chain.not_in_use {
                    engine.report(if store == StoreKind::String {
                        Inconsistency::StringNotInUse { key, record: block }
                    } else {
                        Inconsistency::ArrayNotInUse { key, record: block }
                    });
                }
                if empty {
                    engine.report(if store == StoreKind::String {
                        Inconsistency::StringEmpty {
                            key,
                            record: first_id,
                        }
                    } else {
                        Inconsistency::ArrayEmpty {
                            key,
                            record: first_id,
                        }
                    });
                }
                if let Some(record) = chain.cycle {
                    engine.report(Inconsistency::DynamicRecordChainCycle { store, record });
                }
            }
            PropertyComparison::Prev => {
                let prev = expect_property(referenced)?;
                if !prev.in_use {
                    engine.report(Inconsistency::PrevPropertyNotInUse { property: prev.id });
                } else if prev.next != record.id {
                    engine.report(Inconsistency::PreviousDoesNotReferenceBack {
                        property: prev.id,
                    });
                }
            }
            PropertyComparison::Next => {
                let next = expect_property(referenced)?;
                if !next.in_use {
                    engine.report(Inconsistency::NextPropertyNotInUse { property: next.id });
                } else if next.prev != record.id {
                    engine.report(Inconsistency::NextDoesNotReferenceBack { property: next.id });
                }
            }
            PropertyComparison::Owner => match referenced {
                Referenced::Authoritative(owner) => check_owner(record, owner, records, engine)?,
                Referenced::Synthetic(_) => return Err(unexpected(StoreKind::Node, referenced)),
            },
        }
        Ok(())
    }
}
