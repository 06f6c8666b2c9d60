//! Single ownership of property chains and dynamic blocks.
//!
//! Every in-use record names the records it owns: nodes, relationships and
//! the graph record their first property, properties the first block of each
//! string or array value, tokens their first name block, dynamic blocks
//! their next block and nodes their dynamic label chain. Once every store
//! has been read, a record owned more than once is reported on each owner
//! after the lowest keyed one, and a property chain head or dynamic block
//! that nobody owns is reported as an orphan.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::debug;

use crate::report::{ConsistencyReporter, Finding, Inconsistency};
use crate::store::{
    DynamicRecord, GraphRecord, LabelField, NodeRecord, PropertyRecord, PropertyValue, Record,
    RecordKey, RelationshipGroupRecord, RelationshipRecord, StoreKind, TokenRecord, NO_ID,
};

/// Records that own other records through one of their fields.
pub trait Owning: Record {
    /// Records this one points at as their owner.
    fn owned(&self) -> SmallVec<[RecordKey; 2]>;

    /// Whether some other record must own this one.
    fn needs_owner(&self) -> bool {
        false
    }
}

fn first_property(next_prop: i64) -> SmallVec<[RecordKey; 2]> {
    let mut owned = SmallVec::new();
    if next_prop != NO_ID {
        owned.push(RecordKey::new(StoreKind::Property, next_prop));
    }
    owned
}

impl Owning for NodeRecord {
    fn owned(&self) -> SmallVec<[RecordKey; 2]> {
        let mut owned = first_property(self.next_prop);
        if let LabelField::Dynamic(first) = self.labels {
            if first != NO_ID {
                owned.push(RecordKey::new(StoreKind::NodeLabels, first));
            }
        }
        owned
    }
}

impl Owning for RelationshipRecord {
    fn owned(&self) -> SmallVec<[RecordKey; 2]> {
        first_property(self.next_prop)
    }
}

impl Owning for GraphRecord {
    fn owned(&self) -> SmallVec<[RecordKey; 2]> {
        first_property(self.next_prop)
    }
}

impl Owning for RelationshipGroupRecord {
    fn owned(&self) -> SmallVec<[RecordKey; 2]> {
        SmallVec::new()
    }
}

impl Owning for PropertyRecord {
    fn owned(&self) -> SmallVec<[RecordKey; 2]> {
        self.blocks
            .iter()
            .filter_map(|block| match block.value {
                PropertyValue::String(first) => Some(RecordKey::new(StoreKind::String, first)),
                PropertyValue::Array(first) => Some(RecordKey::new(StoreKind::Array, first)),
                _ => None,
            })
            .filter(|key| key.id != NO_ID)
            .collect()
    }

    fn needs_owner(&self) -> bool {
        self.prev == NO_ID
    }
}

impl Owning for TokenRecord {
    fn owned(&self) -> SmallVec<[RecordKey; 2]> {
        match self.store.name_store() {
            Some(store) if self.name != NO_ID => {
                SmallVec::from_elem(RecordKey::new(store, self.name), 1)
            }
            _ => SmallVec::new(),
        }
    }
}

impl Owning for DynamicRecord {
    fn owned(&self) -> SmallVec<[RecordKey; 2]> {
        // A block naming itself is reported by the block check.
        if self.next == NO_ID || self.next == self.id {
            return SmallVec::new();
        }
        SmallVec::from_elem(RecordKey::new(self.store, self.next), 1)
    }

    fn needs_owner(&self) -> bool {
        true
    }
}

/// Ownership seen by one worker.
#[derive(Debug, Default)]
pub struct OwnerClaims {
    owners: FxHashMap<RecordKey, SmallVec<[RecordKey; 1]>>,
    needs_owner: Vec<RecordKey>,
}

/// Counts from [`OwnerClaims::report`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OwnershipStats {
    /// Distinct records owned by at least one record.
    pub owned: u64,
    /// Records owned more than once.
    pub shared: u64,
    /// Records that needed an owner and had none.
    pub orphans: u64,
}

impl OwnerClaims {
    /// Notes what an in-use `record` owns and whether it needs an owner.
    pub fn observe<R: Owning>(&mut self, record: &R) {
        if !record.in_use() {
            return;
        }
        let key = record.key();
        for owned in record.owned() {
            let owners = self.owners.entry(owned).or_default();
            if !owners.contains(&key) {
                owners.push(key);
            }
        }
        if record.needs_owner() {
            self.needs_owner.push(key);
        }
    }

    /// Folds the claims of another worker into these.
    pub fn merge(&mut self, other: OwnerClaims) {
        for (owned, owners) in other.owners {
            let merged = self.owners.entry(owned).or_default();
            for owner in owners {
                if !merged.contains(&owner) {
                    merged.push(owner);
                }
            }
        }
        self.needs_owner.extend(other.needs_owner);
    }

    /// Reports shared and orphaned records in key order.
    pub fn report(self, reporter: &dyn ConsistencyReporter) -> OwnershipStats {
        let mut stats = OwnershipStats {
            owned: self.owners.len() as u64,
            ..OwnershipStats::default()
        };

        let mut shared: Vec<_> = self
            .owners
            .iter()
            .filter(|(_, owners)| owners.len() > 1)
            .collect();
        shared.sort_unstable_by_key(|(owned, _)| **owned);
        for (owned, owners) in shared {
            stats.shared += 1;
            let mut owners = owners.clone();
            owners.sort_unstable();
            let first = owners[0];
            for owner in &owners[1..] {
                reporter.report(Finding::new(
                    *owner,
                    Inconsistency::MultipleOwners {
                        record: *owned,
                        owner: first,
                    },
                ));
            }
        }

        let mut orphans: Vec<_> = self
            .needs_owner
            .into_iter()
            .filter(|key| !self.owners.contains_key(key))
            .collect();
        orphans.sort_unstable();
        for key in orphans {
            stats.orphans += 1;
            let inconsistency = if key.store == StoreKind::Property {
                Inconsistency::OrphanPropertyChain
            } else {
                Inconsistency::OrphanDynamicRecord
            };
            reporter.report(Finding::new(key, inconsistency));
        }
        debug!(
            owned = stats.owned,
            shared = stats.shared,
            orphans = stats.orphans,
            "consistency.records.owners"
        );
        stats
    }
}

/// Claims shared by the workers of a record run.
#[derive(Debug, Default)]
pub struct OwnerRegistry {
    claims: Mutex<OwnerClaims>,
}

impl OwnerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the claims one worker collected.
    pub fn absorb(&self, claims: OwnerClaims) {
        self.claims.lock().merge(claims);
    }

    /// The claims of every worker.
    pub fn into_claims(self) -> OwnerClaims {
        self.claims.into_inner()
    }
}
