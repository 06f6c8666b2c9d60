//! Verification of the four chain pointers of every relationship.
//!
//! Within a pass window the relationship store is scanned twice. The
//! forward (ascending) scan checks pointers to ids at or below the current
//! record and, at each owned endpoint, caches the record's pointer to the
//! nearest higher id. When the scan reaches that higher record, its pointer
//! back is usually the one in the cache, so the comparison runs against a
//! [`Referenced::Synthetic`] record instead of a store read. The backward
//! scan does the same for pointers to higher ids.
//!
//! A synthetic comparison that fails is repeated once against the store, so
//! the findings are exactly those of [`ScanDirection::Full`], which reads
//! every referenced record.

use crate::cache::CacheClient;
use crate::error::Result;
use crate::report::{ChainField, Inconsistency};
use crate::store::{Link, RecordAccess, RecordKey, RelationshipRecord, Side, StoreKind, NO_ID};

use super::engine::{
    CheckerEngine, ComparativeChecker, FindingSink, RecordCheck, Reference, Referenced,
};
use super::expect_relationship;

const LINKS: [Link; 2] = [Link::Prev, Link::Next];

/// Which pointers a scan is responsible for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDirection {
    /// Ascending ids; checks pointers to ids `<=` the record's own.
    Forward,
    /// Descending ids; checks pointers to ids `>` the record's own.
    Backward,
    /// Any order; checks every pointer and caches nothing.
    Full,
}

impl ScanDirection {
    /// Whether pointer `value` of relationship `id` is checked by this scan.
    pub fn checks(self, id: i64, value: i64) -> bool {
        match self {
            ScanDirection::Forward => value <= id,
            ScanDirection::Backward => value > id,
            ScanDirection::Full => true,
        }
    }

    /// The pointer of `record` on `side` that a later record of this scan
    /// will point back from: the nearest higher id going forward, the
    /// nearest lower id going backward.
    fn pointer_to_cache(self, record: &RelationshipRecord, side: Side) -> Option<(Link, i64)> {
        let candidates = LINKS
            .into_iter()
            .map(|link| (link, record.pointer(side, link)))
            .filter(|(_, value)| *value >= 0);
        match self {
            ScanDirection::Forward => candidates
                .filter(|(_, value)| *value > record.id)
                .min_by_key(|(_, value)| *value),
            ScanDirection::Backward => candidates
                .filter(|(_, value)| *value < record.id)
                .max_by_key(|(_, value)| *value),
            ScanDirection::Full => None,
        }
    }
}

/// Chain pointer checks of one relationship within one scan, restricted to
/// the endpoints owned by `client`.
pub struct RelationshipChainCheck<'k, 'c> {
    client: &'k CacheClient<'c>,
    scan: ScanDirection,
}

impl<'k, 'c> RelationshipChainCheck<'k, 'c> {
    /// Creates a check for `scan` using `client` for ownership and caching.
    pub fn new(client: &'k CacheClient<'c>, scan: ScanDirection) -> Self {
        Self { client, scan }
    }
}

/// Back-reference check of one chain pointer.
#[derive(Clone, Copy)]
pub struct ChainComparison<'k, 'c> {
    field: ChainField,
    node: i64,
    client: &'k CacheClient<'c>,
}

impl<'k, 'c> RecordCheck<RelationshipRecord> for RelationshipChainCheck<'k, 'c> {
    type Comparison = ChainComparison<'k, 'c>;

    fn check(
        &self,
        record: &RelationshipRecord,
        engine: &mut CheckerEngine<'_, RelationshipRecord, Self::Comparison>,
        _records: &dyn RecordAccess,
    ) -> Result<()> {
        if !record.in_use {
            return Ok(());
        }
        for side in Side::BOTH {
            let node = record.node(side);
            let owned = self.client.within_bounds(node);
            if !owned {
                self.client.count_window_skip();
            }
            for link in LINKS {
                let value = record.pointer(side, link);
                if value == NO_ID {
                    continue;
                }
                let comparison = ChainComparison {
                    field: ChainField::new(side, link),
                    node,
                    client: self.client,
                };
                if !owned {
                    engine.comparative_check(Reference::Skip, comparison);
                    continue;
                }
                if !self.scan.checks(record.id, value) {
                    self.client.count_direction_skip();
                    continue;
                }
                let reference = match self.client.lookup(node, value, link.opposite()) {
                    Some(cached) => Reference::Direct(Referenced::Synthetic(cached)),
                    None => Reference::Lookup(RecordKey::new(StoreKind::Relationship, value)),
                };
                engine.comparative_check(reference, comparison);
            }
            if owned {
                if let Some((link, value)) = self.scan.pointer_to_cache(record, side) {
                    self.client.remember(node, side, record.id, link, value);
                }
            }
        }
        Ok(())
    }
}

impl ComparativeChecker<RelationshipRecord> for ChainComparison<'_, '_> {
    fn check_reference(
        &self,
        record: &RelationshipRecord,
        referenced: &Referenced,
        engine: &mut CheckerEngine<'_, RelationshipRecord, Self>,
        _records: &dyn RecordAccess,
    ) -> Result<()> {
        let back = self.field.link.opposite();
        if let Referenced::Synthetic(cached) = referenced {
            if cached.pointer != record.id {
                self.client.count_stale_retry();
                engine.comparative_check(
                    Reference::Lookup(RecordKey::new(StoreKind::Relationship, cached.id)),
                    *self,
                );
            }
            return Ok(());
        }

        let other = expect_relationship(referenced)?;
        let field = self.field;
        if !other.in_use {
            engine.report(Inconsistency::ChainReferenceNotInUse {
                field,
                relationship: other.id,
            });
            return Ok(());
        }
        let mut sides = other.sides_of(self.node).peekable();
        if sides.peek().is_none() {
            engine.report(Inconsistency::ChainReferencesOtherNodes {
                field,
                relationship: other.id,
            });
            return Ok(());
        }
        if !sides.any(|side| other.pointer(side, back) == record.id) {
            engine.report(Inconsistency::ChainDoesNotReferenceBack {
                field,
                relationship: other.id,
            });
        }
        Ok(())
    }
}
