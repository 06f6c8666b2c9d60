use crate::error::Result;
use crate::report::Inconsistency;
use crate::store::{
    GroupDirection, RecordAccess, RecordKey, RelationshipGroupRecord, RelationshipRecord,
    StoreKind, NO_ID,
};

use super::engine::{
    CheckerEngine, ComparativeChecker, FindingSink, RecordCheck, Reference, Referenced,
};
use super::{expect_group, expect_node, expect_relationship, expect_token};

const DIRECTIONS: [GroupDirection; 3] = [
    GroupDirection::Outgoing,
    GroupDirection::Incoming,
    GroupDirection::Loop,
];

/// Checks of a relationship group: type, next group, the three chain heads
/// and the owner.
#[derive(Debug, Default, Clone, Copy)]
pub struct GroupCheck;

/// Comparative checks queued by [`GroupCheck`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupComparison {
    /// The relationship type token.
    Type,
    /// The next group of the owner.
    Next,
    /// Head relationship of one chain.
    First(GroupDirection),
    /// The owning node.
    Owner,
}

/// Whether `rel` may head the `direction` chain of a group owned by `owner`:
/// `Some(first)` when it touches the owner the way the direction needs,
/// with `first` telling whether it is flagged head of the matching chain(s).
fn heads_chain(rel: &RelationshipRecord, direction: GroupDirection, owner: i64) -> Option<bool> {
    match direction {
        GroupDirection::Outgoing => {
            (rel.source == owner).then_some(rel.first_in_source_chain)
        }
        GroupDirection::Incoming => {
            (rel.target == owner).then_some(rel.first_in_target_chain)
        }
        GroupDirection::Loop => (rel.source == owner && rel.target == owner)
            .then_some(rel.first_in_source_chain && rel.first_in_target_chain),
    }
}

impl RecordCheck<RelationshipGroupRecord> for GroupCheck {
    type Comparison = GroupComparison;

    fn check(
        &self,
        record: &RelationshipGroupRecord,
        engine: &mut CheckerEngine<'_, RelationshipGroupRecord, GroupComparison>,
        _records: &dyn RecordAccess,
    ) -> Result<()> {
        if !record.in_use {
            return Ok(());
        }

        if record.rel_type < 0 {
            engine.report(Inconsistency::IllegalRelationshipType {
                rel_type: record.rel_type,
            });
        } else {
            engine.comparative_check(
                Reference::Lookup(RecordKey::new(
                    StoreKind::RelationshipTypeToken,
                    record.rel_type,
                )),
                GroupComparison::Type,
            );
        }

        if record.next != NO_ID {
            engine.comparative_check(
                Reference::Lookup(RecordKey::new(StoreKind::RelationshipGroup, record.next)),
                GroupComparison::Next,
            );
        }

        for direction in DIRECTIONS {
            let first = record.first(direction);
            if first != NO_ID {
                engine.comparative_check(
                    Reference::Lookup(RecordKey::new(StoreKind::Relationship, first)),
                    GroupComparison::First(direction),
                );
            }
        }

        if record.owner < 0 {
            engine.report(Inconsistency::IllegalGroupOwner {
                owner: record.owner,
            });
        } else {
            engine.comparative_check(
                Reference::Lookup(RecordKey::new(StoreKind::Node, record.owner)),
                GroupComparison::Owner,
            );
        }
        Ok(())
    }
}

impl ComparativeChecker<RelationshipGroupRecord> for GroupComparison {
    fn check_reference(
        &self,
        record: &RelationshipGroupRecord,
        referenced: &Referenced,
        engine: &mut CheckerEngine<'_, RelationshipGroupRecord, Self>,
        _records: &dyn RecordAccess,
    ) -> Result<()> {
        match *self {
            GroupComparison::Type => {
                let token = expect_token(referenced)?;
                if !token.in_use {
                    engine.report(Inconsistency::RelationshipTypeNotInUse {
                        rel_type: token.id,
                    });
                }
            }
            GroupComparison::Next => {
                let next = expect_group(referenced)?;
                if !next.in_use {
                    engine.report(Inconsistency::NextGroupNotInUse { group: next.id });
                    return Ok(());
                }
                if next.owner != record.owner {
                    engine.report(Inconsistency::NextGroupHasOtherOwner {
                        group: next.id,
                        owner: next.owner,
                    });
                }
                if next.rel_type <= record.rel_type {
                    engine.report(Inconsistency::InvalidTypeSortOrder { group: next.id });
                }
            }
            GroupComparison::First(direction) => {
                let rel = expect_relationship(referenced)?;
                if !rel.in_use {
                    engine.report(Inconsistency::FirstRelationshipNotInUse {
                        direction,
                        relationship: rel.id,
                    });
                    return Ok(());
                }
                if rel.rel_type != record.rel_type {
                    engine.report(Inconsistency::FirstRelationshipOfOtherType {
                        direction,
                        relationship: rel.id,
                        rel_type: rel.rel_type,
                    });
                }
                match heads_chain(rel, direction, record.owner) {
                    None => engine.report(Inconsistency::FirstRelationshipForOtherNode {
                        direction,
                        relationship: rel.id,
                    }),
                    Some(false) => engine.report(Inconsistency::FirstRelationshipNotFirstInChain {
                        direction,
                        relationship: rel.id,
                    }),
                    Some(true) => {}
                }
            }
            GroupComparison::Owner => {
                let owner = expect_node(referenced)?;
                if !owner.in_use {
                    engine.report(Inconsistency::GroupOwnerNotInUse { owner: owner.id });
                }
            }
        }
        Ok(())
    }
}
