use std::collections::BTreeSet;

use crate::error::Result;
use crate::report::Inconsistency;
use crate::store::{RecordAccess, RecordKey, RelationshipRecord, Side, StoreKind, NO_ID};

use super::engine::{
    CheckerEngine, ComparativeChecker, FindingSink, RecordCheck, Reference, Referenced,
};
use super::mandatory::MandatoryProperties;
use super::primitive::{start_property_chain, walk_from};
use super::{expect_node, expect_token};

/// Checks of a relationship record that do not involve its chain pointers:
/// type, both endpoint nodes and the property chain. Chain pointers are
/// verified by [`super::RelationshipChainCheck`].
#[derive(Debug, Default, Clone, Copy)]
pub struct RelationshipCheck<'m> {
    mandatory: Option<&'m MandatoryProperties>,
}

impl<'m> RelationshipCheck<'m> {
    /// A relationship check without mandatory property requirements.
    pub fn new() -> Self {
        Self { mandatory: None }
    }

    /// Also reports keys required by existence constraints on the type.
    pub fn with_mandatory(mandatory: &'m MandatoryProperties) -> Self {
        Self {
            mandatory: Some(mandatory),
        }
    }
}

/// Comparative checks queued by [`RelationshipCheck`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationshipComparison {
    /// The relationship type token.
    Type,
    /// The node at one endpoint.
    Node(Side),
    /// First record of the property chain, with the keys that must appear.
    Properties(BTreeSet<i64>),
}

impl RecordCheck<RelationshipRecord> for RelationshipCheck<'_> {
    type Comparison = RelationshipComparison;

    fn check(
        &self,
        record: &RelationshipRecord,
        engine: &mut CheckerEngine<'_, RelationshipRecord, RelationshipComparison>,
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
                RelationshipComparison::Type,
            );
        }

        for side in Side::BOTH {
            let node = record.node(side);
            if node < 0 {
                engine.report(Inconsistency::IllegalNode { side, node });
            } else {
                engine.comparative_check(
                    Reference::Lookup(RecordKey::new(StoreKind::Node, node)),
                    RelationshipComparison::Node(side),
                );
            }
        }

        let required = match self.mandatory {
            Some(mandatory) if record.rel_type >= 0 => {
                mandatory.for_relationship_type(record.rel_type)
            }
            _ => BTreeSet::new(),
        };
        start_property_chain(
            engine,
            record.next_prop,
            required,
            RelationshipComparison::Properties,
        );
        Ok(())
    }
}

impl ComparativeChecker<RelationshipRecord> for RelationshipComparison {
    fn check_reference(
        &self,
        record: &RelationshipRecord,
        referenced: &Referenced,
        engine: &mut CheckerEngine<'_, RelationshipRecord, Self>,
        records: &dyn RecordAccess,
    ) -> Result<()> {
        match self {
            RelationshipComparison::Type => {
                let token = expect_token(referenced)?;
                if !token.in_use {
                    engine.report(Inconsistency::RelationshipTypeNotInUse {
                        rel_type: token.id,
                    });
                }
            }
            RelationshipComparison::Node(side) => {
                let side = *side;
                let node = expect_node(referenced)?;
                if !node.in_use {
                    engine.report(Inconsistency::NodeNotInUse {
                        side,
                        node: node.id,
                    });
                } else if node.dense {
                    // Dense nodes reach their relationships through groups.
                } else if record.is_first(side) {
                    if node.next_rel != record.id {
                        engine.report(Inconsistency::NodeDoesNotReferenceBack {
                            side,
                            node: node.id,
                        });
                    }
                } else if node.next_rel == NO_ID {
                    engine.report(Inconsistency::NodeHasNoRelationships {
                        side,
                        node: node.id,
                    });
                }
            }
            RelationshipComparison::Properties(required) => {
                walk_from(referenced, required, engine, records)?;
            }
        }
        Ok(())
    }
}
