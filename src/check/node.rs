use std::collections::BTreeSet;

use crate::error::Result;
use crate::report::Inconsistency;
use crate::store::{
    LabelField, NodeRecord, RecordAccess, RecordKey, Side, StoreKind, NO_ID,
};

use super::chain::dynamic::{check_label_order, decode_labels, walk_dynamic_chain};
use super::engine::{
    CheckerEngine, ComparativeChecker, FindingSink, RecordCheck, Reference, Referenced,
};
use super::mandatory::MandatoryProperties;
use super::primitive::{start_property_chain, walk_from};
use super::{expect_dynamic, expect_group, expect_relationship, expect_token};

/// Checks of a node record: its relationship chain head, property chain
/// and labels.
#[derive(Debug, Default, Clone, Copy)]
pub struct NodeCheck<'m> {
    mandatory: Option<&'m MandatoryProperties>,
}

impl<'m> NodeCheck<'m> {
    /// A node check without mandatory property requirements.
    pub fn new() -> Self {
        Self { mandatory: None }
    }

    /// Also reports keys required by existence constraints on the node's
    /// labels.
    pub fn with_mandatory(mandatory: &'m MandatoryProperties) -> Self {
        Self {
            mandatory: Some(mandatory),
        }
    }

    fn required_keys(&self, record: &NodeRecord, records: &dyn RecordAccess) -> Result<BTreeSet<i64>> {
        let Some(mandatory) = self.mandatory.filter(|m| !m.is_empty()) else {
            return Ok(BTreeSet::new());
        };
        let labels = match &record.labels {
            LabelField::Inline(labels) => labels.clone(),
            LabelField::Dynamic(first) => {
                let first = records.dynamic(StoreKind::NodeLabels, *first)?;
                let chain = walk_dynamic_chain(first, records)?;
                if chain.is_intact() {
                    decode_labels(&chain.data).unwrap_or_default()
                } else {
                    Vec::new()
                }
            }
        };
        Ok(mandatory.for_labels(&labels))
    }
}

/// Comparative checks queued by [`NodeCheck`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeComparison {
    /// First relationship of a sparse node.
    NextRelationship,
    /// First relationship group of a dense node.
    FirstGroup,
    /// First record of the property chain, with the keys that must appear.
    Properties(BTreeSet<i64>),
    /// A label token.
    Label,
    /// First block of the dynamic label array.
    LabelChain,
}

impl RecordCheck<NodeRecord> for NodeCheck<'_> {
    type Comparison = NodeComparison;

    fn check(
        &self,
        record: &NodeRecord,
        engine: &mut CheckerEngine<'_, NodeRecord, NodeComparison>,
        records: &dyn RecordAccess,
    ) -> Result<()> {
        if !record.in_use {
            return Ok(());
        }

        if record.next_rel != NO_ID {
            let (store, comparison) = if record.dense {
                (StoreKind::RelationshipGroup, NodeComparison::FirstGroup)
            } else {
                (StoreKind::Relationship, NodeComparison::NextRelationship)
            };
            engine.comparative_check(
                Reference::Lookup(RecordKey::new(store, record.next_rel)),
                comparison,
            );
        }

        let required = self.required_keys(record, records)?;
        start_property_chain(engine, record.next_prop, required, NodeComparison::Properties);

        match &record.labels {
            LabelField::Inline(labels) => queue_labels(labels, engine),
            LabelField::Dynamic(first) => engine.comparative_check(
                Reference::Lookup(RecordKey::new(StoreKind::NodeLabels, *first)),
                NodeComparison::LabelChain,
            ),
        }
        Ok(())
    }
}

fn queue_labels(labels: &[i64], engine: &mut CheckerEngine<'_, NodeRecord, NodeComparison>) {
    check_label_order(labels, engine);
    for label in labels {
        engine.comparative_check(
            Reference::Lookup(RecordKey::new(StoreKind::LabelToken, *label)),
            NodeComparison::Label,
        );
    }
}

impl ComparativeChecker<NodeRecord> for NodeComparison {
    fn check_reference(
        &self,
        record: &NodeRecord,
        referenced: &Referenced,
        engine: &mut CheckerEngine<'_, NodeRecord, Self>,
        records: &dyn RecordAccess,
    ) -> Result<()> {
        match self {
            NodeComparison::NextRelationship => {
                let rel = expect_relationship(referenced)?;
                if !rel.in_use {
                    engine.report(Inconsistency::RelationshipNotInUse {
                        relationship: rel.id,
                    });
                    return Ok(());
                }
                let sides: Vec<Side> = rel.sides_of(record.id).collect();
                if sides.is_empty() {
                    engine.report(Inconsistency::RelationshipForOtherNode {
                        relationship: rel.id,
                    });
                }
                for side in sides {
                    if !rel.is_first(side) {
                        engine.report(Inconsistency::RelationshipNotFirstInChain {
                            side,
                            relationship: rel.id,
                        });
                    }
                }
            }
            NodeComparison::FirstGroup => {
                let group = expect_group(referenced)?;
                if !group.in_use {
                    engine.report(Inconsistency::RelationshipGroupNotInUse { group: group.id });
                } else if group.owner != record.id {
                    engine.report(Inconsistency::RelationshipGroupHasOtherOwner {
                        group: group.id,
                        owner: group.owner,
                    });
                }
            }
            NodeComparison::Properties(required) => {
                walk_from(referenced, required, engine, records)?;
            }
            NodeComparison::Label => {
                let token = expect_token(referenced)?;
                if !token.in_use {
                    engine.report(Inconsistency::LabelNotInUse { label: token.id });
                }
            }
            NodeComparison::LabelChain => {
                let first = expect_dynamic(referenced)?.clone();
                let first_id = first.id;
                let chain = walk_dynamic_chain(first, records)?;
                for record in &chain.not_in_use {
                    engine.report(Inconsistency::DynamicLabelRecordNotInUse { record: *record });
                }
                if let Some(record) = chain.cycle {
                    engine.report(Inconsistency::DynamicRecordChainCycle {
                        store: StoreKind::NodeLabels,
                        record,
                    });
                }
                if !chain.is_intact() {
                    return Ok(());
                }
                match decode_labels(&chain.data) {
                    Some(labels) => queue_labels(&labels, engine),
                    None => engine.report(Inconsistency::InvalidLabelArray { record: first_id }),
                }
            }
        }
        Ok(())
    }
}
