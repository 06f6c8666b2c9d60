use std::fmt;

use serde::Serialize;

use crate::store::{GroupDirection, Link, RecordKey, Side, StoreKind};

/// One of the four chain pointer fields of a relationship.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
pub struct ChainField {
    /// Endpoint whose chain the pointer belongs to.
    pub side: Side,
    /// Direction of the pointer.
    pub link: Link,
}

impl ChainField {
    /// Creates a field descriptor.
    pub const fn new(side: Side, link: Link) -> Self {
        Self { side, link }
    }
}

impl fmt::Display for ChainField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = match self.side {
            Side::Source => "source",
            Side::Target => "target",
        };
        let link = match self.link {
            Link::Prev => "prev",
            Link::Next => "next",
        };
        write!(f, "{side}_{link}")
    }
}

/// How bad a finding is.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Suspicious but readable.
    Warning,
    /// Structural damage.
    Error,
}

/// Every structural violation the checker can report.
///
/// Ids carried by a variant name the *other* record involved; the record the
/// violation was found on is the subject of the surrounding [`Finding`].
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Inconsistency {
    // Property chains of nodes, relationships and the graph record.
    /// First property record of the chain is not in use.
    PropertyNotInUse { property: i64 },
    /// First property record of the chain has a `prev` pointer.
    PropertyNotFirstInChain { property: i64 },
    /// A key occurs more than once across the chain.
    PropertyKeyNotUniqueInChain { key: i64 },
    /// The chain loops back to a record it already visited.
    PropertyChainCircularReference { property: i64 },
    /// A key required by an existence constraint is absent.
    MissingMandatoryProperty { key: i64 },

    // Nodes.
    /// `next_rel` points at a relationship that is not in use.
    RelationshipNotInUse { relationship: i64 },
    /// `next_rel` points at a relationship that does not touch the node.
    RelationshipForOtherNode { relationship: i64 },
    /// `next_rel` points at a relationship that is not the head of the
    /// node's chain on `side`.
    RelationshipNotFirstInChain { side: Side, relationship: i64 },
    /// A label token is not in use.
    LabelNotInUse { label: i64 },
    /// A label occurs twice.
    LabelDuplicate { label: i64 },
    /// Labels are not sorted ascending.
    LabelsOutOfOrder { largest: i64, smallest: i64 },
    /// A block of the dynamic label chain is not in use.
    DynamicLabelRecordNotInUse { record: i64 },
    /// The dynamic label payload cannot be decoded.
    InvalidLabelArray { record: i64 },
    /// A dynamic chain revisits one of its own blocks.
    DynamicRecordChainCycle { store: StoreKind, record: i64 },
    /// Dense node points at a group that is not in use.
    RelationshipGroupNotInUse { group: i64 },
    /// Dense node points at a group owned by another node.
    RelationshipGroupHasOtherOwner { group: i64, owner: i64 },

    // Relationships.
    /// Relationship type id is negative.
    IllegalRelationshipType { rel_type: i64 },
    /// Relationship type token is not in use.
    RelationshipTypeNotInUse { rel_type: i64 },
    /// Endpoint id is negative.
    IllegalNode { side: Side, node: i64 },
    /// Endpoint node is not in use.
    NodeNotInUse { side: Side, node: i64 },
    /// The relationship heads the endpoint's chain but the node's
    /// `next_rel` points elsewhere.
    NodeDoesNotReferenceBack { side: Side, node: i64 },
    /// The endpoint node has no relationship chain at all.
    NodeHasNoRelationships { side: Side, node: i64 },
    /// A chain pointer targets a relationship that is not in use.
    ChainReferenceNotInUse { field: ChainField, relationship: i64 },
    /// A chain pointer targets a relationship of other nodes.
    ChainReferencesOtherNodes { field: ChainField, relationship: i64 },
    /// A chain pointer targets a relationship that does not point back.
    ChainDoesNotReferenceBack { field: ChainField, relationship: i64 },

    // Relationship groups.
    /// Next group is not in use.
    NextGroupNotInUse { group: i64 },
    /// Next group belongs to another node.
    NextGroupHasOtherOwner { group: i64, owner: i64 },
    /// Next group's type is not greater than this group's type.
    InvalidTypeSortOrder { group: i64 },
    /// Head relationship of a group chain is not in use.
    FirstRelationshipNotInUse {
        direction: GroupDirection,
        relationship: i64,
    },
    /// Head relationship of a group chain does not touch the owner the way
    /// the chain direction requires.
    FirstRelationshipForOtherNode {
        direction: GroupDirection,
        relationship: i64,
    },
    /// Head relationship of a group chain is not flagged first in chain.
    FirstRelationshipNotFirstInChain {
        direction: GroupDirection,
        relationship: i64,
    },
    /// Head relationship of a group chain has another type.
    FirstRelationshipOfOtherType {
        direction: GroupDirection,
        relationship: i64,
        rel_type: i64,
    },
    /// Group owner id is negative.
    IllegalGroupOwner { owner: i64 },
    /// Group owner node is not in use.
    GroupOwnerNotInUse { owner: i64 },

    // Property records.
    /// Block key is negative.
    InvalidPropertyKey { key: i64 },
    /// Block key token is not in use.
    PropertyKeyNotInUse { key: i64 },
    /// Block carries an unknown value type.
    InvalidPropertyType { key: i64, type_byte: u8 },
    /// Previous property record is not in use.
    PrevPropertyNotInUse { property: i64 },
    /// Next property record is not in use.
    NextPropertyNotInUse { property: i64 },
    /// Previous property record's `next` is not this record.
    PreviousDoesNotReferenceBack { property: i64 },
    /// Next property record's `prev` is not this record.
    NextDoesNotReferenceBack { property: i64 },
    /// String value block is not in use.
    StringNotInUse { key: i64, record: i64 },
    /// String value block is empty.
    StringEmpty { key: i64, record: i64 },
    /// Array value block is not in use.
    ArrayNotInUse { key: i64, record: i64 },
    /// Array value block is empty.
    ArrayEmpty { key: i64, record: i64 },
    /// Owner of the property is not in use.
    OwnerNotInUse { owner: RecordKey },
    /// Owner's property chain never reaches this record.
    OwnerDoesNotReferenceBack { owner: RecordKey },

    // Ownership, checked with property owners.
    /// `record`, owned by this record, is also owned by `owner`.
    MultipleOwners { record: RecordKey, owner: RecordKey },
    /// First record of a property chain that no node, relationship or
    /// graph record points at.
    OrphanPropertyChain,
    /// Dynamic block not referenced by another block, a property or a token.
    OrphanDynamicRecord,

    // Tokens.
    /// Name block of the token is not in use.
    NameBlockNotInUse { record: i64 },
    /// Token has no name.
    EmptyName,

    // Dynamic blocks.
    /// Next block is not in use.
    NextNotInUse { record: i64 },
    /// Block is not full yet links to a next block.
    RecordNotFullReferencesNext { length: usize },
    /// Payload is larger than the store's block size.
    InvalidLength { length: usize, block_size: usize },
    /// In-use block carries no data.
    EmptyBlock,
    /// Next block carries no data.
    EmptyNextBlock { record: i64 },
    /// Block links to itself.
    SelfReferentialNext,

    // Schema rules.
    /// Rule payload cannot be decoded.
    MalformedSchemaRule { reason: String },
    /// This rule points at `rule`, which does not point back.
    MissingObligation { rule: i64 },
    /// The index names `expected` as its owner but `found` claims it.
    ObligationMismatch { expected: i64, found: i64 },
    /// A constraint claims this index, which names no owner.
    ConstraintIndexRuleNotReferencingBack { constraint: i64 },
    /// The owned index of this constraint is not a unique index rule.
    OwnedIndexNotFound { index: i64 },
    /// Index-backed constraint with no owned index and no index claiming it.
    ConstraintWithoutIndex,
    /// Another rule already claimed `target`.
    DuplicateObligation { target: i64, other: i64 },
    /// Another rule has identical content.
    DuplicateRuleContent { other: i64 },
    /// Another, unrelated rule has the same name.
    DuplicateRuleName { other: i64 },
    /// Index name differs from the name of its owning constraint.
    ObligationNameMismatch { constraint: i64 },
    /// The index subsystem does not report the index online.
    IndexNotOnline,
}

impl Inconsistency {
    /// Severity of the violation.
    pub fn severity(&self) -> Severity {
        match self {
            Inconsistency::EmptyName
            | Inconsistency::EmptyBlock
            | Inconsistency::EmptyNextBlock { .. }
            | Inconsistency::RecordNotFullReferencesNext { .. }
            | Inconsistency::StringEmpty { .. }
            | Inconsistency::ArrayEmpty { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// Stable snake_case name of the violation kind.
    pub fn kind(&self) -> &'static str {
        use Inconsistency::*;
        match self {
            PropertyNotInUse { .. } => "property_not_in_use",
            PropertyNotFirstInChain { .. } => "property_not_first_in_chain",
            PropertyKeyNotUniqueInChain { .. } => "property_key_not_unique_in_chain",
            PropertyChainCircularReference { .. } => "property_chain_circular_reference",
            MissingMandatoryProperty { .. } => "missing_mandatory_property",
            RelationshipNotInUse { .. } => "relationship_not_in_use",
            RelationshipForOtherNode { .. } => "relationship_for_other_node",
            RelationshipNotFirstInChain { .. } => "relationship_not_first_in_chain",
            LabelNotInUse { .. } => "label_not_in_use",
            LabelDuplicate { .. } => "label_duplicate",
            LabelsOutOfOrder { .. } => "labels_out_of_order",
            DynamicLabelRecordNotInUse { .. } => "dynamic_label_record_not_in_use",
            InvalidLabelArray { .. } => "invalid_label_array",
            DynamicRecordChainCycle { .. } => "dynamic_record_chain_cycle",
            RelationshipGroupNotInUse { .. } => "relationship_group_not_in_use",
            RelationshipGroupHasOtherOwner { .. } => "relationship_group_has_other_owner",
            IllegalRelationshipType { .. } => "illegal_relationship_type",
            RelationshipTypeNotInUse { .. } => "relationship_type_not_in_use",
            IllegalNode { .. } => "illegal_node",
            NodeNotInUse { .. } => "node_not_in_use",
            NodeDoesNotReferenceBack { .. } => "node_does_not_reference_back",
            NodeHasNoRelationships { .. } => "node_has_no_relationships",
            ChainReferenceNotInUse { .. } => "chain_reference_not_in_use",
            ChainReferencesOtherNodes { .. } => "chain_references_other_nodes",
            ChainDoesNotReferenceBack { .. } => "chain_does_not_reference_back",
            NextGroupNotInUse { .. } => "next_group_not_in_use",
            NextGroupHasOtherOwner { .. } => "next_group_has_other_owner",
            InvalidTypeSortOrder { .. } => "invalid_type_sort_order",
            FirstRelationshipNotInUse { .. } => "first_relationship_not_in_use",
            FirstRelationshipForOtherNode { .. } => "first_relationship_for_other_node",
            FirstRelationshipNotFirstInChain { .. } => "first_relationship_not_first_in_chain",
            FirstRelationshipOfOtherType { .. } => "first_relationship_of_other_type",
            IllegalGroupOwner { .. } => "illegal_group_owner",
            GroupOwnerNotInUse { .. } => "group_owner_not_in_use",
            InvalidPropertyKey { .. } => "invalid_property_key",
            PropertyKeyNotInUse { .. } => "property_key_not_in_use",
            InvalidPropertyType { .. } => "invalid_property_type",
            PrevPropertyNotInUse { .. } => "prev_property_not_in_use",
            NextPropertyNotInUse { .. } => "next_property_not_in_use",
            PreviousDoesNotReferenceBack { .. } => "previous_does_not_reference_back",
            NextDoesNotReferenceBack { .. } => "next_does_not_reference_back",
            StringNotInUse { .. } => "string_not_in_use",
            StringEmpty { .. } => "string_empty",
            ArrayNotInUse { .. } => "array_not_in_use",
            ArrayEmpty { .. } => "array_empty",
            OwnerNotInUse { .. } => "owner_not_in_use",
            OwnerDoesNotReferenceBack { .. } => "owner_does_not_reference_back",
            MultipleOwners { .. } => "multiple_owners",
            OrphanPropertyChain => "orphan_property_chain",
            OrphanDynamicRecord => "orphan_dynamic_record",
            NameBlockNotInUse { .. } => "name_block_not_in_use",
            EmptyName => "empty_name",
            NextNotInUse { .. } => "next_not_in_use",
            RecordNotFullReferencesNext { .. } => "record_not_full_references_next",
            InvalidLength { .. } => "invalid_length",
            EmptyBlock => "empty_block",
            EmptyNextBlock { .. } => "empty_next_block",
            SelfReferentialNext => "self_referential_next",
            MalformedSchemaRule { .. } => "malformed_schema_rule",
            MissingObligation { .. } => "missing_obligation",
            ObligationMismatch { .. } => "obligation_mismatch",
            ConstraintIndexRuleNotReferencingBack { .. } => {
                "constraint_index_rule_not_referencing_back"
            }
            OwnedIndexNotFound { .. } => "owned_index_not_found",
            ConstraintWithoutIndex => "constraint_without_index",
            DuplicateObligation { .. } => "duplicate_obligation",
            DuplicateRuleContent { .. } => "duplicate_rule_content",
            DuplicateRuleName { .. } => "duplicate_rule_name",
            ObligationNameMismatch { .. } => "obligation_name_mismatch",
            IndexNotOnline => "index_not_online",
        }
    }
}

/// A violation attached to the record it was found on.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
pub struct Finding {
    /// Record under check when the violation was found.
    pub subject: RecordKey,
    /// What is wrong.
    pub inconsistency: Inconsistency,
}

impl Finding {
    /// Creates a finding.
    pub fn new(subject: RecordKey, inconsistency: Inconsistency) -> Self {
        Self {
            subject,
            inconsistency,
        }
    }

    /// Severity of the underlying violation.
    pub fn severity(&self) -> Severity {
        self.inconsistency.severity()
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}[{}]: {:?}",
            self.subject.store, self.subject.id, self.inconsistency
        )
    }
}
