use serde::Serialize;

/// What kind of entity a schema rule applies to.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Nodes carrying a label.
    Node,
    /// Relationships of a type.
    Relationship,
}

/// The label or relationship type and the property keys a rule covers.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
pub struct SchemaDescriptor {
    /// Entity kind `token` belongs to.
    pub entity: EntityKind,
    /// Label token for nodes, relationship type token for relationships.
    pub token: i64,
    /// Property key tokens, in index order.
    pub properties: Vec<i64>,
}

impl SchemaDescriptor {
    /// A descriptor over nodes labelled `label`.
    pub fn node(label: i64, properties: impl Into<Vec<i64>>) -> Self {
        Self {
            entity: EntityKind::Node,
            token: label,
            properties: properties.into(),
        }
    }

    /// A descriptor over relationships of type `rel_type`.
    pub fn relationship(rel_type: i64, properties: impl Into<Vec<i64>>) -> Self {
        Self {
            entity: EntityKind::Relationship,
            token: rel_type,
            properties: properties.into(),
        }
    }
}

/// Kinds of constraints.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    /// Values are unique across the entities.
    Uniqueness,
    /// Values exist and are unique.
    NodeKey,
    /// Values exist.
    Existence,
}

impl ConstraintKind {
    /// Whether the constraint is enforced through a unique index it owns.
    pub fn is_index_backed(self) -> bool {
        matches!(self, ConstraintKind::Uniqueness | ConstraintKind::NodeKey)
    }

    /// Whether every covered entity must carry the properties.
    pub fn requires_existence(self) -> bool {
        matches!(self, ConstraintKind::NodeKey | ConstraintKind::Existence)
    }
}

/// A property index.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct IndexRule {
    /// Rule id, equal to the id of the schema record holding it.
    pub id: i64,
    /// User-visible name.
    pub name: String,
    /// What the index covers.
    pub schema: SchemaDescriptor,
    /// Whether the index enforces uniqueness.
    pub unique: bool,
    /// Constraint this unique index backs, if any.
    pub owning_constraint: Option<i64>,
}

impl IndexRule {
    /// A non-unique index.
    pub fn new(id: i64, name: impl Into<String>, schema: SchemaDescriptor) -> Self {
        Self {
            id,
            name: name.into(),
            schema,
            unique: false,
            owning_constraint: None,
        }
    }

    /// A unique index, optionally backing `owner`.
    pub fn unique(
        id: i64,
        name: impl Into<String>,
        schema: SchemaDescriptor,
        owner: Option<i64>,
    ) -> Self {
        Self {
            unique: true,
            owning_constraint: owner,
            ..Self::new(id, name, schema)
        }
    }
}

/// A constraint.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct ConstraintRule {
    /// Rule id, equal to the id of the schema record holding it.
    pub id: i64,
    /// User-visible name.
    pub name: String,
    /// What the constraint covers.
    pub schema: SchemaDescriptor,
    /// What it enforces.
    pub kind: ConstraintKind,
    /// Unique index enforcing the constraint, if index backed.
    pub owned_index: Option<i64>,
}

impl ConstraintRule {
    /// Creates a constraint rule.
    pub fn new(
        id: i64,
        name: impl Into<String>,
        schema: SchemaDescriptor,
        kind: ConstraintKind,
        owned_index: Option<i64>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            schema,
            kind,
            owned_index,
        }
    }
}

/// One decoded schema record.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum SchemaRule {
    /// An index.
    Index(IndexRule),
    /// A constraint.
    Constraint(ConstraintRule),
}

/// Identity of a rule's content, ignoring its id and name.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub(crate) enum ContentKey {
    Index {
        schema: SchemaDescriptor,
        unique: bool,
    },
    Constraint {
        schema: SchemaDescriptor,
        kind: ConstraintKind,
    },
}

impl SchemaRule {
    /// Rule id.
    pub fn id(&self) -> i64 {
        match self {
            SchemaRule::Index(rule) => rule.id,
            SchemaRule::Constraint(rule) => rule.id,
        }
    }

    /// Rule name.
    pub fn name(&self) -> &str {
        match self {
            SchemaRule::Index(rule) => &rule.name,
            SchemaRule::Constraint(rule) => &rule.name,
        }
    }

    /// Descriptor of what the rule covers.
    pub fn schema(&self) -> &SchemaDescriptor {
        match self {
            SchemaRule::Index(rule) => &rule.schema,
            SchemaRule::Constraint(rule) => &rule.schema,
        }
    }

    /// The rule as a unique index, if it is one.
    pub fn as_unique_index(&self) -> Option<&IndexRule> {
        match self {
            SchemaRule::Index(rule) if rule.unique => Some(rule),
            _ => None,
        }
    }

    pub(crate) fn content_key(&self) -> ContentKey {
        match self {
            SchemaRule::Index(rule) => ContentKey::Index {
                schema: rule.schema.clone(),
                unique: rule.unique,
            },
            SchemaRule::Constraint(rule) => ContentKey::Constraint {
                schema: rule.schema.clone(),
                kind: rule.kind,
            },
        }
    }

    /// Whether `self` and `other` are an index and the constraint owning it,
    /// as declared by either of them.
    pub fn pairs_with(&self, other: &SchemaRule) -> bool {
        let declared = |index: &IndexRule, constraint: &ConstraintRule| {
            index.owning_constraint == Some(constraint.id)
                || constraint.owned_index == Some(index.id)
        };
        match (self, other) {
            (SchemaRule::Index(index), SchemaRule::Constraint(constraint))
            | (SchemaRule::Constraint(constraint), SchemaRule::Index(index)) => {
                declared(index, constraint)
            }
            _ => false,
        }
    }
}
