use serde::Serialize;

/// Raw id value meaning "no record".
pub const NO_ID: i64 = -1;

/// Returns true when `id` is the [`NO_ID`] sentinel.
#[inline]
pub fn is_none(id: i64) -> bool {
    id == NO_ID
}

/// The store a record lives in.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// Node records.
    Node,
    /// Relationship records.
    Relationship,
    /// Relationship group records of dense nodes.
    RelationshipGroup,
    /// Property records.
    Property,
    /// Label tokens.
    LabelToken,
    /// Relationship type tokens.
    RelationshipTypeToken,
    /// Property key tokens.
    PropertyKeyToken,
    /// Dynamic blocks of long string values.
    String,
    /// Dynamic blocks of array values.
    Array,
    /// Dynamic blocks of node label arrays.
    NodeLabels,
    /// Dynamic blocks of label token names.
    LabelName,
    /// Dynamic blocks of relationship type token names.
    RelationshipTypeName,
    /// Dynamic blocks of property key token names.
    PropertyKeyName,
    /// Serialized schema rules.
    Schema,
    /// The single global graph record.
    Graph,
}

impl StoreKind {
    /// Stores that hold [`DynamicRecord`]s.
    pub const DYNAMIC: [StoreKind; 6] = [
        StoreKind::String,
        StoreKind::Array,
        StoreKind::NodeLabels,
        StoreKind::LabelName,
        StoreKind::RelationshipTypeName,
        StoreKind::PropertyKeyName,
    ];

    /// Stores that hold [`TokenRecord`]s.
    pub const TOKENS: [StoreKind; 3] = [
        StoreKind::LabelToken,
        StoreKind::RelationshipTypeToken,
        StoreKind::PropertyKeyToken,
    ];

    /// Whether the store holds dynamic records.
    pub fn is_dynamic(self) -> bool {
        Self::DYNAMIC.contains(&self)
    }

    /// Whether the store holds token records.
    pub fn is_token(self) -> bool {
        Self::TOKENS.contains(&self)
    }

    /// Dynamic store holding the names of a token store.
    pub fn name_store(self) -> Option<StoreKind> {
        match self {
            StoreKind::LabelToken => Some(StoreKind::LabelName),
            StoreKind::RelationshipTypeToken => Some(StoreKind::RelationshipTypeName),
            StoreKind::PropertyKeyToken => Some(StoreKind::PropertyKeyName),
            _ => None,
        }
    }
}

/// Identifies one record: the store plus the raw id.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
pub struct RecordKey {
    /// Store of the record.
    pub store: StoreKind,
    /// Raw record id.
    pub id: i64,
}

impl RecordKey {
    /// Creates a key.
    pub const fn new(store: StoreKind, id: i64) -> Self {
        Self { store, id }
    }
}

/// Endpoint of a relationship.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// The first (start) node.
    Source,
    /// The second (end) node.
    Target,
}

impl Side {
    /// Both sides, source first.
    pub const BOTH: [Side; 2] = [Side::Source, Side::Target];
}

/// Direction of a link inside a doubly-linked relationship chain.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Link {
    /// Pointer towards the head of the chain.
    Prev,
    /// Pointer towards the tail of the chain.
    Next,
}

impl Link {
    /// The link that points back along a pointer of this kind.
    pub fn opposite(self) -> Link {
        match self {
            Link::Prev => Link::Next,
            Link::Next => Link::Prev,
        }
    }
}

/// Labels of a node, either inlined or stored in a dynamic label chain.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum LabelField {
    /// Label token ids stored in the node record.
    Inline(Vec<i64>),
    /// First record of a [`StoreKind::NodeLabels`] chain.
    Dynamic(i64),
}

impl Default for LabelField {
    fn default() -> Self {
        LabelField::Inline(Vec::new())
    }
}

/// A node record.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct NodeRecord {
    /// Record id.
    pub id: i64,
    /// Whether the record holds live data.
    pub in_use: bool,
    /// Dense nodes point at a relationship group chain instead of a relationship.
    pub dense: bool,
    /// First relationship (sparse) or first group (dense).
    pub next_rel: i64,
    /// First property record.
    pub next_prop: i64,
    /// Node labels.
    pub labels: LabelField,
}

impl NodeRecord {
    /// An in-use sparse node.
    pub fn new(id: i64, next_rel: i64, next_prop: i64) -> Self {
        Self {
            id,
            in_use: true,
            dense: false,
            next_rel,
            next_prop,
            labels: LabelField::default(),
        }
    }

    /// A record slot holding no data.
    pub fn unused(id: i64) -> Self {
        Self {
            in_use: false,
            ..Self::new(id, NO_ID, NO_ID)
        }
    }

    /// Marks the node dense; `next_rel` then points at a relationship group.
    pub fn dense(mut self) -> Self {
        self.dense = true;
        self
    }

    /// Replaces the label field.
    pub fn with_labels(mut self, labels: LabelField) -> Self {
        self.labels = labels;
        self
    }
}

/// A relationship record, linked into one chain per endpoint.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RelationshipRecord {
    /// Record id.
    pub id: i64,
    /// Whether the record holds live data.
    pub in_use: bool,
    /// Start node.
    pub source: i64,
    /// End node.
    pub target: i64,
    /// Relationship type token.
    pub rel_type: i64,
    /// Previous relationship in the source chain, or the chain length when first.
    pub source_prev: i64,
    /// Next relationship in the source chain.
    pub source_next: i64,
    /// Previous relationship in the target chain, or the chain length when first.
    pub target_prev: i64,
    /// Next relationship in the target chain.
    pub target_next: i64,
    /// Whether this is the head of the source node's chain.
    pub first_in_source_chain: bool,
    /// Whether this is the head of the target node's chain.
    pub first_in_target_chain: bool,
    /// First property record.
    pub next_prop: i64,
}

impl RelationshipRecord {
    /// An in-use relationship that is alone in both of its chains.
    pub fn new(id: i64, source: i64, target: i64, rel_type: i64) -> Self {
        Self {
            id,
            in_use: true,
            source,
            target,
            rel_type,
            source_prev: 1,
            source_next: NO_ID,
            target_prev: 1,
            target_next: NO_ID,
            first_in_source_chain: true,
            first_in_target_chain: true,
            next_prop: NO_ID,
        }
    }

    /// A record slot holding no data.
    pub fn unused(id: i64) -> Self {
        Self {
            in_use: false,
            first_in_source_chain: false,
            first_in_target_chain: false,
            source_prev: NO_ID,
            target_prev: NO_ID,
            ..Self::new(id, NO_ID, NO_ID, NO_ID)
        }
    }

    /// Node at `side`.
    pub fn node(&self, side: Side) -> i64 {
        match side {
            Side::Source => self.source,
            Side::Target => self.target,
        }
    }

    /// Whether the record heads the chain of `side`.
    pub fn is_first(&self, side: Side) -> bool {
        match side {
            Side::Source => self.first_in_source_chain,
            Side::Target => self.first_in_target_chain,
        }
    }

    /// Raw value of a chain pointer field.
    pub fn raw_pointer(&self, side: Side, link: Link) -> i64 {
        match (side, link) {
            (Side::Source, Link::Prev) => self.source_prev,
            (Side::Source, Link::Next) => self.source_next,
            (Side::Target, Link::Prev) => self.target_prev,
            (Side::Target, Link::Next) => self.target_next,
        }
    }

    /// Chain pointer of `side`/`link`, or [`NO_ID`] for the `prev` field of
    /// a chain head, which stores the chain length instead.
    pub fn pointer(&self, side: Side, link: Link) -> i64 {
        if link == Link::Prev && self.is_first(side) {
            NO_ID
        } else {
            self.raw_pointer(side, link)
        }
    }

    /// Sets a chain pointer field.
    pub fn set_pointer(&mut self, side: Side, link: Link, value: i64) {
        match (side, link) {
            (Side::Source, Link::Prev) => self.source_prev = value,
            (Side::Source, Link::Next) => self.source_next = value,
            (Side::Target, Link::Prev) => self.target_prev = value,
            (Side::Target, Link::Next) => self.target_next = value,
        }
    }

    /// Sets the first-in-chain flag of `side`.
    pub fn set_first(&mut self, side: Side, first: bool) {
        match side {
            Side::Source => self.first_in_source_chain = first,
            Side::Target => self.first_in_target_chain = first,
        }
    }

    /// Sides whose node equals `node`, source first.
    pub fn sides_of(&self, node: i64) -> impl Iterator<Item = Side> + '_ {
        Side::BOTH.into_iter().filter(move |side| self.node(*side) == node)
    }
}

/// Which relationship list of a group a field refers to.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupDirection {
    /// Relationships starting at the owner.
    Outgoing,
    /// Relationships ending at the owner.
    Incoming,
    /// Relationships starting and ending at the owner.
    Loop,
}

/// A relationship group record: per-type chain heads of a dense node.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RelationshipGroupRecord {
    /// Record id.
    pub id: i64,
    /// Whether the record holds live data.
    pub in_use: bool,
    /// Relationship type of every relationship in this group.
    pub rel_type: i64,
    /// Next group of the same owner, sorted by type.
    pub next: i64,
    /// Head of the outgoing chain.
    pub first_out: i64,
    /// Head of the incoming chain.
    pub first_in: i64,
    /// Head of the loop chain.
    pub first_loop: i64,
    /// Owning dense node.
    pub owner: i64,
}

impl RelationshipGroupRecord {
    /// An in-use group with empty chains.
    pub fn new(id: i64, rel_type: i64, owner: i64) -> Self {
        Self {
            id,
            in_use: true,
            rel_type,
            next: NO_ID,
            first_out: NO_ID,
            first_in: NO_ID,
            first_loop: NO_ID,
            owner,
        }
    }

    /// A record slot holding no data.
    pub fn unused(id: i64) -> Self {
        Self {
            in_use: false,
            ..Self::new(id, NO_ID, NO_ID)
        }
    }

    /// Chain head for `direction`.
    pub fn first(&self, direction: GroupDirection) -> i64 {
        match direction {
            GroupDirection::Outgoing => self.first_out,
            GroupDirection::Incoming => self.first_in,
            GroupDirection::Loop => self.first_loop,
        }
    }
}

/// Entity owning a property chain.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PropertyOwner {
    /// Owned by a node.
    Node(i64),
    /// Owned by a relationship.
    Relationship(i64),
    /// Owned by the global graph record.
    Graph,
    /// No owner recorded.
    Unknown,
}

/// Value stored in a property block.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Floating point.
    Float(f64),
    /// String short enough to live in the block.
    ShortString(String),
    /// First record of a [`StoreKind::String`] chain.
    String(i64),
    /// First record of a [`StoreKind::Array`] chain.
    Array(i64),
    /// A type byte the store does not recognise.
    Invalid(u8),
}

/// One key/value pair of a property record.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyBlock {
    /// Property key token.
    pub key: i64,
    /// Stored value.
    pub value: PropertyValue,
}

impl PropertyBlock {
    /// Creates a block.
    pub fn new(key: i64, value: PropertyValue) -> Self {
        Self { key, value }
    }
}

/// A property record, a node in a singly-walked, doubly-linked chain.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyRecord {
    /// Record id.
    pub id: i64,
    /// Whether the record holds live data.
    pub in_use: bool,
    /// Previous record in the chain.
    pub prev: i64,
    /// Next record in the chain.
    pub next: i64,
    /// Owning entity.
    pub owner: PropertyOwner,
    /// Key/value blocks.
    pub blocks: Vec<PropertyBlock>,
}

impl PropertyRecord {
    /// An in-use record with no blocks and no neighbours.
    pub fn new(id: i64, owner: PropertyOwner) -> Self {
        Self {
            id,
            in_use: true,
            prev: NO_ID,
            next: NO_ID,
            owner,
            blocks: Vec::new(),
        }
    }

    /// A record slot holding no data.
    pub fn unused(id: i64) -> Self {
        Self {
            in_use: false,
            ..Self::new(id, PropertyOwner::Unknown)
        }
    }

    /// Appends a block.
    pub fn with_block(mut self, key: i64, value: PropertyValue) -> Self {
        self.blocks.push(PropertyBlock::new(key, value));
        self
    }
}

/// A label, relationship type or property key token.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TokenRecord {
    /// Token store this record belongs to.
    pub store: StoreKind,
    /// Record id.
    pub id: i64,
    /// Whether the record holds live data.
    pub in_use: bool,
    /// First record of the name chain.
    pub name: i64,
}

impl TokenRecord {
    /// An in-use token.
    pub fn new(store: StoreKind, id: i64, name: i64) -> Self {
        Self {
            store,
            id,
            in_use: true,
            name,
        }
    }

    /// A record slot holding no data.
    pub fn unused(store: StoreKind, id: i64) -> Self {
        Self {
            in_use: false,
            ..Self::new(store, id, NO_ID)
        }
    }
}

/// A block of a dynamic (overflow) chain.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DynamicRecord {
    /// Dynamic store this record belongs to.
    pub store: StoreKind,
    /// Record id.
    pub id: i64,
    /// Whether the record holds live data.
    pub in_use: bool,
    /// Next block of the chain.
    pub next: i64,
    /// Payload bytes.
    pub data: Vec<u8>,
}

impl DynamicRecord {
    /// An in-use block.
    pub fn new(store: StoreKind, id: i64, next: i64, data: Vec<u8>) -> Self {
        Self {
            store,
            id,
            in_use: true,
            next,
            data,
        }
    }

    /// A record slot holding no data.
    pub fn unused(store: StoreKind, id: i64) -> Self {
        Self {
            in_use: false,
            ..Self::new(store, id, NO_ID, Vec::new())
        }
    }
}

/// A serialized schema rule.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SchemaRecord {
    /// Record id, also the rule id.
    pub id: i64,
    /// Whether the record holds live data.
    pub in_use: bool,
    /// Serialized rule, see [`crate::schema::codec`].
    pub data: Vec<u8>,
}

impl SchemaRecord {
    /// An in-use schema record.
    pub fn new(id: i64, data: Vec<u8>) -> Self {
        Self {
            id,
            in_use: true,
            data,
        }
    }

    /// A record slot holding no data.
    pub fn unused(id: i64) -> Self {
        Self {
            id,
            in_use: false,
            data: Vec::new(),
        }
    }
}

/// The global graph record, owner of graph-level properties.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct GraphRecord {
    /// First property record of the global chain.
    pub next_prop: i64,
}

impl Default for GraphRecord {
    fn default() -> Self {
        Self { next_prop: NO_ID }
    }
}

/// Any record, as produced by a keyed lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum AnyRecord {
    /// Node record.
    Node(NodeRecord),
    /// Relationship record.
    Relationship(RelationshipRecord),
    /// Relationship group record.
    RelationshipGroup(RelationshipGroupRecord),
    /// Property record.
    Property(PropertyRecord),
    /// Token record.
    Token(TokenRecord),
    /// Dynamic block.
    Dynamic(DynamicRecord),
    /// Schema record.
    Schema(SchemaRecord),
    /// The global graph record.
    Graph(GraphRecord),
}

impl AnyRecord {
    /// Key of the record.
    pub fn key(&self) -> RecordKey {
        match self {
            AnyRecord::Node(r) => RecordKey::new(StoreKind::Node, r.id),
            AnyRecord::Relationship(r) => RecordKey::new(StoreKind::Relationship, r.id),
            AnyRecord::RelationshipGroup(r) => RecordKey::new(StoreKind::RelationshipGroup, r.id),
            AnyRecord::Property(r) => RecordKey::new(StoreKind::Property, r.id),
            AnyRecord::Token(r) => RecordKey::new(r.store, r.id),
            AnyRecord::Dynamic(r) => RecordKey::new(r.store, r.id),
            AnyRecord::Schema(r) => RecordKey::new(StoreKind::Schema, r.id),
            AnyRecord::Graph(_) => RecordKey::new(StoreKind::Graph, 0),
        }
    }

    /// Whether the record holds live data. The graph record always does.
    pub fn in_use(&self) -> bool {
        match self {
            AnyRecord::Node(r) => r.in_use,
            AnyRecord::Relationship(r) => r.in_use,
            AnyRecord::RelationshipGroup(r) => r.in_use,
            AnyRecord::Property(r) => r.in_use,
            AnyRecord::Token(r) => r.in_use,
            AnyRecord::Dynamic(r) => r.in_use,
            AnyRecord::Schema(r) => r.in_use,
            AnyRecord::Graph(_) => true,
        }
    }
}

/// Records that can be the subject of a check.
pub trait Record {
    /// Key identifying the record in reports.
    fn key(&self) -> RecordKey;
    /// Whether the record holds live data.
    fn in_use(&self) -> bool;
}

macro_rules! impl_record {
    ($ty:ty, $store:expr) => {
        impl Record for $ty {
            fn key(&self) -> RecordKey {
                RecordKey::new($store, self.id)
            }
            fn in_use(&self) -> bool {
                self.in_use
            }
        }
    };
}

impl_record!(NodeRecord, StoreKind::Node);
impl_record!(RelationshipRecord, StoreKind::Relationship);
impl_record!(RelationshipGroupRecord, StoreKind::RelationshipGroup);
impl_record!(PropertyRecord, StoreKind::Property);
impl_record!(SchemaRecord, StoreKind::Schema);

impl Record for TokenRecord {
    fn key(&self) -> RecordKey {
        RecordKey::new(self.store, self.id)
    }
    fn in_use(&self) -> bool {
        self.in_use
    }
}

impl Record for DynamicRecord {
    fn key(&self) -> RecordKey {
        RecordKey::new(self.store, self.id)
    }
    fn in_use(&self) -> bool {
        self.in_use
    }
}

impl Record for GraphRecord {
    fn key(&self) -> RecordKey {
        RecordKey::new(StoreKind::Graph, 0)
    }
    fn in_use(&self) -> bool {
        true
    }
}
