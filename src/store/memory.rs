use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::options::BlockSizes;

use super::access::{expect_dynamic_store, expect_token_store, RecordAccess};
use super::record::{
    DynamicRecord, GraphRecord, Link, NodeRecord, PropertyOwner, PropertyRecord, PropertyValue,
    RelationshipGroupRecord, RelationshipRecord, SchemaRecord, Side, StoreKind, TokenRecord,
    NO_ID,
};

/// A fully decoded store held in memory.
///
/// Slots that were never written read back as not in use. Mutable accessors
/// let callers corrupt records after building a consistent graph.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    nodes: Vec<Option<NodeRecord>>,
    relationships: Vec<Option<RelationshipRecord>>,
    groups: Vec<Option<RelationshipGroupRecord>>,
    properties: Vec<Option<PropertyRecord>>,
    tokens: FxHashMap<StoreKind, Vec<Option<TokenRecord>>>,
    dynamic: FxHashMap<StoreKind, Vec<Option<DynamicRecord>>>,
    schema: Vec<Option<SchemaRecord>>,
    graph: GraphRecord,
    block_sizes: BlockSizes,
}

fn put<T>(slots: &mut Vec<Option<T>>, id: i64, record: T) {
    let index = usize::try_from(id).unwrap_or_else(|_| panic!("record id {id} is negative"));
    if slots.len() <= index {
        slots.resize_with(index + 1, || None);
    }
    slots[index] = Some(record);
}

fn get<T: Clone>(slots: &[Option<T>], id: i64) -> Option<T> {
    usize::try_from(id)
        .ok()
        .and_then(|index| slots.get(index))
        .and_then(|slot| slot.clone())
}

fn get_mut<T>(slots: &mut [Option<T>], id: i64) -> Option<&mut T> {
    usize::try_from(id)
        .ok()
        .and_then(|index| slots.get_mut(index))
        .and_then(|slot| slot.as_mut())
}

impl InMemoryStore {
    /// Creates an empty store using the default dynamic block sizes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Block sizes used when [`InMemoryStore::write_dynamic`] splits payloads.
    pub fn with_block_sizes(mut self, block_sizes: BlockSizes) -> Self {
        self.block_sizes = block_sizes;
        self
    }

    /// Stores a node record at its id.
    pub fn put_node(&mut self, record: NodeRecord) {
        put(&mut self.nodes, record.id, record);
    }

    /// Stores a relationship record at its id.
    pub fn put_relationship(&mut self, record: RelationshipRecord) {
        put(&mut self.relationships, record.id, record);
    }

    /// Stores a relationship group record at its id.
    pub fn put_group(&mut self, record: RelationshipGroupRecord) {
        put(&mut self.groups, record.id, record);
    }

    /// Stores a property record at its id.
    pub fn put_property(&mut self, record: PropertyRecord) {
        put(&mut self.properties, record.id, record);
    }

    /// Stores a token record in its token store.
    pub fn put_token(&mut self, record: TokenRecord) {
        let slots = self.tokens.entry(record.store).or_default();
        put(slots, record.id, record);
    }

    /// Stores a dynamic block in its dynamic store.
    pub fn put_dynamic(&mut self, record: DynamicRecord) {
        let slots = self.dynamic.entry(record.store).or_default();
        put(slots, record.id, record);
    }

    /// Stores a schema record at its id.
    pub fn put_schema(&mut self, record: SchemaRecord) {
        put(&mut self.schema, record.id, record);
    }

    /// Replaces the global graph record.
    pub fn set_graph(&mut self, record: GraphRecord) {
        self.graph = record;
    }

    /// Mutable access to a stored node.
    pub fn node_mut(&mut self, id: i64) -> Option<&mut NodeRecord> {
        get_mut(&mut self.nodes, id)
    }

    /// Mutable access to a stored relationship.
    pub fn relationship_mut(&mut self, id: i64) -> Option<&mut RelationshipRecord> {
        get_mut(&mut self.relationships, id)
    }

    /// Mutable access to a stored relationship group.
    pub fn group_mut(&mut self, id: i64) -> Option<&mut RelationshipGroupRecord> {
        get_mut(&mut self.groups, id)
    }

    /// Mutable access to a stored property record.
    pub fn property_mut(&mut self, id: i64) -> Option<&mut PropertyRecord> {
        get_mut(&mut self.properties, id)
    }

    /// Mutable access to a stored dynamic block.
    pub fn dynamic_mut(&mut self, store: StoreKind, id: i64) -> Option<&mut DynamicRecord> {
        self.dynamic
            .get_mut(&store)
            .and_then(|slots| get_mut(slots, id))
    }

    /// Mutable access to a stored schema record.
    pub fn schema_mut(&mut self, id: i64) -> Option<&mut SchemaRecord> {
        get_mut(&mut self.schema, id)
    }

    /// Appends an in-use sparse node with no relationships or properties.
    pub fn add_node(&mut self) -> i64 {
        let id = self.nodes.len() as i64;
        self.put_node(NodeRecord::new(id, NO_ID, NO_ID));
        id
    }

    /// Appends a relationship and links it in as the new head of the chain
    /// of each endpoint, the way the store inserts relationships. Endpoints
    /// are expected to be sparse nodes already present.
    pub fn add_relationship(&mut self, source: i64, target: i64, rel_type: i64) -> i64 {
        let id = self.relationships.len() as i64;
        let mut rel = RelationshipRecord::new(id, source, target, rel_type);
        let endpoints: &[i64] = if source == target {
            &[source]
        } else {
            &[source, target]
        };
        for &node in endpoints {
            let head = get(&self.nodes, node).map_or(NO_ID, |n| n.next_rel);
            let mut length = 1;
            if let Some(old) = get_mut(&mut self.relationships, head) {
                for side in Side::BOTH {
                    if old.node(side) == node {
                        length = length.max(old.raw_pointer(side, Link::Prev) + 1);
                        old.set_first(side, false);
                        old.set_pointer(side, Link::Prev, id);
                    }
                }
            }
            for side in Side::BOTH {
                if rel.node(side) == node {
                    rel.set_pointer(side, Link::Next, head);
                    rel.set_pointer(side, Link::Prev, length);
                }
            }
            if let Some(record) = get_mut(&mut self.nodes, node) {
                record.next_rel = id;
            }
        }
        self.put_relationship(rel);
        id
    }

    /// Appends a property chain holding one record per block and makes it
    /// the chain of `owner`. Returns the first record id, [`NO_ID`] for no
    /// blocks.
    pub fn add_properties(&mut self, owner: PropertyOwner, blocks: &[(i64, PropertyValue)]) -> i64 {
        if blocks.is_empty() {
            return NO_ID;
        }
        let first = self.properties.len() as i64;
        let last = first + blocks.len() as i64 - 1;
        for (id, (key, value)) in (first..).zip(blocks) {
            let mut record = PropertyRecord::new(id, owner).with_block(*key, value.clone());
            if id > first {
                record.prev = id - 1;
            }
            if id < last {
                record.next = id + 1;
            }
            self.put_property(record);
        }
        match owner {
            PropertyOwner::Node(node) => {
                if let Some(record) = get_mut(&mut self.nodes, node) {
                    record.next_prop = first;
                }
            }
            PropertyOwner::Relationship(rel) => {
                if let Some(record) = get_mut(&mut self.relationships, rel) {
                    record.next_prop = first;
                }
            }
            PropertyOwner::Graph => self.graph.next_prop = first,
            PropertyOwner::Unknown => {}
        }
        first
    }

    /// Writes `payload` as a fresh chain of blocks at the end of `store` and
    /// returns the id of the first block. An empty payload still takes one
    /// (empty) block.
    pub fn write_dynamic(&mut self, store: StoreKind, payload: &[u8]) -> i64 {
        let block_size = self.block_sizes.for_store(store).max(1);
        let slots = self.dynamic.entry(store).or_default();
        let first = slots.len() as i64;
        let chunks: Vec<&[u8]> = if payload.is_empty() {
            vec![payload]
        } else {
            payload.chunks(block_size).collect()
        };
        let last = chunks.len() - 1;
        for (offset, chunk) in chunks.into_iter().enumerate() {
            let id = first + offset as i64;
            let next = if offset == last { NO_ID } else { id + 1 };
            put(slots, id, DynamicRecord::new(store, id, next, chunk.to_vec()));
        }
        first
    }

    /// Allocates a token named `name` at the end of `store`, writing its
    /// name chain, and returns the token id.
    pub fn add_token(&mut self, store: StoreKind, name: &str) -> i64 {
        let name_store = store
            .name_store()
            .unwrap_or_else(|| panic!("{store:?} is not a token store"));
        let name_id = self.write_dynamic(name_store, name.as_bytes());
        let id = self.tokens.get(&store).map_or(0, |slots| slots.len() as i64);
        self.put_token(TokenRecord::new(store, id, name_id));
        id
    }
}

impl RecordAccess for InMemoryStore {
    fn node(&self, id: i64) -> Result<NodeRecord> {
        Ok(get(&self.nodes, id).unwrap_or_else(|| NodeRecord::unused(id)))
    }

    fn relationship(&self, id: i64) -> Result<RelationshipRecord> {
        Ok(get(&self.relationships, id).unwrap_or_else(|| RelationshipRecord::unused(id)))
    }

    fn relationship_group(&self, id: i64) -> Result<RelationshipGroupRecord> {
        Ok(get(&self.groups, id).unwrap_or_else(|| RelationshipGroupRecord::unused(id)))
    }

    fn property(&self, id: i64) -> Result<PropertyRecord> {
        Ok(get(&self.properties, id).unwrap_or_else(|| PropertyRecord::unused(id)))
    }

    fn token(&self, store: StoreKind, id: i64) -> Result<TokenRecord> {
        expect_token_store(store, id)?;
        Ok(self
            .tokens
            .get(&store)
            .and_then(|slots| get(slots, id))
            .unwrap_or_else(|| TokenRecord::unused(store, id)))
    }

    fn dynamic(&self, store: StoreKind, id: i64) -> Result<DynamicRecord> {
        expect_dynamic_store(store, id)?;
        Ok(self
            .dynamic
            .get(&store)
            .and_then(|slots| get(slots, id))
            .unwrap_or_else(|| DynamicRecord::unused(store, id)))
    }

    fn schema(&self, id: i64) -> Result<SchemaRecord> {
        Ok(get(&self.schema, id).unwrap_or_else(|| SchemaRecord::unused(id)))
    }

    fn graph(&self) -> Result<GraphRecord> {
        Ok(self.graph.clone())
    }

    fn high_id(&self, store: StoreKind) -> i64 {
        let len = match store {
            StoreKind::Node => self.nodes.len(),
            StoreKind::Relationship => self.relationships.len(),
            StoreKind::RelationshipGroup => self.groups.len(),
            StoreKind::Property => self.properties.len(),
            StoreKind::Schema => self.schema.len(),
            StoreKind::Graph => 1,
            store if store.is_token() => self.tokens.get(&store).map_or(0, Vec::len),
            store => self.dynamic.get(&store).map_or(0, Vec::len),
        };
        len as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwritten_and_negative_ids_read_as_unused() {
        let mut store = InMemoryStore::new();
        store.put_node(NodeRecord::new(3, NO_ID, NO_ID));
        assert!(store.node(3).unwrap().in_use);
        assert!(!store.node(1).unwrap().in_use);
        assert!(!store.node(-7).unwrap().in_use);
        assert!(!store.node(99).unwrap().in_use);
        assert_eq!(store.high_id(StoreKind::Node), 4);
    }

    #[test]
    fn write_dynamic_splits_payload_into_linked_blocks() {
        let mut store =
            InMemoryStore::new().with_block_sizes(BlockSizes::default().string(4));
        let first = store.write_dynamic(StoreKind::String, b"abcdefghij");
        let mut ids = Vec::new();
        let mut data = Vec::new();
        let mut next = first;
        while next != NO_ID {
            let block = store.dynamic(StoreKind::String, next).unwrap();
            ids.push(block.id);
            data.extend_from_slice(&block.data);
            next = block.next;
        }
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(data, b"abcdefghij");
    }

    #[test]
    fn add_token_writes_name_chain() {
        let mut store = InMemoryStore::new();
        let person = store.add_token(StoreKind::LabelToken, "Person");
        let city = store.add_token(StoreKind::LabelToken, "City");
        assert_eq!((person, city), (0, 1));
        let token = store.token(StoreKind::LabelToken, city).unwrap();
        let name = store.dynamic(StoreKind::LabelName, token.name).unwrap();
        assert_eq!(name.data, b"City");
    }

    #[test]
    fn add_relationship_links_new_head() {
        let mut store = InMemoryStore::new();
        let a = store.add_node();
        let b = store.add_node();
        let first = store.add_relationship(a, b, 0);
        let second = store.add_relationship(b, a, 0);
        let looped = store.add_relationship(a, a, 0);
        assert_eq!(store.node(a).unwrap().next_rel, looped);
        assert_eq!(store.node(b).unwrap().next_rel, second);

        let looped = store.relationship(looped).unwrap();
        assert!(looped.first_in_source_chain && looped.first_in_target_chain);
        assert_eq!(looped.source_next, second);
        assert_eq!(looped.target_next, second);
        assert_eq!(looped.source_prev, 3);

        let second = store.relationship(second).unwrap();
        assert!(!second.first_in_target_chain);
        assert_eq!(second.target_prev, looped.id);
        assert_eq!(second.target_next, first);
        assert!(second.first_in_source_chain);
        assert_eq!(second.source_next, first);

        let first = store.relationship(first).unwrap();
        assert_eq!(first.source_prev, second.id);
        assert_eq!(first.target_prev, second.id);
    }

    #[test]
    fn add_properties_chains_blocks_to_owner() {
        let mut store = InMemoryStore::new();
        let node = store.add_node();
        assert_eq!(store.add_properties(PropertyOwner::Node(node), &[]), NO_ID);
        let first = store.add_properties(
            PropertyOwner::Node(node),
            &[(0, PropertyValue::Int(7)), (1, PropertyValue::Bool(true))],
        );
        assert_eq!(store.node(node).unwrap().next_prop, first);
        let head = store.property(first).unwrap();
        let tail = store.property(head.next).unwrap();
        assert_eq!((head.prev, tail.prev, tail.next), (NO_ID, first, NO_ID));
        assert_eq!(tail.blocks[0].key, 1);

        let global = store.add_properties(PropertyOwner::Graph, &[(0, PropertyValue::Int(1))]);
        assert_eq!(store.graph().unwrap().next_prop, global);
    }

    #[test]
    fn token_lookup_in_wrong_store_is_an_error() {
        let store = InMemoryStore::new();
        assert!(store.token(StoreKind::Node, 0).is_err());
        assert!(store.dynamic(StoreKind::LabelToken, 0).is_err());
    }

    #[test]
    fn property_chain_follows_next_pointers() {
        let mut store = InMemoryStore::new();
        let owner = crate::store::PropertyOwner::Node(0);
        let mut first = PropertyRecord::new(0, owner);
        first.next = 2;
        let mut second = PropertyRecord::new(2, owner);
        second.prev = 0;
        store.put_property(first);
        store.put_property(second);
        let access: &dyn RecordAccess = &store;
        let ids: Vec<i64> = access
            .property_chain(0)
            .map(|record| record.unwrap().id)
            .collect();
        assert_eq!(ids, vec![0, 2]);
    }
}
