//! Per-node cache used by the relationship chain scans.
//!
//! One block per node id of the active pass window remembers a single chain
//! pointer of the last relationship scanned at that node:
//!
//! ```text
//! [ relationship id: 40 | pointer value: 40 | side: 1 | link: 1 ]  -> 11 bytes
//! ```
//!
//! Blocks live in a shared arena of atomic bytes. Each worker reads and
//! writes only the blocks of nodes it owns through its [`CacheClient`], so a
//! block never has two writers.

mod counters;

use std::cell::Cell;
use std::ops::Range;
use std::sync::atomic::{AtomicU8, Ordering};

use tracing::debug;

use crate::error::{ConsistencyError, Result};
use crate::primitives::bytes::bits::{SlotLayout, MAX_BLOCK_BYTES};
use crate::store::{Link, Side, NO_ID};

pub use counters::{CacheCounters, CacheStats};

const RELATIONSHIP_SLOT: usize = 0;
const POINTER_SLOT: usize = 1;
const SIDE_SLOT: usize = 2;
const LINK_SLOT: usize = 3;
const SLOT_WIDTHS: [u8; 4] = [40, 40, 1, 1];

/// A relationship as far as one cache block describes it.
///
/// Only these facts are known: relationship `id` is in use, touches `node`
/// on `side`, and its `link` pointer on that side holds `pointer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedRelationship {
    /// Id of the cached relationship.
    pub id: i64,
    /// Node whose block produced this record.
    pub node: i64,
    /// Side of the relationship touching `node`.
    pub side: Side,
    /// Which pointer was cached.
    pub link: Link,
    /// Value of that pointer, [`NO_ID`] when absent.
    pub pointer: i64,
}

/// Fixed arena of cache blocks for one pass window at a time.
pub struct NodeCache {
    layout: SlotLayout,
    blocks: Box<[AtomicU8]>,
    capacity: u64,
    window: Range<i64>,
}

impl NodeCache {
    /// Bytes of one cache block.
    pub fn block_bytes() -> Result<usize> {
        Ok(SlotLayout::new(&SLOT_WIDTHS)?.block_bytes())
    }

    /// Allocates blocks for `capacity` nodes, all unset.
    pub fn new(capacity: u64) -> Result<Self> {
        let layout = SlotLayout::new(&SLOT_WIDTHS)?;
        let len = usize::try_from(capacity)
            .ok()
            .and_then(|nodes| nodes.checked_mul(layout.block_bytes()))
            .ok_or_else(|| {
                ConsistencyError::config(format!("node cache capacity {capacity} too large"))
            })?;
        let blocks = (0..len).map(|_| AtomicU8::new(0xFF)).collect();
        debug!(capacity, bytes = len, "consistency.cache.allocated");
        Ok(Self {
            layout,
            blocks,
            capacity,
            window: 0..0,
        })
    }

    /// Nodes one window can hold.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Current window.
    pub fn window(&self) -> Range<i64> {
        self.window.clone()
    }

    /// Clears every block and makes `window` the active node range.
    pub fn begin_window(&mut self, window: Range<i64>) -> Result<()> {
        let nodes = window.end.saturating_sub(window.start);
        if window.start < 0 || nodes < 0 || nodes as u64 > self.capacity {
            return Err(ConsistencyError::config(format!(
                "pass window {window:?} does not fit a cache of {} nodes",
                self.capacity
            )));
        }
        for byte in self.blocks.iter_mut() {
            *byte.get_mut() = 0xFF;
        }
        self.window = window;
        Ok(())
    }

    /// Handle for a worker owning `owned`, clipped to the active window.
    pub fn client(&self, owned: Range<i64>) -> CacheClient<'_> {
        let start = owned.start.max(self.window.start);
        let end = owned.end.min(self.window.end).max(start);
        CacheClient {
            cache: Some(self),
            owned: start..end,
            stats: Cell::new(CacheStats::default()),
        }
    }

    fn offset(&self, node: i64) -> usize {
        (node - self.window.start) as usize * self.layout.block_bytes()
    }

    fn read(&self, node: i64) -> [u8; MAX_BLOCK_BYTES] {
        let mut block = [0u8; MAX_BLOCK_BYTES];
        let start = self.offset(node);
        let len = self.layout.block_bytes();
        for (dst, src) in block.iter_mut().zip(&self.blocks[start..start + len]) {
            *dst = src.load(Ordering::Relaxed);
        }
        block
    }

    fn write(&self, node: i64, block: &[u8]) {
        let start = self.offset(node);
        let len = self.layout.block_bytes();
        for (src, dst) in block[..len].iter().zip(&self.blocks[start..start + len]) {
            dst.store(*src, Ordering::Relaxed);
        }
    }
}

/// A worker's view of the cache: the node range it owns plus local counters.
pub struct CacheClient<'c> {
    cache: Option<&'c NodeCache>,
    owned: Range<i64>,
    stats: Cell<CacheStats>,
}

impl CacheClient<'static> {
    /// A client that owns `owned` but never caches anything.
    pub fn uncached(owned: Range<i64>) -> Self {
        Self {
            cache: None,
            owned,
            stats: Cell::new(CacheStats::default()),
        }
    }
}

impl<'c> CacheClient<'c> {
    /// Whether `node` belongs to this client in the active window.
    pub fn within_bounds(&self, node: i64) -> bool {
        self.owned.contains(&node)
    }

    /// Node range owned by this client.
    pub fn owned(&self) -> Range<i64> {
        self.owned.clone()
    }

    /// Looks for a cached relationship `relationship` at `node` whose cached
    /// pointer is of kind `link`.
    pub fn lookup(&self, node: i64, relationship: i64, link: Link) -> Option<CachedRelationship> {
        let found = self
            .cache
            .filter(|_| self.within_bounds(node))
            .and_then(|cache| {
                let block = cache.read(node);
                let layout = &cache.layout;
                let id = layout.get(&block, RELATIONSHIP_SLOT);
                if id == NO_ID || id != relationship {
                    return None;
                }
                let cached_link = if layout.get_bool(&block, LINK_SLOT) {
                    Link::Next
                } else {
                    Link::Prev
                };
                if cached_link != link {
                    return None;
                }
                let side = if layout.get_bool(&block, SIDE_SLOT) {
                    Side::Target
                } else {
                    Side::Source
                };
                Some(CachedRelationship {
                    id,
                    node,
                    side,
                    link,
                    pointer: layout.get(&block, POINTER_SLOT),
                })
            });
        self.bump(|stats| {
            if found.is_some() {
                stats.hits += 1
            } else {
                stats.misses += 1
            }
        });
        found
    }

    /// Caches `pointer`, the `link` pointer on `side` of relationship
    /// `relationship`, in the block of `node`. Values the block cannot
    /// represent are not cached.
    pub fn remember(&self, node: i64, side: Side, relationship: i64, link: Link, pointer: i64) {
        let Some(cache) = self.cache else {
            return;
        };
        if !self.within_bounds(node) {
            return;
        }
        let layout = &cache.layout;
        let storable = |value: i64, allow_none: bool| {
            (allow_none && value == NO_ID)
                || (value >= 0 && (value as u64) < layout.mask(RELATIONSHIP_SLOT))
        };
        if !storable(relationship, false) || !storable(pointer, true) {
            return;
        }
        let mut block = cache.read(node);
        if layout.get(&block, RELATIONSHIP_SLOT) != NO_ID {
            self.bump(|stats| stats.overwrites += 1);
        }
        layout.set(&mut block, RELATIONSHIP_SLOT, relationship);
        layout.set(&mut block, POINTER_SLOT, pointer);
        layout.set_bool(&mut block, SIDE_SLOT, side == Side::Target);
        layout.set_bool(&mut block, LINK_SLOT, link == Link::Next);
        cache.write(node, &block);
    }

    /// Counts a pointer left for the scan running the other way.
    pub fn count_direction_skip(&self) {
        self.bump(|stats| stats.direction_skips += 1);
    }

    /// Counts a side skipped because another worker or pass owns its node.
    pub fn count_window_skip(&self) {
        self.bump(|stats| stats.window_skips += 1);
    }

    /// Counts a synthetic comparison handed back to the store.
    pub fn count_stale_retry(&self) {
        self.bump(|stats| stats.stale_retries += 1);
    }

    /// Local counts so far.
    pub fn stats(&self) -> CacheStats {
        self.stats.get()
    }

    /// Moves the local counts into `counters`.
    pub fn flush(&self, counters: &CacheCounters) {
        counters.add(self.stats.take());
    }

    fn bump(&self, update: impl FnOnce(&mut CacheStats)) {
        let mut stats = self.stats.get();
        update(&mut stats);
        self.stats.set(stats);
    }
}
