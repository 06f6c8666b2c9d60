//! Relationship chain checking over pass windows of the node id space.
//!
//! Each window gets a cleared [`NodeCache`] and two scans of the whole
//! relationship store, forward then backward. The scanning thread routes
//! every in-use relationship to the workers owning its endpoints; each
//! worker owns a contiguous slice of the window and is the only writer of
//! the cache blocks of its nodes. Records reach a worker in scan order.

use std::ops::Range;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::thread;

use smallvec::SmallVec;
use tracing::{debug, info};

use crate::cache::{CacheClient, CacheCounters, CacheStats, NodeCache};
use crate::check::{check_record, RelationshipChainCheck, ScanDirection};
use crate::error::{ConsistencyError, Result};
use crate::options::{ChainCheckMode, CheckOptions};
use crate::report::ConsistencyReporter;
use crate::store::{RecordAccess, RelationshipRecord, Side, StoreKind};

use super::records::{partition, run_partitioned};

const BATCH_SIZE: usize = 256;
const CHANNEL_DEPTH: usize = 4;

/// What the chain phase did.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct ChainOutcome {
    pub(crate) passes: u64,
    pub(crate) nodes_per_pass: u64,
    pub(crate) relationships: u64,
    pub(crate) cache: CacheStats,
}

/// Verifies the chain pointers of every relationship.
pub(crate) fn check_chains(
    records: &dyn RecordAccess,
    reporter: &dyn ConsistencyReporter,
    options: &CheckOptions,
) -> Result<ChainOutcome> {
    let nodes = records.high_id(StoreKind::Node);
    let relationships = records.high_id(StoreKind::Relationship);
    if nodes <= 0 || relationships <= 0 {
        return Ok(ChainOutcome::default());
    }
    let counters = CacheCounters::default();
    let mut outcome = match options.chain_mode {
        ChainCheckMode::Direct => check_direct(records, reporter, options, nodes, &counters)?,
        ChainCheckMode::Cached => check_cached(records, reporter, options, nodes, &counters)?,
    };
    outcome.cache = counters.snapshot();
    info!(
        mode = ?options.chain_mode,
        passes = outcome.passes,
        relationships = outcome.relationships,
        hits = outcome.cache.hits,
        misses = outcome.cache.misses,
        stale_retries = outcome.cache.stale_retries,
        "consistency.chain.done"
    );
    Ok(outcome)
}

/// One window, no cache, every pointer read from the store.
fn check_direct(
    records: &dyn RecordAccess,
    reporter: &dyn ConsistencyReporter,
    options: &CheckOptions,
    nodes: i64,
    counters: &CacheCounters,
) -> Result<ChainOutcome> {
    let relationships = run_partitioned(
        options.workers,
        0..records.high_id(StoreKind::Relationship),
        |ids| {
            let client = CacheClient::uncached(0..nodes);
            let check = RelationshipChainCheck::new(&client, ScanDirection::Full);
            let mut checked = 0;
            for id in ids {
                let record = records.relationship(id)?;
                if record.in_use {
                    check_record(&check, &record, reporter, records)?;
                    checked += 1;
                }
            }
            client.flush(counters);
            Ok(checked)
        },
    )?;
    Ok(ChainOutcome {
        passes: 1,
        nodes_per_pass: nodes as u64,
        relationships,
        cache: CacheStats::default(),
    })
}

fn check_cached(
    records: &dyn RecordAccess,
    reporter: &dyn ConsistencyReporter,
    options: &CheckOptions,
    nodes: i64,
    counters: &CacheCounters,
) -> Result<ChainOutcome> {
    let window = options
        .window_size(NodeCache::block_bytes()?)
        .min(nodes as u64);
    let mut cache = NodeCache::new(window)?;
    let windows = plan_windows(nodes, window);
    info!(
        passes = windows.len(),
        nodes_per_pass = window,
        workers = options.workers,
        "consistency.chain.begin"
    );

    let mut relationships = None;
    for range in &windows {
        cache.begin_window(range.clone())?;
        debug!(
            window_start = range.start,
            window_end = range.end,
            "consistency.chain.pass"
        );
        for scan in [ScanDirection::Forward, ScanDirection::Backward] {
            let scanned =
                scan_window(&cache, scan, records, reporter, options.workers, counters)?;
            relationships.get_or_insert(scanned);
        }
    }
    Ok(ChainOutcome {
        passes: windows.len() as u64,
        nodes_per_pass: window,
        relationships: relationships.unwrap_or(0),
        cache: CacheStats::default(),
    })
}

/// Consecutive windows of at most `window` nodes covering `0..nodes`.
pub(crate) fn plan_windows(nodes: i64, window: u64) -> Vec<Range<i64>> {
    let window = i64::try_from(window.max(1)).unwrap_or(i64::MAX);
    let mut windows = Vec::new();
    let mut start = 0;
    while start < nodes {
        let end = start.saturating_add(window).min(nodes);
        windows.push(start..end);
        start = end;
    }
    windows
}

/// Runs one scan of the relationship store against the active window.
/// Returns the number of in-use relationships scanned.
fn scan_window(
    cache: &NodeCache,
    scan: ScanDirection,
    records: &dyn RecordAccess,
    reporter: &dyn ConsistencyReporter,
    workers: usize,
    counters: &CacheCounters,
) -> Result<u64> {
    let owners = partition(cache.window(), workers);
    thread::scope(|scope| {
        let mut senders = Vec::with_capacity(owners.len());
        let mut handles = Vec::with_capacity(owners.len());
        for owned in &owners {
            let (sender, receiver) = sync_channel::<Vec<RelationshipRecord>>(CHANNEL_DEPTH);
            let owned = owned.clone();
            senders.push(sender);
            handles.push(scope.spawn(move || {
                let client = cache.client(owned);
                let checked = check_batches(&client, scan, receiver, records, reporter);
                client.flush(counters);
                checked
            }));
        }

        let mut result = distribute(&owners, senders, scan, records);
        for handle in handles {
            let joined = handle
                .join()
                .map_err(ConsistencyError::worker_panicked)
                .and_then(|checked| checked);
            if result.is_ok() {
                result = joined.and(result);
            }
        }
        result
    })
}

fn check_batches(
    client: &CacheClient<'_>,
    scan: ScanDirection,
    batches: Receiver<Vec<RelationshipRecord>>,
    records: &dyn RecordAccess,
    reporter: &dyn ConsistencyReporter,
) -> Result<()> {
    let check = RelationshipChainCheck::new(client, scan);
    for batch in batches {
        for record in &batch {
            check_record(&check, record, reporter, records)?;
        }
    }
    Ok(())
}

/// Reads the relationship store in scan order and hands each in-use record
/// to the owners of its endpoints. Stops early when a worker has gone away;
/// the worker's own result explains why.
fn distribute(
    owners: &[Range<i64>],
    senders: Vec<SyncSender<Vec<RelationshipRecord>>>,
    scan: ScanDirection,
    records: &dyn RecordAccess,
) -> Result<u64> {
    let high = records.high_id(StoreKind::Relationship);
    let ids: Box<dyn Iterator<Item = i64>> = match scan {
        ScanDirection::Backward => Box::new((0..high).rev()),
        ScanDirection::Forward | ScanDirection::Full => Box::new(0..high),
    };
    let mut pending: Vec<Vec<RelationshipRecord>> = vec![Vec::new(); senders.len()];
    let mut scanned = 0;
    for id in ids {
        let record = records.relationship(id)?;
        if !record.in_use {
            continue;
        }
        scanned += 1;
        let mut targets: SmallVec<[usize; 2]> = SmallVec::new();
        for side in Side::BOTH {
            if let Some(owner) = owner_of(owners, record.node(side)) {
                if !targets.contains(&owner) {
                    targets.push(owner);
                }
            }
        }
        for owner in targets {
            pending[owner].push(record.clone());
            if pending[owner].len() >= BATCH_SIZE {
                let batch = std::mem::take(&mut pending[owner]);
                if senders[owner].send(batch).is_err() {
                    return Ok(scanned);
                }
            }
        }
    }
    for (sender, batch) in senders.iter().zip(pending) {
        if !batch.is_empty() && sender.send(batch).is_err() {
            break;
        }
    }
    Ok(scanned)
}

/// Index of the range in `owners` holding `node`.
fn owner_of(owners: &[Range<i64>], node: i64) -> Option<usize> {
    let index = owners.partition_point(|owned| owned.end <= node);
    owners
        .get(index)
        .filter(|owned| owned.contains(&node))
        .map(|_| index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::report::CollectingReporter;
    use crate::store::{
        DynamicRecord, GraphRecord, InMemoryStore, NodeRecord, PropertyRecord,
        RelationshipGroupRecord, SchemaRecord, TokenRecord,
    };

    /// Hides the relationship store from every scan after the first.
    struct ShrinkingStore {
        store: InMemoryStore,
        relationship_high_reads: AtomicUsize,
    }

    impl RecordAccess for ShrinkingStore {
        fn node(&self, id: i64) -> Result<NodeRecord> {
            self.store.node(id)
        }
        fn relationship(&self, id: i64) -> Result<RelationshipRecord> {
            self.store.relationship(id)
        }
        fn relationship_group(&self, id: i64) -> Result<RelationshipGroupRecord> {
            self.store.relationship_group(id)
        }
        fn property(&self, id: i64) -> Result<PropertyRecord> {
            self.store.property(id)
        }
        fn token(&self, store: StoreKind, id: i64) -> Result<TokenRecord> {
            self.store.token(store, id)
        }
        fn dynamic(&self, store: StoreKind, id: i64) -> Result<DynamicRecord> {
            self.store.dynamic(store, id)
        }
        fn schema(&self, id: i64) -> Result<SchemaRecord> {
            self.store.schema(id)
        }
        fn graph(&self) -> Result<GraphRecord> {
            self.store.graph()
        }
        fn high_id(&self, store: StoreKind) -> i64 {
            // One read in check_chains, then one per scan.
            if store == StoreKind::Relationship
                && self.relationship_high_reads.fetch_add(1, Ordering::Relaxed) >= 2
            {
                return 0;
            }
            self.store.high_id(store)
        }
    }

    fn ring(nodes: i64) -> InMemoryStore {
        let mut store = InMemoryStore::new();
        for _ in 0..nodes {
            store.add_node();
        }
        for node in 0..nodes {
            store.add_relationship(node, (node + 1) % nodes, 0);
            store.add_relationship(node, (node + 3) % nodes, 0);
        }
        store
    }

    #[test]
    fn windows_cover_node_space() {
        assert_eq!(plan_windows(10, 4), vec![0..4, 4..8, 8..10]);
        assert_eq!(plan_windows(3, 10), vec![0..3]);
        assert!(plan_windows(0, 10).is_empty());
    }

    #[test]
    fn owner_lookup() {
        let owners = vec![0..3, 3..5, 5..9];
        assert_eq!(owner_of(&owners, 0), Some(0));
        assert_eq!(owner_of(&owners, 4), Some(1));
        assert_eq!(owner_of(&owners, 8), Some(2));
        assert_eq!(owner_of(&owners, 9), None);
        assert_eq!(owner_of(&owners, -1), None);
    }

    #[test]
    fn consistent_store_is_clean_in_every_configuration() {
        let store = ring(12);
        for (workers, window) in [(1, 12), (3, 5), (4, 1)] {
            let reporter = CollectingReporter::new();
            let options = CheckOptions::default()
                .workers(workers)
                .nodes_per_pass(window);
            let outcome = check_chains(&store, &reporter, &options).unwrap();
            assert!(reporter.is_empty(), "{:?}", reporter.findings());
            assert_eq!(outcome.passes, plan_windows(12, window).len() as u64);
            assert_eq!(outcome.relationships, 24);
        }
    }

    #[test]
    fn relationship_count_comes_from_the_first_scan() {
        let store = ShrinkingStore {
            store: ring(12),
            relationship_high_reads: AtomicUsize::new(0),
        };
        let reporter = CollectingReporter::new();
        let options = CheckOptions::default().workers(2).nodes_per_pass(6);
        let outcome = check_chains(&store, &reporter, &options).unwrap();
        assert_eq!(outcome.passes, 2);
        assert_eq!(outcome.relationships, 24);
        assert!(store.relationship_high_reads.load(Ordering::Relaxed) > 3);
    }

    #[test]
    fn cached_and_direct_agree_on_corruption() {
        let mut store = ring(9);
        store.relationship_mut(4).unwrap().source_next = 11;
        store.relationship_mut(7).unwrap().in_use = false;
        store.relationship_mut(10).unwrap().target_prev = 2;

        let direct = CollectingReporter::new();
        let options = CheckOptions::default()
            .workers(1)
            .chain_mode(ChainCheckMode::Direct);
        check_chains(&store, &direct, &options).unwrap();
        assert!(!direct.is_empty());

        for (workers, window) in [(1, 9), (2, 4), (3, 2)] {
            let cached = CollectingReporter::new();
            let options = CheckOptions::default()
                .workers(workers)
                .nodes_per_pass(window);
            let outcome = check_chains(&store, &cached, &options).unwrap();
            assert_eq!(cached.sorted(), direct.sorted());
            assert!(outcome.cache.hits > 0);
        }
    }
}
