//! Record checks of every store, each store split into contiguous id ranges
//! across worker threads.

use std::collections::BTreeMap;
use std::ops::Range;
use std::thread;

use tracing::debug;

use crate::check::{
    check_record, DynamicCheck, GraphCheck, GroupCheck, MandatoryProperties, NodeCheck,
    OwnerClaims, OwnerRegistry, Owning, PropertyCheck, RecordCheck, RelationshipCheck,
    TokenCheck,
};
use crate::error::{ConsistencyError, Result};
use crate::options::CheckOptions;
use crate::report::ConsistencyReporter;
use crate::store::{RecordAccess, StoreKind};

/// Splits `range` into at most `parts` contiguous, non-empty ranges of
/// near equal length.
pub(crate) fn partition(range: Range<i64>, parts: usize) -> Vec<Range<i64>> {
    let len = (range.end - range.start).max(0);
    let parts = (parts.max(1) as i64).min(len.max(1));
    let chunk = (len + parts - 1) / parts;
    (0..parts)
        .map(|part| {
            let start = range.start + part * chunk;
            start..(start + chunk).min(range.end)
        })
        .filter(|part| !part.is_empty())
        .collect()
}

/// Runs `work` on each part of `ids` on its own scoped thread and sums the
/// results. Every thread is joined before an error is returned.
pub(crate) fn run_partitioned<F>(workers: usize, ids: Range<i64>, work: F) -> Result<u64>
where
    F: Fn(Range<i64>) -> Result<u64> + Sync,
{
    let parts = partition(ids, workers);
    thread::scope(|scope| {
        let handles: Vec<_> = parts
            .into_iter()
            .map(|part| {
                let work = &work;
                scope.spawn(move || work(part))
            })
            .collect();
        let joined: Vec<_> = handles.into_iter().map(|handle| handle.join()).collect();
        joined.into_iter().try_fold(0u64, |total, result| {
            let checked = result.map_err(ConsistencyError::worker_panicked)??;
            Ok(total + checked)
        })
    })
}

struct RecordRun<'a> {
    records: &'a dyn RecordAccess,
    reporter: &'a dyn ConsistencyReporter,
    workers: usize,
    owners: Option<&'a OwnerRegistry>,
}

impl RecordRun<'_> {
    fn store<R, K, L>(&self, store: StoreKind, check: &K, load: L) -> Result<u64>
    where
        R: Owning,
        K: RecordCheck<R> + Sync,
        L: Fn(i64) -> Result<R> + Sync,
    {
        let high = self.records.high_id(store);
        let checked = run_partitioned(self.workers, 0..high, |ids| {
            let mut checked = 0;
            let mut claims = OwnerClaims::default();
            for id in ids {
                let record = load(id)?;
                if !record.in_use() {
                    continue;
                }
                check_record(check, &record, self.reporter, self.records)?;
                if self.owners.is_some() {
                    claims.observe(&record);
                }
                checked += 1;
            }
            if let Some(owners) = self.owners {
                owners.absorb(claims);
            }
            Ok(checked)
        })?;
        debug!(store = ?store, high_id = high, checked, "consistency.records.store");
        Ok(checked)
    }
}

/// Checks every in-use record outside the schema store. Returns the number
/// of records checked per store.
///
/// With property owners checked, what each record owns is collected along
/// the way and shared or orphaned records are reported once every store has
/// been read.
pub(crate) fn check_records(
    records: &dyn RecordAccess,
    reporter: &dyn ConsistencyReporter,
    options: &CheckOptions,
    mandatory: &MandatoryProperties,
) -> Result<BTreeMap<StoreKind, u64>> {
    let registry = options.check_property_owners.then(OwnerRegistry::new);
    let run = RecordRun {
        records,
        reporter,
        workers: options.workers,
        owners: registry.as_ref(),
    };
    let mut checked = BTreeMap::new();

    let nodes = NodeCheck::with_mandatory(mandatory);
    checked.insert(
        StoreKind::Node,
        run.store(StoreKind::Node, &nodes, |id| records.node(id))?,
    );
    let relationships = RelationshipCheck::with_mandatory(mandatory);
    checked.insert(
        StoreKind::Relationship,
        run.store(StoreKind::Relationship, &relationships, |id| {
            records.relationship(id)
        })?,
    );
    checked.insert(
        StoreKind::RelationshipGroup,
        run.store(StoreKind::RelationshipGroup, &GroupCheck, |id| {
            records.relationship_group(id)
        })?,
    );
    let properties = PropertyCheck::new().check_owners(options.check_property_owners);
    checked.insert(
        StoreKind::Property,
        run.store(StoreKind::Property, &properties, |id| records.property(id))?,
    );
    for store in StoreKind::TOKENS {
        checked.insert(
            store,
            run.store(store, &TokenCheck, |id| records.token(store, id))?,
        );
    }
    let dynamic = DynamicCheck::new(options.block_sizes);
    for store in StoreKind::DYNAMIC {
        checked.insert(
            store,
            run.store(store, &dynamic, |id| records.dynamic(store, id))?,
        );
    }

    let graph = records.graph()?;
    check_record(&GraphCheck, &graph, reporter, records)?;
    checked.insert(StoreKind::Graph, 1);

    if let Some(registry) = registry {
        let mut claims = registry.into_claims();
        claims.observe(&graph);
        claims.report(reporter);
    }
    Ok(checked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn partition_covers_range_in_order() {
        assert_eq!(partition(0..10, 3), vec![0..4, 4..8, 8..10]);
        assert_eq!(partition(5..7, 8), vec![5..6, 6..7]);
        assert_eq!(partition(3..3, 4), Vec::<Range<i64>>::new());
        assert_eq!(partition(0..9, 0), vec![0..9]);
    }

    #[test]
    fn partitioned_work_is_summed() {
        let calls = AtomicU64::new(0);
        let total = run_partitioned(4, 0..100, |ids| {
            calls.fetch_add(1, Ordering::Relaxed);
            Ok((ids.end - ids.start) as u64)
        })
        .unwrap();
        assert_eq!(total, 100);
        assert_eq!(calls.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn worker_errors_and_panics_surface() {
        let err = run_partitioned(2, 0..10, |ids| {
            if ids.start == 0 {
                Err(ConsistencyError::config("boom"))
            } else {
                Ok(1)
            }
        })
        .unwrap_err();
        assert!(matches!(err, ConsistencyError::Config(_)));

        let err = run_partitioned(2, 0..10, |ids| {
            if ids.start > 0 {
                panic!("worker {} failed", ids.start);
            }
            Ok(1)
        })
        .unwrap_err();
        assert!(matches!(err, ConsistencyError::WorkerPanicked(message) if message == "worker 5 failed"));
    }
}
