//! Property chain handling shared by nodes, relationships and the graph
//! record.

use std::collections::BTreeSet;

use crate::error::Result;
use crate::store::{GraphRecord, RecordAccess, RecordKey, StoreKind, NO_ID};

use super::chain::property::walk_property_chain;
use super::engine::{CheckerEngine, ComparativeChecker, RecordCheck, Reference, Referenced};
use super::expect_property;
use super::mandatory::MandatoryPropertyScope;

/// Queues the walk of the chain starting at `first`. With no chain at all,
/// every required key is reported missing right away.
pub(crate) fn start_property_chain<R, C>(
    engine: &mut CheckerEngine<'_, R, C>,
    first: i64,
    required: BTreeSet<i64>,
    comparison: impl FnOnce(BTreeSet<i64>) -> C,
) where
    C: ComparativeChecker<R>,
{
    if first == NO_ID {
        drop(MandatoryPropertyScope::new(
            engine.reporter(),
            engine.subject(),
            required,
        ));
        return;
    }
    engine.comparative_check(
        Reference::Lookup(RecordKey::new(StoreKind::Property, first)),
        comparison(required),
    );
}

/// Walks the chain whose first record is `referenced`.
pub(crate) fn walk_from<R, C>(
    referenced: &Referenced,
    required: &BTreeSet<i64>,
    engine: &mut CheckerEngine<'_, R, C>,
    records: &dyn RecordAccess,
) -> Result<()>
where
    C: ComparativeChecker<R>,
{
    let first = expect_property(referenced)?;
    let scope = (!required.is_empty()).then(|| {
        MandatoryPropertyScope::new(engine.reporter(), engine.subject(), required.clone())
    });
    walk_property_chain(first, records, engine, scope)
}

/// Checks of the global graph record: its property chain.
#[derive(Debug, Default, Clone, Copy)]
pub struct GraphCheck;

/// Comparative checks queued by [`GraphCheck`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphComparison {
    /// First record of the global property chain.
    Properties,
}

impl RecordCheck<GraphRecord> for GraphCheck {
    type Comparison = GraphComparison;

    fn check(
        &self,
        record: &GraphRecord,
        engine: &mut CheckerEngine<'_, GraphRecord, GraphComparison>,
        _records: &dyn RecordAccess,
    ) -> Result<()> {
        start_property_chain(engine, record.next_prop, BTreeSet::new(), |_| {
            GraphComparison::Properties
        });
        Ok(())
    }
}

impl ComparativeChecker<GraphRecord> for GraphComparison {
    fn check_reference(
        &self,
        _record: &GraphRecord,
        referenced: &Referenced,
        engine: &mut CheckerEngine<'_, GraphRecord, Self>,
        records: &dyn RecordAccess,
    ) -> Result<()> {
        match self {
            GraphComparison::Properties => walk_from(referenced, &BTreeSet::new(), engine, records),
        }
    }
}
