use rustc_hash::FxHashSet;

use crate::check::engine::FindingSink;
use crate::error::Result;
use crate::report::Inconsistency;
use crate::store::{AnyRecord, PropertyRecord, RecordAccess};

/// Whether the property chain starting at `first` reaches `property`.
///
/// Stops without a match at the end of the chain, at a record not in use,
/// or when the chain revisits a record.
pub fn chain_reaches(records: &dyn RecordAccess, first: i64, property: i64) -> Result<bool> {
    let mut visited = FxHashSet::default();
    for record in records.property_chain(first) {
        let record = record?;
        if record.id == property {
            return Ok(true);
        }
        if !record.in_use || !visited.insert(record.id) {
            return Ok(false);
        }
    }
    Ok(false)
}

/// Checks that `owner` is in use and that its property chain leads to
/// `property`.
pub fn check_owner<S>(
    property: &PropertyRecord,
    owner: &AnyRecord,
    records: &dyn RecordAccess,
    sink: &mut S,
) -> Result<()>
where
    S: FindingSink + ?Sized,
{
    let first = match owner {
        AnyRecord::Node(node) => node.in_use.then_some(node.next_prop),
        AnyRecord::Relationship(rel) => rel.in_use.then_some(rel.next_prop),
        AnyRecord::Graph(graph) => Some(graph.next_prop),
        _ => return Ok(()),
    };
    let Some(first) = first else {
        sink.report(Inconsistency::OwnerNotInUse { owner: owner.key() });
        return Ok(());
    };
    if !chain_reaches(records, first, property.id)? {
        sink.report(Inconsistency::OwnerDoesNotReferenceBack { owner: owner.key() });
    }
    Ok(())
}
