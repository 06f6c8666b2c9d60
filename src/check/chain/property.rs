use rustc_hash::FxHashSet;

use crate::check::engine::FindingSink;
use crate::check::mandatory::MandatoryPropertyScope;
use crate::error::Result;
use crate::report::Inconsistency;
use crate::store::{PropertyRecord, RecordAccess, NO_ID};

/// Walks the property chain of one primitive, starting at its already
/// loaded first record.
///
/// Reports a first record that is not in use or has a `prev` pointer, keys
/// repeated anywhere in the chain, records not in use (ending the walk) and
/// a chain that loops back on itself (reported once, ending the walk).
/// Every key seen is forwarded to `scope`, which is dropped, and so reports
/// missing keys, when the walk ends.
pub fn walk_property_chain<S>(
    first: &PropertyRecord,
    records: &dyn RecordAccess,
    sink: &mut S,
    mut scope: Option<MandatoryPropertyScope<'_>>,
) -> Result<()>
where
    S: FindingSink + ?Sized,
{
    if !first.in_use {
        sink.report(Inconsistency::PropertyNotInUse { property: first.id });
        return Ok(());
    }
    if first.prev != NO_ID {
        sink.report(Inconsistency::PropertyNotFirstInChain { property: first.id });
    }

    let mut visited = FxHashSet::default();
    let mut keys = FxHashSet::default();
    let mut current = first.clone();
    loop {
        visited.insert(current.id);
        for block in &current.blocks {
            if !keys.insert(block.key) {
                sink.report(Inconsistency::PropertyKeyNotUniqueInChain { key: block.key });
            }
            if let Some(scope) = scope.as_mut() {
                scope.observe(block.key);
            }
        }
        let next = current.next;
        if next == NO_ID {
            break;
        }
        if visited.contains(&next) {
            sink.report(Inconsistency::PropertyChainCircularReference { property: next });
            break;
        }
        current = records.property(next)?;
        if !current.in_use {
            sink.report(Inconsistency::PropertyNotInUse { property: next });
            break;
        }
    }
    Ok(())
}
