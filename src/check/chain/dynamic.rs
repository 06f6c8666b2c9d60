use rustc_hash::FxHashSet;

use crate::check::engine::FindingSink;
use crate::error::Result;
use crate::primitives::bytes::{buf::Cursor, var};
use crate::report::Inconsistency;
use crate::store::{DynamicRecord, RecordAccess, NO_ID};

/// Outcome of following a dynamic chain to its end.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DynamicChain {
    /// Concatenated payload of the in-use blocks, in chain order.
    pub data: Vec<u8>,
    /// Blocks found not in use.
    pub not_in_use: Vec<i64>,
    /// Block the chain looped back to, if any.
    pub cycle: Option<i64>,
}

impl DynamicChain {
    /// Whether the payload can be trusted: every block was in use and the
    /// chain terminated.
    pub fn is_intact(&self) -> bool {
        self.not_in_use.is_empty() && self.cycle.is_none()
    }
}

/// Follows the chain starting at the already loaded `first` block.
///
/// Blocks not in use are recorded but walking continues through their
/// `next` pointer, so cycles are still found behind them.
pub fn walk_dynamic_chain(first: DynamicRecord, records: &dyn RecordAccess) -> Result<DynamicChain> {
    let store = first.store;
    let mut chain = DynamicChain::default();
    let mut visited = FxHashSet::default();
    let mut current = first;
    loop {
        visited.insert(current.id);
        if current.in_use {
            chain.data.extend_from_slice(&current.data);
        } else {
            chain.not_in_use.push(current.id);
        }
        let next = current.next;
        if next == NO_ID {
            break;
        }
        if visited.contains(&next) {
            chain.cycle = Some(next);
            break;
        }
        current = records.dynamic(store, next)?;
    }
    Ok(chain)
}

/// Encodes label ids as a dynamic label payload.
pub fn encode_labels(labels: &[i64]) -> Vec<u8> {
    let mut out = Vec::with_capacity(labels.len() * 2);
    for label in labels {
        var::encode_i64(*label, &mut out);
    }
    out
}

/// Decodes a dynamic label payload; `None` when it is truncated.
pub fn decode_labels(payload: &[u8]) -> Option<Vec<i64>> {
    let mut cursor = Cursor::new(payload);
    let mut labels = Vec::new();
    while cursor.remaining() > 0 {
        labels.push(cursor.var_i64()?);
    }
    Some(labels)
}

/// Reports duplicate and descending neighbours in a label list.
pub fn check_label_order<S>(labels: &[i64], sink: &mut S)
where
    S: FindingSink + ?Sized,
{
    for pair in labels.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        if next == prev {
            sink.report(Inconsistency::LabelDuplicate { label: next });
        } else if next < prev {
            sink.report(Inconsistency::LabelsOutOfOrder {
                largest: prev,
                smallest: next,
            });
        }
    }
}
