use crate::error::Result;
use crate::options::BlockSizes;
use crate::report::Inconsistency;
use crate::store::{DynamicRecord, RecordAccess, RecordKey, NO_ID};

use super::engine::{
    CheckerEngine, ComparativeChecker, FindingSink, RecordCheck, Reference, Referenced,
};
use super::expect_dynamic;

/// Checks of one dynamic block: its length against the store's block size
/// and the block it links to.
#[derive(Debug, Default, Clone, Copy)]
pub struct DynamicCheck {
    block_sizes: BlockSizes,
}

impl DynamicCheck {
    /// A check using `block_sizes` as the capacity of each dynamic store.
    pub fn new(block_sizes: BlockSizes) -> Self {
        Self { block_sizes }
    }
}

/// Comparative checks queued by [`DynamicCheck`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynamicComparison {
    /// The next block of the chain.
    Next,
}

impl RecordCheck<DynamicRecord> for DynamicCheck {
    type Comparison = DynamicComparison;

    fn check(
        &self,
        record: &DynamicRecord,
        engine: &mut CheckerEngine<'_, DynamicRecord, DynamicComparison>,
        _records: &dyn RecordAccess,
    ) -> Result<()> {
        if !record.in_use {
            return Ok(());
        }
        let block_size = self.block_sizes.for_store(record.store);
        let length = record.data.len();
        if length == 0 {
            engine.report(Inconsistency::EmptyBlock);
        } else if length > block_size {
            engine.report(Inconsistency::InvalidLength { length, block_size });
        }

        if record.next == NO_ID {
            return Ok(());
        }
        if record.next == record.id {
            engine.report(Inconsistency::SelfReferentialNext);
            return Ok(());
        }
        if length < block_size {
            engine.report(Inconsistency::RecordNotFullReferencesNext { length });
        }
        engine.comparative_check(
            Reference::Lookup(RecordKey::new(record.store, record.next)),
            DynamicComparison::Next,
        );
        Ok(())
    }
}

impl ComparativeChecker<DynamicRecord> for DynamicComparison {
    fn check_reference(
        &self,
        _record: &DynamicRecord,
        referenced: &Referenced,
        engine: &mut CheckerEngine<'_, DynamicRecord, Self>,
        _records: &dyn RecordAccess,
    ) -> Result<()> {
        match self {
            DynamicComparison::Next => {
                let next = expect_dynamic(referenced)?;
                if !next.in_use {
                    engine.report(Inconsistency::NextNotInUse { record: next.id });
                } else if next.data.is_empty() {
                    engine.report(Inconsistency::EmptyNextBlock { record: next.id });
                }
            }
        }
        Ok(())
    }
}
