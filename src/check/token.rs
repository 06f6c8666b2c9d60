use crate::error::{ConsistencyError, Result};
use crate::report::Inconsistency;
use crate::store::{RecordAccess, RecordKey, StoreKind, TokenRecord, NO_ID};

use super::engine::{
    CheckerEngine, ComparativeChecker, FindingSink, RecordCheck, Reference, Referenced,
};
use super::chain::dynamic::walk_dynamic_chain;
use super::expect_dynamic;

/// Checks of label, relationship type and property key tokens.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokenCheck;

/// Comparative checks queued by [`TokenCheck`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenComparison {
    /// First block of the token name.
    Name,
}

impl RecordCheck<TokenRecord> for TokenCheck {
    type Comparison = TokenComparison;

    fn check(
        &self,
        record: &TokenRecord,
        engine: &mut CheckerEngine<'_, TokenRecord, TokenComparison>,
        _records: &dyn RecordAccess,
    ) -> Result<()> {
        if !record.in_use {
            return Ok(());
        }
        if record.name == NO_ID {
            engine.report(Inconsistency::EmptyName);
            return Ok(());
        }
        let Some(store) = record.store.name_store() else {
            return Err(ConsistencyError::UnexpectedRecord {
                expected: StoreKind::LabelToken,
                found: record.store,
            });
        };
        engine.comparative_check(
            Reference::Lookup(RecordKey::new(store, record.name)),
            TokenComparison::Name,
        );
        Ok(())
    }
}

impl ComparativeChecker<TokenRecord> for TokenComparison {
    fn check_reference(
        &self,
        _record: &TokenRecord,
        referenced: &Referenced,
        engine: &mut CheckerEngine<'_, TokenRecord, Self>,
        records: &dyn RecordAccess,
    ) -> Result<()> {
        match self {
            TokenComparison::Name => {
                let first = expect_dynamic(referenced)?.clone();
                let store = first.store;
                let empty = first.in_use && first.data.is_empty();
                let chain = walk_dynamic_chain(first, records)?;
                for &record in &chain.not_in_use {
                    engine.report(Inconsistency::NameBlockNotInUse { record });
                }
                if empty {
                    engine.report(Inconsistency::EmptyName);
                }
                if let Some(record) = chain.cycle {
                    engine.report(Inconsistency::DynamicRecordChainCycle { store, record });
                }
            }
        }
        Ok(())
    }
}
