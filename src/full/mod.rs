//! Full consistency check of a record store.
//!
//! The schema store is checked first, since its existence constraints decide
//! which properties the node and relationship checks require. Every other
//! store follows, and the relationship chains last.

mod passes;
mod records;

use std::collections::BTreeMap;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use crate::cache::CacheStats;
use crate::error::Result;
use crate::options::{ChainCheckMode, CheckOptions};
use crate::report::{ConsistencyReporter, TallyReporter};
use crate::schema::{IndexAccessor, SchemaChecker, SchemaIndex};
use crate::store::{RecordAccess, StoreKind};

/// Outcome of [`check_consistency`].
#[derive(Clone, Debug, Serialize)]
pub struct ConsistencySummary {
    /// Whether no error-level finding was reported.
    pub success: bool,
    /// Error-level findings.
    pub errors: u64,
    /// Warning-level findings.
    pub warnings: u64,
    /// Findings per inconsistency kind.
    pub by_kind: BTreeMap<&'static str, u64>,
    /// In-use records checked per store.
    pub records_checked: BTreeMap<StoreKind, u64>,
    /// Chain verification strategy used.
    pub chain_mode: ChainCheckMode,
    /// Pass windows of the chain check.
    pub passes: u64,
    /// Nodes per pass window.
    pub nodes_per_pass: u64,
    /// Node cache counters of the chain check.
    pub cache: CacheStats,
    /// Wall clock time of the whole check.
    pub duration_ms: u64,
}

impl ConsistencySummary {
    /// Serializes the summary as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Checks every store reachable through `records`, reporting each
/// inconsistency to `reporter`.
///
/// Returns an error only when the check itself cannot run: invalid
/// `options`, a failing store read or a panicked worker. Inconsistencies
/// never fail the call; they are counted in the summary.
pub fn check_consistency(
    records: &dyn RecordAccess,
    indexes: &dyn IndexAccessor,
    reporter: &dyn ConsistencyReporter,
    options: &CheckOptions,
) -> Result<ConsistencySummary> {
    options.validate()?;
    let started = Instant::now();
    let tally = TallyReporter::new(reporter, options.max_findings_logged);
    info!(
        workers = options.workers,
        mode = ?options.chain_mode,
        nodes = records.high_id(StoreKind::Node),
        relationships = records.high_id(StoreKind::Relationship),
        "consistency.full.begin"
    );

    let schema = if options.check_schema {
        SchemaChecker::new(records, &tally).check(indexes)?
    } else {
        SchemaIndex::default()
    };
    let mut records_checked =
        records::check_records(records, &tally, options, schema.mandatory())?;
    if options.check_schema {
        records_checked.insert(
            StoreKind::Schema,
            schema.rules().len() as u64 + schema.malformed(),
        );
    }
    let chains = passes::check_chains(records, &tally, options)?;

    let totals = tally.tally();
    let summary = ConsistencySummary {
        success: totals.errors == 0,
        errors: totals.errors,
        warnings: totals.warnings,
        by_kind: totals.by_kind,
        records_checked,
        chain_mode: options.chain_mode,
        passes: chains.passes,
        nodes_per_pass: chains.nodes_per_pass,
        cache: chains.cache,
        duration_ms: started.elapsed().as_millis() as u64,
    };
    if summary.success {
        info!(
            warnings = summary.warnings,
            duration_ms = summary.duration_ms,
            "consistency.full.done"
        );
    } else {
        warn!(
            errors = summary.errors,
            warnings = summary.warnings,
            duration_ms = summary.duration_ms,
            "consistency.full.inconsistent"
        );
    }
    Ok(summary)
}
