//! Where findings go.
//!
//! Checkers never fail on bad data; they hand a [`Finding`] to a
//! [`ConsistencyReporter`] and keep going.

mod inconsistency;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{error, info, warn};

pub use inconsistency::{ChainField, Finding, Inconsistency, Severity};

/// Sink for findings. Calls are fire-and-forget and may come from several
/// worker threads at once.
pub trait ConsistencyReporter: Send + Sync {
    /// Records one finding.
    fn report(&self, finding: Finding);
}

/// Keeps every finding in memory.
#[derive(Default)]
pub struct CollectingReporter {
    findings: Mutex<Vec<Finding>>,
}

impl CollectingReporter {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of findings so far.
    pub fn len(&self) -> usize {
        self.findings.lock().len()
    }

    /// Whether nothing was reported.
    pub fn is_empty(&self) -> bool {
        self.findings.lock().is_empty()
    }

    /// Findings in report order.
    pub fn findings(&self) -> Vec<Finding> {
        self.findings.lock().clone()
    }

    /// Findings sorted, for order-insensitive comparison across runs.
    pub fn sorted(&self) -> Vec<Finding> {
        let mut findings = self.findings();
        findings.sort();
        findings
    }

    /// Takes the findings, leaving the collector empty.
    pub fn take(&self) -> Vec<Finding> {
        std::mem::take(&mut *self.findings.lock())
    }
}

impl ConsistencyReporter for CollectingReporter {
    fn report(&self, finding: Finding) {
        self.findings.lock().push(finding);
    }
}

/// Emits one `tracing` event per finding.
#[derive(Default, Clone, Copy)]
pub struct LoggingReporter;

impl ConsistencyReporter for LoggingReporter {
    fn report(&self, finding: Finding) {
        log_finding(&finding);
    }
}

fn log_finding(finding: &Finding) {
    let subject = finding.subject;
    let kind = finding.inconsistency.kind();
    match finding.severity() {
        Severity::Warning => warn!(
            store = ?subject.store,
            id = subject.id,
            kind,
            detail = ?finding.inconsistency,
            "consistency.finding"
        ),
        Severity::Error => error!(
            store = ?subject.store,
            id = subject.id,
            kind,
            detail = ?finding.inconsistency,
            "consistency.finding"
        ),
    }
}

/// Totals gathered by [`TallyReporter`].
#[derive(Clone, Debug, Default)]
pub(crate) struct Tally {
    pub(crate) errors: u64,
    pub(crate) warnings: u64,
    pub(crate) by_kind: BTreeMap<&'static str, u64>,
}

/// Counts findings per kind and echoes the first few to the log before
/// forwarding them to the caller's reporter.
pub(crate) struct TallyReporter<'a> {
    inner: &'a dyn ConsistencyReporter,
    max_logged: u64,
    errors: AtomicU64,
    warnings: AtomicU64,
    by_kind: Mutex<BTreeMap<&'static str, u64>>,
}

impl<'a> TallyReporter<'a> {
    pub(crate) fn new(inner: &'a dyn ConsistencyReporter, max_logged: usize) -> Self {
        Self {
            inner,
            max_logged: max_logged as u64,
            errors: AtomicU64::new(0),
            warnings: AtomicU64::new(0),
            by_kind: Mutex::new(BTreeMap::new()),
        }
    }

    pub(crate) fn tally(&self) -> Tally {
        Tally {
            errors: self.errors.load(Ordering::Relaxed),
            warnings: self.warnings.load(Ordering::Relaxed),
            by_kind: self.by_kind.lock().clone(),
        }
    }
}

impl ConsistencyReporter for TallyReporter<'_> {
    fn report(&self, finding: Finding) {
        let counter = match finding.severity() {
            Severity::Error => &self.errors,
            Severity::Warning => &self.warnings,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        let seen = {
            let mut by_kind = self.by_kind.lock();
            *by_kind.entry(finding.inconsistency.kind()).or_default() += 1;
            by_kind.values().sum::<u64>()
        };
        if seen <= self.max_logged {
            log_finding(&finding);
            if seen == self.max_logged {
                info!(max_logged = self.max_logged, "consistency.findings.log_limit");
            }
        }
        self.inner.report(finding);
    }
}
