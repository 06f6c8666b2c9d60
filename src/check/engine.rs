use std::collections::VecDeque;
use std::marker::PhantomData;

use crate::cache::CachedRelationship;
use crate::error::Result;
use crate::report::{ConsistencyReporter, Finding, Inconsistency};
use crate::store::{AnyRecord, Record, RecordAccess, RecordKey, StoreKind};

/// The second record of a comparative check.
#[derive(Debug, Clone, PartialEq)]
pub enum Referenced {
    /// Read from the store; every field can be trusted.
    Authoritative(AnyRecord),
    /// Rebuilt from a cache block; only the cached fields exist.
    Synthetic(CachedRelationship),
}

impl Referenced {
    /// Key of the referenced record.
    pub fn key(&self) -> RecordKey {
        match self {
            Referenced::Authoritative(record) => record.key(),
            Referenced::Synthetic(cached) => RecordKey::new(StoreKind::Relationship, cached.id),
        }
    }
}

/// How the engine obtains the second record of a pending check.
#[derive(Debug, Clone, PartialEq)]
pub enum Reference {
    /// The record is already at hand.
    Direct(Referenced),
    /// Read the record from the store when the check is resolved.
    Lookup(RecordKey),
    /// Owned by another pass or worker; drop the check.
    Skip,
}

/// A comparative check waiting for its second record.
#[derive(Debug)]
pub struct PendingCheck<C> {
    /// Where the second record comes from.
    pub reference: Reference,
    /// Checker to run once it is available.
    pub checker: C,
}

/// Local checks of one record kind.
pub trait RecordCheck<R> {
    /// Comparative checks this check may queue.
    type Comparison: ComparativeChecker<R>;

    /// Validates `record` on its own and queues comparative checks on
    /// `engine` for everything that needs a second record.
    fn check(
        &self,
        record: &R,
        engine: &mut CheckerEngine<'_, R, Self::Comparison>,
        records: &dyn RecordAccess,
    ) -> Result<()>;
}

/// A check between the record under test and a second record.
pub trait ComparativeChecker<R>: Sized {
    /// Compares `record` with `referenced`, reporting through `engine`.
    /// May queue further checks on `engine`.
    fn check_reference(
        &self,
        record: &R,
        referenced: &Referenced,
        engine: &mut CheckerEngine<'_, R, Self>,
        records: &dyn RecordAccess,
    ) -> Result<()>;
}

/// Anything findings about the current subject can be reported to.
pub trait FindingSink {
    /// Reports a violation found on the current subject.
    fn report(&mut self, inconsistency: Inconsistency);
}

/// Bookkeeping of one engine run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResolveStats {
    /// Checks handed an already materialized record.
    pub direct: u64,
    /// Checks that read their record from the store.
    pub lookups: u64,
    /// Checks dropped because another pass owns them.
    pub skipped: u64,
}

impl ResolveStats {
    /// Adds `other` into `self`.
    pub fn merge(&mut self, other: ResolveStats) {
        self.direct += other.direct;
        self.lookups += other.lookups;
        self.skipped += other.skipped;
    }
}

/// Mediator between checks, the store and the reporter for one record.
pub struct CheckerEngine<'r, R, C> {
    subject: RecordKey,
    reporter: &'r dyn ConsistencyReporter,
    queue: VecDeque<PendingCheck<C>>,
    stats: ResolveStats,
    _record: PhantomData<fn(&R)>,
}

impl<'r, R, C> CheckerEngine<'r, R, C>
where
    C: ComparativeChecker<R>,
{
    /// Creates an engine for the record identified by `subject`.
    pub fn new(subject: RecordKey, reporter: &'r dyn ConsistencyReporter) -> Self {
        Self {
            subject,
            reporter,
            queue: VecDeque::new(),
            stats: ResolveStats::default(),
            _record: PhantomData,
        }
    }

    /// Key of the record under check.
    pub fn subject(&self) -> RecordKey {
        self.subject
    }

    /// The reporter findings are sent to.
    pub fn reporter(&self) -> &'r dyn ConsistencyReporter {
        self.reporter
    }

    /// Queues a comparative check.
    pub fn comparative_check(&mut self, reference: Reference, checker: C) {
        self.queue.push_back(PendingCheck { reference, checker });
    }

    /// Number of checks still queued.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Counters so far.
    pub fn stats(&self) -> ResolveStats {
        self.stats
    }

    /// Drains the queue in FIFO order, including checks queued while
    /// resolving.
    pub fn resolve(&mut self, record: &R, records: &dyn RecordAccess) -> Result<()> {
        while let Some(PendingCheck { reference, checker }) = self.queue.pop_front() {
            let referenced = match reference {
                Reference::Skip => {
                    self.stats.skipped += 1;
                    continue;
                }
                Reference::Direct(referenced) => {
                    self.stats.direct += 1;
                    referenced
                }
                Reference::Lookup(key) => {
                    self.stats.lookups += 1;
                    Referenced::Authoritative(records.load(key)?)
                }
            };
            checker.check_reference(record, &referenced, self, records)?;
        }
        Ok(())
    }
}

impl<R, C> FindingSink for CheckerEngine<'_, R, C> {
    fn report(&mut self, inconsistency: Inconsistency) {
        self.reporter.report(Finding::new(self.subject, inconsistency));
    }
}

/// Runs `check` on `record` and resolves everything it queued.
pub fn check_record<R, K>(
    check: &K,
    record: &R,
    reporter: &dyn ConsistencyReporter,
    records: &dyn RecordAccess,
) -> Result<ResolveStats>
where
    R: Record,
    K: RecordCheck<R>,
{
    let mut engine = CheckerEngine::new(record.key(), reporter);
    check.check(record, &mut engine, records)?;
    engine.resolve(record, records)?;
    Ok(engine.stats())
}
