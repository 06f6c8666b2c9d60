use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use crate::report::{ConsistencyReporter, Finding, Inconsistency};
use crate::store::RecordKey;

/// Property keys that existence constraints require, per label and per
/// relationship type.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MandatoryProperties {
    labels: FxHashMap<i64, BTreeSet<i64>>,
    relationship_types: FxHashMap<i64, BTreeSet<i64>>,
}

impl MandatoryProperties {
    /// Creates an empty set of requirements.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no requirement was registered.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty() && self.relationship_types.is_empty()
    }

    /// Requires `keys` on every node labelled `label`.
    pub fn require_for_label(&mut self, label: i64, keys: impl IntoIterator<Item = i64>) {
        self.labels.entry(label).or_default().extend(keys);
    }

    /// Requires `keys` on every relationship of type `rel_type`.
    pub fn require_for_relationship_type(
        &mut self,
        rel_type: i64,
        keys: impl IntoIterator<Item = i64>,
    ) {
        self.relationship_types
            .entry(rel_type)
            .or_default()
            .extend(keys);
    }

    /// Keys required on a node carrying `labels`.
    pub fn for_labels(&self, labels: &[i64]) -> BTreeSet<i64> {
        labels
            .iter()
            .filter_map(|label| self.labels.get(label))
            .flatten()
            .copied()
            .collect()
    }

    /// Keys required on a relationship of type `rel_type`.
    pub fn for_relationship_type(&self, rel_type: i64) -> BTreeSet<i64> {
        self.relationship_types
            .get(&rel_type)
            .cloned()
            .unwrap_or_default()
    }
}

/// Tracks the required keys of one entity while its property chain is
/// walked. Every key not observed by the time the scope is dropped is
/// reported as missing.
pub struct MandatoryPropertyScope<'r> {
    reporter: &'r dyn ConsistencyReporter,
    subject: RecordKey,
    missing: BTreeSet<i64>,
}

impl<'r> MandatoryPropertyScope<'r> {
    /// Opens a scope for `subject` requiring `keys`.
    pub fn new(
        reporter: &'r dyn ConsistencyReporter,
        subject: RecordKey,
        keys: BTreeSet<i64>,
    ) -> Self {
        Self {
            reporter,
            subject,
            missing: keys,
        }
    }

    /// Marks `key` as present.
    pub fn observe(&mut self, key: i64) {
        self.missing.remove(&key);
    }
}

impl Drop for MandatoryPropertyScope<'_> {
    fn drop(&mut self) {
        for key in std::mem::take(&mut self.missing) {
            self.reporter.report(Finding::new(
                self.subject,
                Inconsistency::MissingMandatoryProperty { key },
            ));
        }
    }
}
