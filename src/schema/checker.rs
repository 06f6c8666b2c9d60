use std::collections::BTreeMap;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info};

use crate::check::{FindingSink, MandatoryProperties};
use crate::error::Result;
use crate::report::{ConsistencyReporter, Finding, Inconsistency};
use crate::store::{RecordAccess, RecordKey, StoreKind};

use super::codec::decode_rule;
use super::rule::{ConstraintRule, ContentKey, EntityKind, IndexRule, SchemaRule};

/// Online state of indexes, as seen by the index subsystem.
pub trait IndexAccessor: Send + Sync {
    /// Whether `rule` is online.
    fn is_online(&self, rule: &IndexRule) -> bool;
}

/// Reports every index online.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllOnline;

impl IndexAccessor for AllOnline {
    fn is_online(&self, _rule: &IndexRule) -> bool {
        true
    }
}

/// Reports exactly the listed index ids online.
#[derive(Debug, Default, Clone)]
pub struct OnlineSet {
    online: FxHashSet<i64>,
}

impl OnlineSet {
    /// Online set of the given index ids.
    pub fn new(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            online: ids.into_iter().collect(),
        }
    }

    /// Marks `id` online.
    pub fn insert(&mut self, id: i64) {
        self.online.insert(id);
    }
}

impl IndexAccessor for OnlineSet {
    fn is_online(&self, rule: &IndexRule) -> bool {
        self.online.contains(&rule.id)
    }
}

/// Everything learned from the schema store in the first phase.
#[derive(Debug, Default, Clone)]
pub struct SchemaIndex {
    rules: BTreeMap<i64, SchemaRule>,
    /// Constraint id to the first unique index naming it as owner.
    claimed_by_index: FxHashMap<i64, i64>,
    /// Index id to the first constraint naming it as owned index.
    claimed_by_constraint: FxHashMap<i64, i64>,
    mandatory: MandatoryProperties,
    malformed: u64,
}

impl SchemaIndex {
    /// Decoded rules by id.
    pub fn rules(&self) -> &BTreeMap<i64, SchemaRule> {
        &self.rules
    }

    /// Rule `id`, if it decoded.
    pub fn rule(&self, id: i64) -> Option<&SchemaRule> {
        self.rules.get(&id)
    }

    /// Keys required by existence and node key constraints.
    pub fn mandatory(&self) -> &MandatoryProperties {
        &self.mandatory
    }

    /// In-use schema records that did not decode.
    pub fn malformed(&self) -> u64 {
        self.malformed
    }
}

struct RuleFindings<'r> {
    reporter: &'r dyn ConsistencyReporter,
    subject: RecordKey,
}

impl<'r> RuleFindings<'r> {
    fn new(reporter: &'r dyn ConsistencyReporter, rule: i64) -> Self {
        Self {
            reporter,
            subject: RecordKey::new(StoreKind::Schema, rule),
        }
    }
}

impl FindingSink for RuleFindings<'_> {
    fn report(&mut self, inconsistency: Inconsistency) {
        self.reporter.report(Finding::new(self.subject, inconsistency));
    }
}

/// Two-phase check of the schema store.
///
/// The first phase decodes every rule, checks the tokens it references and
/// its uniqueness among the other rules, and records which rule claims
/// which. The second phase verifies that every claim is returned.
pub struct SchemaChecker<'a> {
    records: &'a dyn RecordAccess,
    reporter: &'a dyn ConsistencyReporter,
}

impl<'a> SchemaChecker<'a> {
    /// Creates a checker reading from `records` and reporting to `reporter`.
    pub fn new(records: &'a dyn RecordAccess, reporter: &'a dyn ConsistencyReporter) -> Self {
        Self { records, reporter }
    }

    /// Runs both phases and returns the first phase's output.
    pub fn check(&self, indexes: &dyn IndexAccessor) -> Result<SchemaIndex> {
        let index = self.build_index()?;
        self.verify(&index, indexes)?;
        Ok(index)
    }

    /// First phase: decodes and validates every in-use rule.
    pub fn build_index(&self) -> Result<SchemaIndex> {
        let mut index = SchemaIndex::default();
        let mut contents: FxHashMap<ContentKey, i64> = FxHashMap::default();
        let mut names: FxHashMap<String, i64> = FxHashMap::default();

        for id in 0..self.records.high_id(StoreKind::Schema) {
            let record = self.records.schema(id)?;
            if !record.in_use {
                continue;
            }
            let mut sink = RuleFindings::new(self.reporter, id);
            let rule = match decode_rule(id, &record.data) {
                Ok(rule) => rule,
                Err(err) => {
                    debug!(rule = id, error = %err, "consistency.schema.malformed");
                    sink.report(Inconsistency::MalformedSchemaRule {
                        reason: err.to_string(),
                    });
                    index.malformed += 1;
                    continue;
                }
            };

            self.check_tokens(&rule, &mut sink)?;

            if let Some(&other) = contents.get(&rule.content_key()) {
                sink.report(Inconsistency::DuplicateRuleContent { other });
            } else {
                contents.insert(rule.content_key(), id);
            }

            match names.get(rule.name()) {
                Some(&other) => {
                    let paired = index
                        .rules
                        .get(&other)
                        .is_some_and(|first| first.pairs_with(&rule));
                    if !paired {
                        sink.report(Inconsistency::DuplicateRuleName { other });
                    }
                }
                None => {
                    names.insert(rule.name().to_owned(), id);
                }
            }

            match &rule {
                SchemaRule::Index(IndexRule {
                    owning_constraint: Some(constraint),
                    ..
                }) => claim(&mut index.claimed_by_index, *constraint, id, &mut sink),
                SchemaRule::Constraint(constraint) => {
                    if let Some(owned) = constraint.owned_index {
                        claim(&mut index.claimed_by_constraint, owned, id, &mut sink);
                    }
                    if constraint.kind.requires_existence() {
                        let schema = &constraint.schema;
                        let keys = schema.properties.iter().copied();
                        match schema.entity {
                            EntityKind::Node => index.mandatory.require_for_label(schema.token, keys),
                            EntityKind::Relationship => index
                                .mandatory
                                .require_for_relationship_type(schema.token, keys),
                        }
                    }
                }
                SchemaRule::Index(_) => {}
            }
            index.rules.insert(id, rule);
        }
        info!(
            rules = index.rules.len(),
            malformed = index.malformed,
            "consistency.schema.indexed"
        );
        Ok(index)
    }

    /// Second phase: verifies the claims recorded in `index` and that every
    /// index is online.
    pub fn verify(&self, index: &SchemaIndex, indexes: &dyn IndexAccessor) -> Result<()> {
        for rule in index.rules.values() {
            let mut sink = RuleFindings::new(self.reporter, rule.id());
            match rule {
                SchemaRule::Index(rule) => {
                    if rule.unique {
                        verify_unique_index(rule, index, &mut sink);
                    }
                    if !indexes.is_online(rule) {
                        sink.report(Inconsistency::IndexNotOnline);
                    }
                }
                SchemaRule::Constraint(rule) => verify_constraint(rule, index, &mut sink),
            }
        }
        debug!(rules = index.rules.len(), "consistency.schema.verified");
        Ok(())
    }

    fn check_tokens(&self, rule: &SchemaRule, sink: &mut RuleFindings<'_>) -> Result<()> {
        let schema = rule.schema();
        let token_store = match schema.entity {
            EntityKind::Node => StoreKind::LabelToken,
            EntityKind::Relationship => StoreKind::RelationshipTypeToken,
        };
        if !self.records.token(token_store, schema.token)?.in_use {
            sink.report(match schema.entity {
                EntityKind::Node => Inconsistency::LabelNotInUse {
                    label: schema.token,
                },
                EntityKind::Relationship => Inconsistency::RelationshipTypeNotInUse {
                    rel_type: schema.token,
                },
            });
        }
        for &key in &schema.properties {
            if !self.records.token(StoreKind::PropertyKeyToken, key)?.in_use {
                sink.report(Inconsistency::PropertyKeyNotInUse { key });
            }
        }
        Ok(())
    }
}

/// Records that `claimant` claims `target`; a second claimant is reported.
fn claim(claims: &mut FxHashMap<i64, i64>, target: i64, claimant: i64, sink: &mut RuleFindings<'_>) {
    match claims.get(&target) {
        Some(&other) => sink.report(Inconsistency::DuplicateObligation { target, other }),
        None => {
            claims.insert(target, claimant);
        }
    }
}

fn verify_unique_index(rule: &IndexRule, index: &SchemaIndex, sink: &mut RuleFindings<'_>) {
    let claimed_by = index.claimed_by_constraint.get(&rule.id).copied();
    match (rule.owning_constraint, claimed_by) {
        (Some(owner), Some(claimant)) if owner == claimant => {
            let name_differs = matches!(
                index.rules.get(&owner),
                Some(SchemaRule::Constraint(constraint)) if constraint.name != rule.name
            );
            if name_differs {
                sink.report(Inconsistency::ObligationNameMismatch { constraint: owner });
            }
        }
        (Some(owner), Some(claimant)) => sink.report(Inconsistency::ObligationMismatch {
            expected: owner,
            found: claimant,
        }),
        (Some(owner), None) => sink.report(Inconsistency::MissingObligation { rule: owner }),
        (None, Some(claimant)) => {
            sink.report(Inconsistency::ConstraintIndexRuleNotReferencingBack {
                constraint: claimant,
            })
        }
        (None, None) => {}
    }
}

fn verify_constraint(rule: &ConstraintRule, index: &SchemaIndex, sink: &mut RuleFindings<'_>) {
    match rule.owned_index {
        Some(owned) => {
            let resolves = index
                .rules
                .get(&owned)
                .and_then(SchemaRule::as_unique_index)
                .is_some();
            if !resolves {
                sink.report(Inconsistency::OwnedIndexNotFound { index: owned });
            }
        }
        None => {
            if rule.kind.is_index_backed() && !index.claimed_by_index.contains_key(&rule.id) {
                sink.report(Inconsistency::ConstraintWithoutIndex);
            }
        }
    }
}
