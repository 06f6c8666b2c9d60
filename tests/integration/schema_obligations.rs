#![allow(missing_docs)]

use sombra_consistency::{
    report::{CollectingReporter, Finding, Inconsistency},
    schema::{
        decode_rule, encode_rule, AllOnline, ConstraintKind, ConstraintRule, IndexAccessor,
        IndexRule, OnlineSet, SchemaChecker, SchemaDescriptor, SchemaIndex, SchemaRule,
    },
    store::{InMemoryStore, RecordKey, SchemaRecord, StoreKind},
};

const INDEX: i64 = 4;
const CONSTRAINT: i64 = 9;

fn descriptor() -> SchemaDescriptor {
    SchemaDescriptor::relationship(0, [0, 1])
}

fn index(owner: Option<i64>) -> SchemaRule {
    SchemaRule::Index(IndexRule::unique(INDEX, "knows_key", descriptor(), owner))
}

fn constraint(kind: ConstraintKind, owned: Option<i64>) -> SchemaRule {
    SchemaRule::Constraint(ConstraintRule::new(
        CONSTRAINT,
        "knows_key",
        descriptor(),
        kind,
        owned,
    ))
}

fn store(rules: &[SchemaRule]) -> InMemoryStore {
    let mut store = InMemoryStore::new();
    store.add_token(StoreKind::RelationshipTypeToken, "KNOWS");
    store.add_token(StoreKind::PropertyKeyToken, "since");
    store.add_token(StoreKind::PropertyKeyToken, "weight");
    for rule in rules {
        store.put_schema(SchemaRecord::new(rule.id(), encode_rule(rule)));
    }
    store
}

fn check(store: &InMemoryStore, indexes: &dyn IndexAccessor) -> (SchemaIndex, Vec<Finding>) {
    let reporter = CollectingReporter::new();
    let index = SchemaChecker::new(store, &reporter)
        .check(indexes)
        .expect("schema check runs");
    (index, reporter.sorted())
}

fn on(rule: i64, inconsistency: Inconsistency) -> Finding {
    Finding::new(RecordKey::new(StoreKind::Schema, rule), inconsistency)
}

#[test]
fn consistent_pair_has_no_findings() {
    for kind in [ConstraintKind::Uniqueness, ConstraintKind::NodeKey] {
        let rules = [index(Some(CONSTRAINT)), constraint(kind, Some(INDEX))];
        let (index, findings) = check(&store(&rules), &AllOnline);
        assert!(findings.is_empty(), "{kind:?}: {findings:?}");
        assert_eq!(index.rules().len(), 2);
        assert_eq!(index.malformed(), 0);
    }
}

#[test]
fn dropped_index_back_pointer_is_one_finding() {
    let rules = [index(None), constraint(ConstraintKind::Uniqueness, Some(INDEX))];
    let (_, findings) = check(&store(&rules), &AllOnline);
    assert_eq!(
        findings,
        vec![on(
            INDEX,
            Inconsistency::ConstraintIndexRuleNotReferencingBack {
                constraint: CONSTRAINT
            }
        )]
    );
}

#[test]
fn dropped_constraint_pointer_is_one_finding() {
    let rules = [index(Some(CONSTRAINT)), constraint(ConstraintKind::Uniqueness, None)];
    let (_, findings) = check(&store(&rules), &AllOnline);
    assert_eq!(
        findings,
        vec![on(INDEX, Inconsistency::MissingObligation { rule: CONSTRAINT })]
    );
}

#[test]
fn orphaned_index_backed_constraint_is_reported() {
    let rules = [constraint(ConstraintKind::NodeKey, None)];
    let (_, findings) = check(&store(&rules), &AllOnline);
    assert_eq!(
        findings,
        vec![on(CONSTRAINT, Inconsistency::ConstraintWithoutIndex)]
    );
}

#[test]
fn offline_backing_index_is_reported() {
    let rules = [index(Some(CONSTRAINT)), constraint(ConstraintKind::Uniqueness, Some(INDEX))];
    let store = store(&rules);
    let (_, findings) = check(&store, &OnlineSet::new([INDEX + 1]));
    assert_eq!(findings, vec![on(INDEX, Inconsistency::IndexNotOnline)]);

    let mut online = OnlineSet::new([]);
    online.insert(INDEX);
    let (_, findings) = check(&store, &online);
    assert!(findings.is_empty(), "{findings:?}");
}

#[test]
fn stored_rules_round_trip_through_the_codec() {
    let rules = [index(Some(CONSTRAINT)), constraint(ConstraintKind::NodeKey, Some(INDEX))];
    let store = store(&rules);
    let (index, _) = check(&store, &AllOnline);
    for rule in &rules {
        assert_eq!(index.rule(rule.id()), Some(rule));
        let decoded = decode_rule(rule.id(), &encode_rule(rule)).unwrap();
        assert_eq!(&decoded, rule);
    }
}

#[test]
fn node_key_constraint_makes_properties_mandatory() {
    let rules = [
        SchemaRule::Index(IndexRule::unique(
            0,
            "person_key",
            SchemaDescriptor::node(0, [0, 1]),
            Some(1),
        )),
        SchemaRule::Constraint(ConstraintRule::new(
            1,
            "person_key",
            SchemaDescriptor::node(0, [0, 1]),
            ConstraintKind::NodeKey,
            Some(0),
        )),
    ];
    let mut store = store(&rules);
    store.add_token(StoreKind::LabelToken, "Person");
    let (index, findings) = check(&store, &AllOnline);
    assert!(findings.is_empty(), "{findings:?}");
    let required: Vec<i64> = index.mandatory().for_labels(&[0]).into_iter().collect();
    assert_eq!(required, vec![0, 1]);
    assert!(index.mandatory().for_relationship_type(0).is_empty());
}
