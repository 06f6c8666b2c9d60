#![allow(missing_docs)]

use std::fs;
use std::sync::Once;

use sombra_consistency::{
    check_consistency,
    options::{BlockSizes, ChainCheckMode, CheckOptions},
    report::{CollectingReporter, Finding, Inconsistency, LoggingReporter},
    schema::{
        encode_rule, AllOnline, ConstraintKind, ConstraintRule, IndexRule, OnlineSet,
        SchemaDescriptor, SchemaRule,
    },
    store::{
        DynamicRecord, InMemoryStore, LabelField, PropertyOwner, PropertyValue, RecordAccess, RecordKey,
        SchemaRecord, StoreKind,
    },
};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

const PERSON: i64 = 0;
const CITY: i64 = 1;
const EMAIL: i64 = 0;
const NAME: i64 = 1;
const SINCE: i64 = 2;
const KNOWS: i64 = 0;
const LIVES_IN: i64 = 1;

/// Ids of the records the corruption tests poke at.
struct Demo {
    store: InMemoryStore,
    people: Vec<i64>,
    cities: Vec<i64>,
    knows: Vec<i64>,
}

fn schema_rules() -> Vec<SchemaRule> {
    let email = SchemaDescriptor::node(PERSON, [EMAIL]);
    vec![
        SchemaRule::Index(IndexRule::unique(0, "person_email", email.clone(), Some(1))),
        SchemaRule::Constraint(ConstraintRule::new(
            1,
            "person_email",
            email,
            ConstraintKind::Uniqueness,
            Some(0),
        )),
        SchemaRule::Constraint(ConstraintRule::new(
            2,
            "person_name",
            SchemaDescriptor::node(PERSON, [NAME]),
            ConstraintKind::Existence,
            None,
        )),
    ]
}

fn seed_demo() -> Demo {
    let mut store = InMemoryStore::new();
    store.add_token(StoreKind::LabelToken, "Person");
    store.add_token(StoreKind::LabelToken, "City");
    store.add_token(StoreKind::PropertyKeyToken, "email");
    store.add_token(StoreKind::PropertyKeyToken, "name");
    store.add_token(StoreKind::PropertyKeyToken, "since");
    store.add_token(StoreKind::RelationshipTypeToken, "KNOWS");
    store.add_token(StoreKind::RelationshipTypeToken, "LIVES_IN");
    for rule in schema_rules() {
        store.put_schema(SchemaRecord::new(rule.id(), encode_rule(&rule)));
    }

    let mut people = Vec::new();
    for (name, email) in [
        ("Ada", "ada@example.com"),
        ("Grace", "grace@example.com"),
        ("Barbara Liskov", "barbara@example.com"),
        ("Edsger", "edsger@example.com"),
    ] {
        let node = store.add_node();
        store.node_mut(node).unwrap().labels = LabelField::Inline(vec![PERSON]);
        let name = if name.len() > 8 {
            PropertyValue::String(store.write_dynamic(StoreKind::String, name.as_bytes()))
        } else {
            PropertyValue::ShortString(name.into())
        };
        let email = store.write_dynamic(StoreKind::String, email.as_bytes());
        store.add_properties(
            PropertyOwner::Node(node),
            &[(NAME, name), (EMAIL, PropertyValue::String(email))],
        );
        people.push(node);
    }
    let mut cities = Vec::new();
    for name in ["Leiden", "London"] {
        let node = store.add_node();
        store.node_mut(node).unwrap().labels = LabelField::Inline(vec![CITY]);
        store.add_properties(
            PropertyOwner::Node(node),
            &[(NAME, PropertyValue::ShortString(name.into()))],
        );
        cities.push(node);
    }

    let mut knows = Vec::new();
    for (from, to) in [(0, 1), (1, 2), (2, 3), (3, 0), (0, 2)] {
        let rel = store.add_relationship(people[from], people[to], KNOWS);
        store.add_properties(
            PropertyOwner::Relationship(rel),
            &[(SINCE, PropertyValue::Int(1970 + rel))],
        );
        knows.push(rel);
    }
    for (person, city) in [(0, 0), (1, 1), (2, 1), (3, 0)] {
        store.add_relationship(people[person], cities[city], LIVES_IN);
    }
    store.add_properties(PropertyOwner::Graph, &[(NAME, PropertyValue::Bool(true))]);

    Demo {
        store,
        people,
        cities,
        knows,
    }
}

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("sombra_consistency=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_ansi(false)
            .try_init();
    });
}

fn run(store: &InMemoryStore, options: &CheckOptions) -> CollectingReporter {
    let reporter = CollectingReporter::new();
    check_consistency(store, &AllOnline, &reporter, options).expect("check runs");
    reporter
}

fn kinds(reporter: &CollectingReporter) -> Vec<&'static str> {
    let mut kinds: Vec<_> = reporter
        .findings()
        .iter()
        .map(|finding| finding.inconsistency.kind())
        .collect();
    kinds.sort_unstable();
    kinds.dedup();
    kinds
}

#[test]
fn consistent_store_passes_in_both_chain_modes() {
    let demo = seed_demo();
    for mode in [ChainCheckMode::Cached, ChainCheckMode::Direct] {
        let reporter = CollectingReporter::new();
        let options = CheckOptions::default()
            .workers(2)
            .nodes_per_pass(4)
            .chain_mode(mode)
            .check_property_owners(true);
        let summary = check_consistency(&demo.store, &AllOnline, &reporter, &options).unwrap();
        assert!(reporter.is_empty(), "{:?}", reporter.findings());
        assert!(summary.success);
        assert_eq!(summary.errors + summary.warnings, 0);
        assert_eq!(summary.records_checked[&StoreKind::Node], 6);
        assert_eq!(summary.records_checked[&StoreKind::Relationship], 9);
        assert_eq!(summary.records_checked[&StoreKind::Schema], 3);
        assert_eq!(summary.chain_mode, mode);
    }
}

#[test]
fn pass_windows_follow_nodes_per_pass() {
    let demo = seed_demo();
    let reporter = CollectingReporter::new();
    let options = CheckOptions::default().workers(3).nodes_per_pass(4);
    let summary = check_consistency(&demo.store, &AllOnline, &reporter, &options).unwrap();
    assert_eq!(summary.passes, 2);
    assert_eq!(summary.nodes_per_pass, 4);
    assert!(summary.cache.hits > 0);
}

#[test]
fn chain_corruption_is_reported_once_per_pointer() {
    let mut demo = seed_demo();
    let rel = demo.knows[1];
    let wrong = demo.knows[3];
    demo.store.relationship_mut(rel).unwrap().source_next = wrong;

    let cached = run(&demo.store, &CheckOptions::default().workers(2).nodes_per_pass(3));
    let direct = run(
        &demo.store,
        &CheckOptions::default()
            .workers(2)
            .chain_mode(ChainCheckMode::Direct),
    );
    assert!(!cached.is_empty());
    assert_eq!(cached.sorted(), direct.sorted());
    assert!(cached
        .findings()
        .iter()
        .all(|finding| finding.subject.store == StoreKind::Relationship));
}

#[test]
fn missing_mandatory_property_is_reported_on_the_node() {
    let mut demo = seed_demo();
    let node = demo.people[2];
    let email = demo.store.write_dynamic(StoreKind::String, b"anon@example.com");
    demo.store.add_properties(
        PropertyOwner::Node(node),
        &[(EMAIL, PropertyValue::String(email))],
    );

    let reporter = run(&demo.store, &CheckOptions::default().workers(1));
    assert_eq!(
        reporter.findings(),
        vec![Finding::new(
            RecordKey::new(StoreKind::Node, node),
            Inconsistency::MissingMandatoryProperty { key: NAME },
        )]
    );

    let reporter = run(&demo.store, &CheckOptions::default().check_schema(false));
    assert!(reporter.is_empty(), "{:?}", reporter.findings());
}

#[test]
fn looping_string_value_is_reported_on_the_property() {
    let sizes = BlockSizes::default().string(4);
    let mut store = InMemoryStore::new().with_block_sizes(sizes);
    store.add_token(StoreKind::PropertyKeyToken, "bio");
    let node = store.add_node();
    store.put_dynamic(DynamicRecord::new(StoreKind::String, 10, 11, b"abcd".to_vec()));
    store.put_dynamic(DynamicRecord::new(StoreKind::String, 11, 10, b"efgh".to_vec()));
    let property = store.add_properties(PropertyOwner::Node(node), &[(0, PropertyValue::String(10))]);

    let options = CheckOptions::default().workers(2).block_sizes(sizes);
    let reporter = run(&store, &options);
    assert_eq!(
        reporter.findings(),
        vec![Finding::new(
            RecordKey::new(StoreKind::Property, property),
            Inconsistency::DynamicRecordChainCycle {
                store: StoreKind::String,
                record: 10
            },
        )]
    );
}

#[test]
fn shared_property_chain_is_reported_on_the_second_owner() {
    let mut demo = seed_demo();
    let person = demo.people[0];
    let city = demo.cities[1];
    let shared = demo.store.node(person).unwrap().next_prop;
    let abandoned = demo.store.node(city).unwrap().next_prop;
    demo.store.node_mut(city).unwrap().next_prop = shared;

    let owners = CheckOptions::default().workers(2).check_property_owners(true);
    let reporter = run(&demo.store, &owners);
    let findings = reporter.findings();
    assert!(findings.contains(&Finding::new(
        RecordKey::new(StoreKind::Node, city),
        Inconsistency::MultipleOwners {
            record: RecordKey::new(StoreKind::Property, shared),
            owner: RecordKey::new(StoreKind::Node, person),
        },
    )));
    assert!(findings.contains(&Finding::new(
        RecordKey::new(StoreKind::Property, abandoned),
        Inconsistency::OrphanPropertyChain,
    )));

    let reporter = run(&demo.store, &CheckOptions::default().workers(2));
    assert!(!kinds(&reporter).contains(&"multiple_owners"));
    assert!(!kinds(&reporter).contains(&"orphan_property_chain"));
}

#[test]
fn unreferenced_dynamic_block_is_an_orphan() {
    let mut demo = seed_demo();
    let stray = demo
        .store
        .write_dynamic(StoreKind::String, b"written but never linked");

    let owners = CheckOptions::default().check_property_owners(true);
    let reporter = run(&demo.store, &owners);
    assert_eq!(
        reporter.findings(),
        vec![Finding::new(
            RecordKey::new(StoreKind::String, stray),
            Inconsistency::OrphanDynamicRecord,
        )]
    );
    assert!(run(&demo.store, &CheckOptions::default()).is_empty());
}

#[test]
fn field_corruptions_are_detected() {
    init_tracing();
    let mut demo = seed_demo();
    let city = demo.cities[1];
    demo.store.node_mut(city).unwrap().labels = LabelField::Inline(vec![CITY, 7]);
    let rel = demo.knows[4];
    demo.store.relationship_mut(rel).unwrap().rel_type = 9;
    let first_prop = demo.store.node(demo.people[0]).unwrap().next_prop;
    demo.store.property_mut(first_prop).unwrap().in_use = false;

    let reporter = CollectingReporter::new();
    let summary = check_consistency(
        &demo.store,
        &AllOnline,
        &reporter,
        &CheckOptions::default().workers(2),
    )
    .unwrap();
    assert!(!summary.success);
    let kinds = kinds(&reporter);
    for expected in [
        "label_not_in_use",
        "relationship_type_not_in_use",
        "property_not_in_use",
    ] {
        assert!(kinds.contains(&expected), "{expected} missing from {kinds:?}");
        assert!(summary.by_kind.contains_key(expected));
    }
    assert_eq!(summary.errors + summary.warnings, reporter.len() as u64);
}

#[test]
fn schema_findings_go_through_the_same_reporter() {
    let mut demo = seed_demo();
    let mut rules = schema_rules();
    if let SchemaRule::Index(index) = &mut rules[0] {
        index.owning_constraint = None;
    }
    demo.store.put_schema(SchemaRecord::new(0, encode_rule(&rules[0])));
    demo.store.put_schema(SchemaRecord::new(3, vec![0xff, 0x00]));

    let reporter = CollectingReporter::new();
    let offline = OnlineSet::new([]);
    let summary =
        check_consistency(&demo.store, &offline, &reporter, &CheckOptions::default()).unwrap();
    assert!(!summary.success);
    let kinds = kinds(&reporter);
    assert!(kinds.contains(&"constraint_index_rule_not_referencing_back"));
    assert!(kinds.contains(&"malformed_schema_rule"));
    assert!(kinds.contains(&"index_not_online"));
    assert_eq!(summary.records_checked[&StoreKind::Schema], 4);
}

#[test]
fn summary_serializes_to_json() {
    let demo = seed_demo();
    let reporter = CollectingReporter::new();
    let summary = check_consistency(
        &demo.store,
        &AllOnline,
        &reporter,
        &CheckOptions::default().chain_mode(ChainCheckMode::Direct),
    )
    .unwrap();
    let json = summary.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["success"], true);
    assert_eq!(value["chain_mode"], "direct");
    assert_eq!(value["records_checked"]["node"], 6);
    assert!(value["cache"].is_object());
}

#[test]
fn options_load_from_file() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("consistency.toml");
    fs::write(
        &path,
        "workers = 2\nnodes_per_pass = 3\nchain_mode = \"cached\"\n",
    )
    .unwrap();
    let options = CheckOptions::load(&path).unwrap();
    assert_eq!(options.workers, 2);
    assert_eq!(options.nodes_per_pass, Some(3));

    let demo = seed_demo();
    let reporter = CollectingReporter::new();
    let summary = check_consistency(&demo.store, &AllOnline, &reporter, &options).unwrap();
    assert!(summary.success);
    assert_eq!(summary.passes, 2);

    fs::write(&path, "workers = 0\n").unwrap();
    assert!(CheckOptions::load(&path).is_err());
}

#[test]
fn invalid_options_fail_before_checking() {
    let demo = seed_demo();
    let reporter = CollectingReporter::new();
    let options = CheckOptions::default().workers(0);
    assert!(check_consistency(&demo.store, &AllOnline, &reporter, &options).is_err());
    assert!(reporter.is_empty());
}

#[test]
fn logging_reporter_only_counts() {
    init_tracing();
    let mut demo = seed_demo();
    let rel = demo.knows[0];
    demo.store.relationship_mut(rel).unwrap().in_use = false;
    let options = CheckOptions::default().max_findings_logged(2);
    let summary = check_consistency(&demo.store, &AllOnline, &LoggingReporter, &options).unwrap();
    assert!(!summary.success);
    assert!(summary.by_kind.contains_key("chain_reference_not_in_use"));
}
