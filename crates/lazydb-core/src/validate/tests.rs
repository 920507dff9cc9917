use super::*;
use crate::{
    entity::EntityInstance,
    intercept::{LazyInterceptor, write_detached},
    test_support::{DOCUMENT, MY_ENTITY, StubFetcher, my_entity},
    visitor::IssueCollector,
};

fn check(constraint: Constraint, value: &Value) -> Vec<String> {
    let mut collector = IssueCollector::new();
    collector.push(PathSegment::Field("f"));
    constraint.check(value, &mut collector);

    collector.into_issues().remove("f").unwrap_or_default()
}

fn document(label: &str, tags: &[&str]) -> EntityInstance {
    let mut instance = EntityInstance::with_key(&DOCUMENT, "doc-1").unwrap();
    write_detached(&mut instance, "label", Value::from(label)).unwrap();
    write_detached(&mut instance, "tags", Value::from(tags.to_vec())).unwrap();

    instance
}

// ============================================================================
// Constraint
// ============================================================================

#[test]
fn max_len_counts_list_elements_and_text_chars() {
    assert!(check(Constraint::MaxLen(3), &Value::from(vec!["a", "b", "c"])).is_empty());
    assert_eq!(
        check(Constraint::MaxLen(3), &Value::from(vec!["a", "b", "c", "d"])),
        vec!["size (4) is greater than maximum of 3".to_string()]
    );
    assert_eq!(check(Constraint::MaxLen(2), &Value::from("héé")).len(), 1);
}

#[test]
fn min_len_and_range() {
    assert_eq!(check(Constraint::MinLen(2), &Value::from("a")).len(), 1);
    assert!(check(Constraint::MinLen(2), &Value::from("ab")).is_empty());

    let range = Constraint::Range { min: 0, max: 10 };
    assert!(check(range, &Value::Int(10)).is_empty());
    assert_eq!(
        check(range, &Value::Int(11)),
        vec!["11 is outside the range 0..=10".to_string()]
    );
}

#[test]
fn null_satisfies_everything_but_required() {
    for constraint in [
        Constraint::MaxLen(0),
        Constraint::MinLen(5),
        Constraint::Range { min: 1, max: 2 },
    ] {
        assert!(check(constraint, &Value::Null).is_empty(), "{constraint:?}");
    }
    assert_eq!(
        check(Constraint::Required, &Value::Null),
        vec!["value is required".to_string()]
    );
}

// ============================================================================
// validate_entity
// ============================================================================

#[test]
fn new_instance_is_fully_validated() {
    let instance = my_entity(1, &["a", "b", "c", "d"]);

    let err = validate_entity(&instance, &ReachabilityResolver::new())
        .expect_err("four elements exceed the bound");

    assert_eq!(
        err.issues()["lazy_cols"],
        vec!["size (4) is greater than maximum of 3".to_string()]
    );
    assert_eq!(
        err.to_string(),
        "validation failed: lazy_cols: size (4) is greater than maximum of 3"
    );
}

#[test]
fn unfetched_lazy_attribute_is_skipped() {
    let fetcher = StubFetcher::new(vec![
        Value::Int(1),
        Value::from(vec!["a", "b", "c", "d", "e"]),
        Value::Int(0),
    ]);
    let instance = fetcher.load(&MY_ENTITY);

    let summary = validate_entity(&instance, &ReachabilityResolver::new()).unwrap();

    assert_eq!(summary, ValidationSummary { checked: 0, skipped: 1 });
    assert_eq!(fetcher.attribute_fetches.get(), 0);
}

#[test]
fn fetched_lazy_attribute_is_checked() {
    let fetcher = StubFetcher::new(vec![
        Value::Int(1),
        Value::from(vec!["a", "b", "c", "d", "e"]),
        Value::Int(0),
    ]);
    let mut instance = fetcher.load(&MY_ENTITY);
    LazyInterceptor::new(&fetcher)
        .on_read(&mut instance, "lazy_cols")
        .unwrap();

    let err = validate_entity(&instance, &ReachabilityResolver::new()).unwrap_err();

    assert_eq!(err.issues().keys().collect::<Vec<_>>(), vec!["lazy_cols"]);
}

#[test]
fn element_constraints_report_indexed_paths() {
    let instance = document("ok", &["tiny", "too-long", "fine", "overflowing"]);

    let err = validate_entity(&instance, &ReachabilityResolver::new()).unwrap_err();
    let issues = err.issues();

    assert_eq!(issues.keys().collect::<Vec<_>>(), vec!["tags[1]", "tags[3]"]);
    assert_eq!(
        issues["tags[1]"],
        vec!["size (8) is greater than maximum of 4".to_string()]
    );
}

#[test]
fn issues_from_several_attributes_are_collected_together() {
    let mut instance = document("much too long", &["abcde"]);
    write_detached(&mut instance, "label", Value::Null).unwrap();

    let err = validate_entity(&instance, &ReachabilityResolver::new()).unwrap_err();

    assert_eq!(err.issues()["label"], vec!["value is required".to_string()]);
    assert!(err.issues().contains_key("tags[0]"));
}

#[test]
fn summary_counts_checked_attributes() {
    let instance = document("fine", &["a", "b"]);

    let summary = validate_entity(&instance, &ReachabilityResolver::new()).unwrap();

    assert_eq!(summary, ValidationSummary { checked: 2, skipped: 0 });
}

#[test]
fn unconstrained_attributes_are_neither_checked_nor_skipped() {
    let fetcher = StubFetcher::new(vec![
        Value::from("doc-2"),
        Value::from("label"),
        Value::from("body"),
        Value::from(vec!["a"]),
    ]);
    let mut instance = fetcher.load(&DOCUMENT);
    LazyInterceptor::new(&fetcher)
        .on_read(&mut instance, "tags")
        .unwrap();

    let summary = validate_entity(&instance, &ReachabilityResolver::new()).unwrap();

    assert_eq!(summary, ValidationSummary { checked: 2, skipped: 0 });
    assert!(!crate::tracker::is_attribute_initialized(&instance, "body").unwrap());
}
