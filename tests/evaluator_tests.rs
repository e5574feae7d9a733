// tests/evaluator_tests.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use streamy::catalogue::{base_animals, safari_animal_schema};
use streamy::parser::parse;
use streamy::{CancelToken, Evaluator, FieldKind, Key, RecordSchema, RuntimeError, Value};

fn run_with(evaluator: &Evaluator, script: &str, input: Vec<Value>) -> Result<Value, RuntimeError> {
    let chain = parse(script).unwrap();
    evaluator.run(&chain, input, &CancelToken::new())
}

fn run(script: &str, input: Vec<Value>) -> Result<Value, RuntimeError> {
    run_with(&Evaluator::new(), script, input)
}

fn ints(values: &[i64]) -> Vec<Value> {
    values.iter().map(|&n| Value::Integer(n)).collect()
}

fn int_list(values: &[i64]) -> Value {
    Value::List(ints(values))
}

fn animals() -> Vec<Value> {
    let schema = safari_animal_schema().unwrap();
    base_animals(&schema).unwrap().into_iter().map(Value::Record).collect()
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

fn name_of(value: &Value) -> String {
    match value {
        Value::Record(record) => record.get("name").and_then(Value::as_text).unwrap().to_string(),
        other => panic!("Expected record, got {:?}", other),
    }
}

// ============================================================================
// Filter, map and flatMap
// ============================================================================

#[test]
fn test_filter_and_map() {
    assert_eq!(
        run(".filter(x -> x % 2 == 0).map(x -> x * 10)", ints(&[1, 2, 3, 4])).unwrap(),
        int_list(&[20, 40])
    );
}

#[test]
fn test_filter_requires_boolean() {
    let err = run(".filter(x -> x + 1)", ints(&[1])).unwrap_err();
    assert!(matches!(err, RuntimeError::TypeError(msg) if msg.contains("boolean")));
}

#[test]
fn test_filter_by_boolean_field() {
    let result = run(".filter(predator).map(a -> a.name)", animals()).unwrap();
    assert_eq!(
        result,
        Value::List(vec![
            text("Henno the Hyena"),
            text("Leo the Lion"),
            text("Hakka the Hyena"),
            text("Luma the Lion"),
        ])
    );
}

#[test]
fn test_short_circuit() {
    // x / 0 is never evaluated
    assert_eq!(
        run(".filter(x -> x > 1 and x / 0 > 1)", ints(&[1])).unwrap(),
        Value::List(vec![])
    );
    assert_eq!(
        run(".filter(x -> x == 1 or x / 0 > 1)", ints(&[1])).unwrap(),
        int_list(&[1])
    );
}

#[test]
fn test_conditional_evaluates_one_branch() {
    assert_eq!(
        run(".map(x -> x == 0 ? 0 : 10 / x)", ints(&[0, 2, 5])).unwrap(),
        int_list(&[0, 5, 2])
    );
    assert_eq!(
        run(".map(x -> x % 2 == 0 ? \"even\" : \"odd\")", ints(&[1, 2])).unwrap(),
        Value::List(vec![text("odd"), text("even")])
    );
}

#[test]
fn test_conditional_requires_boolean() {
    let err = run(".map(x -> x ? 1 : 2)", ints(&[1])).unwrap_err();
    assert!(matches!(err, RuntimeError::TypeError(msg) if msg.contains("must be boolean")));
}

#[test]
fn test_group_by_conditional_label() {
    let result = run(
        ".groupBy(a -> a.weight < 200 ? \"light\" : \"heavy\").count()",
        animals(),
    )
    .unwrap();
    let mut expected = BTreeMap::new();
    expected.insert(Key::Text("heavy".to_string()), Value::Integer(6));
    expected.insert(Key::Text("light".to_string()), Value::Integer(4));
    assert_eq!(result, Value::Map(expected));
}

#[test]
fn test_flat_map_range() {
    assert_eq!(
        run(".flatMap(x -> range(0, x))", ints(&[3, 2])).unwrap(),
        int_list(&[0, 1, 2, 0, 1])
    );
}

#[test]
fn test_flat_map_huge_range_is_lazy() {
    assert_eq!(
        run(".flatMap(x -> range(0, 9223372036854775807)).limit(3)", ints(&[1])).unwrap(),
        int_list(&[0, 1, 2])
    );
}

#[test]
fn test_eager_range_is_capped() {
    let evaluator = Evaluator::with_max_elements(10);
    assert_eq!(
        run_with(&evaluator, ".map(x -> range(0, x).length())", ints(&[100])).unwrap_err(),
        RuntimeError::TooManyElements(10)
    );
    assert_eq!(
        run_with(&evaluator, ".map(x -> range(0, x).length())", ints(&[4])).unwrap(),
        int_list(&[4])
    );
}

#[test]
fn test_record_accessor_method() {
    assert_eq!(
        run(".map(a -> a.species()).limit(2)", animals()).unwrap(),
        Value::List(vec![text("HYENA"), text("ZEBRA")])
    );
}

#[test]
fn test_text_methods() {
    let input = vec![text("  Leo  "), text("Luma")];
    assert_eq!(
        run(".map(s -> s.trim().lower())", input.clone()).unwrap(),
        Value::List(vec![text("leo"), text("luma")])
    );
    assert_eq!(
        run(".filter(s -> s.contains(\"m\")).map(s -> s.length())", input.clone()).unwrap(),
        int_list(&[4])
    );
    assert_eq!(
        run(".map(s -> s.trim() + \"!\")", input).unwrap(),
        Value::List(vec![text("Leo!"), text("Luma!")])
    );
}

#[test]
fn test_functions() {
    assert_eq!(
        run(".map(x -> abs(x) + max(x, 0) + min(x, 0))", ints(&[-3, 2])).unwrap(),
        int_list(&[0, 4])
    );
    assert_eq!(run(".map(x -> x.abs())", ints(&[-7])).unwrap(), int_list(&[7]));
}

#[test]
fn test_method_on_wrong_type() {
    let err = run(".map(x -> x.upper())", ints(&[1])).unwrap_err();
    assert!(matches!(err, RuntimeError::TypeError(_)));
}

// ============================================================================
// Arithmetic
// ============================================================================

#[test]
fn test_multiplication_overflow() {
    let err = run(".map(x -> x * 3000000000000000000)", ints(&[1, 5])).unwrap_err();
    assert!(matches!(err, RuntimeError::Overflow(_)));
    assert!(err.to_string().contains("overflow"));
}

#[test]
fn test_negation_overflow() {
    let err = run(".map(x -> -x)", ints(&[i64::MIN])).unwrap_err();
    assert!(matches!(err, RuntimeError::Overflow(_)));
}

#[test]
fn test_min_divided_by_minus_one() {
    let err = run(".map(x -> x / -1)", ints(&[i64::MIN])).unwrap_err();
    assert!(matches!(err, RuntimeError::Overflow(_)));
}

#[test]
fn test_division() {
    assert_eq!(
        run(".map(x -> x / 2)", ints(&[4, 3, -7])).unwrap(),
        int_list(&[2, 1, -3])
    );
    assert_eq!(
        run(".map(x -> x / 2.0)", ints(&[3])).unwrap(),
        Value::List(vec![Value::Float(1.5)])
    );
    assert!(matches!(
        run(".map(x -> x / -1)", ints(&[i64::MIN])).unwrap_err(),
        RuntimeError::Overflow(_)
    ));
    assert_eq!(
        run(".map(x -> x / 0)", ints(&[4])).unwrap_err(),
        RuntimeError::DivisionByZero
    );
    assert_eq!(
        run(".map(x -> x % 0)", ints(&[4])).unwrap_err(),
        RuntimeError::DivisionByZero
    );
}

#[test]
fn test_mixed_arithmetic_is_exact() {
    assert_eq!(
        run(".map(x -> x * 0.5)", ints(&[3, 4])).unwrap(),
        Value::List(vec![Value::Float(1.5), Value::Integer(2)])
    );
    assert_eq!(
        run(".map(x -> x + 0.25)", ints(&[1])).unwrap(),
        Value::List(vec![Value::Float(1.25)])
    );
}

#[test]
fn test_compare_mismatched_types() {
    let err = run(".filter(x -> x > \"a\")", ints(&[1])).unwrap_err();
    assert!(matches!(err, RuntimeError::TypeError(msg) if msg.contains("Cannot compare")));
}

#[test]
fn test_integer_quotient_is_a_group_key() {
    let result = run(".groupBy(a -> a.weight / 1000).count()", animals()).unwrap();
    let mut expected = BTreeMap::new();
    expected.insert(Key::Integer(0), Value::Integer(8));
    expected.insert(Key::Integer(6), Value::Integer(2));
    assert_eq!(result, Value::Map(expected));
}

#[test]
fn test_mixed_comparison_keeps_integer_precision() {
    // 2^53 + 1 has no exact f64
    let big = 9_007_199_254_740_993;
    assert_eq!(
        run(".filter(x -> x > 9007199254740992.0)", ints(&[big])).unwrap(),
        int_list(&[big])
    );
    assert_eq!(
        run(".filter(x -> x == 9007199254740992.0).count()", ints(&[big])).unwrap(),
        Value::Integer(0)
    );
    assert_eq!(
        run(".max(by x -> x)", vec![Value::Float(9007199254740992.0), Value::Integer(big)]).unwrap(),
        Value::Integer(big)
    );
}

#[test]
fn test_numbers_compare_by_value() {
    let input = vec![Value::Integer(2), Value::Float(2.0), Value::Float(2.5)];
    assert_eq!(
        run(".filter(x -> x == 2).count()", input).unwrap(),
        Value::Integer(2)
    );
}

// ============================================================================
// Ordering stages
// ============================================================================

#[test]
fn test_sorted_natural() {
    assert_eq!(run(".sorted()", ints(&[3, 1, 2])).unwrap(), int_list(&[1, 2, 3]));
    assert_eq!(run(".sorted(descending)", ints(&[3, 1, 2])).unwrap(), int_list(&[3, 2, 1]));
}

#[test]
fn test_sort_is_stable() {
    // Keys: 1, 1, 1, 0, 0
    assert_eq!(
        run(".sorted(by x -> x % 3)", ints(&[4, 1, 7, 3, 6])).unwrap(),
        int_list(&[3, 6, 4, 1, 7])
    );
}

#[test]
fn test_sort_records_by_natural_key() {
    let result = run(".sorted()", animals()).unwrap();
    let Value::List(sorted) = result else {
        panic!("Expected list");
    };
    assert_eq!(name_of(&sorted[0]), "Garo the Giraffe");
    assert_eq!(name_of(&sorted[9]), "Motu the Elephant");
}

#[test]
fn test_sort_with_then() {
    let result = run(".sorted(by species then by weight descending).limit(2)", animals()).unwrap();
    let Value::List(sorted) = result else {
        panic!("Expected list");
    };
    assert_eq!(name_of(&sorted[0]), "Motu the Elephant");
    assert_eq!(name_of(&sorted[1]), "Ello the Elephant");
}

#[test]
fn test_sort_without_natural_key() {
    let schema = Arc::new(RecordSchema::new("Point", vec![("x", FieldKind::Number)]));
    let input = vec![
        Value::Record(schema.record(vec![Value::Integer(2)]).unwrap()),
        Value::Record(schema.record(vec![Value::Integer(1)]).unwrap()),
    ];
    let err = run(".sorted()", input.clone()).unwrap_err();
    assert!(matches!(err, RuntimeError::TypeError(msg) if msg.contains("no natural ordering")));
    assert!(run(".sorted(by x)", input).is_ok());
}

#[test]
fn test_sort_mixed_kinds() {
    let input = vec![Value::Integer(1), text("a")];
    assert!(matches!(run(".sorted()", input), Err(RuntimeError::TypeError(_))));
}

#[test]
fn test_distinct_keeps_first() {
    assert_eq!(run(".distinct()", ints(&[3, 1, 3, 2, 1])).unwrap(), int_list(&[3, 1, 2]));
}

#[test]
fn test_distinct_structural_equality() {
    let input = vec![
        Value::Integer(1),
        Value::Float(1.0),
        Value::Float(0.0),
        Value::Float(-0.0),
        text("1"),
        Value::List(vec![Value::Integer(1)]),
        Value::List(vec![Value::Integer(1)]),
    ];
    assert_eq!(
        run(".distinct()", input).unwrap(),
        Value::List(vec![
            Value::Integer(1),
            Value::Float(1.0),
            Value::Float(0.0),
            text("1"),
            Value::List(vec![Value::Integer(1)]),
        ])
    );

    let mut doubled = animals();
    doubled.extend(animals());
    assert_eq!(run(".distinct().count()", doubled).unwrap(), Value::Integer(10));
}

#[test]
fn test_distinct_large_sequence() {
    assert_eq!(
        run(".flatMap(x -> range(0, 60000)).distinct().count()", ints(&[1, 2, 3])).unwrap(),
        Value::Integer(60000)
    );
}

#[test]
fn test_max_and_min() {
    let max = run(".max(by weight)", animals()).unwrap();
    assert_eq!(name_of(&max), "Motu the Elephant");
    let min = run(".min(weight)", animals()).unwrap();
    assert_eq!(name_of(&min), "Hakka the Hyena");
}

#[test]
fn test_max_first_wins_ties() {
    // Keys: 1, 1, 1, 2, 2
    assert_eq!(run(".max(by x -> x % 3)", ints(&[4, 1, 7, 2, 5])).unwrap(), Value::Integer(2));
    assert_eq!(run(".min(by x -> x % 3)", ints(&[4, 1, 7, 2, 5])).unwrap(), Value::Integer(4));
}

#[test]
fn test_max_of_empty_input() {
    let err = run(".filter(x -> x > 100).max()", ints(&[1, 2])).unwrap_err();
    assert_eq!(err, RuntimeError::EmptyInput("max"));
    assert_eq!(err.to_string(), "empty input to max");
}

#[test]
fn test_limit_and_skip() {
    assert_eq!(run(".skip(1).limit(2)", ints(&[1, 2, 3, 4, 5])).unwrap(), int_list(&[2, 3]));
    assert_eq!(run(".skip(10)", ints(&[1, 2])).unwrap(), int_list(&[]));
}

#[test]
fn test_materialization_cap() {
    let evaluator = Evaluator::with_max_elements(3);
    assert_eq!(
        run_with(&evaluator, ".sorted()", ints(&[5, 4, 3, 2, 1])).unwrap_err(),
        RuntimeError::TooManyElements(3)
    );
    assert_eq!(
        run_with(&evaluator, ".limit(3).sorted()", ints(&[5, 4, 3, 2, 1])).unwrap(),
        int_list(&[3, 4, 5])
    );
}

// ============================================================================
// Reductions and grouping
// ============================================================================

#[test]
fn test_sum() {
    assert_eq!(run(".sum(weight)", animals()).unwrap(), Value::Integer(14955));
    assert_eq!(run(".sum()", ints(&[])).unwrap(), Value::Integer(0));
    assert_eq!(
        run(".collect(summing(x -> x * 2))", ints(&[1, 2])).unwrap(),
        Value::Integer(6)
    );
}

#[test]
fn test_sum_overflow() {
    assert_eq!(
        run(".sum()", ints(&[i64::MAX, 1])).unwrap_err(),
        RuntimeError::Overflow("sum".to_string())
    );
}

#[test]
fn test_sum_requires_numbers() {
    assert!(matches!(run(".sum(name)", animals()), Err(RuntimeError::TypeError(_))));
}

#[test]
fn test_group_by_then_max() {
    let result = run(".groupBy(species).max(by weight)", animals()).unwrap();
    let Value::Map(groups) = result else {
        panic!("Expected map");
    };
    assert_eq!(groups.len(), 5);
    assert_eq!(name_of(&groups[&Key::Text("LION".to_string())]), "Leo the Lion");
    assert_eq!(name_of(&groups[&Key::Text("HYENA".to_string())]), "Henno the Hyena");
}

#[test]
fn test_group_by_boolean_key() {
    let mut expected = BTreeMap::new();
    expected.insert(Key::Boolean(false), Value::Integer(6));
    expected.insert(Key::Boolean(true), Value::Integer(4));
    assert_eq!(run(".groupBy(predator).count()", animals()).unwrap(), Value::Map(expected));
}

#[test]
fn test_group_by_keeps_sequences() {
    let result = run(".groupBy(x -> x % 2).map(x -> x * 10)", ints(&[1, 2, 3])).unwrap();
    let mut expected = BTreeMap::new();
    expected.insert(Key::Integer(0), int_list(&[20]));
    expected.insert(Key::Integer(1), int_list(&[10, 30]));
    assert_eq!(result, Value::Map(expected));
}

#[test]
fn test_group_by_float_key() {
    let err = run(".groupBy(x -> x * 0.5)", ints(&[1])).unwrap_err();
    assert!(matches!(err, RuntimeError::TypeError(msg) if msg.contains("groupBy()")));
}

#[test]
fn test_stage_after_reduction() {
    let err = run(".count().limit(1)", ints(&[1])).unwrap_err();
    assert!(matches!(err, RuntimeError::TypeError(msg) if msg.contains("requires a sequence")));
}

// ============================================================================
// Aggregators
// ============================================================================

#[test]
fn test_to_set() {
    assert_eq!(
        run(".collect(toSet())", ints(&[3, 1, 3, 2])).unwrap(),
        int_list(&[1, 2, 3])
    );
}

#[test]
fn test_joining() {
    assert_eq!(
        run(".map(a -> a.species).distinct().collect(joining(\",\"))", animals()).unwrap(),
        text("HYENA,ZEBRA,LION,GIRAFFE,ELEPHANT")
    );
}

#[test]
fn test_joining_requires_text() {
    assert!(matches!(
        run(".collect(joining())", ints(&[1])),
        Err(RuntimeError::TypeError(_))
    ));
}

#[test]
fn test_counting() {
    assert_eq!(run(".filter(predator).count()", animals()).unwrap(), Value::Integer(4));
}

// ============================================================================
// Cancellation
// ============================================================================

#[test]
fn test_materializing_stages_observe_cancellation() {
    let cancel = CancelToken::new();
    cancel.cancel();
    let evaluator = Evaluator::new();
    for script in [".sorted()", ".distinct()", ".groupBy(x -> x % 2)", ".max()", ".collect(toSet())"] {
        let chain = parse(script).unwrap();
        assert_eq!(
            evaluator.run(&chain, ints(&[3, 1, 2]), &cancel).unwrap_err(),
            RuntimeError::Cancelled,
            "Failed for script: {}",
            script
        );
    }
}

#[test]
fn test_cancelled_before_start() {
    let chain = parse(".toList()").unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();
    assert_eq!(
        Evaluator::new().run(&chain, ints(&[1]), &cancel).unwrap_err(),
        RuntimeError::Cancelled
    );
}
