// tests/parser_tests.rs

use streamy::ast::{Aggregator, BinOp, Direction, Expr, Operation, Selector, UnaryOp};
use streamy::lexer::Lexer;
use streamy::parser::{MAX_NESTING_DEPTH, ParseError, Parser, parse};

fn expr(input: &str) -> Expr {
    let mut parser = Parser::new(Lexer::new(input)).unwrap();
    parser.parse().unwrap()
}

fn single(script: &str) -> Operation {
    let chain = parse(script).unwrap();
    assert_eq!(chain.len(), 1, "expected one stage in {}", script);
    chain.operations.into_iter().next().unwrap()
}

// ============================================================================
// Chain structure
// ============================================================================

#[test]
fn test_missing_leading_stage() {
    let err = parse("filter(a -> a.predator)").unwrap_err();
    assert_eq!(err, ParseError::MissingStage);
    assert!(err.to_string().contains("must start with a stage call"));
}

#[test]
fn test_empty_script() {
    assert_eq!(parse("   ").unwrap_err(), ParseError::MissingStage);
}

#[test]
fn test_leading_whitespace_is_trimmed() {
    assert!(parse("  \n .distinct()").is_ok());
}

#[test]
fn test_unknown_operation() {
    let err = parse(".shuffle()").unwrap_err();
    assert_eq!(err, ParseError::UnknownOperation("shuffle".to_string()));
    assert_eq!(err.to_string(), "unknown operation: shuffle");
}

#[test]
fn test_unknown_operation_reported_before_arguments() {
    // The argument would not parse either; the stage name wins
    let err = parse(".frobnicate(a -> ))").unwrap_err();
    assert!(matches!(err, ParseError::UnknownOperation(name) if name == "frobnicate"));
}

#[test]
fn test_nested_parentheses_do_not_split_stages() {
    let chain = parse(".filter(a -> (a.age > (1 + 2)) and a.name.startsWith(\"L\")).toList()").unwrap();
    assert_eq!(chain.len(), 2);
    assert_eq!(chain.describe(), ".filter.collect");
}

#[test]
fn test_trailing_garbage() {
    assert!(parse(".distinct() extra").is_err());
}

#[test]
fn test_multiline_chain() {
    let chain = parse(
        ".filter(a -> a.predator)
         .sorted(by weight descending)
         .limit(2)",
    )
    .unwrap();
    assert_eq!(chain.len(), 3);
}

// ============================================================================
// Stages
// ============================================================================

#[test]
fn test_filter_with_field_shorthand() {
    assert_eq!(
        single(".filter(predator)"),
        Operation::Filter(Selector::Field("predator".to_string()))
    );
}

#[test]
fn test_map_with_lambda() {
    match single(".map(a -> a.name)") {
        Operation::Map(Selector::Lambda(lambda)) => {
            assert_eq!(lambda.param, "a");
            assert!(matches!(lambda.body, Expr::Field { ref name, .. } if name == "name"));
        }
        other => panic!("Expected map with lambda, got {:?}", other),
    }
}

#[test]
fn test_sorted_without_comparator() {
    assert_eq!(single(".sorted()"), Operation::Sort(None));
    assert_eq!(single(".sort()"), Operation::Sort(None));
}

#[test]
fn test_sorted_by_field_descending() {
    match single(".sorted(by weight descending)") {
        Operation::Sort(Some(comparator)) => {
            assert_eq!(comparator.keys.len(), 1);
            assert_eq!(comparator.keys[0].selector, Selector::Field("weight".to_string()));
            assert_eq!(comparator.keys[0].direction, Direction::Descending);
        }
        other => panic!("Expected sort, got {:?}", other),
    }
}

#[test]
fn test_comparator_then_clause() {
    match single(".sorted(by predator desc then by name)") {
        Operation::Sort(Some(comparator)) => {
            assert_eq!(comparator.keys.len(), 2);
            assert_eq!(comparator.keys[0].direction, Direction::Descending);
            assert_eq!(comparator.keys[1].selector, Selector::Field("name".to_string()));
            assert_eq!(comparator.keys[1].direction, Direction::Ascending);
        }
        other => panic!("Expected sort, got {:?}", other),
    }
}

#[test]
fn test_bare_direction_means_natural_order() {
    match single(".sorted(descending)") {
        Operation::Sort(Some(comparator)) => {
            assert_eq!(comparator.keys[0].selector, Selector::Identity);
            assert_eq!(comparator.keys[0].direction, Direction::Descending);
        }
        other => panic!("Expected sort, got {:?}", other),
    }
}

#[test]
fn test_by_is_optional() {
    assert_eq!(single(".max(weight)"), single(".max(by weight)"));
    assert_eq!(single(".maxBy(by weight)"), single(".max(by weight)"));
}

#[test]
fn test_comparator_factories() {
    assert_eq!(single(".max(Comparator.comparing(a -> a.weight))"), single(".max(by a -> a.weight)"));
    assert_eq!(single(".sorted(Comparator.comparingInt(weight))"), single(".sorted(by weight)"));
    assert_eq!(
        single(".sorted(Comparator.comparing(weight).reversed())"),
        single(".sorted(by weight descending)")
    );
    assert_eq!(
        single(".sorted(Comparator.comparing(age).reversed() then by name)"),
        single(".sorted(by age desc then by name)")
    );
    assert_eq!(single(".sorted(Comparator.reverseOrder())"), single(".sorted(descending)"));
    assert_eq!(single(".max(Comparator.naturalOrder())"), single(".max(ascending)"));

    assert!(matches!(
        parse(".sorted(Comparator.nullsFirst(weight))").unwrap_err(),
        ParseError::InvalidArgument { stage: "Comparator", .. }
    ));
}

#[test]
fn test_or_else_throw_after_max_and_min() {
    let chain = parse(".max(by weight).orElseThrow()").unwrap();
    assert_eq!(chain.len(), 1);
    assert_eq!(parse(".min().orElseThrow()").unwrap().len(), 1);

    assert!(matches!(
        parse(".sorted().orElseThrow()").unwrap_err(),
        ParseError::InvalidArgument { stage: "orElseThrow", .. }
    ));
    assert!(matches!(
        parse(".orElseThrow()").unwrap_err(),
        ParseError::InvalidArgument { stage: "orElseThrow", .. }
    ));
}

#[test]
fn test_method_references_are_rejected() {
    assert!(parse(".map(Animal::name)").is_err());
}

#[test]
fn test_lambda_named_by() {
    match single(".max(by -> by.weight)") {
        Operation::MaxBy(comparator) => {
            assert!(matches!(&comparator.keys[0].selector, Selector::Lambda(l) if l.param == "by"));
        }
        other => panic!("Expected max, got {:?}", other),
    }
}

#[test]
fn test_sum_forms() {
    assert_eq!(single(".sum()"), Operation::SumBy(Selector::Identity));
    assert_eq!(single(".sum(weight)"), Operation::SumBy(Selector::Field("weight".to_string())));
    assert_eq!(single(".sumBy(weight)"), single(".sum(weight)"));
}

#[test]
fn test_group_by_aliases() {
    assert_eq!(single(".groupingBy(species)"), single(".groupBy(species)"));
}

#[test]
fn test_collect_aggregators() {
    assert_eq!(single(".collect(toList())"), Operation::Collect(Aggregator::ToList));
    assert_eq!(single(".collect(Collectors.toSet())"), Operation::Collect(Aggregator::ToSet));
    assert_eq!(single(".collect(counting())"), Operation::Collect(Aggregator::Counting));
    assert_eq!(
        single(".collect(joining(\", \"))"),
        Operation::Collect(Aggregator::Joining(", ".to_string()))
    );
    assert_eq!(
        single(".collect(joining())"),
        Operation::Collect(Aggregator::Joining(String::new()))
    );
    assert_eq!(
        single(".collect(summing(weight))"),
        Operation::Collect(Aggregator::Summing(Selector::Field("weight".to_string())))
    );
}

#[test]
fn test_collect_shorthands() {
    assert_eq!(single(".toList()"), Operation::Collect(Aggregator::ToList));
    assert_eq!(single(".count()"), Operation::Collect(Aggregator::Counting));
}

#[test]
fn test_unknown_aggregator() {
    assert_eq!(
        parse(".collect(toBag())").unwrap_err(),
        ParseError::UnknownAggregator("toBag".to_string())
    );
}

#[test]
fn test_limit_and_skip() {
    assert_eq!(single(".limit(3)"), Operation::Limit(3));
    assert_eq!(single(".skip(2)"), Operation::Skip(2));
    assert!(matches!(
        parse(".limit(a)").unwrap_err(),
        ParseError::InvalidArgument { stage: "limit", .. }
    ));
}

#[test]
fn test_flat_map_requires_lambda() {
    assert!(matches!(single(".flatMap(x -> range(0, x))"), Operation::FlatMap(_)));
    assert!(parse(".flatMap(weight)").is_err());
}

// ============================================================================
// Numeric literals
// ============================================================================

#[test]
fn test_oversized_literal_is_rejected() {
    let err = parse(".map(a -> a.weight * 313213132131231312312312).toList()").unwrap_err();
    assert!(matches!(err, ParseError::IntegerOutOfRange(_)));
    assert!(err.to_string().contains("out of range"));
}

#[test]
fn test_min_i64_literal() {
    assert_eq!(expr("-9223372036854775808"), Expr::Integer(i64::MIN));
}

#[test]
fn test_max_i64_literal() {
    assert_eq!(expr("9223372036854775807"), Expr::Integer(i64::MAX));
    assert!(matches!(
        Parser::new(Lexer::new("9223372036854775808")).unwrap().parse(),
        Err(ParseError::IntegerOutOfRange(_))
    ));
}

#[test]
fn test_negated_expression() {
    assert!(matches!(expr("-(1 + 2)"), Expr::Unary { op: UnaryOp::Negate, .. }));
}

// ============================================================================
// Expressions
// ============================================================================

#[test]
fn test_comparison() {
    assert!(matches!(
        expr("a.age > 10"),
        Expr::BinaryOp {
            op: BinOp::GreaterThan,
            ..
        }
    ));
}

#[test]
fn test_parentheses() {
    // Should be: Multiply(Add(1, 2), 3)
    match expr("(1 + 2) * 3") {
        Expr::BinaryOp {
            op: BinOp::Multiply,
            left,
            right,
        } => {
            assert!(matches!(*left, Expr::BinaryOp { op: BinOp::Add, .. }));
            assert_eq!(*right, Expr::Integer(3));
        }
        other => panic!("Expected multiplication, got {:?}", other),
    }
}

#[test]
fn test_precedence_and_over_or() {
    // a or (b and c)
    match expr("a or b and c") {
        Expr::BinaryOp { op: BinOp::Or, right, .. } => {
            assert!(matches!(*right, Expr::BinaryOp { op: BinOp::And, .. }));
        }
        other => panic!("Expected or at the root, got {:?}", other),
    }
}

#[test]
fn test_symbolic_logic_operators() {
    assert_eq!(expr("a && !b"), expr("a and not b"));
    assert_eq!(expr("a || b"), expr("a or b"));
}

#[test]
fn test_method_call_chain() {
    match expr("a.name.toUpperCase().startsWith(\"L\")") {
        Expr::MethodCall { object, method, args } => {
            assert_eq!(method, "startsWith");
            assert_eq!(args, vec![Expr::String("L".to_string())]);
            assert!(matches!(*object, Expr::MethodCall { ref method, .. } if method == "toUpperCase"));
        }
        other => panic!("Expected method call, got {:?}", other),
    }
}

#[test]
fn test_function_call() {
    assert_eq!(
        expr("abs(-3)"),
        Expr::Call {
            function: "abs".to_string(),
            args: vec![Expr::Integer(-3)],
        }
    );
}

#[test]
fn test_nesting_limit() {
    let deep = format!(".map(x -> {}x{})", "(".repeat(MAX_NESTING_DEPTH + 1), ")".repeat(MAX_NESTING_DEPTH + 1));
    assert_eq!(parse(&deep).unwrap_err(), ParseError::TooDeep(MAX_NESTING_DEPTH));

    let shallow = format!(".map(x -> {}x{})", "(".repeat(10), ")".repeat(10));
    assert!(parse(&shallow).is_ok());
}

#[test]
fn test_long_operator_chains_are_bounded() {
    let sum = format!(".map(x -> x{})", " + x".repeat(500));
    assert_eq!(parse(&sum).unwrap_err(), ParseError::TooDeep(MAX_NESTING_DEPTH));

    let product = format!(".map(x -> x{})", " * x".repeat(500));
    assert_eq!(parse(&product).unwrap_err(), ParseError::TooDeep(MAX_NESTING_DEPTH));

    let logic = format!(".filter(x -> x > 0{})", " or x > 0".repeat(500));
    assert_eq!(parse(&logic).unwrap_err(), ParseError::TooDeep(MAX_NESTING_DEPTH));

    let moderate = format!(".map(x -> x{})", " + x".repeat(30));
    assert!(parse(&moderate).is_ok());
}

#[test]
fn test_long_postfix_chains_are_bounded() {
    let calls = format!(".map(x -> x{})", ".abs()".repeat(500));
    assert_eq!(parse(&calls).unwrap_err(), ParseError::TooDeep(MAX_NESTING_DEPTH));

    let fields = format!(".map(x -> x{})", ".a".repeat(500));
    assert_eq!(parse(&fields).unwrap_err(), ParseError::TooDeep(MAX_NESTING_DEPTH));

    let moderate = format!(".map(x -> x{})", ".abs()".repeat(20));
    assert!(parse(&moderate).is_ok());
}

#[test]
fn test_left_associative_arithmetic() {
    // (10 - 3) - 2
    match expr("10 - 3 - 2") {
        Expr::BinaryOp {
            op: BinOp::Subtract,
            left,
            right,
        } => {
            assert!(matches!(*left, Expr::BinaryOp { op: BinOp::Subtract, .. }));
            assert_eq!(*right, Expr::Integer(2));
        }
        other => panic!("Expected subtraction, got {:?}", other),
    }
}

#[test]
fn test_conditional() {
    assert_eq!(
        expr("a > 1 ? \"big\" : \"small\""),
        Expr::Conditional {
            condition: Box::new(expr("a > 1")),
            then: Box::new(Expr::String("big".to_string())),
            otherwise: Box::new(Expr::String("small".to_string())),
        }
    );
}

#[test]
fn test_conditional_nests_to_the_right() {
    // a ? 1 : (b ? 2 : 3)
    match expr("a ? 1 : b ? 2 : 3") {
        Expr::Conditional { condition, otherwise, .. } => {
            assert_eq!(*condition, Expr::Variable("a".to_string()));
            assert!(matches!(*otherwise, Expr::Conditional { .. }));
        }
        other => panic!("Expected conditional, got {:?}", other),
    }
}

#[test]
fn test_conditional_binds_loosest() {
    match expr("a or b ? x + 1 : x - 1") {
        Expr::Conditional { condition, then, .. } => {
            assert!(matches!(*condition, Expr::BinaryOp { op: BinOp::Or, .. }));
            assert!(matches!(*then, Expr::BinaryOp { op: BinOp::Add, .. }));
        }
        other => panic!("Expected conditional, got {:?}", other),
    }
}

#[test]
fn test_conditional_requires_else_branch() {
    assert!(matches!(
        parse(".map(x -> x > 1 ? 1)").unwrap_err(),
        ParseError::UnexpectedToken { .. }
    ));
}

#[test]
fn test_deep_not_chain_is_bounded() {
    let deep = format!(".filter(x -> {}true)", "!".repeat(10_000));
    assert_eq!(parse(&deep).unwrap_err(), ParseError::TooDeep(MAX_NESTING_DEPTH));
}
