// tests/integration_tests.rs

use std::collections::BTreeMap;

use chrono::NaiveDate;
use dynlinq::types::{ClassType, EnumType, Type};
use dynlinq::{
    parse_lambda, parse_lambda_with, Argument, EvalError, Evaluator, Parameter, Parser,
    ParsingConfig, Value,
};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;

fn role_kind() -> Type {
    EnumType::new("RoleKind", &[("Admin", 0), ("User", 1)])
}

fn role_info() -> Type {
    ClassType::builder("RoleInfo")
        .property("Name", Type::String)
        .property("Level", Type::Int32)
        .build()
}

fn address() -> Type {
    ClassType::builder("Address")
        .property("City", Type::String)
        .build()
}

fn person() -> Type {
    ClassType::builder("Person")
        .property("Name", Type::String)
        .property("Age", Type::Int32)
        .property("Income", Type::Decimal)
        .property("Score", Type::nullable(Type::Int32))
        .property("Active", Type::nullable(Type::Boolean))
        .property("Birthday", Type::DateTime)
        .property("Role", role_kind())
        .property("Address", address())
        .property("Roles", Type::list(role_info()))
        .property("Tags", Type::array(Type::String))
        .build()
}

fn object(pairs: Vec<(&str, Value)>) -> Value {
    Value::Object(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
}

fn text(s: &str) -> Value {
    Value::String(s.to_string())
}

fn role(name: &str, level: i32) -> Value {
    object(vec![("Name", text(name)), ("Level", Value::Int32(level))])
}

fn ann() -> Value {
    object(vec![
        ("Name", text("Ann")),
        ("Age", Value::Int32(30)),
        ("Income", Value::Decimal(Decimal::new(125050, 2))),
        ("Score", Value::Null),
        ("Active", Value::Null),
        (
            "Birthday",
            Value::DateTime(
                NaiveDate::from_ymd_opt(1990, 5, 17)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
            ),
        ),
        ("Role", Value::from_i128(&role_kind(), 0).unwrap()),
        ("Address", Value::Null),
        (
            "Roles",
            Value::Array(vec![role("admin", 3), role("dev", 1), role("ops", 1)]),
        ),
        ("Tags", Value::Array(vec![text("x"), text("y")])),
    ])
}

fn eval_with(text: &str, item: Value, values: Vec<Argument>) -> Result<Value, EvalError> {
    let config = ParsingConfig::default();
    let lambda = parse_lambda(&config, person(), None, text, values).unwrap();
    Evaluator::new().invoke(&lambda, &[item])
}

fn eval(text: &str) -> Result<Value, EvalError> {
    eval_with(text, ann(), vec![])
}

// ============================================================================
// Arithmetic
// ============================================================================

#[test]
fn test_precedence_evaluates() {
    let config = ParsingConfig::default();
    let lambda = parse_lambda(&config, Type::Int32, None, "1 + 2 * 3", vec![]).unwrap();
    let result = Evaluator::new().invoke(&lambda, &[Value::Int32(0)]).unwrap();
    assert_eq!(result, Value::Int32(7));
}

#[test]
fn test_mixed_arithmetic() {
    let test_cases = vec![
        ("Age + 1", Value::Int32(31)),
        ("Age % 7", Value::Int32(2)),
        ("Age / 4", Value::Int32(7)),
        ("Age * 2L", Value::Int64(60)),
        ("Age + 0.5", Value::Double(30.5)),
        ("Income + Age", Value::Decimal(Decimal::new(128050, 2))),
        ("-Age", Value::Int32(-30)),
        ("Age << 1", Value::Int32(60)),
        ("Age & 6", Value::Int32(6)),
    ];

    for (input, expected) in test_cases {
        assert_eq!(eval(input).unwrap(), expected, "Failed for input: {}", input);
    }
}

#[test]
fn test_division_by_zero() {
    assert!(matches!(eval("Age / 0"), Err(EvalError::DivisionByZero)));
    assert!(matches!(eval("Income % 0"), Err(EvalError::DivisionByZero)));
}

#[test]
fn test_integral_overflow() {
    assert!(matches!(eval("Age * 2147483647"), Err(EvalError::Overflow(_))));
}

// ============================================================================
// Logic and Comparison
// ============================================================================

#[test]
fn test_boolean_logic() {
    let test_cases = vec![
        (r#"Age > 18 && Name == "Ann""#, true),
        (r#"Age < 18 || Name.StartsWith("A")"#, true),
        ("not (Age >= 30)", false),
        ("Age in (18, 30, 45)", true),
        (r#""y" in Tags"#, true),
        (r#"Role == "Admin""#, true),
        (r#"Role != "User""#, true),
        (r#"Birthday < "2000-01-01""#, true),
        ("Income > 1000", true),
    ];

    for (input, expected) in test_cases {
        assert_eq!(eval(input).unwrap(), Value::Boolean(expected), "Failed for input: {}", input);
    }
}

#[test]
fn test_conditionals() {
    assert_eq!(eval(r#"Age > 18 ? "adult" : "minor""#).unwrap(), text("adult"));
    assert_eq!(eval(r#"iif(Age > 40, "old", "young")"#).unwrap(), text("young"));
}

// ============================================================================
// Nulls
// ============================================================================

#[test]
fn test_nullable_members() {
    let test_cases = vec![
        ("Score > 5", Value::Boolean(false)),
        ("Score == null", Value::Boolean(true)),
        ("Score + 1", Value::Null),
        ("Score ?? 7", Value::Int32(7)),
        ("Score.HasValue", Value::Boolean(false)),
    ];

    for (input, expected) in test_cases {
        assert_eq!(eval(input).unwrap(), expected, "Failed for input: {}", input);
    }
}

#[test]
fn test_three_valued_logic() {
    assert_eq!(eval("Active && false").unwrap(), Value::Boolean(false));
    assert_eq!(eval("Active || true").unwrap(), Value::Boolean(true));
    assert_eq!(eval("Active && true").unwrap(), Value::Null);
}

#[test]
fn test_null_propagation() {
    assert_eq!(eval(r#"np(Address.City, "none")"#).unwrap(), text("none"));
    assert_eq!(eval("np(Address.City)").unwrap(), Value::Null);

    let mut item = ann();
    if let Value::Object(map) = &mut item {
        map.insert("Address".into(), object(vec![("City", text("Oslo"))]));
    }
    assert_eq!(eval_with("np(Address.City)", item, vec![]).unwrap(), text("Oslo"));
}

#[test]
fn test_member_of_null_fails() {
    assert!(matches!(eval("Address.City"), Err(EvalError::NullReference(_))));
}

// ============================================================================
// Methods
// ============================================================================

#[test]
fn test_string_methods() {
    let test_cases = vec![
        ("Name.ToUpper()", text("ANN")),
        ("Name.Substring(1, 2)", text("nn")),
        (r#"Name.IndexOf("n")"#, Value::Int32(1)),
        ("Name.Length", Value::Int32(3)),
        (r#"Name + "!""#, text("Ann!")),
        (r#"Name & Age"#, text("Ann30")),
        ("Name[0]", Value::Char('A')),
        ("Age.ToString()", text("30")),
        ("String.IsNullOrEmpty(Name)", Value::Boolean(false)),
    ];

    for (input, expected) in test_cases {
        assert_eq!(eval(input).unwrap(), expected, "Failed for input: {}", input);
    }
}

#[test]
fn test_math_methods() {
    let test_cases = vec![
        ("Math.Abs(-5)", Value::Int32(5)),
        ("Math.Max(Age, 10)", Value::Int32(30)),
        ("Math.Round(2.5)", Value::Double(2.0)),
        ("Math.Round(3.5)", Value::Double(4.0)),
        ("Math.Floor(Income)", Value::Decimal(Decimal::new(1250, 0))),
        ("Int32.MaxValue", Value::Int32(i32::MAX)),
    ];

    for (input, expected) in test_cases {
        assert_eq!(eval(input).unwrap(), expected, "Failed for input: {}", input);
    }
}

#[test]
fn test_date_members() {
    assert_eq!(eval("Birthday.Year").unwrap(), Value::Int32(1990));
    assert_eq!(eval("Birthday.AddDays(1).Day").unwrap(), Value::Int32(18));
}

// ============================================================================
// Aggregates
// ============================================================================

#[test]
fn test_aggregates() {
    let test_cases = vec![
        ("Roles.Count()", Value::Int32(3)),
        ("Roles.Count(Level > 1)", Value::Int32(1)),
        ("Roles.Any(Name == \"dev\")", Value::Boolean(true)),
        ("Roles.All(Level > 1)", Value::Boolean(false)),
        ("Roles.Sum(Level)", Value::Int32(5)),
        ("Roles.Max(Name)", text("ops")),
        ("Roles.Min(Level)", Value::Int32(1)),
        ("Roles.Select(Level).Distinct().Count()", Value::Int32(2)),
        ("Roles.OrderByDescending(Level).First().Name", text("admin")),
        ("Roles.Where(Level == 1).Last().Name", text("ops")),
        ("Roles.Skip(1).Take(1).Single().Name", text("dev")),
        ("Roles.GroupBy(Level).Count()", Value::Int32(2)),
        ("Roles.GroupBy(Level).First().Key", Value::Int32(3)),
        ("Roles.FirstOrDefault(Level > 9)", Value::Null),
        ("Tags.Contains(\"x\")", Value::Boolean(true)),
    ];

    for (input, expected) in test_cases {
        assert_eq!(eval(input).unwrap(), expected, "Failed for input: {}", input);
    }
}

#[test]
fn test_average() {
    let result = eval("Roles.Average(Level)").unwrap();
    assert_eq!(result, Value::Double(5.0 / 3.0));
}

#[test]
fn test_outer_scope_in_lambda() {
    assert_eq!(eval("Roles.Any(Level > parent.Age)").unwrap(), Value::Boolean(false));
    assert_eq!(eval("Roles.Count(r => r.Level < ~.Age)").unwrap(), Value::Int32(3));
}

#[test]
fn test_first_of_empty_sequence() {
    assert!(matches!(eval("Roles.First(Level > 9)"), Err(EvalError::EmptySequence(_))));
}

// ============================================================================
// Projections
// ============================================================================

#[test]
fn test_anonymous_projection() {
    let result = eval("new(Name as Who, Age * 2 as Twice)").unwrap();
    assert_eq!(result, object(vec![("Twice", Value::Int32(60)), ("Who", text("Ann"))]));
}

#[test]
fn test_projection_over_sequence() {
    let result = eval("Roles.Where(Level == 1).Select(Name)").unwrap();
    assert_eq!(result, Value::Array(vec![text("dev"), text("ops")]));
}

#[test]
fn test_array_initializer() {
    let result = eval("new[] { Age, 1, 2 }").unwrap();
    assert_eq!(
        result,
        Value::Array(vec![Value::Int32(30), Value::Int32(1), Value::Int32(2)])
    );
}

// ============================================================================
// Values and Parameters
// ============================================================================

#[test]
fn test_positional_values() {
    let result = eval_with(
        "Age > @0 && Name != @1",
        ann(),
        vec![Argument::Value(Value::Int32(18)), Argument::Value(text("Bob"))],
    );
    assert_eq!(result.unwrap(), Value::Boolean(true));
}

#[test]
fn test_external_values() {
    let externals: BTreeMap<String, Value> = [("Limit".to_string(), Value::Int32(40))]
        .into_iter()
        .collect();
    let result = eval_with("Age < Limit", ann(), vec![Argument::Externals(externals)]);
    assert_eq!(result.unwrap(), Value::Boolean(true));
}

#[test]
fn test_lambda_value_is_invoked() {
    let config = ParsingConfig::default();
    let x = Parameter::new("x", Type::Int32);
    let double = parse_lambda_with(&config, &[x], None, "x * 2", vec![]).unwrap();

    let result = eval_with("@0(Age)", ann(), vec![Argument::Expr(double)]);
    assert_eq!(result.unwrap(), Value::Int32(60));
}

#[test]
fn test_named_parameters() {
    let config = ParsingConfig::default();
    let params = [
        Parameter::new("a", Type::Int32),
        Parameter::new("b", Type::Int32),
    ];
    let lambda = parse_lambda_with(&config, &params, None, "a * 10 + b", vec![]).unwrap();
    let result = Evaluator::new()
        .invoke(&lambda, &[Value::Int32(4), Value::Int32(2)])
        .unwrap();
    assert_eq!(result, Value::Int32(42));
}

#[test]
fn test_expected_result_type_converts() {
    let config = ParsingConfig::default();
    let lambda = parse_lambda(&config, person(), Some(Type::Int64), "Age", vec![]).unwrap();
    assert_eq!(Evaluator::new().invoke(&lambda, &[ann()]).unwrap(), Value::Int64(30));
}

// ============================================================================
// Ordering
// ============================================================================

fn named(name: &str, age: i32) -> Value {
    object(vec![("Name", text(name)), ("Age", Value::Int32(age))])
}

fn names(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .map(|item| match item {
            Value::Object(map) => map["Name"].to_string(),
            other => other.to_string(),
        })
        .collect()
}

#[test]
fn test_ordering_list_sorts() {
    let config = ParsingConfig::default();
    let it = Parameter::new("", person());
    let mut parser = Parser::new(&config, &[it.clone()], "Age desc, Name", vec![]).unwrap();
    let orderings = parser.parse_ordering_list().unwrap();

    let items = vec![named("Cid", 20), named("Bea", 30), named("Abe", 20)];
    let sorted = Evaluator::new().apply_ordering(items, &it, &orderings).unwrap();
    assert_eq!(names(&sorted), vec!["Bea", "Abe", "Cid"]);
}

#[test]
fn test_nulls_sort_first() {
    let config = ParsingConfig::default();
    let it = Parameter::new("", person());
    let mut parser = Parser::new(&config, &[it.clone()], "Score", vec![]).unwrap();
    let orderings = parser.parse_ordering_list().unwrap();

    let items = vec![
        object(vec![("Name", text("b")), ("Score", Value::Int32(2))]),
        object(vec![("Name", text("a")), ("Score", Value::Null)]),
    ];
    let sorted = Evaluator::new().apply_ordering(items, &it, &orderings).unwrap();
    assert_eq!(names(&sorted), vec!["a", "b"]);
}
