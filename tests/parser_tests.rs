// tests/parser_tests.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use dynlinq::ast::{Construction, Expr, ExprKind, TypeCheckMode};
use dynlinq::error::messages;
use dynlinq::types::{ClassType, EnumType, Type};
use dynlinq::{
    parse_lambda, parse_lambda_with, to_tree, Argument, ParseError, ParseResult, Parameter, Parser,
    ParsingConfig, TypeRegistry, Value,
};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;

// ============================================================================
// Model
// ============================================================================

fn role_kind() -> Type {
    EnumType::new("RoleKind", &[("Admin", 0), ("User", 1), ("Guest", 2)])
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
        .property("Zip", Type::nullable(Type::Int32))
        .build()
}

fn money() -> Type {
    ClassType::builder("Money")
        .property("Amount", Type::Decimal)
        .operator("op_GreaterThan", vec![], Type::Boolean)
        .build()
}

fn bag() -> Type {
    ClassType::builder("Bag")
        .indexer(vec![Type::String], Type::Int32)
        .build()
}

fn person() -> Type {
    ClassType::builder("Person")
        .property("Name", Type::String)
        .property("Age", Type::Int32)
        .property("Income", Type::Decimal)
        .property("Score", Type::nullable(Type::Int32))
        .property("Birthday", Type::DateTime)
        .property("Role", role_kind())
        .property("Address", address())
        .property("Roles", Type::list(role_info()))
        .property("Tags", Type::array(Type::String))
        .property("Salary", money())
        .property("Extras", bag())
        .method("Describe", vec![Type::Int32], Type::String)
        .method("Home", vec![], address())
        .method("Pick", vec![Type::Int64, Type::Double], Type::Int32)
        .method("Pick", vec![Type::Double, Type::Int64], Type::Int32)
        .void_method("Touch", vec![])
        .build()
}

fn registered() -> ParsingConfig {
    let registry = TypeRegistry::new()
        .with(role_kind())
        .with(role_info())
        .with(person());
    ParsingConfig::default().with_type_provider(Arc::new(registry))
}

fn body_of(lambda: Expr) -> Expr {
    match lambda.kind {
        ExprKind::Lambda { body, .. } => *body,
        other => panic!("expected a lambda, got {:?}", other),
    }
}

fn compile_with(config: &ParsingConfig, text: &str) -> ParseResult<Expr> {
    parse_lambda(config, person(), None, text, vec![]).map(body_of)
}

fn compile(text: &str) -> ParseResult<Expr> {
    compile_with(&ParsingConfig::default(), text)
}

fn tree(text: &str) -> String {
    to_tree(&compile(text).unwrap())
}

fn error(text: &str) -> ParseError {
    compile(text).unwrap_err()
}

// ============================================================================
// Literals
// ============================================================================

#[test]
fn test_literal_types() {
    let test_cases = vec![
        ("42", Value::Int32(42), Type::Int32),
        ("0xFF", Value::Int32(255), Type::Int32),
        ("3000000000", Value::UInt32(3_000_000_000), Type::UInt32),
        ("10L", Value::Int64(10), Type::Int64),
        ("10UL", Value::UInt64(10), Type::UInt64),
        ("3.5", Value::Double(3.5), Type::Double),
        ("3.5f", Value::Single(3.5), Type::Single),
        ("1.5m", Value::Decimal("1.5".parse::<Decimal>().unwrap()), Type::Decimal),
        ("1e3", Value::Double(1000.0), Type::Double),
        ("-0x10L", Value::Int64(-16), Type::Int64),
        ("-2147483648", Value::Int32(i32::MIN), Type::Int32),
        ("-2147483649", Value::Int64(-2_147_483_649), Type::Int64),
        ("'c'", Value::Char('c'), Type::Char),
        (r#""a\"b""#, Value::String("a\"b".to_string()), Type::String),
        ("true", Value::Boolean(true), Type::Boolean),
    ];

    for (input, value, ty) in test_cases {
        let expr = compile(input).unwrap();
        assert_eq!(expr.constant_value(), Some(&value), "Failed for input: {}", input);
        assert_eq!(expr.ty, ty, "Failed for input: {}", input);
    }
}

#[test]
fn test_hex_literal_keeps_decimal_text() {
    let expr = compile("0xFF").unwrap();
    assert_eq!(
        expr.kind,
        ExprKind::Constant {
            value: Value::Int32(255),
            literal: Some("255".to_string()),
        }
    );
}

#[test]
fn test_minus_on_unsigned_literal() {
    let err = error("-5U");
    assert_eq!(err.message, messages::MINUS_CANNOT_BE_APPLIED_TO_UNSIGNED);
    assert_eq!(err.position, 0);
}

#[test]
fn test_null_literal_is_untyped() {
    let expr = compile("null").unwrap();
    assert!(expr.is_untyped_null());
}

#[test]
fn test_qualified_literals_keep_their_type() {
    let test_cases = vec![
        ("Age + 1L", Type::Int64),
        ("Age * 1U", Type::Int64),
        ("Score ?? 1L", Type::Int64),
        ("Income + 2.5M", Type::Decimal),
        ("Age > 1 ? 1 : 2L", Type::Int64),
    ];

    for (input, expected) in test_cases {
        assert_eq!(compile(input).unwrap().ty, expected, "Failed for input: {}", input);
    }
}

// ============================================================================
// Operators and Precedence
// ============================================================================

#[test]
fn test_multiplication_binds_tighter() {
    let expected = "\
Binary(Add: Int32)
├── Constant(1: Int32)
└── Binary(Multiply: Int32)
    ├── Constant(2: Int32)
    └── Constant(3: Int32)
";
    assert_eq!(tree("1 + 2 * 3"), expected);
}

#[test]
fn test_logical_and_over_comparisons() {
    let expected = "\
Binary(AndAlso: Boolean)
├── Binary(GreaterThan: Boolean)
│   ├── MemberAccess(it.Age: Int32)
│   └── Constant(18: Int32)
└── Binary(Equal: Boolean)
    ├── MemberAccess(it.Name: String)
    └── Constant(\"Bob\": String)
";
    assert_eq!(tree(r#"Age > 18 && Name == "Bob""#), expected);
    assert_eq!(tree(r#"Age gt 18 and Name eq "Bob""#), expected);
}

#[test]
fn test_literal_promoted_to_member_type() {
    let expected = "\
Binary(GreaterThan: Boolean)
├── MemberAccess(it.Income: Decimal)
└── Constant(0: Decimal)
";
    assert_eq!(tree("Income > 0"), expected);
}

#[test]
fn test_widening_to_common_type() {
    let expected = "\
Binary(Add: Decimal)
├── Convert(Decimal)
│   └── MemberAccess(it.Age: Int32)
└── MemberAccess(it.Income: Decimal)
";
    assert_eq!(tree("Age + Income"), expected);
}

#[test]
fn test_unary_operators() {
    assert_eq!(
        tree("-Age"),
        "Unary(Negate: Int32)\n└── MemberAccess(it.Age: Int32)\n"
    );
    assert_eq!(tree("!true"), "Unary(Not: Boolean)\n└── Constant(true: Boolean)\n");
    assert_eq!(compile("not (Age > 1)").unwrap().ty, Type::Boolean);

    let err = error("-Name");
    assert_eq!(err.message, messages::incompatible_operand("-", "String"));
    assert_eq!(err.position, 0);
}

#[test]
fn test_bitwise_and_shift() {
    assert_eq!(compile("Age & 1").unwrap().ty, Type::Int32);
    assert_eq!(compile("Age | 1L").unwrap().ty, Type::Int64);
    assert_eq!(compile("Age << 2").unwrap().ty, Type::Int32);
    assert_eq!(compile("true & false").unwrap().ty, Type::Boolean);
}

#[test]
fn test_ampersand_reads_numeric_text() {
    let expr = compile(r#""5" & 3"#).unwrap();
    assert_eq!(expr.ty, Type::Int32);
}

#[test]
fn test_string_concatenation() {
    let expected = "\
Call(Concat: String)
├── MemberAccess(it.Name: String)
└── Constant(\"!\": String)
";
    assert_eq!(tree(r#"Name + "!""#), expected);
    assert_eq!(compile("Name + Age").unwrap().ty, Type::String);
    assert_eq!(compile("Name & Age").unwrap().ty, Type::String);
}

#[test]
fn test_date_arithmetic() {
    assert_eq!(compile("DateTime.Now - Birthday").unwrap().ty, Type::TimeSpan);
    assert_eq!(
        compile("(DateTime.Now - Birthday).TotalDays > 365").unwrap().ty,
        Type::Boolean
    );
}

#[test]
fn test_string_constant_read_as_date() {
    let expr = compile(r#"Birthday > "2000-01-01""#).unwrap();
    let ExprKind::Binary { right, .. } = &expr.kind else {
        panic!("expected a comparison");
    };
    assert_eq!(right.ty, Type::DateTime);
    assert_eq!(right.constant_value().unwrap().to_string(), "2000-01-01T00:00:00");
}

#[test]
fn test_user_operator_is_bound() {
    let expected = "\
Binary(GreaterThan via op_GreaterThan: Boolean)
├── MemberAccess(it.Salary: Money)
└── MemberAccess(it.Salary: Money)
";
    assert_eq!(tree("Salary > Salary"), expected);
}

#[test]
fn test_unrelated_classes_are_incompatible() {
    let err = error("Address == Roles[0]");
    assert_eq!(
        err.message,
        messages::incompatible_operands("==", "Address", "RoleInfo")
    );
    assert_eq!(err.position, 8);
}

#[test]
fn test_reference_compared_with_null() {
    let expected = "\
Binary(Equal: Boolean)
├── MemberAccess(it.Address: Address)
└── Constant(null: Address)
";
    assert_eq!(tree("Address == null"), expected);
}

// ============================================================================
// Enums
// ============================================================================

#[test]
fn test_enum_compared_with_name_and_number() {
    for input in [r#"Role == "Admin""#, "Role == 1", r#"Role != "guest""#] {
        let expr = compile(input).unwrap();
        let ExprKind::Binary { right, .. } = &expr.kind else {
            panic!("expected a comparison for {}", input);
        };
        assert_eq!(right.ty, role_kind(), "Failed for input: {}", input);
    }
}

#[test]
fn test_enum_member_through_registered_type() {
    let config = registered();
    let expr = compile_with(&config, "Role > RoleKind.Admin").unwrap();
    let expected = "\
Binary(GreaterThan: Boolean)
├── Convert(Int32)
│   └── MemberAccess(it.Role: RoleKind)
└── Convert(Int32)
    └── Constant(Admin: RoleKind)
";
    assert_eq!(to_tree(&expr), expected);
}

#[test]
fn test_undefined_enum_name() {
    let err = error(r#"Role == "Nobody""#);
    assert_eq!(err.message, messages::enum_value_not_defined("Nobody", "RoleKind"));
    assert_eq!(err.position, 5);
}

fn account() -> Type {
    ClassType::builder("Account")
        .property("Name", Type::String)
        .property("RoleKind", role_kind())
        .build()
}

#[test]
fn test_member_shadows_type_of_same_name() {
    let config = registered();
    let body = parse_lambda(&config, account(), None, r#"RoleKind == "Admin""#, vec![])
        .map(body_of)
        .unwrap();
    let ExprKind::Binary { left, .. } = &body.kind else {
        panic!("expected a comparison");
    };
    assert!(to_tree(left).contains("MemberAccess(it.RoleKind: RoleKind)"));
    assert_eq!(body.ty, Type::Boolean);
}

#[test]
fn test_type_wins_when_member_priority_is_off() {
    let mut config = registered();
    config.prioritize_property_or_field_over_the_type = false;
    let body = parse_lambda(&config, account(), None, "RoleKind.Guest", vec![])
        .map(body_of)
        .unwrap();
    assert_eq!(to_tree(&body), "Constant(Guest: RoleKind)\n");
}

// ============================================================================
// Conditionals and Null Handling
// ============================================================================

#[test]
fn test_iif_lifts_value_branch_to_nullable() {
    let expected = "\
Conditional(Int32?)
├── Constant(true: Boolean)
├── Constant(null: Int32?)
└── Convert(Int32?)
    └── Constant(5: Int32)
";
    assert_eq!(tree("iif(true, null, 5)"), expected);
}

#[test]
fn test_conditional_operator() {
    assert_eq!(compile(r#"Age > 18 ? "adult" : null"#).unwrap().ty, Type::String);
    assert_eq!(compile("Age > 1 ? Age : Income").unwrap().ty, Type::Decimal);

    let err = error("Age > 1 ? Name : Age");
    assert_eq!(err.message, messages::neither_type_converts_to_other("String", "Int32"));
    assert_eq!(err.position, 0);
}

#[test]
fn test_iif_errors() {
    let err = error("iif(Age, 1, 2)");
    assert_eq!(err.message, messages::FIRST_EXPR_MUST_BE_BOOL);
    assert_eq!(err.position, 0);

    let err = error("iif(true, 1)");
    assert_eq!(err.message, messages::IIF_REQUIRES_THREE_ARGS);
}

#[test]
fn test_coalesce() {
    assert_eq!(compile("Score ?? 0").unwrap().ty, Type::Int32);
    assert_eq!(compile("isnull(Score, 0)").unwrap().ty, Type::Int32);
    assert_eq!(compile(r#"Name ?? "none""#).unwrap().ty, Type::String);

    let err = error("Age ?? 0");
    assert_eq!(err.message, messages::coalesce_requires_nullable("Int32"));
    assert_eq!(err.position, 4);
}

#[test]
fn test_null_propagation_guards_each_receiver() {
    let expected = "\
Conditional(String)
├── Binary(AndAlso: Boolean)
│   ├── Binary(NotEqual: Boolean)
│   │   ├── MemberAccess(it.Address: Address)
│   │   └── Constant(null: Address)
│   └── Binary(NotEqual: Boolean)
│       ├── MemberAccess(it.Address.City: String)
│       └── Constant(null: String)
├── MemberAccess(it.Address.City: String)
└── Constant(null: String)
";
    assert_eq!(tree("np(Address.City)"), expected);
}

#[test]
fn test_null_propagation_with_default() {
    let expr = compile("np(Address.Zip, 0)").unwrap();
    assert_eq!(expr.ty, Type::nullable(Type::Int32));
}

#[test]
fn test_null_propagation_errors() {
    let err = error("np(Age + 1)");
    assert_eq!(err.message, messages::NP_REQUIRES_MEMBER_EXPRESSION);
    assert_eq!(err.position, 0);

    let err = error("np()");
    assert_eq!(err.message, messages::NP_REQUIRES_ONE_OR_TWO_ARGS);

    let err = error("Address?.City");
    assert_eq!(err.message, messages::NULL_PROPAGATION_OPERATOR_UNSUPPORTED);
    assert_eq!(err.position, 7);
}

// ============================================================================
// In
// ============================================================================

#[test]
fn test_in_list_becomes_equalities() {
    let expected = "\
Binary(OrElse: Boolean)
├── Binary(Equal: Boolean)
│   ├── MemberAccess(it.Age: Int32)
│   └── Constant(18: Int32)
└── Binary(Equal: Boolean)
    ├── MemberAccess(it.Age: Int32)
    └── Constant(21: Int32)
";
    assert_eq!(tree("Age in (18, 21)"), expected);
    assert_eq!(compile(r#"Role in ("Admin", "User")"#).unwrap().ty, Type::Boolean);
}

#[test]
fn test_in_collection_becomes_contains() {
    let expected = "\
Call(Contains: Boolean)
├── MemberAccess(it.Tags: String[])
└── Constant(\"x\": String)
";
    assert_eq!(tree(r#""x" in Tags"#), expected);
}

#[test]
fn test_in_requires_enumerable() {
    let err = error("1 in Age");
    assert_eq!(err.message, messages::identifier_implementing_enumerable_expected());
    assert_eq!(err.position, 2);
}

// ============================================================================
// Members, Methods and Indexers
// ============================================================================

#[test]
fn test_member_chain_and_case_folding() {
    assert_eq!(tree("address.city"), "MemberAccess(it.Address.City: String)\n");
    assert_eq!(tree("it.Age"), "MemberAccess(it.Age: Int32)\n");
    assert_eq!(tree("$.Age"), "MemberAccess(it.Age: Int32)\n");
}

#[test]
fn test_case_sensitive_config() {
    let mut config = ParsingConfig::default();
    config.is_case_sensitive = true;
    let err = compile_with(&config, "age > 1").unwrap_err();
    assert_eq!(err.message, messages::unknown_property_or_field("age", "Person"));
    assert_eq!(err.position, 0);
}

#[test]
fn test_unknown_identifier_without_it() {
    let config = ParsingConfig::default();
    let err = parse_lambda_with(&config, &[], None, "Foo", vec![]).unwrap_err();
    assert_eq!(err.message, messages::unknown_identifier("Foo"));
    assert_eq!(err.to_string(), "Unknown identifier 'Foo' (at index 0)");
}

#[test]
fn test_positional_value_not_supplied() {
    let err = error("@0");
    assert_eq!(err.message, messages::unknown_identifier("@0"));
    assert_eq!(err.position, 0);
}

#[test]
fn test_builtin_members_and_methods() {
    let test_cases = vec![
        ("Name.Length", Type::Int32),
        ("Name.ToUpper()", Type::String),
        (r#"Name.StartsWith("A")"#, Type::Boolean),
        ("Name.Substring(1, 2)", Type::String),
        ("Name[0]", Type::Char),
        ("Tags[0]", Type::String),
        ("Tags.Length", Type::Int32),
        ("Roles.Count", Type::Int32),
        ("Roles[0].Name", Type::String),
        ("Score.HasValue", Type::Boolean),
        ("Score.Value", Type::Int32),
        ("Birthday.Year", Type::Int32),
        ("Birthday.AddDays(1)", Type::DateTime),
        ("Age.ToString()", Type::String),
        ("Math.Max(Age, 10)", Type::Int32),
        ("Math.Round(2.5)", Type::Double),
        ("Math.PI", Type::Double),
        ("String.IsNullOrEmpty(Name)", Type::Boolean),
        ("Int32.MaxValue", Type::Int32),
        ("Describe(1)", Type::String),
    ];

    for (input, ty) in test_cases {
        let expr = compile(input).unwrap_or_else(|e| panic!("{}: {}", input, e));
        assert_eq!(expr.ty, ty, "Failed for input: {}", input);
    }
}

#[test]
fn test_static_member_label() {
    assert_eq!(tree("Math.PI"), "MemberAccess(PI: Double)\n");
}

#[test]
fn test_method_errors() {
    let err = error("Home()");
    assert_eq!(err.message, messages::methods_are_inaccessible("Person"));
    assert_eq!(err.position, 0);

    let err = error("Pick(1, 2)");
    assert_eq!(err.message, messages::ambiguous_method_invocation("Pick", "Person"));

    let err = error("Describe(\"x\")");
    assert_eq!(err.message, messages::no_applicable_method("Describe", "Person"));

    let err = compile_with(&registered(), "Touch()").unwrap_err();
    assert_eq!(err.message, messages::method_is_void("Touch", "Person"));
}

#[test]
fn test_registered_type_methods_are_accessible() {
    let expr = compile_with(&registered(), "Home()").unwrap();
    assert_eq!(expr.ty, address());
}

#[test]
fn test_member_falls_back_to_string_indexer() {
    let expected = "\
IndexAccess(Int32)
├── MemberAccess(it.Extras: Bag)
└── Constant(\"Color\": String)
";
    assert_eq!(tree("Extras.Color"), expected);

    let mut config = ParsingConfig::default();
    config.disable_member_access_to_index_accessor_fallback = true;
    let err = compile_with(&config, "Extras.Color").unwrap_err();
    assert_eq!(err.message, messages::unknown_property_or_field("Color", "Bag"));
}

#[test]
fn test_indexer_errors() {
    let err = error(r#"Tags["a"]"#);
    assert_eq!(err.message, messages::INVALID_INDEX);

    let err = error("Tags[0, 1]");
    assert_eq!(err.message, messages::CANNOT_INDEX_MULTI_DIM_ARRAY);

    let err = error(r#"Roles["a"]"#);
    assert_eq!(err.message, messages::no_applicable_indexer("List<RoleInfo>"));
}

// ============================================================================
// Aggregates and Scopes
// ============================================================================

#[test]
fn test_aggregate_result_types() {
    let test_cases = vec![
        ("Roles.Any()", "Boolean"),
        ("Roles.All(Level > 0)", "Boolean"),
        ("Roles.Count()", "Int32"),
        ("Roles.Count(Level > 1)", "Int32"),
        ("Roles.LongCount()", "Int64"),
        ("Roles.Sum(Level)", "Int32"),
        ("Roles.Average(Level)", "Double"),
        ("Roles.Max(Name)", "String"),
        ("Roles.First()", "RoleInfo"),
        ("Roles.FirstOrDefault(Level > 2)", "RoleInfo"),
        ("Roles.Where(Level > 1).Select(Name)", "IEnumerable<String>"),
        ("Roles.OrderBy(Level).ToList()", "List<RoleInfo>"),
        ("Roles.Select(Level).ToArray()", "Int32[]"),
        ("Roles.Skip(1).Take(2)", "IEnumerable<RoleInfo>"),
        ("Roles.GroupBy(Level)", "IEnumerable<IGrouping<Int32, RoleInfo>>"),
        ("Roles.Select(Name).Distinct()", "IEnumerable<String>"),
        (r#"Tags.Contains("x")"#, "Boolean"),
        ("Tags.SelectMany(it)", "IEnumerable<Char>"),
    ];

    for (input, ty) in test_cases {
        let expr = compile(input).unwrap_or_else(|e| panic!("{}: {}", input, e));
        assert_eq!(expr.ty.to_string(), ty, "Failed for input: {}", input);
    }
}

#[test]
fn test_aggregate_argument_is_element_lambda() {
    let expected = "\
Call(Where: IEnumerable<RoleInfo>)
├── MemberAccess(it.Roles: List<RoleInfo>)
└── Lambda(it =>: Func<RoleInfo, Boolean>)
    └── Binary(GreaterThan: Boolean)
        ├── MemberAccess(it.Level: Int32)
        └── Constant(1: Int32)
";
    assert_eq!(tree("Roles.Where(Level > 1)"), expected);
}

#[test]
fn test_scope_restored_after_aggregate() {
    let config = ParsingConfig::default();
    let lambda =
        parse_lambda(&config, person(), None, r#"Roles.Any(Name == "x") && Income > 0"#, vec![])
            .unwrap();
    let ExprKind::Lambda { params, body } = &lambda.kind else {
        panic!("expected a lambda");
    };
    let ExprKind::Binary { right, .. } = &body.kind else {
        panic!("expected &&");
    };
    let ExprKind::Binary { left: income, .. } = &right.kind else {
        panic!("expected >");
    };
    let ExprKind::MemberAccess {
        instance: Some(instance),
        member,
    } = &income.kind
    else {
        panic!("expected a member access");
    };
    assert_eq!(member, "Income");
    assert_eq!(instance.as_parameter(), Some(&params[0]));
}

#[test]
fn test_parent_and_root() {
    assert_eq!(compile("Roles.Any(Level > parent.Age)").unwrap().ty, Type::Boolean);
    assert_eq!(compile("Roles.Any(Level > ^.Age)").unwrap().ty, Type::Boolean);
    assert_eq!(compile("Roles.Any(root.Age > Level)").unwrap().ty, Type::Boolean);
    assert_eq!(compile("Roles.Any(~.Age > Level)").unwrap().ty, Type::Boolean);

    let err = error("parent.Age");
    assert_eq!(err.message, messages::NO_PARENT_IN_SCOPE);
    assert_eq!(err.position, 0);
}

#[test]
fn test_named_element_lambda() {
    assert_eq!(compile("Roles.Any(r => r.Level > 1)").unwrap().ty, Type::Boolean);
    assert_eq!(
        compile(r#"Roles.Where(r => r.Name == "a").Any(x => x.Level > 2)"#).unwrap().ty,
        Type::Boolean
    );
}

#[test]
fn test_named_lambda_over_dynamic_elements() {
    let feed = ClassType::builder("Feed")
        .property("Items", Type::list(Type::DynamicClass))
        .build();
    let config = ParsingConfig::default();
    let body = parse_lambda(&config, feed, None, "Items.Select(x => x.Foo)", vec![])
        .map(body_of)
        .unwrap();
    assert_eq!(body.ty.to_string(), "IEnumerable<Object>");
}

#[test]
fn test_unknown_method_on_sequence() {
    let err = error("Roles.Frobnicate()");
    assert_eq!(err.message, messages::no_applicable_method("Frobnicate", "List<RoleInfo>"));
    assert_eq!(err.position, 6);
}

#[test]
fn test_aggregate_errors() {
    let err = error("Roles.Sum(Name)");
    assert_eq!(err.message, messages::no_applicable_aggregate("Sum"));
    assert_eq!(err.position, 6);

    let err = error("Roles.Where(Name)");
    assert_eq!(err.message, messages::no_applicable_aggregate("Where"));
}

#[test]
fn test_enumerable_class() {
    let team = ClassType::builder("Team")
        .property("Title", Type::String)
        .enumerable_of(role_info())
        .build();
    let config = ParsingConfig::default();
    let lambda = parse_lambda(&config, team, None, r#"Title != "" && it.Any(Level > 2)"#, vec![]);
    assert_eq!(body_of(lambda.unwrap()).ty, Type::Boolean);
}

// ============================================================================
// Construction and Conversion
// ============================================================================

#[test]
fn test_anonymous_projection() {
    let expected = "\
New(Anonymous: DynamicClass1)
├── Name = MemberAccess(it.Name: String)
└── Twice = Binary(Multiply: Int32)
    ├── MemberAccess(it.Age: Int32)
    └── Constant(2: Int32)
";
    assert_eq!(tree("new(Name, Age * 2 as Twice)"), expected);
}

#[test]
fn test_projection_members_are_accessible() {
    let expr = compile("Roles.Select(new(Name as RoleName)).First().RoleName").unwrap();
    assert_eq!(expr.ty, Type::String);
}

#[test]
fn test_projection_errors() {
    let err = error("new(Age * 2)");
    assert_eq!(err.message, messages::MISSING_AS_CLAUSE);
    assert_eq!(err.position, 4);

    let err = error("new(Name, Name)");
    assert_eq!(err.message, messages::duplicate_member("Name"));
    assert_eq!(err.position, 10);
}

#[test]
fn test_dynamic_class_projection() {
    let mut config = ParsingConfig::default();
    config.use_dynamic_object_class_for_anonymous_types = true;
    assert_eq!(compile_with(&config, "new(Name)").unwrap().ty, Type::DynamicClass);
    assert_eq!(compile_with(&config, "new(Name).Name").unwrap().ty, Type::Object);
}

#[test]
fn test_member_bindings_on_registered_type() {
    let expr = compile_with(&registered(), "new RoleInfo(Name as Name, Age as Level)").unwrap();
    assert_eq!(expr.ty, role_info());
    let ExprKind::New(Construction::Bindings(bindings)) = &expr.kind else {
        panic!("expected member bindings");
    };
    let names: Vec<&str> = bindings.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["Name", "Level"]);
}

#[test]
fn test_unknown_type_in_new() {
    let err = error("new Nowhere(1)");
    assert_eq!(err.message, messages::type_not_found("Nowhere"));
}

#[test]
fn test_array_initializers() {
    assert_eq!(compile("new[] { 1, 2, 3 }").unwrap().ty, Type::array(Type::Int32));
    assert_eq!(compile(r#"new[] { 1, "a" }"#).unwrap().ty, Type::array(Type::Object));
    assert_eq!(compile("new Int64[] { 1, 2 }").unwrap().ty, Type::array(Type::Int64));
}

#[test]
fn test_explicit_conversions() {
    assert_eq!(tree("Int64(Age)"), "Convert(Int64)\n└── MemberAccess(it.Age: Int32)\n");
    assert_eq!(compile("Int32?(null)").unwrap().ty, Type::nullable(Type::Int32));
    assert_eq!(compile("int(Income)").unwrap().ty, Type::Int32);

    let date = compile(r#"DateTime("2024-01-02")"#).unwrap();
    assert_eq!(date.ty, Type::DateTime);
    assert!(date.is_constant());

    let err = error("String?");
    assert_eq!(err.message, messages::type_has_no_nullable_form("String"));
    assert_eq!(err.position, 6);
}

#[test]
fn test_type_functions() {
    let expr = compile(r#"is("Person")"#).unwrap();
    assert_eq!(expr.ty, Type::Boolean);
    let ExprKind::TypeCheck { mode, target, .. } = &expr.kind else {
        panic!("expected a type check");
    };
    assert_eq!(*mode, TypeCheckMode::Is);
    assert_eq!(*target, person());

    assert_eq!(compile("is(Age, Int32)").unwrap().ty, Type::Boolean);
    assert_eq!(compile(r#"cast(Age, "Int64")"#).unwrap().ty, Type::Int64);
    assert_eq!(compile("as(Address, Object)").unwrap().ty, Type::Object);

    let err = error("as(Age, Int32)");
    assert_eq!(err.message, messages::as_requires_reference_type("Int32"));

    let err = error(r#"is("Nowhere")"#);
    assert_eq!(err.message, messages::type_not_found("Nowhere"));
}

// ============================================================================
// Sessions, Parameters and Values
// ============================================================================

#[test]
fn test_named_parameters() {
    let config = ParsingConfig::default();
    let a = Parameter::new("a", Type::Int32);
    let b = Parameter::new("b", Type::Int32);
    let lambda = parse_lambda_with(&config, &[a, b], None, "a + b", vec![]).unwrap();
    assert_eq!(lambda.ty.to_string(), "Func<Int32, Int32, Int32>");
}

#[test]
fn test_duplicate_parameter_names() {
    let config = ParsingConfig::default();
    let params = [
        Parameter::new("x", Type::Int32),
        Parameter::new("X", Type::Int32),
    ];
    let err = parse_lambda_with(&config, &params, None, "x", vec![]).unwrap_err();
    assert_eq!(err.message, messages::duplicate_identifier("X"));
    assert_eq!(err.position, 0);
}

#[test]
fn test_positional_and_external_values() {
    let config = ParsingConfig::default();
    let expr = parse_lambda(
        &config,
        person(),
        None,
        "Age > @0",
        vec![Argument::Value(Value::Int32(5))],
    )
    .map(body_of)
    .unwrap();
    assert_eq!(
        to_tree(&expr),
        "Binary(GreaterThan: Boolean)\n├── MemberAccess(it.Age: Int32)\n└── Constant(5: Int32)\n"
    );

    let externals: BTreeMap<String, Value> = [("Limit".to_string(), Value::Int32(3))].into_iter().collect();
    let expr = parse_lambda(&config, person(), None, "Age > limit", vec![Argument::Externals(externals)])
        .unwrap();
    assert_eq!(expr.ty.to_string(), "Func<Person, Boolean>");
}

#[test]
fn test_lambda_value_invocation() {
    let config = ParsingConfig::default();
    let double = parse_lambda(&config, Type::Int32, None, "it * 2", vec![]).unwrap();
    let expr = parse_lambda(&config, person(), None, "@0(Age) > 10", vec![Argument::Expr(double)])
        .map(body_of)
        .unwrap();
    assert_eq!(expr.ty, Type::Boolean);

    let double = parse_lambda(&config, Type::Int32, None, "it * 2", vec![]).unwrap();
    let err = parse_lambda(&config, person(), None, "@0(Age, 1)", vec![Argument::Expr(double)])
        .unwrap_err();
    assert_eq!(err.message, messages::argument_count_mismatch(1));
}

#[test]
fn test_expected_result_type() {
    let config = ParsingConfig::default();
    let lambda = parse_lambda(&config, person(), Some(Type::Int64), "Age", vec![]).unwrap();
    assert_eq!(lambda.ty.to_string(), "Func<Person, Int64>");

    let err = parse_lambda(&config, person(), Some(Type::String), "Age", vec![]).unwrap_err();
    assert_eq!(err.message, messages::expression_type_expected("String"));
    assert_eq!(err.position, 0);
}

#[test]
fn test_decimal_separator_config() {
    let mut config = ParsingConfig::default();
    config.number_decimal_separator = ',';
    let lambda = parse_lambda(&config, Type::Double, None, "it > 2,5", vec![]).unwrap();
    let body = body_of(lambda);
    let ExprKind::Binary { right, .. } = &body.kind else {
        panic!("expected a comparison");
    };
    assert_eq!(right.constant_value(), Some(&Value::Double(2.5)));
}

// ============================================================================
// Ordering
// ============================================================================

#[test]
fn test_ordering_list() {
    let config = ParsingConfig::default();
    let it = Parameter::new("", person());
    let mut parser = Parser::new(&config, &[it], "Name, Age desc, Income ascending", vec![]).unwrap();
    let orderings = parser.parse_ordering_list().unwrap();

    let summary: Vec<(String, bool, String)> = orderings
        .iter()
        .map(|o| (o.method_name.clone(), o.ascending, o.selector.ty.to_string()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("OrderBy".to_string(), true, "String".to_string()),
            ("ThenByDescending".to_string(), false, "Int32".to_string()),
            ("ThenBy".to_string(), true, "Decimal".to_string()),
        ]
    );
}

#[test]
fn test_ordering_continues_existing_order() {
    let config = ParsingConfig::default();
    let it = Parameter::new("", person());
    let mut parser = Parser::new(&config, &[it], "Age DESCENDING", vec![]).unwrap();
    let orderings = parser.parse_ordering(true).unwrap();
    assert_eq!(orderings.len(), 1);
    assert_eq!(orderings[0].method_name, "ThenByDescending");
}

// ============================================================================
// Syntax Errors
// ============================================================================

#[test]
fn test_syntax_errors() {
    let test_cases = vec![
        ("Age >", messages::EXPRESSION_EXPECTED, 5),
        ("(Age > 1", messages::CLOSE_PAREN_OR_OPERATOR_EXPECTED, 8),
        ("Age 1", messages::SYNTAX_ERROR, 4),
        ("Describe(1", messages::CLOSE_PAREN_OR_COMMA_EXPECTED, 10),
        ("Age > 1 ? 2", messages::COLON_EXPECTED, 11),
    ];

    for (input, message, position) in test_cases {
        let err = error(input);
        assert_eq!(err.message, message, "Failed for input: {}", input);
        assert_eq!(err.position, position, "Failed for input: {}", input);
    }
}

#[test]
fn test_error_display() {
    assert_eq!(error("Age 1").to_string(), "Syntax error (at index 4)");
}
