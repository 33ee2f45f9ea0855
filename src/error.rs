//! The single error kind raised by a compile.
//!
//! Every failure (lexical, syntactic or semantic) aborts the compile with a
//! [`ParseError`] carrying the character position it was detected at.

use thiserror::Error;

/// A compile failure at a source position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (at index {position})")]
pub struct ParseError {
    /// Zero-based character offset into the expression text.
    pub position: usize,
    /// Human-readable description.
    pub message: String,
}

impl ParseError {
    pub fn new(position: usize, message: impl Into<String>) -> Self {
        ParseError {
            position,
            message: message.into(),
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Message texts, kept together so tests and callers can match on them.
pub mod messages {
    pub fn invalid_character(ch: char) -> String {
        format!("Syntax error '{}'", ch)
    }
    pub const UNTERMINATED_STRING_LITERAL: &str = "Unterminated string literal";
    pub const INVALID_CHARACTER_LITERAL: &str =
        "Character literal must contain exactly one character";
    pub fn invalid_escape(ch: char) -> String {
        format!("Invalid escape sequence '\\{}'", ch)
    }
    pub const HEX_DIGIT_EXPECTED: &str = "Hexadecimal digit expected";
    pub fn invalid_integer_literal(text: &str) -> String {
        format!("Invalid integer literal '{}'", text)
    }
    pub fn invalid_real_literal(text: &str) -> String {
        format!("Invalid real literal '{}'", text)
    }
    pub const MINUS_CANNOT_BE_APPLIED_TO_UNSIGNED: &str =
        "Operator '-' cannot be applied to an unsigned integer literal";

    pub const SYNTAX_ERROR: &str = "Syntax error";
    pub const EXPRESSION_EXPECTED: &str = "Expression expected";
    pub const IDENTIFIER_EXPECTED: &str = "Identifier expected";
    pub const COLON_EXPECTED: &str = "':' expected";
    pub const OPEN_PAREN_EXPECTED: &str = "'(' expected";
    pub const CLOSE_PAREN_OR_OPERATOR_EXPECTED: &str = "')' or operator expected";
    pub const CLOSE_PAREN_OR_COMMA_EXPECTED: &str = "')' or ',' expected";
    pub const CLOSE_BRACKET_EXPECTED: &str = "']' expected";
    pub const CLOSE_BRACKET_OR_COMMA_EXPECTED: &str = "']' or ',' expected";
    pub const OPEN_CURLY_EXPECTED: &str = "'{' expected";
    pub const OPEN_PAREN_OR_IDENTIFIER_EXPECTED: &str = "'(' or identifier expected";
    pub const NULL_PROPAGATION_OPERATOR_UNSUPPORTED: &str = "An expression tree lambda may not contain a null propagating operator. Use the 'np()' function instead";

    pub fn duplicate_identifier(name: &str) -> String {
        format!("The identifier '{}' was defined more than once", name)
    }
    pub fn unknown_identifier(name: &str) -> String {
        format!("Unknown identifier '{}'", name)
    }
    pub const NO_IT_IN_SCOPE: &str = "No 'it' is in scope";
    pub const NO_PARENT_IN_SCOPE: &str = "No 'parent' is in scope";
    pub const NO_ROOT_IN_SCOPE: &str = "No 'root' is in scope";
    pub fn unknown_property_or_field(name: &str, ty: &str) -> String {
        format!("No property or field '{}' exists in type '{}'", name, ty)
    }
    pub fn no_applicable_method(name: &str, ty: &str) -> String {
        format!("No applicable method '{}' exists in type '{}'", name, ty)
    }
    pub fn ambiguous_method_invocation(name: &str, ty: &str) -> String {
        format!("Ambiguous invocation of method '{}' in type '{}'", name, ty)
    }
    pub fn methods_are_inaccessible(ty: &str) -> String {
        format!("Methods on type '{}' are not accessible", ty)
    }
    pub fn method_is_void(name: &str, ty: &str) -> String {
        format!("Method '{}' in type '{}' does not return a value", name, ty)
    }
    pub fn no_applicable_aggregate(name: &str) -> String {
        format!("No applicable aggregate method '{}' exists", name)
    }
    pub fn no_applicable_indexer(ty: &str) -> String {
        format!("No applicable indexer exists in type '{}'", ty)
    }
    pub fn ambiguous_indexer_invocation(ty: &str) -> String {
        format!("Ambiguous invocation of indexer in type '{}'", ty)
    }
    pub const CANNOT_INDEX_MULTI_DIM_ARRAY: &str =
        "Indexing of multi-dimensional arrays is not supported";
    pub const INVALID_INDEX: &str = "Array index must be an integer expression";
    pub fn no_matching_constructor(ty: &str) -> String {
        format!("No matching constructor in type '{}'", ty)
    }
    pub fn ambiguous_constructor_invocation(ty: &str) -> String {
        format!("Ambiguous invocation of '{}' constructor", ty)
    }
    pub fn cannot_convert_value(from: &str, to: &str) -> String {
        format!("A value of type '{}' cannot be converted to type '{}'", from, to)
    }
    pub fn type_not_found(name: &str) -> String {
        format!("Type '{}' not found", name)
    }
    pub fn type_has_no_nullable_form(ty: &str) -> String {
        format!("Type '{}' has no nullable form", ty)
    }
    pub fn expression_type_expected(ty: &str) -> String {
        format!("Expression of type '{}' expected", ty)
    }
    pub fn incompatible_operand(op: &str, ty: &str) -> String {
        format!("Operator '{}' incompatible with operand type '{}'", op, ty)
    }
    pub fn incompatible_operands(op: &str, left: &str, right: &str) -> String {
        format!(
            "Operator '{}' incompatible with operand types '{}' and '{}'",
            op, left, right
        )
    }
    pub const FIRST_EXPR_MUST_BE_BOOL: &str = "The first expression must be of type 'Boolean'";
    pub fn both_types_convert_to_other(a: &str, b: &str) -> String {
        format!(
            "Both of the types '{}' and '{}' convert to the other",
            a, b
        )
    }
    pub fn neither_type_converts_to_other(a: &str, b: &str) -> String {
        format!(
            "Neither of the types '{}' and '{}' converts to the other",
            a, b
        )
    }
    pub const IIF_REQUIRES_THREE_ARGS: &str = "The 'iif' function requires three arguments";
    pub const ISNULL_REQUIRES_TWO_ARGS: &str = "The 'isnull' function requires two arguments";
    pub const NP_REQUIRES_ONE_OR_TWO_ARGS: &str =
        "The 'np' (null-propagation) function requires 1 or 2 arguments";
    pub const NP_REQUIRES_MEMBER_EXPRESSION: &str =
        "The 'np' (null-propagation) function requires the first argument to be a member access expression";
    pub fn function_requires_one_or_two_args(name: &str) -> String {
        format!("The '{}' function requires one or two arguments", name)
    }
    pub fn function_requires_type_argument(name: &str) -> String {
        format!(
            "The '{}' function requires the type argument to be a string or a type",
            name
        )
    }
    pub fn as_requires_reference_type(ty: &str) -> String {
        format!(
            "The 'as' function requires a reference or nullable type, but '{}' is a value type",
            ty
        )
    }
    pub fn coalesce_requires_nullable(ty: &str) -> String {
        format!(
            "The left operand of '??' must be a reference or nullable type, found '{}'",
            ty
        )
    }
    pub const MISSING_AS_CLAUSE: &str = "Expression is missing an 'as' clause";
    pub fn duplicate_member(name: &str) -> String {
        format!("The member '{}' is projected more than once", name)
    }
    pub fn enum_value_not_defined(value: &str, ty: &str) -> String {
        format!("Enum value '{}' is not defined in enum type '{}'", value, ty)
    }
    pub fn identifier_implementing_enumerable_expected() -> String {
        "Identifier implementing interface 'IEnumerable' expected".to_string()
    }
    pub fn argument_count_mismatch(expected: usize) -> String {
        format!("Lambda expects {} argument(s)", expected)
    }
    pub const ARGUMENT_INCOMPATIBLE: &str = "Argument list incompatible with lambda expression";
}
