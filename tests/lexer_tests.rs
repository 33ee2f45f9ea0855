// tests/lexer_tests.rs

use dynlinq::ast::{Token, TokenKind};
use dynlinq::error::messages;
use dynlinq::lexer::{unescape, Lexer};
use pretty_assertions::assert_eq;

fn tokenize(input: &str) -> Vec<Token> {
    let mut lexer = Lexer::new(input);
    let mut tokens = vec![];
    loop {
        let token = lexer.next_token().unwrap();
        if token.kind == TokenKind::End {
            break;
        }
        tokens.push(token);
    }
    tokens
}

fn kinds(input: &str) -> Vec<TokenKind> {
    tokenize(input).into_iter().map(|t| t.kind).collect()
}

// ============================================================================
// Single Character Tokens
// ============================================================================

#[test]
fn test_single_char_tokens() {
    let test_cases = vec![
        ("!", TokenKind::Exclamation),
        ("%", TokenKind::Percent),
        ("&", TokenKind::Ampersand),
        ("(", TokenKind::OpenParen),
        (")", TokenKind::CloseParen),
        ("{", TokenKind::OpenCurlyParen),
        ("}", TokenKind::CloseCurlyParen),
        ("*", TokenKind::Asterisk),
        ("+", TokenKind::Plus),
        (",", TokenKind::Comma),
        ("-", TokenKind::Minus),
        (".", TokenKind::Dot),
        ("/", TokenKind::Slash),
        (":", TokenKind::Colon),
        ("<", TokenKind::LessThan),
        ("=", TokenKind::Equal),
        (">", TokenKind::GreaterThan),
        ("?", TokenKind::Question),
        ("[", TokenKind::OpenBracket),
        ("]", TokenKind::CloseBracket),
        ("|", TokenKind::Bar),
    ];

    for (input, expected) in test_cases {
        let mut lexer = Lexer::new(input);
        let token = lexer.next_token().unwrap();
        assert_eq!(token.kind, expected, "Failed for input: {}", input);
        assert_eq!(token.text, input);
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::End);
    }
}

// ============================================================================
// Two Character Tokens
// ============================================================================

#[test]
fn test_two_char_tokens() {
    let test_cases = vec![
        ("!=", TokenKind::ExclamationEqual),
        ("&&", TokenKind::DoubleAmpersand),
        ("<=", TokenKind::LessThanEqual),
        ("<>", TokenKind::LessGreater),
        ("==", TokenKind::DoubleEqual),
        (">=", TokenKind::GreaterThanEqual),
        ("||", TokenKind::DoubleBar),
        ("=>", TokenKind::Lambda),
        ("??", TokenKind::NullCoalescing),
        ("?.", TokenKind::NullPropagation),
        ("<<", TokenKind::DoubleLessThan),
        (">>", TokenKind::DoubleGreaterThan),
    ];

    for (input, expected) in test_cases {
        let mut lexer = Lexer::new(input);
        let token = lexer.next_token().unwrap();
        assert_eq!(token.kind, expected, "Failed for input: {}", input);
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::End);
    }
}

#[test]
fn test_longest_match_wins() {
    assert_eq!(
        kinds("a<=b<c"),
        vec![
            TokenKind::Identifier,
            TokenKind::LessThanEqual,
            TokenKind::Identifier,
            TokenKind::LessThan,
            TokenKind::Identifier,
        ]
    );
}

// ============================================================================
// Word Operators
// ============================================================================

#[test]
fn test_word_aliases() {
    let test_cases = vec![
        ("eq", TokenKind::DoubleEqual),
        ("Equal", TokenKind::DoubleEqual),
        ("ne", TokenKind::ExclamationEqual),
        ("neq", TokenKind::ExclamationEqual),
        ("NotEqual", TokenKind::ExclamationEqual),
        ("lt", TokenKind::LessThan),
        ("le", TokenKind::LessThanEqual),
        ("gt", TokenKind::GreaterThan),
        ("ge", TokenKind::GreaterThanEqual),
        ("and", TokenKind::DoubleAmpersand),
        ("AndAlso", TokenKind::DoubleAmpersand),
        ("or", TokenKind::DoubleBar),
        ("OrElse", TokenKind::DoubleBar),
        ("not", TokenKind::Exclamation),
        ("MOD", TokenKind::Percent),
    ];

    for (input, expected) in test_cases {
        let token = Lexer::new(input).next_token().unwrap();
        assert_eq!(token.kind, expected, "Failed for input: {}", input);
        assert_eq!(token.text, input);
    }
}

#[test]
fn test_alias_prefix_is_an_identifier() {
    assert_eq!(kinds("order android"), vec![TokenKind::Identifier, TokenKind::Identifier]);
}

// ============================================================================
// Identifiers
// ============================================================================

#[test]
fn test_identifiers() {
    let test_cases = vec!["Name", "_private", "x1", "@0", "@new", "$", "^", "~", "Ünïcode"];

    for input in test_cases {
        let token = Lexer::new(input).next_token().unwrap();
        assert_eq!(token.kind, TokenKind::Identifier, "Failed for input: {}", input);
        assert_eq!(token.text, input);
    }
}

#[test]
fn test_member_chain() {
    let tokens = tokenize("it.Address.City");
    let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
    assert_eq!(texts, vec!["it", ".", "Address", ".", "City"]);
}

// ============================================================================
// Numbers
// ============================================================================

#[test]
fn test_integer_literals() {
    let test_cases = vec!["0", "42", "10U", "10L", "10UL", "0xFF", "0x1fL", "7M"];

    for input in test_cases {
        let token = Lexer::new(input).next_token().unwrap();
        assert_eq!(token.kind, TokenKind::IntegerLiteral, "Failed for input: {}", input);
        assert_eq!(token.text, input);
    }
}

#[test]
fn test_real_literals() {
    let test_cases = vec!["3.5", "3.5f", "3.5M", "1e10", "1E-3", "2.5e+2d"];

    for input in test_cases {
        let token = Lexer::new(input).next_token().unwrap();
        assert_eq!(token.kind, TokenKind::RealLiteral, "Failed for input: {}", input);
        assert_eq!(token.text, input);
    }
}

#[test]
fn test_trailing_dot_is_not_part_of_number() {
    assert_eq!(
        kinds("1.ToString()"),
        vec![
            TokenKind::IntegerLiteral,
            TokenKind::Dot,
            TokenKind::Identifier,
            TokenKind::OpenParen,
            TokenKind::CloseParen,
        ]
    );
}

#[test]
fn test_exponent_without_digits_stays_separate() {
    let tokens = tokenize("2e");
    assert_eq!(tokens[0], Token::new(TokenKind::IntegerLiteral, "2", 0));
    assert_eq!(tokens[1], Token::new(TokenKind::Identifier, "e", 1));
}

#[test]
fn test_custom_decimal_separator() {
    let mut lexer = Lexer::with_decimal_separator("3,5", ',');
    let token = lexer.next_token().unwrap();
    assert_eq!(token, Token::new(TokenKind::RealLiteral, "3,5", 0));
    assert_eq!(lexer.next_token().unwrap().kind, TokenKind::End);
}

#[test]
fn test_hex_without_digits() {
    let err = Lexer::new("0x").next_token().unwrap_err();
    assert_eq!(err.message, messages::HEX_DIGIT_EXPECTED);
    assert_eq!(err.position, 2);
}

// ============================================================================
// Strings
// ============================================================================

#[test]
fn test_string_literals() {
    let test_cases = vec![
        (r#""hello""#, "hello"),
        (r#""""#, ""),
        (r#""a\"b""#, "a\"b"),
        (r#""tab\there""#, "tab\there"),
        (r#""line\nbreak""#, "line\nbreak"),
        (r#""ABC""#, "ABC"),
        (r#""back\\slash""#, "back\\slash"),
        (r#""say ""hi""""#, "say \"hi\""),
        ("'x'", "x"),
        ("''''", "'"),
    ];

    for (input, expected) in test_cases {
        let token = Lexer::new(input).next_token().unwrap();
        assert_eq!(token.kind, TokenKind::StringLiteral, "Failed for input: {}", input);
        assert_eq!(token.text, input);
        assert_eq!(unescape(&token.text, 0).unwrap(), expected);
    }
}

#[test]
fn test_unterminated_string() {
    let mut lexer = Lexer::new(r#"Name == "abc"#);
    lexer.next_token().unwrap();
    lexer.next_token().unwrap();
    let err = lexer.next_token().unwrap_err();
    assert_eq!(err.message, messages::UNTERMINATED_STRING_LITERAL);
    assert_eq!(err.position, 8);
}

#[test]
fn test_character_literal_length() {
    let err = Lexer::new("'ab'").next_token().unwrap_err();
    assert_eq!(err.message, messages::INVALID_CHARACTER_LITERAL);
    assert_eq!(err.position, 0);
}

#[test]
fn test_invalid_escape() {
    let err = Lexer::new(r#""\q""#).next_token().unwrap_err();
    assert_eq!(err.message, messages::invalid_escape('q'));
    assert_eq!(err.position, 1);
}

// ============================================================================
// Positions and Errors
// ============================================================================

#[test]
fn test_token_positions() {
    let tokens = tokenize("Age  >= 10");
    assert_eq!(
        tokens,
        vec![
            Token::new(TokenKind::Identifier, "Age", 0),
            Token::new(TokenKind::GreaterThanEqual, ">=", 5),
            Token::new(TokenKind::IntegerLiteral, "10", 8),
        ]
    );
}

#[test]
fn test_end_token_repeats() {
    let mut lexer = Lexer::new("  ");
    assert_eq!(lexer.next_token().unwrap(), Token::new(TokenKind::End, "", 2));
    assert_eq!(lexer.next_token().unwrap().kind, TokenKind::End);
}

#[test]
fn test_invalid_character() {
    let mut lexer = Lexer::new("a # b");
    lexer.next_token().unwrap();
    let err = lexer.next_token().unwrap_err();
    assert_eq!(err.message, messages::invalid_character('#'));
    assert_eq!(err.position, 2);
    assert_eq!(err.to_string(), "Syntax error '#' (at index 2)");
}

#[test]
fn test_full_expression() {
    assert_eq!(
        kinds(r#"Roles.Any(Name == "admin") && Income >= 10.5m"#),
        vec![
            TokenKind::Identifier,
            TokenKind::Dot,
            TokenKind::Identifier,
            TokenKind::OpenParen,
            TokenKind::Identifier,
            TokenKind::DoubleEqual,
            TokenKind::StringLiteral,
            TokenKind::CloseParen,
            TokenKind::DoubleAmpersand,
            TokenKind::Identifier,
            TokenKind::GreaterThanEqual,
            TokenKind::RealLiteral,
        ]
    );
}
