//! Literal token text to typed constants.
//!
//! Constants keep a canonical form of their text (hexadecimal rewritten in
//! decimal, `.` as decimal point) so [`parse_number`] can re-read them
//! against another numeric type later. A type qualifier stays on the text,
//! which keeps `1L` or `2.5D` from being re-read as anything else.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::ast::{Expr, Token};
use crate::error::{messages, ParseError, ParseResult};
use crate::lexer::unescape;
use crate::types::Type;
use crate::value::Value;

const REAL_QUALIFIERS: [char; 3] = ['F', 'D', 'M'];

/// Parses an integer literal, possibly with a leading `-` merged in from a
/// unary minus.
///
/// Without a qualifier the narrowest of `Int32`, `UInt32`, `Int64` and
/// `UInt64` holding the value is chosen; negative values are `Int32` or
/// `Int64`. `U`, `L` and `UL` select a type explicitly, and `F`, `D`, `M`
/// turn the literal into a real one.
pub fn parse_integer_literal(text: &str, position: usize) -> ParseResult<Expr> {
    let invalid = || ParseError::new(position, messages::invalid_integer_literal(text));

    let negative = text.starts_with('-');
    let body = if negative { &text[1..] } else { text };
    let is_hex = body.len() > 2 && body[..2].eq_ignore_ascii_case("0x");

    let digits = if is_hex {
        body.trim_end_matches(['U', 'u', 'L', 'l'])
    } else {
        body.trim_end_matches(|c: char| "UuLlFfDdMm".contains(c))
    };
    let qualifier = body[digits.len()..].to_ascii_uppercase();

    if let Some(q) = qualifier.chars().find(|c| REAL_QUALIFIERS.contains(c)) {
        if qualifier.len() != 1 {
            return Err(invalid());
        }
        let sign = if negative { "-" } else { "" };
        return parse_real_literal(&format!("{}{}{}", sign, digits, q), '.', position);
    }

    let magnitude = if is_hex {
        u64::from_str_radix(&digits[2..], 16)
    } else {
        digits.parse::<u64>()
    }
    .map_err(|_| invalid())?;

    if !negative {
        let value = match qualifier.as_str() {
            "" => {
                if let Ok(n) = i32::try_from(magnitude) {
                    Value::Int32(n)
                } else if let Ok(n) = u32::try_from(magnitude) {
                    Value::UInt32(n)
                } else if let Ok(n) = i64::try_from(magnitude) {
                    Value::Int64(n)
                } else {
                    Value::UInt64(magnitude)
                }
            }
            "U" => Value::UInt32(u32::try_from(magnitude).map_err(|_| invalid())?),
            "L" => Value::Int64(i64::try_from(magnitude).map_err(|_| invalid())?),
            "UL" | "LU" => Value::UInt64(magnitude),
            _ => return Err(invalid()),
        };
        let ty = value.natural_type();
        return Ok(Expr::literal(value, ty, format!("{}{}", magnitude, qualifier)));
    }

    if !qualifier.is_empty() && qualifier != "L" {
        return Err(ParseError::new(
            position,
            messages::MINUS_CANNOT_BE_APPLIED_TO_UNSIGNED,
        ));
    }
    let n = i64::try_from(-(magnitude as i128)).map_err(|_| invalid())?;
    let value = match i32::try_from(n) {
        Ok(small) if qualifier.is_empty() => Value::Int32(small),
        _ => Value::Int64(n),
    };
    let ty = value.natural_type();
    Ok(Expr::literal(value, ty, format!("{}{}", n, qualifier)))
}

/// Parses a real literal written with `separator` as decimal point.
/// `F` gives `Single`, `M` gives `Decimal`, `D` or no qualifier `Double`.
pub fn parse_real_literal(text: &str, separator: char, position: usize) -> ParseResult<Expr> {
    let invalid = || ParseError::new(position, messages::invalid_real_literal(text));

    let normalized = if separator == '.' {
        text.to_string()
    } else {
        text.replace(separator, ".")
    };
    let qualifier = normalized
        .chars()
        .last()
        .map(|c| c.to_ascii_uppercase())
        .filter(|c| REAL_QUALIFIERS.contains(c));
    let body = match qualifier {
        Some(_) => &normalized[..normalized.len() - 1],
        None => normalized.as_str(),
    };

    let value = match qualifier {
        Some('F') => f32::from_str(body)
            .ok()
            .filter(|n| n.is_finite())
            .map(Value::Single),
        Some('M') => parse_decimal(body).map(Value::Decimal),
        _ => f64::from_str(body)
            .ok()
            .filter(|n| n.is_finite())
            .map(Value::Double),
    }
    .ok_or_else(invalid)?;

    let ty = value.natural_type();
    let text = match qualifier {
        Some(q) => format!("{}{}", body, q),
        None => body.to_string(),
    };
    Ok(Expr::literal(value, ty, text))
}

/// A `"..."` string or `'.'` character literal.
pub fn parse_string_literal(token: &Token) -> ParseResult<Expr> {
    let text = unescape(&token.text, token.position)?;
    if token.text.starts_with('\'') {
        let mut chars = text.chars();
        return match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(Expr::literal(Value::Char(c), Type::Char, text.clone())),
            _ => Err(ParseError::new(
                token.position,
                messages::INVALID_CHARACTER_LITERAL,
            )),
        };
    }
    Ok(Expr::literal(Value::String(text.clone()), Type::String, text))
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

/// Re-reads canonical literal text as a value of the non-nullable numeric or
/// enum type `target`. `None` when the text does not fit.
pub fn parse_number(text: &str, target: &Type) -> Option<Value> {
    match target {
        Type::SByte
        | Type::Byte
        | Type::Int16
        | Type::UInt16
        | Type::Int32
        | Type::UInt32
        | Type::Int64
        | Type::UInt64 => {
            let n = i128::from_str(text).ok()?;
            Value::from_i128(target, n)
        }
        Type::Single => f32::from_str(text).ok().map(Value::Single),
        Type::Double => f64::from_str(text).ok().map(Value::Double),
        Type::Decimal => parse_decimal(text).map(Value::Decimal),
        Type::Enum(e) => {
            let n = parse_number(text, &e.underlying)?.as_i128()?;
            Value::from_i128(target, n)
        }
        _ => None,
    }
}

/// The member of enum type `target` named `text` (ignoring case).
pub fn parse_enum(text: &str, target: &Type) -> Option<Value> {
    match target {
        Type::Enum(e) => e.value_of(text).map(|value| Value::Enum {
            ty: e.clone(),
            value,
        }),
        _ => None,
    }
}
