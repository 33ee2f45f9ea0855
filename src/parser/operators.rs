//! Binary and unary operator levels, from `?:` down to unary `-` and `!`.

use crate::ast::{BinaryOp, Callable, Expr, ExprKind, Token, TokenKind, UnaryOp};
use crate::error::{messages, ParseError, ParseResult};
use crate::overload::{
    check_and_promote_operand, check_and_promote_operands, find_method, promote, Resolution,
    SignatureGroup,
};
use crate::parser::Parser;
use crate::types::conversion::{has_user_conversion, is_assignable_from, is_compatible_with};
use crate::types::{builtin, Type};
use crate::value::Value;

/// Integral types in the order `&` and `|` widen to.
static BIGGEST_FIRST: [Type; 8] = [
    Type::UInt64,
    Type::Int64,
    Type::UInt32,
    Type::Int32,
    Type::UInt16,
    Type::Int16,
    Type::Byte,
    Type::SByte,
];

impl Parser<'_> {
    /// `test ? if_true : if_false`
    pub(super) fn parse_conditional(&mut self) -> ParseResult<Expr> {
        let position = self.position();
        let expr = self.parse_null_coalescing()?;
        if !self.check(TokenKind::Question) {
            return Ok(expr);
        }
        self.advance()?;
        let if_true = self.parse_conditional()?;
        self.expect(TokenKind::Colon, messages::COLON_EXPECTED)?;
        let if_false = self.parse_conditional()?;
        self.generate_conditional(expr, if_true, if_false, position)
    }

    /// `left ?? right`
    fn parse_null_coalescing(&mut self) -> ParseResult<Expr> {
        let left = self.parse_lambda_operator()?;
        if !self.check(TokenKind::NullCoalescing) {
            return Ok(left);
        }
        let position = self.position();
        self.advance()?;
        let right = self.parse_conditional()?;
        self.generate_coalesce(left, right, position)
    }

    /// `it => body`, where the left side is the current `it` itself.
    fn parse_lambda_operator(&mut self) -> ParseResult<Expr> {
        let expr = self.parse_or()?;
        if !self.check(TokenKind::Lambda) {
            return Ok(expr);
        }
        let Some(it) = self.scope.current().it.clone() else {
            return Ok(expr);
        };
        if expr.as_parameter() != Some(&it) {
            return Ok(expr);
        }
        self.advance()?;
        if !self.check(TokenKind::Identifier) && !self.check(TokenKind::OpenParen) {
            return Err(self.error_here(messages::OPEN_PAREN_EXPECTED));
        }
        let body = self.parse_conditional()?;
        Ok(Expr::lambda(vec![it], body))
    }

    /// `||`, `or`
    fn parse_or(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_and()?;
        while self.check(TokenKind::DoubleBar) {
            let op = self.current_token.clone();
            self.advance()?;
            let right = self.parse_and()?;
            let (l, r) =
                check_and_promote_operands(SignatureGroup::Logical, &op.text, left, right, op.position)?;
            let ty = l.ty.clone();
            left = Expr::binary(BinaryOp::OrElse, l, r, ty);
        }
        Ok(left)
    }

    /// `&&`, `and`
    fn parse_and(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_in()?;
        while self.check(TokenKind::DoubleAmpersand) {
            let op = self.current_token.clone();
            self.advance()?;
            let right = self.parse_in()?;
            let (l, r) =
                check_and_promote_operands(SignatureGroup::Logical, &op.text, left, right, op.position)?;
            let ty = l.ty.clone();
            left = Expr::binary(BinaryOp::AndAlso, l, r, ty);
        }
        Ok(left)
    }

    /// `x in (a, b, c)` and `x in Collection`
    fn parse_in(&mut self) -> ParseResult<Expr> {
        let left = self.parse_logical_and_or()?;
        let mut accumulate = left.clone();

        while self.current_token.is_identifier("in") {
            let op = self.current_token.clone();
            self.advance()?;

            if self.check(TokenKind::OpenParen) {
                let mut tested: Option<Expr> = None;
                while !self.check(TokenKind::CloseParen) {
                    // skips the '(' first and each ',' after
                    self.advance()?;
                    let right = self.parse_unary()?;
                    let (l, r) = if left.ty.is_enum() && right.ty != left.ty {
                        if !right.is_constant() {
                            return Err(ParseError::new(
                                op.position,
                                messages::expression_type_expected(&left.ty.to_string()),
                            ));
                        }
                        let r = enum_constant(&left.ty, &right, op.position)?;
                        (left.clone(), r)
                    } else if right.ty != left.ty {
                        check_and_promote_operands(
                            SignatureGroup::Equality,
                            "==",
                            left.clone(),
                            right,
                            op.position,
                        )?
                    } else {
                        (left.clone(), right)
                    };
                    let equal = Expr::binary(BinaryOp::Equal, l, r, Type::Boolean);
                    tested = Some(match tested {
                        Some(prev) => Expr::binary(BinaryOp::OrElse, prev, equal, Type::Boolean),
                        None => equal,
                    });

                    if !self.check(TokenKind::Comma) && !self.check(TokenKind::CloseParen) {
                        return Err(self.error_here(messages::CLOSE_PAREN_OR_COMMA_EXPECTED));
                    }
                }
                self.advance()?;
                accumulate = tested.ok_or_else(|| ParseError::new(op.position, messages::EXPRESSION_EXPECTED))?;
            } else if self.check(TokenKind::Identifier) {
                let right = self.parse_primary()?;
                let element = right.ty.element_type().ok_or_else(|| {
                    ParseError::new(
                        op.position,
                        messages::identifier_implementing_enumerable_expected(),
                    )
                })?;
                let item = promote(&left, &element, true, false).ok_or_else(|| {
                    ParseError::new(op.position, messages::no_applicable_aggregate("Contains"))
                })?;
                accumulate = Expr::new(
                    ExprKind::Call {
                        instance: Some(Box::new(right)),
                        callable: Callable::Aggregate("Contains".to_string()),
                        type_args: vec![element],
                        args: vec![item],
                    },
                    Type::Boolean,
                );
            } else {
                return Err(self.error_here(messages::OPEN_PAREN_OR_IDENTIFIER_EXPECTED));
            }
        }
        Ok(accumulate)
    }

    /// `&` and `|`: bitwise on integers and booleans; `&` with a string
    /// operand concatenates.
    fn parse_logical_and_or(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_comparison()?;
        while self.check(TokenKind::Ampersand) || self.check(TokenKind::Bar) {
            let op = self.current_token.clone();
            self.advance()?;
            let mut right = self.parse_comparison()?;

            left = to_underlying(left);
            right = to_underlying(right);

            if op.is(TokenKind::Ampersand) {
                if let Some(n) = int_text_constant(&left).filter(|_| right.ty.is_numeric()) {
                    left = Expr::constant(Value::Int32(n), Type::Int32);
                } else if let Some(n) = int_text_constant(&right).filter(|_| left.ty.is_numeric()) {
                    right = Expr::constant(Value::Int32(n), Type::Int32);
                }
                if left.ty.is_string() || right.ty.is_string() {
                    left = self.generate_string_concat(left, right, &op)?;
                    continue;
                }
            }

            let (l, r) = widen_to_common_integral(left, right);
            let usable = l.ty == r.ty && (l.ty.is_integral() || *l.ty.non_nullable() == Type::Boolean);
            if !usable {
                return Err(ParseError::new(
                    op.position,
                    messages::incompatible_operands(&op.text, &l.ty.to_string(), &r.ty.to_string()),
                ));
            }
            let bin = if op.is(TokenKind::Ampersand) { BinaryOp::And } else { BinaryOp::Or };
            let ty = l.ty.clone();
            left = Expr::binary(bin, l, r, ty);
        }
        Ok(left)
    }

    /// `== != < > <= >=` and their aliases.
    fn parse_comparison(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_shift()?;
        while let Some(bin) = comparison_op(&self.current_token) {
            let op = self.current_token.clone();
            self.advance()?;
            let mut right = self.parse_shift()?;
            let is_equality = matches!(bin, BinaryOp::Equal | BinaryOp::NotEqual);
            let mut method = None;

            let both_references = !left.ty.is_value_type() && !right.ty.is_value_type();
            let both_guids = left.ty == Type::Guid && right.ty == Type::Guid;

            if is_equality && (both_references || both_guids) {
                if left.ty != right.ty {
                    if right.is_untyped_null() {
                        right = Expr::typed_null(left.ty.clone());
                    } else if left.is_untyped_null() {
                        left = Expr::typed_null(right.ty.clone());
                    } else if is_assignable_from(&left.ty, &right.ty)
                        || has_user_conversion(&right.ty, &left.ty, false)
                    {
                        right = right.convert(left.ty.clone());
                    } else if is_assignable_from(&right.ty, &left.ty)
                        || has_user_conversion(&left.ty, &right.ty, false)
                    {
                        left = left.convert(right.ty.clone());
                    } else {
                        return Err(incompatible(&op, &left, &right));
                    }
                }
            } else if left.ty.is_enum() || right.ty.is_enum() {
                if left.ty != right.ty {
                    if let Some(e) = promote(&right, &left.ty, true, false) {
                        right = e;
                    } else if let Some(e) = promote(&left, &right.ty, true, false) {
                        left = e;
                    } else if left.ty.is_enum() && right.is_constant() {
                        right = enum_constant(&left.ty, &right, op.position)?;
                    } else if right.ty.is_enum() && left.is_constant() {
                        left = enum_constant(&right.ty, &left, op.position)?;
                    } else {
                        return Err(incompatible(&op, &left, &right));
                    }
                }
                if !is_equality {
                    left = to_underlying(left);
                    right = to_underlying(right);
                }
            } else if let Some(converted) = convert_string_constant(&right, &left.ty, op.position)? {
                right = converted;
            } else if let Some(converted) = convert_string_constant(&left, &right.ty, op.position)? {
                left = converted;
            } else if left.ty == right.ty && has_operator(&left.ty, bin) {
                method = Some(bin.operator_method_name().to_string());
            } else {
                let group = if is_equality {
                    SignatureGroup::Equality
                } else {
                    SignatureGroup::Relational
                };
                (left, right) = check_and_promote_operands(group, &op.text, left, right, op.position)?;
            }

            let mut expr = Expr::binary(bin, left, right, Type::Boolean);
            if let ExprKind::Binary { method: slot, .. } = &mut expr.kind {
                *slot = method;
            }
            left = expr;
        }
        Ok(left)
    }

    /// `<<` and `>>`
    fn parse_shift(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_additive()?;
        while self.check(TokenKind::DoubleLessThan) || self.check(TokenKind::DoubleGreaterThan) {
            let op = self.current_token.clone();
            self.advance()?;
            let right = self.parse_additive()?;
            let (l, r) =
                check_and_promote_operands(SignatureGroup::Shift, &op.text, left, right, op.position)?;
            let bin = if op.is(TokenKind::DoubleLessThan) {
                BinaryOp::LeftShift
            } else {
                BinaryOp::RightShift
            };
            let ty = l.ty.clone();
            left = Expr::binary(bin, l, r, ty);
        }
        Ok(left)
    }

    /// `+` and `-`; `+` with a string operand concatenates.
    fn parse_additive(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_multiplicative()?;
        while self.check(TokenKind::Plus) || self.check(TokenKind::Minus) {
            let op = self.current_token.clone();
            self.advance()?;
            let right = self.parse_multiplicative()?;

            if op.is(TokenKind::Plus) {
                if left.ty.is_string() || right.ty.is_string() {
                    left = self.generate_string_concat(left, right, &op)?;
                    continue;
                }
                let (l, r) =
                    check_and_promote_operands(SignatureGroup::Add, &op.text, left, right, op.position)?;
                let ty = l.ty.clone();
                left = Expr::binary(BinaryOp::Add, l, r, ty);
            } else {
                let (l, r) = check_and_promote_operands(
                    SignatureGroup::Subtract,
                    &op.text,
                    left,
                    right,
                    op.position,
                )?;
                let ty = match (l.ty.non_nullable(), r.ty.non_nullable()) {
                    (Type::DateTime, Type::DateTime) if l.ty.is_nullable() || r.ty.is_nullable() => {
                        Type::nullable(Type::TimeSpan)
                    }
                    (Type::DateTime, Type::DateTime) => Type::TimeSpan,
                    _ => l.ty.clone(),
                };
                left = Expr::binary(BinaryOp::Subtract, l, r, ty);
            }
        }
        Ok(left)
    }

    /// `*`, `/`, `%`, `mod`
    fn parse_multiplicative(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let bin = match self.current_token.kind {
                TokenKind::Asterisk => BinaryOp::Multiply,
                TokenKind::Slash => BinaryOp::Divide,
                TokenKind::Percent => BinaryOp::Modulo,
                _ => break,
            };
            let op = self.current_token.clone();
            self.advance()?;
            let right = self.parse_unary()?;
            let (l, r) = check_and_promote_operands(
                SignatureGroup::Arithmetic,
                &op.text,
                left,
                right,
                op.position,
            )?;
            let ty = l.ty.clone();
            left = Expr::binary(bin, l, r, ty);
        }
        Ok(left)
    }

    /// Prefix `-`, `!` and `not`.
    ///
    /// A `-` directly before a numeric literal becomes part of the literal,
    /// so `-2147483648` is an `Int32`.
    pub(super) fn parse_unary(&mut self) -> ParseResult<Expr> {
        if !self.check(TokenKind::Minus) && !self.check(TokenKind::Exclamation) {
            return self.parse_primary();
        }
        let op = self.current_token.clone();
        self.advance()?;

        if op.is(TokenKind::Minus)
            && (self.check(TokenKind::IntegerLiteral) || self.check(TokenKind::RealLiteral))
        {
            self.current_token.text = format!("-{}", self.current_token.text);
            self.current_token.position = op.position;
            return self.parse_primary();
        }

        let operand = self.parse_unary()?;
        let (group, unary) = if op.is(TokenKind::Minus) {
            (SignatureGroup::Negation, UnaryOp::Negate)
        } else {
            (SignatureGroup::Not, UnaryOp::Not)
        };
        let operand = check_and_promote_operand(group, &op.text, operand, op.position)?;
        let ty = operand.ty.clone();
        Ok(Expr::new(
            ExprKind::Unary {
                op: unary,
                operand: Box::new(operand),
            },
            ty,
        ))
    }

    /// Types the two branches of a conditional alike.
    pub(super) fn generate_conditional(
        &self,
        test: Expr,
        if_true: Expr,
        if_false: Expr,
        position: usize,
    ) -> ParseResult<Expr> {
        if test.ty != Type::Boolean {
            return Err(ParseError::new(position, messages::FIRST_EXPR_MUST_BE_BOOL));
        }
        if if_true.ty == if_false.ty {
            return Ok(Expr::conditional(test, if_true, if_false));
        }

        let needs_lifting = |e: &Expr| e.ty.is_value_type() && !e.ty.is_nullable();
        if if_true.is_untyped_null() && needs_lifting(&if_false) {
            let ty = Type::nullable(if_false.ty.clone());
            let if_false = if_false.convert(ty.clone());
            return Ok(Expr::conditional(test, Expr::typed_null(ty), if_false));
        }
        if if_false.is_untyped_null() && needs_lifting(&if_true) {
            let ty = Type::nullable(if_true.ty.clone());
            let if_true = if_true.convert(ty.clone());
            return Ok(Expr::conditional(test, if_true, Expr::typed_null(ty)));
        }

        let true_as_false = if if_false.is_untyped_null() {
            None
        } else {
            promote(&if_true, &if_false.ty, true, false)
        };
        let false_as_true = if if_true.is_untyped_null() {
            None
        } else {
            promote(&if_false, &if_true.ty, true, false)
        };
        match (true_as_false, false_as_true) {
            (Some(t), None) => Ok(Expr::conditional(test, t, if_false)),
            (None, Some(f)) => Ok(Expr::conditional(test, if_true, f)),
            (Some(_), Some(_)) => Err(ParseError::new(
                position,
                messages::both_types_convert_to_other(&display_name(&if_true), &display_name(&if_false)),
            )),
            (None, None) => Err(ParseError::new(
                position,
                messages::neither_type_converts_to_other(
                    &display_name(&if_true),
                    &display_name(&if_false),
                ),
            )),
        }
    }

    /// `left ?? right`: the left side must be able to hold null.
    pub(super) fn generate_coalesce(
        &self,
        left: Expr,
        right: Expr,
        position: usize,
    ) -> ParseResult<Expr> {
        if left.ty.is_value_type() && !left.ty.is_nullable() {
            return Err(ParseError::new(
                position,
                messages::coalesce_requires_nullable(&left.ty.to_string()),
            ));
        }
        let coalesce = |left: Expr, right: Expr, ty: Type| {
            Expr::new(
                ExprKind::Coalesce {
                    left: Box::new(left),
                    right: Box::new(right),
                },
                ty,
            )
        };

        if let Type::Nullable(inner) = &left.ty {
            if let Some(r) = promote(&right, inner, true, false) {
                let ty = (**inner).clone();
                return Ok(coalesce(left, r, ty));
            }
        }
        if let Some(r) = promote(&right, &left.ty, true, false) {
            let ty = left.ty.clone();
            return Ok(coalesce(left, r, ty));
        }
        if is_compatible_with(left.ty.non_nullable(), &right.ty) {
            let ty = right.ty.clone();
            let l = left.convert(Type::nullable(ty.clone()));
            return Ok(coalesce(l, right, ty));
        }
        Err(ParseError::new(
            position,
            messages::incompatible_operands("??", &left.ty.to_string(), &right.ty.to_string()),
        ))
    }

    /// `String.Concat(object, object)`
    fn generate_string_concat(&self, left: Expr, right: Expr, op: &Token) -> ParseResult<Expr> {
        let args = [left, right];
        match find_method(&Type::String, "Concat", true, &args) {
            Resolution::Found(method, promoted) => Ok(Expr::new(
                ExprKind::Call {
                    instance: None,
                    callable: Callable::Method(method),
                    type_args: vec![],
                    args: promoted,
                },
                Type::String,
            )),
            _ => Err(incompatible(op, &args[0], &args[1])),
        }
    }
}

fn comparison_op(token: &Token) -> Option<BinaryOp> {
    let op = match token.kind {
        TokenKind::DoubleEqual | TokenKind::Equal => BinaryOp::Equal,
        TokenKind::ExclamationEqual | TokenKind::LessGreater => BinaryOp::NotEqual,
        TokenKind::LessThan => BinaryOp::LessThan,
        TokenKind::GreaterThan => BinaryOp::GreaterThan,
        TokenKind::LessThanEqual => BinaryOp::LessThanOrEqual,
        TokenKind::GreaterThanEqual => BinaryOp::GreaterThanOrEqual,
        _ => return None,
    };
    Some(op)
}

fn incompatible(op: &Token, left: &Expr, right: &Expr) -> ParseError {
    ParseError::new(
        op.position,
        messages::incompatible_operands(&op.text, &left.ty.to_string(), &right.ty.to_string()),
    )
}

fn display_name(expr: &Expr) -> String {
    if expr.is_untyped_null() {
        "null".to_string()
    } else {
        expr.ty.to_string()
    }
}

fn has_operator(ty: &Type, op: BinaryOp) -> bool {
    let name = op.operator_method_name();
    builtin::operators(ty).iter().any(|m| m.name == name)
}

/// Converts an enum operand to its underlying integral type.
fn to_underlying(expr: Expr) -> Expr {
    let Some(e) = expr.ty.as_enum() else {
        return expr;
    };
    let ty = if expr.ty.is_nullable() {
        Type::nullable(e.underlying.clone())
    } else {
        e.underlying.clone()
    };
    expr.convert(ty)
}

/// A string constant whose text is an `Int32`.
fn int_text_constant(expr: &Expr) -> Option<i32> {
    match expr.constant_value() {
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Widens two integral operands to the biggest of their types.
fn widen_to_common_integral(left: Expr, right: Expr) -> (Expr, Expr) {
    if left.ty == right.ty {
        return (left, right);
    }
    let (l, r) = (left.ty.non_nullable(), right.ty.non_nullable());
    let Some(common) = BIGGEST_FIRST.iter().find(|t| *t == l || *t == r) else {
        return (left, right);
    };
    if !l.is_integral() || !r.is_integral() {
        return (left, right);
    }
    let target = if left.ty.is_nullable() || right.ty.is_nullable() {
        Type::nullable(common.clone())
    } else {
        common.clone()
    };
    let widen = |e: Expr| if e.ty == target { e } else { e.convert(target.clone()) };
    (widen(left), widen(right))
}

/// Reads a string or numeric constant as a member of enum type `ty`.
pub(super) fn enum_constant(ty: &Type, expr: &Expr, position: usize) -> ParseResult<Expr> {
    let Some(e) = ty.as_enum() else {
        return Err(ParseError::new(
            position,
            messages::expression_type_expected(&ty.to_string()),
        ));
    };
    let value = match expr.constant_value() {
        Some(Value::String(name)) => e.value_of(name),
        Some(other) => other.as_i128().and_then(|n| i64::try_from(n).ok()),
        None => None,
    };
    let value = value.ok_or_else(|| {
        let text = expr.constant_value().map(|v| v.to_string()).unwrap_or_default();
        ParseError::new(position, messages::enum_value_not_defined(&text, &e.name))
    })?;
    Ok(Expr::constant(
        Value::Enum {
            ty: e.clone(),
            value,
        },
        ty.clone(),
    ))
}

/// A string constant read through the invariant text conversion of
/// `target`. `None` when that does not apply.
fn convert_string_constant(
    expr: &Expr,
    target: &Type,
    position: usize,
) -> ParseResult<Option<Expr>> {
    let Some(Value::String(text)) = expr.constant_value() else {
        return Ok(None);
    };
    match Value::convert_from_invariant_string(text, target) {
        None => Ok(None),
        Some(Ok(value)) => Ok(Some(Expr::constant(value, target.clone()))),
        Some(Err(())) => Err(ParseError::new(
            position,
            messages::cannot_convert_value(&expr.ty.to_string(), &target.to_string()),
        )),
    }
}
