//! `new(...)` projections, `new T(...)` and array initializers.

use crate::ast::{Construction, Expr, ExprKind, TokenKind};
use crate::error::{messages, ParseError, ParseResult};
use crate::overload::promote;
use crate::parser::Parser;
use crate::resolver;
use crate::types::{builtin, Type};
use crate::value::Value;

impl Parser<'_> {
    /// Parses everything after the `new` keyword, which is current.
    ///
    /// ```text
    /// new(Name, Age * 2 as Double)
    /// new Point(X as X, Y as Y)
    /// new[] { 1, 2, 3 }
    /// new Int32[] { 1, 2 }
    /// ```
    pub(super) fn parse_new(&mut self) -> ParseResult<Expr> {
        self.advance()?;
        let position = self.position();
        if !matches!(
            self.current_token.kind,
            TokenKind::OpenParen
                | TokenKind::OpenCurlyParen
                | TokenKind::OpenBracket
                | TokenKind::Identifier
        ) {
            return Err(self.error_here(messages::OPEN_PAREN_OR_IDENTIFIER_EXPECTED));
        }

        let mut new_type = None;
        if self.check(TokenKind::Identifier) {
            let mut name = self.current_token.text.clone();
            self.advance()?;
            while self.check(TokenKind::Dot) {
                self.advance()?;
                name.push('.');
                name.push_str(&self.identifier()?);
                self.advance()?;
            }
            let frame = self.scope.current();
            let ty = resolver::resolve_type(self.config, &name, &frame.types(), false)
                .ok_or_else(|| ParseError::new(position, messages::type_not_found(&name)))?;
            if !matches!(
                self.current_token.kind,
                TokenKind::OpenParen | TokenKind::OpenBracket | TokenKind::OpenCurlyParen
            ) {
                return Err(self.error_here(messages::OPEN_PAREN_EXPECTED));
            }
            new_type = Some(ty);
        }

        let mut array_initializer = false;
        if self.check(TokenKind::OpenBracket) {
            self.advance()?;
            self.expect(TokenKind::CloseBracket, messages::CLOSE_BRACKET_EXPECTED)?;
            self.validate(TokenKind::OpenCurlyParen, messages::OPEN_CURLY_EXPECTED)?;
            array_initializer = true;
        }
        self.advance()?;

        let mut items: Vec<(Option<String>, Expr, usize)> = vec![];
        while !self.check(TokenKind::CloseParen) && !self.check(TokenKind::CloseCurlyParen) {
            let expr_position = self.position();
            let expr = self.parse_conditional()?;
            let mut name = None;
            if !array_initializer {
                if self.current_token.is_identifier("as") {
                    self.advance()?;
                    name = Some(self.identifier()?);
                    self.advance()?;
                } else if new_type.is_none() {
                    name = Some(inferred_name(&expr).ok_or_else(|| {
                        ParseError::new(expr_position, messages::MISSING_AS_CLAUSE)
                    })?);
                }
            }
            items.push((name, expr, expr_position));
            if !self.check(TokenKind::Comma) {
                break;
            }
            self.advance()?;
        }
        if !self.check(TokenKind::CloseParen) && !self.check(TokenKind::CloseCurlyParen) {
            return Err(self.error_here(messages::CLOSE_PAREN_OR_COMMA_EXPECTED));
        }
        self.advance()?;

        if array_initializer {
            let elements = items.into_iter().map(|(_, e, _)| e).collect();
            return create_array(elements, new_type, position);
        }

        for (i, (name, _, expr_position)) in items.iter().enumerate() {
            let Some(name) = name else { continue };
            let repeated = items[..i]
                .iter()
                .any(|(other, _, _)| other.as_deref().is_some_and(|o| self.config.names_equal(o, name)));
            if repeated {
                return Err(ParseError::new(*expr_position, messages::duplicate_member(name)));
            }
        }

        match new_type {
            None => {
                let members: Vec<(String, Expr)> = items
                    .into_iter()
                    .filter_map(|(name, expr, _)| name.map(|n| (n, expr)))
                    .collect();
                let ty = if self.config.use_dynamic_object_class_for_anonymous_types {
                    Type::DynamicClass
                } else {
                    self.config.anonymous_type(
                        members.iter().map(|(n, e)| (n.clone(), e.ty.clone())).collect(),
                    )
                };
                Ok(Expr::new(ExprKind::New(Construction::Anonymous(members)), ty))
            }
            Some(ty) => {
                let named = items.iter().filter(|(n, _, _)| n.is_some()).count();
                if named == 0 {
                    let args = items.into_iter().map(|(_, e, _)| e).collect();
                    return self.generate_construction(ty, args, position);
                }
                if named != items.len() {
                    let missing = items
                        .iter()
                        .find(|(n, _, _)| n.is_none())
                        .map_or(position, |(_, _, p)| *p);
                    return Err(ParseError::new(missing, messages::MISSING_AS_CLAUSE));
                }
                self.generate_bindings(ty, items)
            }
        }
    }

    /// `new T(expr as Member, ...)`: assigns each named member of `ty`.
    fn generate_bindings(
        &self,
        ty: Type,
        items: Vec<(Option<String>, Expr, usize)>,
    ) -> ParseResult<Expr> {
        let members = builtin::members(&ty);
        let mut bindings = Vec::with_capacity(items.len());
        for (name, expr, expr_position) in items {
            let name = name.unwrap_or_default();
            let member = members
                .iter()
                .find(|m| !m.is_static && self.config.names_equal(&m.name, &name))
                .ok_or_else(|| {
                    ParseError::new(
                        expr_position,
                        messages::unknown_property_or_field(&name, &ty.to_string()),
                    )
                })?;
            let value = promote(&expr, &member.ty, true, true).ok_or_else(|| {
                ParseError::new(
                    expr_position,
                    messages::cannot_convert_value(&expr.ty.to_string(), &member.ty.to_string()),
                )
            })?;
            bindings.push((member.name.clone(), value));
        }
        Ok(Expr::new(ExprKind::New(Construction::Bindings(bindings)), ty))
    }
}

/// The member name a projection takes when written without `as`.
fn inferred_name(expr: &Expr) -> Option<String> {
    match &expr.kind {
        ExprKind::MemberAccess { member, .. } => Some(member.clone()),
        ExprKind::IndexAccess { args, .. } if args.len() == 1 => match args[0].constant_value() {
            Some(Value::String(name)) => Some(name.clone()),
            _ => None,
        },
        _ => None,
    }
}

fn create_array(elements: Vec<Expr>, element_type: Option<Type>, position: usize) -> ParseResult<Expr> {
    let (element_type, elements) = match element_type {
        Some(ty) => {
            let promoted = elements
                .into_iter()
                .map(|e| {
                    promote(&e, &ty, true, true).ok_or_else(|| {
                        ParseError::new(
                            position,
                            messages::cannot_convert_value(&e.ty.to_string(), &ty.to_string()),
                        )
                    })
                })
                .collect::<ParseResult<Vec<_>>>()?;
            (ty, promoted)
        }
        None => {
            let common = elements
                .first()
                .map(|e| e.ty.clone())
                .filter(|t| elements.iter().all(|e| e.ty == *t));
            match common {
                Some(ty) => (ty, elements),
                None => {
                    let boxed = elements
                        .into_iter()
                        .map(|e| if e.ty == Type::Object { e } else { e.convert(Type::Object) })
                        .collect();
                    (Type::Object, boxed)
                }
            }
        }
    };
    Ok(Expr::new(
        ExprKind::New(Construction::Array(elements)),
        Type::array(element_type),
    ))
}
