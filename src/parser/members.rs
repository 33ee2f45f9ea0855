//! Member, method, indexer and type access, and explicit conversions.

use crate::ast::{Callable, Construction, Expr, ExprKind, TokenKind};
use crate::error::{messages, ParseError, ParseResult};
use crate::overload::{
    find_constructor, find_indexer, find_method, has_method_named, is_aggregate_name, promote,
    Resolution,
};
use crate::parser::{literals, Parser};
use crate::resolver;
use crate::types::conversion::{is_assignable_from, is_explicitly_convertible};
use crate::types::{builtin, Type};
use crate::value::Value;

impl Parser<'_> {
    /// Parses `Name` or `Name(args)` after a receiver.
    ///
    /// `instance` is `None` for static access on `ty`; otherwise `ty` is
    /// the instance type.
    pub(super) fn parse_member_access(
        &mut self,
        ty: Option<Type>,
        instance: Option<Expr>,
    ) -> ParseResult<Expr> {
        let ty = match (ty, &instance) {
            (Some(ty), _) => ty,
            (None, Some(inst)) => inst.ty.clone(),
            (None, None) => return Err(self.error_here(messages::EXPRESSION_EXPECTED)),
        };
        let position = self.position();
        let id = self.identifier()?;
        self.advance()?;

        if self.check(TokenKind::Lambda) {
            let it = self.scope.current().it.clone();
            let receiver = instance.as_ref().and_then(Expr::as_parameter);
            if let Some(it) = it.filter(|it| receiver == Some(it)) {
                return self.with_internal(&id, it, |p| {
                    p.advance()?;
                    p.parse_conditional()
                });
            }
        }

        if self.check(TokenKind::OpenParen) {
            if let Some(inst) = &instance {
                if !ty.is_string() && !has_method_named(&ty, &id) && is_aggregate_name(&id) {
                    if let Some(element) = ty.element_type() {
                        return self.parse_aggregate(inst.clone(), element, &id, position);
                    }
                }
            }
            let args = self.parse_argument_list()?;
            return self.generate_method_call(&ty, instance, &id, args, position);
        }

        if instance.is_none() {
            if let Some(e) = ty.as_enum() {
                if let Some(value) = e.value_of(&id) {
                    return Ok(Expr::constant(
                        Value::Enum {
                            ty: e.clone(),
                            value,
                        },
                        ty,
                    ));
                }
            }
        }

        if let Some(inst) = &instance {
            if ty == Type::DynamicClass {
                return Ok(string_index(inst.clone(), &id, Type::Object));
            }
        }

        let is_static = instance.is_none();
        let member = builtin::members(&ty)
            .into_iter()
            .find(|m| m.is_static == is_static && self.config.names_equal(&m.name, &id));
        if let Some(member) = member {
            return Ok(Expr::member(instance, member.name, member.ty));
        }

        if let Some(inst) = &instance {
            if !self.config.disable_member_access_to_index_accessor_fallback {
                let by_name = builtin::indexers(&ty)
                    .into_iter()
                    .find(|ix| ix.params == [Type::String]);
                if let Some(indexer) = by_name {
                    tracing::trace!(member = %id, %ty, "member resolved through string indexer");
                    return Ok(string_index(inst.clone(), &id, indexer.ty));
                }
            }
        }

        Err(ParseError::new(
            position,
            messages::unknown_property_or_field(&id, &ty.to_string()),
        ))
    }

    fn generate_method_call(
        &self,
        ty: &Type,
        instance: Option<Expr>,
        name: &str,
        args: Vec<Expr>,
        position: usize,
    ) -> ParseResult<Expr> {
        let type_name = ty.to_string();
        match find_method(ty, name, instance.is_none(), &args) {
            Resolution::NotFound => Err(ParseError::new(
                position,
                messages::no_applicable_method(name, &type_name),
            )),
            Resolution::Ambiguous(_) => Err(ParseError::new(
                position,
                messages::ambiguous_method_invocation(name, &type_name),
            )),
            Resolution::Found(method, promoted) => {
                let accessible = resolver::is_predefined_name(self.config, &method.declaring_type)
                    || method
                        .return_type
                        .as_ref()
                        .is_some_and(|rt| resolver::is_predefined(self.config, rt));
                if !accessible {
                    return Err(ParseError::new(
                        position,
                        messages::methods_are_inaccessible(&method.declaring_type),
                    ));
                }
                let Some(return_type) = method.return_type.clone() else {
                    return Err(ParseError::new(
                        position,
                        messages::method_is_void(name, &type_name),
                    ));
                };
                Ok(Expr::new(
                    ExprKind::Call {
                        instance: instance.map(Box::new),
                        callable: Callable::Method(method),
                        type_args: vec![],
                        args: promoted,
                    },
                    return_type,
                ))
            }
        }
    }

    /// `expr[args]`
    pub(super) fn parse_element_access(&mut self, expr: Expr) -> ParseResult<Expr> {
        let position = self.position();
        self.expect(TokenKind::OpenBracket, messages::SYNTAX_ERROR)?;
        let args = self.parse_arguments()?;
        self.expect(TokenKind::CloseBracket, messages::CLOSE_BRACKET_OR_COMMA_EXPECTED)?;

        if let Type::Array(element) = &expr.ty {
            if args.len() != 1 {
                return Err(ParseError::new(position, messages::CANNOT_INDEX_MULTI_DIM_ARRAY));
            }
            let index = promote(&args[0], &Type::Int32, true, false)
                .ok_or_else(|| ParseError::new(position, messages::INVALID_INDEX))?;
            let ty = (**element).clone();
            return Ok(Expr::new(
                ExprKind::IndexAccess {
                    instance: Box::new(expr),
                    args: vec![index],
                },
                ty,
            ));
        }

        match find_indexer(&expr.ty, &args) {
            Resolution::Found(indexer, promoted) => Ok(Expr::new(
                ExprKind::IndexAccess {
                    instance: Box::new(expr),
                    args: promoted,
                },
                indexer.ty,
            )),
            Resolution::NotFound => Err(ParseError::new(
                position,
                messages::no_applicable_indexer(&expr.ty.to_string()),
            )),
            Resolution::Ambiguous(_) => Err(ParseError::new(
                position,
                messages::ambiguous_indexer_invocation(&expr.ty.to_string()),
            )),
        }
    }

    /// What follows a type name: `?`, then a conversion or constructor call
    /// `T(args)`, a string shorthand `T"text"`, a static member `T.Name`,
    /// or nothing (a type literal).
    pub(super) fn parse_type_access(&mut self, ty: Type) -> ParseResult<Expr> {
        let position = self.position();
        let mut ty = ty;
        if self.check(TokenKind::Question) {
            if !ty.is_value_type() || ty.is_nullable() {
                return Err(self.error_here(messages::type_has_no_nullable_form(&ty.to_string())));
            }
            ty = Type::nullable(ty);
            self.advance()?;
        }

        if self.check(TokenKind::StringLiteral) {
            let text = literals::parse_string_literal(&self.current_token)?;
            self.advance()?;
            return self.try_generate_conversion(text, &ty, position);
        }

        if self.check(TokenKind::OpenParen) {
            let args = self.parse_argument_list()?;
            return self.generate_construction(ty, args, position);
        }

        if self.check(TokenKind::Dot) {
            self.advance()?;
            return self.parse_member_access(Some(ty), None);
        }

        Ok(Expr::constant(Value::Type(ty), Type::SystemType))
    }

    /// `T(args)`: a conversion for a single constant or value-typed
    /// argument, otherwise a constructor call.
    pub(super) fn generate_construction(
        &self,
        ty: Type,
        mut args: Vec<Expr>,
        position: usize,
    ) -> ParseResult<Expr> {
        if args.len() == 1 {
            let arg = &args[0];
            if arg.is_constant() || (ty.is_value_type() && arg.ty.is_value_type()) {
                return self.try_generate_conversion(args.remove(0), &ty, position);
            }
        }

        match find_constructor(&ty, &args) {
            Resolution::Found(_, promoted) => {
                Ok(Expr::new(ExprKind::New(Construction::Constructor(promoted)), ty))
            }
            Resolution::NotFound if args.len() == 1 => {
                self.try_generate_conversion(args.remove(0), &ty, position)
            }
            Resolution::NotFound => Err(ParseError::new(
                position,
                messages::no_matching_constructor(&ty.to_string()),
            )),
            Resolution::Ambiguous(_) => Err(ParseError::new(
                position,
                messages::ambiguous_constructor_invocation(&ty.to_string()),
            )),
        }
    }

    /// Explicit conversion of `expr` to `ty`, as written `ty(expr)`.
    pub(super) fn try_generate_conversion(
        &self,
        expr: Expr,
        ty: &Type,
        position: usize,
    ) -> ParseResult<Expr> {
        let source = expr.ty.clone();
        if source == *ty {
            return Ok(expr);
        }
        if expr.is_null_literal() && (!ty.is_value_type() || ty.is_nullable()) {
            return Ok(Expr::typed_null(ty.clone()));
        }

        if source.is_value_type() && ty.is_value_type() {
            let numeric_like = |t: &Type| t.is_numeric() || t.is_enum();
            if (source.is_nullable() || ty.is_nullable()) && source.non_nullable() == ty.non_nullable() {
                return Ok(expr.convert(ty.clone()));
            }
            if numeric_like(&source) && numeric_like(ty) {
                return Ok(expr.convert(ty.clone()));
            }
        }

        if is_assignable_from(ty, &source) || is_assignable_from(&source, ty) {
            return Ok(expr.convert(ty.clone()));
        }

        if let Some(Value::String(text)) = expr.constant_value() {
            match Value::convert_from_invariant_string(text, ty) {
                Some(Ok(value)) => return Ok(Expr::constant(value, ty.clone())),
                Some(Err(())) => {
                    return Err(ParseError::new(
                        position,
                        messages::cannot_convert_value(&source.to_string(), &ty.to_string()),
                    ))
                }
                None => {}
            }
        }

        if is_explicitly_convertible(&source, ty) {
            return Ok(expr.convert(ty.clone()));
        }

        Err(ParseError::new(
            position,
            messages::cannot_convert_value(&source.to_string(), &ty.to_string()),
        ))
    }

    /// `@0(a, b)` on a lambda-typed value. The `(` is current.
    pub(super) fn parse_lambda_invocation(&mut self, lambda: Expr) -> ParseResult<Expr> {
        let position = self.position();
        let Type::Lambda(params, result) = lambda.ty.clone() else {
            return Err(ParseError::new(position, messages::ARGUMENT_INCOMPATIBLE));
        };
        let args = self.parse_argument_list()?;
        if args.len() != params.len() {
            return Err(ParseError::new(
                position,
                messages::argument_count_mismatch(params.len()),
            ));
        }
        let promoted = args
            .iter()
            .zip(&params)
            .map(|(arg, param)| promote(arg, param, true, false))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| ParseError::new(position, messages::ARGUMENT_INCOMPATIBLE))?;
        Ok(Expr::new(
            ExprKind::Call {
                instance: Some(Box::new(lambda)),
                callable: Callable::Invoke,
                type_args: vec![],
                args: promoted,
            },
            *result,
        ))
    }
}

/// `instance["name"]`
fn string_index(instance: Expr, name: &str, ty: Type) -> Expr {
    Expr::new(
        ExprKind::IndexAccess {
            instance: Box::new(instance),
            args: vec![Expr::constant(Value::String(name.to_string()), Type::String)],
        },
        ty,
    )
}
