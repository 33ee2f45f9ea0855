//! Reserved words and the functions they introduce: `it`, `parent`,
//! `root`, `iif`, `isnull`, `np`, `is`, `as`, `cast` and `new`, plus the
//! literal keywords and every predefined type name.

use std::collections::HashMap;

use crate::ast::{BinaryOp, Expr, ExprKind, Parameter, TypeCheckMode};
use crate::config::ParsingConfig;
use crate::error::{messages, ParseError, ParseResult};
use crate::parser::scope::ScopeFrame;
use crate::parser::Parser;
use crate::resolver::{self, PREDEFINED_TYPES};
use crate::types::Type;
use crate::value::Value;

/// What a keyword denotes.
#[derive(Debug, Clone, PartialEq)]
pub enum Keyword {
    It,
    Parent,
    Root,
    Iif,
    IsNull,
    New,
    NullPropagation,
    Is,
    As,
    Cast,
    /// A predefined or registered custom type name
    Type(Type),
    /// `true`, `false` or `null`
    Constant(Value),
}

/// Builds the keyword table for `config`, keyed by case-folded name.
pub fn build_table(config: &ParsingConfig) -> HashMap<String, Keyword> {
    let mut table = HashMap::new();
    let mut insert = |name: &str, keyword: Keyword| {
        table.entry(config.fold_case(name)).or_insert(keyword);
    };

    insert("true", Keyword::Constant(Value::Boolean(true)));
    insert("false", Keyword::Constant(Value::Boolean(false)));
    insert("null", Keyword::Constant(Value::Null));
    insert("it", Keyword::It);
    insert("$", Keyword::It);
    insert("parent", Keyword::Parent);
    insert("^", Keyword::Parent);
    insert("root", Keyword::Root);
    insert("~", Keyword::Root);
    insert("iif", Keyword::Iif);
    insert("isnull", Keyword::IsNull);
    insert("new", Keyword::New);
    insert("np", Keyword::NullPropagation);
    insert("is", Keyword::Is);
    insert("as", Keyword::As);
    insert("cast", Keyword::Cast);

    for (name, ty) in PREDEFINED_TYPES.iter() {
        insert(name, Keyword::Type(ty.clone()));
    }
    for ty in config.custom_types() {
        insert(&ty.simple_name(), Keyword::Type(ty.clone()));
        insert(&ty.full_name(), Keyword::Type(ty));
    }

    tracing::debug!(entries = table.len(), "built keyword table");
    table
}

impl Parser<'_> {
    /// Parses the construct a keyword starts. The keyword token is current.
    pub(super) fn parse_keyword(&mut self, keyword: Keyword) -> ParseResult<Expr> {
        match keyword {
            Keyword::It => self.parse_context_parameter(|f| f.it.clone(), messages::NO_IT_IN_SCOPE),
            Keyword::Parent => {
                self.parse_context_parameter(|f| f.parent.clone(), messages::NO_PARENT_IN_SCOPE)
            }
            Keyword::Root => {
                self.parse_context_parameter(|f| f.root.clone(), messages::NO_ROOT_IN_SCOPE)
            }
            Keyword::Iif => self.parse_iif(),
            Keyword::IsNull => self.parse_isnull(),
            Keyword::New => self.parse_new(),
            Keyword::NullPropagation => self.parse_null_propagation(),
            Keyword::Is => self.parse_type_function("is", TypeCheckMode::Is),
            Keyword::As => self.parse_type_function("as", TypeCheckMode::As),
            Keyword::Cast => self.parse_type_function("cast", TypeCheckMode::Cast),
            Keyword::Type(ty) => {
                self.advance()?;
                self.parse_type_access(ty)
            }
            Keyword::Constant(Value::Null) => {
                self.advance()?;
                Ok(Expr::null_literal())
            }
            Keyword::Constant(value) => {
                self.advance()?;
                let ty = value.natural_type();
                Ok(Expr::constant(value, ty))
            }
        }
    }

    fn parse_context_parameter(
        &mut self,
        select: impl Fn(&ScopeFrame) -> Option<Parameter>,
        missing: &str,
    ) -> ParseResult<Expr> {
        let param = select(self.scope.current()).ok_or_else(|| self.error_here(missing))?;
        self.advance()?;
        Ok(Expr::parameter(&param))
    }

    fn parse_iif(&mut self) -> ParseResult<Expr> {
        let position = self.position();
        self.advance()?;
        let mut args = self.parse_argument_list()?;
        if args.len() != 3 {
            return Err(ParseError::new(position, messages::IIF_REQUIRES_THREE_ARGS));
        }
        let if_false = args.remove(2);
        let if_true = args.remove(1);
        let test = args.remove(0);
        self.generate_conditional(test, if_true, if_false, position)
    }

    fn parse_isnull(&mut self) -> ParseResult<Expr> {
        let position = self.position();
        self.advance()?;
        let mut args = self.parse_argument_list()?;
        if args.len() != 2 {
            return Err(ParseError::new(position, messages::ISNULL_REQUIRES_TWO_ARGS));
        }
        let right = args.remove(1);
        let left = args.remove(0);
        self.generate_coalesce(left, right, position)
    }

    /// `np(a.b.c)` and `np(a.b.c, default)`: guards every nullable receiver
    /// of the member chain with a null check.
    fn parse_null_propagation(&mut self) -> ParseResult<Expr> {
        let position = self.position();
        self.advance()?;
        let mut args = self.parse_argument_list()?;
        if args.is_empty() || args.len() > 2 {
            return Err(ParseError::new(position, messages::NP_REQUIRES_ONE_OR_TWO_ARGS));
        }
        let default = (args.len() == 2).then(|| args.remove(1));
        let target = args.remove(0);
        if !is_member_chain(&target) {
            return Err(ParseError::new(position, messages::NP_REQUIRES_MEMBER_EXPRESSION));
        }

        let mut checked: Vec<&Expr> = receivers(&target);
        checked.reverse();
        checked.push(&target);
        if checked.len() == 1 && !matches!(target.kind, ExprKind::Call { .. }) {
            return Ok(target);
        }
        let guards: Vec<Expr> = checked
            .into_iter()
            .filter(|e| !e.ty.is_value_type() || e.ty.is_nullable())
            .map(|e| {
                Expr::binary(
                    BinaryOp::NotEqual,
                    e.clone(),
                    Expr::typed_null(e.ty.clone()),
                    Type::Boolean,
                )
            })
            .collect();
        let mut guards = guards.into_iter();
        let Some(first) = guards.next() else {
            return Ok(target);
        };
        let test = guards.fold(first, |acc, guard| {
            Expr::binary(BinaryOp::AndAlso, acc, guard, Type::Boolean)
        });
        let if_false = default.unwrap_or_else(Expr::null_literal);
        self.generate_conditional(test, target, if_false, position)
    }

    /// `is(Type)`, `as(Type)`, `cast(Type)` against `it`, or with an
    /// explicit instance as first argument.
    fn parse_type_function(&mut self, name: &str, mode: TypeCheckMode) -> ParseResult<Expr> {
        let position = self.position();
        self.advance()?;
        let mut args = self.parse_argument_list()?;
        let (instance, type_arg) = match args.len() {
            1 => {
                let it = self
                    .scope
                    .current()
                    .it
                    .clone()
                    .ok_or_else(|| ParseError::new(position, messages::NO_IT_IN_SCOPE))?;
                (Expr::parameter(&it), args.remove(0))
            }
            2 => {
                let type_arg = args.remove(1);
                (args.remove(0), type_arg)
            }
            _ => {
                return Err(ParseError::new(
                    position,
                    messages::function_requires_one_or_two_args(name),
                ));
            }
        };
        let target = self.resolve_type_argument(name, &type_arg, position)?;

        let ty = match mode {
            TypeCheckMode::Is => Type::Boolean,
            TypeCheckMode::As => {
                if target.is_value_type() && !target.is_nullable() {
                    return Err(ParseError::new(
                        position,
                        messages::as_requires_reference_type(&target.to_string()),
                    ));
                }
                target.clone()
            }
            TypeCheckMode::Cast => target.clone(),
        };
        Ok(Expr::new(
            ExprKind::TypeCheck {
                instance: Box::new(instance),
                target,
                mode,
            },
            ty,
        ))
    }

    /// The type named by a string constant or given as a type literal.
    pub(super) fn resolve_type_argument(
        &self,
        function: &str,
        arg: &Expr,
        position: usize,
    ) -> ParseResult<Type> {
        match arg.constant_value() {
            Some(Value::String(name)) => {
                let frame = self.scope.current();
                resolver::resolve_type(self.config, name, &frame.types(), true)
                    .ok_or_else(|| ParseError::new(position, messages::type_not_found(name)))
            }
            Some(Value::Type(ty)) => Ok(ty.clone()),
            _ => Err(ParseError::new(
                position,
                messages::function_requires_type_argument(function),
            )),
        }
    }
}

fn is_member_chain(expr: &Expr) -> bool {
    matches!(
        &expr.kind,
        ExprKind::MemberAccess { instance: Some(_), .. }
            | ExprKind::Call { instance: Some(_), .. }
    )
}

/// Receivers of a member chain, nearest first, stopping at the first node
/// that is not itself a member access or call.
fn receivers(expr: &Expr) -> Vec<&Expr> {
    let mut list = vec![];
    let mut current = expr;
    while let ExprKind::MemberAccess { instance: Some(inner), .. }
    | ExprKind::Call { instance: Some(inner), .. } = &current.kind
    {
        if !is_member_chain(inner) {
            break;
        }
        list.push(inner.as_ref());
        current = inner;
    }
    list
}
