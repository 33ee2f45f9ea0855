//! Sequence operators called as methods on an enumerable receiver:
//! `Orders.Where(Total > 10)`, `Tags.Any()`, `Lines.Sum(Qty * Price)`.
//!
//! Arguments are parsed with a fresh `it` standing for one element; the
//! receiver's `it` becomes `parent`.

use crate::ast::{Callable, Expr, ExprKind, Parameter};
use crate::error::{messages, ParseError, ParseResult};
use crate::overload::{find_aggregate, Resolution};
use crate::parser::scope::ScopeFrame;
use crate::parser::Parser;
use crate::types::Type;

/// Operators whose arguments refer to the receiver's scope, not to an
/// element.
const OUTER_SCOPE: [&str; 4] = ["Contains", "ContainsKey", "Skip", "Take"];

/// Operators whose arguments are values rather than element lambdas.
const RAW_ARGUMENTS: [&str; 4] = ["Contains", "DefaultIfEmpty", "Skip", "Take"];

impl Parser<'_> {
    pub(super) fn parse_aggregate(
        &mut self,
        source: Expr,
        element: Type,
        name: &str,
        position: usize,
    ) -> ParseResult<Expr> {
        let outer = self.scope.current().clone();
        let inner = Parameter::new("", element.clone());
        let frame = if OUTER_SCOPE.iter().any(|n| n.eq_ignore_ascii_case(name)) {
            ScopeFrame {
                it: outer.it.clone(),
                parent: outer.it.clone(),
                root: outer.root.clone(),
            }
        } else {
            outer.nested(inner.clone())
        };
        let args = self.with_scope(frame, |p| p.parse_argument_list())?;

        let (aggregate, mut args) = match find_aggregate(name, &args) {
            Resolution::Found(aggregate, promoted) => (aggregate, promoted),
            _ => {
                return Err(ParseError::new(
                    position,
                    messages::no_applicable_aggregate(name),
                ))
            }
        };
        let name = aggregate.name;

        let mut type_args = vec![element.clone()];
        let body = args.first().map(|a| a.ty.clone());
        let ty = match name {
            "OfType" | "Cast" => {
                let target = self.resolve_type_argument(name, &args[0], position)?;
                args.clear();
                type_args = vec![target.clone()];
                Type::sequence(target)
            }
            "Where" | "Skip" | "Take" | "SkipWhile" | "TakeWhile" | "Distinct" | "Reverse"
            | "DefaultIfEmpty" => Type::sequence(element.clone()),
            "OrderBy" | "OrderByDescending" | "ThenBy" | "ThenByDescending" => {
                type_args.extend(args.iter().map(|a| a.ty.clone()));
                Type::sequence(element.clone())
            }
            "Any" | "All" | "Contains" => Type::Boolean,
            "Count" => Type::Int32,
            "LongCount" => Type::Int64,
            "First" | "FirstOrDefault" | "Last" | "LastOrDefault" | "Single" | "SingleOrDefault" => {
                element.clone()
            }
            "Min" | "Max" => {
                type_args.extend(args.iter().map(|a| a.ty.clone()));
                body.unwrap_or_else(|| element.clone())
            }
            "Sum" => {
                let ty = body.unwrap_or_else(|| element.clone());
                if !ty.is_numeric() {
                    return Err(ParseError::new(position, messages::no_applicable_aggregate(name)));
                }
                ty
            }
            "Average" => {
                let ty = body.unwrap_or_else(|| element.clone());
                if !ty.is_numeric() {
                    return Err(ParseError::new(position, messages::no_applicable_aggregate(name)));
                }
                let result = match ty.non_nullable() {
                    Type::Int32 | Type::Int64 => Type::Double,
                    other => other.clone(),
                };
                if ty.is_nullable() {
                    Type::nullable(result)
                } else {
                    result
                }
            }
            "Select" => {
                type_args.extend(args.iter().map(|a| a.ty.clone()));
                Type::sequence(body.unwrap_or_else(|| element.clone()))
            }
            "SelectMany" => {
                let inner_element = body.as_ref().and_then(Type::element_type).ok_or_else(|| {
                    ParseError::new(position, messages::no_applicable_aggregate(name))
                })?;
                type_args.push(inner_element.clone());
                Type::sequence(inner_element)
            }
            "GroupBy" => {
                type_args.extend(args.iter().map(|a| a.ty.clone()));
                let key = body.unwrap_or(Type::Object);
                let grouped = args.get(1).map(|a| a.ty.clone()).unwrap_or_else(|| element.clone());
                Type::sequence(Type::Grouping(Box::new(key), Box::new(grouped)))
            }
            "ToArray" => Type::array(element.clone()),
            "ToList" => Type::list(element.clone()),
            _ => return Err(ParseError::new(position, messages::no_applicable_aggregate(name))),
        };

        let args = if RAW_ARGUMENTS.contains(&name) {
            args
        } else {
            args.into_iter()
                .map(|arg| Expr::lambda(vec![inner.clone()], arg))
                .collect()
        };

        tracing::debug!(aggregate = name, %ty, "bound aggregate call");
        Ok(Expr::new(
            ExprKind::Call {
                instance: Some(Box::new(source)),
                callable: Callable::Aggregate(name.to_string()),
                type_args,
                args,
            },
            ty,
        ))
    }
}
