//! Reference evaluator for compiled expression trees.
//!
//! Walks a typed tree against [`Value`]s. It exists to check compiled trees
//! end to end (tests, the `eval` command); sequence operators run eagerly
//! over in-memory arrays.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BTreeMap;

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, TimeDelta, Timelike};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::ast::{
    BinaryOp, Callable, Construction, Expr, ExprKind, Ordering, Parameter, TypeCheckMode, UnaryOp,
};
use crate::types::{Method, Type};
use crate::value::Value;

/// Parameter bindings visible while evaluating.
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    bindings: Vec<(Parameter, Value)>,
}

impl EvalContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `param` to `value`.
    pub fn bind(mut self, param: &Parameter, value: Value) -> Self {
        self.bindings.push((param.clone(), value));
        self
    }

    fn lookup(&self, param: &Parameter) -> Option<&Value> {
        self.bindings
            .iter()
            .rev()
            .find(|(p, _)| p == param)
            .map(|(_, v)| v)
    }
}

/// Errors that can occur during evaluation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// Operation applied to a value of the wrong shape
    #[error("Type error: {0}")]
    TypeError(String),

    #[error("Parameter '{0}' is not bound")]
    UnboundParameter(String),

    #[error("Null reference: {0}")]
    NullReference(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Arithmetic overflow in {0}")]
    Overflow(String),

    #[error("Index {0} is out of range")]
    IndexOutOfRange(i128),

    #[error("Sequence contains no elements: {0}")]
    EmptySequence(String),

    /// A node or operation the reference evaluator does not implement
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

type EvalResult<T> = Result<T, EvalError>;

/// The tree-walking evaluator.
#[derive(Debug, Default)]
pub struct Evaluator;

impl Evaluator {
    pub fn new() -> Self {
        Self
    }

    /// Invokes a compiled lambda with one value per parameter.
    ///
    /// # Examples
    ///
    /// ```
    /// use dynlinq::{parse_lambda, Evaluator, ParsingConfig, Value};
    /// use dynlinq::types::Type;
    ///
    /// let config = ParsingConfig::default();
    /// let lambda = parse_lambda(&config, Type::Int32, None, "it * 2 + 1", vec![]).unwrap();
    /// let result = Evaluator::new().invoke(&lambda, &[Value::Int32(20)]).unwrap();
    /// assert_eq!(result, Value::Int32(41));
    /// ```
    pub fn invoke(&self, lambda: &Expr, args: &[Value]) -> EvalResult<Value> {
        self.invoke_in(lambda, args, &EvalContext::new())
    }

    /// Sorts `items` by an ordering list compiled over `it`.
    pub fn apply_ordering(
        &self,
        items: Vec<Value>,
        it: &Parameter,
        orderings: &[Ordering],
    ) -> EvalResult<Vec<Value>> {
        let mut keyed = items
            .into_iter()
            .map(|item| {
                let ctx = EvalContext::new().bind(it, item.clone());
                let keys = orderings
                    .iter()
                    .map(|o| self.evaluate(&o.selector, &ctx))
                    .collect::<EvalResult<Vec<_>>>()?;
                Ok((keys, item))
            })
            .collect::<EvalResult<Vec<_>>>()?;

        keyed.sort_by(|(a, _), (b, _)| {
            for (i, ordering) in orderings.iter().enumerate() {
                let ord = compare(&a[i], &b[i]).unwrap_or(CmpOrdering::Equal);
                let ord = if ordering.ascending { ord } else { ord.reverse() };
                if ord != CmpOrdering::Equal {
                    return ord;
                }
            }
            CmpOrdering::Equal
        });
        Ok(keyed.into_iter().map(|(_, item)| item).collect())
    }

    pub fn evaluate(&self, expr: &Expr, ctx: &EvalContext) -> EvalResult<Value> {
        match &expr.kind {
            ExprKind::Constant { value, .. } => Ok(value.clone()),
            ExprKind::Parameter(p) => ctx
                .lookup(p)
                .cloned()
                .ok_or_else(|| EvalError::UnboundParameter(parameter_name(p))),
            ExprKind::MemberAccess {
                instance: None,
                member,
            } => static_member(member, &expr.ty),
            ExprKind::MemberAccess {
                instance: Some(instance),
                member,
            } => {
                let value = self.evaluate(instance, ctx)?;
                instance_member(&value, &instance.ty, member)
            }
            ExprKind::IndexAccess { instance, args } => {
                let target = self.evaluate(instance, ctx)?;
                let keys = self.evaluate_all(args, ctx)?;
                index(&target, &keys)
            }
            ExprKind::Call {
                instance,
                callable,
                args,
                ..
            } => match callable {
                Callable::Method(method) => {
                    let receiver = instance
                        .as_ref()
                        .map(|i| self.evaluate(i, ctx))
                        .transpose()?;
                    let values = self.evaluate_all(args, ctx)?;
                    call_method(method, receiver, &values)
                }
                Callable::Aggregate(name) => {
                    let Some(source) = instance else {
                        return Err(EvalError::TypeError(format!("{} without a source", name)));
                    };
                    let source = self.evaluate(source, ctx)?;
                    self.aggregate(name, &source, args, &expr.ty, ctx)
                }
                Callable::Invoke => {
                    let Some(lambda) = instance else {
                        return Err(EvalError::TypeError("invocation without a lambda".into()));
                    };
                    let values = self.evaluate_all(args, ctx)?;
                    self.invoke_in(lambda, &values, ctx)
                }
            },
            ExprKind::Binary {
                op, left, right, ..
            } => self.binary(*op, left, right, &expr.ty, ctx),
            ExprKind::Unary { op, operand } => {
                let value = self.evaluate(operand, ctx)?;
                unary(*op, value, &expr.ty)
            }
            ExprKind::Conditional {
                test,
                if_true,
                if_false,
            } => match self.evaluate(test, ctx)? {
                Value::Boolean(true) => self.evaluate(if_true, ctx),
                Value::Boolean(false) => self.evaluate(if_false, ctx),
                other => Err(EvalError::TypeError(format!(
                    "conditional test evaluated to {}",
                    other
                ))),
            },
            ExprKind::Coalesce { left, right } => {
                let value = self.evaluate(left, ctx)?;
                if value.is_null() {
                    self.evaluate(right, ctx)
                } else {
                    Ok(value)
                }
            }
            ExprKind::Lambda { .. } => Err(EvalError::Unsupported(
                "a lambda is not a value; invoke it instead".into(),
            )),
            ExprKind::New(construction) => match construction {
                Construction::Anonymous(members) | Construction::Bindings(members) => {
                    let mut object = BTreeMap::new();
                    for (name, member) in members {
                        object.insert(name.clone(), self.evaluate(member, ctx)?);
                    }
                    Ok(Value::Object(object))
                }
                Construction::Array(items) => Ok(Value::Array(self.evaluate_all(items, ctx)?)),
                Construction::Constructor(_) => Err(EvalError::Unsupported(format!(
                    "constructor of {}",
                    expr.ty
                ))),
            },
            ExprKind::TypeCheck {
                instance,
                target,
                mode,
            } => {
                let value = self.evaluate(instance, ctx)?;
                let is = runtime_is(&value, target);
                match mode {
                    TypeCheckMode::Is => Ok(Value::Boolean(is)),
                    TypeCheckMode::As if is => Ok(value),
                    TypeCheckMode::As => Ok(Value::Null),
                    TypeCheckMode::Cast if is => Ok(value),
                    TypeCheckMode::Cast => convert(value, target),
                }
            }
        }
    }

    fn evaluate_all(&self, exprs: &[Expr], ctx: &EvalContext) -> EvalResult<Vec<Value>> {
        exprs.iter().map(|e| self.evaluate(e, ctx)).collect()
    }

    fn invoke_in(&self, lambda: &Expr, args: &[Value], ctx: &EvalContext) -> EvalResult<Value> {
        let ExprKind::Lambda { params, body } = &lambda.kind else {
            return Err(EvalError::TypeError(format!("{} is not invocable", lambda.ty)));
        };
        if params.len() != args.len() {
            return Err(EvalError::TypeError(format!(
                "lambda expects {} argument(s), got {}",
                params.len(),
                args.len()
            )));
        }
        let mut inner = ctx.clone();
        for (param, arg) in params.iter().zip(args) {
            inner = inner.bind(param, arg.clone());
        }
        self.evaluate(body, &inner)
    }

    fn binary(
        &self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        ty: &Type,
        ctx: &EvalContext,
    ) -> EvalResult<Value> {
        match op {
            // three-valued for nullable booleans
            BinaryOp::AndAlso => {
                let l = self.evaluate(left, ctx)?;
                if l == Value::Boolean(false) {
                    return Ok(l);
                }
                let r = self.evaluate(right, ctx)?;
                Ok(match (l, r) {
                    (_, Value::Boolean(false)) => Value::Boolean(false),
                    (Value::Boolean(true), Value::Boolean(true)) => Value::Boolean(true),
                    _ => Value::Null,
                })
            }
            BinaryOp::OrElse => {
                let l = self.evaluate(left, ctx)?;
                if l == Value::Boolean(true) {
                    return Ok(l);
                }
                let r = self.evaluate(right, ctx)?;
                Ok(match (l, r) {
                    (_, Value::Boolean(true)) => Value::Boolean(true),
                    (Value::Boolean(false), Value::Boolean(false)) => Value::Boolean(false),
                    _ => Value::Null,
                })
            }
            _ => {
                let l = self.evaluate(left, ctx)?;
                let r = self.evaluate(right, ctx)?;
                apply_binary(op, &l, &r, ty)
            }
        }
    }

    fn apply(&self, lambda: &Expr, item: &Value, ctx: &EvalContext) -> EvalResult<Value> {
        self.invoke_in(lambda, std::slice::from_ref(item), ctx)
    }

    fn filtered(
        &self,
        items: Vec<Value>,
        predicate: Option<&Expr>,
        ctx: &EvalContext,
    ) -> EvalResult<Vec<Value>> {
        let Some(predicate) = predicate else {
            return Ok(items);
        };
        let mut kept = Vec::new();
        for item in items {
            if self.apply(predicate, &item, ctx)? == Value::Boolean(true) {
                kept.push(item);
            }
        }
        Ok(kept)
    }

    fn projected(
        &self,
        items: Vec<Value>,
        selector: Option<&Expr>,
        ctx: &EvalContext,
    ) -> EvalResult<Vec<Value>> {
        match selector {
            Some(selector) => items.iter().map(|i| self.apply(selector, i, ctx)).collect(),
            None => Ok(items),
        }
    }

    fn aggregate(
        &self,
        name: &str,
        source: &Value,
        args: &[Expr],
        ty: &Type,
        ctx: &EvalContext,
    ) -> EvalResult<Value> {
        let items = sequence(source, name)?;
        let lambda = args.first();
        tracing::trace!(aggregate = name, items = items.len(), "evaluating aggregate");

        match name {
            "Where" => Ok(Value::Array(self.filtered(items, lambda, ctx)?)),
            "Select" => Ok(Value::Array(self.projected(items, lambda, ctx)?)),
            "SelectMany" => {
                let mut flat = Vec::new();
                for inner in self.projected(items, lambda, ctx)? {
                    flat.extend(sequence(&inner, name)?);
                }
                Ok(Value::Array(flat))
            }
            "Any" => Ok(Value::Boolean(!self.filtered(items, lambda, ctx)?.is_empty())),
            "All" => {
                let total = items.len();
                Ok(Value::Boolean(self.filtered(items, lambda, ctx)?.len() == total))
            }
            "Count" => {
                let n = self.filtered(items, lambda, ctx)?.len();
                i32::try_from(n)
                    .map(Value::Int32)
                    .map_err(|_| EvalError::Overflow(name.into()))
            }
            "LongCount" => {
                let n = self.filtered(items, lambda, ctx)?.len();
                i64::try_from(n)
                    .map(Value::Int64)
                    .map_err(|_| EvalError::Overflow(name.into()))
            }
            "Sum" => {
                let target = ty.non_nullable();
                let mut total = Value::from_i128(target, 0)
                    .ok_or_else(|| EvalError::TypeError(format!("cannot sum {}", ty)))?;
                for value in self.projected(items, lambda, ctx)? {
                    if value.is_null() {
                        continue;
                    }
                    let value = convert(value, target)?;
                    total = apply_binary(BinaryOp::Add, &total, &value, target)?;
                }
                Ok(total)
            }
            "Average" => {
                let values: Vec<Value> = self
                    .projected(items, lambda, ctx)?
                    .into_iter()
                    .filter(|v| !v.is_null())
                    .collect();
                if values.is_empty() {
                    return empty_result(name, ty);
                }
                let count = values.len();
                if *ty.non_nullable() == Type::Decimal {
                    let mut sum = Decimal::ZERO;
                    for v in &values {
                        let d = v.as_decimal().ok_or_else(|| not_numeric(v))?;
                        sum = sum
                            .checked_add(d)
                            .ok_or_else(|| EvalError::Overflow(name.into()))?;
                    }
                    return Ok(Value::Decimal(sum / Decimal::from(count)));
                }
                let mut sum = 0.0;
                for v in &values {
                    sum += v.as_f64().ok_or_else(|| not_numeric(v))?;
                }
                let mean = Value::Double(sum / count as f64);
                convert(mean, ty)
            }
            "Min" | "Max" => {
                let values: Vec<Value> = self
                    .projected(items, lambda, ctx)?
                    .into_iter()
                    .filter(|v| !v.is_null())
                    .collect();
                let wanted = if name == "Min" {
                    CmpOrdering::Less
                } else {
                    CmpOrdering::Greater
                };
                let mut values = values.into_iter();
                let Some(first) = values.next() else {
                    return empty_result(name, ty);
                };
                Ok(values.fold(first, |best, v| {
                    if compare(&v, &best) == Some(wanted) { v } else { best }
                }))
            }
            "First" | "FirstOrDefault" | "Last" | "LastOrDefault" | "Single" | "SingleOrDefault" => {
                let mut matches = self.filtered(items, lambda, ctx)?;
                if name.starts_with("Single") && matches.len() > 1 {
                    return Err(EvalError::TypeError(
                        "sequence contains more than one matching element".into(),
                    ));
                }
                let found = if name.starts_with("Last") {
                    matches.pop()
                } else {
                    matches.into_iter().next()
                };
                match found {
                    Some(v) => Ok(v),
                    None if name.ends_with("OrDefault") => Ok(default_value(ty)),
                    None => Err(EvalError::EmptySequence(name.into())),
                }
            }
            "Contains" => {
                let Some(arg) = lambda else {
                    return Err(EvalError::TypeError("Contains needs a value".into()));
                };
                let needle = self.evaluate(arg, ctx)?;
                Ok(Value::Boolean(items.iter().any(|i| values_equal(i, &needle))))
            }
            "Take" | "Skip" => {
                let Some(arg) = lambda else {
                    return Err(EvalError::TypeError(format!("{} needs a count", name)));
                };
                let n = self.evaluate(arg, ctx)?;
                let n = n.as_i128().ok_or_else(|| not_numeric(&n))?;
                let n = usize::try_from(n.max(0)).unwrap_or(usize::MAX).min(items.len());
                let kept = if name == "Take" {
                    items[..n].to_vec()
                } else {
                    items[n..].to_vec()
                };
                Ok(Value::Array(kept))
            }
            "OrderBy" | "OrderByDescending" => {
                let keys = self.projected(items.clone(), lambda, ctx)?;
                let mut keyed: Vec<(Value, Value)> = keys.into_iter().zip(items).collect();
                keyed.sort_by(|(a, _), (b, _)| {
                    let ord = compare(a, b).unwrap_or(CmpOrdering::Equal);
                    if name == "OrderBy" { ord } else { ord.reverse() }
                });
                Ok(Value::Array(keyed.into_iter().map(|(_, v)| v).collect()))
            }
            "Distinct" => {
                let mut unique: Vec<Value> = Vec::new();
                for item in items {
                    if !unique.iter().any(|u| values_equal(u, &item)) {
                        unique.push(item);
                    }
                }
                Ok(Value::Array(unique))
            }
            "Reverse" => Ok(Value::Array(items.into_iter().rev().collect())),
            "ToArray" | "ToList" => Ok(Value::Array(items)),
            "GroupBy" => {
                let keys = self.projected(items.clone(), lambda, ctx)?;
                let elements = self.projected(items, args.get(1), ctx)?;
                let mut groups: Vec<(Value, Vec<Value>)> = Vec::new();
                for (key, element) in keys.into_iter().zip(elements) {
                    match groups.iter_mut().find(|(k, _)| values_equal(k, &key)) {
                        Some((_, members)) => members.push(element),
                        None => groups.push((key, vec![element])),
                    }
                }
                Ok(Value::Array(
                    groups
                        .into_iter()
                        .map(|(key, members)| {
                            Value::Object(
                                [
                                    ("Key".to_string(), key),
                                    (GROUP_ELEMENTS.to_string(), Value::Array(members)),
                                ]
                                .into_iter()
                                .collect(),
                            )
                        })
                        .collect(),
                ))
            }
            _ => Err(EvalError::Unsupported(format!("aggregate '{}'", name))),
        }
    }
}

/// Where a group value keeps its members.
const GROUP_ELEMENTS: &str = "Elements";

fn parameter_name(p: &Parameter) -> String {
    if p.name().is_empty() {
        "it".to_string()
    } else {
        p.name().to_string()
    }
}

fn not_numeric(value: &Value) -> EvalError {
    EvalError::TypeError(format!("{} is not numeric", value))
}

fn empty_result(name: &str, ty: &Type) -> EvalResult<Value> {
    if !ty.is_value_type() || ty.is_nullable() {
        Ok(Value::Null)
    } else {
        Err(EvalError::EmptySequence(name.into()))
    }
}

/// Items of a sequence value: arrays, groups and strings.
fn sequence(value: &Value, operation: &str) -> EvalResult<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items.clone()),
        Value::Object(map) => match map.get(GROUP_ELEMENTS) {
            Some(Value::Array(items)) => Ok(items.clone()),
            _ => Err(EvalError::TypeError(format!("{} requires a sequence", operation))),
        },
        Value::String(s) => Ok(s.chars().map(Value::Char).collect()),
        Value::Null => Err(EvalError::NullReference(format!("{} on a null sequence", operation))),
        other => Err(EvalError::TypeError(format!(
            "{} requires a sequence, got {}",
            operation, other
        ))),
    }
}

/// The value `FirstOrDefault` and friends produce for an empty sequence.
pub fn default_value(ty: &Type) -> Value {
    if !ty.is_value_type() || ty.is_nullable() {
        return Value::Null;
    }
    match ty {
        Type::Boolean => Value::Boolean(false),
        Type::DateTime => min_date_time().map_or(Value::Null, Value::DateTime),
        Type::TimeSpan => Value::TimeSpan(TimeDelta::zero()),
        Type::Guid => Value::Guid(uuid::Uuid::nil()),
        other => Value::from_i128(other, 0).unwrap_or(Value::Null),
    }
}

/// Applies a non-short-circuit binary operator to two evaluated operands.
///
/// `ty` is the static result type of the node; integral results that do
/// not fit it are an overflow.
pub fn apply_binary(op: BinaryOp, left: &Value, right: &Value, ty: &Type) -> EvalResult<Value> {
    match op {
        BinaryOp::Equal => return Ok(Value::Boolean(values_equal(left, right))),
        BinaryOp::NotEqual => return Ok(Value::Boolean(!values_equal(left, right))),
        _ if op.is_comparison() => {
            if left.is_null() || right.is_null() {
                return Ok(Value::Boolean(false));
            }
            let result = compare(left, right).is_some_and(|ord| match op {
                BinaryOp::LessThan => ord == CmpOrdering::Less,
                BinaryOp::GreaterThan => ord == CmpOrdering::Greater,
                BinaryOp::LessThanOrEqual => ord != CmpOrdering::Greater,
                _ => ord != CmpOrdering::Less,
            });
            return Ok(Value::Boolean(result));
        }
        _ => {}
    }
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    let ty = ty.non_nullable();
    match op {
        BinaryOp::And | BinaryOp::Or => bitwise(op, left, right, ty),
        BinaryOp::LeftShift | BinaryOp::RightShift => shift(op, left, right, ty),
        _ => arithmetic(op, left, right, ty),
    }
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value, ty: &Type) -> EvalResult<Value> {
    let overflow = || EvalError::Overflow(format!("'{}'", op.symbol()));
    let divides = matches!(op, BinaryOp::Divide | BinaryOp::Modulo);

    match (left, right) {
        (Value::Decimal(a), Value::Decimal(b)) => {
            if divides && b.is_zero() {
                return Err(EvalError::DivisionByZero);
            }
            let result = match op {
                BinaryOp::Add => a.checked_add(*b),
                BinaryOp::Subtract => a.checked_sub(*b),
                BinaryOp::Multiply => a.checked_mul(*b),
                BinaryOp::Divide => a.checked_div(*b),
                _ => a.checked_rem(*b),
            };
            result.map(Value::Decimal).ok_or_else(overflow)
        }
        (Value::Double(a), Value::Double(b)) => Ok(Value::Double(float_op(op, *a, *b))),
        (Value::Single(a), Value::Single(b)) => {
            Ok(Value::Single(float_op(op, *a as f64, *b as f64) as f32))
        }
        (Value::DateTime(a), Value::TimeSpan(b)) => {
            let result = match op {
                BinaryOp::Add => a.checked_add_signed(*b),
                BinaryOp::Subtract => a.checked_sub_signed(*b),
                _ => None,
            };
            result.map(Value::DateTime).ok_or_else(overflow)
        }
        (Value::DateTime(a), Value::DateTime(b)) if op == BinaryOp::Subtract => {
            Ok(Value::TimeSpan(a.signed_duration_since(*b)))
        }
        (Value::TimeSpan(a), Value::TimeSpan(b)) => {
            let result = match op {
                BinaryOp::Add => a.checked_add(b),
                BinaryOp::Subtract => a.checked_sub(b),
                _ => None,
            };
            result.map(Value::TimeSpan).ok_or_else(overflow)
        }
        _ => {
            let (Some(a), Some(b)) = (left.as_i128(), right.as_i128()) else {
                return Err(EvalError::TypeError(format!(
                    "cannot apply '{}' to {} and {}",
                    op.symbol(),
                    left,
                    right
                )));
            };
            if divides && b == 0 {
                return Err(EvalError::DivisionByZero);
            }
            let n = match op {
                BinaryOp::Add => a.checked_add(b),
                BinaryOp::Subtract => a.checked_sub(b),
                BinaryOp::Multiply => a.checked_mul(b),
                BinaryOp::Divide => a.checked_div(b),
                _ => a.checked_rem(b),
            }
            .ok_or_else(overflow)?;
            Value::from_i128(ty, n).ok_or_else(overflow)
        }
    }
}

fn float_op(op: BinaryOp, a: f64, b: f64) -> f64 {
    match op {
        BinaryOp::Add => a + b,
        BinaryOp::Subtract => a - b,
        BinaryOp::Multiply => a * b,
        BinaryOp::Divide => a / b,
        _ => a % b,
    }
}

fn bitwise(op: BinaryOp, left: &Value, right: &Value, ty: &Type) -> EvalResult<Value> {
    if let (Value::Boolean(a), Value::Boolean(b)) = (left, right) {
        return Ok(Value::Boolean(if op == BinaryOp::And { *a & *b } else { *a | *b }));
    }
    let (Some(a), Some(b)) = (left.as_i128(), right.as_i128()) else {
        return Err(EvalError::TypeError(format!(
            "cannot apply '{}' to {} and {}",
            op.symbol(),
            left,
            right
        )));
    };
    let n = if op == BinaryOp::And { a & b } else { a | b };
    wrap_integral(ty, n).ok_or_else(|| EvalError::TypeError(format!("'{}' on {}", op.symbol(), ty)))
}

fn shift(op: BinaryOp, left: &Value, right: &Value, ty: &Type) -> EvalResult<Value> {
    let (Some(a), Some(b)) = (left.as_i128(), right.as_i128()) else {
        return Err(EvalError::TypeError(format!("cannot shift {} by {}", left, right)));
    };
    let width = if matches!(ty, Type::Int64 | Type::UInt64) { 64 } else { 32 };
    let count = (b & (width - 1)) as u32;
    let n = if op == BinaryOp::LeftShift { a << count } else { a >> count };
    wrap_integral(ty, n).ok_or_else(|| EvalError::TypeError(format!("'{}' on {}", op.symbol(), ty)))
}

/// Truncates to the width of an integral type, two's complement.
fn wrap_integral(ty: &Type, n: i128) -> Option<Value> {
    let value = match ty {
        Type::SByte => Value::SByte(n as i8),
        Type::Byte => Value::Byte(n as u8),
        Type::Int16 => Value::Int16(n as i16),
        Type::UInt16 => Value::UInt16(n as u16),
        Type::Int32 => Value::Int32(n as i32),
        Type::UInt32 => Value::UInt32(n as u32),
        Type::Int64 => Value::Int64(n as i64),
        Type::UInt64 => Value::UInt64(n as u64),
        _ => return None,
    };
    Some(value)
}

fn unary(op: UnaryOp, value: Value, ty: &Type) -> EvalResult<Value> {
    if op == UnaryOp::Convert {
        return convert(value, ty);
    }
    if value.is_null() {
        return Ok(Value::Null);
    }
    match (op, value) {
        (UnaryOp::Not, Value::Boolean(b)) => Ok(Value::Boolean(!b)),
        (UnaryOp::Negate, Value::Double(n)) => Ok(Value::Double(-n)),
        (UnaryOp::Negate, Value::Single(n)) => Ok(Value::Single(-n)),
        (UnaryOp::Negate, Value::Decimal(d)) => Ok(Value::Decimal(-d)),
        (UnaryOp::Negate, other) => {
            let n = other.as_i128().ok_or_else(|| not_numeric(&other))?;
            Value::from_i128(ty.non_nullable(), -n)
                .ok_or_else(|| EvalError::Overflow("negation".into()))
        }
        (_, other) => Err(EvalError::TypeError(format!("cannot negate {}", other))),
    }
}

/// Converts a value to the representation of `ty`. Only numeric, enum and
/// char targets change the value; other conversions are reference
/// conversions.
pub fn convert(value: Value, ty: &Type) -> EvalResult<Value> {
    if value.is_null() {
        return Ok(value);
    }
    let target = ty.non_nullable();
    let numeric_like = target.is_numeric() || target.is_enum() || *target == Type::Char;
    if !numeric_like || value.natural_type() == *target {
        return Ok(value);
    }
    if value.as_f64().is_none() {
        return Err(EvalError::TypeError(format!("cannot convert {} to {}", value, ty)));
    }
    value
        .convert_numeric(target)
        .ok_or_else(|| EvalError::Overflow(format!("conversion to {}", ty)))
}

/// Equality as the `==` operator sees it: numerically across widths,
/// structurally for arrays and objects.
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match compare(left, right) {
        Some(ord) => ord == CmpOrdering::Equal,
        None => left == right,
    }
}

/// Orders two values of comparable kinds; `null` sorts first.
pub fn compare(left: &Value, right: &Value) -> Option<CmpOrdering> {
    match (left, right) {
        (Value::Null, Value::Null) => Some(CmpOrdering::Equal),
        (Value::Null, _) => Some(CmpOrdering::Less),
        (_, Value::Null) => Some(CmpOrdering::Greater),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
        (Value::Char(a), Value::Char(b)) => Some(a.cmp(b)),
        (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
        (Value::TimeSpan(a), Value::TimeSpan(b)) => Some(a.cmp(b)),
        (Value::Guid(a), Value::Guid(b)) => Some(a.cmp(b)),
        (Value::Decimal(_), _) | (_, Value::Decimal(_)) => {
            Some(left.as_decimal()?.cmp(&right.as_decimal()?))
        }
        (Value::Single(_) | Value::Double(_), _) | (_, Value::Single(_) | Value::Double(_)) => {
            left.as_f64()?.partial_cmp(&right.as_f64()?)
        }
        _ => Some(left.as_i128()?.cmp(&right.as_i128()?)),
    }
}

fn runtime_is(value: &Value, target: &Type) -> bool {
    if value.is_null() {
        return false;
    }
    match target.non_nullable() {
        Type::Object => true,
        Type::Class(_) | Type::Anonymous(_) | Type::DynamicClass => {
            matches!(value, Value::Object(_))
        }
        Type::Array(_) | Type::List(_) | Type::Sequence(_) => matches!(value, Value::Array(_)),
        other => value.natural_type() == *other,
    }
}

fn min_date_time() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1, 1, 1)?.and_hms_opt(0, 0, 0)
}

fn integral_bounds(ty: &Type) -> Option<(i128, i128)> {
    let bounds = match ty {
        Type::SByte => (i8::MIN as i128, i8::MAX as i128),
        Type::Byte => (0, u8::MAX as i128),
        Type::Int16 => (i16::MIN as i128, i16::MAX as i128),
        Type::UInt16 => (0, u16::MAX as i128),
        Type::Int32 => (i32::MIN as i128, i32::MAX as i128),
        Type::UInt32 => (0, u32::MAX as i128),
        Type::Int64 => (i64::MIN as i128, i64::MAX as i128),
        Type::UInt64 => (0, u64::MAX as i128),
        _ => return None,
    };
    Some(bounds)
}

fn static_member(member: &str, ty: &Type) -> EvalResult<Value> {
    let unsupported = || EvalError::Unsupported(format!("static member '{}' of {}", member, ty));
    match (member, ty) {
        ("PI", Type::Double) => Ok(Value::Double(std::f64::consts::PI)),
        ("E", Type::Double) => Ok(Value::Double(std::f64::consts::E)),
        ("Empty", Type::String) => Ok(Value::String(String::new())),
        ("Now", Type::DateTime) => Ok(Value::DateTime(Local::now().naive_local())),
        ("Today", Type::DateTime) => Local::now()
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(Value::DateTime)
            .ok_or_else(unsupported),
        ("MinValue", Type::DateTime) => min_date_time().map(Value::DateTime).ok_or_else(unsupported),
        ("MaxValue", Type::DateTime) => NaiveDate::from_ymd_opt(9999, 12, 31)
            .and_then(|d| d.and_hms_milli_opt(23, 59, 59, 999))
            .map(Value::DateTime)
            .ok_or_else(unsupported),
        (bound @ ("MinValue" | "MaxValue"), _) => {
            let (min, max) = integral_bounds(ty).ok_or_else(unsupported)?;
            let n = if bound == "MinValue" { min } else { max };
            Value::from_i128(ty, n).ok_or_else(unsupported)
        }
        _ => Err(unsupported()),
    }
}

fn instance_member(value: &Value, static_type: &Type, member: &str) -> EvalResult<Value> {
    if static_type.is_nullable() {
        match member {
            "HasValue" => return Ok(Value::Boolean(!value.is_null())),
            "Value" if value.is_null() => {
                return Err(EvalError::NullReference("nullable object must have a value".into()))
            }
            "Value" => return Ok(value.clone()),
            _ => {}
        }
    }
    let count = |n: usize| {
        i32::try_from(n)
            .map(Value::Int32)
            .map_err(|_| EvalError::Overflow(member.into()))
    };
    match value {
        Value::Null => Err(EvalError::NullReference(format!(
            "member '{}' of a null {}",
            member, static_type
        ))),
        Value::Object(map) => Ok(lookup_member(map, member)),
        Value::String(s) if member == "Length" => count(s.chars().count()),
        Value::Array(items) if member == "Length" || member == "Count" => count(items.len()),
        Value::DateTime(dt) => date_time_member(dt, member),
        Value::TimeSpan(d) => time_span_member(d, member),
        other => Err(EvalError::Unsupported(format!(
            "member '{}' on {}",
            member,
            other.natural_type()
        ))),
    }
}

fn lookup_member(map: &BTreeMap<String, Value>, name: &str) -> Value {
    map.get(name)
        .or_else(|| {
            map.iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
        .cloned()
        .unwrap_or(Value::Null)
}

fn date_time_member(dt: &NaiveDateTime, member: &str) -> EvalResult<Value> {
    let value = match member {
        "Year" => Value::Int32(dt.year()),
        "Month" => Value::Int32(dt.month() as i32),
        "Day" => Value::Int32(dt.day() as i32),
        "Hour" => Value::Int32(dt.hour() as i32),
        "Minute" => Value::Int32(dt.minute() as i32),
        "Second" => Value::Int32(dt.second() as i32),
        "Millisecond" => Value::Int32((dt.nanosecond() / 1_000_000) as i32),
        "DayOfYear" => Value::Int32(dt.ordinal() as i32),
        "Date" => dt
            .date()
            .and_hms_opt(0, 0, 0)
            .map(Value::DateTime)
            .unwrap_or(Value::Null),
        "Ticks" => {
            let epoch = min_date_time()
                .ok_or_else(|| EvalError::Unsupported("DateTime.Ticks".into()))?;
            let micros = (*dt - epoch)
                .num_microseconds()
                .ok_or_else(|| EvalError::Overflow("Ticks".into()))?;
            Value::Int64(micros * 10)
        }
        _ => return Err(EvalError::Unsupported(format!("DateTime.{}", member))),
    };
    Ok(value)
}

fn time_span_member(d: &TimeDelta, member: &str) -> EvalResult<Value> {
    let int = |n: i64| {
        i32::try_from(n)
            .map(Value::Int32)
            .map_err(|_| EvalError::Overflow(member.into()))
    };
    let millis = d.num_milliseconds() as f64;
    match member {
        "Days" => int(d.num_days()),
        "Hours" => int(d.num_hours() % 24),
        "Minutes" => int(d.num_minutes() % 60),
        "Seconds" => int(d.num_seconds() % 60),
        "TotalDays" => Ok(Value::Double(millis / 86_400_000.0)),
        "TotalHours" => Ok(Value::Double(millis / 3_600_000.0)),
        "TotalMinutes" => Ok(Value::Double(millis / 60_000.0)),
        "TotalSeconds" => Ok(Value::Double(millis / 1_000.0)),
        _ => Err(EvalError::Unsupported(format!("TimeSpan.{}", member))),
    }
}

fn index(target: &Value, keys: &[Value]) -> EvalResult<Value> {
    match (target, keys) {
        (Value::Null, _) => Err(EvalError::NullReference("indexing a null value".into())),
        (Value::Array(items), [key]) => {
            let i = key.as_i128().ok_or_else(|| not_numeric(key))?;
            usize::try_from(i)
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .ok_or(EvalError::IndexOutOfRange(i))
        }
        (Value::String(s), [key]) => {
            let i = key.as_i128().ok_or_else(|| not_numeric(key))?;
            usize::try_from(i)
                .ok()
                .and_then(|i| s.chars().nth(i))
                .map(Value::Char)
                .ok_or(EvalError::IndexOutOfRange(i))
        }
        (Value::Object(map), [Value::String(name)]) => Ok(lookup_member(map, name)),
        _ => Err(EvalError::TypeError(format!("cannot index {}", target))),
    }
}

fn call_method(method: &Method, receiver: Option<Value>, args: &[Value]) -> EvalResult<Value> {
    match (method.declaring_type.as_str(), method.name.as_str()) {
        (_, "ToString") => match receiver {
            Some(Value::Null) | None => Err(EvalError::NullReference("ToString on null".into())),
            Some(value) => Ok(Value::String(value.to_string())),
        },
        ("String", name) => string_method(name, receiver, args),
        ("DateTime", name) => date_time_method(name, receiver, args),
        ("Math", name) => math_method(name, args),
        (declaring, name) => Err(EvalError::Unsupported(format!("method {}.{}", declaring, name))),
    }
}

fn text_arg(args: &[Value], i: usize) -> EvalResult<&str> {
    match args.get(i) {
        Some(Value::String(s)) => Ok(s),
        Some(Value::Null) => Err(EvalError::NullReference("string argument".into())),
        _ => Err(EvalError::TypeError(format!("argument {} must be a string", i))),
    }
}

fn int_arg(args: &[Value], i: usize) -> EvalResult<i128> {
    args.get(i)
        .and_then(Value::as_i128)
        .ok_or_else(|| EvalError::TypeError(format!("argument {} must be an integer", i)))
}

fn string_method(name: &str, receiver: Option<Value>, args: &[Value]) -> EvalResult<Value> {
    let Some(receiver) = receiver else {
        return match name {
            "IsNullOrEmpty" => Ok(Value::Boolean(match args.first() {
                Some(Value::String(s)) => s.is_empty(),
                _ => true,
            })),
            "IsNullOrWhiteSpace" => Ok(Value::Boolean(match args.first() {
                Some(Value::String(s)) => s.trim().is_empty(),
                _ => true,
            })),
            "Concat" => Ok(Value::String(
                args.iter()
                    .filter(|v| !v.is_null())
                    .map(Value::to_string)
                    .collect(),
            )),
            "Compare" => {
                let ord = compare(
                    args.first().unwrap_or(&Value::Null),
                    args.get(1).unwrap_or(&Value::Null),
                );
                Ok(Value::Int32(match ord {
                    Some(CmpOrdering::Less) => -1,
                    Some(CmpOrdering::Greater) => 1,
                    _ => 0,
                }))
            }
            _ => Err(EvalError::Unsupported(format!("String.{}", name))),
        };
    };
    let Value::String(s) = receiver else {
        return Err(EvalError::NullReference(format!("String.{} on null", name)));
    };

    let value = match name {
        "Contains" => Value::Boolean(s.contains(text_arg(args, 0)?)),
        "StartsWith" => Value::Boolean(s.starts_with(text_arg(args, 0)?)),
        "EndsWith" => Value::Boolean(s.ends_with(text_arg(args, 0)?)),
        "Equals" => Value::Boolean(args.first() == Some(&Value::String(s.clone()))),
        "ToUpper" => Value::String(s.to_uppercase()),
        "ToLower" => Value::String(s.to_lowercase()),
        "Trim" => Value::String(s.trim().to_string()),
        "Substring" => {
            let chars: Vec<char> = s.chars().collect();
            let start = int_arg(args, 0)?;
            let len = if args.len() > 1 {
                int_arg(args, 1)?
            } else {
                chars.len() as i128 - start
            };
            let end = start + len;
            if start < 0 || len < 0 || end > chars.len() as i128 {
                return Err(EvalError::IndexOutOfRange(end));
            }
            Value::String(chars[start as usize..end as usize].iter().collect())
        }
        "IndexOf" => {
            let found = s
                .find(text_arg(args, 0)?)
                .map_or(-1, |byte| s[..byte].chars().count() as i32);
            Value::Int32(found)
        }
        "Replace" => Value::String(s.replace(text_arg(args, 0)?, text_arg(args, 1)?)),
        _ => return Err(EvalError::Unsupported(format!("String.{}", name))),
    };
    Ok(value)
}

fn date_time_method(name: &str, receiver: Option<Value>, args: &[Value]) -> EvalResult<Value> {
    let Some(Value::DateTime(dt)) = receiver else {
        return Err(EvalError::NullReference(format!("DateTime.{} on null", name)));
    };
    let amount = args
        .first()
        .and_then(Value::as_f64)
        .ok_or_else(|| EvalError::TypeError(format!("DateTime.{} needs a number", name)))?;
    let millis_per_unit = match name {
        "AddDays" => 86_400_000.0,
        "AddHours" => 3_600_000.0,
        "AddMinutes" => 60_000.0,
        "AddSeconds" => 1_000.0,
        _ => return Err(EvalError::Unsupported(format!("DateTime.{}", name))),
    };
    let overflow = || EvalError::Overflow(format!("DateTime.{}", name));
    let delta = TimeDelta::try_milliseconds((amount * millis_per_unit).round() as i64)
        .ok_or_else(overflow)?;
    dt.checked_add_signed(delta)
        .map(Value::DateTime)
        .ok_or_else(overflow)
}

fn round_half_even(x: f64, digits: i32) -> f64 {
    let scale = 10f64.powi(digits);
    (x * scale).round_ties_even() / scale
}

fn math_method(name: &str, args: &[Value]) -> EvalResult<Value> {
    let arg = args.first().unwrap_or(&Value::Null);
    let unsupported = || EvalError::Unsupported(format!("Math.{}({})", name, arg.natural_type()));
    let value = match (name, arg) {
        ("Abs", Value::Int32(n)) => Value::Int32(n.checked_abs().ok_or_else(|| EvalError::Overflow("Abs".into()))?),
        ("Abs", Value::Int64(n)) => Value::Int64(n.checked_abs().ok_or_else(|| EvalError::Overflow("Abs".into()))?),
        ("Abs", Value::Single(n)) => Value::Single(n.abs()),
        ("Abs", Value::Double(n)) => Value::Double(n.abs()),
        ("Abs", Value::Decimal(d)) => Value::Decimal(d.abs()),
        ("Max" | "Min", _) => {
            let other = args.get(1).unwrap_or(&Value::Null);
            let wanted = if name == "Max" {
                CmpOrdering::Greater
            } else {
                CmpOrdering::Less
            };
            if compare(other, arg) == Some(wanted) {
                other.clone()
            } else {
                arg.clone()
            }
        }
        ("Round", Value::Double(x)) => {
            let digits = if args.len() > 1 { int_arg(args, 1)? } else { 0 };
            Value::Double(round_half_even(*x, digits as i32))
        }
        ("Round", Value::Decimal(d)) => {
            let digits = if args.len() > 1 { int_arg(args, 1)? } else { 0 };
            let digits = u32::try_from(digits).map_err(|_| EvalError::IndexOutOfRange(digits))?;
            Value::Decimal(d.round_dp(digits))
        }
        ("Floor", Value::Double(x)) => Value::Double(x.floor()),
        ("Floor", Value::Decimal(d)) => Value::Decimal(d.floor()),
        ("Ceiling", Value::Double(x)) => Value::Double(x.ceil()),
        ("Ceiling", Value::Decimal(d)) => Value::Decimal(d.ceil()),
        ("Truncate", Value::Double(x)) => Value::Double(x.trunc()),
        ("Truncate", Value::Decimal(d)) => Value::Decimal(d.trunc()),
        ("Sqrt", Value::Double(x)) => Value::Double(x.sqrt()),
        ("Pow", Value::Double(x)) => {
            let y = args.get(1).and_then(Value::as_f64).ok_or_else(unsupported)?;
            Value::Double(x.powf(y))
        }
        _ => return Err(unsupported()),
    };
    Ok(value)
}
