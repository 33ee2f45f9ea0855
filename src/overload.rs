//! Overload resolution and implicit promotion.
//!
//! Every place that picks one callable out of several goes through
//! [`find_best`]: declared methods, constructors and indexers, the built-in
//! operator signature groups, and the aggregate method table. A call either
//! resolves to exactly one candidate (with its arguments promoted to the
//! parameter types), to none, or is ambiguous.

use std::sync::{Arc, LazyLock};

use crate::ast::{Expr, ExprKind};
use crate::error::{messages, ParseError, ParseResult};
use crate::parser::literals;
use crate::types::conversion::is_compatible_with;
use crate::types::{builtin, Constructor, Indexer, Method, Type};

/// Outcome of overload resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<T> {
    /// Exactly one best candidate, with the promoted arguments
    Found(T, Vec<Expr>),
    NotFound,
    /// This many candidates remain equally good
    Ambiguous(usize),
}

impl<T> Resolution<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found(..))
    }
}

/// Promotes `expr` to `target` if an implicit conversion exists.
///
/// Numeric literals are re-read from their source text against the target
/// (so `1.1` becomes an exact `Decimal`, `5` a `Byte` or an enum member),
/// string literals may name an enum member, and `null` takes any reference
/// or nullable type. `exact` forces a conversion node even where a
/// reference conversion would do; `convert_expr` inserts one for value
/// types promoted to reference types.
pub fn promote(expr: &Expr, target: &Type, exact: bool, convert_expr: bool) -> Option<Expr> {
    if expr.ty == *target {
        return Some(expr.clone());
    }

    if let ExprKind::Constant { value, literal } = &expr.kind {
        if value.is_null() {
            if !target.is_value_type() || target.is_nullable() {
                return Some(Expr::typed_null(target.clone()));
            }
        } else if let Some(text) = literal {
            let underlying = target.non_nullable();
            let reparsed = match &expr.ty {
                Type::Int32 | Type::UInt32 | Type::Int64 | Type::UInt64 => {
                    literals::parse_number(text, underlying)
                }
                Type::Double if matches!(underlying, Type::Double | Type::Decimal) => {
                    literals::parse_number(text, underlying)
                }
                Type::String => literals::parse_enum(text, underlying),
                _ => None,
            };
            if let Some(value) = reparsed {
                return Some(Expr::literal(value, target.clone(), text.clone()));
            }
        }
    }

    if is_compatible_with(&expr.ty, target) {
        if target.is_value_type() || exact || (expr.ty.is_value_type() && convert_expr) {
            return Some(expr.clone().convert(target.clone()));
        }
        return Some(expr.clone());
    }
    None
}

/// Orders two conversions of `source`: positive when converting to `t1` is
/// better, negative when `t2` is, zero when neither wins.
fn compare_conversions(source: &Type, t1: &Type, t2: &Type) -> i32 {
    if t1 == t2 {
        return 0;
    }
    if source == t1 {
        return 1;
    }
    if source == t2 {
        return -1;
    }
    let t1_to_t2 = is_compatible_with(t1, t2);
    let t2_to_t1 = is_compatible_with(t2, t1);
    if t1_to_t2 && !t2_to_t1 {
        return 1;
    }
    if t2_to_t1 && !t1_to_t2 {
        return -1;
    }
    if t1.is_signed_integral() && t2.is_unsigned_integral() {
        return 1;
    }
    if t2.is_signed_integral() && t1.is_unsigned_integral() {
        return -1;
    }
    0
}

fn is_better_than(args: &[Expr], first: &[Type], second: &[Type]) -> bool {
    let mut better = false;
    for (i, arg) in args.iter().enumerate() {
        match compare_conversions(&arg.ty, &first[i], &second[i]) {
            c if c < 0 => return false,
            c if c > 0 => better = true,
            _ => {}
        }
    }
    better
}

/// Picks the best of `candidates` (each with its parameter types) for
/// `args`.
pub fn find_best<T: Clone>(
    candidates: &[(T, Vec<Type>)],
    args: &[Expr],
    convert_expr: bool,
) -> Resolution<T> {
    let mut applicable: Vec<(usize, Vec<Expr>)> = candidates
        .iter()
        .enumerate()
        .filter(|(_, (_, params))| params.len() == args.len())
        .filter_map(|(i, (_, params))| {
            args.iter()
                .zip(params)
                .map(|(arg, param)| promote(arg, param, false, convert_expr))
                .collect::<Option<Vec<_>>>()
                .map(|promoted| (i, promoted))
        })
        .collect();

    if applicable.len() > 1 {
        let indices: Vec<usize> = applicable.iter().map(|(i, _)| *i).collect();
        let best: Vec<(usize, Vec<Expr>)> = applicable
            .iter()
            .filter(|(m, _)| {
                indices.iter().all(|n| {
                    m == n || is_better_than(args, &candidates[*m].1, &candidates[*n].1)
                })
            })
            .cloned()
            .collect();

        // A nullable Guid operand makes every signature look alike.
        let guid_opt = Type::nullable(Type::Guid);
        let guid_pair =
            args.len() == 2 && (args[0].ty == guid_opt || args[1].ty == guid_opt);
        if best.len() == 1 {
            applicable = best;
        } else if guid_pair {
            applicable.truncate(1);
        } else {
            return Resolution::Ambiguous(applicable.len());
        }
    }

    match applicable.len() {
        0 => Resolution::NotFound,
        1 => {
            let (index, promoted) = applicable.remove(0);
            Resolution::Found(candidates[index].0.clone(), promoted)
        }
        n => Resolution::Ambiguous(n),
    }
}

/// Methods named `name` on `ty` (instance or static).
pub fn find_method(
    ty: &Type,
    name: &str,
    is_static: bool,
    args: &[Expr],
) -> Resolution<Arc<Method>> {
    let candidates: Vec<(Arc<Method>, Vec<Type>)> = builtin::methods(ty)
        .into_iter()
        .filter(|m| m.is_static == is_static && m.name.eq_ignore_ascii_case(name))
        .map(|m| {
            let params = m.params.clone();
            (m, params)
        })
        .collect();
    let resolution = find_best(&candidates, args, true);
    tracing::trace!(%ty, name, candidates = candidates.len(), found = resolution.is_found(), "method lookup");
    resolution
}

pub fn has_method_named(ty: &Type, name: &str) -> bool {
    builtin::methods(ty)
        .iter()
        .any(|m| m.name.eq_ignore_ascii_case(name))
}

pub fn find_indexer(ty: &Type, args: &[Expr]) -> Resolution<Indexer> {
    let candidates: Vec<(Indexer, Vec<Type>)> = builtin::indexers(ty)
        .into_iter()
        .map(|ix| {
            let params = ix.params.clone();
            (ix, params)
        })
        .collect();
    find_best(&candidates, args, true)
}

pub fn find_constructor(ty: &Type, args: &[Expr]) -> Resolution<Constructor> {
    let constructors = match ty {
        Type::Class(class) => class.body().constructors.clone(),
        _ => vec![],
    };
    let candidates: Vec<(Constructor, Vec<Type>)> = constructors
        .into_iter()
        .map(|c| {
            let params = c.params.clone();
            (c, params)
        })
        .collect();
    find_best(&candidates, args, true)
}

/// Built-in operator signature groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureGroup {
    Logical,
    Arithmetic,
    Relational,
    Equality,
    Add,
    Subtract,
    Shift,
    Negation,
    Not,
}

fn with_nullable(types: &[Type]) -> Vec<Type> {
    types
        .iter()
        .cloned()
        .chain(types.iter().cloned().map(Type::nullable))
        .collect()
}

fn pairs(types: &[Type]) -> Vec<Vec<Type>> {
    with_nullable(types)
        .into_iter()
        .map(|t| vec![t.clone(), t])
        .collect()
}

fn lifted_pair(left: Type, right: Type) -> [Vec<Type>; 2] {
    [
        vec![left.clone(), right.clone()],
        vec![Type::nullable(left), Type::nullable(right)],
    ]
}

static ARITHMETIC_TYPES: [Type; 7] = [
    Type::Int32,
    Type::UInt32,
    Type::Int64,
    Type::UInt64,
    Type::Single,
    Type::Double,
    Type::Decimal,
];

static LOGICAL: LazyLock<Vec<Vec<Type>>> = LazyLock::new(|| pairs(&[Type::Boolean]));

static ARITHMETIC: LazyLock<Vec<Vec<Type>>> = LazyLock::new(|| pairs(&ARITHMETIC_TYPES));

static RELATIONAL: LazyLock<Vec<Vec<Type>>> = LazyLock::new(|| {
    let mut list = ARITHMETIC.clone();
    list.push(vec![Type::String, Type::String]);
    list.extend(pairs(&[Type::Char, Type::DateTime, Type::TimeSpan]));
    list
});

static EQUALITY: LazyLock<Vec<Vec<Type>>> = LazyLock::new(|| {
    let mut list = RELATIONAL.clone();
    list.extend(pairs(&[Type::Boolean, Type::Guid]));
    list
});

static ADD: LazyLock<Vec<Vec<Type>>> = LazyLock::new(|| {
    let mut list = ARITHMETIC.clone();
    list.extend(lifted_pair(Type::DateTime, Type::TimeSpan));
    list.extend(lifted_pair(Type::TimeSpan, Type::TimeSpan));
    list
});

static SUBTRACT: LazyLock<Vec<Vec<Type>>> = LazyLock::new(|| {
    let mut list = ADD.clone();
    list.extend(lifted_pair(Type::DateTime, Type::DateTime));
    list
});

static SHIFT: LazyLock<Vec<Vec<Type>>> = LazyLock::new(|| {
    [Type::Int32, Type::UInt32, Type::Int64, Type::UInt64]
        .into_iter()
        .flat_map(|t| lifted_pair(t, Type::Int32))
        .collect()
});

static NEGATION: LazyLock<Vec<Vec<Type>>> = LazyLock::new(|| {
    with_nullable(&[
        Type::Int32,
        Type::Int64,
        Type::Single,
        Type::Double,
        Type::Decimal,
    ])
    .into_iter()
    .map(|t| vec![t])
    .collect()
});

static NOT: LazyLock<Vec<Vec<Type>>> = LazyLock::new(|| {
    with_nullable(&[Type::Boolean])
        .into_iter()
        .map(|t| vec![t])
        .collect()
});

impl SignatureGroup {
    pub fn signatures(self) -> &'static [Vec<Type>] {
        match self {
            SignatureGroup::Logical => &LOGICAL,
            SignatureGroup::Arithmetic => &ARITHMETIC,
            SignatureGroup::Relational => &RELATIONAL,
            SignatureGroup::Equality => &EQUALITY,
            SignatureGroup::Add => &ADD,
            SignatureGroup::Subtract => &SUBTRACT,
            SignatureGroup::Shift => &SHIFT,
            SignatureGroup::Negation => &NEGATION,
            SignatureGroup::Not => &NOT,
        }
    }

    fn resolve(self, args: &[Expr]) -> Resolution<Vec<Type>> {
        let candidates: Vec<(Vec<Type>, Vec<Type>)> = self
            .signatures()
            .iter()
            .map(|s| (s.clone(), s.clone()))
            .collect();
        find_best(&candidates, args, true)
    }
}

/// Promotes both operands to the single best signature of `group`.
pub fn check_and_promote_operands(
    group: SignatureGroup,
    op: &str,
    left: Expr,
    right: Expr,
    position: usize,
) -> ParseResult<(Expr, Expr)> {
    match group.resolve(&[left.clone(), right.clone()]) {
        Resolution::Found(_, mut promoted) if promoted.len() == 2 => {
            let right = promoted.remove(1);
            let left = promoted.remove(0);
            Ok((left, right))
        }
        _ => Err(ParseError::new(
            position,
            messages::incompatible_operands(op, &left.ty.to_string(), &right.ty.to_string()),
        )),
    }
}

/// Promotes a unary operand to the single best signature of `group`.
pub fn check_and_promote_operand(
    group: SignatureGroup,
    op: &str,
    operand: Expr,
    position: usize,
) -> ParseResult<Expr> {
    match group.resolve(std::slice::from_ref(&operand)) {
        Resolution::Found(_, mut promoted) if promoted.len() == 1 => Ok(promoted.remove(0)),
        _ => Err(ParseError::new(
            position,
            messages::incompatible_operand(op, &operand.ty.to_string()),
        )),
    }
}

/// Parameter kinds of the aggregate method table. `Any` accepts every
/// argument unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aggregate {
    pub name: &'static str,
    pub arity: usize,
}

static NUMERIC_SELECTOR_TYPES: LazyLock<Vec<Type>> = LazyLock::new(|| {
    with_nullable(&[
        Type::Int32,
        Type::Int64,
        Type::Single,
        Type::Double,
        Type::Decimal,
    ])
});

static AGGREGATES: LazyLock<Vec<(Aggregate, Vec<Type>)>> = LazyLock::new(|| {
    let mut table = vec![];
    let mut add = |name: &'static str, params: Vec<Type>| {
        table.push((
            Aggregate {
                name,
                arity: params.len(),
            },
            params,
        ));
    };
    let predicate = || vec![Type::Boolean];
    let selector = || vec![Type::Object];

    add("Where", predicate());
    for name in ["Any", "Count", "LongCount"] {
        add(name, vec![]);
        add(name, predicate());
    }
    add("All", predicate());
    for name in [
        "First",
        "FirstOrDefault",
        "Last",
        "LastOrDefault",
        "Single",
        "SingleOrDefault",
    ] {
        add(name, vec![]);
        add(name, predicate());
    }
    for name in ["Min", "Max"] {
        add(name, vec![]);
        add(name, selector());
    }
    for name in ["Sum", "Average"] {
        add(name, vec![]);
        for ty in NUMERIC_SELECTOR_TYPES.iter() {
            add(name, vec![ty.clone()]);
        }
    }
    for name in [
        "Select",
        "SelectMany",
        "OrderBy",
        "OrderByDescending",
        "ThenBy",
        "ThenByDescending",
    ] {
        add(name, selector());
    }
    add("GroupBy", selector());
    add("GroupBy", vec![Type::Object, Type::Object]);
    add("Skip", vec![Type::Int32]);
    add("Take", vec![Type::Int32]);
    add("SkipWhile", predicate());
    add("TakeWhile", predicate());
    for name in ["Distinct", "Reverse", "ToArray", "ToList", "DefaultIfEmpty"] {
        add(name, vec![]);
    }
    add("DefaultIfEmpty", selector());
    add("Contains", selector());
    add("OfType", selector());
    add("Cast", selector());
    table
});

pub fn is_aggregate_name(name: &str) -> bool {
    AGGREGATES
        .iter()
        .any(|(a, _)| a.name.eq_ignore_ascii_case(name))
}

/// Resolves an aggregate call by name and promoted arguments. Value-typed
/// arguments stay unconverted where the table only asks for an object.
pub fn find_aggregate(name: &str, args: &[Expr]) -> Resolution<Aggregate> {
    let candidates: Vec<(Aggregate, Vec<Type>)> = AGGREGATES
        .iter()
        .filter(|(a, _)| a.name.eq_ignore_ascii_case(name))
        .cloned()
        .collect();
    let resolution = find_best(&candidates, args, false);
    tracing::debug!(name, args = args.len(), found = resolution.is_found(), "aggregate lookup");
    resolution
}
