use std::fmt;
use std::sync::Arc;

use crate::ast::{BinaryOp, UnaryOp};
use crate::types::{Method, Type};
use crate::value::Value;

/// A node of the typed expression tree.
///
/// Every node carries its fully resolved result type; the parser never
/// produces a node whose type is still unknown.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Type,
}

/// The closed set of node shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Constant value
    ///
    /// `literal` keeps the source text of numeric and string literals so a
    /// later promotion can re-read the text against the target type instead
    /// of casting the already computed value.
    Constant {
        value: Value,
        literal: Option<String>,
    },

    /// Reference to a lambda or declared parameter (`it`, `parent`, `root`,
    /// or a named parameter)
    Parameter(Parameter),

    /// Property or field access; `instance` is `None` for static members
    ///
    /// # Examples
    /// ```text
    /// Name
    /// it.Address.City
    /// Math.PI
    /// ```
    MemberAccess {
        instance: Option<Box<Expr>>,
        member: String,
    },

    /// Array element or indexer access
    ///
    /// # Examples
    /// ```text
    /// Tags[0]
    /// Attributes["color"]
    /// ```
    IndexAccess {
        instance: Box<Expr>,
        args: Vec<Expr>,
    },

    /// Method, aggregate or lambda invocation
    Call {
        instance: Option<Box<Expr>>,
        callable: Callable,
        type_args: Vec<Type>,
        args: Vec<Expr>,
    },

    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        /// Name of the user-declared operator method, when one was bound
        method: Option<String>,
    },

    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },

    /// `test ? if_true : if_false`, also produced by `iif` and `np`
    Conditional {
        test: Box<Expr>,
        if_true: Box<Expr>,
        if_false: Box<Expr>,
    },

    /// `left ?? right`, also produced by `isnull`
    Coalesce {
        left: Box<Expr>,
        right: Box<Expr>,
    },

    Lambda {
        params: Vec<Parameter>,
        body: Box<Expr>,
    },

    /// Object or array construction
    New(Construction),

    /// `is`, `as` or `cast` against a target type
    TypeCheck {
        instance: Box<Expr>,
        target: Type,
        mode: TypeCheckMode,
    },
}

/// What a [`ExprKind::Call`] invokes.
#[derive(Debug, Clone, PartialEq)]
pub enum Callable {
    /// A declared or built-in method
    Method(Arc<Method>),
    /// A sequence operator such as `Where` or `Select`
    Aggregate(String),
    /// Invocation of a lambda-typed instance
    Invoke,
}

/// The construction forms of `new`.
#[derive(Debug, Clone, PartialEq)]
pub enum Construction {
    /// `new TypeName(args)` resolved against a declared constructor
    Constructor(Vec<Expr>),
    /// `new TypeName(expr as Member, ...)`
    Bindings(Vec<(String, Expr)>),
    /// `new(expr as Name, ...)` producing an anonymous record or a
    /// dynamic bag depending on configuration
    Anonymous(Vec<(String, Expr)>),
    /// `new[] { ... }`
    Array(Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCheckMode {
    Is,
    As,
    Cast,
}

/// One key of an ordering clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Ordering {
    pub selector: Expr,
    pub ascending: bool,
    /// `OrderBy`, `OrderByDescending`, `ThenBy` or `ThenByDescending`
    pub method_name: String,
}

/// A parameter with reference identity: two parameters are equal only when
/// they are the same parameter, even if name and type match.
#[derive(Clone)]
pub struct Parameter(Arc<ParameterData>);

struct ParameterData {
    name: String,
    ty: Type,
}

impl Parameter {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Parameter(Arc::new(ParameterData {
            name: name.into(),
            ty,
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn ty(&self) -> &Type {
        &self.0.ty
    }
}

impl PartialEq for Parameter {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Parameter({}: {})", self.0.name, self.0.ty)
    }
}

impl Expr {
    pub fn new(kind: ExprKind, ty: Type) -> Self {
        Expr { kind, ty }
    }

    pub fn constant(value: Value, ty: Type) -> Self {
        Expr::new(
            ExprKind::Constant {
                value,
                literal: None,
            },
            ty,
        )
    }

    /// A constant that remembers the literal text it was read from.
    pub fn literal(value: Value, ty: Type, text: impl Into<String>) -> Self {
        Expr::new(
            ExprKind::Constant {
                value,
                literal: Some(text.into()),
            },
            ty,
        )
    }

    /// The untyped `null` keyword.
    pub fn null_literal() -> Self {
        Expr::literal(Value::Null, Type::Object, "null")
    }

    /// `null` given a concrete reference or nullable type.
    pub fn typed_null(ty: Type) -> Self {
        Expr::literal(Value::Null, ty, "null")
    }

    pub fn parameter(param: &Parameter) -> Self {
        Expr::new(ExprKind::Parameter(param.clone()), param.ty().clone())
    }

    pub fn convert(self, ty: Type) -> Self {
        Expr::new(
            ExprKind::Unary {
                op: UnaryOp::Convert,
                operand: Box::new(self),
            },
            ty,
        )
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr, ty: Type) -> Self {
        Expr::new(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                method: None,
            },
            ty,
        )
    }

    pub fn conditional(test: Expr, if_true: Expr, if_false: Expr) -> Self {
        let ty = if_true.ty.clone();
        Expr::new(
            ExprKind::Conditional {
                test: Box::new(test),
                if_true: Box::new(if_true),
                if_false: Box::new(if_false),
            },
            ty,
        )
    }

    pub fn member(instance: Option<Expr>, member: impl Into<String>, ty: Type) -> Self {
        Expr::new(
            ExprKind::MemberAccess {
                instance: instance.map(Box::new),
                member: member.into(),
            },
            ty,
        )
    }

    pub fn lambda(params: Vec<Parameter>, body: Expr) -> Self {
        let ty = Type::Lambda(
            params.iter().map(|p| p.ty().clone()).collect(),
            Box::new(body.ty.clone()),
        );
        Expr::new(
            ExprKind::Lambda {
                params,
                body: Box::new(body),
            },
            ty,
        )
    }

    /// True for `null`, untyped or already given a type.
    pub fn is_null_literal(&self) -> bool {
        matches!(
            &self.kind,
            ExprKind::Constant { value: Value::Null, literal: Some(text) } if text == "null"
        )
    }

    /// The untyped `null` keyword, before any promotion gave it a type.
    pub fn is_untyped_null(&self) -> bool {
        self.is_null_literal() && self.ty == Type::Object
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.kind, ExprKind::Constant { .. })
    }

    pub fn constant_value(&self) -> Option<&Value> {
        match &self.kind {
            ExprKind::Constant { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn as_parameter(&self) -> Option<&Parameter> {
        match &self.kind {
            ExprKind::Parameter(p) => Some(p),
            _ => None,
        }
    }
}
