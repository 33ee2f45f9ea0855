//! Text rendering of typed expression trees.
//!
//! One node per line, children drawn with box characters:
//!
//! ```text
//! Binary(GreaterThan: Boolean)
//! ├── MemberAccess(it.Age: Int32)
//! └── Constant(18: Int32)
//! ```
//!
//! Chains of member accesses rooted at a parameter or a static member are
//! folded into a single `MemberAccess(it.Address.City: String)` line.
//!
//! # Examples
//!
//! ```
//! use dynlinq::ast::Expr;
//! use dynlinq::output::to_tree;
//! use dynlinq::types::Type;
//! use dynlinq::Value;
//!
//! let expr = Expr::constant(Value::Int32(7), Type::Int32);
//! assert_eq!(to_tree(&expr), "Constant(7: Int32)\n");
//! ```

use crate::ast::{Callable, Construction, Expr, ExprKind, Ordering, TypeCheckMode, UnaryOp};
use crate::value::Value;

pub struct TreePrinter {
    types: bool,
}

impl TreePrinter {
    /// `types` controls whether each line carries the node's result type.
    pub fn new(types: bool) -> Self {
        TreePrinter { types }
    }

    pub fn print(&self, expr: &Expr) -> String {
        let mut out = self.label(expr);
        out.push('\n');
        self.print_children(expr, "", &mut out);
        out
    }

    fn print_children(&self, expr: &Expr, prefix: &str, out: &mut String) {
        let children = children(expr);
        let count = children.len();
        for (i, (name, child)) in children.into_iter().enumerate() {
            let last = i + 1 == count;
            out.push_str(prefix);
            out.push_str(if last { "└── " } else { "├── " });
            if let Some(name) = name {
                out.push_str(name);
                out.push_str(" = ");
            }
            out.push_str(&self.label(child));
            out.push('\n');
            let nested = format!("{}{}", prefix, if last { "    " } else { "│   " });
            self.print_children(child, &nested, out);
        }
    }

    fn label(&self, expr: &Expr) -> String {
        let (kind, detail) = match &expr.kind {
            ExprKind::Constant { value, .. } => ("Constant", constant_text(value)),
            ExprKind::Parameter(p) => ("Parameter", parameter_text(p.name())),
            ExprKind::MemberAccess { member, .. } => match member_path(expr) {
                Some(path) => ("MemberAccess", path),
                None => ("MemberAccess", format!(".{}", member)),
            },
            ExprKind::IndexAccess { .. } => ("IndexAccess", String::new()),
            ExprKind::Call { callable, .. } => {
                let name = match callable {
                    Callable::Method(m) => m.name.clone(),
                    Callable::Aggregate(name) => name.clone(),
                    Callable::Invoke => "Invoke".to_string(),
                };
                ("Call", name)
            }
            ExprKind::Binary { op, method, .. } => match method {
                Some(method) => ("Binary", format!("{:?} via {}", op, method)),
                None => ("Binary", format!("{:?}", op)),
            },
            ExprKind::Unary {
                op: UnaryOp::Convert,
                ..
            } => ("Convert", String::new()),
            ExprKind::Unary { op, .. } => ("Unary", format!("{:?}", op)),
            ExprKind::Conditional { .. } => ("Conditional", String::new()),
            ExprKind::Coalesce { .. } => ("Coalesce", String::new()),
            ExprKind::Lambda { params, .. } => {
                let names: Vec<String> = params.iter().map(|p| parameter_text(p.name())).collect();
                ("Lambda", format!("{} =>", names.join(", ")))
            }
            ExprKind::New(construction) => {
                let shape = match construction {
                    Construction::Constructor(_) => "Constructor",
                    Construction::Bindings(_) => "Bindings",
                    Construction::Anonymous(_) => "Anonymous",
                    Construction::Array(_) => "Array",
                };
                ("New", shape.to_string())
            }
            ExprKind::TypeCheck { target, mode, .. } => {
                let mode = match mode {
                    TypeCheckMode::Is => "is",
                    TypeCheckMode::As => "as",
                    TypeCheckMode::Cast => "cast",
                };
                ("TypeCheck", format!("{} {}", mode, target))
            }
        };

        match (detail.is_empty(), self.types) {
            (true, true) => format!("{}({})", kind, expr.ty),
            (true, false) => kind.to_string(),
            (false, true) => format!("{}({}: {})", kind, detail, expr.ty),
            (false, false) => format!("{}({})", kind, detail),
        }
    }
}

/// Renders a tree with result types.
pub fn to_tree(expr: &Expr) -> String {
    TreePrinter::new(true).print(expr)
}

/// Renders one ordering key: the method name, then the selector tree.
pub fn ordering_to_tree(ordering: &Ordering) -> String {
    let printer = TreePrinter::new(true);
    let mut out = format!("{}\n", ordering.method_name);
    out.push_str("└── ");
    out.push_str(&printer.label(&ordering.selector));
    out.push('\n');
    printer.print_children(&ordering.selector, "    ", &mut out);
    out
}

fn parameter_text(name: &str) -> String {
    if name.is_empty() {
        "it".to_string()
    } else {
        name.to_string()
    }
}

fn constant_text(value: &Value) -> String {
    match value {
        Value::String(s) => format!("{:?}", s),
        Value::Char(c) => format!("{:?}", c),
        other => other.to_string(),
    }
}

/// `it.Address.City` for a member chain rooted at a parameter or a static
/// member.
fn member_path(expr: &Expr) -> Option<String> {
    match &expr.kind {
        ExprKind::Parameter(p) => Some(parameter_text(p.name())),
        ExprKind::MemberAccess {
            instance: None,
            member,
        } => Some(member.clone()),
        ExprKind::MemberAccess {
            instance: Some(instance),
            member,
        } => Some(format!("{}.{}", member_path(instance)?, member)),
        _ => None,
    }
}

fn unnamed(expr: &Expr) -> (Option<&str>, &Expr) {
    (None, expr)
}

fn children(expr: &Expr) -> Vec<(Option<&str>, &Expr)> {
    match &expr.kind {
        ExprKind::Constant { .. } | ExprKind::Parameter(_) => vec![],
        ExprKind::MemberAccess { instance, .. } => match instance {
            Some(instance) if member_path(instance).is_none() => vec![(None, &**instance)],
            _ => vec![],
        },
        ExprKind::IndexAccess { instance, args } => std::iter::once(&**instance)
            .chain(args)
            .map(unnamed)
            .collect(),
        ExprKind::Call { instance, args, .. } => instance
            .iter()
            .map(|i| &**i)
            .chain(args)
            .map(unnamed)
            .collect(),
        ExprKind::Binary { left, right, .. } => vec![(None, &**left), (None, &**right)],
        ExprKind::Unary { operand, .. } => vec![(None, &**operand)],
        ExprKind::Conditional {
            test,
            if_true,
            if_false,
        } => vec![(None, &**test), (None, &**if_true), (None, &**if_false)],
        ExprKind::Coalesce { left, right } => vec![(None, &**left), (None, &**right)],
        ExprKind::Lambda { body, .. } => vec![(None, &**body)],
        ExprKind::New(construction) => match construction {
            Construction::Constructor(args) | Construction::Array(args) => {
                args.iter().map(unnamed).collect()
            }
            Construction::Bindings(members) | Construction::Anonymous(members) => members
                .iter()
                .map(|(name, e)| (Some(name.as_str()), e))
                .collect(),
        },
        ExprKind::TypeCheck { instance, .. } => vec![(None, &**instance)],
    }
}
