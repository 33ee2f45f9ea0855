//! # Typed Expression Tree
//!
//! The output of a compile: a tree whose every node carries a resolved
//! [`Type`](crate::types::Type).
//!
//! - **[tokens]** - lexical tokens produced by the lexer
//! - **[expressions]** - typed nodes, parameters and ordering records
//! - **[operators]** - binary and unary operators
//!
//! ## Example
//!
//! ```text
//! Age > 18 && Name == "Bob"
//! ```
//!
//! compiles (against an element type with `Age: Int32` and `Name: String`)
//! to
//!
//! ```text
//! Binary(AndAlso: Boolean)
//! ├── Binary(GreaterThan: Boolean)
//! │   ├── MemberAccess(it.Age: Int32)
//! │   └── Constant(18: Int32)
//! └── Binary(Equal: Boolean)
//!     ├── MemberAccess(it.Name: String)
//!     └── Constant("Bob": String)
//! ```
pub mod expressions;
pub mod operators;
pub mod tokens;

pub use expressions::{
    Callable, Construction, Expr, ExprKind, Ordering, Parameter, TypeCheckMode,
};
pub use operators::{BinaryOp, UnaryOp};
pub use tokens::{Token, TokenKind};
