//! # dynlinq
//!
//! Compiles textual expressions such as `Age > 18 && Roles.Any(Name == "admin")`
//! into statically typed expression trees over a caller-described object
//! model, with the overload and conversion rules of a C#-like language.
//!
//! - **[lexer]** - tokenizer
//! - **[parser]** - recursive-descent parser producing typed trees and
//!   ordering lists
//! - **[types]** - the object model
//! - **[overload]** - implicit promotion and best-overload selection
//! - **[evaluator]** - a reference evaluator for compiled trees
//!
//! ```
//! use dynlinq::{parse_lambda, Evaluator, ParsingConfig, Value};
//! use dynlinq::types::{ClassType, Type};
//!
//! let person = ClassType::builder("Person").property("Age", Type::Int32).build();
//! let config = ParsingConfig::default();
//! let lambda = parse_lambda(&config, person, None, "Age >= 18", vec![]).unwrap();
//!
//! let adult = Value::Object([("Age".to_string(), Value::Int32(30))].into_iter().collect());
//! assert_eq!(Evaluator::new().invoke(&lambda, &[adult]).unwrap(), Value::Boolean(true));
//! ```
pub mod ast;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod lexer;
pub mod output;
pub mod overload;
pub mod parser;
pub mod resolver;
pub mod types;
pub mod value;

#[cfg(feature = "cli")]
pub mod cli;

pub use ast::{Expr, ExprKind, Ordering, Parameter, Token};
pub use config::{ParsingConfig, TypeProvider, TypeRegistry};
pub use error::{ParseError, ParseResult};
pub use evaluator::{EvalContext, EvalError, Evaluator};
pub use lexer::Lexer;
pub use output::to_tree;
pub use parser::{parse_lambda, parse_lambda_with, Argument, Parser};
pub use value::Value;
