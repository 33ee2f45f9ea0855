//! Command-line support: model schemas, JSON input and the `check`, `eval`
//! and `order` commands.

mod check;
mod convert;
mod schema;

pub use check::{execute_check, execute_eval, execute_order, CommandOptions};
pub use convert::{json_to_value, value_to_json};
pub use schema::{parse_type_name, Model, Schema};

use std::io;

use thiserror::Error;

/// Errors that can occur during CLI operations
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Parse error: {0}")]
    Parse(#[from] crate::ParseError),

    #[error("Evaluation error: {0}")]
    Eval(#[from] crate::EvalError),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The schema file describes an inconsistent model
    #[error("Invalid schema: {0}")]
    Schema(String),

    /// The JSON input does not fit the model
    #[error("Invalid input: {0}")]
    Input(String),

    #[error("No input provided. Use --input or pipe JSON to stdin.")]
    NoInput,
}
