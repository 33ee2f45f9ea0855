//! Compile, evaluate and order expressions against a schema model

use super::{json_to_value, value_to_json, CliError, Model};
use crate::ast::{ExprKind, Parameter};
use crate::output::{ordering_to_tree, to_tree};
use crate::{parse_lambda, Evaluator, Parser};

/// Options shared by the `check`, `eval` and `order` commands
#[derive(Debug, Clone, Default)]
pub struct CommandOptions {
    /// The expression text
    pub expression: String,
    /// Contents of the schema file
    pub schema: String,
    /// Element type overriding the schema's `it`
    pub it: Option<String>,
    /// JSON input string
    pub input: Option<String>,
}

/// Compiles the expression and renders its tree, followed by the result
/// type of the body.
pub fn execute_check(options: &CommandOptions) -> Result<String, CliError> {
    let model = Model::from_json(&options.schema)?;
    let it = model.it_type(options.it.as_deref())?;
    let lambda = parse_lambda(&model.config, it, None, &options.expression, vec![])?;

    let body_type = match &lambda.kind {
        ExprKind::Lambda { body, .. } => body.ty.clone(),
        _ => lambda.ty.clone(),
    };
    Ok(format!("{}Result: {}", to_tree(&lambda), body_type))
}

/// Compiles the expression and evaluates it with the JSON input as `it`.
pub fn execute_eval(options: &CommandOptions) -> Result<serde_json::Value, CliError> {
    let model = Model::from_json(&options.schema)?;
    let it = model.it_type(options.it.as_deref())?;
    let lambda = parse_lambda(&model.config, it.clone(), None, &options.expression, vec![])?;

    let json_str = options.input.as_ref().ok_or(CliError::NoInput)?;
    let json: serde_json::Value = serde_json::from_str(json_str)?;
    let input = json_to_value(json, &it)?;

    let result = Evaluator::new().invoke(&lambda, &[input])?;
    Ok(value_to_json(result))
}

/// Compiles an ordering list and renders one tree per key.
pub fn execute_order(options: &CommandOptions) -> Result<String, CliError> {
    let model = Model::from_json(&options.schema)?;
    let it = Parameter::new("", model.it_type(options.it.as_deref())?);
    let mut parser = Parser::new(&model.config, &[it], &options.expression, vec![])?;
    let orderings = parser.parse_ordering_list()?;
    Ok(orderings.iter().map(ordering_to_tree).collect())
}
