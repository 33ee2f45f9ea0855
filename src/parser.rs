//! Recursive-descent compiler from expression text to a typed tree.
//!
//! Precedence, lowest first:
//!
//! ```text
//! ?:  ??  =>  ||  &&  in  & |  == != < > <= >=  << >>  + -  * / %  unary  primary
//! ```
//!
//! The operator levels live in [`operators`], reserved functions in
//! [`keywords`], member/method/indexer binding in [`members`], sequence
//! operators in [`aggregates`] and `new` in [`construction`].

use std::collections::{BTreeMap, HashMap};

use crate::ast::{Expr, Ordering, Parameter, Token, TokenKind};
use crate::config::ParsingConfig;
use crate::error::{messages, ParseError, ParseResult};
use crate::lexer::Lexer;
use crate::overload::promote;
use crate::types::{builtin, Type};
use crate::value::Value;

mod aggregates;
mod construction;
pub mod keywords;
pub mod literals;
mod members;
mod operators;
pub mod scope;

use keywords::Keyword;
use scope::{ScopeFrame, ScopeStack};

/// A value supplied alongside the expression text.
///
/// Positional arguments are visible as `@0`, `@1`, ...; a trailing
/// [`Argument::Externals`] map is visible by name instead.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Value(Value),
    /// A prebuilt expression; a lambda can be invoked as `@0(x)`
    Expr(Expr),
    Externals(BTreeMap<String, Value>),
}

#[derive(Debug, Clone)]
enum Symbol {
    Parameter(Parameter),
    Value(Value),
    Expr(Expr),
}

/// One parse session over one expression text.
pub struct Parser<'a> {
    config: &'a ParsingConfig,
    lexer: Lexer,
    current_token: Token,
    symbols: HashMap<String, Symbol>,
    externals: HashMap<String, Value>,
    /// Names bound to `it` by `name => body` inside an aggregate argument
    internals: HashMap<String, Parameter>,
    scope: ScopeStack,
}

impl<'a> Parser<'a> {
    /// Starts a session.
    ///
    /// A single parameter with an empty name becomes `it` (and `root`);
    /// named parameters are symbols. Duplicate names are rejected before
    /// any of `text` is read.
    pub fn new(
        config: &'a ParsingConfig,
        parameters: &[Parameter],
        text: &str,
        values: Vec<Argument>,
    ) -> ParseResult<Self> {
        let mut symbols = HashMap::new();
        let mut externals = HashMap::new();

        let mut add_symbol = |name: &str, symbol: Symbol| -> ParseResult<()> {
            let key = config.fold_case(name);
            if symbols.contains_key(&key) {
                return Err(ParseError::new(0, messages::duplicate_identifier(name)));
            }
            symbols.insert(key, symbol);
            Ok(())
        };

        for param in parameters.iter().filter(|p| !p.name().is_empty()) {
            add_symbol(param.name(), Symbol::Parameter(param.clone()))?;
        }

        let count = values.len();
        for (i, value) in values.into_iter().enumerate() {
            match value {
                Argument::Externals(map) if i + 1 == count => {
                    for (name, value) in map {
                        externals.insert(config.fold_case(&name), value);
                    }
                }
                Argument::Externals(map) => add_symbol(&format!("@{}", i), Symbol::Value(Value::Object(map)))?,
                Argument::Value(v) => add_symbol(&format!("@{}", i), Symbol::Value(v))?,
                Argument::Expr(e) => add_symbol(&format!("@{}", i), Symbol::Expr(e))?,
            }
        }

        let it = match parameters {
            [single] if single.name().is_empty() => Some(single.clone()),
            _ => None,
        };

        let mut lexer = Lexer::with_decimal_separator(text, config.number_decimal_separator);
        let current_token = lexer.next_token()?;
        Ok(Parser {
            config,
            lexer,
            current_token,
            symbols,
            externals,
            internals: HashMap::new(),
            scope: ScopeStack::new(ScopeFrame::root(it)),
        })
    }

    /// Parses the whole text as one expression, promoted to `expected` when
    /// given.
    pub fn parse(&mut self, expected: Option<&Type>) -> ParseResult<Expr> {
        let position = self.position();
        let mut expr = self.parse_conditional()?;
        if let Some(ty) = expected {
            expr = promote(&expr, ty, true, false).ok_or_else(|| {
                ParseError::new(position, messages::expression_type_expected(&ty.to_string()))
            })?;
        }
        self.validate(TokenKind::End, messages::SYNTAX_ERROR)?;
        Ok(expr)
    }

    /// Parses `key [asc|ascending|desc|descending], ...`.
    pub fn parse_ordering_list(&mut self) -> ParseResult<Vec<Ordering>> {
        self.parse_ordering(false)
    }

    /// Like [`Parser::parse_ordering_list`], optionally continuing an
    /// existing ordering so that even the first key uses `ThenBy`.
    pub fn parse_ordering(&mut self, force_then_by: bool) -> ParseResult<Vec<Ordering>> {
        let mut orderings: Vec<Ordering> = vec![];
        loop {
            let selector = self.parse_conditional()?;
            let mut ascending = true;
            if self.current_token.is_identifier("asc") || self.current_token.is_identifier("ascending") {
                self.advance()?;
            } else if self.current_token.is_identifier("desc")
                || self.current_token.is_identifier("descending")
            {
                self.advance()?;
                ascending = false;
            }

            let then_by = force_then_by || !orderings.is_empty();
            let method_name = match (then_by, ascending) {
                (false, true) => "OrderBy",
                (false, false) => "OrderByDescending",
                (true, true) => "ThenBy",
                (true, false) => "ThenByDescending",
            };
            orderings.push(Ordering {
                selector,
                ascending,
                method_name: method_name.to_string(),
            });

            if !self.check(TokenKind::Comma) {
                break;
            }
            self.advance()?;
        }
        self.validate(TokenKind::End, messages::SYNTAX_ERROR)?;
        Ok(orderings)
    }

    // Token helpers

    fn advance(&mut self) -> ParseResult<()> {
        self.current_token = self.lexer.next_token()?;
        Ok(())
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current_token.is(kind)
    }

    fn position(&self) -> usize {
        self.current_token.position
    }

    fn error_here(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.position(), message)
    }

    fn validate(&self, kind: TokenKind, message: &str) -> ParseResult<()> {
        if self.check(kind) {
            Ok(())
        } else {
            Err(self.error_here(message))
        }
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> ParseResult<()> {
        self.validate(kind, message)?;
        self.advance()
    }

    /// The current identifier with a leading `@` escape removed.
    fn identifier(&self) -> ParseResult<String> {
        self.validate(TokenKind::Identifier, messages::IDENTIFIER_EXPECTED)?;
        let text = &self.current_token.text;
        match text.strip_prefix('@') {
            Some(rest) if !rest.is_empty() => Ok(rest.to_string()),
            _ => Ok(text.clone()),
        }
    }

    /// Runs `f` with `frame` pushed, popping it again whether or not `f`
    /// succeeds.
    fn with_scope<T>(
        &mut self,
        frame: ScopeFrame,
        f: impl FnOnce(&mut Self) -> ParseResult<T>,
    ) -> ParseResult<T> {
        tracing::trace!(depth = self.scope.depth(), "entering lambda scope");
        self.scope.push(frame);
        let result = f(self);
        self.scope.pop();
        result
    }

    /// Runs `f` with `name` bound to `it`, unbinding it afterwards.
    fn with_internal<T>(
        &mut self,
        name: &str,
        it: Parameter,
        f: impl FnOnce(&mut Self) -> ParseResult<T>,
    ) -> ParseResult<T> {
        let key = self.config.fold_case(name);
        let previous = self.internals.insert(key.clone(), it);
        let result = f(self);
        match previous {
            Some(p) => self.internals.insert(key, p),
            None => self.internals.remove(&key),
        };
        result
    }

    // Primary expressions

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary_start()?;
        loop {
            match self.current_token.kind {
                TokenKind::Dot => {
                    self.advance()?;
                    expr = self.parse_member_access(None, Some(expr))?;
                }
                TokenKind::NullPropagation => {
                    return Err(self.error_here(messages::NULL_PROPAGATION_OPERATOR_UNSUPPORTED));
                }
                TokenKind::OpenBracket => {
                    expr = self.parse_element_access(expr)?;
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary_start(&mut self) -> ParseResult<Expr> {
        match self.current_token.kind {
            TokenKind::Identifier => self.parse_identifier(),
            TokenKind::StringLiteral => {
                let expr = literals::parse_string_literal(&self.current_token)?;
                self.advance()?;
                Ok(expr)
            }
            TokenKind::IntegerLiteral => {
                let expr = literals::parse_integer_literal(
                    &self.current_token.text,
                    self.current_token.position,
                )?;
                self.advance()?;
                Ok(expr)
            }
            TokenKind::RealLiteral => {
                let expr = literals::parse_real_literal(
                    &self.current_token.text,
                    self.config.number_decimal_separator,
                    self.current_token.position,
                )?;
                self.advance()?;
                Ok(expr)
            }
            TokenKind::OpenParen => self.parse_paren_expression(),
            _ => Err(self.error_here(messages::EXPRESSION_EXPECTED)),
        }
    }

    fn parse_paren_expression(&mut self) -> ParseResult<Expr> {
        self.expect(TokenKind::OpenParen, messages::OPEN_PAREN_EXPECTED)?;
        let expr = self.parse_conditional()?;
        self.expect(TokenKind::CloseParen, messages::CLOSE_PAREN_OR_OPERATOR_EXPECTED)?;
        Ok(expr)
    }

    /// Resolves an identifier: keywords first (unless a type name is
    /// shadowed by a member of `it`), then symbols, externals and internals,
    /// and finally a member of `it`.
    fn parse_identifier(&mut self) -> ParseResult<Expr> {
        let text = self.current_token.text.clone();

        if let Some(keyword) = self.config.keyword(&text).cloned() {
            let shadowed = matches!(keyword, Keyword::Type(_))
                && self.config.prioritize_property_or_field_over_the_type
                && self.it_has_member(&text);
            if !shadowed {
                return self.parse_keyword(keyword);
            }
        }

        let key = self.config.fold_case(&text);
        let symbol = self
            .symbols
            .get(&key)
            .cloned()
            .or_else(|| self.externals.get(&key).cloned().map(Symbol::Value))
            .or_else(|| self.internals.get(&key).cloned().map(Symbol::Parameter));
        if let Some(symbol) = symbol {
            self.advance()?;
            return match symbol {
                Symbol::Parameter(p) => Ok(Expr::parameter(&p)),
                Symbol::Value(Value::Type(ty)) => self.parse_type_access(ty),
                Symbol::Value(v) => {
                    let ty = v.natural_type();
                    Ok(Expr::constant(v, ty))
                }
                Symbol::Expr(e) if matches!(e.ty, Type::Lambda(..)) && self.check(TokenKind::OpenParen) => {
                    self.parse_lambda_invocation(e)
                }
                Symbol::Expr(e) => Ok(e),
            };
        }

        // `@0` past the supplied values names nothing
        let positional = text
            .strip_prefix('@')
            .map_or(false, |n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()));
        if !positional {
            if let Some(it) = self.scope.current().it.clone() {
                return self.parse_member_access(None, Some(Expr::parameter(&it)));
            }
        }
        Err(self.error_here(messages::unknown_identifier(&text)))
    }

    /// Whether the current `it` declares an instance member called `name`.
    fn it_has_member(&self, name: &str) -> bool {
        self.scope.current().it.as_ref().map_or(false, |it| {
            builtin::members(it.ty())
                .iter()
                .any(|m| !m.is_static && self.config.names_equal(&m.name, name))
        })
    }

    /// `( expr, ... )`
    fn parse_argument_list(&mut self) -> ParseResult<Vec<Expr>> {
        self.expect(TokenKind::OpenParen, messages::OPEN_PAREN_EXPECTED)?;
        let args = if self.check(TokenKind::CloseParen) {
            vec![]
        } else {
            self.parse_arguments()?
        };
        self.expect(TokenKind::CloseParen, messages::CLOSE_PAREN_OR_COMMA_EXPECTED)?;
        Ok(args)
    }

    fn parse_arguments(&mut self) -> ParseResult<Vec<Expr>> {
        let mut args = vec![self.parse_conditional()?];
        while self.check(TokenKind::Comma) {
            self.advance()?;
            args.push(self.parse_conditional()?);
        }
        Ok(args)
    }
}

/// Compiles `text` as the body of a lambda over one unnamed parameter of
/// type `it_type`, which the body sees as `it`.
///
/// # Examples
///
/// ```
/// use dynlinq::{parse_lambda, ParsingConfig};
/// use dynlinq::types::{ClassType, Type};
///
/// let person = ClassType::builder("Person").property("Age", Type::Int32).build();
/// let config = ParsingConfig::default();
/// let lambda = parse_lambda(&config, person, None, "Age > 18", vec![]).unwrap();
/// assert_eq!(lambda.ty.to_string(), "Func<Person, Boolean>");
/// ```
pub fn parse_lambda(
    config: &ParsingConfig,
    it_type: Type,
    result_type: Option<Type>,
    text: &str,
    values: Vec<Argument>,
) -> ParseResult<Expr> {
    let it = Parameter::new("", it_type);
    parse_lambda_with(config, &[it], result_type, text, values)
}

/// Compiles `text` as the body of a lambda over `parameters`.
pub fn parse_lambda_with(
    config: &ParsingConfig,
    parameters: &[Parameter],
    result_type: Option<Type>,
    text: &str,
    values: Vec<Argument>,
) -> ParseResult<Expr> {
    let mut parser = Parser::new(config, parameters, text, values)?;
    let body = parser.parse(result_type.as_ref())?;
    Ok(Expr::lambda(parameters.to_vec(), body))
}
