use crate::ast::tokens::operator_alias;
use crate::ast::{Token, TokenKind};
use crate::error::{messages, ParseError, ParseResult};

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    decimal_separator: char,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer::with_decimal_separator(input, '.')
    }

    /// Creates a lexer that recognizes `separator` as the decimal point of
    /// real literals.
    pub fn with_decimal_separator(input: &str, separator: char) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
            decimal_separator: separator,
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    /// One character of lookahead past the current scan position.
    pub fn peek_char(&self) -> Option<char> {
        self.peek_at(1)
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn text_from(&self, start: usize) -> String {
        self.input[start..self.position].iter().collect()
    }

    fn is_identifier_start(ch: char) -> bool {
        ch.is_alphabetic() || matches!(ch, '@' | '_' | '$' | '^' | '~')
    }

    fn read_identifier(&mut self, start: usize) -> Token {
        self.advance();
        while let Some(ch) = self.current_char() {
            if ch.is_alphanumeric() || ch == '_' {
                self.advance();
            } else {
                break;
            }
        }
        let text = self.text_from(start);
        match operator_alias(&text) {
            Some(kind) => Token::new(kind, text, start),
            None => Token::new(TokenKind::Identifier, text, start),
        }
    }

    fn read_string(&mut self, quote: char, start: usize) -> ParseResult<Token> {
        self.advance(); // opening quote

        loop {
            match self.current_char() {
                None => {
                    return Err(ParseError::new(
                        start,
                        messages::UNTERMINATED_STRING_LITERAL,
                    ));
                }
                Some('\\') => {
                    self.advance();
                    if self.current_char().is_none() {
                        return Err(ParseError::new(
                            start,
                            messages::UNTERMINATED_STRING_LITERAL,
                        ));
                    }
                    self.advance();
                }
                Some(ch) if ch == quote => {
                    self.advance();
                    // A doubled delimiter stands for one literal delimiter.
                    if self.current_char() == Some(quote) {
                        self.advance();
                        continue;
                    }
                    break;
                }
                Some(_) => self.advance(),
            }
        }

        let text = self.text_from(start);
        let value = unescape(&text, start)?;
        if quote == '\'' && value.chars().count() != 1 {
            return Err(ParseError::new(
                start,
                messages::INVALID_CHARACTER_LITERAL,
            ));
        }
        Ok(Token::new(TokenKind::StringLiteral, text, start))
    }

    fn read_digits(&mut self) {
        while self.current_char().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
    }

    fn read_qualifiers(&mut self, letters: &[char]) {
        while self.current_char().is_some_and(|c| letters.contains(&c)) {
            self.advance();
        }
    }

    fn read_number(&mut self, start: usize) -> ParseResult<Token> {
        self.read_digits();

        if self.position == start + 1
            && self.input[start] == '0'
            && matches!(self.current_char(), Some('x' | 'X'))
        {
            self.advance();
            if !self.current_char().is_some_and(|c| c.is_ascii_hexdigit()) {
                return Err(ParseError::new(
                    self.position,
                    messages::HEX_DIGIT_EXPECTED,
                ));
            }
            while self.current_char().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.advance();
            }
            self.read_qualifiers(&HEX_QUALIFIERS);
            return Ok(Token::new(
                TokenKind::IntegerLiteral,
                self.text_from(start),
                start,
            ));
        }

        let mut kind = TokenKind::IntegerLiteral;

        if self.current_char() == Some(self.decimal_separator)
            && self.peek_char().is_some_and(|c| c.is_ascii_digit())
        {
            kind = TokenKind::RealLiteral;
            self.advance();
            self.read_digits();
        }

        if matches!(self.current_char(), Some('e' | 'E')) {
            let signed = matches!(self.peek_char(), Some('+' | '-'));
            let digit_at = if signed { 2 } else { 1 };
            if self.peek_at(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                kind = TokenKind::RealLiteral;
                self.advance();
                if signed {
                    self.advance();
                }
                self.read_digits();
            }
        }

        if kind == TokenKind::IntegerLiteral {
            self.read_qualifiers(&DECIMAL_QUALIFIERS);
        } else {
            self.read_qualifiers(&REAL_QUALIFIERS);
        }

        Ok(Token::new(kind, self.text_from(start), start))
    }

    /// Produces a token of `kind` after consuming `len` characters.
    fn punct(&mut self, kind: TokenKind, len: usize, start: usize) -> Token {
        for _ in 0..len {
            self.advance();
        }
        Token::new(kind, self.text_from(start), start)
    }

    pub fn next_token(&mut self) -> ParseResult<Token> {
        self.skip_whitespace();
        let start = self.position;
        let next = self.peek_char();

        let token = match self.current_char() {
            None => Token::new(TokenKind::End, "", start),
            Some('!') if next == Some('=') => self.punct(TokenKind::ExclamationEqual, 2, start),
            Some('!') => self.punct(TokenKind::Exclamation, 1, start),
            Some('%') => self.punct(TokenKind::Percent, 1, start),
            Some('&') if next == Some('&') => self.punct(TokenKind::DoubleAmpersand, 2, start),
            Some('&') => self.punct(TokenKind::Ampersand, 1, start),
            Some('(') => self.punct(TokenKind::OpenParen, 1, start),
            Some(')') => self.punct(TokenKind::CloseParen, 1, start),
            Some('{') => self.punct(TokenKind::OpenCurlyParen, 1, start),
            Some('}') => self.punct(TokenKind::CloseCurlyParen, 1, start),
            Some('*') => self.punct(TokenKind::Asterisk, 1, start),
            Some('+') => self.punct(TokenKind::Plus, 1, start),
            Some(',') => self.punct(TokenKind::Comma, 1, start),
            Some('-') => self.punct(TokenKind::Minus, 1, start),
            Some('.') => self.punct(TokenKind::Dot, 1, start),
            Some('/') => self.punct(TokenKind::Slash, 1, start),
            Some(':') => self.punct(TokenKind::Colon, 1, start),
            Some('<') => match next {
                Some('=') => self.punct(TokenKind::LessThanEqual, 2, start),
                Some('>') => self.punct(TokenKind::LessGreater, 2, start),
                Some('<') => self.punct(TokenKind::DoubleLessThan, 2, start),
                _ => self.punct(TokenKind::LessThan, 1, start),
            },
            Some('=') => match next {
                Some('=') => self.punct(TokenKind::DoubleEqual, 2, start),
                Some('>') => self.punct(TokenKind::Lambda, 2, start),
                _ => self.punct(TokenKind::Equal, 1, start),
            },
            Some('>') => match next {
                Some('=') => self.punct(TokenKind::GreaterThanEqual, 2, start),
                Some('>') => self.punct(TokenKind::DoubleGreaterThan, 2, start),
                _ => self.punct(TokenKind::GreaterThan, 1, start),
            },
            Some('?') => match next {
                Some('?') => self.punct(TokenKind::NullCoalescing, 2, start),
                Some('.') => self.punct(TokenKind::NullPropagation, 2, start),
                _ => self.punct(TokenKind::Question, 1, start),
            },
            Some('[') => self.punct(TokenKind::OpenBracket, 1, start),
            Some(']') => self.punct(TokenKind::CloseBracket, 1, start),
            Some('|') if next == Some('|') => self.punct(TokenKind::DoubleBar, 2, start),
            Some('|') => self.punct(TokenKind::Bar, 1, start),
            Some(quote @ ('"' | '\'')) => self.read_string(quote, start)?,
            Some(ch) if Lexer::is_identifier_start(ch) => self.read_identifier(start),
            Some(ch) if ch.is_ascii_digit() => self.read_number(start)?,
            Some(ch) => {
                return Err(ParseError::new(start, messages::invalid_character(ch)));
            }
        };
        Ok(token)
    }
}

const HEX_QUALIFIERS: [char; 4] = ['U', 'u', 'L', 'l'];
const DECIMAL_QUALIFIERS: [char; 10] = ['U', 'u', 'L', 'l', 'F', 'f', 'D', 'd', 'M', 'm'];
const REAL_QUALIFIERS: [char; 6] = ['F', 'f', 'D', 'd', 'M', 'm'];

/// Decodes the raw text of a string literal token, quotes included.
///
/// Both backslash escapes and doubled delimiters are honored. `position` is
/// the offset of the literal, used for error reporting.
pub fn unescape(raw: &str, position: usize) -> ParseResult<String> {
    let chars: Vec<char> = raw.chars().collect();
    if chars.len() < 2 {
        return Err(ParseError::new(
            position,
            messages::UNTERMINATED_STRING_LITERAL,
        ));
    }
    let quote = chars[0];
    let body = &chars[1..chars.len() - 1];
    let mut result = String::with_capacity(body.len());
    let mut i = 0;

    while i < body.len() {
        let ch = body[i];
        if ch == '\\' {
            let escaped = body.get(i + 1).copied().ok_or_else(|| {
                ParseError::new(position, messages::UNTERMINATED_STRING_LITERAL)
            })?;
            match escaped {
                'n' => result.push('\n'),
                't' => result.push('\t'),
                'r' => result.push('\r'),
                '0' => result.push('\0'),
                'a' => result.push('\u{7}'),
                'b' => result.push('\u{8}'),
                'f' => result.push('\u{c}'),
                'v' => result.push('\u{b}'),
                '\\' => result.push('\\'),
                '"' => result.push('"'),
                '\'' => result.push('\''),
                'u' => {
                    let hex: String = body.iter().skip(i + 2).take(4).collect();
                    let code = (hex.len() == 4)
                        .then(|| u32::from_str_radix(&hex, 16).ok())
                        .flatten()
                        .and_then(char::from_u32)
                        .ok_or_else(|| {
                            ParseError::new(position + i + 1, messages::invalid_escape('u'))
                        })?;
                    result.push(code);
                    i += 4;
                }
                other => {
                    return Err(ParseError::new(
                        position + i + 1,
                        messages::invalid_escape(other),
                    ));
                }
            }
            i += 2;
        } else if ch == quote {
            // only reachable as the first half of a doubled delimiter
            result.push(quote);
            i += 2;
        } else {
            result.push(ch);
            i += 1;
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(input);
        let mut kinds = vec![];
        loop {
            let token = lexer.next_token().unwrap();
            if token.kind == TokenKind::End {
                break;
            }
            kinds.push(token.kind);
        }
        kinds
    }

    #[test]
    fn test_word_aliases() {
        assert_eq!(
            kinds("a AND b Or not c mod 2"),
            vec![
                TokenKind::Identifier,
                TokenKind::DoubleAmpersand,
                TokenKind::Identifier,
                TokenKind::DoubleBar,
                TokenKind::Exclamation,
                TokenKind::Identifier,
                TokenKind::Percent,
                TokenKind::IntegerLiteral,
            ]
        );
    }

    #[test]
    fn test_doubled_quote() {
        let mut lexer = Lexer::new(r#""say ""hi""""#);
        let token = lexer.next_token().unwrap();
        assert_eq!(token.kind, TokenKind::StringLiteral);
        assert_eq!(unescape(&token.text, 0).unwrap(), r#"say "hi""#);
    }
}
