/// Classification of a lexical token.
///
/// Word operators (`and`, `eq`, `mod`, ...) never survive as
/// [`TokenKind::Identifier`]: the lexer rewrites them to the operator they
/// alias before the parser sees them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Literals and names
    /// Identifier, including the context symbols `$`, `^`, `~` and
    /// `@`-prefixed names
    ///
    /// # Examples
    /// ```text
    /// Name
    /// @0
    /// @new
    /// $
    /// ```
    Identifier,

    /// Quoted literal, `"..."` or `'...'`. The token text keeps the quotes.
    StringLiteral,

    /// Decimal or hexadecimal integer with optional qualifier suffix
    ///
    /// # Examples
    /// ```text
    /// 42
    /// 0xFF
    /// 10UL
    /// ```
    IntegerLiteral,

    /// Number with a decimal point or an exponent
    ///
    /// # Examples
    /// ```text
    /// 3.5
    /// 1e10
    /// 3.5f
    /// ```
    RealLiteral,

    // Single character punctuation
    /// `!` (also `not`)
    Exclamation,
    /// `%` (also `mod`)
    Percent,
    /// `&`
    Ampersand,
    /// `(`
    OpenParen,
    /// `)`
    CloseParen,
    /// `{`
    OpenCurlyParen,
    /// `}`
    CloseCurlyParen,
    /// `*`
    Asterisk,
    /// `+`
    Plus,
    /// `,`
    Comma,
    /// `-`
    Minus,
    /// `.`
    Dot,
    /// `/`
    Slash,
    /// `:`
    Colon,
    /// `<` (also `lt`)
    LessThan,
    /// `=`
    Equal,
    /// `>` (also `gt`)
    GreaterThan,
    /// `?`
    Question,
    /// `[`
    OpenBracket,
    /// `]`
    CloseBracket,
    /// `|`
    Bar,

    // Two character operators
    /// `!=` (also `ne`, `neq`, `notequal`)
    ExclamationEqual,
    /// `&&` (also `and`, `andalso`)
    DoubleAmpersand,
    /// `<=` (also `le`)
    LessThanEqual,
    /// `<>`
    LessGreater,
    /// `==` (also `eq`, `equal`)
    DoubleEqual,
    /// `>=` (also `ge`)
    GreaterThanEqual,
    /// `||` (also `or`, `orelse`)
    DoubleBar,
    /// `=>`
    Lambda,
    /// `??`
    NullCoalescing,
    /// `?.`
    NullPropagation,
    /// `<<`
    DoubleLessThan,
    /// `>>`
    DoubleGreaterThan,

    /// End of input
    End,
}

/// A classified slice of the input text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Raw source text of the token. For aliased word operators this is the
    /// word as written.
    pub text: String,
    /// Character offset of the first character.
    pub position: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, position: usize) -> Self {
        Token {
            kind,
            text: text.into(),
            position,
        }
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    /// True when the token is an identifier spelled `word` (ignoring case).
    pub fn is_identifier(&self, word: &str) -> bool {
        self.kind == TokenKind::Identifier && self.text.eq_ignore_ascii_case(word)
    }
}

/// Looks up the operator a word alias stands for.
pub fn operator_alias(word: &str) -> Option<TokenKind> {
    let kind = match word.to_ascii_lowercase().as_str() {
        "eq" | "equal" => TokenKind::DoubleEqual,
        "ne" | "neq" | "notequal" => TokenKind::ExclamationEqual,
        "lt" => TokenKind::LessThan,
        "le" => TokenKind::LessThanEqual,
        "gt" => TokenKind::GreaterThan,
        "ge" => TokenKind::GreaterThanEqual,
        "and" | "andalso" => TokenKind::DoubleAmpersand,
        "or" | "orelse" => TokenKind::DoubleBar,
        "not" => TokenKind::Exclamation,
        "mod" => TokenKind::Percent,
        _ => return None,
    };
    Some(kind)
}
