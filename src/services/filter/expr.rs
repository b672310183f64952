//! Lexer and recursive-descent parser for structured filter expressions.
//!
//! The accepted grammar is a small boolean language over event fields:
//! `and`/`or`/`not`, the comparisons `= <> < <= > >=`, `like`/`not like`
//! with `%`/`_` wildcards, an optional trailing `ci` modifier, string
//! (`'...'`, `''` escapes a quote), number, `true`/`false`/`null`
//! literals, `@`-prefixed built-in fields and bare identifiers.
//!
//! Compile failures are reported, never panicked on: the factory treats
//! any [`CompileError`] as a cue to fall back to substring search.

use regex::Regex;
use thiserror::Error;

use super::resolver::NameResolver;

/// Why an expression failed to compile. Internal to the filter module;
/// the factory absorbs it and falls back to substring matching.
#[derive(Debug, Error)]
#[error("{0}")]
pub(crate) struct CompileError(pub String);

/// A built-in (reified) event field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BuiltInField {
    Exception,
    Level,
    Message,
    MessageTemplate,
    Properties,
    Timestamp,
}

impl BuiltInField {
    fn from_short_name(name: &str) -> Option<Self> {
        match name {
            "x" => Some(BuiltInField::Exception),
            "l" => Some(BuiltInField::Level),
            "m" => Some(BuiltInField::Message),
            "mt" => Some(BuiltInField::MessageTemplate),
            "p" => Some(BuiltInField::Properties),
            "t" => Some(BuiltInField::Timestamp),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Parsed expression tree.
#[derive(Debug, Clone)]
pub(crate) enum Expr {
    Str(String),
    Num(f64),
    Bool(bool),
    Null,
    BuiltIn(BuiltInField),
    Property(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare {
        op: CompareOp,
        case_insensitive: bool,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Like {
        negated: bool,
        regex: Box<Regex>,
        value: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    BuiltIn(String),
    Str(String),
    Num(f64),
    LParen,
    RParen,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,
    Like,
    Ci,
    True,
    False,
    Null,
}

fn tokenize(input: &str) -> Result<Vec<Token>, CompileError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '=' => {
                chars.next();
                tokens.push(Token::Eq);
            }
            '<' => {
                chars.next();
                match chars.peek() {
                    Some('>') => {
                        chars.next();
                        tokens.push(Token::Ne);
                    }
                    Some('=') => {
                        chars.next();
                        tokens.push(Token::Le);
                    }
                    _ => tokens.push(Token::Lt),
                }
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Ge);
                } else {
                    tokens.push(Token::Gt);
                }
            }
            '@' => {
                chars.next();
                let name = take_identifier(&mut chars);
                if name.is_empty() {
                    return Err(CompileError("expected name after '@'".to_string()));
                }
                tokens.push(Token::BuiltIn(name));
            }
            '\'' => {
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some('\'') => {
                            // '' inside a string is an escaped quote
                            if chars.peek() == Some(&'\'') {
                                chars.next();
                                text.push('\'');
                            } else {
                                break;
                            }
                        }
                        Some(c) => text.push(c),
                        None => {
                            return Err(CompileError("unterminated string literal".to_string()))
                        }
                    }
                }
                tokens.push(Token::Str(text));
            }
            c if c.is_ascii_digit() => {
                let mut number = String::new();
                while let Some(&digit) = chars.peek() {
                    if digit.is_ascii_digit() || digit == '.' {
                        number.push(digit);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value: f64 = number
                    .parse()
                    .map_err(|_| CompileError(format!("invalid number literal '{}'", number)))?;
                tokens.push(Token::Num(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let word = take_identifier(&mut chars);
                tokens.push(keyword_or_identifier(word));
            }
            other => {
                return Err(CompileError(format!(
                    "unexpected character '{}' in expression",
                    other
                )))
            }
        }
    }

    Ok(tokens)
}

fn take_identifier(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut name = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_alphanumeric() || c == '_' {
            name.push(c);
            chars.next();
        } else {
            break;
        }
    }
    name
}

fn keyword_or_identifier(word: String) -> Token {
    match word.to_ascii_lowercase().as_str() {
        "and" => Token::And,
        "or" => Token::Or,
        "not" => Token::Not,
        "like" => Token::Like,
        "ci" => Token::Ci,
        "true" => Token::True,
        "false" => Token::False,
        "null" => Token::Null,
        _ => Token::Ident(word),
    }
}

/// Compile an expression string into an [`Expr`] tree.
pub(crate) fn compile(input: &str, resolver: &dyn NameResolver) -> Result<Expr, CompileError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        position: 0,
        resolver,
    };
    let expr = parser.parse_or()?;
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(CompileError(format!(
            "unexpected trailing token {:?}",
            token
        ))),
    }
}

struct Parser<'a> {
    tokens: Vec<Token>,
    position: usize,
    resolver: &'a dyn NameResolver,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::Or) {
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.parse_not()?;
        while self.eat(&Token::And) {
            let rhs = self.parse_not()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, CompileError> {
        if self.eat(&Token::Not) {
            // `not like` is handled in parse_comparison; a bare `not`
            // here negates the comparison that follows
            if self.peek() == Some(&Token::Like) {
                return Err(CompileError("'not like' requires a left operand".to_string()));
            }
            let inner = self.parse_not()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, CompileError> {
        let lhs = self.parse_primary()?;

        let op = match self.peek() {
            Some(Token::Eq) => Some(CompareOp::Eq),
            Some(Token::Ne) => Some(CompareOp::Ne),
            Some(Token::Lt) => Some(CompareOp::Lt),
            Some(Token::Le) => Some(CompareOp::Le),
            Some(Token::Gt) => Some(CompareOp::Gt),
            Some(Token::Ge) => Some(CompareOp::Ge),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let rhs = self.parse_primary()?;
            let case_insensitive = self.eat(&Token::Ci);
            return Ok(Expr::Compare {
                op,
                case_insensitive,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            });
        }

        let negated = if self.peek() == Some(&Token::Not) {
            // only `not like` is valid in this position
            if self.tokens.get(self.position + 1) == Some(&Token::Like) {
                self.advance();
                true
            } else {
                return Ok(lhs);
            }
        } else {
            false
        };
        if self.eat(&Token::Like) {
            let pattern = match self.advance() {
                Some(Token::Str(pattern)) => pattern,
                other => {
                    return Err(CompileError(format!(
                        "'like' requires a string literal pattern, got {:?}",
                        other
                    )))
                }
            };
            let case_insensitive = self.eat(&Token::Ci);
            let regex = like_to_regex(&pattern, case_insensitive)?;
            return Ok(Expr::Like {
                negated,
                regex: Box::new(regex),
                value: Box::new(lhs),
            });
        }

        Ok(lhs)
    }

    fn parse_primary(&mut self) -> Result<Expr, CompileError> {
        match self.advance() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                if self.eat(&Token::RParen) {
                    Ok(inner)
                } else {
                    Err(CompileError("missing closing parenthesis".to_string()))
                }
            }
            Some(Token::Str(text)) => Ok(Expr::Str(text)),
            Some(Token::Num(value)) => Ok(Expr::Num(value)),
            Some(Token::True) => Ok(Expr::Bool(true)),
            Some(Token::False) => Ok(Expr::Bool(false)),
            Some(Token::Null) => Ok(Expr::Null),
            Some(Token::BuiltIn(name)) => self.resolve_builtin(&name).map(Expr::BuiltIn),
            Some(Token::Ident(name)) => {
                // friendly aliases win over same-named user properties
                match self.resolve_alias(&name) {
                    Some(field) => Ok(Expr::BuiltIn(field)),
                    None => Ok(Expr::Property(name)),
                }
            }
            other => Err(CompileError(format!(
                "expected a value or field, got {:?}",
                other
            ))),
        }
    }

    /// `@name`: short names are direct, anything else must be a known alias.
    fn resolve_builtin(&self, name: &str) -> Result<BuiltInField, CompileError> {
        if let Some(field) = BuiltInField::from_short_name(name) {
            return Ok(field);
        }
        self.resolve_alias(name)
            .ok_or_else(|| CompileError(format!("unknown built-in field '@{}'", name)))
    }

    fn resolve_alias(&self, name: &str) -> Option<BuiltInField> {
        self.resolver
            .resolve_builtin_alias(name)
            .and_then(BuiltInField::from_short_name)
    }
}

/// Translate a `like` pattern (`%` = any run, `_` = any single char)
/// into an anchored regex.
fn like_to_regex(pattern: &str, case_insensitive: bool) -> Result<Regex, CompileError> {
    let mut source = String::with_capacity(pattern.len() + 8);
    if case_insensitive {
        source.push_str("(?i)");
    }
    source.push('^');
    for ch in pattern.chars() {
        match ch {
            '%' => source.push_str("(?s:.*)"),
            '_' => source.push_str("(?s:.)"),
            other => source.push_str(&regex::escape(&other.to_string())),
        }
    }
    source.push('$');
    Regex::new(&source).map_err(|e| CompileError(format!("invalid like pattern: {}", e)))
}
