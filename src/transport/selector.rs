//! Message selectors.
//!
//! A selector is a SQL92-style condition over message header fields and
//! properties:
//!
//! ```text
//! JMSCorrelationID = 'order-42'
//! Region = 'EMEA' AND (Weight > 100 OR NOT Express = TRUE)
//! ```
//!
//! Selectors are parsed once, when a consumer is created, and evaluated by
//! the queue manager at get time.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use super::structures::{
    ID_LEN, MessageDescriptor, Persistence, PropertyValue, encode_id, hex,
};

/// Selector syntax error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} at position {position}")]
pub struct SelectorError {
    /// Byte offset in the selector text.
    pub position: usize,
    /// What went wrong.
    pub message: String,
}

impl SelectorError {
    fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `<>` or `!=`
    Ne,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Le,
    /// `>=`
    Ge,
}

impl CompareOp {
    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::Gt => ordering == Ordering::Greater,
            Self::Le => ordering != Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
        };
        f.write_str(symbol)
    }
}

/// Field a comparison reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    /// `JMSCorrelationID`
    CorrelationId,
    /// `JMSMessageID`
    MessageId,
    /// `JMSPriority`
    Priority,
    /// `JMSDeliveryMode`
    DeliveryMode,
    /// Application property.
    Property(String),
}

impl Field {
    fn from_identifier(name: &str) -> Self {
        match name {
            "JMSCorrelationID" => Self::CorrelationId,
            "JMSMessageID" => Self::MessageId,
            "JMSPriority" => Self::Priority,
            "JMSDeliveryMode" => Self::DeliveryMode,
            other => Self::Property(other.to_string()),
        }
    }
}

/// Literal operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// `'text'`
    Str(String),
    /// `42`
    Int(i64),
    /// `4.2`
    Double(f64),
    /// `TRUE` / `FALSE`
    Bool(bool),
}

/// Parsed selector expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Either side holds.
    Or(Box<Expr>, Box<Expr>),
    /// Both sides hold.
    And(Box<Expr>, Box<Expr>),
    /// Negation.
    Not(Box<Expr>),
    /// `field op literal`
    Compare {
        /// Field read from the message.
        field: Field,
        /// Operator.
        op: CompareOp,
        /// Literal operand.
        value: Literal,
    },
}

/// A validated message selector.
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    text: String,
    expr: Expr,
}

impl Selector {
    /// Parse and validate a selector.
    pub fn parse(text: &str) -> Result<Self, SelectorError> {
        let tokens = tokenize(text)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            end: text.len(),
            depth: 0,
        };
        let expr = parser.parse_or()?;
        if let Some((position, token)) = parser.tokens.get(parser.pos) {
            return Err(SelectorError::new(
                *position,
                format!("unexpected {token}"),
            ));
        }
        Ok(Self {
            text: text.to_string(),
            expr,
        })
    }

    /// Original selector text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Parsed expression tree.
    #[must_use]
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Correlation id when the whole selector is `JMSCorrelationID = '...'`.
    ///
    /// Queue managers can serve this case from an index instead of scanning.
    #[must_use]
    pub fn correlation_id(&self) -> Option<[u8; ID_LEN]> {
        match &self.expr {
            Expr::Compare {
                field: Field::CorrelationId,
                op: CompareOp::Eq,
                value: Literal::Str(value),
            } => Some(encode_id(value)),
            _ => None,
        }
    }

    /// Evaluate against a message's descriptor and properties.
    ///
    /// Only a definite `true` matches. A comparison against a missing
    /// property is unknown, and unknown stays unknown under `NOT`.
    #[must_use]
    pub fn matches(
        &self,
        md: &MessageDescriptor,
        properties: &BTreeMap<String, PropertyValue>,
    ) -> bool {
        eval(&self.expr, md, properties) == Some(true)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Three-valued evaluation; `None` is SQL unknown.
fn eval(
    expr: &Expr,
    md: &MessageDescriptor,
    properties: &BTreeMap<String, PropertyValue>,
) -> Option<bool> {
    match expr {
        Expr::Or(left, right) => match (eval(left, md, properties), eval(right, md, properties)) {
            (Some(true), _) | (_, Some(true)) => Some(true),
            (Some(false), Some(false)) => Some(false),
            _ => None,
        },
        Expr::And(left, right) => match (eval(left, md, properties), eval(right, md, properties)) {
            (Some(false), _) | (_, Some(false)) => Some(false),
            (Some(true), Some(true)) => Some(true),
            _ => None,
        },
        Expr::Not(inner) => eval(inner, md, properties).map(|value| !value),
        Expr::Compare { field, op, value } => compare_field(field, *op, value, md, properties),
    }
}

fn compare_field(
    field: &Field,
    op: CompareOp,
    value: &Literal,
    md: &MessageDescriptor,
    properties: &BTreeMap<String, PropertyValue>,
) -> Option<bool> {
    match field {
        Field::CorrelationId => match (op, value) {
            (CompareOp::Eq, Literal::Str(s)) => Some(encode_id(s) == md.correl_id),
            (CompareOp::Ne, Literal::Str(s)) => Some(encode_id(s) != md.correl_id),
            _ => None,
        },
        Field::MessageId => {
            let actual = format!("ID:{}", hex(&md.msg_id));
            compare_values(&PropertyValue::String(actual), op, value)
        }
        Field::Priority => compare_values(&PropertyValue::Int(i64::from(md.priority)), op, value),
        Field::DeliveryMode => {
            let mode = match md.persistence {
                Persistence::Persistent => "PERSISTENT",
                Persistence::NotPersistent => "NON_PERSISTENT",
                Persistence::AsQueueDef => return None,
            };
            compare_values(&PropertyValue::String(mode.to_string()), op, value)
        }
        Field::Property(name) => properties
            .get(name)
            .and_then(|actual| compare_values(actual, op, value)),
    }
}

#[allow(clippy::cast_precision_loss)]
fn compare_values(actual: &PropertyValue, op: CompareOp, literal: &Literal) -> Option<bool> {
    let ordering = match (actual, literal) {
        (PropertyValue::String(a), Literal::Str(b)) => Some(a.as_str().cmp(b.as_str())),
        (PropertyValue::Int(a), Literal::Int(b)) => Some(a.cmp(b)),
        (PropertyValue::Int(a), Literal::Double(b)) => (*a as f64).partial_cmp(b),
        (PropertyValue::Double(a), Literal::Int(b)) => a.partial_cmp(&(*b as f64)),
        (PropertyValue::Double(a), Literal::Double(b)) => a.partial_cmp(b),
        (PropertyValue::Bool(a), Literal::Bool(b)) => {
            if matches!(op, CompareOp::Eq | CompareOp::Ne) {
                Some(a.cmp(b))
            } else {
                None
            }
        }
        _ => None,
    };
    ordering.map(|ordering| op.accepts(ordering))
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Literal(Literal),
    Op(CompareOp),
    LParen,
    RParen,
    And,
    Or,
    Not,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ident(name) => write!(f, "identifier '{name}'"),
            Self::Literal(Literal::Str(s)) => write!(f, "string '{s}'"),
            Self::Literal(Literal::Int(n)) => write!(f, "number {n}"),
            Self::Literal(Literal::Double(n)) => write!(f, "number {n}"),
            Self::Literal(Literal::Bool(b)) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Self::Op(op) => write!(f, "operator '{op}'"),
            Self::LParen => f.write_str("'('"),
            Self::RParen => f.write_str("')'"),
            Self::And => f.write_str("AND"),
            Self::Or => f.write_str("OR"),
            Self::Not => f.write_str("NOT"),
        }
    }
}

fn tokenize(text: &str) -> Result<Vec<(usize, Token)>, SelectorError> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;
        match c {
            b' ' | b'\t' | b'\r' | b'\n' => {
                i += 1;
            }
            b'(' => {
                tokens.push((start, Token::LParen));
                i += 1;
            }
            b')' => {
                tokens.push((start, Token::RParen));
                i += 1;
            }
            b'=' => {
                tokens.push((start, Token::Op(CompareOp::Eq)));
                i += 1;
            }
            b'!' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push((start, Token::Op(CompareOp::Ne)));
                    i += 2;
                } else {
                    return Err(SelectorError::new(start, "expected '=' after '!'"));
                }
            }
            b'<' => match bytes.get(i + 1) {
                Some(b'>') => {
                    tokens.push((start, Token::Op(CompareOp::Ne)));
                    i += 2;
                }
                Some(b'=') => {
                    tokens.push((start, Token::Op(CompareOp::Le)));
                    i += 2;
                }
                _ => {
                    tokens.push((start, Token::Op(CompareOp::Lt)));
                    i += 1;
                }
            },
            b'>' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push((start, Token::Op(CompareOp::Ge)));
                    i += 2;
                } else {
                    tokens.push((start, Token::Op(CompareOp::Gt)));
                    i += 1;
                }
            }
            b'\'' => {
                let (value, next) = read_string(text, start)?;
                tokens.push((start, Token::Literal(Literal::Str(value))));
                i = next;
            }
            b'0'..=b'9' | b'-' | b'+' | b'.' => {
                let (literal, next) = read_number(text, start)?;
                tokens.push((start, Token::Literal(literal)));
                i = next;
            }
            c if c.is_ascii_alphabetic() || c == b'_' || c == b'$' => {
                let mut end = i;
                while end < bytes.len()
                    && (bytes[end].is_ascii_alphanumeric() || matches!(bytes[end], b'_' | b'$' | b'.'))
                {
                    end += 1;
                }
                let word = &text[start..end];
                let token = match word.to_ascii_uppercase().as_str() {
                    "AND" => Token::And,
                    "OR" => Token::Or,
                    "NOT" => Token::Not,
                    "TRUE" => Token::Literal(Literal::Bool(true)),
                    "FALSE" => Token::Literal(Literal::Bool(false)),
                    _ => Token::Ident(word.to_string()),
                };
                tokens.push((start, token));
                i = end;
            }
            _ => {
                let ch = text[start..].chars().next().unwrap_or('?');
                return Err(SelectorError::new(start, format!("unexpected character '{ch}'")));
            }
        }
    }

    Ok(tokens)
}

fn read_string(text: &str, start: usize) -> Result<(String, usize), SelectorError> {
    let mut value = String::new();
    let mut chars = text[start + 1..].char_indices().peekable();
    while let Some((offset, ch)) = chars.next() {
        if ch == '\'' {
            // '' is an escaped quote
            if let Some((_, '\'')) = chars.peek() {
                value.push('\'');
                chars.next();
                continue;
            }
            return Ok((value, start + 1 + offset + 1));
        }
        value.push(ch);
    }
    Err(SelectorError::new(start, "unterminated string literal"))
}

fn read_number(text: &str, start: usize) -> Result<(Literal, usize), SelectorError> {
    let bytes = text.as_bytes();
    let mut end = start;
    if matches!(bytes[end], b'-' | b'+') {
        end += 1;
    }
    while end < bytes.len() && (bytes[end].is_ascii_digit() || bytes[end] == b'.') {
        end += 1;
    }
    let raw = &text[start..end];
    if raw.contains('.') {
        raw.parse::<f64>()
            .map(|value| (Literal::Double(value), end))
            .map_err(|_| SelectorError::new(start, format!("invalid number '{raw}'")))
    } else {
        raw.parse::<i64>()
            .map(|value| (Literal::Int(value), end))
            .map_err(|_| SelectorError::new(start, format!("invalid number '{raw}'")))
    }
}

/// Deepest `NOT` / parenthesis nesting a selector may use.
pub const MAX_NESTING: usize = 128;

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, token)| token)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |(pos, _)| *pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, token)| token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_or(&mut self) -> Result<Expr, SelectorError> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, SelectorError> {
        let mut left = self.parse_not()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, SelectorError> {
        if !matches!(self.peek(), Some(Token::Not | Token::LParen)) {
            return self.parse_comparison();
        }
        if self.depth >= MAX_NESTING {
            return Err(SelectorError::new(
                self.position(),
                "selector nested too deeply",
            ));
        }
        self.depth += 1;
        let expr = self.parse_nested();
        self.depth -= 1;
        expr
    }

    fn parse_nested(&mut self) -> Result<Expr, SelectorError> {
        match self.next() {
            Some(Token::Not) => Ok(Expr::Not(Box::new(self.parse_not()?))),
            _ => {
                let inner = self.parse_or()?;
                let position = self.position();
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(SelectorError::new(position, "expected ')'")),
                }
            }
        }
    }

    fn parse_comparison(&mut self) -> Result<Expr, SelectorError> {
        let position = self.position();
        let field = match self.next() {
            Some(Token::Ident(name)) => Field::from_identifier(&name),
            Some(other) => {
                return Err(SelectorError::new(
                    position,
                    format!("expected identifier, found {other}"),
                ));
            }
            None => return Err(SelectorError::new(position, "expected identifier")),
        };

        let position = self.position();
        let op = match self.next() {
            Some(Token::Op(op)) => op,
            _ => {
                return Err(SelectorError::new(
                    position,
                    "expected comparison operator",
                ));
            }
        };

        let position = self.position();
        let value = match self.next() {
            Some(Token::Literal(literal)) => literal,
            _ => return Err(SelectorError::new(position, "expected literal value")),
        };

        Ok(Expr::Compare { field, op, value })
    }
}
