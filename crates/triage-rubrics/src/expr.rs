//! Boolean condition language used by rubric bands, guards and mappings.
//!
//! ```text
//! Or   := And ('||' And)*
//! And  := Cmp ('&&' Cmp)*
//! Cmp  := Term (('==' | '!=' | '>=' | '<=' | '>' | '<') Term)?
//! Term := number | true | false | identifier | '(' Or ')'
//! ```
//!
//! Identifiers are looked up in a [`Variables`] source. A missing name is
//! *undefined*, which is equal only to another undefined value and makes
//! every ordering comparison false.

use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;
use thiserror::Error;
use triage_core::TriageError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExprError {
    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("invalid number literal '{0}'")]
    InvalidNumber(String),

    #[error("unexpected token {found}, expected {expected}")]
    UnexpectedToken {
        expected: &'static str,
        found: String,
    },
}

impl From<ExprError> for TriageError {
    fn from(err: ExprError) -> Self {
        TriageError::Expression(err.to_string())
    }
}

/// Name lookup for expression identifiers.
pub trait Variables {
    fn lookup(&self, name: &str) -> Option<&Value>;
}

impl<S: BuildHasher> Variables for HashMap<String, Value, S> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl Variables for BTreeMap<String, Value> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl Variables for Map<String, Value> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl Variables for Value {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.as_object().and_then(|obj| obj.get(name))
    }
}

/// True for the catch-all entries `otherwise` and the empty expression.
pub fn is_catch_all(expression: &str) -> bool {
    let trimmed = expression.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case("otherwise")
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExprEvaluator;

impl ExprEvaluator {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate<V: Variables + ?Sized>(
        &self,
        expression: &str,
        vars: &V,
    ) -> Result<bool, ExprError> {
        if is_catch_all(expression) {
            return Ok(true);
        }

        let tokens = tokenize(expression.trim())?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            vars,
        };
        let value = parser.parse_or()?;
        parser.expect_eof()?;
        Ok(truthy(&value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Or,
    And,
    Eq,
    Ne,
    Ge,
    Le,
    Gt,
    Lt,
}

impl Op {
    fn symbol(&self) -> &'static str {
        match self {
            Op::Or => "||",
            Op::And => "&&",
            Op::Eq => "==",
            Op::Ne => "!=",
            Op::Ge => ">=",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Lt => "<",
        }
    }

    fn is_comparison(&self) -> bool {
        !matches!(self, Op::Or | Op::And)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Bool(bool),
    Ident(String),
    Op(Op),
    LParen,
    RParen,
    Eof,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {}", n),
            Token::Bool(b) => format!("boolean {}", b),
            Token::Ident(name) => format!("identifier '{}'", name),
            Token::Op(op) => format!("operator '{}'", op.symbol()),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::Eof => "end of input".to_string(),
        }
    }
}

fn tokenize(src: &str) -> Result<Vec<Token>, ExprError> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let pair = chars.get(i + 1).map(|next| (c, *next));
        let two = match pair {
            Some(('&', '&')) => Some(Op::And),
            Some(('|', '|')) => Some(Op::Or),
            Some(('=', '=')) => Some(Op::Eq),
            Some(('!', '=')) => Some(Op::Ne),
            Some(('>', '=')) => Some(Op::Ge),
            Some(('<', '=')) => Some(Op::Le),
            _ => None,
        };
        if let Some(op) = two {
            tokens.push(Token::Op(op));
            i += 2;
            continue;
        }

        match c {
            '>' => {
                tokens.push(Token::Op(Op::Gt));
                i += 1;
            }
            '<' => {
                tokens.push(Token::Op(Op::Lt));
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let number = literal
                    .parse::<f64>()
                    .map_err(|_| ExprError::InvalidNumber(literal.clone()))?;
                tokens.push(Token::Number(number));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                if word.eq_ignore_ascii_case("true") {
                    tokens.push(Token::Bool(true));
                } else if word.eq_ignore_ascii_case("false") {
                    tokens.push(Token::Bool(false));
                } else {
                    tokens.push(Token::Ident(word));
                }
            }
            other => return Err(ExprError::UnexpectedChar { ch: other, pos: i }),
        }
    }

    tokens.push(Token::Eof);
    Ok(tokens)
}

/// `None` is an undefined operand.
type Operand = Option<Value>;

struct Parser<'a, V: Variables + ?Sized> {
    tokens: Vec<Token>,
    pos: usize,
    vars: &'a V,
}

impl<V: Variables + ?Sized> Parser<'_, V> {
    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn expect_eof(&self) -> Result<(), ExprError> {
        match self.peek() {
            Token::Eof => Ok(()),
            other => Err(ExprError::UnexpectedToken {
                expected: "end of input",
                found: other.describe(),
            }),
        }
    }

    fn parse_or(&mut self) -> Result<Operand, ExprError> {
        let mut left = self.parse_and()?;
        while self.peek() == &Token::Op(Op::Or) {
            self.advance();
            let right = self.parse_and()?;
            left = Some(Value::Bool(truthy(&left) || truthy(&right)));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Operand, ExprError> {
        let mut left = self.parse_comparison()?;
        while self.peek() == &Token::Op(Op::And) {
            self.advance();
            let right = self.parse_comparison()?;
            left = Some(Value::Bool(truthy(&left) && truthy(&right)));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Operand, ExprError> {
        let left = self.parse_term()?;
        let op = match self.peek() {
            Token::Op(op) if op.is_comparison() => *op,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_term()?;

        let result = match op {
            Op::Eq => strict_equals(&left, &right),
            Op::Ne => !strict_equals(&left, &right),
            Op::Ge => to_number(&left) >= to_number(&right),
            Op::Le => to_number(&left) <= to_number(&right),
            Op::Gt => to_number(&left) > to_number(&right),
            Op::Lt => to_number(&left) < to_number(&right),
            Op::Or | Op::And => unreachable!("logical operators are not comparisons"),
        };
        Ok(Some(Value::Bool(result)))
    }

    fn parse_term(&mut self) -> Result<Operand, ExprError> {
        match self.advance() {
            Token::Number(n) => Ok(Some(Value::from(n))),
            Token::Bool(b) => Ok(Some(Value::Bool(b))),
            Token::Ident(name) => Ok(self.vars.lookup(&name).cloned()),
            Token::LParen => {
                let inner = self.parse_or()?;
                match self.advance() {
                    Token::RParen => Ok(inner),
                    other => Err(ExprError::UnexpectedToken {
                        expected: "')'",
                        found: other.describe(),
                    }),
                }
            }
            other => Err(ExprError::UnexpectedToken {
                expected: "a number, boolean, identifier or '('",
                found: other.describe(),
            }),
        }
    }
}

fn strict_equals(left: &Operand, right: &Operand) -> bool {
    match (left, right) {
        (None, None) => true,
        (None, _) | (_, None) => false,
        (Some(Value::Number(a)), Some(Value::Number(b))) => a.as_f64() == b.as_f64(),
        (Some(a), Some(b)) => a == b,
    }
}

fn truthy(value: &Operand) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Numeric coercion for ordering comparisons and weighted inputs.
///
/// Follows the loose conventions responders expect from dashboard
/// expressions: booleans are 1/0, null and blank strings are 0, numeric
/// strings parse, everything else is NaN.
pub(crate) fn coerce_number(value: Option<&Value>) -> f64 {
    match value {
        None => f64::NAN,
        Some(Value::Null) => 0.0,
        Some(Value::Bool(b)) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse::<f64>().unwrap_or(f64::NAN)
            }
        }
        Some(Value::Array(items)) => match items.as_slice() {
            [] => 0.0,
            [single] => coerce_number(Some(single)),
            _ => f64::NAN,
        },
        Some(Value::Object(_)) => f64::NAN,
    }
}

fn to_number(value: &Operand) -> f64 {
    coerce_number(value.as_ref())
}

/// Apply a normalization spec to a raw input.
///
/// Only `clamp:<inMin>..<inMax>-><outMin>..<outMax>` is recognised; any
/// other spec (or none) leaves the value unchanged.
pub fn normalize(value: f64, spec: Option<&str>) -> f64 {
    let Some((in_min, in_max, out_min, out_max)) = spec.and_then(parse_clamp) else {
        return value;
    };
    if value.is_nan() {
        return value;
    }

    let clamped = value.min(in_max).max(in_min);
    let width = in_max - in_min;
    let ratio = (clamped - in_min) / if width == 0.0 { 1.0 } else { width };
    out_min + ratio * (out_max - out_min)
}

fn parse_clamp(spec: &str) -> Option<(f64, f64, f64, f64)> {
    let head = spec.get(..6)?;
    if !head.eq_ignore_ascii_case("clamp:") {
        return None;
    }
    let rest = &spec[6..];

    let (input, output) = rest.split_once("->")?;
    let (in_min, in_max) = input.split_once("..")?;
    let (out_min, out_tail) = output.split_once("..")?;
    // Anything after the final bound is ignored.
    let out_max_len = out_tail
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(out_tail.len());

    Some((
        parse_bound(in_min)?,
        parse_bound(in_max)?,
        parse_bound(out_min)?,
        parse_bound(&out_tail[..out_max_len])?,
    ))
}

/// Digits with an optional fractional part; no sign, no exponent.
fn parse_bound(text: &str) -> Option<f64> {
    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (text, None),
    };
    let digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    if !digits(int_part) || !frac_part.map(digits).unwrap_or(true) {
        return None;
    }
    text.parse().ok()
}
