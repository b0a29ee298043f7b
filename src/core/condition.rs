//! Run predicates - boolean expressions over the trigger context
//!
//! Predicates are written as text in pipeline files and compiled into an
//! expression tree when the pipeline is loaded, so a malformed condition is
//! reported before anything runs:
//!
//! ```text
//! event = tag AND branch != master
//! branch =~ ^release/ OR (tag AND NOT fork)
//! event IN (push, cron)
//! ```
//!
//! `AND` binds tighter than `OR`; `NOT` binds tightest. A bare field is true
//! when it is set and not `false`/`0`/empty.

use crate::core::context::{EventType, TriggerContext};
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const KEYWORDS: [&str; 4] = ["AND", "OR", "NOT", "IN"];

/// Errors produced while compiling a predicate
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PredicateError {
    #[error("empty expression")]
    Empty,

    #[error("expected {expected} at column {column}, found {found}")]
    Unexpected {
        expected: &'static str,
        found: String,
        column: usize,
    },

    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("invalid value '{value}' for field '{field}': {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("invalid regex '{pattern}': {reason}")]
    InvalidRegex { pattern: String, reason: String },

    #[error("unterminated {what} starting at column {column}")]
    Unterminated { what: &'static str, column: usize },
}

/// A trigger-context field a predicate can inspect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    Event,
    Branch,
    Tag,
    Fork,
    BuildNumber,
    /// An invoker-supplied toggle, written `vars.NAME`
    Var(String),
}

impl Field {
    pub fn from_name(name: &str) -> Result<Self, PredicateError> {
        let lower = name.to_ascii_lowercase();
        match lower.as_str() {
            "event" | "type" => Ok(Field::Event),
            "branch" => Ok(Field::Branch),
            "tag" => Ok(Field::Tag),
            "fork" => Ok(Field::Fork),
            "build_number" => Ok(Field::BuildNumber),
            _ if lower.starts_with("vars.") && name.len() > 5 => {
                Ok(Field::Var(name[5..].to_string()))
            }
            _ => Err(PredicateError::UnknownField(name.to_string())),
        }
    }

    /// Current value of the field, `None` when unset
    pub fn resolve(&self, ctx: &TriggerContext) -> Option<String> {
        match self {
            Field::Event => Some(ctx.event().to_string()),
            Field::Branch => ctx.branch().map(str::to_string),
            Field::Tag => ctx.tag().map(str::to_string),
            Field::Fork => Some(ctx.is_fork().to_string()),
            Field::BuildNumber => Some(ctx.build_number().to_string()),
            Field::Var(name) => ctx.var(name).map(str::to_string),
        }
    }

    fn is_truthy(&self, ctx: &TriggerContext) -> bool {
        match self.resolve(ctx) {
            Some(value) => !value.is_empty() && value != "false" && value != "0",
            None => false,
        }
    }

    /// Check and canonicalize a literal compared against this field
    fn normalize(&self, value: String) -> Result<String, PredicateError> {
        let invalid = |reason: String| PredicateError::InvalidValue {
            field: self.to_string(),
            value: value.clone(),
            reason,
        };

        match self {
            Field::Event => value
                .parse::<EventType>()
                .map(|event| event.to_string())
                .map_err(invalid),
            Field::Fork => match value.to_ascii_lowercase().as_str() {
                "true" => Ok("true".to_string()),
                "false" => Ok("false".to_string()),
                _ => Err(invalid("expected true or false".to_string())),
            },
            Field::BuildNumber => value
                .parse::<u64>()
                .map(|n| n.to_string())
                .map_err(|e| invalid(e.to_string())),
            _ => Ok(value),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Event => f.write_str("event"),
            Field::Branch => f.write_str("branch"),
            Field::Tag => f.write_str("tag"),
            Field::Fork => f.write_str("fork"),
            Field::BuildNumber => f.write_str("build_number"),
            Field::Var(name) => write!(f, "vars.{}", name),
        }
    }
}

/// Compiled predicate expression
#[derive(Debug, Clone)]
pub enum Predicate {
    FieldEquals { field: Field, value: String },
    FieldIn { field: Field, values: Vec<String> },
    FieldMatches { field: Field, pattern: Regex },
    IsSet(Field),
    Not(Box<Predicate>),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
}

impl Predicate {
    /// Compile a textual predicate
    pub fn parse(src: &str) -> Result<Self, PredicateError> {
        Parser::new(src).parse()
    }

    /// Evaluate against a trigger context
    pub fn evaluate(&self, ctx: &TriggerContext) -> bool {
        match self {
            Predicate::FieldEquals { field, value } => {
                field.resolve(ctx).as_deref() == Some(value.as_str())
            }
            Predicate::FieldIn { field, values } => field
                .resolve(ctx)
                .map(|v| values.iter().any(|candidate| *candidate == v))
                .unwrap_or(false),
            Predicate::FieldMatches { field, pattern } => field
                .resolve(ctx)
                .map(|v| pattern.is_match(&v))
                .unwrap_or(false),
            Predicate::IsSet(field) => field.is_truthy(ctx),
            Predicate::Not(inner) => !inner.evaluate(ctx),
            Predicate::And(left, right) => left.evaluate(ctx) && right.evaluate(ctx),
            Predicate::Or(left, right) => left.evaluate(ctx) || right.evaluate(ctx),
        }
    }

    pub fn field_equals(field: Field, value: impl Into<String>) -> Self {
        Predicate::FieldEquals {
            field,
            value: value.into(),
        }
    }

    pub fn and(self, other: Predicate) -> Self {
        Predicate::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Predicate) -> Self {
        Predicate::Or(Box::new(self), Box::new(other))
    }

    pub fn negate(self) -> Self {
        Predicate::Not(Box::new(self))
    }
}

impl FromStr for Predicate {
    type Err = PredicateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Predicate::parse(s)
    }
}

/// Escape bare `/` for a `/.../` literal; existing escape pairs are kept whole
fn escape_slashes(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                out.push('\\');
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            }
            '/' => out.push_str("\\/"),
            other => out.push(other),
        }
    }
    out
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::FieldEquals { field, value } => {
                write!(f, "{} = {}", field, quote_if_needed(value))
            }
            Predicate::FieldIn { field, values } => {
                let list: Vec<String> = values.iter().map(|v| quote_if_needed(v)).collect();
                write!(f, "{} IN ({})", field, list.join(", "))
            }
            Predicate::FieldMatches { field, pattern } => {
                write!(f, "{} =~ /{}/", field, escape_slashes(pattern.as_str()))
            }
            Predicate::IsSet(field) => write!(f, "{}", field),
            Predicate::Not(inner) => match inner.as_ref() {
                Predicate::And(..) | Predicate::Or(..) => write!(f, "NOT ({})", inner),
                _ => write!(f, "NOT {}", inner),
            },
            Predicate::And(left, right) => {
                write_operand(f, left)?;
                f.write_str(" AND ")?;
                write_operand(f, right)
            }
            Predicate::Or(left, right) => write!(f, "{} OR {}", left, right),
        }
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, operand: &Predicate) -> fmt::Result {
    match operand {
        Predicate::Or(..) => write!(f, "({})", operand),
        _ => write!(f, "{}", operand),
    }
}

fn is_bare_char(c: char) -> bool {
    !c.is_whitespace() && !"()\"',=!&|".contains(c)
}

fn is_keyword(word: &str) -> bool {
    KEYWORDS.iter().any(|kw| kw.eq_ignore_ascii_case(word))
}

fn quote_if_needed(value: &str) -> String {
    if !value.is_empty() && value.chars().all(is_bare_char) && !is_keyword(value) {
        value.to_string()
    } else {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

/// Recursive-descent parser over the predicate text
struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn parse(mut self) -> Result<Predicate, PredicateError> {
        self.skip_ws();
        if self.at_end() {
            return Err(PredicateError::Empty);
        }

        let expr = self.parse_or()?;

        self.skip_ws();
        if !self.at_end() {
            return Err(self.unexpected("end of expression"));
        }
        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<Predicate, PredicateError> {
        let mut left = self.parse_and()?;
        while self.eat_keyword("OR") || self.eat_symbol("||") {
            let right = self.parse_and()?;
            left = left.or(right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Predicate, PredicateError> {
        let mut left = self.parse_unary()?;
        while self.eat_keyword("AND") || self.eat_symbol("&&") {
            let right = self.parse_unary()?;
            left = left.and(right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Predicate, PredicateError> {
        if self.eat_keyword("NOT") || self.eat_bang() {
            return Ok(self.parse_unary()?.negate());
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Predicate, PredicateError> {
        if self.eat_symbol("(") {
            let inner = self.parse_or()?;
            if !self.eat_symbol(")") {
                return Err(self.unexpected("')'"));
            }
            return Ok(inner);
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Predicate, PredicateError> {
        self.skip_ws();
        let column = self.column();
        let name = self.take_while(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
        if name.is_empty() {
            return Err(self.unexpected("field name"));
        }
        if is_keyword(name) {
            return Err(PredicateError::Unexpected {
                expected: "field name",
                found: format!("'{}'", name),
                column,
            });
        }
        let field = Field::from_name(name)?;

        if self.eat_symbol("=~") {
            let pattern = self.read_pattern()?;
            return Ok(Predicate::FieldMatches {
                field,
                pattern: compile_regex(pattern)?,
            });
        }
        if self.eat_symbol("!~") {
            let pattern = self.read_pattern()?;
            return Ok(Predicate::FieldMatches {
                field,
                pattern: compile_regex(pattern)?,
            }
            .negate());
        }
        if self.eat_symbol("!=") {
            let value = self.read_value()?;
            let value = field.normalize(value)?;
            return Ok(Predicate::FieldEquals { field, value }.negate());
        }
        if self.eat_symbol("==") || self.eat_symbol("=") {
            let value = self.read_value()?;
            let value = field.normalize(value)?;
            return Ok(Predicate::FieldEquals { field, value });
        }
        if self.eat_keyword("IN") {
            return self.parse_in_list(field);
        }

        let checkpoint = self.pos;
        if self.eat_keyword("NOT") {
            if self.eat_keyword("IN") {
                return Ok(self.parse_in_list(field)?.negate());
            }
            self.pos = checkpoint;
        }

        Ok(Predicate::IsSet(field))
    }

    fn parse_in_list(&mut self, field: Field) -> Result<Predicate, PredicateError> {
        if !self.eat_symbol("(") {
            return Err(self.unexpected("'('"));
        }

        let mut values = Vec::new();
        loop {
            let value = self.read_value()?;
            values.push(field.normalize(value)?);

            if self.eat_symbol(",") {
                continue;
            }
            if self.eat_symbol(")") {
                break;
            }
            return Err(self.unexpected("',' or ')'"));
        }

        Ok(Predicate::FieldIn { field, values })
    }

    fn read_value(&mut self) -> Result<String, PredicateError> {
        self.skip_ws();
        match self.peek() {
            Some(q @ ('"' | '\'')) => self.read_quoted(q),
            _ => {
                let column = self.column();
                let word = self.take_while(is_bare_char);
                if word.is_empty() {
                    return Err(self.unexpected("value"));
                }
                if is_keyword(word) {
                    return Err(PredicateError::Unexpected {
                        expected: "value",
                        found: format!("'{}'", word),
                        column,
                    });
                }
                Ok(word.to_string())
            }
        }
    }

    /// Regex operand: `/.../`, a quoted string, or a bare word
    fn read_pattern(&mut self) -> Result<String, PredicateError> {
        self.skip_ws();
        if self.peek() != Some('/') {
            return self.read_value();
        }

        let column = self.column();
        self.bump();
        let mut pattern = String::new();
        while let Some(c) = self.bump() {
            match c {
                '/' => return Ok(pattern),
                '\\' => match self.bump() {
                    Some('/') => pattern.push('/'),
                    Some(escaped) => {
                        pattern.push('\\');
                        pattern.push(escaped);
                    }
                    None => break,
                },
                other => pattern.push(other),
            }
        }
        Err(PredicateError::Unterminated {
            what: "regex literal",
            column,
        })
    }

    fn read_quoted(&mut self, quote: char) -> Result<String, PredicateError> {
        let column = self.column();
        self.bump();
        let mut value = String::new();
        while let Some(c) = self.bump() {
            match c {
                '\\' => match self.bump() {
                    Some(escaped) => value.push(escaped),
                    None => break,
                },
                c if c == quote => return Ok(value),
                other => value.push(other),
            }
        }
        Err(PredicateError::Unterminated {
            what: "string",
            column,
        })
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        self.skip_ws();
        let rest = &self.src[self.pos..];
        let matches = rest
            .get(..keyword.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(keyword));
        if !matches {
            return false;
        }
        let boundary = rest[keyword.len()..]
            .chars()
            .next()
            .map_or(true, |c| !(c.is_ascii_alphanumeric() || c == '_' || c == '.'));
        if boundary {
            self.pos += keyword.len();
        }
        boundary
    }

    fn eat_symbol(&mut self, symbol: &str) -> bool {
        self.skip_ws();
        if self.src[self.pos..].starts_with(symbol) {
            self.pos += symbol.len();
            true
        } else {
            false
        }
    }

    /// `!` as negation, but not the start of `!=` or `!~`
    fn eat_bang(&mut self) -> bool {
        self.skip_ws();
        let rest = &self.src[self.pos..];
        if rest.starts_with('!') && !rest.starts_with("!=") && !rest.starts_with("!~") {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        &self.src[start..self.pos]
    }

    fn skip_ws(&mut self) {
        self.take_while(char::is_whitespace);
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn column(&self) -> usize {
        self.src[..self.pos].chars().count() + 1
    }

    fn unexpected(&self, expected: &'static str) -> PredicateError {
        let found = match self.peek() {
            Some(c) => format!("'{}'", c),
            None => "end of expression".to_string(),
        };
        PredicateError::Unexpected {
            expected,
            found,
            column: self.column(),
        }
    }
}

fn compile_regex(pattern: String) -> Result<Regex, PredicateError> {
    Regex::new(&pattern).map_err(|e| PredicateError::InvalidRegex {
        pattern,
        reason: e.to_string(),
    })
}
