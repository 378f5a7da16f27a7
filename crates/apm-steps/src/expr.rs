//! Restricted expression language for derived and forced parameter values
//!
//! A small Python-flavoured grammar evaluated by a dedicated interpreter:
//!
//! ```text
//! expr       := or_test ["if" or_test "else" expr]
//! or_test    := and_test ("or" and_test)*
//! and_test   := not_test ("and" not_test)*
//! not_test   := "not" not_test | comparison
//! comparison := arith (("==" | "!=" | "<" | "<=" | ">" | ">=" | "in" | "not" "in") arith)*
//! arith      := term (("+" | "-") term)*
//! term       := factor (("*" | "/" | "//" | "%") factor)*
//! factor     := ("+" | "-") factor | power
//! power      := postfix ["**" factor]
//! postfix    := atom ("[" expr "]" | "(" args ")")*
//! atom       := number | string | name | True | False | None | "(" expr ")" | "[" args "]"
//! ```
//!
//! Only the functions in [`FUNCTIONS`] can be called. There is no attribute
//! access, no assignment and no way to reach anything outside [`Variables`].

#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]

use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};

/// Callable functions
pub const FUNCTIONS: [&str; 8] = ["abs", "min", "max", "round", "int", "float", "str", "len"];

/// Evaluation error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExprError {
    /// Malformed expression text
    #[error("syntax error at offset {offset}: {message}")]
    Syntax {
        /// Byte offset into the expression
        offset: usize,
        /// What was expected
        message: String,
    },

    /// Variable not in scope
    #[error("name '{0}' is not defined")]
    UnknownName(String),

    /// Call to a function outside the whitelist
    #[error("'{0}' is not callable")]
    NotCallable(String),

    /// Missing mapping key
    #[error("key {0} not found")]
    KeyNotFound(String),

    /// List or string index past the end
    #[error("index {0} out of range")]
    IndexOutOfRange(i64),

    /// Operation not supported for the operand types
    #[error("type error: {0}")]
    Type(String),

    /// Right type, unusable value
    #[error("value error: {0}")]
    Value(String),

    /// Division or modulo by zero
    #[error("division by zero")]
    DivisionByZero,
}

/// Result type for expression evaluation
pub type ExprResult<T> = Result<T, ExprError>;

/// Runtime value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// `None`
    #[default]
    None,
    /// `True` / `False`
    Bool(bool),
    /// Integer
    Int(i64),
    /// Floating point number
    Float(f64),
    /// Text
    Str(String),
    /// Sequence
    List(Vec<Value>),
    /// String-keyed mapping
    Dict(IndexMap<String, Value>),
}

impl Value {
    /// Type name used in error messages
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "NoneType",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Dict(_) => "dict",
        }
    }

    /// Truthiness: zero, empty and `None` are false
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::List(l) => !l.is_empty(),
            Self::Dict(d) => !d.is_empty(),
        }
    }

    /// Numeric view of bools, ints and floats
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Bool(b) => Some(f64::from(u8::from(*b))),
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    fn as_int(&self) -> Option<i64> {
        match self {
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    fn is_number(&self) -> bool {
        matches!(self, Self::Bool(_) | Self::Int(_) | Self::Float(_))
    }

    /// Python `repr`-style rendering, as used for dictionary keys and `str()`
    fn repr(&self) -> String {
        match self {
            Self::Str(s) => format!("'{s}'"),
            other => other.to_string(),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => f.write_str(&float_to_string(*x)),
            Self::Str(s) => f.write_str(s),
            Self::List(items) => {
                let items: Vec<_> = items.iter().map(Value::repr).collect();
                write!(f, "[{}]", items.join(", "))
            }
            Self::Dict(map) => {
                let items: Vec<_> = map
                    .iter()
                    .map(|(k, v)| format!("'{k}': {}", v.repr()))
                    .collect();
                write!(f, "{{{}}}", items.join(", "))
            }
        }
    }
}

fn float_to_string(x: f64) -> String {
    if x.is_nan() {
        "nan".to_string()
    } else if x.is_infinite() {
        if x > 0.0 { "inf" } else { "-inf" }.to_string()
    } else if x.fract() == 0.0 && x.abs() < 1e16 {
        format!("{x:.1}")
    } else {
        x.to_string()
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::None,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or(Self::None),
            serde_json::Value::String(s) => Self::Str(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => {
                Self::Dict(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

/// Names visible to an expression
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Variables {
    values: HashMap<String, Value>,
}

impl Variables {
    /// Create empty scope
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With one more variable
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Bind or rebind a variable
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    /// Look up a variable
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Name(String),
    Op(&'static str),
    End,
}

const OPERATORS: [&str; 20] = [
    "**", "//", "==", "!=", "<=", ">=", "+", "-", "*", "/", "%", "<", ">", "(", ")", "[", "]", ",",
    ".", ":",
];

fn tokenize(text: &str) -> ExprResult<Vec<(usize, Token)>> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        if c.is_ascii_whitespace() {
            pos += 1;
        } else if c.is_ascii_digit()
            || (c == b'.' && bytes.get(pos + 1).is_some_and(u8::is_ascii_digit))
        {
            let (token, end) = lex_number(text, pos)?;
            tokens.push((pos, token));
            pos = end;
        } else if c == b'\'' || c == b'"' {
            let (token, end) = lex_string(text, pos)?;
            tokens.push((pos, token));
            pos = end;
        } else if c.is_ascii_alphabetic() || c == b'_' {
            let end = text[pos..]
                .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
                .map_or(text.len(), |n| pos + n);
            tokens.push((pos, Token::Name(text[pos..end].to_string())));
            pos = end;
        } else if let Some(op) = OPERATORS.iter().copied().find(|&op| text[pos..].starts_with(op)) {
            tokens.push((pos, Token::Op(op)));
            pos += op.len();
        } else {
            let found = text[pos..].chars().next().unwrap_or(' ');
            return Err(syntax(pos, format!("unexpected character '{found}'")));
        }
    }
    tokens.push((text.len(), Token::End));
    Ok(tokens)
}

fn lex_number(text: &str, start: usize) -> ExprResult<(Token, usize)> {
    let rest = &text[start..];
    for (prefix, radix) in [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)] {
        if let Some(digits) = rest.strip_prefix(prefix) {
            let len = digits.find(|c: char| !c.is_ascii_alphanumeric()).unwrap_or(digits.len());
            let value = i64::from_str_radix(&digits[..len], radix)
                .map_err(|e| syntax(start, format!("invalid integer literal: {e}")))?;
            return Ok((Token::Int(value), start + prefix.len() + len));
        }
    }

    let bytes = rest.as_bytes();
    let mut end = 0;
    let mut is_float = false;
    while end < bytes.len() && (bytes[end].is_ascii_digit() || bytes[end] == b'.') {
        is_float |= bytes[end] == b'.';
        end += 1;
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        if exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
                exp_end += 1;
            }
            end = exp_end;
            is_float = true;
        }
    }

    let literal = &rest[..end];
    let float = || {
        literal
            .parse()
            .map(Token::Float)
            .map_err(|_| syntax(start, format!("invalid number '{literal}'")))
    };
    let token = if is_float {
        float()?
    } else {
        match literal.parse::<i64>() {
            Ok(i) => Token::Int(i),
            Err(_) => float()?,
        }
    };
    Ok((token, start + end))
}

fn lex_string(text: &str, start: usize) -> ExprResult<(Token, usize)> {
    let mut chars = text[start..].char_indices();
    let Some((_, quote)) = chars.next() else {
        return Err(syntax(start, "expected string"));
    };
    let mut value = String::new();
    while let Some((offset, c)) = chars.next() {
        match c {
            c if c == quote => return Ok((Token::Str(value), start + offset + c.len_utf8())),
            '\\' => match chars.next() {
                Some((_, 'n')) => value.push('\n'),
                Some((_, 't')) => value.push('\t'),
                Some((_, escaped)) => value.push(escaped),
                None => break,
            },
            c => value.push(c),
        }
    }
    Err(syntax(start, "unterminated string"))
}

fn syntax(offset: usize, message: impl Into<String>) -> ExprError {
    ExprError::Syntax {
        offset,
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Literal(Value),
    Name(String),
    List(Vec<Node>),
    Neg(Box<Node>),
    Pos(Box<Node>),
    Not(Box<Node>),
    Binary(BinOp, Box<Node>, Box<Node>),
    Compare(Box<Node>, Vec<(CmpOp, Node)>),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
    IfElse {
        condition: Box<Node>,
        then: Box<Node>,
        otherwise: Box<Node>,
    },
    Subscript(Box<Node>, Box<Node>),
    Call(String, Vec<Node>),
}

impl Node {
    fn references(&self, name: &str) -> bool {
        match self {
            Self::Literal(_) => false,
            Self::Name(n) => n == name,
            Self::List(items) | Self::Call(_, items) => items.iter().any(|n| n.references(name)),
            Self::Neg(n) | Self::Pos(n) | Self::Not(n) => n.references(name),
            Self::Binary(_, a, b) | Self::And(a, b) | Self::Or(a, b) | Self::Subscript(a, b) => {
                a.references(name) || b.references(name)
            }
            Self::Compare(first, rest) => {
                first.references(name) || rest.iter().any(|(_, n)| n.references(name))
            }
            Self::IfElse {
                condition,
                then,
                otherwise,
            } => condition.references(name) || then.references(name) || otherwise.references(name),
        }
    }
}

const KEYWORDS: [&str; 9] = ["and", "or", "not", "in", "if", "else", "True", "False", "None"];

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).map_or(&Token::End, |(_, t)| t)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(0, |(o, _)| *o)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        self.pos += 1;
        token
    }

    fn is_op(&self, op: &str) -> bool {
        matches!(self.peek(), Token::Op(o) if *o == op)
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Token::Name(n) if n == keyword)
    }

    fn eat_op(&mut self, op: &str) -> bool {
        let found = self.is_op(op);
        if found {
            self.pos += 1;
        }
        found
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        let found = self.is_keyword(keyword);
        if found {
            self.pos += 1;
        }
        found
    }

    fn expect_op(&mut self, op: &str) -> ExprResult<()> {
        if self.eat_op(op) {
            Ok(())
        } else {
            Err(syntax(self.offset(), format!("expected '{op}'")))
        }
    }

    fn parse(mut self) -> ExprResult<Node> {
        let node = self.expression()?;
        if *self.peek() != Token::End {
            return Err(syntax(self.offset(), "unexpected trailing input"));
        }
        Ok(node)
    }

    fn expression(&mut self) -> ExprResult<Node> {
        let then = self.or_test()?;
        if !self.eat_keyword("if") {
            return Ok(then);
        }
        let condition = self.or_test()?;
        if !self.eat_keyword("else") {
            return Err(syntax(self.offset(), "expected 'else'"));
        }
        let otherwise = self.expression()?;
        Ok(Node::IfElse {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn or_test(&mut self) -> ExprResult<Node> {
        let mut node = self.and_test()?;
        while self.eat_keyword("or") {
            node = Node::Or(Box::new(node), Box::new(self.and_test()?));
        }
        Ok(node)
    }

    fn and_test(&mut self) -> ExprResult<Node> {
        let mut node = self.not_test()?;
        while self.eat_keyword("and") {
            node = Node::And(Box::new(node), Box::new(self.not_test()?));
        }
        Ok(node)
    }

    fn not_test(&mut self) -> ExprResult<Node> {
        if self.eat_keyword("not") {
            return Ok(Node::Not(Box::new(self.not_test()?)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> ExprResult<Node> {
        let first = self.arith()?;
        let mut rest = Vec::new();
        while let Some((op, width)) = self.comparison_op() {
            self.pos += width;
            rest.push((op, self.arith()?));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Node::Compare(Box::new(first), rest))
        }
    }

    /// Comparison operator at the cursor and its width in tokens
    fn comparison_op(&self) -> Option<(CmpOp, usize)> {
        let op = match self.peek() {
            Token::Op("==") => CmpOp::Eq,
            Token::Op("!=") => CmpOp::Ne,
            Token::Op("<") => CmpOp::Lt,
            Token::Op("<=") => CmpOp::Le,
            Token::Op(">") => CmpOp::Gt,
            Token::Op(">=") => CmpOp::Ge,
            Token::Name(n) if n == "in" => CmpOp::In,
            Token::Name(n) if n == "not" => {
                let next_is_in = matches!(
                    self.tokens.get(self.pos + 1),
                    Some((_, Token::Name(n))) if n == "in"
                );
                return next_is_in.then_some((CmpOp::NotIn, 2));
            }
            _ => return None,
        };
        Some((op, 1))
    }

    fn arith(&mut self) -> ExprResult<Node> {
        let mut node = self.term()?;
        loop {
            let op = if self.eat_op("+") {
                BinOp::Add
            } else if self.eat_op("-") {
                BinOp::Sub
            } else {
                return Ok(node);
            };
            node = Node::Binary(op, Box::new(node), Box::new(self.term()?));
        }
    }

    fn term(&mut self) -> ExprResult<Node> {
        let mut node = self.factor()?;
        loop {
            let op = if self.eat_op("*") {
                BinOp::Mul
            } else if self.eat_op("/") {
                BinOp::Div
            } else if self.eat_op("//") {
                BinOp::FloorDiv
            } else if self.eat_op("%") {
                BinOp::Mod
            } else {
                return Ok(node);
            };
            node = Node::Binary(op, Box::new(node), Box::new(self.factor()?));
        }
    }

    fn factor(&mut self) -> ExprResult<Node> {
        if self.eat_op("-") {
            return Ok(Node::Neg(Box::new(self.factor()?)));
        }
        if self.eat_op("+") {
            return Ok(Node::Pos(Box::new(self.factor()?)));
        }
        self.power()
    }

    fn power(&mut self) -> ExprResult<Node> {
        let base = self.postfix()?;
        if self.eat_op("**") {
            let exponent = self.factor()?;
            return Ok(Node::Binary(BinOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn postfix(&mut self) -> ExprResult<Node> {
        let mut node = self.atom()?;
        loop {
            if self.eat_op("[") {
                let index = self.expression()?;
                self.expect_op("]")?;
                node = Node::Subscript(Box::new(node), Box::new(index));
            } else if self.is_op("(") {
                let offset = self.offset();
                self.pos += 1;
                let args = self.arguments(")")?;
                node = match node {
                    Node::Name(name) => Node::Call(name, args),
                    _ => return Err(syntax(offset, "only named functions can be called")),
                };
            } else if self.is_op(".") {
                return Err(syntax(self.offset(), "attribute access is not allowed"));
            } else {
                return Ok(node);
            }
        }
    }

    fn arguments(&mut self, close: &str) -> ExprResult<Vec<Node>> {
        let mut args = Vec::new();
        if self.eat_op(close) {
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            if self.eat_op(close) {
                return Ok(args);
            }
            self.expect_op(",")?;
            if self.eat_op(close) {
                return Ok(args);
            }
        }
    }

    fn atom(&mut self) -> ExprResult<Node> {
        let offset = self.offset();
        match self.advance() {
            Token::Int(i) => Ok(Node::Literal(Value::Int(i))),
            Token::Float(f) => Ok(Node::Literal(Value::Float(f))),
            Token::Str(mut s) => {
                while let Token::Str(next) = self.peek() {
                    s.push_str(next);
                    self.pos += 1;
                }
                Ok(Node::Literal(Value::Str(s)))
            }
            Token::Name(name) => match name.as_str() {
                "True" => Ok(Node::Literal(Value::Bool(true))),
                "False" => Ok(Node::Literal(Value::Bool(false))),
                "None" => Ok(Node::Literal(Value::None)),
                n if KEYWORDS.contains(&n) => {
                    Err(syntax(offset, format!("unexpected keyword '{n}'")))
                }
                _ => Ok(Node::Name(name)),
            },
            Token::Op("(") => {
                let node = self.expression()?;
                self.expect_op(")")?;
                Ok(node)
            }
            Token::Op("[") => Ok(Node::List(self.arguments("]")?)),
            Token::Op(op) => Err(syntax(offset, format!("unexpected '{op}'"))),
            Token::End => Err(syntax(offset, "unexpected end of expression")),
        }
    }
}

/// Parsed expression, reusable across evaluations
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    root: Node,
}

impl Expression {
    /// Parse expression text
    ///
    /// # Errors
    /// Returns [`ExprError::Syntax`] for malformed text.
    pub fn parse(text: &str) -> ExprResult<Self> {
        let tokens = tokenize(text)?;
        let root = Parser { tokens, pos: 0 }.parse()?;
        Ok(Self { root })
    }

    /// Check if the expression reads variable `name`
    #[must_use]
    pub fn references(&self, name: &str) -> bool {
        self.root.references(name)
    }

    /// Evaluate against `variables`
    ///
    /// # Errors
    /// Any [`ExprError`] except `Syntax`.
    pub fn evaluate(&self, variables: &Variables) -> ExprResult<Value> {
        eval(&self.root, variables)
    }
}

/// Parse and evaluate in one step
///
/// # Errors
/// Any [`ExprError`].
pub fn evaluate(text: &str, variables: &Variables) -> ExprResult<Value> {
    Expression::parse(text)?.evaluate(variables)
}

// ---------------------------------------------------------------------------
// Interpreter
// ---------------------------------------------------------------------------

fn eval(node: &Node, vars: &Variables) -> ExprResult<Value> {
    match node {
        Node::Literal(v) => Ok(v.clone()),
        Node::Name(name) => vars
            .get(name)
            .cloned()
            .ok_or_else(|| ExprError::UnknownName(name.clone())),
        Node::List(items) => Ok(Value::List(
            items
                .iter()
                .map(|n| eval(n, vars))
                .collect::<ExprResult<_>>()?,
        )),
        Node::Neg(operand) => match eval(operand, vars)? {
            Value::Float(f) => Ok(Value::Float(-f)),
            v => v
                .as_int()
                .and_then(i64::checked_neg)
                .map(Value::Int)
                .ok_or_else(|| {
                    ExprError::Type(format!("bad operand type for unary -: '{}'", v.type_name()))
                }),
        },
        Node::Pos(operand) => match eval(operand, vars)? {
            v @ (Value::Int(_) | Value::Float(_)) => Ok(v),
            Value::Bool(b) => Ok(Value::Int(i64::from(b))),
            v => Err(ExprError::Type(format!("bad operand type for unary +: '{}'", v.type_name()))),
        },
        Node::Not(operand) => Ok(Value::Bool(!eval(operand, vars)?.is_truthy())),
        Node::And(a, b) => {
            let left = eval(a, vars)?;
            if left.is_truthy() {
                eval(b, vars)
            } else {
                Ok(left)
            }
        }
        Node::Or(a, b) => {
            let left = eval(a, vars)?;
            if left.is_truthy() {
                Ok(left)
            } else {
                eval(b, vars)
            }
        }
        Node::IfElse {
            condition,
            then,
            otherwise,
        } => {
            if eval(condition, vars)?.is_truthy() {
                eval(then, vars)
            } else {
                eval(otherwise, vars)
            }
        }
        Node::Binary(op, a, b) => binary(*op, &eval(a, vars)?, &eval(b, vars)?),
        Node::Compare(first, rest) => {
            let mut left = eval(first, vars)?;
            for (op, node) in rest {
                let right = eval(node, vars)?;
                if !compare(*op, &left, &right)? {
                    return Ok(Value::Bool(false));
                }
                left = right;
            }
            Ok(Value::Bool(true))
        }
        Node::Subscript(container, index) => {
            subscript(&eval(container, vars)?, &eval(index, vars)?)
        }
        Node::Call(name, args) => {
            let args = args.iter().map(|n| eval(n, vars)).collect::<ExprResult<Vec<_>>>()?;
            call(name, &args)
        }
    }
}

fn binary(op: BinOp, a: &Value, b: &Value) -> ExprResult<Value> {
    if let (BinOp::Add, Value::Str(x), Value::Str(y)) = (op, a, b) {
        return Ok(Value::Str(format!("{x}{y}")));
    }
    if let (BinOp::Add, Value::List(x), Value::List(y)) = (op, a, b) {
        return Ok(Value::List(x.iter().chain(y).cloned().collect()));
    }

    let type_error = || {
        ExprError::Type(format!(
            "unsupported operand types for {op:?}: '{}' and '{}'",
            a.type_name(),
            b.type_name()
        ))
    };
    if !a.is_number() || !b.is_number() {
        return Err(type_error());
    }

    if let (Some(x), Some(y)) = (a.as_int(), b.as_int()) {
        if let Some(result) = int_binary(op, x, y)? {
            return Ok(result);
        }
    }

    let (x, y) = (a.as_f64().ok_or_else(type_error)?, b.as_f64().ok_or_else(type_error)?);
    let result = match op {
        BinOp::Add => x + y,
        BinOp::Sub => x - y,
        BinOp::Mul => x * y,
        BinOp::Div => {
            if y == 0.0 {
                return Err(ExprError::DivisionByZero);
            }
            x / y
        }
        BinOp::FloorDiv => {
            if y == 0.0 {
                return Err(ExprError::DivisionByZero);
            }
            (x / y).floor()
        }
        BinOp::Mod => {
            if y == 0.0 {
                return Err(ExprError::DivisionByZero);
            }
            let r = x % y;
            if r != 0.0 && (r < 0.0) != (y < 0.0) {
                r + y
            } else {
                r
            }
        }
        BinOp::Pow => {
            if x == 0.0 && y < 0.0 {
                return Err(ExprError::DivisionByZero);
            }
            x.powf(y)
        }
    };
    Ok(Value::Float(result))
}

/// Integer arithmetic; `None` means "fall back to floats"
fn int_binary(op: BinOp, x: i64, y: i64) -> ExprResult<Option<Value>> {
    let result = match op {
        BinOp::Add => x.checked_add(y),
        BinOp::Sub => x.checked_sub(y),
        BinOp::Mul => x.checked_mul(y),
        BinOp::Div => return Ok(None),
        BinOp::FloorDiv | BinOp::Mod => {
            if y == 0 {
                return Err(ExprError::DivisionByZero);
            }
            // i64::MIN // -1 overflows
            let (Some(q), Some(r)) = (x.checked_div_euclid(y), x.checked_rem_euclid(y)) else {
                return Ok(None);
            };
            // floor semantics: remainder takes the sign of the divisor
            if y < 0 && r != 0 {
                q.checked_sub(1).map(|q| if op == BinOp::FloorDiv { q } else { r + y })
            } else {
                Some(if op == BinOp::FloorDiv { q } else { r })
            }
        }
        BinOp::Pow => u32::try_from(y).ok().and_then(|e| x.checked_pow(e)),
    };
    Ok(result.map(Value::Int))
}

fn compare(op: CmpOp, a: &Value, b: &Value) -> ExprResult<bool> {
    match op {
        CmpOp::Eq => Ok(values_equal(a, b)),
        CmpOp::Ne => Ok(!values_equal(a, b)),
        CmpOp::In => contains(b, a),
        CmpOp::NotIn => contains(b, a).map(|found| !found),
        CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => {
            let ordering = match (a, b) {
                (Value::Str(x), Value::Str(y)) => Some(x.cmp(y)),
                _ => match (a.as_f64(), b.as_f64()) {
                    (Some(x), Some(y)) => x.partial_cmp(&y),
                    _ => {
                        return Err(ExprError::Type(format!(
                            "'{op:?}' not supported between '{}' and '{}'",
                            a.type_name(),
                            b.type_name()
                        )))
                    }
                },
            };
            Ok(ordering.is_some_and(|o| match op {
                CmpOp::Lt => o.is_lt(),
                CmpOp::Le => o.is_le(),
                CmpOp::Gt => o.is_gt(),
                _ => o.is_ge(),
            }))
        }
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn contains(container: &Value, item: &Value) -> ExprResult<bool> {
    match (container, item) {
        (Value::Str(haystack), Value::Str(needle)) => Ok(haystack.contains(needle.as_str())),
        (Value::List(items), _) => Ok(items.iter().any(|v| values_equal(v, item))),
        (Value::Dict(map), Value::Str(key)) => Ok(map.contains_key(key)),
        (Value::Dict(_), _) => Ok(false),
        _ => Err(ExprError::Type(format!(
            "argument of type '{}' is not iterable",
            container.type_name()
        ))),
    }
}

fn subscript(container: &Value, index: &Value) -> ExprResult<Value> {
    match (container, index) {
        (Value::Dict(map), Value::Str(key)) => map
            .get(key)
            .cloned()
            .ok_or_else(|| ExprError::KeyNotFound(index.repr())),
        (Value::Dict(_), _) => Err(ExprError::KeyNotFound(index.repr())),
        (Value::List(items), _) => {
            let i = index
                .as_int()
                .ok_or_else(|| ExprError::Type("list indices must be integers".to_string()))?;
            element(items.len(), i).map(|at| items[at].clone())
        }
        (Value::Str(s), _) => {
            let i = index
                .as_int()
                .ok_or_else(|| ExprError::Type("string indices must be integers".to_string()))?;
            let chars: Vec<char> = s.chars().collect();
            element(chars.len(), i).map(|at| Value::Str(chars[at].to_string()))
        }
        _ => Err(ExprError::Type(format!(
            "'{}' object is not subscriptable",
            container.type_name()
        ))),
    }
}

fn element(len: usize, index: i64) -> ExprResult<usize> {
    let len_i = i64::try_from(len).map_err(|_| ExprError::IndexOutOfRange(index))?;
    let at = if index < 0 { index + len_i } else { index };
    usize::try_from(at)
        .ok()
        .filter(|&at| at < len)
        .ok_or(ExprError::IndexOutOfRange(index))
}

fn call(name: &str, args: &[Value]) -> ExprResult<Value> {
    let arity = |n: usize| {
        if args.len() == n {
            Ok(())
        } else {
            Err(ExprError::Type(format!("{name}() takes {n} argument(s), {} given", args.len())))
        }
    };
    match name {
        "abs" => {
            arity(1)?;
            match &args[0] {
                Value::Float(f) => Ok(Value::Float(f.abs())),
                v => v
                    .as_int()
                    .and_then(i64::checked_abs)
                    .map(Value::Int)
                    .ok_or_else(|| {
                        ExprError::Type(format!(
                            "bad operand type for abs(): '{}'",
                            v.type_name()
                        ))
                    }),
            }
        }
        "min" | "max" => {
            let candidates: &[Value] = match args {
                [Value::List(items)] => items.as_slice(),
                [] => return Err(ExprError::Type(format!("{name}() expected at least 1 argument"))),
                _ => args,
            };
            let want = if name == "min" { CmpOp::Lt } else { CmpOp::Gt };
            let mut best = candidates
                .first()
                .ok_or_else(|| ExprError::Value(format!("{name}() arg is an empty sequence")))?;
            for candidate in &candidates[1..] {
                if compare(want, candidate, best)? {
                    best = candidate;
                }
            }
            Ok(best.clone())
        }
        "round" => match args {
            [v] => {
                let x = number(name, v)?;
                if let Value::Int(_) | Value::Bool(_) = v {
                    return Ok(Value::Int(v.as_int().unwrap_or_default()));
                }
                float_to_int(round_half_even(x))
            }
            [v, digits] => {
                let x = number(name, v)?;
                let digits = digits
                    .as_int()
                    .and_then(|d| i32::try_from(d).ok())
                    .ok_or_else(|| {
                        ExprError::Type("round() digits must be an integer".to_string())
                    })?;
                let scale = 10f64.powi(digits);
                Ok(Value::Float(round_half_even(x * scale) / scale))
            }
            _ => Err(ExprError::Type(format!(
                "round() takes 1 or 2 arguments, {} given",
                args.len()
            ))),
        },
        "int" => {
            arity(1)?;
            match &args[0] {
                Value::Float(f) => float_to_int(f.trunc()),
                Value::Str(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::Int)
                    .map_err(|_| ExprError::Value(format!("invalid literal for int(): '{s}'"))),
                v => v
                    .as_int()
                    .map(Value::Int)
                    .ok_or_else(|| {
                        ExprError::Type(format!(
                            "int() argument must be a number or string, not '{}'",
                            v.type_name()
                        ))
                    }),
            }
        }
        "float" => {
            arity(1)?;
            match &args[0] {
                Value::Str(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| {
                        ExprError::Value(format!("could not convert string to float: '{s}'"))
                    }),
                v => number(name, v).map(Value::Float),
            }
        }
        "str" => {
            arity(1)?;
            Ok(Value::Str(args[0].to_string()))
        }
        "len" => {
            arity(1)?;
            let len = match &args[0] {
                Value::Str(s) => s.chars().count(),
                Value::List(items) => items.len(),
                Value::Dict(map) => map.len(),
                v => {
                    return Err(ExprError::Type(format!(
                        "object of type '{}' has no len()",
                        v.type_name()
                    )))
                }
            };
            Ok(Value::Int(i64::try_from(len).unwrap_or(i64::MAX)))
        }
        _ => Err(ExprError::NotCallable(name.to_string())),
    }
}

fn number(function: &str, value: &Value) -> ExprResult<f64> {
    value.as_f64().ok_or_else(|| {
        ExprError::Type(format!(
            "{function}() argument must be a number, not '{}'",
            value.type_name()
        ))
    })
}

fn float_to_int(x: f64) -> ExprResult<Value> {
    if x.is_finite() && x.abs() < 9.2e18 {
        Ok(Value::Int(x as i64))
    } else {
        Err(ExprError::Value(format!("cannot convert {} to integer", float_to_string(x))))
    }
}

/// Round half to even
fn round_half_even(x: f64) -> f64 {
    let rounded = x.round();
    if (x - x.trunc()).abs() == 0.5 {
        2.0 * (x / 2.0).round()
    } else {
        rounded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn eval_str(text: &str) -> Value {
        evaluate(text, &vars()).unwrap_or_else(|e| panic!("{text}: {e}"))
    }

    fn vars() -> Variables {
        let components: serde_json::Value = serde_json::json!({
            "Battery": {"Specifications": {"Chemistry": "Lipo", "Number of cells": 4, "Capacity mAh": 5200}},
            "Frame": {"Specifications": {"TOW max Kg": 1.5}},
        });
        let mut fc = IndexMap::new();
        fc.insert("INS_GYRO_FILTER".to_string(), Value::Float(40.0));
        Variables::new()
            .with("vehicle_components", components)
            .with("fc_parameters", Value::Dict(fc))
            .with("doc_dict", Value::Dict(IndexMap::new()))
    }

    #[test]
    fn arithmetic_follows_precedence() {
        assert_eq!(eval_str("1 + 2 * 3"), Value::Int(7));
        assert_eq!(eval_str("(1 + 2) * 3"), Value::Int(9));
        assert_eq!(eval_str("2 ** 3 ** 2"), Value::Int(512));
        assert_eq!(eval_str("-2 ** 2"), Value::Int(-4));
        assert_eq!(eval_str("7 / 2"), Value::Float(3.5));
        assert_eq!(eval_str("7 // 2"), Value::Int(3));
        assert_eq!(eval_str("-7 // 2"), Value::Int(-4));
        assert_eq!(eval_str("-7 % 3"), Value::Int(2));
        assert_eq!(eval_str("7 % -3"), Value::Int(-2));
        assert_eq!(eval_str("7 // -3"), Value::Int(-3));
        assert_eq!(eval_str("2 ** -1"), Value::Float(0.5));
        assert_eq!(eval_str("1.5e3 + .5"), Value::Float(1500.5));
        assert_eq!(eval_str("0x10 + 0b11"), Value::Int(19));
    }

    #[test]
    fn lookups_into_components() {
        assert_eq!(
            eval_str("vehicle_components['Battery']['Specifications']['Number of cells'] * 4.2"),
            Value::Float(4.0 * 4.2)
        );
        assert_eq!(eval_str("fc_parameters['INS_GYRO_FILTER'] / 2"), Value::Float(20.0));
        assert_eq!(eval_str("'INS_GYRO_FILTER' in fc_parameters"), Value::Bool(true));
    }

    #[test]
    fn conditionals_and_logic() {
        assert_eq!(
            eval_str("'Lipo' if vehicle_components['Battery']['Specifications']['Chemistry'] == 'Lipo' else 'Other'"),
            Value::Str("Lipo".to_string())
        );
        assert_eq!(eval_str("1 < 2 < 3"), Value::Bool(true));
        assert_eq!(eval_str("1 < 3 < 2"), Value::Bool(false));
        assert_eq!(eval_str("0 or 5"), Value::Int(5));
        assert_eq!(eval_str("0 and missing_name"), Value::Int(0));
        assert_eq!(eval_str("not 3 in [1, 2]"), Value::Bool(true));
        assert_eq!(eval_str("3 not in [1, 2]"), Value::Bool(true));
        assert_eq!(eval_str("1 == 1.0"), Value::Bool(true));
    }

    #[test]
    fn whitelisted_functions() {
        assert_eq!(eval_str("abs(-3)"), Value::Int(3));
        assert_eq!(eval_str("max(1, 5.5, 3)"), Value::Float(5.5));
        assert_eq!(eval_str("min([4, 2, 8])"), Value::Int(2));
        assert_eq!(eval_str("round(2.5)"), Value::Int(2));
        assert_eq!(eval_str("round(3.5)"), Value::Int(4));
        assert_eq!(eval_str("round(-0.5)"), Value::Int(0));
        assert_eq!(eval_str("round(1.2345, 2)"), Value::Float(1.23));
        assert_eq!(eval_str("int(3.9)"), Value::Int(3));
        assert_eq!(eval_str("int(' 12 ')"), Value::Int(12));
        assert_eq!(eval_str("float('2.5')"), Value::Float(2.5));
        assert_eq!(eval_str("str(2.0)"), Value::Str("2.0".to_string()));
        assert_eq!(eval_str("str(True) + str(None)"), Value::Str("TrueNone".to_string()));
        assert_eq!(eval_str("len('abc') + len([1]) + len(doc_dict)"), Value::Int(4));
    }

    #[test]
    fn errors() {
        let v = vars();
        assert_eq!(
            evaluate("undefined + 1", &v),
            Err(ExprError::UnknownName("undefined".to_string()))
        );
        assert_eq!(evaluate("open('x')", &v), Err(ExprError::NotCallable("open".to_string())));
        assert_eq!(
            evaluate("fc_parameters['NOPE']", &v),
            Err(ExprError::KeyNotFound("'NOPE'".to_string()))
        );
        assert_eq!(evaluate("1 / 0", &v), Err(ExprError::DivisionByZero));
        assert_eq!(evaluate("1 // 0", &v), Err(ExprError::DivisionByZero));
        assert!(matches!(evaluate("'a' - 1", &v), Err(ExprError::Type(_))));
        assert!(matches!(evaluate("[1][5]", &v), Err(ExprError::IndexOutOfRange(5))));
        assert!(matches!(evaluate("doc_dict.keys()", &v), Err(ExprError::Syntax { .. })));
        assert!(matches!(evaluate("(1 + 2", &v), Err(ExprError::Syntax { .. })));
        assert!(matches!(evaluate("1 +", &v), Err(ExprError::Syntax { .. })));
        assert!(matches!(evaluate("'open", &v), Err(ExprError::Syntax { .. })));
        assert!(matches!(evaluate("1 if 2", &v), Err(ExprError::Syntax { .. })));
        assert!(matches!(evaluate("__import__('os')", &v), Err(ExprError::NotCallable(_))));
        assert_eq!(evaluate("0 ** -1", &v), Err(ExprError::DivisionByZero));
        assert_eq!(evaluate("0.0 ** -2.5", &v), Err(ExprError::DivisionByZero));
    }

    #[test]
    fn integer_overflow_falls_back_to_floats() {
        let v = Variables::new();
        assert_eq!(
            evaluate("(-9223372036854775807 - 1) // -1", &v),
            Ok(Value::Float(9_223_372_036_854_775_808.0))
        );
        assert_eq!(evaluate("(-9223372036854775807 - 1) % -1", &v), Ok(Value::Float(0.0)));
        assert_eq!(evaluate("0 ** 0", &v), Ok(Value::Int(1)));
        assert_eq!(evaluate("2 ** -1", &v), Ok(Value::Float(0.5)));
    }

    #[test]
    fn reference_detection() {
        let expr = Expression::parse("fc_parameters['X'] if True else 0").unwrap();
        assert!(expr.references("fc_parameters"));
        assert!(!Expression::parse("'fc_parameters'").unwrap().references("fc_parameters"));
    }

    #[test]
    fn parsed_expression_is_reusable() {
        let expr = Expression::parse("x * 2").unwrap();
        assert_eq!(expr.evaluate(&Variables::new().with("x", 2i64)), Ok(Value::Int(4)));
        assert_eq!(expr.evaluate(&Variables::new().with("x", 1.5)), Ok(Value::Float(3.0)));
    }
}
