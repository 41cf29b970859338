//! Condition expressions: a small JSONata subset evaluated against one input
//! value bound to `$`.
//!
//! Supported: literals, `$`, field paths (`$.a.b` or bare `a.b`), `[n]`
//! indexes, array and object constructors, arithmetic, `&` concatenation, comparisons,
//! `and`/`or`/`in`, parentheses and a handful of `$functions`.

use serde_json::{Number, Value};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExpressionError {
    #[error("Syntax error at position {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("Unknown function: ${0}")]
    UnknownFunction(String),

    #[error("{0}")]
    Evaluation(String),
}

type EvalResult = std::result::Result<Option<Value>, ExpressionError>;

const FUNCTIONS: &[&str] = &[
    "contains",
    "length",
    "exists",
    "string",
    "number",
    "boolean",
    "not",
    "lowercase",
    "uppercase",
    "count",
    "trim",
];

/// A parsed expression. `None` results stand for JSONata's `undefined`.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    ast: Expr,
}

impl Expression {
    /// Parse an expression. A blank string parses to an expression that is
    /// always undefined.
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Ok(Self {
                ast: Expr::Undefined,
            });
        }
        let mut parser = Parser { tokens, pos: 0 };
        let ast = parser.parse_or()?;
        if let Some((position, token)) = parser.tokens.get(parser.pos) {
            return Err(ExpressionError::Syntax {
                position: *position,
                message: format!("unexpected token {:?}", token),
            });
        }
        Ok(Self { ast })
    }

    pub fn evaluate(&self, input: &Value) -> EvalResult {
        eval(&self.ast, input)
    }

    /// Evaluate and cast the result with JavaScript truthiness.
    pub fn matches(&self, input: &Value) -> Result<bool, ExpressionError> {
        Ok(is_truthy(self.evaluate(input)?.as_ref()))
    }
}

/// JavaScript truthiness. Undefined, `null`, `false`, `0`, `NaN` and `""` are
/// falsy; arrays and objects are always truthy.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map_or(false, |f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

// ── Lexer ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Str(String),
    Name(String),
    /// `$` is `Var("")`, `$name` is `Var("name")`.
    Var(String),
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Colon,
    Op(&'static str),
}

fn tokenize(source: &str) -> Result<Vec<(usize, Token)>, ExpressionError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    let syntax = |position: usize, message: &str| ExpressionError::Syntax {
        position,
        message: message.to_string(),
    };

    while i < chars.len() {
        let c = chars[i];
        let start = i;

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() {
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                // `1.foo` is not a number; stop before a dot not followed by a digit.
                if chars[i] == '.' && !chars.get(i + 1).map_or(false, |d| d.is_ascii_digit()) {
                    break;
                }
                i += 1;
            }
            if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                i += 1;
                if i < chars.len() && (chars[i] == '+' || chars[i] == '-') {
                    i += 1;
                }
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            let text: String = chars[start..i].iter().collect();
            let n = text
                .parse::<f64>()
                .map_err(|_| syntax(start, "invalid number"))?;
            tokens.push((start, Token::Num(n)));
            continue;
        }

        if c == '"' || c == '\'' {
            i += 1;
            let mut s = String::new();
            loop {
                let Some(&ch) = chars.get(i) else {
                    return Err(syntax(start, "unterminated string"));
                };
                i += 1;
                if ch == c {
                    break;
                }
                if ch == '\\' {
                    let Some(&escaped) = chars.get(i) else {
                        return Err(syntax(start, "unterminated string"));
                    };
                    i += 1;
                    s.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                } else {
                    s.push(ch);
                }
            }
            tokens.push((start, Token::Str(s)));
            continue;
        }

        if c == '`' {
            i += 1;
            let name_start = i;
            while i < chars.len() && chars[i] != '`' {
                i += 1;
            }
            if i >= chars.len() {
                return Err(syntax(start, "unterminated quoted name"));
            }
            let name: String = chars[name_start..i].iter().collect();
            i += 1;
            tokens.push((start, Token::Name(name)));
            continue;
        }

        if c == '$' {
            i += 1;
            // `$$` is the root, which is the same value here.
            if chars.get(i) == Some(&'$') {
                i += 1;
                tokens.push((start, Token::Var(String::new())));
                continue;
            }
            let name_start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push((start, Token::Var(chars[name_start..i].iter().collect())));
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push((start, Token::Name(chars[start..i].iter().collect())));
            continue;
        }

        let two: String = chars[i..(i + 2).min(chars.len())].iter().collect();
        let op = match two.as_str() {
            "!=" => Some("!="),
            "<=" => Some("<="),
            ">=" => Some(">="),
            _ => None,
        };
        if let Some(op) = op {
            tokens.push((start, Token::Op(op)));
            i += 2;
            continue;
        }

        let token = match c {
            '.' => Token::Dot,
            ',' => Token::Comma,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            ':' => Token::Colon,
            '=' => Token::Op("="),
            '<' => Token::Op("<"),
            '>' => Token::Op(">"),
            '+' => Token::Op("+"),
            '-' => Token::Op("-"),
            '*' => Token::Op("*"),
            '/' => Token::Op("/"),
            '%' => Token::Op("%"),
            '&' => Token::Op("&"),
            _ => return Err(syntax(start, &format!("unexpected character '{}'", c))),
        };
        tokens.push((start, token));
        i += 1;
    }

    Ok(tokens)
}

// ── Parser ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(Value),
    Undefined,
    Current,
    Array(Vec<Expr>),
    Object(Vec<(Expr, Expr)>),
    Field(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Negate(Box<Expr>),
    Binary(&'static str, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(0, |(p, _)| *p)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        self.pos += 1;
        token
    }

    fn error(&self, message: impl Into<String>) -> ExpressionError {
        ExpressionError::Syntax {
            position: self.position(),
            message: message.into(),
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), ExpressionError> {
        match self.next() {
            Some(ref t) if *t == expected => Ok(()),
            Some(t) => Err(self.error(format!("expected {:?}, found {:?}", expected, t))),
            None => Err(self.error(format!("expected {:?}, found end of input", expected))),
        }
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Name(n)) if n == keyword)
    }

    fn parse_or(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.parse_and()?;
        while self.is_keyword("or") {
            self.pos += 1;
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.parse_comparison()?;
        while self.is_keyword("and") {
            self.pos += 1;
            let rhs = self.parse_comparison()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.parse_concat()?;
        loop {
            let op = match self.peek() {
                Some(Token::Op(op)) if matches!(*op, "=" | "!=" | "<" | "<=" | ">" | ">=") => *op,
                Some(Token::Name(n)) if n == "in" => "in",
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_concat()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_concat(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.parse_additive()?;
        while self.peek() == Some(&Token::Op("&")) {
            self.pos += 1;
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary("&", Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Op(op)) if matches!(*op, "+" | "-") => *op,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Op(op)) if matches!(*op, "*" | "/" | "%") => *op,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ExpressionError> {
        if self.peek() == Some(&Token::Op("-")) {
            self.pos += 1;
            return Ok(Expr::Negate(Box::new(self.parse_unary()?)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ExpressionError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    match self.next() {
                        Some(Token::Name(name)) => expr = Expr::Field(Box::new(expr), name),
                        _ => return Err(self.error("expected a field name after '.'")),
                    }
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    let index = self.parse_or()?;
                    self.expect(Token::RBracket)?;
                    expr = Expr::Index(Box::new(expr), Box::new(index));
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ExpressionError> {
        match self.next() {
            Some(Token::Num(n)) => Ok(Expr::Literal(number_value(n)?)),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::Name(name)) => Ok(match name.as_str() {
                "true" => Expr::Literal(Value::Bool(true)),
                "false" => Expr::Literal(Value::Bool(false)),
                "null" => Expr::Literal(Value::Null),
                _ => Expr::Field(Box::new(Expr::Current), name),
            }),
            Some(Token::Var(name)) if name.is_empty() => Ok(Expr::Current),
            Some(Token::Var(name)) => {
                if self.peek() != Some(&Token::LParen) {
                    // Unbound variables are undefined.
                    return Ok(Expr::Undefined);
                }
                if !FUNCTIONS.contains(&name.as_str()) {
                    return Err(ExpressionError::UnknownFunction(name));
                }
                self.pos += 1;
                let mut args = Vec::new();
                if self.peek() != Some(&Token::RParen) {
                    loop {
                        args.push(self.parse_or()?);
                        if self.peek() == Some(&Token::Comma) {
                            self.pos += 1;
                        } else {
                            break;
                        }
                    }
                }
                self.expect(Token::RParen)?;
                Ok(Expr::Call(name, args))
            }
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::LBracket) => {
                let mut items = Vec::new();
                if self.peek() != Some(&Token::RBracket) {
                    loop {
                        items.push(self.parse_or()?);
                        if self.peek() == Some(&Token::Comma) {
                            self.pos += 1;
                        } else {
                            break;
                        }
                    }
                }
                self.expect(Token::RBracket)?;
                Ok(Expr::Array(items))
            }
            Some(Token::LBrace) => {
                let mut pairs = Vec::new();
                if self.peek() != Some(&Token::RBrace) {
                    loop {
                        let key = self.parse_or()?;
                        self.expect(Token::Colon)?;
                        pairs.push((key, self.parse_or()?));
                        if self.peek() == Some(&Token::Comma) {
                            self.pos += 1;
                        } else {
                            break;
                        }
                    }
                }
                self.expect(Token::RBrace)?;
                Ok(Expr::Object(pairs))
            }
            Some(token) => Err(self.error(format!("unexpected token {:?}", token))),
            None => Err(self.error("unexpected end of expression")),
        }
    }
}

// ── Evaluation ──────────────────────────────────────────────────

fn eval(expr: &Expr, input: &Value) -> EvalResult {
    match expr {
        Expr::Literal(v) => Ok(Some(v.clone())),
        Expr::Undefined => Ok(None),
        Expr::Current => Ok(Some(input.clone())),
        Expr::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                if let Some(v) = eval(item, input)? {
                    out.push(v);
                }
            }
            Ok(Some(Value::Array(out)))
        }
        Expr::Object(pairs) => {
            let mut out = serde_json::Map::new();
            for (key, value) in pairs {
                let key = match eval(key, input)? {
                    Some(Value::String(key)) => key,
                    _ => {
                        return Err(ExpressionError::Evaluation(
                            "Object key must evaluate to a string".to_string(),
                        ))
                    }
                };
                // Undefined values leave the key out.
                if let Some(v) = eval(value, input)? {
                    out.insert(key, v);
                }
            }
            Ok(Some(Value::Object(out)))
        }
        Expr::Field(base, name) => Ok(eval(base, input)?.and_then(|v| field(&v, name))),
        Expr::Index(base, index) => {
            let base = eval(base, input)?;
            let index = match eval(index, input)? {
                Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0).floor() as i64,
                _ => {
                    return Err(ExpressionError::Evaluation(
                        "Only numeric indexes are supported".to_string(),
                    ))
                }
            };
            Ok(base.and_then(|v| index_of(v, index)))
        }
        Expr::Negate(inner) => match eval(inner, input)? {
            None => Ok(None),
            Some(Value::Number(n)) => Ok(Some(number_value(-n.as_f64().unwrap_or(0.0))?)),
            Some(_) => Err(ExpressionError::Evaluation(
                "Cannot negate a non-numeric value".to_string(),
            )),
        },
        Expr::And(lhs, rhs) => {
            if !is_truthy(eval(lhs, input)?.as_ref()) {
                return Ok(Some(Value::Bool(false)));
            }
            Ok(Some(Value::Bool(is_truthy(eval(rhs, input)?.as_ref()))))
        }
        Expr::Or(lhs, rhs) => {
            if is_truthy(eval(lhs, input)?.as_ref()) {
                return Ok(Some(Value::Bool(true)));
            }
            Ok(Some(Value::Bool(is_truthy(eval(rhs, input)?.as_ref()))))
        }
        Expr::Binary(op, lhs, rhs) => {
            let lhs = eval(lhs, input)?;
            let rhs = eval(rhs, input)?;
            binary(op, lhs, rhs)
        }
        Expr::Call(name, args) => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval(arg, input)?);
            }
            call(name, values)
        }
    }
}

fn field(value: &Value, name: &str) -> Option<Value> {
    match value {
        Value::Object(map) => map.get(name).cloned(),
        // Paths map over arrays and flatten the results.
        Value::Array(items) => {
            let mut out = Vec::new();
            for item in items {
                match field(item, name) {
                    Some(Value::Array(inner)) => out.extend(inner),
                    Some(v) => out.push(v),
                    None => {}
                }
            }
            match out.len() {
                0 => None,
                1 => out.pop(),
                _ => Some(Value::Array(out)),
            }
        }
        _ => None,
    }
}

fn index_of(value: Value, index: i64) -> Option<Value> {
    match value {
        Value::Array(mut items) => {
            let len = items.len() as i64;
            let i = if index < 0 { len + index } else { index };
            if i < 0 || i >= len {
                None
            } else {
                Some(items.swap_remove(i as usize))
            }
        }
        other if index == 0 || index == -1 => Some(other),
        _ => None,
    }
}

fn binary(op: &str, lhs: Option<Value>, rhs: Option<Value>) -> EvalResult {
    match op {
        "=" => Ok(Some(Value::Bool(match (&lhs, &rhs) {
            (Some(a), Some(b)) => values_equal(a, b),
            _ => false,
        }))),
        "!=" => Ok(Some(Value::Bool(match (&lhs, &rhs) {
            (Some(a), Some(b)) => !values_equal(a, b),
            _ => false,
        }))),
        "<" | "<=" | ">" | ">=" => {
            let (Some(a), Some(b)) = (lhs, rhs) else {
                return Ok(Some(Value::Bool(false)));
            };
            let ordering = match (&a, &b) {
                (Value::Number(x), Value::Number(y)) => x
                    .as_f64()
                    .unwrap_or(f64::NAN)
                    .partial_cmp(&y.as_f64().unwrap_or(f64::NAN)),
                (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
                _ => {
                    return Err(ExpressionError::Evaluation(format!(
                        "The operands of the '{}' operator must be both numbers or both strings",
                        op
                    )))
                }
            };
            let Some(ordering) = ordering else {
                return Ok(Some(Value::Bool(false)));
            };
            Ok(Some(Value::Bool(match op {
                "<" => ordering.is_lt(),
                "<=" => ordering.is_le(),
                ">" => ordering.is_gt(),
                _ => ordering.is_ge(),
            })))
        }
        "in" => {
            let Some(needle) = lhs else {
                return Ok(Some(Value::Bool(false)));
            };
            let found = match rhs {
                Some(Value::Array(items)) => items.iter().any(|v| values_equal(&needle, v)),
                Some(v) => values_equal(&needle, &v),
                None => false,
            };
            Ok(Some(Value::Bool(found)))
        }
        "&" => {
            let mut s = lhs.map(|v| stringify(&v)).unwrap_or_default();
            s.push_str(&rhs.map(|v| stringify(&v)).unwrap_or_default());
            Ok(Some(Value::String(s)))
        }
        _ => {
            let (Some(a), Some(b)) = (lhs, rhs) else {
                return Ok(None);
            };
            let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) else {
                return Err(ExpressionError::Evaluation(format!(
                    "The operands of the '{}' operator must be numbers",
                    op
                )));
            };
            let result = match op {
                "+" => x + y,
                "-" => x - y,
                "*" => x * y,
                "/" => x / y,
                _ => x % y,
            };
            Ok(Some(number_value(result)?))
        }
    }
}

fn call(name: &str, args: Vec<Option<Value>>) -> EvalResult {
    let arity = match name {
        "contains" => 2,
        _ => 1,
    };
    if args.len() != arity {
        return Err(ExpressionError::Evaluation(format!(
            "${} expects {} argument(s), got {}",
            name,
            arity,
            args.len()
        )));
    }
    let mut args = args.into_iter();
    let first = args.next().flatten();

    match name {
        "exists" => Ok(Some(Value::Bool(first.is_some()))),
        "boolean" => Ok(Some(Value::Bool(is_truthy(first.as_ref())))),
        "not" => Ok(Some(Value::Bool(!is_truthy(first.as_ref())))),
        "count" => Ok(Some(Value::from(match first {
            None => 0,
            Some(Value::Array(items)) => items.len(),
            Some(_) => 1,
        }))),
        "string" => Ok(first.map(|v| Value::String(stringify(&v)))),
        "number" => match first {
            None => Ok(None),
            Some(Value::Number(n)) => Ok(Some(Value::Number(n))),
            Some(Value::Bool(b)) => Ok(Some(Value::from(if b { 1 } else { 0 }))),
            Some(Value::String(s)) => match s.trim().parse::<f64>() {
                Ok(n) => Ok(Some(number_value(n)?)),
                Err(_) => Err(ExpressionError::Evaluation(format!(
                    "Unable to cast value to a number: \"{}\"",
                    s
                ))),
            },
            Some(other) => Err(ExpressionError::Evaluation(format!(
                "Unable to cast value to a number: {}",
                other
            ))),
        },
        _ => {
            let Some(first) = first else {
                return Ok(None);
            };
            let Value::String(s) = first else {
                return Err(ExpressionError::Evaluation(format!(
                    "${} expects a string argument",
                    name
                )));
            };
            match name {
                "length" => Ok(Some(Value::from(s.chars().count()))),
                "lowercase" => Ok(Some(Value::String(s.to_lowercase()))),
                "uppercase" => Ok(Some(Value::String(s.to_uppercase()))),
                "trim" => Ok(Some(Value::String(
                    s.split_whitespace().collect::<Vec<_>>().join(" "),
                ))),
                "contains" => match args.next().flatten() {
                    None => Ok(None),
                    Some(Value::String(pattern)) => Ok(Some(Value::Bool(s.contains(&pattern)))),
                    Some(_) => Err(ExpressionError::Evaluation(
                        "$contains expects a string pattern".to_string(),
                    )),
                },
                _ => Err(ExpressionError::UnknownFunction(name.to_string())),
            }
        }
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn number_value(n: f64) -> Result<Value, ExpressionError> {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        return Ok(Value::from(n as i64));
    }
    Number::from_f64(n)
        .map(Value::Number)
        .ok_or_else(|| ExpressionError::Evaluation("Number out of range".to_string()))
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1.0e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}
