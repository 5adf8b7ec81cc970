//! Predicate Queries
//!
//! A small boolean expression language over table columns, close to the
//! filter strings data-analysis models are used to emitting:
//!
//! ```text
//! age > 25 and city == "New York"
//! not (vessel == "renal" or velocity < 1.0)
//! abnormal == true
//! ```
//!
//! Grammar (lowest precedence first):
//!
//! ```text
//! or      := and ("or" and)*
//! and     := unary ("and" unary)*
//! unary   := "not" unary | "(" or ")" | cmp
//! cmp     := operand (("==" | "!=" | ">" | ">=" | "<" | "<=") operand)?
//! operand := column | number | quoted-string | "true" | "false"
//! ```
//!
//! Expressions compile against a fixed column list; unknown columns and
//! malformed syntax are compile-time [`QueryError`]s, surfaced to the model
//! as tool-level errors.

use crate::table::Cell;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    #[error("query syntax error at position {pos}: {message}")]
    Syntax { pos: usize, message: String },

    #[error("unknown column '{column}' in query")]
    UnknownColumn { column: String },
}

fn syntax(pos: usize, message: impl Into<String>) -> QueryError {
    QueryError::Syntax {
        pos,
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Number(f64),
    Str(String),
    True,
    False,
    And,
    Or,
    Not,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LParen,
    RParen,
}

fn tokenize(src: &str) -> Result<Vec<(Tok, usize)>, QueryError> {
    let bytes = src.as_bytes();
    let mut toks = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '(' => {
                toks.push((Tok::LParen, i));
                i += 1;
            }
            ')' => {
                toks.push((Tok::RParen, i));
                i += 1;
            }
            '=' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    toks.push((Tok::Eq, i));
                    i += 2;
                } else {
                    return Err(syntax(i, "expected '==' (single '=' is not a comparison)"));
                }
            }
            '!' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    toks.push((Tok::Ne, i));
                    i += 2;
                } else {
                    return Err(syntax(i, "expected '!='"));
                }
            }
            '<' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    toks.push((Tok::Le, i));
                    i += 2;
                } else {
                    toks.push((Tok::Lt, i));
                    i += 1;
                }
            }
            '>' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    toks.push((Tok::Ge, i));
                    i += 2;
                } else {
                    toks.push((Tok::Gt, i));
                    i += 1;
                }
            }
            '"' | '\'' => {
                let quote = bytes[i];
                let start = i;
                i += 1;
                let body_start = i;
                while i < bytes.len() && bytes[i] != quote {
                    i += 1;
                }
                if i >= bytes.len() {
                    return Err(syntax(start, "unterminated string literal"));
                }
                toks.push((Tok::Str(src[body_start..i].to_string()), start));
                i += 1;
            }
            '-' | '0'..='9' => {
                let start = i;
                if c == '-' {
                    i += 1;
                    if !matches!(bytes.get(i), Some(b'0'..=b'9')) {
                        return Err(syntax(start, "expected digits after '-'"));
                    }
                }
                while matches!(bytes.get(i), Some(b'0'..=b'9') | Some(b'.')) {
                    i += 1;
                }
                let text = &src[start..i];
                let value = text
                    .parse::<f64>()
                    .map_err(|_| syntax(start, format!("invalid number '{text}'")))?;
                toks.push((Tok::Number(value), start));
            }
            _ if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < bytes.len() {
                    let b = bytes[i] as char;
                    if b.is_ascii_alphanumeric() || b == '_' {
                        i += 1;
                    } else {
                        break;
                    }
                }
                let word = &src[start..i];
                let tok = match word.to_ascii_lowercase().as_str() {
                    "and" => Tok::And,
                    "or" => Tok::Or,
                    "not" => Tok::Not,
                    "true" => Tok::True,
                    "false" => Tok::False,
                    _ => Tok::Ident(word.to_string()),
                };
                toks.push((tok, start));
            }
            _ => return Err(syntax(i, format!("unexpected character '{c}'"))),
        }
    }

    Ok(toks)
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone)]
enum Operand {
    /// Resolved column index into the row.
    Column(usize),
    Number(f64),
    Str(String),
    Bool(bool),
}

#[derive(Debug, Clone)]
enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Cmp {
        op: CmpOp,
        lhs: Operand,
        rhs: Operand,
    },
    /// A bare operand; true only for boolean `true` cells/literals.
    Truthy(Operand),
}

/// A compiled predicate, ready to evaluate against rows of the table it was
/// compiled for.
#[derive(Debug, Clone)]
pub struct Predicate {
    expr: Expr,
}

/// Compile a query expression against a column list.
pub fn compile(src: &str, columns: &[String]) -> Result<Predicate, QueryError> {
    let toks = tokenize(src)?;
    let mut parser = Parser {
        toks: &toks,
        pos: 0,
        columns,
        src_len: src.len(),
    };
    let expr = parser.parse_or()?;
    if let Some((_, at)) = parser.peek_with_pos() {
        return Err(syntax(at, "unexpected trailing input"));
    }
    Ok(Predicate { expr })
}

struct Parser<'a> {
    toks: &'a [(Tok, usize)],
    pos: usize,
    columns: &'a [String],
    src_len: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos).map(|(t, _)| t)
    }

    fn peek_with_pos(&self) -> Option<(&Tok, usize)> {
        self.toks.get(self.pos).map(|(t, p)| (t, *p))
    }

    fn next(&mut self) -> Option<(&'a Tok, usize)> {
        let item = self.toks.get(self.pos).map(|(t, p)| (t, *p));
        self.pos += 1;
        item
    }

    fn here(&self) -> usize {
        self.toks
            .get(self.pos)
            .map(|(_, p)| *p)
            .unwrap_or(self.src_len)
    }

    fn parse_or(&mut self) -> Result<Expr, QueryError> {
        let mut lhs = self.parse_and()?;
        while self.peek() == Some(&Tok::Or) {
            self.pos += 1;
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, QueryError> {
        let mut lhs = self.parse_unary()?;
        while self.peek() == Some(&Tok::And) {
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, QueryError> {
        match self.peek() {
            Some(Tok::Not) => {
                self.pos += 1;
                Ok(Expr::Not(Box::new(self.parse_unary()?)))
            }
            Some(Tok::LParen) => {
                self.pos += 1;
                let inner = self.parse_or()?;
                match self.next() {
                    Some((Tok::RParen, _)) => Ok(inner),
                    _ => Err(syntax(self.here(), "expected ')'")),
                }
            }
            _ => self.parse_cmp(),
        }
    }

    fn parse_cmp(&mut self) -> Result<Expr, QueryError> {
        let lhs = self.parse_operand()?;
        let op = match self.peek() {
            Some(Tok::Eq) => CmpOp::Eq,
            Some(Tok::Ne) => CmpOp::Ne,
            Some(Tok::Lt) => CmpOp::Lt,
            Some(Tok::Le) => CmpOp::Le,
            Some(Tok::Gt) => CmpOp::Gt,
            Some(Tok::Ge) => CmpOp::Ge,
            _ => return Ok(Expr::Truthy(lhs)),
        };
        self.pos += 1;
        let rhs = self.parse_operand()?;
        Ok(Expr::Cmp { op, lhs, rhs })
    }

    fn parse_operand(&mut self) -> Result<Operand, QueryError> {
        match self.next() {
            Some((Tok::Ident(name), _)) => {
                let idx = self
                    .columns
                    .iter()
                    .position(|c| c == name)
                    .ok_or_else(|| QueryError::UnknownColumn {
                        column: name.clone(),
                    })?;
                Ok(Operand::Column(idx))
            }
            Some((Tok::Number(n), _)) => Ok(Operand::Number(*n)),
            Some((Tok::Str(s), _)) => Ok(Operand::Str(s.clone())),
            Some((Tok::True, _)) => Ok(Operand::Bool(true)),
            Some((Tok::False, _)) => Ok(Operand::Bool(false)),
            Some((tok, at)) => Err(syntax(at, format!("expected a value, found {tok:?}"))),
            None => Err(syntax(self.src_len, "unexpected end of query")),
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// A resolved operand value during evaluation.
enum Val<'a> {
    Null,
    Bool(bool),
    Num(f64),
    Str(&'a str),
}

impl Predicate {
    /// Evaluate the predicate against one row.
    pub fn matches(&self, row: &[Cell]) -> bool {
        eval(&self.expr, row)
    }
}

fn resolve<'a>(operand: &'a Operand, row: &'a [Cell]) -> Val<'a> {
    match operand {
        Operand::Column(idx) => match row.get(*idx) {
            None | Some(Cell::Null) => Val::Null,
            Some(Cell::Bool(b)) => Val::Bool(*b),
            Some(Cell::Int(i)) => Val::Num(*i as f64),
            Some(Cell::Float(f)) => Val::Num(*f),
            Some(Cell::Str(s)) => Val::Str(s),
        },
        Operand::Number(n) => Val::Num(*n),
        Operand::Str(s) => Val::Str(s),
        Operand::Bool(b) => Val::Bool(*b),
    }
}

fn eval(expr: &Expr, row: &[Cell]) -> bool {
    match expr {
        Expr::Or(a, b) => eval(a, row) || eval(b, row),
        Expr::And(a, b) => eval(a, row) && eval(b, row),
        Expr::Not(inner) => !eval(inner, row),
        Expr::Truthy(operand) => matches!(resolve(operand, row), Val::Bool(true)),
        Expr::Cmp { op, lhs, rhs } => compare(*op, resolve(lhs, row), resolve(rhs, row)),
    }
}

/// Comparison semantics: numeric for number pairs, lexical for string pairs,
/// equality only for booleans. Missing values never satisfy a comparison
/// except `!=`, and mismatched types behave the same way.
fn compare(op: CmpOp, lhs: Val<'_>, rhs: Val<'_>) -> bool {
    match (lhs, rhs) {
        (Val::Num(a), Val::Num(b)) => match op {
            CmpOp::Eq => a == b,
            CmpOp::Ne => a != b,
            CmpOp::Lt => a < b,
            CmpOp::Le => a <= b,
            CmpOp::Gt => a > b,
            CmpOp::Ge => a >= b,
        },
        (Val::Str(a), Val::Str(b)) => match op {
            CmpOp::Eq => a == b,
            CmpOp::Ne => a != b,
            CmpOp::Lt => a < b,
            CmpOp::Le => a <= b,
            CmpOp::Gt => a > b,
            CmpOp::Ge => a >= b,
        },
        (Val::Bool(a), Val::Bool(b)) => match op {
            CmpOp::Eq => a == b,
            CmpOp::Ne => a != b,
            _ => false,
        },
        _ => op == CmpOp::Ne,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
