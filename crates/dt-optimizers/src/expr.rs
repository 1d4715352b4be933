//! Formula expressions — lexer, parser, printer and rewrites.
//!
//! Formulas are string scalars starting with a prefix (`=` by default), in
//! spreadsheet notation:
//!
//! ```text
//! expr    := term (('+'|'-') term)*
//! term    := power (('*'|'/') power)*
//! power   := unary ('^' unary)*
//! unary   := '-' unary | primary
//! primary := NUMBER | STRING | REF | NAME '(' args? ')' | '(' expr ')'
//! ```
//!
//! Unary minus binds tighter than `^` and every binary operator is
//! left-associative, as in spreadsheets. Anything outside this grammar is a
//! [`ParseError`] and callers leave the text untouched.

use logos::Logos;
use std::collections::HashMap;
use std::fmt::Write as _;
use thiserror::Error;

/// Nesting limit; deeper formulas are reported as unparseable.
const MAX_DEPTH: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinOp {
    fn precedence(self) -> u8 {
        match self {
            Self::Add | Self::Sub => 1,
            Self::Mul | Self::Div => 2,
            Self::Pow => 3,
        }
    }

    fn symbol(self) -> char {
        match self {
            Self::Add => '+',
            Self::Sub => '-',
            Self::Mul => '*',
            Self::Div => '/',
            Self::Pow => '^',
        }
    }

    /// Evaluate on constants; `None` when the result is not a finite number.
    fn apply(self, lhs: f64, rhs: f64) -> Option<f64> {
        let value = match self {
            Self::Add => lhs + rhs,
            Self::Sub => lhs - rhs,
            Self::Mul => lhs * rhs,
            Self::Div if rhs == 0.0 => return None,
            Self::Div => lhs / rhs,
            Self::Pow if lhs == 0.0 && rhs <= 0.0 => return None,
            Self::Pow => lhs.powf(rhs),
        };
        value.is_finite().then_some(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Text(String),
    /// Cell, range, sheet-qualified or named reference.
    Ref(String),
    Call { name: String, args: Vec<Expr> },
    Neg(Box<Expr>),
    Binary { op: BinOp, lhs: Box<Expr>, rhs: Box<Expr> },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unexpected character {0:?} at offset {1}")]
    UnexpectedChar(char, usize),
    #[error("Unterminated string literal")]
    UnterminatedString,
    #[error("Unexpected token {0}")]
    UnexpectedToken(String),
    #[error("Unexpected end of formula")]
    UnexpectedEnd,
    #[error("Formula nested too deeply")]
    TooDeep,
    #[error("Empty formula")]
    Empty,
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
enum Token {
    #[regex(r"[0-9]+(\.[0-9]*)?([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),

    // `""` inside a literal is an escaped quote.
    #[regex(r#""([^"]|"")*""#, |lex| unquote(lex.slice()))]
    Str(String),

    /// Function name or reference: `A1`, `$B$2`, `A1:B9`, `Sheet1!C3`.
    #[regex(r"[A-Za-z_$][A-Za-z0-9_.$!:]*", |lex| lex.slice().to_string())]
    Name(String),

    #[token("+", |_| BinOp::Add)]
    #[token("-", |_| BinOp::Sub)]
    #[token("*", |_| BinOp::Mul)]
    #[token("/", |_| BinOp::Div)]
    #[token("^", |_| BinOp::Pow)]
    Op(BinOp),

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token(",")]
    Comma,
}

fn unquote(slice: &str) -> String {
    slice[1..slice.len() - 1].replace("\"\"", "\"")
}

fn tokenize(src: &str) -> Result<Vec<Token>, ParseError> {
    let mut lexer = Token::lexer(src);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next() {
        match token {
            Ok(token) => tokens.push(token),
            Err(()) => {
                return Err(match lexer.slice().chars().next() {
                    Some('"') => ParseError::UnterminatedString,
                    Some(c) => ParseError::UnexpectedChar(c, lexer.span().start),
                    None => ParseError::UnexpectedEnd,
                })
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, want: &Token) -> Result<(), ParseError> {
        match self.next() {
            Some(ref t) if t == want => Ok(()),
            Some(t) => Err(ParseError::UnexpectedToken(format!("{t:?}"))),
            None => Err(ParseError::UnexpectedEnd),
        }
    }

    fn descend(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ParseError::TooDeep);
        }
        Ok(())
    }

    fn expr(&mut self) -> Result<Expr, ParseError> {
        self.descend()?;
        let mut lhs = self.term()?;
        while let Some(Token::Op(op @ (BinOp::Add | BinOp::Sub))) = self.peek() {
            let op = *op;
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
        self.depth -= 1;
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.power()?;
        while let Some(Token::Op(op @ (BinOp::Mul | BinOp::Div))) = self.peek() {
            let op = *op;
            self.pos += 1;
            let rhs = self.power()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn power(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.unary()?;
        while let Some(Token::Op(BinOp::Pow)) = self.peek() {
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::binary(BinOp::Pow, lhs, rhs);
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        if let Some(Token::Op(BinOp::Sub)) = self.peek() {
            self.pos += 1;
            // A minus directly before a literal is part of the literal.
            if let Some(Token::Number(n)) = self.peek() {
                let n = *n;
                self.pos += 1;
                return Ok(Expr::Number(-n));
            }
            self.descend()?;
            let inner = self.unary()?;
            self.depth -= 1;
            return Ok(Expr::Neg(Box::new(inner)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        match self.next() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Str(s)) => Ok(Expr::Text(s)),
            Some(Token::Name(name)) => {
                if self.peek() != Some(&Token::LParen) {
                    return Ok(Expr::Ref(name));
                }
                self.pos += 1;
                let mut args = Vec::new();
                if self.peek() == Some(&Token::RParen) {
                    self.pos += 1;
                    return Ok(Expr::Call { name, args });
                }
                loop {
                    args.push(self.expr()?);
                    match self.next() {
                        Some(Token::Comma) => continue,
                        Some(Token::RParen) => break,
                        Some(t) => return Err(ParseError::UnexpectedToken(format!("{t:?}"))),
                        None => return Err(ParseError::UnexpectedEnd),
                    }
                }
                Ok(Expr::Call { name, args })
            }
            Some(Token::LParen) => {
                let inner = self.expr()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(t) => Err(ParseError::UnexpectedToken(format!("{t:?}"))),
            None => Err(ParseError::UnexpectedEnd),
        }
    }
}

/// Parse a formula body (without its prefix).
pub fn parse(src: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(src)?;
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }
    let mut parser = Parser { tokens, pos: 0, depth: 0 };
    let expr = parser.expr()?;
    match parser.peek() {
        None => Ok(expr),
        Some(t) => Err(ParseError::UnexpectedToken(format!("{t:?}"))),
    }
}

/// Body of a formula string, or `None` if `text` is not a formula.
pub fn formula_body<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    text.strip_prefix(prefix).filter(|body| !body.trim().is_empty())
}

impl Expr {
    fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Self::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }
    }

    /// Number of AST nodes; the unit of formula evaluation effort.
    pub fn node_count(&self) -> usize {
        match self {
            Self::Number(_) | Self::Text(_) | Self::Ref(_) => 1,
            Self::Call { args, .. } => 1 + args.iter().map(Self::node_count).sum::<usize>(),
            Self::Neg(inner) => 1 + inner.node_count(),
            Self::Binary { lhs, rhs, .. } => 1 + lhs.node_count() + rhs.node_count(),
        }
    }

    /// True when the expression always evaluates to a number (or an error),
    /// never to text. Only such operands may lose an identity operation.
    fn is_numeric(&self) -> bool {
        matches!(self, Self::Number(_) | Self::Neg(_) | Self::Binary { .. })
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Canonical text with the fewest parentheses that keep the same tree.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.write_to(&mut out);
        out
    }

    fn write_to(&self, out: &mut String) {
        match self {
            Self::Number(n) => {
                let _ = write!(out, "{n}");
            }
            Self::Text(s) => {
                out.push('"');
                out.push_str(&s.replace('"', "\"\""));
                out.push('"');
            }
            Self::Ref(name) => out.push_str(name),
            Self::Call { name, args } => {
                out.push_str(name);
                out.push('(');
                for (idx, arg) in args.iter().enumerate() {
                    if idx > 0 {
                        out.push(',');
                    }
                    arg.write_to(out);
                }
                out.push(')');
            }
            Self::Neg(inner) => {
                out.push('-');
                inner.write_operand(out, matches!(**inner, Self::Binary { .. }));
            }
            Self::Binary { op, lhs, rhs } => {
                let prec = op.precedence();
                lhs.write_operand(out, lhs.binary_precedence().is_some_and(|p| p < prec));
                out.push(op.symbol());
                rhs.write_operand(out, rhs.binary_precedence().is_some_and(|p| p <= prec));
            }
        }
    }

    fn write_operand(&self, out: &mut String, parenthesize: bool) {
        if parenthesize {
            out.push('(');
            self.write_to(out);
            out.push(')');
        } else {
            self.write_to(out);
        }
    }

    fn binary_precedence(&self) -> Option<u8> {
        match self {
            Self::Binary { op, .. } => Some(op.precedence()),
            _ => None,
        }
    }

    /// Composite sub-expressions that occur more than once, counted per extra occurrence.
    pub fn duplicate_subexpressions(&self) -> usize {
        let mut seen: HashMap<String, usize> = HashMap::new();
        self.collect_composites(&mut seen);
        seen.values().map(|&n| n.saturating_sub(1)).sum()
    }

    fn collect_composites(&self, seen: &mut HashMap<String, usize>) {
        match self {
            Self::Call { args, .. } => args.iter().for_each(|a| a.collect_composites(seen)),
            Self::Neg(inner) => inner.collect_composites(seen),
            Self::Binary { lhs, rhs, .. } => {
                lhs.collect_composites(seen);
                rhs.collect_composites(seen);
            }
            _ => return,
        }
        *seen.entry(self.render()).or_insert(0) += 1;
    }
}

// ========== Rewrites ==========

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SimplifyStats {
    pub constants_folded: usize,
    pub identities_removed: usize,
}

/// Constant folding and numeric identity elimination, bottom-up.
///
/// The result is a fixpoint: simplifying it again changes nothing.
pub fn simplify(expr: Expr, stats: &mut SimplifyStats) -> Expr {
    match expr {
        Expr::Neg(inner) => {
            let inner = simplify(*inner, stats);
            match inner {
                Expr::Number(n) => {
                    stats.constants_folded += 1;
                    Expr::Number(-n)
                }
                Expr::Neg(x) if x.is_numeric() => {
                    stats.identities_removed += 1;
                    *x
                }
                other => Expr::Neg(Box::new(other)),
            }
        }
        Expr::Binary { op, lhs, rhs } => {
            let lhs = simplify(*lhs, stats);
            let rhs = simplify(*rhs, stats);
            if let (Some(a), Some(b)) = (lhs.as_number(), rhs.as_number()) {
                if let Some(value) = op.apply(a, b) {
                    stats.constants_folded += 1;
                    return Expr::Number(value);
                }
            }
            let l = lhs.as_number();
            let r = rhs.as_number();
            let keep_lhs = match op {
                BinOp::Add | BinOp::Sub => r == Some(0.0),
                BinOp::Mul | BinOp::Div | BinOp::Pow => r == Some(1.0),
            } && lhs.is_numeric();
            let keep_rhs = match op {
                BinOp::Add => l == Some(0.0),
                BinOp::Mul => l == Some(1.0),
                _ => false,
            } && rhs.is_numeric();
            if keep_lhs {
                stats.identities_removed += 1;
                lhs
            } else if keep_rhs {
                stats.identities_removed += 1;
                rhs
            } else {
                Expr::binary(op, lhs, rhs)
            }
        }
        Expr::Call { name, args } => Expr::Call {
            name,
            args: args.into_iter().map(|a| simplify(a, stats)).collect(),
        },
        leaf => leaf,
    }
}

/// Splice nested calls to the same flattenable function into their parent:
/// `SUM(SUM(a, b), c)` becomes `SUM(a, b, c)`. Returns the rewritten tree and
/// the number of calls removed.
pub fn flatten_calls<F>(expr: Expr, flattenable: &F) -> (Expr, usize)
where
    F: Fn(&str) -> bool,
{
    match expr {
        Expr::Call { name, args } => {
            let mut removed = 0;
            let mut flat = Vec::with_capacity(args.len());
            for arg in args {
                let (arg, n) = flatten_calls(arg, flattenable);
                removed += n;
                match arg {
                    Expr::Call { name: inner, args: inner_args }
                        if flattenable(&name) && inner.eq_ignore_ascii_case(&name) =>
                    {
                        removed += 1;
                        flat.extend(inner_args);
                    }
                    other => flat.push(other),
                }
            }
            (Expr::Call { name, args: flat }, removed)
        }
        Expr::Neg(inner) => {
            let (inner, n) = flatten_calls(*inner, flattenable);
            (Expr::Neg(Box::new(inner)), n)
        }
        Expr::Binary { op, lhs, rhs } => {
            let (lhs, a) = flatten_calls(*lhs, flattenable);
            let (rhs, b) = flatten_calls(*rhs, flattenable);
            (Expr::binary(op, lhs, rhs), a + b)
        }
        leaf => (leaf, 0),
    }
}
