//! Arithmetic-only tokenizer, parser and interpreter
//!
//! Grammar (conventional operator precedence, no names of any kind):
//!
//! ```text
//! expr  := term  (('+' | '-') term)*
//! term  := unary (('*' | '/' | '//' | '%') unary)*
//! unary := ('+' | '-') unary | power
//! power := atom ('**' unary)?
//! atom  := NUMBER | '(' expr ')'
//! ```
//!
//! Anything else, letters included, is a syntax error. There is no way to
//! reach a variable, call or attribute from this grammar.

use std::fmt;

/// Nesting limit for parentheses and unary/power chains
const MAX_DEPTH: usize = 100;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalcError {
    #[error("unexpected character {0:?}")]
    UnexpectedChar(char),
    #[error("invalid number literal {0:?}")]
    InvalidNumber(String),
    #[error("unexpected token {0}")]
    UnexpectedToken(Token),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("expression nested too deeply")]
    TooDeep,
    #[error("division by zero")]
    DivisionByZero,
    #[error("numeric result out of range")]
    Overflow,
    #[error("result is not a real number")]
    NotReal,
}

/// Integer arithmetic is exact; anything else is a double
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    fn is_zero(self) -> bool {
        match self {
            Number::Int(i) => i == 0,
            Number::Float(f) => f == 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Num(Number),
    Plus,
    Minus,
    Star,
    Slash,
    DoubleSlash,
    Percent,
    DoubleStar,
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Token::Num(Number::Int(i)) => return write!(f, "{i}"),
            Token::Num(Number::Float(x)) => return write!(f, "{x}"),
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::DoubleSlash => "//",
            Token::Percent => "%",
            Token::DoubleStar => "**",
            Token::LParen => "(",
            Token::RParen => ")",
        };
        write!(f, "'{s}'")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

/// The complete set of node kinds the interpreter knows about
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Number),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

pub fn tokenize(input: &str) -> Result<Vec<Token>, CalcError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let doubled = chars.get(i + 1) == Some(&c);
        let token = match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                tokens.push(Token::Num(parse_number(&literal)?));
                continue;
            }
            '*' if doubled => Token::DoubleStar,
            '/' if doubled => Token::DoubleSlash,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '(' => Token::LParen,
            ')' => Token::RParen,
            other => return Err(CalcError::UnexpectedChar(other)),
        };
        i += if matches!(token, Token::DoubleStar | Token::DoubleSlash) {
            2
        } else {
            1
        };
        tokens.push(token);
    }

    Ok(tokens)
}

fn parse_number(literal: &str) -> Result<Number, CalcError> {
    let invalid = || CalcError::InvalidNumber(literal.to_string());
    let dots = literal.matches('.').count();
    if dots > 1 || literal == "." {
        return Err(invalid());
    }
    if dots == 1 {
        return literal.parse::<f64>().map(Number::Float).map_err(|_| invalid());
    }
    // Decimal integers may not carry leading zeros ("007"), except zero itself ("00")
    if literal.len() > 1 && literal.starts_with('0') && literal.bytes().any(|b| b != b'0') {
        return Err(invalid());
    }
    // Digits only at this point, so the only failure is width
    literal
        .parse::<i64>()
        .map(Number::Int)
        .map_err(|_| CalcError::Overflow)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn descend(&mut self) -> Result<(), CalcError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(CalcError::TooDeep);
        }
        Ok(())
    }

    fn expr(&mut self) -> Result<Expr, CalcError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn term(&mut self) -> Result<Expr, CalcError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::DoubleSlash) => BinaryOp::FloorDiv,
                Some(Token::Percent) => BinaryOp::Mod,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn unary(&mut self) -> Result<Expr, CalcError> {
        let op = match self.peek() {
            Some(Token::Plus) => UnaryOp::Plus,
            Some(Token::Minus) => UnaryOp::Neg,
            _ => return self.power(),
        };
        self.pos += 1;
        self.descend()?;
        let operand = self.unary()?;
        self.depth -= 1;
        Ok(Expr::Unary(op, Box::new(operand)))
    }

    fn power(&mut self) -> Result<Expr, CalcError> {
        let base = self.atom()?;
        if self.peek() != Some(&Token::DoubleStar) {
            return Ok(base);
        }
        self.pos += 1;
        // Right-associative, and binds tighter than a unary minus on its left:
        // -2**2 == -(2**2), 2**-1 == 0.5
        self.descend()?;
        let exponent = self.unary()?;
        self.depth -= 1;
        Ok(Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)))
    }

    fn atom(&mut self) -> Result<Expr, CalcError> {
        match self.next() {
            Some(Token::Num(n)) => Ok(Expr::Literal(*n)),
            Some(Token::LParen) => {
                self.descend()?;
                let inner = self.expr()?;
                self.depth -= 1;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    Some(other) => Err(CalcError::UnexpectedToken(other.clone())),
                    None => Err(CalcError::UnexpectedEnd),
                }
            }
            Some(other) => Err(CalcError::UnexpectedToken(other.clone())),
            None => Err(CalcError::UnexpectedEnd),
        }
    }
}

/// Parse a complete expression; trailing tokens are an error
pub fn parse(input: &str) -> Result<Expr, CalcError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.expr()?;
    match parser.peek() {
        None => Ok(expr),
        Some(extra) => Err(CalcError::UnexpectedToken(extra.clone())),
    }
}

pub fn eval(expr: &Expr) -> Result<Number, CalcError> {
    let value = match expr {
        Expr::Literal(n) => *n,
        Expr::Unary(UnaryOp::Plus, operand) => eval(operand)?,
        Expr::Unary(UnaryOp::Neg, operand) => match eval(operand)? {
            Number::Int(i) => Number::Int(i.checked_neg().ok_or(CalcError::Overflow)?),
            Number::Float(f) => Number::Float(-f),
        },
        Expr::Binary(op, lhs, rhs) => apply(*op, eval(lhs)?, eval(rhs)?)?,
    };
    match value {
        Number::Float(f) if !f.is_finite() => Err(CalcError::Overflow),
        v => Ok(v),
    }
}

fn apply(op: BinaryOp, a: Number, b: Number) -> Result<Number, CalcError> {
    use Number::{Float, Int};

    if matches!(op, BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Mod) && b.is_zero() {
        return Err(CalcError::DivisionByZero);
    }

    let value = match (op, a, b) {
        (BinaryOp::Add, Int(x), Int(y)) => Int(x.checked_add(y).ok_or(CalcError::Overflow)?),
        (BinaryOp::Sub, Int(x), Int(y)) => Int(x.checked_sub(y).ok_or(CalcError::Overflow)?),
        (BinaryOp::Mul, Int(x), Int(y)) => Int(x.checked_mul(y).ok_or(CalcError::Overflow)?),
        (BinaryOp::FloorDiv, Int(x), Int(y)) => match (x.checked_div(y), x.checked_rem(y)) {
            (Some(q), Some(r)) if r != 0 && (r < 0) != (y < 0) => Int(q - 1),
            (Some(q), Some(_)) => Int(q),
            _ => return Err(CalcError::Overflow),
        },
        (BinaryOp::Mod, Int(x), Int(y)) => match x.checked_rem(y) {
            Some(r) if r != 0 && (r < 0) != (y < 0) => Int(r + y),
            Some(r) => Int(r),
            None => Int(0),
        },
        (BinaryOp::Pow, Int(x), Int(y)) if y >= 0 => match x {
            0 | 1 => Int(if y == 0 { 1 } else { x }),
            -1 => Int(if y % 2 == 0 { 1 } else { -1 }),
            _ => Int(u32::try_from(y)
                .ok()
                .and_then(|e| x.checked_pow(e))
                .ok_or(CalcError::Overflow)?),
        },
        (BinaryOp::Pow, _, _) => {
            let (x, y) = (a.as_f64(), b.as_f64());
            if x == 0.0 && y < 0.0 {
                return Err(CalcError::DivisionByZero);
            }
            if x < 0.0 && y.fract() != 0.0 {
                return Err(CalcError::NotReal);
            }
            Float(x.powf(y))
        }
        (BinaryOp::Add, _, _) => Float(a.as_f64() + b.as_f64()),
        (BinaryOp::Sub, _, _) => Float(a.as_f64() - b.as_f64()),
        (BinaryOp::Mul, _, _) => Float(a.as_f64() * b.as_f64()),
        (BinaryOp::Div, _, _) => Float(a.as_f64() / b.as_f64()),
        (BinaryOp::FloorDiv, _, _) => Float((a.as_f64() / b.as_f64()).floor()),
        (BinaryOp::Mod, _, _) => {
            let (x, y) = (a.as_f64(), b.as_f64());
            let r = x % y;
            if r != 0.0 && (r < 0.0) != (y < 0.0) {
                Float(r + y)
            } else {
                Float(r)
            }
        }
    };
    Ok(value)
}

/// Magnitude from which floats print with an exponent; beyond it not every
/// digit of an integral double is meaningful.
const LARGE_FLOAT: f64 = 1e16;

/// Integers print exactly. Integral floats print without a fraction, other
/// floats use the shortest round-trip form, and very small or very large
/// magnitudes switch to an exponent.
pub fn format_number(n: Number) -> String {
    match n {
        Number::Int(i) => i.to_string(),
        Number::Float(f) if f == 0.0 => "0".to_string(),
        Number::Float(f) if f.abs() < 1e-4 || f.abs() >= LARGE_FLOAT => {
            let sci = format!("{f:e}");
            match sci.split_once('e') {
                Some((mantissa, exp)) => {
                    let (sign, digits) = match exp.strip_prefix('-') {
                        Some(d) => ("-", d),
                        None => ("+", exp),
                    };
                    format!("{mantissa}e{sign}{digits:0>2}")
                }
                None => sci,
            }
        }
        Number::Float(f) if f.fract() == 0.0 => format!("{f:.0}"),
        Number::Float(f) => f.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calc(input: &str) -> Result<String, CalcError> {
        parse(input).and_then(|e| eval(&e)).map(format_number)
    }

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(calc("2 + 3 * 4").unwrap(), "14");
        assert_eq!(calc("(2 + 3) * 4").unwrap(), "20");
        assert_eq!(calc("2 ** 3 ** 2").unwrap(), "512");
        assert_eq!(calc("-2 ** 2").unwrap(), "-4");
        assert_eq!(calc("2 ** -1").unwrap(), "0.5");
        assert_eq!(calc("10 - 4 - 3").unwrap(), "3");
        assert_eq!(calc("--5").unwrap(), "5");
        assert_eq!(calc("+7").unwrap(), "7");
    }

    #[test]
    fn floor_division_and_modulo_round_toward_negative_infinity() {
        assert_eq!(calc("7 // 2").unwrap(), "3");
        assert_eq!(calc("-7 // 2").unwrap(), "-4");
        assert_eq!(calc("7 % 3").unwrap(), "1");
        assert_eq!(calc("-7 % 3").unwrap(), "2");
        assert_eq!(calc("7 % -3").unwrap(), "-2");
        assert_eq!(calc("7.5 // 2").unwrap(), "3");
        assert_eq!(calc("-7.5 % 2").unwrap(), "0.5");
    }

    #[test]
    fn nested_parentheses() {
        assert_eq!(calc("((1 + 2) * (3 + (4 - 1)))").unwrap(), "18");
    }

    #[test]
    fn float_results() {
        assert_eq!(calc("10 / 4").unwrap(), "2.5");
        assert_eq!(calc("1 / 3").unwrap(), "0.3333333333333333");
        assert_eq!(calc("6 / 3").unwrap(), "2");
        assert_eq!(calc(".5 + 1.").unwrap(), "1.5");
        assert_eq!(calc("1 / 100000").unwrap(), "1e-05");
    }

    #[test]
    fn integers_stay_exact_or_overflow() {
        assert_eq!(calc("3 ** 39").unwrap(), "4052555153018976267");
        assert_eq!(calc("3 ** 50"), Err(CalcError::Overflow));
        assert_eq!(calc("9223372036854775807 + 1"), Err(CalcError::Overflow));
        assert_eq!(calc("-9223372036854775807 - 2"), Err(CalcError::Overflow));
        assert_eq!(calc("2 ** 64"), Err(CalcError::Overflow));
        assert_eq!(calc("99999999999999999999"), Err(CalcError::Overflow));
        assert_eq!(calc("1 ** 5000000000").unwrap(), "1");
        assert_eq!(calc("(-1) ** 5000000001").unwrap(), "-1");
    }

    #[test]
    fn large_floats_use_an_exponent() {
        assert_eq!(calc("3.0 ** 50").unwrap(), "7.178979876918526e+23");
        assert_eq!(calc("1e3"), Err(CalcError::UnexpectedChar('e')));
        assert_eq!(calc("2.0 ** 40").unwrap(), "1099511627776");
        assert_eq!(calc("10.0 ** 16").unwrap(), "1e+16");
    }

    #[test]
    fn arithmetic_errors() {
        assert_eq!(calc("1 / 0"), Err(CalcError::DivisionByZero));
        assert_eq!(calc("1 // 0"), Err(CalcError::DivisionByZero));
        assert_eq!(calc("1 % 0.0"), Err(CalcError::DivisionByZero));
        assert_eq!(calc("0 ** -1"), Err(CalcError::DivisionByZero));
        assert_eq!(calc("(-8) ** 0.5"), Err(CalcError::NotReal));
        assert_eq!(calc("10 ** 400.0"), Err(CalcError::Overflow));
        assert_eq!(calc("9 ** 9 ** 9"), Err(CalcError::Overflow));
    }

    #[test]
    fn syntax_errors() {
        assert!(matches!(calc("1 +"), Err(CalcError::UnexpectedEnd)));
        assert!(matches!(calc("(1 + 2"), Err(CalcError::UnexpectedEnd)));
        assert!(matches!(calc("1 2"), Err(CalcError::UnexpectedToken(_))));
        assert!(matches!(calc("1 * * 2"), Err(CalcError::UnexpectedToken(_))));
        assert!(matches!(calc("()"), Err(CalcError::UnexpectedToken(_))));
        assert!(matches!(calc("1.2.3"), Err(CalcError::InvalidNumber(_))));
        assert!(matches!(calc("007"), Err(CalcError::InvalidNumber(_))));
        assert_eq!(calc("00").unwrap(), "0");
    }

    #[test]
    fn names_are_not_part_of_the_grammar() {
        assert_eq!(calc("x + 1"), Err(CalcError::UnexpectedChar('x')));
        assert_eq!(calc("abs(1)"), Err(CalcError::UnexpectedChar('a')));
        assert_eq!(calc("(1).real"), Err(CalcError::InvalidNumber(".".into())));
        assert_eq!(calc("1 if 1 else 2"), Err(CalcError::UnexpectedChar('i')));
        assert_eq!(calc("[1, 2]"), Err(CalcError::UnexpectedChar('[')));
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let deep = format!("{}1{}", "(".repeat(500), ")".repeat(500));
        assert_eq!(calc(&deep), Err(CalcError::TooDeep));
        let minus = format!("{}1", "-".repeat(500));
        assert_eq!(calc(&minus), Err(CalcError::TooDeep));
    }

    #[test]
    fn parse_builds_expected_tree() {
        assert_eq!(
            parse("-1 + 2").unwrap(),
            Expr::Binary(
                BinaryOp::Add,
                Box::new(Expr::Unary(
                    UnaryOp::Neg,
                    Box::new(Expr::Literal(Number::Int(1)))
                )),
                Box::new(Expr::Literal(Number::Int(2))),
            )
        );
    }
}
