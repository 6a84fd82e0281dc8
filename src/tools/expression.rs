//! Arithmetic grammar behind the calculator tool.
//!
//! ```text
//! expr  := term (('+' | '-') term)*
//! term  := unary (('*' | '/' | '//') unary)*
//! unary := ('+' | '-') unary | power
//! power := atom ('**' unary)?
//! atom  := number | '(' expr ')'
//! ```
//!
//! Integers are arbitrary precision and stay integers under `+ - * // **`.
//! They become floats on `/` or when mixed with a float operand.

use std::fmt;

use num_bigint::BigInt;
use num_traits::{One, Signed, ToPrimitive, Zero};
use thiserror::Error;

const MAX_DEPTH: usize = 256;

/// Largest integer result, in bits, before a computation is refused.
const MAX_INT_BITS: u64 = 1 << 20;

/// Integers up to this many bits convert to `f64` exactly.
const EXACT_FLOAT_BITS: u64 = 53;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalculationError {
    #[error("invalid character `{0}` in expression")]
    InvalidCharacter(char),

    #[error("invalid number literal `{0}`")]
    InvalidNumber(String),

    #[error("leading zeros in decimal integer literals are not permitted")]
    LeadingZeros,

    #[error("unexpected `{token}` at position {position}")]
    UnexpectedToken { token: String, position: usize },

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("expression is nested too deeply")]
    TooDeep,

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer result too large")]
    Overflow,

    #[error("integer too large to convert to float")]
    IntTooLarge,

    #[error("numerical result out of range")]
    FloatOverflow,

    #[error("result is a complex number")]
    ComplexResult,

    #[error("missing `expression` argument")]
    MissingExpression,

    #[error("`expression` must be a string")]
    ExpressionNotString,
}

type Outcome<T> = std::result::Result<T, CalculationError>;

#[derive(Debug, Clone, PartialEq)]
pub enum Number {
    Int(BigInt),
    Float(f64),
}

impl Number {
    pub fn as_f64(&self) -> Result<f64, CalculationError> {
        match self {
            Number::Int(value) => int_to_f64(value),
            Number::Float(value) => Ok(*value),
        }
    }

    fn is_zero(&self) -> bool {
        match self {
            Number::Int(value) => value.is_zero(),
            Number::Float(value) => *value == 0.0,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(value) => write!(f, "{value}"),
            Number::Float(value) if value.is_nan() => f.write_str("nan"),
            Number::Float(value) if value.is_infinite() => {
                f.write_str(if *value > 0.0 { "inf" } else { "-inf" })
            }
            Number::Float(value) => {
                let magnitude = value.abs();
                if magnitude >= 1e16 || (magnitude != 0.0 && magnitude < 1e-4) {
                    write_scientific(f, *value)
                } else if value.fract() == 0.0 {
                    write!(f, "{value:.1}")
                } else {
                    write!(f, "{value}")
                }
            }
        }
    }
}

// `1e16` -> `1e+16`, `1.5e-5` -> `1.5e-05`
fn write_scientific(f: &mut fmt::Formatter<'_>, value: f64) -> fmt::Result {
    let rendered = format!("{value:e}");
    let (mantissa, exponent) = rendered.split_once('e').unwrap_or((rendered.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let sign = if exponent < 0 { '-' } else { '+' };
    write!(f, "{mantissa}e{sign}{:02}", exponent.abs())
}

fn int_to_f64(value: &BigInt) -> Outcome<f64> {
    value
        .to_f64()
        .filter(|converted| converted.is_finite())
        .ok_or(CalculationError::IntTooLarge)
}

/// `numerator / denominator` as a float without converting either operand
/// first, so huge operands with a moderate ratio still divide.
fn int_ratio(numerator: &BigInt, denominator: &BigInt) -> Outcome<f64> {
    if numerator.bits() <= EXACT_FLOAT_BITS && denominator.bits() <= EXACT_FLOAT_BITS {
        return Ok(int_to_f64(numerator)? / int_to_f64(denominator)?);
    }

    // Scale so the integer quotient keeps ~64 significant bits.
    let shift = denominator.bits() as i64 - numerator.bits() as i64 + 64;
    let quotient = if shift >= 0 {
        (numerator << shift as usize) / denominator
    } else {
        numerator / (denominator << (-shift) as usize)
    };
    let result = scale_by_power_of_two(int_to_f64(&quotient)?, -shift);
    if result.is_infinite() {
        return Err(CalculationError::FloatOverflow);
    }
    Ok(result)
}

fn scale_by_power_of_two(value: f64, exponent: i64) -> f64 {
    let half = exponent / 2;
    value * 2f64.powi(half as i32) * 2f64.powi((exponent - half) as i32)
}

fn bounded(value: BigInt) -> Outcome<Number> {
    if value.bits() > MAX_INT_BITS {
        return Err(CalculationError::Overflow);
    }
    Ok(Number::Int(value))
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(Number),
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(value) => write!(f, "{value}"),
            Token::Plus => f.write_str("+"),
            Token::Minus => f.write_str("-"),
            Token::Star => f.write_str("*"),
            Token::DoubleStar => f.write_str("**"),
            Token::Slash => f.write_str("/"),
            Token::DoubleSlash => f.write_str("//"),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
        }
    }
}

/// Evaluate `source` according to the grammar above.
pub fn evaluate(source: &str) -> Result<Number, CalculationError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expression()?;
    match parser.tokens.get(parser.pos) {
        None => Ok(value),
        Some((position, token)) => Err(CalculationError::UnexpectedToken {
            token: token.to_string(),
            position: *position,
        }),
    }
}

fn tokenize(source: &str) -> Outcome<Vec<(usize, Token)>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let start = i;
        let token = match chars[i] {
            ' ' => {
                i += 1;
                continue;
            }
            '0'..='9' | '.' => {
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                tokens.push((start, Token::Number(parse_number(&literal)?)));
                continue;
            }
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' if chars.get(i + 1) == Some(&'*') => {
                i += 1;
                Token::DoubleStar
            }
            '*' => Token::Star,
            '/' if chars.get(i + 1) == Some(&'/') => {
                i += 1;
                Token::DoubleSlash
            }
            '/' => Token::Slash,
            '(' => Token::LParen,
            ')' => Token::RParen,
            other => return Err(CalculationError::InvalidCharacter(other)),
        };
        i += 1;
        tokens.push((start, token));
    }

    Ok(tokens)
}

fn parse_number(literal: &str) -> Outcome<Number> {
    let invalid = || CalculationError::InvalidNumber(literal.to_string());

    if literal.contains('.') {
        if literal.matches('.').count() > 1 || literal == "." {
            return Err(invalid());
        }
        let mut normalized = String::with_capacity(literal.len() + 2);
        if literal.starts_with('.') {
            normalized.push('0');
        }
        normalized.push_str(literal);
        if literal.ends_with('.') {
            normalized.push('0');
        }
        return normalized
            .parse::<f64>()
            .map(Number::Float)
            .map_err(|_| invalid());
    }

    if literal.len() > 1 && literal.starts_with('0') && literal.chars().any(|c| c != '0') {
        return Err(CalculationError::LeadingZeros);
    }
    literal
        .parse::<BigInt>()
        .map_err(|_| invalid())
        .and_then(bounded)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, token)| token)
    }

    fn advance(&mut self) -> Option<(usize, Token)> {
        let next = self.tokens.get(self.pos).cloned();
        if next.is_some() {
            self.pos += 1;
        }
        next
    }

    fn expression(&mut self) -> Outcome<Number> {
        let mut value = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.advance();
                    value = add(value, self.term()?)?;
                }
                Some(Token::Minus) => {
                    self.advance();
                    value = subtract(value, self.term()?)?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn term(&mut self) -> Outcome<Number> {
        let mut value = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.advance();
                    value = multiply(value, self.unary()?)?;
                }
                Some(Token::Slash) => {
                    self.advance();
                    value = divide(value, self.unary()?)?;
                }
                Some(Token::DoubleSlash) => {
                    self.advance();
                    value = floor_divide(value, self.unary()?)?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn unary(&mut self) -> Outcome<Number> {
        if self.depth >= MAX_DEPTH {
            return Err(CalculationError::TooDeep);
        }
        self.depth += 1;
        let value = match self.peek() {
            Some(Token::Plus) => {
                self.advance();
                self.unary()
            }
            Some(Token::Minus) => {
                self.advance();
                self.unary().map(negate)
            }
            _ => self.power(),
        };
        self.depth -= 1;
        value
    }

    fn power(&mut self) -> Outcome<Number> {
        let base = self.atom()?;
        if self.peek() == Some(&Token::DoubleStar) {
            self.advance();
            let exponent = self.unary()?;
            return pow(base, exponent);
        }
        Ok(base)
    }

    fn atom(&mut self) -> Outcome<Number> {
        match self.advance() {
            Some((_, Token::Number(value))) => Ok(value),
            Some((_, Token::LParen)) => {
                let value = self.expression()?;
                match self.advance() {
                    Some((_, Token::RParen)) => Ok(value),
                    Some((position, token)) => Err(CalculationError::UnexpectedToken {
                        token: token.to_string(),
                        position,
                    }),
                    None => Err(CalculationError::UnexpectedEnd),
                }
            }
            Some((position, token)) => Err(CalculationError::UnexpectedToken {
                token: token.to_string(),
                position,
            }),
            None => Err(CalculationError::UnexpectedEnd),
        }
    }
}

fn add(lhs: Number, rhs: Number) -> Outcome<Number> {
    match (lhs, rhs) {
        (Number::Int(a), Number::Int(b)) => bounded(a + b),
        (lhs, rhs) => Ok(Number::Float(lhs.as_f64()? + rhs.as_f64()?)),
    }
}

fn subtract(lhs: Number, rhs: Number) -> Outcome<Number> {
    match (lhs, rhs) {
        (Number::Int(a), Number::Int(b)) => bounded(a - b),
        (lhs, rhs) => Ok(Number::Float(lhs.as_f64()? - rhs.as_f64()?)),
    }
}

fn multiply(lhs: Number, rhs: Number) -> Outcome<Number> {
    match (lhs, rhs) {
        (Number::Int(a), Number::Int(b)) => {
            if a.bits() + b.bits() > MAX_INT_BITS + 1 {
                return Err(CalculationError::Overflow);
            }
            bounded(a * b)
        }
        (lhs, rhs) => Ok(Number::Float(lhs.as_f64()? * rhs.as_f64()?)),
    }
}

fn divide(lhs: Number, rhs: Number) -> Outcome<Number> {
    if rhs.is_zero() {
        return Err(CalculationError::DivisionByZero);
    }
    match (lhs, rhs) {
        (Number::Int(a), Number::Int(b)) => Ok(Number::Float(int_ratio(&a, &b)?)),
        (lhs, rhs) => Ok(Number::Float(lhs.as_f64()? / rhs.as_f64()?)),
    }
}

fn floor_divide(lhs: Number, rhs: Number) -> Outcome<Number> {
    if rhs.is_zero() {
        return Err(CalculationError::DivisionByZero);
    }
    match (lhs, rhs) {
        (Number::Int(a), Number::Int(b)) => {
            // BigInt division truncates; the remainder takes the dividend's sign.
            let quotient = &a / &b;
            let remainder = &a % &b;
            if !remainder.is_zero() && remainder.is_negative() != b.is_negative() {
                Ok(Number::Int(quotient - BigInt::one()))
            } else {
                Ok(Number::Int(quotient))
            }
        }
        (lhs, rhs) => Ok(Number::Float((lhs.as_f64()? / rhs.as_f64()?).floor())),
    }
}

fn negate(value: Number) -> Number {
    match value {
        Number::Int(v) => Number::Int(-v),
        Number::Float(v) => Number::Float(-v),
    }
}

fn pow(base: Number, exponent: Number) -> Outcome<Number> {
    if let (Number::Int(b), Number::Int(e)) = (&base, &exponent) {
        if !e.is_negative() {
            return int_pow(b, e);
        }
        if b.is_zero() {
            return Err(CalculationError::DivisionByZero);
        }
    }

    let (b, e) = (base.as_f64()?, exponent.as_f64()?);
    if b == 0.0 && e < 0.0 {
        return Err(CalculationError::DivisionByZero);
    }
    if b < 0.0 && e.fract() != 0.0 {
        return Err(CalculationError::ComplexResult);
    }
    let result = b.powf(e);
    if result.is_infinite() && b.is_finite() && e.is_finite() {
        return Err(CalculationError::FloatOverflow);
    }
    Ok(Number::Float(result))
}

fn int_pow(base: &BigInt, exponent: &BigInt) -> Outcome<Number> {
    // Bases 0, 1 and -1 never grow, whatever the exponent.
    if base.is_zero() {
        let value = if exponent.is_zero() {
            BigInt::one()
        } else {
            BigInt::zero()
        };
        return Ok(Number::Int(value));
    }
    if base.abs().is_one() {
        let odd = !(exponent % BigInt::from(2)).is_zero();
        let value = if base.is_negative() && odd {
            -BigInt::one()
        } else {
            BigInt::one()
        };
        return Ok(Number::Int(value));
    }

    let exponent = exponent.to_u32().ok_or(CalculationError::Overflow)?;
    if (base.bits() - 1).saturating_mul(u64::from(exponent)) > MAX_INT_BITS {
        return Err(CalculationError::Overflow);
    }
    bounded(base.pow(exponent))
}
