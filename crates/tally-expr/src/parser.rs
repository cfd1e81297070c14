//! Lexer, recursive-descent parser, and evaluator.
//!
//! Grammar (lowest to highest precedence):
//!
//! ```text
//! expr   := term   (('+' | '-') term)*
//! term   := factor (('*' | '/' | '//') factor)*
//! factor := ('+' | '-') factor | power
//! power  := atom ('**' factor)?
//! atom   := NUMBER | '(' expr ')'
//! ```
//!
//! `**` is right-associative and binds tighter than a unary sign on its
//! left, so `-2**2 == -4` and `2**-1 == 0.5`.

use crate::ValidationError;

const MAX_DEPTH: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Tok {
    Num(f64),
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    SlashSlash,
    LParen,
    RParen,
}

#[derive(Debug, Clone, Copy)]
struct Token {
    tok: Tok,
    offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Pow,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Num(f64),
    Neg(Box<Expr>),
    Bin(BinOp, Box<Expr>, Box<Expr>),
}

fn syntax(offset: usize, reason: &'static str) -> ValidationError {
    ValidationError::Syntax { offset, reason }
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

fn lex(text: &str) -> Result<Vec<Token>, ValidationError> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let offset = i;
        let tok = match bytes[i] {
            b' ' => {
                i += 1;
                continue;
            }
            b'+' => Tok::Plus,
            b'-' => Tok::Minus,
            b'(' => Tok::LParen,
            b')' => Tok::RParen,
            b'*' if bytes.get(i + 1) == Some(&b'*') => {
                i += 1;
                Tok::StarStar
            }
            b'*' => Tok::Star,
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                i += 1;
                Tok::SlashSlash
            }
            b'/' => Tok::Slash,
            b'0'..=b'9' | b'.' => {
                let (value, end) = lex_number(text, i)?;
                out.push(Token {
                    tok: Tok::Num(value),
                    offset,
                });
                i = end;
                continue;
            }
            _ => return Err(syntax(offset, "unexpected character")),
        };
        out.push(Token { tok, offset });
        i += 1;
    }

    Ok(out)
}

/// Lex `digits ['.' digits*] | '.' digits+` starting at `start`.
fn lex_number(text: &str, start: usize) -> Result<(f64, usize), ValidationError> {
    let bytes = text.as_bytes();
    let mut i = start;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let int_digits = i - start;

    let mut has_point = false;
    let mut frac_digits = 0;
    if i < bytes.len() && bytes[i] == b'.' {
        has_point = true;
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
            frac_digits += 1;
        }
    }

    if int_digits == 0 && frac_digits == 0 {
        return Err(syntax(start, "lone decimal point"));
    }

    let literal = &text[start..i];
    if !has_point && literal.len() > 1 && literal.starts_with('0') && literal.bytes().any(|b| b != b'0')
    {
        return Err(syntax(start, "leading zeros in integer literal"));
    }

    let value = literal
        .parse::<f64>()
        .map_err(|_| syntax(start, "invalid number literal"))?;
    Ok((value, i))
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    end_offset: usize,
}

pub(crate) fn parse(text: &str) -> Result<Expr, ValidationError> {
    let mut p = Parser {
        tokens: lex(text)?,
        pos: 0,
        depth: 0,
        end_offset: text.len(),
    };
    let expr = p.expr()?;
    if let Some(t) = p.peek() {
        return Err(syntax(t.offset, "unexpected token after expression"));
    }
    Ok(expr)
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<Token> {
        let t = self.peek();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn offset(&self) -> usize {
        self.peek().map(|t| t.offset).unwrap_or(self.end_offset)
    }

    fn descend(&mut self) -> Result<(), ValidationError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(syntax(self.offset(), "expression nested too deeply"));
        }
        Ok(())
    }

    fn expr(&mut self) -> Result<Expr, ValidationError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek().map(|t| t.tok) {
                Some(Tok::Plus) => BinOp::Add,
                Some(Tok::Minus) => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.bump();
            let rhs = self.term()?;
            lhs = Expr::Bin(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn term(&mut self) -> Result<Expr, ValidationError> {
        let mut lhs = self.factor()?;
        loop {
            let op = match self.peek().map(|t| t.tok) {
                Some(Tok::Star) => BinOp::Mul,
                Some(Tok::Slash) => BinOp::Div,
                Some(Tok::SlashSlash) => BinOp::FloorDiv,
                _ => return Ok(lhs),
            };
            self.bump();
            let rhs = self.factor()?;
            lhs = Expr::Bin(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn factor(&mut self) -> Result<Expr, ValidationError> {
        match self.peek().map(|t| t.tok) {
            Some(Tok::Plus) => {
                self.bump();
                self.descend()?;
                let inner = self.factor()?;
                self.depth -= 1;
                Ok(inner)
            }
            Some(Tok::Minus) => {
                self.bump();
                self.descend()?;
                let inner = self.factor()?;
                self.depth -= 1;
                Ok(Expr::Neg(Box::new(inner)))
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Expr, ValidationError> {
        let base = self.atom()?;
        if self.peek().map(|t| t.tok) == Some(Tok::StarStar) {
            self.bump();
            self.descend()?;
            let exp = self.factor()?;
            self.depth -= 1;
            return Ok(Expr::Bin(BinOp::Pow, Box::new(base), Box::new(exp)));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Expr, ValidationError> {
        let offset = self.offset();
        match self.bump().map(|t| t.tok) {
            Some(Tok::Num(v)) => Ok(Expr::Num(v)),
            Some(Tok::LParen) => {
                self.descend()?;
                let inner = self.expr()?;
                self.depth -= 1;
                match self.bump().map(|t| t.tok) {
                    Some(Tok::RParen) => Ok(inner),
                    _ => Err(syntax(offset, "unclosed parenthesis")),
                }
            }
            Some(_) => Err(syntax(offset, "expected a number or '('")),
            None => Err(syntax(offset, "unexpected end of expression")),
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

impl Expr {
    pub(crate) fn eval(&self) -> Result<f64, ValidationError> {
        match self {
            Expr::Num(v) => Ok(*v),
            Expr::Neg(inner) => Ok(-inner.eval()?),
            Expr::Bin(op, lhs, rhs) => {
                let l = lhs.eval()?;
                let r = rhs.eval()?;
                match op {
                    BinOp::Add => Ok(l + r),
                    BinOp::Sub => Ok(l - r),
                    BinOp::Mul => Ok(l * r),
                    BinOp::Div => {
                        if r == 0.0 {
                            return Err(ValidationError::DivisionByZero);
                        }
                        Ok(l / r)
                    }
                    BinOp::FloorDiv => {
                        if r == 0.0 {
                            return Err(ValidationError::DivisionByZero);
                        }
                        Ok((l / r).floor())
                    }
                    BinOp::Pow => {
                        if l == 0.0 && r < 0.0 {
                            return Err(ValidationError::DivisionByZero);
                        }
                        Ok(l.powf(r))
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(text: &str) -> Result<f64, ValidationError> {
        parse(text)?.eval()
    }

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(eval("1 + 2 * 3"), Ok(7.0));
        assert_eq!(eval("(1 + 2) * 3"), Ok(9.0));
        assert_eq!(eval("10 - 4 - 3"), Ok(3.0));
        assert_eq!(eval("2 ** 3 ** 2"), Ok(512.0));
        assert_eq!(eval("-2 ** 2"), Ok(-4.0));
        assert_eq!(eval("2 ** -1"), Ok(0.5));
        assert_eq!(eval("7 // 2"), Ok(3.0));
        assert_eq!(eval("-7 // 2"), Ok(-4.0));
    }

    #[test]
    fn decimals() {
        assert_eq!(eval(".5 + 5."), Ok(5.5));
        assert_eq!(eval("00.25 * 4"), Ok(1.0));
    }

    #[test]
    fn nesting_limit_is_a_syntax_error() {
        let deep = format!("{}1{}", "(".repeat(150), ")".repeat(150));
        assert!(matches!(eval(&deep), Err(ValidationError::Syntax { .. })));
        let ok = format!("{}1{}", "(".repeat(20), ")".repeat(20));
        assert_eq!(eval(&ok), Ok(1.0));
    }

    #[test]
    fn syntax_offsets_point_at_the_problem() {
        assert_eq!(
            eval("1 +"),
            Err(ValidationError::Syntax {
                offset: 3,
                reason: "unexpected end of expression"
            })
        );
        assert!(matches!(
            eval("1 2"),
            Err(ValidationError::Syntax { offset: 2, .. })
        ));
    }
}
