//! Text form to [`Expr`].
//!
//! Accepts the arithmetic subset of the display syntax: numbers, symbol
//! names, `+ - * / %`, unary minus, parentheses and the calls `min`, `max`,
//! `ceil`, `floor` and `ceil_div`. A literal with a `.` or an exponent is a
//! float; anything else is an integer.

use std::str::FromStr;

use crate::error::ExprError;
use crate::expr::Expr;
use crate::number::Number;

const MAX_DEPTH: usize = 128;

impl FromStr for Expr {
    type Err = ExprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = Parser {
            src: s,
            pos: 0,
            depth: 0,
        };
        let expr = parser.expr()?;
        parser.skip_ws();
        if parser.pos < s.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(expr)
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, reason: &str) -> ExprError {
        ExprError::Parse {
            input: self.src.to_string(),
            reason: format!("{reason} at offset {}", self.pos),
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.rest().chars().next()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Result<(), ExprError> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.error(&format!("expected `{c}`")))
        }
    }

    fn expr(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.term()?;
        loop {
            if self.eat('+') {
                lhs = lhs + self.term()?;
            } else if self.eat('-') {
                lhs = lhs - self.term()?;
            } else {
                return Ok(lhs);
            }
        }
    }

    fn term(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.unary()?;
        loop {
            if self.eat('*') {
                lhs = lhs * self.unary()?;
            } else if self.eat('/') {
                lhs = lhs / self.unary()?;
            } else if self.eat('%') {
                lhs = lhs.modulo(self.unary()?);
            } else {
                return Ok(lhs);
            }
        }
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error("expression nested too deeply"));
        }
        let result = if self.eat('-') {
            self.unary().map(|e| -e)
        } else {
            self.atom()
        };
        self.depth -= 1;
        result
    }

    fn atom(&mut self) -> Result<Expr, ExprError> {
        match self.peek() {
            Some('(') => {
                self.pos += 1;
                let inner = self.expr()?;
                self.expect(')')?;
                Ok(inner)
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.number(),
            Some(c) if c.is_ascii_alphabetic() || c == '_' => self.identifier(),
            Some(_) => Err(self.error("unexpected character")),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn number(&mut self) -> Result<Expr, ExprError> {
        let rest = self.rest();
        let bytes = rest.as_bytes();
        let mut end = 0;
        let mut float = false;
        while end < bytes.len() {
            match bytes[end] {
                b'0'..=b'9' => {}
                b'.' => float = true,
                b'e' | b'E' => {
                    float = true;
                    if matches!(bytes.get(end + 1), Some(b'+' | b'-')) {
                        end += 1;
                    }
                }
                _ => break,
            }
            end += 1;
        }
        let literal = &rest[..end];
        let value = if float {
            literal.parse::<f64>().map(Number::Float).ok()
        } else {
            literal.parse::<i64>().map(Number::Int).ok()
        };
        let value = value.ok_or_else(|| self.error(&format!("invalid number `{literal}`")))?;
        self.pos += end;
        Ok(Expr::constant(value))
    }

    fn identifier(&mut self) -> Result<Expr, ExprError> {
        let rest = self.rest();
        let end = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        let name = &rest[..end];
        self.pos += end;

        if !self.eat('(') {
            return Ok(Expr::symbol(name));
        }
        let mut args = vec![self.expr()?];
        while self.eat(',') {
            args.push(self.expr()?);
        }
        self.expect(')')?;

        match (name, <[Expr; 1]>::try_from(args.clone()), <[Expr; 2]>::try_from(args)) {
            ("ceil", Ok([a]), _) => Ok(a.ceil()),
            ("floor", Ok([a]), _) => Ok(a.floor()),
            ("min", _, Ok([a, b])) => Ok(a.min(b)),
            ("max", _, Ok([a, b])) => Ok(a.max(b)),
            ("ceil_div", _, Ok([a, b])) => Ok(a.ceil_div(b)),
            ("ceil" | "floor" | "min" | "max" | "ceil_div", _, _) => {
                Err(self.error(&format!("wrong number of arguments to `{name}`")))
            }
            _ => Err(self.error(&format!("unknown function `{name}`"))),
        }
    }
}
