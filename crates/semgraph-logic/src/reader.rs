//! Textual notation for expressions.
//!
//! ```text
//! expr     := literal | lambda | constant | variable | skolem
//! literal  := "(" expr expr+ ")"
//! lambda   := "(" "lambda" "$" N ":" type expr ")"
//! constant := NAME ":" type overlay?
//! overlay  := "[" SURFACE ("|" DIRECTIONALITY)? "]"
//! variable := "$" N          (must be bound by an enclosing lambda)
//! skolem   := "!" N
//! type     := (NAME | "<" type "," type ">") "*"?
//! ```
//!
//! The printer in `Display for Expr` emits exactly this notation.

use crate::context::LogicContext;
use crate::expr::{Expr, Overlay, SkolemId, Variable};
use crate::types::Type;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, digit1, multispace0, multispace1},
    combinator::{map, map_res, opt},
    error::{ErrorKind, FromExternalError, ParseError},
    sequence::{preceded, terminated},
    IResult,
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogicError {
    #[error("read error at offset {offset}: {message}")]
    Read { offset: usize, message: String },
    #[error("unexpected trailing input at offset {offset}")]
    TrailingInput { offset: usize },
}

// ============================================================================
// Parser plumbing
// ============================================================================

#[derive(Debug)]
struct Failure<'a> {
    input: &'a str,
    message: String,
}

impl<'a> ParseError<&'a str> for Failure<'a> {
    fn from_error_kind(input: &'a str, kind: ErrorKind) -> Self {
        Failure {
            input,
            message: format!("unexpected input ({})", kind.description()),
        }
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

impl<'a, E: std::fmt::Display> FromExternalError<&'a str, E> for Failure<'a> {
    fn from_external_error(input: &'a str, _kind: ErrorKind, e: E) -> Self {
        Failure {
            input,
            message: e.to_string(),
        }
    }
}

type Res<'a, T> = IResult<&'a str, T, Failure<'a>>;

fn fail<'a, T>(input: &'a str, message: impl Into<String>) -> Res<'a, T> {
    Err(nom::Err::Failure(Failure {
        input,
        message: message.into(),
    }))
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '+' | '\'' | '&' | '/')
}

fn index(input: &str) -> Res<'_, u32> {
    map_res(digit1, str::parse::<u32>)(input)
}

// ============================================================================
// Types
// ============================================================================

fn primitive_type(input: &str) -> Res<'_, Type> {
    map(
        take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_'),
        Type::primitive,
    )(input)
}

fn function_type(input: &str) -> Res<'_, Type> {
    let (input, _) = char('<')(input)?;
    let (input, domain) = parse_type(input)?;
    let (input, _) = char(',')(input)?;
    let (input, range) = parse_type(input)?;
    let (input, _) = char('>')(input)?;
    Ok((input, Type::function(domain, range)))
}

fn parse_type(input: &str) -> Res<'_, Type> {
    let (input, base) = alt((function_type, primitive_type))(input)?;
    let (input, star) = opt(char('*'))(input)?;
    Ok((input, if star.is_some() { Type::array(base) } else { base }))
}

// ============================================================================
// Expressions
// ============================================================================

struct Reader<'c> {
    ctx: &'c LogicContext,
    scope: Vec<Variable>,
}

impl<'c> Reader<'c> {
    fn expr<'a>(&mut self, input: &'a str) -> Res<'a, Expr> {
        let (input, _) = multispace0(input)?;
        match input.chars().next() {
            Some('(') => self.compound(input),
            Some('$') => self.variable(input),
            Some('!') => skolem_id(input),
            Some(_) => self.constant(input),
            None => fail(input, "unexpected end of input"),
        }
    }

    fn compound<'a>(&mut self, input: &'a str) -> Res<'a, Expr> {
        let (input, _) = char('(')(input)?;
        let (input, _) = multispace0(input)?;
        if let Ok((rest, _)) = terminated(tag::<_, _, Failure>("lambda"), multispace1)(input) {
            return self.lambda(rest);
        }

        let (mut input, predicate) = self.expr(input)?;
        let mut args = Vec::new();
        loop {
            let (rest, _) = multispace0(input)?;
            if let Ok((rest, _)) = char::<_, Failure>(')')(rest) {
                if args.is_empty() {
                    return fail(rest, "application without arguments");
                }
                return Ok((rest, Expr::literal(predicate, args)));
            }
            let (rest, arg) = self.expr(rest)?;
            args.push(arg);
            input = rest;
        }
    }

    fn lambda<'a>(&mut self, input: &'a str) -> Res<'a, Expr> {
        let (input, id) = preceded(char('$'), index)(input)?;
        let (input, _) = char(':')(input)?;
        let (input, ty) = parse_type(input)?;
        let variable = Variable::new(id, ty);

        self.scope.push(variable.clone());
        let body = self.expr(input);
        self.scope.pop();
        let (input, body) = body?;

        let (input, _) = multispace0(input)?;
        let (input, _) = char(')')(input)?;
        Ok((input, Expr::lambda(variable, body)))
    }

    fn variable<'a>(&mut self, input: &'a str) -> Res<'a, Expr> {
        let start = input;
        let (input, id) = preceded(char('$'), index)(input)?;
        match self.scope.iter().rev().find(|v| v.id() == id) {
            Some(variable) => Ok((input, Expr::variable(variable.clone()))),
            None => fail(start, format!("unbound variable ${id}")),
        }
    }

    fn constant<'a>(&mut self, input: &'a str) -> Res<'a, Expr> {
        let (input, name) = take_while1(is_name_char)(input)?;
        let Ok((input, _)) = char::<_, Failure>(':')(input) else {
            return fail(input, format!("constant `{name}` is missing a type"));
        };
        let (input, ty) = parse_type(input)?;
        let (input, overlay) = opt(overlay)(input)?;
        let constant = self.ctx.constant(name, ty);
        let constant = match overlay {
            Some(overlay) => constant.with_overlay(overlay),
            None => constant,
        };
        Ok((input, Expr::constant(constant)))
    }
}

fn skolem_id(input: &str) -> Res<'_, Expr> {
    let (input, id) = preceded(char('!'), index)(input)?;
    Ok((input, Expr::skolem_id(SkolemId(id))))
}

fn overlay(input: &str) -> Res<'_, Overlay> {
    let (input, _) = char('[')(input)?;
    let (input, surface) = take_while1(|c: char| c != '|' && c != ']')(input)?;
    let (input, directionality) =
        opt(preceded(char('|'), take_while1(|c: char| c != ']')))(input)?;
    let (input, _) = char(']')(input)?;
    Ok((input, Overlay::new(surface, directionality)))
}

// ============================================================================
// Entry points
// ============================================================================

fn finish<T>(text: &str, result: Res<'_, T>) -> Result<T, LogicError> {
    match result {
        Ok((rest, value)) => {
            let rest = rest.trim_start();
            if rest.is_empty() {
                Ok(value)
            } else {
                Err(LogicError::TrailingInput {
                    offset: text.len() - rest.len(),
                })
            }
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(LogicError::Read {
            offset: text.len() - e.input.len(),
            message: e.message,
        }),
        Err(nom::Err::Incomplete(_)) => Err(LogicError::Read {
            offset: text.len(),
            message: "incomplete input".to_string(),
        }),
    }
}

/// Read one expression; constants are interned in `ctx`.
pub fn read_expr(ctx: &LogicContext, text: &str) -> Result<Expr, LogicError> {
    let mut reader = Reader {
        ctx,
        scope: Vec::new(),
    };
    let result = reader.expr(text);
    finish(text, result)
}

pub fn read_type(text: &str) -> Result<Type, LogicError> {
    let result = preceded(multispace0, parse_type)(text);
    finish(text, result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_type() {
        assert_eq!(read_type("<e,<e,t>>").unwrap().to_string(), "<e,<e,t>>");
        assert_eq!(read_type("<t*,t>").unwrap().to_string(), "<t*,t>");
        assert!(read_type("<e,t").is_err());
    }

    #[test]
    fn test_read_literal_and_lambda() {
        let ctx = LogicContext::new();
        let expr = read_expr(&ctx, "(lambda $0:e (boy:<e,t> $0))").unwrap();
        let (arg, body) = expr.as_lambda().unwrap();
        assert_eq!(arg.id(), 0);
        let (predicate, args) = body.as_literal().unwrap();
        assert_eq!(predicate.as_constant().unwrap().name(), "boy");
        assert_eq!(args[0].as_variable(), Some(arg));
        assert_eq!(expr.ty(), Some(Type::function(Type::entity(), Type::truth())));
    }

    #[test]
    fn test_read_overlay() {
        let ctx = LogicContext::new();
        let expr = read_expr(&ctx, "want-01:<e,t>[wants|fwd]").unwrap();
        let overlay = expr.as_constant().unwrap().overlay().unwrap();
        assert_eq!(overlay.surface(), "wants");
        assert_eq!(overlay.directionality(), Some("fwd"));
        assert_eq!(expr.to_string(), "want-01:<e,t>[wants|fwd]");
    }

    #[test]
    fn test_unbound_variable_is_rejected() {
        let ctx = LogicContext::new();
        match read_expr(&ctx, "(boy:<e,t> $3)") {
            Err(LogicError::Read { offset, message }) => {
                assert_eq!(offset, 11);
                assert!(message.contains("$3"));
            }
            other => panic!("expected read error, got {other:?}"),
        }
    }

    #[test]
    fn test_trailing_input() {
        let ctx = LogicContext::new();
        assert_eq!(
            read_expr(&ctx, "boy:<e,t> girl:<e,t>"),
            Err(LogicError::TrailingInput { offset: 10 })
        );
    }
}
