//! Expression grammar parser.
//!
//! ```text
//! expr    := literal | 'this' | name | chain
//! literal := 'null' | 'true' | 'false' | quoted-string | integer | decimal | char
//! chain   := primary ('.' field | '.' call)*
//! call    := name '(' [args] ')'
//! args    := expr (',' expr)*
//! ```

use super::{Expr, Literal};
use nom::branch::alt;
use nom::bytes::complete::{is_not, take_while, take_while1};
use nom::character::complete::{anychar, char, digit1, multispace0};
use nom::combinator::{all_consuming, map, opt, recognize};
use nom::multi::{many0, separated_list0};
use nom::sequence::{delimited, pair, preceded, tuple};
use nom::IResult;

fn ident(i: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '_' || c == '$'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '$'),
    ))(i)
}

fn decimal_literal(i: &str) -> IResult<&str, Expr> {
    map(
        recognize(tuple((opt(char('-')), digit1, char('.'), digit1))),
        |text: &str| {
            Expr::Literal(Literal::Float(text.parse().unwrap_or_default()))
        },
    )(i)
}

fn integer_literal(i: &str) -> IResult<&str, Expr> {
    map(recognize(pair(opt(char('-')), digit1)), |text: &str| {
        Expr::Literal(Literal::Int(text.parse().unwrap_or_default()))
    })(i)
}

fn string_fragment(i: &str) -> IResult<&str, String> {
    alt((
        map(is_not("\"\\"), str::to_string),
        map(preceded(char('\\'), anychar), |c| {
            match c {
                'n' => "\n".to_string(),
                't' => "\t".to_string(),
                'r' => "\r".to_string(),
                other => other.to_string(),
            }
        }),
    ))(i)
}

fn string_literal(i: &str) -> IResult<&str, Expr> {
    map(
        delimited(char('"'), many0(string_fragment), char('"')),
        |fragments| Expr::Literal(Literal::Str(fragments.concat())),
    )(i)
}

fn char_literal(i: &str) -> IResult<&str, Expr> {
    map(
        delimited(
            char('\''),
            alt((
                map(preceded(char('\\'), anychar), |c| match c {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '0' => '\0',
                    other => other,
                }),
                anychar,
            )),
            char('\''),
        ),
        |c| Expr::Literal(Literal::Char(c)),
    )(i)
}

fn keyword_or_name(i: &str) -> IResult<&str, Expr> {
    map(ident, |id| match id {
        "null" => Expr::Literal(Literal::Null),
        "true" => Expr::Literal(Literal::Bool(true)),
        "false" => Expr::Literal(Literal::Bool(false)),
        "this" => Expr::This,
        name => Expr::Name(name.to_string()),
    })(i)
}

fn primary(i: &str) -> IResult<&str, Expr> {
    delimited(
        multispace0,
        alt((
            string_literal,
            char_literal,
            decimal_literal,
            integer_literal,
            keyword_or_name,
        )),
        multispace0,
    )(i)
}

enum ChainOp {
    Field(String),
    Call(String, Vec<Expr>),
}

fn call_arguments(i: &str) -> IResult<&str, Vec<Expr>> {
    delimited(
        delimited(multispace0, char('('), multispace0),
        separated_list0(delimited(multispace0, char(','), multispace0), expr),
        delimited(multispace0, char(')'), multispace0),
    )(i)
}

fn chain_op(i: &str) -> IResult<&str, ChainOp> {
    let (i, _) = delimited(multispace0, char('.'), multispace0)(i)?;
    let (i, member) = ident(i)?;
    let (i, args) = opt(call_arguments)(i)?;
    let op = match args {
        Some(args) => ChainOp::Call(member.to_string(), args),
        None => ChainOp::Field(member.to_string()),
    };
    Ok((i, op))
}

pub(super) fn expr(i: &str) -> IResult<&str, Expr> {
    let (i, initial) = primary(i)?;
    let (i, ops) = many0(chain_op)(i)?;
    let folded = ops.into_iter().fold(initial, |acc, op| match op {
        ChainOp::Field(name) => Expr::Field(Box::new(acc), name),
        ChainOp::Call(name, args) => Expr::Call(Box::new(acc), name, args),
    });
    Ok((i, folded))
}

/// Parse a complete expression; trailing garbage is an error.
pub fn parse(input: &str) -> Result<Expr, String> {
    match all_consuming(delimited(multispace0, expr, multispace0))(input) {
        Ok((_, expr)) => Ok(expr),
        Err(e) => Err(format!("cannot parse `{input}`: {e}")),
    }
}
