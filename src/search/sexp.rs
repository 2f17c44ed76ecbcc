//-
// Copyright (c) 2026, Jason Lingle
//
// This file is part of Letterbox.
//
// Letterbox is free software: you can  redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// Letterbox is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General Public License for
// more details.
//
// You should have received a copy of the GNU General Public License along with
// Letterbox. If not, see <http://www.gnu.org/licenses/>.

//! The surface syntax of search expressions.
//!
//! ```text
//! term    := "(" symbol term* ")" | string | integer | "#t" | "#f"
//! string  := '"' ( [^"\\] | "\\" any )* '"'
//! integer := "-"? [0-9]+
//! symbol  := [^\s()"#]+
//! ```

use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not, take_while1},
    character::complete::{char, digit1, multispace0},
    combinator::{all_consuming, map, map_res, opt, recognize, value},
    multi::many0,
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Term {
    /// `(op args...)`
    Call(String, Vec<Term>),
    Str(String),
    Int(i64),
    Bool(bool),
}

fn ws<'a, O>(
    inner: impl FnMut(&'a str) -> IResult<&'a str, O>,
) -> impl FnMut(&'a str) -> IResult<&'a str, O> {
    delimited(multispace0, inner, multispace0)
}

fn symbol(i: &str) -> IResult<&str, &str> {
    take_while1(|c: char| {
        !c.is_whitespace() && '(' != c && ')' != c && '"' != c && '#' != c
    })(i)
}

fn string(i: &str) -> IResult<&str, String> {
    delimited(
        char('"'),
        map(
            opt(escaped_transform(
                is_not("\\\""),
                '\\',
                alt((
                    value("\\", char('\\')),
                    value("\"", char('"')),
                    value("\n", char('n')),
                    value("\t", char('t')),
                )),
            )),
            Option::unwrap_or_default,
        ),
        char('"'),
    )(i)
}

fn integer(i: &str) -> IResult<&str, i64> {
    map_res(recognize(pair(opt(char('-')), digit1)), str::parse)(i)
}

fn boolean(i: &str) -> IResult<&str, bool> {
    preceded(char('#'), alt((value(true, char('t')), value(false, char('f')))))(
        i,
    )
}

fn call(i: &str) -> IResult<&str, Term> {
    map(
        delimited(
            char('('),
            tuple((ws(symbol), many0(terminated(term, multispace0)))),
            char(')'),
        ),
        |(op, args)| Term::Call(op.to_owned(), args),
    )(i)
}

fn term(i: &str) -> IResult<&str, Term> {
    alt((
        call,
        map(string, Term::Str),
        map(integer, Term::Int),
        map(boolean, Term::Bool),
    ))(i)
}

/// Parse a complete expression.
///
/// Returns `None` if `text` is not exactly one well-formed term, optionally
/// surrounded by whitespace.
pub fn parse(text: &str) -> Option<Term> {
    all_consuming(ws(term))(text).ok().map(|(_, t)| t)
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    fn call(op: &str, args: Vec<Term>) -> Term {
        Term::Call(op.to_owned(), args)
    }

    fn s(v: &str) -> Term {
        Term::Str(v.to_owned())
    }

    #[test]
    fn parse_nested() {
        assert_eq!(
            Some(call(
                "match-all",
                vec![call(
                    "and",
                    vec![
                        call(
                            "header-contains",
                            vec![s("subject"), s("Test19")]
                        ),
                        call(
                            "header-contains",
                            vec![s("subject"), s("subject")]
                        ),
                    ]
                )]
            )),
            parse(
                "(match-all (and (header-contains \"subject\" \"Test19\")\n\
                 \t(header-contains \"subject\" \"subject\")))"
            )
        );
    }

    #[test]
    fn parse_atoms() {
        assert_eq!(
            Some(call(
                ">",
                vec![Term::Int(72000), call("get-sent-date", vec![])]
            )),
            parse("  ( >  72000 (get-sent-date) )  ")
        );
        assert_eq!(
            Some(call(
                "x",
                vec![Term::Int(-3), Term::Bool(true), Term::Bool(false)]
            )),
            parse("(x -3 #t #f)")
        );
        assert_eq!(
            Some(call("x", vec![s(""), s("a\"b\\c\nd")])),
            parse(r#"(x "" "a\"b\\c\nd")"#)
        );
        assert_eq!(Some(call("match-all", vec![])), parse("(match-all)"));
    }

    #[test]
    fn parse_errors() {
        assert_eq!(None, parse(""));
        assert_eq!(None, parse("(match-all"));
        assert_eq!(None, parse("(match-all))"));
        assert_eq!(None, parse("(match-all) (match-all)"));
        assert_eq!(None, parse("()"));
        assert_eq!(None, parse("(x \"unterminated)"));
        assert_eq!(None, parse("(x #q)"));
    }

    proptest! {
        #[test]
        fn parse_never_panics(s in "[()\" a-z0-9#\\\\-]{0,40}") {
            parse(&s);
        }
    }
}
