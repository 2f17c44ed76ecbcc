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

//! Type checking of parsed search expressions.
//!
//! Terms are sorted into three kinds. Set expressions produce a set of UIDs
//! and may only appear at the top level. Predicates are evaluated against
//! one message at a time inside `match-all`. Values are the integers and
//! strings that comparisons operate on.

use super::sexp::Term;
use crate::store::SystemFlags;
use crate::support::error::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SetExpr {
    /// Every message satisfying the predicate, or every message if there is
    /// none.
    MatchAll(Option<Pred>),
    And(Vec<SetExpr>),
    Or(Vec<SetExpr>),
    Not(Box<SetExpr>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Pred {
    Const(bool),
    And(Vec<Pred>),
    Or(Vec<Pred>),
    Not(Box<Pred>),
    /// True if the header passes the test with any of the needles.
    Header(HeaderRef, HeaderOp, Vec<String>),
    HeaderExists(Vec<String>),
    BodyContains(Vec<String>),
    UserFlag(Vec<String>),
    SystemFlag(SystemFlags),
    Compare(CmpOp, Value, Value),
}

/// A header as seen by the header tests.
///
/// The address headers and the subject are answered from the summary; any
/// other header requires the message to be loaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeaderRef {
    Subject,
    From,
    To,
    Cc,
    Other(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeaderOp {
    Contains,
    Matches,
    StartsWith,
    EndsWith,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Lt,
    Gt,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Int(IntValue),
    Str(StrValue),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IntValue {
    Lit(i64),
    SentDate,
    ReceivedDate,
    CurrentDate,
    Size,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StrValue {
    Lit(String),
    UserTag(String),
}

fn malformed(msg: impl Into<String>) -> Error {
    Error::MalformedQuery(msg.into())
}

fn is_predicate_op(op: &str) -> bool {
    match op {
        "header-contains" | "header-matches" | "header-starts-with"
        | "header-ends-with" | "header-exists" | "user-flag"
        | "system-flag" | "=" | "<" | ">" => true,
        _ => false,
    }
}

fn is_value_op(op: &str) -> bool {
    match op {
        "get-sent-date" | "get-received-date" | "get-current-date"
        | "get-size" | "user-tag" => true,
        _ => false,
    }
}

fn strings(op: &str, args: &[Term], min: usize) -> Result<Vec<String>, Error> {
    if args.len() < min {
        return Err(malformed(format!(
            "{} needs at least {} argument(s)",
            op, min
        )));
    }

    args.iter()
        .map(|arg| match *arg {
            Term::Str(ref s) => Ok(s.clone()),
            _ => Err(malformed(format!("{} takes string arguments", op))),
        })
        .collect()
}

fn nonempty<T>(op: &str, items: Vec<T>) -> Result<Vec<T>, Error> {
    if items.is_empty() {
        Err(malformed(format!("{} needs at least one argument", op)))
    } else {
        Ok(items)
    }
}

pub fn compile_set(term: &Term) -> Result<SetExpr, Error> {
    let (op, args) = match *term {
        Term::Call(ref op, ref args) => (op.as_str(), args.as_slice()),
        _ => return Err(malformed("expected a search expression")),
    };

    match op {
        "match-all" => match args {
            [] => Ok(SetExpr::MatchAll(None)),
            [pred] => Ok(SetExpr::MatchAll(Some(compile_pred(pred)?))),
            _ => Err(malformed("match-all takes at most one argument")),
        },
        "and" => Ok(SetExpr::And(nonempty(
            op,
            args.iter().map(compile_set).collect::<Result<_, _>>()?,
        )?)),
        "or" => Ok(SetExpr::Or(nonempty(
            op,
            args.iter().map(compile_set).collect::<Result<_, _>>()?,
        )?)),
        "not" => match args {
            [arg] => Ok(SetExpr::Not(Box::new(compile_set(arg)?))),
            _ => Err(malformed("not takes exactly one argument")),
        },
        // Shorthand for matching all messages with that body
        "body-contains" => Ok(SetExpr::MatchAll(Some(Pred::BodyContains(
            strings(op, args, 1)?,
        )))),
        op if is_predicate_op(op) => {
            Err(malformed(format!("{} can only be used within match-all", op)))
        }
        op if is_value_op(op) => {
            Err(malformed(format!("{} does not select messages", op)))
        }
        op => Err(malformed(format!("unknown operator {}", op))),
    }
}

fn compile_pred(term: &Term) -> Result<Pred, Error> {
    let (op, args) = match *term {
        Term::Bool(b) => return Ok(Pred::Const(b)),
        Term::Call(ref op, ref args) => (op.as_str(), args.as_slice()),
        _ => return Err(malformed("expected a condition")),
    };

    match op {
        "and" => Ok(Pred::And(nonempty(
            op,
            args.iter().map(compile_pred).collect::<Result<_, _>>()?,
        )?)),
        "or" => Ok(Pred::Or(nonempty(
            op,
            args.iter().map(compile_pred).collect::<Result<_, _>>()?,
        )?)),
        "not" => match args {
            [arg] => Ok(Pred::Not(Box::new(compile_pred(arg)?))),
            _ => Err(malformed("not takes exactly one argument")),
        },
        "header-contains" => header_test(op, HeaderOp::Contains, args),
        "header-matches" => header_test(op, HeaderOp::Matches, args),
        "header-starts-with" => header_test(op, HeaderOp::StartsWith, args),
        "header-ends-with" => header_test(op, HeaderOp::EndsWith, args),
        "header-exists" => Ok(Pred::HeaderExists(strings(op, args, 1)?)),
        "body-contains" => Ok(Pred::BodyContains(strings(op, args, 1)?)),
        "user-flag" => Ok(Pred::UserFlag(strings(op, args, 1)?)),
        "system-flag" => {
            let names = strings(op, args, 1)?;
            if names.len() != 1 {
                return Err(malformed("system-flag takes exactly one argument"));
            }
            SystemFlags::by_name(&names[0].to_ascii_lowercase())
                .map(Pred::SystemFlag)
                .ok_or_else(|| {
                    malformed(format!("unknown system flag {}", names[0]))
                })
        }
        "=" => compare(op, CmpOp::Eq, args),
        "<" => compare(op, CmpOp::Lt, args),
        ">" => compare(op, CmpOp::Gt, args),
        "match-all" => Err(malformed("match-all cannot be nested")),
        op if is_value_op(op) => {
            Err(malformed(format!("{} is not a condition", op)))
        }
        op => Err(malformed(format!("unknown operator {}", op))),
    }
}

fn header_test(op: &str, test: HeaderOp, args: &[Term]) -> Result<Pred, Error> {
    let mut args = strings(op, args, 2)?.into_iter();
    let name = args.next().unwrap_or_default();
    let header = match name.to_ascii_lowercase().as_str() {
        "subject" => HeaderRef::Subject,
        "from" => HeaderRef::From,
        "to" => HeaderRef::To,
        "cc" => HeaderRef::Cc,
        _ => HeaderRef::Other(name),
    };
    Ok(Pred::Header(header, test, args.collect()))
}

fn compare(op: &str, cmp: CmpOp, args: &[Term]) -> Result<Pred, Error> {
    let (lhs, rhs) = match args {
        [lhs, rhs] => (compile_value(lhs)?, compile_value(rhs)?),
        _ => {
            return Err(malformed(format!("{} takes exactly two arguments", op)))
        }
    };

    match (&lhs, &rhs) {
        (&Value::Int(_), &Value::Int(_)) | (&Value::Str(_), &Value::Str(_)) => {
            Ok(Pred::Compare(cmp, lhs, rhs))
        }
        _ => Err(malformed(format!(
            "{} cannot compare a number with a string",
            op
        ))),
    }
}

fn compile_value(term: &Term) -> Result<Value, Error> {
    let (op, args) = match *term {
        Term::Int(i) => return Ok(Value::Int(IntValue::Lit(i))),
        Term::Str(ref s) => return Ok(Value::Str(StrValue::Lit(s.clone()))),
        Term::Bool(_) => return Err(malformed("booleans cannot be compared")),
        Term::Call(ref op, ref args) => (op.as_str(), args.as_slice()),
    };

    let int = |v| {
        if args.is_empty() {
            Ok(Value::Int(v))
        } else {
            Err(malformed(format!("{} takes no arguments", op)))
        }
    };

    match op {
        "get-sent-date" => int(IntValue::SentDate),
        "get-received-date" => int(IntValue::ReceivedDate),
        "get-current-date" => int(IntValue::CurrentDate),
        "get-size" => int(IntValue::Size),
        "user-tag" => match args {
            [Term::Str(name)] => {
                Ok(Value::Str(StrValue::UserTag(name.clone())))
            }
            _ => Err(malformed("user-tag takes one string argument")),
        },
        op => Err(malformed(format!("{} does not yield a value", op))),
    }
}

#[cfg(test)]
mod test {
    use super::super::sexp::parse;
    use super::*;

    fn compile(s: &str) -> Result<SetExpr, Error> {
        compile_set(&parse(s).unwrap())
    }

    #[test]
    fn compile_scenarios() {
        assert_eq!(
            SetExpr::MatchAll(Some(Pred::And(vec![
                Pred::Header(
                    HeaderRef::Subject,
                    HeaderOp::Contains,
                    vec!["Test19".to_owned()]
                ),
                Pred::Header(
                    HeaderRef::Subject,
                    HeaderOp::Contains,
                    vec!["subject".to_owned()]
                ),
            ]))),
            compile(
                "(match-all (and (header-contains \"subject\" \"Test19\") \
                 (header-contains \"Subject\" \"subject\")))"
            )
            .unwrap()
        );

        assert_eq!(
            SetExpr::MatchAll(Some(Pred::Compare(
                CmpOp::Gt,
                Value::Int(IntValue::Lit(72000)),
                Value::Int(IntValue::SentDate)
            ))),
            compile("(match-all (> 72000 (get-sent-date)))").unwrap()
        );

        assert_eq!(
            SetExpr::MatchAll(Some(Pred::Compare(
                CmpOp::Eq,
                Value::Str(StrValue::Lit("red".to_owned())),
                Value::Str(StrValue::UserTag("colour".to_owned()))
            ))),
            compile("(match-all (= \"red\" (user-tag \"colour\")))").unwrap()
        );

        assert_eq!(
            SetExpr::Or(vec![
                SetExpr::MatchAll(Some(Pred::BodyContains(vec![
                    "data1".to_owned()
                ]))),
                SetExpr::Not(Box::new(SetExpr::MatchAll(None))),
            ]),
            compile("(or (body-contains \"data1\") (not (match-all)))")
                .unwrap()
        );

        assert_eq!(
            SetExpr::MatchAll(Some(Pred::Header(
                HeaderRef::Other("X-Mailer".to_owned()),
                HeaderOp::Matches,
                vec!["a".to_owned(), "b".to_owned()]
            ))),
            compile("(match-all (header-matches \"X-Mailer\" \"a\" \"b\"))")
                .unwrap()
        );

        assert_eq!(
            SetExpr::MatchAll(Some(Pred::Or(vec![
                Pred::SystemFlag(SystemFlags::SEEN),
                Pred::Const(false),
            ]))),
            compile("(match-all (or (system-flag \"Seen\") #f))").unwrap()
        );
    }

    #[test]
    fn compile_errors() {
        for bad in &[
            "(frobnicate)",
            "\"string\"",
            "(header-contains \"subject\" \"x\")",
            "(get-sent-date)",
            "(match-all (match-all))",
            "(match-all #t #f)",
            "(match-all (header-contains \"subject\"))",
            "(match-all (header-contains \"subject\" 42))",
            "(match-all (> \"a\" (get-sent-date)))",
            "(match-all (> 1 2 3))",
            "(match-all (= #t #t))",
            "(match-all (get-size))",
            "(match-all (> (get-size 3) 1))",
            "(match-all (user-tag \"x\"))",
            "(match-all (= \"x\" (user-tag 1)))",
            "(match-all (system-flag \"recent\"))",
            "(match-all (and))",
            "(match-all (not #t #f))",
            "(match-all 42)",
            "(and)",
            "(not)",
            "(match-all (frobnicate))",
        ] {
            assert_matches!(Err(Error::MalformedQuery(_)), compile(bad));
        }
    }
}
