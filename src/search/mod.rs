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

//! The folder query language.
//!
//! A query is an s-expression. The top level selects a set of messages:
//!
//! - `(match-all)` selects every message, and `(match-all PRED)` every
//!   message for which `PRED` holds.
//! - `(and SET...)`, `(or SET...)` and `(not SET)` combine sets.
//! - `(body-contains "text"...)` is shorthand for
//!   `(match-all (body-contains "text"...))`.
//!
//! Predicates are evaluated against one message at a time:
//!
//! - `#t`, `#f`, `(and ...)`, `(or ...)`, `(not ...)`
//! - `(header-contains NAME "text"...)` and its siblings `header-matches`,
//!   `header-starts-with` and `header-ends-with`, which hold if the test
//!   succeeds for any of the given strings. Matching is case-sensitive.
//! - `(header-exists NAME...)`
//! - `(body-contains "text"...)`
//! - `(user-flag NAME...)`, `(system-flag NAME)`
//! - `(= A B)`, `(< A B)`, `(> A B)`, comparing two integers or two strings.
//!   `(> A B)` holds when A is greater than B.
//!
//! Values are integer and string literals, `(get-sent-date)`,
//! `(get-received-date)`, `(get-current-date)` (all seconds since the epoch),
//! `(get-size)` (bytes), and `(user-tag NAME)`, which is the empty string if
//! the tag is unset.
//!
//! Everything answerable from the summary is answered from it; other headers
//! and body content cause the message to be loaded, at most once per message
//! per query.

use std::collections::BTreeSet;

use log::{debug, trace};

use self::compile::*;
use crate::mime::encoded_word::decode_text;
use crate::mime::MimeMessage;
use crate::store::index::BodyIndex;
use crate::store::{MessageSummaryEntry, Uid};
use crate::support::error::Error;

mod compile;
pub mod sexp;

/// Access to the parts of a folder a query may need beyond the summary.
pub trait MessageSource {
    fn load(&mut self, uid: Uid) -> Result<MimeMessage, Error>;

    /// The body index, if the folder has one.
    fn body_index(&self) -> Option<&BodyIndex>;
}

/// A compiled query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query {
    root: SetExpr,
}

impl Query {
    pub fn parse(text: &str) -> Result<Self, Error> {
        let term = sexp::parse(text).ok_or_else(|| {
            Error::MalformedQuery(format!("syntax error in {:?}", text))
        })?;
        let root = compile_set(&term)?;
        trace!("Compiled {:?} into {:?}", text, root);
        Ok(Query { root })
    }

    /// Run the query over `entries`, which must be in UID order.
    ///
    /// Returns the matching UIDs in the same order. Any failure to load a
    /// message needed to answer the query aborts the whole query.
    pub fn evaluate<'a>(
        &self,
        entries: impl IntoIterator<Item = &'a MessageSummaryEntry>,
        source: &mut dyn MessageSource,
        now: i64,
    ) -> Result<Vec<Uid>, Error> {
        let entries = entries.into_iter().collect::<Vec<_>>();
        let mut loaded = 0;
        let matched = {
            let mut eval = Evaluator {
                source,
                now,
                loaded: &mut loaded,
            };
            eval.set(&self.root, &entries)?
        };
        debug!(
            "Query matched {} of {} messages ({} loaded)",
            matched.len(),
            entries.len(),
            loaded
        );
        Ok(matched.into_iter().collect())
    }
}

struct Evaluator<'s, 'l> {
    source: &'s mut dyn MessageSource,
    now: i64,
    loaded: &'l mut usize,
}

/// Per-message evaluation state.
struct Subject<'a> {
    entry: &'a MessageSummaryEntry,
    message: Option<MimeMessage>,
    text: Option<String>,
}

impl<'s, 'l> Evaluator<'s, 'l> {
    fn set(
        &mut self,
        expr: &SetExpr,
        entries: &[&MessageSummaryEntry],
    ) -> Result<BTreeSet<Uid>, Error> {
        match *expr {
            SetExpr::MatchAll(None) => {
                Ok(entries.iter().map(|e| e.uid).collect())
            }
            SetExpr::MatchAll(Some(ref pred)) => {
                let mut matched = BTreeSet::new();
                for &entry in entries {
                    let mut subject = Subject {
                        entry,
                        message: None,
                        text: None,
                    };
                    if self.pred(pred, &mut subject)? {
                        matched.insert(entry.uid);
                    }
                }
                Ok(matched)
            }
            SetExpr::And(ref exprs) => {
                let mut remaining = entries.to_vec();
                for expr in exprs {
                    let matched = self.set(expr, &remaining)?;
                    remaining.retain(|e| matched.contains(&e.uid));
                }
                Ok(remaining.into_iter().map(|e| e.uid).collect())
            }
            SetExpr::Or(ref exprs) => {
                let mut matched = BTreeSet::new();
                for expr in exprs {
                    matched.extend(self.set(expr, entries)?);
                }
                Ok(matched)
            }
            SetExpr::Not(ref expr) => {
                let excluded = self.set(expr, entries)?;
                Ok(entries
                    .iter()
                    .map(|e| e.uid)
                    .filter(|uid| !excluded.contains(uid))
                    .collect())
            }
        }
    }

    fn pred(
        &mut self,
        pred: &Pred,
        subject: &mut Subject,
    ) -> Result<bool, Error> {
        match *pred {
            Pred::Const(b) => Ok(b),
            Pred::And(ref preds) => {
                for p in preds {
                    if !self.pred(p, subject)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Pred::Or(ref preds) => {
                for p in preds {
                    if self.pred(p, subject)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Pred::Not(ref p) => Ok(!self.pred(p, subject)?),
            Pred::Header(ref header, op, ref needles) => {
                let values = self.header_values(header, subject)?;
                Ok(values.iter().any(|value| {
                    needles.iter().any(|needle| header_test(op, value, needle))
                }))
            }
            Pred::HeaderExists(ref names) => {
                let message = self.message(subject)?;
                Ok(names.iter().any(|name| {
                    message.headers().iter().any(|h| h.is(name))
                }))
            }
            Pred::BodyContains(ref needles) => {
                for needle in needles {
                    if self.body_contains(needle, subject)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Pred::UserFlag(ref names) => {
                Ok(names.iter().any(|n| subject.entry.user_flags.contains(n)))
            }
            Pred::SystemFlag(flag) => Ok(subject.entry.flags.contains(flag)),
            Pred::Compare(op, ref lhs, ref rhs) => {
                let ordering = match (lhs, rhs) {
                    (&Value::Int(ref lhs), &Value::Int(ref rhs)) => self
                        .int_value(lhs, subject.entry)
                        .cmp(&self.int_value(rhs, subject.entry)),
                    (&Value::Str(ref lhs), &Value::Str(ref rhs)) => {
                        str_value(lhs, subject.entry)
                            .cmp(str_value(rhs, subject.entry))
                    }
                    // Rejected at compile time
                    _ => return Ok(false),
                };

                Ok(match op {
                    CmpOp::Eq => ordering.is_eq(),
                    CmpOp::Lt => ordering.is_lt(),
                    CmpOp::Gt => ordering.is_gt(),
                })
            }
        }
    }

    fn message<'m>(
        &mut self,
        subject: &'m mut Subject,
    ) -> Result<&'m MimeMessage, Error> {
        if subject.message.is_none() {
            trace!("Loading {} to answer query", subject.entry.uid);
            *self.loaded += 1;
            subject.message = Some(self.source.load(subject.entry.uid)?);
        }

        match subject.message {
            Some(ref message) => Ok(message),
            None => Err(Error::NxMessage),
        }
    }

    fn header_values(
        &mut self,
        header: &HeaderRef,
        subject: &mut Subject,
    ) -> Result<Vec<String>, Error> {
        let entry = subject.entry;
        Ok(match *header {
            HeaderRef::Subject => vec![entry.subject.clone()],
            HeaderRef::From => vec![entry.from.clone()],
            HeaderRef::To => vec![entry.to.clone()],
            HeaderRef::Cc => vec![entry.cc.clone()],
            HeaderRef::Other(ref name) => self
                .message(subject)?
                .header_all(name)
                .iter()
                .map(|v| decode_text(v))
                .collect(),
        })
    }

    fn body_contains(
        &mut self,
        needle: &str,
        subject: &mut Subject,
    ) -> Result<bool, Error> {
        let uid = subject.entry.uid;
        if let Some(index) = self.source.body_index() {
            if index.contains_uid(uid) && index.can_answer(needle) {
                return Ok(index.matches(uid, needle));
            }
        }

        if subject.text.is_none() {
            let text = self.message(subject)?.text_content();
            subject.text = Some(text);
        }
        Ok(subject
            .text
            .as_ref()
            .map_or(false, |text| text.contains(needle)))
    }

    fn int_value(&self, value: &IntValue, entry: &MessageSummaryEntry) -> i64 {
        match *value {
            IntValue::Lit(i) => i,
            IntValue::SentDate => entry.date_sent,
            IntValue::ReceivedDate => entry.date_received,
            IntValue::CurrentDate => self.now,
            IntValue::Size => entry.size as i64,
        }
    }
}

fn str_value<'a>(
    value: &'a StrValue,
    entry: &'a MessageSummaryEntry,
) -> &'a str {
    match *value {
        StrValue::Lit(ref s) => s.as_str(),
        StrValue::UserTag(ref name) => {
            entry.user_tags.get(name).map_or("", String::as_str)
        }
    }
}

fn header_test(op: HeaderOp, value: &str, needle: &str) -> bool {
    let value = value.trim_start();
    match op {
        HeaderOp::Contains => value.contains(needle),
        HeaderOp::Matches => value == needle,
        HeaderOp::StartsWith => value.starts_with(needle),
        HeaderOp::EndsWith => value.ends_with(needle),
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use super::*;
    use crate::store::{SystemFlags, Uid};
    use crate::test_data::numbered_message;

    struct Fixture {
        messages: HashMap<Uid, MimeMessage>,
        index: Option<BodyIndex>,
        loads: usize,
    }

    impl MessageSource for Fixture {
        fn load(&mut self, uid: Uid) -> Result<MimeMessage, Error> {
            self.loads += 1;
            self.messages.get(&uid).cloned().ok_or(Error::NxMessage)
        }

        fn body_index(&self) -> Option<&BodyIndex> {
            self.index.as_ref()
        }
    }

    /// Message `j` of the standard set gets UID `j + 1`. Messages with a
    /// UID divisible by 13 carry `every13`; even UIDs are seen and tagged.
    fn fixture(n: u32) -> (Vec<MessageSummaryEntry>, Fixture) {
        let mut entries = Vec::new();
        let mut messages = HashMap::new();
        for j in 0..n {
            let uid = Uid::u(j + 1);
            let message = numbered_message(j);
            let data = message.to_bytes();
            let mut entry = MessageSummaryEntry::from_message(
                uid,
                &message,
                data.len() as u64,
                i64::from(j + 1) * 1000,
            );
            if 0 == (j + 1) % 13 {
                entry.user_flags.insert("every13".to_owned());
            }
            if 0 == (j + 1) % 2 {
                entry.flags |= SystemFlags::SEEN;
                entry
                    .user_tags
                    .insert("parity".to_owned(), "even".to_owned());
            }
            entries.push(entry);
            messages.insert(uid, message);
        }

        (
            entries,
            Fixture {
                messages,
                index: None,
                loads: 0,
            },
        )
    }

    fn run(
        query: &str,
        entries: &[MessageSummaryEntry],
        fixture: &mut Fixture,
    ) -> Vec<u32> {
        Query::parse(query)
            .unwrap()
            .evaluate(entries, fixture, 1_000_000)
            .unwrap()
            .into_iter()
            .map(|u| u.0.get())
            .collect()
    }

    #[test]
    fn summary_queries() {
        let (entries, mut fixture) = fixture(100);

        assert_eq!(
            100,
            run(
                "(match-all (header-contains \"subject\" \"subject\"))",
                &entries,
                &mut fixture
            )
            .len()
        );
        assert_eq!(
            0,
            run(
                "(match-all (header-contains \"subject\" \"Subject\"))",
                &entries,
                &mut fixture
            )
            .len()
        );
        assert_eq!(
            vec![20],
            run(
                "(match-all (and (header-contains \"subject\" \"Test19\") \
                 (header-contains \"subject\" \"subject\")))",
                &entries,
                &mut fixture
            )
        );
        assert_eq!(
            50,
            run(
                "(match-all (> 72000 (get-sent-date)))",
                &entries,
                &mut fixture
            )
            .len()
        );
        assert_eq!(
            vec![13, 26, 39, 52, 65, 78, 91],
            run("(match-all (user-flag \"every13\"))", &entries, &mut fixture)
        );
        assert_eq!(
            vec![1, 3],
            run(
                "(and (match-all (not (system-flag \"seen\"))) \
                 (match-all (< (get-sent-date) 5000)))",
                &entries,
                &mut fixture
            )
        );
        assert_eq!(
            50,
            run(
                "(match-all (= \"even\" (user-tag \"parity\")))",
                &entries,
                &mut fixture
            )
            .len()
        );
        assert_eq!(
            vec![1, 2, 100],
            run(
                "(or (match-all (> (get-received-date) 99999)) \
                 (match-all (< (get-received-date) 2001)) \
                 (match-all (= (get-received-date) 1000)))",
                &entries,
                &mut fixture
            )
        );
        assert_eq!(
            vec![100],
            run(
                "(not (match-all (< (get-sent-date) 142560)))",
                &entries,
                &mut fixture
            )
        );
        assert_eq!(
            100,
            run(
                "(match-all (< (get-sent-date) (get-current-date)))",
                &entries,
                &mut fixture
            )
            .len()
        );

        // None of the above needed anything beyond the summary
        assert_eq!(0, fixture.loads);
    }

    #[test]
    fn message_queries() {
        let (entries, mut fixture) = fixture(20);

        assert_eq!(
            vec![8],
            run("(body-contains \"data7 \")", &entries, &mut fixture)
        );
        assert_eq!(
            vec![2, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20],
            run("(body-contains \"data1\")", &entries, &mut fixture)
        );
        assert_eq!(
            vec![4],
            run(
                "(match-all (header-matches \"Message-ID\" \
                 \"<test-3@letterbox.example>\"))",
                &entries,
                &mut fixture
            )
        );
        assert_eq!(
            vec![5],
            run(
                "(match-all (and (header-starts-with \"subject\" \"Test4 \") \
                 (header-ends-with \"SUBJECT\" \"subject\")))",
                &entries,
                &mut fixture
            )
        );
        assert_eq!(
            20,
            run(
                "(match-all (header-exists \"date\"))",
                &entries,
                &mut fixture
            )
            .len()
        );
        assert!(run(
            "(match-all (header-exists \"X-Nope\"))",
            &entries,
            &mut fixture
        )
        .is_empty());
    }

    #[test]
    fn messages_loaded_at_most_once() {
        let (entries, mut fixture) = fixture(5);
        run(
            "(match-all (and (header-exists \"date\") \
             (body-contains \"content\") (header-contains \"X-Other\" \"x\")))",
            &entries,
            &mut fixture,
        );
        assert_eq!(5, fixture.loads);
    }

    #[test]
    fn body_index_answers_words() {
        let (entries, mut fixture) = fixture(20);
        let mut index = BodyIndex::new(1);
        for (uid, message) in &fixture.messages {
            index.add(*uid, &message.text_content());
        }
        fixture.index = Some(index);

        assert_eq!(
            vec![2, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20],
            run("(body-contains \"data1\")", &entries, &mut fixture)
        );
        assert_eq!(0, fixture.loads);

        // Not a single word, so it needs a content scan
        assert_eq!(
            vec![3],
            run("(body-contains \"data2 content\")", &entries, &mut fixture)
        );
        assert_eq!(20, fixture.loads);
    }

    #[test]
    fn load_failure_aborts() {
        let (entries, mut fixture) = fixture(3);
        fixture.messages.remove(&Uid::u(2));
        assert_matches!(
            Err(Error::NxMessage),
            Query::parse("(body-contains \"x\")").unwrap().evaluate(
                &entries,
                &mut fixture,
                0
            )
        );
    }

    #[test]
    fn syntax_errors_are_malformed() {
        assert_matches!(
            Err(Error::MalformedQuery(_)),
            Query::parse("(match-all")
        );
        assert_matches!(Err(Error::MalformedQuery(_)), Query::parse(""));
    }
}
