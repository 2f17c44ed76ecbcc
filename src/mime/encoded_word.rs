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

//! RFC 2047 encoded words, as found in `Subject` and address headers.

use encoding_rs::Encoding;
use lazy_static::lazy_static;
use regex::Regex;

use crate::filter::basic::{qp_decode, BasicFilter, BasicKind};
use crate::filter::StreamFilter;

lazy_static! {
    static ref ENCODED_WORD: Regex =
        Regex::new(r"^=\?([!->@-~]*)\?([!->@-~]*)\?([!->@-~]*)\?=$").unwrap();
}

/// Test if `word` (in its entirety) is an encoded word, and decode it if so.
///
/// Returns `None` if it is not an encoded word or could not be decoded. The
/// distinction from returning the input matters because whitespace between
/// adjacent encoded words is deleted, but is kept everywhere else.
///
/// Encoded words longer than the 75 characters RFC 2047 allows are accepted,
/// since real agents produce them.
pub fn ew_decode(word: &str) -> Option<String> {
    let captures = ENCODED_WORD.captures(word)?;

    let charset = captures.get(1)?.as_str();
    // RFC 2231 language suffix, e.g. `us-ascii*en`
    let charset = charset.split('*').next().unwrap_or(charset);
    let transfer_encoding = captures.get(2)?.as_str();
    let content = captures.get(3)?.as_str().as_bytes();

    let raw = match transfer_encoding {
        "q" | "Q" => {
            // _ stands for ASCII space regardless of charset
            let content = content
                .iter()
                .map(|&b| if b'_' == b { b' ' } else { b })
                .collect::<Vec<u8>>();
            qp_decode(&content)
        }
        "b" | "B" => {
            let mut decoder = BasicFilter::new(BasicKind::Base64Decode);
            let mut out = Vec::new();
            decoder.complete(content, &mut out);
            out
        }
        _ => return None,
    };

    let encoding = Encoding::for_label_no_replacement(charset.as_bytes())?;
    Some(encoding.decode_with_bom_removal(&raw).0.into_owned())
}

/// Decode all encoded words in an unstructured header value.
pub fn decode_text(text: &str) -> String {
    if !text.contains("=?") {
        return text.to_owned();
    }

    let mut out = String::with_capacity(text.len());
    let mut pending_space = String::new();
    let mut last_was_encoded = false;
    let mut word_start = None;

    let flush_word = |out: &mut String,
                          pending_space: &mut String,
                          last_was_encoded: &mut bool,
                          word: &str| {
        match ew_decode(word) {
            Some(decoded) => {
                if !*last_was_encoded {
                    out.push_str(pending_space);
                }
                out.push_str(&decoded);
                *last_was_encoded = true;
            }
            None => {
                out.push_str(pending_space);
                out.push_str(word);
                *last_was_encoded = false;
            }
        }
        pending_space.clear();
    };

    for (ix, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if let Some(start) = word_start.take() {
                flush_word(
                    &mut out,
                    &mut pending_space,
                    &mut last_was_encoded,
                    &text[start..ix],
                );
            }
            pending_space.push(ch);
        } else if word_start.is_none() {
            word_start = Some(ix);
        }
    }

    if let Some(start) = word_start {
        flush_word(
            &mut out,
            &mut pending_space,
            &mut last_was_encoded,
            &text[start..],
        );
    }
    out.push_str(&pending_space);

    out
}

/// Encode `text` for use in an unstructured header.
///
/// Pure printable ASCII is returned unchanged. Anything else becomes a single
/// UTF-8 base64 encoded word.
pub fn ew_encode(text: &str) -> String {
    if text.bytes().all(|b| (b' '..=b'~').contains(&b))
        && !text.contains("=?")
    {
        text.to_owned()
    } else {
        format!("=?utf-8?b?{}?=", base64::encode(text.as_bytes()))
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_ew_decode() {
        assert_eq!(None, ew_decode("hello world"));

        // Examples from RFC 2047
        assert_eq!(
            "Keith Moore",
            ew_decode("=?US-ASCII?Q?Keith_Moore?=").unwrap()
        );
        assert_eq!(
            "Keld Jørn Simonsen",
            ew_decode("=?ISO-8859-1?Q?Keld_J=F8rn_Simonsen?=").unwrap()
        );
        assert_eq!("André", ew_decode("=?ISO-8859-1?Q?Andr=E9?=").unwrap());
        assert_eq!(
            "If you can read this yo",
            ew_decode("=?ISO-8859-1?B?SWYgeW91IGNhbiByZWFkIHRoaXMgeW8=?=")
                .unwrap()
        );
        assert_eq!(
            "םולש ןב ילטפנ",
            ew_decode("=?iso-8859-8?b?7eXs+SDv4SDp7Oj08A==?=").unwrap()
        );
        assert_eq!(None, ew_decode("=?x-no-such-charset?q?foo?="));
        assert_eq!(None, ew_decode("=?utf-8?x?foo?="));
    }

    #[test]
    fn test_decode_text() {
        assert_eq!("plain subject", decode_text("plain subject"));
        assert_eq!(
            "ab",
            decode_text("=?ISO-8859-1?Q?a?=  =?ISO-8859-1?Q?b?=")
        );
        assert_eq!(
            "x a b",
            decode_text("x =?ISO-8859-1?Q?a?= b")
        );
        assert_eq!(
            "Re: André x",
            decode_text("Re: =?ISO-8859-1?Q?Andr=E9?= x")
        );
        assert_eq!("a =?bogus", decode_text("a =?bogus"));
    }

    #[test]
    fn test_ew_encode() {
        assert_eq!("Hello", ew_encode("Hello"));
        let encoded = ew_encode("Grüße");
        assert!(encoded.starts_with("=?utf-8?b?"));
        assert_eq!("Grüße", decode_text(&encoded));
    }

    proptest! {
        #[test]
        fn ew_decode_never_panics(s in r"=\?.*\?.*\?.*\?=") {
            ew_decode(&s);
        }

        #[test]
        fn ew_encode_is_decodable(s in "\\PC*") {
            prop_assert_eq!(s.clone(), decode_text(&ew_encode(&s)));
        }
    }
}
