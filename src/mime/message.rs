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

use std::io::{self, Write};

use chrono::prelude::*;
use encoding_rs::{Encoding, UTF_8};

use super::encoded_word::{decode_text, ew_encode};
use super::header::{
    self, format_datetime, media_type, parameter, parse_datetime,
    split_headers, Header,
};
use crate::filter::basic::{BasicFilter, BasicKind};
use crate::filter::StreamFilter;

/// Multiparts nested deeper than this are not descended into.
const MAX_DEPTH: u32 = 20;

/// A message as a header block and an opaque body.
///
/// This only understands as much MIME as is needed to build summaries and to
/// search text: header access, multipart splitting, and transfer/charset
/// decoding of text parts. The body is otherwise kept byte-for-byte.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MimeMessage {
    headers: Vec<Header>,
    body: Vec<u8>,
}

impl MimeMessage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `data` as an RFC 5322 message.
    ///
    /// This never fails; anything which is not understood as a header ends
    /// up being ignored or becomes part of the body.
    pub fn parse(data: &[u8]) -> Self {
        let (headers, body_start) = split_headers(data);
        MimeMessage {
            headers,
            body: data[body_start..].to_vec(),
        }
    }

    /// Serialise the message.
    pub fn write_to(&self, mut w: impl Write) -> io::Result<()> {
        for h in &self.headers {
            w.write_all(h.name.as_bytes())?;
            w.write_all(b":")?;
            w.write_all(&h.raw)?;
            w.write_all(b"\n")?;
        }
        w.write_all(b"\n")?;
        w.write_all(&self.body)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.body.len() + 256);
        // Writing to a Vec is infallible
        let _ = self.write_to(&mut out);
        out
    }

    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    /// Return the unfolded value of the first header named `name`.
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers.iter().find(|h| h.is(name)).map(Header::value)
    }

    /// Return the values of every header named `name`, in order.
    pub fn header_all(&self, name: &str) -> Vec<String> {
        self.headers
            .iter()
            .filter(|h| h.is(name))
            .map(Header::value)
            .collect()
    }

    /// Replace every header named `name` with a single one with the given
    /// value, keeping the position of the first.
    pub fn set_header(&mut self, name: &str, value: &str) {
        let new = Header::new(name, value);
        match self.headers.iter().position(|h| h.is(name)) {
            Some(pos) => {
                self.headers[pos] = new;
                let mut ix = 0;
                self.headers.retain(|h| {
                    ix += 1;
                    ix - 1 == pos || !h.is(name)
                });
            }
            None => self.headers.push(new),
        }
    }

    pub fn add_header(&mut self, name: &str, value: &str) {
        self.headers.push(Header::new(name, value));
    }

    /// Remove every header named `name`. Returns whether any were present.
    pub fn remove_header(&mut self, name: &str) -> bool {
        let before = self.headers.len();
        self.headers.retain(|h| !h.is(name));
        before != self.headers.len()
    }

    pub fn subject(&self) -> Option<String> {
        self.header("Subject").map(|s| decode_text(&s))
    }

    pub fn set_subject(&mut self, subject: &str) {
        self.set_header("Subject", &ew_encode(subject));
    }

    pub fn from(&self) -> Option<String> {
        self.header("From").map(|s| decode_text(&s))
    }

    pub fn set_from(&mut self, from: &str) {
        self.set_header("From", &ew_encode(from));
    }

    /// Return all `To` recipients, joined with `, `.
    pub fn to(&self) -> Option<String> {
        self.addresses("To")
    }

    pub fn set_to(&mut self, to: &str) {
        self.set_header("To", &ew_encode(to));
    }

    pub fn cc(&self) -> Option<String> {
        self.addresses("Cc")
    }

    pub fn set_cc(&mut self, cc: &str) {
        self.set_header("Cc", &ew_encode(cc));
    }

    fn addresses(&self, name: &str) -> Option<String> {
        let all = self.header_all(name);
        if all.is_empty() {
            None
        } else {
            Some(
                all.iter()
                    .map(|s| decode_text(s))
                    .collect::<Vec<_>>()
                    .join(", "),
            )
        }
    }

    pub fn date(&self) -> Option<DateTime<FixedOffset>> {
        self.header("Date").and_then(|d| parse_datetime(&d))
    }

    /// Set the `Date` header from a UNIX timestamp and an offset in minutes
    /// east of UTC.
    pub fn set_date(&mut self, timestamp: i64, offset_minutes: i32) {
        self.set_header("Date", &format_datetime(timestamp, offset_minutes));
    }

    /// Return the `Message-ID`, without angle brackets.
    pub fn message_id(&self) -> Option<String> {
        self.header("Message-ID").map(|id| {
            id.trim()
                .trim_start_matches('<')
                .trim_end_matches('>')
                .to_owned()
        })
    }

    pub fn set_message_id(&mut self, id: &str) {
        self.set_header("Message-ID", &format!("<{}>", id));
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn set_body(&mut self, body: Vec<u8>) {
        self.body = body;
    }

    /// Replace the body with a UTF-8 plain text body.
    pub fn set_text_body(&mut self, text: &str) {
        self.set_header("MIME-Version", "1.0");
        self.set_header("Content-Type", "text/plain; charset=utf-8");
        self.set_header("Content-Transfer-Encoding", "8bit");
        self.body = text.as_bytes().to_vec();
    }

    /// If this is a multipart, split it into its parts.
    pub fn parts(&self) -> Option<Vec<MimeMessage>> {
        let content_type = self.header("Content-Type")?;
        if !media_type(&content_type).starts_with("multipart/") {
            return None;
        }

        let boundary = parameter(&content_type, "boundary")?;
        let delimiter = format!("--{}", boundary);
        let mut parts = Vec::new();
        let mut current: Option<Vec<u8>> = None;

        for line in self.body.split_inclusive(|&b| b'\n' == b) {
            let content = header::trim_eol(line);
            if let Some(rest) = content.strip_prefix(delimiter.as_bytes()) {
                let rest = trim_trailing_whitespace(rest);
                if rest.is_empty() || b"--" == rest {
                    if let Some(part) = current.take() {
                        parts.push(MimeMessage::parse(strip_final_eol(&part)));
                    }

                    if b"--" == rest {
                        break;
                    }

                    current = Some(Vec::new());
                    continue;
                }
            }

            if let Some(ref mut current) = current {
                current.extend_from_slice(line);
            }
        }

        // An unterminated final part is still a part
        if let Some(part) = current {
            parts.push(MimeMessage::parse(&part));
        }

        Some(parts)
    }

    /// Return the decoded text of every textual leaf part, joined with line
    /// feeds.
    ///
    /// Transfer encodings are undone and the result is converted to UTF-8.
    /// Non-text leaves are skipped.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out, 0);
        out
    }

    fn collect_text(&self, out: &mut String, depth: u32) {
        if depth > MAX_DEPTH {
            return;
        }

        if let Some(parts) = self.parts() {
            for part in parts {
                part.collect_text(out, depth + 1);
            }
            return;
        }

        let content_type = self
            .header("Content-Type")
            .unwrap_or_else(|| "text/plain".to_owned());
        let media = media_type(&content_type);

        if "message/rfc822" == media {
            MimeMessage::parse(&self.decoded_body())
                .collect_text(out, depth + 1);
            return;
        }

        if !media.starts_with("text/") && !media.is_empty() {
            return;
        }

        let charset = parameter(&content_type, "charset")
            .unwrap_or_else(|| "us-ascii".to_owned());
        let encoding =
            Encoding::for_label_no_replacement(charset.as_bytes())
                .unwrap_or(UTF_8);
        let body = self.decoded_body();
        let (text, _, _) = encoding.decode(&body);

        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&text);
    }

    /// Return the body with its Content-Transfer-Encoding undone.
    pub fn decoded_body(&self) -> Vec<u8> {
        let kind = match self
            .header("Content-Transfer-Encoding")
            .map(|cte| cte.to_ascii_lowercase())
            .as_deref()
        {
            Some("quoted-printable") => BasicKind::QpDecode,
            Some("base64") => BasicKind::Base64Decode,
            _ => return self.body.clone(),
        };

        let mut out = Vec::with_capacity(self.body.len());
        BasicFilter::new(kind).complete(&self.body, &mut out);
        out
    }
}

fn trim_trailing_whitespace(s: &[u8]) -> &[u8] {
    let end = s
        .iter()
        .rposition(|&b| b' ' != b && b'\t' != b)
        .map(|p| p + 1)
        .unwrap_or(0);
    &s[..end]
}

// The line ending before a boundary delimiter belongs to the delimiter
fn strip_final_eol(s: &[u8]) -> &[u8] {
    let s = s.strip_suffix(b"\n").unwrap_or(s);
    s.strip_suffix(b"\r").unwrap_or(s)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_data::*;

    #[test]
    fn parse_and_access_headers() {
        let message = MimeMessage::parse(ENCODED_SUBJECT);
        assert_eq!(Some("Keld Jørn Simonsen".to_owned()), message.subject());
        assert_eq!(
            Some("Alice <alice@example.com>".to_owned()),
            message.from()
        );
        assert_eq!(
            Some("bob@example.com, carol@example.com".to_owned()),
            message.to()
        );
        assert_eq!(None, message.cc());
        assert_eq!(
            Some("1234@example.com".to_owned()),
            message.message_id()
        );
        assert_eq!(880127706, message.date().unwrap().timestamp());
    }

    #[test]
    fn build_and_reparse() {
        let mut message = MimeMessage::new();
        message.set_subject("Grüße");
        message.set_from("a@example.com");
        message.set_to("b@example.com");
        message.set_date(1440, 0);
        message.set_message_id("x@y");
        message.set_text_body("data1 content\n");

        let bytes = message.to_bytes();
        let reparsed = MimeMessage::parse(&bytes);
        assert_eq!(message, reparsed);
        assert_eq!(Some("Grüße".to_owned()), reparsed.subject());
        assert_eq!(1440, reparsed.date().unwrap().timestamp());
        assert_eq!("data1 content\n", reparsed.text_content());
    }

    #[test]
    fn set_header_replaces_all() {
        let mut message =
            MimeMessage::parse(b"X-A: 1\nX-B: 2\nx-a: 3\n\nbody");
        message.set_header("X-A", "4");
        assert_eq!(vec!["4".to_owned()], message.header_all("x-a"));
        assert_eq!("X-A", message.headers()[0].name);
        assert!(message.remove_header("x-b"));
        assert!(!message.remove_header("x-b"));
        assert_eq!(b"X-A: 4\n\nbody", &message.to_bytes()[..]);
    }

    #[test]
    fn multipart_text_content() {
        let message = MimeMessage::parse(MULTIPART_ALTERNATIVE);
        let parts = message.parts().unwrap();
        assert_eq!(3, parts.len());
        let text = message.text_content();
        assert!(text.contains("Plain café"), "text = {:?}", text);
        assert!(text.contains("<b>Bold</b> text"), "text = {:?}", text);
        assert!(!text.contains("iVBORw0KGgo"), "text = {:?}", text);
    }

    #[test]
    fn non_multipart_has_no_parts() {
        let message = MimeMessage::parse(b"Subject: x\n\nhello");
        assert_eq!(None, message.parts());
        assert_eq!("hello", message.text_content());
    }

    #[test]
    fn text_content_undoes_transfer_encoding_and_charset() {
        let message = MimeMessage::parse(
            b"Content-Type: text/plain; charset=iso-8859-1\n\
              Content-Transfer-Encoding: quoted-printable\n\
              \n\
              caf=E9 cr=E8me\n",
        );
        assert_eq!("caf\u{e9} cr\u{e8}me\n", message.text_content());
    }
}
