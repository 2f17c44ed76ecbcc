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

//! Conversion of plain text to HTML.

use bitflags::bitflags;

use super::{split_eol, LineBuffer, StreamFilter};

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ToHtmlFlags: u32 {
        /// Wrap the whole output in `<pre>`.
        const PRE = 1 << 0;
        /// Emit `<br>` at the end of each line.
        const CONVERT_NL = 1 << 1;
        /// Preserve runs of spaces and tabs with `&nbsp;`.
        const CONVERT_SPACES = 1 << 2;
        /// Turn URLs into links.
        const CONVERT_URLS = 1 << 3;
        /// Turn bare email addresses into `mailto:` links.
        const CONVERT_ADDRESSES = 1 << 4;
        /// Escape HTML metacharacters in text which is not part of a link.
        const ESCAPE = 1 << 5;
    }
}

/// Prefixes which start a URL, and what must be prepended to the matched
/// text to form the link target.
static URL_PREFIXES: &[(&[u8], &[u8])] = &[
    (b"http://", b""),
    (b"https://", b""),
    (b"ftp://", b""),
    (b"news:", b""),
    (b"www.", b"http://"),
    (b"ftp.", b"ftp://"),
];

const MAILTO: &[u8] = b"mailto:";
const TAB_WIDTH: usize = 8;

/// Marks up plain text as HTML.
///
/// Links never span lines, so the text is processed a line at a time. A link
/// may only start at the start of a line, after whitespace, or after one of
/// the opening punctuation characters `(<"'[{`. Trailing punctuation that is
/// more likely to belong to the surrounding sentence is left out of the link.
#[derive(Clone, Debug)]
pub struct ToHtmlFilter {
    flags: ToHtmlFlags,
    lines: LineBuffer,
    started: bool,
}

#[derive(Debug)]
struct Link {
    end: usize,
    href: Vec<u8>,
}

/// Per-line state for `CONVERT_SPACES`.
#[derive(Default)]
struct Column {
    col: usize,
    after_space: bool,
}

impl ToHtmlFilter {
    pub fn new(flags: ToHtmlFlags) -> Self {
        ToHtmlFilter {
            flags,
            lines: LineBuffer::default(),
            started: false,
        }
    }

    fn start(&mut self, out: &mut Vec<u8>) {
        if !self.started {
            self.started = true;
            if self.flags.contains(ToHtmlFlags::PRE) {
                out.extend_from_slice(b"<pre>");
            }
        }
    }

    fn convert_line(&self, line: &[u8], out: &mut Vec<u8>) {
        let (content, eol) = split_eol(line);
        let mut column = Column::default();
        let mut plain_start = 0;
        let mut ix = 0;

        while ix < content.len() {
            if content[ix].is_ascii_alphanumeric() && is_boundary(content, ix) {
                if let Some(link) = self.scan_link(&content[ix..]) {
                    self.emit_text(&content[plain_start..ix], &mut column, out);
                    emit_link(&content[ix..ix + link.end], &link.href, out);
                    column.col += link.end;
                    column.after_space = false;
                    ix += link.end;
                    plain_start = ix;
                    continue;
                }
            }

            ix += 1;
        }

        self.emit_text(&content[plain_start..], &mut column, out);
        if !eol.is_empty() && self.flags.contains(ToHtmlFlags::CONVERT_NL) {
            out.extend_from_slice(b"<br>");
        }
        out.extend_from_slice(eol);
    }

    fn scan_link(&self, text: &[u8]) -> Option<Link> {
        if self.flags.contains(ToHtmlFlags::CONVERT_URLS) {
            for &(prefix, implied) in URL_PREFIXES {
                if starts_with_ignore_case(text, prefix) {
                    if let Some(end) = url_end(text, prefix.len()) {
                        let mut href = implied.to_vec();
                        href.extend_from_slice(&text[..end]);
                        return Some(Link { end, href });
                    }
                }
            }

            if starts_with_ignore_case(text, MAILTO) {
                if let Some(end) = address_end(text, MAILTO.len()) {
                    return Some(Link {
                        end,
                        href: text[..end].to_vec(),
                    });
                }
            }
        }

        if self.flags.contains(ToHtmlFlags::CONVERT_ADDRESSES) {
            if let Some(end) = address_end(text, 0) {
                let mut href = MAILTO.to_vec();
                href.extend_from_slice(&text[..end]);
                return Some(Link { end, href });
            }
        }

        None
    }

    fn emit_text(&self, text: &[u8], column: &mut Column, out: &mut Vec<u8>) {
        let escape = self.flags.contains(ToHtmlFlags::ESCAPE);
        let spaces = self.flags.contains(ToHtmlFlags::CONVERT_SPACES);

        for &b in text {
            match b {
                b' ' if spaces => {
                    if 0 == column.col || column.after_space {
                        out.extend_from_slice(b"&nbsp;");
                    } else {
                        out.push(b' ');
                    }
                    column.col += 1;
                    column.after_space = true;
                    continue;
                }
                b'\t' if spaces => {
                    let width = TAB_WIDTH - column.col % TAB_WIDTH;
                    for _ in 0..width {
                        out.extend_from_slice(b"&nbsp;");
                    }
                    column.col += width;
                    column.after_space = true;
                    continue;
                }
                b'&' if escape => out.extend_from_slice(b"&amp;"),
                b'<' if escape => out.extend_from_slice(b"&lt;"),
                b'>' if escape => out.extend_from_slice(b"&gt;"),
                b'"' if escape => out.extend_from_slice(b"&quot;"),
                b => out.push(b),
            }

            // UTF-8 continuation bytes do not occupy a column
            if 0x80 != b & 0xC0 {
                column.col += 1;
            }
            column.after_space = false;
        }
    }
}

fn emit_link(text: &[u8], href: &[u8], out: &mut Vec<u8>) {
    out.extend_from_slice(b"<a href=\"");
    escape_all(href, out);
    out.extend_from_slice(b"\">");
    escape_all(text, out);
    out.extend_from_slice(b"</a>");
}

fn escape_all(text: &[u8], out: &mut Vec<u8>) {
    for &b in text {
        match b {
            b'&' => out.extend_from_slice(b"&amp;"),
            b'<' => out.extend_from_slice(b"&lt;"),
            b'>' => out.extend_from_slice(b"&gt;"),
            b'"' => out.extend_from_slice(b"&quot;"),
            b => out.push(b),
        }
    }
}

fn is_boundary(text: &[u8], ix: usize) -> bool {
    0 == ix
        || matches!(
            text[ix - 1],
            b' ' | b'\t' | b'(' | b'<' | b'"' | b'\'' | b'[' | b'{'
        )
}

fn starts_with_ignore_case(text: &[u8], prefix: &[u8]) -> bool {
    text.len() >= prefix.len()
        && text[..prefix.len()].eq_ignore_ascii_case(prefix)
}

fn is_url_byte(b: u8) -> bool {
    b > b' '
        && b < 0x7F
        && !matches!(
            b,
            b'<' | b'>' | b'"' | b'`' | b'{' | b'}' | b'|' | b'\\' | b'^'
        )
}

/// Find the end of a URL in `text` whose prefix is `start` bytes long.
fn url_end(text: &[u8], start: usize) -> Option<usize> {
    if !text.get(start)?.is_ascii_alphanumeric() {
        return None;
    }

    let mut end = start
        + text[start..]
            .iter()
            .position(|&b| !is_url_byte(b))
            .unwrap_or(text.len() - start);

    while end > start {
        let url = &text[..end];
        let trim = match url[end - 1] {
            b'.' | b',' | b';' | b':' | b'!' | b'?' | b'\'' => true,
            b')' => count(url, b'(') < count(url, b')'),
            b']' => count(url, b'[') < count(url, b']'),
            _ => false,
        };

        if !trim {
            break;
        }
        end -= 1;
    }

    if end > start {
        Some(end)
    } else {
        None
    }
}

fn count(text: &[u8], b: u8) -> usize {
    text.iter().filter(|&&c| c == b).count()
}

fn is_local_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'%' | b'+' | b'-')
}

fn is_domain_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b'.' == b || b'-' == b
}

/// Find the end of an email address starting `start` bytes into `text`.
fn address_end(text: &[u8], start: usize) -> Option<usize> {
    let text = text.get(start..)?;
    if !text.first()?.is_ascii_alphanumeric() {
        return None;
    }

    let at = text.iter().position(|&b| !is_local_byte(b))?;
    if b'@' != text[at] || b'.' == text[at - 1] {
        return None;
    }

    let domain_start = at + 1;
    let mut end = domain_start
        + text[domain_start..]
            .iter()
            .position(|&b| !is_domain_byte(b))
            .unwrap_or(text.len() - domain_start);
    while end > domain_start && matches!(text[end - 1], b'.' | b'-') {
        end -= 1;
    }

    let domain = &text[domain_start..end];
    let valid = !domain.is_empty()
        && domain.first().map_or(false, u8::is_ascii_alphanumeric)
        && domain.contains(&b'.')
        && domain.split(|&b| b'.' == b).all(|label| !label.is_empty());
    if valid {
        Some(start + end)
    } else {
        None
    }
}

impl StreamFilter for ToHtmlFilter {
    fn filter(&mut self, input: &[u8], out: &mut Vec<u8>) {
        self.start(out);
        let mut lines = std::mem::take(&mut self.lines);
        lines.feed(input, |line| self.convert_line(line, out));
        self.lines = lines;
    }

    fn complete(&mut self, input: &[u8], out: &mut Vec<u8>) {
        self.filter(input, out);
        let mut lines = std::mem::take(&mut self.lines);
        lines.finish(|line| self.convert_line(line, out));
        self.lines = lines;
        if self.flags.contains(ToHtmlFlags::PRE) {
            out.extend_from_slice(b"</pre>");
        }
    }

    fn reset(&mut self) {
        self.lines.clear();
        self.started = false;
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;
    use crate::filter::test_support::*;

    fn links() -> ToHtmlFilter {
        ToHtmlFilter::new(
            ToHtmlFlags::CONVERT_URLS | ToHtmlFlags::CONVERT_ADDRESSES,
        )
    }

    fn convert(flags: ToHtmlFlags, input: &str) -> String {
        String::from_utf8(run_chunked(
            &mut ToHtmlFilter::new(flags),
            input.as_bytes(),
            4096,
        ))
        .unwrap()
    }

    fn check(input: &str, expected: &str) {
        assert_chunk_invariant(
            &mut links(),
            input.as_bytes(),
            expected.as_bytes(),
        );
    }

    #[test]
    fn address_with_trailing_period() {
        check(
            "bob@foo.com.",
            "<a href=\"mailto:bob@foo.com\">bob@foo.com</a>.",
        );
    }

    #[test]
    fn near_misses_are_not_links() {
        for text in &[
            "src/www.c",
            "http: is not a URL",
            "http:// neither",
            "mail bob@ please",
            "@foo.com",
            "bob@foo",
            "bob.@foo.com",
            "www. alone",
            "xwww.foo.com",
            "foohttp://x.org",
        ] {
            check(text, text);
        }
    }

    #[test]
    fn urls() {
        check(
            "see http://example.com/a?b=c, ok",
            "see <a href=\"http://example.com/a?b=c\">\
             http://example.com/a?b=c</a>, ok",
        );
        check(
            "(www.example.org)",
            "(<a href=\"http://www.example.org\">www.example.org</a>)",
        );
        check(
            "\"ftp.gnu.org\"",
            "\"<a href=\"ftp://ftp.gnu.org\">ftp.gnu.org</a>\"",
        );
        check(
            "wiki https://en.wikipedia.org/wiki/Foo_(bar)!",
            "wiki <a href=\"https://en.wikipedia.org/wiki/Foo_(bar)\">\
             https://en.wikipedia.org/wiki/Foo_(bar)</a>!",
        );
        check(
            "HTTP://X.ORG/&y",
            "<a href=\"HTTP://X.ORG/&amp;y\">HTTP://X.ORG/&amp;y</a>",
        );
        check(
            "news:comp.lang.rust",
            "<a href=\"news:comp.lang.rust\">news:comp.lang.rust</a>",
        );
    }

    #[test]
    fn addresses() {
        check(
            "<alice.b+tag@mail.example.co.uk>",
            "<<a href=\"mailto:alice.b+tag@mail.example.co.uk\">\
             alice.b+tag@mail.example.co.uk</a>>",
        );
        check(
            "mailto:bob@foo.com;",
            "<a href=\"mailto:bob@foo.com\">mailto:bob@foo.com</a>;",
        );
        check(
            "a@b.c d@e.f\nx",
            "<a href=\"mailto:a@b.c\">a@b.c</a> \
             <a href=\"mailto:d@e.f\">d@e.f</a>\nx",
        );
    }

    #[test]
    fn flags_are_respected() {
        assert_eq!(
            "bob@foo.com http://x.org",
            convert(ToHtmlFlags::empty(), "bob@foo.com http://x.org")
        );
        assert_eq!(
            "bob@foo.com <a href=\"http://x.org\">http://x.org</a>",
            convert(ToHtmlFlags::CONVERT_URLS, "bob@foo.com http://x.org")
        );
        assert_eq!(
            "a &lt;b&gt; &amp; &quot;c&quot;",
            convert(ToHtmlFlags::ESCAPE, "a <b> & \"c\"")
        );
        assert_eq!(
            "<pre>a<br>\nb</pre>",
            convert(ToHtmlFlags::PRE | ToHtmlFlags::CONVERT_NL, "a\nb")
        );
        assert_eq!("<pre></pre>", convert(ToHtmlFlags::PRE, ""));
        assert_eq!(
            "&nbsp;a &nbsp;b&nbsp;&nbsp;&nbsp;c",
            convert(ToHtmlFlags::CONVERT_SPACES, " a  b\tc")
        );
    }

    proptest! {
        #[test]
        fn chunking_does_not_matter(
            s in "[a-z@.:/ ()<>\"\n]{0,80}",
            chunk_size in 1usize..=20,
        ) {
            let flags = ToHtmlFlags::all();
            let whole = run_chunked(
                &mut ToHtmlFilter::new(flags), s.as_bytes(), 4096);
            let chunked = run_chunked(
                &mut ToHtmlFilter::new(flags), s.as_bytes(), chunk_size);
            prop_assert_eq!(whole, chunked);
        }
    }
}
