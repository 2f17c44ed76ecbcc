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

//! Incremental byte transforms.
//!
//! A `StreamFilter` consumes its input in arbitrarily-sized chunks and may
//! hold back any suffix of it until it knows how to transform it. The output
//! of a filter is the same no matter how the input was chunked. Once the
//! input is exhausted, `complete` must be called exactly once to flush
//! whatever was held back; after that, the filter must be `reset` before it
//! can be used on another stream.
//!
//! Filters are composed with `FilterWriter` (push) or `FilterReader` (pull).

pub mod basic;
pub mod canon;
pub mod charset;
pub mod crlf;
pub mod from_quote;
mod pipeline;
pub mod strip_header;
pub mod tohtml;

pub use self::basic::{BasicFilter, BasicKind};
pub use self::canon::{CanonFilter, CanonFlags};
pub use self::charset::CharsetFilter;
pub use self::crlf::{CrlfDirection, CrlfFilter, CrlfMode};
pub use self::from_quote::{FromQuoteFilter, FromQuoteMode};
pub use self::pipeline::{filter_all, FilterReader, FilterWriter};
pub use self::strip_header::HeaderStripFilter;
pub use self::tohtml::{ToHtmlFilter, ToHtmlFlags};

pub trait StreamFilter: Send {
    /// Transform `input`, appending whatever can already be determined to
    /// `out`. Any suffix of `input` may be held back for a later call.
    fn filter(&mut self, input: &[u8], out: &mut Vec<u8>);

    /// Transform the final `input` of the stream and flush everything that
    /// has been held back.
    fn complete(&mut self, input: &[u8], out: &mut Vec<u8>);

    /// Forget all state so that the filter can process a new stream.
    fn reset(&mut self);
}

impl<T: StreamFilter + ?Sized> StreamFilter for Box<T> {
    fn filter(&mut self, input: &[u8], out: &mut Vec<u8>) {
        (**self).filter(input, out)
    }

    fn complete(&mut self, input: &[u8], out: &mut Vec<u8>) {
        (**self).complete(input, out)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

/// Splits a stream into lines for filters which work a line at a time.
///
/// Only the unterminated tail of the input is ever held, so the buffer is
/// bounded by the longest line.
#[derive(Clone, Debug, Default)]
pub(crate) struct LineBuffer {
    partial: Vec<u8>,
}

impl LineBuffer {
    /// Invoke `f` on each complete line (including its `\n`) in `input`,
    /// prefixed by any tail held from the previous call.
    pub(crate) fn feed(&mut self, input: &[u8], mut f: impl FnMut(&[u8])) {
        let mut rest = input;
        while let Some(ix) = memchr::memchr(b'\n', rest) {
            let (line, tail) = rest.split_at(ix + 1);
            if self.partial.is_empty() {
                f(line);
            } else {
                self.partial.extend_from_slice(line);
                let line = std::mem::take(&mut self.partial);
                f(&line);
            }
            rest = tail;
        }

        self.partial.extend_from_slice(rest);
    }

    /// Invoke `f` on the held unterminated line, if there is one.
    pub(crate) fn finish(&mut self, mut f: impl FnMut(&[u8])) {
        if !self.partial.is_empty() {
            let line = std::mem::take(&mut self.partial);
            f(&line);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.partial.clear();
    }
}

/// Split `line` into its content and its line ending (`\r\n`, `\n`, or
/// nothing).
pub(crate) fn split_eol(line: &[u8]) -> (&[u8], &[u8]) {
    if line.ends_with(b"\r\n") {
        line.split_at(line.len() - 2)
    } else if line.ends_with(b"\n") {
        line.split_at(line.len() - 1)
    } else {
        (line, &[])
    }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn line_buffer_holds_tail() {
        let mut buf = LineBuffer::default();
        let mut lines = Vec::new();
        buf.feed(b"ab", |l| lines.push(l.to_vec()));
        buf.feed(b"c\nde\nf", |l| lines.push(l.to_vec()));
        assert_eq!(vec![b"abc\n".to_vec(), b"de\n".to_vec()], lines);
        buf.finish(|l| lines.push(l.to_vec()));
        assert_eq!(b"f".to_vec(), lines[2]);

        lines.clear();
        buf.finish(|l| lines.push(l.to_vec()));
        assert!(lines.is_empty());
    }

    #[test]
    fn eol_splitting() {
        assert_eq!((&b"a"[..], &b"\r\n"[..]), split_eol(b"a\r\n"));
        assert_eq!((&b"a\r"[..], &b""[..]), split_eol(b"a\r"));
        assert_eq!((&b""[..], &b"\n"[..]), split_eol(b"\n"));
    }
}
