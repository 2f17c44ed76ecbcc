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

//! Canonicalisation of text before it is signed or transmitted.

use bitflags::bitflags;

use super::StreamFilter;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct CanonFlags: u32 {
        /// Escape `From ` at the start of a line as `=46rom `.
        const FROM = 1 << 0;
        /// Convert bare `\n` line endings to `\r\n`.
        const CRLF = 1 << 1;
        /// Remove trailing spaces and tabs from each line.
        const STRIP = 1 << 2;
    }
}

const FROM_LINE: &[u8] = b"From ";

/// Performs canonicalisation in a streaming fashion.
///
/// Nothing is buffered except what is needed to make a decision: a possible
/// prefix of `From ` at the start of a line, a run of whitespace that may
/// turn out to be trailing, and a `\r` that may start a line ending.
#[derive(Clone, Debug)]
pub struct CanonFilter {
    flags: CanonFlags,
    at_line_start: bool,
    /// Bytes at the start of the current line which match a prefix of
    /// `FROM_LINE`.
    from_prefix: usize,
    /// With `STRIP`, whitespace not yet known to be followed by something
    /// other than a line ending.
    held_space: Vec<u8>,
    pending_cr: bool,
}

impl CanonFilter {
    pub fn new(flags: CanonFlags) -> Self {
        CanonFilter {
            flags,
            at_line_start: true,
            from_prefix: 0,
            held_space: Vec::new(),
            pending_cr: false,
        }
    }

    fn end_line(&mut self, out: &mut Vec<u8>, had_cr: bool) {
        self.flush_from_prefix(out);
        // Trailing whitespace is dropped here
        self.held_space.clear();
        if had_cr || self.flags.contains(CanonFlags::CRLF) {
            out.extend_from_slice(b"\r\n");
        } else {
            out.push(b'\n');
        }
        self.at_line_start = true;
    }

    fn flush_from_prefix(&mut self, out: &mut Vec<u8>) {
        out.extend_from_slice(&FROM_LINE[..self.from_prefix]);
        self.from_prefix = 0;
    }

    fn flush_pending(&mut self, out: &mut Vec<u8>) {
        self.flush_from_prefix(out);
        out.extend_from_slice(&self.held_space);
        self.held_space.clear();
        if self.pending_cr {
            out.push(b'\r');
            self.pending_cr = false;
        }
    }

    fn push(&mut self, b: u8, out: &mut Vec<u8>) {
        if self.pending_cr {
            self.pending_cr = false;
            if b'\n' == b {
                self.end_line(out, true);
                return;
            }

            out.extend_from_slice(&self.held_space);
            self.held_space.clear();
            out.push(b'\r');
            self.at_line_start = false;
        }

        if self.at_line_start && self.flags.contains(CanonFlags::FROM) {
            if FROM_LINE[self.from_prefix] == b {
                self.from_prefix += 1;
                if FROM_LINE.len() == self.from_prefix {
                    out.extend_from_slice(b"=46rom ");
                    self.from_prefix = 0;
                    self.at_line_start = false;
                }
                return;
            }

            self.flush_from_prefix(out);
        }

        match b {
            b'\n' => self.end_line(out, false),
            b'\r' => self.pending_cr = true,
            b' ' | b'\t' if self.flags.contains(CanonFlags::STRIP) => {
                self.held_space.push(b);
                self.at_line_start = false;
            }
            b => {
                out.extend_from_slice(&self.held_space);
                self.held_space.clear();
                out.push(b);
                self.at_line_start = false;
            }
        }
    }
}

impl StreamFilter for CanonFilter {
    fn filter(&mut self, input: &[u8], out: &mut Vec<u8>) {
        out.reserve(input.len());
        for &b in input {
            self.push(b, out);
        }
    }

    fn complete(&mut self, input: &[u8], out: &mut Vec<u8>) {
        self.filter(input, out);
        // Whitespace at the very end is trailing too
        self.held_space.clear();
        self.flush_pending(out);
    }

    fn reset(&mut self) {
        self.at_line_start = true;
        self.from_prefix = 0;
        self.held_space.clear();
        self.pending_cr = false;
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;
    use crate::filter::test_support::*;

    #[test]
    fn from_munging() {
        assert_chunk_invariant(
            &mut CanonFilter::new(CanonFlags::FROM),
            b"From me\nFrom\nFro\n>From x\n From y\nFrom ",
            b"=46rom me\nFrom\nFro\n>From x\n From y\n=46rom ",
        );
    }

    #[test]
    fn crlf_conversion() {
        assert_chunk_invariant(
            &mut CanonFilter::new(CanonFlags::CRLF),
            b"a\nb\r\nc\rd\n\r",
            b"a\r\nb\r\nc\rd\r\n\r",
        );
    }

    #[test]
    fn strip_trailing_whitespace() {
        assert_chunk_invariant(
            &mut CanonFilter::new(CanonFlags::STRIP),
            b"a  \nb \t c\t\r\n   \nend  ",
            b"a\nb \t c\r\n\nend",
        );
    }

    #[test]
    fn all_flags() {
        assert_chunk_invariant(
            &mut CanonFilter::new(
                CanonFlags::FROM | CanonFlags::CRLF | CanonFlags::STRIP,
            ),
            b"From the start  \nline \r \nFrom",
            b"=46rom the start\r\nline \r\r\nFrom",
        );
    }

    proptest! {
        #[test]
        fn never_panics(
            input in prop::collection::vec(
                prop::sample::select(
                    vec![b'F', b'r', b'o', b'm', b' ', b'\t', b'\r', b'\n']),
                0..200),
            chunk_size in 1usize..=20,
        ) {
            run_chunked(&mut CanonFilter::new(CanonFlags::all()),
                        &input, chunk_size);
        }
    }
}
