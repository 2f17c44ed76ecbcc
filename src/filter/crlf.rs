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

use super::StreamFilter;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CrlfDirection {
    /// `\n` becomes `\r\n`.
    Encode,
    /// `\r\n` becomes `\n`.
    Decode,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CrlfMode {
    CrlfOnly,
    /// Also stuff (when encoding) or unstuff (when decoding) a `.` at the
    /// start of each line, as done on the SMTP, POP and NNTP wire.
    CrlfDots,
}

/// Converts between UNIX and network line endings.
///
/// Encoding does not look at existing `\r` characters at all, so encoding
/// followed by decoding is the identity on any input, including input that
/// already had CRLF line endings or stray CRs.
#[derive(Clone, Debug)]
pub struct CrlfFilter {
    direction: CrlfDirection,
    mode: CrlfMode,
    /// Whether the next byte starts a line.
    at_line_start: bool,
    /// When decoding, a `\r` that may be the first half of a line ending.
    pending_cr: bool,
}

impl CrlfFilter {
    pub fn new(direction: CrlfDirection, mode: CrlfMode) -> Self {
        CrlfFilter {
            direction,
            mode,
            at_line_start: true,
            pending_cr: false,
        }
    }

    fn dots(&self) -> bool {
        CrlfMode::CrlfDots == self.mode
    }

    fn encode(&mut self, input: &[u8], out: &mut Vec<u8>) {
        out.reserve(input.len() + input.len() / 32 + 2);
        for &b in input {
            match b {
                b'\n' => {
                    out.extend_from_slice(b"\r\n");
                    self.at_line_start = true;
                }
                b'.' if self.at_line_start && self.dots() => {
                    out.extend_from_slice(b"..");
                    self.at_line_start = false;
                }
                b => {
                    out.push(b);
                    self.at_line_start = false;
                }
            }
        }
    }

    fn decode(&mut self, input: &[u8], out: &mut Vec<u8>) {
        out.reserve(input.len());
        for &b in input {
            if self.pending_cr {
                self.pending_cr = false;
                if b'\n' == b {
                    out.push(b'\n');
                    self.at_line_start = true;
                    continue;
                }

                out.push(b'\r');
                self.at_line_start = false;
            }

            match b {
                b'\r' => self.pending_cr = true,
                b'.' if self.at_line_start && self.dots() => {
                    // Drop the stuffed dot
                    self.at_line_start = false;
                }
                b => {
                    out.push(b);
                    self.at_line_start = b'\n' == b;
                }
            }
        }
    }
}

impl StreamFilter for CrlfFilter {
    fn filter(&mut self, input: &[u8], out: &mut Vec<u8>) {
        match self.direction {
            CrlfDirection::Encode => self.encode(input, out),
            CrlfDirection::Decode => self.decode(input, out),
        }
    }

    fn complete(&mut self, input: &[u8], out: &mut Vec<u8>) {
        self.filter(input, out);
        if self.pending_cr {
            out.push(b'\r');
            self.pending_cr = false;
        }
    }

    fn reset(&mut self) {
        self.at_line_start = true;
        self.pending_cr = false;
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;
    use crate::filter::test_support::*;

    fn filter(direction: CrlfDirection, mode: CrlfMode) -> CrlfFilter {
        CrlfFilter::new(direction, mode)
    }

    #[test]
    fn encode_plain() {
        assert_chunk_invariant(
            &mut filter(CrlfDirection::Encode, CrlfMode::CrlfOnly),
            b"a\nb\n\n.c\n",
            b"a\r\nb\r\n\r\n.c\r\n",
        );
    }

    #[test]
    fn encode_dots() {
        assert_chunk_invariant(
            &mut filter(CrlfDirection::Encode, CrlfMode::CrlfDots),
            b".start\nmid.dle\n..two\n.\n",
            b"..start\r\nmid.dle\r\n...two\r\n..\r\n",
        );
    }

    #[test]
    fn decode_plain() {
        assert_chunk_invariant(
            &mut filter(CrlfDirection::Decode, CrlfMode::CrlfOnly),
            b"a\r\nb\rc\r\r\n.d\r",
            b"a\nb\rc\r\n.d\r",
        );
    }

    #[test]
    fn decode_dots() {
        assert_chunk_invariant(
            &mut filter(CrlfDirection::Decode, CrlfMode::CrlfDots),
            b"..start\r\nmid.dle\r\n...two\r\n.\r\n",
            b".start\nmid.dle\n..two\n\n",
        );
    }

    #[test]
    fn reset_forgets_state() {
        let mut f = filter(CrlfDirection::Decode, CrlfMode::CrlfDots);
        let mut out = Vec::new();
        f.filter(b"x\r", &mut out);
        f.reset();
        f.complete(b".y", &mut out);
        assert_eq!(b"xy", &out[..]);
    }

    proptest! {
        #[test]
        fn encode_decode_identity(
            input in prop::collection::vec(
                prop::sample::select(vec![b'a', b'.', b'\r', b'\n', b' ']),
                0..200),
            chunk_size in 1usize..=20,
            dots in any::<bool>(),
        ) {
            let mode = if dots {
                CrlfMode::CrlfDots
            } else {
                CrlfMode::CrlfOnly
            };
            let encoded = run_chunked(
                &mut filter(CrlfDirection::Encode, mode), &input, chunk_size);
            let decoded = run_chunked(
                &mut filter(CrlfDirection::Decode, mode), &encoded, chunk_size);
            prop_assert_eq!(input, decoded);
        }

        #[test]
        fn decode_never_panics(
            input in prop::collection::vec(any::<u8>(), 0..200),
            chunk_size in 1usize..=20,
        ) {
            run_chunked(
                &mut filter(CrlfDirection::Decode, CrlfMode::CrlfDots),
                &input, chunk_size);
        }
    }
}
