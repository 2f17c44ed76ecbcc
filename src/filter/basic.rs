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

//! Decoding of the MIME content transfer encodings.

use super::{split_eol, LineBuffer, StreamFilter};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BasicKind {
    Base64Decode,
    QpDecode,
}

/// Undoes a Content-Transfer-Encoding.
///
/// Both decoders are lenient. Base64 ignores anything that is not in its
/// alphabet. Quoted-printable passes malformed escapes through literally.
#[derive(Clone, Debug)]
pub struct BasicFilter {
    kind: BasicKind,
    /// Base64 bits not yet forming a whole byte.
    acc: u32,
    nbits: u32,
    /// Quoted-printable works a line at a time since soft line breaks and
    /// trailing whitespace are only recognisable at the end of a line.
    lines: LineBuffer,
}

impl BasicFilter {
    pub fn new(kind: BasicKind) -> Self {
        BasicFilter {
            kind,
            acc: 0,
            nbits: 0,
            lines: LineBuffer::default(),
        }
    }

    fn base64(&mut self, input: &[u8], out: &mut Vec<u8>) {
        out.reserve(input.len() * 3 / 4 + 1);
        for &b in input {
            let v = match b {
                b'A'..=b'Z' => b - b'A',
                b'a'..=b'z' => b - b'a' + 26,
                b'0'..=b'9' => b - b'0' + 52,
                b'+' => 62,
                b'/' => 63,
                b'=' => {
                    // Padding ends a group; anything after starts afresh
                    self.acc = 0;
                    self.nbits = 0;
                    continue;
                }
                _ => continue,
            };

            self.acc = (self.acc << 6) | u32::from(v);
            self.nbits += 6;
            if self.nbits >= 8 {
                self.nbits -= 8;
                out.push((self.acc >> self.nbits) as u8);
                self.acc &= (1 << self.nbits) - 1;
            }
        }
    }
}

fn hex(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}

fn qp_line(content: &[u8], out: &mut Vec<u8>) {
    let mut ix = 0;
    while ix < content.len() {
        let b = content[ix];
        if b'=' == b && ix + 2 < content.len() {
            if let (Some(hi), Some(lo)) =
                (hex(content[ix + 1]), hex(content[ix + 2]))
            {
                out.push(hi << 4 | lo);
                ix += 3;
                continue;
            }
        }

        out.push(b);
        ix += 1;
    }
}

fn qp_decode_line(line: &[u8], out: &mut Vec<u8>) {
    let (content, eol) = split_eol(line);
    // RFC 2045 says trailing whitespace was added in transport
    let end = content
        .iter()
        .rposition(|&b| b' ' != b && b'\t' != b)
        .map_or(0, |p| p + 1);
    let content = &content[..end];

    match content.strip_suffix(b"=") {
        Some(content) => qp_line(content, out),
        None => {
            qp_line(content, out);
            out.extend_from_slice(eol);
        }
    }
}

/// Decode the whole of `data` as quoted-printable, without any of the
/// line-oriented rules.
///
/// This is the form used inside RFC 2047 encoded words.
pub fn qp_decode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    qp_line(data, &mut out);
    out
}

impl StreamFilter for BasicFilter {
    fn filter(&mut self, input: &[u8], out: &mut Vec<u8>) {
        match self.kind {
            BasicKind::Base64Decode => self.base64(input, out),
            BasicKind::QpDecode => {
                self.lines.feed(input, |line| qp_decode_line(line, out))
            }
        }
    }

    fn complete(&mut self, input: &[u8], out: &mut Vec<u8>) {
        self.filter(input, out);
        match self.kind {
            // Leftover bits cannot form a byte
            BasicKind::Base64Decode => {
                self.acc = 0;
                self.nbits = 0;
            }
            BasicKind::QpDecode => {
                self.lines.finish(|line| qp_decode_line(line, out))
            }
        }
    }

    fn reset(&mut self) {
        self.acc = 0;
        self.nbits = 0;
        self.lines.clear();
    }
}
