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

use super::{split_eol, LineBuffer, StreamFilter};

/// Removes every occurrence of one header from a message.
///
/// Continuation lines go with the header they continue. Everything from the
/// blank line ending the header block onwards passes through untouched.
#[derive(Clone, Debug)]
pub struct HeaderStripFilter {
    name: String,
    lines: LineBuffer,
    in_body: bool,
    stripping: bool,
}

impl HeaderStripFilter {
    pub fn new(name: &str) -> Self {
        HeaderStripFilter {
            name: name.trim().to_owned(),
            lines: LineBuffer::default(),
            in_body: false,
            stripping: false,
        }
    }

    fn header_line(&mut self, line: &[u8], out: &mut Vec<u8>) {
        if self.in_body {
            out.extend_from_slice(line);
            return;
        }

        let (content, _) = split_eol(line);
        if content.is_empty() {
            self.in_body = true;
            self.stripping = false;
            out.extend_from_slice(line);
            return;
        }

        if b' ' != content[0] && b'\t' != content[0] {
            self.stripping = content
                .iter()
                .position(|&b| b':' == b)
                .map(|colon| {
                    let name = &content[..colon];
                    let name = name
                        .iter()
                        .rposition(|&b| b' ' != b && b'\t' != b)
                        .map_or(&name[..0], |end| &name[..=end]);
                    name.eq_ignore_ascii_case(self.name.as_bytes())
                })
                .unwrap_or(false);
        }

        if !self.stripping {
            out.extend_from_slice(line);
        }
    }
}

impl StreamFilter for HeaderStripFilter {
    fn filter(&mut self, input: &[u8], out: &mut Vec<u8>) {
        if self.in_body {
            out.extend_from_slice(input);
            return;
        }

        let mut lines = std::mem::take(&mut self.lines);
        lines.feed(input, |line| self.header_line(line, out));
        // Once the body starts nothing needs to be held any more
        if self.in_body {
            lines.finish(|line| out.extend_from_slice(line));
        }
        self.lines = lines;
    }

    fn complete(&mut self, input: &[u8], out: &mut Vec<u8>) {
        self.filter(input, out);
        let mut lines = std::mem::take(&mut self.lines);
        lines.finish(|line| self.header_line(line, out));
        self.lines = lines;
    }

    fn reset(&mut self) {
        self.lines.clear();
        self.in_body = false;
        self.stripping = false;
    }
}
