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

const FROM_LINE: &[u8] = b"From ";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FromQuoteMode {
    /// `>*From ` at the start of a line gains a `>`.
    Quote,
    /// `>+From ` at the start of a line loses a `>`.
    Unquote,
}

/// mboxrd `From ` quoting.
///
/// Unlike the original mbox convention, quoting is reversible because lines
/// that already look quoted are quoted again.
#[derive(Clone, Debug)]
pub struct FromQuoteFilter {
    mode: FromQuoteMode,
    at_line_start: bool,
    /// Number of `>` held at the start of the current line.
    held_gt: usize,
    /// Number of bytes of `FROM_LINE` held after those.
    held_from: usize,
}

impl FromQuoteFilter {
    pub fn new(mode: FromQuoteMode) -> Self {
        FromQuoteFilter {
            mode,
            at_line_start: true,
            held_gt: 0,
            held_from: 0,
        }
    }

    fn emit_held(&mut self, out: &mut Vec<u8>, skip_gt: usize) {
        out.extend(
            std::iter::repeat(b'>').take(self.held_gt.saturating_sub(skip_gt)),
        );
        out.extend_from_slice(&FROM_LINE[..self.held_from]);
        self.held_gt = 0;
        self.held_from = 0;
    }

    fn push(&mut self, b: u8, out: &mut Vec<u8>) {
        if self.at_line_start {
            if b'>' == b && 0 == self.held_from {
                self.held_gt += 1;
                return;
            }

            if FROM_LINE[self.held_from] == b {
                self.held_from += 1;
                if FROM_LINE.len() == self.held_from {
                    match self.mode {
                        FromQuoteMode::Quote => {
                            out.push(b'>');
                            self.emit_held(out, 0);
                        }
                        FromQuoteMode::Unquote => self.emit_held(out, 1),
                    }
                    self.at_line_start = false;
                }
                return;
            }

            self.emit_held(out, 0);
            self.at_line_start = false;
        }

        out.push(b);
        if b'\n' == b {
            self.at_line_start = true;
        }
    }
}

impl StreamFilter for FromQuoteFilter {
    fn filter(&mut self, input: &[u8], out: &mut Vec<u8>) {
        out.reserve(input.len());
        for &b in input {
            self.push(b, out);
        }
    }

    fn complete(&mut self, input: &[u8], out: &mut Vec<u8>) {
        self.filter(input, out);
        self.emit_held(out, 0);
    }

    fn reset(&mut self) {
        self.at_line_start = true;
        self.held_gt = 0;
        self.held_from = 0;
    }
}
