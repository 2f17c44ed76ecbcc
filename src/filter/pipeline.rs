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

use std::io::{self, Read, Write};
use std::mem;

use super::StreamFilter;

type Chain = Vec<Box<dyn StreamFilter>>;

/// Run `data` through every filter of `chain` in order.
///
/// With `last`, each filter is completed with whatever its predecessor
/// emitted on completion.
fn run_chain(chain: &mut Chain, data: &[u8], last: bool) -> Vec<u8> {
    let mut input = data.to_vec();
    let mut output = Vec::new();
    for filter in chain.iter_mut() {
        output.clear();
        if last {
            filter.complete(&input, &mut output);
        } else {
            filter.filter(&input, &mut output);
        }
        mem::swap(&mut input, &mut output);
    }
    input
}

/// Run a complete stream through `chain` in one go.
pub fn filter_all(chain: &mut Chain, data: &[u8]) -> Vec<u8> {
    for filter in chain.iter_mut() {
        filter.reset();
    }
    run_chain(chain, data, true)
}

/// A `Write` which passes everything written through a chain of filters
/// before forwarding it to the inner writer.
///
/// The `finish` method *must* be used to write the final data.
pub struct FilterWriter<W> {
    inner: W,
    chain: Chain,
}

impl<W: Write> FilterWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            chain: Vec::new(),
        }
    }

    /// Append `filter` to the end of the chain.
    pub fn with(mut self, filter: impl StreamFilter + 'static) -> Self {
        self.chain.push(Box::new(filter));
        self
    }

    pub fn push(&mut self, filter: Box<dyn StreamFilter>) {
        self.chain.push(filter);
    }

    /// Complete every filter and return the inner writer.
    pub fn finish(mut self) -> io::Result<W> {
        let tail = run_chain(&mut self.chain, &[], true);
        self.inner.write_all(&tail)?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for FilterWriter<W> {
    fn write(&mut self, src: &[u8]) -> io::Result<usize> {
        let out = run_chain(&mut self.chain, src, false);
        self.inner.write_all(&out)?;
        Ok(src.len())
    }

    /// Flushes the inner writer.
    ///
    /// Data held back by the filters is not affected, since whether it can be
    /// emitted depends on input that has not arrived yet.
    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// A `Read` which passes everything read from the inner reader through a
/// chain of filters.
pub struct FilterReader<R> {
    inner: R,
    chain: Chain,
    pending: Vec<u8>,
    pending_pos: usize,
    eof: bool,
}

const READ_CHUNK: usize = 4096;

impl<R: Read> FilterReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            chain: Vec::new(),
            pending: Vec::new(),
            pending_pos: 0,
            eof: false,
        }
    }

    pub fn with(mut self, filter: impl StreamFilter + 'static) -> Self {
        self.chain.push(Box::new(filter));
        self
    }

    pub fn push(&mut self, filter: Box<dyn StreamFilter>) {
        self.chain.push(filter);
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn fill(&mut self) -> io::Result<()> {
        let mut buf = [0u8; READ_CHUNK];
        while self.pending_pos >= self.pending.len() && !self.eof {
            let nread = match self.inner.read(&mut buf) {
                Ok(n) => n,
                Err(e) if io::ErrorKind::Interrupted == e.kind() => continue,
                Err(e) => return Err(e),
            };

            self.pending_pos = 0;
            if 0 == nread {
                self.eof = true;
                self.pending = run_chain(&mut self.chain, &[], true);
            } else {
                self.pending = run_chain(&mut self.chain, &buf[..nread], false);
            }
        }

        Ok(())
    }
}

impl<R: Read> Read for FilterReader<R> {
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        if dst.is_empty() {
            return Ok(0);
        }

        self.fill()?;
        let available = &self.pending[self.pending_pos..];
        let n = available.len().min(dst.len());
        dst[..n].copy_from_slice(&available[..n]);
        self.pending_pos += n;
        Ok(n)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::filter::{
        CrlfDirection, CrlfFilter, CrlfMode, ToHtmlFilter, ToHtmlFlags,
    };

    #[test]
    fn writer_chains_filters_in_order() {
        let mut writer = FilterWriter::new(Vec::<u8>::new())
            .with(ToHtmlFilter::new(ToHtmlFlags::CONVERT_ADDRESSES))
            .with(CrlfFilter::new(CrlfDirection::Encode, CrlfMode::CrlfOnly));
        for chunk in b"mail bob@foo.com.\nbye".chunks(3) {
            writer.write_all(chunk).unwrap();
        }
        let out = writer.finish().unwrap();
        assert_eq!(
            "mail <a href=\"mailto:bob@foo.com\">bob@foo.com</a>.\r\nbye",
            String::from_utf8(out).unwrap()
        );
    }

    #[test]
    fn reader_matches_writer() {
        let input = b"line one\n.dot line\n\nlast".repeat(500);
        let mut reader = FilterReader::new(&input[..]).with(CrlfFilter::new(
            CrlfDirection::Encode,
            CrlfMode::CrlfDots,
        ));
        let mut via_reader = Vec::new();
        reader.read_to_end(&mut via_reader).unwrap();

        let mut chain: Vec<Box<dyn StreamFilter>> = vec![Box::new(
            CrlfFilter::new(CrlfDirection::Encode, CrlfMode::CrlfDots),
        )];
        assert_eq!(filter_all(&mut chain, &input), via_reader);
        assert!(via_reader.starts_with(b"line one\r\n..dot line\r\n\r\n"));
    }

    #[test]
    fn empty_chain_is_identity() {
        let mut reader = FilterReader::new(&b"abc"[..]);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(b"abc", &out[..]);
    }
}
