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

use std::fmt;
use std::str;

use encoding_rs::{CoderResult, Decoder, Encoder, EncoderResult, Encoding};

use super::StreamFilter;
use crate::support::error::Error;

/// Converts text from one character set to another.
///
/// Input that is invalid in the source charset becomes U+FFFD; characters
/// which cannot be represented in the destination charset become `?`. A
/// multi-byte sequence split across chunks is carried over by the decoder,
/// and an incomplete one at the end of the stream becomes U+FFFD (or `?`).
pub struct CharsetFilter {
    from: &'static Encoding,
    to: &'static Encoding,
    decoder: Decoder,
    encoder: Encoder,
    utf8: Vec<u8>,
}

impl fmt::Debug for CharsetFilter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CharsetFilter")
            .field("from", &self.from.name())
            .field("to", &self.to.name())
            .finish()
    }
}

impl CharsetFilter {
    /// Create a filter converting from the charset labelled `from` to the one
    /// labelled `to`.
    ///
    /// Fails with `UnknownCharset` if either label is not recognised, or with
    /// `Unsupported` if `to` is a charset that cannot be encoded into (the
    /// UTF-16 variants).
    pub fn new(from: &str, to: &str) -> Result<Self, Error> {
        let from = lookup(from)?;
        let to = lookup(to)?;
        if to.output_encoding() != to {
            return Err(Error::Unsupported("encoding into UTF-16"));
        }

        Ok(CharsetFilter {
            from,
            to,
            decoder: from.new_decoder_without_bom_handling(),
            encoder: to.new_encoder(),
            utf8: Vec::new(),
        })
    }

    fn convert(&mut self, input: &[u8], out: &mut Vec<u8>, last: bool) {
        // The decoder can always handle the whole chunk when given its
        // maximum buffer size.
        let max = self
            .decoder
            .max_utf8_buffer_length(input.len())
            .unwrap_or(input.len() * 3 + 16);
        self.utf8.resize(max, 0);
        let (status, _nread, nwritten, _) =
            self.decoder.decode_to_utf8(input, &mut self.utf8, last);
        debug_assert_eq!(CoderResult::InputEmpty, status);

        // Contents of a decoder's output are always valid UTF-8
        let decoded = str::from_utf8(&self.utf8[..nwritten]).unwrap_or("");

        if encoding_rs::UTF_8 == self.to {
            out.extend_from_slice(decoded.as_bytes());
        } else {
            encode_lossy(&mut self.encoder, decoded, out, last);
        }
    }
}

fn lookup(label: &str) -> Result<&'static Encoding, Error> {
    Encoding::for_label_no_replacement(label.trim().as_bytes())
        .ok_or_else(|| Error::UnknownCharset(label.to_owned()))
}

fn encode_lossy(
    encoder: &mut Encoder,
    mut src: &str,
    out: &mut Vec<u8>,
    last: bool,
) {
    loop {
        let start = out.len();
        let max = encoder
            .max_buffer_length_from_utf8_without_replacement(src.len())
            .unwrap_or(src.len() * 4 + 16);
        out.resize(start + max.max(16), 0);

        let (result, nread, nwritten) = encoder
            .encode_from_utf8_without_replacement(src, &mut out[start..], last);
        out.truncate(start + nwritten);
        src = &src[nread..];

        match result {
            EncoderResult::InputEmpty => return,
            EncoderResult::OutputFull => continue,
            EncoderResult::Unmappable(_) => out.push(b'?'),
        }
    }
}

impl StreamFilter for CharsetFilter {
    fn filter(&mut self, input: &[u8], out: &mut Vec<u8>) {
        self.convert(input, out, false);
    }

    fn complete(&mut self, input: &[u8], out: &mut Vec<u8>) {
        self.convert(input, out, true);
    }

    fn reset(&mut self) {
        self.decoder = self.from.new_decoder_without_bom_handling();
        self.encoder = self.to.new_encoder();
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;
    use crate::filter::test_support::*;

    #[test]
    fn latin1_to_utf8() {
        assert_chunk_invariant(
            &mut CharsetFilter::new("iso-8859-1", "utf-8").unwrap(),
            b"caf\xE9 cr\xE8me",
            "café crème".as_bytes(),
        );
    }

    #[test]
    fn utf8_split_across_chunks() {
        assert_chunk_invariant(
            &mut CharsetFilter::new("utf-8", "iso-8859-1").unwrap(),
            "ünïcödé".as_bytes(),
            b"\xFCn\xEFc\xF6d\xE9",
        );
    }

    #[test]
    fn unmappable_becomes_question_mark() {
        assert_chunk_invariant(
            &mut CharsetFilter::new("utf-8", "iso-8859-1").unwrap(),
            "a→b郵c".as_bytes(),
            b"a?b?c",
        );
    }

    #[test]
    fn stateful_encodings() {
        let text = "a郵便b 切手c";
        let mut encoder = CharsetFilter::new("utf-8", "iso-2022-jp").unwrap();
        let encoded = run_chunked(&mut encoder, text.as_bytes(), 4096);
        assert!(encoded.is_ascii());
        assert!(encoded.ends_with(b"c"));
        assert_chunk_invariant(&mut encoder, text.as_bytes(), &encoded);
        assert_chunk_invariant(
            &mut CharsetFilter::new("iso-2022-jp", "utf-8").unwrap(),
            &encoded,
            text.as_bytes(),
        );
    }

    #[test]
    fn invalid_input_is_replaced() {
        assert_chunk_invariant(
            &mut CharsetFilter::new("utf-8", "utf-8").unwrap(),
            b"a\xFFb\xE2\x82",
            "a\u{FFFD}b\u{FFFD}".as_bytes(),
        );
    }

    #[test]
    fn bad_charsets() {
        assert_matches!(
            Err(Error::UnknownCharset(..)),
            CharsetFilter::new("x-klingon", "utf-8")
        );
        assert_matches!(
            Err(Error::UnknownCharset(..)),
            CharsetFilter::new("utf-8", "iso-2022-kr")
        );
        assert_matches!(
            Err(Error::Unsupported(..)),
            CharsetFilter::new("utf-8", "utf-16le")
        );
    }

    proptest! {
        #[test]
        fn latin1_round_trip(
            s in "[\\u{20}-\\u{7e}\\u{a0}-\\u{ff}\n]{0,100}",
            chunk_size in 1usize..=20,
        ) {
            let latin1 = run_chunked(
                &mut CharsetFilter::new("utf-8", "iso-8859-1").unwrap(),
                s.as_bytes(), chunk_size);
            let utf8 = run_chunked(
                &mut CharsetFilter::new("iso-8859-1", "utf-8").unwrap(),
                &latin1, chunk_size);
            prop_assert_eq!(s.as_bytes(), &utf8[..]);
        }

        #[test]
        fn shift_jis_round_trip(
            s in "[a-z あ-ん ア-ン]{0,40}",
            chunk_size in 1usize..=20,
        ) {
            let sjis = run_chunked(
                &mut CharsetFilter::new("utf-8", "shift_jis").unwrap(),
                s.as_bytes(), chunk_size);
            let utf8 = run_chunked(
                &mut CharsetFilter::new("shift_jis", "utf-8").unwrap(),
                &sjis, chunk_size);
            prop_assert_eq!(s.as_bytes(), &utf8[..]);
        }

        #[test]
        fn never_panics(
            input in prop::collection::vec(any::<u8>(), 0..200),
            chunk_size in 1usize..=20,
        ) {
            run_chunked(
                &mut CharsetFilter::new("gb18030", "windows-1252").unwrap(),
                &input, chunk_size);
        }
    }
}
