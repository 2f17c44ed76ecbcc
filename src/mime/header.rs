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

//! Utilities for working with individual RFC 5322 headers.

use std::str;

use chrono::prelude::*;
use nom::{
    branch::alt,
    bytes::complete::{
        is_a, is_not, tag, tag_no_case, take_while1, take_while_m_n,
    },
    character::complete::char,
    combinator::{map, opt, value},
    multi::many0_count,
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

/// A single header, as it appeared in the message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    /// The header name, without the colon.
    pub name: String,
    /// The raw value, everything after the colon up to but excluding the
    /// final line ending. Folded lines keep their embedded line endings.
    pub raw: Vec<u8>,
}

impl Header {
    pub fn new(name: &str, value: &str) -> Self {
        let mut raw = Vec::with_capacity(value.len() + 1);
        raw.push(b' ');
        raw.extend_from_slice(value.as_bytes());
        Header {
            name: name.to_owned(),
            raw,
        }
    }

    /// Whether this header is named `name`, ignoring ASCII case.
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Return the unfolded value with surrounding whitespace removed.
    ///
    /// Invalid UTF-8 is replaced.
    pub fn value(&self) -> String {
        unfold(&self.raw)
    }
}

/// Unfold a raw header value and trim it.
pub fn unfold(raw: &[u8]) -> String {
    let mut out = Vec::with_capacity(raw.len());
    for &b in raw {
        if b'\r' != b && b'\n' != b {
            out.push(b);
        }
    }
    String::from_utf8_lossy(&out).trim().to_owned()
}

/// Split `data` into its header block and the body.
///
/// Returns the parsed headers and the offset of the first byte of the body.
/// Lines in the header block which are neither headers nor continuations are
/// skipped. If there is no blank line, the whole input is treated as headers
/// and the body is empty.
pub fn split_headers(data: &[u8]) -> (Vec<Header>, usize) {
    let mut headers: Vec<Header> = Vec::new();
    let mut pos = 0;

    while pos < data.len() {
        let eol = memchr::memchr(b'\n', &data[pos..])
            .map(|ix| pos + ix + 1)
            .unwrap_or(data.len());
        let line = &data[pos..eol];
        let content = trim_eol(line);

        if content.is_empty() {
            return (headers, eol);
        }

        if b' ' == content[0] || b'\t' == content[0] {
            if let Some(last) = headers.last_mut() {
                last.raw.push(b'\n');
                last.raw.extend_from_slice(content);
            }
        } else if let Some(colon) = memchr::memchr(b':', content) {
            let name = str::from_utf8(&content[..colon])
                .ok()
                .map(str::trim_end)
                .filter(|n| !n.is_empty() && !n.contains(' '));
            if let Some(name) = name {
                headers.push(Header {
                    name: name.to_owned(),
                    raw: content[colon + 1..].to_vec(),
                });
            }
        }

        pos = eol;
    }

    (headers, data.len())
}

pub(crate) fn trim_eol(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Extract the value of the named parameter from a structured header such as
/// `Content-Type`.
pub fn parameter(value: &str, name: &str) -> Option<String> {
    for part in value.split(';').skip(1) {
        let (k, v) = match part.split_once('=') {
            Some(kv) => kv,
            None => continue,
        };
        if k.trim().eq_ignore_ascii_case(name) {
            let v = v.trim();
            let v = v
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(v);
            return Some(v.to_owned());
        }
    }

    None
}

/// Return the lower-cased media type (e.g. `text/plain`) of a `Content-Type`
/// value.
pub fn media_type(value: &str) -> String {
    value
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

fn ascii_digit(b: u8) -> bool {
    b.is_ascii_digit()
}

// RFC 5322 3.2.2 "Folding white space" and comments. The line-ending
// characters are treated as simple whitespace since unfolding has already
// been done or is harmless here.
fn fws(i: &[u8]) -> IResult<&[u8], ()> {
    value((), is_a(" \t\r\n"))(i)
}

fn comment(i: &[u8]) -> IResult<&[u8], ()> {
    value(
        (),
        delimited(
            char('('),
            many0_count(alt((value((), is_not("()\\")), value((), comment)))),
            char(')'),
        ),
    )(i)
}

fn cfws(i: &[u8]) -> IResult<&[u8], ()> {
    value((), many0_count(alt((fws, comment))))(i)
}

fn number(min: usize, max: usize) -> impl Fn(&[u8]) -> IResult<&[u8], u32> {
    move |i| {
        map(take_while_m_n(min, max, ascii_digit), |s: &[u8]| {
            // Infallible since we know s is [0-9]{min,max} with max <= 4
            s.iter().fold(0u32, |acc, &d| acc * 10 + u32::from(d - b'0'))
        })(i)
    }
}

fn year(i: &[u8]) -> IResult<&[u8], i32> {
    map(take_while_m_n(2, 4, ascii_digit), |s: &[u8]| {
        let mut y = s
            .iter()
            .fold(0i32, |acc, &d| acc * 10 + i32::from(d - b'0'));
        // Y2K compliance workarounds described by RFC 5322 4.3
        if s.len() == 2 && y < 50 {
            y += 2000;
        } else if s.len() < 4 {
            y += 1900;
        }
        y
    })(i)
}

fn month(i: &[u8]) -> IResult<&[u8], u32> {
    alt((
        value(1, tag_no_case("jan")),
        value(2, tag_no_case("feb")),
        value(3, tag_no_case("mar")),
        value(4, tag_no_case("apr")),
        value(5, tag_no_case("may")),
        value(6, tag_no_case("jun")),
        value(7, tag_no_case("jul")),
        value(8, tag_no_case("aug")),
        value(9, tag_no_case("sep")),
        value(10, tag_no_case("oct")),
        value(11, tag_no_case("nov")),
        value(12, tag_no_case("dec")),
    ))(i)
}

fn numeric_zone(i: &[u8]) -> IResult<&[u8], i32> {
    map(
        pair(alt((char('+'), char('-'))), number(4, 4)),
        |(sign, n)| {
            let minutes = (n / 100 * 60 + n % 100) as i32;
            if '-' == sign {
                -minutes
            } else {
                minutes
            }
        },
    )(i)
}

fn zone(i: &[u8]) -> IResult<&[u8], i32> {
    alt((
        numeric_zone,
        value(0, alt((tag_no_case("ut"), tag_no_case("gmt")))),
        value(-4 * 60, tag_no_case("edt")),
        value(-5 * 60, alt((tag_no_case("est"), tag_no_case("cdt")))),
        value(-6 * 60, alt((tag_no_case("cst"), tag_no_case("mdt")))),
        value(-7 * 60, alt((tag_no_case("mst"), tag_no_case("pdt")))),
        value(-8 * 60, tag_no_case("pst")),
        // Military and unrecognised zones must be treated as UTC
        value(0, take_while1(|b: u8| b.is_ascii_alphabetic())),
    ))(i)
}

fn day_of_week(i: &[u8]) -> IResult<&[u8], ()> {
    value(
        (),
        tuple((
            take_while1(|b: u8| b.is_ascii_alphabetic()),
            opt(cfws),
            char(','),
        )),
    )(i)
}

fn date_time(i: &[u8]) -> IResult<&[u8], Option<DateTime<FixedOffset>>> {
    map(
        tuple((
            preceded(opt(cfws), opt(terminated(day_of_week, opt(cfws)))),
            terminated(number(1, 2), opt(cfws)),
            terminated(month, opt(cfws)),
            terminated(year, opt(cfws)),
            terminated(number(2, 2), tuple((opt(cfws), tag(":"), opt(cfws)))),
            terminated(number(2, 2), opt(cfws)),
            opt(preceded(pair(tag(":"), opt(cfws)), number(2, 2))),
            delimited(opt(cfws), opt(zone), opt(cfws)),
        )),
        |(_, d, mon, y, h, min, s, zone)| {
            let offset = FixedOffset::east_opt(zone.unwrap_or(0) * 60)?;
            offset
                .with_ymd_and_hms(y, mon, d, h, min, s.unwrap_or(0))
                .single()
        },
    )(i)
}

/// Parse an RFC 5322 date, including the obsolete syntax.
///
/// Returns `None` if the value cannot be understood.
pub fn parse_datetime(value: &str) -> Option<DateTime<FixedOffset>> {
    date_time(value.trim().as_bytes()).ok().and_then(|(_, dt)| dt)
}

/// Format a UNIX timestamp as an RFC 5322 date in the given offset, in
/// minutes east of UTC.
pub fn format_datetime(timestamp: i64, offset_minutes: i32) -> String {
    FixedOffset::east_opt(offset_minutes * 60)
        .or_else(|| FixedOffset::east_opt(0))
        .and_then(|offset| offset.timestamp_opt(timestamp, 0).single())
        .map(|dt| dt.to_rfc2822())
        .unwrap_or_default()
}
