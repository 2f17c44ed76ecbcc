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

//! Constants from `sysexits.h`, used as the exit statuses of the command-line
//! wrapper.
#![allow(dead_code)]

use super::error::Error;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Sysexit(pub i32);

pub const EX_OK: Sysexit = Sysexit(0);
pub const EX_USAGE: Sysexit = Sysexit(64);
pub const EX_DATAERR: Sysexit = Sysexit(65);
pub const EX_NOINPUT: Sysexit = Sysexit(66);
pub const EX_UNAVAILABLE: Sysexit = Sysexit(69);
pub const EX_SOFTWARE: Sysexit = Sysexit(70);
pub const EX_CANTCREAT: Sysexit = Sysexit(73);
pub const EX_IOERR: Sysexit = Sysexit(74);
pub const EX_TEMPFAIL: Sysexit = Sysexit(75);
pub const EX_CONFIG: Sysexit = Sysexit(78);

impl Sysexit {
    pub fn exit(self) -> ! {
        std::process::exit(self.0)
    }
}

impl<'a> From<&'a Error> for Sysexit {
    fn from(e: &'a Error) -> Self {
        match *e {
            Error::NxFolder | Error::NxMessage | Error::NxStore => EX_NOINPUT,
            Error::FolderExists | Error::HasChildren => EX_CANTCREAT,
            Error::FolderInvalidated | Error::GaveUpInsertion => EX_TEMPFAIL,
            Error::NoInbox | Error::Unsupported(..) => EX_UNAVAILABLE,
            Error::UnsafeName
            | Error::UnknownScheme(..)
            | Error::BadStoreUri(..)
            | Error::UnknownCharset(..)
            | Error::MalformedQuery(..) => EX_USAGE,
            Error::Cbor(..) => EX_DATAERR,
            Error::Toml(..) => EX_CONFIG,
            Error::Io(..) => EX_IOERR,
        }
    }
}
