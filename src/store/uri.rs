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

//! Store URIs.
//!
//! A store is named by its backing format and the absolute path of its root,
//! e.g. `maildir:///var/mail/me` or `mbox:/home/me/Mail`. Folders within a
//! store are named by appending the folder path as a fragment:
//! `maildir:///var/mail/me#Lists/rust`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use percent_encoding::{
    percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS,
};

use crate::support::error::Error;

/// Characters escaped in the path part of a URI.
const PATH: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'?')
    .add(b'[')
    .add(b']');

/// Characters escaped in a folder fragment. `/` stays literal since it
/// separates the levels of the hierarchy.
const FRAGMENT: &AsciiSet = &PATH.add(b'@');

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scheme {
    Maildir,
    Mh,
    Mbox,
    Spool,
}

impl Scheme {
    pub fn name(self) -> &'static str {
        match self {
            Scheme::Maildir => "maildir",
            Scheme::Mh => "mh",
            Scheme::Mbox => "mbox",
            Scheme::Spool => "spool",
        }
    }
}

impl FromStr for Scheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.to_ascii_lowercase().as_str() {
            "maildir" => Ok(Scheme::Maildir),
            "mh" => Ok(Scheme::Mh),
            "mbox" => Ok(Scheme::Mbox),
            "spool" => Ok(Scheme::Spool),
            _ => Err(Error::UnknownScheme(s.to_owned())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StoreUri {
    pub scheme: Scheme,
    pub path: PathBuf,
}

impl StoreUri {
    pub fn new(scheme: Scheme, path: impl Into<PathBuf>) -> Self {
        StoreUri {
            scheme,
            path: path.into(),
        }
    }

    /// Render the URI of the folder `full_name` within this store.
    pub fn folder_uri(&self, full_name: &str) -> String {
        format!("{}#{}", self, utf8_percent_encode(full_name, FRAGMENT))
    }
}

impl FromStr for StoreUri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let colon =
            s.find(':').ok_or_else(|| Error::BadStoreUri(s.to_owned()))?;
        let scheme: Scheme = s[..colon].parse()?;

        let rest = &s[colon + 1..];
        // `scheme://path` has an empty authority; `scheme:path` has none
        let rest = rest.strip_prefix("//").unwrap_or(rest);
        if rest.contains('#') || rest.contains('?') {
            return Err(Error::BadStoreUri(s.to_owned()));
        }

        let decoded = percent_decode_str(rest)
            .decode_utf8()
            .map_err(|_| Error::BadStoreUri(s.to_owned()))?;
        let path = Path::new(decoded.as_ref());
        if !path.is_absolute() {
            return Err(Error::BadStoreUri(s.to_owned()));
        }

        // Normalise away trailing slashes and `.` components so that
        // equivalent spellings name the same store
        Ok(StoreUri::new(scheme, path.components().collect::<PathBuf>()))
    }
}

impl fmt::Display for StoreUri {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}://{}",
            self.scheme.name(),
            utf8_percent_encode(&self.path.to_string_lossy(), PATH)
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_forms() {
        let uri: StoreUri = "maildir:///tmp/x".parse().unwrap();
        assert_eq!(StoreUri::new(Scheme::Maildir, "/tmp/x"), uri);
        assert_eq!("maildir:///tmp/x", uri.to_string());

        assert_eq!(uri, "maildir:/tmp/x".parse().unwrap());
        assert_eq!(uri, "MailDir:///tmp/./x/".parse().unwrap());

        let uri: StoreUri = "mbox:///home/me/My%20Mail".parse().unwrap();
        assert_eq!(Path::new("/home/me/My Mail"), uri.path);
        assert_eq!("mbox:///home/me/My%20Mail", uri.to_string());
    }

    #[test]
    fn parse_errors() {
        assert_matches!(
            Err(Error::UnknownScheme(_)),
            "imap://host/".parse::<StoreUri>()
        );
        assert_matches!(
            Err(Error::BadStoreUri(_)),
            "/tmp/x".parse::<StoreUri>()
        );
        assert_matches!(
            Err(Error::BadStoreUri(_)),
            "mh:relative/path".parse::<StoreUri>()
        );
        assert_matches!(
            Err(Error::BadStoreUri(_)),
            "mh:///tmp/x#folder".parse::<StoreUri>()
        );
        assert_matches!(
            Err(Error::BadStoreUri(_)),
            "mh:///tmp/%FF".parse::<StoreUri>()
        );
    }

    #[test]
    fn folder_uris() {
        let uri = StoreUri::new(Scheme::Mh, "/tmp/x");
        assert_eq!("mh:///tmp/x#testbox", uri.folder_uri("testbox"));
        assert_eq!("mh:///tmp/x#a/b%20c", uri.folder_uri("a/b c"));
    }
}
