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

use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("No such folder")]
    NxFolder,
    #[error("No such message")]
    NxMessage,
    #[error("No such store")]
    NxStore,
    #[error("Folder already exists")]
    FolderExists,
    #[error("Folder has subfolders")]
    HasChildren,
    #[error("Folder was deleted or renamed while open")]
    FolderInvalidated,
    #[error("Store has no inbox")]
    NoInbox,
    #[error("Operation not supported: {0}")]
    Unsupported(&'static str),
    #[error("Unsafe folder name")]
    UnsafeName,
    #[error("Unknown store scheme: {0}")]
    UnknownScheme(String),
    #[error("Malformed store URI: {0}")]
    BadStoreUri(String),
    #[error("Unknown or unsupported charset: {0}")]
    UnknownCharset(String),
    #[error("Malformed search expression: {0}")]
    MalformedQuery(String),
    #[error("Gave up allocating a UID")]
    GaveUpInsertion,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Cbor(#[from] serde_cbor::error::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether this error indicates that something the caller named does not
    /// exist.
    pub fn is_not_found(&self) -> bool {
        match *self {
            Error::NxFolder | Error::NxMessage | Error::NxStore => true,
            Error::Io(ref e) => io::ErrorKind::NotFound == e.kind(),
            _ => false,
        }
    }
}
