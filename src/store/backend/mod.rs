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

//! The on-disk formats a store can be backed by.
//!
//! A `Backend` manages the namespace of a store. It knows nothing about
//! folder identity or summaries; the `Store` serialises namespace operations
//! and the `Folder` owns the summary. Each open folder holds a
//! `MessageStore`, which is the backend's view of the messages of one
//! folder, addressed by UID.
//!
//! Folder names passed to a backend have already been normalised and
//! validated, and the Inbox is always called `INBOX_NAME`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use super::model::{SystemFlags, Uid};
use super::summary::FolderSummary;
use super::uri::{Scheme, StoreUri};
use crate::support::config::StoreConfig;
use crate::support::error::Error;
use crate::support::file_ops::IgnoreKinds;

mod maildir;
mod mbox;
mod mh;

pub use self::maildir::MaildirBackend;
pub use self::mbox::{MboxBackend, SpoolBackend};
pub use self::mh::MhBackend;

pub const INBOX_NAME: &str = "Inbox";

/// What a `MessageStore` found in storage for one message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScannedMessage {
    pub uid: Uid,
    pub size: u64,
    pub date_received: i64,
    /// The flags recorded in storage, for formats which record them.
    pub flags: Option<SystemFlags>,
}

pub trait Backend: Send + Sync {
    fn has_inbox(&self) -> bool;

    fn folder_exists(&self, full_name: &str) -> bool;

    /// Create the folder `full_name`, creating any missing parents.
    ///
    /// Fails with `FolderExists` if it already exists.
    fn create_folder(&self, full_name: &str) -> Result<(), Error>;

    /// Delete the folder `full_name` and all its messages.
    ///
    /// The caller has established that the folder exists and has no
    /// children.
    fn delete_folder(&self, full_name: &str) -> Result<(), Error>;

    /// Move `old` and all its children to `new`.
    ///
    /// The caller has established that `old` exists and `new` does not.
    fn rename_folder(&self, old: &str, new: &str) -> Result<(), Error>;

    /// List the full names of the immediate children of `parent`, or of the
    /// top level if `parent` is empty. The Inbox is not included.
    fn list_children(&self, parent: &str) -> Result<Vec<String>, Error>;

    /// Return a handle on the messages of `full_name`.
    ///
    /// This does no I/O; the folder need not exist yet.
    fn open(&self, full_name: &str) -> Box<dyn MessageStore>;

    fn summary_path(&self, full_name: &str) -> PathBuf;

    fn index_path(&self, full_name: &str) -> PathBuf;
}

pub trait MessageStore: Send {
    /// Enumerate the messages in storage.
    ///
    /// Messages whose storage already fixes a UID have it reserved in
    /// `summary`; messages without one (for example, ones delivered by
    /// another program) are assigned a fresh UID from `summary` and the
    /// assignment is recorded in storage.
    fn scan(
        &mut self,
        summary: &mut FolderSummary,
    ) -> Result<Vec<ScannedMessage>, Error>;

    fn read(&mut self, uid: Uid) -> Result<Vec<u8>, Error>;

    /// Add a message under `uid`. Returns the stored size.
    fn append(
        &mut self,
        uid: Uid,
        data: &[u8],
        flags: SystemFlags,
    ) -> Result<u64, Error>;

    /// Physically remove the given messages. Messages already gone are
    /// ignored.
    fn remove(&mut self, uids: &[Uid]) -> Result<(), Error>;

    /// Record the current flags of every message in storage, for formats
    /// which record flags.
    fn sync_flags(&mut self, _summary: &FolderSummary) -> Result<(), Error> {
        Ok(())
    }
}

/// Instantiate the backend for `uri`, creating the store root if needed.
pub fn open_backend(
    uri: &StoreUri,
    config: &StoreConfig,
) -> Result<Box<dyn Backend>, Error> {
    match uri.scheme {
        Scheme::Maildir => {
            Ok(Box::new(MaildirBackend::open(&uri.path, config.maildir.fsync)?))
        }
        Scheme::Mh => Ok(Box::new(MhBackend::open(&uri.path)?)),
        Scheme::Mbox => Ok(Box::new(MboxBackend::open(&uri.path)?)),
        Scheme::Spool => Ok(Box::new(SpoolBackend::open(&uri.path)?)),
    }
}

/// Directory in which the store configuration file lives.
pub fn config_dir(uri: &StoreUri) -> &Path {
    match uri.scheme {
        Scheme::Spool => uri.path.parent().unwrap_or_else(|| Path::new("/")),
        _ => &uri.path,
    }
}

pub(super) fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs() as i64)
}

pub(super) fn mtime(path: &Path) -> i64 {
    fs::metadata(path)
        .and_then(|md| md.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or_else(now, |d| d.as_secs() as i64)
}

/// Join the `/`-separated `full_name` onto `root`, mapping each segment
/// through `segment`.
pub(super) fn nested_path(
    root: &Path,
    full_name: &str,
    mut segment: impl FnMut(&str, bool) -> String,
) -> PathBuf {
    let mut path = root.to_owned();
    let mut parts = full_name.split('/').peekable();
    while let Some(part) = parts.next() {
        path.push(segment(part, parts.peek().is_none()));
    }
    path
}

/// Return the parent of `full_name`, or `None` for a top-level name.
pub(super) fn parent_name(full_name: &str) -> Option<&str> {
    full_name.rfind('/').map(|ix| &full_name[..ix])
}

/// Join a child's name onto its parent's full name.
pub(super) fn child_name(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_owned()
    } else {
        format!("{}/{}", parent, name)
    }
}

/// List the names of the entries of `dir` accepted by `keep`, sorted.
///
/// A missing directory has no entries.
pub(super) fn list_dir(
    dir: &Path,
    mut keep: impl FnMut(&str, &fs::DirEntry) -> bool,
) -> Result<Vec<String>, Error> {
    let mut names = Vec::new();
    let entries = match fs::read_dir(dir).map(Some).ignore_not_found()? {
        Some(entries) => entries,
        None => return Ok(names),
    };

    for entry in entries {
        let entry = entry?;
        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            // Not something we could have created
            Err(_) => continue,
        };
        if crate::support::safe_name::is_safe_name(&name) && keep(&name, &entry)
        {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn name_helpers() {
        assert_eq!(None, parent_name("a"));
        assert_eq!(Some("a/b"), parent_name("a/b/c"));
        assert_eq!("c", child_name("", "c"));
        assert_eq!("a/c", child_name("a", "c"));
        assert_eq!(
            Path::new("/r/a.d/b.d/c"),
            nested_path(Path::new("/r"), "a/b/c", |s, last| if last {
                s.to_owned()
            } else {
                format!("{}.d", s)
            })
        );
    }
}
