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

//! Maildir stores.
//!
//! The store root is itself a maildir and serves as the Inbox. Every other
//! folder is a maildir nested below the root following the folder hierarchy,
//! so `Lists/rust` lives in `<root>/Lists/rust/{cur,new,tmp}`.
//!
//! Messages are kept in `cur` under the name `<uid>.letterbox:2,<flags>`.
//! Files with any other name, in `cur` or `new`, were put there by someone
//! else; they are assigned a UID and renamed when the folder is scanned.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use super::*;
use crate::support::file_ops::{ErrorTransforms, IgnoreKinds};

const SUMMARY_FILE: &str = ".letterbox-summary";
const INDEX_FILE: &str = ".letterbox-index";
const NAME_TAG: &str = ".letterbox";
const INFO_SEPARATOR: &str = ":2,";

pub struct MaildirBackend {
    root: PathBuf,
    fsync: bool,
}

impl MaildirBackend {
    pub fn open(root: &Path, fsync: bool) -> Result<Self, Error> {
        make_maildir(root)?;
        Ok(MaildirBackend {
            root: root.to_owned(),
            fsync,
        })
    }

    fn folder_dir(&self, full_name: &str) -> PathBuf {
        if INBOX_NAME == full_name || full_name.is_empty() {
            self.root.clone()
        } else {
            nested_path(&self.root, full_name, |s, _| s.to_owned())
        }
    }

    fn create_parents(&self, full_name: &str) -> Result<(), Error> {
        let mut prefix = String::new();
        let mut parts = full_name.split('/').peekable();
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                break;
            }
            prefix = child_name(&prefix, part);
            make_maildir(&self.folder_dir(&prefix))?;
        }
        Ok(())
    }
}

fn make_maildir(dir: &Path) -> Result<(), Error> {
    for sub in &["cur", "new", "tmp"] {
        fs::create_dir_all(dir.join(sub))?;
    }
    Ok(())
}

fn is_maildir(dir: &Path) -> bool {
    dir.join("cur").is_dir()
}

impl Backend for MaildirBackend {
    fn has_inbox(&self) -> bool {
        true
    }

    fn folder_exists(&self, full_name: &str) -> bool {
        is_maildir(&self.folder_dir(full_name))
    }

    fn create_folder(&self, full_name: &str) -> Result<(), Error> {
        if self.folder_exists(full_name) {
            return Err(Error::FolderExists);
        }

        self.create_parents(full_name)?;
        make_maildir(&self.folder_dir(full_name))
    }

    fn delete_folder(&self, full_name: &str) -> Result<(), Error> {
        fs::remove_dir_all(self.folder_dir(full_name))
            .on_not_found(Error::NxFolder)
    }

    fn rename_folder(&self, old: &str, new: &str) -> Result<(), Error> {
        self.create_parents(new)?;
        fs::rename(self.folder_dir(old), self.folder_dir(new))
            .on_not_found(Error::NxFolder)
    }

    fn list_children(&self, parent: &str) -> Result<Vec<String>, Error> {
        let dir = self.folder_dir(parent);
        Ok(list_dir(&dir, |name, entry| {
            entry.file_type().map_or(false, |t| t.is_dir())
                && is_maildir(&dir.join(name))
        })?
        .into_iter()
        .map(|name| child_name(parent, &name))
        .collect())
    }

    fn open(&self, full_name: &str) -> Box<dyn MessageStore> {
        Box::new(MaildirMessages {
            dir: self.folder_dir(full_name),
            fsync: self.fsync,
            files: HashMap::new(),
        })
    }

    fn summary_path(&self, full_name: &str) -> PathBuf {
        self.folder_dir(full_name).join(SUMMARY_FILE)
    }

    fn index_path(&self, full_name: &str) -> PathBuf {
        self.folder_dir(full_name).join(INDEX_FILE)
    }
}

struct MaildirMessages {
    dir: PathBuf,
    fsync: bool,
    /// The current file name in `cur` of each known message.
    files: HashMap<Uid, String>,
}

fn flags_to_info(flags: SystemFlags) -> String {
    let mut info = String::new();
    // Maildir requires the letters in ASCII order
    for &(letter, flag) in &[
        ('D', SystemFlags::DRAFT),
        ('F', SystemFlags::FLAGGED),
        ('R', SystemFlags::ANSWERED),
        ('S', SystemFlags::SEEN),
        ('T', SystemFlags::DELETED),
    ] {
        if flags.contains(flag) {
            info.push(letter);
        }
    }
    info
}

fn info_to_flags(info: &str) -> SystemFlags {
    let mut flags = SystemFlags::empty();
    for c in info.chars() {
        flags |= match c {
            'D' => SystemFlags::DRAFT,
            'F' => SystemFlags::FLAGGED,
            'R' => SystemFlags::ANSWERED,
            'S' => SystemFlags::SEEN,
            'T' => SystemFlags::DELETED,
            _ => SystemFlags::empty(),
        };
    }
    flags
}

fn file_name(uid: Uid, flags: SystemFlags) -> String {
    format!("{}{}{}{}", uid, NAME_TAG, INFO_SEPARATOR, flags_to_info(flags))
}

/// Split a maildir file name into the UID (if it is one of ours) and the
/// flags from its info suffix.
fn parse_file_name(name: &str) -> (Option<Uid>, SystemFlags) {
    let (base, flags) = match name.find(INFO_SEPARATOR) {
        Some(ix) => (
            &name[..ix],
            info_to_flags(&name[ix + INFO_SEPARATOR.len()..]),
        ),
        None => (name, SystemFlags::empty()),
    };

    let uid = base
        .strip_suffix(NAME_TAG)
        .and_then(|uid| uid.parse::<Uid>().ok());
    (uid, flags)
}

impl MaildirMessages {
    fn cur(&self) -> PathBuf {
        self.dir.join("cur")
    }

    fn list(&self, sub: &str) -> Result<Vec<String>, Error> {
        let mut names = Vec::new();
        let entries = match fs::read_dir(self.dir.join(sub))
            .map(Some)
            .ignore_not_found()?
        {
            Some(entries) => entries,
            None => return Ok(names),
        };

        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string() {
                if !name.starts_with('.') {
                    names.push(name);
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

impl MessageStore for MaildirMessages {
    fn scan(
        &mut self,
        summary: &mut FolderSummary,
    ) -> Result<Vec<ScannedMessage>, Error> {
        self.files.clear();
        let mut foreign: Vec<(PathBuf, SystemFlags)> = Vec::new();

        for name in self.list("cur")? {
            match parse_file_name(&name) {
                (Some(uid), _) if !self.files.contains_key(&uid) => {
                    summary.reserve_uid(uid);
                    self.files.insert(uid, name);
                }
                (_, flags) => foreign.push((self.cur().join(name), flags)),
            }
        }
        for name in self.list("new")? {
            let flags = parse_file_name(&name).1;
            foreign.push((self.dir.join("new").join(name), flags));
        }

        for (path, flags) in foreign {
            let uid = summary.allocate_uid()?;
            let name = file_name(uid, flags);
            match fs::rename(&path, self.cur().join(&name)) {
                Ok(()) => {
                    debug!("Adopted {} as UID {}", path.display(), uid);
                    self.files.insert(uid, name);
                }
                // Someone else took it in the meantime
                Err(e) if std::io::ErrorKind::NotFound == e.kind() => {
                    warn!("{} vanished during scan", path.display());
                }
                Err(e) => return Err(e.into()),
            }
        }

        let mut scanned = Vec::with_capacity(self.files.len());
        for (&uid, name) in &self.files {
            let path = self.cur().join(name);
            let size = match fs::metadata(&path) {
                Ok(md) => md.len(),
                Err(e) if std::io::ErrorKind::NotFound == e.kind() => continue,
                Err(e) => return Err(e.into()),
            };
            scanned.push(ScannedMessage {
                uid,
                size,
                date_received: mtime(&path),
                flags: Some(parse_file_name(name).1),
            });
        }
        scanned.sort_by_key(|s| s.uid);
        Ok(scanned)
    }

    fn read(&mut self, uid: Uid) -> Result<Vec<u8>, Error> {
        let name = self.files.get(&uid).ok_or(Error::NxMessage)?;
        fs::read(self.cur().join(name)).on_not_found(Error::NxMessage)
    }

    fn append(
        &mut self,
        uid: Uid,
        data: &[u8],
        flags: SystemFlags,
    ) -> Result<u64, Error> {
        let mut tf = tempfile::NamedTempFile::new_in(self.dir.join("tmp"))?;
        tf.write_all(data)?;
        if self.fsync {
            tf.as_file().sync_all()?;
        }

        let name = file_name(uid, flags);
        tf.persist_noclobber(self.cur().join(&name))
            .map_err(|e| e.error)?;
        self.files.insert(uid, name);
        Ok(data.len() as u64)
    }

    fn remove(&mut self, uids: &[Uid]) -> Result<(), Error> {
        for uid in uids {
            if let Some(name) = self.files.get(uid) {
                fs::remove_file(self.cur().join(name)).ignore_not_found()?;
                self.files.remove(uid);
            }
        }
        Ok(())
    }

    fn sync_flags(&mut self, summary: &FolderSummary) -> Result<(), Error> {
        for entry in summary.entries() {
            let current = match self.files.get(&entry.uid) {
                Some(current) => current,
                None => continue,
            };

            let desired = file_name(entry.uid, entry.flags);
            if *current != desired {
                fs::rename(self.cur().join(current), self.cur().join(&desired))
                    .ignore_not_found()?;
                self.files.insert(entry.uid, desired);
            }
        }
        Ok(())
    }
}
