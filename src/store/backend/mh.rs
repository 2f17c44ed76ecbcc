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

//! MH stores: one directory per folder, one file per message, named by its
//! UID. There is no Inbox.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::*;
use crate::support::file_ops::{ErrorTransforms, IgnoreKinds};

const SUMMARY_FILE: &str = ".letterbox-summary";
const INDEX_FILE: &str = ".letterbox-index";

pub struct MhBackend {
    root: PathBuf,
}

impl MhBackend {
    pub fn open(root: &Path) -> Result<Self, Error> {
        fs::create_dir_all(root)?;
        Ok(MhBackend {
            root: root.to_owned(),
        })
    }

    fn folder_dir(&self, full_name: &str) -> PathBuf {
        nested_path(&self.root, full_name, |s, _| s.to_owned())
    }
}

impl Backend for MhBackend {
    fn has_inbox(&self) -> bool {
        false
    }

    fn folder_exists(&self, full_name: &str) -> bool {
        !full_name.is_empty() && self.folder_dir(full_name).is_dir()
    }

    fn create_folder(&self, full_name: &str) -> Result<(), Error> {
        if self.folder_exists(full_name) {
            return Err(Error::FolderExists);
        }
        fs::create_dir_all(self.folder_dir(full_name))?;
        Ok(())
    }

    fn delete_folder(&self, full_name: &str) -> Result<(), Error> {
        fs::remove_dir_all(self.folder_dir(full_name))
            .on_not_found(Error::NxFolder)
    }

    fn rename_folder(&self, old: &str, new: &str) -> Result<(), Error> {
        let dst = self.folder_dir(new);
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(self.folder_dir(old), dst).on_not_found(Error::NxFolder)
    }

    fn list_children(&self, parent: &str) -> Result<Vec<String>, Error> {
        let dir = if parent.is_empty() {
            self.root.clone()
        } else {
            self.folder_dir(parent)
        };
        Ok(list_dir(&dir, |_, entry| {
            entry.file_type().map_or(false, |t| t.is_dir())
        })?
        .into_iter()
        .map(|name| child_name(parent, &name))
        .collect())
    }

    fn open(&self, full_name: &str) -> Box<dyn MessageStore> {
        Box::new(MhMessages {
            dir: self.folder_dir(full_name),
        })
    }

    fn summary_path(&self, full_name: &str) -> PathBuf {
        self.folder_dir(full_name).join(SUMMARY_FILE)
    }

    fn index_path(&self, full_name: &str) -> PathBuf {
        self.folder_dir(full_name).join(INDEX_FILE)
    }
}

struct MhMessages {
    dir: PathBuf,
}

impl MhMessages {
    fn path(&self, uid: Uid) -> PathBuf {
        self.dir.join(uid.to_string())
    }
}

impl MessageStore for MhMessages {
    fn scan(
        &mut self,
        summary: &mut FolderSummary,
    ) -> Result<Vec<ScannedMessage>, Error> {
        let mut scanned = Vec::new();
        for entry in fs::read_dir(&self.dir).on_not_found(Error::NxFolder)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }

            let uid = match entry
                .file_name()
                .to_str()
                .and_then(|n| n.parse::<Uid>().ok())
            {
                Some(uid) => uid,
                None => continue,
            };

            // `07` and `7` would both parse as 7
            if entry.file_name().to_str() != Some(&uid.to_string()) {
                continue;
            }

            summary.reserve_uid(uid);
            scanned.push(ScannedMessage {
                uid,
                size: entry.metadata()?.len(),
                date_received: mtime(&entry.path()),
                flags: None,
            });
        }

        scanned.sort_by_key(|s| s.uid);
        Ok(scanned)
    }

    fn read(&mut self, uid: Uid) -> Result<Vec<u8>, Error> {
        fs::read(self.path(uid)).on_not_found(Error::NxMessage)
    }

    fn append(
        &mut self,
        uid: Uid,
        data: &[u8],
        _flags: SystemFlags,
    ) -> Result<u64, Error> {
        let mut tf = tempfile::NamedTempFile::new_in(&self.dir)
            .on_not_found(Error::FolderInvalidated)?;
        tf.write_all(data)?;
        tf.persist_noclobber(self.path(uid)).map_err(|e| e.error)?;
        Ok(data.len() as u64)
    }

    fn remove(&mut self, uids: &[Uid]) -> Result<(), Error> {
        for &uid in uids {
            fs::remove_file(self.path(uid)).ignore_not_found()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn namespace_and_messages() {
        let tmpdir = TempDir::new().unwrap();
        let backend = MhBackend::open(tmpdir.path()).unwrap();
        assert!(!backend.has_inbox());

        backend.create_folder("a/b").unwrap();
        backend.create_folder("c").unwrap();
        assert_eq!(
            vec!["a".to_owned(), "c".to_owned()],
            backend.list_children("").unwrap()
        );

        let mut summary = FolderSummary::default();
        let mut messages = backend.open("a");
        messages.scan(&mut summary).unwrap();
        let uid = summary.allocate_uid().unwrap();
        messages.append(uid, b"data", SystemFlags::empty()).unwrap();
        fs::write(tmpdir.path().join("a/07"), b"not ours").unwrap();
        fs::write(tmpdir.path().join("a/12"), b"external").unwrap();

        // The message file is not mistaken for a folder
        assert_eq!(vec!["a/b".to_owned()], backend.list_children("a").unwrap());

        let mut summary = FolderSummary::default();
        let scanned = messages.scan(&mut summary).unwrap();
        assert_eq!(
            vec![Uid::u(1), Uid::u(12)],
            scanned.iter().map(|s| s.uid).collect::<Vec<_>>()
        );
        assert_eq!(13, summary.next_uid());
        assert_eq!(b"external".to_vec(), messages.read(Uid::u(12)).unwrap());

        messages.remove(&[Uid::u(12)]).unwrap();
        assert_matches!(Err(Error::NxMessage), messages.read(Uid::u(12)));
    }
}
