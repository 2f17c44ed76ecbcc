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

//! Stores and their folder cache.
//!
//! At most one `Folder` is alive per store and folder name. The cache maps
//! names to weak references; a folder removes its own entry when its last
//! handle is dropped and wakes anyone waiting for the name to become free.
//! An entry whose folder is dead but not yet removed means the folder is in
//! the middle of being torn down, which may involve writing its summary, so
//! anything that wants to touch that name waits for the removal.
//!
//! Locks are always taken in the order cache, then folder. `Folder` handles
//! obtained while the cache is locked are never dropped until the cache lock
//! has been released, since dropping the last one re-enters the cache.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, Weak};

use log::{debug, info};

use super::backend::{config_dir, open_backend, Backend, INBOX_NAME};
use super::folder::Folder;
use super::model::{
    FolderInfo, FolderInfoFlags, GetFolderFlags, GetFolderInfoFlags,
};
use super::registry::RegistryInner;
use super::summary::FolderSummary;
use super::uri::StoreUri;
use crate::support::config::StoreConfig;
use crate::support::error::Error;
use crate::support::log_prefix::LogPrefix;
use crate::support::safe_name::is_safe_path;
use crate::support::session::Session;

/// A namespace of folders in one local store.
///
/// `Store` is a cheap handle; clones refer to the same store and share its
/// folder cache.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

pub(super) struct StoreInner {
    uri: StoreUri,
    backend: Box<dyn Backend>,
    config: StoreConfig,
    session: Arc<dyn Session>,
    log_prefix: LogPrefix,
    folders: Mutex<HashMap<String, Weak<Folder>>>,
    folder_released: Condvar,
    registry: Option<Weak<RegistryInner>>,
}

type FolderCache<'a> = MutexGuard<'a, HashMap<String, Weak<Folder>>>;

/// The locked cache plus the open folders of one subtree.
///
/// Fields drop in order, so the cache is unlocked before the folder handles
/// are released.
struct SubtreeLock<'a> {
    folders: FolderCache<'a>,
    held: Vec<(String, Arc<Folder>)>,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Store({})", self.inner.log_prefix)
    }
}

impl Store {
    /// Open the store at `uri` outside of any registry.
    ///
    /// Two stores opened this way on the same URI do not know about each
    /// other; use a `Registry` to share them.
    pub fn open(uri: &str, session: Arc<dyn Session>) -> Result<Self, Error> {
        let uri = uri.parse::<StoreUri>()?;
        Ok(Store {
            inner: StoreInner::open(uri, session, None)?,
        })
    }

    pub(super) fn from_inner(inner: Arc<StoreInner>) -> Self {
        Store { inner }
    }

    pub(super) fn inner(&self) -> &Arc<StoreInner> {
        &self.inner
    }

    pub fn uri(&self) -> &StoreUri {
        &self.inner.uri
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn session(&self) -> &Arc<dyn Session> {
        &self.inner.session
    }

    pub fn has_inbox(&self) -> bool {
        self.inner.backend.has_inbox()
    }

    /// Return the folder at `path`, opening it if nobody has it open.
    ///
    /// `./` prefixes and trailing slashes are ignored, and `.` names the
    /// Inbox. With `CREATE`, a missing folder is created; opening an existing
    /// one with `CREATE` is not an error. With `BODY_INDEX`, the folder
    /// maintains a body index from now on.
    pub fn get_folder(
        &self,
        path: &str,
        flags: GetFolderFlags,
    ) -> Result<Arc<Folder>, Error> {
        let name = self.inner.normalise(path)?;
        let body_index = flags.contains(GetFolderFlags::BODY_INDEX);

        let folder = {
            let mut folders = self.inner.lock_folders();
            loop {
                match folders.get(&name).map(Weak::upgrade) {
                    Some(Some(folder)) => {
                        debug!(
                            "{} Reusing open folder {}",
                            self.inner.log_prefix, name
                        );
                        break folder;
                    }
                    Some(None) => {
                        folders = self.inner.wait_folder_released(folders);
                    }
                    None => {
                        if !self.inner.backend.folder_exists(&name) {
                            if !flags.contains(GetFolderFlags::CREATE) {
                                return Err(Error::NxFolder);
                            }

                            self.inner.backend.create_folder(&name)?;
                            info!(
                                "{} Created folder {}",
                                self.inner.log_prefix, name
                            );
                        }

                        let folder = Arc::new(Folder::open(
                            &self.inner,
                            &name,
                            body_index,
                        )?);
                        folders.insert(name.clone(), Arc::downgrade(&folder));
                        break folder;
                    }
                }
            }
        };

        if body_index && !folder.is_indexed() {
            folder.enable_body_index()?;
        }
        Ok(folder)
    }

    /// Return the distinguished Inbox of this store.
    pub fn get_inbox(&self) -> Result<Arc<Folder>, Error> {
        if !self.has_inbox() {
            return Err(Error::NoInbox);
        }
        self.get_folder(INBOX_NAME, GetFolderFlags::CREATE)
    }

    /// Create a new, empty folder, along with any missing parents.
    pub fn create_folder(&self, path: &str) -> Result<(), Error> {
        let name = self.inner.normalise(path)?;
        let _folders = self.inner.lock_folders();
        if self.inner.backend.folder_exists(&name) {
            return Err(Error::FolderExists);
        }

        self.inner.backend.create_folder(&name)?;
        info!("{} Created folder {}", self.inner.log_prefix, name);
        Ok(())
    }

    /// Delete a folder and all its messages.
    ///
    /// Folders with subfolders cannot be deleted. A handle on the deleted
    /// folder remains usable for reading what was in its summary, but
    /// anything that touches storage fails with `FolderInvalidated`.
    pub fn delete_folder(&self, path: &str) -> Result<(), Error> {
        let name = self.inner.normalise(path)?;
        if self.has_inbox() && INBOX_NAME == name {
            return Err(Error::Unsupported("deleting the Inbox"));
        }

        {
            let mut subtree = self.inner.lock_subtree(&name);
            if !self.inner.backend.folder_exists(&name) {
                return Err(Error::NxFolder);
            }
            if !self.inner.backend.list_children(&name)?.is_empty() {
                return Err(Error::HasChildren);
            }

            let mut held = subtree
                .held
                .iter()
                .map(|(_, folder)| folder.hold())
                .collect::<Vec<_>>();
            self.inner.backend.delete_folder(&name)?;
            subtree.folders.remove(&name);
            for folder in &mut held {
                folder.invalidate();
            }
        }

        info!("{} Deleted folder {}", self.inner.log_prefix, name);
        Ok(())
    }

    /// Move the folder `old` and everything below it to `new`.
    ///
    /// Open handles follow the folder: afterwards `get_folder(new)` returns
    /// the same handle that `get_folder(old)` used to, and `old` no longer
    /// exists.
    pub fn rename_folder(&self, old: &str, new: &str) -> Result<(), Error> {
        let old = self.inner.normalise(old)?;
        let new = self.inner.normalise(new)?;
        if self.has_inbox() && (INBOX_NAME == old || INBOX_NAME == new) {
            return Err(Error::Unsupported("renaming the Inbox"));
        }
        if is_within(&new, &old) {
            return Err(Error::Unsupported("moving a folder inside itself"));
        }

        {
            let mut subtree = self.inner.lock_subtree(&old);
            if !self.inner.backend.folder_exists(&old) {
                return Err(Error::NxFolder);
            }
            if self.inner.backend.folder_exists(&new) {
                return Err(Error::FolderExists);
            }

            let mut held = subtree
                .held
                .iter()
                .map(|(key, folder)| (key.as_str(), folder.hold()))
                .collect::<Vec<_>>();
            self.inner.backend.rename_folder(&old, &new)?;

            let rekey = |key: &str| format!("{}{}", new, &key[old.len()..]);
            let keys = subtree
                .folders
                .keys()
                .filter(|k| is_within(k, &old))
                .cloned()
                .collect::<Vec<_>>();
            for key in keys {
                if let Some(weak) = subtree.folders.remove(&key) {
                    subtree.folders.insert(rekey(key.as_str()), weak);
                }
            }
            for (key, folder) in &mut held {
                folder.relocate(&*self.inner.backend, &rekey(*key));
            }
        }

        info!("{} Renamed folder {} to {}", self.inner.log_prefix, old, new);
        Ok(())
    }

    /// Describe the folders below `root` (the top of the store if empty).
    ///
    /// At the top level of a store with an Inbox, the Inbox comes first.
    /// Other folders are sorted by name.
    pub fn get_folder_info(
        &self,
        root: &str,
        flags: GetFolderInfoFlags,
    ) -> Result<Vec<FolderInfo>, Error> {
        let root = if root.is_empty() {
            String::new()
        } else {
            self.inner.normalise(root)?
        };

        let mut infos = Vec::new();
        if root.is_empty() {
            if self.has_inbox() {
                infos.push(self.describe(
                    INBOX_NAME,
                    FolderInfoFlags::SYSTEM | FolderInfoFlags::NOCHILDREN,
                    Vec::new(),
                    flags,
                )?);
            }
        } else if !self.inner.backend.folder_exists(&root) {
            return Err(Error::NxFolder);
        }

        for child in self.inner.backend.list_children(&root)? {
            infos.push(self.describe_tree(&child, flags)?);
        }
        Ok(infos)
    }

    fn describe_tree(
        &self,
        name: &str,
        flags: GetFolderInfoFlags,
    ) -> Result<FolderInfo, Error> {
        let children = self.inner.backend.list_children(name)?;
        let info_flags = if children.is_empty() {
            FolderInfoFlags::NOCHILDREN
        } else {
            FolderInfoFlags::CHILDREN
        };

        let children = if flags.contains(GetFolderInfoFlags::RECURSIVE) {
            children
                .iter()
                .map(|child| self.describe_tree(child, flags))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            Vec::new()
        };

        self.describe(name, info_flags, children, flags)
    }

    fn describe(
        &self,
        name: &str,
        info_flags: FolderInfoFlags,
        children: Vec<FolderInfo>,
        flags: GetFolderInfoFlags,
    ) -> Result<FolderInfo, Error> {
        let counts = if flags.contains(GetFolderInfoFlags::FAST) {
            None
        } else {
            let live = self
                .inner
                .lock_folders()
                .get(name)
                .and_then(Weak::upgrade);
            match live {
                Some(folder) => Some(folder.counts()),
                None => FolderSummary::load(
                    &self.inner.backend.summary_path(name),
                )?
                .map(|s| (s.len() as u32, s.unread_count() as u32)),
            }
        };

        Ok(FolderInfo {
            full_name: name.to_owned(),
            name: name.rsplit('/').next().unwrap_or(name).to_owned(),
            uri: self.inner.uri.folder_uri(name),
            flags: info_flags,
            total: counts.map(|c| c.0),
            unread: counts.map(|c| c.1),
            children,
        })
    }

    /// Sync every open folder. All folders are attempted; the first error is
    /// returned.
    pub fn sync_all(&self, expunge: bool) -> Result<(), Error> {
        let open = self
            .inner
            .lock_folders()
            .values()
            .filter_map(Weak::upgrade)
            .collect::<Vec<_>>();

        let mut result = Ok(());
        for folder in open {
            if let Err(e) = folder.sync(expunge) {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    /// The number of folders currently open.
    pub fn open_folder_count(&self) -> usize {
        self.inner
            .lock_folders()
            .values()
            .filter(|w| w.strong_count() > 0)
            .count()
    }
}

impl StoreInner {
    pub(super) fn open(
        uri: StoreUri,
        session: Arc<dyn Session>,
        registry: Option<Weak<RegistryInner>>,
    ) -> Result<Arc<Self>, Error> {
        let config = StoreConfig::load(config_dir(&uri))?;
        let backend = open_backend(&uri, &config)?;
        let log_prefix = LogPrefix::new(uri.to_string());
        debug!("{} Opened store", log_prefix);

        Ok(Arc::new(StoreInner {
            uri,
            backend,
            config,
            session,
            log_prefix,
            folders: Mutex::new(HashMap::new()),
            folder_released: Condvar::new(),
            registry,
        }))
    }

    pub(super) fn uri(&self) -> &StoreUri {
        &self.uri
    }

    pub(super) fn backend(&self) -> &dyn Backend {
        &*self.backend
    }

    pub(super) fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub(super) fn log_prefix(&self) -> &LogPrefix {
        &self.log_prefix
    }

    fn lock_folders(&self) -> FolderCache<'_> {
        self.folders.lock().unwrap()
    }

    fn wait_folder_released<'a>(
        &self,
        folders: FolderCache<'a>,
    ) -> FolderCache<'a> {
        self.folder_released.wait(folders).unwrap()
    }

    /// Lock the cache with a strong reference to every open folder at or
    /// below `name`.
    ///
    /// Holding the cache lock alone does not stop the last handle to a folder
    /// from being dropped elsewhere, after which the folder writes its summary
    /// before leaving the cache. Once every folder in the subtree is held here,
    /// none of them can start tearing down until the `SubtreeLock` is dropped.
    fn lock_subtree(&self, name: &str) -> SubtreeLock<'_> {
        loop {
            let mut held = Vec::new();
            let folders = self.lock_folders();
            let mut dying = false;
            let subtree = folders.iter().filter(|(k, _)| is_within(k, name));
            for (key, weak) in subtree {
                match weak.upgrade() {
                    Some(folder) => held.push((key.clone(), folder)),
                    None => dying = true,
                }
            }

            if !dying {
                return SubtreeLock { folders, held };
            }

            // Release the handles taken so far only once the cache is
            // unlocked, since any of them may now be the last one.
            let folders = self.wait_folder_released(folders);
            drop(folders);
            drop(held);
        }
    }

    /// Called by a dying folder to remove itself from the cache.
    pub(super) fn release_folder(&self, folder: *const Folder) {
        self.lock_folders().retain(|_, w| w.as_ptr() != folder);
        self.folder_released.notify_all();
    }

    /// Normalise a folder path as given by a caller into the name used
    /// internally.
    fn normalise(&self, path: &str) -> Result<String, Error> {
        let mut path = path;
        while let Some(rest) = path.strip_prefix("./") {
            path = rest;
        }
        let path = path.trim_end_matches('/');

        if path.is_empty() || "." == path {
            return if self.backend.has_inbox() {
                Ok(INBOX_NAME.to_owned())
            } else {
                Err(Error::NoInbox)
            };
        }

        if !is_safe_path(path) {
            return Err(Error::UnsafeName);
        }

        if !self.backend.has_inbox() {
            return Ok(path.to_owned());
        }

        let (first, rest) = match path.find('/') {
            Some(ix) => (&path[..ix], Some(&path[ix..])),
            None => (path, None),
        };
        if first.eq_ignore_ascii_case(INBOX_NAME) {
            if rest.is_some() {
                return Err(Error::Unsupported("folders inside the Inbox"));
            }
            Ok(INBOX_NAME.to_owned())
        } else {
            Ok(path.to_owned())
        }
    }
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        debug!("{} Closed store", self.log_prefix);
        if let Some(registry) = self.registry.as_ref().and_then(Weak::upgrade)
        {
            registry.release_store(self as *const StoreInner);
        }
    }
}

/// Whether `name` is `ancestor` or lies below it.
fn is_within(name: &str, ancestor: &str) -> bool {
    name == ancestor
        || (name.starts_with(ancestor)
            && name[ancestor.len()..].starts_with('/'))
}

#[cfg(test)]
mod test {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::support::session::LocalSession;
    use crate::test_data::numbered_message;

    fn open_store(scheme: &str) -> (TempDir, Store) {
        crate::init_test_log();
        let tmpdir = TempDir::new().unwrap();
        let store = Store::open(
            &format!("{}://{}", scheme, tmpdir.path().join("s").display()),
            Arc::new(LocalSession),
        )
        .unwrap();
        (tmpdir, store)
    }

    #[test]
    fn path_normalisation() {
        let (_tmpdir, store) = open_store("maildir");
        let inner = store.inner();
        assert_eq!("Inbox", inner.normalise(".").unwrap());
        assert_eq!("Inbox", inner.normalise("").unwrap());
        assert_eq!("Inbox", inner.normalise("./").unwrap());
        assert_eq!("Inbox", inner.normalise("INBOX").unwrap());
        assert_eq!("foo", inner.normalise("./foo").unwrap());
        assert_eq!("foo/bar", inner.normalise("././foo/bar/").unwrap());
        assert_matches!(Err(Error::UnsafeName), inner.normalise("../foo"));
        assert_matches!(Err(Error::UnsafeName), inner.normalise("foo//bar"));
        assert_matches!(Err(Error::UnsafeName), inner.normalise("/foo"));
        assert_matches!(Err(Error::UnsafeName), inner.normalise("foo/cur"));
        assert_matches!(
            Err(Error::Unsupported(_)),
            inner.normalise("inbox/foo")
        );

        let (_tmpdir, store) = open_store("mh");
        let inner = store.inner();
        assert_matches!(Err(Error::NoInbox), inner.normalise("."));
        assert_eq!("inbox", inner.normalise("./inbox").unwrap());
    }

    #[test]
    fn folder_identity() {
        let (_tmpdir, store) = open_store("mh");
        assert_matches!(
            Err(Error::NxFolder),
            store.get_folder("testbox", GetFolderFlags::empty())
        );

        let a = store.get_folder("testbox", GetFolderFlags::CREATE).unwrap();
        let b = store.get_folder("./testbox", GetFolderFlags::empty()).unwrap();
        let c = store.get_folder("testbox", GetFolderFlags::CREATE).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &c));
        assert_eq!(1, store.open_folder_count());

        drop(a);
        drop(b);
        drop(c);
        assert_eq!(0, store.open_folder_count());

        // Reopening after release gives a fresh but equivalent instance
        let d = store.get_folder("testbox", GetFolderFlags::empty()).unwrap();
        assert_eq!("testbox", d.full_name());
    }

    #[test]
    fn inbox_availability() {
        let (_tmpdir, store) = open_store("maildir");
        let inbox = store.get_inbox().unwrap();
        assert_eq!("Inbox", inbox.full_name());
        let dot = store.get_folder(".", GetFolderFlags::empty()).unwrap();
        assert!(Arc::ptr_eq(&inbox, &dot));

        let (_tmpdir, store) = open_store("mh");
        assert_matches!(Err(Error::NoInbox), store.get_inbox());
        let (_tmpdir, store) = open_store("mbox");
        assert_matches!(Err(Error::NoInbox), store.get_inbox());
    }

    #[test]
    fn create_and_delete() {
        let (_tmpdir, store) = open_store("mbox");
        store.create_folder("a/b").unwrap();
        assert_matches!(Err(Error::FolderExists), store.create_folder("a/b"));
        assert_matches!(Err(Error::HasChildren), store.delete_folder("a"));
        assert_matches!(Err(Error::NxFolder), store.delete_folder("nx"));

        let folder = store.get_folder("a/b", GetFolderFlags::empty()).unwrap();
        let uid = folder
            .append_message(&numbered_message(1), None)
            .unwrap();
        store.delete_folder("a/b").unwrap();

        // The old handle still knows what was in it
        assert_eq!(vec![uid], folder.get_uids());
        assert_matches!(Err(Error::FolderInvalidated), folder.get_message(uid));
        assert_matches!(
            Err(Error::FolderInvalidated),
            folder.append_message(&numbered_message(2), None)
        );
        assert_matches!(
            Err(Error::NxFolder),
            store.get_folder("a/b", GetFolderFlags::empty())
        );

        // Recreating gives a new, empty folder
        let new = store.get_folder("a/b", GetFolderFlags::CREATE).unwrap();
        assert!(!Arc::ptr_eq(&folder, &new));
        assert_eq!(0, new.get_message_count());
    }

    #[test]
    fn inbox_is_special() {
        let (_tmpdir, store) = open_store("maildir");
        store.create_folder("foo").unwrap();
        assert_matches!(
            Err(Error::Unsupported(_)),
            store.delete_folder("inbox")
        );
        assert_matches!(
            Err(Error::Unsupported(_)),
            store.rename_folder("Inbox", "bar")
        );
        assert_matches!(
            Err(Error::Unsupported(_)),
            store.rename_folder("foo", "INBOX")
        );
    }

    #[test]
    fn rename_carries_open_handles() {
        let (_tmpdir, store) = open_store("maildir");
        let folder = store.get_folder("a/b", GetFolderFlags::CREATE).unwrap();
        let child = store.get_folder("a/b/c", GetFolderFlags::CREATE).unwrap();
        let uid = folder
            .append_message(&numbered_message(3), None)
            .unwrap();
        folder.set_message_user_flag(uid, "kept", true).unwrap();

        assert_matches!(
            Err(Error::Unsupported(_)),
            store.rename_folder("a", "a/b/x")
        );
        assert_matches!(Err(Error::NxFolder), store.rename_folder("nx", "y"));
        store.create_folder("taken").unwrap();
        assert_matches!(
            Err(Error::FolderExists),
            store.rename_folder("a", "taken")
        );

        store.rename_folder("a", "z/y").unwrap();
        assert_eq!("z/y/b", folder.full_name());
        assert_eq!("z/y/b/c", child.full_name());
        assert_eq!("b", folder.name());

        let renamed =
            store.get_folder("z/y/b", GetFolderFlags::empty()).unwrap();
        assert!(Arc::ptr_eq(&folder, &renamed));
        assert_matches!(
            Err(Error::NxFolder),
            store.get_folder("a/b", GetFolderFlags::empty())
        );

        // Storage still works through the moved handle
        assert_eq!(
            Some("Test3 message97 subject".to_owned()),
            folder.get_message(uid).unwrap().subject()
        );
        let second = folder
            .append_message(&numbered_message(4), None)
            .unwrap();
        drop(renamed);
        drop(folder);
        drop(child);

        let reopened =
            store.get_folder("z/y/b", GetFolderFlags::empty()).unwrap();
        assert_eq!(vec![uid, second], reopened.get_uids());
        assert!(reopened.get_message_user_flag(uid, "kept"));
    }

    #[test]
    fn folder_info_listing() {
        let (_tmpdir, store) = open_store("maildir");
        store.create_folder("b").unwrap();
        store.create_folder("a/x").unwrap();
        store.create_folder("a/y/z").unwrap();

        let folder = store.get_folder("b", GetFolderFlags::empty()).unwrap();
        folder.append_message(&numbered_message(1), None).unwrap();
        let uid = folder.append_message(&numbered_message(2), None).unwrap();
        folder.delete_message(uid).unwrap();

        let top = store
            .get_folder_info("", GetFolderInfoFlags::empty())
            .unwrap();
        assert_eq!(
            vec!["Inbox", "a", "b"],
            top.iter().map(|i| i.full_name.as_str()).collect::<Vec<_>>()
        );
        assert_eq!(
            FolderInfoFlags::SYSTEM | FolderInfoFlags::NOCHILDREN,
            top[0].flags
        );
        assert_eq!(FolderInfoFlags::CHILDREN, top[1].flags);
        assert_eq!(FolderInfoFlags::NOCHILDREN, top[2].flags);
        assert!(top[1].children.is_empty());
        // Live counts
        assert_eq!((Some(2), Some(1)), (top[2].total, top[2].unread));

        folder.sync(true).unwrap();
        drop(folder);
        // Persisted counts
        let top = store
            .get_folder_info("", GetFolderInfoFlags::empty())
            .unwrap();
        assert_eq!((Some(1), Some(1)), (top[2].total, top[2].unread));
        assert_eq!(None, top[1].total);

        let fast = store.get_folder_info("", GetFolderInfoFlags::FAST).unwrap();
        assert_eq!(None, fast[2].total);

        let tree = store
            .get_folder_info("a", GetFolderInfoFlags::RECURSIVE)
            .unwrap();
        let flat = tree
            .into_iter()
            .flat_map(FolderInfo::flatten)
            .map(|i| (i.full_name, i.name))
            .collect::<Vec<_>>();
        assert_eq!(
            vec![
                ("a/x".to_owned(), "x".to_owned()),
                ("a/y".to_owned(), "y".to_owned()),
                ("a/y/z".to_owned(), "z".to_owned()),
            ],
            flat
        );

        assert_matches!(
            Err(Error::NxFolder),
            store.get_folder_info("nx", GetFolderInfoFlags::empty())
        );
    }

    #[test]
    fn spool_store() {
        crate::init_test_log();
        let tmpdir = TempDir::new().unwrap();
        let spool = tmpdir.path().join("spool");
        assert_matches!(
            Err(Error::NxStore),
            Store::open(
                &format!("spool://{}", spool.display()),
                Arc::new(LocalSession)
            )
        );

        fs::write(&spool, b"").unwrap();
        let store = Store::open(
            &format!("spool://{}", spool.display()),
            Arc::new(LocalSession),
        )
        .unwrap();
        let inbox = store.get_inbox().unwrap();
        inbox.append_message(&numbered_message(1), None).unwrap();
        assert_matches!(Err(Error::Unsupported(_)), store.create_folder("x"));
        assert_eq!(
            vec!["Inbox".to_owned()],
            store
                .get_folder_info("", GetFolderInfoFlags::empty())
                .unwrap()
                .into_iter()
                .map(|i| i.full_name)
                .collect::<Vec<_>>()
        );
    }
}
