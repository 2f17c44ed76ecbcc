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

//! Open folders.
//!
//! A `Folder` is shared between everyone who opened it through the same
//! `Store`; all its state lives behind one mutex. Every change is applied to
//! the in-memory summary immediately and reaches disk on `sync` (or when the
//! last handle is dropped, if the store is so configured).
//!
//! Change listeners are invoked after the folder lock has been released, so
//! they may call back into the folder.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, error, info, warn};

use super::backend::{now, Backend, MessageStore};
use super::index::BodyIndex;
use super::model::{FolderChanges, MessageInfo, SystemFlags, Uid};
use super::store::{Store, StoreInner};
use super::summary::{FolderSummary, MessageSummaryEntry};
use crate::mime::MimeMessage;
use crate::search::{MessageSource, Query};
use crate::support::config::StoreConfig;
use crate::support::error::Error;
use crate::support::log_prefix::LogPrefix;

pub type ChangeListener = Arc<dyn Fn(&FolderChanges) + Send + Sync>;

type Notification = Option<(Vec<ChangeListener>, FolderChanges)>;

/// Names a listener registered with `Folder::on_change`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub struct Folder {
    store: Arc<StoreInner>,
    state: Mutex<FolderState>,
    log_prefix: LogPrefix,
}

struct FolderState {
    full_name: String,
    summary: FolderSummary,
    index: Option<BodyIndex>,
    storage: Box<dyn MessageStore>,
    summary_path: PathBuf,
    index_path: PathBuf,
    /// Whether the summary or index has changes not yet written out.
    dirty: bool,
    /// Set when the folder is deleted out from under this handle.
    deleted: bool,
    frozen: u32,
    pending: FolderChanges,
    listeners: Vec<(ListenerId, ChangeListener)>,
    next_listener: u64,
}

impl fmt::Debug for Folder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Folder({})", self.log_prefix)
    }
}

impl Folder {
    /// Open the existing folder `full_name` of `store`.
    ///
    /// The persisted summary is reconciled with what is actually in storage.
    pub(super) fn open(
        store: &Arc<StoreInner>,
        full_name: &str,
        body_index: bool,
    ) -> Result<Self, Error> {
        let backend = store.backend();
        let config = store.config();
        let log_prefix = store.log_prefix().for_folder(full_name);

        let summary_path = backend.summary_path(full_name);
        let index_path = backend.index_path(full_name);
        let mut storage = backend.open(full_name);

        let (mut summary, had_summary) =
            match FolderSummary::load(&summary_path)? {
                Some(summary) => (summary, true),
                None => (FolderSummary::default(), false),
            };
        let mut dirty = !had_summary;
        dirty |= reconcile(
            &log_prefix,
            &mut *storage,
            &mut summary,
            had_summary,
        )?;

        let mut state = FolderState {
            full_name: full_name.to_owned(),
            summary,
            index: None,
            storage,
            summary_path,
            index_path,
            dirty,
            deleted: false,
            frozen: 0,
            pending: FolderChanges::default(),
            listeners: Vec::new(),
            next_listener: 0,
        };

        let want_index = body_index
            || config.index.body_index_by_default
            || state.index_path.is_file();
        if want_index {
            state.enable_index(&log_prefix, config)?;
        }

        debug!(
            "{} Opened with {} messages{}",
            log_prefix,
            state.summary.len(),
            if state.index.is_some() { ", indexed" } else { "" }
        );

        Ok(Folder {
            store: Arc::clone(store),
            state: Mutex::new(state),
            log_prefix,
        })
    }

    fn lock(&self) -> MutexGuard<'_, FolderState> {
        self.state.lock().unwrap()
    }

    /// Lock the state, failing if the folder no longer exists.
    fn lock_live(&self) -> Result<MutexGuard<'_, FolderState>, Error> {
        let state = self.lock();
        if state.deleted {
            Err(Error::FolderInvalidated)
        } else {
            Ok(state)
        }
    }

    pub fn store(&self) -> Store {
        Store::from_inner(Arc::clone(&self.store))
    }

    /// The `/`-separated path of this folder within its store.
    pub fn full_name(&self) -> String {
        self.lock().full_name.clone()
    }

    pub fn name(&self) -> String {
        let state = self.lock();
        state
            .full_name
            .rsplit('/')
            .next()
            .unwrap_or(&state.full_name)
            .to_owned()
    }

    pub fn uri(&self) -> String {
        self.store.uri().folder_uri(&self.lock().full_name)
    }

    pub fn is_indexed(&self) -> bool {
        self.lock().index.is_some()
    }

    /// Start maintaining a body index if the folder does not have one yet.
    pub fn enable_body_index(&self) -> Result<(), Error> {
        let mut state = self.lock_live()?;
        state.enable_index(&self.log_prefix, self.store.config())
    }

    pub fn append_message(
        &self,
        message: &MimeMessage,
        info: Option<&MessageInfo>,
    ) -> Result<Uid, Error> {
        self.append_parsed(message, &message.to_bytes(), info)
    }

    /// Append a message given as raw RFC 822 data.
    pub fn append_raw(
        &self,
        data: &[u8],
        info: Option<&MessageInfo>,
    ) -> Result<Uid, Error> {
        self.append_parsed(&MimeMessage::parse(data), data, info)
    }

    fn append_parsed(
        &self,
        message: &MimeMessage,
        data: &[u8],
        info: Option<&MessageInfo>,
    ) -> Result<Uid, Error> {
        let flags = info.map_or_else(SystemFlags::empty, |i| i.flags);
        let date_received =
            info.and_then(|i| i.date_received).unwrap_or_else(now);

        let (uid, notification) = {
            let mut state = self.lock_live()?;
            let state = &mut *state;

            let uid = state.summary.allocate_uid()?;
            let size = state.storage.append(uid, data, flags)?;

            let mut entry = MessageSummaryEntry::from_message(
                uid,
                message,
                size,
                date_received,
            );
            entry.flags = flags;
            if let Some(info) = info {
                entry.user_flags.extend(info.user_flags.iter().cloned());
                entry.user_tags.extend(
                    info.user_tags
                        .iter()
                        .filter(|&(_, v)| !v.is_empty())
                        .map(|(k, v)| (k.clone(), v.clone())),
                );
            }
            state.summary.insert(entry);

            if let Some(ref mut index) = state.index {
                index.add(uid, &message.text_content());
            }
            state.dirty = true;

            (
                uid,
                state.record(FolderChanges {
                    added: vec![uid],
                    ..FolderChanges::default()
                }),
            )
        };

        emit(notification);
        Ok(uid)
    }

    /// Load the message with the given UID.
    ///
    /// Fails with `NxMessage` if it is not in the summary, including if it
    /// has been expunged.
    pub fn get_message(&self, uid: Uid) -> Result<MimeMessage, Error> {
        self.get_message_raw(uid).map(|data| MimeMessage::parse(&data))
    }

    pub fn get_message_raw(&self, uid: Uid) -> Result<Vec<u8>, Error> {
        let mut state = self.lock_live()?;
        if !state.summary.contains(uid) {
            return Err(Error::NxMessage);
        }
        state.storage.read(uid)
    }

    pub fn get_message_info(&self, uid: Uid) -> Option<MessageSummaryEntry> {
        self.lock().summary.get(uid).cloned()
    }

    pub fn get_uids(&self) -> Vec<Uid> {
        self.lock().summary.uids()
    }

    pub fn get_summary(&self) -> Vec<MessageSummaryEntry> {
        self.lock().summary.entries().cloned().collect()
    }

    pub fn get_message_count(&self) -> usize {
        self.lock().summary.len()
    }

    pub fn get_unread_message_count(&self) -> usize {
        self.lock().summary.unread_count()
    }

    /// Whether the folder was deleted from its store after this handle was
    /// opened.
    pub fn is_deleted(&self) -> bool {
        self.lock().deleted
    }

    pub fn get_deleted_message_count(&self) -> usize {
        self.lock().summary.deleted_count()
    }

    pub fn get_message_flags(&self, uid: Uid) -> Option<SystemFlags> {
        self.lock().summary.get(uid).map(|e| e.flags)
    }

    /// Set the flags in `mask` to their values in `set`, leaving the rest
    /// alone. Returns the resulting flags.
    pub fn set_message_flags(
        &self,
        uid: Uid,
        mask: SystemFlags,
        set: SystemFlags,
    ) -> Result<SystemFlags, Error> {
        self.modify_entry(uid, |entry| {
            let flags = (entry.flags & !mask) | (set & mask);
            let changed = flags != entry.flags;
            entry.flags = flags;
            (changed, flags)
        })
    }

    /// Mark the message deleted (and seen), to be removed by the next
    /// expunge.
    pub fn delete_message(&self, uid: Uid) -> Result<(), Error> {
        let both = SystemFlags::DELETED | SystemFlags::SEEN;
        self.set_message_flags(uid, both, both).map(|_| ())
    }

    pub fn get_message_user_flag(&self, uid: Uid, name: &str) -> bool {
        self.lock()
            .summary
            .get(uid)
            .map_or(false, |e| e.user_flags.contains(name))
    }

    pub fn set_message_user_flag(
        &self,
        uid: Uid,
        name: &str,
        value: bool,
    ) -> Result<(), Error> {
        self.modify_entry(uid, |entry| {
            let changed = if value {
                entry.user_flags.insert(name.to_owned())
            } else {
                entry.user_flags.remove(name)
            };
            (changed, ())
        })
    }

    pub fn get_message_user_tag(&self, uid: Uid, name: &str) -> Option<String> {
        self.lock()
            .summary
            .get(uid)
            .and_then(|e| e.user_tags.get(name).cloned())
    }

    /// Set a user tag. An empty value removes the tag.
    pub fn set_message_user_tag(
        &self,
        uid: Uid,
        name: &str,
        value: &str,
    ) -> Result<(), Error> {
        self.modify_entry(uid, |entry| {
            let changed = if value.is_empty() {
                entry.user_tags.remove(name).is_some()
            } else {
                entry
                    .user_tags
                    .insert(name.to_owned(), value.to_owned())
                    .as_deref()
                    != Some(value)
            };
            (changed, ())
        })
    }

    /// Apply `f` to the summary entry of `uid`. `f` returns whether it
    /// changed anything along with its result.
    fn modify_entry<R>(
        &self,
        uid: Uid,
        f: impl FnOnce(&mut MessageSummaryEntry) -> (bool, R),
    ) -> Result<R, Error> {
        let (ret, notification) = {
            let mut state = self.lock_live()?;
            let entry = state.summary.get_mut(uid).ok_or(Error::NxMessage)?;
            let (changed, ret) = f(entry);
            if !changed {
                return Ok(ret);
            }

            state.dirty = true;
            (
                ret,
                state.record(FolderChanges {
                    changed: vec![uid],
                    ..FolderChanges::default()
                }),
            )
        };

        emit(notification);
        Ok(ret)
    }

    /// Physically remove every message marked deleted, then sync.
    ///
    /// Returns the UIDs that were removed.
    pub fn expunge(&self) -> Result<Vec<Uid>, Error> {
        self.sync_impl(true)
    }

    /// Write the summary (and index) out. If `expunge` is set, messages
    /// marked deleted are removed first.
    pub fn sync(&self, expunge: bool) -> Result<(), Error> {
        self.sync_impl(expunge).map(|_| ())
    }

    fn sync_impl(&self, expunge: bool) -> Result<Vec<Uid>, Error> {
        let (removed, notification) = {
            let mut state = self.lock_live()?;
            let removed = if expunge {
                state.expunge(&self.log_prefix)?
            } else {
                Vec::new()
            };
            state.flush(self.store.config())?;

            let notification = if removed.is_empty() {
                None
            } else {
                state.record(FolderChanges {
                    removed: removed.clone(),
                    ..FolderChanges::default()
                })
            };
            (removed, notification)
        };

        emit(notification);
        Ok(removed)
    }

    /// Run a query over the whole folder, returning matching UIDs in UID
    /// order.
    pub fn search(&self, expr: &str) -> Result<Vec<Uid>, Error> {
        let query = Query::parse(expr)?;
        let mut state = self.lock();
        state.search(&query, |_| true)
    }

    /// Run a query over the given messages only. UIDs not in the folder are
    /// ignored.
    pub fn search_by_uids(
        &self,
        expr: &str,
        uids: &[Uid],
    ) -> Result<Vec<Uid>, Error> {
        let query = Query::parse(expr)?;
        let uids = uids.iter().copied().collect::<BTreeSet<_>>();
        let mut state = self.lock();
        state.search(&query, |uid| uids.contains(&uid))
    }

    /// Copy the given messages into `dest`, which may belong to another
    /// store. Flags and tags are carried over. If `delete_originals` is set,
    /// the source messages are then marked deleted.
    ///
    /// Returns the new UIDs in `dest`, in the order of `uids`.
    pub fn transfer_messages_to(
        &self,
        uids: &[Uid],
        dest: &Folder,
        delete_originals: bool,
    ) -> Result<Vec<Uid>, Error> {
        // Only one folder is ever locked at a time, so this is safe even when
        // `dest` is `self`.
        let mut transferred = Vec::with_capacity(uids.len());
        for &uid in uids {
            let (entry, data) = {
                let mut state = self.lock_live()?;
                let entry =
                    state.summary.get(uid).cloned().ok_or(Error::NxMessage)?;
                let data = state.storage.read(uid)?;
                (entry, data)
            };

            let info = MessageInfo {
                flags: entry.flags - SystemFlags::DELETED,
                user_flags: entry.user_flags.iter().cloned().collect(),
                user_tags: entry.user_tags.clone(),
                date_received: Some(entry.date_received),
            };
            transferred.push(dest.append_raw(&data, Some(&info))?);

            if delete_originals {
                self.delete_message(uid)?;
            }
        }

        Ok(transferred)
    }

    /// Hold change notifications until the matching `thaw`.
    pub fn freeze(&self) {
        self.lock().frozen += 1;
    }

    /// Undo one `freeze`. When the last freeze is undone, everything that
    /// changed in the meantime is reported as a single notification.
    pub fn thaw(&self) {
        let notification = {
            let mut state = self.lock();
            state.frozen = state.frozen.saturating_sub(1);
            if state.frozen > 0 || state.pending.is_empty() {
                None
            } else {
                let pending = std::mem::take(&mut state.pending);
                state.record(pending)
            }
        };
        emit(notification);
    }

    pub fn on_change(
        &self,
        listener: impl Fn(&FolderChanges) + Send + Sync + 'static,
    ) -> ListenerId {
        let mut state = self.lock();
        let id = ListenerId(state.next_listener);
        state.next_listener += 1;
        state.listeners.push((id, Arc::new(listener)));
        id
    }

    /// Unregister a listener added with `on_change`.
    ///
    /// A notification already being delivered on another thread may still
    /// reach the listener after this returns.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut state = self.lock();
        let before = state.listeners.len();
        state.listeners.retain(|&(i, _)| i != id);
        state.listeners.len() != before
    }

    /// Lock this folder for a change the store is making to its storage.
    pub(super) fn hold(&self) -> HeldFolder<'_> {
        HeldFolder {
            folder: self,
            state: self.lock(),
        }
    }

    /// Summary counts without reloading anything, for folder listings.
    pub(super) fn counts(&self) -> (u32, u32) {
        let state = self.lock();
        (
            state.summary.len() as u32,
            state.summary.unread_count() as u32,
        )
    }
}

/// A folder whose state stays locked while the store deletes or moves its
/// backing storage, so that nothing reads or writes the storage meanwhile.
pub(super) struct HeldFolder<'a> {
    folder: &'a Folder,
    state: MutexGuard<'a, FolderState>,
}

impl HeldFolder<'_> {
    /// The folder's storage is gone.
    pub(super) fn invalidate(&mut self) {
        self.state.deleted = true;
        self.state.dirty = false;
    }

    /// The folder's storage now lives under `full_name`.
    pub(super) fn relocate(&mut self, backend: &dyn Backend, full_name: &str) {
        let state = &mut *self.state;
        state.full_name = full_name.to_owned();
        state.storage = backend.open(full_name);
        state.summary_path = backend.summary_path(full_name);
        state.index_path = backend.index_path(full_name);
        self.folder.log_prefix.set_folder(full_name);

        // Rebuild whatever view of the storage the backend keeps
        if let Err(e) = state.storage.scan(&mut state.summary) {
            warn!(
                "{} Failed to rescan after rename: {}",
                self.folder.log_prefix, e
            );
        }
    }
}

impl Drop for Folder {
    fn drop(&mut self) {
        if let Ok(state) = self.state.get_mut() {
            if self.store.config().summary.sync_on_release
                && state.dirty
                && !state.deleted
            {
                if let Err(e) = state.flush(self.store.config()) {
                    error!(
                        "{} Failed to write summary on release: {}",
                        self.log_prefix, e
                    );
                }
            }
        }

        self.store.release_folder(self as *const Folder);
    }
}

impl FolderState {
    fn enable_index(
        &mut self,
        log_prefix: &LogPrefix,
        config: &StoreConfig,
    ) -> Result<(), Error> {
        if self.index.is_some() {
            return Ok(());
        }

        let min_word_len = config.index.min_word_len;
        let mut index = BodyIndex::load(&self.index_path, min_word_len)?
            .unwrap_or_else(|| BodyIndex::new(min_word_len));

        let stale = index
            .uids()
            .filter(|&uid| !self.summary.contains(uid))
            .collect::<Vec<_>>();
        for uid in stale {
            index.remove(uid);
        }

        let mut added = 0;
        for uid in self.summary.uids() {
            if !index.contains_uid(uid) {
                let data = self.storage.read(uid)?;
                index.add(uid, &MimeMessage::parse(&data).text_content());
                added += 1;
            }
        }

        if added > 0 {
            debug!("{} Indexed {} messages", log_prefix, added);
            self.dirty = true;
        }
        self.index = Some(index);
        Ok(())
    }

    fn expunge(&mut self, log_prefix: &LogPrefix) -> Result<Vec<Uid>, Error> {
        let doomed = self.summary.deleted_uids();
        if doomed.is_empty() {
            return Ok(doomed);
        }

        self.storage.remove(&doomed)?;
        for &uid in &doomed {
            self.summary.remove(uid);
            if let Some(ref mut index) = self.index {
                index.remove(uid);
            }
        }
        self.dirty = true;

        info!("{} Expunged {} messages", log_prefix, doomed.len());
        Ok(doomed)
    }

    fn flush(&mut self, config: &StoreConfig) -> Result<(), Error> {
        if !self.dirty {
            return Ok(());
        }

        let fsync = config.maildir.fsync;
        self.storage.sync_flags(&self.summary)?;
        self.summary.save(&self.summary_path, fsync)?;
        if let Some(ref index) = self.index {
            index.save(&self.index_path, fsync)?;
        }
        self.dirty = false;
        Ok(())
    }

    fn search(
        &mut self,
        query: &Query,
        mut include: impl FnMut(Uid) -> bool,
    ) -> Result<Vec<Uid>, Error> {
        let mut source = StateSource {
            storage: &mut *self.storage,
            index: self.index.as_ref(),
        };
        query.evaluate(
            self.summary.entries().filter(|e| include(e.uid)),
            &mut source,
            now(),
        )
    }

    /// Record `changes`, returning what needs to be sent to listeners once
    /// the lock is released.
    fn record(&mut self, changes: FolderChanges) -> Notification {
        if self.frozen > 0 {
            self.pending.merge(changes);
            None
        } else if self.listeners.is_empty() {
            None
        } else {
            let listeners = self
                .listeners
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect();
            Some((listeners, changes))
        }
    }
}

fn emit(notification: Notification) {
    if let Some((listeners, changes)) = notification {
        for listener in listeners {
            listener(&changes);
        }
    }
}

struct StateSource<'a> {
    storage: &'a mut dyn MessageStore,
    index: Option<&'a BodyIndex>,
}

impl MessageSource for StateSource<'_> {
    fn load(&mut self, uid: Uid) -> Result<MimeMessage, Error> {
        self.storage.read(uid).map(|data| MimeMessage::parse(&data))
    }

    fn body_index(&self) -> Option<&BodyIndex> {
        self.index
    }
}

/// Bring `summary` in line with `storage`. Returns whether the summary
/// changed.
fn reconcile(
    log_prefix: &LogPrefix,
    storage: &mut dyn MessageStore,
    summary: &mut FolderSummary,
    had_summary: bool,
) -> Result<bool, Error> {
    let mut dirty = false;
    let scanned = storage.scan(summary)?;
    let present = scanned.iter().map(|s| s.uid).collect::<BTreeSet<_>>();

    for uid in summary.uids() {
        if !present.contains(&uid) {
            warn!("{} {} vanished from storage", log_prefix, uid);
            summary.remove(uid);
            dirty = true;
        }
    }

    for scanned in scanned {
        if let Some(entry) = summary.get_mut(scanned.uid) {
            if let Some(flags) = scanned.flags {
                if flags != entry.flags {
                    entry.flags = flags;
                    dirty = true;
                }
            }
            continue;
        }

        if had_summary {
            warn!(
                "{} Adding {} found in storage to the summary",
                log_prefix, scanned.uid
            );
        }

        let data = storage.read(scanned.uid)?;
        let mut entry = MessageSummaryEntry::from_message(
            scanned.uid,
            &MimeMessage::parse(&data),
            scanned.size,
            scanned.date_received,
        );
        if let Some(flags) = scanned.flags {
            entry.flags = flags;
        }
        summary.insert(entry);
        dirty = true;
    }

    Ok(dirty)
}
