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

//! Virtual folders.
//!
//! A `VeeFolder` shows the messages of several real folders that match a
//! query. It stores nothing itself. Reading a message or changing its flags
//! goes to the real folder the message lives in, and nothing can be appended
//! to a virtual folder.
//!
//! Messages removed from a real folder leave the virtual folder as soon as
//! the removal is reported. Added and changed messages are re-evaluated
//! immediately when the folder has `VeeFolderFlags::AUTO_UPDATE`; otherwise
//! their real folder is marked stale and searched again by the next
//! `refresh` or `sync`.
//!
//! The lock order is virtual folder, then real folder. Anything that can
//! make a real folder emit a change notification is called without the
//! virtual folder locked, since the notification comes back here.

use std::collections::BTreeSet;
use std::fmt;
use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, info, warn};

use super::folder::{Folder, ListenerId};
use super::model::{FolderChanges, SystemFlags, Uid, VeeFolderFlags, VeeUid};
use super::summary::MessageSummaryEntry;
use crate::mime::MimeMessage;
use crate::search::Query;
use crate::support::error::Error;

pub struct VeeFolder {
    inner: Arc<VeeInner>,
}

struct VeeInner {
    name: String,
    flags: VeeFolderFlags,
    state: Mutex<VeeState>,
}

struct VeeState {
    expression: String,
    sources: Vec<Source>,
    next_source: u32,
    matches: BTreeSet<VeeUid>,
}

struct Source {
    id: u32,
    folder: Arc<Folder>,
    listener: ListenerId,
    /// Changes were reported that have not been evaluated yet.
    stale: bool,
}

impl fmt::Debug for VeeFolder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "VeeFolder({})", self.inner.name)
    }
}

impl VeeFolder {
    /// Create an empty virtual folder selecting the messages that match
    /// `expression`.
    pub fn new(
        name: &str,
        expression: &str,
        flags: VeeFolderFlags,
    ) -> Result<Self, Error> {
        Query::parse(expression)?;
        Ok(VeeFolder {
            inner: Arc::new(VeeInner {
                name: name.to_owned(),
                flags,
                state: Mutex::new(VeeState {
                    expression: expression.to_owned(),
                    sources: Vec::new(),
                    next_source: 0,
                    matches: BTreeSet::new(),
                }),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn flags(&self) -> VeeFolderFlags {
        self.inner.flags
    }

    pub fn expression(&self) -> String {
        self.inner.lock().expression.clone()
    }

    /// Replace the selecting expression and rebuild from every source.
    ///
    /// If the expression is malformed or a source cannot be searched, the
    /// folder is left as it was.
    pub fn set_expression(&self, expression: &str) -> Result<(), Error> {
        Query::parse(expression)?;

        let mut state = self.inner.lock();
        let mut matches = BTreeSet::new();
        for source in &state.sources {
            matches.extend(source.search(expression)?);
        }

        state.expression = expression.to_owned();
        state.matches = matches;
        for source in &mut state.sources {
            source.stale = false;
        }
        debug!("{}: expression is now {}", self.inner.name, expression);
        Ok(())
    }

    /// Start showing the matching messages of `folder`.
    ///
    /// Adding a folder that is already a source does nothing.
    pub fn add_folder(&self, folder: &Arc<Folder>) -> Result<(), Error> {
        let mut state = self.inner.lock();
        if state.sources.iter().any(|s| Arc::ptr_eq(&s.folder, folder)) {
            return Ok(());
        }

        let id = state.next_source;
        // Listen before searching so that no change falls between the two.
        // A notification arriving now waits for the lock, by which time the
        // source is registered.
        let weak = Arc::downgrade(&self.inner);
        let listener = folder.on_change(move |changes| {
            if let Some(inner) = weak.upgrade() {
                inner.source_changed(id, changes);
            }
        });

        let source = Source {
            id,
            folder: Arc::clone(folder),
            listener,
            stale: false,
        };
        let matched = match source.search(&state.expression) {
            Ok(matched) => matched,
            Err(e) => {
                folder.remove_listener(listener);
                return Err(e);
            }
        };

        state.next_source += 1;
        state.matches.extend(matched);
        state.sources.push(source);
        info!("{}: added {}", self.inner.name, folder.uri());
        Ok(())
    }

    /// Stop showing the messages of `folder`.
    ///
    /// Returns whether `folder` was a source.
    pub fn remove_folder(&self, folder: &Folder) -> bool {
        let removed = {
            let mut state = self.inner.lock();
            let ix = match state
                .sources
                .iter()
                .position(|s| ptr::eq(&*s.folder, folder))
            {
                Some(ix) => ix,
                None => return false,
            };
            let source = state.sources.remove(ix);
            state.matches.retain(|v| v.source != source.id);
            source
        };

        removed.folder.remove_listener(removed.listener);
        info!("{}: removed {}", self.inner.name, removed.folder.uri());
        true
    }

    /// The source folders, in the order they were added.
    pub fn folders(&self) -> Vec<Arc<Folder>> {
        self.inner
            .lock()
            .sources
            .iter()
            .map(|s| Arc::clone(&s.folder))
            .collect()
    }

    /// All messages in the folder, grouped by source in the order the
    /// sources were added.
    pub fn get_uids(&self) -> Vec<VeeUid> {
        self.inner.lock().matches.iter().copied().collect()
    }

    pub fn get_message_count(&self) -> usize {
        self.inner.lock().matches.len()
    }

    pub fn get_unread_message_count(&self) -> usize {
        self.get_summary()
            .iter()
            .filter(|(_, entry)| entry.is_unread())
            .count()
    }

    /// The summary entry of every message, in the order of `get_uids`.
    pub fn get_summary(&self) -> Vec<(VeeUid, MessageSummaryEntry)> {
        let state = self.inner.lock();
        let mut summary = Vec::with_capacity(state.matches.len());
        for source in &state.sources {
            for uid in state.uids_of(source.id) {
                if let Some(entry) = source.folder.get_message_info(uid) {
                    summary.push((
                        VeeUid {
                            source: source.id,
                            uid,
                        },
                        entry,
                    ));
                }
            }
        }
        summary
    }

    /// The real folder `vuid` lives in and its UID there.
    pub fn get_location(&self, vuid: VeeUid) -> Option<(Arc<Folder>, Uid)> {
        let state = self.inner.lock();
        if !state.matches.contains(&vuid) {
            return None;
        }

        state
            .sources
            .iter()
            .find(|s| s.id == vuid.source)
            .map(|s| (Arc::clone(&s.folder), vuid.uid))
    }

    fn locate(&self, vuid: VeeUid) -> Result<(Arc<Folder>, Uid), Error> {
        self.get_location(vuid).ok_or(Error::NxMessage)
    }

    pub fn get_message(&self, vuid: VeeUid) -> Result<MimeMessage, Error> {
        let (folder, uid) = self.locate(vuid)?;
        folder.get_message(uid)
    }

    pub fn get_message_info(
        &self,
        vuid: VeeUid,
    ) -> Option<MessageSummaryEntry> {
        let (folder, uid) = self.get_location(vuid)?;
        folder.get_message_info(uid)
    }

    /// Change the system flags of a message in its real folder.
    ///
    /// The message may stop matching as a result, in which case it leaves
    /// this folder once the change is evaluated.
    pub fn set_message_flags(
        &self,
        vuid: VeeUid,
        mask: SystemFlags,
        set: SystemFlags,
    ) -> Result<SystemFlags, Error> {
        let (folder, uid) = self.locate(vuid)?;
        folder.set_message_flags(uid, mask, set)
    }

    pub fn delete_message(&self, vuid: VeeUid) -> Result<(), Error> {
        let (folder, uid) = self.locate(vuid)?;
        folder.delete_message(uid)
    }

    pub fn set_message_user_flag(
        &self,
        vuid: VeeUid,
        name: &str,
        value: bool,
    ) -> Result<(), Error> {
        let (folder, uid) = self.locate(vuid)?;
        folder.set_message_user_flag(uid, name, value)
    }

    pub fn set_message_user_tag(
        &self,
        vuid: VeeUid,
        name: &str,
        value: &str,
    ) -> Result<(), Error> {
        let (folder, uid) = self.locate(vuid)?;
        folder.set_message_user_tag(uid, name, value)
    }

    /// Copy the given messages from their real folders into `dest`.
    ///
    /// Returns the new UIDs in `dest`, in the order of `vuids`. Nothing is
    /// transferred if any of `vuids` is not in this folder.
    pub fn transfer_messages_to(
        &self,
        vuids: &[VeeUid],
        dest: &Folder,
        delete_originals: bool,
    ) -> Result<Vec<Uid>, Error> {
        let located = vuids
            .iter()
            .map(|&vuid| self.locate(vuid))
            .collect::<Result<Vec<_>, Error>>()?;

        let mut transferred = Vec::with_capacity(located.len());
        let mut start = 0;
        while start < located.len() {
            let folder = &located[start].0;
            let end = located[start..]
                .iter()
                .position(|(f, _)| !Arc::ptr_eq(f, folder))
                .map_or(located.len(), |n| start + n);
            let uids = located[start..end]
                .iter()
                .map(|&(_, uid)| uid)
                .collect::<Vec<_>>();
            transferred.extend(folder.transfer_messages_to(
                &uids,
                dest,
                delete_originals,
            )?);
            start = end;
        }
        Ok(transferred)
    }

    /// Run a query over the messages of this folder.
    pub fn search(&self, expression: &str) -> Result<Vec<VeeUid>, Error> {
        Query::parse(expression)?;
        let state = self.inner.lock();
        let mut hits = Vec::new();
        for source in &state.sources {
            let uids = state.uids_of(source.id);
            if !uids.is_empty() {
                hits.extend(source.search_by_uids(expression, &uids)?);
            }
        }
        hits.sort();
        Ok(hits)
    }

    /// Run a query over the given messages only. Messages not in this
    /// folder are ignored.
    pub fn search_by_uids(
        &self,
        expression: &str,
        vuids: &[VeeUid],
    ) -> Result<Vec<VeeUid>, Error> {
        Query::parse(expression)?;
        let state = self.inner.lock();
        let mut hits = Vec::new();
        for source in &state.sources {
            let uids = vuids
                .iter()
                .filter(|v| {
                    v.source == source.id && state.matches.contains(*v)
                })
                .map(|v| v.uid)
                .collect::<Vec<_>>();
            if !uids.is_empty() {
                hits.extend(source.search_by_uids(expression, &uids)?);
            }
        }
        hits.sort();
        Ok(hits)
    }

    /// Search again every source with changes not yet evaluated, and drop
    /// sources whose folder was deleted from its store.
    pub fn refresh(&self) -> Result<(), Error> {
        let mut state = self.inner.lock();
        state.drop_deleted(&self.inner.name);
        for ix in 0..state.sources.len() {
            if state.sources[ix].stale {
                state.rebuild(ix)?;
            }
        }
        Ok(())
    }

    /// Sync every source folder, expunging it first if `expunge` is set,
    /// then rebuild from every source.
    pub fn sync(&self, expunge: bool) -> Result<(), Error> {
        for folder in self.folders() {
            match folder.sync(expunge) {
                Ok(()) | Err(Error::FolderInvalidated) => (),
                Err(e) => return Err(e),
            }
        }

        let mut state = self.inner.lock();
        state.drop_deleted(&self.inner.name);
        for ix in 0..state.sources.len() {
            state.rebuild(ix)?;
        }
        Ok(())
    }

    pub fn expunge(&self) -> Result<(), Error> {
        self.sync(true)
    }
}

impl VeeInner {
    fn lock(&self) -> MutexGuard<'_, VeeState> {
        self.state.lock().unwrap()
    }

    fn source_changed(&self, id: u32, changes: &FolderChanges) {
        let mut guard = self.lock();
        let state = &mut *guard;
        let source = match state.sources.iter_mut().find(|s| s.id == id) {
            Some(source) => source,
            // Removed while this notification was in flight
            None => return,
        };

        for &uid in &changes.removed {
            state.matches.remove(&VeeUid { source: id, uid });
        }

        let candidates = changes
            .added
            .iter()
            .chain(&changes.changed)
            .copied()
            .collect::<Vec<_>>();
        if candidates.is_empty() {
            return;
        }

        if !self.flags.contains(VeeFolderFlags::AUTO_UPDATE) {
            source.stale = true;
            return;
        }

        match source.folder.search_by_uids(&state.expression, &candidates) {
            Ok(matched) => {
                let matched = matched.into_iter().collect::<BTreeSet<_>>();
                for uid in candidates {
                    let vuid = VeeUid { source: id, uid };
                    if matched.contains(&uid) {
                        state.matches.insert(vuid);
                    } else {
                        state.matches.remove(&vuid);
                    }
                }
            }
            Err(e) => {
                warn!(
                    "{}: failed to update from {}: {}",
                    self.name,
                    source.folder.uri(),
                    e
                );
                source.stale = true;
            }
        }
    }
}

impl Drop for VeeInner {
    fn drop(&mut self) {
        if let Ok(state) = self.state.get_mut() {
            for source in &state.sources {
                source.folder.remove_listener(source.listener);
            }
        }
    }
}

impl VeeState {
    /// The UIDs currently shown from source `id`.
    fn uids_of(&self, id: u32) -> Vec<Uid> {
        self.matches
            .range(
                VeeUid {
                    source: id,
                    uid: Uid::MIN,
                }..=VeeUid {
                    source: id,
                    uid: Uid::MAX,
                },
            )
            .map(|v| v.uid)
            .collect()
    }

    fn rebuild(&mut self, ix: usize) -> Result<(), Error> {
        let source = &mut self.sources[ix];
        let matched = source.search(&self.expression)?;
        let id = source.id;
        source.stale = false;
        self.matches.retain(|v| v.source != id);
        self.matches.extend(matched);
        Ok(())
    }

    fn drop_deleted(&mut self, name: &str) {
        let matches = &mut self.matches;
        self.sources.retain(|source| {
            if !source.folder.is_deleted() {
                return true;
            }

            warn!("{}: {} was deleted", name, source.folder.uri());
            source.folder.remove_listener(source.listener);
            let id = source.id;
            matches.retain(|v| v.source != id);
            false
        });
    }
}

impl Source {
    fn tag(&self, uids: Vec<Uid>) -> impl Iterator<Item = VeeUid> {
        let id = self.id;
        uids.into_iter().map(move |uid| VeeUid { source: id, uid })
    }

    fn search(&self, expression: &str) -> Result<Vec<VeeUid>, Error> {
        Ok(self.tag(self.folder.search(expression)?).collect())
    }

    fn search_by_uids(
        &self,
        expression: &str,
        uids: &[Uid],
    ) -> Result<Vec<VeeUid>, Error> {
        Ok(self
            .tag(self.folder.search_by_uids(expression, uids)?)
            .collect())
    }
}
