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

//! The per-folder message summary.
//!
//! The summary is the authoritative in-memory view of a folder: the UID list,
//! the counts, and everything search needs short of the message content are
//! derived from it. It is persisted as a single CBOR document which is
//! replaced atomically on every sync.

use std::collections::{BTreeMap, BTreeSet};
use std::convert::TryFrom;
use std::path::Path;

use log::warn;
use serde::{Deserialize, Serialize};

use super::model::{SystemFlags, Uid};
use crate::mime::MimeMessage;
use crate::support::error::Error;
use crate::support::file_ops;

/// Cached metadata for one message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSummaryEntry {
    pub uid: Uid,
    /// The subject, with RFC 2047 encoded words decoded.
    pub subject: String,
    pub from: String,
    pub to: String,
    pub cc: String,
    pub message_id: String,
    /// Seconds since the epoch, from the `Date` header. Messages without a
    /// usable `Date` use the receipt time.
    pub date_sent: i64,
    pub date_received: i64,
    /// The size of the message as stored, in bytes.
    pub size: u64,
    pub flags: SystemFlags,
    #[serde(default)]
    pub user_flags: BTreeSet<String>,
    #[serde(default)]
    pub user_tags: BTreeMap<String, String>,
}

impl MessageSummaryEntry {
    pub fn from_message(
        uid: Uid,
        message: &MimeMessage,
        size: u64,
        date_received: i64,
    ) -> Self {
        MessageSummaryEntry {
            uid,
            subject: message.subject().unwrap_or_default(),
            from: message.from().unwrap_or_default(),
            to: message.to().unwrap_or_default(),
            cc: message.cc().unwrap_or_default(),
            message_id: message.message_id().unwrap_or_default(),
            date_sent: message
                .date()
                .map_or(date_received, |d| d.timestamp()),
            date_received,
            size,
            flags: SystemFlags::empty(),
            user_flags: BTreeSet::new(),
            user_tags: BTreeMap::new(),
        }
    }

    pub fn is_unread(&self) -> bool {
        !self.flags.contains(SystemFlags::SEEN)
    }

    pub fn is_deleted(&self) -> bool {
        self.flags.contains(SystemFlags::DELETED)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FolderSummary {
    /// The next UID to hand out. Wider than a UID so that exhaustion is
    /// representable.
    next_uid: u64,
    entries: BTreeMap<Uid, MessageSummaryEntry>,
}

impl Default for FolderSummary {
    fn default() -> Self {
        FolderSummary {
            next_uid: 1,
            entries: BTreeMap::new(),
        }
    }
}

impl FolderSummary {
    /// Load the summary at `path`.
    ///
    /// Returns `None` if there is no summary. A summary that cannot be
    /// decoded is also treated as absent so that the folder can be
    /// re-summarised from its storage.
    pub fn load(path: &Path) -> Result<Option<Self>, Error> {
        let data = match file_ops::slurp_opt(path)? {
            Some(data) => data,
            None => return Ok(None),
        };

        match serde_cbor::from_slice::<FolderSummary>(&data) {
            Ok(summary) if summary.is_consistent() => Ok(Some(summary)),
            Ok(_) => {
                warn!("Summary {} is inconsistent, discarding", path.display());
                Ok(None)
            }
            Err(e) => {
                warn!(
                    "Summary {} is corrupt, discarding: {}",
                    path.display(),
                    e
                );
                Ok(None)
            }
        }
    }

    pub fn save(&self, path: &Path, fsync: bool) -> Result<(), Error> {
        let data = serde_cbor::to_vec(self)?;
        file_ops::spit(path, true, fsync, &data)?;
        Ok(())
    }

    fn is_consistent(&self) -> bool {
        self.entries.iter().all(|(&k, v)| k == v.uid)
            && self
                .entries
                .keys()
                .next_back()
                .map_or(true, |u| u64::from(u.0.get()) < self.next_uid)
    }

    /// Allocate a fresh UID, never handed out before by this summary.
    pub fn allocate_uid(&mut self) -> Result<Uid, Error> {
        let uid = u32::try_from(self.next_uid)
            .ok()
            .and_then(Uid::of)
            .ok_or(Error::GaveUpInsertion)?;
        self.next_uid += 1;
        Ok(uid)
    }

    /// Ensure that `uid` will never be handed out by `allocate_uid`.
    ///
    /// This is used when adopting messages whose storage already fixes
    /// their UID.
    pub fn reserve_uid(&mut self, uid: Uid) {
        self.next_uid = self.next_uid.max(u64::from(uid.0.get()) + 1);
    }

    pub fn next_uid(&self) -> u64 {
        self.next_uid
    }

    pub fn insert(&mut self, entry: MessageSummaryEntry) {
        self.reserve_uid(entry.uid);
        self.entries.insert(entry.uid, entry);
    }

    pub fn remove(&mut self, uid: Uid) -> Option<MessageSummaryEntry> {
        self.entries.remove(&uid)
    }

    pub fn get(&self, uid: Uid) -> Option<&MessageSummaryEntry> {
        self.entries.get(&uid)
    }

    pub fn get_mut(&mut self, uid: Uid) -> Option<&mut MessageSummaryEntry> {
        self.entries.get_mut(&uid)
    }

    pub fn contains(&self, uid: Uid) -> bool {
        self.entries.contains_key(&uid)
    }

    /// Iterate the entries in UID order.
    pub fn entries(&self) -> impl Iterator<Item = &MessageSummaryEntry> + '_ {
        self.entries.values()
    }

    pub fn uids(&self) -> Vec<Uid> {
        self.entries.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn unread_count(&self) -> usize {
        self.entries().filter(|e| e.is_unread()).count()
    }

    pub fn deleted_count(&self) -> usize {
        self.entries().filter(|e| e.is_deleted()).count()
    }

    pub fn deleted_uids(&self) -> Vec<Uid> {
        self.entries()
            .filter(|e| e.is_deleted())
            .map(|e| e.uid)
            .collect()
    }
}

#[cfg(test)]
mod test {
    use tempfile::TempDir;

    use super::*;
    use crate::test_data::*;

    fn entry(uid: u32) -> MessageSummaryEntry {
        MessageSummaryEntry::from_message(
            Uid::u(uid),
            &numbered_message(uid),
            100,
            1000,
        )
    }

    #[test]
    fn entry_from_message() {
        let message = MimeMessage::parse(ENCODED_SUBJECT);
        let entry = MessageSummaryEntry::from_message(
            Uid::u(1),
            &message,
            ENCODED_SUBJECT.len() as u64,
            5,
        );
        assert_eq!("Keld Jørn Simonsen", entry.subject);
        assert_eq!("Alice <alice@example.com>", entry.from);
        assert_eq!("bob@example.com, carol@example.com", entry.to);
        assert_eq!("", entry.cc);
        assert_eq!("1234@example.com", entry.message_id);
        assert_eq!(880127706, entry.date_sent);
        assert_eq!(5, entry.date_received);
        assert!(entry.is_unread());
        assert!(!entry.is_deleted());

        let undated = MessageSummaryEntry::from_message(
            Uid::u(2),
            &MimeMessage::parse(b"Subject: x\n\nbody\n"),
            0,
            77,
        );
        assert_eq!(77, undated.date_sent);
    }

    #[test]
    fn uid_allocation() {
        let mut summary = FolderSummary::default();
        assert_eq!(Uid::u(1), summary.allocate_uid().unwrap());
        assert_eq!(Uid::u(2), summary.allocate_uid().unwrap());

        summary.insert(entry(10));
        assert_eq!(Uid::u(11), summary.allocate_uid().unwrap());

        // Removal does not make a UID available again
        summary.remove(Uid::u(10));
        assert_eq!(Uid::u(12), summary.allocate_uid().unwrap());

        summary.next_uid = u64::from(u32::MAX);
        assert_eq!(Uid::MAX, summary.allocate_uid().unwrap_or(Uid::MIN));
        assert_matches!(Err(Error::GaveUpInsertion), summary.allocate_uid());
    }

    #[test]
    fn counts() {
        let mut summary = FolderSummary::default();
        for uid in 1..=5 {
            summary.insert(entry(uid));
        }
        summary.get_mut(Uid::u(2)).unwrap().flags |= SystemFlags::SEEN;
        summary.get_mut(Uid::u(3)).unwrap().flags |=
            SystemFlags::SEEN | SystemFlags::DELETED;

        assert_eq!(5, summary.len());
        assert_eq!(3, summary.unread_count());
        assert_eq!(1, summary.deleted_count());
        assert_eq!(vec![Uid::u(3)], summary.deleted_uids());
        assert_eq!(
            vec![Uid::u(1), Uid::u(2), Uid::u(3), Uid::u(4), Uid::u(5)],
            summary.uids()
        );
    }

    #[test]
    fn persistence() {
        let tmpdir = TempDir::new().unwrap();
        let path = tmpdir.path().join("summary");

        assert!(FolderSummary::load(&path).unwrap().is_none());

        let mut summary = FolderSummary::default();
        let mut e = entry(3);
        e.user_flags.insert("every13".to_owned());
        e.user_tags.insert("colour".to_owned(), "red".to_owned());
        summary.insert(e.clone());
        summary.save(&path, false).unwrap();

        let loaded = FolderSummary::load(&path).unwrap().unwrap();
        assert_eq!(Some(&e), loaded.get(Uid::u(3)));
        assert_eq!(4, loaded.next_uid());

        std::fs::write(&path, b"garbage").unwrap();
        assert!(FolderSummary::load(&path).unwrap().is_none());
    }
}
