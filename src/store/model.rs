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

use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Uniquely identifies a message within a single folder.
///
/// UIDs start at 1 and increase monotonically as messages are added to the
/// folder. A UID is never handed out twice by the same folder, even after the
/// message it named has been expunged.
#[derive(
    Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(transparent)]
pub struct Uid(pub NonZeroU32);

impl fmt::Debug for Uid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Uid({})", self.0.get())
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.get())
    }
}

impl FromStr for Uid {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<NonZeroU32>().map(Uid)
    }
}

impl Uid {
    // Unsafe because new() isn't const on the toolchains we target
    pub const MIN: Self = unsafe { Uid(NonZeroU32::new_unchecked(1)) };
    pub const MAX: Self = unsafe { Uid(NonZeroU32::new_unchecked(u32::MAX)) };

    pub fn of(uid: u32) -> Option<Self> {
        NonZeroU32::new(uid).map(Uid)
    }

    pub fn next(self) -> Option<Self> {
        self.0.get().checked_add(1).and_then(Uid::of)
    }

    #[cfg(test)]
    pub fn u(uid: u32) -> Self {
        Uid::of(uid).unwrap()
    }
}

bitflags! {
    /// The fixed set of flags every message carries.
    #[derive(
        Clone,
        Copy,
        Debug,
        Default,
        PartialEq,
        Eq,
        Hash,
        Serialize,
        Deserialize,
    )]
    #[serde(transparent)]
    pub struct SystemFlags: u32 {
        const ANSWERED = 1 << 0;
        const DELETED = 1 << 1;
        const DRAFT = 1 << 2;
        const FLAGGED = 1 << 3;
        const SEEN = 1 << 4;
    }
}

impl SystemFlags {
    /// Look a single flag up by its lower-case name, as used in search
    /// expressions.
    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "answered" => Some(SystemFlags::ANSWERED),
            "deleted" => Some(SystemFlags::DELETED),
            "draft" => Some(SystemFlags::DRAFT),
            "flagged" => Some(SystemFlags::FLAGGED),
            "seen" => Some(SystemFlags::SEEN),
            _ => None,
        }
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct GetFolderFlags: u32 {
        /// Create the backing storage if the folder does not exist.
        const CREATE = 1 << 0;
        /// Build and maintain a body index for the folder.
        const BODY_INDEX = 1 << 1;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct GetFolderInfoFlags: u32 {
        /// List the whole subtree instead of only the immediate children.
        const RECURSIVE = 1 << 0;
        /// Don't compute message counts.
        const FAST = 1 << 1;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct FolderInfoFlags: u32 {
        /// The folder is defined by the store itself and cannot be deleted
        /// or renamed (i.e., the Inbox).
        const SYSTEM = 1 << 0;
        /// The folder cannot have children.
        const NOCHILDREN = 1 << 1;
        /// The folder currently has at least one child.
        const CHILDREN = 1 << 2;
    }
}

/// Describes a folder without opening it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FolderInfo {
    /// The `/`-separated path of the folder within its store.
    pub full_name: String,
    /// The last segment of `full_name`.
    pub name: String,
    pub uri: String,
    pub flags: FolderInfoFlags,
    /// Message counts, absent for `FAST` listings or if the folder has never
    /// been summarised.
    pub total: Option<u32>,
    pub unread: Option<u32>,
    /// Populated for `RECURSIVE` listings.
    pub children: Vec<FolderInfo>,
}

impl FolderInfo {
    /// Flatten this tree into a list, parents before children.
    pub fn flatten(self) -> Vec<FolderInfo> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }

    fn flatten_into(mut self, out: &mut Vec<FolderInfo>) {
        let children = std::mem::take(&mut self.children);
        out.push(self);
        for child in children {
            child.flatten_into(out);
        }
    }
}

/// The changes observed by a folder since the last notification.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FolderChanges {
    pub added: Vec<Uid>,
    pub removed: Vec<Uid>,
    /// Messages whose flags or tags changed.
    pub changed: Vec<Uid>,
}

impl FolderChanges {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.changed.is_empty()
    }

    /// Fold `other` into `self`.
    ///
    /// A UID is reported at most once per list. A message that was added
    /// and then removed within the same batch disappears from both.
    pub fn merge(&mut self, other: FolderChanges) {
        for uid in other.added {
            if !self.added.contains(&uid) {
                self.added.push(uid);
            }
        }
        for uid in other.changed {
            if !self.changed.contains(&uid) && !self.added.contains(&uid) {
                self.changed.push(uid);
            }
        }
        for uid in other.removed {
            self.changed.retain(|&u| u != uid);
            if let Some(ix) = self.added.iter().position(|&u| u == uid) {
                self.added.remove(ix);
            } else if !self.removed.contains(&uid) {
                self.removed.push(uid);
            }
        }
    }
}

/// Overrides applied when appending a message.
#[derive(Clone, Debug, Default)]
pub struct MessageInfo {
    pub flags: SystemFlags,
    pub user_flags: Vec<String>,
    pub user_tags: BTreeMap<String, String>,
    /// The delivery time in seconds since the epoch. If unset, the current
    /// time is used.
    pub date_received: Option<i64>,
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct VeeFolderFlags: u32 {
        /// Re-evaluate changed messages as soon as their folder reports
        /// them, instead of at the next refresh.
        const AUTO_UPDATE = 1 << 0;
    }
}

/// Names a message within a virtual folder.
///
/// `source` identifies the real folder the message lives in; it is assigned
/// by the virtual folder when the real folder is added and is never reused
/// by that virtual folder. `uid` is the message's UID in the real folder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VeeUid {
    pub source: u32,
    pub uid: Uid,
}

impl fmt::Display for VeeUid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:08x}{}", self.source, self.uid)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn uid_parse_and_format() {
        assert_eq!(Uid::u(42), "42".parse().unwrap());
        assert_eq!("42", Uid::u(42).to_string());
        assert!("0".parse::<Uid>().is_err());
        assert!("x".parse::<Uid>().is_err());
        assert_eq!(None, Uid::MAX.next());
        assert_eq!(Some(Uid::u(2)), Uid::MIN.next());
    }

    #[test]
    fn changes_merge() {
        let mut changes = FolderChanges {
            added: vec![Uid::u(3)],
            removed: vec![],
            changed: vec![Uid::u(1)],
        };
        changes.merge(FolderChanges {
            added: vec![Uid::u(4)],
            removed: vec![Uid::u(3), Uid::u(1)],
            changed: vec![Uid::u(4), Uid::u(2)],
        });

        assert_eq!(vec![Uid::u(4)], changes.added);
        assert_eq!(vec![Uid::u(1)], changes.removed);
        assert_eq!(vec![Uid::u(2)], changes.changed);
    }

    #[test]
    fn flatten_info() {
        fn info(name: &str, children: Vec<FolderInfo>) -> FolderInfo {
            FolderInfo {
                full_name: name.to_owned(),
                name: name.rsplit('/').next().unwrap().to_owned(),
                uri: String::new(),
                flags: FolderInfoFlags::empty(),
                total: None,
                unread: None,
                children,
            }
        }

        let tree = info(
            "a",
            vec![info("a/b", vec![info("a/b/c", vec![])]), info("a/d", vec![])],
        );
        let names = tree
            .flatten()
            .into_iter()
            .map(|i| i.full_name)
            .collect::<Vec<_>>();
        assert_eq!(vec!["a", "a/b", "a/b/c", "a/d"], names);
    }

    #[test]
    fn vee_uid_format() {
        let vuid = VeeUid {
            source: 26,
            uid: Uid::u(7),
        };
        assert_eq!("0000001a7", vuid.to_string());
        assert!(
            vuid < VeeUid {
                source: 27,
                uid: Uid::MIN
            }
        );
    }
}
