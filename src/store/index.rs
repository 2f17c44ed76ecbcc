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

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use log::warn;
use serde::{Deserialize, Serialize};

use super::model::Uid;
use crate::support::error::Error;
use crate::support::file_ops;

/// A word index over the text content of the messages in a folder.
///
/// Words are maximal runs of alphanumeric characters, kept in their original
/// case. Only the per-message word sets are persisted; the inverted map is
/// rebuilt on load.
#[derive(Clone, Debug, Default)]
pub struct BodyIndex {
    min_word_len: usize,
    by_uid: BTreeMap<Uid, BTreeSet<String>>,
    by_word: BTreeMap<String, BTreeSet<Uid>>,
}

#[derive(Serialize, Deserialize)]
struct StoredIndex {
    by_uid: BTreeMap<Uid, BTreeSet<String>>,
}

impl BodyIndex {
    pub fn new(min_word_len: usize) -> Self {
        BodyIndex {
            min_word_len: min_word_len.max(1),
            ..BodyIndex::default()
        }
    }

    /// Load the index stored at `path`.
    ///
    /// As with summaries, an unreadable index is treated as absent; the
    /// caller reindexes whatever it is missing.
    pub fn load(
        path: &Path,
        min_word_len: usize,
    ) -> Result<Option<Self>, Error> {
        let data = match file_ops::slurp_opt(path)? {
            Some(data) => data,
            None => return Ok(None),
        };

        let stored = match serde_cbor::from_slice::<StoredIndex>(&data) {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Index {} is corrupt, discarding: {}", path.display(), e);
                return Ok(None);
            }
        };

        let mut index = BodyIndex::new(min_word_len);
        for (uid, words) in stored.by_uid {
            index.insert_words(uid, words);
        }
        Ok(Some(index))
    }

    pub fn save(&self, path: &Path, fsync: bool) -> Result<(), Error> {
        let data = serde_cbor::to_vec(&StoredIndex {
            by_uid: self.by_uid.clone(),
        })?;
        file_ops::spit(path, true, fsync, &data)?;
        Ok(())
    }

    /// Index `text` as the content of `uid`, replacing anything indexed for
    /// it before.
    pub fn add(&mut self, uid: Uid, text: &str) {
        self.remove(uid);
        let words = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() >= self.min_word_len)
            .map(str::to_owned)
            .collect();
        self.insert_words(uid, words);
    }

    fn insert_words(&mut self, uid: Uid, words: BTreeSet<String>) {
        for word in &words {
            self.by_word.entry(word.clone()).or_default().insert(uid);
        }
        self.by_uid.insert(uid, words);
    }

    pub fn remove(&mut self, uid: Uid) {
        let words = match self.by_uid.remove(&uid) {
            Some(words) => words,
            None => return,
        };

        for word in words {
            if let Some(uids) = self.by_word.get_mut(&word) {
                uids.remove(&uid);
                if uids.is_empty() {
                    self.by_word.remove(&word);
                }
            }
        }
    }

    pub fn contains_uid(&self, uid: Uid) -> bool {
        self.by_uid.contains_key(&uid)
    }

    pub fn uids(&self) -> impl Iterator<Item = Uid> + '_ {
        self.by_uid.keys().copied()
    }

    /// Whether a search for `needle` can be answered from the index alone.
    ///
    /// This is the case when `needle` is a single word at least as long as
    /// the shortest indexed word: any occurrence of it in the text then lies
    /// within one indexed word.
    pub fn can_answer(&self, needle: &str) -> bool {
        !needle.is_empty()
            && needle.chars().all(char::is_alphanumeric)
            && needle.chars().count() >= self.min_word_len
    }

    /// Whether any word indexed for `uid` contains `needle`.
    pub fn matches(&self, uid: Uid, needle: &str) -> bool {
        self.by_uid
            .get(&uid)
            .map_or(false, |words| words.iter().any(|w| w.contains(needle)))
    }

    /// Return every UID with an indexed word containing `needle`.
    pub fn find(&self, needle: &str) -> BTreeSet<Uid> {
        self.by_word
            .iter()
            .filter(|(word, _)| word.contains(needle))
            .flat_map(|(_, uids)| uids.iter().copied())
            .collect()
    }
}

#[cfg(test)]
mod test {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn indexing_and_lookup() {
        let mut index = BodyIndex::new(1);
        index.add(Uid::u(1), "data1 content\n");
        index.add(Uid::u(2), "data12 content, again!");
        index.add(Uid::u(3), "Nothing Else");

        assert!(index.matches(Uid::u(1), "data1"));
        assert!(index.matches(Uid::u(2), "data1"));
        assert!(!index.matches(Uid::u(3), "data1"));
        assert!(!index.matches(Uid::u(3), "nothing"));
        assert!(index.matches(Uid::u(3), "Noth"));

        let found: Vec<_> = index.find("ont").into_iter().collect();
        assert_eq!(vec![Uid::u(1), Uid::u(2)], found);

        index.remove(Uid::u(2));
        let found: Vec<_> = index.find("data").into_iter().collect();
        assert_eq!(vec![Uid::u(1)], found);
        assert!(!index.contains_uid(Uid::u(2)));
        assert!(index.find("again").is_empty());
    }

    #[test]
    fn answerable_needles() {
        let index = BodyIndex::new(3);
        assert!(index.can_answer("data"));
        assert!(index.can_answer("dät"));
        assert!(!index.can_answer("da"));
        assert!(!index.can_answer("data content"));
        assert!(!index.can_answer("data."));
        assert!(!index.can_answer(""));
    }

    #[test]
    fn short_words_are_not_indexed() {
        let mut index = BodyIndex::new(3);
        index.add(Uid::u(1), "a bb ccc dddd");
        assert!(index.find("b").is_empty());
        assert_eq!(1, index.find("c").len());
    }

    #[test]
    fn persistence() {
        let tmpdir = TempDir::new().unwrap();
        let path = tmpdir.path().join("index");
        assert!(BodyIndex::load(&path, 1).unwrap().is_none());

        let mut index = BodyIndex::new(1);
        index.add(Uid::u(7), "hello world");
        index.save(&path, false).unwrap();

        let loaded = BodyIndex::load(&path, 1).unwrap().unwrap();
        assert!(loaded.contains_uid(Uid::u(7)));
        assert_eq!(1, loaded.find("wor").len());
    }
}
