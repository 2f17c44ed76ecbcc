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

use std::fmt;
use std::sync::{Arc, Mutex};

/// Tracks text that should be included in at the start of every log statement.
///
/// Clones of a `LogPrefix` share the same underlying data, so renaming a
/// folder is reflected in the log lines of every handle to it.
#[derive(Clone)]
pub struct LogPrefix {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Clone)]
struct Inner {
    store: String,
    folder: Option<String>,
}

impl LogPrefix {
    pub fn new(store: String) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                store: sanitise(store),
                folder: None,
            })),
        }
    }

    /// Create a new, unshared prefix for the given folder of this store.
    pub fn for_folder(&self, folder: &str) -> Self {
        let mut inner = Inner::clone(&self.inner.lock().unwrap());
        inner.folder = Some(sanitise(folder.to_owned()));
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    pub fn set_folder(&self, folder: &str) {
        self.inner.lock().unwrap().folder = Some(sanitise(folder.to_owned()));
    }
}

impl fmt::Display for LogPrefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let inner = self.inner.lock().unwrap();
        write!(f, "{}", inner.store)?;
        if let Some(ref folder) = inner.folder {
            write!(f, ":{}", folder)?;
        }
        Ok(())
    }
}

fn sanitise(mut s: String) -> String {
    s.retain(|c| !c.is_control());
    s
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn formatting() {
        let store = LogPrefix::new("maildir:/tmp/x".to_owned());
        assert_eq!("maildir:/tmp/x", store.to_string());

        let folder = store.for_folder("testbox");
        assert_eq!("maildir:/tmp/x:testbox", folder.to_string());
        // The store prefix is unaffected
        assert_eq!("maildir:/tmp/x", store.to_string());

        let shared = folder.clone();
        folder.set_folder("renamed\n");
        assert_eq!("maildir:/tmp/x:renamed", shared.to_string());
    }
}
