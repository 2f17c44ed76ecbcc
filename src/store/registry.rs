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

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, Weak};

use log::debug;

use super::store::{Store, StoreInner};
use super::uri::StoreUri;
use crate::support::error::Error;
use crate::support::session::Session;

/// The stores open in one session.
///
/// Like the folder cache of a store, at most one store is alive per URI, and
/// a store leaves the registry when its last handle (including those held by
/// its open folders) is dropped.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

pub(super) struct RegistryInner {
    stores: Mutex<HashMap<StoreUri, Weak<StoreInner>>>,
    released: Condvar,
    session: Arc<dyn Session>,
}

type StoreCache<'a> = MutexGuard<'a, HashMap<StoreUri, Weak<StoreInner>>>;

impl Registry {
    pub fn new(session: Arc<dyn Session>) -> Self {
        Registry {
            inner: Arc::new(RegistryInner {
                stores: Mutex::new(HashMap::new()),
                released: Condvar::new(),
                session,
            }),
        }
    }

    /// Return the store at `uri`, opening it if it is not open yet.
    ///
    /// URIs are compared after normalisation, so `maildir:/tmp/x` and
    /// `maildir:///tmp/x/` name the same store.
    pub fn get_store(&self, uri: &str) -> Result<Store, Error> {
        let uri = uri.parse::<StoreUri>()?;
        let mut stores = self.inner.lock();
        loop {
            match stores.get(&uri).map(Weak::upgrade) {
                Some(Some(inner)) => return Ok(Store::from_inner(inner)),
                Some(None) => {
                    stores = self.inner.released.wait(stores).unwrap();
                }
                None => {
                    let inner = StoreInner::open(
                        uri.clone(),
                        Arc::clone(&self.inner.session),
                        Some(Arc::downgrade(&self.inner)),
                    )?;
                    debug!("Registered store {}", uri);
                    stores.insert(uri, Arc::downgrade(&inner));
                    return Ok(Store::from_inner(inner));
                }
            }
        }
    }

    /// The number of stores currently alive.
    pub fn live_stores(&self) -> usize {
        self.inner
            .lock()
            .values()
            .filter(|w| w.strong_count() > 0)
            .count()
    }
}

impl RegistryInner {
    fn lock(&self) -> StoreCache<'_> {
        self.stores.lock().unwrap()
    }

    /// Called by a dying store to remove itself.
    pub(super) fn release_store(&self, store: *const StoreInner) {
        self.lock().retain(|_, w| w.as_ptr() != store);
        self.released.notify_all();
    }
}

#[cfg(test)]
mod test {
    use tempfile::TempDir;

    use super::*;
    use crate::store::GetFolderFlags;
    use crate::support::session::LocalSession;

    #[test]
    fn one_store_per_uri() {
        crate::init_test_log();
        let tmpdir = TempDir::new().unwrap();
        let registry = Registry::new(Arc::new(LocalSession));
        let path = tmpdir.path().join("mail");

        let a = registry
            .get_store(&format!("maildir:{}", path.display()))
            .unwrap();
        let b = registry
            .get_store(&format!("maildir://{}/", path.display()))
            .unwrap();
        assert!(Arc::ptr_eq(a.inner(), b.inner()));
        assert_eq!(1, registry.live_stores());

        let other = registry
            .get_store(&format!("mh:{}", tmpdir.path().join("mh").display()))
            .unwrap();
        assert_eq!(2, registry.live_stores());
        drop(other);
        assert_eq!(1, registry.live_stores());

        // An open folder keeps its store alive
        let folder = a.get_folder("x", GetFolderFlags::CREATE).unwrap();
        drop(a);
        drop(b);
        assert_eq!(1, registry.live_stores());
        let c = registry
            .get_store(&format!("maildir:{}", path.display()))
            .unwrap();
        let again = c.get_folder("x", GetFolderFlags::empty()).unwrap();
        assert!(Arc::ptr_eq(&folder, &again));
        drop(again);
        drop(c);
        drop(folder);
        assert_eq!(0, registry.live_stores());

        assert_matches!(
            Err(Error::UnknownScheme(_)),
            registry.get_store("imap://example.com/")
        );
    }
}
