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

//! The hooks a store may need from the application that owns it.
//!
//! Local stores need none of these; they exist so that stores which talk to
//! something remote can ask for credentials and schedule periodic work
//! without depending on any particular event loop.

use std::time::Duration;

/// Identifies a timeout registered with `Session::register_timeout`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimeoutId(pub u64);

pub trait Session: Send + Sync {
    /// Ask the user for a secret.
    ///
    /// `item` identifies what the secret is for (typically a store URI) so
    /// that the application may cache it. Returns `None` if the user declined.
    fn get_password(&self, prompt: &str, item: &str) -> Option<String>;

    /// Arrange for `callback` to be invoked every `interval` until it returns
    /// false or the timeout is removed.
    ///
    /// Returns `None` if the session does not support timers.
    fn register_timeout(
        &self,
        interval: Duration,
        callback: Box<dyn FnMut() -> bool + Send>,
    ) -> Option<TimeoutId>;

    /// Cancel a timeout. Returns whether it was registered.
    fn remove_timeout(&self, id: TimeoutId) -> bool;
}

/// A `Session` for purely local use.
///
/// It never has passwords and never runs timers.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalSession;

impl Session for LocalSession {
    fn get_password(&self, _prompt: &str, _item: &str) -> Option<String> {
        None
    }

    fn register_timeout(
        &self,
        _interval: Duration,
        _callback: Box<dyn FnMut() -> bool + Send>,
    ) -> Option<TimeoutId> {
        None
    }

    fn remove_timeout(&self, _id: TimeoutId) -> bool {
        false
    }
}
