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

//! Local mail storage and retrieval.
//!
//! The engine is organised around three abstractions:
//!
//! - A `Store` is a namespace of folders backed by some local format
//!   (maildir, MH, mbox, or a single spool file).
//!
//! - A `Folder` is a mutable, UID-addressed collection of messages with an
//!   in-memory summary that is persisted on `sync`.
//!
//! - A `StreamFilter` is an incremental byte transform; chains of them are
//!   used to transcode message data on its way to and from storage.
//!
//! Folders answer queries written in a small s-expression language; see the
//! `search` module.

#[cfg(test)]
macro_rules! assert_matches {
    ($expected:pat, $actual:expr) => {
        match $actual {
            $expected => (),
            unexpected => panic!(
                "Expected {} matches {}, got {:?}",
                stringify!($expected),
                stringify!($actual),
                unexpected
            ),
        }
    };
}

pub mod filter;
pub mod mime;
pub mod search;
pub mod store;
pub mod support;

#[cfg(test)]
mod test_data;

pub use crate::filter::{FilterReader, FilterWriter, StreamFilter};
pub use crate::store::{
    Folder, FolderInfo, FolderInfoFlags, GetFolderFlags, GetFolderInfoFlags,
    MessageSummaryEntry, Registry, Store, SystemFlags, Uid, VeeFolder,
    VeeFolderFlags, VeeUid,
};
pub use crate::support::error::Error;

#[cfg(test)]
static INIT_TEST_LOG: std::sync::Once = std::sync::Once::new();

#[cfg(test)]
fn init_test_log() {
    use log4rs::append::console::{ConsoleAppender, Target};
    use log4rs::config::{Appender, Config, Root};
    use log4rs::encode::pattern::PatternEncoder;

    INIT_TEST_LOG.call_once(|| {
        let stderr = ConsoleAppender::builder()
            .target(Target::Stderr)
            .encoder(Box::new(PatternEncoder::new(
                "{d(%H:%M:%S%.3f)} [{l}][{t}] {m}{n}",
            )))
            .build();
        let config = Config::builder()
            .appender(Appender::builder().build("stderr", Box::new(stderr)))
            .build(
                Root::builder()
                    .appender("stderr")
                    .build(log::LevelFilter::Debug),
            )
            .unwrap();
        // Another test harness may have installed a logger already
        let _ = log4rs::init_config(config);
    })
}
