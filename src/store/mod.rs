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

//! Stores, folders, and the summaries that describe their contents.

pub mod backend;
mod folder;
pub mod index;
mod model;
mod registry;
#[allow(clippy::module_inception)]
mod store;
pub mod summary;
pub mod uri;
mod vee;

pub use self::backend::INBOX_NAME;
pub use self::folder::{ChangeListener, Folder, ListenerId};
pub use self::model::{
    FolderChanges, FolderInfo, FolderInfoFlags, GetFolderFlags,
    GetFolderInfoFlags, MessageInfo, SystemFlags, Uid, VeeFolderFlags, VeeUid,
};
pub use self::registry::Registry;
pub use self::store::Store;
pub use self::summary::{FolderSummary, MessageSummaryEntry};
pub use self::uri::{Scheme, StoreUri};
pub use self::vee::VeeFolder;
