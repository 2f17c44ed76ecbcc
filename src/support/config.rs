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

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::Error;
use super::file_ops;

/// The name of the optional configuration file in a store root.
pub const STORE_CONFIG_FILE: &str = "letterbox.toml";

/// Per-store configuration.
///
/// This is read from `letterbox.toml` at the root of a store, if present.
/// Every section may be omitted.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Options controlling the persistence of folder summaries.
    #[serde(default)]
    pub summary: SummaryConfig,

    /// Options controlling body indexing.
    #[serde(default)]
    pub index: IndexConfig,

    /// Options specific to maildir stores.
    #[serde(default)]
    pub maildir: MaildirConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct SummaryConfig {
    /// If true, the summary of a folder is written out when the last handle
    /// to it is released.
    ///
    /// When false, only explicit `sync` calls persist the summary, and
    /// in-memory changes not yet synced are lost when the folder is closed.
    pub sync_on_release: bool,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        SummaryConfig {
            sync_on_release: true,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct IndexConfig {
    /// If true, every folder is opened as if `BODY_INDEX` had been requested.
    pub body_index_by_default: bool,
    /// Words shorter than this many characters are not indexed.
    pub min_word_len: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            body_index_by_default: false,
            min_word_len: 1,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct MaildirConfig {
    /// If true, newly delivered message files are flushed to stable storage
    /// before they are moved into place.
    pub fsync: bool,
}

impl StoreConfig {
    /// Load the configuration for the store rooted at `root`.
    ///
    /// A missing file yields the default configuration.
    pub fn load(root: &Path) -> Result<Self, Error> {
        match file_ops::slurp_opt(root.join(STORE_CONFIG_FILE))? {
            None => Ok(StoreConfig::default()),
            Some(data) => Ok(toml::from_slice(&data)?),
        }
    }
}

/// Configuration for the command-line wrapper.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CliConfig {
    /// A log4rs configuration file. If unset, logs go to standard error.
    pub log_config: Option<PathBuf>,
}

impl CliConfig {
    pub fn load(path: &Path) -> Result<Self, Error> {
        match file_ops::slurp_opt(path)? {
            None => Ok(CliConfig::default()),
            Some(data) => Ok(toml::from_slice(&data)?),
        }
    }
}
