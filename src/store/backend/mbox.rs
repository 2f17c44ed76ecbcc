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

//! mbox and spool stores.
//!
//! In an mbox store every folder is a single file in mboxrd format. The
//! children of `foo` live in the directory `foo.sbd` next to it, and the
//! summary and index of `foo` in `foo.summary` and `foo.index`.
//!
//! A spool store is a single mbox file, typically in `/var/mail`, exposed as
//! the Inbox.
//!
//! Each message carries its UID in an `X-Letterbox-Uid` header, which is
//! invisible to readers of the message. Messages found without one are
//! numbered and the file rewritten when the folder is scanned.

use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::prelude::*;
use log::{debug, warn};

use super::*;
use crate::filter::{
    FilterReader, FilterWriter, FromQuoteFilter, FromQuoteMode,
    HeaderStripFilter,
};
use crate::mime::header::split_headers;
use crate::support::file_ops::{self, ErrorTransforms, IgnoreKinds};

const UID_HEADER: &str = "X-Letterbox-Uid";
const FROM_SENDER: &str = "letterbox@localhost";
const ASCTIME: &str = "%a %b %e %H:%M:%S %Y";

pub struct MboxBackend {
    root: PathBuf,
}

impl MboxBackend {
    pub fn open(root: &Path) -> Result<Self, Error> {
        fs::create_dir_all(root)?;
        Ok(MboxBackend {
            root: root.to_owned(),
        })
    }

    fn folder_file(&self, full_name: &str) -> PathBuf {
        nested_path(&self.root, full_name, |s, last| {
            if last {
                s.to_owned()
            } else {
                format!("{}.sbd", s)
            }
        })
    }

    fn sibling(&self, full_name: &str, suffix: &str) -> PathBuf {
        let mut path = self.folder_file(full_name).into_os_string();
        path.push(suffix);
        path.into()
    }

    fn children_dir(&self, full_name: &str) -> PathBuf {
        if full_name.is_empty() {
            self.root.clone()
        } else {
            self.sibling(full_name, ".sbd")
        }
    }

    fn create_file(&self, full_name: &str) -> Result<(), Error> {
        if let Some(parent) = self.folder_file(full_name).parent() {
            fs::create_dir_all(parent)?;
        }
        fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.folder_file(full_name))
            .on_exists(Error::FolderExists)?;
        Ok(())
    }
}

impl Backend for MboxBackend {
    fn has_inbox(&self) -> bool {
        false
    }

    fn folder_exists(&self, full_name: &str) -> bool {
        !full_name.is_empty() && self.folder_file(full_name).is_file()
    }

    fn create_folder(&self, full_name: &str) -> Result<(), Error> {
        let mut prefix = String::new();
        let mut parts = full_name.split('/').peekable();
        while let Some(part) = parts.next() {
            prefix = child_name(&prefix, part);
            if parts.peek().is_some() && !self.folder_exists(&prefix) {
                self.create_file(&prefix)?;
            }
        }
        self.create_file(full_name)
    }

    fn delete_folder(&self, full_name: &str) -> Result<(), Error> {
        fs::remove_file(self.folder_file(full_name))
            .on_not_found(Error::NxFolder)?;
        fs::remove_file(self.sibling(full_name, ".summary"))
            .ignore_not_found()?;
        fs::remove_file(self.sibling(full_name, ".index")).ignore_not_found()?;
        fs::remove_dir_all(self.children_dir(full_name)).ignore_not_found()?;
        Ok(())
    }

    fn rename_folder(&self, old: &str, new: &str) -> Result<(), Error> {
        if let Some(parent) = parent_name(new) {
            if !self.folder_exists(parent) {
                self.create_folder(parent)?;
            }
        }
        if let Some(dir) = self.folder_file(new).parent() {
            fs::create_dir_all(dir)?;
        }

        fs::rename(self.folder_file(old), self.folder_file(new))
            .on_not_found(Error::NxFolder)?;
        for suffix in &[".sbd", ".summary", ".index"] {
            fs::rename(self.sibling(old, suffix), self.sibling(new, suffix))
                .ignore_not_found()?;
        }
        Ok(())
    }

    fn list_children(&self, parent: &str) -> Result<Vec<String>, Error> {
        Ok(list_dir(&self.children_dir(parent), |_, entry| {
            entry.file_type().map_or(false, |t| t.is_file())
        })?
        .into_iter()
        .map(|name| child_name(parent, &name))
        .collect())
    }

    fn open(&self, full_name: &str) -> Box<dyn MessageStore> {
        Box::new(MboxMessages::new(self.folder_file(full_name)))
    }

    fn summary_path(&self, full_name: &str) -> PathBuf {
        self.sibling(full_name, ".summary")
    }

    fn index_path(&self, full_name: &str) -> PathBuf {
        self.sibling(full_name, ".index")
    }
}

pub struct SpoolBackend {
    file: PathBuf,
}

impl SpoolBackend {
    pub fn open(file: &Path) -> Result<Self, Error> {
        if !file.is_file() {
            return Err(Error::NxStore);
        }

        Ok(SpoolBackend {
            file: file.to_owned(),
        })
    }

    fn hidden_sibling(&self, suffix: &str) -> PathBuf {
        let name = self
            .file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.file.with_file_name(format!(".{}{}", name, suffix))
    }
}

impl Backend for SpoolBackend {
    fn has_inbox(&self) -> bool {
        true
    }

    fn folder_exists(&self, full_name: &str) -> bool {
        INBOX_NAME == full_name && self.file.is_file()
    }

    fn create_folder(&self, _: &str) -> Result<(), Error> {
        Err(Error::Unsupported("creating folders in a spool"))
    }

    fn delete_folder(&self, _: &str) -> Result<(), Error> {
        Err(Error::Unsupported("deleting folders in a spool"))
    }

    fn rename_folder(&self, _: &str, _: &str) -> Result<(), Error> {
        Err(Error::Unsupported("renaming folders in a spool"))
    }

    fn list_children(&self, _: &str) -> Result<Vec<String>, Error> {
        Ok(vec![])
    }

    fn open(&self, _: &str) -> Box<dyn MessageStore> {
        Box::new(MboxMessages::new(self.file.clone()))
    }

    fn summary_path(&self, _: &str) -> PathBuf {
        self.hidden_sibling(".letterbox-summary")
    }

    fn index_path(&self, _: &str) -> PathBuf {
        self.hidden_sibling(".letterbox-index")
    }
}

/// One message as found in an mbox file.
struct RawMessage {
    uid: Option<Uid>,
    date_received: Option<i64>,
    /// The message as the user sees it.
    data: Vec<u8>,
    /// Where the message is in the file, excluding the `From ` line.
    region: (u64, u64),
}

struct MboxMessages {
    path: PathBuf,
    /// The byte range in the file of each message, excluding its `From `
    /// line.
    offsets: BTreeMap<Uid, (u64, u64)>,
}

/// Find the start of each `From ` line in `data`.
///
/// A `From ` line only separates messages at the start of the file or after
/// a blank line, which keeps stray unquoted `From ` lines in bodies from
/// splitting messages.
fn separators(data: &[u8]) -> Vec<usize> {
    let mut seps = Vec::new();
    if data.starts_with(b"From ") {
        seps.push(0);
    }
    for ix in memchr::memmem::find_iter(data, b"\n\nFrom ") {
        seps.push(ix + 2);
    }
    seps
}

fn from_line(date_received: i64) -> String {
    let date = Utc
        .timestamp_opt(date_received, 0)
        .single()
        .unwrap_or_else(Utc::now);
    format!("From {} {}\n", FROM_SENDER, date.format(ASCTIME))
}

fn parse_from_line(line: &[u8]) -> Option<i64> {
    let line = std::str::from_utf8(line).ok()?;
    let rest = line.trim_end().strip_prefix("From ")?;
    let date = rest.splitn(2, ' ').nth(1)?.trim();
    NaiveDateTime::parse_from_str(date, ASCTIME)
        .ok()
        .map(|dt| Utc.from_utc_datetime(&dt).timestamp())
}

/// Turn `data` into the form it takes in the file, excluding the `From `
/// line.
fn encode(uid: Uid, data: &[u8]) -> Result<Vec<u8>, Error> {
    let mut writer = FilterWriter::new(Vec::with_capacity(data.len() + 64))
        .with(FromQuoteFilter::new(FromQuoteMode::Quote));
    writeln!(writer, "{}: {}", UID_HEADER, uid)?;
    writer.write_all(data)?;
    if !data.ends_with(b"\n") {
        writer.write_all(b"\n")?;
    }
    let mut encoded = writer.finish()?;
    encoded.push(b'\n');
    Ok(encoded)
}

/// Undo `encode`.
fn decode(region: &[u8]) -> Result<(Option<Uid>, Vec<u8>), Error> {
    // The blank line before the next `From `
    let region = region.strip_suffix(b"\n").unwrap_or(region);
    let mut reader = FilterReader::new(region)
        .with(FromQuoteFilter::new(FromQuoteMode::Unquote));
    let mut unquoted = Vec::with_capacity(region.len());
    reader.read_to_end(&mut unquoted)?;

    let (headers, _) = split_headers(&unquoted);
    let uid = headers
        .iter()
        .find(|h| h.is(UID_HEADER))
        .and_then(|h| h.value().parse::<Uid>().ok());
    if uid.is_none() {
        return Ok((None, unquoted));
    }

    let mut reader = FilterReader::new(&unquoted[..])
        .with(HeaderStripFilter::new(UID_HEADER));
    let mut data = Vec::with_capacity(unquoted.len());
    reader.read_to_end(&mut data)?;
    Ok((uid, data))
}

impl MboxMessages {
    fn new(path: PathBuf) -> Self {
        MboxMessages {
            path,
            offsets: BTreeMap::new(),
        }
    }

    fn parse(&self) -> Result<Vec<RawMessage>, Error> {
        let data = fs::read(&self.path).on_not_found(Error::NxFolder)?;
        let seps = separators(&data);
        let mut messages = Vec::with_capacity(seps.len());
        for (ix, &start) in seps.iter().enumerate() {
            let end = seps.get(ix + 1).copied().unwrap_or(data.len());
            let line_end = memchr::memchr(b'\n', &data[start..end])
                .map_or(end, |p| start + p + 1);
            let (uid, message) = decode(&data[line_end..end])?;
            messages.push(RawMessage {
                uid,
                date_received: parse_from_line(&data[start..line_end]),
                data: message,
                region: (line_end as u64, end as u64),
            });
        }
        Ok(messages)
    }

    /// Replace the file with `messages`, all of which must have a UID.
    fn rewrite(&mut self, messages: &[RawMessage]) -> Result<(), Error> {
        let mut out = Vec::new();
        self.offsets.clear();
        for message in messages {
            let uid = match message.uid {
                Some(uid) => uid,
                None => continue,
            };
            out.extend_from_slice(
                from_line(message.date_received.unwrap_or_else(now)).as_bytes(),
            );
            let start = out.len() as u64;
            out.extend_from_slice(&encode(uid, &message.data)?);
            self.offsets.insert(uid, (start, out.len() as u64));
        }
        file_ops::spit(&self.path, true, false, &out)?;
        Ok(())
    }
}

impl MessageStore for MboxMessages {
    fn scan(
        &mut self,
        summary: &mut FolderSummary,
    ) -> Result<Vec<ScannedMessage>, Error> {
        let mut messages = self.parse()?;
        let mut seen = std::collections::HashSet::new();
        for message in &mut messages {
            if let Some(uid) = message.uid {
                if seen.insert(uid) {
                    summary.reserve_uid(uid);
                } else {
                    warn!("{}: duplicate UID {}", self.path.display(), uid);
                    message.uid = None;
                }
            }
        }

        let mut renumbered = false;
        for message in &mut messages {
            if message.uid.is_none() {
                message.uid = Some(summary.allocate_uid()?);
                renumbered = true;
            }
        }

        let mtime = mtime(&self.path);
        if renumbered {
            debug!("{}: numbering new messages", self.path.display());
            self.rewrite(&messages)?;
        } else {
            self.offsets = messages
                .iter()
                .filter_map(|m| m.uid.map(|uid| (uid, m.region)))
                .collect();
        }

        Ok(messages
            .iter()
            .filter_map(|m| {
                m.uid.map(|uid| ScannedMessage {
                    uid,
                    size: m.data.len() as u64,
                    date_received: m.date_received.unwrap_or(mtime),
                    flags: None,
                })
            })
            .collect())
    }

    fn read(&mut self, uid: Uid) -> Result<Vec<u8>, Error> {
        let (start, end) = *self.offsets.get(&uid).ok_or(Error::NxMessage)?;
        let mut file =
            fs::File::open(&self.path).on_not_found(Error::NxMessage)?;
        file.seek(SeekFrom::Start(start))?;
        let mut region = vec![0u8; (end - start) as usize];
        file.read_exact(&mut region)?;
        Ok(decode(&region)?.1)
    }

    fn append(
        &mut self,
        uid: Uid,
        data: &[u8],
        _flags: SystemFlags,
    ) -> Result<u64, Error> {
        let mut file = fs::OpenOptions::new()
            .read(true)
            .append(true)
            .open(&self.path)
            .on_not_found(Error::FolderInvalidated)?;

        let len = file.metadata()?.len();
        let mut out = Vec::with_capacity(data.len() + 128);
        // Make sure the new `From ` line follows a blank line
        if len > 0 {
            let mut tail = [0u8; 2];
            let tail_len = len.min(2) as usize;
            file.seek(SeekFrom::Start(len - tail_len as u64))?;
            file.read_exact(&mut tail[..tail_len])?;
            match &tail[..tail_len] {
                b"\n\n" => (),
                [.., b'\n'] => out.push(b'\n'),
                _ => out.extend_from_slice(b"\n\n"),
            }
        }

        out.extend_from_slice(from_line(now()).as_bytes());
        let start = len + out.len() as u64;
        out.extend_from_slice(&encode(uid, data)?);
        file.write_all(&out)?;

        self.offsets.insert(uid, (start, len + out.len() as u64));
        Ok(data.len() as u64)
    }

    fn remove(&mut self, uids: &[Uid]) -> Result<(), Error> {
        if !uids.iter().any(|uid| self.offsets.contains_key(uid)) {
            return Ok(());
        }

        let mut messages = self.parse()?;
        messages.retain(|m| m.uid.map_or(false, |uid| !uids.contains(&uid)));
        self.rewrite(&messages)
    }
}
