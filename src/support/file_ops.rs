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

//! Miscellaneous functions for working with files.

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use crate::support::error::Error;

/// Write `data` into the file at `path`, atomically.
///
/// The file is first staged as a temporary file in the same directory as
/// `path` so that the final rename never crosses a file system boundary.
///
/// If `overwrite` is true, this will replace anything already at `path`. If
/// false, the call will fail if `path` already exists.
pub fn spit(
    path: impl AsRef<Path>,
    overwrite: bool,
    fsync: bool,
    data: &[u8],
) -> io::Result<()> {
    let path = path.as_ref();
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tf = tempfile::NamedTempFile::new_in(dir)?;
    tf.as_file_mut().write_all(data)?;
    if fsync {
        tf.as_file_mut().sync_all()?;
    }
    if overwrite {
        tf.persist(path)?;
    } else {
        tf.persist_noclobber(path)?;
    }
    Ok(())
}

/// Read the whole file at `path`, returning `None` if it does not exist.
pub fn slurp_opt(path: impl AsRef<Path>) -> io::Result<Option<Vec<u8>>> {
    match fs::File::open(path) {
        Ok(mut f) => {
            let mut data = Vec::new();
            f.read_to_end(&mut data)?;
            Ok(Some(data))
        }
        Err(e) if io::ErrorKind::NotFound == e.kind() => Ok(None),
        Err(e) => Err(e),
    }
}

pub trait IgnoreKinds {
    fn ignore_already_exists(self) -> Self;
    fn ignore_not_found(self) -> Self;
}

impl<R: Default> IgnoreKinds for Result<R, io::Error> {
    fn ignore_already_exists(self) -> Self {
        match self {
            Ok(r) => Ok(r),
            Err(e) if io::ErrorKind::AlreadyExists == e.kind() => {
                Ok(R::default())
            }
            Err(e) => Err(e),
        }
    }

    fn ignore_not_found(self) -> Self {
        match self {
            Ok(r) => Ok(r),
            Err(e) if io::ErrorKind::NotFound == e.kind() => Ok(R::default()),
            Err(e) => Err(e),
        }
    }
}

pub trait ErrorTransforms {
    type Coerced;
    fn on_exists(self, error: Error) -> Self::Coerced;
    fn on_not_found(self, error: Error) -> Self::Coerced;
}

impl<R, E: Into<Error>> ErrorTransforms for Result<R, E> {
    type Coerced = Result<R, Error>;

    fn on_exists(self, error: Error) -> Result<R, Error> {
        match self.map_err(|e| e.into()) {
            Err(Error::Io(e)) if io::ErrorKind::AlreadyExists == e.kind() => {
                Err(error)
            }
            s => s,
        }
    }

    fn on_not_found(self, error: Error) -> Result<R, Error> {
        match self.map_err(|e| e.into()) {
            Err(Error::Io(e)) if io::ErrorKind::NotFound == e.kind() => {
                Err(error)
            }
            s => s,
        }
    }
}

#[cfg(test)]
mod test {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn spit_and_slurp() {
        let tmpdir = TempDir::new().unwrap();
        let path = tmpdir.path().join("foo");

        assert_eq!(None, slurp_opt(&path).unwrap());
        spit(&path, false, false, b"hello").unwrap();
        assert_eq!(Some(b"hello".to_vec()), slurp_opt(&path).unwrap());

        assert!(spit(&path, false, false, b"world").is_err());
        spit(&path, true, true, b"world").unwrap();
        assert_eq!(Some(b"world".to_vec()), slurp_opt(&path).unwrap());
    }

    #[test]
    fn error_transforms() {
        let tmpdir = TempDir::new().unwrap();
        assert_matches!(
            Err(Error::NxFolder),
            fs::File::open(tmpdir.path().join("nx"))
                .on_not_found(Error::NxFolder)
        );
        assert_matches!(
            Err(Error::FolderExists),
            fs::create_dir(tmpdir.path()).on_exists(Error::FolderExists)
        );
        fs::remove_file(tmpdir.path().join("nx"))
            .ignore_not_found()
            .unwrap();
    }
}
