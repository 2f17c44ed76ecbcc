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

/// Determine whether the given folder path segment is "safe".
///
/// This is used to validate the components of folder names, which are used
/// directly as file system elements. It excludes empty names and patterns that
/// cause directory traversal or other unwanted behaviours.
///
/// Names that collide with the storage bookkeeping of the local formats
/// (`cur`, `new`, `tmp` for maildir, `*.sbd` and `*.summary` for mbox) are
/// also rejected, since a folder with such a name would be indistinguishable
/// from the internals of its parent.
///
/// This does not care about whether the name is ultimately a valid file name;
/// for that, we simply rely on the OS rejecting it.
pub fn is_safe_name(name: &str) -> bool {
    !name.is_empty() &&
        // Block directory traversal through .. and creation of hidden files on
        // UNIX
        name.chars().next() != Some('.') &&
        name.find('/').is_none() &&
        // Only a path separator on Windows, but always block since it has high
        // potential of causing problems
        name.find('\\').is_none() &&
        // Don't allow any ASCII control characters
        name.find(|c| c < ' ' || c == '\x7F').is_none() &&
        !is_reserved(name)
}

fn is_reserved(name: &str) -> bool {
    "cur" == name
        || "new" == name
        || "tmp" == name
        || name.ends_with(".sbd")
        || name.ends_with(".summary")
        || name.ends_with(".index")
}

/// Determine whether every `/`-separated segment of `path` is safe.
pub fn is_safe_path(path: &str) -> bool {
    path.split('/').all(is_safe_name)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_is_safe_name() {
        assert!(is_safe_name("foo"));
        assert!(is_safe_name("PRN"));
        assert!(is_safe_name("Entwürfe"));
        assert!(is_safe_name("郵便"));
        assert!(is_safe_name("foo.bar"));
        assert!(is_safe_name("folder #1"));
        assert!(is_safe_name("current"));
        assert!(!is_safe_name(""));
        assert!(!is_safe_name("."));
        assert!(!is_safe_name(".."));
        assert!(!is_safe_name(".hidden"));
        assert!(!is_safe_name("foo/bar"));
        assert!(!is_safe_name("foo\\bar"));
        assert!(!is_safe_name("foo\0"));
        assert!(!is_safe_name("foo\r"));
        assert!(!is_safe_name("fo\x7Fo"));
        assert!(!is_safe_name("cur"));
        assert!(!is_safe_name("new"));
        assert!(!is_safe_name("tmp"));
        assert!(!is_safe_name("foo.sbd"));
        assert!(!is_safe_name("foo.summary"));
    }

    #[test]
    fn test_is_safe_path() {
        assert!(is_safe_path("foo"));
        assert!(is_safe_path("foo/bar/baz"));
        assert!(!is_safe_path("foo//bar"));
        assert!(!is_safe_path("foo/../bar"));
        assert!(!is_safe_path("/foo"));
        assert!(!is_safe_path("foo/"));
    }
}
