//! Union VFS: first-wins composition across an ordered list of packages
//! (spec §4.8).

use std::collections::HashSet;
use std::io::{self, Read, Seek};

use crate::error::{Error, Result};
use crate::path;
use crate::reader::{DirEntry, PackageReader, SectionReader};
use crate::tagset::TagsetRaw;

/// Prefix reserved for self-inspection of one member package's whole file,
/// e.g. `"wpk/0"` for the first member (spec §4.8).
const SELF_INSPECT_PREFIX: &str = "wpk/";

/// An ordered list of package views, composed first-wins: the first member
/// whose FTT contains a key wins it; later members are not consulted for
/// that key.
pub struct Union<S> {
    members: Vec<PackageReader<S>>,
    workspace: String,
}

impl<S> Clone for Union<S> {
    fn clone(&self) -> Self {
        Union {
            members: self.members.clone(),
            workspace: self.workspace.clone(),
        }
    }
}

impl<S: Read + Seek> Union<S> {
    pub fn new(members: Vec<PackageReader<S>>) -> Self {
        Union { members, workspace: String::new() }
    }

    pub fn members(&self) -> &[PackageReader<S>] {
        &self.members
    }

    fn self_inspect_index(&self, name: &str) -> Option<usize> {
        path::normalize(name).strip_prefix(SELF_INSPECT_PREFIX)?.parse::<usize>().ok()
    }

    pub fn stat(&self, name: &str) -> Result<TagsetRaw> {
        if let Some(idx) = self.self_inspect_index(name) {
            let member = self.members.get(idx).ok_or_else(|| Error::NotFound(name.to_owned()))?;
            let mut ts = member.ftt().new_tagset();
            ts.put(crate::tid::PATH, &crate::tag::TagRaw::from_str_val(name));
            return Ok(ts);
        }
        for member in &self.members {
            if let Ok(ts) = member.stat(name) {
                return Ok(ts);
            }
        }
        Err(Error::NotFound(name.to_owned()))
    }

    pub fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        if let Some(idx) = self.self_inspect_index(name) {
            let member = self.members.get(idx).ok_or_else(|| Error::NotFound(name.to_owned()))?;
            return member.whole_package_bytes();
        }
        for member in &self.members {
            if let Ok(bytes) = member.read_file(name) {
                return Ok(bytes);
            }
        }
        Err(Error::NotFound(name.to_owned()))
    }

    pub fn open(&self, name: &str) -> Result<SectionReader<S>> {
        if let Some(idx) = self.self_inspect_index(name) {
            let member = self.members.get(idx).ok_or_else(|| Error::NotFound(name.to_owned()))?;
            return member.whole_package_section();
        }
        for member in &self.members {
            if let Ok(section) = member.open(name) {
                return Ok(section);
            }
        }
        Err(Error::NotFound(name.to_owned()))
    }

    /// Merges synthetic directory entries across all members, first
    /// occurrence of a given name wins; `n` is applied to the merged result,
    /// not per member (spec §4.8).
    pub fn read_dir(&self, dir: &str, n: i64) -> Result<Vec<DirEntry>> {
        let mut seen = HashSet::new();
        let mut merged = Vec::new();
        for member in &self.members {
            for entry in member.read_dir(dir, -1)? {
                if seen.insert(entry.name()) {
                    merged.push(entry);
                }
            }
        }
        if n <= 0 {
            return Ok(merged);
        }
        let want = n as usize;
        if merged.len() < want {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "fewer directory entries than requested",
            )));
        }
        Ok(merged.into_iter().take(want).collect())
    }

    /// Deduplicated, first-wins glob across all members (spec §4.8).
    pub fn glob(&self, pattern: &str) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for member in &self.members {
            for key in member.glob(pattern)? {
                if seen.insert(key.clone()) {
                    out.push(key);
                }
            }
        }
        out.sort();
        Ok(out)
    }

    /// Deduplicated, first-wins listing of every real key across all
    /// members (spec §4.8).
    pub fn all_keys(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for member in &self.members {
            member.ftt().enum_entries(|k, _| {
                if seen.insert(k.to_owned()) {
                    out.push(k.to_owned());
                }
                true
            });
        }
        out.sort();
        out
    }

    /// Applies `sub` to every member, dropping those that don't contribute;
    /// fs-not-exist if none do (spec §4.8).
    pub fn sub(&self, dir: &str) -> Result<Self> {
        let contributing: Vec<_> = self.members.iter().filter_map(|m| m.sub(dir).ok()).collect();
        if contributing.is_empty() {
            return Err(Error::NotFound(dir.to_owned()));
        }
        Ok(Union {
            members: contributing,
            workspace: path::normalize(&path::join(&self.workspace, dir)),
        })
    }
}
