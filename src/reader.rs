//! Package reader / read-only virtual filesystem (spec §4.7).
//!
//! A reader owns a single backing stream, shared across every opened nested
//! file via [`SectionReader`]; closing the package closes the underlying
//! handle once (spec §5 "Shared resources").

use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::ftt::Ftt;
use crate::header::Header;
use crate::path;
use crate::tag::TagRaw;
use crate::tagset::TagsetRaw;
use crate::tid;

/// Reserved self-reference pseudo-path: opening it at the root of a package
/// view yields the whole package file (spec §4.7).
pub const SELF_REFERENCE: &str = "wpk";

struct Shared<S> {
    stream: Mutex<S>,
}

/// One synthesized or real directory entry, as returned by [`PackageReader::read_dir`].
#[derive(Debug, Clone)]
pub struct DirEntry {
    tagset: TagsetRaw,
}

impl DirEntry {
    pub fn name(&self) -> String {
        self.tagset.name()
    }

    pub fn is_dir(&self) -> bool {
        self.tagset.is_dir()
    }

    pub fn tagset(&self) -> &TagsetRaw {
        &self.tagset
    }
}

/// A read-only view over one package, rooted at `workspace` (empty for the
/// package root).
pub struct PackageReader<S> {
    shared: Arc<Shared<S>>,
    ftt: Arc<Ftt>,
    header: Header,
    workspace: String,
}

impl<S> Clone for PackageReader<S> {
    fn clone(&self) -> Self {
        PackageReader {
            shared: Arc::clone(&self.shared),
            ftt: Arc::clone(&self.ftt),
            header: self.header,
            workspace: self.workspace.clone(),
        }
    }
}

impl<S: Read + Seek> PackageReader<S> {
    /// Validates the header, reads the FTT from `fttoffset` to its
    /// zero-length terminator, and checks the byte count against `fttsize`
    /// exactly (spec §4.7; mismatch is `Error::SignFTT`).
    pub fn open_ftt(mut stream: S) -> Result<Self> {
        stream.seek(SeekFrom::Start(0))?;
        let header = Header::read_from(&mut stream)?;
        header.is_ready()?;

        stream.seek(SeekFrom::Start(header.ftt_offset))?;
        let ftt = Ftt::new(header.typesize);
        let read = ftt.read_from(&mut stream)?;
        if read != header.ftt_size {
            return Err(Error::SignFTT);
        }

        Ok(PackageReader {
            shared: Arc::new(Shared { stream: Mutex::new(stream) }),
            ftt: Arc::new(ftt),
            header,
            workspace: String::new(),
        })
    }

    pub fn ftt(&self) -> &Ftt {
        &self.ftt
    }

    pub fn workspace(&self) -> &str {
        &self.workspace
    }

    fn resolve(&self, name: &str) -> String {
        path::normalize(&path::join(&self.workspace, name))
    }

    fn is_self_reference(&self, name: &str) -> bool {
        self.workspace.is_empty() && path::normalize(name) == SELF_REFERENCE
    }

    fn whole_stream_len(&self) -> Result<u64> {
        let mut stream = self.shared.stream.lock();
        let len = stream.seek(SeekFrom::End(0))?;
        Ok(len)
    }

    /// The entire backing stream, regardless of this view's workspace — the
    /// operation behind both the `"wpk"` self-reference path (spec §4.7) and
    /// a union's `"wpk/<n>"` member self-inspection (spec §4.8).
    pub fn whole_package_bytes(&self) -> Result<Vec<u8>> {
        let len = self.whole_stream_len()?;
        let mut stream = self.shared.stream.lock();
        stream.seek(SeekFrom::Start(0))?;
        let mut buf = vec![0u8; len as usize];
        stream.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// A section reader over the entire backing stream; see
    /// [`PackageReader::whole_package_bytes`].
    pub fn whole_package_section(&self) -> Result<SectionReader<S>> {
        let len = self.whole_stream_len()?;
        Ok(SectionReader {
            shared: Arc::clone(&self.shared),
            start: 0,
            len,
            pos: 0,
        })
    }

    /// Whether `key` names a directory synthesized from flat FTT keys — true
    /// iff some entry other than the info entry shares `key` as a prefix
    /// (spec §4.7: "Synthetic directories are transient").
    fn synth_dir(&self, key: &str) -> Option<TagsetRaw> {
        let prefix = if key == "." { String::new() } else { format!("{key}/") };
        let mut found = false;
        self.ftt.enum_entries(|k, _| {
            if k != key && k.starts_with(prefix.as_str()) {
                found = true;
                return false;
            }
            true
        });
        if found {
            let mut ts = self.ftt.new_tagset();
            ts.put(tid::PATH, &TagRaw::from_str_val(key));
            Some(ts)
        } else {
            None
        }
    }

    /// Returns the tagset for `name`: a real FTT entry if present, else a
    /// synthesized directory tagset, else `Error::NotFound` (spec §4.7).
    pub fn stat(&self, name: &str) -> Result<TagsetRaw> {
        if self.is_self_reference(name) {
            let mut ts = self.ftt.new_tagset();
            ts.put(tid::PATH, &TagRaw::from_str_val(SELF_REFERENCE));
            return Ok(ts);
        }
        let key = self.resolve(name);
        if let Some(ts) = self.ftt.tagset(&key) {
            return Ok(ts);
        }
        self.synth_dir(&key).ok_or_else(|| Error::NotFound(name.to_owned()))
    }

    /// Reads the whole of `name` into memory. A defensive copy, per spec
    /// §4.7: callers never observe mutation of the backing stream.
    pub fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        if self.is_self_reference(name) {
            return self.whole_package_bytes();
        }
        let key = self.resolve(name);
        let ts = self.ftt.tagset(&key).ok_or_else(|| Error::NotFound(name.to_owned()))?;
        let (offset, size) = ts.pos().ok_or_else(|| Error::InvalidPath(name.to_owned()))?;
        let mut stream = self.shared.stream.lock();
        stream.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; size as usize];
        stream.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Opens a section reader scoped to `name`'s `[offset, offset+size)`
    /// range over the shared backing stream (spec §4.7).
    pub fn open(&self, name: &str) -> Result<SectionReader<S>> {
        if self.is_self_reference(name) {
            return self.whole_package_section();
        }
        let key = self.resolve(name);
        let ts = self.ftt.tagset(&key).ok_or_else(|| Error::NotFound(name.to_owned()))?;
        let (offset, size) = ts.pos().ok_or_else(|| Error::InvalidPath(name.to_owned()))?;
        Ok(SectionReader {
            shared: Arc::clone(&self.shared),
            start: offset,
            len: size,
            pos: 0,
        })
    }

    /// A shallow clone rooted at `join(workspace, dir)`. The sub-tree must
    /// contain at least one entry, or it is fs-not-exist (spec §4.7).
    pub fn sub(&self, dir: &str) -> Result<Self> {
        let new_workspace = path::normalize(&path::join(&self.workspace, dir));
        if new_workspace != "." && self.synth_dir(&new_workspace).is_none() && !self.ftt.has_tagset(&new_workspace) {
            return Err(Error::NotFound(dir.to_owned()));
        }
        Ok(PackageReader {
            shared: Arc::clone(&self.shared),
            ftt: Arc::clone(&self.ftt),
            header: self.header,
            workspace: new_workspace,
        })
    }

    fn collect_dir_entries(&self, dir: &str) -> Vec<DirEntry> {
        let base = path::normalize(&path::join(&self.workspace, dir));
        let prefix = if base == "." { String::new() } else { format!("{base}/") };

        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        self.ftt.enum_entries(|k, ts| {
            if k == "." {
                return true;
            }
            if let Some(rest) = k.strip_prefix(prefix.as_str()) {
                if rest.is_empty() {
                    return true;
                }
                match rest.find('/') {
                    None => {
                        if seen.insert(rest.to_owned()) {
                            out.push(DirEntry { tagset: ts.clone() });
                        }
                    }
                    Some(idx) => {
                        let component = &rest[..idx];
                        if seen.insert(component.to_owned()) {
                            let mut synth = self.ftt.new_tagset();
                            synth.put(tid::PATH, &TagRaw::from_str_val(&format!("{prefix}{component}")));
                            out.push(DirEntry { tagset: synth });
                        }
                    }
                }
            }
            true
        });
        out
    }

    /// Directory synthesis over flat FTT keys (spec §4.7). `n < 0` returns
    /// every entry; `n > 0` returns at most `n`, or `Error::Io` wrapping
    /// `UnexpectedEof` if fewer than `n` entries exist — a quirk carried
    /// unchanged from the source convention.
    pub fn read_dir(&self, dir: &str, n: i64) -> Result<Vec<DirEntry>> {
        let entries = self.collect_dir_entries(dir);
        if n <= 0 {
            return Ok(entries);
        }
        let want = n as usize;
        if entries.len() < want {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "fewer directory entries than requested",
            )));
        }
        Ok(entries.into_iter().take(want).collect())
    }

    /// Shell-style glob (`*`, `?`, character classes; no `**`) over
    /// normalized FTT keys under the current workspace (spec §4.7).
    pub fn glob(&self, pattern: &str) -> Result<Vec<String>> {
        let full = path::normalize(&path::join(&self.workspace, pattern));
        let matcher = globset::Glob::new(&full)
            .map_err(|e| Error::InvalidPath(e.to_string()))?
            .compile_matcher();
        let mut out = Vec::new();
        self.ftt.enum_entries(|k, _| {
            if matcher.is_match(k) {
                out.push(k.to_owned());
            }
            true
        });
        out.sort();
        Ok(out)
    }
}

impl PackageReader<io::Cursor<memmap2::Mmap>> {
    /// Memory-maps `path` and opens it as a package. Repeated section reads
    /// over the mapped region avoid re-issuing file reads for bytes already
    /// resident (spec §1's abstract-stream core works over any `Read + Seek`;
    /// this is the file-backed convenience layer on top of it).
    pub fn open_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let mmap = unsafe { memmap2::Mmap::map(&file)? };
        Self::open_ftt(io::Cursor::new(mmap))
    }
}

/// A `Read` view scoped to one entry's `[offset, offset+size)` range over a
/// package's shared backing stream.
pub struct SectionReader<S> {
    shared: Arc<Shared<S>>,
    start: u64,
    len: u64,
    pos: u64,
}

impl<S> SectionReader<S> {
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<S: Read + Seek> Read for SectionReader<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.len {
            return Ok(0);
        }
        let remaining = (self.len - self.pos) as usize;
        let want = remaining.min(buf.len());
        let mut stream = self.shared.stream.lock();
        stream.seek(SeekFrom::Start(self.start + self.pos))?;
        let n = stream.read(&mut buf[..want])?;
        self.pos += n as u64;
        Ok(n)
    }
}
