//! `TagsetRaw` — a length-prefixed sequence of `(TID, value)` pairs forming
//! one FTT entry (spec §4.3).
//!
//! The buffer *is* the canonical form: no auxiliary map backs it, exactly as
//! spec §3 requires ("the buffer itself is the canonical form (no auxiliary
//! map)"). Every operation walks or splices the raw bytes directly.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Error, Result, TagFault};
use crate::tag::TagRaw;
use crate::tid;

/// One `(TID, size, bytes)` triple as stored on the wire.
#[derive(Clone, Debug)]
pub struct TagsetRaw {
    data: Vec<u8>,
    tid_width: u8,
    tagsize_width: u8,
}

impl TagsetRaw {
    /// An empty tagset bound to the given TID/tag-size widths.
    pub fn new(tid_width: u8, tagsize_width: u8) -> Self {
        TagsetRaw {
            data: Vec::new(),
            tid_width,
            tagsize_width,
        }
    }

    /// Wraps an already-encoded buffer. Does not validate framing; callers
    /// that read buffers from an untrusted source should walk
    /// [`TagsetRaw::iterator`] to completion and check
    /// [`Iter::failed`] before trusting the result (this is what
    /// [`crate::ftt::Ftt::read_from`] does).
    pub fn from_raw(data: Vec<u8>, tid_width: u8, tagsize_width: u8) -> Self {
        TagsetRaw {
            data,
            tid_width,
            tagsize_width,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn tid_width(&self) -> u8 {
        self.tid_width
    }

    pub fn tagsize_width(&self) -> u8 {
        self.tagsize_width
    }

    /// A restartable iterator over `(TID, TagRaw)` pairs in buffer order.
    pub fn iterator(&self) -> Iter<'_> {
        Iter {
            data: &self.data,
            pos: 0,
            tid_width: self.tid_width,
            tagsize_width: self.tagsize_width,
            failed: false,
            done: false,
        }
    }

    pub fn get(&self, tid: u32) -> Option<TagRaw> {
        self.iterator().find(|(t, _)| *t == tid).map(|(_, v)| v)
    }

    pub fn has(&self, tid: u32) -> bool {
        self.iterator().any(|(t, _)| t == tid)
    }

    /// Appends `tag` under `tid` without deduplication — callers wanting a
    /// single value per TID should use [`TagsetRaw::set`] instead.
    pub fn put(&mut self, tid: u32, tag: &TagRaw) -> &mut Self {
        encode_triple(&mut self.data, tid, tag.as_bytes(), self.tid_width, self.tagsize_width);
        self
    }

    /// Replaces the first occurrence of `tid` in place if the new value's
    /// length equals the old one's; otherwise removes the old occurrence
    /// and appends the new one at the end. Returns whether an existing tag
    /// was replaced (`false` means this was a fresh insert).
    pub fn set(&mut self, tid: u32, tag: &TagRaw) -> bool {
        if let Some(span) = self.find_span(tid) {
            let old_val_len = span.val_end - span.val_start;
            let new_val = tag.as_bytes();
            if new_val.len() == old_val_len {
                self.data[span.val_start..span.val_end].copy_from_slice(new_val);
                return true;
            }
            self.data.drain(span.start..span.end);
            encode_triple(&mut self.data, tid, new_val, self.tid_width, self.tagsize_width);
            return true;
        }
        self.put(tid, tag);
        false
    }

    /// Removes the first occurrence of `tid`, splicing the buffer. Returns
    /// whether a tag was actually removed.
    pub fn del(&mut self, tid: u32) -> bool {
        if let Some(span) = self.find_span(tid) {
            self.data.drain(span.start..span.end);
            true
        } else {
            false
        }
    }

    fn find_span(&self, tid: u32) -> Option<Span> {
        let mut pos = 0usize;
        loop {
            if pos >= self.data.len() {
                return None;
            }
            let tid_width = self.tid_width as usize;
            let tagsize_width = self.tagsize_width as usize;
            if pos + tid_width + tagsize_width > self.data.len() {
                return None;
            }
            let this_tid = crate::codec::decode_uint(&self.data[pos..pos + tid_width], self.tid_width)? as u32;
            let val_len = crate::codec::decode_uint(
                &self.data[pos + tid_width..pos + tid_width + tagsize_width],
                self.tagsize_width,
            )? as usize;
            let val_start = pos + tid_width + tagsize_width;
            let val_end = val_start + val_len;
            if val_end > self.data.len() {
                return None;
            }
            if this_tid == tid {
                return Some(Span {
                    start: pos,
                    end: val_end,
                    val_start,
                    val_end,
                });
            }
            pos = val_end;
        }
    }

    // ── Convenience accessors ───────────────────────────────────────

    pub fn path(&self) -> Option<String> {
        self.get(tid::PATH).and_then(|t| t.as_str().map(str::to_owned))
    }

    pub fn offset(&self) -> Option<u64> {
        self.get(tid::OFFSET).and_then(|t| t.as_uint())
    }

    pub fn size(&self) -> Option<u64> {
        self.get(tid::SIZE).and_then(|t| t.as_uint())
    }

    pub fn pos(&self) -> Option<(u64, u64)> {
        Some((self.offset()?, self.size()?))
    }

    pub fn fid(&self) -> Option<u64> {
        self.get(tid::FID).and_then(|t| t.as_uint())
    }

    // ── FileInfo / DirEntry surface ─────────────────────────────────

    /// Basename of `path()`, or an empty string if no path tag is set.
    pub fn name(&self) -> String {
        match self.path() {
            Some(p) => p.rsplit('/').next().unwrap_or("").to_owned(),
            None => String::new(),
        }
    }

    /// True only for synthesized directory tagsets: a tagset with a `PATH`
    /// but no `OFFSET` is never a real data entry (every real entry has
    /// `OFFSET` enforced by `Ftt::check_tagset`), so its absence marks a
    /// directory synthesized at read time (spec §4.3, §4.7).
    pub fn is_dir(&self) -> bool {
        self.has(tid::PATH) && !self.has(tid::OFFSET)
    }

    pub fn mod_time(&self) -> SystemTime {
        self.get(tid::MTIME).and_then(|t| t.as_time()).unwrap_or(UNIX_EPOCH)
    }

    /// Validates this tagset's framing is well-formed by walking it to
    /// completion; returns `Err(Error::SignFTT)` on a truncated buffer.
    pub fn validate_framing(&self) -> Result<()> {
        let mut it = self.iterator();
        for _ in it.by_ref() {}
        if it.failed() {
            Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "tagset buffer truncated mid-triple",
            )))
        } else {
            Ok(())
        }
    }
}

struct Span {
    start: usize,
    end: usize,
    val_start: usize,
    val_end: usize,
}

fn encode_triple(out: &mut Vec<u8>, tid: u32, value: &[u8], tid_width: u8, tagsize_width: u8) {
    if let Some(bytes) = crate::codec::encode_uint(tid as u64, tid_width) {
        out.extend_from_slice(&bytes);
    }
    if let Some(bytes) = crate::codec::encode_uint(value.len() as u64, tagsize_width) {
        out.extend_from_slice(&bytes);
    }
    out.extend_from_slice(value);
}

/// Restartable iterator over `(TID, TagRaw)` pairs. Sets [`Iter::failed`]
/// once it encounters a truncated triple instead of panicking (spec §4.3:
/// "reports a terminal `failed` flag if the buffer is truncated
/// mid-triple").
pub struct Iter<'a> {
    data: &'a [u8],
    pos: usize,
    tid_width: u8,
    tagsize_width: u8,
    failed: bool,
    done: bool,
}

impl<'a> Iter<'a> {
    pub fn failed(&self) -> bool {
        self.failed
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = (u32, TagRaw);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.failed {
            return None;
        }
        if self.pos == self.data.len() {
            self.done = true;
            return None;
        }
        let tid_width = self.tid_width as usize;
        let tagsize_width = self.tagsize_width as usize;
        if self.pos + tid_width + tagsize_width > self.data.len() {
            self.failed = true;
            self.done = true;
            return None;
        }
        let tid = match crate::codec::decode_uint(&self.data[self.pos..self.pos + tid_width], self.tid_width) {
            Some(v) => v as u32,
            None => {
                self.failed = true;
                self.done = true;
                return None;
            }
        };
        let val_len = match crate::codec::decode_uint(
            &self.data[self.pos + tid_width..self.pos + tid_width + tagsize_width],
            self.tagsize_width,
        ) {
            Some(v) => v as usize,
            None => {
                self.failed = true;
                self.done = true;
                return None;
            }
        };
        let val_start = self.pos + tid_width + tagsize_width;
        let val_end = val_start + val_len;
        if val_end > self.data.len() {
            self.failed = true;
            self.done = true;
            return None;
        }
        self.pos = val_end;
        Some((tid, TagRaw::from_raw(&self.data[val_start..val_end])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts() -> TagsetRaw {
        TagsetRaw::new(2, 2)
    }

    #[test]
    fn put_get_has() {
        let mut t = ts();
        t.put(tid::PATH, &TagRaw::from_str_val("a/b.txt"));
        assert!(t.has(tid::PATH));
        assert_eq!(t.path(), Some("a/b.txt".to_owned()));
        assert!(!t.has(tid::SIZE));
    }

    #[test]
    fn set_same_length_replaces_in_place() {
        let mut t = ts();
        t.put(tid::SIZE, &TagRaw::from_uint_width(10, 4).unwrap());
        let before_len = t.data().len();
        let replaced = t.set(tid::SIZE, &TagRaw::from_uint_width(20, 4).unwrap());
        assert!(replaced);
        assert_eq!(t.data().len(), before_len);
        assert_eq!(t.get(tid::SIZE).unwrap().as_uint_width(4), Some(20));
    }

    #[test]
    fn set_different_length_moves_to_end() {
        let mut t = ts();
        t.put(tid::PATH, &TagRaw::from_str_val("x"));
        t.put(tid::SIZE, &TagRaw::from_uint_width(1, 1).unwrap());
        let replaced = t.set(tid::SIZE, &TagRaw::from_uint_width(100000, 4).unwrap());
        assert!(replaced);
        assert_eq!(t.get(tid::SIZE).unwrap().as_uint_width(4), Some(100000));
        assert_eq!(t.path(), Some("x".to_owned()));
    }

    #[test]
    fn del_removes_first_occurrence() {
        let mut t = ts();
        t.put(tid::LABEL, &TagRaw::from_str_val("one"));
        t.put(tid::LABEL, &TagRaw::from_str_val("two"));
        assert!(t.del(tid::LABEL));
        assert_eq!(t.get(tid::LABEL).unwrap().as_str(), Some("two"));
    }

    #[test]
    fn put_allows_duplicates_get_returns_first() {
        let mut t = ts();
        t.put(tid::LABEL, &TagRaw::from_str_val("first"));
        t.put(tid::LABEL, &TagRaw::from_str_val("second"));
        assert_eq!(t.get(tid::LABEL).unwrap().as_str(), Some("first"));
    }

    #[test]
    fn iterator_is_restartable() {
        let mut t = ts();
        t.put(tid::PATH, &TagRaw::from_str_val("a"));
        t.put(tid::SIZE, &TagRaw::from_uint_width(1, 1).unwrap());
        assert_eq!(t.iterator().count(), 2);
        assert_eq!(t.iterator().count(), 2);
    }

    #[test]
    fn truncated_buffer_sets_failed() {
        let mut raw = Vec::new();
        crate::codec::write_uint(&mut raw, tid::PATH as u64, 2).unwrap();
        crate::codec::write_uint(&mut raw, 10, 2).unwrap(); // claims 10 bytes
        raw.extend_from_slice(b"short"); // only 5 follow
        let bad = TagsetRaw::from_raw(raw, 2, 2);
        let mut it = bad.iterator();
        for _ in it.by_ref() {}
        assert!(it.failed());
        assert!(bad.validate_framing().is_err());
    }

    #[test]
    fn is_dir_requires_path_without_offset() {
        let mut file = ts();
        file.put(tid::PATH, &TagRaw::from_str_val("a.txt"));
        file.put(tid::OFFSET, &TagRaw::from_uint_width(0, 8).unwrap());
        file.put(tid::SIZE, &TagRaw::from_uint_width(0, 8).unwrap());
        assert!(!file.is_dir());

        let mut dir = ts();
        dir.put(tid::PATH, &TagRaw::from_str_val("sub"));
        assert!(dir.is_dir());
    }

    #[test]
    fn name_is_basename() {
        let mut t = ts();
        t.put(tid::PATH, &TagRaw::from_str_val("img1/claustral.jpg"));
        assert_eq!(t.name(), "claustral.jpg");
    }
}
