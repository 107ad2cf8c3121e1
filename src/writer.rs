//! Package writer: the `Closed -> Building -> Closed` state machine that
//! assembles or extends a package (spec §4.6).
//!
//! Every mutating call takes the backing stream(s) explicitly rather than
//! owning them — the writer itself holds only the in-progress `Ftt` and a
//! small `Mutex`-guarded session flag, serializing builds the way
//! `storage_v2::writer` serializes a single segment at a time.

use std::io::{self, Read, Seek, SeekFrom, Write};

use parking_lot::Mutex;

use crate::decorate::{Active, DecoratorKind};
use crate::error::{Error, Result, TagFault};
use crate::ftt::Ftt;
use crate::header::{Header, TypeSize, HEADER_SIZE};
use crate::path;
use crate::tag::TagRaw;
use crate::tagset::TagsetRaw;
use crate::tid;

/// A backing stream the writer can truncate in place. `Append` needs this
/// to drop a package's stale FTT before re-extending it with new entries.
pub trait Truncate {
    fn set_len(&mut self, len: u64) -> io::Result<()>;
}

impl Truncate for std::fs::File {
    fn set_len(&mut self, len: u64) -> io::Result<()> {
        std::fs::File::set_len(self, len)
    }
}

impl Truncate for io::Cursor<Vec<u8>> {
    fn set_len(&mut self, len: u64) -> io::Result<()> {
        let len = len as usize;
        let pos = self.position();
        let buf = self.get_mut();
        buf.resize(len, 0);
        if pos > len as u64 {
            self.set_position(len as u64);
        }
        Ok(())
    }
}

/// Bound satisfied by any stream the writer can use as a tag or data
/// channel: plain files, and in-memory cursors for tests.
pub trait Stream: Read + Write + Seek + Truncate {}
impl<T: Read + Write + Seek + Truncate> Stream for T {}

/// Writer-side configuration. Built programmatically, field by field —
/// spec.md names no config-file format for this layer.
#[derive(Debug, Clone)]
pub struct PackOptions {
    pub typesize: TypeSize,
    /// Decorators run by `pack_data`/`pack_file`; empty means no sniffing or
    /// hashing at all (spec §2).
    pub decorators: Vec<DecoratorKind>,
    /// Whether `pack_file` records the source file's `MTIME`.
    pub record_mtime: bool,
    /// Whether `pack_file` records a `LINK` tag pointing at the source path.
    pub record_link: bool,
}

impl Default for PackOptions {
    fn default() -> Self {
        PackOptions {
            typesize: TypeSize::COMMON,
            decorators: Vec::new(),
            record_mtime: true,
            record_link: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuildState {
    Closed,
    Building,
}

struct Session {
    state: BuildState,
}

/// Assembles or extends a package. `begin`/`append` open a build,
/// `pack_data`/`pack_file`/`put_alias`/`rename`/`del_alias` mutate it, `sync`
/// commits a `Ready` header (spec §4.6).
pub struct PackWriter {
    ftt: Ftt,
    session: Mutex<Session>,
    options: PackOptions,
}

impl PackWriter {
    pub fn new(options: PackOptions) -> Self {
        let ftt = Ftt::new(options.typesize);
        PackWriter {
            ftt,
            session: Mutex::new(Session { state: BuildState::Closed }),
            options,
        }
    }

    pub fn ftt(&self) -> &Ftt {
        &self.ftt
    }

    fn require_building(&self) -> Result<()> {
        if self.session.lock().state != BuildState::Building {
            return Err(Error::PackClosed);
        }
        Ok(())
    }

    /// Begin a fresh build: writes a `Prebuild` header to `tagstream` (and to
    /// `datastream` in split mode), positions both streams after the header.
    pub fn begin<T: Stream, D: Stream>(&self, tagstream: &mut T, datastream: Option<&mut D>) -> Result<()> {
        let mut session = self.session.lock();
        if session.state == BuildState::Building {
            return Err(Error::PackOpened);
        }
        let _span = tracing::debug_span!("writer.begin", split = datastream.is_some()).entered();

        let header = Header::new_build(self.options.typesize);
        tagstream.seek(SeekFrom::Start(0))?;
        header.write_to(tagstream)?;
        tagstream.seek(SeekFrom::Start(HEADER_SIZE as u64))?;

        if let Some(ds) = datastream {
            ds.seek(SeekFrom::Start(0))?;
            header.write_to(ds)?;
            ds.seek(SeekFrom::Start(HEADER_SIZE as u64))?;
        }

        session.state = BuildState::Building;
        Ok(())
    }

    /// Reopen an existing `Ready` package for extension: reads its header and
    /// FTT, truncates the tag stream back to where the FTT began, and marks
    /// the header `Prebuild` again. Data bytes are left intact.
    pub fn append<T: Stream, D: Stream>(&self, tagstream: &mut T, datastream: Option<&mut D>) -> Result<()> {
        let mut session = self.session.lock();
        if session.state == BuildState::Building {
            return Err(Error::PackOpened);
        }
        let _span = tracing::debug_span!("writer.append").entered();

        tagstream.seek(SeekFrom::Start(0))?;
        let header = Header::read_from(tagstream)?;
        header.is_ready()?;

        tagstream.seek(SeekFrom::Start(header.ftt_offset))?;
        self.ftt.read_from(tagstream)?;

        let split = header.is_splitted();
        let truncate_at = if split { HEADER_SIZE as u64 } else { header.ftt_offset };

        let rebuilt = Header::new_build(self.options.typesize);
        tagstream.seek(SeekFrom::Start(0))?;
        rebuilt.write_to(tagstream)?;
        tagstream.set_len(truncate_at)?;
        tagstream.seek(SeekFrom::Start(truncate_at))?;

        if split {
            if let Some(ds) = datastream {
                ds.seek(SeekFrom::End(0))?;
            }
        }

        session.state = BuildState::Building;
        Ok(())
    }

    /// Streams `reader` into `w`, recording `OFFSET`/`SIZE`/`PATH` plus any
    /// configured decorator tags, and stores the resulting tagset in the FTT
    /// under `fpath`'s normalized key. Returns the tagset for further tag
    /// edits by the caller (spec §4.6).
    pub fn pack_data<W: Write + Seek, R: Read>(&self, w: &mut W, mut reader: R, fpath: &str) -> Result<TagsetRaw> {
        self.require_building()?;
        let key = path::normalize(fpath);
        if self.ftt.has_tagset(&key) {
            return Err(Error::DuplicatePath(fpath.to_owned()));
        }

        let offset = w.stream_position()?;
        let mut active = Active::new(&self.options.decorators);
        let feed_active = !active.is_noop();
        let mut size: u64 = 0;
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            if feed_active {
                active.feed(&buf[..n]);
            }
            w.write_all(&buf[..n])?;
            size += n as u64;
        }

        let mut ts = self.ftt.new_tagset();
        ts.put(tid::OFFSET, &TagRaw::from_uint_width(offset, 8).unwrap());
        ts.put(tid::SIZE, &TagRaw::from_uint_width(size, 8).unwrap());
        ts.put(tid::PATH, &TagRaw::from_str_val(fpath));
        for (tag_id, tag) in active.finish() {
            ts.put(tag_id, &tag);
        }

        self.ftt.set_tagset(&key, ts.clone());
        Ok(ts)
    }

    /// Packs the file at `file_path` under `fpath`, additionally recording
    /// `MTIME`/`LINK` per `PackOptions` (spec §4.6).
    pub fn pack_file<W: Write + Seek>(
        &self,
        w: &mut W,
        file_path: impl AsRef<std::path::Path>,
        fpath: &str,
    ) -> Result<TagsetRaw> {
        let file_path = file_path.as_ref();
        let file = std::fs::File::open(file_path)?;
        let metadata = file.metadata()?;

        let mut ts = self.pack_data(w, file, fpath)?;
        if self.options.record_mtime {
            if let Ok(modified) = metadata.modified() {
                ts.put(tid::MTIME, &TagRaw::from_time(modified));
            }
        }
        if self.options.record_link {
            ts.put(tid::LINK, &TagRaw::from_str_val(&file_path.to_string_lossy()));
        }

        let key = path::normalize(fpath);
        self.ftt.set_tagset(&key, ts.clone());
        Ok(ts)
    }

    /// Clones `src`'s tagset under normalized `dst`, rewriting `PATH`. The
    /// underlying data bytes are shared, not copied (spec §4.3 "Aliases").
    pub fn put_alias(&self, src: &str, dst: &str) -> Result<()> {
        self.require_building()?;
        let dkey = path::normalize(dst);
        if self.ftt.has_tagset(&dkey) {
            return Err(Error::DuplicatePath(dst.to_owned()));
        }
        let skey = path::normalize(src);
        let mut ts = self.ftt.tagset(&skey).ok_or_else(|| Error::NotFound(src.to_owned()))?;
        ts.set(tid::PATH, &TagRaw::from_str_val(dst));
        self.ftt.set_tagset(&dkey, ts);
        Ok(())
    }

    /// Moves `src`'s tagset to normalized `dst`, rewriting `PATH` in place
    /// (spec §4.6).
    pub fn rename(&self, src: &str, dst: &str) -> Result<()> {
        self.require_building()?;
        let dkey = path::normalize(dst);
        if self.ftt.has_tagset(&dkey) {
            return Err(Error::DuplicatePath(dst.to_owned()));
        }
        let skey = path::normalize(src);
        let mut ts = self.ftt.get_del_tagset(&skey).ok_or_else(|| Error::NotFound(src.to_owned()))?;
        ts.set(tid::PATH, &TagRaw::from_str_val(dst));
        self.ftt.set_tagset(&dkey, ts);
        Ok(())
    }

    /// Removes a path's tagset entirely; the shared data bytes are left in
    /// place (spec §1 Non-goals: "random deletion of data blobs").
    pub fn del_alias(&self, fpath: &str) -> Result<()> {
        self.require_building()?;
        let key = path::normalize(fpath);
        if self.ftt.del_tagset(&key) {
            Ok(())
        } else {
            Err(Error::NotFound(fpath.to_owned()))
        }
    }

    /// Sets a user tag on an existing entry. `OFFSET`/`SIZE`/`PATH` are
    /// protected and rejected regardless of build state (spec §3, §6).
    pub fn set_tag(&self, fpath: &str, tag_id: u32, tag: &TagRaw) -> Result<bool> {
        if tid::is_protected(tag_id) {
            return Err(Error::tag(fpath, tag_id, TagFault::Protected));
        }
        let key = path::normalize(fpath);
        let mut ts = self.ftt.tagset(&key).ok_or_else(|| Error::NotFound(fpath.to_owned()))?;
        let replaced = ts.set(tag_id, tag);
        self.ftt.set_tagset(&key, ts);
        Ok(replaced)
    }

    /// Deletes a user tag from an existing entry. Protected TIDs are
    /// rejected the same way as `set_tag`.
    pub fn del_tag(&self, fpath: &str, tag_id: u32) -> Result<bool> {
        if tid::is_protected(tag_id) {
            return Err(Error::tag(fpath, tag_id, TagFault::Protected));
        }
        let key = path::normalize(fpath);
        let mut ts = self.ftt.tagset(&key).ok_or_else(|| Error::NotFound(fpath.to_owned()))?;
        let removed = ts.del(tag_id);
        self.ftt.set_tagset(&key, ts);
        Ok(removed)
    }

    /// Commits the build: writes the FTT, rewrites the header as `Ready`, and
    /// returns to the `Closed` state. Streams are left open for a future
    /// `begin`/`append` (spec §4.6).
    pub fn sync<T: Stream, D: Stream>(&self, tagstream: &mut T, datastream: Option<&mut D>) -> Result<()> {
        let mut session = self.session.lock();
        if session.state != BuildState::Building {
            return Err(Error::PackClosed);
        }
        let _span = tracing::debug_span!("writer.sync").entered();
        if self.ftt.is_empty() {
            tracing::warn!("sync finalizing package with zero entries");
        }

        let mut header = Header::new_build(self.options.typesize);

        match datastream {
            Some(ds) => {
                ds.flush()?;
                header.data_offset = 0;
                header.data_size = ds.seek(SeekFrom::End(0))?;

                header.ftt_offset = HEADER_SIZE as u64;
                tagstream.seek(SeekFrom::Start(HEADER_SIZE as u64))?;
                header.ftt_size = self.ftt.write_to(tagstream)?;

                header.mark_ready();
                ds.seek(SeekFrom::Start(0))?;
                header.write_to(ds)?;
                tagstream.seek(SeekFrom::Start(0))?;
                header.write_to(tagstream)?;
            }
            None => {
                let ftt_offset = tagstream.stream_position()?;
                header.ftt_size = self.ftt.write_to(tagstream)?;
                header.ftt_offset = ftt_offset;
                header.data_offset = HEADER_SIZE as u64;
                header.data_size = ftt_offset - HEADER_SIZE as u64;

                header.mark_ready();
                tagstream.seek(SeekFrom::Start(0))?;
                header.write_to(tagstream)?;
            }
        }

        tagstream.flush()?;
        session.state = BuildState::Closed;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn cursor() -> Cursor<Vec<u8>> {
        Cursor::new(Vec::new())
    }

    #[test]
    fn begin_pack_sync_round_trip_single_file() {
        let w = PackWriter::new(PackOptions::default());
        let mut tag = cursor();

        w.begin::<_, Cursor<Vec<u8>>>(&mut tag, None).unwrap();
        w.pack_data(&mut tag, "hello".as_bytes(), "a.txt").unwrap();
        w.sync::<_, Cursor<Vec<u8>>>(&mut tag, None).unwrap();

        tag.seek(SeekFrom::Start(0)).unwrap();
        let header = Header::read_from(&mut tag).unwrap();
        assert!(header.is_ready().is_ok());
        assert_eq!(w.ftt().len(), 1);
        assert_eq!(w.ftt().tagset("a.txt").unwrap().size(), Some(5));
    }

    #[test]
    fn append_preserves_prior_entries_and_extends() {
        let w1 = PackWriter::new(PackOptions::default());
        let mut tag = cursor();
        w1.begin::<_, Cursor<Vec<u8>>>(&mut tag, None).unwrap();
        w1.pack_data(&mut tag, "one".as_bytes(), "a.txt").unwrap();
        w1.pack_data(&mut tag, "two".as_bytes(), "b.txt").unwrap();
        w1.sync::<_, Cursor<Vec<u8>>>(&mut tag, None).unwrap();

        let w2 = PackWriter::new(PackOptions::default());
        w2.append::<_, Cursor<Vec<u8>>>(&mut tag, None).unwrap();
        assert_eq!(w2.ftt().len(), 2);
        let a_before = w2.ftt().tagset("a.txt").unwrap().pos();
        w2.pack_data(&mut tag, "three".as_bytes(), "c.txt").unwrap();
        w2.sync::<_, Cursor<Vec<u8>>>(&mut tag, None).unwrap();

        assert_eq!(w2.ftt().len(), 3);
        assert_eq!(w2.ftt().tagset("a.txt").unwrap().pos(), a_before);
        let c_offset = w2.ftt().tagset("c.txt").unwrap().offset().unwrap();
        let b_offset = w2.ftt().tagset("b.txt").unwrap().offset().unwrap();
        assert!(c_offset > b_offset);
    }

    #[test]
    fn split_build_writes_ready_header_to_both_files() {
        let w = PackWriter::new(PackOptions::default());
        let mut tag = cursor();
        let mut data = cursor();

        w.begin(&mut tag, Some(&mut data)).unwrap();
        w.pack_data(&mut data, "payload".as_bytes(), "a.bin").unwrap();
        w.sync(&mut tag, Some(&mut data)).unwrap();

        tag.seek(SeekFrom::Start(0)).unwrap();
        let tag_header = Header::read_from(&mut tag).unwrap();
        assert!(tag_header.is_ready().is_ok());
        assert!(tag_header.is_splitted());

        data.seek(SeekFrom::Start(0)).unwrap();
        let data_header = Header::read_from(&mut data).unwrap();
        assert!(data_header.is_ready().is_ok());
    }

    #[test]
    fn put_alias_shares_offset_and_size() {
        let w = PackWriter::new(PackOptions::default());
        let mut tag = cursor();
        w.begin::<_, Cursor<Vec<u8>>>(&mut tag, None).unwrap();
        w.pack_data(&mut tag, "shared".as_bytes(), "img1/claustral.jpg").unwrap();
        w.put_alias("img1/claustral.jpg", "basaltbay.jpg").unwrap();

        let orig = w.ftt().tagset("img1/claustral.jpg").unwrap();
        let alias = w.ftt().tagset("basaltbay.jpg").unwrap();
        assert_eq!(orig.pos(), alias.pos());
        assert_eq!(alias.path(), Some("basaltbay.jpg".to_owned()));
    }

    #[test]
    fn rename_moves_key_and_preserves_position() {
        let w = PackWriter::new(PackOptions::default());
        let mut tag = cursor();
        w.begin::<_, Cursor<Vec<u8>>>(&mut tag, None).unwrap();
        w.pack_data(&mut tag, "body".as_bytes(), "old.txt").unwrap();
        let before = w.ftt().tagset("old.txt").unwrap().pos();

        w.rename("old.txt", "new.txt").unwrap();
        assert!(w.ftt().tagset("old.txt").is_none());
        let after = w.ftt().tagset("new.txt").unwrap();
        assert_eq!(after.pos(), before);
        assert_eq!(after.path(), Some("new.txt".to_owned()));
    }

    #[test]
    fn duplicate_path_is_rejected() {
        let w = PackWriter::new(PackOptions::default());
        let mut tag = cursor();
        w.begin::<_, Cursor<Vec<u8>>>(&mut tag, None).unwrap();
        w.pack_data(&mut tag, "x".as_bytes(), "a.txt").unwrap();
        let err = w.pack_data(&mut tag, "y".as_bytes(), "A.TXT").unwrap_err();
        assert!(matches!(err, Error::DuplicatePath(_)));
    }

    #[test]
    fn set_tag_rejects_protected_tids() {
        let w = PackWriter::new(PackOptions::default());
        let mut tag = cursor();
        w.begin::<_, Cursor<Vec<u8>>>(&mut tag, None).unwrap();
        w.pack_data(&mut tag, "x".as_bytes(), "a.txt").unwrap();
        let err = w.set_tag("a.txt", tid::OFFSET, &TagRaw::from_uint_width(0, 8).unwrap()).unwrap_err();
        assert!(matches!(err, Error::Tag(e) if e.source == TagFault::Protected));
    }

    #[test]
    fn write_before_begin_is_pack_closed() {
        let w = PackWriter::new(PackOptions::default());
        let mut tag = cursor();
        let err = w.pack_data(&mut tag, "x".as_bytes(), "a.txt").unwrap_err();
        assert!(matches!(err, Error::PackClosed));
    }

    #[test]
    fn begin_twice_without_sync_is_pack_opened() {
        let w = PackWriter::new(PackOptions::default());
        let mut tag = cursor();
        w.begin::<_, Cursor<Vec<u8>>>(&mut tag, None).unwrap();
        let err = w.begin::<_, Cursor<Vec<u8>>>(&mut tag, None).unwrap_err();
        assert!(matches!(err, Error::PackOpened));
    }
}
