//! The File Tags Table: a mutable index mapping normalized path keys to
//! tagsets (spec §4.5).

use dashmap::DashMap;

use crate::codec::{read_uint, write_uint};
use crate::error::{Error, Result, TagFault};
use crate::header::TypeSize;
use crate::path;
use crate::tagset::TagsetRaw;
use crate::tid;

/// Reserved path key for the package-level info entry.
pub const INFO_NAME: &str = ".";

#[derive(Debug, Default, Clone, Copy)]
struct DataExtent {
    offset: u64,
    size: u64,
}

/// In-memory File Tags Table: a concurrent-safe mapping from normalized
/// path key to tagset, plus the shared type widths (spec §4.5).
pub struct Ftt {
    map: DashMap<String, TagsetRaw>,
    typesize: TypeSize,
}

impl Ftt {
    pub fn new(typesize: TypeSize) -> Self {
        Ftt {
            map: DashMap::new(),
            typesize,
        }
    }

    pub fn typesize(&self) -> TypeSize {
        self.typesize
    }

    /// An empty tagset bound to this FTT's TID/tag-size widths.
    pub fn new_tagset(&self) -> TagsetRaw {
        TagsetRaw::new(self.typesize.tid_width, self.typesize.tagsize_width)
    }

    pub fn tagset(&self, key: &str) -> Option<TagsetRaw> {
        self.map.get(&path::normalize(key)).map(|r| r.clone())
    }

    pub fn has_tagset(&self, key: &str) -> bool {
        self.map.contains_key(&path::normalize(key))
    }

    pub fn set_tagset(&self, key: &str, ts: TagsetRaw) {
        self.map.insert(path::normalize(key), ts);
    }

    pub fn del_tagset(&self, key: &str) -> bool {
        self.map.remove(&path::normalize(key)).is_some()
    }

    pub fn get_del_tagset(&self, key: &str) -> Option<TagsetRaw> {
        self.map.remove(&path::normalize(key)).map(|(_, v)| v)
    }

    /// Number of entries, including the info entry if present.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Calls `visit` for every entry except the info entry; stops early if
    /// `visit` returns `false`.
    pub fn enum_entries(&self, mut visit: impl FnMut(&str, &TagsetRaw) -> bool) {
        for entry in self.map.iter() {
            if entry.key() == INFO_NAME {
                continue;
            }
            if !visit(entry.key(), entry.value()) {
                break;
            }
        }
    }

    pub fn info(&self) -> Option<TagsetRaw> {
        self.map.get(INFO_NAME).map(|r| r.clone())
    }

    /// Returns the existing info tagset, or atomically inserts and returns
    /// a new minimal one (`PATH = "."`) if none was present.
    pub fn set_info(&self) -> TagsetRaw {
        self.map
            .entry(INFO_NAME.to_owned())
            .or_insert_with(|| {
                let mut ts = self.new_tagset();
                ts.put(tid::PATH, &crate::tag::TagRaw::from_str_val(INFO_NAME));
                ts
            })
            .clone()
    }

    /// Validates one parsed tagset against spec §4.5 `check_tagset`: `PATH`
    /// must be present, the normalized path must not already exist, and
    /// (for non-info entries) `OFFSET`/`SIZE` must both be present and, if
    /// an info-entry data extent has been established, fall within it.
    fn check_tagset(&self, ts: &TagsetRaw, limits: &mut DataExtent) -> Result<String> {
        let fpath = ts.path().ok_or_else(|| Error::tag("", tid::PATH, TagFault::NoPath))?;
        let key = path::normalize(&fpath);
        if self.has_tagset(&key) {
            return Err(Error::DuplicatePath(fpath));
        }

        let offset = ts.offset();
        let size = ts.size();
        if key != INFO_NAME {
            let offset = offset.ok_or_else(|| Error::tag(fpath.clone(), tid::OFFSET, TagFault::NoOffset))?;
            let size = size.ok_or_else(|| Error::tag(fpath.clone(), tid::SIZE, TagFault::NoSize))?;
            if limits.size > 0 {
                if offset < limits.offset || offset > limits.offset + limits.size {
                    return Err(Error::tag(fpath.clone(), tid::OFFSET, TagFault::OffsetOutOfBounds));
                }
                if offset + size > limits.offset + limits.size {
                    return Err(Error::tag(fpath, tid::SIZE, TagFault::SizeOutOfBounds));
                }
            }
        } else if let (Some(offset), Some(size)) = (offset, size) {
            limits.offset = offset;
            limits.size = size;
        }

        Ok(fpath)
    }

    /// Reads the whole FTT from `r`: a sequence of `(length, tagset bytes)`
    /// frames terminated by a zero-length frame (spec §4.5, §6).
    pub fn read_from<R: std::io::Read>(&self, r: &mut R) -> Result<u64> {
        let mut n: u64 = 0;
        let mut limits = DataExtent::default();
        loop {
            let tsl = read_uint(r, self.typesize.tssize_width)?;
            n += self.typesize.tssize_width as u64;
            if tsl == 0 {
                break;
            }
            let mut data = vec![0u8; tsl as usize];
            r.read_exact(&mut data)?;
            n += tsl;

            let ts = TagsetRaw::from_raw(data, self.typesize.tid_width, self.typesize.tagsize_width);
            ts.validate_framing()?;

            let fpath = match self.check_tagset(&ts, &mut limits) {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(error = %e, "rejected tagset while reading FTT");
                    return Err(e);
                }
            };
            self.set_tagset(&fpath, ts);
        }
        Ok(n)
    }

    /// Writes the whole FTT to `w`: info entry first (if present), then the
    /// remaining entries in unspecified order, then a zero-length
    /// terminator frame (spec §4.5).
    pub fn write_to<W: std::io::Write>(&self, w: &mut W) -> Result<u64> {
        let mut n: u64 = 0;
        let tssize_width = self.typesize.tssize_width;

        if let Some(info) = self.info() {
            n += write_frame(w, &info, tssize_width)?;
        }
        for entry in self.map.iter() {
            if entry.key() == INFO_NAME {
                continue;
            }
            n += write_frame(w, entry.value(), tssize_width)?;
        }

        write_uint(w, 0, tssize_width)?;
        n += tssize_width as u64;
        Ok(n)
    }
}

fn write_frame<W: std::io::Write>(w: &mut W, ts: &TagsetRaw, tssize_width: u8) -> Result<u64> {
    let tsl = ts.data().len() as u64;
    let max = (1u64 << (tssize_width as u32 * 8)) - 1;
    if tsl > max {
        return Err(Error::RangeTSSize { len: tsl, width: tssize_width });
    }
    write_uint(w, tsl, tssize_width)?;
    w.write_all(ts.data())?;
    Ok(tssize_width as u64 + tsl)
}
