//! Optional per-entry decorators: digests, CRC checksums and MIME
//! sniffing, invoked by the writer during `PackData`'s streaming copy
//! (spec §1, §2: "Invokes optional decorators... that add tags").
//!
//! These are genuinely optional: a `PackFile`/`PackData` call with no
//! decorators configured does no sniffing or hashing at all.

use crc::{Algorithm, Crc};
use md5::{Digest as _, Md5};
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512};

use crate::tag::TagRaw;
use crate::tid;

/// First-N-bytes window used for MIME sniffing (spec §2).
const MIME_SNIFF_WINDOW: usize = 512;

const KOOPMAN: Algorithm<u32> = Algorithm {
    width: 32,
    poly: 0x741B_8CD7,
    init: 0xFFFF_FFFF,
    refin: true,
    refout: true,
    xorout: 0xFFFF_FFFF,
    check: 0,
    residue: 0,
};

const ISO_64: Algorithm<u64> = Algorithm {
    width: 64,
    poly: 0xD800_0000_0000_0000,
    init: 0xFFFF_FFFF_FFFF_FFFF,
    refin: true,
    refout: true,
    xorout: 0xFFFF_FFFF_FFFF_FFFF,
    check: 0,
    residue: 0,
};

static CRC32_IEEE: Crc<u32> = Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);
static CRC32_CASTAGNOLI: Crc<u32> = Crc::<u32>::new(&crc::CRC_32_ISCSI);
static CRC32_KOOPMAN: Crc<u32> = Crc::<u32>::new(&KOOPMAN);
static CRC64_ISO: Crc<u64> = Crc::<u64>::new(&ISO_64);

/// Which decorators to run for one `PackData`/`PackFile` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecoratorKind {
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
    Crc32Ieee,
    Crc32C,
    Crc32Koopman,
    Crc64Iso,
    Mime,
}

/// Accumulates decorator state across a streaming copy, then produces the
/// tags to attach to the entry's tagset.
///
/// Digests stream incrementally via `feed`. CRC checksums are accumulated
/// into a byte buffer and computed once in `finish` — the `crc` crate's
/// incremental `Digest` borrows its static algorithm table, which would
/// make this struct self-referential if stored directly; buffering avoids
/// that at the cost of holding the entry's bytes twice during the copy
/// when both a digest and a CRC are requested together.
pub struct Active {
    md5: Option<Md5>,
    sha1: Option<Sha1>,
    sha224: Option<Sha224>,
    sha256: Option<Sha256>,
    sha384: Option<Sha384>,
    sha512: Option<Sha512>,
    want_crc32_ieee: bool,
    want_crc32_c: bool,
    want_crc32_k: bool,
    want_crc64_iso: bool,
    crc_buf: Option<Vec<u8>>,
    mime_buf: Option<Vec<u8>>,
}

impl Active {
    pub fn new(kinds: &[DecoratorKind]) -> Self {
        let has = |k: DecoratorKind| kinds.contains(&k);
        let want_crc32_ieee = has(DecoratorKind::Crc32Ieee);
        let want_crc32_c = has(DecoratorKind::Crc32C);
        let want_crc32_k = has(DecoratorKind::Crc32Koopman);
        let want_crc64_iso = has(DecoratorKind::Crc64Iso);
        let any_crc = want_crc32_ieee || want_crc32_c || want_crc32_k || want_crc64_iso;

        Active {
            md5: has(DecoratorKind::Md5).then(Md5::new),
            sha1: has(DecoratorKind::Sha1).then(Sha1::new),
            sha224: has(DecoratorKind::Sha224).then(Sha224::new),
            sha256: has(DecoratorKind::Sha256).then(Sha256::new),
            sha384: has(DecoratorKind::Sha384).then(Sha384::new),
            sha512: has(DecoratorKind::Sha512).then(Sha512::new),
            want_crc32_ieee,
            want_crc32_c,
            want_crc32_k,
            want_crc64_iso,
            crc_buf: any_crc.then(Vec::new),
            mime_buf: has(DecoratorKind::Mime).then(Vec::new),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.md5.is_none()
            && self.sha1.is_none()
            && self.sha224.is_none()
            && self.sha256.is_none()
            && self.sha384.is_none()
            && self.sha512.is_none()
            && self.crc_buf.is_none()
            && self.mime_buf.is_none()
    }

    /// Feeds the next chunk of bytes read during the copy. Cheap no-op for
    /// any decorator that wasn't requested.
    pub fn feed(&mut self, chunk: &[u8]) {
        if let Some(h) = &mut self.md5 {
            h.update(chunk);
        }
        if let Some(h) = &mut self.sha1 {
            h.update(chunk);
        }
        if let Some(h) = &mut self.sha224 {
            h.update(chunk);
        }
        if let Some(h) = &mut self.sha256 {
            h.update(chunk);
        }
        if let Some(h) = &mut self.sha384 {
            h.update(chunk);
        }
        if let Some(h) = &mut self.sha512 {
            h.update(chunk);
        }
        if let Some(buf) = &mut self.crc_buf {
            buf.extend_from_slice(chunk);
        }
        if let Some(buf) = &mut self.mime_buf {
            if buf.len() < MIME_SNIFF_WINDOW {
                let take = (MIME_SNIFF_WINDOW - buf.len()).min(chunk.len());
                buf.extend_from_slice(&chunk[..take]);
            }
        }
    }

    /// Consumes the accumulated state, returning `(TID, TagRaw)` pairs to
    /// attach to the entry's tagset.
    pub fn finish(self) -> Vec<(u32, TagRaw)> {
        let mut tags = Vec::new();
        if let Some(h) = self.md5 {
            tags.push((tid::MD5, TagRaw::from_raw(&h.finalize())));
        }
        if let Some(h) = self.sha1 {
            tags.push((tid::SHA1, TagRaw::from_raw(&h.finalize())));
        }
        if let Some(h) = self.sha224 {
            tags.push((tid::SHA224, TagRaw::from_raw(&h.finalize())));
        }
        if let Some(h) = self.sha256 {
            tags.push((tid::SHA256, TagRaw::from_raw(&h.finalize())));
        }
        if let Some(h) = self.sha384 {
            tags.push((tid::SHA384, TagRaw::from_raw(&h.finalize())));
        }
        if let Some(h) = self.sha512 {
            tags.push((tid::SHA512, TagRaw::from_raw(&h.finalize())));
        }
        if let Some(buf) = &self.crc_buf {
            if self.want_crc32_ieee {
                tags.push((tid::CRC32_IEEE, TagRaw::from_uint_width(CRC32_IEEE.checksum(buf) as u64, 4).unwrap()));
            }
            if self.want_crc32_c {
                tags.push((tid::CRC32_C, TagRaw::from_uint_width(CRC32_CASTAGNOLI.checksum(buf) as u64, 4).unwrap()));
            }
            if self.want_crc32_k {
                tags.push((tid::CRC32_K, TagRaw::from_uint_width(CRC32_KOOPMAN.checksum(buf) as u64, 4).unwrap()));
            }
            if self.want_crc64_iso {
                tags.push((tid::CRC64_ISO, TagRaw::from_uint_width(CRC64_ISO.checksum(buf), 8).unwrap()));
            }
        }
        if let Some(buf) = self.mime_buf {
            if let Some(kind) = infer::get(&buf) {
                tags.push((tid::MIME, TagRaw::from_str_val(kind.mime_type())));
            }
        }
        tags
    }
}
