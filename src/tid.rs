//! Reserved tag identifiers (TIDs) and their fixed semantics.
//!
//! IDs below 100 carry fixed meaning within every package; IDs `>= 100` are
//! free for user metadata (spec §3).

/// Reserved / invalid.
pub const NONE: u32 = 0;
/// Required: data byte offset within the data region.
pub const OFFSET: u32 = 1;
/// Required: data byte length.
pub const SIZE: u32 = 2;
/// Required: original (unnormalized) path.
pub const PATH: u32 = 3;
/// Optional caller-assigned file ID.
pub const FID: u32 = 4;

pub const MTIME: u32 = 5;
pub const ATIME: u32 = 6;
pub const CTIME: u32 = 7;
pub const BTIME: u32 = 8;

pub const ATTR: u32 = 9;
pub const MIME: u32 = 10;

pub const CRC32_IEEE: u32 = 11;
pub const CRC32_C: u32 = 12;
pub const CRC32_K: u32 = 13;
pub const CRC64_ISO: u32 = 14;

pub const MD5: u32 = 20;
pub const SHA1: u32 = 21;
pub const SHA224: u32 = 22;
pub const SHA256: u32 = 23;
pub const SHA384: u32 = 24;
pub const SHA512: u32 = 25;

pub const TMBIMG: u32 = 100;
pub const TMBMIME: u32 = 101;
pub const LABEL: u32 = 110;
pub const LINK: u32 = 111;
pub const KEYWORDS: u32 = 112;
pub const CATEGORY: u32 = 113;
pub const VERSION: u32 = 114;
pub const AUTHOR: u32 = 115;
pub const COMMENT: u32 = 116;

/// Tags the writer maintains itself; user code may not `set`/`del` these
/// through the public API (spec §3, §6).
pub fn is_protected(tid: u32) -> bool {
    matches!(tid, OFFSET | SIZE | PATH)
}

/// Digest length in bytes for each hash-family TID, or `None` if `tid` is
/// not one of the reserved hash TIDs.
pub fn hash_len(tid: u32) -> Option<usize> {
    match tid {
        MD5 => Some(16),
        SHA1 => Some(20),
        SHA224 => Some(28),
        SHA256 => Some(32),
        SHA384 => Some(48),
        SHA512 => Some(64),
        _ => None,
    }
}

/// Display name for a reserved TID, used only for `Debug`/logging output
/// (spec §9: "a pure lookup table"). Returns `None` for user TIDs (`>= 100`
/// and not in the descriptive block) so callers can fall back to printing
/// the bare number.
pub fn name(tid: u32) -> Option<&'static str> {
    Some(match tid {
        NONE => "NONE",
        OFFSET => "OFFSET",
        SIZE => "SIZE",
        PATH => "PATH",
        FID => "FID",
        MTIME => "MTIME",
        ATIME => "ATIME",
        CTIME => "CTIME",
        BTIME => "BTIME",
        ATTR => "ATTR",
        MIME => "MIME",
        CRC32_IEEE => "CRC32_IEEE",
        CRC32_C => "CRC32_C",
        CRC32_K => "CRC32_K",
        CRC64_ISO => "CRC64_ISO",
        MD5 => "MD5",
        SHA1 => "SHA1",
        SHA224 => "SHA224",
        SHA256 => "SHA256",
        SHA384 => "SHA384",
        SHA512 => "SHA512",
        TMBIMG => "TMBIMG",
        TMBMIME => "TMBMIME",
        LABEL => "LABEL",
        LINK => "LINK",
        KEYWORDS => "KEYWORDS",
        CATEGORY => "CATEGORY",
        VERSION => "VERSION",
        AUTHOR => "AUTHOR",
        COMMENT => "COMMENT",
        _ => return None,
    })
}
