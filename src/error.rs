//! Error types for the package container and virtual filesystem.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// A structural error tied to one tagset, carrying the key and tag ID it
/// was raised against so callers can match on both instead of parsing text.
#[derive(Error, Debug)]
#[error("key '{key}', tag ID {tid}: {source}")]
pub struct TagError {
    pub key: String,
    pub tid: u32,
    #[source]
    pub source: TagFault,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagFault {
    #[error("file name is absent")]
    NoPath,
    #[error("file offset is absent")]
    NoOffset,
    #[error("file offset is out of bounds")]
    OffsetOutOfBounds,
    #[error("file size is absent")]
    NoSize,
    #[error("file size is out of bounds")]
    SizeOutOfBounds,
    #[error("tag is protected and cannot be set or deleted by caller code")]
    Protected,
}

#[derive(Error, Debug)]
pub enum Error {
    // ── Format errors (§7 "Format") ─────────────────────────────────
    #[error("package is not ready")]
    SignPre,
    #[error("signature does not pass")]
    SignBad,
    #[error("header contains incorrect data")]
    SignFTT,

    // ── Configuration errors (§7 "Configuration") ───────────────────
    #[error("width {0} is not a supported integer width (must be 1, 2, 4 or 8)")]
    InvalidWidth(u8),
    #[error("tag ID width must be one of {{1, 2, 4}}, got {0}")]
    BadTidWidth(u8),
    #[error("tag size width must be one of {{1, 2, 4}}, got {0}")]
    BadTagsizeWidth(u8),
    #[error("tagset-length width must be one of {{2, 4}}, got {0}")]
    BadTssizeWidth(u8),
    #[error("tag ID width ({tid}) must not exceed tagset-length width ({tssize})")]
    TidWiderThanTssize { tid: u8, tssize: u8 },
    #[error("tag size width ({tagsz}) must not exceed tagset-length width ({tssize})")]
    TagsizeWiderThanTssize { tagsz: u8, tssize: u8 },

    // ── Tagset / FTT errors (§7 "Tagset") ────────────────────────────
    #[error(transparent)]
    Tag(#[from] TagError),
    #[error("duplicate path '{0}'")]
    DuplicatePath(String),
    #[error("tagset length {len} exceeds the range of a {width}-byte tagset-size field")]
    RangeTSSize { len: u64, width: u8 },

    // ── Writer state errors (§7 "Writer state") ──────────────────────
    #[error("Begin called on an already-open package")]
    PackOpened,
    #[error("write attempted on a package that has not been opened with Begin/Append")]
    PackClosed,
    #[error("flush requested on a single-file package with no separate data stream")]
    DataClosed,

    // ── Lookup errors (§7 "Lookup") ──────────────────────────────────
    #[error("path not found: {0}")]
    NotFound(String),
    #[error("invalid path: {0}")]
    InvalidPath(String),

    // ── I/O: surfaced unchanged ───────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable error-family code, for callers that want to match by family
    /// rather than by variant (mirrors the teacher's `GraphError::code`).
    pub fn code(&self) -> &'static str {
        match self {
            Error::SignPre => "SIGN_PRE",
            Error::SignBad => "SIGN_BAD",
            Error::SignFTT => "SIGN_FTT",
            Error::InvalidWidth(_)
            | Error::BadTidWidth(_)
            | Error::BadTagsizeWidth(_)
            | Error::BadTssizeWidth(_)
            | Error::TidWiderThanTssize { .. }
            | Error::TagsizeWiderThanTssize { .. } => "CONFIGURATION",
            Error::Tag(_) => "TAGSET",
            Error::DuplicatePath(_) => "DUPLICATE_PATH",
            Error::RangeTSSize { .. } => "RANGE_TSSIZE",
            Error::PackOpened => "PACK_OPENED",
            Error::PackClosed => "PACK_CLOSED",
            Error::DataClosed => "DATA_CLOSED",
            Error::NotFound(_) => "NOT_FOUND",
            Error::InvalidPath(_) => "INVALID_PATH",
            Error::Io(_) => "IO",
        }
    }

    pub(crate) fn tag(key: impl Into<String>, tid: u32, fault: TagFault) -> Error {
        Error::Tag(TagError {
            key: key.into(),
            tid,
            source: fault,
        })
    }
}
