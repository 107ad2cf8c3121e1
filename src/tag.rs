//! `TagRaw` — an opaque byte slice representing one tag value, with typed
//! constructors and typed accessors (spec §4.2).
//!
//! Typed accessors return `Option<T>`: `None` signals a length mismatch for
//! the requested interpretation, not a fatal error (spec: "`ok=false`
//! signals a length mismatch... rather than a fatal error").

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::codec::{decode_uint, encode_uint};

/// 8-byte form: i64 nanoseconds since the Unix epoch.
const TIME_SHORT_LEN: usize = 8;
/// 12-byte extended form: i64 seconds since epoch + u32 nanoseconds.
const TIME_EXT_LEN: usize = 12;

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TagRaw(Vec<u8>);

impl TagRaw {
    /// Wraps an already-encoded byte buffer as a tag value.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        TagRaw(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// UTF-8 string tag, no terminator.
    pub fn from_str_val(s: &str) -> Self {
        TagRaw(s.as_bytes().to_vec())
    }

    /// Unsigned integer tag of explicit width (1, 2, 4 or 8 bytes).
    /// Returns `None` for an unsupported width.
    pub fn from_uint_width(value: u64, width: u8) -> Option<Self> {
        encode_uint(value, width).map(TagRaw)
    }

    /// Unsigned integer tag, width inferred from the TID's conventional
    /// size (`OFFSET`/`SIZE` style fields default to 8 bytes unless the
    /// caller knows a narrower width applies).
    pub fn from_uint(value: u64) -> Self {
        TagRaw(value.to_le_bytes().to_vec())
    }

    /// Boolean tag: one byte, 0 or 1.
    pub fn from_bool(value: bool) -> Self {
        TagRaw(vec![value as u8])
    }

    /// Timestamp tag. Uses the compact 8-byte signed-nanoseconds form when
    /// the duration since the epoch fits in an `i64` nanosecond count
    /// (~±292 years), otherwise falls back to the 12-byte extended form.
    pub fn from_time(t: SystemTime) -> Self {
        match t.duration_since(UNIX_EPOCH) {
            Ok(d) => {
                let nanos = d.as_nanos();
                if let Ok(n) = i64::try_from(nanos) {
                    TagRaw(n.to_le_bytes().to_vec())
                } else {
                    Self::from_time_ext(d.as_secs() as i64, d.subsec_nanos())
                }
            }
            Err(e) => {
                // Time predates the epoch: negative nanoseconds, or the
                // extended form if it doesn't fit in i64 nanos either.
                let d = e.duration();
                let nanos = d.as_nanos();
                if let Ok(n) = i64::try_from(nanos) {
                    TagRaw((-n).to_le_bytes().to_vec())
                } else {
                    Self::from_time_ext(-(d.as_secs() as i64), d.subsec_nanos())
                }
            }
        }
    }

    /// 12-byte extended time form: signed seconds + unsigned sub-second
    /// nanoseconds.
    pub fn from_time_ext(secs: i64, nanos: u32) -> Self {
        let mut buf = Vec::with_capacity(TIME_EXT_LEN);
        buf.extend_from_slice(&secs.to_le_bytes());
        buf.extend_from_slice(&nanos.to_le_bytes());
        TagRaw(buf)
    }

    /// Raw byte-array tag (e.g. a hash digest).
    pub fn from_raw(bytes: &[u8]) -> Self {
        TagRaw(bytes.to_vec())
    }

    // ── Typed accessors ──────────────────────────────────────────────

    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    /// Decodes as an unsigned integer of exactly `width` bytes.
    pub fn as_uint_width(&self, width: u8) -> Option<u64> {
        decode_uint(&self.0, width)
    }

    /// Decodes as an unsigned integer, inferring the width from the
    /// encoded length (1, 2, 4 or 8 bytes); `None` for any other length.
    pub fn as_uint(&self) -> Option<u64> {
        match self.0.len() {
            1 | 2 | 4 | 8 => decode_uint(&self.0, self.0.len() as u8),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.0.as_slice() {
            [0] => Some(false),
            [1] => Some(true),
            _ => None,
        }
    }

    /// Decodes a timestamp in either the 8-byte or 12-byte form.
    pub fn as_time(&self) -> Option<SystemTime> {
        match self.0.len() {
            TIME_SHORT_LEN => {
                let n = i64::from_le_bytes(self.0.clone().try_into().ok()?);
                to_system_time(n.div_euclid(1_000_000_000), (n.rem_euclid(1_000_000_000)) as u32)
            }
            TIME_EXT_LEN => {
                let secs = i64::from_le_bytes(self.0[0..8].try_into().ok()?);
                let nanos = u32::from_le_bytes(self.0[8..12].try_into().ok()?);
                to_system_time(secs, nanos)
            }
            _ => None,
        }
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.0
    }
}

fn to_system_time(secs: i64, nanos: u32) -> Option<SystemTime> {
    if secs >= 0 {
        UNIX_EPOCH.checked_add(Duration::new(secs as u64, nanos))
    } else {
        UNIX_EPOCH.checked_sub(Duration::new((-secs) as u64, 0))?.checked_add(Duration::from_nanos(nanos as u64))
    }
}

impl std::fmt::Debug for TagRaw {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(s) = self.as_str() {
            if s.chars().all(|c| !c.is_control()) {
                return write!(f, "TagRaw({:?})", s);
            }
        }
        write!(f, "TagRaw({} bytes)", self.0.len())
    }
}
