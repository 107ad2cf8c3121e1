//! `TypeSize` and the fixed 64-byte package `Header` (spec §4.4).

use std::io::{Read, Write};

use crate::error::{Error, Result};

/// Signature field size (bytes).
pub const SIGN_SIZE: usize = 24;
/// Fixed package header size (bytes).
pub const HEADER_SIZE: usize = 64;

/// Package is ready for use.
pub const SIGN_READY: &[u8; SIGN_SIZE] = b"packfs/1 Package        ";
/// Package is in building progress.
pub const SIGN_BUILD: &[u8; SIGN_SIZE] = b"packfs/1 Prebuild       ";

/// Configurable widths governing the binary layout of the tagset/FTT codec.
///
/// Widths are runtime configuration, not compile-time parameters (spec §9):
/// the core dispatches on these at every read/write boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeSize {
    /// Width of a tag ID, in `{1, 2, 4}` bytes.
    pub tid_width: u8,
    /// Width of a tag's value-length prefix, in `{1, 2, 4}` bytes.
    pub tagsize_width: u8,
    /// Width of a tagset's length prefix, in `{2, 4}` bytes.
    pub tssize_width: u8,
}

impl TypeSize {
    pub const COMMON: TypeSize = TypeSize {
        tid_width: 2,
        tagsize_width: 2,
        tssize_width: 2,
    };

    /// Validates the width domains and the two cross-field constraints
    /// (spec §4.4: `tid_width <= tssize_width`, `tagsize_width <=
    /// tssize_width`).
    pub fn checkup(&self) -> Result<()> {
        match self.tid_width {
            1 | 2 | 4 => {}
            other => return Err(Error::BadTidWidth(other)),
        }
        match self.tagsize_width {
            1 | 2 | 4 => {}
            other => return Err(Error::BadTagsizeWidth(other)),
        }
        match self.tssize_width {
            2 | 4 => {}
            other => return Err(Error::BadTssizeWidth(other)),
        }
        if self.tid_width > self.tssize_width {
            return Err(Error::TidWiderThanTssize {
                tid: self.tid_width,
                tssize: self.tssize_width,
            });
        }
        if self.tagsize_width > self.tssize_width {
            return Err(Error::TagsizeWiderThanTssize {
                tagsz: self.tagsize_width,
                tssize: self.tssize_width,
            });
        }
        Ok(())
    }

    fn to_bytes(self) -> [u8; 8] {
        [self.tid_width, self.tagsize_width, self.tssize_width, 0, 0, 0, 0, 0]
    }

    fn from_bytes(buf: [u8; 8]) -> Self {
        TypeSize {
            tid_width: buf[0],
            tagsize_width: buf[1],
            tssize_width: buf[2],
        }
    }
}

/// Fixed 64-byte little-endian package header.
#[derive(Debug, Clone, Copy)]
pub struct Header {
    signature: [u8; SIGN_SIZE],
    pub typesize: TypeSize,
    pub ftt_offset: u64,
    pub ftt_size: u64,
    pub data_offset: u64,
    pub data_size: u64,
}

impl Header {
    pub fn new_build(typesize: TypeSize) -> Self {
        Header {
            signature: *SIGN_BUILD,
            typesize,
            ftt_offset: 0,
            ftt_size: 0,
            data_offset: 0,
            data_size: 0,
        }
    }

    pub fn is_splitted(&self) -> bool {
        self.data_offset == 0 && self.data_size > 0
    }

    pub fn is_build(&self) -> bool {
        self.signature == *SIGN_BUILD
    }

    pub fn is_ready_signature(&self) -> bool {
        self.signature == *SIGN_READY
    }

    pub fn mark_ready(&mut self) {
        self.signature = *SIGN_READY;
    }

    /// Validates the signature is `Ready`. `Prebuild` is permitted only for
    /// split packages (a reader may consult the metadata file of a build in
    /// progress), matching spec §4.4.
    pub fn is_ready(&self) -> Result<()> {
        if self.signature == *SIGN_BUILD && !self.is_splitted() {
            return Err(Error::SignPre);
        }
        if self.signature != *SIGN_READY {
            return Err(Error::SignBad);
        }
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let mut signature = [0u8; SIGN_SIZE];
        r.read_exact(&mut signature)?;
        let mut ts_buf = [0u8; 8];
        r.read_exact(&mut ts_buf)?;
        let typesize = TypeSize::from_bytes(ts_buf);
        let ftt_offset = crate::codec::read_uint(r, 8)?;
        let ftt_size = crate::codec::read_uint(r, 8)?;
        let data_offset = crate::codec::read_uint(r, 8)?;
        let data_size = crate::codec::read_uint(r, 8)?;
        Ok(Header {
            signature,
            typesize,
            ftt_offset,
            ftt_size,
            data_offset,
            data_size,
        })
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(&self.signature)?;
        w.write_all(&self.typesize.to_bytes())?;
        crate::codec::write_uint(w, self.ftt_offset, 8)?;
        crate::codec::write_uint(w, self.ftt_size, 8)?;
        crate::codec::write_uint(w, self.data_offset, 8)?;
        crate::codec::write_uint(w, self.data_size, 8)?;
        Ok(())
    }
}
