//! A binary file-archive container with a tagged-metadata index and a
//! read-only virtual filesystem view over it.
//!
//! A package bundles arbitrary byte blobs under hierarchical path keys,
//! each decorated with an extensible tagged metadata record (the File Tags
//! Table, or FTT). [`writer::PackWriter`] assembles or extends a package;
//! [`reader::PackageReader`] opens one for read-only traversal (stat, glob,
//! read-dir, sub-tree); [`union::Union`] composes several packages into one
//! first-wins view.

pub mod codec;
pub mod decorate;
pub mod error;
pub mod ftt;
pub mod header;
pub mod path;
pub mod reader;
pub mod tag;
pub mod tagset;
pub mod tid;
pub mod union;
pub mod writer;

pub use error::{Error, Result};
pub use ftt::Ftt;
pub use header::{Header, TypeSize};
pub use reader::{DirEntry, PackageReader, SectionReader};
pub use tag::TagRaw;
pub use tagset::TagsetRaw;
pub use union::Union;
pub use writer::{PackOptions, PackWriter};
