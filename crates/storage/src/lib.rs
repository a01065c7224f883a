//! The local asset cache.
//!
//! Assets are plain files under a cache root, optionally accompanied by
//! pre-compressed `.br`/`.gz` siblings. Nothing here ever modifies a committed
//! file: entries appear through [`StagedFile::commit`] (write to a temporary
//! file, then rename) and are otherwise only read.

pub mod error;
mod models;
mod path;
mod staged;
mod store;

pub use crate::models::{Resolved, content_type};
pub use crate::path::{AssetPath, validate as validate_path};
pub use crate::staged::StagedFile;
pub use crate::store::{AssetReader, AssetStore};
