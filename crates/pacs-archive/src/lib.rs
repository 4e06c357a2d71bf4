//! # PACS Archive
//!
//! 影像归档索引：Patient → Study → Series → Instance 四级层次与派生计数。

pub mod index;
pub mod models;

pub use index::{ArchiveIndex, ArchiveStats};
pub use models::*;
