//! Fixed snapshot header, parsed once at open.

use chrono::{DateTime, Utc};

/// Byte offset of the first object record; immediately follows the fixed
/// header region.
pub const FIRST_OBJECT_OFFSET: u64 = 0x43E;

/// Fixed metadata at the start of a snapshot file.
#[derive(Debug, Clone)]
pub struct SnapshotHeader {
    pub signature: String,
    pub captured_at: DateTime<Utc>,
    pub description: String,
    pub server: String,
    pub num_objects: u32,
    pub num_attributes: u32,
    pub mapping_offset: u64,
    pub file_size: u64,
}
