use crate::ids::ByteSize;
use chrono::{DateTime, Utc};

/// What is being auctioned: size in bytes and an optional last-modified time.
///
/// Invariant: any file actually auctioned has `size > 0`; zero-byte files are
/// silently skipped by the Auctioneer before a `FileStats` is ever built for them.
#[derive(Debug, Clone, PartialEq)]
pub struct FileStats {
    pub size: ByteSize,
    pub mod_time: Option<DateTime<Utc>>,
}

impl FileStats {
    pub fn new(size: ByteSize, mod_time: Option<DateTime<Utc>>) -> Self {
        Self { size, mod_time }
    }
}
