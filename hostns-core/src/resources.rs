//! Disk usage value objects

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};
use std::path::PathBuf;

/// Byte count with human readable display
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[repr(transparent)]
#[serde(transparent)]
pub struct ByteSize(u64);

impl ByteSize {
    /// Create from bytes
    #[must_use]
    pub const fn from_bytes(bytes: u64) -> Self {
        Self(bytes)
    }

    /// Create from a block count and block size
    #[must_use]
    pub const fn from_blocks(blocks: u64, block_size: u64) -> Self {
        Self(blocks.saturating_mul(block_size))
    }

    /// Get value in bytes
    #[must_use]
    pub const fn as_bytes(self) -> u64 {
        self.0
    }

    /// Get value in gigabytes
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_gb(self) -> f64 {
        self.0 as f64 / (1024.0 * 1024.0 * 1024.0)
    }
}

impl Add for ByteSize {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sub for ByteSize {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl fmt::Display for ByteSize {
    #[allow(clippy::cast_precision_loss)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const GB: u64 = 1024 * 1024 * 1024;
        const MB: u64 = 1024 * 1024;
        const KB: u64 = 1024;

        if self.0 >= GB {
            write!(f, "{:.2} GB", self.as_gb())
        } else if self.0 >= MB {
            write!(f, "{:.2} MB", self.0 as f64 / MB as f64)
        } else if self.0 >= KB {
            write!(f, "{:.2} KB", self.0 as f64 / KB as f64)
        } else {
            write!(f, "{} bytes", self.0)
        }
    }
}

/// Filesystem usage for the filesystem holding a path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskStat {
    /// Path that was queried
    pub path: PathBuf,
    /// Filesystem ID as reported by statvfs(3)
    pub fs_id: u64,
    /// Fundamental block size
    pub block_size: u64,
    /// Total blocks
    pub total_blocks: u64,
    /// Free blocks
    pub free_blocks: u64,
    /// Blocks available to unprivileged users
    pub available_blocks: u64,
    /// Filesystem capacity
    pub storage_maximum: ByteSize,
    /// Capacity available to unprivileged users
    pub storage_available: ByteSize,
}

impl DiskStat {
    /// Build from raw block counts
    #[must_use]
    pub fn from_blocks(
        path: impl Into<PathBuf>,
        fs_id: u64,
        block_size: u64,
        total_blocks: u64,
        free_blocks: u64,
        available_blocks: u64,
    ) -> Self {
        Self {
            path: path.into(),
            fs_id,
            block_size,
            total_blocks,
            free_blocks,
            available_blocks,
            storage_maximum: ByteSize::from_blocks(total_blocks, block_size),
            storage_available: ByteSize::from_blocks(available_blocks, block_size),
        }
    }

    /// Space in use: capacity minus free blocks
    #[must_use]
    pub fn storage_used(&self) -> ByteSize {
        self.storage_maximum - ByteSize::from_blocks(self.free_blocks, self.block_size)
    }
}
