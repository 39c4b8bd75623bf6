//! One cached mounted filesystem.

use std::path::{Path, PathBuf};

use crate::format::{DetectedFormat, QuotaType};

/// A mounted filesystem with quota potential, as kept in the scan cache.
///
/// At most one entry exists per device identity: the raw device number of
/// the backing block device for local filesystems, or the root device
/// number of the mountpoint for remote ones. Entries are immutable after
/// insertion.
#[derive(Debug)]
pub struct MountEntry {
    /// Filesystem type name as reported by the mount table.
    pub fstype: String,
    /// Raw mount option string.
    pub opts: String,
    /// Device identity used for deduplication and matching.
    pub dev: u64,
    /// Inode number of the mountpoint, for directory-based matching.
    pub ino: u64,
    /// Resolved device path.
    pub devname: PathBuf,
    /// Canonicalized, symlink-free mountpoint path.
    pub dir: PathBuf,
    /// Detected quota state per quota type, `None` meaning no quota.
    pub(crate) qfmt: [Option<DetectedFormat>; 2],
}

impl MountEntry {
    /// Classification result for one quota type.
    pub fn detected(&self, qtype: QuotaType) -> Option<DetectedFormat> {
        self.qfmt[qtype.index()]
    }
}

/// A cache entry paired with the directory the caller asked about.
///
/// When several caller-supplied paths lead to one physical mount, the
/// entry is shared and `dir` carries the path of the current selection;
/// in an all-mounts scan it is simply the entry's canonical mountpoint.
#[derive(Debug, Clone, Copy)]
pub struct SelectedMount<'a> {
    pub entry: &'a MountEntry,
    pub dir: &'a Path,
}
