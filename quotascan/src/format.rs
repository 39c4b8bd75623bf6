//! Quota types and quota format codes.
//!
//! Formats are a closed enumeration; call sites that accept "any format"
//! take an `Option<QuotaFormat>` with `None` meaning unrestricted.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Kind of quota: per-user or per-group accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuotaType {
    User,
    Group,
}

impl QuotaType {
    /// Both types, in kernel order.
    pub const ALL: [QuotaType; 2] = [QuotaType::User, QuotaType::Group];

    /// Kernel type number (`USRQUOTA`/`GRPQUOTA`).
    pub fn kernel_type(self) -> i32 {
        match self {
            QuotaType::User => 0,
            QuotaType::Group => 1,
        }
    }

    /// Index into per-type arrays.
    pub(crate) fn index(self) -> usize {
        self.kernel_type() as usize
    }

    /// Extension used for quota file names of this type.
    pub fn extension(self) -> &'static str {
        match self {
            QuotaType::User => "user",
            QuotaType::Group => "group",
        }
    }
}

impl fmt::Display for QuotaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// On-disk / kernel quota format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuotaFormat {
    /// Original quota format with 16-bit ids.
    VfsOld,
    /// Standard radix-tree quota format.
    VfsV0,
    /// Radix-tree quota format with 64-bit limits.
    VfsV1,
    /// Quota over RPC to a remote server; no local on-disk format.
    Rpc,
    /// XFS-native quota, kept in filesystem metadata.
    Xfs,
    /// Quota tracked in filesystem metadata (OCFS2, ext4 system files);
    /// always accounted once the filesystem reports it.
    Meta,
}

/// Kernel format identifiers as reported by `Q_GETFMT`.
mod kernfmt {
    pub const QFMT_VFS_OLD: u32 = 1;
    pub const QFMT_VFS_V0: u32 = 2;
    pub const QFMT_OCFS2: u32 = 3;
    pub const QFMT_VFS_V1: u32 = 4;
}

impl QuotaFormat {
    /// Map a kernel format identifier to the utility format code.
    pub fn from_kernel_id(id: u32) -> Option<QuotaFormat> {
        match id {
            kernfmt::QFMT_VFS_OLD => Some(QuotaFormat::VfsOld),
            kernfmt::QFMT_VFS_V0 => Some(QuotaFormat::VfsV0),
            kernfmt::QFMT_VFS_V1 => Some(QuotaFormat::VfsV1),
            kernfmt::QFMT_OCFS2 => Some(QuotaFormat::Meta),
            _ => None,
        }
    }

    /// Map the utility format code to the kernel format identifier.
    ///
    /// Only the formats backed by a quota file have a kernel identifier.
    pub fn kernel_id(self) -> Option<u32> {
        match self {
            QuotaFormat::VfsOld => Some(kernfmt::QFMT_VFS_OLD),
            QuotaFormat::VfsV0 => Some(kernfmt::QFMT_VFS_V0),
            QuotaFormat::VfsV1 => Some(kernfmt::QFMT_VFS_V1),
            _ => None,
        }
    }

    /// Whether the on-disk layout of this format is a radix tree.
    pub fn is_tree(self) -> bool {
        matches!(self, QuotaFormat::VfsV0 | QuotaFormat::VfsV1)
    }

    /// Default basename of the quota file for this format, if it has one.
    pub fn default_basename(self) -> Option<&'static str> {
        match self {
            QuotaFormat::VfsOld => Some("quota"),
            QuotaFormat::VfsV0 | QuotaFormat::VfsV1 => Some("aquota"),
            _ => None,
        }
    }
}

impl fmt::Display for QuotaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QuotaFormat::VfsOld => "vfsold",
            QuotaFormat::VfsV0 => "vfsv0",
            QuotaFormat::VfsV1 => "vfsv1",
            QuotaFormat::Rpc => "rpc",
            QuotaFormat::Xfs => "xfs",
            QuotaFormat::Meta => "meta",
        };
        f.write_str(name)
    }
}

/// Error parsing a quota format name.
#[derive(Debug, Error, PartialEq, Eq)]
#[error(
    "Unknown quota format: {input}. Supported formats are: \
     vfsold (original format), vfsv0 (standard format), \
     vfsv1 (64-bit limits), rpc (RPC calls), xfs (XFS quota format)"
)]
pub struct FormatParseError {
    input: String,
}

impl FromStr for QuotaFormat {
    type Err = FormatParseError;

    /// Parse a user-selectable format name. `meta` is detected, never
    /// requested, so it is deliberately not accepted here.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vfsold" => Ok(QuotaFormat::VfsOld),
            "vfsv0" => Ok(QuotaFormat::VfsV0),
            "vfsv1" => Ok(QuotaFormat::VfsV1),
            "rpc" => Ok(QuotaFormat::Rpc),
            "xfs" => Ok(QuotaFormat::Xfs),
            _ => Err(FormatParseError {
                input: s.to_string(),
            }),
        }
    }
}

/// Result of classifying one mount for one quota type.
///
/// Classification can often prove that quota applies without knowing the
/// final format: a plain `usrquota` mount option promises a quota file
/// whose format is only pinned down later, when the file is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectedFormat {
    /// XFS-native quota with accounting enabled.
    Xfs,
    /// Metadata-tracked quota, always accounted.
    Meta,
    /// Remote filesystem; enablement cannot be determined client-side.
    Rpc,
    /// A VFS quota mount option is present; exact format resolved later.
    VfsUnknown,
}

impl DetectedFormat {
    /// The concrete format, when classification already pinned one down.
    pub fn format(self) -> Option<QuotaFormat> {
        match self {
            DetectedFormat::Xfs => Some(QuotaFormat::Xfs),
            DetectedFormat::Meta => Some(QuotaFormat::Meta),
            DetectedFormat::Rpc => Some(QuotaFormat::Rpc),
            DetectedFormat::VfsUnknown => None,
        }
    }
}
