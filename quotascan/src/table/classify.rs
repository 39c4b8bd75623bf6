//! Per-filesystem quota detection rules.
//!
//! Given one mount record, decide which quota state applies to it for a
//! given quota type. Dispatch is by filesystem type name: the XFS family
//! keeps quota in filesystem metadata and answers a statistics syscall,
//! OCFS2 answers the generic format query, ext4 may keep quota in system
//! files, remote filesystems are opaque, and everything else falls back to
//! mount-option inspection.

use std::path::Path;

use crate::format::{DetectedFormat, QuotaType};
use crate::kernel::{
    quotactl, FsQuotaStat, IfDqinfo, DQF_SYS_FILE, Q_GETFMT, Q_GETINFO, Q_XGETQSTAT,
    XFS_QUOTA_GDQ_ACCT, XFS_QUOTA_UDQ_ACCT,
};
use crate::mntopt::{self, OPT_GRPJQUOTA, OPT_GRPQUOTA, OPT_QUOTA, OPT_USRJQUOTA, OPT_USRQUOTA};

/// Whether the type names one of the NFS filesystem variants.
pub fn nfs_fstype(fstype: &str) -> bool {
    matches!(fstype, "nfs" | "nfs4" | "mpfs")
}

/// Whether the type keeps quota purely in filesystem metadata.
pub fn meta_qf_fstype(fstype: &str) -> bool {
    fstype == "ocfs2"
}

/// Whether the type uses the XFS quota subsystem.
pub fn xfs_fstype(fstype: &str) -> bool {
    matches!(fstype, "xfs" | "gfs2")
}

/// Classify one mount for one quota type.
///
/// `xfs_disabled` makes XFS-family mounts classify as XFS-format without
/// consulting the live accounting flags, for callers about to change the
/// accounting state itself.
pub(crate) fn detect_quota(
    devname: &Path,
    fstype: &str,
    dir: &str,
    opts: &str,
    qtype: QuotaType,
    xfs_disabled: bool,
) -> Option<DetectedFormat> {
    if xfs_fstype(fstype) {
        return has_xfs_quota(devname, dir, qtype, xfs_disabled);
    }
    if meta_qf_fstype(fstype) {
        return has_vfs_meta_quota(devname, qtype);
    }
    // ext4 may keep quota in system files; the generic format query cannot
    // tell a system file from an ordinary quota file, so ask Q_GETINFO and
    // fall back to option-based detection when it denies the system flag.
    if fstype == "ext4" {
        let mut info = IfDqinfo::default();
        if quotactl(
            Q_GETINFO,
            qtype.kernel_type(),
            Some(devname),
            0,
            (&mut info as *mut IfDqinfo).cast(),
        )
        .is_ok()
            && info.dqi_flags & DQF_SYS_FILE != 0
        {
            return Some(DetectedFormat::Meta);
        }
    }
    // NFS always has quota, or rather there is no good way to detect it.
    if nfs_fstype(fstype) {
        return Some(DetectedFormat::Rpc);
    }

    match qtype {
        QuotaType::User => {
            if mntopt::has_option(opts, OPT_USRQUOTA)
                || mntopt::option_arg(opts, OPT_USRJQUOTA).is_some()
                || mntopt::has_option(opts, OPT_QUOTA)
            {
                return Some(DetectedFormat::VfsUnknown);
            }
        }
        QuotaType::Group => {
            if mntopt::has_option(opts, OPT_GRPQUOTA)
                || mntopt::option_arg(opts, OPT_GRPJQUOTA).is_some()
            {
                return Some(DetectedFormat::VfsUnknown);
            }
        }
    }
    None
}

/// Check an XFS-family mount for enabled quota accounting of `qtype`.
#[cfg_attr(not(feature = "xfs-roothack"), allow(unused_variables))]
fn has_xfs_quota(
    devname: &Path,
    dir: &str,
    qtype: QuotaType,
    xfs_disabled: bool,
) -> Option<DetectedFormat> {
    if xfs_disabled {
        return Some(DetectedFormat::Xfs);
    }

    let mut info = FsQuotaStat::default();
    if quotactl(
        Q_XGETQSTAT,
        qtype.kernel_type(),
        Some(devname),
        0,
        (&mut info as *mut FsQuotaStat).cast(),
    )
    .is_ok()
    {
        let acct_bit = match qtype {
            QuotaType::User => XFS_QUOTA_UDQ_ACCT,
            QuotaType::Group => XFS_QUOTA_GDQ_ACCT,
        };
        if info.qs_flags & acct_bit != 0 {
            return Some(DetectedFormat::Xfs);
        }
        // Up to XFS 1.2 / Linux 2.5.47 quota could be enabled on the root
        // filesystem without a mount option; the superblock flags live in
        // the upper byte there.
        #[cfg(feature = "xfs-roothack")]
        {
            if dir == "/" {
                let sbflags = (info.qs_flags & 0xff00) >> 8;
                if sbflags & acct_bit != 0 {
                    return Some(DetectedFormat::Xfs);
                }
            }
        }
    }
    None
}

/// OCFS2 tracks quota as metadata; a retrievable format answer means it is
/// enabled.
fn has_vfs_meta_quota(devname: &Path, qtype: QuotaType) -> Option<DetectedFormat> {
    let mut fmt: u32 = 0;
    if quotactl(
        Q_GETFMT,
        qtype.kernel_type(),
        Some(devname),
        0,
        (&mut fmt as *mut u32).cast(),
    )
    .is_ok()
    {
        return Some(DetectedFormat::Meta);
    }
    None
}
