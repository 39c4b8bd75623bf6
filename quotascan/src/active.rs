//! Live quota-enablement resolution.
//!
//! Classification says a mount *can* carry quota; this module answers
//! whether the kernel has quota *turned on* for it right now, and in which
//! format. Disambiguation depends on the probed kernel interface
//! generation: the generic interface answers a format query directly,
//! legacy interfaces are probed with unprivileged get-quota calls for the
//! caller's own id.

use std::path::Path;

use crate::format::{DetectedFormat, QuotaFormat, QuotaType};
use crate::kernel::{
    quotactl, FsQuotaStat, Interface, KernelSupport, Q_GETFMT, Q_V1_GETQUOTA, Q_V2_GETQUOTA,
    Q_XGETQSTAT, XFS_QUOTA_GDQ_ACCT, XFS_QUOTA_UDQ_ACCT,
};
use crate::table::MountEntry;

/// Resolve the format quota is currently enabled with on `entry`, honoring
/// a requested-format restriction (`None` accepts any).
///
/// Returns `None` whenever quota is not active for this type in any
/// acceptable format. Remote quota can never be confirmed active in
/// kernel terms; metadata quota is always active.
pub fn kernel_quota_active(
    entry: &MountEntry,
    qtype: QuotaType,
    fmt: Option<QuotaFormat>,
) -> Option<QuotaFormat> {
    let detected = entry.detected(qtype)?;
    if fmt == Some(QuotaFormat::Rpc) {
        return None;
    }
    if detected == DetectedFormat::Xfs {
        if (fmt.is_none() || fmt == Some(QuotaFormat::Xfs))
            && xfs_quota_active(&entry.devname, qtype)
        {
            return Some(QuotaFormat::Xfs);
        }
        return None;
    }
    // No more chances for the XFS format to succeed.
    if fmt == Some(QuotaFormat::Xfs) {
        return None;
    }
    if detected == DetectedFormat::Meta {
        return Some(QuotaFormat::Meta);
    }

    match KernelSupport::get().interface() {
        Interface::Generic => {
            let mut actfmt: u32 = 0;
            if quotactl(
                Q_GETFMT,
                qtype.kernel_type(),
                Some(&entry.devname),
                0,
                (&mut actfmt as *mut u32).cast(),
            )
            .is_ok()
            {
                if let Some(active) = QuotaFormat::from_kernel_id(actfmt) {
                    return Some(active);
                }
            }
            None
        }
        Interface::VfsV0 | Interface::VfsOld => {
            if (fmt.is_none() || fmt == Some(QuotaFormat::VfsV0))
                && v2_quota_active(&entry.devname, qtype)
            {
                return Some(QuotaFormat::VfsV0);
            }
            if (fmt.is_none() || fmt == Some(QuotaFormat::VfsOld))
                && v1_quota_active(&entry.devname, qtype)
            {
                return Some(QuotaFormat::VfsOld);
            }
            None
        }
    }
}

/// The id probed on legacy interfaces: the caller's own, so no elevated
/// rights are needed.
fn own_id(qtype: QuotaType) -> i32 {
    match qtype {
        QuotaType::User => unsafe { libc::getuid() as i32 },
        QuotaType::Group => unsafe { libc::getgid() as i32 },
    }
}

fn v1_quota_active(devname: &Path, qtype: QuotaType) -> bool {
    let mut scratch = [0u8; 1024];
    quotactl(
        Q_V1_GETQUOTA,
        qtype.kernel_type(),
        Some(devname),
        own_id(qtype),
        scratch.as_mut_ptr().cast(),
    )
    .is_ok()
}

fn v2_quota_active(devname: &Path, qtype: QuotaType) -> bool {
    let mut scratch = [0u8; 1024];
    quotactl(
        Q_V2_GETQUOTA,
        qtype.kernel_type(),
        Some(devname),
        own_id(qtype),
        scratch.as_mut_ptr().cast(),
    )
    .is_ok()
}

/// Re-check the live XFS accounting bit for `qtype`.
fn xfs_quota_active(devname: &Path, qtype: QuotaType) -> bool {
    let mut info = FsQuotaStat::default();
    if quotactl(
        Q_XGETQSTAT,
        qtype.kernel_type(),
        Some(devname),
        0,
        (&mut info as *mut FsQuotaStat).cast(),
    )
    .is_err()
    {
        return false;
    }
    let acct_bit = match qtype {
        QuotaType::User => XFS_QUOTA_UDQ_ACCT,
        QuotaType::Group => XFS_QUOTA_GDQ_ACCT,
    };
    info.qs_flags & acct_bit != 0
}
