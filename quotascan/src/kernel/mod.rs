//! Kernel quota interface detection.
//!
//! The interface generation and the set of formats the running kernel can
//! handle are machine-wide facts. They are probed exactly once per process,
//! on first use, because the probe swaps the process-global SIGSEGV handler
//! and must not race other threads issuing quota syscalls; run any quota
//! work after the first call to [`KernelSupport::get`].

mod quotactl;
mod sigguard;

pub use quotactl::{
    quotactl, FsQfilestat, FsQuotaStat, IfDqinfo, DQF_SYS_FILE, Q_GETFMT, Q_GETINFO,
    Q_V1_GETQUOTA, Q_V1_GETSTATS, Q_V2_GETQUOTA, Q_V2_GETSTATS, Q_XGETQSTAT, XFS_QUOTA_GDQ_ACCT,
    XFS_QUOTA_GDQ_ENFD, XFS_QUOTA_UDQ_ACCT, XFS_QUOTA_UDQ_ENFD,
};
pub use sigguard::SegvGuard;

use std::io;
use std::path::Path;
use std::sync::OnceLock;

use crate::format::QuotaFormat;

/// Pseudo-file present when the kernel has the XFS quota subsystem.
const XFS_STAT_PATH: &str = "/proc/fs/xfs/stat";
/// Pseudo-file present when the kernel exposes the generic quota interface.
const GENERIC_QUOTA_PATH: &str = "/proc/sys/fs/quota";

/// Quota kernel interface generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interface {
    /// Current interface; formats are queried uniformly via `Q_GETFMT`.
    Generic,
    /// Legacy kernels speaking the v0 quota interface.
    VfsV0,
    /// Legacy kernels speaking only the original quota interface.
    VfsOld,
}

/// Statistics block of the historical v2 interface probe.
#[repr(C)]
#[derive(Default)]
struct V2DqStats {
    lookups: u32,
    drops: u32,
    reads: u32,
    writes: u32,
    cache_hits: u32,
    allocated_dquots: u32,
    free_dquots: u32,
    syncs: u32,
    version: u32,
}

/// Process-wide result of the kernel interface probe.
#[derive(Debug)]
pub struct KernelSupport {
    interface: Interface,
    formats: Vec<QuotaFormat>,
}

static KERNEL: OnceLock<KernelSupport> = OnceLock::new();

impl KernelSupport {
    /// The probed kernel state, detecting on first call.
    pub fn get() -> &'static KernelSupport {
        KERNEL.get_or_init(KernelSupport::detect)
    }

    /// Interface generation of the running kernel.
    pub fn interface(&self) -> Interface {
        self.interface
    }

    /// Formats the kernel can handle, in detection order.
    pub fn formats(&self) -> &[QuotaFormat] {
        &self.formats
    }

    /// Whether the kernel handles `fmt`; `None` asks for any format at all.
    pub fn supports(&self, fmt: Option<QuotaFormat>) -> bool {
        match fmt {
            None => !self.formats.is_empty(),
            Some(fmt) => self.formats.contains(&fmt),
        }
    }

    fn detect() -> KernelSupport {
        // Old kernels may raise SIGSEGV while resolving the probe device.
        let _guard = SegvGuard::install();

        let mut formats = Vec::new();
        if Path::new(XFS_STAT_PATH).exists() {
            formats.push(QuotaFormat::Xfs);
        } else if xfs_syscall_answers() {
            formats.push(QuotaFormat::Xfs);
        }

        // Assume the generic interface unless its pseudo-file provably
        // does not exist; any other stat error keeps the assumption.
        let generic = match std::fs::metadata(GENERIC_QUOTA_PATH) {
            Ok(_) => true,
            Err(err) => err.kind() != io::ErrorKind::NotFound,
        };
        if generic {
            formats.extend([
                QuotaFormat::Meta,
                QuotaFormat::VfsOld,
                QuotaFormat::VfsV0,
                QuotaFormat::VfsV1,
            ]);
            return KernelSupport {
                interface: Interface::Generic,
                formats,
            };
        }

        let mut stats = V2DqStats::default();
        match quotactl(
            Q_V2_GETSTATS,
            0,
            None,
            0,
            (&mut stats as *mut V2DqStats).cast(),
        ) {
            Ok(()) => {
                formats.push(QuotaFormat::VfsV0);
                KernelSupport {
                    interface: Interface::VfsV0,
                    formats,
                }
            }
            Err(err)
                if err.raw_os_error() != Some(libc::ENOSYS)
                    && err.raw_os_error() != Some(libc::ENOTSUP) =>
            {
                let (interface, fmt) = classify_legacy_interface();
                formats.push(fmt);
                KernelSupport { interface, formats }
            }
            // ENOSYS/ENOTSUP: no VFS quota support in this kernel at all.
            Err(_) => KernelSupport {
                interface: Interface::VfsOld,
                formats,
            },
        }
    }
}

/// Probe XFS capability through the statistics syscall against the root
/// device. Success proves it; so does any failure other than the two
/// errno values old kernels use for "no such subsystem".
fn xfs_syscall_answers() -> bool {
    let mut dummy = FsQuotaStat::default();
    match quotactl(
        Q_XGETQSTAT,
        0,
        Some(Path::new("/dev/root")),
        0,
        (&mut dummy as *mut FsQuotaStat).cast(),
    ) {
        Ok(()) => true,
        Err(err) => {
            err.raw_os_error() != Some(libc::EINVAL) && err.raw_os_error() != Some(libc::ENOSYS)
        }
    }
}

/// Historical heuristic telling the v0-legacy interface apart from the
/// old-legacy one on kernels where the v2 statistics call fails with an
/// unexpected errno.
///
/// One distribution kernel line (2.4.2-2) kept `Q_V1_GETSTATS` at its old
/// command number while already serving `Q_GETQUOTA` from the new one. The
/// observed signature there is: statistics call succeeds, v1 get-quota
/// against the null device fails with `EINVAL`; plain 2.4.x kernels answer
/// success and `ENOENT` instead. The errno pairing below reproduces that
/// observation exactly and must not be "improved".
fn classify_legacy_interface() -> (Interface, QuotaFormat) {
    let mut scratch = [0u8; 1024];
    let err_stat = match quotactl(Q_V1_GETSTATS, 0, None, 0, scratch.as_mut_ptr().cast()) {
        Ok(()) => 0,
        Err(err) => err.raw_os_error().unwrap_or(0),
    };
    let err_quota = match quotactl(
        Q_V1_GETQUOTA,
        0,
        Some(Path::new("/dev/null")),
        0,
        scratch.as_mut_ptr().cast(),
    ) {
        Ok(()) => 0,
        Err(err) => err.raw_os_error().unwrap_or(0),
    };

    if err_stat == 0 && err_quota == libc::EINVAL {
        (Interface::VfsV0, QuotaFormat::VfsV0)
    } else {
        (Interface::VfsOld, QuotaFormat::VfsOld)
    }
}
