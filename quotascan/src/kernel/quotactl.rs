//! Raw `quotactl(2)` plumbing: command encoding, ABI structs, safe wrapper.
//!
//! Command numbers cover every kernel interface generation this crate can
//! meet: the generic `Q_*` commands of current kernels plus the historical
//! `Q_V1_*`/`Q_V2_*` numbers of pre-generic kernels, which are still needed
//! to probe and disambiguate old interfaces.

use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use libc::{c_int, c_void};

/// Generic interface: get the format quota is enabled with.
pub const Q_GETFMT: u32 = 0x80_0004;
/// Generic interface: get information about quota state.
pub const Q_GETINFO: u32 = 0x80_0005;

/// XFS command namespace: `('X' << 8) + cmd`.
const fn xqm_cmd(cmd: u32) -> u32 {
    (('X' as u32) << 8) + cmd
}

/// XFS: get quota subsystem status.
pub const Q_XGETQSTAT: u32 = xqm_cmd(5);

/// Pre-generic v1 interface: get quota for an id.
pub const Q_V1_GETQUOTA: u32 = 0x0300;
/// Pre-generic v1 interface: get quota statistics.
pub const Q_V1_GETSTATS: u32 = 0x0800;
/// Pre-generic v2 interface: get quota for an id.
pub const Q_V2_GETQUOTA: u32 = 0x0D00;
/// Pre-generic v2 interface: get quota statistics.
pub const Q_V2_GETSTATS: u32 = 0x1100;

/// XFS quota accounting/enforcement flags in `FsQuotaStat::qs_flags`.
pub const XFS_QUOTA_UDQ_ACCT: u16 = 1 << 0;
pub const XFS_QUOTA_UDQ_ENFD: u16 = 1 << 1;
pub const XFS_QUOTA_GDQ_ACCT: u16 = 1 << 2;
pub const XFS_QUOTA_GDQ_ENFD: u16 = 1 << 3;

/// Quota stored in filesystem metadata rather than a user-visible file
/// (`IfDqinfo::dqi_flags`).
pub const DQF_SYS_FILE: u32 = 1 << 16;

/// Per-file statistics inside [`FsQuotaStat`].
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct FsQfilestat {
    pub qfs_ino: u64,
    pub qfs_nblks: u64,
    pub qfs_nextents: u32,
}

/// `fs_quota_stat` as filled by `Q_XGETQSTAT`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct FsQuotaStat {
    pub qs_version: i8,
    pub qs_flags: u16,
    pub qs_pad: i8,
    pub qs_uquota: FsQfilestat,
    pub qs_gquota: FsQfilestat,
    pub qs_incoredqs: u32,
    pub qs_btimelimit: i32,
    pub qs_itimelimit: i32,
    pub qs_rtbtimelimit: i32,
    pub qs_bwarnlimit: u16,
    pub qs_iwarnlimit: u16,
}

/// `if_dqinfo` as filled by `Q_GETINFO`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct IfDqinfo {
    pub dqi_bgrace: u64,
    pub dqi_igrace: u64,
    pub dqi_flags: u32,
    pub dqi_valid: u32,
}

/// Combine a command and quota type into the `quotactl(2)` cmd argument.
pub fn qcmd(cmd: u32, qtype: i32) -> c_int {
    ((cmd << 8) | (qtype as u32 & 0x00ff)) as c_int
}

/// Issue `quotactl(2)`.
///
/// `special` is the device path, or `None` for commands that take no
/// device. `data` points at a command-specific buffer; callers pass probe
/// buffers they own. Expected "not applicable" outcomes (`ENOENT`,
/// `ENOSYS`, `ENOTSUP`, `EINVAL`, ...) surface as ordinary `Err` values
/// carrying the OS error.
pub fn quotactl(
    cmd: u32,
    qtype: i32,
    special: Option<&Path>,
    id: c_int,
    data: *mut c_void,
) -> io::Result<()> {
    let special = match special {
        Some(path) => Some(
            CString::new(path.as_os_str().as_bytes())
                .map_err(|_| io::Error::from_raw_os_error(libc::EINVAL))?,
        ),
        None => None,
    };
    let special_ptr = special
        .as_ref()
        .map_or(std::ptr::null(), |cstr| cstr.as_ptr());
    let ret = unsafe { libc::quotactl(qcmd(cmd, qtype), special_ptr, id, data.cast()) };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
