//! Mount-table cache and scan lifecycle.
//!
//! A [`ScanContext`] is one scan of the system mount table: it reads the
//! table, filters and classifies every record, deduplicates by device
//! identity, and normalizes the caller's selection targets. The context
//! owns all cached state; dropping it is the teardown.
//!
//! Per-record failures are logged and the record skipped; the scan itself
//! only fails when no mount-table source is readable or no selection
//! target survived normalization.

mod classify;
mod entry;
mod mtab;
mod select;

pub use classify::{meta_qf_fstype, nfs_fstype, xfs_fstype};
pub use entry::{MountEntry, SelectedMount};
pub use mtab::{MtabEntry, MtabError};
pub use select::MountIter;

use std::ffi::CString;
use std::fs;
use std::io;
use std::mem;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::format::QuotaType;
use crate::mntopt::{self, OPT_BIND, OPT_LOOP, OPT_NOQUOTA};
use select::SearchedDir;

/// Behavior switches for one scan.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Read the mount table from this path instead of the system one.
    pub table_path: Option<PathBuf>,
    /// Exclude remote filesystems.
    pub local_only: bool,
    /// Exclude autofs mountpoints and everything below them.
    pub skip_autofs: bool,
    /// Never merge remote mounts that share a root device identity.
    pub nfs_unique: bool,
    /// Suppress diagnostics about unusable selection targets.
    pub quiet: bool,
    /// Allow directory targets that are not themselves mountpoints,
    /// resolving them to the mount that hosts them.
    pub subdir_lookup: bool,
    /// Classify XFS-family mounts as XFS-format even when quota accounting
    /// is currently disabled (used when about to enable it).
    pub xfs_disabled: bool,
}

impl ScanOptions {
    pub fn with_table_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.table_path = Some(path.into());
        self
    }

    pub fn local_only(mut self) -> Self {
        self.local_only = true;
        self
    }

    pub fn skip_autofs(mut self) -> Self {
        self.skip_autofs = true;
        self
    }
}

/// Error aborting a scan.
#[derive(Debug, Error)]
pub enum ScanError {
    /// No mount-table source was readable.
    #[error(transparent)]
    Table(#[from] MtabError),
    /// Targets were given but none of them was usable.
    #[error("No correct mountpoint specified")]
    NoValidTargets,
}

/// One scan of the mount table: the cached entries plus the normalized
/// selection targets. Scoped; all backing state is released on drop.
#[derive(Debug)]
pub struct ScanContext {
    entries: Vec<MountEntry>,
    pub(crate) targets: Vec<SearchedDir>,
    options: ScanOptions,
}

impl ScanContext {
    /// Scan the mount table and normalize `targets` against it.
    ///
    /// An empty target list selects all mounts.
    pub fn scan(targets: &[String], options: ScanOptions) -> Result<ScanContext, ScanError> {
        let entries = cache_mount_table(&options)?;
        let targets = select::process_targets(&entries, targets, &options)?;
        Ok(ScanContext {
            entries,
            targets,
            options,
        })
    }

    /// The cached mount entries, in first-seen mount-table order.
    pub fn entries(&self) -> &[MountEntry] {
        &self.entries
    }

    /// Options this scan was built with.
    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Iterate the mounts the scan selected.
    pub fn iter(&self) -> MountIter<'_> {
        MountIter::new(self)
    }
}

/// Build the deduplicated, filtered table of quota-capable mounts.
fn cache_mount_table(options: &ScanOptions) -> Result<Vec<MountEntry>, ScanError> {
    let table = mtab::read_mount_table(options.table_path.as_deref())?;
    let mut entries: Vec<MountEntry> = Vec::new();
    // Autofs mountpoints already seen, kept with a trailing slash so only
    // real descendants match.
    let mut autofs_dirs: Vec<String> = Vec::new();

    for record in table {
        let mut devname = match select::resolve_device_spec(&record.fsname) {
            Some(devname) => devname,
            None => {
                tracing::warn!("Cannot get device name for {}", record.fsname);
                continue;
            }
        };

        if autofs_dirs
            .iter()
            .any(|prefix| record.dir.starts_with(prefix.as_str()))
        {
            continue;
        }
        if options.skip_autofs && record.fstype == "autofs" {
            // Autofs mountpoints themselves never carry quota.
            autofs_dirs.push(format!("{}/", record.dir));
            continue;
        }

        if options.local_only && nfs_fstype(&record.fstype) {
            continue;
        }
        if mntopt::has_option(&record.opts, OPT_NOQUOTA) {
            continue;
        }
        if mntopt::has_option(&record.opts, OPT_BIND) {
            continue;
        }
        if let Some(loopdev) = mntopt::option_arg(&record.opts, OPT_LOOP) {
            devname = PathBuf::from(loopdev);
        }

        // Mounts without any quota potential are never touched again.
        let qfmt = [QuotaType::User, QuotaType::Group].map(|qtype| {
            classify::detect_quota(
                &devname,
                &record.fstype,
                &record.dir,
                &record.opts,
                qtype,
                options.xfs_disabled,
            )
        });
        if qfmt.iter().all(Option::is_none) {
            continue;
        }

        let dir = match fs::canonicalize(&record.dir) {
            Ok(dir) => dir,
            Err(err) => {
                tracing::warn!("Cannot resolve mountpoint path {}: {}", record.dir, err);
                continue;
            }
        };
        let fsstat = match statfs(&dir) {
            Ok(fsstat) => fsstat,
            Err(err) => {
                tracing::warn!("Cannot statfs() {}: {}", dir.display(), err);
                continue;
            }
        };
        // An all-zero block triple marks a "magic" automount placeholder.
        if fsstat.f_blocks == 0 && fsstat.f_bfree == 0 && fsstat.f_bavail == 0 {
            continue;
        }

        let is_nfs = nfs_fstype(&record.fstype);
        let mut dev = 0u64;
        let mut existing = None;
        if !is_nfs {
            let meta = match fs::metadata(&devname) {
                Ok(meta) => meta,
                Err(err) => {
                    tracing::warn!(
                        "Cannot stat() mounted device {}: {}",
                        devname.display(),
                        err
                    );
                    continue;
                }
            };
            let file_type = meta.file_type();
            if !file_type.is_block_device() && !file_type.is_char_device() {
                tracing::warn!(
                    "Device ({}) filesystem is mounted on unsupported device type. Skipping.",
                    devname.display()
                );
                continue;
            }
            dev = meta.rdev();
            existing = entries.iter().position(|entry| entry.dev == dev);
        }

        let mut ino = 0u64;
        if is_nfs || existing.is_none() {
            let meta = match fs::metadata(&record.dir) {
                Ok(meta) => meta,
                Err(err) => {
                    tracing::warn!("Cannot stat() mountpoint {}: {}", record.dir, err);
                    continue;
                }
            };
            ino = meta.ino();
            if is_nfs {
                // Remote filesystems have no device node; identity is the
                // root device of the mountpoint.
                dev = meta.dev();
                existing = if options.nfs_unique {
                    None
                } else {
                    entries.iter().position(|entry| entry.dev == dev)
                };
            }
        }

        // First-seen wins; later records for the same device are dropped.
        if existing.is_none() {
            entries.push(MountEntry {
                fstype: record.fstype,
                opts: record.opts,
                dev,
                ino,
                devname,
                dir,
                qfmt,
            });
        }
    }
    Ok(entries)
}

fn statfs(path: &Path) -> io::Result<libc::statfs> {
    let cpath = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| io::Error::from_raw_os_error(libc::EINVAL))?;
    let mut buf: libc::statfs = unsafe { mem::zeroed() };
    if unsafe { libc::statfs(cpath.as_ptr(), &mut buf) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(buf)
}
