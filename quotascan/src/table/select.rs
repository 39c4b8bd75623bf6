//! Resolution of caller-supplied scan targets and mount iteration.
//!
//! Targets may be mountpoint directories, device paths, or `UUID=`/`LABEL=`
//! specs. Each is normalized into a [`SearchedDir`] up front; selection then
//! walks the cached table in caller order. Unmatched targets are reported
//! and skipped, never fatal here.

use std::fs;
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::path::{Path, PathBuf};

use super::entry::{MountEntry, SelectedMount};
use super::{ScanContext, ScanError, ScanOptions};
use crate::mntopt::{self, OPT_NOAUTO};

/// One normalized selection target.
#[derive(Debug)]
pub(crate) struct SearchedDir {
    /// Directory selection (device + inode) vs. device selection (device only).
    pub is_dir: bool,
    pub dev: u64,
    pub ino: u64,
    /// The directory name the caller asked about, canonicalized.
    pub name: PathBuf,
}

/// Resolve a device spec to a device path.
///
/// `UUID=`/`LABEL=` specs resolve through the by-id symlink directories;
/// anything else is taken as a path verbatim, matching how the mount table
/// records it.
pub(crate) fn resolve_device_spec(spec: &str) -> Option<PathBuf> {
    let link = if let Some(uuid) = spec.strip_prefix("UUID=") {
        Path::new("/dev/disk/by-uuid").join(uuid)
    } else if let Some(label) = spec.strip_prefix("LABEL=") {
        Path::new("/dev/disk/by-label").join(label)
    } else {
        return Some(PathBuf::from(spec));
    };
    fs::canonicalize(link).ok()
}

/// Find the cached mountpoint hosting a directory with device id `dev`.
fn find_dir_mntpoint(entries: &[MountEntry], dev: u64) -> Option<(u64, &Path)> {
    entries
        .iter()
        .find(|entry| entry.dev == dev)
        .map(|entry| (entry.ino, entry.dir.as_path()))
}

/// Normalize the caller's targets against the cached table.
///
/// Individual bad targets are logged and dropped; only ending up with no
/// usable target at all is an error.
pub(crate) fn process_targets(
    entries: &[MountEntry],
    targets: &[String],
    options: &ScanOptions,
) -> Result<Vec<SearchedDir>, ScanError> {
    if targets.is_empty() {
        return Ok(Vec::new());
    }
    let mut dirs = Vec::with_capacity(targets.len());
    for target in targets {
        let meta = if target.starts_with("UUID=") || target.starts_with("LABEL=") {
            let devname = match resolve_device_spec(target) {
                Some(devname) => devname,
                None => {
                    tracing::warn!("Cannot find a device with {}. Skipping...", target);
                    continue;
                }
            };
            match fs::metadata(&devname) {
                Ok(meta) => meta,
                Err(err) => {
                    tracing::warn!(
                        "Cannot stat() a mountpoint with {}: {}. Skipping...",
                        target,
                        err
                    );
                    continue;
                }
            }
        } else {
            match fs::metadata(target) {
                Ok(meta) => meta,
                Err(err) => {
                    tracing::warn!(
                        "Cannot stat() given mountpoint {}: {}. Skipping...",
                        target,
                        err
                    );
                    continue;
                }
            }
        };

        let file_type = meta.file_type();
        if file_type.is_dir() {
            let dev = meta.dev();
            let mut ino = meta.ino();
            let mut realmnt = PathBuf::from(target);
            if options.subdir_lookup {
                match find_dir_mntpoint(entries, dev) {
                    Some((mnt_ino, mnt_dir)) => {
                        ino = mnt_ino;
                        realmnt = mnt_dir.to_path_buf();
                    }
                    None => {
                        if !options.quiet {
                            tracing::warn!(
                                "Cannot find a filesystem mountpoint for directory {}",
                                target
                            );
                        }
                        continue;
                    }
                }
            }
            let name = match fs::canonicalize(&realmnt) {
                Ok(name) => name,
                Err(err) => {
                    tracing::warn!("Cannot resolve path {}: {}", realmnt.display(), err);
                    continue;
                }
            };
            dirs.push(SearchedDir {
                is_dir: true,
                dev,
                ino,
                name,
            });
        } else if file_type.is_block_device() || file_type.is_char_device() {
            let dev = meta.rdev();
            match entries.iter().find(|entry| entry.dev == dev) {
                Some(entry) => dirs.push(SearchedDir {
                    is_dir: false,
                    dev,
                    ino: 0,
                    name: entry.dir.clone(),
                }),
                None => {
                    if !options.quiet {
                        tracing::warn!("Cannot find mountpoint for device {}", target);
                    }
                    continue;
                }
            }
        } else {
            tracing::warn!("Specified path {} is not directory nor device.", target);
            continue;
        }
    }
    if dirs.is_empty() {
        if !options.quiet {
            tracing::warn!("No correct mountpoint specified.");
        }
        return Err(ScanError::NoValidTargets);
    }
    Ok(dirs)
}

/// Iterator over the mounts a scan selected, in scan order.
///
/// All-mounts mode walks the cache in insertion order, skipping `noauto`
/// mounts; selected-targets mode walks the targets in caller order and
/// looks each up in the cache.
pub struct MountIter<'a> {
    ctx: &'a ScanContext,
    pos: usize,
}

impl<'a> MountIter<'a> {
    pub(crate) fn new(ctx: &'a ScanContext) -> MountIter<'a> {
        MountIter { ctx, pos: 0 }
    }
}

impl<'a> Iterator for MountIter<'a> {
    type Item = SelectedMount<'a>;

    fn next(&mut self) -> Option<SelectedMount<'a>> {
        let entries = self.ctx.entries();
        if self.ctx.targets.is_empty() {
            while self.pos < entries.len() {
                let entry = &entries[self.pos];
                self.pos += 1;
                if !mntopt::has_option(&entry.opts, OPT_NOAUTO) {
                    return Some(SelectedMount {
                        entry,
                        dir: &entry.dir,
                    });
                }
            }
            None
        } else {
            while self.pos < self.ctx.targets.len() {
                let searched = &self.ctx.targets[self.pos];
                self.pos += 1;
                let found = entries.iter().find(|entry| {
                    if searched.is_dir {
                        entry.dev == searched.dev && entry.ino == searched.ino
                    } else {
                        entry.dev == searched.dev
                    }
                });
                match found {
                    Some(entry) => {
                        return Some(SelectedMount {
                            entry,
                            dir: &searched.name,
                        })
                    }
                    None => {
                        tracing::warn!(
                            "Mountpoint (or device) {} not found or has no quota enabled.",
                            searched.name.display()
                        );
                    }
                }
            }
            None
        }
    }
}
