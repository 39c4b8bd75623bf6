//! Top-level quota handle list assembly.
//!
//! Walks the mounts a scan selected, applies the caller's format filter
//! and the per-device-class rules, and asks the external I/O collaborator
//! to open one handle per usable mount. Ownership of every opened handle
//! transfers to the caller, which must release each exactly once.

use thiserror::Error;

use crate::format::{QuotaFormat, QuotaType};
use crate::table::{nfs_fstype, xfs_fstype, ScanContext, ScanError, ScanOptions, SelectedMount};

/// External opener of per-mount quota I/O contexts.
///
/// `io_flags` passes through uncurated; its meaning belongs entirely to
/// the implementation.
pub trait QuotaIo {
    type Handle;

    /// Open a handle for one selected mount, or `None` when the mount
    /// cannot be used (the implementation reports why).
    fn open(
        &mut self,
        mnt: &SelectedMount<'_>,
        qtype: QuotaType,
        fmt: Option<QuotaFormat>,
        io_flags: u32,
    ) -> Option<Self::Handle>;

    /// Release a handle, flushing any buffered state.
    fn release(&mut self, handle: Self::Handle) -> std::io::Result<()>;
}

/// Error building or releasing a handle list.
#[derive(Debug, Error)]
pub enum HandleError {
    /// The mountpoint scan could not be initialized.
    #[error("Cannot initialize mountpoint scan: {0}")]
    Scan(#[from] ScanError),
    /// The caller demanded that every named mountpoint resolve, and at
    /// least one did not.
    #[error("Not all specified mountpoints are using quota")]
    Unmatched,
    /// Some handles could not be released cleanly.
    #[error("{failed} quota file(s) were not released cleanly")]
    Release { failed: usize },
}

/// Build the ordered list of quota handles for `targets`.
///
/// An empty target list scans all mounts. With explicit targets every
/// target must produce a handle, otherwise the build fails after the
/// partial list is released. A format restriction without explicit
/// targets additionally narrows by device class: `rpc` selects only
/// remote mounts, `xfs` only the XFS family, any other format only plain
/// local filesystems.
pub fn build_handle_list<Q: QuotaIo>(
    io: &mut Q,
    targets: &[String],
    qtype: QuotaType,
    fmt: Option<QuotaFormat>,
    io_flags: u32,
    mut options: ScanOptions,
) -> Result<Vec<Q::Handle>, HandleError> {
    // With explicit targets every remote mount must stay distinct, or a
    // directory target could land on the wrong share of the same server.
    if !targets.is_empty() && !options.local_only {
        options.nfs_unique = true;
    }

    let ctx = ScanContext::scan(targets, options)?;
    let mut handles = Vec::new();
    for mnt in ctx.iter() {
        #[cfg(not(feature = "rpc"))]
        if nfs_fstype(&mnt.entry.fstype) {
            continue;
        }

        let wanted = if fmt.is_none() || !targets.is_empty() {
            true
        } else {
            match fmt {
                Some(QuotaFormat::Rpc) => nfs_fstype(&mnt.entry.fstype),
                Some(QuotaFormat::Xfs) => xfs_fstype(&mnt.entry.fstype),
                _ => !xfs_fstype(&mnt.entry.fstype) && !nfs_fstype(&mnt.entry.fstype),
            }
        };
        if !wanted {
            continue;
        }
        if let Some(handle) = io.open(&mnt, qtype, fmt, io_flags) {
            handles.push(handle);
        }
    }

    if !targets.is_empty() && handles.len() != targets.len() {
        release_handle_list(io, handles).ok();
        return Err(HandleError::Unmatched);
    }
    Ok(handles)
}

/// Release every handle in the list, reporting how many failed.
pub fn release_handle_list<Q: QuotaIo>(
    io: &mut Q,
    handles: Vec<Q::Handle>,
) -> Result<(), HandleError> {
    let mut failed = 0;
    for handle in handles {
        if let Err(err) = io.release(handle) {
            tracing::warn!("Error while releasing quota file: {}", err);
            failed += 1;
        }
    }
    if failed > 0 {
        return Err(HandleError::Release { failed });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io;
    use std::path::{Path, PathBuf};

    /// Opener that hands back the device path as the handle and records
    /// what it released.
    struct RecordingIo {
        refuse: Vec<PathBuf>,
        released: Vec<PathBuf>,
        fail_release: bool,
    }

    impl RecordingIo {
        fn new() -> RecordingIo {
            RecordingIo {
                refuse: Vec::new(),
                released: Vec::new(),
                fail_release: false,
            }
        }
    }

    impl QuotaIo for RecordingIo {
        type Handle = PathBuf;

        fn open(
            &mut self,
            mnt: &SelectedMount<'_>,
            _qtype: QuotaType,
            _fmt: Option<QuotaFormat>,
            _io_flags: u32,
        ) -> Option<PathBuf> {
            if self.refuse.contains(&mnt.entry.devname) {
                return None;
            }
            Some(mnt.entry.devname.clone())
        }

        fn release(&mut self, handle: PathBuf) -> io::Result<()> {
            self.released.push(handle);
            if self.fail_release {
                return Err(io::Error::new(io::ErrorKind::Other, "flush failed"));
            }
            Ok(())
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        mnt_a: PathBuf,
        mnt_b: PathBuf,
    }

    impl Fixture {
        fn new() -> Fixture {
            let dir = tempfile::tempdir().unwrap();
            let mnt_a = dir.path().join("a");
            let mnt_b = dir.path().join("b");
            fs::create_dir(&mnt_a).unwrap();
            fs::create_dir(&mnt_b).unwrap();
            Fixture { dir, mnt_a, mnt_b }
        }

        fn table(&self, lines: &[String]) -> ScanOptions {
            let table = self.dir.path().join("mtab");
            fs::write(&table, lines.join("\n") + "\n").unwrap();
            ScanOptions::default().with_table_path(table)
        }
    }

    fn line(dev: &str, dir: &Path, fstype: &str, opts: &str) -> String {
        format!("{} {} {} {} 0 0", dev, dir.display(), fstype, opts)
    }

    #[test]
    fn test_all_mounts_open_one_handle_each() {
        let fx = Fixture::new();
        let options = fx.table(&[
            line("/dev/null", &fx.mnt_a, "ext3", "rw,usrquota"),
            line("/dev/zero", &fx.mnt_b, "ext3", "rw,usrquota"),
        ]);
        let mut io = RecordingIo::new();
        let handles =
            build_handle_list(&mut io, &[], QuotaType::User, None, 0, options).unwrap();
        assert_eq!(
            handles,
            vec![PathBuf::from("/dev/null"), PathBuf::from("/dev/zero")]
        );
    }

    #[test]
    fn test_explicit_target_without_handle_fails_and_releases() {
        let fx = Fixture::new();
        let options = fx.table(&[
            line("/dev/null", &fx.mnt_a, "ext3", "rw,usrquota"),
            line("/dev/zero", &fx.mnt_b, "ext3", "rw,usrquota"),
        ]);
        let mut io = RecordingIo::new();
        io.refuse.push(PathBuf::from("/dev/zero"));
        let targets = ["/dev/null".to_string(), "/dev/zero".to_string()];
        let err = build_handle_list(&mut io, &targets, QuotaType::User, None, 0, options)
            .unwrap_err();
        assert!(matches!(err, HandleError::Unmatched));
        // The partial list is handed back before failing.
        assert_eq!(io.released, vec![PathBuf::from("/dev/null")]);
    }

    #[test]
    fn test_format_restriction_narrows_by_device_class() {
        let fx = Fixture::new();
        let lines = [
            line("/dev/null", &fx.mnt_a, "ext3", "rw,usrquota"),
            line("/dev/zero", &fx.mnt_b, "xfs", "rw"),
        ];
        // xfs_disabled classifies the XFS mount without consulting the
        // (absent) live accounting flags.
        let mut options = fx.table(&lines);
        options.xfs_disabled = true;
        let mut io = RecordingIo::new();
        let handles = build_handle_list(
            &mut io,
            &[],
            QuotaType::User,
            Some(QuotaFormat::VfsV0),
            0,
            options,
        )
        .unwrap();
        assert_eq!(handles, vec![PathBuf::from("/dev/null")]);

        let mut options = fx.table(&lines);
        options.xfs_disabled = true;
        let handles = build_handle_list(
            &mut io,
            &[],
            QuotaType::User,
            Some(QuotaFormat::Xfs),
            0,
            options,
        )
        .unwrap();
        assert_eq!(handles, vec![PathBuf::from("/dev/zero")]);

        let mut options = fx.table(&lines);
        options.xfs_disabled = true;
        let handles =
            build_handle_list(&mut io, &[], QuotaType::User, None, 0, options).unwrap();
        assert_eq!(handles.len(), 2);
    }

    #[test]
    fn test_release_failures_are_counted() {
        let fx = Fixture::new();
        let options = fx.table(&[
            line("/dev/null", &fx.mnt_a, "ext3", "rw,usrquota"),
            line("/dev/zero", &fx.mnt_b, "ext3", "rw,usrquota"),
        ]);
        let mut io = RecordingIo::new();
        let handles =
            build_handle_list(&mut io, &[], QuotaType::User, None, 0, options).unwrap();
        io.fail_release = true;
        let err = release_handle_list(&mut io, handles).unwrap_err();
        assert!(matches!(err, HandleError::Release { failed: 2 }));
        assert_eq!(io.released.len(), 2);
    }

    /// Remote mounts share a root device identity; with explicit targets
    /// they must stay distinct so each directory target finds its own
    /// share.
    #[test]
    #[cfg(feature = "rpc")]
    fn test_explicit_targets_keep_remote_mounts_distinct() {
        let fx = Fixture::new();
        let options = fx.table(&[
            line("server:/a", &fx.mnt_a, "nfs", "rw"),
            line("server:/b", &fx.mnt_b, "nfs", "rw"),
        ]);
        let mut io = RecordingIo::new();
        let targets = [
            fx.mnt_a.display().to_string(),
            fx.mnt_b.display().to_string(),
        ];
        let handles =
            build_handle_list(&mut io, &targets, QuotaType::User, None, 0, options).unwrap();
        assert_eq!(handles.len(), 2);
    }
}
