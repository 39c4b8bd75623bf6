//! Quota-file pathname resolution.
//!
//! For a mount, quota type and target format, compute where the quota file
//! lives: an explicit mount-option override when one is present, else the
//! conventional `<mountpoint>/<basename>.<extension>` name. Optionally
//! verify that the file exists and that its contents match the format.
//!
//! Formats without a backing file (XFS, metadata, remote) must be detected
//! before ever asking for a file name.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::format::{QuotaFormat, QuotaType};
use crate::mntopt::{self, OPT_GRPJQUOTA, OPT_GRPQUOTA, OPT_QUOTA, OPT_USRJQUOTA, OPT_USRQUOTA};
use crate::table::SelectedMount;

/// Which checks [`resolve_quota_file`] runs on the computed path.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveFlags {
    /// The file must already exist (absence fails resolution quietly,
    /// since a missing file is a valid pre-creation state elsewhere).
    pub must_exist: bool,
    /// The file contents must pass the format checker.
    pub check_format: bool,
}

/// External verdict on whether a file's contents match a quota format.
///
/// Implemented by the format-specific quota file readers. A verdict of
/// zero or less rejects the file.
pub trait FormatChecker {
    /// Check a flat-layout quota file.
    fn check_flat(&self, file: &File, qtype: QuotaType, fmt: QuotaFormat) -> i32;
    /// Check a tree-layout quota file.
    fn check_tree(&self, file: &File, qtype: QuotaType, fmt: QuotaFormat) -> i32;
}

/// Error resolving a quota file name.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No quota mount option is present for this type.
    #[error("no quota mount option for {qtype} quota")]
    NoOption { qtype: QuotaType },
    /// The target format keeps no quota file.
    #[error("format {fmt} has no quota file")]
    NoBackingFile { fmt: QuotaFormat },
    /// The file must exist but does not, or cannot be examined.
    #[error("cannot use quota file {path}")]
    Unusable { path: PathBuf },
    /// The file exists but does not carry the expected format.
    #[error("quota file {path} does not match format {fmt}")]
    BadFormat { path: PathBuf, fmt: QuotaFormat },
}

/// Resolve the quota file path for `mnt` and run the requested checks.
///
/// The explicit-path forms are `usrquota=`/`grpquota=`/`quota=` with an
/// absolute path, and the journaled `usrjquota=`/`grpjquota=` whose
/// argument is always relative to the mountpoint directory. Arguments end
/// at the next option separator.
pub fn resolve_quota_file(
    mnt: &SelectedMount<'_>,
    qtype: QuotaType,
    fmt: QuotaFormat,
    flags: ResolveFlags,
    checker: Option<&dyn FormatChecker>,
) -> Result<PathBuf, ResolveError> {
    let opts = mnt.entry.opts.as_str();

    let (plain, journaled) = match qtype {
        QuotaType::User => (OPT_USRQUOTA, OPT_USRJQUOTA),
        QuotaType::Group => (OPT_GRPQUOTA, OPT_GRPJQUOTA),
    };

    let mut override_path: Option<PathBuf> = None;
    if let Some(rest) = mntopt::find_option(opts, plain) {
        if let Some(arg) = rest.strip_prefix('=') {
            override_path = Some(PathBuf::from(arg));
        }
    } else if let Some(arg) = mntopt::option_arg(opts, journaled) {
        override_path = Some(join_below(mnt.dir, arg));
    } else if qtype == QuotaType::User {
        if let Some(rest) = mntopt::find_option(opts, OPT_QUOTA) {
            if let Some(arg) = rest.strip_prefix('=') {
                override_path = Some(PathBuf::from(arg));
            }
        } else {
            return Err(ResolveError::NoOption { qtype });
        }
    } else {
        return Err(ResolveError::NoOption { qtype });
    }

    let path = match override_path {
        Some(path) => path,
        None => {
            let basename = fmt
                .default_basename()
                .ok_or(ResolveError::NoBackingFile { fmt })?;
            mnt.dir
                .join(format!("{}.{}", basename, qtype.extension()))
        }
    };

    check_file(&path, qtype, fmt, flags, checker)?;
    Ok(path)
}

/// Join an option argument below the mountpoint even when it is spelled
/// with a leading slash.
fn join_below(dir: &Path, arg: &str) -> PathBuf {
    dir.join(arg.trim_start_matches('/'))
}

fn check_file(
    path: &Path,
    qtype: QuotaType,
    fmt: QuotaFormat,
    flags: ResolveFlags,
    checker: Option<&dyn FormatChecker>,
) -> Result<(), ResolveError> {
    if flags.must_exist {
        if let Err(err) = std::fs::metadata(path) {
            if err.kind() != io::ErrorKind::NotFound {
                tracing::warn!("Cannot stat quota file {}: {}", path.display(), err);
            }
            return Err(ResolveError::Unusable {
                path: path.to_path_buf(),
            });
        }
    }
    if flags.check_format {
        let checker = match checker {
            Some(checker) => checker,
            None => return Ok(()),
        };
        match File::open(path) {
            Ok(file) => {
                let verdict = if fmt.is_tree() {
                    checker.check_tree(&file, qtype, fmt)
                } else {
                    checker.check_flat(&file, qtype, fmt)
                };
                if verdict <= 0 {
                    return Err(ResolveError::BadFormat {
                        path: path.to_path_buf(),
                        fmt,
                    });
                }
            }
            // Missing or unreadable-for-us files may still be valid quota
            // files; only other open failures reject the path.
            Err(err)
                if err.kind() == io::ErrorKind::NotFound
                    || err.kind() == io::ErrorKind::PermissionDenied => {}
            Err(err) => {
                tracing::warn!("Cannot open quotafile {}: {}", path.display(), err);
                return Err(ResolveError::Unusable {
                    path: path.to_path_buf(),
                });
            }
        }
    }
    Ok(())
}
