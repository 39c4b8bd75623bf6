//! Mount-table source.
//!
//! Reads the system's record of mounted filesystems: an override path when
//! one is configured, else the live table (`/etc/mtab`, then
//! `/proc/self/mounts`), finally falling back to the static `/etc/fstab`.
//! Only having no readable source at all is fatal to a scan.
//!
//! Table fields escape whitespace and backslashes as octal triples
//! (`\040` for a space in a mountpoint name); they are decoded here so the
//! rest of the crate sees plain paths.

use std::fs;
use std::io;
use std::path::Path;

use thiserror::Error;

/// Live mount table maintained by mount(8) or linked to /proc.
const PATH_MOUNTED: &str = "/etc/mtab";
/// Kernel view of the mount table.
const PATH_PROC_MOUNTS: &str = "/proc/self/mounts";
/// Static filesystem configuration, used when no live table exists.
const PATH_FSTAB: &str = "/etc/fstab";

/// Error reading the mount table.
#[derive(Debug, Error)]
pub enum MtabError {
    /// No mount-table source could be opened.
    #[error("Cannot open any file with mount points")]
    NoTable,
}

/// One record of the mount table, fields unescaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MtabEntry {
    /// Device, `UUID=`/`LABEL=` spec, or pseudo-source.
    pub fsname: String,
    /// Mountpoint directory.
    pub dir: String,
    /// Filesystem type name.
    pub fstype: String,
    /// Comma-separated mount options.
    pub opts: String,
}

/// Read the mount table, preferring `override_path` when given.
///
/// An unreadable override is logged and skipped; the standard sources are
/// then tried in order.
pub fn read_mount_table(override_path: Option<&Path>) -> Result<Vec<MtabEntry>, MtabError> {
    if let Some(path) = override_path {
        match fs::read_to_string(path) {
            Ok(contents) => return Ok(parse_table(&contents)),
            Err(err) => {
                tracing::warn!("Cannot read mount table {}: {}", path.display(), err);
            }
        }
    }
    for path in [PATH_MOUNTED, PATH_PROC_MOUNTS, PATH_FSTAB] {
        match fs::read_to_string(path) {
            Ok(contents) => return Ok(parse_table(&contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => {
                tracing::warn!("Cannot read mount table {}: {}", path, err);
            }
        }
    }
    Err(MtabError::NoTable)
}

fn parse_table(contents: &str) -> Vec<MtabEntry> {
    contents.lines().filter_map(parse_line).collect()
}

/// Parse one table line; comments, blanks and short lines yield `None`.
fn parse_line(line: &str) -> Option<MtabEntry> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let mut fields = line.split_whitespace();
    let fsname = fields.next()?;
    let dir = fields.next()?;
    let fstype = fields.next()?;
    let opts = fields.next()?;
    Some(MtabEntry {
        fsname: unescape(fsname),
        dir: unescape(dir),
        fstype: unescape(fstype),
        opts: unescape(opts),
    })
}

/// Decode `\NNN` octal escapes produced by the kernel and mount(8).
fn unescape(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let rest = chars.as_str();
        let digits: String = rest.chars().take(3).collect();
        if digits.len() == 3 && digits.chars().all(|d| ('0'..='7').contains(&d)) {
            if let Ok(value) = u8::from_str_radix(&digits, 8) {
                out.push(value as char);
                chars.nth(2);
                continue;
            }
        }
        out.push(c);
    }
    out
}
