//! User and group name/id resolution.
//!
//! Quota records are keyed by numeric id; callers hand us names. A name
//! that is all digits is taken as the id directly unless the caller asks
//! for name-only lookup. The reverse direction never fails: ids without a
//! database entry render as `#<id>`.

use std::ffi::{CStr, CString};
use std::mem;
use std::ptr;

use thiserror::Error;

use crate::format::QuotaType;

/// Error resolving a name to an id.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("user {0} does not exist")]
    NoSuchUser(String),
    #[error("group {0} does not exist")]
    NoSuchGroup(String),
}

/// Resolve a user name (or numeric uid string) to a uid.
pub fn user_to_uid(name: &str, name_only: bool) -> Result<u32, IdError> {
    if !name_only {
        if let Ok(uid) = name.parse::<u32>() {
            return Ok(uid);
        }
    }
    lookup_passwd(name).ok_or_else(|| IdError::NoSuchUser(name.to_string()))
}

/// Resolve a group name (or numeric gid string) to a gid.
pub fn group_to_gid(name: &str, name_only: bool) -> Result<u32, IdError> {
    if !name_only {
        if let Ok(gid) = name.parse::<u32>() {
            return Ok(gid);
        }
    }
    lookup_group(name).ok_or_else(|| IdError::NoSuchGroup(name.to_string()))
}

/// Resolve a name for either quota type.
pub fn name_to_id(name: &str, qtype: QuotaType, name_only: bool) -> Result<u32, IdError> {
    match qtype {
        QuotaType::User => user_to_uid(name, name_only),
        QuotaType::Group => group_to_gid(name, name_only),
    }
}

/// Render an id as a name, falling back to `#<id>` for unknown ids.
pub fn id_to_name(id: u32, qtype: QuotaType) -> String {
    let name = match qtype {
        QuotaType::User => lookup_uid(id),
        QuotaType::Group => lookup_gid(id),
    };
    name.unwrap_or_else(|| format!("#{}", id))
}

/// How the system resolves the passwd database, per nsswitch.conf.
///
/// Tools iterating every quota record want to know whether name lookups
/// hit local files or a remote database, so they can decide between
/// per-record lookup and a bulk pre-scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswdHandling {
    /// Local files; per-record lookup is cheap.
    Files,
    /// db/nis/nis+ backed; lookups may be remote.
    Db,
}

/// Parse /etc/nsswitch.conf for the passwd service handling.
///
/// Unreadable or unparsable configuration falls back to [`PasswdHandling::Files`].
pub fn passwd_handling() -> PasswdHandling {
    passwd_handling_from(
        &std::fs::read_to_string("/etc/nsswitch.conf").unwrap_or_default(),
    )
}

fn passwd_handling_from(contents: &str) -> PasswdHandling {
    for line in contents.lines() {
        let Some(services) = line.strip_prefix("passwd:") else {
            continue;
        };
        // Only the first listed service decides.
        match services.split_whitespace().next() {
            Some("db") | Some("nis") | Some("nis+") => return PasswdHandling::Db,
            _ => return PasswdHandling::Files,
        }
    }
    PasswdHandling::Files
}

const LOOKUP_BUF_START: usize = 1 << 10;
const LOOKUP_BUF_MAX: usize = 1 << 20;

fn lookup_passwd(name: &str) -> Option<u32> {
    let cname = CString::new(name).ok()?;
    let mut buf = vec![0u8; LOOKUP_BUF_START];
    loop {
        let mut pwd: libc::passwd = unsafe { mem::zeroed() };
        let mut result: *mut libc::passwd = ptr::null_mut();
        let ret = unsafe {
            libc::getpwnam_r(
                cname.as_ptr(),
                &mut pwd,
                buf.as_mut_ptr().cast(),
                buf.len(),
                &mut result,
            )
        };
        if ret == libc::ERANGE && buf.len() < LOOKUP_BUF_MAX {
            buf.resize(buf.len() * 2, 0);
            continue;
        }
        if ret != 0 || result.is_null() {
            return None;
        }
        return Some(pwd.pw_uid);
    }
}

fn lookup_group(name: &str) -> Option<u32> {
    let cname = CString::new(name).ok()?;
    let mut buf = vec![0u8; LOOKUP_BUF_START];
    loop {
        let mut grp: libc::group = unsafe { mem::zeroed() };
        let mut result: *mut libc::group = ptr::null_mut();
        let ret = unsafe {
            libc::getgrnam_r(
                cname.as_ptr(),
                &mut grp,
                buf.as_mut_ptr().cast(),
                buf.len(),
                &mut result,
            )
        };
        if ret == libc::ERANGE && buf.len() < LOOKUP_BUF_MAX {
            buf.resize(buf.len() * 2, 0);
            continue;
        }
        if ret != 0 || result.is_null() {
            return None;
        }
        return Some(grp.gr_gid);
    }
}

fn lookup_uid(uid: u32) -> Option<String> {
    let mut buf = vec![0u8; LOOKUP_BUF_START];
    loop {
        let mut pwd: libc::passwd = unsafe { mem::zeroed() };
        let mut result: *mut libc::passwd = ptr::null_mut();
        let ret = unsafe {
            libc::getpwuid_r(
                uid,
                &mut pwd,
                buf.as_mut_ptr().cast(),
                buf.len(),
                &mut result,
            )
        };
        if ret == libc::ERANGE && buf.len() < LOOKUP_BUF_MAX {
            buf.resize(buf.len() * 2, 0);
            continue;
        }
        if ret != 0 || result.is_null() {
            return None;
        }
        return cstr_to_string(pwd.pw_name);
    }
}

fn lookup_gid(gid: u32) -> Option<String> {
    let mut buf = vec![0u8; LOOKUP_BUF_START];
    loop {
        let mut grp: libc::group = unsafe { mem::zeroed() };
        let mut result: *mut libc::group = ptr::null_mut();
        let ret = unsafe {
            libc::getgrgid_r(
                gid,
                &mut grp,
                buf.as_mut_ptr().cast(),
                buf.len(),
                &mut result,
            )
        };
        if ret == libc::ERANGE && buf.len() < LOOKUP_BUF_MAX {
            buf.resize(buf.len() * 2, 0);
            continue;
        }
        if ret != 0 || result.is_null() {
            return None;
        }
        return cstr_to_string(grp.gr_name);
    }
}

fn cstr_to_string(ptr: *const libc::c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}
