//! Mount option string parsing.
//!
//! Mount options are a comma-separated list of `name` or `name=argument`
//! entries. Option arguments never contain a comma; anything after the next
//! separator belongs to the following option. An option name only matches a
//! whole entry name, never a prefix of a longer one (`quota` must not match
//! `usrquota` or `noquota`).

/// Per-type quota enable options.
pub const OPT_USRQUOTA: &str = "usrquota";
pub const OPT_GRPQUOTA: &str = "grpquota";
/// Journaled quota options carrying an accounting-file argument.
pub const OPT_USRJQUOTA: &str = "usrjquota";
pub const OPT_GRPJQUOTA: &str = "grpjquota";
/// Legacy combined option; enables user quota only.
pub const OPT_QUOTA: &str = "quota";
/// Quota is explicitly disabled on this mount.
pub const OPT_NOQUOTA: &str = "noquota";
/// Bind mounts re-expose another mount and are never classified.
pub const OPT_BIND: &str = "bind";
/// Loopback mount backed by a regular file.
pub const OPT_LOOP: &str = "loop";
/// Not mounted automatically; excluded from "all mounts" scans.
pub const OPT_NOAUTO: &str = "noauto";

/// Find `name` in the option string.
///
/// Returns the remainder of the matched entry: either the empty string for
/// a bare option or `=argument` when the option carries one.
pub fn find_option<'a>(opts: &'a str, name: &str) -> Option<&'a str> {
    for entry in opts.split(',') {
        let (entry_name, rest) = match entry.find('=') {
            Some(pos) => (&entry[..pos], &entry[pos..]),
            None => (entry, ""),
        };
        if entry_name == name {
            return Some(rest);
        }
    }
    None
}

/// Whether the option string contains `name`, with or without an argument.
pub fn has_option(opts: &str, name: &str) -> bool {
    find_option(opts, name).is_some()
}

/// Return the argument of `name`, when the option is present with one.
///
/// A bare option or one with an empty argument (`=` immediately followed
/// by the separator or end of string) yields `None`.
pub fn option_arg<'a>(opts: &'a str, name: &str) -> Option<&'a str> {
    match find_option(opts, name)?.strip_prefix('=') {
        Some(arg) if !arg.is_empty() => Some(arg),
        _ => None,
    }
}
