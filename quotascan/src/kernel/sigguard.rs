//! Scoped SIGSEGV override used while probing the quota interface.
//!
//! Some historical kernels deliver SIGSEGV when a quota syscall tries to
//! resolve an unsupported device. The probe ignores the signal for its
//! duration only: the guard installs the no-op disposition on construction
//! and restores the previous handler when dropped, covering early returns.
//!
//! The swap is process-global. A failure to install or restore leaves the
//! process with corrupted signal state, so both are fatal with a distinct
//! exit status rather than an error value.

use std::mem;
use std::process;

/// Exit status for unrecoverable environment corruption.
const FATAL_EXIT: i32 = 2;

/// Ignores SIGSEGV until dropped.
pub struct SegvGuard {
    previous: libc::sigaction,
}

impl SegvGuard {
    /// Install the SIGSEGV-ignore disposition, remembering the previous one.
    pub fn install() -> SegvGuard {
        let mut ignore: libc::sigaction = unsafe { mem::zeroed() };
        ignore.sa_sigaction = libc::SIG_IGN;
        ignore.sa_flags = 0;
        if unsafe { libc::sigemptyset(&mut ignore.sa_mask) } < 0 {
            tracing::error!(
                "Cannot create signal set for sigaction(): {}",
                std::io::Error::last_os_error()
            );
            process::exit(FATAL_EXIT);
        }
        let mut previous: libc::sigaction = unsafe { mem::zeroed() };
        if unsafe { libc::sigaction(libc::SIGSEGV, &ignore, &mut previous) } < 0 {
            tracing::error!(
                "Cannot set signal handler: {}",
                std::io::Error::last_os_error()
            );
            process::exit(FATAL_EXIT);
        }
        SegvGuard { previous }
    }
}

impl Drop for SegvGuard {
    fn drop(&mut self) {
        if unsafe { libc::sigaction(libc::SIGSEGV, &self.previous, std::ptr::null_mut()) } < 0 {
            tracing::error!(
                "Cannot reset signal handler: {}",
                std::io::Error::last_os_error()
            );
            process::exit(FATAL_EXIT);
        }
    }
}
