//! quotascan - discovery and resolution of per-filesystem disk quota state.
//!
//! This library answers one question for quota-editing and reporting tools:
//! which mounted filesystems on this machine can carry quota, in which
//! format, where their quota files live, and whether the running kernel
//! actually has quota turned on for them.
//!
//! # High-Level API
//!
//! A scan is a scoped resource: build a [`table::ScanContext`], iterate the
//! mounts it matched, and resolve per-mount state as needed:
//!
//! ```no_run
//! use quotascan::format::QuotaType;
//! use quotascan::table::{ScanContext, ScanOptions};
//!
//! let ctx = ScanContext::scan(&[], ScanOptions::default())?;
//! for mount in ctx.iter() {
//!     println!(
//!         "{}: user quota {:?}",
//!         mount.dir.display(),
//!         quotascan::active::kernel_quota_active(mount.entry, QuotaType::User, None),
//!     );
//! }
//! # Ok::<(), quotascan::table::ScanError>(())
//! ```
//!
//! The top-level [`handle::build_handle_list`] drives the same machinery for
//! callers that open quota files through a [`handle::QuotaIo`] implementation.

pub mod active;
pub mod format;
pub mod handle;
pub mod ids;
pub mod kernel;
pub mod logging;
pub mod mntopt;
pub mod resolve;
pub mod table;

pub use format::{DetectedFormat, QuotaFormat, QuotaType};
pub use table::{MountEntry, ScanContext, ScanError, ScanOptions, SelectedMount};

/// Version of the quotascan library and CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
