//! quotascan CLI - Command-line interface
//!
//! This binary scans the mount table and reports, per mount and quota type,
//! the detected quota capability, whether the kernel has quota enabled
//! right now, and where the quota file lives.

mod error;

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use quotascan::active::kernel_quota_active;
use quotascan::kernel::{Interface, KernelSupport};
use quotascan::resolve::{resolve_quota_file, ResolveError, ResolveFlags};
use quotascan::{QuotaFormat, QuotaType, ScanContext, ScanOptions, SelectedMount};

use error::CliError;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TypeSelection {
    /// Per-user quota only
    User,
    /// Per-group quota only
    Group,
    /// Both quota types
    Both,
}

impl TypeSelection {
    fn types(self) -> &'static [QuotaType] {
        match self {
            TypeSelection::User => &[QuotaType::User],
            TypeSelection::Group => &[QuotaType::Group],
            TypeSelection::Both => &QuotaType::ALL,
        }
    }
}

#[derive(Parser)]
#[command(name = "quotascan")]
#[command(version = quotascan::VERSION)]
#[command(about = "Report quota capability and state of mounted filesystems", long_about = None)]
struct Args {
    /// Mountpoints, devices, or LABEL=/UUID= specifications to report on
    /// (all quota-capable mounts when omitted)
    targets: Vec<String>,

    /// Quota type(s) to report
    #[arg(short = 't', long = "type", value_enum, default_value = "both")]
    qtype: TypeSelection,

    /// Only accept this quota format
    #[arg(short = 'F', long)]
    format: Option<String>,

    /// Skip remote filesystems
    #[arg(short = 'l', long)]
    local_only: bool,

    /// Skip autofs mountpoints and everything below them
    #[arg(long)]
    skip_autofs: bool,

    /// Accept directories below a mountpoint as targets
    #[arg(long)]
    subdir: bool,

    /// Read this file instead of the system mount table
    #[arg(long, value_name = "PATH")]
    table: Option<PathBuf>,

    /// Also verify that resolved quota files exist
    #[arg(long)]
    check_files: bool,

    /// Append diagnostics to this file in addition to stderr
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Print the kernel quota interface probe and exit
    #[arg(long)]
    kernel: bool,
}

fn main() {
    let args = Args::parse();
    match run(&args) {
        Ok(()) => {}
        Err(e) => e.exit(),
    }
}

fn run(args: &Args) -> Result<(), CliError> {
    let _logging = quotascan::logging::init_logging(args.log_file.as_deref())
        .map_err(CliError::LoggingInit)?;

    let fmt = match &args.format {
        Some(name) => Some(name.parse::<QuotaFormat>()?),
        None => None,
    };

    if args.kernel {
        print_kernel_support();
        return Ok(());
    }

    let mut options = ScanOptions::default();
    options.table_path = args.table.clone();
    options.local_only = args.local_only;
    options.skip_autofs = args.skip_autofs;
    options.subdir_lookup = args.subdir;

    let ctx = ScanContext::scan(&args.targets, options)?;
    let kernel = KernelSupport::get();
    if !kernel.supports(fmt) {
        tracing::warn!(
            "Kernel does not support the requested quota format; reporting on-disk state only"
        );
    }

    for mount in ctx.iter() {
        println!(
            "{} on {} type {} ({})",
            mount.entry.devname.display(),
            mount.dir.display(),
            mount.entry.fstype,
            mount.entry.opts
        );
        for &qtype in args.qtype.types() {
            report_type(&mount, qtype, fmt, args.check_files);
        }
    }
    Ok(())
}

fn report_type(mount: &SelectedMount<'_>, qtype: QuotaType, fmt: Option<QuotaFormat>, check: bool) {
    let Some(detected) = mount.entry.detected(qtype) else {
        println!("  {} quota: not configured", qtype);
        return;
    };

    let active = kernel_quota_active(mount.entry, qtype, fmt);
    match active {
        Some(active) => println!("  {} quota: enabled, format {}", qtype, active),
        None => println!("  {} quota: configured, not enabled", qtype),
    }

    // A quota file only exists for file-backed formats; prefer the live
    // format, then the detected one, then the caller's request.
    let file_fmt = active
        .or_else(|| detected.format())
        .or(fmt)
        .unwrap_or(QuotaFormat::VfsV0);
    if file_fmt.default_basename().is_none() {
        return;
    }

    let flags = ResolveFlags {
        must_exist: check,
        check_format: false,
    };
    match resolve_quota_file(mount, qtype, file_fmt, flags, None) {
        Ok(path) => println!("  {} quota file: {}", qtype, path.display()),
        Err(ResolveError::NoOption { .. }) => {}
        Err(e) => println!("  {} quota file: {}", qtype, e),
    }
}

fn print_kernel_support() {
    let kernel = KernelSupport::get();
    let interface = match kernel.interface() {
        Interface::Generic => "generic",
        Interface::VfsV0 => "legacy v0",
        Interface::VfsOld => "legacy original",
    };
    println!("Kernel quota interface: {}", interface);
    if kernel.formats().is_empty() {
        println!("Supported formats: none");
        return;
    }
    let names: Vec<String> = kernel.formats().iter().map(|f| f.to_string()).collect();
    println!("Supported formats: {}", names.join(", "));
}
