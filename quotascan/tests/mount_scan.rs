//! Mount table scan integration tests.
//!
//! These drive [`ScanContext`] against synthetic mount tables. The device
//! columns use /dev/null and /dev/zero: both are character devices with
//! distinct device numbers, so device identity and deduplication behave as
//! they would with real block devices, without needing any mounts.

use std::fs;
use std::path::{Path, PathBuf};

use quotascan::format::{DetectedFormat, QuotaType};
use quotascan::resolve::{resolve_quota_file, ResolveFlags};
use quotascan::table::{ScanContext, ScanError, ScanOptions};
use quotascan::QuotaFormat;

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

    /// Write the mount table and return scan options pointing at it.
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
fn test_scan_caches_quota_capable_mounts_only() {
    let fx = Fixture::new();
    let options = fx.table(&[
        line("/dev/null", &fx.mnt_a, "ext3", "rw,usrquota"),
        line("/dev/zero", &fx.mnt_b, "ext3", "rw,noatime"),
    ]);
    let ctx = ScanContext::scan(&[], options).unwrap();
    assert_eq!(ctx.entries().len(), 1);
    assert_eq!(ctx.entries()[0].devname, PathBuf::from("/dev/null"));
    assert_eq!(
        ctx.entries()[0].detected(QuotaType::User),
        Some(DetectedFormat::VfsUnknown)
    );
    assert_eq!(ctx.entries()[0].detected(QuotaType::Group), None);
}

#[test]
fn test_duplicate_device_keeps_first_record() {
    let fx = Fixture::new();
    // Same device spelled two ways: verbatim and through a symlink.
    let alias = fx.dir.path().join("nulldev");
    std::os::unix::fs::symlink("/dev/null", &alias).unwrap();
    let options = fx.table(&[
        line("/dev/null", &fx.mnt_a, "ext3", "rw,usrquota"),
        line(alias.to_str().unwrap(), &fx.mnt_b, "ext3", "rw,grpquota"),
    ]);
    let ctx = ScanContext::scan(&[], options).unwrap();
    assert_eq!(ctx.entries().len(), 1);
    assert_eq!(
        ctx.entries()[0].dir,
        fs::canonicalize(&fx.mnt_a).unwrap()
    );
    // The duplicate's options never replace the first record's.
    assert_eq!(ctx.entries()[0].detected(QuotaType::Group), None);
}

#[test]
fn test_empty_journaled_argument_is_not_quota_capable() {
    // usrjquota= with no file name enables nothing; the mount must not
    // reach the cache at all.
    let fx = Fixture::new();
    let options = fx.table(&[line(
        "/dev/null",
        &fx.mnt_a,
        "ext3",
        "rw,usrjquota=,jqfmt=vfsv0",
    )]);
    let ctx = ScanContext::scan(&[], options).unwrap();
    assert!(ctx.entries().is_empty());
}

#[test]
fn test_noquota_and_bind_records_are_filtered() {
    let fx = Fixture::new();
    let options = fx.table(&[
        line("/dev/null", &fx.mnt_a, "ext3", "rw,usrquota,noquota"),
        line("/dev/zero", &fx.mnt_b, "ext3", "rw,usrquota,bind"),
    ]);
    let ctx = ScanContext::scan(&[], options).unwrap();
    assert!(ctx.entries().is_empty());
}

#[test]
fn test_autofs_subtree_is_excluded() {
    let fx = Fixture::new();
    let auto_child = format!("{}/sub", fx.mnt_b.display());
    let options = fx.table(&[
        line("automount", &fx.mnt_b, "autofs", "rw"),
        line("/dev/zero", Path::new(&auto_child), "ext3", "rw,usrquota"),
        line("/dev/null", &fx.mnt_a, "ext3", "rw,usrquota"),
    ]);
    let ctx = ScanContext::scan(&[], options.skip_autofs()).unwrap();
    assert_eq!(ctx.entries().len(), 1);
    assert_eq!(ctx.entries()[0].devname, PathBuf::from("/dev/null"));
}

#[test]
fn test_autofs_exclusion_covers_real_descendants_only() {
    // The subtree below b/ is excluded; the sibling b2 must not be.
    let fx = Fixture::new();
    let sibling = format!("{}2", fx.mnt_b.display());
    fs::create_dir(&sibling).unwrap();
    let options = fx.table(&[
        line("automount", &fx.mnt_b, "autofs", "rw"),
        line("/dev/null", Path::new(&sibling), "ext3", "rw,usrquota"),
    ]);
    let ctx = ScanContext::scan(&[], options.skip_autofs()).unwrap();
    assert_eq!(ctx.entries().len(), 1);
}

#[test]
fn test_local_only_excludes_remote_mounts() {
    let fx = Fixture::new();
    let lines = [
        line("server:/export", &fx.mnt_a, "nfs", "rw"),
        line("/dev/null", &fx.mnt_b, "ext3", "rw,usrquota"),
    ];
    let all = ScanContext::scan(&[], fx.table(&lines)).unwrap();
    assert_eq!(all.entries().len(), 2);
    assert_eq!(
        all.entries()[0].detected(QuotaType::User),
        Some(DetectedFormat::Rpc)
    );

    let local = ScanContext::scan(&[], fx.table(&lines).local_only()).unwrap();
    assert_eq!(local.entries().len(), 1);
    assert_eq!(local.entries()[0].fstype, "ext3");
}

#[test]
fn test_loop_option_substitutes_the_backing_device() {
    let fx = Fixture::new();
    let options = fx.table(&[line(
        "/no/such/image.img",
        &fx.mnt_a,
        "ext3",
        "rw,usrquota,loop=/dev/null",
    )]);
    let ctx = ScanContext::scan(&[], options).unwrap();
    assert_eq!(ctx.entries().len(), 1);
    assert_eq!(ctx.entries()[0].devname, PathBuf::from("/dev/null"));
}

#[test]
fn test_all_mode_iteration_skips_noauto() {
    let fx = Fixture::new();
    let options = fx.table(&[
        line("/dev/null", &fx.mnt_a, "ext3", "rw,usrquota,noauto"),
        line("/dev/zero", &fx.mnt_b, "ext3", "rw,usrquota"),
    ]);
    let ctx = ScanContext::scan(&[], options).unwrap();
    // Cached, but not walked.
    assert_eq!(ctx.entries().len(), 2);
    let walked: Vec<_> = ctx.iter().map(|m| m.entry.devname.clone()).collect();
    assert_eq!(walked, vec![PathBuf::from("/dev/zero")]);
}

#[test]
fn test_device_target_selects_its_mount() {
    let fx = Fixture::new();
    let options = fx.table(&[
        line("/dev/null", &fx.mnt_a, "ext3", "rw,usrquota"),
        line("/dev/zero", &fx.mnt_b, "ext3", "rw,grpquota"),
    ]);
    let ctx = ScanContext::scan(&["/dev/zero".to_string()], options).unwrap();
    let walked: Vec<_> = ctx.iter().map(|m| m.entry.devname.clone()).collect();
    assert_eq!(walked, vec![PathBuf::from("/dev/zero")]);
}

#[test]
fn test_target_order_wins_over_table_order() {
    let fx = Fixture::new();
    let options = fx.table(&[
        line("/dev/null", &fx.mnt_a, "ext3", "rw,usrquota"),
        line("/dev/zero", &fx.mnt_b, "ext3", "rw,usrquota"),
    ]);
    let ctx = ScanContext::scan(
        &["/dev/zero".to_string(), "/dev/null".to_string()],
        options,
    )
    .unwrap();
    let walked: Vec<_> = ctx.iter().map(|m| m.entry.devname.clone()).collect();
    assert_eq!(
        walked,
        vec![PathBuf::from("/dev/zero"), PathBuf::from("/dev/null")]
    );
}

#[test]
fn test_unusable_target_alone_fails_the_scan() {
    let fx = Fixture::new();
    let options = fx.table(&[line("/dev/null", &fx.mnt_a, "ext3", "rw,usrquota")]);
    let err = ScanContext::scan(
        &["UUID=00000000-0000-0000-0000-000000000000".to_string()],
        options,
    )
    .unwrap_err();
    assert!(matches!(err, ScanError::NoValidTargets));
}

#[test]
fn test_unusable_target_is_skipped_when_others_match() {
    let fx = Fixture::new();
    let options = fx.table(&[line("/dev/null", &fx.mnt_a, "ext3", "rw,usrquota")]);
    let ctx = ScanContext::scan(
        &[
            "UUID=00000000-0000-0000-0000-000000000000".to_string(),
            "/dev/null".to_string(),
        ],
        options,
    )
    .unwrap();
    assert_eq!(ctx.iter().count(), 1);
}

#[test]
fn test_regular_file_target_is_rejected() {
    let fx = Fixture::new();
    let plain = fx.mnt_a.join("file");
    fs::write(&plain, b"x").unwrap();
    let options = fx.table(&[line("/dev/null", &fx.mnt_a, "ext3", "rw,usrquota")]);
    let err =
        ScanContext::scan(&[plain.to_str().unwrap().to_string()], options).unwrap_err();
    assert!(matches!(err, ScanError::NoValidTargets));
}

#[test]
fn test_mountpoint_with_spaces_is_unescaped() {
    let fx = Fixture::new();
    let spaced = fx.dir.path().join("quota data");
    fs::create_dir(&spaced).unwrap();
    let escaped = spaced.display().to_string().replace(' ', "\\040");
    let options = fx.table(&[format!("/dev/null {} ext3 rw,usrquota 0 0", escaped)]);
    let ctx = ScanContext::scan(&[], options).unwrap();
    assert_eq!(ctx.entries().len(), 1);
    assert_eq!(ctx.entries()[0].dir, fs::canonicalize(&spaced).unwrap());
}

#[test]
fn test_unreadable_override_falls_back_to_the_system_table() {
    // An override that cannot be read is logged and skipped, not fatal;
    // the scan proceeds against the standard sources.
    let ctx = ScanContext::scan(
        &[],
        ScanOptions::default().with_table_path("/no/such/table"),
    );
    assert!(ctx.is_ok());
}

#[test]
fn test_resolved_quota_file_lands_under_the_mountpoint() {
    let fx = Fixture::new();
    let options = fx.table(&[line("/dev/null", &fx.mnt_a, "ext3", "rw,usrquota")]);
    let ctx = ScanContext::scan(&[], options).unwrap();
    let mount = ctx.iter().next().unwrap();
    let path = resolve_quota_file(
        &mount,
        QuotaType::User,
        QuotaFormat::VfsV0,
        ResolveFlags::default(),
        None,
    )
    .unwrap();
    assert_eq!(path, mount.dir.join("aquota.user"));
}
