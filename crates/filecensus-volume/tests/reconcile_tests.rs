use std::fs;

use filecensus_core::{IndexStore, VolumeFacts, WarningKind};
use filecensus_store::SqliteStore;
use filecensus_volume::{
    PhysicalDisk, StaticEnumerator, SysfsEnumerator, VolumeEnumerator, VolumeReconciler,
};
use tempfile::TempDir;

#[test]
fn test_letter_reassignment_reuses_record() {
    let store = SqliteStore::open_in_memory().unwrap();
    let original = store
        .upsert_volume(None, &VolumeFacts::new("D").with_serial("1234"))
        .unwrap();

    let enumerator =
        StaticEnumerator::new(vec![VolumeFacts::new("E").with_serial("1234").with_label("")]);
    let result = VolumeReconciler::new(&store, &enumerator).reconcile().unwrap();

    assert_eq!(result.reused, 1);
    assert_eq!(result.created, 0);
    assert_eq!(result.active.len(), 1);
    assert_eq!(result.active[0].id, original);

    let volumes = store.list_volumes().unwrap();
    assert_eq!(volumes.len(), 1);
    assert_eq!(volumes[0].facts.letter, "E");
}

#[test]
fn test_blank_serial_label_and_size_tie_break() {
    let store = SqliteStore::open_in_memory().unwrap();
    let gb = 1_000_000_000u64;
    let data = store
        .upsert_volume(
            None,
            &VolumeFacts::new("F").with_label("DATA").with_size(500 * gb),
        )
        .unwrap();
    store
        .upsert_volume(
            None,
            &VolumeFacts::new("G").with_label("BACKUP").with_size(1000 * gb),
        )
        .unwrap();

    let enumerator =
        StaticEnumerator::new(vec![VolumeFacts::new("H").with_label("DATA").with_size(500 * gb)]);
    let result = VolumeReconciler::new(&store, &enumerator).reconcile().unwrap();

    assert_eq!(result.active.len(), 1);
    assert_eq!(result.active[0].id, data);
    assert_eq!(store.list_volumes().unwrap().len(), 2);
}

#[test]
fn test_second_run_creates_nothing() {
    let store = SqliteStore::open_in_memory().unwrap();
    let enumerator = StaticEnumerator::new(vec![
        VolumeFacts::new("/").with_serial("aaaa-bbbb"),
        VolumeFacts::new("/mnt/data").with_label("DATA").with_size(42),
    ]);

    let first = VolumeReconciler::new(&store, &enumerator).reconcile().unwrap();
    assert_eq!(first.created, 2);

    let second = VolumeReconciler::new(&store, &enumerator).reconcile().unwrap();
    assert_eq!(second.created, 0);
    assert_eq!(second.reused, 2);
    assert_eq!(store.list_volumes().unwrap().len(), 2);
}

#[test]
fn test_enrichment_updates_model_and_isolates_failures() {
    let store = SqliteStore::open_in_memory().unwrap();
    let enumerator = StaticEnumerator::new(vec![
        VolumeFacts::new("D").with_serial("1"),
        VolumeFacts::new("E").with_serial("2"),
    ])
    .with_failing_disk(PhysicalDisk::new("sda", "Broken", "SCSI"))
    .with_disk(PhysicalDisk::new("sdb", "Samsung T7", "USB"), ["E", "Z"]);

    let result = VolumeReconciler::new(&store, &enumerator).reconcile().unwrap();

    assert_eq!(result.enriched, 1);
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.warnings[0].kind, WarningKind::Enumeration);

    let volumes = store.list_volumes().unwrap();
    assert_eq!(volumes.len(), 2, "enrichment never creates records");
    let e = volumes.iter().find(|v| v.facts.letter == "E").unwrap();
    assert_eq!(e.facts.model, "Samsung T7");
    assert_eq!(e.facts.drive_type, "USB");
    let d = volumes.iter().find(|v| v.facts.letter == "D").unwrap();
    assert_eq!(d.facts.model, "");
}

#[cfg(unix)]
#[test]
fn test_sysfs_enumerator_reads_fixture_tree() {
    use std::os::unix::fs::symlink;

    let temp = TempDir::new().unwrap();
    let mnt = temp.path().join("mnt-data");
    fs::create_dir(&mnt).unwrap();

    let mounts = temp.path().join("mounts");
    fs::write(
        &mounts,
        format!(
            "proc /proc proc rw 0 0\n\
             /dev/sda1 {} ext4 rw,relatime 0 0\n\
             /dev/sda1 /bind ext4 rw 0 0\n\
             tmpfs /run tmpfs rw 0 0\n\
             /dev/sdb1 /media/My\\040Stick vfat rw 0 0\n",
            mnt.display()
        ),
    )
    .unwrap();

    let sys_block = temp.path().join("sys-block");
    fs::create_dir_all(sys_block.join("sda/device")).unwrap();
    fs::create_dir_all(sys_block.join("sda/sda1")).unwrap();
    fs::write(sys_block.join("sda/device/model"), "WDC WD10EZEX  \n").unwrap();
    fs::write(sys_block.join("sda/removable"), "0\n").unwrap();
    fs::create_dir_all(sys_block.join("sdb/sdb1")).unwrap();
    fs::write(sys_block.join("sdb/removable"), "1\n").unwrap();
    fs::create_dir_all(sys_block.join("loop0")).unwrap();

    let dev_disk = temp.path().join("dev-disk");
    fs::create_dir_all(dev_disk.join("by-uuid")).unwrap();
    fs::create_dir_all(dev_disk.join("by-label")).unwrap();
    symlink("../../sda1", dev_disk.join("by-uuid/1111-2222")).unwrap();
    symlink("../../sdb1", dev_disk.join("by-label/My\\x20Stick")).unwrap();

    let enumerator = SysfsEnumerator::with_roots(&mounts, &sys_block, &dev_disk);

    let volumes = enumerator.list_volumes().unwrap();
    assert_eq!(volumes.len(), 2);
    assert_eq!(volumes[0].letter, mnt.to_string_lossy());
    assert_eq!(volumes[0].serial, "1111-2222");
    assert!(volumes[0].total_size > 0);
    assert_eq!(volumes[1].letter, "/media/My Stick");
    assert_eq!(volumes[1].label, "My Stick");
    assert_eq!(volumes[1].serial, "");

    let disks = enumerator.physical_disks().unwrap();
    let names: Vec<_> = disks.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["sda", "sdb"]);
    assert_eq!(disks[0].model, "WDC WD10EZEX");
    assert_eq!(disks[0].interface, "SCSI");
    assert_eq!(disks[1].interface, "USB");

    let letters = enumerator.letters_for_disk(&disks[0]).unwrap();
    assert_eq!(letters, vec![mnt.to_string_lossy().into_owned()]);
}

#[test]
fn test_sysfs_missing_mount_table_is_enumeration_error() {
    let temp = TempDir::new().unwrap();
    let enumerator = SysfsEnumerator::with_roots(
        temp.path().join("missing"),
        temp.path().join("block"),
        temp.path().join("disk"),
    );
    assert!(enumerator.list_volumes().is_err());
    assert!(enumerator.physical_disks().is_err());

    let store = SqliteStore::open_in_memory().unwrap();
    let result = VolumeReconciler::new(&store, &enumerator).reconcile().unwrap();
    assert!(result.active.is_empty());
    assert_eq!(result.warnings.len(), 2);
}
