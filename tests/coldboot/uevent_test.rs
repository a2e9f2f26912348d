//! Tests for `src/uevent.rs` and `src/sysfs.rs` — backlog draining and sysfs replay.

use std::path::Path;

use coldboot::sysfs::SysfsUeventSource;
use coldboot::uevent::{ListenerAction, Uevent, UeventQueue, UeventSource};

/// Source replaying fixed events and recording every directive it received.
struct VecSource {
    events: Vec<Uevent>,
    directives: Vec<ListenerAction>,
}

impl UeventSource for VecSource {
    fn regenerate_uevents(&mut self, callback: &mut dyn FnMut(Uevent) -> ListenerAction) {
        for event in self.events.clone() {
            let directive = callback(event);
            self.directives.push(directive);
            if directive == ListenerAction::Stop {
                return;
            }
        }
    }
}

fn event(path: &str) -> Uevent {
    Uevent {
        action: "add".to_owned(),
        path: path.to_owned(),
        ..Uevent::default()
    }
}

#[test]
fn from_sysfs_parses_known_keys() {
    let contents = "MAJOR=179\nMINOR=1\nDEVNAME=mmcblk0p1\nDEVTYPE=partition\nPARTN=1\nPARTNAME=boot_a\n";
    let uevent = Uevent::from_sysfs("/devices/platform/mmc/block/mmcblk0/mmcblk0p1", contents);

    assert_eq!(uevent.action, "add");
    assert_eq!(uevent.path, "/devices/platform/mmc/block/mmcblk0/mmcblk0p1");
    assert_eq!(uevent.major, Some(179));
    assert_eq!(uevent.minor, Some(1));
    assert_eq!(uevent.device_name.as_deref(), Some("mmcblk0p1"));
    assert_eq!(uevent.partition_num, Some(1));
    assert_eq!(uevent.partition_name.as_deref(), Some("boot_a"));
    assert!(uevent.subsystem.is_empty());
}

#[test]
fn from_sysfs_ignores_garbage() {
    let uevent = Uevent::from_sysfs("/devices/x", "no equals sign\nMAJOR=abc\nSUBSYSTEM=tty\n");
    assert_eq!(uevent.major, None);
    assert_eq!(uevent.subsystem, "tty");
}

#[test]
fn drain_keeps_delivery_order_and_always_continues() {
    let paths = ["/devices/b", "/devices/a", "/devices/b", "/devices/c"];
    let mut source = VecSource {
        events: paths.iter().map(|p| event(p)).collect(),
        directives: Vec::new(),
    };

    let queue = UeventQueue::drain(&mut source);

    let drained: Vec<&str> = queue.as_slice().iter().map(|e| e.path.as_str()).collect();
    assert_eq!(drained, paths);
    assert_eq!(source.directives, vec![ListenerAction::Continue; 4]);
}

#[test]
fn drain_of_empty_backlog_is_empty() {
    let mut source = VecSource {
        events: Vec::new(),
        directives: Vec::new(),
    };
    let queue = UeventQueue::drain(&mut source);
    assert!(queue.is_empty());
    assert!(queue.get(0).is_none());
}

fn write_device(root: &Path, rel: &str, contents: &str) {
    let dir = root.join(rel);
    std::fs::create_dir_all(&dir).expect("should create device dir");
    std::fs::write(dir.join("uevent"), contents).expect("should write uevent");
}

#[test]
fn sysfs_source_walks_devices_depth_first() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let root = tmp.path();
    write_device(root, "devices/platform", "");
    write_device(root, "devices/platform/serial0", "MAJOR=4\nMINOR=64\nDEVNAME=ttyS0\n");
    write_device(root, "devices/virtual/mem/null", "MAJOR=1\nMINOR=3\nDEVNAME=null\n");
    std::fs::create_dir_all(root.join("devices/virtual/no_uevent")).expect("should create dir");
    std::fs::create_dir_all(root.join("class/tty")).expect("should create class dir");
    std::os::unix::fs::symlink(
        root.join("devices/platform/serial0"),
        root.join("class/tty/ttyS0"),
    )
    .expect("should create class symlink");
    std::fs::create_dir_all(root.join("bus/platform")).expect("should create bus dir");
    std::os::unix::fs::symlink(
        root.join("bus/platform"),
        root.join("devices/platform/serial0/subsystem"),
    )
    .expect("should create subsystem link");

    let mut source = SysfsUeventSource::new(root);
    let queue = UeventQueue::drain(&mut source);

    let paths: Vec<&str> = queue.as_slice().iter().map(|e| e.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "/devices/platform",
            "/devices/platform/serial0",
            "/devices/virtual/mem/null",
        ]
    );

    let serial = queue.get(1).expect("serial event");
    assert_eq!(serial.device_name.as_deref(), Some("ttyS0"));
    assert_eq!(serial.subsystem, "platform");
    assert_eq!(serial.action, "add");
}

#[test]
fn sysfs_source_honors_stop() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    write_device(tmp.path(), "block/sda", "DEVNAME=sda\n");
    write_device(tmp.path(), "devices/a", "");
    write_device(tmp.path(), "devices/b", "");

    let mut source = SysfsUeventSource::new(tmp.path());
    let mut seen = Vec::new();
    source.regenerate_uevents(&mut |uevent| {
        seen.push(uevent.path);
        ListenerAction::Stop
    });

    assert_eq!(seen, vec!["/block/sda".to_owned()]);
}

#[test]
fn sysfs_source_tolerates_missing_root() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let mut source = SysfsUeventSource::new(tmp.path().join("missing"));
    assert!(UeventQueue::drain(&mut source).is_empty());
}
