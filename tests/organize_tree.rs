//! Organizer behaviour on real temp trees.

use assert_fs::TempDir;
use assert_fs::prelude::*;
use filetime::{FileTime, set_file_mtime};
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};
use walkdir::WalkDir;

use media_vault::organize::{date_folder, organize};

fn contents(root: &Path) -> Vec<Vec<u8>> {
    let mut all: Vec<Vec<u8>> = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| fs::read(e.path()).unwrap())
        .collect();
    all.sort();
    all
}

/// Pin the mtime and return the date folder it maps to.
fn pin(path: &Path, unix_secs: u64) -> String {
    set_file_mtime(path, FileTime::from_unix_time(unix_secs as i64, 0)).unwrap();
    date_folder(SystemTime::UNIX_EPOCH + Duration::from_secs(unix_secs))
}

#[test]
fn sorts_by_category_and_date() {
    let dir = TempDir::new().unwrap();
    let photo = dir.child("a.JPG");
    let video = dir.child("sub/b.mp4");
    let other = dir.child("c.mp3");
    photo.write_binary(b"p").unwrap();
    video.write_binary(b"v").unwrap();
    other.write_binary(b"o").unwrap();
    let day = pin(photo.path(), 1_700_000_000);
    pin(video.path(), 1_700_000_000);
    pin(other.path(), 1_700_000_000);

    let summary = organize(dir.path());

    assert_eq!(summary.moved, 3);
    assert_eq!(summary.errors, 0);
    assert!(dir.child(format!("Photos/{day}/a.JPG")).path().is_file());
    assert!(dir.child(format!("Videos/{day}/b.mp4")).path().is_file());
    assert!(dir.child(format!("Other/{day}/c.mp3")).path().is_file());
}

#[test]
fn modification_time_survives_the_move() {
    let dir = TempDir::new().unwrap();
    let f = dir.child("IMG_9.png");
    f.write_binary(b"x").unwrap();
    let day = pin(f.path(), 1_600_000_000);

    organize(dir.path());

    let moved = dir.child(format!("Photos/{day}/IMG_9.png"));
    let meta = fs::metadata(moved.path()).unwrap();
    assert_eq!(FileTime::from_last_modification_time(&meta).unix_seconds(), 1_600_000_000);
}

#[test]
fn running_twice_changes_nothing() {
    let dir = TempDir::new().unwrap();
    for (name, secs) in [("a.jpg", 1_600_000_000u64), ("b.mov", 1_650_000_000), ("c.txt", 1_700_000_000)] {
        let c = dir.child(name);
        c.write_str(name).unwrap();
        pin(c.path(), secs);
    }

    let first = organize(dir.path());
    let before = contents(dir.path());
    let second = organize(dir.path());

    assert_eq!(first.moved, 3);
    assert_eq!(second.moved, 0);
    assert_eq!(second.already_in_place, 3);
    assert_eq!(contents(dir.path()), before);
}

#[test]
fn collisions_never_overwrite() {
    let dir = TempDir::new().unwrap();
    let day = date_folder(SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000));
    let target = dir.child(format!("Photos/{day}/a.jpg"));
    target.write_str("already organized").unwrap();
    pin(target.path(), 1_700_000_000);

    let newcomer = dir.child("a.jpg");
    newcomer.write_str("newcomer").unwrap();
    pin(newcomer.path(), 1_700_000_000);
    let before = contents(dir.path());

    let summary = organize(dir.path());

    assert_eq!(summary.moved, 1);
    assert_eq!(summary.already_in_place, 1);
    assert_eq!(contents(dir.path()), before);
    assert_eq!(fs::read_to_string(target.path()).unwrap(), "already organized");

    let names: Vec<String> = fs::read_dir(dir.child(format!("Photos/{day}")).path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.len(), 2);
    assert!(names.iter().any(|n| n.starts_with("a_") && n.ends_with(".jpg")), "{names:?}");
}
