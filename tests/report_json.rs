mod common;

use common::{FakeTransport, camera, fast_settings};
use media_vault::report::write_report;
use media_vault::{FailureLog, Orchestrator, Shutdown, Silent, TransportError};
use tempfile::tempdir;

#[test]
fn report_is_written_as_json_into_the_backup_root() {
    let td = tempdir().unwrap();
    let root = td.path().join("backup");
    let log = FailureLog::new(td.path().join("f.log"));
    let t = FakeTransport::new()
        .with_file("/sdcard/DCIM/Camera/a.jpg", b"a")
        .with_file("/sdcard/DCIM/Camera/b.mp4", b"b")
        .always_fail("/sdcard/DCIM/Camera/b.mp4", TransportError::timeout("too slow"));
    let shutdown = Shutdown::new();
    let report = Orchestrator::new(&t, fast_settings(), &log, &shutdown, &Silent).run(&root, &[camera()]);

    let path = write_report(&root, &report).unwrap();

    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("backup_report_") && name.ends_with(".json"), "{name}");
    assert_eq!(path.parent(), Some(root.as_path()));

    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["successful"].as_array().unwrap().len(), 1);
    assert_eq!(json["successful"][0]["source_path"], "/sdcard/DCIM/Camera/a.jpg");
    let copied = std::path::PathBuf::from(json["successful"][0]["dest_path"].as_str().unwrap());
    assert!(copied.is_file(), "{}", copied.display());
    assert!(copied.starts_with(root.join("Camera").join("Photos")));
    assert_eq!(json["failed"][0]["status"], "Failed");
    assert_eq!(json["failed"][0]["attempts"], 3);
    assert!(json["failed"][0]["error"].as_str().unwrap().contains("too slow"));
    assert_eq!(json["interrupted"], false);
    assert!(json["finished_at"].is_string());
}
