use media_vault::config::{CONFIG_ENV, default_config_path, load_or_init, parse_config_xml};
use media_vault::config::types::{FolderSource, LogLevel};
use media_vault::{DeviceFolder, OrganizeTiming};
use serial_test::serial;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::tempdir;

const FULL: &str = r#"
<config>
  <backup_root>/srv/phone</backup_root>
  <adb_path>/opt/platform-tools/adb</adb_path>
  <device_serial>R58M123</device_serial>
  <device_root>/sdcard/</device_root>
  <folders>
    <folder><name>Camera</name></folder>
    <folder><name>Signal</name><path>/sdcard/Pictures/Signal</path></folder>
  </folders>
  <folder_source>device_discovered</folder_source>
  <organize_timing>end_of_run</organize_timing>
  <include_audio>yes</include_audio>
  <max_retries>5</max_retries>
  <pull_timeout_seconds>120</pull_timeout_seconds>
  <poll_interval_seconds>2</poll_interval_seconds>
  <delete_after_backup>true</delete_after_backup>
  <transfer_workers>3</transfer_workers>
  <failure_log>/var/log/phone_failures.log</failure_log>
  <log_level>debug</log_level>
  <log_file>/tmp/media_vault.log</log_file>
</config>
"#;

#[test]
fn every_element_is_read() {
    let cfg = parse_config_xml(FULL).unwrap();
    assert_eq!(cfg.backup_root, PathBuf::from("/srv/phone"));
    assert_eq!(cfg.adb_path, PathBuf::from("/opt/platform-tools/adb"));
    assert_eq!(cfg.device_serial.as_deref(), Some("R58M123"));
    assert_eq!(cfg.device_root, "/sdcard");
    assert_eq!(
        cfg.folders,
        vec![
            DeviceFolder::new("Camera", "/sdcard/DCIM/Camera"),
            DeviceFolder::new("Signal", "/sdcard/Pictures/Signal"),
        ]
    );
    assert_eq!(cfg.folder_source, FolderSource::DeviceDiscovered);
    assert_eq!(cfg.organize_timing, OrganizeTiming::EndOfRun);
    assert!(cfg.include_audio);
    assert_eq!(cfg.max_retries, 5);
    assert_eq!(cfg.pull_timeout, Duration::from_secs(120));
    assert_eq!(cfg.poll_interval, Duration::from_secs(2));
    assert!(cfg.delete_after_backup);
    assert_eq!(cfg.transfer_workers, 3);
    assert_eq!(cfg.failure_log, PathBuf::from("/var/log/phone_failures.log"));
    assert_eq!(cfg.log_level, LogLevel::Debug);
    assert_eq!(cfg.log_file, Some(PathBuf::from("/tmp/media_vault.log")));
}

#[test]
fn device_root_moves_the_default_folders() {
    let cfg = parse_config_xml("<config><device_root>/mnt/sdcard</device_root></config>").unwrap();
    assert_eq!(cfg.folders[0], DeviceFolder::new("Camera", "/mnt/sdcard/DCIM/Camera"));
    assert_eq!(cfg.dcim_root(), "/mnt/sdcard/DCIM");
}

#[test]
fn empty_elements_keep_defaults() {
    let cfg = parse_config_xml(
        "<config><max_retries></max_retries><device_serial>  </device_serial></config>",
    )
    .unwrap();
    assert_eq!(cfg.max_retries, 3);
    assert_eq!(cfg.device_serial, None);
}

#[test]
fn bad_values_are_errors() {
    assert!(parse_config_xml("<config><include_audio>maybe</include_audio></config>").is_err());
    assert!(parse_config_xml("<config><folder_source>everything</folder_source></config>").is_err());
    assert!(parse_config_xml("<config><log_level>loud</log_level></config>").is_err());
    assert!(
        parse_config_xml("<config><folders><folder><name> </name></folder></folders></config>")
            .is_err()
    );
}

#[test]
#[serial]
fn env_var_names_the_config_file() {
    let td = tempdir().unwrap();
    let file = td.path().join("custom.xml");
    unsafe { std::env::set_var(CONFIG_ENV, &file) };
    let resolved = default_config_path().unwrap();
    unsafe { std::env::remove_var(CONFIG_ENV) };
    assert_eq!(resolved, file);
}

#[test]
#[serial]
fn env_var_directory_gets_config_xml_appended() {
    let td = tempdir().unwrap();
    unsafe { std::env::set_var(CONFIG_ENV, td.path()) };
    let resolved = default_config_path().unwrap();
    unsafe { std::env::remove_var(CONFIG_ENV) };
    assert_eq!(resolved, td.path().join("config.xml"));
}

#[test]
#[serial]
fn explicit_missing_config_is_an_error() {
    let td = tempdir().unwrap();
    let file = td.path().join("absent.xml");
    unsafe { std::env::set_var(CONFIG_ENV, &file) };
    let loaded = load_or_init();
    unsafe { std::env::remove_var(CONFIG_ENV) };
    assert!(loaded.is_err());
    assert!(!file.exists(), "no template is written for an explicit path");
}

#[test]
#[serial]
fn explicit_existing_config_is_loaded() {
    let td = tempdir().unwrap();
    let file = td.path().join("config.xml");
    std::fs::write(&file, "<config><max_retries>9</max_retries></config>").unwrap();
    unsafe { std::env::set_var(CONFIG_ENV, &file) };
    let loaded = load_or_init();
    unsafe { std::env::remove_var(CONFIG_ENV) };
    let loaded = loaded.unwrap();
    assert!(!loaded.created);
    assert_eq!(loaded.path, file);
    assert_eq!(loaded.config.max_retries, 9);
}
