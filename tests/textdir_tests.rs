//! Integration tests for the textdir backend through the public API

use std::fs;
use std::path::Path;
use std::time::Duration;

use tempfile::TempDir;
use vuurmuur::backend::Backend;
use vuurmuur::textdir::{LockFile, TextDir};
use vuurmuur::{Config, ObjectType, OpenMode, VrmrError};

fn config_for(dir: &Path) -> Config {
    Config::default()
        .with_config_dir(dir.join("etc"))
        .with_textdir_location(dir)
        .with_lock_wait(2, Duration::from_millis(10))
}

fn open(dir: &Path, ty: ObjectType) -> TextDir {
    let config = config_for(dir);
    let mut backend = TextDir::new(&config);
    backend.conf(&config).unwrap();
    backend.open(OpenMode::ReadWrite, ty).unwrap();
    backend
}

#[test]
fn test_ask_first_match_and_missing_key() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("services")).unwrap();
    fs::write(
        dir.path().join("services/ssh"),
        "# comment\n\n  ACTIVE=\"no\"\nACTIVE=\"yes\"\nACTIVE=\"later\"\nCOMMENT=\"\"\n",
    )
    .unwrap();

    let mut backend = open(dir.path(), ObjectType::Service);
    let active = backend.ask("ssh", "active", 64, ObjectType::Service).unwrap();
    assert_eq!(active.as_deref(), Some("yes"));

    let comment = backend.ask("ssh", "COMMENT", 64, ObjectType::Service).unwrap();
    assert_eq!(comment.as_deref(), Some(""));

    assert!(backend
        .ask("ssh", "BROADCAST", 64, ObjectType::Service)
        .unwrap()
        .is_none());
}

#[test]
fn test_ask_value_too_long() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("services")).unwrap();
    fs::write(dir.path().join("services/ssh"), "COMMENT=\"0123456789\"\n").unwrap();

    let mut backend = open(dir.path(), ObjectType::Service);
    let err = backend
        .ask("ssh", "COMMENT", 4, ObjectType::Service)
        .unwrap_err();
    assert!(matches!(err, VrmrError::ValueTooLong { .. }));
}

#[test]
fn test_ask_missing_object() {
    let dir = TempDir::new().unwrap();
    let mut backend = open(dir.path(), ObjectType::Service);
    let err = backend
        .ask("nope", "ACTIVE", 64, ObjectType::Service)
        .unwrap_err();
    assert!(matches!(err, VrmrError::NotFound(_)));
}

#[test]
fn test_invalid_names_are_rejected() {
    let dir = TempDir::new().unwrap();
    let mut backend = open(dir.path(), ObjectType::Service);
    for name in ["../etc/passwd", "a/b", "", ".."] {
        assert!(
            backend.add(name, ObjectType::Service).is_err(),
            "accepted {:?}",
            name
        );
    }
}

#[test]
fn test_host_round_trip() {
    let dir = TempDir::new().unwrap();
    let mut backend = open(dir.path(), ObjectType::Zone);
    backend.add("dmz", ObjectType::Zone).unwrap();
    backend.add("servers.dmz", ObjectType::Network).unwrap();
    backend.add("web.servers.dmz", ObjectType::Host).unwrap();
    backend
        .tell("web.servers.dmz", "IPADDRESS", "172.16.0.10", true, ObjectType::Host)
        .unwrap();

    let text = fs::read_to_string(
        dir.path()
            .join("zones/dmz/networks/servers/hosts/web.host"),
    )
    .unwrap();
    assert_eq!(text, "IPADDRESS=\"172.16.0.10\"\n");

    let names: Vec<String> = backend
        .list_all(ObjectType::Zone)
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(names, vec!["dmz", "servers.dmz", "web.servers.dmz"]);
}

#[test]
fn test_rule_tell_waits_for_lock() {
    let dir = TempDir::new().unwrap();
    let mut backend = open(dir.path(), ObjectType::Rule);
    backend.add("rules", ObjectType::Rule).unwrap();
    backend
        .tell("rules", "RULE", "accept service ssh from lan to fw", false, ObjectType::Rule)
        .unwrap();

    let file = dir.path().join("rules/rules.conf");
    let before = fs::read_to_string(&file).unwrap();

    // Hold the lock: the write must time out and leave the file alone
    let held = LockFile::acquire(&file, 1, Duration::from_millis(1)).unwrap();
    let err = backend
        .tell("rules", "RULE", "drop service any from any to any", false, ObjectType::Rule)
        .unwrap_err();
    assert!(matches!(err, VrmrError::LockTimeout { attempts: 2, .. }));
    assert_eq!(fs::read_to_string(&file).unwrap(), before);

    drop(held);
    assert!(!LockFile::path_for(&file).exists());
    backend
        .tell("rules", "RULE", "drop service any from any to any", false, ObjectType::Rule)
        .unwrap();
    assert!(!LockFile::path_for(&file).exists());

    let rules: Vec<String> = backend
        .ask_multi("rules", "RULE", 512, ObjectType::Rule)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(
        rules,
        vec![
            "accept service ssh from lan to fw",
            "drop service any from any to any"
        ]
    );
}

#[test]
fn test_delete_and_rename_through_backend() {
    let dir = TempDir::new().unwrap();
    let mut backend = open(dir.path(), ObjectType::Interface);
    backend.add("wan", ObjectType::Interface).unwrap();
    backend.rename("wan", "uplink", ObjectType::Interface).unwrap();
    assert!(dir.path().join("interfaces/uplink.conf").is_file());

    backend.del("uplink", ObjectType::Interface, false).unwrap();
    assert!(backend.list_all(ObjectType::Interface).unwrap().is_empty());
}

#[test]
fn test_tell_rejects_line_breaks_and_bad_keys() {
    let dir = TempDir::new().unwrap();
    let mut backend = open(dir.path(), ObjectType::Service);
    backend.add("ssh", ObjectType::Service).unwrap();
    backend
        .tell("ssh", "ACTIVE", "no", true, ObjectType::Service)
        .unwrap();

    let err = backend
        .tell("ssh", "COMMENT", "x\nACTIVE=\"yes\"", true, ObjectType::Service)
        .unwrap_err();
    assert!(matches!(err, VrmrError::Parse(_)));
    let err = backend
        .tell("ssh", "COMMENT", "x\r", false, ObjectType::Service)
        .unwrap_err();
    assert!(matches!(err, VrmrError::Parse(_)));

    for key in ["", "A=B", "MY KEY", "#ACTIVE"] {
        let err = backend
            .tell("ssh", key, "yes", true, ObjectType::Service)
            .unwrap_err();
        assert!(matches!(err, VrmrError::InvalidName(_)), "key {:?}", key);
    }

    assert_eq!(
        fs::read_to_string(dir.path().join("services/ssh")).unwrap(),
        "ACTIVE=\"no\"\n"
    );
    let active = backend.ask("ssh", "ACTIVE", 64, ObjectType::Service).unwrap();
    assert_eq!(active.as_deref(), Some("no"));
    assert!(backend
        .ask("ssh", "COMMENT", 64, ObjectType::Service)
        .unwrap()
        .is_none());
}
