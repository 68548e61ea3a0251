use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use framepump::logging;
use framepump::ServiceSettings;

struct TempDir {
    path: PathBuf,
}

impl TempDir {
    fn new(label: &str) -> Self {
        let nanos = SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let mut path = std::env::temp_dir();
        path.push(format!("framepump_test_{}_{}_{}", label, std::process::id(), nanos));
        fs::create_dir_all(&path).unwrap();
        Self { path }
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

fn write_aged(path: &Path, age: Duration) {
    fs::write(path, b"entry\n").unwrap();
    let file = fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() - age).unwrap();
}

fn remaining(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn cleanup_removes_only_expired_log_files() {
    let temp = TempDir::new("log_cleanup");
    let forty_days = Duration::from_secs(40 * 24 * 60 * 60);
    write_aged(&temp.path.join("framepump.log.2020-01-01"), forty_days);
    write_aged(&temp.path.join("other.log"), forty_days);
    write_aged(&temp.path.join("keep.txt"), forty_days);
    write_aged(&temp.path.join("fresh.log"), Duration::from_secs(60));

    let deleted = logging::cleanup_old_logs(&temp.path, 30).unwrap();

    assert_eq!(deleted, 2);
    assert_eq!(remaining(&temp.path), vec!["fresh.log", "keep.txt"]);
}

#[test]
fn cleanup_of_missing_dir_is_an_error() {
    let temp = TempDir::new("log_cleanup_missing");
    assert!(logging::cleanup_old_logs(&temp.path.join("absent"), 30).is_err());
}

#[test]
fn init_from_settings_installs_once_then_reloads() {
    let settings = ServiceSettings::default();
    let cleanup = logging::init_from_settings(&settings).unwrap();
    assert!(cleanup.is_none());

    let quieter = ServiceSettings {
        log_level: "warn".to_string(),
        ..ServiceSettings::default()
    };
    assert!(logging::init_from_settings(&quieter).unwrap().is_none());
}
