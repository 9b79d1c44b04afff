//! Offline command dispatch against a seeded cache

use clap::Parser;
use device_store::{ActivationStatus, Device, DeviceRepository, DeviceService, Platform, RedbStore};
use device_sync::app;
use device_sync::cli::Cli;
use device_sync::Config;
use std::collections::HashMap;
use std::path::Path;
use tokio_util::sync::CancellationToken;

fn seed(path: &Path) {
    let store = RedbStore::open(path).unwrap();
    let service = DeviceService::new(DeviceRepository::new(store));

    let mut android = Device::new("a0000001-x", "1", Platform::Android, ActivationStatus::Activated);
    android.software.security_patch_level = "2023-01-01".into();
    service.create(android).unwrap();

    let mut ios = Device::new("i0000001-x", "2", Platform::Ios, ActivationStatus::Pending);
    ios.software.os_version = "17.1".into();
    service.create(ios).unwrap();
}

fn config(local_mode: bool, vars: &[(&str, String)]) -> Config {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    Config::from_source(local_mode, |key| vars.get(key).cloned()).unwrap()
}

#[tokio::test]
async fn test_stats_and_local_analysis_read_the_cache() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("devices.db");
    seed(&db);
    let db_path = db.display().to_string();

    let cli = Cli::try_parse_from(["device-sync", "stats"]).unwrap();
    let config = config(true, &[("DB_PATH", db_path.clone())]);
    app::run(cli, config, CancellationToken::new()).await.unwrap();

    let cli = Cli::try_parse_from(["device-sync", "--local"]).unwrap();
    let config = self::config(true, &[("DB_PATH", db_path)]);
    app::run(cli, config, CancellationToken::new()).await.unwrap();
}

#[tokio::test]
async fn test_vulns_rejects_bad_patch_level_before_any_request() {
    let dir = tempfile::tempdir().unwrap();
    let cli = Cli::try_parse_from([
        "device-sync",
        "vulns",
        "--platform",
        "android",
        "--version",
        "20240105",
    ])
    .unwrap();
    let config = config(
        false,
        &[
            ("APPLICATION_KEY", "app-key".to_string()),
            // nothing listens here
            ("API_BASE_URL", "http://127.0.0.1:9".to_string()),
            ("DB_PATH", dir.path().join("devices.db").display().to_string()),
        ],
    );

    let err = app::run(cli, config, CancellationToken::new()).await.unwrap_err();
    let cause = err.downcast_ref::<mra_common::Error>().unwrap();
    assert!(matches!(cause, mra_common::Error::Validation { field: "version", .. }));
}
