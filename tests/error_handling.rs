use skipwipe::error;
use skipwipe::io::DeviceHandle;
use skipwipe::wipe::{NoProgress, SkipFactor, WipeEngine};
use skipwipe::WipeError;
use std::error::Error;
use std::io;
use std::path::PathBuf;
use tempfile::tempdir;

#[test]
fn test_missing_device_is_open_failure() {
    let temp_dir = tempdir().unwrap();
    let missing = temp_dir.path().join("missing.img");

    let err = WipeEngine::new(4096, SkipFactor::FULL)
        .run_on_path(&missing, 4096, &NoProgress)
        .unwrap_err();
    assert!(matches!(err, WipeError::OpenFailed { .. }));
    assert_eq!(error::exit_code(&err), 3);
    assert!(err.source().is_some());
    assert!(error::user_friendly_message(&err).contains("missing.img"));

    assert!(matches!(
        DeviceHandle::open(&missing),
        Err(WipeError::OpenFailed { .. })
    ));
}

#[test]
fn test_permission_denied_message() {
    let err = WipeError::OpenFailed {
        path: PathBuf::from("/dev/sdz"),
        source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
    };
    assert!(error::user_friendly_message(&err).contains("Permission denied"));
}

#[test]
fn test_only_sync_failure_is_non_fatal() {
    let sync = WipeError::SyncFailed(io::Error::new(io::ErrorKind::Other, "flush"));
    assert!(!error::is_fatal(&sync));

    let write = WipeError::WriteFailed {
        offset: 8192,
        source: io::Error::new(io::ErrorKind::Other, "eio"),
    };
    assert!(error::is_fatal(&write));
    assert!(write.to_string().contains("8192"));
    assert!(error::is_fatal(&WipeError::EntropyFailed("rng".into())));
}

#[test]
fn test_exit_codes() {
    let cancelled = WipeError::Cancelled {
        bytes_processed: 10,
        bytes_written: 5,
    };
    assert_eq!(error::exit_code(&cancelled), 130);
    assert_eq!(error::exit_code(&WipeError::ConfigError("x".into())), 2);
    assert_eq!(
        error::exit_code(&WipeError::PositionRestoreFailed {
            bytes_per_sec: 1.0,
            offset: 0,
            source: io::Error::new(io::ErrorKind::Other, "seek"),
        }),
        7
    );
    assert_eq!(
        error::exit_code(&WipeError::AllocFailed {
            size: 4096,
            reason: "oom".into()
        }),
        4
    );
}

#[test]
fn test_error_conversions() {
    let err: WipeError = io::Error::new(io::ErrorKind::Other, "boom").into();
    assert!(matches!(err, WipeError::IoError(_)));

    let toml_err = toml::from_str::<toml::Value>("= nope").unwrap_err();
    let err: WipeError = toml_err.into();
    assert!(matches!(err, WipeError::ConfigError(_)));

    let json_err = serde_json::from_str::<u64>("nope").unwrap_err();
    let err: WipeError = json_err.into();
    assert!(matches!(err, WipeError::ReportError(_)));
}

#[test]
fn test_zero_skip_factor_rejected() {
    assert!(matches!(SkipFactor::new(0), Err(WipeError::ConfigError(_))));
}
