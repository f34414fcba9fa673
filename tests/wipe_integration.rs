use skipwipe::bench::Benchmarker;
use skipwipe::io::{probe_device_size, BlockTarget, DeviceHandle};
use skipwipe::wipe::{NoProgress, ProgressUpdate, SkipFactor, WipeEngine};
use skipwipe::WipeError;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;

fn zeroed_device(dir: &Path, len: u64) -> PathBuf {
    let path = dir.join("device.img");
    File::create(&path).unwrap().set_len(len).unwrap();
    path
}

fn is_zero(bytes: &[u8]) -> bool {
    bytes.iter().all(|&b| b == 0)
}

#[test]
fn test_full_wipe_with_unaligned_tail() {
    let temp_dir = tempdir().unwrap();
    let path = zeroed_device(temp_dir.path(), 20000);
    let size = probe_device_size(&path).unwrap();
    assert_eq!(size, 20000);

    let summary = WipeEngine::new(4096, SkipFactor::FULL)
        .run_on_path(&path, size, &NoProgress)
        .unwrap();

    assert_eq!(summary.bytes_processed, 20000);
    assert_eq!(summary.bytes_written, 20000);
    assert_eq!(summary.bytes_skipped, 0);
    assert!(summary.is_full_coverage());
    assert!(summary.sync_warning.is_none());

    let contents = fs::read(&path).unwrap();
    assert_eq!(contents.len(), 20000);
    for block in contents.chunks(4096) {
        assert!(!is_zero(block));
    }
}

#[test]
fn test_sampled_wipe_leaves_skipped_regions() {
    let temp_dir = tempdir().unwrap();
    let path = zeroed_device(temp_dir.path(), 100_000);

    let summary = WipeEngine::new(4096, SkipFactor::new(5).unwrap())
        .run_on_path(&path, 100_000, &NoProgress)
        .unwrap();

    assert_eq!(summary.bytes_processed, 100_000);
    assert_eq!(summary.bytes_written, 5 * 4096);
    assert_eq!(summary.bytes_skipped, 100_000 - 5 * 4096);
    assert!((summary.coverage_percentage() - 20.48).abs() < 1e-9);

    let contents = fs::read(&path).unwrap();
    assert_eq!(contents.len(), 100_000);

    let written_offsets = [0usize, 20480, 40960, 61440, 81920];
    for &offset in &written_offsets {
        assert!(!is_zero(&contents[offset..offset + 4096]));
    }
    for pair in written_offsets.windows(2) {
        assert!(is_zero(&contents[pair[0] + 4096..pair[1]]));
    }
    assert!(is_zero(&contents[81920 + 4096..]));
}

#[test]
fn test_progress_reaches_completion() {
    let temp_dir = tempdir().unwrap();
    let path = zeroed_device(temp_dir.path(), 64 * 1024);
    let sink = Mutex::new(Vec::<ProgressUpdate>::new());

    WipeEngine::new(4096, SkipFactor::new(2).unwrap())
        .with_update_interval(Duration::ZERO)
        .run_on_path(&path, 64 * 1024, &sink)
        .unwrap();

    let updates = sink.into_inner().unwrap();
    assert!(!updates.is_empty());
    for pair in updates.windows(2) {
        assert!(pair[1].sample.bytes_processed >= pair[0].sample.bytes_processed);
        assert!(pair[1].sample.elapsed >= pair[0].sample.elapsed);
    }
    let last = updates.last().unwrap();
    assert!(last.is_final);
    assert_eq!(last.sample.bytes_processed, 64 * 1024);
    assert_eq!(last.sample.bytes_written, 32 * 1024);
}

#[test]
fn test_cancelled_before_start_writes_nothing() {
    let temp_dir = tempdir().unwrap();
    let path = zeroed_device(temp_dir.path(), 32 * 1024);

    let result = WipeEngine::new(4096, SkipFactor::FULL)
        .with_cancel_flag(Arc::new(AtomicBool::new(true)))
        .run_on_path(&path, 32 * 1024, &NoProgress);

    match result {
        Err(WipeError::Cancelled {
            bytes_processed,
            bytes_written,
        }) => {
            assert_eq!(bytes_processed, 0);
            assert_eq!(bytes_written, 0);
        }
        other => panic!("expected Cancelled, got {:?}", other),
    }
    assert!(is_zero(&fs::read(&path).unwrap()));
}

#[test]
fn test_benchmark_restores_offset_on_real_file() {
    let temp_dir = tempdir().unwrap();
    let path = zeroed_device(temp_dir.path(), 1024 * 1024);

    let mut handle = DeviceHandle::open(&path).unwrap();
    let size = handle.probe_size().unwrap();
    handle.seek_to(8192).unwrap();

    let report = Benchmarker::new(4096)
        .measure(&mut handle, size, &NoProgress)
        .unwrap();

    assert_eq!(report.bytes_written, 256 * 1024);
    assert!(report.bytes_per_sec > 0.0);
    assert_eq!(handle.position().unwrap(), 8192);
    handle.close();

    let contents = fs::read(&path).unwrap();
    assert_eq!(contents.len(), 1024 * 1024);
    assert!(is_zero(&contents[..8192]));
    assert!(!is_zero(&contents[8192..8192 + 4096]));
    assert!(is_zero(&contents[8192 + 256 * 1024..]));
}

#[test]
fn test_auto_skip_from_measured_speed() {
    let temp_dir = tempdir().unwrap();
    let path = zeroed_device(temp_dir.path(), 1024 * 1024);

    let report = Benchmarker::new(4096)
        .measure_path(&path, &NoProgress)
        .unwrap();
    let skip = SkipFactor::for_target(
        1024 * 1024,
        report.bytes_per_sec,
        Duration::from_millis(1),
        4096,
    );
    assert!(skip.get() >= 1 && skip.get() <= 256);

    let summary = WipeEngine::new(4096, skip)
        .run_on_path(&path, 1024 * 1024, &NoProgress)
        .unwrap();
    assert_eq!(summary.skip_factor, skip.get());
    assert_eq!(summary.bytes_processed, 1024 * 1024);
}
