#![allow(dead_code)]

pub mod pdf_server;

use std::path::Path;

use gztarchiver::config::Settings;

/// A body that passes artifact validation with `min_file_size` of 64.
pub fn pdf_body(tag: &str) -> Vec<u8> {
    let mut body = format!("%PDF-1.7\n% {}\n", tag).into_bytes();
    body.resize(256, b'.');
    body
}

/// Settings suited to a local test server: no pacing, small size floor.
pub fn test_settings(archive_dir: &Path) -> Settings {
    Settings {
        archive_dir: archive_dir.to_path_buf(),
        concurrency: 2,
        request_delay_ms: 0,
        request_timeout_secs: 5,
        max_retries: 3,
        min_file_size: 64,
        batch_size: 100,
        ..Settings::default()
    }
}
