//! End-to-end captures. These launch a real Chromium, resolved from `CHROME`
//! or the Playwright browser cache:
//!
//! ```bash
//! cargo test --test capture -- --ignored
//! ```

#![allow(deprecated)] // Command::cargo_bin
#![allow(clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const PAGE: &str = r#"<!DOCTYPE html>
<html>
<body style="margin: 0; background: #f4f4f4;">
    <div style="height: 2400px; background: linear-gradient(#d32f2f, #1976d2);"></div>
</body>
</html>"#;

fn write_page(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("page.html");
    fs::write(&path, PAGE).unwrap();
    path
}

fn html_snapshot() -> Command {
    let mut cmd = Command::cargo_bin("html-snapshot").unwrap();
    cmd.arg("--no-auto-install");
    cmd
}

#[test]
#[ignore = "requires a Chromium runtime"]
fn default_capture_writes_png_next_to_input() {
    let dir = TempDir::new().unwrap();
    let input = write_page(dir.path());

    html_snapshot()
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved screenshot to"));

    let image = image::open(dir.path().join("page.png")).unwrap();
    assert_eq!(image.width(), 1400);
    // Full page: the whole 2400px document, not just the 900px viewport.
    assert!(image.height() >= 2400);
}

#[test]
#[ignore = "requires a Chromium runtime"]
fn viewport_capture_matches_requested_size() {
    let dir = TempDir::new().unwrap();
    let input = write_page(dir.path());
    let output = dir.path().join("nested").join("deeper").join("shot.png");

    html_snapshot()
        .arg(&input)
        .arg("--output")
        .arg(&output)
        .args(["--width", "640", "--height", "480", "--no-full-page"])
        .assert()
        .success();

    let image = image::open(&output).unwrap();
    assert_eq!((image.width(), image.height()), (640, 480));
}

#[test]
#[ignore = "requires a Chromium runtime"]
fn scale_factor_multiplies_pixels() {
    let dir = TempDir::new().unwrap();
    let input = write_page(dir.path());
    let output = dir.path().join("hidpi.png");

    html_snapshot()
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .args(["--width", "300", "--height", "200", "--no-full-page", "--scale", "2"])
        .assert()
        .success();

    let image = image::open(&output).unwrap();
    assert_eq!((image.width(), image.height()), (600, 400));
}

#[test]
#[ignore = "requires a Chromium runtime"]
fn repeated_runs_overwrite_the_same_output() {
    let dir = TempDir::new().unwrap();
    let input = write_page(dir.path());
    let output = dir.path().join("same.png");

    for _ in 0..2 {
        html_snapshot()
            .arg(&input)
            .arg("-o")
            .arg(&output)
            .args(["--delay", "0.1", "--wait-until", "load"])
            .assert()
            .success();
        assert!(output.is_file());
    }
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
}
