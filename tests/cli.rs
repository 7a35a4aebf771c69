//! CLI behavior that does not need a browser.

#![allow(deprecated)] // Command::cargo_bin
#![allow(clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn html_snapshot(browsers: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("html-snapshot").unwrap();
    cmd.env("PLAYWRIGHT_BROWSERS_PATH", browsers.path())
        .env_remove("CHROME")
        .env("RUST_LOG", "warn");
    cmd
}

#[test]
fn help_lists_every_option() {
    let browsers = TempDir::new().unwrap();
    html_snapshot(&browsers)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--output"))
        .stdout(predicate::str::contains("--width"))
        .stdout(predicate::str::contains("--height"))
        .stdout(predicate::str::contains("--delay"))
        .stdout(predicate::str::contains("--no-full-page"))
        .stdout(predicate::str::contains("--no-auto-install"));
}

#[test]
fn missing_input_exits_with_status_one() {
    let browsers = TempDir::new().unwrap();
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("missing.html");

    html_snapshot(&browsers)
        .arg(&input)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("HTML file not found"));

    assert!(!dir.path().join("missing.png").exists());
}

#[test]
fn missing_input_is_checked_before_the_runtime() {
    let browsers = TempDir::new().unwrap();
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out").join("shot.png");

    html_snapshot(&browsers)
        .arg(dir.path().join("missing.html"))
        .arg("--no-auto-install")
        .arg("--output")
        .arg(&output)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("HTML file not found"))
        .stderr(predicate::str::contains("Chromium").not());

    assert!(!output.exists());
    assert!(!output.parent().unwrap().exists());
}

#[test]
fn no_auto_install_without_runtime_asks_for_manual_install() {
    let browsers = TempDir::new().unwrap();
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("page.html");
    fs::write(&input, "<h1>Hello</h1>").unwrap();

    html_snapshot(&browsers)
        .arg(&input)
        .arg("--no-auto-install")
        .assert()
        .failure()
        .stderr(predicate::str::contains("playwright install chromium"));

    assert!(!dir.path().join("page.png").exists());
}

#[test]
fn unknown_browser_path_is_reported() {
    let browsers = TempDir::new().unwrap();
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("page.html");
    fs::write(&input, "<p>x</p>").unwrap();

    html_snapshot(&browsers)
        .arg(&input)
        .arg("--browser")
        .arg(dir.path().join("no-such-chrome"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Browser executable not found"));
}

#[test]
fn zero_width_is_rejected() {
    let browsers = TempDir::new().unwrap();
    html_snapshot(&browsers)
        .args(["page.html", "--width", "0"])
        .assert()
        .code(2);
}

#[test]
fn negative_delay_is_rejected() {
    let browsers = TempDir::new().unwrap();
    html_snapshot(&browsers)
        .args(["page.html", "--delay=-1"])
        .assert()
        .code(2);
}

#[test]
fn missing_installer_is_reported() {
    let browsers = TempDir::new().unwrap();
    let empty_path = TempDir::new().unwrap();
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("page.html");
    fs::write(&input, "<p>x</p>").unwrap();

    html_snapshot(&browsers)
        .env("PATH", empty_path.path())
        .arg(&input)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Playwright CLI not found"));

    assert!(!dir.path().join("page.png").exists());
}

#[cfg(unix)]
#[test]
fn failing_installer_asks_for_manual_install() {
    use std::os::unix::fs::PermissionsExt;

    let browsers = TempDir::new().unwrap();
    let bin = TempDir::new().unwrap();
    let installer = bin.path().join("playwright");
    fs::write(&installer, "#!/bin/sh\nexit 3\n").unwrap();
    fs::set_permissions(&installer, fs::Permissions::from_mode(0o755)).unwrap();

    let dir = TempDir::new().unwrap();
    let input = dir.path().join("page.html");
    fs::write(&input, "<p>x</p>").unwrap();

    html_snapshot(&browsers)
        .env("PATH", bin.path())
        .arg(&input)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Automatic Chromium install failed"))
        .stderr(predicate::str::contains("npx playwright install chromium"));
}

#[test]
fn output_parent_directories_are_created() {
    let browsers = TempDir::new().unwrap();
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("page.html");
    fs::write(&input, "<p>x</p>").unwrap();
    let output = dir.path().join("shots").join("nested").join("page.png");

    // No runtime, so the capture fails after the output directory is made.
    html_snapshot(&browsers)
        .arg(&input)
        .arg("--no-auto-install")
        .arg("--output")
        .arg(&output)
        .assert()
        .code(1);

    assert!(output.parent().unwrap().is_dir());
    assert!(!output.exists());
}
