//! Build script for needs-approval: embeds a version string for `--version`.
//!
//! The string has the form `<pkg-version> (<git-version>) <rustc-version>`.
//! `<git-version>` comes from `git describe --tags --always --dirty` when a
//! tag is reachable. Without tags it falls back to a pseudo-version
//! `v<pkg-version>-<timestamp>-<commit>[+dirty]`, where the timestamp is the
//! commit time for clean trees and the build time otherwise.

use std::process::Command;

use chrono::{DateTime, Utc};

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

fn main() {
    for path in ["src", "build.rs", "Cargo.toml", "Cargo.lock"] {
        println!("cargo:rerun-if-changed={path}");
    }

    println!("cargo:rustc-env=BUILD_INFO_HUMAN={}", version_line());
}

fn run(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// `None` when git is unavailable or this is not a checkout.
fn tree_is_dirty() -> Option<bool> {
    // `cargo install --git` drops .cargo-ok into the checkout.
    run("git", &["status", "--porcelain"])
        .map(|status| status.lines().any(|line| line.get(3..) != Some(".cargo-ok")))
        .or_else(|| run("git", &["rev-parse", "--git-dir"]).map(|_| false))
}

fn pseudo_version() -> String {
    let pkg_version = env!("CARGO_PKG_VERSION");
    let commit = run("git", &["rev-parse", "--short=12", "HEAD"])
        .unwrap_or_else(|| "unknown".to_string());
    let dirty = tree_is_dirty();

    let built_at = || Utc::now().format(TIMESTAMP_FORMAT).to_string();
    let timestamp = match dirty {
        Some(false) => run("git", &["log", "-1", "--format=%ct"])
            .and_then(|secs| secs.parse::<i64>().ok())
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .map(|at| at.format(TIMESTAMP_FORMAT).to_string())
            .unwrap_or_else(built_at),
        Some(true) | None => built_at(),
    };
    let suffix = if dirty == Some(true) { "+dirty" } else { "" };

    format!("v{pkg_version}-{timestamp}-{commit}{suffix}")
}

fn git_version() -> String {
    match run("git", &["describe", "--tags", "--always", "--dirty"]) {
        // A bare commit hash means no tag was reachable.
        Some(described) if described.contains('v') || described.contains("-g") => described,
        _ => pseudo_version(),
    }
}

fn version_line() -> String {
    let mut parts = vec![env!("CARGO_PKG_VERSION").to_string(), format!("({})", git_version())];
    parts.extend(run("rustc", &["--version"]));
    parts.join(" ")
}
