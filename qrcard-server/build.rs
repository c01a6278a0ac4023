//! Build script for qrcard-server
//!
//! Stamps the binary with the values logged at startup:
//! - `GIT_HASH`: `git describe` of the source tree, `-dirty` when modified
//! - `BUILD_TIMESTAMP`: UTC, RFC 3339
//! - `BUILD_PROFILE`: cargo profile
//!
//! Packagers without a git checkout can set `QRCARD_BUILD_REVISION`.

use std::path::Path;
use std::process::Command;

fn git_revision() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--always", "--dirty", "--abbrev=8"])
        .output()
        .ok()
        .filter(|output| output.status.success())?;
    let revision = String::from_utf8(output.stdout).ok()?;
    Some(revision.trim().to_string()).filter(|r| !r.is_empty())
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=QRCARD_BUILD_REVISION");
    // Only track git state when building from a checkout
    for tracked in ["../.git/HEAD", "../.git/index"] {
        if Path::new(tracked).exists() {
            println!("cargo:rerun-if-changed={}", tracked);
        }
    }

    let revision = std::env::var("QRCARD_BUILD_REVISION")
        .ok()
        .filter(|r| !r.trim().is_empty())
        .or_else(git_revision)
        .unwrap_or_else(|| "unknown".to_string());

    let build_timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    println!("cargo:rustc-env=GIT_HASH={}", revision);
    println!("cargo:rustc-env=BUILD_TIMESTAMP={}", build_timestamp);
    println!("cargo:rustc-env=BUILD_PROFILE={}", profile);
}
