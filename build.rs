// SPDX-License-Identifier: GPL-3.0-only

use std::process::Command;

fn main() {
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");
    println!("cargo::rerun-if-env-changed=CAMERA_COMPOSITOR_VERSION");

    // Packagers can pin the version string instead of relying on git
    let version = std::env::var("CAMERA_COMPOSITOR_VERSION").unwrap_or_else(|_| git_version());

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

/// Build a version string of the form `0.1.0-abcdef1` (exact tag) or
/// `0.1.0-dirty-abcdef1` (commits after the last tag).
fn git_version() -> String {
    let commit = git(&["rev-parse", "--short", "HEAD"]);
    let described = git(&["describe", "--tags", "--always", "--match", "v*"]);

    let Some(described) = described else {
        return commit.unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());
    };
    let described = described.strip_prefix('v').unwrap_or(&described);

    // "0.1.0-5-gabcdef1" -> ["gabcdef1", "5", "0.1.0"]
    let parts: Vec<&str> = described.rsplitn(3, '-').collect();
    match parts.as_slice() {
        [hash, _, base] => {
            let hash = hash.strip_prefix('g').unwrap_or(hash);
            format!("{}-dirty-{}", base, hash)
        }
        _ => match commit {
            Some(commit) if commit != described => format!("{}-{}", described, commit),
            _ => described.to_string(),
        },
    }
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!text.is_empty()).then_some(text)
}
