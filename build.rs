use std::env;
use std::process::Command;

/// Short hash of the checked-out commit, if built from a git work tree
fn git_short_sha() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!sha.is_empty()).then_some(sha)
}

fn main() {
    println!("cargo:rerun-if-env-changed=XAJCAL_GIT_SHA");
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs");

    // an explicit value wins, for builds outside a work tree (packages, CI)
    let sha = env::var("XAJCAL_GIT_SHA")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(git_short_sha);

    if let Some(sha) = sha {
        println!("cargo:rustc-env=XAJCAL_GIT_SHA={}", sha);
    }
}
