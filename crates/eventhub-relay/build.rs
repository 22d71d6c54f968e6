use std::process::Command;

/// `BUILD_VERSION` for the startup log: the package version, tagged with the
/// commit it was built from when git knows it (`0.1.0+3f2a9c1`).
fn main() {
    let pkg = std::env::var("CARGO_PKG_VERSION").unwrap_or_default();
    let commit = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|hash| hash.trim().to_owned())
        .filter(|hash| !hash.is_empty());

    let version = match commit {
        Some(hash) => format!("{pkg}+{hash}"),
        None => pkg,
    };
    println!("cargo:rustc-env=BUILD_VERSION={version}");
    // Only rerun when the checkout moves, or when this script changes.
    let head = std::path::Path::new("../../.git/HEAD");
    if head.exists() {
        println!("cargo:rerun-if-changed={}", head.display());
    }
    println!("cargo:rerun-if-changed=build.rs");
}
