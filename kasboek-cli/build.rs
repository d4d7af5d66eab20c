//! Stamps `--version` with the commit the binary was built from.
//!
//! Packaged source has no `.git`, so `KASBOEK_BUILD_SHA` may be set by the
//! packager instead.

use std::path::Path;
use std::process::Command;

const SHA_ENV: &str = "KASBOEK_BUILD_SHA";

fn git(repo: &Path, args: &[&str]) -> Option<String> {
    let out = Command::new("git").arg("-C").arg(repo).args(args).output().ok()?;
    if !out.status.success() {
        return None;
    }
    let text = String::from_utf8(out.stdout).ok()?;
    Some(text.trim().to_owned())
}

fn build_sha(repo: &Path) -> String {
    if let Some(sha) = std::env::var(SHA_ENV).ok().filter(|s| !s.trim().is_empty()) {
        return sha.trim().to_owned();
    }
    let Some(sha) = git(repo, &["rev-parse", "--short=10", "HEAD"]).filter(|s| !s.is_empty()) else {
        return "unknown".to_owned();
    };
    match git(repo, &["status", "--porcelain", "--untracked-files=no"]) {
        Some(changes) if !changes.is_empty() => format!("{sha}-dirty"),
        _ => sha,
    }
}

fn main() {
    let manifest_dir = std::env::var_os("CARGO_MANIFEST_DIR").unwrap_or_else(|| ".".into());
    let workspace = Path::new(&manifest_dir).join("..");

    println!("cargo:rustc-env={SHA_ENV}={}", build_sha(&workspace));
    println!("cargo:rerun-if-env-changed={SHA_ENV}");
    println!("cargo:rerun-if-changed=../.git/HEAD");
    println!("cargo:rerun-if-changed=../.git/index");
}
