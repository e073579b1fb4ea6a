use std::{env, path::Path, process::Command};

/// Build-stamp variables read back by `career-embed --version`.
const STAMPS: [(&str, fn() -> String); 3] = [
    ("CAREER_BUILD_GIT_TAG", release_tag),
    ("CAREER_BUILD_GIT_COMMIT", short_commit),
    ("CAREER_BUILD_GIT_DIRTY", worktree_dirty),
];

fn main() {
    if Path::new("../.git/HEAD").exists() {
        println!("cargo:rerun-if-changed=../.git/HEAD");
    }
    for (name, detect) in STAMPS {
        println!("cargo:rerun-if-env-changed={name}");
        let value = env::var(name)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(detect);
        println!("cargo:rustc-env={name}={value}");
    }
}

fn release_tag() -> String {
    git(&["describe", "--tags", "--exact-match"]).unwrap_or_else(|| "untagged".into())
}

fn short_commit() -> String {
    git(&["rev-parse", "--short=12", "HEAD"]).unwrap_or_else(|| "unknown".into())
}

fn worktree_dirty() -> String {
    let changed = git(&["status", "--porcelain", "--untracked-files=no"])
        .is_some_and(|status| !status.is_empty());
    changed.to_string()
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
}
