use std::path::PathBuf;
use std::process::Command;

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn main() {
    // Short commit hash baked into the reported version
    let git_hash = git(&["rev-parse", "--short", "HEAD"]).unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=GIT_HASH={}", git_hash);

    // Outside a checkout there is no HEAD to watch
    let head = git(&["rev-parse", "--git-path", "HEAD"]).map(PathBuf::from);
    match head {
        Some(head) if head.exists() => {
            let head = std::fs::canonicalize(&head).unwrap_or(head);
            println!("cargo:rerun-if-changed={}", head.display());
            if let Some(refs) = git(&["rev-parse", "--symbolic-full-name", "HEAD"]) {
                if let Some(path) = git(&["rev-parse", "--git-path", &refs]) {
                    println!("cargo:rerun-if-changed={}", path);
                }
            }
        }
        _ => println!("cargo:rerun-if-changed=build.rs"),
    }
}
