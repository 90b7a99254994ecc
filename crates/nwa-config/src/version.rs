//! Version information

use std::process::Command;

/// Version of the NWA crates
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Commit hash of the git checkout the process runs in, if any.
pub fn git_commit_hash() -> Option<String> {
    let output = match Command::new("git").args(["rev-parse", "HEAD"]).output() {
        Ok(output) => output,
        Err(e) => {
            tracing::error!(error = %e, "Could not get git commit hash");
            return None;
        }
    };

    if !output.status.success() {
        tracing::error!(
            status = %output.status,
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "Could not get git commit hash"
        );
        return None;
    }

    let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!hash.is_empty()).then_some(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert_eq!(VERSION.split('.').count(), 3);
    }

    #[test]
    fn test_git_commit_hash_shape() {
        // Only meaningful inside a git checkout with git installed
        if let Some(hash) = git_commit_hash() {
            assert!(hash.len() >= 40);
            assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        }
    }
}
