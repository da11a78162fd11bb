//! Environment sensing: home resolution, container/WSL detection, and the
//! package managers worth recommending on this machine.
use std::path::{Path, PathBuf};

use anyhow::Result;

/// Resolve the user's home directory from the environment.
///
/// Windows prefers `USERPROFILE` and falls back to `HOMEDRIVE`+`HOMEPATH`;
/// elsewhere `HOME` is authoritative.
///
/// # Errors
///
/// Returns an error when no home-related variable is set.
pub fn home_dir() -> Result<PathBuf> {
    if cfg!(windows) {
        if let Ok(profile) = std::env::var("USERPROFILE")
            && !profile.trim().is_empty()
        {
            return Ok(PathBuf::from(profile));
        }
        if let (Ok(drive), Ok(path)) = (std::env::var("HOMEDRIVE"), std::env::var("HOMEPATH")) {
            return Ok(PathBuf::from(format!("{drive}{path}")));
        }
    }
    match std::env::var("HOME") {
        Ok(home) if !home.trim().is_empty() => Ok(PathBuf::from(home)),
        _ => anyhow::bail!("ホームディレクトリを特定できません (HOME/USERPROFILE 未設定)"),
    }
}

/// Whether we appear to be inside a container.
///
/// `CODESPACES=true` or `REMOTE_CONTAINERS=true`, or the `/.dockerenv`
/// marker file.
#[must_use]
pub fn is_container() -> bool {
    if env_is_true("CODESPACES") || env_is_true("REMOTE_CONTAINERS") {
        return true;
    }
    Path::new("/.dockerenv").exists()
}

/// Whether we appear to be inside WSL, based on `/proc/version`.
#[must_use]
pub fn is_wsl() -> bool {
    let Ok(version) = std::fs::read_to_string("/proc/version") else {
        return false;
    };
    let version = version.to_lowercase();
    version.contains("microsoft") || version.contains("wsl")
}

/// Whether this machine uses apt (Debian/Ubuntu family).
#[must_use]
pub fn is_debian_like() -> bool {
    Path::new("/usr/bin/apt-get").exists()
}

/// Package managers worth enabling by default on this machine.
///
/// Cross-platform managers are always suggested; system managers only when
/// their marker is present, and snap never inside a container (snapd does
/// not run there).
#[must_use]
pub fn recommended_managers() -> Vec<&'static str> {
    let mut managers = vec!["npm", "cargo"];
    if is_debian_like() {
        managers.push("apt");
    }
    if Path::new("/usr/bin/flatpak").exists() {
        managers.push("flatpak");
    }
    if !is_container() && Path::new("/usr/bin/snap").exists() {
        managers.push("snap");
    }
    if cfg!(windows) {
        managers.push("winget");
    }
    managers
}

/// Normalise an environment variable key for equality comparison.
///
/// Windows environment variable names are case-insensitive, so keys fold to
/// upper case there; elsewhere comparison is exact.
#[must_use]
pub fn normalize_env_key(key: &str) -> String {
    if cfg!(windows) {
        key.to_uppercase()
    } else {
        key.to_string()
    }
}

fn env_is_true(key: &str) -> bool {
    std::env::var(key).is_ok_and(|value| value == "true")
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn recommended_managers_include_cross_platform_tools() {
        let managers = recommended_managers();
        assert!(managers.contains(&"npm"));
        assert!(managers.contains(&"cargo"));
    }

    #[test]
    fn recommended_managers_include_apt_on_debian_like() {
        if is_debian_like() {
            assert!(recommended_managers().contains(&"apt"));
        }
    }

    #[test]
    fn is_wsl_does_not_panic() {
        // Result depends on the host; only the read path is exercised.
        let _ = is_wsl();
    }

    #[test]
    fn is_container_does_not_panic() {
        let _ = is_container();
    }

    #[cfg(not(windows))]
    #[test]
    fn normalize_env_key_is_exact_on_unix() {
        assert_eq!(normalize_env_key("Path"), "Path");
        assert_ne!(normalize_env_key("Path"), normalize_env_key("PATH"));
    }

    #[cfg(windows)]
    #[test]
    fn normalize_env_key_folds_on_windows() {
        assert_eq!(normalize_env_key("Path"), "PATH");
    }

    #[cfg(not(windows))]
    #[test]
    fn home_dir_reads_home() {
        // HOME is set in any sane test environment.
        if std::env::var("HOME").is_ok() {
            assert!(home_dir().is_ok());
        }
    }
}
