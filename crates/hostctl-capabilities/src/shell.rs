//! Platform shell and executable resolution.

use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
};

/// Returns the shell program and its "run this string" flag.
///
/// - Windows: `("cmd", "/C")`
/// - Unix-like: the user's `$SHELL` if it is an absolute executable, else `/bin/sh`
#[must_use]
pub fn get_shell_command() -> (String, &'static str) {
    if cfg!(windows) {
        ("cmd".into(), "/C")
    } else {
        let shell = user_shell(std::env::var_os("SHELL").as_deref())
            .unwrap_or_else(|| PathBuf::from("/bin/sh"));
        (shell.to_string_lossy().into_owned(), "-c")
    }
}

/// Resolve an executable by name.
///
/// Absolute paths are accepted as-is when they point at a file; anything else
/// is looked up on `PATH`.
pub async fn resolve_executable_path(executable: &str) -> Option<PathBuf> {
    if executable.trim().is_empty() {
        return None;
    }

    let path = Path::new(executable);
    if path.is_absolute() {
        return path.is_file().then(|| path.to_path_buf());
    }

    which_async(executable).await
}

async fn which_async(executable: &str) -> Option<PathBuf> {
    let executable = executable.to_string();
    tokio::task::spawn_blocking(move || which::which(executable))
        .await
        .ok()
        .and_then(Result::ok)
}

/// Expand a leading `~` to the user's home directory.
#[must_use]
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

/// The user's `$SHELL` when it is an absolute path to a file.
fn user_shell(var: Option<&OsStr>) -> Option<PathBuf> {
    let path = Path::new(var?);
    (path.is_absolute() && path.is_file()).then(|| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_shell_path_rejected() {
        assert!(user_shell(Some(OsStr::new("bash"))).is_none());
        assert!(user_shell(None).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_sh_accepted() {
        assert_eq!(user_shell(Some(OsStr::new("/bin/sh"))), Some(PathBuf::from("/bin/sh")));
        assert_eq!(get_shell_command().1, "-c");
    }

    #[test]
    fn test_expand_home_leaves_plain_paths() {
        assert_eq!(expand_home(Path::new("a/b.txt")), PathBuf::from("a/b.txt"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home(Path::new("~/notes.txt")), home.join("notes.txt"));
        }
    }

    #[tokio::test]
    async fn test_resolve_blank_and_missing() {
        assert!(resolve_executable_path("  ").await.is_none());
        assert!(
            resolve_executable_path("definitely-not-a-real-binary-hostctl")
                .await
                .is_none()
        );
    }
}
