//! Locates the server launcher on disk.
//!
//! GUI apps on macOS and Linux often start with a minimal `PATH`, so the
//! search covers the usual Node.js install locations as well.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::PathBuf;

use tracing::{debug, warn};

/// Find `name` in `PATH` or any of `extra_dirs`.
pub fn resolve(name: &str, extra_dirs: &[PathBuf]) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH");
    resolve_in(name, path_var.as_deref(), extra_dirs)
}

/// Find `name` using an explicit `PATH` value.
///
/// Directories are searched in `candidate_dirs` order. On Windows the
/// `PATHEXT` suffixes are tried as well.
pub fn resolve_in(name: &str, path_var: Option<&OsStr>, extra_dirs: &[PathBuf]) -> Option<PathBuf> {
    // An entry containing the list separator cannot be joined; skip it alone.
    let dirs: Vec<PathBuf> = candidate_dirs(path_var, extra_dirs)
        .into_iter()
        .filter(|dir| {
            let joinable = std::env::join_paths([dir]).is_ok();
            if !joinable {
                warn!("Skipping unusable search directory {}", dir.display());
            }
            joinable
        })
        .collect();
    if dirs.is_empty() {
        return None;
    }

    let search_path = std::env::join_paths(&dirs).ok()?;
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    match which::which_in(name, Some(search_path), cwd) {
        Ok(path) => Some(path),
        Err(e) => {
            debug!("'{name}' not found in {} director(ies): {e}", dirs.len());
            None
        }
    }
}

/// `PATH` entries followed by `extra_dirs`, without blanks or repeats.
pub fn candidate_dirs(path_var: Option<&OsStr>, extra_dirs: &[PathBuf]) -> Vec<PathBuf> {
    let from_path: Vec<PathBuf> = path_var
        .map(|p| std::env::split_paths(p).collect())
        .unwrap_or_default();

    let mut seen = HashSet::new();
    from_path
        .into_iter()
        .chain(extra_dirs.iter().cloned())
        .filter(|dir| !dir.as_os_str().is_empty())
        .filter(|dir| seen.insert(dir.clone()))
        .collect()
}

/// Common Node.js install locations for this platform.
pub fn well_known_dirs() -> Vec<PathBuf> {
    let mut found = Vec::new();

    #[cfg(target_os = "macos")]
    found.extend(["/opt/homebrew/bin", "/usr/local/bin", "/usr/bin"].map(PathBuf::from));

    #[cfg(all(unix, not(target_os = "macos")))]
    found.extend(["/usr/local/bin", "/usr/bin", "/bin"].map(PathBuf::from));

    #[cfg(unix)]
    if let Some(home) = dirs::home_dir() {
        found.push(home.join(".volta").join("bin"));
        found.push(home.join(".npm-global").join("bin"));
        found.push(home.join(".local").join("bin"));
    }

    #[cfg(windows)]
    {
        if let Some(program_files) = std::env::var_os("ProgramFiles") {
            found.push(PathBuf::from(program_files).join("nodejs"));
        }
        if let Some(roaming) = dirs::data_dir() {
            found.push(roaming.join("npm"));
        }
    }

    found
}
