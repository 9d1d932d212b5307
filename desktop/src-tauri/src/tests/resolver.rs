use crate::server::resolver::{candidate_dirs, resolve_in, well_known_dirs};

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// An empty file marked executable.
fn touch(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, "").unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
    path
}

fn path_var(dirs: &[&Path]) -> OsString {
    std::env::join_paths(dirs).unwrap()
}

// =========================================================================
// Candidate directories
// =========================================================================

#[test]
fn given_repeated_and_blank_entries_when_listing_candidates_then_deduplicated_in_order() {
    let a = PathBuf::from("/opt/a");
    let b = PathBuf::from("/opt/b");
    let c = PathBuf::from("/opt/c");
    let path = path_var(&[&a, &b, &a]);

    let dirs = candidate_dirs(Some(&path), &[b.clone(), PathBuf::new(), c.clone()]);

    assert_eq!(dirs, vec![a, b, c]);
}

#[test]
fn given_no_path_when_listing_candidates_then_extra_dirs_only() {
    let extra = vec![PathBuf::from("/opt/node/bin")];

    assert_eq!(candidate_dirs(None, &extra), extra);
}

// =========================================================================
// Resolution
// =========================================================================

#[cfg(unix)]
#[test]
fn given_launcher_in_extra_dir_when_resolved_then_found() {
    let dir = TempDir::new().unwrap();
    let expected = touch(dir.path(), "npx");

    let found = resolve_in("npx", None, &[dir.path().to_path_buf()]);

    assert_eq!(found, Some(expected));
}

#[cfg(unix)]
#[test]
fn given_launcher_on_path_and_extra_dir_when_resolved_then_path_wins() {
    let on_path = TempDir::new().unwrap();
    let extra = TempDir::new().unwrap();
    let expected = touch(on_path.path(), "npx");
    touch(extra.path(), "npx");
    let path = path_var(&[on_path.path()]);

    let found = resolve_in("npx", Some(&path), &[extra.path().to_path_buf()]);

    assert_eq!(found, Some(expected));
}

#[cfg(unix)]
#[test]
fn given_file_without_execute_bit_when_resolved_then_skipped() {
    let plain = TempDir::new().unwrap();
    let runnable = TempDir::new().unwrap();
    std::fs::write(plain.path().join("npx"), "").unwrap();
    let expected = touch(runnable.path(), "npx");

    let found = resolve_in(
        "npx",
        None,
        &[plain.path().to_path_buf(), runnable.path().to_path_buf()],
    );

    assert_eq!(found, Some(expected));
}

#[test]
fn given_directory_with_launcher_name_when_resolved_then_skipped() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("npx")).unwrap();
    std::fs::create_dir(dir.path().join("npx.cmd")).unwrap();

    assert_eq!(resolve_in("npx", None, &[dir.path().to_path_buf()]), None);
}

#[test]
fn given_launcher_nowhere_when_resolved_then_none() {
    let dir = TempDir::new().unwrap();
    let path = path_var(&[dir.path()]);

    assert_eq!(
        resolve_in("vk-no-such-launcher", Some(&path), &[dir.path().to_path_buf()]),
        None
    );
}

// =========================================================================
// Well-known locations
// =========================================================================

#[cfg(unix)]
#[test]
fn given_unix_host_when_listing_well_known_dirs_then_usr_local_bin_included() {
    assert!(well_known_dirs().contains(&PathBuf::from("/usr/local/bin")));
}
