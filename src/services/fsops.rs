//! Local filesystem primitives shared by the orchestrator and rollback
//! manager: structure-preserving moves and platform-specific symlinks.

use camino::Utf8Path;
use std::fs;
use std::io;

/// Move a file or directory, preserving structure. Tries a rename first and
/// falls back to copy + remove for cross-device moves.
pub fn move_path(from: &Utf8Path, to: &Utf8Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            let meta = fs::symlink_metadata(from)?;
            if meta.is_dir() {
                copy_dir_all(from, to)?;
                fs::remove_dir_all(from)?;
            } else {
                fs::copy(from, to)?;
                fs::remove_file(from)?;
            }
            Ok(())
        }
    }
}

/// Recursive directory copy. Symlinks inside the tree are re-created, not
/// followed.
pub fn copy_dir_all(from: &Utf8Path, to: &Utf8Path) -> io::Result<()> {
    fs::create_dir_all(to)?;
    for entry in from.read_dir_utf8()? {
        let entry = entry?;
        let dest = to.join(entry.file_name());
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            copy_dir_all(entry.path(), &dest)?;
        } else if file_type.is_symlink() {
            let link_target = fs::read_link(entry.path())?;
            create_symlink_std(&link_target, dest.as_std_path())?;
        } else {
            fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}

/// Create a directory symlink at `link` pointing to `target`.
pub fn create_symlink(target: &Utf8Path, link: &Utf8Path) -> io::Result<()> {
    create_symlink_std(target.as_std_path(), link.as_std_path())
}

fn create_symlink_std(target: &std::path::Path, link: &std::path::Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target, link)
    }
    #[cfg(windows)]
    {
        std::os::windows::fs::symlink_dir(target, link)
    }
}

/// Remove a symlink without touching what it points to.
pub fn remove_symlink(link: &Utf8Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        fs::remove_file(link)
    }
    #[cfg(windows)]
    {
        // Directory symlinks on Windows are removed as directories.
        fs::remove_dir(link).or_else(|_| fs::remove_file(link))
    }
}

/// Compare a symlink's current target with the intended one, tolerating
/// trailing separators and mixed separator styles.
pub fn links_to(existing: &std::path::Path, intended: &Utf8Path) -> bool {
    let normalize = |s: &str| s.replace('\\', "/").trim_end_matches('/').to_string();
    existing
        .to_str()
        .is_some_and(|e| normalize(e) == normalize(intended.as_str()))
}
