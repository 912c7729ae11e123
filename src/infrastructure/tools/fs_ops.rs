//! Blocking filesystem operations shared by the local and iCloud servers.
//!
//! Callers are expected to have confined every path with
//! [`PathJail`](super::paths::PathJail) first.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use glob::Pattern;
use tracing::debug;
use walkdir::WalkDir;

/// Sorted entry names of `dir`, optionally regular files only
pub fn list_names(dir: &Path, files_only: bool) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if files_only && !entry.file_type()?.is_file() {
            continue;
        }
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

/// Glob matching file names that contain `query`.
///
/// Glob characters in the query are honoured; a query that is not a valid
/// pattern is matched literally.
pub fn name_pattern(query: &str) -> Pattern {
    Pattern::new(&collapse_stars(&format!("*{query}*"))).unwrap_or_else(|_| {
        Pattern::new(&format!("*{}*", Pattern::escape(query))).unwrap_or_default()
    })
}

// `**` is only valid as a whole path component in `glob`
fn collapse_stars(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if c == '*' && out.ends_with('*') {
            continue;
        }
        out.push(c);
    }
    out
}

/// Recursively find files under `base` whose name matches `*query*`.
///
/// Unreadable entries are skipped; at most `limit` paths are returned.
pub fn search(base: &Path, query: &str, limit: usize) -> Vec<PathBuf> {
    let pattern = name_pattern(query);

    let hits: Vec<PathBuf> = WalkDir::new(base)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| pattern.matches(&entry.file_name().to_string_lossy()))
        .take(limit)
        .map(walkdir::DirEntry::into_path)
        .collect();

    debug!(base = %base.display(), query, hits = hits.len(), "Search finished");
    hits
}

/// Where `src` lands when copied or moved to `dest`: inside `dest` when it
/// is an existing directory, otherwise `dest` itself.
pub fn landing_path(src: &Path, dest: &Path) -> PathBuf {
    match src.file_name() {
        Some(name) if dest.is_dir() => dest.join(name),
        _ => dest.to_path_buf(),
    }
}

/// Copy a file or a whole directory tree. Returns the final destination.
pub fn copy_path(src: &Path, dest: &Path) -> io::Result<PathBuf> {
    let target = landing_path(src, dest);
    let metadata = fs::metadata(src)?;

    if metadata.is_dir() {
        if target.starts_with(src) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot copy a directory into itself",
            ));
        }
        copy_tree(src, &target)?;
    } else {
        fs::copy(src, &target)?;
    }

    Ok(target)
}

fn copy_tree(src: &Path, dest: &Path) -> io::Result<()> {
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(io::Error::other)?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Move a file or directory. Falls back to copy and delete when a rename
/// is not possible (e.g. across filesystems).
pub fn move_path(src: &Path, dest: &Path) -> io::Result<PathBuf> {
    let target = landing_path(src, dest);

    match fs::rename(src, &target) {
        Ok(()) => Ok(target),
        Err(rename_err) => {
            if fs::symlink_metadata(src).is_err() {
                return Err(rename_err);
            }
            debug!(src = %src.display(), error = %rename_err, "Rename failed, copying instead");
            copy_path(src, &target)?;
            remove_path(src)?;
            Ok(target)
        }
    }
}

/// Delete a file, a symlink, or a directory tree
pub fn remove_path(path: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(path)?;
    if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("docs/nested")).unwrap();
        fs::write(dir.path().join("report.pdf"), b"pdf").unwrap();
        fs::write(dir.path().join("docs/notes.txt"), b"notes").unwrap();
        fs::write(dir.path().join("docs/nested/report-2024.txt"), b"old").unwrap();
        dir
    }

    #[test]
    fn test_list_names_sorted_and_filtered() {
        let dir = fixture();

        assert_eq!(list_names(dir.path(), false).unwrap(), vec!["docs", "report.pdf"]);
        assert_eq!(list_names(dir.path(), true).unwrap(), vec!["report.pdf"]);
    }

    #[test]
    fn test_search_matches_substring_recursively() {
        let dir = fixture();

        let mut hits = search(dir.path(), "report", 100);
        hits.sort();
        assert_eq!(
            hits,
            vec![
                dir.path().join("docs/nested/report-2024.txt"),
                dir.path().join("report.pdf"),
            ]
        );
    }

    #[test]
    fn test_search_respects_limit() {
        let dir = fixture();
        assert_eq!(search(dir.path(), "", 2).len(), 2);
    }

    #[test]
    fn test_search_with_glob_in_query() {
        let dir = fixture();
        let hits = search(dir.path(), ".pdf", 100);
        assert_eq!(hits, vec![dir.path().join("report.pdf")]);

        let hits = search(dir.path(), "*.txt", 100);
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_invalid_pattern_matches_literally() {
        let pattern = name_pattern("[draft");
        assert!(pattern.matches("my [draft] file"));
        assert!(!pattern.matches("draft"));
    }

    #[test]
    fn test_copy_file_into_directory() {
        let dir = fixture();
        let target = copy_path(&dir.path().join("report.pdf"), &dir.path().join("docs")).unwrap();

        assert_eq!(target, dir.path().join("docs/report.pdf"));
        assert_eq!(fs::read(&target).unwrap(), b"pdf");
        assert!(dir.path().join("report.pdf").exists());
    }

    #[test]
    fn test_copy_directory_recursively() {
        let dir = fixture();
        copy_path(&dir.path().join("docs"), &dir.path().join("backup")).unwrap();

        assert!(dir.path().join("backup/nested/report-2024.txt").is_file());
        assert!(dir.path().join("docs/notes.txt").is_file());
    }

    #[test]
    fn test_copy_directory_into_itself_fails() {
        let dir = fixture();
        let err = copy_path(&dir.path().join("docs"), &dir.path().join("docs/nested")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_move_and_remove() {
        let dir = fixture();
        let target = move_path(&dir.path().join("docs"), &dir.path().join("archive")).unwrap();

        assert_eq!(target, dir.path().join("archive"));
        assert!(!dir.path().join("docs").exists());
        assert!(dir.path().join("archive/notes.txt").exists());

        remove_path(&target).unwrap();
        assert!(!target.exists());
    }

    #[test]
    fn test_remove_missing_is_not_found() {
        let dir = fixture();
        let err = remove_path(&dir.path().join("nope")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
