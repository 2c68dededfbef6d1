//! Recursive scan-file discovery and subject-id extraction.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::DiscoveryError;

/// Collect every file under `root` (any depth) whose extension is `extension`.
///
/// Entries are visited in file-name order within each directory, so the
/// result is stable across platforms and runs.
pub fn discover_files(root: &Path, extension: &str) -> Result<Vec<PathBuf>, DiscoveryError> {
    if !root.exists() {
        return Err(DiscoveryError::RootMissing(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(DiscoveryError::NotADirectory(root.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        match entry {
            Ok(entry) => {
                // Links are not followed, but a link to a regular file is a scan.
                let is_file = entry.file_type().is_file()
                    || (entry.path_is_symlink() && entry.path().is_file());
                if is_file && has_extension(entry.path(), extension) {
                    files.push(entry.into_path());
                }
            }
            Err(e) => {
                log::warn!("Error accessing entry: {e}");
            }
        }
    }

    log::debug!("found {} .{extension} files under {}", files.len(), root.display());
    Ok(files)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(extension)
}

/// Render a path with `/` as the only separator.
pub fn normalize_separators(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Subject id of a discovered file: the name of its immediate parent directory.
pub fn subject_id_of(path: &Path) -> Option<String> {
    let normalized = normalize_separators(path);
    let mut parts = normalized.rsplit('/').filter(|p| !p.is_empty());
    let _file_name = parts.next()?;
    parts
        .next()
        .filter(|p| *p != "." && *p != "..")
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn finds_targets_at_any_depth_and_nothing_else() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("P1/a.nii"));
        touch(&root.join("site/2008/P2/b.nii"));
        touch(&root.join("site/P3/deep/er/c.nii"));
        touch(&root.join("P1/notes.txt"));
        touch(&root.join("P4/scan.nii.gz"));
        touch(&root.join("P5/upper.NII"));

        let files = discover_files(root, "nii").unwrap();
        let rel: Vec<String> = files
            .iter()
            .map(|f| normalize_separators(f.strip_prefix(root).unwrap()))
            .collect();

        assert_eq!(rel, vec!["P1/a.nii", "site/2008/P2/b.nii", "site/P3/deep/er/c.nii"]);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_scans_are_discovered() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("AIBL");
        let store = dir.path().join("store");
        touch(&store.join("real.nii"));
        fs::create_dir_all(root.join("P1")).unwrap();
        std::os::unix::fs::symlink(store.join("real.nii"), root.join("P1/a.nii")).unwrap();
        std::os::unix::fs::symlink(store.join("gone.nii"), root.join("P1/dangling.nii")).unwrap();

        let files = discover_files(&root, "nii").unwrap();

        assert_eq!(files, vec![root.join("P1/a.nii")]);
        assert_eq!(subject_id_of(&files[0]).as_deref(), Some("P1"));
    }

    #[test]
    fn empty_root_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_files(dir.path(), "nii").unwrap().is_empty());
    }

    #[test]
    fn missing_root_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("AIBL");
        assert!(matches!(
            discover_files(&missing, "nii"),
            Err(DiscoveryError::RootMissing(p)) if p == missing
        ));
    }

    #[test]
    fn file_root_is_not_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.nii");
        touch(&file);
        assert!(matches!(
            discover_files(&file, "nii"),
            Err(DiscoveryError::NotADirectory(_))
        ));
    }

    #[test]
    fn subject_id_is_parent_directory_name() {
        assert_eq!(subject_id_of(Path::new("AIBL/x/P7/scan.nii")).as_deref(), Some("P7"));
        assert_eq!(
            subject_id_of(Path::new(r"C:\AIBL\x\P8\scan.nii")).as_deref(),
            Some("P8")
        );
        assert_eq!(subject_id_of(Path::new("scan.nii")), None);
    }
}
