//! Survey file discovery.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors that can occur during discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Find survey files in a directory.
///
/// Files are grouped by extension in the order of `extensions`, and sorted
/// by path within each group. Extension matching is case-insensitive and
/// exact (`xls` does not pick up `.xlsx`).
///
/// # Arguments
///
/// * `directory` - Directory to scan (not recursive)
/// * `extensions` - Extensions without the leading dot
///
/// # Returns
///
/// The matching file paths.
pub fn find_survey_files(directory: &Path, extensions: &[String]) -> Result<Vec<PathBuf>, DiscoveryError> {
    if !directory.is_dir() {
        return Err(DiscoveryError::DirectoryNotFound(directory.to_path_buf()));
    }

    let entries = fs::read_dir(directory).map_err(|source| DiscoveryError::ReadDir {
        path: directory.to_path_buf(),
        source,
    })?;

    let candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();

    let mut results = Vec::with_capacity(candidates.len());

    for wanted in extensions {
        let wanted = wanted.trim_start_matches('.');
        let mut group: Vec<PathBuf> = candidates
            .iter()
            .filter(|path| {
                path.extension()
                    .map(|ext| ext.eq_ignore_ascii_case(wanted))
                    .unwrap_or(false)
            })
            .filter(|path| !results.contains(*path))
            .cloned()
            .collect();

        group.sort();
        results.extend(group);
    }

    Ok(results)
}

/// Resolve the list of files to process.
///
/// An explicit file list wins; otherwise `folder` (or the current directory)
/// is scanned with [`find_survey_files`].
pub fn collect_inputs(
    files: &[PathBuf],
    folder: Option<&Path>,
    extensions: &[String],
) -> Result<Vec<PathBuf>, DiscoveryError> {
    if !files.is_empty() {
        return Ok(files.to_vec());
    }

    find_survey_files(folder.unwrap_or_else(|| Path::new(".")), extensions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    fn exts(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn touch(dir: &Path, name: &str) {
        File::create(dir.join(name)).unwrap();
    }

    #[test]
    fn test_find_survey_files_grouped_by_extension() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "b.docx");
        touch(temp_dir.path(), "z.xls");
        touch(temp_dir.path(), "a.xlsx");
        touch(temp_dir.path(), "c.XLSX");
        touch(temp_dir.path(), "notes.txt");
        touch(temp_dir.path(), "export.csv");

        let files = find_survey_files(temp_dir.path(), &exts(&["xls", "xlsx", "docx"])).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();

        assert_eq!(names, vec!["z.xls", "a.xlsx", "c.XLSX", "b.docx"]);
    }

    #[test]
    fn test_find_survey_files_skips_directories() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("old.xlsx")).unwrap();
        touch(temp_dir.path(), "new.xlsx");

        let files = find_survey_files(temp_dir.path(), &exts(&["xlsx"])).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("new.xlsx"));
    }

    #[test]
    fn test_find_survey_files_duplicate_extensions() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "a.csv");

        let files = find_survey_files(temp_dir.path(), &exts(&["csv", ".CSV"])).unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_find_survey_files_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let result = find_survey_files(&temp_dir.path().join("nope"), &exts(&["xls"]));
        assert!(matches!(result, Err(DiscoveryError::DirectoryNotFound(_))));
    }

    #[test]
    fn test_collect_inputs_prefers_explicit_files() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "a.xls");

        let explicit = vec![PathBuf::from("second.docx"), PathBuf::from("first.xlsx")];
        let files = collect_inputs(&explicit, Some(temp_dir.path()), &exts(&["xls"])).unwrap();
        assert_eq!(files, explicit);

        let scanned = collect_inputs(&[], Some(temp_dir.path()), &exts(&["xls"])).unwrap();
        assert_eq!(scanned.len(), 1);
    }
}
