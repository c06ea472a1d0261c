use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::DeskError;

/// `q<digit>...<.extension>`, ignoring case.
pub fn is_quarterly(file_name: &str, extension: &str) -> bool {
    let name = file_name.to_lowercase();
    let suffix = format!(".{}", extension.trim_start_matches('.').to_lowercase());
    let mut chars = name.chars();

    chars.next() == Some('q')
        && chars.next().map_or(false, |c| c.is_ascii_digit())
        && chars.as_str().ends_with(&suffix)
}

/// Quarterly files directly inside `dir`, sorted by name. A directory that
/// cannot be listed fails the whole report.
pub fn quarterly_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, DeskError> {
    let listing_failed = |source| DeskError::DataDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(listing_failed)? {
        let entry = entry.map_err(listing_failed)?;
        let is_file = entry.file_type().map(|t| !t.is_dir()).unwrap_or(false);
        let matches = entry
            .file_name()
            .to_str()
            .map_or(false, |name| is_quarterly(name, extension));
        if is_file && matches {
            files.push(entry.path());
        }
    }
    files.sort();
    debug!("{} quarterly files in '{}'", files.len(), dir.display());
    Ok(files)
}

#[test]
fn quarterly_names() {
    assert!(is_quarterly("q1.xlsx", "xlsx"));
    assert!(is_quarterly("Q3_billing_2025.XLSX", "xlsx"));
    assert!(is_quarterly("q4 billing.csv", ".csv"));
    assert!(!is_quarterly("qa.xlsx", "xlsx"));
    assert!(!is_quarterly("billing_q1.xlsx", "xlsx"));
    assert!(!is_quarterly("q1.xlsx.bak", "xlsx"));
    assert!(!is_quarterly("q1.csv", "xlsx"));
    // the digit must be followed by the extension dot somewhere
    assert!(!is_quarterly("q1xlsx", "xlsx"));
}

#[test]
fn lists_matching_files_in_name_order() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["q2.csv", "Q1.csv", "users.csv", "notes.txt"] {
        fs::write(dir.path().join(name), "").unwrap();
    }
    fs::create_dir(dir.path().join("q9.csv")).unwrap();
    fs::create_dir(dir.path().join("archive")).unwrap();
    fs::write(dir.path().join("archive").join("q3.csv"), "").unwrap();

    let files = quarterly_files(dir.path(), "csv").unwrap();
    let names: Vec<_> = files
        .iter()
        .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
        .collect();
    assert_eq!(names, vec!["Q1.csv", "q2.csv"]);
}

#[test]
fn unreadable_directory_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope");

    assert!(matches!(
        quarterly_files(&missing, "csv"),
        Err(DeskError::DataDir { path, .. }) if path == missing
    ));
}
