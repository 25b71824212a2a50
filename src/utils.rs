use sha2::{Digest, Sha256};
use std::fs::File;
use std::io;
use std::path::Path;

/// Hex-encoded SHA-256 of a file's bytes, streamed from disk.
pub fn file_sha256(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Office lock files (`~$report.xlsx`) sit next to open workbooks and are never data.
pub fn is_lock_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("~$"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_are_stable_per_content() {
        let a = file_sha256(Path::new("tests/data/hvs_jan.csv")).unwrap();
        let b = file_sha256(Path::new("tests/data/hvs_jan.csv")).unwrap();
        let c = file_sha256(Path::new("tests/data/itp_readings.csv")).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn lock_files() {
        assert!(is_lock_file(Path::new("data/raw/~$hvs_jan.xlsx")));
        assert!(!is_lock_file(Path::new("data/raw/hvs_jan.xlsx")));
    }
}
