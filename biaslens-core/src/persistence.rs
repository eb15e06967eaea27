//! File persistence helpers: atomic JSON writes and tolerant reads.
//!
//! Every record file is written to a `.tmp` sibling first and then renamed
//! over the target, so readers never observe a half-written record.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Result;

/// Serialize `data` as pretty JSON and atomically replace `path` with it.
///
/// Creates parent directories if they don't exist.
pub fn atomic_write_json<T: Serialize + ?Sized>(path: &Path, data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data)?;
    atomic_write(path, json.as_bytes())
}

/// Atomically write raw bytes to `path`.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = tmp_path(path);
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Write `data` as pretty JSON to `path` only if nothing is there yet.
///
/// Returns `Ok(false)` and leaves the existing file untouched when `path`
/// already exists. The record appears complete or not at all.
pub fn create_json<T: Serialize + ?Sized>(path: &Path, data: &T) -> Result<bool> {
    let json = serde_json::to_string_pretty(data)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = tmp_path(path);
    std::fs::write(&tmp, json.as_bytes())?;
    // Linking fails instead of replacing when the target exists.
    let linked = std::fs::hard_link(&tmp, path);
    std::fs::remove_file(&tmp)?;
    match linked {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Delete `path`. Returns `Ok(false)` if it did not exist.
pub fn remove_if_exists(path: &Path) -> Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Load and deserialize JSON from `path`.
///
/// Returns `Ok(None)` if the file doesn't exist.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_str(&data)?))
}

/// Load every `*.json` record in `dir`, sorted by file name.
///
/// A missing directory yields an empty list. Files that fail to parse are
/// skipped with a warning.
pub fn load_json_dir<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut records = Vec::with_capacity(paths.len());
    for path in paths {
        match load_json(&path) {
            Ok(Some(record)) => records.push(record),
            Ok(None) => {}
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable record"),
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BiasLensError;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        score: f64,
    }

    #[test]
    fn test_atomic_write_json_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sample.json");
        let data = Sample {
            name: "anchoring".into(),
            score: 0.1 + 0.2,
        };
        atomic_write_json(&path, &data).unwrap();
        let loaded: Option<Sample> = load_json(&path).unwrap();
        assert_eq!(loaded, Some(data));
    }

    #[test]
    fn test_atomic_write_creates_parent_dirs_and_no_tmp() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("evaluations").join("abc.json");
        atomic_write_json(&path, &"x").unwrap();
        assert!(path.exists());
        assert!(!dir.path().join("evaluations").join("abc.json.tmp").exists());
    }

    #[test]
    fn test_create_json_never_replaces() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("records").join("a.json");
        assert!(create_json(&path, &vec![1, 2, 3]).unwrap());
        assert!(!create_json(&path, &vec![9]).unwrap());
        let loaded: Option<Vec<i32>> = load_json(&path).unwrap();
        assert_eq!(loaded, Some(vec![1, 2, 3]));
        assert!(!path.with_file_name("a.json.tmp").exists());
    }

    #[test]
    fn test_remove_if_exists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gone.json");
        assert!(!remove_if_exists(&path).unwrap());
        atomic_write(&path, b"{}").unwrap();
        assert!(remove_if_exists(&path).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn test_load_json_missing() {
        let dir = TempDir::new().unwrap();
        let loaded: Option<Sample> = load_json(&dir.path().join("missing.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_load_json_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = load_json::<Sample>(&path).unwrap_err();
        assert!(matches!(err, BiasLensError::Serialization(_)));
    }

    #[test]
    fn test_load_json_dir_skips_junk() {
        let dir = TempDir::new().unwrap();
        for (file, score) in [("b.json", 2.0), ("a.json", 1.0)] {
            atomic_write_json(
                &dir.path().join(file),
                &Sample {
                    name: file.into(),
                    score,
                },
            )
            .unwrap();
        }
        std::fs::write(dir.path().join("c.json"), "garbage").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let records: Vec<Sample> = load_json_dir(dir.path()).unwrap();
        let scores: Vec<f64> = records.iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![1.0, 2.0]);

        let none: Vec<Sample> = load_json_dir(&dir.path().join("absent")).unwrap();
        assert!(none.is_empty());
    }
}
