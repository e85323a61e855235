//! Durable artifact storage
//!
//! Scaler state and model bundles are stored as bincode blobs. Every write
//! goes to a temporary file in the destination directory and is renamed into
//! place, so an interrupted stage never leaves a partial artifact behind.

use crate::error::{PipelineError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Bumped whenever a persisted struct changes shape
pub const FORMAT_VERSION: u32 = 1;

/// Artifacts that carry a format version checked at load time
pub trait Versioned {
    fn format_version(&self) -> u32;

    /// Structural checks run after decoding
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Bytes written next to their destination but not yet visible there
#[derive(Debug)]
pub struct StagedWrite {
    tmp: tempfile::NamedTempFile,
    path: PathBuf,
}

impl StagedWrite {
    /// Rename the staged file into place
    pub fn commit(self) -> Result<()> {
        self.tmp
            .persist(&self.path)
            .map_err(|e| PipelineError::Io(e.error))?;
        Ok(())
    }
}

/// Write bytes to a temporary file in the destination directory, creating
/// parent directories; nothing appears at `path` until `commit`
pub fn stage(path: &Path, bytes: &[u8]) -> Result<StagedWrite> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;

    Ok(StagedWrite {
        tmp,
        path: path.to_path_buf(),
    })
}

/// Write bytes to `path` atomically, creating parent directories
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    stage(path, bytes)?.commit()
}

/// Encode an artifact with bincode
pub fn encode_artifact<T: Serialize>(artifact: &T) -> Result<Vec<u8>> {
    bincode::serialize(artifact).map_err(|e| {
        PipelineError::Serialization(format!("Failed to serialize artifact: {}", e))
    })
}

/// Serialize and persist an artifact
pub fn save_artifact<T: Serialize>(path: &Path, artifact: &T) -> Result<()> {
    let bytes = encode_artifact(artifact)?;
    write_atomic(path, &bytes)?;

    tracing::info!(path = %path.display(), bytes = bytes.len(), "Artifact written");
    Ok(())
}

/// Load and decode an artifact, checking its format version
pub fn load_artifact<T: DeserializeOwned + Versioned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).map_err(|e| {
        PipelineError::Artifact(format!("Failed to read {}: {}", path.display(), e))
    })?;

    let artifact: T = bincode::deserialize(&bytes).map_err(|e| {
        PipelineError::Artifact(format!("Failed to decode {}: {}", path.display(), e))
    })?;

    if artifact.format_version() != FORMAT_VERSION {
        return Err(PipelineError::Artifact(format!(
            "{} has format version {}, expected {}",
            path.display(),
            artifact.format_version(),
            FORMAT_VERSION
        )));
    }

    artifact
        .validate()
        .map_err(|e| PipelineError::Artifact(format!("{} is invalid: {}", path.display(), e)))?;

    Ok(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Blob {
        format_version: u32,
        payload: Vec<f64>,
    }

    impl Versioned for Blob {
        fn format_version(&self) -> u32 {
            self.format_version
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("blob.bin");
        let blob = Blob {
            format_version: FORMAT_VERSION,
            payload: vec![1.0, 2.5],
        };

        save_artifact(&path, &blob).unwrap();
        let loaded: Blob = load_artifact(&path).unwrap();

        assert_eq!(loaded, blob);
    }

    #[test]
    fn test_missing_artifact() {
        let dir = tempdir().unwrap();
        let result: Result<Blob> = load_artifact(&dir.path().join("absent.bin"));
        assert!(matches!(result, Err(PipelineError::Artifact(_))));
    }

    #[test]
    fn test_corrupt_artifact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("corrupt.bin");
        fs::write(&path, b"xy").unwrap();

        let result: Result<Blob> = load_artifact(&path);
        assert!(matches!(result, Err(PipelineError::Artifact(_))));
    }

    #[test]
    fn test_version_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("old.bin");
        save_artifact(
            &path,
            &Blob {
                format_version: FORMAT_VERSION + 1,
                payload: vec![],
            },
        )
        .unwrap();

        let result: Result<Blob> = load_artifact(&path);
        assert!(matches!(result, Err(PipelineError::Artifact(_))));
    }

    #[test]
    fn test_staged_write_invisible_until_commit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("staged.bin");

        let staged = stage(&path, b"payload").unwrap();
        assert!(!path.exists());

        staged.commit().unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"payload");
    }

    #[test]
    fn test_dropped_stage_leaves_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dropped.bin");

        drop(stage(&path, b"payload").unwrap());

        assert!(!path.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_write_atomic_replaces_existing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("file.txt");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"second");
    }
}
