//! Staged data directory layout.
//!
//! Layout: `{root}/01-raw`, `{root}/02-preprocessed`, `{root}/03-features`,
//! `{root}/04-predictions`.
//!
//! Rules:
//! - Inputs are never modified.
//! - Stage outputs are named by a content hash of their inputs; an existing
//!   output with the same name is reused, never overwritten.
//! - All writes are atomic (write to `.part`, rename into place).

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Hex chars of a BLAKE3 hash kept in file names.
pub const SHORT_HASH_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum StageError {
    #[error("required input {} does not exist (run the previous stage first)", path.display())]
    MissingInput { path: PathBuf },

    #[error("required input {} is empty", path.display())]
    EmptyInput { path: PathBuf },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Pipeline stages that own a data directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Raw,
    Preprocessed,
    Features,
    Predictions,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Raw,
        Stage::Preprocessed,
        Stage::Features,
        Stage::Predictions,
    ];

    pub fn dir_name(self) -> &'static str {
        match self {
            Stage::Raw => "01-raw",
            Stage::Preprocessed => "02-preprocessed",
            Stage::Features => "03-features",
            Stage::Predictions => "04-predictions",
        }
    }
}

/// Whether a stage write produced a new file or found an identical one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    Reused,
}

/// The `data/` tree.
#[derive(Debug, Clone)]
pub struct StageLayout {
    root: PathBuf,
}

impl StageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir(&self, stage: Stage) -> PathBuf {
        self.root.join(stage.dir_name())
    }

    /// Create every stage directory.
    pub fn ensure(&self) -> Result<(), StageError> {
        for stage in Stage::ALL {
            let dir = self.dir(stage);
            fs::create_dir_all(&dir).map_err(|e| StageError::Io { path: dir, source: e })?;
        }
        Ok(())
    }

    /// Stage directories that do not exist yet.
    pub fn missing_dirs(&self) -> Vec<PathBuf> {
        Stage::ALL
            .iter()
            .map(|s| self.dir(*s))
            .filter(|d| !d.is_dir())
            .collect()
    }

    /// `{stage_dir}/{stem}_{hash12}.{ext}`
    pub fn content_path(&self, stage: Stage, stem: &str, hash: &str, ext: &str) -> PathBuf {
        self.dir(stage)
            .join(format!("{stem}_{}.{ext}", short_hash(hash)))
    }
}

/// First `SHORT_HASH_LEN` chars of a hex digest.
pub fn short_hash(hash: &str) -> &str {
    &hash[..hash.len().min(SHORT_HASH_LEN)]
}

/// BLAKE3 of a file's contents, hex encoded.
pub fn hash_file(path: &Path) -> Result<String, StageError> {
    let bytes = fs::read(path).map_err(|e| StageError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

/// Check that a stage input exists and is non-empty. Returns its size in bytes.
pub fn require_input(path: &Path) -> Result<u64, StageError> {
    let meta = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StageError::MissingInput {
                path: path.to_path_buf(),
            })
        }
        Err(e) => {
            return Err(StageError::Io {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };
    if meta.len() == 0 {
        return Err(StageError::EmptyInput {
            path: path.to_path_buf(),
        });
    }
    Ok(meta.len())
}

/// Write `bytes` to `path` atomically. Any leftover temp file is removed on failure.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), StageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StageError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    let tmp = part_path(path);
    fs::write(&tmp, bytes).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        StageError::Io {
            path: tmp.clone(),
            source: e,
        }
    })?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        StageError::Io {
            path: path.to_path_buf(),
            source: e,
        }
    })
}

/// Temp sibling used while a file is being written.
pub fn part_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

/// Write a content-named stage output unless it already exists.
pub fn write_new(path: &Path, bytes: &[u8]) -> Result<WriteOutcome, StageError> {
    if path.exists() {
        tracing::info!(path = %path.display(), "stage output already present, reusing");
        return Ok(WriteOutcome::Reused);
    }
    atomic_write(path, bytes)?;
    Ok(WriteOutcome::Written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_root() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = env::temp_dir().join(format!("farelab_stages_{}_{id}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn ensure_creates_all_stage_dirs() {
        let root = temp_root();
        let layout = StageLayout::new(&root);
        assert_eq!(layout.missing_dirs().len(), 4);
        layout.ensure().unwrap();
        assert!(layout.missing_dirs().is_empty());
        assert!(root.join("03-features").is_dir());
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn content_path_uses_short_hash() {
        let layout = StageLayout::new("data");
        let p = layout.content_path(Stage::Preprocessed, "flights_clean", "abcdef0123456789", "csv");
        assert_eq!(p, PathBuf::from("data/02-preprocessed/flights_clean_abcdef012345.csv"));
    }

    #[test]
    fn write_new_never_overwrites() {
        let root = temp_root();
        let path = root.join("out.csv");
        assert_eq!(write_new(&path, b"first").unwrap(), WriteOutcome::Written);
        assert_eq!(write_new(&path, b"second").unwrap(), WriteOutcome::Reused);
        assert_eq!(fs::read(&path).unwrap(), b"first");
        assert!(!part_path(&path).exists());
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn require_input_rejects_missing_and_empty() {
        let root = temp_root();
        fs::create_dir_all(&root).unwrap();
        let missing = root.join("nope.csv");
        assert!(matches!(require_input(&missing), Err(StageError::MissingInput { .. })));

        let empty = root.join("empty.csv");
        fs::write(&empty, b"").unwrap();
        assert!(matches!(require_input(&empty), Err(StageError::EmptyInput { .. })));

        let full = root.join("full.csv");
        fs::write(&full, b"a\n").unwrap();
        assert_eq!(require_input(&full).unwrap(), 2);
        let _ = fs::remove_dir_all(&root);
    }
}
