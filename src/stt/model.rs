//! Model catalog and on-disk resolution.
//!
//! Models are plain files named `ggml-<name>.bin` inside the models
//! directory; presence of the file is the only "available" signal.
//! [`MODELS`] lists the downloadable catalog.

use std::path::{Path, PathBuf};

use crate::stt::engine::SttError;

// ---------------------------------------------------------------------------
// ModelInfo
// ---------------------------------------------------------------------------

/// Static metadata for one downloadable GGML model.
#[derive(Debug, PartialEq, Eq)]
pub struct ModelInfo {
    /// Identifier used in config and on the command line (e.g. `"base"`).
    pub name: &'static str,
    /// Short size / speed note shown in listings.
    pub description: &'static str,
    /// Approximate file size in megabytes.
    pub file_size_mb: u64,
    /// Source URL of the GGML file.
    pub url: &'static str,
}

/// Standard multilingual whisper.cpp models, smallest first.
pub const MODELS: &[ModelInfo] = &[
    ModelInfo {
        name: "tiny",
        description: "~75 MB. Fastest.",
        file_size_mb: 75,
        url: "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-tiny.bin",
    },
    ModelInfo {
        name: "base",
        description: "~140 MB. Balanced.",
        file_size_mb: 142,
        url: "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-base.bin",
    },
    ModelInfo {
        name: "small",
        description: "~460 MB. Good accuracy.",
        file_size_mb: 466,
        url: "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-small.bin",
    },
    ModelInfo {
        name: "medium",
        description: "~1.5 GB. Slow on older machines.",
        file_size_mb: 1_533,
        url: "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-medium.bin",
    },
];

/// Find a catalog entry by name.
pub fn find_model(name: &str) -> Option<&'static ModelInfo> {
    MODELS.iter().find(|m| m.name == name)
}

// ---------------------------------------------------------------------------
// ModelStore
// ---------------------------------------------------------------------------

/// Resolves model names to files in a single directory.
///
/// ```rust
/// use subburn::stt::ModelStore;
///
/// let store = ModelStore::new("/models");
/// assert_eq!(
///     store.path_for("base"),
///     std::path::PathBuf::from("/models/ggml-base.bin")
/// );
/// ```
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    const PREFIX: &'static str = "ggml-";
    const EXTENSION: &'static str = "bin";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `ggml-<name>.bin`.
    pub fn file_name(name: &str) -> String {
        format!("{}{name}.{}", Self::PREFIX, Self::EXTENSION)
    }

    /// Where the model file for `name` lives (whether or not it exists).
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(Self::file_name(name))
    }

    /// Resolve `name` to an existing model file.
    ///
    /// # Errors
    ///
    /// [`SttError::ModelNotFound`] when the name is not a plain file stem or
    /// the file is absent.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, SttError> {
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            return Err(SttError::ModelNotFound(name.to_string()));
        }
        let path = self.path_for(name);
        if path.is_file() {
            Ok(path)
        } else {
            Err(SttError::ModelNotFound(name.to_string()))
        }
    }

    pub fn is_available(&self, name: &str) -> bool {
        self.resolve(name).is_ok()
    }

    /// Catalog models present on disk, in catalog order.
    pub fn list_local(&self) -> Vec<&'static ModelInfo> {
        MODELS
            .iter()
            .filter(|m| self.is_available(m.name))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
