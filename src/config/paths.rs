//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   Windows: %APPDATA%\subburn\
//!   macOS:   ~/Library/Application Support/subburn/
//!   Linux:   ~/.config/subburn/
//!
//! Documents dir (models `ggml-<name>.bin` and burned videos):
//!   Windows: %USERPROFILE%\Documents\
//!   macOS:   ~/Documents/
//!   Linux:   $XDG_DOCUMENTS_DIR (falls back to ~/.local/share/subburn/)

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Per-user documents directory.
    pub documents_dir: PathBuf,
    /// Directory scanned for `ggml-<name>.bin` model files.
    pub models_dir: PathBuf,
    /// Default destination for burned videos.
    pub output_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "subburn";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let documents_dir = dirs::document_dir().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(Self::APP_NAME)
        });

        let settings_file = config_dir.join("settings.toml");

        Self {
            config_dir,
            settings_file,
            models_dir: documents_dir.clone(),
            output_dir: documents_dir.clone(),
            documents_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_non_empty() {
        let paths = AppPaths::new();
        assert!(paths.config_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths.models_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths
            .settings_file
            .file_name()
            .is_some_and(|n| n == "settings.toml"));
    }

    #[test]
    fn models_live_in_documents() {
        let paths = AppPaths::new();
        assert_eq!(paths.models_dir, paths.documents_dir);
        assert_eq!(paths.output_dir, paths.documents_dir);
    }
}
