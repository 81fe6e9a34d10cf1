//! Shared utilities for local OCR engines: CLI availability checks and
//! model file discovery.

use std::path::{Path, PathBuf};
use std::process::Command;

/// Check if a binary is available in PATH.
pub fn check_binary(name: &str) -> bool {
    Command::new("which")
        .arg(name)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Where a local engine looks for its model files.
pub struct ModelDirConfig {
    /// Subdirectory name under the data dir (e.g. "ocrs").
    pub subdir: &'static str,
    /// Model files that must all be present.
    pub required_files: &'static [&'static str],
}

impl ModelDirConfig {
    /// Standard candidate directories, most specific first.
    pub fn candidate_dirs(&self) -> Vec<PathBuf> {
        [
            std::env::var_os("HWX_MODEL_DIR").map(PathBuf::from),
            dirs::data_dir().map(|d| d.join(self.subdir).join("models")),
            dirs::home_dir().map(|d| d.join(format!(".{}", self.subdir)).join("models")),
            Some(PathBuf::from(format!("/usr/share/{}/models", self.subdir))),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Check if a directory contains all required model files.
    pub fn has_required_files(&self, dir: &Path) -> bool {
        self.required_files.iter().all(|file| dir.join(file).exists())
    }

    /// First candidate directory that actually holds the models.
    pub fn find(&self) -> Option<PathBuf> {
        self.candidate_dirs()
            .into_iter()
            .find(|dir| self.has_required_files(dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_files_fail_the_check() {
        let config = ModelDirConfig {
            subdir: "testengine",
            required_files: &["absent.bin"],
        };
        let dir = tempfile::tempdir().unwrap();
        assert!(!config.has_required_files(dir.path()));
        std::fs::write(dir.path().join("absent.bin"), b"x").unwrap();
        assert!(config.has_required_files(dir.path()));
    }
}
