//! Bridge support file
//!
//! tun2socks on Windows loads `wintun.dll` from its working directory.
//! Release bundles ship the library next to the executable; development
//! checkouts keep per-architecture copies under `wintun/<arch>/`, so the
//! first start copies the matching one into place.

use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::defaults::{SUPPORT_FILE_NAME, SUPPORT_SOURCE_DIR};
use crate::error::{Result, SessionError};

/// A file the bridge needs next to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportFile {
    /// Where the bridge expects the file
    pub target: PathBuf,
    /// Directory holding `<arch>/<file name>` copies
    pub source_dir: PathBuf,
}

impl SupportFile {
    pub fn new(target: PathBuf, source_dir: PathBuf) -> Self {
        Self { target, source_dir }
    }

    /// The standard wintun layout relative to the working directory
    pub fn wintun() -> Self {
        Self::new(PathBuf::from(".").join(SUPPORT_FILE_NAME), PathBuf::from(SUPPORT_SOURCE_DIR))
    }

    /// Default for the current platform: wintun on Windows, nothing elsewhere
    pub fn platform_default() -> Option<Self> {
        if cfg!(windows) {
            Some(Self::wintun())
        } else {
            None
        }
    }

    /// Arch-specific copy used when the target is absent
    pub fn fallback_source(&self) -> PathBuf {
        let file_name = self
            .target
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| SUPPORT_FILE_NAME.into());
        self.source_dir.join(arch_dir()).join(file_name)
    }

    /// Make sure the target exists, copying it from the fallback if needed
    pub async fn ensure(&self) -> Result<()> {
        if tokio::fs::metadata(&self.target).await.is_ok() {
            return Ok(());
        }

        let source = self.fallback_source();
        let data = tokio::fs::read(&source)
            .await
            .map_err(|cause| self.missing(&source, cause))?;

        if let Some(parent) = self.target.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|cause| self.missing(&source, cause))?;
            }
        }
        tokio::fs::write(&self.target, data)
            .await
            .map_err(|cause| self.missing(&source, cause))?;

        info!("Copied {} to {}", source.display(), self.target.display());
        Ok(())
    }

    fn missing(&self, source: &Path, cause: io::Error) -> SessionError {
        SessionError::DependencyMissing {
            target: self.target.clone(),
            source_path: source.to_path_buf(),
            cause,
        }
    }
}

/// Directory name wintun uses for the running architecture
fn arch_dir() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "x64",
        "aarch64" => "arm64",
        _ => "x86",
    }
}
