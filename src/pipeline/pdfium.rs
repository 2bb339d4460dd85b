//! Locate and bind the pdfium shared library.
//!
//! Search order:
//!
//! 1. `PDFIUM_LIB_PATH`: a library file, or a directory containing one.
//! 2. The current working directory.
//! 3. The directory of the running executable.
//! 4. The system library search path.

use crate::error::Pdf2AnkiError;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable pointing at an existing pdfium library.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Bind pdfium, trying each location in turn.
pub fn bind_pdfium() -> Result<Pdfium, Pdf2AnkiError> {
    let mut errors = Vec::new();

    for candidate in candidate_paths() {
        match Pdfium::bind_to_library(&candidate) {
            Ok(bindings) => {
                debug!("Bound pdfium from {}", candidate.display());
                return Ok(Pdfium::new(bindings));
            }
            Err(e) => errors.push(format!("{}: {:?}", candidate.display(), e)),
        }
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => {
            debug!("Bound pdfium from the system library path");
            Ok(Pdfium::new(bindings))
        }
        Err(e) => {
            errors.push(format!("system library: {:?}", e));
            Err(Pdf2AnkiError::PdfiumBindingFailed(errors.join("; ")))
        }
    }
}

/// Library files to try before the system search path.
fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(value) = std::env::var(PDFIUM_LIB_PATH_ENV) {
        if !value.is_empty() {
            paths.push(library_file(Path::new(&value)));
        }
    }

    paths.push(Pdfium::pdfium_platform_library_name_at_path("./"));

    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        paths.push(Pdfium::pdfium_platform_library_name_at_path(&dir));
    }

    paths
}

/// A directory resolves to the platform library name inside it.
fn library_file(path: &Path) -> PathBuf {
    if path.is_dir() {
        Pdfium::pdfium_platform_library_name_at_path(path)
    } else {
        path.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_resolves_to_platform_library() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = library_file(dir.path());
        assert_eq!(resolved.parent(), Some(dir.path()));
        assert!(resolved
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.contains("pdfium")));
    }

    #[test]
    fn file_path_is_kept() {
        let p = Path::new("/opt/pdfium/lib/libpdfium.so");
        assert_eq!(library_file(p), p.to_path_buf());
    }
}
