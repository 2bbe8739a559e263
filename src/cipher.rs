use std::path::{Path, PathBuf};

use crate::error::Result;

/// File encryption used around backup archives.
///
/// Implementations own key derivation and cipher mode; callers only hand
/// over a path and key material and get the path of the produced file.
pub trait ArchiveCipher {
    fn encrypt(&self, path: &Path, key: &str) -> Result<PathBuf>;

    fn decrypt(&self, path: &Path, key: &str) -> Result<PathBuf>;
}
