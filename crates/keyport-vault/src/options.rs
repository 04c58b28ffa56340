//! Import options, stored as plain JSON next to the user's other settings.
//!
//! Every field has a default, so a partial or missing file is fine.

use std::fs;
use std::path::{Path, PathBuf};

use keyport_crypto_core::KdfLimits;
use serde::{Deserialize, Serialize};

/// Knobs shared by all readers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImportOptions {
    /// Name of the lazily created group that receives trashed items.
    #[serde(default = "default_recycle_bin_name")]
    pub recycle_bin_name: String,

    /// Tag added to items the source marks as favorite / pinned.
    #[serde(default = "default_favorite_tag")]
    pub favorite_tag: String,

    /// Tag added to archived 1PUX items.
    #[serde(default = "default_archived_tag")]
    pub archived_tag: String,

    /// Largest Argon2 memory cost a file may request, in KiB.
    #[serde(default = "default_max_kdf_memory_kib")]
    pub max_kdf_memory_kib: u32,

    /// Largest PBKDF2 / Argon2 iteration count a file may request.
    #[serde(default = "default_max_kdf_iterations")]
    pub max_kdf_iterations: u32,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            recycle_bin_name: default_recycle_bin_name(),
            favorite_tag: default_favorite_tag(),
            archived_tag: default_archived_tag(),
            max_kdf_memory_kib: default_max_kdf_memory_kib(),
            max_kdf_iterations: default_max_kdf_iterations(),
        }
    }
}

fn default_recycle_bin_name() -> String {
    "Recycle Bin".into()
}
fn default_favorite_tag() -> String {
    "Favorite".into()
}
fn default_archived_tag() -> String {
    "Archived".into()
}
const fn default_max_kdf_memory_kib() -> u32 {
    1_048_576
}
const fn default_max_kdf_iterations() -> u32 {
    10_000_000
}

impl ImportOptions {
    /// KDF bounds derived from these options.
    #[must_use]
    pub const fn kdf_limits(&self) -> KdfLimits {
        KdfLimits {
            max_memory_kib: self.max_kdf_memory_kib,
            max_iterations: self.max_kdf_iterations,
        }
    }

    /// Load options from `path`.
    ///
    /// Returns [`Default::default()`] when the file is missing or is not
    /// valid JSON.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        fs::read_to_string(path).map_or_else(
            |_| Self::default(),
            |contents| {
                serde_json::from_str(&contents).unwrap_or_else(|e| {
                    tracing::warn!(path = %path.display(), "ignoring unreadable options file: {e}");
                    Self::default()
                })
            },
        )
    }

    /// Write options to `path` through a temporary file and a rename.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if the parent directory does not exist or the
    /// file system rejects the write/rename.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let tmp = tmp_path(path);

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        fs::write(&tmp, &json)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
        }

        fs::rename(&tmp, path)?;

        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map_or_else(|| "options.json".into(), |n| n.to_string_lossy().into_owned());
    path.with_file_name(format!(".{name}.tmp"))
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let options = ImportOptions::default();
        assert_eq!(options.recycle_bin_name, "Recycle Bin");
        assert_eq!(options.favorite_tag, "Favorite");
        assert_eq!(options.archived_tag, "Archived");
        assert_eq!(options.kdf_limits(), KdfLimits::default());
    }

    #[test]
    fn load_returns_default_on_missing_file() {
        let dir = TempDir::new().unwrap();
        let options = ImportOptions::load(&dir.path().join("import.json"));
        assert_eq!(options, ImportOptions::default());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("import.json");
        let options = ImportOptions {
            recycle_bin_name: "Trash".into(),
            max_kdf_iterations: 5,
            ..ImportOptions::default()
        };

        options.save(&path).unwrap();
        assert_eq!(ImportOptions::load(&path), options);
        assert!(!dir.path().join(".import.json.tmp").exists());
    }

    #[test]
    fn load_recovers_from_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("import.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(ImportOptions::load(&path), ImportOptions::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("import.json");
        fs::write(&path, r#"{"favoriteTag":"Starred"}"#).unwrap();

        let options = ImportOptions::load(&path);
        assert_eq!(options.favorite_tag, "Starred");
        assert_eq!(options.recycle_bin_name, "Recycle Bin");
        assert_eq!(options.max_kdf_memory_kib, 1_048_576);
    }

    #[cfg(unix)]
    #[test]
    fn save_sets_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("import.json");
        ImportOptions::default().save(&path).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
