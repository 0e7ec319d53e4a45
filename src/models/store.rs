//! On-disk artifact store.
//!
//! Layout: `<root>/<model name>/<original file name>`. A directory is a
//! valid artifact only if it holds at least one recognized model file.
//! Entries whose names start with `.` are staging areas and never listed.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::error::ModelError;
use super::name::ModelName;

/// File extensions (lower-case) that a backend can open.
pub const RECOGNIZED_EXTENSIONS: &[&str] = &["gguf", "ggml", "bin"];

/// Returns true if `path` names a recognized model file.
pub fn is_model_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| RECOGNIZED_EXTENSIONS.iter().any(|r| e.eq_ignore_ascii_case(r)))
        .unwrap_or(false)
}

/// Name-addressed directory of model artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the root directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ModelError> {
        let store = Self::new(root);
        fs::create_dir_all(&store.root)?;
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Names of all valid artifacts. A missing root lists as empty.
    pub fn list(&self) -> Result<BTreeSet<ModelName>, ModelError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = BTreeSet::new();
        for entry in entries.flatten() {
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }
            let Some(raw) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            let Ok(name) = ModelName::parse(&raw) else {
                continue;
            };
            if matches!(model_files(&entry.path()), Ok(files) if !files.is_empty()) {
                names.insert(name);
            }
        }
        Ok(names)
    }

    /// Path of the model file backing `name`.
    ///
    /// With several recognized files the lexicographically smallest file
    /// name wins, so resolution is stable across calls and platforms.
    pub fn resolve(&self, name: &ModelName) -> Result<PathBuf, ModelError> {
        let dir = self.artifact_dir(name);
        if !dir.is_dir() {
            return Err(ModelError::NotFound(format!("no artifact named '{name}'")));
        }
        model_files(&dir)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                ModelError::NotFound(format!("artifact '{name}' has no recognized model file"))
            })
    }

    /// Move `source` into the artifact for `name`, replacing any previous content.
    ///
    /// The new content is staged next to the live directory and swapped in by
    /// rename, so a concurrent `resolve` sees either the old or the new file.
    pub fn accept(&self, name: &ModelName, source: &Path) -> Result<PathBuf, ModelError> {
        let file_name = source
            .file_name()
            .ok_or_else(|| ModelError::UnrecognizedFile(source.display().to_string()))?
            .to_owned();
        if !is_model_file(Path::new(&file_name)) {
            return Err(ModelError::UnrecognizedFile(format!(
                "{} (expected one of: {})",
                Path::new(&file_name).display(),
                RECOGNIZED_EXTENSIONS.join(", ")
            )));
        }
        if !source.is_file() {
            return Err(ModelError::NotFound(format!(
                "source file {} does not exist",
                source.display()
            )));
        }

        fs::create_dir_all(&self.root)?;
        let staging = self.root.join(format!(".staging-{}", uuid::Uuid::new_v4()));
        fs::create_dir(&staging)?;

        let result = self.swap_in(name, source, &staging, &file_name);
        if result.is_err() {
            discard_staging(&staging);
        }
        result
    }

    fn swap_in(
        &self,
        name: &ModelName,
        source: &Path,
        staging: &Path,
        file_name: &std::ffi::OsStr,
    ) -> Result<PathBuf, ModelError> {
        move_file(source, &staging.join(file_name))?;

        let dir = self.artifact_dir(name);
        if dir.exists() {
            let retired = self.root.join(format!(".retired-{}", uuid::Uuid::new_v4()));
            fs::rename(&dir, &retired)?;
            if let Err(e) = fs::rename(staging, &dir) {
                restore_retired(&retired, &dir);
                return Err(e.into());
            }
            if let Err(e) = fs::remove_dir_all(&retired) {
                tracing::warn!(path = %retired.display(), error = %e, "failed to remove replaced artifact");
            }
        } else {
            fs::rename(staging, &dir)?;
        }

        tracing::info!(model = %name, file = ?file_name, "artifact stored");
        Ok(dir.join(file_name))
    }

    fn artifact_dir(&self, name: &ModelName) -> PathBuf {
        self.root.join(name.as_str())
    }
}

/// Remove a staging directory left by a failed accept.
fn discard_staging(staging: &Path) -> bool {
    match fs::remove_dir_all(staging) {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(path = %staging.display(), error = %e, "failed to remove staging directory");
            false
        }
    }
}

/// Put a retired artifact back at `dir` after a failed swap. On failure the
/// previous artifact is only reachable at `retired`, so both paths are logged.
fn restore_retired(retired: &Path, dir: &Path) -> bool {
    match fs::rename(retired, dir) {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(
                retired = %retired.display(),
                target = %dir.display(),
                error = %e,
                "failed to restore previous artifact"
            );
            false
        }
    }
}

/// Recognized model files directly inside `dir`, sorted by file name.
fn model_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .flatten()
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.path())
        .filter(|p| is_model_file(p))
        .collect();
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Rename, falling back to copy + remove across filesystems.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(raw: &str) -> ModelName {
        ModelName::parse(raw).unwrap()
    }

    #[test]
    fn test_extension_allow_list() {
        assert!(is_model_file(Path::new("a.gguf")));
        assert!(is_model_file(Path::new("a.GGUF")));
        assert!(is_model_file(Path::new("pytorch_model.bin")));
        assert!(is_model_file(Path::new("old.ggml")));
        assert!(!is_model_file(Path::new("config.json")));
        assert!(!is_model_file(Path::new("README")));
    }

    #[test]
    fn test_missing_root_lists_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("absent"));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_list_skips_files_invalid_and_hidden_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("stray.gguf"), b"GGUF").unwrap();
        fs::create_dir(root.join("empty")).unwrap();
        fs::create_dir(root.join("docs")).unwrap();
        fs::write(root.join("docs/readme.md"), b"#").unwrap();
        fs::create_dir(root.join(".staging-x")).unwrap();
        fs::write(root.join(".staging-x/m.gguf"), b"GGUF").unwrap();
        fs::create_dir(root.join("tiny")).unwrap();
        fs::write(root.join("tiny/tiny.gguf"), b"GGUF").unwrap();

        let names = ArtifactStore::new(root).list().unwrap();
        assert_eq!(names.into_iter().collect::<Vec<_>>(), vec![name("tiny")]);
    }

    #[test]
    fn test_resolve_missing_dir_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        assert!(matches!(store.resolve(&name("nope")), Err(ModelError::NotFound(_))));

        fs::create_dir(dir.path().join("docs")).unwrap();
        fs::write(dir.path().join("docs/notes.txt"), b"x").unwrap();
        assert!(matches!(store.resolve(&name("docs")), Err(ModelError::NotFound(_))));
    }

    #[test]
    fn test_resolve_picks_lexicographically_first() {
        let dir = tempfile::tempdir().unwrap();
        let model_dir = dir.path().join("multi");
        fs::create_dir(&model_dir).unwrap();
        for f in ["q8.gguf", "q4.gguf", "a.txt", "z.bin"] {
            fs::write(model_dir.join(f), b"GGUF").unwrap();
        }
        let store = ArtifactStore::new(dir.path());
        let resolved = store.resolve(&name("multi")).unwrap();
        assert_eq!(resolved.file_name().unwrap(), "q4.gguf");
        // Stable across calls
        assert_eq!(store.resolve(&name("multi")).unwrap(), resolved);
    }

    #[test]
    fn test_accept_then_resolve_returns_same_content() {
        let dir = tempfile::tempdir().unwrap();
        let incoming = tempfile::tempdir().unwrap();
        let src = incoming.path().join("tiny.Q4_K_M.gguf");
        fs::write(&src, b"GGUF-A").unwrap();

        let store = ArtifactStore::open(dir.path().join("models")).unwrap();
        let placed = store.accept(&name("tiny"), &src).unwrap();
        assert_eq!(placed.file_name().unwrap(), "tiny.Q4_K_M.gguf");

        let resolved = store.resolve(&name("tiny")).unwrap();
        assert_eq!(resolved, placed);
        assert_eq!(fs::read(&resolved).unwrap(), b"GGUF-A");
    }

    #[test]
    fn test_reaccept_overwrites_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let incoming = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();

        // The old file sorts first; overwrite must still win.
        let old = incoming.path().join("a-old.gguf");
        fs::write(&old, b"OLD").unwrap();
        store.accept(&name("tiny"), &old).unwrap();

        let new = incoming.path().join("b-new.gguf");
        fs::write(&new, b"NEW").unwrap();
        store.accept(&name("tiny"), &new).unwrap();

        let resolved = store.resolve(&name("tiny")).unwrap();
        assert_eq!(fs::read(resolved).unwrap(), b"NEW");
        assert_eq!(store.list().unwrap().len(), 1);
        // No staging leftovers
        let hidden = fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().starts_with('.'))
            .count();
        assert_eq!(hidden, 0);
    }

    #[test]
    fn test_accept_rejects_unrecognized_and_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let json = dir.path().join("config.json");
        fs::write(&json, b"{}").unwrap();

        assert!(matches!(
            store.accept(&name("tiny"), &json),
            Err(ModelError::UnrecognizedFile(_))
        ));
        assert!(matches!(
            store.accept(&name("tiny"), &dir.path().join("gone.gguf")),
            Err(ModelError::NotFound(_))
        ));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_restore_retired_puts_artifact_back() {
        let dir = tempfile::tempdir().unwrap();
        let retired = dir.path().join(".retired-x");
        let target = dir.path().join("tiny");
        fs::create_dir(&retired).unwrap();
        fs::write(retired.join("tiny.gguf"), b"OLD").unwrap();

        assert!(restore_retired(&retired, &target));
        assert_eq!(fs::read(target.join("tiny.gguf")).unwrap(), b"OLD");
        assert!(!retired.exists());
    }

    #[test]
    fn test_failed_restore_and_cleanup_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join(".retired-gone");
        let target = dir.path().join("tiny");

        assert!(!restore_retired(&missing, &target));
        assert!(!target.exists());
        assert!(!discard_staging(&dir.path().join(".staging-gone")));

        let staging = dir.path().join(".staging-x");
        fs::create_dir(&staging).unwrap();
        fs::write(staging.join("partial.gguf"), b"GG").unwrap();
        assert!(discard_staging(&staging));
        assert!(!staging.exists());
    }
}
