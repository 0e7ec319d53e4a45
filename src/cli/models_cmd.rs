// Copyright 2024-2026 lm-runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! `models list`: print the names in the artifact store.
//!
//! Reads the store directly, so it works whether or not a server is running.

use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::config;
use crate::models::{ArtifactStore, ModelName};

/// Returns exit code: 0 on success, 1 when the store cannot be read.
pub fn run_list(models_dir: Option<PathBuf>) -> i32 {
    let dir = models_dir.unwrap_or_else(|| config::load_with_dotenv().models_dir);
    let store = ArtifactStore::new(dir);
    match store.list() {
        Ok(names) => {
            print!("{}", format_models(&store, &names));
            0
        }
        Err(e) => {
            eprintln!("Error reading {}: {}", store.root().display(), e);
            1
        }
    }
}

/// One line per model: name and the file `load` would open.
pub fn format_models(store: &ArtifactStore, names: &BTreeSet<ModelName>) -> String {
    if names.is_empty() {
        return format!("No models in {}\n", store.root().display());
    }

    let mut out = format!("{:<30} {}\n", "NAME", "FILE");
    for name in names {
        let file = store
            .resolve(name)
            .ok()
            .and_then(|p| p.file_name().map(|f| f.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!("{:<30} {}\n", truncate(name.as_str(), 29), file));
    }
    out.push_str(&format!("{} model(s)\n", names.len()));
    out
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let out = format_models(&store, &BTreeSet::new());
        assert!(out.starts_with("No models in"));
    }

    #[test]
    fn test_format_lists_resolved_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("tiny")).unwrap();
        std::fs::write(dir.path().join("tiny").join("tiny-q4.gguf"), b"GGUF").unwrap();
        let store = ArtifactStore::new(dir.path());
        let names = store.list().unwrap();
        let out = format_models(&store, &names);
        assert!(out.contains("tiny"));
        assert!(out.contains("tiny-q4.gguf"));
        assert!(out.ends_with("1 model(s)\n"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("abcdef", 3), "abc");
        assert_eq!(truncate("ab", 3), "ab");
    }
}
