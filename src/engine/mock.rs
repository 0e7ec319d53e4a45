//! Deterministic in-process backend.
//!
//! Used by tests and by builds without the `gguf` feature. Generation echoes
//! a canned continuation; counters expose how many backends are alive so
//! callers can assert there is never more than one.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::backend::{BackendLoader, ModelBackend};
use super::config::{AccelerationConfig, GenerationParams};
use super::error::{InferenceError, LoadError};

/// Marker that makes `MockLoader::open` reject a file as corrupt.
pub const CORRUPT_MARKER: &[u8] = b"CORRUPT";

#[derive(Debug, Default)]
struct Counters {
    live: AtomicUsize,
    peak_live: AtomicUsize,
    opened: AtomicU64,
    closed: AtomicU64,
    generations: AtomicU64,
}

/// Loader producing `MockBackend`s.
#[derive(Debug, Clone)]
pub struct MockLoader {
    counters: Arc<Counters>,
    fail_open: Arc<AtomicBool>,
    open_delay: Duration,
    generate_delay: Duration,
}

impl MockLoader {
    pub fn new() -> Self {
        Self {
            counters: Arc::new(Counters::default()),
            fail_open: Arc::new(AtomicBool::new(false)),
            open_delay: Duration::ZERO,
            generate_delay: Duration::ZERO,
        }
    }

    /// Sleep this long inside every `open`.
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    /// Sleep this long inside every `generate`.
    pub fn with_generate_delay(mut self, delay: Duration) -> Self {
        self.generate_delay = delay;
        self
    }

    /// Make subsequent `open` calls fail (simulates missing accelerator).
    pub fn set_fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Backends currently alive (opened, not yet closed or dropped).
    pub fn live(&self) -> usize {
        self.counters.live.load(Ordering::SeqCst)
    }

    /// Highest value `live` has ever reached.
    pub fn peak_live(&self) -> usize {
        self.counters.peak_live.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> u64 {
        self.counters.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> u64 {
        self.counters.closed.load(Ordering::SeqCst)
    }

    pub fn generations(&self) -> u64 {
        self.counters.generations.load(Ordering::SeqCst)
    }
}

impl Default for MockLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendLoader for MockLoader {
    fn kind(&self) -> &'static str {
        "mock"
    }

    fn open(
        &self,
        path: &Path,
        config: &AccelerationConfig,
    ) -> Result<Box<dyn ModelBackend>, LoadError> {
        config.validate()?;
        if !self.open_delay.is_zero() {
            std::thread::sleep(self.open_delay);
        }
        let bytes = std::fs::read(path).map_err(|_| LoadError::FileMissing(path.to_path_buf()))?;
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(LoadError::Backend("accelerator unavailable".into()));
        }
        if bytes.windows(CORRUPT_MARKER.len()).any(|w| w == CORRUPT_MARKER) {
            return Err(LoadError::Backend(format!("corrupt model file: {}", path.display())));
        }

        let label = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("model")
            .to_string();
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        let live = self.counters.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak_live.fetch_max(live, Ordering::SeqCst);

        Ok(Box::new(MockBackend {
            label,
            size: bytes.len(),
            generate_delay: self.generate_delay,
            counters: self.counters.clone(),
        }))
    }
}

/// Backend that answers with `"[<file stem>] <prompt words>..."`.
pub struct MockBackend {
    label: String,
    size: usize,
    generate_delay: Duration,
    counters: Arc<Counters>,
}

impl ModelBackend for MockBackend {
    fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String, InferenceError> {
        params.validate()?;
        if !self.generate_delay.is_zero() {
            std::thread::sleep(self.generate_delay);
        }
        self.counters.generations.fetch_add(1, Ordering::SeqCst);

        let continuation = format!("[{}] {}", self.label, prompt);
        let limit = usize::try_from(params.max_tokens).unwrap_or(usize::MAX);
        let words: Vec<&str> = continuation.split_whitespace().take(limit).collect();
        Ok(params.apply_stop(&format!(" {}", words.join(" "))))
    }

    fn memory_usage(&self) -> usize {
        self.size
    }

    fn close(self: Box<Self>) -> Result<(), InferenceError> {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.counters.live.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model_file(dir: &tempfile::TempDir, name: &str, body: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_open_and_close_track_live_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = model_file(&dir, "tiny.gguf", b"GGUF");
        let loader = MockLoader::new();

        let backend = loader.open(&path, &AccelerationConfig::default()).unwrap();
        assert_eq!(loader.live(), 1);
        backend.close().unwrap();
        assert_eq!(loader.live(), 0);
        assert_eq!(loader.closed(), 1);
    }

    #[test]
    fn test_generate_respects_max_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let path = model_file(&dir, "tiny.gguf", b"GGUF");
        let backend = MockLoader::new().open(&path, &AccelerationConfig::default()).unwrap();

        let text = backend
            .generate("one two three four", &GenerationParams::with_max_tokens(2))
            .unwrap();
        assert_eq!(text, " [tiny] one");
    }

    #[test]
    fn test_generate_stops_at_end_of_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let path = model_file(&dir, "tiny.gguf", b"GGUF");
        let backend = MockLoader::new().open(&path, &AccelerationConfig::default()).unwrap();

        let text = backend.generate("hi</s> ignored", &GenerationParams::default()).unwrap();
        assert_eq!(text, " [tiny] hi");
    }

    #[test]
    fn test_corrupt_and_missing_files_fail() {
        let dir = tempfile::tempdir().unwrap();
        let corrupt = model_file(&dir, "bad.gguf", b"GGUF CORRUPT");
        let loader = MockLoader::new();

        let err = loader.open(&corrupt, &AccelerationConfig::default()).err().unwrap();
        assert!(matches!(err, LoadError::Backend(_)));

        let err = loader
            .open(&dir.path().join("absent.gguf"), &AccelerationConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, LoadError::FileMissing(_)));
        assert_eq!(loader.live(), 0);
    }

    #[test]
    fn test_fail_open_toggle() {
        let dir = tempfile::tempdir().unwrap();
        let path = model_file(&dir, "tiny.gguf", b"GGUF");
        let loader = MockLoader::new();
        loader.set_fail_open(true);
        assert!(loader.open(&path, &AccelerationConfig::default()).is_err());
        loader.set_fail_open(false);
        assert!(loader.open(&path, &AccelerationConfig::default()).is_ok());
    }
}
