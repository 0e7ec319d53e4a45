//! llama-cpp-2 backend for GGUF inference.
//!
//! Model loading, context creation, and token generation
//! via the llama-cpp-2 Rust bindings.

use std::num::NonZeroU32;
use std::path::Path;
use std::sync::OnceLock;

use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::context::LlamaContext;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::{AddBos, LlamaModel};
use llama_cpp_2::sampling::LlamaSampler;
use llama_cpp_2::token::LlamaToken;
use parking_lot::Mutex;

use crate::engine::{
    AccelerationConfig, GenerationParams, InferenceError, LoadError, ModelBackend,
};

// llama.cpp allows a single backend init per process; every model shares it.
static BACKEND: OnceLock<LlamaBackend> = OnceLock::new();
static BACKEND_INIT: Mutex<()> = parking_lot::const_mutex(());

fn shared_backend() -> Result<&'static LlamaBackend, LoadError> {
    if let Some(backend) = BACKEND.get() {
        return Ok(backend);
    }
    let _guard = BACKEND_INIT.lock();
    if let Some(backend) = BACKEND.get() {
        return Ok(backend);
    }
    let backend = LlamaBackend::init()
        .map_err(|e| LoadError::Backend(format!("backend init: {e}")))?;
    Ok(BACKEND.get_or_init(|| backend))
}

/// Holds one loaded llama-cpp-2 model.
pub struct LlamaBackendInner {
    backend: &'static LlamaBackend,
    model: LlamaModel,
    n_ctx: u32,
    n_threads: i32,
}

// SAFETY: LlamaModel is immutable after load; each generate call builds its own context.
unsafe impl Send for LlamaBackendInner {}
unsafe impl Sync for LlamaBackendInner {}

impl LlamaBackendInner {
    /// Load a GGUF model from disk.
    pub fn load(path: &Path, config: &AccelerationConfig) -> Result<Self, LoadError> {
        config.validate()?;
        if !path.is_file() {
            return Err(LoadError::FileMissing(path.to_path_buf()));
        }
        let backend = shared_backend()?;
        let model_params = LlamaModelParams::default().with_n_gpu_layers(config.gpu_layers);
        let model = LlamaModel::load_from_file(backend, path, &model_params)
            .map_err(|e| LoadError::Backend(format!("load: {e}")))?;
        let n_threads = resolve_threads(config.thread_count);
        Ok(Self { backend, model, n_ctx: config.n_ctx, n_threads })
    }

    fn tokenize(&self, text: &str) -> Result<Vec<LlamaToken>, InferenceError> {
        self.model
            .str_to_token(text, AddBos::Always)
            .map_err(|e| InferenceError::InputValidation(format!("tokenize: {e}")))
    }

    fn create_context(&self) -> Result<LlamaContext<'_>, InferenceError> {
        let p = LlamaContextParams::default()
            .with_n_ctx(NonZeroU32::new(self.n_ctx))
            .with_n_threads(self.n_threads)
            .with_n_threads_batch(self.n_threads);
        self.model
            .new_context(self.backend, p)
            .map_err(|e| InferenceError::ModelError(format!("ctx: {e}")))
    }

    fn sample_loop(
        &self,
        ctx: &mut LlamaContext<'_>,
        tokens: &[LlamaToken],
        params: &GenerationParams,
    ) -> Result<String, InferenceError> {
        let mut batch = LlamaBatch::new(tokens.len(), 1);
        add_seq(&mut batch, tokens)?;
        decode(ctx, &mut batch)?;
        let mut sampler = build_sampler();
        sampler.accept_many(tokens.iter().copied());

        let mut dec = encoding_rs::UTF_8.new_decoder();
        let mut out = String::new();
        let mut pos = i32::try_from(tokens.len()).unwrap_or(i32::MAX);
        for _ in 0..params.max_tokens {
            // -1 samples from the last token that had logits computed
            let tok = sampler.sample(ctx, -1);
            sampler.accept(tok);
            if self.model.is_eog_token(tok) {
                break;
            }
            let piece = self
                .model
                .token_to_piece(tok, &mut dec, false, None)
                .map_err(|e| InferenceError::ModelError(format!("detok: {e}")))?;
            out.push_str(&piece);
            if params.stop.iter().any(|s| !s.is_empty() && out.contains(s.as_str())) {
                break;
            }
            batch.clear();
            add_one(&mut batch, tok, pos)?;
            decode(ctx, &mut batch)?;
            pos += 1;
        }
        Ok(params.apply_stop(&out))
    }
}

impl ModelBackend for LlamaBackendInner {
    fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String, InferenceError> {
        params.validate()?;
        let tokens = self.tokenize(prompt)?;
        let mut ctx = self.create_context()?;
        self.sample_loop(&mut ctx, &tokens, params)
    }

    fn memory_usage(&self) -> usize {
        usize::try_from(self.model.size()).unwrap_or(usize::MAX)
    }

    fn close(self: Box<Self>) -> Result<(), InferenceError> {
        // LlamaModel frees its weights on drop.
        drop(self);
        Ok(())
    }
}

fn add_seq(batch: &mut LlamaBatch, tokens: &[LlamaToken]) -> Result<(), InferenceError> {
    // Only the last prompt token needs logits
    let n = tokens.len();
    for (i, &tok) in tokens.iter().enumerate() {
        let logits = i + 1 == n;
        let pos = i32::try_from(i).unwrap_or(i32::MAX);
        batch
            .add(tok, pos, &[0], logits)
            .map_err(|e| InferenceError::ModelError(format!("batch: {e}")))?;
    }
    Ok(())
}

fn add_one(batch: &mut LlamaBatch, tok: LlamaToken, pos: i32) -> Result<(), InferenceError> {
    batch
        .add(tok, pos, &[0], true)
        .map_err(|e| InferenceError::ModelError(format!("batch: {e}")))
}

fn decode(ctx: &mut LlamaContext<'_>, batch: &mut LlamaBatch) -> Result<(), InferenceError> {
    ctx.decode(batch)
        .map_err(|e| InferenceError::ModelError(format!("decode: {e}")))
}

fn build_sampler() -> LlamaSampler {
    LlamaSampler::chain_simple([
        LlamaSampler::penalties(64, 1.1, 0.0, 0.0),
        LlamaSampler::top_k(40),
        LlamaSampler::top_p(0.95, 1),
        LlamaSampler::temp(0.8),
        LlamaSampler::dist(42),
    ])
}

/// `thread_count` is validated non-zero before a backend is opened.
fn resolve_threads(n: u32) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}
