//! 基于 llama-cpp-2 的 GGUF 模型后端（`llama` 特性）

use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::{AddBos, LlamaModel, Special};
use llama_cpp_2::sampling::LlamaSampler;
use std::num::NonZeroU32;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{AppError, Result};
use crate::inference::backend::{Completion, CompletionParams, LoadParams, ModelLoader, NativeModel};

/// llama.cpp 加载器
///
/// 后端在进程内只能初始化一次，由加载器持有并与所有模型共享。
pub struct LlamaCppLoader {
    backend: Arc<LlamaBackend>,
}

impl LlamaCppLoader {
    pub fn new() -> Result<Self> {
        let backend = LlamaBackend::init()
            .map_err(|e| AppError::ModelLoadFailed(format!("llama backend init: {}", e)))?;
        Ok(Self {
            backend: Arc::new(backend),
        })
    }
}

impl ModelLoader for LlamaCppLoader {
    fn load(&self, path: &Path, params: &LoadParams) -> Result<Box<dyn NativeModel>> {
        let model_params = LlamaModelParams::default().with_n_gpu_layers(params.n_gpu_layers);
        let model = LlamaModel::load_from_file(&self.backend, path, &model_params)
            .map_err(|e| AppError::ModelLoadFailed(format!("{}: {}", path.display(), e)))?;

        info!(
            n_vocab = model.n_vocab(),
            n_embd = model.n_embd(),
            "GGUF model loaded from {}",
            path.display()
        );

        Ok(Box::new(LlamaNativeModel {
            backend: Arc::clone(&self.backend),
            model,
            params: *params,
        }))
    }
}

struct LlamaNativeModel {
    backend: Arc<LlamaBackend>,
    model: LlamaModel,
    params: LoadParams,
}

// SAFETY: the model is only reached through the cache mutex, one caller at a time.
unsafe impl Send for LlamaNativeModel {}

impl LlamaNativeModel {
    fn context_params(&self) -> LlamaContextParams {
        let threads = self.params.n_threads as i32;
        LlamaContextParams::default()
            .with_n_ctx(NonZeroU32::new(self.params.n_ctx))
            .with_n_threads(threads)
            .with_n_threads_batch(threads)
    }
}

fn inference_error(stage: &str, e: impl std::fmt::Display) -> AppError {
    AppError::Generation(format!("{}: {}", stage, e))
}

impl NativeModel for LlamaNativeModel {
    fn complete(&self, prompt: &str, params: &CompletionParams) -> Result<Completion> {
        let mut ctx = self
            .model
            .new_context(&self.backend, self.context_params())
            .map_err(|e| inference_error("create context", e))?;

        let tokens = self
            .model
            .str_to_token(prompt, AddBos::Always)
            .map_err(|e| inference_error("tokenize", e))?;
        if tokens.len() >= self.params.n_ctx as usize {
            return Err(AppError::Generation(format!(
                "prompt has {} tokens, context length is {}",
                tokens.len(),
                self.params.n_ctx
            )));
        }

        let mut batch = LlamaBatch::new(self.params.n_ctx as usize, 1);
        let last = tokens.len().saturating_sub(1);
        for (i, token) in tokens.iter().enumerate() {
            batch
                .add(*token, i as i32, &[0], i == last)
                .map_err(|e| inference_error("batch add", e))?;
        }
        ctx.decode(&mut batch)
            .map_err(|e| inference_error("decode prompt", e))?;

        let mut sampler = LlamaSampler::chain_simple([
            LlamaSampler::temp(params.temperature),
            LlamaSampler::top_p(params.top_p, 1),
            LlamaSampler::dist(0),
        ]);

        let mut output = String::new();
        let mut generated = 0u32;
        let mut position = tokens.len() as i32;

        while generated < params.max_tokens {
            let token = sampler.sample(&ctx, batch.n_tokens() - 1);
            sampler.accept(token);
            if self.model.is_eog_token(token) {
                break;
            }

            let piece = self
                .model
                .token_to_str(token, Special::Tokenize)
                .map_err(|e| inference_error("detokenize", e))?;
            output.push_str(&piece);
            generated += 1;

            if let Some(cut) = params.stop.iter().filter_map(|s| output.find(s.as_str())).min() {
                output.truncate(cut);
                break;
            }

            batch.clear();
            batch
                .add(token, position, &[0], true)
                .map_err(|e| inference_error("batch add", e))?;
            ctx.decode(&mut batch)
                .map_err(|e| inference_error("decode", e))?;
            position += 1;
        }

        debug!(completion_tokens = generated, "llama completion finished");
        Ok(Completion {
            text: output,
            completion_tokens: Some(generated),
        })
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut ctx = self
            .model
            .new_context(&self.backend, self.context_params().with_embeddings(true))
            .map_err(|e| inference_error("create context", e))?;

        let tokens = self
            .model
            .str_to_token(text, AddBos::Always)
            .map_err(|e| inference_error("tokenize", e))?;

        let mut batch = LlamaBatch::new(tokens.len().max(1), 1);
        batch
            .add_sequence(&tokens, 0, false)
            .map_err(|e| inference_error("batch add", e))?;
        ctx.decode(&mut batch)
            .map_err(|e| inference_error("decode", e))?;

        let embedding = ctx
            .embeddings_seq_ith(0)
            .map_err(|e| inference_error("read embeddings", e))?;
        Ok(embedding.to_vec())
    }
}
