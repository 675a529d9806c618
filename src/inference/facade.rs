//! 推理门面
//!
//! 在模型缓存之上提供文本生成与嵌入，把缓存、加载与原生错误统一收窄为
//! [`GenerationError`]，并记录每次调用的耗时。

use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::error::{AppError, ErrorKind};
use crate::inference::backend::{CompletionParams, GenerationOptions};
use crate::inference::cache::ModelCache;
use crate::models::{ModelEntry, ModelInfo};
use crate::observability::InferenceMetrics;

/// 门面层错误
///
/// 底层原因保留在 `source` 中，可通过 [`GenerationError::kind`] 区分
/// 模型不存在、加载失败与推理失败。
#[derive(Error, Debug)]
#[error("模型 '{model}' 推理失败: {source}")]
pub struct GenerationError {
    pub model: String,
    #[source]
    pub source: AppError,
}

impl GenerationError {
    fn new(model: &str, source: AppError) -> Self {
        Self {
            model: model.to_string(),
            source,
        }
    }

    /// 底层原因的类别
    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }
}

impl From<GenerationError> for AppError {
    fn from(e: GenerationError) -> Self {
        match e.source {
            AppError::Generation(_) => e.source,
            other => AppError::Generation(format!("{}: {}", e.model, other)),
        }
    }
}

/// 推理门面
pub struct InferenceFacade {
    cache: Arc<ModelCache>,
    metrics: Arc<InferenceMetrics>,
    defaults: CompletionParams,
}

impl InferenceFacade {
    pub fn new(cache: Arc<ModelCache>, metrics: Arc<InferenceMetrics>) -> Self {
        Self {
            cache,
            metrics,
            defaults: CompletionParams::default(),
        }
    }

    /// 替换默认补全参数
    pub fn with_defaults(mut self, defaults: CompletionParams) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn cache(&self) -> &Arc<ModelCache> {
        &self.cache
    }

    /// 使用指定模型生成文本
    pub fn generate(
        &self,
        model_name: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, GenerationError> {
        debug!(
            "Generating with model '{}', prompt: '{}'",
            model_name,
            preview(prompt)
        );
        let start = Instant::now();
        let params = options.merge_into(self.defaults.clone());

        let result = self.cache.get_or_load(model_name).and_then(|model| {
            let completion = model.complete(prompt, &params)?;
            let text = if params.echo {
                format!("{}{}", prompt, completion.text)
            } else {
                completion.text
            };
            Ok((text.trim().to_string(), completion.completion_tokens))
        });

        let duration = start.elapsed();
        self.metrics
            .record_request("generate", duration, result.is_ok());

        match result {
            Ok((text, tokens)) => {
                info!(
                    duration_ms = millis(duration),
                    completion_tokens = tokens,
                    "Response generated by '{}'",
                    model_name
                );
                Ok(text)
            }
            Err(e) => {
                error!(
                    duration_ms = millis(duration),
                    "Generation with '{}' failed: {}", model_name, e
                );
                Err(GenerationError::new(model_name, e))
            }
        }
    }

    /// 使用指定模型计算文本嵌入
    pub fn embed(&self, model_name: &str, text: &str) -> Result<Vec<f32>, GenerationError> {
        debug!(
            "Embedding with model '{}', text: '{}'",
            model_name,
            preview(text)
        );
        let start = Instant::now();

        let result = self
            .cache
            .get_or_load(model_name)
            .and_then(|model| model.embed(text));

        let duration = start.elapsed();
        self.metrics.record_request("embed", duration, result.is_ok());

        match result {
            Ok(embedding) => {
                info!(
                    duration_ms = millis(duration),
                    dimension = embedding.len(),
                    "Embedding generated by '{}'",
                    model_name
                );
                Ok(embedding)
            }
            Err(e) => {
                error!(
                    duration_ms = millis(duration),
                    "Embedding with '{}' failed: {}", model_name, e
                );
                Err(GenerationError::new(model_name, e))
            }
        }
    }

    /// 在阻塞线程池中执行 [`InferenceFacade::generate`]
    pub async fn generate_async(
        self: &Arc<Self>,
        model_name: String,
        prompt: String,
        options: GenerationOptions,
    ) -> Result<String, GenerationError> {
        let facade = Arc::clone(self);
        let model = model_name.clone();
        tokio::task::spawn_blocking(move || facade.generate(&model_name, &prompt, &options))
            .await
            .map_err(|e| GenerationError::new(&model, AppError::Internal(e.to_string())))?
    }

    /// 在阻塞线程池中执行 [`InferenceFacade::embed`]
    pub async fn embed_async(
        self: &Arc<Self>,
        model_name: String,
        text: String,
    ) -> Result<Vec<f32>, GenerationError> {
        let facade = Arc::clone(self);
        let model = model_name.clone();
        tokio::task::spawn_blocking(move || facade.embed(&model_name, &text))
            .await
            .map_err(|e| GenerationError::new(&model, AppError::Internal(e.to_string())))?
    }

    /// 重新扫描并列出所有模型
    pub fn list_models(&self) -> Vec<ModelEntry> {
        let catalog = self.cache.catalog();
        catalog.scan();
        catalog.entries()
    }

    /// 单个模型详情
    pub fn model_info(&self, model_name: &str) -> crate::error::Result<ModelInfo> {
        self.cache.info(model_name)
    }
}

impl std::fmt::Debug for InferenceFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceFacade")
            .field("cache", &self.cache)
            .field("defaults", &self.defaults)
            .finish()
    }
}

fn preview(text: &str) -> String {
    text.chars().take(50).collect()
}

fn millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}
