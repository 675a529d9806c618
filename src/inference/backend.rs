//! 原生模型后端抽象
//!
//! 缓存只通过这两个 trait 与具体推理库交互：[`ModelLoader`] 负责构造句柄，
//! [`NativeModel`] 负责补全与嵌入。句柄由缓存独占，驱逐时随条目一起 drop。

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::ModelsConfig;
use crate::error::{AppError, Result};

/// 加载参数（进程级配置，不随调用变化）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadParams {
    pub n_ctx: u32,
    pub n_threads: u32,
    pub n_gpu_layers: u32,
}

impl From<&ModelsConfig> for LoadParams {
    fn from(config: &ModelsConfig) -> Self {
        Self {
            n_ctx: config.n_ctx,
            n_threads: config.n_threads,
            n_gpu_layers: config.n_gpu_layers,
        }
    }
}

/// 补全参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionParams {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub stop: Vec<String>,
    pub echo: bool,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            max_tokens: 150,
            temperature: 0.7,
            top_p: 0.9,
            stop: vec!["\n".into(), "Human:".into(), "User:".into()],
            echo: false,
        }
    }
}

/// 调用方可覆盖的生成选项，未设置的字段取默认值
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub stop: Option<Vec<String>>,
    pub echo: Option<bool>,
}

impl GenerationOptions {
    /// 合并到默认参数之上
    pub fn merge_into(&self, mut params: CompletionParams) -> CompletionParams {
        if let Some(max_tokens) = self.max_tokens {
            params.max_tokens = max_tokens;
        }
        if let Some(temperature) = self.temperature {
            params.temperature = temperature;
        }
        if let Some(top_p) = self.top_p {
            params.top_p = top_p;
        }
        if let Some(stop) = &self.stop {
            params.stop = stop.clone();
        }
        if let Some(echo) = self.echo {
            params.echo = echo;
        }
        params
    }
}

/// 补全结果
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub completion_tokens: Option<u32>,
}

/// 已加载的原生模型句柄
pub trait NativeModel: Send {
    /// 文本补全
    fn complete(&self, prompt: &str, params: &CompletionParams) -> Result<Completion>;

    /// 文本嵌入
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// 原生模型构造器
pub trait ModelLoader: Send + Sync {
    /// 从模型文件构造句柄，失败时返回 [`AppError::ModelLoadFailed`]
    fn load(&self, path: &Path, params: &LoadParams) -> Result<Box<dyn NativeModel>>;
}

/// 未编译任何原生后端时使用的加载器
#[derive(Debug, Default)]
pub struct UnavailableLoader;

impl ModelLoader for UnavailableLoader {
    fn load(&self, path: &Path, _params: &LoadParams) -> Result<Box<dyn NativeModel>> {
        Err(AppError::ModelLoadFailed(format!(
            "{}: no native backend compiled in (enable the `llama` feature)",
            path.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_options_override_defaults() {
        let options = GenerationOptions {
            max_tokens: Some(32),
            temperature: Some(0.1),
            stop: Some(vec![]),
            ..Default::default()
        };
        let params = options.merge_into(CompletionParams::default());

        assert_eq!(params.max_tokens, 32);
        assert_eq!(params.temperature, 0.1);
        assert_eq!(params.top_p, 0.9);
        assert!(params.stop.is_empty());
        assert!(!params.echo);
    }

    #[test]
    fn test_empty_options_keep_defaults() {
        let params = GenerationOptions::default().merge_into(CompletionParams::default());
        assert_eq!(params, CompletionParams::default());
    }

    #[test]
    fn test_unavailable_loader_reports_load_failure() {
        let params = LoadParams {
            n_ctx: 2048,
            n_threads: 4,
            n_gpu_layers: 0,
        };
        let result = UnavailableLoader.load(Path::new("/models/a.gguf"), &params);
        assert!(matches!(result, Err(AppError::ModelLoadFailed(_))));
    }
}
