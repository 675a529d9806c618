use crate::config::config::{AppConfig, HotConfig, ModelsConfig};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};

/// 环境变量前缀，嵌套键用 `__` 分隔，如 `CROSSDEBATE_MODELS__MAX_RESIDENT=2`
pub const ENV_PREFIX: &str = "CROSSDEBATE_";

/// 配置加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 从默认路径加载配置
    ///
    /// 合并顺序：
    /// 1. 内置默认值
    /// 2. ./crossdebate.toml
    /// 3. 环境变量
    pub fn load() -> Result<AppConfig, figment::Error> {
        Self::load_from(default_config_path())
    }

    /// 从指定路径加载配置
    pub fn load_from(path: impl AsRef<Path>) -> Result<AppConfig, figment::Error> {
        Self::figment(path.as_ref()).extract()
    }

    /// 仅加载模型配置
    pub fn load_models_config(path: impl AsRef<Path>) -> Result<ModelsConfig, figment::Error> {
        Self::figment(path.as_ref()).extract_inner("models")
    }

    /// 仅加载思维超图配置
    pub fn load_hot_config(path: impl AsRef<Path>) -> Result<HotConfig, figment::Error> {
        Self::figment(path.as_ref()).extract_inner("hot")
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// 验证配置
    pub fn validate(config: &AppConfig) -> Result<(), ConfigValidationError> {
        let models = &config.models;
        if models.max_resident == 0 {
            return Err(ConfigValidationError::InvalidMaxResident);
        }

        if !(models.memory_threshold_percent > 0.0 && models.memory_threshold_percent <= 100.0) {
            return Err(ConfigValidationError::InvalidMemoryThreshold(
                models.memory_threshold_percent,
            ));
        }

        if models.n_ctx < 512 {
            return Err(ConfigValidationError::InvalidContextLength(models.n_ctx));
        }

        if models.n_threads == 0 {
            return Err(ConfigValidationError::InvalidThreadCount);
        }

        if models.extensions.is_empty() {
            return Err(ConfigValidationError::MissingExtensions);
        }

        let hot = &config.hot;
        if hot.max_context_nodes == 0 || hot.max_context_tokens == 0 {
            return Err(ConfigValidationError::InvalidContextBudget);
        }

        for (name, value) in [
            ("default_edge_weight", hot.default_edge_weight),
            ("default_node_relevance", hot.default_node_relevance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigValidationError::OutOfUnitRange(name.to_string(), value));
            }
        }

        Ok(())
    }
}

/// 配置验证错误
#[derive(thiserror::Error, Debug)]
pub enum ConfigValidationError {
    #[error("驻留模型上限无效，必须大于 0")]
    InvalidMaxResident,

    #[error("内存阈值无效: {0}，必须在 (0, 100] 之间")]
    InvalidMemoryThreshold(f64),

    #[error("上下文长度无效: {0}，必须不小于 512")]
    InvalidContextLength(u32),

    #[error("推理线程数无效，必须大于 0")]
    InvalidThreadCount,

    #[error("未配置模型文件扩展名")]
    MissingExtensions,

    #[error("上下文预算无效，节点数与 token 数都必须大于 0")]
    InvalidContextBudget,

    #[error("{0} 取值 {1} 超出 [0, 1]")]
    OutOfUnitRange(String, f64),
}

/// 获取默认配置文件路径
pub fn default_config_path() -> PathBuf {
    PathBuf::from("crossdebate.toml")
}
