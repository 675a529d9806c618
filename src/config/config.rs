use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 本地模型配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// 模型文件目录（递归扫描）
    pub models_dir: PathBuf,
    /// 识别的模型文件扩展名
    pub extensions: Vec<String>,
    /// 同时驻留内存的模型数上限
    pub max_resident: usize,
    /// 系统内存使用率上限（百分比）
    pub memory_threshold_percent: f64,
    /// 上下文长度
    pub n_ctx: u32,
    /// 推理线程数
    pub n_threads: u32,
    /// GPU 卸载层数，0 表示纯 CPU
    pub n_gpu_layers: u32,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("./models"),
            extensions: vec!["gguf".into()],
            max_resident: 3,
            memory_threshold_percent: 85.0,
            n_ctx: 2048,
            n_threads: 4,
            n_gpu_layers: 0,
        }
    }
}

/// 思维超图配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HotConfig {
    /// 提示词上下文最多包含的节点数
    pub max_context_nodes: usize,
    /// 提示词上下文的 token 预算（按空白分词计数）
    pub max_context_tokens: usize,
    /// 新超边的默认权重
    pub default_edge_weight: f64,
    /// 新节点的默认相关度
    pub default_node_relevance: f64,
}

impl Default for HotConfig {
    fn default() -> Self {
        Self {
            max_context_nodes: 5,
            max_context_tokens: 512,
            default_edge_weight: 0.5,
            default_node_relevance: 0.5,
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: String,
    /// 结构化日志格式
    pub structured: bool,
    /// 日志文件目录，未设置时输出到 stdout
    pub log_dir: Option<PathBuf>,
    /// 日志文件名前缀
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            structured: false,
            log_dir: None,
            file_prefix: "crossdebate".into(),
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 本地模型配置
    pub models: ModelsConfig,
    /// 思维超图配置
    pub hot: HotConfig,
    /// 日志配置
    pub logging: LoggingConfig,
    /// 应用名称
    pub app_name: String,
    /// 环境
    pub environment: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::development()
    }
}

impl AppConfig {
    /// 创建开发环境配置
    pub fn development() -> Self {
        Self {
            models: ModelsConfig::default(),
            hot: HotConfig::default(),
            logging: LoggingConfig {
                level: "debug".into(),
                structured: false,
                log_dir: None,
                file_prefix: "crossdebate".into(),
            },
            app_name: "crossdebate".into(),
            environment: "development".into(),
        }
    }

    /// 创建生产环境配置
    pub fn production() -> Self {
        let mut config = Self::development();
        config.environment = "production".into();
        config.logging.level = "info".into();
        config.logging.structured = true;
        config.logging.log_dir = Some(PathBuf::from("./logs"));
        config.models.n_threads = std::thread::available_parallelism()
            .map(|p| p.get() as u32)
            .unwrap_or(4);
        config
    }
}
