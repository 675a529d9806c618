//! 错误处理模块
//!
//! 定义应用程序的错误类型和错误分类逻辑。

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 应用程序错误类型
#[derive(Error, Debug)]
pub enum AppError {
    /// 模型目录中找不到该模型
    #[error("模型不存在: {0}")]
    ModelNotFound(String),

    /// 原生模型句柄构造失败
    #[error("模型加载失败: {0}")]
    ModelLoadFailed(String),

    /// 原生推理（补全/嵌入）失败
    #[error("推理失败: {0}")]
    Generation(String),

    /// 驱逐全部缓存后仍无法满足容量或内存约束
    #[error("资源耗尽: {0}")]
    ResourceExhausted(String),

    /// 超边引用了不存在的节点
    #[error("未知节点: {0}")]
    UnknownNode(String),

    /// 超边去重后成员不足两个
    #[error("超边至少需要 2 个不同节点，实际 {0} 个")]
    InsufficientNodes(usize),

    /// 取值越界或不合法
    #[error("无效取值: {0}")]
    InvalidValue(String),

    /// 节点或超边不存在
    #[error("资源不存在: {0}")]
    NotFound(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    Serialization(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Serialization(e.to_string())
    }
}

impl From<figment::Error> for AppError {
    fn from(e: figment::Error) -> Self {
        AppError::Config(e.to_string())
    }
}

impl From<prometheus::Error> for AppError {
    fn from(e: prometheus::Error) -> Self {
        AppError::Internal(format!("metrics: {}", e))
    }
}

/// 错误类别
///
/// 调用方据此决定重试或向用户报告，核心内部不做任何重试。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    ResourceExhausted,
    LoadFailed,
    OperationFailed,
    Internal,
}

impl AppError {
    /// 错误所属类别
    pub fn kind(&self) -> ErrorKind {
        self.into()
    }

    /// 稳定的错误代码
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ModelNotFound(_) => "MODEL_NOT_FOUND",
            AppError::ModelLoadFailed(_) => "MODEL_LOAD_FAILED",
            AppError::Generation(_) => "GENERATION_FAILED",
            AppError::ResourceExhausted(_) => "RESOURCE_EXHAUSTED",
            AppError::UnknownNode(_) => "UNKNOWN_NODE",
            AppError::InsufficientNodes(_) => "INSUFFICIENT_NODES",
            AppError::InvalidValue(_) => "INVALID_VALUE",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// 错误类别映射
impl From<&AppError> for ErrorKind {
    fn from(err: &AppError) -> ErrorKind {
        match err {
            AppError::ModelNotFound(_) | AppError::NotFound(_) | AppError::UnknownNode(_) => {
                ErrorKind::NotFound
            }
            AppError::InsufficientNodes(_) | AppError::InvalidValue(_) => ErrorKind::InvalidInput,
            AppError::ResourceExhausted(_) => ErrorKind::ResourceExhausted,
            AppError::ModelLoadFailed(_) => ErrorKind::LoadFailed,
            AppError::Generation(_) => ErrorKind::OperationFailed,
            _ => ErrorKind::Internal,
        }
    }
}

/// 错误响应
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// 错误代码
    pub code: String,
    /// 错误类别
    pub kind: ErrorKind,
    /// 错误消息
    pub message: String,
    /// 详细信息
    pub details: Option<String>,
}

impl ErrorResponse {
    /// 添加详细信息
    pub fn with_details(mut self, details: &str) -> Self {
        self.details = Some(details.to_string());
        self
    }
}

impl From<&AppError> for ErrorResponse {
    fn from(err: &AppError) -> Self {
        Self {
            code: err.code().to_string(),
            kind: err.kind(),
            message: err.to_string(),
            details: None,
        }
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, AppError>;
