use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// 模型加载状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    /// 未加载
    #[default]
    Unloaded,
    /// 加载中
    Loading,
    /// 已加载（驻留内存）
    Loaded,
    /// 上次加载失败
    Error,
}

impl fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModelStatus::Unloaded => "unloaded",
            ModelStatus::Loading => "loading",
            ModelStatus::Loaded => "loaded",
            ModelStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// 模型目录条目
///
/// `name` 取自模型文件的文件名（不含扩展名）。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelEntry {
    /// 模型名称
    pub name: String,
    /// 模型文件路径
    pub path: PathBuf,
    /// 加载状态
    pub status: ModelStatus,
}

/// 模型详情
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// 模型名称
    pub name: String,
    /// 模型文件路径
    pub path: PathBuf,
    /// 加载状态
    pub status: ModelStatus,
    /// 文件大小（字节）
    pub size_bytes: u64,
    /// 最后修改时间
    pub last_modified: Option<DateTime<Utc>>,
    /// 是否驻留在缓存中
    pub resident: bool,
}
