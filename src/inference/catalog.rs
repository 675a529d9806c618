//! 模型目录
//!
//! 扫描模型目录，维护 名称 -> 路径 与 名称 -> 加载状态 两张表。

use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::models::{ModelEntry, ModelStatus};

#[derive(Debug, Default)]
struct CatalogState {
    paths: HashMap<String, PathBuf>,
    statuses: HashMap<String, ModelStatus>,
}

/// 模型目录
#[derive(Debug)]
pub struct ModelCatalog {
    models_dir: PathBuf,
    extensions: Vec<String>,
    state: RwLock<CatalogState>,
}

impl ModelCatalog {
    /// 创建目录并执行首次扫描
    pub fn new(models_dir: impl Into<PathBuf>, extensions: &[String]) -> Self {
        let catalog = Self {
            models_dir: models_dir.into(),
            extensions: extensions.iter().map(|e| e.to_ascii_lowercase()).collect(),
            state: RwLock::new(CatalogState::default()),
        };
        catalog.scan();
        catalog
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// 重新扫描模型目录
    ///
    /// 重建路径表；新出现的名称初始化为 `unloaded`，已有名称的状态保持不变，
    /// 已消失且处于 `unloaded` 的名称被移除。
    /// 目录不可读时目录变为空，只记录警告。返回发现的模型数。
    pub fn scan(&self) -> usize {
        debug!("Scanning models directory: {}", self.models_dir.display());

        let mut artifacts = Vec::new();
        if self.models_dir.is_dir() {
            self.collect_artifacts(&self.models_dir, &mut artifacts);
        } else {
            warn!(
                "Models directory {} is missing or not a directory",
                self.models_dir.display()
            );
        }
        // 同名文件按路径排序后取第一个，保证结果确定
        artifacts.sort();

        let mut found: HashMap<String, PathBuf> = HashMap::with_capacity(artifacts.len());
        for path in artifacts {
            let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            if let Some(existing) = found.get(&name) {
                warn!(
                    "Duplicate model name '{}': keeping {}, ignoring {}",
                    name,
                    existing.display(),
                    path.display()
                );
                continue;
            }
            found.insert(name, path);
        }

        let mut state = self.state.write();
        // 文件已消失的名称只保留仍在驻留或出错的状态
        state
            .statuses
            .retain(|name, status| found.contains_key(name) || *status != ModelStatus::Unloaded);
        for name in found.keys() {
            state
                .statuses
                .entry(name.clone())
                .or_insert(ModelStatus::Unloaded);
        }
        state.paths = found;

        let count = state.paths.len();
        info!("Model scan complete: {} artifacts found", count);
        count
    }

    fn collect_artifacts(&self, dir: &Path, out: &mut Vec<PathBuf>) {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot read models directory {}: {}", dir.display(), e);
                return;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                self.collect_artifacts(&path, out);
            } else if path.is_file() && self.is_artifact(&path) {
                out.push(path);
            }
        }
    }

    fn is_artifact(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
            .unwrap_or(false)
    }

    /// 解析模型路径，找不到时重新扫描一次
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        if let Some(path) = self.path(name).filter(|p| p.is_file()) {
            return Ok(path);
        }

        self.scan();
        self.path(name).filter(|p| p.is_file()).ok_or_else(|| {
            warn!(
                "Model '{}' not found in {}",
                name,
                self.models_dir.display()
            );
            AppError::ModelNotFound(name.to_string())
        })
    }

    /// 当前记录的路径（不触发扫描）
    pub fn path(&self, name: &str) -> Option<PathBuf> {
        self.state.read().paths.get(name).cloned()
    }

    /// 当前加载状态
    pub fn status(&self, name: &str) -> ModelStatus {
        self.state
            .read()
            .statuses
            .get(name)
            .copied()
            .unwrap_or_default()
    }

    pub(crate) fn set_status(&self, name: &str, status: ModelStatus) {
        self.state.write().statuses.insert(name.to_string(), status);
    }

    /// 列出已发现的模型（按名称排序，不触发扫描）
    pub fn entries(&self) -> Vec<ModelEntry> {
        let state = self.state.read();
        let mut entries: Vec<ModelEntry> = state
            .paths
            .iter()
            .map(|(name, path)| ModelEntry {
                name: name.clone(),
                path: path.clone(),
                status: state.statuses.get(name).copied().unwrap_or_default(),
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    pub fn len(&self) -> usize {
        self.state.read().paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
