//! 模型资源缓存
//!
//! 按需加载原生模型句柄，限制驻留数量，并结合实时内存压力做 LRU 驱逐。
//!
//! 整个 `get_or_load` 以及随后对句柄的使用都在同一把互斥锁内完成：
//! 句柄以 [`ModelHandle`] 守卫的形式借出，守卫存活期间其他调用方无法驱逐它。
//! 代价是慢加载会阻塞包括缓存命中在内的所有缓存操作。

use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::ModelsConfig;
use crate::error::{AppError, Result};
use crate::inference::backend::{LoadParams, ModelLoader, NativeModel};
use crate::inference::catalog::ModelCatalog;
use crate::inference::memory::MemoryProbe;
use crate::models::{ModelInfo, ModelStatus};
use crate::observability::InferenceMetrics;

/// 借出的模型句柄，只在调用期间有效
pub type ModelHandle<'a> = MappedMutexGuard<'a, dyn NativeModel>;

/// 缓存条目
struct CacheEntry {
    handle: Box<dyn NativeModel>,
    /// 最近使用标记，加载视为首次使用
    last_used: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    clock: u64,
}

impl CacheState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn least_recently_used(&self) -> Option<String> {
        self.entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(name, _)| name.clone())
    }
}

/// 模型资源缓存
pub struct ModelCache {
    catalog: Arc<ModelCatalog>,
    loader: Arc<dyn ModelLoader>,
    memory: Arc<dyn MemoryProbe>,
    metrics: Arc<InferenceMetrics>,
    params: LoadParams,
    max_resident: usize,
    memory_threshold_percent: f64,
    state: Mutex<CacheState>,
}

impl ModelCache {
    pub fn new(
        config: &ModelsConfig,
        catalog: Arc<ModelCatalog>,
        loader: Arc<dyn ModelLoader>,
        memory: Arc<dyn MemoryProbe>,
        metrics: Arc<InferenceMetrics>,
    ) -> Self {
        info!(
            max_resident = config.max_resident,
            memory_threshold_percent = config.memory_threshold_percent,
            models_dir = %catalog.models_dir().display(),
            "Model cache initialized"
        );
        Self {
            catalog,
            loader,
            memory,
            metrics,
            params: LoadParams::from(config),
            max_resident: config.max_resident,
            memory_threshold_percent: config.memory_threshold_percent,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn catalog(&self) -> &Arc<ModelCatalog> {
        &self.catalog
    }

    /// 获取或加载模型
    ///
    /// 命中时刷新最近使用标记；未命中时先执行驱逐策略，再解析路径并构造句柄。
    pub fn get_or_load(&self, name: &str) -> Result<ModelHandle<'_>> {
        let mut state = self.state.lock();
        let now = state.tick();

        if let Some(entry) = state.entries.get_mut(name) {
            entry.last_used = now;
            self.metrics.record_cache_hit();
            debug!("Model '{}' served from cache", name);
        } else {
            self.metrics.record_cache_miss();
            self.enforce_capacity(&mut state)?;
            let handle = self.load(name)?;
            state.entries.insert(
                name.to_string(),
                CacheEntry {
                    handle,
                    last_used: now,
                },
            );
            self.metrics.set_resident(state.entries.len());
        }

        MutexGuard::try_map(state, |s| s.entries.get_mut(name).map(|e| e.handle.as_mut()))
            .map_err(|_| AppError::Internal(format!("model '{}' vanished from cache", name)))
    }

    fn load(&self, name: &str) -> Result<Box<dyn NativeModel>> {
        let path = self.catalog.resolve(name)?;
        info!("Loading model '{}' from {}", name, path.display());
        self.catalog.set_status(name, ModelStatus::Loading);

        let start = Instant::now();
        match self.loader.load(&path, &self.params) {
            Ok(handle) => {
                self.catalog.set_status(name, ModelStatus::Loaded);
                self.metrics.record_load();
                info!(
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Model '{}' loaded",
                    name
                );
                Ok(handle)
            }
            Err(e) => {
                self.catalog.set_status(name, ModelStatus::Error);
                error!("Failed to load model '{}': {}", name, e);
                Err(match e {
                    AppError::ModelLoadFailed(_) => e,
                    other => AppError::ModelLoadFailed(format!("{}: {}", name, other)),
                })
            }
        }
    }

    /// 驱逐策略
    ///
    /// 只要驻留数达到上限或系统内存使用率超过阈值，就驱逐最久未使用的条目。
    /// 缓存已空而条件仍成立时返回 [`AppError::ResourceExhausted`]。
    fn enforce_capacity(&self, state: &mut CacheState) -> Result<()> {
        loop {
            let resident = state.entries.len();
            let used_percent = self.memory.used_percent();
            let over_capacity = resident >= self.max_resident;
            let over_memory = used_percent > self.memory_threshold_percent;

            if !over_capacity && !over_memory {
                return Ok(());
            }

            let Some(victim) = state.least_recently_used() else {
                warn!(
                    used_percent,
                    threshold = self.memory_threshold_percent,
                    "Resource limits exceeded with no model left to evict"
                );
                return Err(AppError::ResourceExhausted(format!(
                    "memory usage {:.1}% exceeds {:.1}% (resident {}, max {})",
                    used_percent, self.memory_threshold_percent, resident, self.max_resident
                )));
            };

            if let Some(entry) = state.entries.remove(&victim) {
                // 先释放原生资源，再更新目录状态
                drop(entry);
            }
            self.catalog.set_status(&victim, ModelStatus::Unloaded);
            self.metrics.record_eviction();
            self.metrics.set_resident(state.entries.len());

            if over_memory {
                warn!(
                    used_percent,
                    "Model '{}' evicted under memory pressure (LRU)", victim
                );
            } else {
                info!("Model '{}' evicted to respect cache capacity (LRU)", victim);
            }
        }
    }

    /// 查询模型的目录与驻留信息，不做任何修改
    ///
    /// 文件已从目录中消失但模型仍驻留时，只报告驻留信息。
    pub fn info(&self, name: &str) -> Result<ModelInfo> {
        let resident = self.is_resident(name);
        let Some(path) = self.catalog.path(name) else {
            if !resident {
                return Err(AppError::ModelNotFound(name.to_string()));
            }
            debug!("Model '{}' is resident but no longer in the catalog", name);
            return Ok(ModelInfo {
                name: name.to_string(),
                path: PathBuf::new(),
                status: self.catalog.status(name),
                size_bytes: 0,
                last_modified: None,
                resident,
            });
        };
        let metadata = std::fs::metadata(&path).ok();

        Ok(ModelInfo {
            name: name.to_string(),
            status: self.catalog.status(name),
            size_bytes: metadata.as_ref().map(|m| m.len()).unwrap_or(0),
            last_modified: metadata
                .and_then(|m| m.modified().ok())
                .map(chrono::DateTime::<chrono::Utc>::from),
            resident,
            path,
        })
    }

    pub fn is_resident(&self, name: &str) -> bool {
        self.state.lock().entries.contains_key(name)
    }

    pub fn resident_count(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// 驻留模型名称，最久未使用的在前
    pub fn resident_names(&self) -> Vec<String> {
        let state = self.state.lock();
        let mut names: Vec<(&String, u64)> = state
            .entries
            .iter()
            .map(|(name, entry)| (name, entry.last_used))
            .collect();
        names.sort_by_key(|(_, last_used)| *last_used);
        names.into_iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn max_resident(&self) -> usize {
        self.max_resident
    }
}

impl std::fmt::Debug for ModelCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelCache")
            .field("catalog", &self.catalog)
            .field("loader", &"Arc<dyn ModelLoader>")
            .field("memory", &"Arc<dyn MemoryProbe>")
            .field("params", &self.params)
            .field("max_resident", &self.max_resident)
            .field("memory_threshold_percent", &self.memory_threshold_percent)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::backend::{Completion, CompletionParams};
    use std::path::Path;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    struct EchoModel;

    impl NativeModel for EchoModel {
        fn complete(&self, prompt: &str, _params: &CompletionParams) -> Result<Completion> {
            Ok(Completion {
                text: prompt.to_string(),
                completion_tokens: None,
            })
        }

        fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0])
        }
    }

    #[derive(Default)]
    struct CountingLoader {
        loads: AtomicUsize,
    }

    impl ModelLoader for CountingLoader {
        fn load(&self, _path: &Path, _params: &LoadParams) -> Result<Box<dyn NativeModel>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(EchoModel))
        }
    }

    struct FixedMemory(AtomicU64);

    impl FixedMemory {
        fn new(percent: f64) -> Self {
            Self(AtomicU64::new(percent.to_bits()))
        }

        fn set(&self, percent: f64) {
            self.0.store(percent.to_bits(), Ordering::SeqCst);
        }
    }

    impl MemoryProbe for FixedMemory {
        fn used_percent(&self) -> f64 {
            f64::from_bits(self.0.load(Ordering::SeqCst))
        }
    }

    fn setup(
        names: &[&str],
        max_resident: usize,
    ) -> (tempfile::TempDir, ModelCache, Arc<CountingLoader>, Arc<FixedMemory>) {
        let dir = tempfile::tempdir().unwrap();
        for name in names {
            std::fs::write(dir.path().join(format!("{}.gguf", name)), b"gguf").unwrap();
        }
        let config = ModelsConfig {
            models_dir: dir.path().to_path_buf(),
            max_resident,
            ..Default::default()
        };
        let catalog = Arc::new(ModelCatalog::new(&config.models_dir, &config.extensions));
        let loader = Arc::new(CountingLoader::default());
        let memory = Arc::new(FixedMemory::new(10.0));
        let cache = ModelCache::new(
            &config,
            catalog,
            loader.clone(),
            memory.clone(),
            Arc::new(InferenceMetrics::new().unwrap()),
        );
        (dir, cache, loader, memory)
    }

    #[test]
    fn test_hit_does_not_reload() {
        let (_dir, cache, loader, _) = setup(&["a"], 2);

        drop(cache.get_or_load("a").unwrap());
        drop(cache.get_or_load("a").unwrap());

        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
        assert_eq!(cache.resident_count(), 1);
    }

    #[test]
    fn test_lru_victim_is_oldest() {
        let (_dir, cache, _, _) = setup(&["a", "b", "c"], 2);

        drop(cache.get_or_load("a").unwrap());
        drop(cache.get_or_load("b").unwrap());
        // 访问 a 使 b 成为最久未使用
        drop(cache.get_or_load("a").unwrap());
        drop(cache.get_or_load("c").unwrap());

        assert_eq!(cache.resident_names(), vec!["a".to_string(), "c".to_string()]);
        assert_eq!(cache.catalog().status("b"), ModelStatus::Unloaded);
    }

    #[test]
    fn test_memory_pressure_evicts_below_capacity() {
        let (_dir, cache, _, memory) = setup(&["a", "b"], 3);

        drop(cache.get_or_load("a").unwrap());
        memory.set(95.0);

        // 缓存清空后压力仍在，报告资源耗尽
        let result = cache.get_or_load("b");
        assert!(matches!(result, Err(AppError::ResourceExhausted(_))));
        assert_eq!(cache.resident_count(), 0);
        assert_eq!(cache.catalog().status("a"), ModelStatus::Unloaded);

        memory.set(50.0);
        drop(cache.get_or_load("b").unwrap());
        assert_eq!(cache.resident_names(), vec!["b".to_string()]);
    }

    #[test]
    fn test_unknown_model() {
        let (_dir, cache, _, _) = setup(&[], 2);
        assert!(matches!(
            cache.get_or_load("ghost"),
            Err(AppError::ModelNotFound(_))
        ));
    }

    #[test]
    fn test_info_reports_residency() {
        let (_dir, cache, _, _) = setup(&["a"], 2);

        let before = cache.info("a").unwrap();
        assert!(!before.resident);
        assert_eq!(before.status, ModelStatus::Unloaded);
        assert_eq!(before.size_bytes, 4);

        drop(cache.get_or_load("a").unwrap());
        let after = cache.info("a").unwrap();
        assert!(after.resident);
        assert_eq!(after.status, ModelStatus::Loaded);
        assert!(matches!(cache.info("ghost"), Err(AppError::ModelNotFound(_))));
    }

    #[test]
    fn test_info_for_resident_model_removed_from_disk() {
        let (dir, cache, _, _) = setup(&["a"], 2);
        drop(cache.get_or_load("a").unwrap());

        std::fs::remove_file(dir.path().join("a.gguf")).unwrap();
        cache.catalog().scan();

        let info = cache.info("a").unwrap();
        assert!(info.resident);
        assert_eq!(info.status, ModelStatus::Loaded);
        assert_eq!(info.size_bytes, 0);
        assert!(info.last_modified.is_none());
    }
}
