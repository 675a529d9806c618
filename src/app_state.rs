//! 应用状态
//!
//! 两个引擎在进程内各只有一份实例，由这里显式构建并以 `Arc` 句柄分发，
//! 测试可以各自构建互不影响的实例。

use std::sync::Arc;
use tracing::info;

use crate::config::{AppConfig, ConfigLoader};
use crate::error::{AppError, Result};
use crate::inference::{
    InferenceFacade, MemoryProbe, ModelCache, ModelCatalog, ModelLoader, SystemMemoryProbe,
    create_model_loader,
};
use crate::observability::InferenceMetrics;
use crate::services::{HoTService, create_hot_service};

/// Application state containing the shared engines
#[derive(Clone)]
pub struct AppState {
    /// Validated configuration
    pub config: Arc<AppConfig>,
    /// Prometheus metrics for the inference path
    pub metrics: Arc<InferenceMetrics>,
    /// Discovered model artifacts
    pub catalog: Arc<ModelCatalog>,
    /// Resident model cache
    pub cache: Arc<ModelCache>,
    /// Generation and embedding entry point
    pub inference: Arc<InferenceFacade>,
    /// Hypergraph of Thoughts engine
    pub hot: Arc<HoTService>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("app_name", &self.config.app_name)
            .field("environment", &self.config.environment)
            .field("cache", &self.cache)
            .field("hot", &"Arc<HoTService>")
            .finish()
    }
}

impl AppState {
    /// 使用默认加载器与系统内存探针构建
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let loader = create_model_loader()?;
        Self::with_components(config, loader, Arc::new(SystemMemoryProbe::new()))
    }

    /// 注入自定义加载器与内存探针构建
    pub fn with_components(
        config: AppConfig,
        loader: Arc<dyn ModelLoader>,
        memory: Arc<dyn MemoryProbe>,
    ) -> Result<Self> {
        ConfigLoader::validate(&config).map_err(|e| AppError::Config(e.to_string()))?;

        let metrics = Arc::new(InferenceMetrics::new()?);
        let catalog = Arc::new(ModelCatalog::new(
            &config.models.models_dir,
            &config.models.extensions,
        ));
        let cache = Arc::new(ModelCache::new(
            &config.models,
            Arc::clone(&catalog),
            loader,
            memory,
            Arc::clone(&metrics),
        ));
        let inference = Arc::new(InferenceFacade::new(Arc::clone(&cache), Arc::clone(&metrics)));
        let hot = create_hot_service(&config.hot);

        info!(
            app = %config.app_name,
            environment = %config.environment,
            models = catalog.len(),
            "Application state initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            metrics,
            catalog,
            cache,
            inference,
            hot,
        })
    }
}
