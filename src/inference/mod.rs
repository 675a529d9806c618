//! 本地模型推理模块
//!
//! 模型目录、带 LRU 与内存压力驱逐的模型缓存，以及其上的推理门面。

pub mod backend;
pub mod cache;
pub mod catalog;
pub mod embedding;
pub mod facade;
#[cfg(feature = "llama")]
pub mod llama;
pub mod memory;

pub use backend::{
    Completion, CompletionParams, GenerationOptions, LoadParams, ModelLoader, NativeModel,
    UnavailableLoader,
};
pub use cache::{ModelCache, ModelHandle};
pub use catalog::ModelCatalog;
pub use embedding::{EmbeddingModel, FacadeEmbedder, cosine_similarity};
pub use facade::{GenerationError, InferenceFacade};
#[cfg(feature = "llama")]
pub use llama::LlamaCppLoader;
pub use memory::{MemoryProbe, SystemMemoryProbe};

use std::sync::Arc;

/// 按编译特性选择默认的原生模型加载器
pub fn create_model_loader() -> crate::error::Result<Arc<dyn ModelLoader>> {
    #[cfg(feature = "llama")]
    {
        Ok(Arc::new(LlamaCppLoader::new()?))
    }
    #[cfg(not(feature = "llama"))]
    {
        tracing::warn!("Built without a native model backend; model loads will fail");
        Ok(Arc::new(UnavailableLoader))
    }
}
