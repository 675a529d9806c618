//! 嵌入模型服务

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::inference::facade::InferenceFacade;

#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    async fn encode(&self, text: &str) -> Result<Vec<f32>>;

    async fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.encode(text).await?);
        }
        Ok(embeddings)
    }
}

/// 通过推理门面调用本地模型的嵌入实现
pub struct FacadeEmbedder {
    facade: Arc<InferenceFacade>,
    model_name: String,
}

impl FacadeEmbedder {
    pub fn new(facade: Arc<InferenceFacade>, model_name: &str) -> Self {
        Self {
            facade,
            model_name: model_name.to_string(),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[async_trait]
impl EmbeddingModel for FacadeEmbedder {
    async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let embedding = self
            .facade
            .embed_async(self.model_name.clone(), text.to_string())
            .await?;
        Ok(embedding)
    }
}

/// 余弦相似度，任一向量为零或维度不同时返回 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
