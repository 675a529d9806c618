//! 思维超图服务
//!
//! 在超图存储之上组合分析与上下文抽取，并把一次问答交互写入超图。

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::HotConfig;
use crate::error::Result;
use crate::inference::embedding::{EmbeddingModel, cosine_similarity};
use crate::models::{EdgeKind, ElementKind, HoTEdge, HoTNode, HotState, NodeKind};
use crate::services::analytics::{GraphAnalytics, HotMetrics};
use crate::services::context::ContextExtractor;
use crate::services::hypergraph::{HypergraphStore, NewEdge, NewNode};

/// 交互边的默认权重
pub const INTERACTION_EDGE_WEIGHT: f64 = 0.6;

/// 一次问答在超图中产生的元素
#[derive(Debug, Clone)]
pub struct Interaction {
    pub user_node: HoTNode,
    pub model_node: HoTNode,
    pub edge: HoTEdge,
}

/// 思维超图服务
#[derive(Debug)]
pub struct HoTService {
    store: HypergraphStore,
    config: HotConfig,
}

impl HoTService {
    pub fn new(config: HotConfig) -> Self {
        Self {
            store: HypergraphStore::new(config.default_node_relevance, config.default_edge_weight),
            config,
        }
    }

    pub fn store(&self) -> &HypergraphStore {
        &self.store
    }

    pub fn config(&self) -> &HotConfig {
        &self.config
    }

    /// 添加节点
    pub fn add_node(&self, node: NewNode) -> HoTNode {
        self.store.add_node(node)
    }

    /// 添加超边
    pub fn add_edge(&self, edge: NewEdge) -> Result<HoTEdge> {
        self.store.add_edge(edge)
    }

    /// 调整节点相关度或超边权重
    pub fn adjust(&self, element_id: &str, kind: ElementKind, new_value: f64) -> Result<()> {
        self.store.adjust(element_id, kind, new_value)
    }

    /// 重置会话
    pub fn clear(&self) {
        self.store.clear();
    }

    /// 导出当前状态
    pub fn current_state(&self) -> HotState {
        HotState::from(&self.store.snapshot())
    }

    /// 结构指标
    pub fn metrics(&self) -> HotMetrics {
        GraphAnalytics::metrics(&self.store.snapshot())
    }

    /// 结构提示
    pub fn insights(&self) -> Vec<String> {
        GraphAnalytics::insights(&self.metrics())
    }

    /// 构建提示词上下文，未指定的上限取配置默认值
    pub fn build_context(&self, max_nodes: Option<usize>, max_tokens: Option<usize>) -> String {
        ContextExtractor::extract(
            &self.store.snapshot(),
            max_nodes.unwrap_or(self.config.max_context_nodes),
            max_tokens.unwrap_or(self.config.max_context_tokens),
        )
    }

    /// 记录一次问答：用户节点、模型节点，以及两者之间的 `response_to` 超边
    pub fn update_from_interaction(
        &self,
        user_message: &str,
        model_response: &str,
        model_name: &str,
    ) -> Result<Interaction> {
        self.insert_interaction(user_message, model_response, model_name, None)
    }

    /// 与 [`HoTService::update_from_interaction`] 相同，提供嵌入模型时
    /// 以两段文本的余弦相似度作为超边权重
    pub async fn record_interaction(
        &self,
        user_message: &str,
        model_response: &str,
        model_name: &str,
        embedder: Option<&dyn EmbeddingModel>,
    ) -> Result<Interaction> {
        let embeddings = match embedder {
            Some(embedder) => match embedder.encode_batch(&[user_message, model_response]).await {
                Ok(mut vectors) if vectors.len() == 2 => {
                    let response = vectors.pop();
                    let user = vectors.pop();
                    user.zip(response)
                }
                Ok(vectors) => {
                    warn!(
                        "Embedder returned {} vectors for 2 texts, using default weight",
                        vectors.len()
                    );
                    None
                }
                Err(e) => {
                    warn!("Interaction embedding failed, using default weight: {}", e);
                    None
                }
            },
            None => None,
        };

        self.insert_interaction(user_message, model_response, model_name, embeddings)
    }

    fn insert_interaction(
        &self,
        user_message: &str,
        model_response: &str,
        model_name: &str,
        embeddings: Option<(Vec<f32>, Vec<f32>)>,
    ) -> Result<Interaction> {
        let weight = embeddings
            .as_ref()
            .map(|(u, r)| (cosine_similarity(u, r) as f64).clamp(0.0, 1.0))
            .unwrap_or(INTERACTION_EDGE_WEIGHT);
        let (user_embedding, model_embedding) = embeddings.unzip();

        let mut user = NewNode::new(user_message, NodeKind::UserInput);
        user.embedding = user_embedding;
        let mut model = NewNode::new(model_response, NodeKind::ModelResponse).model_source(model_name);
        model.embedding = model_embedding;

        let user_node = self.store.add_node(user);
        let model_node = self.store.add_node(model);
        let edge = self.store.add_edge(
            NewEdge::new([&user_node.id, &model_node.id])
                .kind(EdgeKind::ResponseTo)
                .weight(weight),
        )?;

        info!(
            "Interaction recorded for model '{}': {} -> {} (weight {:.2})",
            model_name, user_node.id, model_node.id, edge.weight
        );

        Ok(Interaction {
            user_node,
            model_node,
            edge,
        })
    }
}

/// 创建思维超图服务
pub fn create_hot_service(config: &HotConfig) -> Arc<HoTService> {
    Arc::new(HoTService::new(config.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use async_trait::async_trait;

    struct FixedEmbedder(Vec<Vec<f32>>);

    #[async_trait]
    impl EmbeddingModel for FixedEmbedder {
        async fn encode(&self, text: &str) -> Result<Vec<f32>> {
            let index = if text.starts_with('Q') { 0 } else { 1 };
            Ok(self.0[index].clone())
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingModel for FailingEmbedder {
        async fn encode(&self, _text: &str) -> Result<Vec<f32>> {
            Err(AppError::Generation("embedding model unavailable".into()))
        }
    }

    fn service() -> HoTService {
        HoTService::new(HotConfig::default())
    }

    #[test]
    fn test_update_from_interaction() {
        let hot = service();
        let interaction = hot
            .update_from_interaction("Qual é a capital?", "Brasília.", "mistral")
            .unwrap();

        assert_eq!(interaction.user_node.kind, NodeKind::UserInput);
        assert_eq!(interaction.model_node.kind, NodeKind::ModelResponse);
        assert_eq!(interaction.model_node.model_source.as_deref(), Some("mistral"));
        assert_eq!(interaction.edge.kind, EdgeKind::ResponseTo);
        assert_eq!(interaction.edge.weight, INTERACTION_EDGE_WEIGHT);
        assert!(interaction.edge.contains(&interaction.user_node.id));
        assert!(interaction.edge.contains(&interaction.model_node.id));

        let state = hot.current_state();
        assert_eq!(state.metadata.node_count, 2);
        assert_eq!(state.metadata.edge_count, 1);
        assert_eq!(state.nodes[0].id, interaction.user_node.id);
    }

    #[tokio::test]
    async fn test_record_interaction_uses_similarity() {
        let hot = service();
        let embedder = FixedEmbedder(vec![vec![1.0, 0.0], vec![1.0, 1.0]]);

        let interaction = hot
            .record_interaction("Q: hi", "hello", "m", Some(&embedder))
            .await
            .unwrap();

        assert!((interaction.edge.weight - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        assert_eq!(
            hot.store().node(&interaction.user_node.id).unwrap().embedding,
            Some(vec![1.0, 0.0])
        );
    }

    #[tokio::test]
    async fn test_record_interaction_clamps_negative_similarity() {
        let hot = service();
        let embedder = FixedEmbedder(vec![vec![1.0, 0.0], vec![-1.0, 0.0]]);

        let interaction = hot
            .record_interaction("Q: yes", "no", "m", Some(&embedder))
            .await
            .unwrap();
        assert_eq!(interaction.edge.weight, 0.0);
    }

    #[tokio::test]
    async fn test_record_interaction_falls_back_on_failure() {
        let hot = service();
        let interaction = hot
            .record_interaction("Q", "A", "m", Some(&FailingEmbedder))
            .await
            .unwrap();

        assert_eq!(interaction.edge.weight, INTERACTION_EDGE_WEIGHT);
        assert!(interaction.user_node.embedding.is_none());
    }

    #[test]
    fn test_build_context_uses_config_defaults() {
        let hot = HoTService::new(HotConfig {
            max_context_nodes: 1,
            ..HotConfig::default()
        });
        hot.update_from_interaction("first", "second", "m").unwrap();

        let context = hot.build_context(None, None);
        assert_eq!(context.lines().count(), 1);
        assert!(context.ends_with("second"));

        assert_eq!(hot.build_context(Some(10), None).lines().count(), 2);
    }

    #[test]
    fn test_defaults_come_from_config() {
        let hot = HoTService::new(HotConfig {
            default_node_relevance: 0.3,
            ..HotConfig::default()
        });
        let node = hot.add_node(NewNode::new("x", NodeKind::Thought));
        assert_eq!(node.relevance, 0.3);
    }

    #[test]
    fn test_clear_and_insights() {
        let hot = service();
        hot.update_from_interaction("a", "b", "m").unwrap();
        // two nodes joined by one pair: density 1.0
        assert!(hot.insights()[0].contains("strong interconnection"));

        hot.clear();
        assert_eq!(hot.metrics(), HotMetrics::default());
        assert!(hot.insights()[0].contains("No significant"));
    }
}
