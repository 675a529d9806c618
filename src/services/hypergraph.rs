//! 超图存储
//!
//! 持有节点与超边集合，负责 ID 分配与结构不变量：每条超边连接至少两个已存在的节点。
//! 所有变更与快照都在同一把锁内完成。

use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::models::{
    Attributes, EdgeKind, ElementKind, HoTEdge, HoTNode, HypergraphSnapshot, NodeKind,
};

/// 默认节点相关度与超边权重
pub const DEFAULT_UNIT_VALUE: f64 = 0.5;

/// 新节点参数
#[derive(Debug, Clone, Default)]
pub struct NewNode {
    pub label: String,
    pub kind: NodeKind,
    /// 未设置时使用存储的默认相关度
    pub relevance: Option<f64>,
    pub model_source: Option<String>,
    pub attributes: Attributes,
    pub embedding: Option<Vec<f32>>,
}

impl NewNode {
    pub fn new(label: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            label: label.into(),
            kind,
            ..Default::default()
        }
    }

    pub fn relevance(mut self, relevance: f64) -> Self {
        self.relevance = Some(relevance);
        self
    }

    pub fn model_source(mut self, model: impl Into<String>) -> Self {
        self.model_source = Some(model.into());
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// 新超边参数
#[derive(Debug, Clone, Default)]
pub struct NewEdge {
    pub node_ids: Vec<String>,
    pub kind: EdgeKind,
    /// 未设置时使用存储的默认权重
    pub weight: Option<f64>,
    pub attributes: Attributes,
}

impl NewEdge {
    pub fn new<I, S>(node_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            node_ids: node_ids.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn kind(mut self, kind: EdgeKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

#[derive(Debug, Default)]
struct GraphState {
    nodes: HashMap<String, HoTNode>,
    edges: HashMap<String, HoTEdge>,
    node_counter: u64,
    edge_counter: u64,
}

/// 超图存储
#[derive(Debug)]
pub struct HypergraphStore {
    state: Mutex<GraphState>,
    default_relevance: f64,
    default_weight: f64,
}

impl Default for HypergraphStore {
    fn default() -> Self {
        Self::new(DEFAULT_UNIT_VALUE, DEFAULT_UNIT_VALUE)
    }
}

impl HypergraphStore {
    /// 使用给定的默认相关度与权重创建空超图
    pub fn new(default_relevance: f64, default_weight: f64) -> Self {
        Self {
            state: Mutex::new(GraphState::default()),
            default_relevance: clamp_unit(default_relevance, DEFAULT_UNIT_VALUE),
            default_weight: clamp_unit(default_weight, DEFAULT_UNIT_VALUE),
        }
    }

    /// 添加节点，相关度被限制在 [0, 1]
    pub fn add_node(&self, new: NewNode) -> HoTNode {
        let relevance = new
            .relevance
            .map(|r| clamp_unit(r, self.default_relevance))
            .unwrap_or(self.default_relevance);

        let mut state = self.state.lock();
        state.node_counter += 1;
        let sequence = state.node_counter;
        let node = HoTNode {
            id: generate_id("n", sequence),
            label: new.label,
            kind: new.kind,
            created_at: Utc::now(),
            relevance,
            model_source: new.model_source,
            attributes: new.attributes,
            embedding: new.embedding,
            sequence,
        };
        state.nodes.insert(node.id.clone(), node.clone());
        drop(state);

        info!(
            "Node added: id={}, type={}, label='{}'",
            node.id,
            node.kind,
            preview(&node.label)
        );
        node
    }

    /// 添加超边
    ///
    /// 节点 ID 去重后少于 2 个返回 [`AppError::InsufficientNodes`]，
    /// 引用不存在的节点返回 [`AppError::UnknownNode`]。
    pub fn add_edge(&self, new: NewEdge) -> Result<HoTEdge> {
        let members: BTreeSet<String> = new.node_ids.into_iter().collect();
        if members.len() < 2 {
            warn!(
                "Rejected hyperedge with {} distinct node(s): {:?}",
                members.len(),
                members
            );
            return Err(AppError::InsufficientNodes(members.len()));
        }

        let weight = new
            .weight
            .map(|w| clamp_unit(w, self.default_weight))
            .unwrap_or(self.default_weight);

        let mut state = self.state.lock();
        if let Some(missing) = members.iter().find(|id| !state.nodes.contains_key(*id)) {
            warn!("Hyperedge references unknown node '{}'", missing);
            return Err(AppError::UnknownNode(missing.clone()));
        }

        state.edge_counter += 1;
        let sequence = state.edge_counter;
        let edge = HoTEdge {
            id: generate_id("e", sequence),
            nodes: members,
            kind: new.kind,
            created_at: Utc::now(),
            weight,
            attributes: new.attributes,
            sequence,
        };
        state.edges.insert(edge.id.clone(), edge.clone());
        drop(state);

        info!(
            "Hyperedge added: id={}, type={}, nodes={:?}",
            edge.id, edge.kind, edge.nodes
        );
        Ok(edge)
    }

    /// 调整节点相关度或超边权重
    pub fn adjust(&self, element_id: &str, kind: ElementKind, new_value: f64) -> Result<()> {
        if !new_value.is_finite() || !(0.0..=1.0).contains(&new_value) {
            warn!(
                "Rejected adjustment of {} {}: value {} outside [0, 1]",
                kind, element_id, new_value
            );
            return Err(AppError::InvalidValue(format!(
                "{} {} 的取值 {} 必须在 [0, 1] 之间",
                kind, element_id, new_value
            )));
        }

        let mut state = self.state.lock();
        match kind {
            ElementKind::Node => {
                let node = state
                    .nodes
                    .get_mut(element_id)
                    .ok_or_else(|| AppError::NotFound(format!("node {}", element_id)))?;
                node.relevance = new_value;
            }
            ElementKind::Edge => {
                let edge = state
                    .edges
                    .get_mut(element_id)
                    .ok_or_else(|| AppError::NotFound(format!("edge {}", element_id)))?;
                edge.weight = new_value;
            }
        }
        drop(state);

        info!("Adjusted {} {} to {}", kind, element_id, new_value);
        Ok(())
    }

    /// 写入节点的语义向量
    pub fn set_embedding(&self, node_id: &str, embedding: Vec<f32>) -> Result<()> {
        let mut state = self.state.lock();
        let node = state
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| AppError::NotFound(format!("node {}", node_id)))?;
        node.embedding = Some(embedding);
        Ok(())
    }

    pub fn node(&self, node_id: &str) -> Option<HoTNode> {
        self.state.lock().nodes.get(node_id).cloned()
    }

    pub fn edge(&self, edge_id: &str) -> Option<HoTEdge> {
        self.state.lock().edges.get(edge_id).cloned()
    }

    pub fn node_count(&self) -> usize {
        self.state.lock().nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.state.lock().edges.len()
    }

    /// 一致的时间点快照
    pub fn snapshot(&self) -> HypergraphSnapshot {
        let state = self.state.lock();
        HypergraphSnapshot {
            nodes: state.nodes.clone(),
            edges: state.edges.clone(),
        }
    }

    /// 清空超图并重置 ID 计数器
    pub fn clear(&self) {
        let mut state = self.state.lock();
        let (nodes, edges) = (state.nodes.len(), state.edges.len());
        *state = GraphState::default();
        drop(state);

        info!("Hypergraph cleared ({} nodes, {} edges removed)", nodes, edges);
    }
}

fn generate_id(prefix: &str, counter: u64) -> String {
    let id = format!("{}_{}_{}", prefix, Utc::now().timestamp_millis(), counter);
    debug!("Generated id {}", id);
    id
}

/// 限制到 [0, 1]，NaN 取默认值
fn clamp_unit(value: f64, fallback: f64) -> f64 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn preview(text: &str) -> String {
    text.chars().take(30).collect()
}
