//! 思维超图（Hypergraph of Thoughts）数据模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

/// 开放的附加属性表
pub type Attributes = HashMap<String, serde_json::Value>;

/// 节点类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// 思考
    #[default]
    Thought,
    /// 用户输入
    UserInput,
    /// 模型回复
    ModelResponse,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeKind::Thought => "thought",
            NodeKind::UserInput => "user_input",
            NodeKind::ModelResponse => "model_response",
        };
        f.write_str(s)
    }
}

/// 超边类型
///
/// 除内置关系外允许自定义关系名。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, SerializeDisplay, DeserializeFromStr)]
pub enum EdgeKind {
    #[default]
    Related,
    Support,
    Contrast,
    Elaboration,
    ResponseTo,
    Custom(String),
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EdgeKind::Related => "related",
            EdgeKind::Support => "support",
            EdgeKind::Contrast => "contrast",
            EdgeKind::Elaboration => "elaboration",
            EdgeKind::ResponseTo => "response_to",
            EdgeKind::Custom(name) => name,
        };
        f.write_str(s)
    }
}

impl FromStr for EdgeKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s.trim() {
            "" => return Err(AppError::InvalidValue("超边类型不能为空".into())),
            "related" => EdgeKind::Related,
            "support" => EdgeKind::Support,
            "contrast" => EdgeKind::Contrast,
            "elaboration" => EdgeKind::Elaboration,
            "response_to" => EdgeKind::ResponseTo,
            other => EdgeKind::Custom(other.to_string()),
        };
        Ok(kind)
    }
}

/// 可调整的元素类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Node,
    Edge,
}

impl FromStr for ElementKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "node" => Ok(ElementKind::Node),
            "edge" => Ok(ElementKind::Edge),
            other => Err(AppError::InvalidValue(format!(
                "元素类型必须是 node 或 edge，实际为 '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementKind::Node => f.write_str("node"),
            ElementKind::Edge => f.write_str("edge"),
        }
    }
}

/// 超图节点
///
/// 创建后只有 `relevance` 可以调整。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HoTNode {
    /// 节点唯一标识
    pub id: String,
    /// 思考或消息文本
    pub label: String,
    /// 节点类型
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// 创建时间
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
    /// 相关度 [0, 1]
    pub relevance: f64,
    /// 生成该节点的模型
    pub model_source: Option<String>,
    /// 附加属性
    #[serde(default)]
    pub attributes: Attributes,
    /// 语义向量，不参与序列化
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
    /// 创建序号，同一时间戳下的先后顺序
    #[serde(skip)]
    pub(crate) sequence: u64,
}

/// 超边（连接两个及以上节点）
///
/// 创建后只有 `weight` 可以调整。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HoTEdge {
    /// 超边唯一标识
    pub id: String,
    /// 成员节点 ID，至少 2 个
    pub nodes: BTreeSet<String>,
    /// 关系类型
    #[serde(rename = "type")]
    pub kind: EdgeKind,
    /// 创建时间
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
    /// 连接强度 [0, 1]
    pub weight: f64,
    /// 附加属性
    #[serde(default)]
    pub attributes: Attributes,
    /// 创建序号，同一时间戳下的先后顺序
    #[serde(skip)]
    pub(crate) sequence: u64,
}

impl HoTEdge {
    /// 超边大小
    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    /// 是否包含某节点
    pub fn contains(&self, node_id: &str) -> bool {
        self.nodes.contains(node_id)
    }
}

/// 超图的只读快照
///
/// 在存储锁内复制，之后的指标计算与上下文抽取都不再持锁。
#[derive(Debug, Clone, Default)]
pub struct HypergraphSnapshot {
    pub nodes: HashMap<String, HoTNode>,
    pub edges: HashMap<String, HoTEdge>,
}

impl HypergraphSnapshot {
    /// 节点数
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// 超边数
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// 按创建先后排序的节点
    pub fn nodes_oldest_first(&self) -> Vec<&HoTNode> {
        let mut nodes: Vec<&HoTNode> = self.nodes.values().collect();
        nodes.sort_by_key(|n| (n.created_at, n.sequence));
        nodes
    }

    /// 按创建先后排序的超边
    pub fn edges_oldest_first(&self) -> Vec<&HoTEdge> {
        let mut edges: Vec<&HoTEdge> = self.edges.values().collect();
        edges.sort_by_key(|e| (e.created_at, e.sequence));
        edges
    }
}

/// 超图状态元数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotMetadata {
    pub last_updated: DateTime<Utc>,
    pub node_count: usize,
    pub edge_count: usize,
}

/// 可导出的超图状态（用于可视化）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotState {
    pub nodes: Vec<HoTNode>,
    pub edges: Vec<HoTEdge>,
    pub metadata: HotMetadata,
}

impl From<&HypergraphSnapshot> for HotState {
    fn from(snapshot: &HypergraphSnapshot) -> Self {
        Self {
            nodes: snapshot.nodes_oldest_first().into_iter().cloned().collect(),
            edges: snapshot.edges_oldest_first().into_iter().cloned().collect(),
            metadata: HotMetadata {
                last_updated: Utc::now(),
                node_count: snapshot.node_count(),
                edge_count: snapshot.edge_count(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str) -> HoTNode {
        HoTNode {
            id: id.to_string(),
            label: "Primeiro pensamento".to_string(),
            kind: NodeKind::UserInput,
            created_at: Utc::now(),
            relevance: 0.8,
            model_source: Some("mistral-7b".to_string()),
            attributes: Attributes::new(),
            embedding: Some(vec![0.1, 0.2]),
            sequence: 1,
        }
    }

    #[test]
    fn test_node_serialization_shape() {
        let value = serde_json::to_value(node("n_1")).unwrap();

        assert_eq!(value["id"], "n_1");
        assert_eq!(value["type"], "user_input");
        assert_eq!(value["relevance"], 0.8);
        assert_eq!(value["model_source"], "mistral-7b");
        assert!(value["timestamp"].as_str().unwrap().contains('T'));
        assert!(value.get("embedding").is_none());
        assert!(value.get("sequence").is_none());
    }

    #[test]
    fn test_edge_serialization_shape() {
        let edge = HoTEdge {
            id: "e_1".into(),
            nodes: ["n_2".to_string(), "n_1".to_string()].into_iter().collect(),
            kind: EdgeKind::ResponseTo,
            created_at: Utc::now(),
            weight: 0.6,
            attributes: Attributes::new(),
            sequence: 1,
        };
        let value = serde_json::to_value(&edge).unwrap();

        assert_eq!(value["type"], "response_to");
        assert_eq!(value["nodes"], serde_json::json!(["n_1", "n_2"]));
        assert_eq!(value["weight"], 0.6);
    }

    #[test]
    fn test_edges_with_same_timestamp_keep_creation_order() {
        let created_at = Utc::now();
        let edge = |id: &str, sequence: u64| HoTEdge {
            id: id.to_string(),
            nodes: ["n_1".to_string(), "n_2".to_string()].into_iter().collect(),
            kind: EdgeKind::Related,
            created_at,
            weight: 0.5,
            attributes: Attributes::new(),
            sequence,
        };
        let mut snapshot = HypergraphSnapshot::default();
        for (id, sequence) in [("e_c", 2), ("e_a", 3), ("e_b", 1)] {
            snapshot.edges.insert(id.to_string(), edge(id, sequence));
        }

        let order: Vec<&str> = snapshot
            .edges_oldest_first()
            .into_iter()
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(order, vec!["e_b", "e_c", "e_a"]);
    }

    #[test]
    fn test_edge_kind_custom_round_trip() {
        let kind: EdgeKind = "analogy".parse().unwrap();
        assert_eq!(kind, EdgeKind::Custom("analogy".into()));
        assert_eq!(kind.to_string(), "analogy");
        assert_eq!("support".parse::<EdgeKind>().unwrap(), EdgeKind::Support);
        assert!("".parse::<EdgeKind>().is_err());
    }

    #[test]
    fn test_element_kind_parse() {
        assert_eq!("node".parse::<ElementKind>().unwrap(), ElementKind::Node);
        assert_eq!("edge".parse::<ElementKind>().unwrap(), ElementKind::Edge);
        assert!(matches!(
            "vertex".parse::<ElementKind>(),
            Err(AppError::InvalidValue(_))
        ));
    }
}
