//! 超图分析
//!
//! 指标基于两两投影图计算：每条超边在其成员之间两两连边，
//! 同一对节点被多条超边连接时权重累加、只算一条边。

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::models::HypergraphSnapshot;

/// 超图结构指标
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HotMetrics {
    pub node_count: usize,
    pub edge_count: usize,
    /// 平均超边大小
    pub avg_hyperedge_size: f64,
    /// 平均每个节点所属的超边数
    pub avg_node_degree: f64,
    /// 投影图密度
    pub graph_density: f64,
    /// 投影图平均度中心性
    #[serde(alias = "avg_graph_centrality")]
    pub avg_centrality: f64,
}

/// 两两投影图
#[derive(Debug, Default)]
pub struct ProjectedGraph<'a> {
    /// 无序节点对 -> 累计权重，键内按字典序排列
    pub pairs: BTreeMap<(&'a str, &'a str), f64>,
    /// 节点 -> 邻居数
    pub degree: HashMap<&'a str, usize>,
}

impl<'a> ProjectedGraph<'a> {
    pub fn from_snapshot(snapshot: &'a HypergraphSnapshot) -> Self {
        let mut pairs: BTreeMap<(&str, &str), f64> = BTreeMap::new();
        for edge in snapshot.edges.values() {
            let members: Vec<&str> = edge.nodes.iter().map(String::as_str).collect();
            for (i, a) in members.iter().enumerate() {
                for b in &members[i + 1..] {
                    *pairs.entry((*a, *b)).or_insert(0.0) += edge.weight;
                }
            }
        }

        let mut degree: HashMap<&str, usize> =
            snapshot.nodes.keys().map(|id| (id.as_str(), 0)).collect();
        for (a, b) in pairs.keys() {
            *degree.entry(*a).or_insert(0) += 1;
            *degree.entry(*b).or_insert(0) += 1;
        }

        Self { pairs, degree }
    }

    pub fn edge_count(&self) -> usize {
        self.pairs.len()
    }
}

/// 超图分析器
pub struct GraphAnalytics;

impl GraphAnalytics {
    /// 计算结构指标，空图全部为 0
    pub fn metrics(snapshot: &HypergraphSnapshot) -> HotMetrics {
        let n = snapshot.node_count();
        let edge_count = snapshot.edge_count();
        if n == 0 {
            return HotMetrics {
                edge_count,
                ..Default::default()
            };
        }

        let total_membership: usize = snapshot.edges.values().map(|e| e.size()).sum();
        let avg_hyperedge_size = if edge_count == 0 {
            0.0
        } else {
            total_membership as f64 / edge_count as f64
        };

        let mut membership: HashMap<&str, usize> = HashMap::with_capacity(n);
        for edge in snapshot.edges.values() {
            for id in &edge.nodes {
                *membership.entry(id.as_str()).or_insert(0) += 1;
            }
        }
        let avg_node_degree = snapshot
            .nodes
            .keys()
            .map(|id| membership.get(id.as_str()).copied().unwrap_or(0))
            .sum::<usize>() as f64
            / n as f64;

        let projected = ProjectedGraph::from_snapshot(snapshot);
        let graph_density = if n < 2 {
            0.0
        } else {
            2.0 * projected.edge_count() as f64 / (n * (n - 1)) as f64
        };

        let avg_centrality = if n == 1 {
            1.0
        } else {
            let denom = (n - 1) as f64;
            snapshot
                .nodes
                .keys()
                .map(|id| projected.degree.get(id.as_str()).copied().unwrap_or(0) as f64 / denom)
                .sum::<f64>()
                / n as f64
        };

        HotMetrics {
            node_count: n,
            edge_count,
            avg_hyperedge_size,
            avg_node_degree,
            graph_density,
            avg_centrality,
        }
    }

    /// 根据指标生成提示
    ///
    /// 规则按固定顺序匹配，都不满足时返回一条占位提示。
    pub fn insights(metrics: &HotMetrics) -> Vec<String> {
        let mut insights = Vec::new();

        if metrics.node_count > 50 {
            insights.push(
                "The thought graph is growing complex, indicating a deep exploration."
                    .to_string(),
            );
        }
        if metrics.graph_density > 0.5 {
            insights.push(
                "High graph density suggests strong interconnection between thoughts."
                    .to_string(),
            );
        }
        if metrics.avg_hyperedge_size > 3.0 {
            insights.push(
                "Large hyperedges indicate thoughts connecting multiple concepts at once."
                    .to_string(),
            );
        }

        if insights.is_empty() {
            insights.push("No significant insight generated at the moment.".to_string());
        }
        insights
    }
}
