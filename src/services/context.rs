//! 上下文抽取
//!
//! 从超图快照中按时间倒序挑选节点，拼成可放入下一轮提示词的文本。

use std::cmp::Reverse;
use tracing::debug;

use crate::models::{HoTNode, HypergraphSnapshot};

/// 上下文抽取器
pub struct ContextExtractor;

impl ContextExtractor {
    /// 抽取上下文
    ///
    /// 逐行累加，达到 `max_nodes` 行或下一行会超出 `max_tokens` 时停止。
    /// 词数按空白分词计算。
    pub fn extract(snapshot: &HypergraphSnapshot, max_nodes: usize, max_tokens: usize) -> String {
        let mut nodes: Vec<&HoTNode> = snapshot.nodes.values().collect();
        nodes.sort_by_key(|n| Reverse((n.created_at, n.sequence)));

        let mut lines = Vec::new();
        let mut tokens = 0usize;

        for node in nodes.into_iter().take(max_nodes) {
            let line = Self::format_line(node);
            let line_tokens = count_tokens(&line);
            if tokens + line_tokens > max_tokens {
                break;
            }
            tokens += line_tokens;
            lines.push(line);
        }

        debug!(
            "Context extracted: {} lines, {} tokens (limits: {} nodes, {} tokens)",
            lines.len(),
            tokens,
            max_nodes,
            max_tokens
        );

        lines.join("\n").trim_end().to_string()
    }

    /// 单个节点的上下文行
    pub fn format_line(node: &HoTNode) -> String {
        format!(
            "- Node {} ({}, rel: {:.2}): {}",
            node.id, node.kind, node.relevance, node.label
        )
    }
}

/// 空白分词计数
pub fn count_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}
