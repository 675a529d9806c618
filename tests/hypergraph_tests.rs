// Integration tests for the Hypergraph of Thoughts engine
//
// Tests cover:
// - Structural invariants under mutation
// - Adjustment validation
// - Metrics, insights and context budget
// - Export shape

use std::sync::Arc;

use rstest::rstest;
use serde_json::json;

use crossdebate::config::HotConfig;
use crossdebate::error::{AppError, ErrorKind};
use crossdebate::models::{EdgeKind, ElementKind, NodeKind};
use crossdebate::services::{HoTService, NewEdge, NewNode, create_hot_service};

fn service() -> Arc<HoTService> {
    create_hot_service(&HotConfig::default())
}

fn thoughts(hot: &HoTService, count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            hot.add_node(NewNode::new(format!("thought number {}", i), NodeKind::Thought))
                .id
        })
        .collect()
}

/// Every edge has at least two members and references only existing nodes
fn assert_structure(hot: &HoTService) {
    let snapshot = hot.store().snapshot();
    for edge in snapshot.edges.values() {
        assert!(edge.size() >= 2, "edge {} has {} members", edge.id, edge.size());
        for id in &edge.nodes {
            assert!(snapshot.nodes.contains_key(id), "dangling member {}", id);
        }
        assert!((0.0..=1.0).contains(&edge.weight));
    }
    for node in snapshot.nodes.values() {
        assert!((0.0..=1.0).contains(&node.relevance));
    }
}

#[test]
fn test_add_edge_scenarios() {
    let hot = service();
    let ids = thoughts(&hot, 3);
    let (x, y) = (&ids[0], &ids[1]);

    let edge = hot.add_edge(NewEdge::new([x, y]).kind(EdgeKind::Support)).unwrap();
    assert_eq!(edge.size(), 2);

    let err = hot.add_edge(NewEdge::new([x, x])).unwrap_err();
    assert!(matches!(err, AppError::InsufficientNodes(1)));
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let err = hot
        .add_edge(NewEdge::new([x.as_str(), "n_0_999"]))
        .unwrap_err();
    assert!(matches!(err, AppError::UnknownNode(ref id) if id == "n_0_999"));
    assert_eq!(err.kind(), ErrorKind::NotFound);

    assert_eq!(hot.store().edge_count(), 1);
    assert_structure(&hot);
}

#[rstest]
#[case(ElementKind::Node, 1.5, ErrorKind::InvalidInput)]
#[case(ElementKind::Edge, -1.0, ErrorKind::InvalidInput)]
#[case(ElementKind::Node, f64::NAN, ErrorKind::InvalidInput)]
fn test_adjust_rejects_out_of_range(
    #[case] kind: ElementKind,
    #[case] value: f64,
    #[case] expected: ErrorKind,
) {
    let hot = service();
    let ids = thoughts(&hot, 2);
    let edge = hot.add_edge(NewEdge::new(&ids)).unwrap();
    let target = match kind {
        ElementKind::Node => ids[0].clone(),
        ElementKind::Edge => edge.id.clone(),
    };

    let err = hot.adjust(&target, kind, value).unwrap_err();
    assert_eq!(err.kind(), expected);
    assert_structure(&hot);
}

#[test]
fn test_adjust_in_range_and_missing() {
    let hot = service();
    let ids = thoughts(&hot, 1);

    hot.adjust(&ids[0], ElementKind::Node, 0.95).unwrap();
    assert_eq!(hot.store().node(&ids[0]).unwrap().relevance, 0.95);

    let err = hot.adjust("e_0_1", ElementKind::Edge, 0.2).unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[test]
fn test_context_budget() {
    let hot = service();
    thoughts(&hot, 5);

    let context = hot.build_context(Some(2), Some(1000));
    let lines: Vec<&str> = context.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("thought number 4"));
    assert!(lines[1].ends_with("thought number 3"));

    // shortest line is 9 words
    assert_eq!(hot.build_context(Some(50), Some(5)), "");
}

#[test]
fn test_context_on_empty_graph() {
    assert_eq!(service().build_context(None, None), "");
}

#[test]
fn test_metrics_and_insights() {
    let hot = service();
    let ids = thoughts(&hot, 4);
    hot.add_edge(NewEdge::new(&ids)).unwrap();

    let metrics = hot.metrics();
    assert_eq!(metrics.node_count, 4);
    assert_eq!(metrics.edge_count, 1);
    assert_eq!(metrics.avg_hyperedge_size, 4.0);
    assert_eq!(metrics.avg_node_degree, 1.0);
    assert_eq!(metrics.graph_density, 1.0);
    assert_eq!(metrics.avg_centrality, 1.0);
    assert_eq!(metrics, hot.metrics());

    let insights = hot.insights();
    assert_eq!(insights.len(), 2);
    assert!(insights[0].contains("strong interconnection"));
    assert!(insights[1].contains("multiple concepts"));
}

#[test]
fn test_current_state_export() {
    let hot = service();
    let interaction = hot
        .update_from_interaction("Por que o céu é azul?", "Espalhamento de Rayleigh.", "phi-3")
        .unwrap();

    let state = hot.current_state();
    let value = serde_json::to_value(&state).unwrap();

    assert_eq!(value["metadata"]["node_count"], 2);
    assert_eq!(value["metadata"]["edge_count"], 1);
    assert_eq!(value["nodes"][0]["type"], "user_input");
    assert_eq!(value["nodes"][1]["type"], "model_response");
    assert_eq!(value["nodes"][1]["model_source"], "phi-3");
    assert_eq!(value["edges"][0]["type"], "response_to");
    assert_eq!(value["edges"][0]["weight"], 0.6);

    let mut members = vec![
        interaction.user_node.id.clone(),
        interaction.model_node.id.clone(),
    ];
    members.sort();
    assert_eq!(value["edges"][0]["nodes"], json!(members));
}

#[test]
fn test_clear_resets_session() {
    let hot = service();
    let ids = thoughts(&hot, 3);
    hot.add_edge(NewEdge::new(&ids)).unwrap();

    hot.clear();
    let state = hot.current_state();
    assert!(state.nodes.is_empty());
    assert!(state.edges.is_empty());
    assert_eq!(hot.metrics().node_count, 0);
}

#[test]
fn test_concurrent_mutation_keeps_structure() {
    let hot = service();
    let seed = thoughts(&hot, 2);

    std::thread::scope(|scope| {
        for worker in 0..4 {
            let hot = &hot;
            let seed = &seed;
            scope.spawn(move || {
                for i in 0..25 {
                    let node = hot.add_node(
                        NewNode::new(format!("w{} t{}", worker, i), NodeKind::Thought)
                            .relevance(i as f64 / 25.0),
                    );
                    hot.add_edge(NewEdge::new([&seed[0], &node.id]).weight(0.3))
                        .unwrap();
                }
            });
        }
    });

    assert_eq!(hot.store().node_count(), 102);
    assert_eq!(hot.store().edge_count(), 100);
    assert_structure(&hot);
}
