//! 服务模块

pub mod analytics;
pub mod context;
pub mod hot_service;
pub mod hypergraph;

pub use analytics::{GraphAnalytics, HotMetrics, ProjectedGraph};
pub use context::{ContextExtractor, count_tokens};
pub use hot_service::{HoTService, INTERACTION_EDGE_WEIGHT, Interaction, create_hot_service};
pub use hypergraph::{HypergraphStore, NewEdge, NewNode};
