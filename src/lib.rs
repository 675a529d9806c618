//! CrossDebate - 本地模型推理与思维超图引擎
//!
//! 两个相互独立的引擎：
//! - 本地 GGUF 模型目录、带 LRU 与内存压力驱逐的模型缓存，以及其上的推理门面；
//! - 思维超图（Hypergraph of Thoughts）状态引擎，提供结构指标、提示与上下文抽取。
//!
//! 两者由 [`app_state::AppState`] 显式构建并共享。

pub mod app_state;
pub mod config;
pub mod error;
pub mod inference;
pub mod models;
pub mod observability;
pub mod services;

pub use app_state::AppState;
pub use error::{AppError, ErrorKind, Result};
