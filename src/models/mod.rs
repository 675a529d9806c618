//! 核心数据模型模块
//!
//! 定义思维超图的节点、超边、快照，以及本地模型目录条目。

pub mod hot;
pub mod model_entry;

pub use hot::*;
pub use model_entry::*;
