//! 批处理模块
//!
//! 在单对测量之上实现有序批量测量、失败策略和可选的文件级并行。

pub mod batch;

// 重新导出公共接口
pub use batch::{BatchOutcome, BatchRunner, FailurePolicy, MosSummary, PairFailure, SourcePair};
