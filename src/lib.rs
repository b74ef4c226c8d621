//! ViSQOL Measurement Orchestration
//!
//! 在外部ViSQOL评分引擎之前的测量编排层：
//! 把任意整数PCM编码的WAV解码为归一化单声道样本，按模式确定目标采样率并重采样，
//! 按 (模式, 采样率) 复用引擎句柄，逐对或批量打分。
//!
//! ## 核心特性
//! - WAV编解码：8/16/24/32位整数PCM，多声道逐帧平均下混
//! - 线性插值重采样：`floor(len * target / orig)` 输出长度
//! - 引擎配置缓存：每个 (模式, 采样率) 只配置一次，并发未命中不重复创建
//! - 批量测量：按输入顺序、默认fail-fast，可选文件级并行与显式占位策略
//!
//! 感知相似度算法本身不在本crate内，由 [`engine::ScoringEngine`] 实现提供。

pub mod audio;
pub mod core;
pub mod engine;
pub mod error;
pub mod processing;
pub mod tools;

// 重新导出核心类型
pub use audio::{AudioStats, BitDepth, WavDescriptor, decode, encode, resample};
pub use core::{AudioSource, MeasurementResult, Measurer};
pub use engine::{
    EngineConfigCache, EngineHandle, EngineKey, EngineOptions, Mode, ScoringEngine,
    SimilarityResult, VisqolCliEngine,
};
pub use error::{BatchError, BatchRunError, ErrorCategory, MeasureError, MeasureResult};
pub use processing::{BatchOutcome, BatchRunner, FailurePolicy, MosSummary, PairFailure};
