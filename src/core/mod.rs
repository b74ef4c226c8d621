//! 核心测量模块
//!
//! 把WAV编解码、重采样和引擎缓存串成单对测量流程。

pub mod measurer;
pub mod result;

// 重新导出公共接口
pub use measurer::Measurer;
pub use result::{AudioSource, MeasurementResult};
