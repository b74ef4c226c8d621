//! 评分引擎接口层
//!
//! 感知相似度算法本身由外部引擎提供，这里只定义调用边界：
//! `configure` 按配置创建句柄，`measure` 在句柄上打分。
//!
//! 句柄以 `&mut` 传入 `measure`：引擎默认不可重入，同一句柄上的调用必须串行。

pub mod cache;
pub mod options;
pub mod visqol_cli;

pub use cache::{EngineConfigCache, EngineHandle, EngineKey};
pub use options::{EngineOptions, Mode};
pub use visqol_cli::VisqolCliEngine;

use crate::error::MeasureResult;

/// 引擎单次测量输出
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityResult {
    pub moslqo: f64,
    pub vnsim: f64,
    pub fvnsim: Vec<f64>,
    pub center_freq_bands: Vec<f64>,
}

/// 外部评分引擎
pub trait ScoringEngine: Send + Sync {
    /// 已配置的引擎实例
    type Handle: Send;

    /// 按配置创建句柄
    ///
    /// 引擎无法定位或初始化时返回 `MeasureError::EngineUnavailable`。
    fn configure(&self, options: &EngineOptions) -> MeasureResult<Self::Handle>;

    /// 对一对样本打分
    ///
    /// 两个缓冲区必须已处于句柄配置的采样率。
    fn measure(
        &self,
        handle: &mut Self::Handle,
        reference: &[f64],
        degraded: &[f64],
    ) -> MeasureResult<SimilarityResult>;
}
