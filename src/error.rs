//! 统一错误处理框架
//!
//! 区分两类错误：
//! - 可恢复错误：输入格式问题、单次测量失败，以 `Result` 返回给调用方
//! - 致命错误：评分引擎不可用（`EngineUnavailable`），进程级别不可重试

use std::fmt;
use std::io;
use thiserror::Error;

/// 测量流程的统一错误类型
#[derive(Debug, Error)]
pub enum MeasureError {
    /// 不支持的位深度或编码格式（非整数PCM）
    #[error("不支持的音频格式 / Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// WAV容器头部或长度不一致
    #[error("WAV容器损坏 / Malformed container: {0}")]
    MalformedContainer(String),

    /// 零帧音频
    #[error("音频为空 / Empty audio: {0}")]
    EmptyAudio(String),

    /// 评分引擎无法定位或初始化（致命）
    #[error("评分引擎不可用 / Scoring engine unavailable: {0}")]
    EngineUnavailable(String),

    /// 评分引擎在 Measure 调用中失败
    #[error("测量失败 / Measurement failure: {0}")]
    MeasurementFailure(String),

    /// 参数非法（采样率为0等）
    #[error("输入验证失败 / Invalid input: {0}")]
    InvalidInput(String),

    /// 文件I/O错误
    #[error("文件I/O错误 / I/O error: {0}")]
    Io(#[from] io::Error),
}

impl MeasureError {
    /// 是否为进程级致命错误
    ///
    /// 只有引擎不可用属于致命错误：不降级、不重试。
    pub fn is_fatal(&self) -> bool {
        matches!(self, MeasureError::EngineUnavailable(_))
    }
}

impl From<hound::Error> for MeasureError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(e) => MeasureError::Io(e),
            unsupported @ (hound::Error::Unsupported | hound::Error::InvalidSampleFormat) => {
                MeasureError::UnsupportedFormat(format!("WAV编码错误: {unsupported}"))
            }
            other => MeasureError::MalformedContainer(format!("WAV编码错误: {other}")),
        }
    }
}

/// 测量操作的标准Result类型
pub type MeasureResult<T> = Result<T, MeasureError>;

/// 批处理在某一对上中止
#[derive(Debug, Error)]
#[error("第{pair_index}对测量失败 / Pair {pair_index} failed ({}, {}): {source}",
    display_locator(.reference), display_locator(.degraded))]
pub struct BatchError {
    /// 失败对在输入中的位置（从0开始）
    pub pair_index: usize,
    pub reference: Option<String>,
    pub degraded: Option<String>,
    #[source]
    pub source: MeasureError,
}

impl BatchError {
    /// 底层错误
    pub fn kind(&self) -> &MeasureError {
        &self.source
    }
}

fn display_locator(locator: &Option<String>) -> &str {
    locator.as_deref().unwrap_or("<samples>")
}

/// `run_to_csv` 的错误：测量中止或结果写出失败
#[derive(Debug, Error)]
pub enum BatchRunError {
    #[error(transparent)]
    Pair(#[from] BatchError),

    #[error("结果写出失败 / Failed to write results: {0}")]
    Output(#[source] MeasureError),
}

// ==================== 错误转换Helper函数 ====================
// 消除重复的 .map_err(|e| MeasureError::XXX(format!(...))) 模式

/// 创建容器损坏错误的helper函数
#[inline]
pub fn malformed<E: fmt::Display>(context: &str, err: E) -> MeasureError {
    MeasureError::MalformedContainer(format!("{context}: {err}"))
}

/// 创建引擎测量失败错误的helper函数
#[inline]
pub fn engine_failure<E: fmt::Display>(context: &str, err: E) -> MeasureError {
    MeasureError::MeasurementFailure(format!("{context}: {err}"))
}

/// 创建引擎不可用错误的helper函数
#[inline]
pub fn engine_unavailable<E: fmt::Display>(context: &str, err: E) -> MeasureError {
    MeasureError::EngineUnavailable(format!("{context}: {err}"))
}

// ==================== 错误分类系统 ====================
// 用于批量处理失败汇总和CLI退出码映射

/// 错误类别枚举
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum ErrorCategory {
    /// 格式相关错误（位深不支持、容器损坏、空音频）
    Format,
    /// I/O相关错误（文件不存在、权限不足等）
    Io,
    /// 评分引擎相关错误（不可用或测量失败）
    Engine,
    /// 参数错误
    Input,
}

impl ErrorCategory {
    /// 从MeasureError提取错误类别
    pub fn from_error(e: &MeasureError) -> Self {
        match e {
            MeasureError::UnsupportedFormat(_)
            | MeasureError::MalformedContainer(_)
            | MeasureError::EmptyAudio(_) => Self::Format,
            MeasureError::Io(_) => Self::Io,
            MeasureError::EngineUnavailable(_) | MeasureError::MeasurementFailure(_) => {
                Self::Engine
            }
            MeasureError::InvalidInput(_) => Self::Input,
        }
    }

    /// 获取错误类别的显示名称
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Format => "格式错误",
            Self::Io => "I/O错误",
            Self::Engine => "引擎错误",
            Self::Input => "参数错误",
        }
    }
}
