//! 测量模式与引擎配置
//!
//! 模式决定目标采样率规则、打分选项以及模型文件；采样率只影响 `sample_rate` 字段。

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// AUDIO模式固定目标采样率
pub const AUDIO_SAMPLE_RATE: u32 = 48_000;

/// SPEECH模式最低采样率（低于此值时上采样到此值）
pub const SPEECH_MIN_SAMPLE_RATE: u32 = 16_000;

/// 默认搜索窗口半径
pub const DEFAULT_SEARCH_WINDOW_RADIUS: u32 = 60;

/// AUDIO模式使用的SVR回归模型
pub const AUDIO_MODEL_FILE: &str = "libsvm_nu_svr_model.txt";

/// SPEECH模式使用的lattice模型
pub const SPEECH_MODEL_FILE: &str =
    "lattice_tcditugenmeetpackhref_ls2_nl60_lr12_bs2048_learn.005_ep2400_train1_7_raw.tflite";

/// 测量模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// 全频带音频（48kHz）
    Audio,
    /// 语音（≥16kHz，带VAD）
    Speech,
}

impl Mode {
    /// 原始数组输入所假定的采样率（数组不携带采样率元数据）
    pub fn default_sample_rate(self) -> u32 {
        match self {
            Mode::Audio => AUDIO_SAMPLE_RATE,
            Mode::Speech => SPEECH_MIN_SAMPLE_RATE,
        }
    }

    /// 根据观测到的输入采样率确定目标采样率
    ///
    /// - AUDIO：恒为48000
    /// - SPEECH：输入≥16000时保持原采样率（不重采样），否则强制上采样到16000
    pub fn target_sample_rate(self, observed_rate: u32) -> u32 {
        match self {
            Mode::Audio => AUDIO_SAMPLE_RATE,
            Mode::Speech => observed_rate.max(SPEECH_MIN_SAMPLE_RATE),
        }
    }

    /// 该模式绑定的模型文件名
    pub fn model_file(self) -> &'static str {
        match self {
            Mode::Audio => AUDIO_MODEL_FILE,
            Mode::Speech => SPEECH_MODEL_FILE,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Audio => write!(f, "audio"),
            Mode::Speech => write!(f, "speech"),
        }
    }
}

/// 传给评分引擎 `Configure` 的完整配置
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineOptions {
    pub sample_rate: u32,
    pub use_speech_scoring: bool,
    pub use_lattice_model: bool,
    pub detect_voice_activity: bool,
    pub use_unscaled_mos_mapping: bool,
    pub search_window_radius: u32,
    pub model_artifact_path: PathBuf,
}

impl EngineOptions {
    /// 按模式的固定默认值构建配置
    pub fn for_mode(mode: Mode, sample_rate: u32, model_artifact_path: PathBuf) -> Self {
        match mode {
            Mode::Audio => Self {
                sample_rate,
                use_speech_scoring: false,
                use_lattice_model: false,
                detect_voice_activity: false,
                use_unscaled_mos_mapping: false,
                search_window_radius: DEFAULT_SEARCH_WINDOW_RADIUS,
                model_artifact_path,
            },
            Mode::Speech => Self {
                sample_rate,
                use_speech_scoring: true,
                use_lattice_model: true,
                detect_voice_activity: true,
                // 使用缩放后的MOS映射
                use_unscaled_mos_mapping: false,
                search_window_radius: DEFAULT_SEARCH_WINDOW_RADIUS,
                model_artifact_path,
            },
        }
    }
}
