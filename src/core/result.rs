//! 测量输入与输出数据结构

use crate::engine::SimilarityResult;
use serde::Serialize;
use std::path::PathBuf;

/// 测量输入源
#[derive(Debug, Clone, PartialEq)]
pub enum AudioSource {
    /// 已解码样本，调用方保证其已处于模式默认采样率
    Samples(Vec<f64>),
    /// 内存中的WAV字节，可带标签用于结果标识
    WavBytes { bytes: Vec<u8>, label: Option<String> },
    /// WAV文件路径
    WavFile(PathBuf),
}

impl AudioSource {
    pub fn wav_bytes(bytes: Vec<u8>, label: impl Into<String>) -> Self {
        AudioSource::WavBytes {
            bytes,
            label: Some(label.into()),
        }
    }

    /// 结果中记录的来源标识
    pub fn locator(&self) -> Option<String> {
        match self {
            AudioSource::Samples(_) => None,
            AudioSource::WavBytes { label, .. } => label.clone(),
            AudioSource::WavFile(path) => Some(path.display().to_string()),
        }
    }
}

impl From<Vec<f64>> for AudioSource {
    fn from(samples: Vec<f64>) -> Self {
        AudioSource::Samples(samples)
    }
}

impl From<PathBuf> for AudioSource {
    fn from(path: PathBuf) -> Self {
        AudioSource::WavFile(path)
    }
}

impl From<&std::path::Path> for AudioSource {
    fn from(path: &std::path::Path) -> Self {
        AudioSource::WavFile(path.to_path_buf())
    }
}

/// 单次测量结果（创建后不可变）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementResult {
    pub moslqo: f64,
    pub vnsim: f64,
    pub fvnsim: Vec<f64>,
    pub center_freq_bands: Vec<f64>,
    pub reference_path: Option<String>,
    pub degraded_path: Option<String>,
}

impl MeasurementResult {
    /// 由引擎输出和来源标识组装结果，引擎数值原样保留
    pub fn from_similarity(
        similarity: SimilarityResult,
        reference_path: Option<String>,
        degraded_path: Option<String>,
    ) -> Self {
        Self {
            moslqo: similarity.moslqo,
            vnsim: similarity.vnsim,
            fvnsim: similarity.fvnsim,
            center_freq_bands: similarity.center_freq_bands,
            reference_path,
            degraded_path,
        }
    }

    /// 宽松批处理模式下的占位结果
    pub(crate) fn placeholder(
        score: f64,
        reference_path: Option<String>,
        degraded_path: Option<String>,
    ) -> Self {
        Self {
            moslqo: score,
            vnsim: 0.0,
            fvnsim: Vec::new(),
            center_freq_bands: Vec::new(),
            reference_path,
            degraded_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locators() {
        assert_eq!(AudioSource::Samples(vec![0.0]).locator(), None);
        assert_eq!(
            AudioSource::wav_bytes(vec![], "ref_a").locator().as_deref(),
            Some("ref_a")
        );
        let unlabeled = AudioSource::WavBytes {
            bytes: vec![],
            label: None,
        };
        assert_eq!(unlabeled.locator(), None);
        assert_eq!(
            AudioSource::from(PathBuf::from("a/b.wav")).locator(),
            Some(PathBuf::from("a/b.wav").display().to_string())
        );
    }

    #[test]
    fn test_from_similarity_passes_values_through() {
        let sim = SimilarityResult {
            moslqo: 4.123456789,
            vnsim: 0.75,
            fvnsim: vec![0.1, 0.2],
            center_freq_bands: vec![50.0, 100.0],
        };
        let result = MeasurementResult::from_similarity(sim.clone(), Some("r".into()), None);
        assert_eq!(result.moslqo, sim.moslqo);
        assert_eq!(result.fvnsim, sim.fvnsim);
        assert_eq!(result.reference_path.as_deref(), Some("r"));
        assert!(result.degraded_path.is_none());
    }
}
