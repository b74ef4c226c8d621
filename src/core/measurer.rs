//! 单对测量流程
//!
//! 解码 → 按模式确定目标采样率 → 重采样 → 从缓存取引擎句柄 → 打分。
//! 目标采样率只由参考侧计算一次，参考与受损两侧各自按原采样率重采样到该目标。

use super::result::{AudioSource, MeasurementResult};
use crate::audio::{decode, resample};
use crate::engine::{EngineConfigCache, Mode, ScoringEngine};
use crate::error::{MeasureError, MeasureResult};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// 解码后的输入
struct LoadedSource {
    samples: Vec<f64>,
    /// WAV来源的原始采样率；原始数组没有采样率元数据
    native_rate: Option<u32>,
    locator: Option<String>,
}

impl LoadedSource {
    fn load(source: AudioSource) -> MeasureResult<Self> {
        let locator = source.locator();
        let (samples, native_rate) = match source {
            AudioSource::Samples(samples) => (samples, None),
            AudioSource::WavBytes { bytes, .. } => {
                let (samples, descriptor) = decode(&bytes)?;
                (samples, Some(descriptor.sample_rate))
            }
            AudioSource::WavFile(path) => {
                let bytes = std::fs::read(&path)?;
                let (samples, descriptor) = decode(&bytes)?;
                (samples, Some(descriptor.sample_rate))
            }
        };
        Ok(Self {
            samples,
            native_rate,
            locator,
        })
    }

    /// 重采样到目标采样率
    ///
    /// 原始数组视为处于 `raw_rate`（模式默认采样率），不做隐式重采样；
    /// 与目标采样率不一致时返回 `InvalidInput`。
    fn into_target_rate(
        self,
        target_rate: u32,
        raw_rate: u32,
        side: &str,
    ) -> MeasureResult<Vec<f64>> {
        let samples = match self.native_rate {
            Some(rate) => resample(self.samples, rate, target_rate)?,
            None if raw_rate == target_rate => self.samples,
            None => {
                return Err(MeasureError::InvalidInput(format!(
                    "{side}为原始样本（按{raw_rate}Hz处理），但目标采样率为{target_rate}Hz / \
                     {side} is raw samples assumed at {raw_rate} Hz, but target rate is {target_rate} Hz"
                )));
            }
        };
        if samples.is_empty() {
            return Err(MeasureError::EmptyAudio(format!(
                "{side}在{target_rate}Hz下没有样本 / {side} has no samples at {target_rate} Hz"
            )));
        }
        Ok(samples)
    }
}

/// 测量器：绑定一个模式和一个共享的引擎缓存
pub struct Measurer<E: ScoringEngine> {
    cache: Arc<EngineConfigCache<E>>,
    mode: Mode,
}

impl<E: ScoringEngine> Clone for Measurer<E> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            mode: self.mode,
        }
    }
}

impl<E: ScoringEngine> Measurer<E> {
    pub fn new(cache: Arc<EngineConfigCache<E>>, mode: Mode) -> Self {
        Self { cache, mode }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn cache(&self) -> &Arc<EngineConfigCache<E>> {
        &self.cache
    }

    /// 测量一对音频
    ///
    /// # 错误
    ///
    /// 解码、重采样、引擎配置和引擎打分的错误都原样返回，不产生替代分数。
    pub fn measure(
        &self,
        reference: AudioSource,
        degraded: AudioSource,
    ) -> MeasureResult<MeasurementResult> {
        let reference = LoadedSource::load(reference)?;
        let degraded = LoadedSource::load(degraded)?;

        let target_rate = match reference.native_rate {
            Some(rate) => self.mode.target_sample_rate(rate),
            None => self.mode.default_sample_rate(),
        };

        debug!(
            mode = %self.mode,
            reference_rate = ?reference.native_rate,
            degraded_rate = ?degraded.native_rate,
            target_rate,
            "Preparing measurement"
        );

        let reference_path = reference.locator.clone();
        let degraded_path = degraded.locator.clone();
        let raw_rate = self.mode.default_sample_rate();
        let reference_samples =
            reference.into_target_rate(target_rate, raw_rate, "参考音频 reference")?;
        let degraded_samples =
            degraded.into_target_rate(target_rate, raw_rate, "受损音频 degraded")?;

        let handle = self.cache.get_or_create(self.mode, target_rate)?;
        let engine = self.cache.engine();
        let similarity = handle
            .with_exclusive(|raw| engine.measure(raw, &reference_samples, &degraded_samples))?;

        debug!(moslqo = similarity.moslqo, vnsim = similarity.vnsim, "Measurement finished");

        Ok(MeasurementResult::from_similarity(
            similarity,
            reference_path,
            degraded_path,
        ))
    }

    /// 测量两个WAV文件
    pub fn measure_files<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        reference: P,
        degraded: Q,
    ) -> MeasureResult<MeasurementResult> {
        self.measure(
            AudioSource::WavFile(reference.as_ref().to_path_buf()),
            AudioSource::WavFile(degraded.as_ref().to_path_buf()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::encode;
    use crate::engine::{EngineOptions, SimilarityResult};

    /// 返回两侧长度与配置采样率的引擎
    struct EchoEngine;

    impl ScoringEngine for EchoEngine {
        type Handle = u32;

        fn configure(&self, options: &EngineOptions) -> MeasureResult<u32> {
            Ok(options.sample_rate)
        }

        fn measure(
            &self,
            rate: &mut u32,
            reference: &[f64],
            degraded: &[f64],
        ) -> MeasureResult<SimilarityResult> {
            Ok(SimilarityResult {
                moslqo: *rate as f64,
                vnsim: 0.5,
                fvnsim: vec![reference.len() as f64, degraded.len() as f64],
                center_freq_bands: Vec::new(),
            })
        }
    }

    fn measurer(mode: Mode) -> Measurer<EchoEngine> {
        Measurer::new(Arc::new(EngineConfigCache::new(EchoEngine, "/models")), mode)
    }

    fn wav(rate: u32, len: usize) -> Vec<u8> {
        encode(&vec![0.25; len], rate).unwrap()
    }

    #[test]
    fn test_raw_samples_use_mode_default_rate() {
        let result = measurer(Mode::Speech)
            .measure(vec![0.1; 10].into(), vec![0.2; 7].into())
            .unwrap();
        assert_eq!(result.moslqo, 16000.0);
        assert_eq!(result.fvnsim, vec![10.0, 7.0]);
        assert!(result.reference_path.is_none());
    }

    #[test]
    fn test_mismatched_rates_resample_to_reference_target() {
        // 参考44100（语音模式保留），受损22050 → 上采样到44100
        let result = measurer(Mode::Speech)
            .measure(
                AudioSource::wav_bytes(wav(44100, 441), "ref"),
                AudioSource::wav_bytes(wav(22050, 220), "deg"),
            )
            .unwrap();
        assert_eq!(result.moslqo, 44100.0);
        assert_eq!(result.fvnsim, vec![441.0, 440.0]);
        assert_eq!(result.degraded_path.as_deref(), Some("deg"));
    }

    #[test]
    fn test_audio_mode_resamples_to_48k() {
        let m = measurer(Mode::Audio);
        let result = m
            .measure(
                AudioSource::wav_bytes(wav(16000, 160), "r"),
                AudioSource::wav_bytes(wav(16000, 160), "d"),
            )
            .unwrap();
        assert_eq!(result.moslqo, 48000.0);
        assert_eq!(result.fvnsim, vec![480.0, 480.0]);
        assert!(m.cache().contains(Mode::Audio, 48000));
        assert!(!m.cache().contains(Mode::Audio, 16000));
    }

    #[test]
    fn test_single_sample_downsampled_to_nothing_is_empty_audio() {
        let err = measurer(Mode::Audio)
            .measure(
                AudioSource::wav_bytes(wav(96000, 1), "r"),
                AudioSource::wav_bytes(wav(96000, 1), "d"),
            )
            .unwrap_err();
        assert!(matches!(err, MeasureError::EmptyAudio(_)));
    }

    #[test]
    fn test_raw_degraded_against_wav_reference_at_default_rate() {
        // 参考16000与原始数组的假定采样率一致
        let result = measurer(Mode::Speech)
            .measure(
                AudioSource::wav_bytes(wav(16000, 160), "ref"),
                vec![0.1; 100].into(),
            )
            .unwrap();
        assert_eq!(result.moslqo, 16000.0);
        assert_eq!(result.fvnsim, vec![160.0, 100.0]);
    }

    #[test]
    fn test_empty_raw_buffer_is_empty_audio() {
        let err = measurer(Mode::Audio)
            .measure(Vec::new().into(), vec![0.1].into())
            .unwrap_err();
        assert!(matches!(err, MeasureError::EmptyAudio(_)));
    }
}
