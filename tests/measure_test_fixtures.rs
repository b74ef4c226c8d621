//! 测量测试固件
//!
//! 用hound生成各种位深/声道的WAV字节，以及记录调用的模拟评分引擎。

#![allow(dead_code)]

use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use visqol_meter::{
    EngineConfigCache, EngineOptions, MeasureError, MeasureResult, Measurer, Mode,
    ScoringEngine, SimilarityResult,
};

pub fn log(msg_zh: impl AsRef<str>, msg_en: impl AsRef<str>) {
    println!("{} / {}", msg_zh.as_ref(), msg_en.as_ref());
}

/// 用hound生成整数PCM WAV字节（样本按帧交错）
pub fn wav_bytes<S: hound::Sample + Copy>(
    samples: &[S],
    channels: u16,
    bits_per_sample: u16,
    sample_rate: u32,
) -> Vec<u8> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample,
        sample_format: SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).expect("创建WavWriter失败");
        for &sample in samples {
            writer.write_sample(sample).expect("写入样本失败");
        }
        writer.finalize().expect("完成WAV失败");
    }
    cursor.into_inner()
}

/// 单声道16位WAV
pub fn mono_i16(samples: &[i16], sample_rate: u32) -> Vec<u8> {
    wav_bytes(samples, 1, 16, sample_rate)
}

/// 16位正弦波样本
pub fn sine_i16(len: usize, sample_rate: u32, freq: f64, amplitude: f64) -> Vec<i16> {
    (0..len)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            ((2.0 * std::f64::consts::PI * freq * t).sin() * amplitude * 32767.0) as i16
        })
        .collect()
}

/// 头部损坏的WAV（RIFF标识正确，WAVE标识错误）
pub fn malformed_wav() -> Vec<u8> {
    let mut bytes = mono_i16(&[0, 1, 2, 3], 48000);
    bytes[8..12].copy_from_slice(b"JUNK");
    bytes
}

/// 写入临时目录
pub fn write_fixture(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).expect("写入固件失败");
    path
}

/// 一次measure调用看到的输入
#[derive(Debug, Clone)]
pub struct MeasureCall {
    pub sample_rate: u32,
    pub reference: Vec<f64>,
    pub degraded: Vec<f64>,
}

/// 记录所有调用的模拟引擎
///
/// 返回固定的相似度结果；受损首样本低于 `fail_below` 时返回测量失败。
pub struct RecordingEngine {
    pub result: SimilarityResult,
    pub fail_below: Option<f64>,
    pub unavailable: bool,
    pub configures: Mutex<Vec<EngineOptions>>,
    pub calls: Mutex<Vec<MeasureCall>>,
}

impl RecordingEngine {
    pub fn returning(moslqo: f64) -> Self {
        Self {
            result: SimilarityResult {
                moslqo,
                vnsim: 0.875,
                fvnsim: vec![0.9, 0.8, 0.7],
                center_freq_bands: vec![50.0, 150.0, 250.0],
            },
            fail_below: None,
            unavailable: false,
            configures: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_below(mut self, threshold: f64) -> Self {
        self.fail_below = Some(threshold);
        self
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::returning(0.0)
        }
    }

    pub fn configure_count(&self) -> usize {
        self.configures.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<MeasureCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl ScoringEngine for RecordingEngine {
    type Handle = EngineOptions;

    fn configure(&self, options: &EngineOptions) -> MeasureResult<EngineOptions> {
        if self.unavailable {
            return Err(MeasureError::EngineUnavailable("模拟引擎未安装".into()));
        }
        self.configures.lock().unwrap().push(options.clone());
        Ok(options.clone())
    }

    fn measure(
        &self,
        handle: &mut EngineOptions,
        reference: &[f64],
        degraded: &[f64],
    ) -> MeasureResult<SimilarityResult> {
        self.calls.lock().unwrap().push(MeasureCall {
            sample_rate: handle.sample_rate,
            reference: reference.to_vec(),
            degraded: degraded.to_vec(),
        });
        if let Some(threshold) = self.fail_below
            && degraded[0] < threshold
        {
            return Err(MeasureError::MeasurementFailure("模拟引擎失败".into()));
        }
        Ok(self.result.clone())
    }
}

/// 以模拟引擎构建测量器
pub fn measurer(engine: RecordingEngine, mode: Mode) -> Measurer<RecordingEngine> {
    Measurer::new(
        std::sync::Arc::new(EngineConfigCache::new(engine, "/models")),
        mode,
    )
}
