//! 音频I/O模块
//!
//! WAV编解码、线性插值重采样，以及基于二者的文件读写便捷函数。

pub mod resampler;
mod stats;
pub mod wav_codec;

pub use resampler::resample;
pub use stats::AudioStats;
pub use wav_codec::{BitDepth, WavDescriptor, decode, encode};

use crate::error::MeasureResult;
use std::path::Path;

/// 读取WAV文件并解码为单声道样本
pub fn load_wav<P: AsRef<Path>>(path: P) -> MeasureResult<(Vec<f64>, WavDescriptor)> {
    let bytes = std::fs::read(path.as_ref())?;
    decode(&bytes)
}

/// 读取WAV文件，可选重采样到目标采样率
///
/// 返回 (样本, 实际采样率)。
pub fn load_audio<P: AsRef<Path>>(
    path: P,
    target_rate: Option<u32>,
) -> MeasureResult<(Vec<f64>, u32)> {
    let (samples, descriptor) = load_wav(path)?;
    match target_rate {
        Some(target) if target != descriptor.sample_rate => {
            Ok((resample(samples, descriptor.sample_rate, target)?, target))
        }
        _ => Ok((samples, descriptor.sample_rate)),
    }
}

/// 以单声道16位PCM保存样本
pub fn save_audio<P: AsRef<Path>>(path: P, samples: &[f64], sample_rate: u32) -> MeasureResult<()> {
    let bytes = encode(samples, sample_rate)?;
    std::fs::write(path.as_ref(), bytes)?;
    Ok(())
}
