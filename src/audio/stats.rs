//! 音频基础统计
//!
//! 供CLI verbose模式展示输入信号概况。

/// 单声道样本的基础统计信息
#[derive(Debug, Clone, PartialEq)]
pub struct AudioStats {
    /// 时长（秒）
    pub duration: f64,
    pub sample_rate: u32,
    pub num_samples: usize,
    pub rms: f64,
    /// 最大绝对值
    pub max_amplitude: f64,
    /// 平均绝对值
    pub mean_amplitude: f64,
}

impl AudioStats {
    /// 计算统计信息（空输入时各项为0）
    pub fn compute(samples: &[f64], sample_rate: u32) -> Self {
        let num_samples = samples.len();
        let duration = if sample_rate > 0 {
            num_samples as f64 / sample_rate as f64
        } else {
            0.0
        };

        if num_samples == 0 {
            return Self {
                duration,
                sample_rate,
                num_samples,
                rms: 0.0,
                max_amplitude: 0.0,
                mean_amplitude: 0.0,
            };
        }

        let n = num_samples as f64;
        let (sum_sq, sum_abs, max_abs) =
            samples
                .iter()
                .fold((0.0f64, 0.0f64, 0.0f64), |(sq, abs, max), &s| {
                    let a = s.abs();
                    (sq + s * s, abs + a, max.max(a))
                });

        Self {
            duration,
            sample_rate,
            num_samples,
            rms: (sum_sq / n).sqrt(),
            max_amplitude: max_abs,
            mean_amplitude: sum_abs / n,
        }
    }
}
