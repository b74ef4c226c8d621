//! 线性插值重采样
//!
//! 输出长度 `floor(len * target / orig)`，输出点均匀分布在 `[0, len - 1]` 的虚拟索引上，
//! 相邻原始样本之间线性插值。
//!
//! 这是已知的保真度限制：降采样没有抗混叠低通，会引入混叠。
//! 评分引擎对齐的是这一行为，不要替换为带限重采样。

use crate::error::{MeasureError, MeasureResult};
use tracing::debug;

/// 计算重采样后的输出长度
///
/// 使用整数运算，避免浮点比例在大长度下的舍入偏差。
#[inline]
pub fn resampled_len(orig_len: usize, orig_rate: u32, target_rate: u32) -> usize {
    ((orig_len as u128 * target_rate as u128) / orig_rate as u128) as usize
}

/// 将样本从 `orig_rate` 重采样到 `target_rate`
///
/// 采样率相同时原样返回输入（不复制）。
///
/// 退化输入的确定行为：
/// - 空输入 → 空输出
/// - 单样本输入 → 输出长度按公式计算，每个输出点都是该样本（长度可能为0）
///
/// # 错误
///
/// * `MeasureError::InvalidInput` - 任一采样率为0
pub fn resample(samples: Vec<f64>, orig_rate: u32, target_rate: u32) -> MeasureResult<Vec<f64>> {
    if orig_rate == 0 || target_rate == 0 {
        return Err(MeasureError::InvalidInput(format!(
            "采样率不能为0（{orig_rate} → {target_rate}）"
        )));
    }
    if orig_rate == target_rate {
        return Ok(samples);
    }

    let orig_len = samples.len();
    let new_len = resampled_len(orig_len, orig_rate, target_rate);

    let resampled = match (orig_len, new_len) {
        (_, 0) | (0, _) => Vec::new(),
        (1, n) => vec![samples[0]; n],
        (_, 1) => vec![samples[0]],
        (len, n) => interpolate(&samples, len, n),
    };

    debug!(
        orig_rate,
        target_rate,
        orig_len,
        new_len = resampled.len(),
        "Resampled with linear interpolation"
    );

    Ok(resampled)
}

/// 在 `[0, len-1]` 上取 `n` 个等距点做线性插值（len ≥ 2, n ≥ 2）
fn interpolate(samples: &[f64], len: usize, n: usize) -> Vec<f64> {
    let last = len - 1;
    let step = last as f64 / (n - 1) as f64;

    let mut out = Vec::with_capacity(n);
    for i in 0..n - 1 {
        let pos = i as f64 * step;
        let index = (pos.floor() as usize).min(last);
        if index == last {
            out.push(samples[last]);
            continue;
        }
        let frac = pos - index as f64;
        let a = samples[index];
        let b = samples[index + 1];
        out.push(a + (b - a) * frac);
    }
    // 终点精确落在最后一个原始样本上
    out.push(samples[last]);
    out
}
