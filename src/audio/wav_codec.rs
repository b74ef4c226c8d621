//! WAV编解码器
//!
//! 解码：解析RIFF/WAVE容器，将8/16/24/32位整数PCM归一化为f64并按帧平均下混为单声道。
//! 编码：固定输出单声道16位PCM（基于hound写入）。
//!
//! 归一化除数直接影响评分可复现性，不能改动：
//! - 8位:  `(u8 - 128) / 128`
//! - 16位: `i16 / 32768`
//! - 24位: `i24 / 8388608`
//! - 32位: `i32 / 2147483648`
//!
//! 解码阶段不做限幅：瞬态峰值允许略超 [-1.0, 1.0]。

use crate::error::{MeasureError, MeasureResult, malformed};
use std::io::Cursor;
use tracing::debug;

// WAVE格式码
const WAVE_FORMAT_PCM: u16 = 1;
const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// RIFF头长度（"RIFF" + size + "WAVE"）
const RIFF_HEADER_LEN: usize = 12;
/// chunk头长度（id + size）
const CHUNK_HEADER_LEN: usize = 8;
/// fmt块最小长度（PCMWAVEFORMAT）
const FMT_MIN_LEN: usize = 16;
/// WAVE_FORMAT_EXTENSIBLE 中 SubFormat GUID 的偏移
const EXTENSIBLE_SUBFORMAT_OFFSET: usize = 24;

/// 受支持的位深度（封闭集合）
///
/// 其他位深一律在 [`TryFrom<u16>`] 中以 `UnsupportedFormat` 拒绝。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitDepth {
    Eight,
    Sixteen,
    TwentyFour,
    ThirtyTwo,
}

impl BitDepth {
    /// 位数
    pub fn bits(self) -> u16 {
        match self {
            BitDepth::Eight => 8,
            BitDepth::Sixteen => 16,
            BitDepth::TwentyFour => 24,
            BitDepth::ThirtyTwo => 32,
        }
    }

    /// 每个样本占用的字节数
    #[inline]
    pub fn bytes_per_sample(self) -> usize {
        self.bits() as usize / 8
    }

    /// 将单个样本的原始小端字节转换为归一化f64
    ///
    /// `raw` 长度必须等于 [`bytes_per_sample`](Self::bytes_per_sample)。
    #[inline]
    fn normalize(self, raw: &[u8]) -> f64 {
        match self {
            // 8位PCM为无符号，128为零点
            BitDepth::Eight => (raw[0] as f64 - 128.0) / 128.0,
            BitDepth::Sixteen => i16::from_le_bytes([raw[0], raw[1]]) as f64 / 32768.0,
            BitDepth::TwentyFour => {
                // 最高字节按有符号扩展
                let value = ((raw[2] as i8 as i32) << 16) | ((raw[1] as i32) << 8) | raw[0] as i32;
                value as f64 / 8_388_608.0
            }
            BitDepth::ThirtyTwo => {
                i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as f64 / 2_147_483_648.0
            }
        }
    }
}

impl TryFrom<u16> for BitDepth {
    type Error = MeasureError;

    fn try_from(bits: u16) -> Result<Self, Self::Error> {
        match bits {
            8 => Ok(BitDepth::Eight),
            16 => Ok(BitDepth::Sixteen),
            24 => Ok(BitDepth::TwentyFour),
            32 => Ok(BitDepth::ThirtyTwo),
            other => Err(MeasureError::UnsupportedFormat(format!(
                "{other}位（仅支持 8/16/24/32 位整数PCM）"
            ))),
        }
    }
}

/// WAV描述信息（源文件的原始参数，下混前）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavDescriptor {
    /// 声道数（≥1）
    pub channel_count: u16,
    /// 位深度
    pub bit_depth: BitDepth,
    /// 采样率 (Hz)
    pub sample_rate: u32,
    /// 帧数（每帧包含 channel_count 个样本）
    pub frame_count: u64,
}

impl WavDescriptor {
    /// 位深度数值
    pub fn bits_per_sample(&self) -> u16 {
        self.bit_depth.bits()
    }

    /// 每帧字节数
    pub fn frame_size(&self) -> usize {
        self.channel_count as usize * self.bit_depth.bytes_per_sample()
    }
}

/// fmt块中解码需要的字段
#[derive(Debug, Clone, Copy)]
struct FmtChunk {
    format_tag: u16,
    channels: u16,
    sample_rate: u32,
    block_align: u16,
    bits_per_sample: u16,
}

impl FmtChunk {
    fn parse(body: &[u8]) -> MeasureResult<Self> {
        if body.len() < FMT_MIN_LEN {
            return Err(MeasureError::MalformedContainer(format!(
                "fmt块长度{}字节，至少需要{FMT_MIN_LEN}字节",
                body.len()
            )));
        }

        let mut format_tag = read_u16(body, 0);
        if format_tag == WAVE_FORMAT_EXTENSIBLE {
            // SubFormat GUID 的前两个字节即实际格式码
            if body.len() < EXTENSIBLE_SUBFORMAT_OFFSET + 2 {
                return Err(MeasureError::MalformedContainer(
                    "WAVE_FORMAT_EXTENSIBLE 缺少 SubFormat".to_string(),
                ));
            }
            format_tag = read_u16(body, EXTENSIBLE_SUBFORMAT_OFFSET);
        }

        Ok(Self {
            format_tag,
            channels: read_u16(body, 2),
            sample_rate: read_u32(body, 4),
            block_align: read_u16(body, 12),
            bits_per_sample: read_u16(body, 14),
        })
    }
}

#[inline]
fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

#[inline]
fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// 在RIFF容器中定位 fmt 与 data 块
///
/// 返回 (fmt块内容, data块内容)。data块声明长度超出实际字节数时视为容器损坏。
fn locate_chunks(bytes: &[u8]) -> MeasureResult<(&[u8], &[u8])> {
    if bytes.len() < RIFF_HEADER_LEN {
        return Err(MeasureError::MalformedContainer(format!(
            "文件过短（{}字节），不足以包含RIFF头",
            bytes.len()
        )));
    }
    if &bytes[0..4] != b"RIFF" {
        return Err(MeasureError::MalformedContainer(
            "缺少RIFF标识".to_string(),
        ));
    }
    if &bytes[8..12] != b"WAVE" {
        return Err(MeasureError::MalformedContainer(
            "缺少WAVE标识".to_string(),
        ));
    }

    let mut fmt: Option<&[u8]> = None;
    let mut pos = RIFF_HEADER_LEN;

    while pos + CHUNK_HEADER_LEN <= bytes.len() {
        let id = &bytes[pos..pos + 4];
        let declared = read_u32(bytes, pos + 4) as usize;
        let body_start = pos + CHUNK_HEADER_LEN;
        let available = bytes.len() - body_start;

        if id == b"data" {
            let Some(fmt) = fmt else {
                return Err(MeasureError::MalformedContainer(
                    "data块出现在fmt块之前".to_string(),
                ));
            };
            if declared > available {
                return Err(MeasureError::MalformedContainer(format!(
                    "data块声明{declared}字节，实际只有{available}字节"
                )));
            }
            return Ok((fmt, &bytes[body_start..body_start + declared]));
        }

        if declared > available {
            return Err(malformed(
                "chunk长度越界",
                format!("{}声明{declared}字节", String::from_utf8_lossy(id)),
            ));
        }
        if id == b"fmt " {
            fmt = Some(&bytes[body_start..body_start + declared]);
        }

        // chunk按偶数字节对齐
        pos = body_start + declared + (declared & 1);
    }

    Err(MeasureError::MalformedContainer(if fmt.is_some() {
        "缺少data块".to_string()
    } else {
        "缺少fmt块".to_string()
    }))
}

/// 解码WAV字节流为单声道归一化样本
///
/// # 错误
///
/// * `MeasureError::UnsupportedFormat` - 非整数PCM或位深不在 {8,16,24,32}
/// * `MeasureError::MalformedContainer` - 头部缺失、字段矛盾、data长度与帧大小不符
/// * `MeasureError::EmptyAudio` - 帧数为0
pub fn decode(bytes: &[u8]) -> MeasureResult<(Vec<f64>, WavDescriptor)> {
    let (fmt_body, payload) = locate_chunks(bytes)?;
    let fmt = FmtChunk::parse(fmt_body)?;

    if fmt.format_tag != WAVE_FORMAT_PCM {
        return Err(MeasureError::UnsupportedFormat(format!(
            "格式码{:#06x}（仅支持整数PCM）",
            fmt.format_tag
        )));
    }
    if fmt.channels == 0 {
        return Err(MeasureError::MalformedContainer("声道数为0".to_string()));
    }
    if fmt.sample_rate == 0 {
        return Err(MeasureError::MalformedContainer("采样率为0".to_string()));
    }

    let bit_depth = BitDepth::try_from(fmt.bits_per_sample)?;
    let frame_size = fmt.channels as usize * bit_depth.bytes_per_sample();
    if fmt.block_align as usize != frame_size {
        return Err(MeasureError::MalformedContainer(format!(
            "block_align={}与声道数×样本字节数={frame_size}不一致",
            fmt.block_align
        )));
    }
    if payload.len() % frame_size != 0 {
        return Err(MeasureError::MalformedContainer(format!(
            "data块长度{}不是帧大小{frame_size}的整数倍",
            payload.len()
        )));
    }

    let descriptor = WavDescriptor {
        channel_count: fmt.channels,
        bit_depth,
        sample_rate: fmt.sample_rate,
        frame_count: (payload.len() / frame_size) as u64,
    };
    if descriptor.frame_count == 0 {
        return Err(MeasureError::EmptyAudio("WAV帧数为0".to_string()));
    }

    let samples = downmix_frames(payload, &descriptor);

    debug!(
        channels = descriptor.channel_count,
        bits = descriptor.bits_per_sample(),
        sample_rate = descriptor.sample_rate,
        frames = descriptor.frame_count,
        "WAV decoded"
    );

    Ok((samples, descriptor))
}

/// 逐帧解码并对各声道取算术平均
fn downmix_frames(payload: &[u8], descriptor: &WavDescriptor) -> Vec<f64> {
    let depth = descriptor.bit_depth;
    let sample_bytes = depth.bytes_per_sample();
    let frames = payload.chunks_exact(descriptor.frame_size());

    if descriptor.channel_count == 1 {
        return frames.map(|frame| depth.normalize(frame)).collect();
    }

    let channels = descriptor.channel_count as f64;
    frames
        .map(|frame| {
            let sum: f64 = frame
                .chunks_exact(sample_bytes)
                .map(|raw| depth.normalize(raw))
                .sum();
            sum / channels
        })
        .collect()
}

/// 将归一化样本量化为16位整数
///
/// `round(value * 32767)` 后饱和到 i16 范围，不允许回绕。
#[inline]
pub fn quantize_i16(value: f64) -> i16 {
    (value * 32767.0)
        .round()
        .clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

/// 编码为单声道16位PCM WAV字节流
///
/// 对非16位源是有损、不可逆的变换。
pub fn encode(samples: &[f64], sample_rate: u32) -> MeasureResult<Vec<u8>> {
    if sample_rate == 0 {
        return Err(MeasureError::InvalidInput("采样率不能为0".to_string()));
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            writer.write_sample(quantize_i16(sample))?;
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}
