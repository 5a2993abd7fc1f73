//! WAV 头解析
//!
//! 注入音频后需要等满"可播放时长 + 固定缓冲"再点停止录音，
//! 否则平台按时间切分会截断注入的音频。这里只解析 RIFF/WAVE
//! 头里算时长所需的两个量：fmt 块的字节率和 data 块的大小。

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WavError {
    #[error("数据太短，不是完整的 WAV 文件")]
    TooShort,
    #[error("缺少 RIFF/WAVE 标识")]
    NotRiffWave,
    #[error("未找到 fmt 块或字节率为 0")]
    InvalidFormat,
    #[error("未找到 data 块")]
    MissingData,
}

/// 计算 WAV 音频的可播放时长（秒）
pub fn wav_duration_secs(bytes: &[u8]) -> Result<f64, WavError> {
    if bytes.len() < 12 {
        return Err(WavError::TooShort);
    }
    if &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err(WavError::NotRiffWave);
    }

    let mut byte_rate: Option<u32> = None;
    let mut data_len: Option<u32> = None;

    // 逐块扫描：块头是 4 字节标识 + 4 字节小端长度
    let mut pos = 12usize;
    while pos + 8 <= bytes.len() {
        let chunk_id = &bytes[pos..pos + 4];
        let chunk_len = u32::from_le_bytes([
            bytes[pos + 4],
            bytes[pos + 5],
            bytes[pos + 6],
            bytes[pos + 7],
        ]) as usize;
        let body_start = pos + 8;

        if chunk_id == b"fmt " {
            // 字节率在 fmt 块内偏移 8..12
            if body_start + 12 <= bytes.len() && chunk_len >= 12 {
                byte_rate = Some(u32::from_le_bytes([
                    bytes[body_start + 8],
                    bytes[body_start + 9],
                    bytes[body_start + 10],
                    bytes[body_start + 11],
                ]));
            }
        } else if chunk_id == b"data" {
            data_len = Some(chunk_len as u32);
        }

        // 块按 2 字节对齐
        pos = body_start + chunk_len + (chunk_len & 1);
    }

    let byte_rate = match byte_rate {
        Some(r) if r > 0 => r,
        _ => return Err(WavError::InvalidFormat),
    };
    let data_len = data_len.ok_or(WavError::MissingData)?;

    Ok(data_len as f64 / byte_rate as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 构造一个最小的 PCM WAV 文件头
    fn make_wav(sample_rate: u32, channels: u16, bits: u16, data_len: u32) -> Vec<u8> {
        let byte_rate = sample_rate * channels as u32 * (bits as u32 / 8);
        let block_align = channels * bits / 8;
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes()); // PCM
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&byte_rate.to_le_bytes());
        out.extend_from_slice(&block_align.to_le_bytes());
        out.extend_from_slice(&bits.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        out.extend(std::iter::repeat(0u8).take(data_len as usize));
        out
    }

    #[test]
    fn test_duration_mono_16k() {
        // 16kHz 单声道 16bit：一秒 = 32000 字节
        let wav = make_wav(16_000, 1, 16, 64_000);
        let d = wav_duration_secs(&wav).unwrap();
        assert!((d - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_duration_stereo_44k() {
        let wav = make_wav(44_100, 2, 16, 176_400);
        let d = wav_duration_secs(&wav).unwrap();
        assert!((d - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_too_short() {
        assert_eq!(wav_duration_secs(b"RIFF"), Err(WavError::TooShort));
    }

    #[test]
    fn test_not_riff() {
        let mut wav = make_wav(16_000, 1, 16, 100);
        wav[0] = b'X';
        assert_eq!(wav_duration_secs(&wav), Err(WavError::NotRiffWave));
    }

    #[test]
    fn test_missing_data_chunk() {
        let wav = make_wav(16_000, 1, 16, 0);
        // data 块长度 0 仍算存在
        assert_eq!(wav_duration_secs(&wav), Ok(0.0));

        let truncated = &wav[..36];
        assert_eq!(wav_duration_secs(truncated), Err(WavError::MissingData));
    }
}
