//! 音频替换状态机
//!
//! 评分通道上的出站消息分两类：控制/文本消息永远原样放行，
//! 二进制音频帧是麦克风流。协议约定：
//!
//! - 装载 payload 后观察到的第一个音频帧被整体替换为合成音频，payload 即被消费
//! - 同一次尝试中的后续音频帧全部丢弃（平台永远收不到真假混合的音频）
//! - 未装载时收到音频帧也静默丢弃（宁可什么都不发，也不发真实或过期音频）
//!
//! payload 槽位是单写单读的一次性交接：重复装载（未清理就再装）
//! 是违反约定的调用，直接报错而不是悄悄覆盖。

use thiserror::Error;

/// 替换状态机的调用约定错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpliceError {
    /// 上一份注入音频还没清理就再次装载
    #[error("注入音频已装载且尚未清理")]
    AlreadyArmed,
}

/// 评分通道上的一个出站帧
#[derive(Debug, Clone)]
pub enum OutboundFrame {
    /// 控制/文本消息
    Control(String),
    /// 二进制音频帧（麦克风流）
    Audio(Vec<u8>),
}

/// 对单个出站帧的裁决
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameAction {
    /// 原样转发
    Forward,
    /// 用合成音频整体替换本帧
    Substitute(Vec<u8>),
    /// 丢弃本帧
    Suppress,
}

/// 音频替换状态机
///
/// 每次录音尝试对应一个装载-消费-清理周期。
#[derive(Debug, Default)]
pub struct AudioSplice {
    pending: Option<Vec<u8>>,
}

impl AudioSplice {
    pub fn new() -> Self {
        Self::default()
    }

    /// 装载待替换的合成音频
    pub fn arm(&mut self, payload: Vec<u8>) -> Result<(), SpliceError> {
        if self.pending.is_some() {
            return Err(SpliceError::AlreadyArmed);
        }
        self.pending = Some(payload);
        Ok(())
    }

    /// 当前是否有未消费的 payload
    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// 裁决一个出站帧
    pub fn on_outbound_frame(&mut self, frame: &OutboundFrame) -> FrameAction {
        match frame {
            OutboundFrame::Control(_) => FrameAction::Forward,
            OutboundFrame::Audio(_) => match self.pending.take() {
                Some(payload) => FrameAction::Substitute(payload),
                None => FrameAction::Suppress,
            },
        }
    }

    /// 清空槽位（无论是否消费过），幂等
    pub fn disarm(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio(frame: &[u8]) -> OutboundFrame {
        OutboundFrame::Audio(frame.to_vec())
    }

    #[test]
    fn test_control_frames_always_forward() {
        let mut splice = AudioSplice::new();
        let ctl = OutboundFrame::Control("{\"cmd\":\"start\"}".to_string());
        assert_eq!(splice.on_outbound_frame(&ctl), FrameAction::Forward);

        splice.arm(vec![1, 2, 3]).unwrap();
        assert_eq!(splice.on_outbound_frame(&ctl), FrameAction::Forward);
        // 控制帧不消费 payload
        assert!(splice.is_armed());
    }

    #[test]
    fn test_single_substitution_then_suppress() {
        let mut splice = AudioSplice::new();
        splice.arm(vec![9, 9, 9]).unwrap();

        // 第一个音频帧被整体替换
        assert_eq!(
            splice.on_outbound_frame(&audio(&[0, 1])),
            FrameAction::Substitute(vec![9, 9, 9])
        );
        // 同一次尝试中的后续音频帧全部丢弃
        assert_eq!(splice.on_outbound_frame(&audio(&[2, 3])), FrameAction::Suppress);
        assert_eq!(splice.on_outbound_frame(&audio(&[4, 5])), FrameAction::Suppress);
        assert!(!splice.is_armed());
    }

    #[test]
    fn test_unarmed_audio_is_suppressed() {
        let mut splice = AudioSplice::new();
        assert_eq!(splice.on_outbound_frame(&audio(&[1])), FrameAction::Suppress);
        assert_eq!(splice.on_outbound_frame(&audio(&[2])), FrameAction::Suppress);
    }

    #[test]
    fn test_double_arm_is_rejected() {
        let mut splice = AudioSplice::new();
        splice.arm(vec![1]).unwrap();
        assert_eq!(splice.arm(vec![2]), Err(SpliceError::AlreadyArmed));
        // 原 payload 不受影响
        assert_eq!(
            splice.on_outbound_frame(&audio(&[0])),
            FrameAction::Substitute(vec![1])
        );
    }

    #[test]
    fn test_disarm_clears_stale_payload() {
        let mut splice = AudioSplice::new();
        splice.arm(vec![7]).unwrap();
        splice.disarm();
        // 清理后过期音频不会泄漏到下一次尝试
        assert_eq!(splice.on_outbound_frame(&audio(&[0])), FrameAction::Suppress);
        // 幂等
        splice.disarm();
        splice.arm(vec![8]).unwrap();
        assert_eq!(
            splice.on_outbound_frame(&audio(&[0])),
            FrameAction::Substitute(vec![8])
        );
    }
}
