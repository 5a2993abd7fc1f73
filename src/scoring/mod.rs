//! 语音评分拦截子系统
//!
//! 语音题不走真实麦克风：合成音频后在传输层替换掉页面的录音流，
//! 让平台自己的评分服务为合成音频打分。
//!
//! - `splice` — 传输层替换的状态机（装载/替换/丢弃协议）
//! - `bridge` — 把同一协议安装到页面评分 WebSocket 上的注入桥
//! - `ladder` — 按分数阈值推进的重试参数阶梯
//! - `wav` — WAV 头解析，计算可播放时长

pub mod bridge;
pub mod ladder;
pub mod splice;
pub mod wav;

pub use bridge::{InterceptMode, SpeechWsInterceptor};
pub use ladder::{LadderStep, LadderVerdict, ScoreLadder, SynthProfile, RETRY_PROFILES};
pub use splice::{AudioSplice, FrameAction, OutboundFrame, SpliceError};
