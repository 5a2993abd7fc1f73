//! 语音类策略的公共执行器
//!
//! 单句语音任务的完整生命周期：合成 → 装载注入 → 模拟录音 →
//! 等分数 → 按阶梯推进。每次尝试结束后无条件清理注入状态
//! （包括出错路径），崩溃的尝试不可能污染下一次。

pub mod qa_voice;
pub mod read_aloud;
pub mod role_play;

use anyhow::Result;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::ai::AiGateway;
use crate::error::{AiError, AppError};
use crate::page::{selectors, PageDriver};
use crate::scoring::wav::wav_duration_secs;
use crate::scoring::{LadderStep, LadderVerdict, ScoreLadder, SpeechWsInterceptor, SynthProfile, RETRY_PROFILES};

/// 进入录音状态的等待上限
const RECORD_STATE_TIMEOUT_MS: u64 = 5_000;
/// 等待分数出现的上限
const SCORE_TIMEOUT_MS: u64 = 20_000;
/// 停止录音前在音频可播放时长外附加的缓冲（秒），
/// 防止平台按时间切分截断注入的音频
const STOP_BUFFER_SECS: f64 = 0.5;

/// 单句语音任务的结果
#[derive(Debug, Clone, Copy)]
pub struct VoiceTaskResult {
    pub succeeded: bool,
    /// 要求中止整个页面（硬性失败或阶梯耗尽）
    pub abort_page: bool,
}

/// 对一句语音执行完整的重试阶梯
pub(crate) async fn run_score_ladder(
    page: &PageDriver,
    ai: &AiGateway,
    interceptor: &mut SpeechWsInterceptor<'_>,
    container: &str,
    idx: usize,
    ref_text: &str,
) -> Result<VoiceTaskResult> {
    let mut ladder = ScoreLadder::new();

    for (attempt, profile) in RETRY_PROFILES.iter().enumerate() {
        info!(
            "--- 第 {}/{} 次尝试 ({}) ---",
            attempt + 1,
            RETRY_PROFILES.len(),
            profile.description
        );

        let outcome = attempt_once(page, ai, interceptor, container, idx, ref_text, profile).await;

        // 无论成败先清理注入状态，过期音频不能泄漏到下一次尝试
        if let Err(e) = interceptor.clear().await {
            warn!("清理注入状态失败（忽略）: {}", e);
        }

        let score = match outcome {
            Ok(score) => score,
            Err(e) => {
                error!("第 {} 次尝试时发生内部错误: {}", attempt + 1, e);
                sleep(Duration::from_secs(1)).await;
                continue;
            }
        };

        info!(
            "尝试 {} 得分: {} (使用参数: {})",
            attempt + 1,
            score,
            profile.description
        );
        match ladder.observe(score) {
            LadderStep::AcceptExcellent => {
                info!("✅ 分数 >= 85，判定为优秀。");
                return Ok(VoiceTaskResult {
                    succeeded: true,
                    abort_page: false,
                });
            }
            LadderStep::HardFail => {
                warn!("❌ 分数 < 60，判定为失败，将中止整个页面。");
                return Ok(VoiceTaskResult {
                    succeeded: false,
                    abort_page: true,
                });
            }
            LadderStep::Continue => {
                info!("分数 {} 在 60-84 之间，继续尝试以获得更高分数...", score);
            }
        }
    }

    match ladder.finish() {
        LadderVerdict::AcceptAcceptable { best_score } => {
            info!(
                "✅ 所有尝试结束后，最终分数 ({}) 在 80-84 之间，判定为可接受。",
                best_score
            );
            Ok(VoiceTaskResult {
                succeeded: true,
                abort_page: false,
            })
        }
        LadderVerdict::Abort { best_score } => {
            warn!(
                "❌ 所有尝试结束后，最高分数 ({}) 仍低于 80，将中止整个页面。",
                best_score
            );
            Ok(VoiceTaskResult {
                succeeded: false,
                abort_page: true,
            })
        }
    }
}

/// 一次录音尝试：合成 → 装载 → 录音 → 读分数
async fn attempt_once(
    page: &PageDriver,
    ai: &AiGateway,
    interceptor: &mut SpeechWsInterceptor<'_>,
    container: &str,
    idx: usize,
    ref_text: &str,
    profile: &SynthProfile,
) -> Result<u32> {
    // 1. 合成音频
    let audio = ai.synthesize_speech(ref_text, profile).await?;
    let duration = wav_duration_secs(&audio).map_err(|e| {
        AppError::Ai(AiError::SynthesisFailed {
            reason: format!("解析合成音频失败: {}", e),
        })
    })?;
    info!("生成的音频时长为: {:.2}秒", duration);

    // 2. 装载注入
    interceptor.arm(&audio).await?;

    // 3. 模拟录音
    if !page
        .click_within_nth(container, idx, selectors::RECORD_BUTTON)
        .await?
    {
        anyhow::bail!("未找到录音按钮");
    }
    if !page
        .wait_exists_within_nth(
            container,
            idx,
            selectors::RECORDING_STATE_ICON,
            RECORD_STATE_TIMEOUT_MS,
        )
        .await
    {
        anyhow::bail!("未能进入录音状态");
    }

    // 4. 等满可播放时长 + 缓冲再停止
    let wait = duration + STOP_BUFFER_SECS;
    info!("录音开始，等待 {:.2} 秒...", wait);
    sleep(Duration::from_secs_f64(wait)).await;
    page.click_within_nth(container, idx, selectors::RECORD_BUTTON)
        .await?;

    // 5. 读分数
    info!("等待评分结果出现...");
    page.wait_score_within_nth(container, idx, selectors::SCORE_LAYOUT, SCORE_TIMEOUT_MS)
        .await
}
