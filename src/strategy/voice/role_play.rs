//! Role-Play 对话策略
//!
//! 多句台词共用一条长连接的评分通道，使用常驻注入模式：
//! 整页只安装一次钩子，每个回合装载/清空一次 payload，
//! 避免在对话中途反复拆建。
//!
//! 整轮对话按平均分评价，不达标整轮重来（最多两次）。

use anyhow::Result;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::page::{selectors, PageDriver};
use crate::scoring::wav::wav_duration_secs;
use crate::scoring::{InterceptMode, SpeechWsInterceptor, RETRY_PROFILES};
use crate::strategy::{AbortKind, SolveCtx, SolveReport};

/// 整轮对话的重试上限
const MAX_DIALOGUE_RETRIES: usize = 2;
/// 平均分达标线
const AVERAGE_THRESHOLD: f64 = 85.0;
/// 等待我方回合激活的上限
const TURN_ACTIVE_TIMEOUT_MS: u64 = 30_000;

/// 一条我方台词
#[derive(Debug, Deserialize)]
struct MyTurn {
    index: usize,
    text: String,
}

pub async fn matches(page: &PageDriver) -> Result<bool> {
    page.is_visible(selectors::ROLE_PLAY_ROOT).await
}

pub async fn solve(ctx: &mut SolveCtx<'_>) -> Result<SolveReport> {
    info!("开始执行 Role-Play 策略...");

    let mut interceptor = SpeechWsInterceptor::new(ctx.page, InterceptMode::Persistent);
    interceptor.install().await?;

    let mut retry = 0usize;
    let outcome = loop {
        let (turns, audio_cache) = prepare_turns(ctx.page, ctx.ai).await?;
        if turns.is_empty() {
            error!("未能识别出任何需要朗读的句子。");
            break SolveReport::abort(AbortKind::Internal);
        }

        let average =
            execute_and_evaluate_turns(ctx.page, &mut interceptor, &turns, &audio_cache).await?;

        if average >= AVERAGE_THRESHOLD {
            info!(
                "✓ 平均分 {:.2} 达到阈值 {}，任务成功。",
                average, AVERAGE_THRESHOLD
            );
            if !ctx.chained {
                ctx.page.click_action_button().await?;
                info!("已点击提交按钮。");
                ctx.page.handle_submission_confirmation().await?;
                ctx.page.check_rate_limit().await?;
            }
            break SolveReport::success();
        }

        retry += 1;
        if retry > MAX_DIALOGUE_RETRIES {
            error!("已达到最大重试次数，任务失败。");
            break SolveReport::abort(AbortKind::VoiceHardFail);
        }
        info!(
            "平均分 {:.2} 未达到阈值。准备进行第 {} 次重试...",
            average, retry
        );
    };

    interceptor.teardown().await?;
    Ok(outcome)
}

/// 准备阶段：选角色、识别我方回合、预生成音频
async fn prepare_turns(
    page: &PageDriver,
    ai: &crate::ai::AiGateway,
) -> Result<(Vec<MyTurn>, HashMap<String, Vec<u8>>)> {
    info!("进入准备阶段...");
    page.click(selectors::ROLE_LIST_ITEM).await?;
    info!("已选择第一个角色。");

    page.wait_visible(selectors::ROLE_PLAY_LIST_BOX, 5_000).await?;
    info!("对话列表已加载。");

    // 我方回合的判据：该行的分数栏没有被隐藏
    let js = format!(
        r#"(() => {{
            const out = [];
            document.querySelectorAll({item}).forEach((el, i) => {{
                const score = el.querySelector({score});
                if (score && !score.classList.contains('hide')) {{
                    const textEl = el.querySelector({text});
                    const text = textEl ? textEl.textContent.trim() : '';
                    if (text) out.push({{ index: i, text: text }});
                }}
            }});
            return out;
        }})()"#,
        item = serde_json::to_string(selectors::ROLE_TURN_ITEM).unwrap_or_default(),
        score = serde_json::to_string(selectors::ROLE_TURN_SCORE).unwrap_or_default(),
        text = serde_json::to_string(selectors::ROLE_TURN_TEXT).unwrap_or_default(),
    );
    let turns: Vec<MyTurn> = page.executor().eval_as(js).await?;
    info!("共找到 {} 个我方回合。", turns.len());
    for turn in &turns {
        info!("找到我方回合: {}", turn.text);
    }

    // 预生成音频，重复台词只合成一次
    info!("开始预生成音频...");
    let mut audio_cache: HashMap<String, Vec<u8>> = HashMap::new();
    for turn in &turns {
        if !audio_cache.contains_key(&turn.text) {
            let audio = ai.synthesize_speech(&turn.text, &RETRY_PROFILES[0]).await?;
            audio_cache.insert(turn.text.clone(), audio);
        }
    }
    info!("已为 {} 句唯一文本生成音频。", audio_cache.len());

    Ok((turns, audio_cache))
}

/// 执行阶段：逐回合装载音频并评分，返回平均分
async fn execute_and_evaluate_turns(
    page: &PageDriver,
    interceptor: &mut SpeechWsInterceptor<'_>,
    turns: &[MyTurn],
    audio_cache: &HashMap<String, Vec<u8>>,
) -> Result<f64> {
    info!("进入执行与评估阶段...");
    let mut turn_scores: Vec<u32> = Vec::new();

    page.click(selectors::ROLE_RECORD_SEAT).await?;
    info!("已点击总的\"开始\"按钮，对话流程开始。");

    for (seq, turn) in turns.iter().enumerate() {
        info!("--- 开始执行第 {}/{} 回合 ---", seq + 1, turns.len());

        let score = run_single_turn(page, interceptor, turn, audio_cache).await;

        // 回合结束无条件清空 payload，失败的回合不能污染下一回合
        if let Err(e) = interceptor.clear().await {
            warn!("清理注入状态失败（忽略）: {}", e);
        }

        match score {
            Ok(score) => {
                info!("第 {} 回合得分: {}", seq + 1, score);
                turn_scores.push(score);
            }
            Err(e) => {
                error!("执行第 {} 回合时发生错误: {}", seq + 1, e);
                turn_scores.push(0);
            }
        }
    }

    info!("我方回合已全部完成，正在等待对话结束和最终按钮的出现...");
    page.wait_visible_quiet(selectors::ACTION_BUTTON, TURN_ACTIVE_TIMEOUT_MS)
        .await;
    info!("检测到最终按钮，本轮流程结束。");

    if turn_scores.is_empty() {
        return Ok(0.0);
    }
    Ok(turn_scores.iter().sum::<u32>() as f64 / turn_scores.len() as f64)
}

async fn run_single_turn(
    page: &PageDriver,
    interceptor: &mut SpeechWsInterceptor<'_>,
    turn: &MyTurn,
    audio_cache: &HashMap<String, Vec<u8>>,
) -> Result<u32> {
    let audio = audio_cache
        .get(&turn.text)
        .ok_or_else(|| anyhow::anyhow!("台词 '{}' 没有预生成音频", turn.text))?;
    let duration = wav_duration_secs(audio).unwrap_or(0.0);

    // 等待本回合激活（出现暂停图标）
    if !page
        .wait_exists_within_nth(
            selectors::ROLE_TURN_ITEM,
            turn.index,
            selectors::ROLE_PAUSE_ICON,
            TURN_ACTIVE_TIMEOUT_MS,
        )
        .await
    {
        anyhow::bail!("等待我方回合激活超时");
    }
    info!("检测到我方回合\"{}\"已开始。", turn.text);

    interceptor.arm(audio).await?;

    let wait = duration + 0.5;
    info!("音频时长 {:.2}s，等待 {:.2}s 模拟录音...", duration, wait);
    sleep(Duration::from_secs_f64(wait)).await;

    if !page
        .click_within_nth(
            selectors::ROLE_TURN_ITEM,
            turn.index,
            selectors::ROLE_PAUSE_ICON_ACTIVE,
        )
        .await?
    {
        anyhow::bail!("未找到结束回合的按钮");
    }
    info!("已点击结束当前回合。");

    info!("正在等待分数更新...");
    page.wait_score_within_nth(
        selectors::ROLE_TURN_ITEM,
        turn.index,
        selectors::ROLE_TURN_SCORE,
        20_000,
    )
    .await
}
