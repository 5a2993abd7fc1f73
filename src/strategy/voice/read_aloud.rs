//! 文字朗读策略
//!
//! 页面给出若干句子，逐句合成朗读并注入评分。
//! 尝试之间相互独立，使用一次性注入模式。

use anyhow::Result;
use tracing::{error, info, warn};

use crate::page::{selectors, PageDriver};
use crate::scoring::{InterceptMode, SpeechWsInterceptor};
use crate::strategy::voice::run_score_ladder;
use crate::strategy::{support, AbortKind, SolveCtx, SolveReport};

pub async fn matches(page: &PageDriver) -> Result<bool> {
    // 录音按钮是所有语音题的共同点；朗读句容器进一步确认是"文字朗读"
    if !page.is_visible(selectors::RECORD_BUTTON).await? {
        return Ok(false);
    }
    Ok(page.count(selectors::ORAL_SENTENCE_CONTAINER).await? > 0)
}

pub async fn solve(ctx: &mut SolveCtx<'_>) -> Result<SolveReport> {
    info!("{}", "=".repeat(20));
    info!("开始执行文字朗读策略...");

    let container_count = ctx.page.count(selectors::ORAL_SENTENCE_CONTAINER).await?;
    info!("发现 {} 个朗读题容器。", container_count);

    let mut interceptor = SpeechWsInterceptor::new(ctx.page, InterceptMode::OneShot);
    let mut abort_page = false;

    for i in 0..container_count {
        info!("\n--- 开始处理第 {} 个朗读题 ---", i + 1);

        let ref_text = ctx
            .page
            .text_within_nth(
                selectors::ORAL_SENTENCE_CONTAINER,
                i,
                selectors::SENTENCE_HTML_CONTAINER,
            )
            .await?
            .unwrap_or_default();
        if ref_text.is_empty() {
            error!("在当前容器中找不到朗读文本元素，中止本页面所有语音题。");
            abort_page = true;
            break;
        }
        info!("提取到待朗读文本: '{}'", ref_text);

        let result = run_score_ladder(
            ctx.page,
            ctx.ai,
            &mut interceptor,
            selectors::ORAL_SENTENCE_CONTAINER,
            i,
            &ref_text,
        )
        .await?;
        if result.abort_page {
            abort_page = true;
            break;
        }
    }

    // 离开前兜底拆除钩子
    interceptor.teardown().await?;

    info!("\n所有语音题处理完毕。");
    if abort_page {
        warn!("由于发生错误或分数不达标，已中止最终提交。");
        return Ok(SolveReport::abort(AbortKind::VoiceHardFail));
    }

    if !ctx.chained {
        if !support::confirm_before_submit(
            ctx.run,
            "所有语音题均已完成且分数达标。是否确认提交？[Y/n]: ",
        )
        .await?
        {
            return Ok(SolveReport::abort(AbortKind::UserCancelled));
        }
        support::submit_current_page(ctx.page).await?;
    }
    Ok(SolveReport::success())
}
