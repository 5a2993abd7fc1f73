//! 简答题策略（一页多题）
//!
//! 自由文本不具备槽位稳定性，不走缓存，总是调用 AI。
//! 材料里出现 markdown 表格标记时切换到表格专用 Prompt。

use anyhow::Result;
use tracing::{info, warn};

use crate::ai::prompts;
use crate::page::{selectors, PageDriver};
use crate::strategy::{support, AbortKind, SolveCtx, SolveReport};

/// 表格题型的材料标记
const TABLE_MARKER: &str = "|:---:";

pub async fn matches(page: &PageDriver) -> Result<bool> {
    page.is_visible(selectors::SHORT_ANSWER_BOX).await
}

pub async fn solve(ctx: &mut SolveCtx<'_>) -> Result<SolveReport> {
    info!("{}", "=".repeat(20));
    info!("开始执行简答题策略...");

    info!("正在提取文章、说明等信息...");
    let article = support::extract_article_text(ctx.page, ctx.ai).await;
    let material = ctx.page.collect_material_text().await?;
    let direction = ctx.page.direction_text().await?;
    info!("信息提取完毕。");

    // 共享上下文和本地上下文结合
    let full_context = [
        ctx.session.shared_context.as_str(),
        article.as_str(),
        material.as_str(),
    ]
        .iter()
        .filter(|s| !s.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join("\n");

    let prompt = if material.contains(TABLE_MARKER) {
        info!("检测到表格题型，使用专用的表格Prompt。");
        prompts::table_short_answer(&direction, &full_context)
    } else {
        info!("使用标准简答题Prompt。");
        let sub_questions = ctx
            .page
            .texts_within_all(selectors::SHORT_ANSWER_BOX, selectors::SHORT_ANSWER_HEADER)
            .await?;
        info!("提取到 {} 个简答题。", sub_questions.len());
        let numbered = sub_questions
            .iter()
            .enumerate()
            .map(|(i, q)| format!("{}. {}", i + 1, q))
            .collect::<Vec<_>>()
            .join("\n");
        let article_section = if full_context.is_empty() {
            String::new()
        } else {
            format!("以下是文章或听力原文内容:\n{}\n\n", full_context)
        };
        prompts::short_answer(&direction, &article_section, &numbered)
    };

    if !support::preview_and_confirm(ctx.run, &prompt).await? {
        return Ok(SolveReport::abort(AbortKind::UserCancelled));
    }

    let json = match ctx.ai.get_structured_answer(&prompt).await {
        Ok(json) => json,
        Err(e) => return support::ai_failure(e),
    };
    let answers = match support::parse_answers_array(&json) {
        Some(a) => a,
        None => {
            warn!("未能从AI获取有效的答案列表: {}", json);
            return Ok(SolveReport::abort(AbortKind::AiMalformed));
        }
    };
    info!("AI已生成 {} 个回答。", answers.len());

    let slot_count = ctx.page.count(selectors::SHORT_ANSWER_INPUT).await?;
    if answers.len() != slot_count {
        warn!(
            "AI返回的答案数量 ({}) 与页面输入框数量 ({}) 不匹配，终止作答。",
            answers.len(),
            slot_count
        );
        return Ok(SolveReport::abort(AbortKind::Internal));
    }

    info!("开始填写答案...");
    for (i, answer) in answers.iter().enumerate() {
        info!(
            "第 {} 题，填入: '{}'",
            i + 1,
            crate::utils::logging::truncate_text(answer, 50)
        );
        ctx.page
            .fill_nth(selectors::SHORT_ANSWER_INPUT, i, answer)
            .await?;
        ctx.page.settle(200).await;
    }
    info!("答案填写完毕。");

    if ctx.chained {
        return Ok(SolveReport::success());
    }

    if !support::confirm_before_submit(ctx.run, "AI已填写答案。是否确认提交？[Y/n]: ").await? {
        return Ok(SolveReport::abort(AbortKind::UserCancelled));
    }
    support::submit_current_page(ctx.page).await?;
    Ok(SolveReport::success())
}
