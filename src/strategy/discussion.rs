//! 讨论区策略
//!
//! 提取主标题和子问题，AI 逐条作答后拼成一条编号评论发布。
//! 发布动作有平台频率限制，命中时上抛会话级致命错误。

use anyhow::Result;
use tracing::{info, warn};

use crate::ai::prompts;
use crate::page::{selectors, PageDriver};
use crate::strategy::{support, AbortKind, SolveCtx, SolveReport};

pub async fn matches(page: &PageDriver) -> Result<bool> {
    page.is_visible(selectors::DISCUSSION_REPLY).await
}

pub async fn solve(ctx: &mut SolveCtx<'_>) -> Result<SolveReport> {
    info!("{}", "=".repeat(20));
    info!("开始执行讨论题策略...");

    let main_title = ctx
        .page
        .text_of(selectors::DISCUSSION_TITLE)
        .await?
        .unwrap_or_default();
    let sub_questions = ctx
        .page
        .texts_of(selectors::DISCUSSION_SUB_QUESTIONS)
        .await?;
    if sub_questions.is_empty() {
        warn!("未提取到任何子问题，终止策略。");
        return Ok(SolveReport::abort(AbortKind::Internal));
    }
    let sub_questions_text = sub_questions
        .iter()
        .map(|q| format!("- {}", q))
        .collect::<Vec<_>>()
        .join("\n");

    info!("提取到主标题: {}", main_title);
    info!(
        "提取到 {} 个子问题:\n{}",
        sub_questions.len(),
        sub_questions_text
    );

    let prompt = prompts::discussion(&main_title, &sub_questions_text);
    if !support::preview_and_confirm(ctx.run, &prompt).await? {
        return Ok(SolveReport::abort(AbortKind::UserCancelled));
    }

    info!("正在请求AI生成评论...");
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
    if answers.len() != sub_questions.len() {
        warn!(
            "AI返回了 {} 个答案，但提取了 {} 个问题，终止执行。",
            answers.len(),
            sub_questions.len()
        );
        return Ok(SolveReport::abort(AbortKind::Internal));
    }

    let final_comment = answers
        .iter()
        .enumerate()
        .map(|(i, a)| format!("{}. {}", i + 1, a))
        .collect::<Vec<_>>()
        .join("\n");
    info!("AI已生成结构化回答，将格式化为:\n{}", final_comment);

    ctx.page
        .fill_nth(selectors::DISCUSSION_TEXTAREA, 0, &final_comment)
        .await?;
    info!("✓ 评论已填入文本框。");

    // 自包含任务：即使没有常规提交按钮也要发布
    if !ctx.chained {
        if !ctx
            .page
            .click_by_text(selectors::DISCUSSION_PUBLISH_TEXT)
            .await?
        {
            warn!("未找到发布按钮，终止策略。");
            return Ok(SolveReport::abort(AbortKind::Internal));
        }
        ctx.page.settle(1000).await;
        // 发布是频率限制的高发点
        ctx.page.check_rate_limit().await?;
        info!("✓ 评论已发布。");
    }

    Ok(SolveReport::success())
}
