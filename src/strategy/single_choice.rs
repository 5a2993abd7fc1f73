//! 单选题策略
//!
//! 页面上包含明确 A/B/C/D 选项的题目，一页可能有多题。
//! 缓存优先，AI 后备；新鲜作答提交后从解析页回填标准答案。

use anyhow::Result;
use tracing::{info, warn};

use crate::ai::prompts;
use crate::page::{selectors, PageDriver};
use crate::strategy::{support, AbortKind, SolveCtx, SolveReport, Variant};

pub async fn matches(page: &PageDriver) -> Result<bool> {
    // 题目区域和选项区域同时存在，且不是多选题
    let has_question = page.is_visible(selectors::CHOICE_QUESTION_WRAP).await?;
    let has_options = page.is_visible(selectors::OPTION_WRAP).await?;
    let is_multiple = page.count(selectors::MULTIPLE_CHOICE_WRAP).await? > 0;
    Ok(has_question && has_options && !is_multiple)
}

pub async fn solve(ctx: &mut SolveCtx<'_>) -> Result<SolveReport> {
    info!("{}", "=".repeat(20));
    info!("开始执行单选题策略...");

    let key = ctx.location_key().await?;
    let slot_count = ctx.page.count(selectors::OPTION_WRAP).await?;
    if slot_count == 0 {
        warn!("页面上没有可作答的选项区域，终止策略。");
        return Ok(SolveReport::abort(AbortKind::Internal));
    }

    let mut cache_write_needed = false;
    let mut answers: Vec<String> = Vec::new();

    // 1. 缓存优先（带槽位数量防错校验）
    if ctx.run.force_ai {
        info!("FORCE_AI 已开启，强制忽略缓存，调用 AI。");
    } else if let Some(entry) = ctx.cache.get(&key) {
        if entry.variant == Variant::SingleChoice {
            if entry.matches_slots(slot_count) {
                info!("在缓存中找到此页面的答案（{} 条），直接填写。", slot_count);
                answers = entry.answers;
            } else {
                warn!(
                    "缓存答案数量 ({}) 与页面题目数量 ({}) 不匹配，按未命中处理。",
                    entry.answers.len(),
                    slot_count
                );
            }
        }
    }

    // 2. AI 后备
    if answers.is_empty() {
        info!("缓存未命中，将调用AI进行解答...");
        cache_write_needed = true;

        let direction = ctx.page.direction_text().await?;
        let article = support::extract_article_text(ctx.page, ctx.ai).await;
        let combined = combine_context(&article, &ctx.session.shared_context);
        let questions = ctx
            .page
            .texts_of(selectors::CHOICE_QUESTION_WRAP)
            .await?
            .join("\n\n");

        let prompt = prompts::single_choice(&direction, &combined, &questions);
        if !support::preview_and_confirm(ctx.run, &prompt).await? {
            return Ok(SolveReport::abort(AbortKind::UserCancelled));
        }

        let json = match ctx.ai.get_structured_answer(&prompt).await {
            Ok(json) => json,
            Err(e) => return support::ai_failure(e),
        };
        answers = match support::parse_questions_letter_answers(&json) {
            Some(a) => a,
            None => {
                warn!("AI 回答缺少 questions/answer 字段: {}", json);
                return Ok(SolveReport::abort(AbortKind::AiMalformed));
            }
        };
        info!("AI回答: {:?}", answers);
    }

    // 3. 预验证：数量一致、字母落在各题选项范围内
    if answers.len() != slot_count {
        warn!(
            "收到的答案数量 ({}) 与页面题目数量 ({}) 不匹配，为避免错位已终止此题作答。",
            answers.len(),
            slot_count
        );
        return Ok(SolveReport::abort(AbortKind::Internal));
    }
    for (i, answer) in answers.iter().enumerate() {
        let option_count = ctx
            .page
            .count_within_nth(selectors::OPTION_WRAP, i, selectors::OPTION_ITEM)
            .await?;
        match support::letter_to_index(answer) {
            Some(idx) if idx < option_count => {}
            _ => {
                warn!(
                    "第 {} 题的答案 '{}' 无效（共 {} 个选项），已终止此题作答。",
                    i + 1,
                    answer,
                    option_count
                );
                return Ok(SolveReport::abort(AbortKind::Internal));
            }
        }
    }

    // 4. 填写
    info!("预验证通过，开始填写答案...");
    for (i, answer) in answers.iter().enumerate() {
        if let Some(idx) = support::letter_to_index(answer) {
            info!("第 {} 题，选择选项: {}", i + 1, answer);
            ctx.page
                .click_inner(selectors::OPTION_WRAP, i, selectors::OPTION_ITEM, idx)
                .await?;
            ctx.page.settle(200).await;
        }
    }
    info!("答案填写完毕。");

    // 5. 提交与缓存回填（串联模式下由控制器统一处理）
    if ctx.chained {
        return Ok(if cache_write_needed {
            SolveReport::success_cache_pending()
        } else {
            SolveReport::success()
        });
    }

    if !support::confirm_before_submit(ctx.run, "AI或缓存已选择答案。是否确认提交？[Y/n]: ").await?
    {
        return Ok(SolveReport::abort(AbortKind::UserCancelled));
    }
    support::submit_current_page(ctx.page).await?;

    if cache_write_needed {
        if let Err(e) =
            support::write_back_from_review(ctx.page, ctx.cache, &key, Variant::SingleChoice).await
        {
            warn!("写入缓存过程中发生错误: {}", e);
        }
    }
    Ok(SolveReport::success())
}

/// 文章与题中题共享上下文拼成 AI 可用的完整上下文
fn combine_context(article: &str, shared: &str) -> String {
    match (article.is_empty(), shared.is_empty()) {
        (true, true) => String::new(),
        (false, true) => article.to_string(),
        (true, false) => shared.to_string(),
        (false, false) => format!("{}\n{}", article, shared),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine_context() {
        assert_eq!(combine_context("", ""), "");
        assert_eq!(combine_context("a", ""), "a");
        assert_eq!(combine_context("", "b"), "b");
        assert_eq!(combine_context("a", "b"), "a\nb");
    }
}
