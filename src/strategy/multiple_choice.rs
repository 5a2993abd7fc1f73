//! 多选题策略
//!
//! 假设一个页面只有一个多选题；缓存记录是该题的全部正确选项字母。

use anyhow::Result;
use tracing::{info, warn};

use crate::ai::prompts;
use crate::page::{selectors, PageDriver};
use crate::strategy::{support, AbortKind, SolveCtx, SolveReport, Variant};

pub async fn matches(page: &PageDriver) -> Result<bool> {
    let has_wrap = page.is_visible(selectors::MULTIPLE_CHOICE_WRAP).await?;
    let has_options = page.is_visible(selectors::OPTION_WRAP).await?;
    Ok(has_wrap && has_options)
}

pub async fn solve(ctx: &mut SolveCtx<'_>) -> Result<SolveReport> {
    info!("{}", "=".repeat(20));
    info!("开始执行多选题策略...");

    let key = ctx.location_key().await?;
    let option_count = ctx
        .page
        .count_within_nth(selectors::MULTIPLE_CHOICE_WRAP, 0, selectors::OPTION_ITEM)
        .await?;
    if option_count == 0 {
        warn!("多选题没有可点击的选项，终止策略。");
        return Ok(SolveReport::abort(AbortKind::Internal));
    }

    let mut cache_write_needed = false;
    let mut answers: Vec<String> = Vec::new();

    // 缓存记录里的每个字母都必须落在当前选项范围内，否则整条不信任
    if ctx.run.force_ai {
        info!("FORCE_AI 已开启，强制忽略缓存，调用 AI。");
    } else if let Some(entry) = ctx.cache.get(&key) {
        if entry.variant == Variant::MultipleChoice {
            let all_valid = !entry.answers.is_empty()
                && entry.answers.iter().all(|a| {
                    support::letter_to_index(a).map(|i| i < option_count).unwrap_or(false)
                });
            if all_valid {
                info!("在缓存中找到此页面的答案。");
                answers = entry.answers;
            } else {
                warn!("缓存答案与当前选项数量 ({}) 不符，按未命中处理。", option_count);
            }
        }
    }

    if answers.is_empty() {
        info!("缓存未命中，将调用AI进行解答...");
        cache_write_needed = true;

        let direction = ctx.page.direction_text().await?;
        let article = support::extract_article_text(ctx.page, ctx.ai).await;
        let question = ctx
            .page
            .text_of(selectors::MULTIPLE_CHOICE_WRAP)
            .await?
            .unwrap_or_default();

        let prompt = prompts::multiple_choice(&direction, &article, &question);
        if !support::preview_and_confirm(ctx.run, &prompt).await? {
            return Ok(SolveReport::abort(AbortKind::UserCancelled));
        }

        let json = match ctx.ai.get_structured_answer(&prompt).await {
            Ok(json) => json,
            Err(e) => return support::ai_failure(e),
        };
        answers = match support::parse_first_question_list(&json) {
            Some(list) => list.iter().map(|s| s.to_uppercase()).collect(),
            None => {
                warn!("AI 回答缺少 questions/answer 列表: {}", json);
                return Ok(SolveReport::abort(AbortKind::AiMalformed));
            }
        };
        info!("AI回答: {:?}", answers);
    }

    // 预验证
    for answer in &answers {
        match support::letter_to_index(answer) {
            Some(idx) if idx < option_count => {}
            _ => {
                warn!("答案 '{}' 无效，已终止作答。", answer);
                return Ok(SolveReport::abort(AbortKind::Internal));
            }
        }
    }

    info!("预验证通过，开始填写答案...");
    for answer in &answers {
        if let Some(idx) = support::letter_to_index(answer) {
            info!("选择选项: {}", answer);
            ctx.page
                .click_inner(selectors::MULTIPLE_CHOICE_WRAP, 0, selectors::OPTION_ITEM, idx)
                .await?;
            ctx.page.settle(200).await;
        }
    }
    info!("答案填写完毕。");

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
            support::write_back_from_review(ctx.page, ctx.cache, &key, Variant::MultipleChoice)
                .await
        {
            warn!("写入缓存过程中发生错误: {}", e);
        }
    }
    Ok(SolveReport::success())
}
