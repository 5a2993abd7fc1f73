//! 填空题策略
//!
//! 从上下文（文章、听力）中提取信息填入文本框。题目文本里的
//! 填空组件（fe-scoop span）替换成 `___` 占位符后交给 AI。

use anyhow::Result;
use regex::Regex;
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::ai::prompts;
use crate::page::{selectors, PageDriver};
use crate::strategy::{support, AbortKind, SolveCtx, SolveReport, Variant};
use crate::utils::text::{strip_html_tags, unescape_html};

fn scoop_span() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?s)<span class="fe-scoop".*?</span>"#).unwrap())
}

pub async fn matches(page: &PageDriver) -> Result<bool> {
    page.is_visible(selectors::FILL_BLANK_REPLY).await
}

/// 题目 HTML → 带 `___` 占位的纯文本
fn blank_out_question(html: &str) -> String {
    let unescaped = unescape_html(html);
    let with_blanks = scoop_span().replace_all(&unescaped, " ___ ");
    strip_html_tags(&with_blanks)
}

pub async fn solve(ctx: &mut SolveCtx<'_>) -> Result<SolveReport> {
    info!("{}", "=".repeat(20));
    info!("开始执行填空题策略...");

    let key = ctx.location_key().await?;
    let slot_count = ctx.page.count(selectors::FILL_BLANK_INPUTS).await?;
    if slot_count == 0 {
        warn!("页面上没有可填写的输入框，终止策略。");
        return Ok(SolveReport::abort(AbortKind::Internal));
    }

    let mut cache_write_needed = false;
    let mut answers: Vec<String> = Vec::new();

    if ctx.run.force_ai {
        info!("FORCE_AI 已开启，强制忽略缓存，调用 AI。");
    } else if let Some(entry) = ctx.cache.get(&key) {
        if entry.variant == Variant::FillInTheBlank {
            if entry.matches_slots(slot_count) {
                info!("在缓存中找到此页面的答案。");
                answers = entry.answers;
            } else {
                warn!(
                    "缓存答案数量 ({}) 与页面输入框数量 ({}) 不匹配，按未命中处理。",
                    entry.answers.len(),
                    slot_count
                );
            }
        }
    }

    if answers.is_empty() {
        info!("缓存未命中，将调用AI进行解答...");
        cache_write_needed = true;

        let direction = ctx.page.direction_text().await?;
        let article = support::extract_article_text(ctx.page, ctx.ai).await;
        let question_html = ctx
            .page
            .inner_html_of(selectors::FILL_BLANK_QUESTION_AREA)
            .await?
            .unwrap_or_default();
        let question_text = blank_out_question(&question_html);

        let prompt = prompts::fill_in_the_blank(&direction, &article, &question_text);
        if !support::preview_and_confirm(ctx.run, &prompt).await? {
            return Ok(SolveReport::abort(AbortKind::UserCancelled));
        }

        let json = match ctx.ai.get_structured_answer(&prompt).await {
            Ok(json) => json,
            Err(e) => return support::ai_failure(e),
        };
        answers = match support::parse_first_question_list(&json) {
            Some(a) => a,
            None => {
                warn!("AI 回答缺少 questions/answer 列表: {}", json);
                return Ok(SolveReport::abort(AbortKind::AiMalformed));
            }
        };
        info!("AI回答: {:?}", answers);
    }

    if answers.len() != slot_count {
        warn!(
            "答案数量 ({}) 与页面输入框数量 ({}) 不匹配，终止作答。",
            answers.len(),
            slot_count
        );
        return Ok(SolveReport::abort(AbortKind::Internal));
    }

    info!("预验证通过，开始填写答案...");
    for (i, answer) in answers.iter().enumerate() {
        info!("第 {} 个空，填入: '{}'", i + 1, answer);
        ctx.page
            .fill_nth(selectors::FILL_BLANK_INPUTS, i, answer)
            .await?;
        ctx.page.settle(200).await;
    }
    info!("答案填写完毕。");

    if ctx.chained {
        return Ok(if cache_write_needed {
            SolveReport::success_cache_pending()
        } else {
            SolveReport::success()
        });
    }

    if !support::confirm_before_submit(ctx.run, "AI或缓存已填写答案。是否确认提交？[Y/n]: ").await?
    {
        return Ok(SolveReport::abort(AbortKind::UserCancelled));
    }
    support::submit_current_page(ctx.page).await?;

    if cache_write_needed {
        if let Err(e) =
            support::write_back_from_review(ctx.page, ctx.cache, &key, Variant::FillInTheBlank)
                .await
        {
            warn!("写入缓存过程中发生错误: {}", e);
        }
    }
    Ok(SolveReport::success())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_out_question() {
        let html = r#"<p>The cat sat <span class="fe-scoop"><input value=""/></span> the mat.</p>"#;
        assert_eq!(blank_out_question(html), "The cat sat ___ the mat.");
    }

    #[test]
    fn test_blank_out_question_multiple_and_entities() {
        let html = concat!(
            r#"<p>A &amp; B: first <span class="fe-scoop" data-i="0">x</span>, "#,
            r#"second <span class="fe-scoop" data-i="1">y</span>.</p>"#
        );
        assert_eq!(
            blank_out_question(html),
            "A & B: first ___ , second ___ ."
        );
    }
}
