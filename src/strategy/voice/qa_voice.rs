//! 语音简答 / 口语陈述策略
//!
//! 两种形态：
//! - 纯语音简答：AI 根据题目说明、原文和共享上下文生成口语化回答
//! - 口语陈述：把页面给的关键词笔记扩展成完整句子
//!
//! 特殊情况：题目说明引用"前文读过的文章"时需要跳回第一个任务
//! 标签把文章取回来。一次会话只允许跳一次（状态锁在会话里），
//! 防止重复子任务造成无限往返。

use anyhow::Result;
use tracing::{error, info, warn};

use crate::ai::prompts;
use crate::page::{selectors, PageDriver};
use crate::scoring::{InterceptMode, SpeechWsInterceptor};
use crate::strategy::voice::run_score_ladder;
use crate::strategy::{support, AbortKind, SolveCtx, SolveReport};

/// 题目说明里触发"回前文取文章"的指纹
const REMOTE_ARTICLE_MARKER: &str = "about the passage you have just read";

pub async fn matches(page: &PageDriver) -> Result<bool> {
    if !page.is_visible(selectors::RECORD_BUTTON).await? {
        return Ok(false);
    }
    let personal = page.is_visible(selectors::ORAL_PERSONAL_WRAPPER).await?;
    let recitation = page.is_visible(selectors::ORAL_RECITATION_WRAPPER).await?;
    Ok(personal || recitation)
}

pub async fn solve(ctx: &mut SolveCtx<'_>) -> Result<SolveReport> {
    info!("{}", "=".repeat(20));
    info!("开始执行语音问答策略...");

    let is_recitation = ctx.page.is_visible(selectors::ORAL_RECITATION_WRAPPER).await?;

    let mut direction = String::new();
    let mut additional_material = String::new();
    let mut page_article = String::new();

    if is_recitation {
        info!("检测到『口语陈述题』，将根据主问题和笔记扩展成句子。");
    } else {
        info!("检测到『纯语音简答题』，将通过AI生成答案。");
        direction = ctx.page.direction_text().await?;
        additional_material = ctx.page.collect_material_text().await?;

        if direction.contains(REMOTE_ARTICLE_MARKER) && !ctx.session.remote_article_fetched {
            info!("检测到需要返回前文获取文章的特殊语音题型。");
            match fetch_remote_article(ctx.page).await {
                Ok(article) => {
                    if article.is_empty() {
                        warn!("已跳转到文章页，但未能提取到文章文本。");
                    }
                    page_article = article;
                    ctx.session.remote_article_fetched = true;
                    info!("远程文章获取状态锁已激活，本次\"题中题\"不再重复跳转。");
                }
                Err(e) => {
                    error!("在返回获取文章的过程中发生严重错误，将中止任务: {}", e);
                    return Ok(SolveReport::abort(AbortKind::Internal));
                }
            }
        }
    }

    let container = if is_recitation {
        selectors::ORAL_RECITATION_CONTAINER
    } else {
        selectors::ORAL_PERSONAL_WRAPPER
    };
    let container_count = ctx.page.count(container).await?;
    info!("发现 {} 个语音题容器。", container_count);

    let mut interceptor = SpeechWsInterceptor::new(ctx.page, InterceptMode::OneShot);
    let mut abort = None;

    for i in 0..container_count {
        info!("\n--- 开始处理第 {} 个语音题 ---", i + 1);

        // 1. 组装 Prompt
        let prompt = if is_recitation {
            let main_question = ctx
                .page
                .text_within_nth(container, i, selectors::ORAL_RECITATION_MAIN_QUESTION)
                .await?
                .unwrap_or_default();
            let keywords = ctx
                .page
                .texts_within_nth(container, i, selectors::ORAL_RECITATION_KEYWORDS)
                .await?
                .join("\n");
            if keywords.is_empty() {
                error!("在当前容器中找不到关键词笔记，中止。");
                abort = Some(AbortKind::Internal);
                break;
            }
            info!("提取到主问题: '{}'", main_question);
            info!("提取到关键词: '{}'", keywords);
            prompts::oral_recitation(&main_question, &keywords)
        } else {
            let question_text = ctx
                .page
                .text_within_nth(container, i, selectors::ORAL_PERSONAL_QUESTION)
                .await?
                .unwrap_or_default();
            if question_text.is_empty() {
                error!("在当前容器中找不到问题文本，中止。");
                abort = Some(AbortKind::Internal);
                break;
            }
            info!("提取到问题文本: '{}'", question_text);

            let media_text =
                support::extract_article_text_in_container(ctx.page, ctx.ai, container, i).await;
            let combined = [
                page_article.as_str(),
                media_text.as_str(),
                ctx.session.shared_context.as_str(),
            ]
            .iter()
            .filter(|s| !s.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join("\n");
            prompts::qa_voice(&direction, &combined, &additional_material, &question_text)
        };

        // 2. 确认并调 AI
        if !support::preview_and_confirm(ctx.run, &prompt).await? {
            abort = Some(AbortKind::UserCancelled);
            break;
        }
        let json = match ctx.ai.get_structured_answer(&prompt).await {
            Ok(json) => json,
            Err(e) => {
                interceptor.teardown().await?;
                return support::ai_failure(e);
            }
        };
        let answer_text = match support::parse_single_answer(&json) {
            Some(a) => a,
            None => {
                error!("AI未能生成有效答案或返回格式不正确，中止当前页面。");
                abort = Some(AbortKind::AiMalformed);
                break;
            }
        };
        info!("AI生成的答案: '{}'", answer_text);

        // 3. 注入评分
        let result =
            run_score_ladder(ctx.page, ctx.ai, &mut interceptor, container, i, &answer_text)
                .await?;
        if result.abort_page {
            abort = Some(AbortKind::VoiceHardFail);
            break;
        }
    }

    interceptor.teardown().await?;

    info!("\n所有语音简答题处理完毕。");
    if let Some(kind) = abort {
        warn!("由于发生错误或分数不达标，已中止最终提交。");
        return Ok(SolveReport::abort(kind));
    }

    if !ctx.chained {
        if !support::confirm_before_submit(
            ctx.run,
            "所有语音简答题均已完成且分数达标。是否确认提交？[Y/n]: ",
        )
        .await?
        {
            return Ok(SolveReport::abort(AbortKind::UserCancelled));
        }
        support::submit_current_page(ctx.page).await?;
    }
    Ok(SolveReport::success())
}

/// 跳到第一个任务标签提取文章，再回到当前标签
async fn fetch_remote_article(page: &PageDriver) -> Result<String> {
    let original_tab = page
        .text_of(selectors::ACTIVE_TASK_TAB)
        .await?
        .ok_or_else(|| anyhow::anyhow!("无法找到当前激活的任务标签"))?;

    info!("正在从 '{}' 导航到第一个任务页获取文章...", original_tab);
    if !page.click(selectors::TASK_TAB_ITEM).await? {
        anyhow::bail!("无法找到第一个任务标签");
    }
    page.handle_common_popups().await?;
    page.wait_visible(selectors::LAYOUT_MATERIAL_CONTAINER, 15_000)
        .await?;

    info!("正在提取文章内容...");
    let article = page.collect_material_text().await?;

    info!("文章提取完毕，正在返回 '{}'...", original_tab);
    if !page.click_by_text(&original_tab).await? {
        anyhow::bail!("无法返回原任务标签 '{}'", original_tab);
    }
    page.wait_visible(selectors::ORAL_PERSONAL_WRAPPER, 15_000)
        .await?;
    info!("✓ 已成功返回问题页面。");

    Ok(article)
}
