//! 策略公共部分
//!
//! 上下文提取、确认交互、提交流程、AI 响应解析。
//! 各题型策略只拼装自己的 Prompt 和填写动作。

use anyhow::Result;
use serde_json::Value as JsonValue;
use tracing::{info, warn};

use crate::ai::AiGateway;
use crate::cache::AnswerCache;
use crate::controller::run_context::{self, RunContext};
use crate::page::{selectors, PageDriver};
use crate::strategy::Variant;

// ========== 上下文提取 ==========

/// 提取文章或听力原文：优先转写页面媒体，其次读文章容器
pub async fn extract_article_text(page: &PageDriver, ai: &AiGateway) -> String {
    if let Ok(Some((url, kind))) = page.media_source().await {
        info!("发现 {} 文件，准备转写: {}", kind, url);
        match ai.transcribe(&url).await {
            Ok(text) if !text.is_empty() => return text,
            Ok(_) => warn!("媒体文件转写结果为空。"),
            Err(e) => warn!("媒体文件转写时发生错误: {}", e),
        }
        return String::new();
    }
    if let Ok(Some(text)) = page.text_of(selectors::ARTICLE_CONTENT).await {
        if !text.is_empty() {
            info!("发现文章容器，正在提取文本...");
            return text;
        }
    }
    info!("未在本页找到可用的音频、视频或文章。");
    String::new()
}

/// 同上，但限定在第 idx 个容器内查找媒体/文章
pub async fn extract_article_text_in_container(
    page: &PageDriver,
    ai: &AiGateway,
    container: &str,
    idx: usize,
) -> String {
    if let Ok(Some((url, kind))) = page.media_source_within_nth(container, idx).await {
        info!("发现 {} 文件，准备转写: {}", kind, url);
        match ai.transcribe(&url).await {
            Ok(text) => return text,
            Err(e) => {
                warn!("媒体文件转写时发生错误: {}", e);
                return String::new();
            }
        }
    }
    if let Ok(Some(text)) = page
        .text_within_nth(container, idx, selectors::ARTICLE_CONTENT)
        .await
    {
        return text;
    }
    String::new()
}

// ========== 交互确认 ==========

/// 预览 Prompt 并按运行模式征求确认；返回 false 表示用户取消
pub async fn preview_and_confirm(run: &RunContext, prompt: &str) -> Result<bool> {
    if run.preview_prompts() {
        info!("{}", "=".repeat(50));
        info!("即将发送给 AI 的完整 Prompt 如下：");
        info!("{}", prompt);
        info!("{}", "=".repeat(50));
    }
    if run.needs_confirm() {
        let ok = run_context::confirm("是否确认发送此 Prompt？[Y/n]: ").await?;
        if !ok {
            warn!("用户取消了 AI 调用，终止当前任务。");
        }
        return Ok(ok);
    }
    Ok(true)
}

/// 提交前确认；返回 false 表示用户取消
pub async fn confirm_before_submit(run: &RunContext, message: &str) -> Result<bool> {
    if run.needs_confirm() {
        let ok = run_context::confirm(message).await?;
        if !ok {
            warn!("用户取消提交。");
        }
        return Ok(ok);
    }
    Ok(true)
}

// ========== 提交流程 ==========

/// 点提交按钮、处理确认弹窗、检查频率限制
pub async fn submit_current_page(page: &PageDriver) -> Result<()> {
    page.click_action_button().await?;
    info!("答案已提交。正在处理最终确认弹窗...");
    page.handle_submission_confirmation().await?;
    page.check_rate_limit().await?;
    Ok(())
}

/// 新鲜 AI 作答提交后：进解析页收割平台标准答案并写入缓存
///
/// 存的是平台确认的正确答案而不是 AI 的猜测，命中即真值。
pub async fn write_back_from_review(
    page: &PageDriver,
    cache: &mut AnswerCache,
    location_key: &[String],
    variant: Variant,
) -> Result<()> {
    info!("准备从解析页面提取正确答案并写入缓存...");
    page.navigate_to_review().await?;
    let answers = page.harvest_review_answers().await?;
    if answers.is_empty() {
        warn!("未能从解析页面提取到任何答案，无法更新缓存。");
        return Ok(());
    }
    cache.save(location_key, variant, &answers)?;
    Ok(())
}

/// AI 调用失败的传播策略：
/// 响应格式问题转为"中止当前任务"信号（不重试），其余错误继续上抛。
pub fn ai_failure(e: anyhow::Error) -> Result<crate::strategy::SolveReport> {
    use crate::error::{AiError, AppError};
    use crate::strategy::{AbortKind, SolveReport};

    if let Some(AppError::Ai(
        AiError::MalformedResponse { .. } | AiError::EmptyContent { .. },
    )) = e.downcast_ref::<AppError>()
    {
        tracing::error!("未能从AI获取有效答案: {}", e);
        return Ok(SolveReport::abort(AbortKind::AiMalformed));
    }
    Err(e)
}

// ========== AI 响应解析 ==========

/// `{"questions": [{"answer": "B"}, ...]}` → 每题一个答案字符串
pub fn parse_questions_letter_answers(json: &JsonValue) -> Option<Vec<String>> {
    let questions = json.get("questions")?.as_array()?;
    let answers: Vec<String> = questions
        .iter()
        .filter_map(|q| q.get("answer"))
        .filter_map(|a| a.as_str())
        .map(|s| s.trim().to_uppercase())
        .collect();
    if answers.is_empty() {
        None
    } else {
        Some(answers)
    }
}

/// `{"questions": [{"answer": ["on", "beside"]}]}` → 第一题的答案列表
pub fn parse_first_question_list(json: &JsonValue) -> Option<Vec<String>> {
    let answers = json
        .get("questions")?
        .as_array()?
        .first()?
        .get("answer")?
        .as_array()?
        .iter()
        .map(|v| v.as_str().map(|s| s.trim().to_string()))
        .collect::<Option<Vec<_>>>()?;
    if answers.is_empty() {
        None
    } else {
        Some(answers)
    }
}

/// `{"answers": ["...", ...]}` → 答案列表
pub fn parse_answers_array(json: &JsonValue) -> Option<Vec<String>> {
    let answers = json
        .get("answers")?
        .as_array()?
        .iter()
        .map(|v| v.as_str().map(|s| s.to_string()))
        .collect::<Option<Vec<_>>>()?;
    if answers.is_empty() {
        None
    } else {
        Some(answers)
    }
}

/// `{"ordered_options": ["B", "A", "C"]}` → 排好序的选项标签
pub fn parse_ordered_options(json: &JsonValue) -> Option<Vec<String>> {
    let options = json
        .get("ordered_options")?
        .as_array()?
        .iter()
        .map(|v| v.as_str().map(|s| s.trim().to_uppercase()))
        .collect::<Option<Vec<_>>>()?;
    if options.is_empty() {
        None
    } else {
        Some(options)
    }
}

/// `{"answer": "..."}` → 单个答案字符串
pub fn parse_single_answer(json: &JsonValue) -> Option<String> {
    let answer = json.get("answer")?.as_str()?.trim().to_string();
    if answer.is_empty() {
        None
    } else {
        Some(answer)
    }
}

/// 选项字母转索引："A" → 0；非单个大写字母返回 None
pub fn letter_to_index(answer: &str) -> Option<usize> {
    let mut chars = answer.trim().chars();
    let first = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    if first.is_ascii_uppercase() {
        Some(first as usize - 'A' as usize)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_questions_letter_answers() {
        let json = json!({"questions": [{"answer": "b"}, {"answer": "D"}]});
        assert_eq!(
            parse_questions_letter_answers(&json),
            Some(vec!["B".to_string(), "D".to_string()])
        );
        assert_eq!(parse_questions_letter_answers(&json!({})), None);
        assert_eq!(
            parse_questions_letter_answers(&json!({"questions": []})),
            None
        );
    }

    #[test]
    fn test_parse_first_question_list() {
        let json = json!({"questions": [{"answer": ["on", "beside"]}]});
        assert_eq!(
            parse_first_question_list(&json),
            Some(vec!["on".to_string(), "beside".to_string()])
        );
        // 答案不是数组时解析失败
        assert_eq!(
            parse_first_question_list(&json!({"questions": [{"answer": "on"}]})),
            None
        );
    }

    #[test]
    fn test_parse_answers_array() {
        let json = json!({"answers": ["first", "second"]});
        assert_eq!(
            parse_answers_array(&json),
            Some(vec!["first".to_string(), "second".to_string()])
        );
        // 混入非字符串则整体不信任
        assert_eq!(parse_answers_array(&json!({"answers": ["a", 1]})), None);
    }

    #[test]
    fn test_parse_ordered_options() {
        let json = json!({"ordered_options": ["b", "A", "c"]});
        assert_eq!(
            parse_ordered_options(&json),
            Some(vec!["B".to_string(), "A".to_string(), "C".to_string()])
        );
    }

    #[test]
    fn test_parse_single_answer() {
        assert_eq!(
            parse_single_answer(&json!({"answer": " I agree. "})),
            Some("I agree.".to_string())
        );
        assert_eq!(parse_single_answer(&json!({"answer": ""})), None);
        assert_eq!(parse_single_answer(&json!({"other": "x"})), None);
    }

    #[test]
    fn test_letter_to_index() {
        assert_eq!(letter_to_index("A"), Some(0));
        assert_eq!(letter_to_index(" C "), Some(2));
        assert_eq!(letter_to_index("a"), None);
        assert_eq!(letter_to_index("AB"), None);
        assert_eq!(letter_to_index(""), None);
    }
}
