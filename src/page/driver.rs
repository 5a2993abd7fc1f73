//! 页面驱动 - 基础设施层
//!
//! 把渲染后的页面当作一个不透明的状态机来访问：
//! 读操作按钮文本、按选择器探测/点击/填写、提取面包屑和材料文本。
//! 所有操作都经由 JsExecutor 的 eval 能力完成，本模块不持有业务流程。

use anyhow::Result;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{AppError, PageError, VoiceError};
use crate::infrastructure::JsExecutor;
use crate::page::selectors;

/// 把 Rust 字符串安全地嵌入 JS 源码（带引号的 JSON 字面量）
fn js_str(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_default()
}

/// 页面驱动
///
/// 职责：
/// - 暴露"读页面状态 / 点 / 填"三类原语
/// - 不认识策略和缓存
/// - 选择器全部来自 selectors 模块
pub struct PageDriver {
    executor: JsExecutor,
}

impl PageDriver {
    pub fn new(executor: JsExecutor) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &JsExecutor {
        &self.executor
    }

    /// 页面静置等待（给 UI 一点反应时间）
    pub async fn settle(&self, ms: u64) {
        sleep(Duration::from_millis(ms)).await;
    }

    // ========== 导航 ==========

    pub async fn goto(&self, url: &str) -> Result<()> {
        self.executor.page().goto(url).await?;
        Ok(())
    }

    pub async fn current_url(&self) -> Result<String> {
        let url = self
            .executor
            .eval_string("window.location.href")
            .await?
            .unwrap_or_default();
        Ok(url)
    }

    // ========== 只读探测 ==========

    /// 选择器匹配的元素数量
    pub async fn count(&self, selector: &str) -> Result<usize> {
        let js = format!("document.querySelectorAll({}).length", js_str(selector));
        let value = self.executor.eval(js).await?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    /// 第一个匹配元素是否可见
    pub async fn is_visible(&self, selector: &str) -> Result<bool> {
        self.is_visible_nth(selector, 0).await
    }

    /// 第 idx 个匹配元素是否可见
    pub async fn is_visible_nth(&self, selector: &str, idx: usize) -> Result<bool> {
        let js = format!(
            r#"(() => {{
                const el = document.querySelectorAll({sel})[{idx}];
                if (!el) return false;
                const rect = el.getBoundingClientRect();
                return el.offsetParent !== null || rect.width > 0 || rect.height > 0;
            }})()"#,
            sel = js_str(selector),
            idx = idx
        );
        self.executor.eval_bool(js).await
    }

    /// 第一个匹配元素的文本
    pub async fn text_of(&self, selector: &str) -> Result<Option<String>> {
        self.text_of_nth(selector, 0).await
    }

    /// 第 idx 个匹配元素的文本
    pub async fn text_of_nth(&self, selector: &str, idx: usize) -> Result<Option<String>> {
        let js = format!(
            r#"(() => {{
                const el = document.querySelectorAll({sel})[{idx}];
                return el ? el.textContent.trim() : null;
            }})()"#,
            sel = js_str(selector),
            idx = idx
        );
        self.executor.eval_string(js).await
    }

    /// 所有匹配元素的文本（去掉空白项）
    pub async fn texts_of(&self, selector: &str) -> Result<Vec<String>> {
        let js = format!(
            r#"(() => {{
                const out = [];
                document.querySelectorAll({sel}).forEach(el => {{
                    const t = el.textContent.trim();
                    if (t) out.push(t);
                }});
                return out;
            }})()"#,
            sel = js_str(selector)
        );
        let texts: Vec<String> = self.executor.eval_as(js).await?;
        Ok(texts)
    }

    /// 第一个匹配元素的 innerHTML
    pub async fn inner_html_of(&self, selector: &str) -> Result<Option<String>> {
        let js = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                return el ? el.innerHTML : null;
            }})()"#,
            sel = js_str(selector)
        );
        self.executor.eval_string(js).await
    }

    /// 第一个匹配元素的 class 属性
    pub async fn class_of(&self, selector: &str) -> Result<Option<String>> {
        let js = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                return el ? (el.getAttribute('class') || '') : null;
            }})()"#,
            sel = js_str(selector)
        );
        self.executor.eval_string(js).await
    }

    // ========== 容器内探测（题目按容器序号隔离） ==========

    /// 第 idx 个容器内部的子选择器文本
    pub async fn text_within_nth(
        &self,
        container: &str,
        idx: usize,
        inner: &str,
    ) -> Result<Option<String>> {
        let js = format!(
            r#"(() => {{
                const box = document.querySelectorAll({container})[{idx}];
                if (!box) return null;
                const el = box.querySelector({inner});
                return el ? el.textContent.trim() : null;
            }})()"#,
            container = js_str(container),
            idx = idx,
            inner = js_str(inner)
        );
        self.executor.eval_string(js).await
    }

    /// 第 idx 个容器内部所有子选择器文本
    pub async fn texts_within_nth(
        &self,
        container: &str,
        idx: usize,
        inner: &str,
    ) -> Result<Vec<String>> {
        let js = format!(
            r#"(() => {{
                const box = document.querySelectorAll({container})[{idx}];
                if (!box) return [];
                const out = [];
                box.querySelectorAll({inner}).forEach(el => {{
                    const t = el.textContent.trim();
                    if (t) out.push(t);
                }});
                return out;
            }})()"#,
            container = js_str(container),
            idx = idx,
            inner = js_str(inner)
        );
        let texts: Vec<String> = self.executor.eval_as(js).await?;
        Ok(texts)
    }

    /// 每个容器内取一个子选择器的文本（容器顺序保持）
    ///
    /// 子元素缺失的容器贡献空字符串，保证与容器数量对齐。
    pub async fn texts_within_all(&self, container: &str, inner: &str) -> Result<Vec<String>> {
        let js = format!(
            r#"(() => {{
                const out = [];
                document.querySelectorAll({container}).forEach(box => {{
                    const el = box.querySelector({inner});
                    out.push(el ? el.textContent.trim() : '');
                }});
                return out;
            }})()"#,
            container = js_str(container),
            inner = js_str(inner)
        );
        let texts: Vec<String> = self.executor.eval_as(js).await?;
        Ok(texts)
    }

    /// 第 idx 个容器内部匹配子选择器的元素数量
    pub async fn count_within_nth(
        &self,
        container: &str,
        idx: usize,
        inner: &str,
    ) -> Result<usize> {
        let js = format!(
            r#"(() => {{
                const box = document.querySelectorAll({container})[{idx}];
                return box ? box.querySelectorAll({inner}).length : 0;
            }})()"#,
            container = js_str(container),
            idx = idx,
            inner = js_str(inner)
        );
        let value = self.executor.eval(js).await?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    /// 点击第 idx 个容器内第 inner_idx 个子元素
    pub async fn click_inner(
        &self,
        container: &str,
        idx: usize,
        inner: &str,
        inner_idx: usize,
    ) -> Result<bool> {
        let js = format!(
            r#"(() => {{
                const box = document.querySelectorAll({container})[{idx}];
                if (!box) return false;
                const el = box.querySelectorAll({inner})[{inner_idx}];
                if (!el) return false;
                el.click();
                return true;
            }})()"#,
            container = js_str(container),
            idx = idx,
            inner = js_str(inner),
            inner_idx = inner_idx
        );
        self.executor.eval_bool(js).await
    }

    /// 第 idx 个容器内部的子选择器是否存在
    pub async fn exists_within_nth(
        &self,
        container: &str,
        idx: usize,
        inner: &str,
    ) -> Result<bool> {
        let js = format!(
            r#"(() => {{
                const box = document.querySelectorAll({container})[{idx}];
                return !!(box && box.querySelector({inner}));
            }})()"#,
            container = js_str(container),
            idx = idx,
            inner = js_str(inner)
        );
        self.executor.eval_bool(js).await
    }

    // ========== 点击与填写 ==========

    /// 点击第一个匹配元素，返回是否点到
    pub async fn click(&self, selector: &str) -> Result<bool> {
        self.click_nth(selector, 0).await
    }

    /// 点击第 idx 个匹配元素
    pub async fn click_nth(&self, selector: &str, idx: usize) -> Result<bool> {
        let js = format!(
            r#"(() => {{
                const el = document.querySelectorAll({sel})[{idx}];
                if (!el) return false;
                el.click();
                return true;
            }})()"#,
            sel = js_str(selector),
            idx = idx
        );
        self.executor.eval_bool(js).await
    }

    /// 点击第 idx 个容器内部的子元素
    pub async fn click_within_nth(
        &self,
        container: &str,
        idx: usize,
        inner: &str,
    ) -> Result<bool> {
        let js = format!(
            r#"(() => {{
                const box = document.querySelectorAll({container})[{idx}];
                if (!box) return false;
                const el = box.querySelector({inner});
                if (!el) return false;
                el.click();
                return true;
            }})()"#,
            container = js_str(container),
            idx = idx,
            inner = js_str(inner)
        );
        self.executor.eval_bool(js).await
    }

    /// 向第 idx 个输入框写入值
    ///
    /// 使用原型上的 value setter 并派发 input/change 事件，
    /// 保证 React 受控组件能感知到变化。
    pub async fn fill_nth(&self, selector: &str, idx: usize, value: &str) -> Result<bool> {
        let js = format!(
            r#"(() => {{
                const el = document.querySelectorAll({sel})[{idx}];
                if (!el) return false;
                const proto = el.tagName === 'TEXTAREA'
                    ? window.HTMLTextAreaElement.prototype
                    : window.HTMLInputElement.prototype;
                const setter = Object.getOwnPropertyDescriptor(proto, 'value').set;
                setter.call(el, {value});
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return true;
            }})()"#,
            sel = js_str(selector),
            idx = idx,
            value = js_str(value)
        );
        self.executor.eval_bool(js).await
    }

    /// 点击文本完全匹配（或包含）给定内容的元素
    pub async fn click_by_text(&self, text: &str) -> Result<bool> {
        let js = format!(
            r#"(() => {{
                const want = {text};
                const nodes = document.querySelectorAll('button, a, span, div, label, p');
                for (const el of nodes) {{
                    if (el.childElementCount === 0 && el.textContent.trim() === want) {{
                        el.click();
                        return true;
                    }}
                }}
                for (const el of nodes) {{
                    if (el.textContent.trim() === want) {{
                        el.click();
                        return true;
                    }}
                }}
                return false;
            }})()"#,
            text = js_str(text)
        );
        self.executor.eval_bool(js).await
    }

    /// 按 placeholder 定位输入框并填入值
    pub async fn fill_by_placeholder(&self, placeholder: &str, value: &str) -> Result<bool> {
        let js = format!(
            r#"(() => {{
                const el = document.querySelector('input[placeholder=' + JSON.stringify({ph}) + ']');
                if (!el) return false;
                const setter = Object.getOwnPropertyDescriptor(window.HTMLInputElement.prototype, 'value').set;
                setter.call(el, {value});
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                return true;
            }})()"#,
            ph = js_str(placeholder),
            value = js_str(value)
        );
        self.executor.eval_bool(js).await
    }

    // ========== 操作按钮 / 弹窗 ==========

    /// 读主操作按钮的文本（不存在或不可见时返回 None）
    pub async fn affordance_text(&self) -> Result<Option<String>> {
        if !self.is_visible(selectors::ACTION_BUTTON).await? {
            return Ok(None);
        }
        self.text_of(selectors::ACTION_BUTTON).await
    }

    /// 点击主操作按钮
    pub async fn click_action_button(&self) -> Result<bool> {
        self.click(selectors::ACTION_BUTTON).await
    }

    /// 处理进入任务后常见的"我知道了"等弹窗
    pub async fn handle_common_popups(&self) -> Result<()> {
        if self.click_by_text(selectors::TASK_INFO_POPUP_TEXT).await? {
            info!("已关闭\"任务信息\"弹窗。");
        }
        if self.click(selectors::IKNOW_BUTTON).await? {
            info!("已关闭\"鼠标取词\"提示。");
        }
        Ok(())
    }

    /// 处理点击提交后的"最终确认"弹窗
    pub async fn handle_submission_confirmation(&self) -> Result<()> {
        self.settle(500).await;
        if self.click(selectors::SUBMIT_CONFIRM_BUTTON).await? {
            info!("已点击\"最终确认提交\"弹窗。");
        }
        Ok(())
    }

    /// 检查是否弹出了提交频率限制提示
    ///
    /// 命中时返回会话级致命错误，调用方应一路上抛。
    pub async fn check_rate_limit(&self) -> Result<()> {
        let js = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                const t = el.textContent;
                return t.includes('频繁') || t.includes('稍后再试');
            }})()"#,
            sel = js_str(selectors::MODAL_BODY)
        );
        if self.executor.eval_bool(js).await? {
            warn!("检测到提交频率限制弹窗");
            return Err(AppError::Business(crate::error::BusinessError::RateLimited).into());
        }
        Ok(())
    }

    // ========== 面包屑 / 材料 ==========

    /// 从页面提取完整路径信息（课程 → 单元 → 标签页 → 任务）
    pub async fn breadcrumb_parts(&self) -> Result<Vec<String>> {
        let js = format!(
            r#"(() => {{
                const paths = [];
                document.querySelectorAll({crumb}).forEach(e => paths.push(e.textContent.trim()));
                const activeTab = document.querySelector({tab});
                if (activeTab) paths.push(activeTab.textContent.trim());
                const activeTask = document.querySelector({task});
                if (activeTask) paths.push(activeTask.textContent.trim());
                return paths;
            }})()"#,
            crumb = js_str(selectors::BREADCRUMB_TEXT),
            tab = js_str(selectors::ACTIVE_TAB_VIEW),
            task = js_str(selectors::ACTIVE_TASK_TAB)
        );
        let parts: Vec<String> = self.executor.eval_as(js).await?;
        if parts.is_empty() {
            return Err(AppError::Page(PageError::BreadcrumbMissing).into());
        }
        Ok(parts)
    }

    /// 查找页面上的 <audio>/<video> 媒体源
    pub async fn media_source(&self) -> Result<Option<(String, String)>> {
        let js = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el || !el.src) return null;
                return {{ url: el.src, kind: el.tagName.toLowerCase() }};
            }})()"#,
            sel = js_str(selectors::MEDIA_SOURCE_ELEMENTS)
        );
        let value = self.executor.eval(js).await?;
        Ok(parse_media_source(&value))
    }

    /// 在第 idx 个容器内查找媒体源
    pub async fn media_source_within_nth(
        &self,
        container: &str,
        idx: usize,
    ) -> Result<Option<(String, String)>> {
        let js = format!(
            r#"(() => {{
                const box = document.querySelectorAll({container})[{idx}];
                if (!box) return null;
                const el = box.querySelector({sel});
                if (!el || !el.src) return null;
                return {{ url: el.src, kind: el.tagName.toLowerCase() }};
            }})()"#,
            container = js_str(container),
            idx = idx,
            sel = js_str(selectors::MEDIA_SOURCE_ELEMENTS)
        );
        let value = self.executor.eval(js).await?;
        Ok(parse_media_source(&value))
    }

    /// 提取题目说明文字
    pub async fn direction_text(&self) -> Result<String> {
        Ok(self
            .text_of(selectors::DIRECTION)
            .await?
            .unwrap_or_default())
    }

    /// 提取页面上的附加材料文本（文章、说明、对话稿等）
    ///
    /// 无匹配策略的子任务用它为后续子任务积累共享上下文。
    pub async fn collect_material_text(&self) -> Result<String> {
        let js = format!(
            r#"(() => {{
                const out = [];
                document.querySelectorAll({material}).forEach(el => {{
                    const t = el.textContent.trim();
                    if (t) out.push(t);
                }});
                const article = document.querySelector({article});
                if (article) {{
                    const t = article.textContent.trim();
                    if (t) out.push(t);
                }}
                return out.join('\n');
            }})()"#,
            material = js_str(selectors::MATERIAL_CONTAINER),
            article = js_str(selectors::ARTICLE_CONTENT)
        );
        Ok(self.executor.eval_string(js).await?.unwrap_or_default())
    }

    // ========== 等待 ==========

    /// 等待元素出现并可见，超时报错
    pub async fn wait_visible(&self, selector: &str, timeout_ms: u64) -> Result<()> {
        let js = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                const rect = el.getBoundingClientRect();
                return el.offsetParent !== null || rect.width > 0;
            }})()"#,
            sel = js_str(selector)
        );
        self.executor.wait_for(&js, selector, timeout_ms).await
    }

    /// 等待元素出现并可见，超时只返回 false
    pub async fn wait_visible_quiet(&self, selector: &str, timeout_ms: u64) -> bool {
        let js = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                const rect = el.getBoundingClientRect();
                return el.offsetParent !== null || rect.width > 0;
            }})()"#,
            sel = js_str(selector)
        );
        self.executor.wait_for_quiet(&js, timeout_ms).await
    }

    /// 等待第 idx 个容器内的分数元素出现纯数字并读取
    pub async fn wait_score_within_nth(
        &self,
        container: &str,
        idx: usize,
        score_selector: &str,
        timeout_ms: u64,
    ) -> Result<u32> {
        let js = format!(
            r#"(() => {{
                const box = document.querySelectorAll({container})[{idx}];
                if (!box) return false;
                const el = box.querySelector({score});
                return !!(el && el.textContent && /^\d+$/.test(el.textContent.trim()));
            }})()"#,
            container = js_str(container),
            idx = idx,
            score = js_str(score_selector)
        );
        if !self.executor.wait_for_quiet(&js, timeout_ms).await {
            return Err(AppError::Voice(VoiceError::ScoreUnavailable).into());
        }
        let text = self
            .text_within_nth(container, idx, score_selector)
            .await?
            .unwrap_or_default();
        text.trim()
            .parse::<u32>()
            .map_err(|_| AppError::Voice(VoiceError::ScoreUnavailable).into())
    }

    /// 轮询等待第 idx 个容器内出现某个子元素，超时返回 false
    pub async fn wait_exists_within_nth(
        &self,
        container: &str,
        idx: usize,
        inner: &str,
        timeout_ms: u64,
    ) -> bool {
        let js = format!(
            r#"(() => {{
                const box = document.querySelectorAll({container})[{idx}];
                return !!(box && box.querySelector({inner}));
            }})()"#,
            container = js_str(container),
            idx = idx,
            inner = js_str(inner)
        );
        self.executor.wait_for_quiet(&js, timeout_ms).await
    }

    // ========== 答题小结 / 答案解析 ==========

    /// 从"答题小结"页面进入"答案解析"页面
    pub async fn navigate_to_review(&self) -> Result<()> {
        info!("正在导航到答案解析页面...");
        if !self.click(selectors::SUMMARY_QUESTION_NUMBER).await? {
            return Err(AppError::Page(PageError::ReviewExtractionFailed {
                reason: "未找到答题小结入口".to_string(),
            })
            .into());
        }
        self.wait_visible(selectors::ANALYSIS_CORRECT_ANSWER_VALUE, 10_000)
            .await?;
        Ok(())
    }

    /// 从答案解析页面按顺序提取所有标准答案
    pub async fn harvest_review_answers(&self) -> Result<Vec<String>> {
        let answers = self
            .texts_of(selectors::ANALYSIS_CORRECT_ANSWER_VALUE)
            .await?;
        info!("已提取 {} 个标准答案。", answers.len());
        Ok(answers)
    }

    /// 提取答案解析页上第 idx 个子任务分组的标准答案
    ///
    /// 题中题的解析页按子任务分组展示，分组顺序与作答顺序一致。
    pub async fn harvest_review_answers_in_group(&self, idx: usize) -> Result<Vec<String>> {
        self.texts_within_nth(
            selectors::REVIEW_QUESTION_GROUP,
            idx,
            selectors::ANALYSIS_CORRECT_ANSWER_VALUE,
        )
        .await
    }
}

fn parse_media_source(value: &JsonValue) -> Option<(String, String)> {
    let obj = value.as_object()?;
    let url = obj.get("url")?.as_str()?.to_string();
    let kind = obj.get("kind")?.as_str()?.to_string();
    debug!("发现媒体源: {} ({})", url, kind);
    Some((url, kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_str_escapes() {
        assert_eq!(js_str("a'b\"c"), r#""a'b\"c""#);
        assert_eq!(js_str(".btn"), r#"".btn""#);
    }

    #[test]
    fn test_parse_media_source() {
        let value = serde_json::json!({ "url": "https://x/y.mp3", "kind": "audio" });
        assert_eq!(
            parse_media_source(&value),
            Some(("https://x/y.mp3".to_string(), "audio".to_string()))
        );
        assert_eq!(parse_media_source(&serde_json::Value::Null), None);
    }
}
