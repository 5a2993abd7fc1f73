//! 拖拽排序题策略
//!
//! 不模拟拖拽手势：直接找到排序组件的 React 实例，更新其 state
//! 并派发值变更事件。缓存记录是排好序的选项字母。

use anyhow::Result;
use tracing::{info, warn};

use crate::ai::prompts;
use crate::page::{selectors, PageDriver};
use crate::strategy::{support, AbortKind, SolveCtx, SolveReport, Variant};

pub async fn matches(page: &PageDriver) -> Result<bool> {
    page.is_visible(selectors::SORTABLE_WRAPPER).await
}

pub async fn solve(ctx: &mut SolveCtx<'_>) -> Result<SolveReport> {
    info!("{}", "=".repeat(20));
    info!("开始执行拖拽题策略 (JS函数调用模式)...");

    let key = ctx.location_key().await?;
    let slot_count = ctx.page.count(selectors::SEQUENCE_ITEM_TEXT).await?;
    if slot_count == 0 {
        warn!("未找到待排序选项，终止策略。");
        return Ok(SolveReport::abort(AbortKind::Internal));
    }

    let mut cache_write_needed = false;
    let mut target_order: Vec<String> = Vec::new();

    if ctx.run.force_ai {
        info!("FORCE_AI 已开启，强制忽略缓存，调用 AI。");
    } else if let Some(entry) = ctx.cache.get(&key) {
        if entry.variant == Variant::DragOrder {
            if entry.matches_slots(slot_count) {
                info!("在缓存中找到此页面的答案。");
                target_order = entry.answers;
            } else {
                warn!(
                    "缓存顺序长度 ({}) 与选项数量 ({}) 不匹配，按未命中处理。",
                    entry.answers.len(),
                    slot_count
                );
            }
        }
    }

    if target_order.is_empty() {
        info!("缓存未命中，将调用AI进行解答...");
        cache_write_needed = true;

        let transcript = match support::extract_article_text(ctx.page, ctx.ai).await {
            t if t.is_empty() => "无".to_string(),
            t => t,
        };
        let options = ctx.page.texts_of(selectors::SEQUENCE_ITEM_TEXT).await?;
        info!("提取到 {} 个待排序选项。", options.len());
        let options_text = options
            .iter()
            .map(|o| format!("- {}", o))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = prompts::drag_order(&transcript, &options_text);
        if !support::preview_and_confirm(ctx.run, &prompt).await? {
            return Ok(SolveReport::abort(AbortKind::UserCancelled));
        }

        let json = match ctx.ai.get_structured_answer(&prompt).await {
            Ok(json) => json,
            Err(e) => return support::ai_failure(e),
        };
        target_order = match support::parse_ordered_options(&json) {
            Some(o) => o,
            None => {
                warn!("AI 回答缺少 ordered_options 字段: {}", json);
                return Ok(SolveReport::abort(AbortKind::AiMalformed));
            }
        };
        info!("AI返回的正确顺序: {}", target_order.join(", "));
    }

    if target_order.len() != slot_count {
        warn!(
            "排序长度 ({}) 与选项数量 ({}) 不匹配，终止作答。",
            target_order.len(),
            slot_count
        );
        return Ok(SolveReport::abort(AbortKind::Internal));
    }

    // 通过 React 实例更新顺序
    info!("正在页面中执行JS以更新题目顺序...");
    ctx.page
        .executor()
        .eval(reorder_script(&target_order))
        .await?;
    info!("JS代码执行完毕，UI应已更新。");

    if ctx.chained {
        return Ok(if cache_write_needed {
            SolveReport::success_cache_pending()
        } else {
            SolveReport::success()
        });
    }

    if !support::confirm_before_submit(ctx.run, "AI或缓存已更新答案顺序。是否确认提交？[Y/n]: ")
        .await?
    {
        return Ok(SolveReport::abort(AbortKind::UserCancelled));
    }
    support::submit_current_page(ctx.page).await?;

    if cache_write_needed {
        if let Err(e) =
            support::write_back_from_review(ctx.page, ctx.cache, &key, Variant::DragOrder).await
        {
            warn!("写入缓存过程中发生错误: {}", e);
        }
    }
    Ok(SolveReport::success())
}

/// 生成更新排序组件状态的 JS
///
/// 沿 React fiber 向上找持有 options state 的组件实例，
/// 按目标顺序重排后 setState 并派发值变更事件。
fn reorder_script(target_order: &[String]) -> String {
    let order_js = serde_json::to_string(target_order).unwrap_or_default();
    format!(
        r#"(function() {{
            const TARGET_ORDER = {order_js};
            const dom = document.querySelector('#sortableListWrapper');
            if (!dom) {{ return false; }}
            const key = Object.keys(dom).find(k => k.startsWith('__reactFiber$'));
            if (!key) {{ return false; }}
            let fiber = dom[key];
            let targetInstance = null;
            let depth = 0;
            while (fiber && depth < 15) {{
                const instance = fiber.stateNode;
                if (instance && instance.state && Array.isArray(instance.state.options)) {{
                    targetInstance = instance;
                    break;
                }}
                fiber = fiber.return;
                depth++;
            }}
            if (!targetInstance) {{ return false; }}
            const currentOptions = targetInstance.state.options;
            const newOptions = [];
            TARGET_ORDER.forEach(val => {{
                const match = currentOptions.find(opt => opt.value === val);
                if (match) newOptions.push(match);
            }});
            const payloadDatas = TARGET_ORDER.map(val => ({{ value: [val] }}));
            targetInstance.setState({{ options: newOptions }}, () => {{
                if (targetInstance.props.dispatch) {{
                    const mockEvent = {{
                        type: 'componentValuesChangeEvent',
                        datas: payloadDatas,
                        toType: function() {{ return 'ComponentEvent'; }}
                    }};
                    targetInstance.props.dispatch(mockEvent);
                }}
            }});
            return true;
        }})()"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reorder_script_embeds_order() {
        let script = reorder_script(&["B".to_string(), "A".to_string()]);
        assert!(script.contains(r#"["B","A"]"#));
        assert!(script.contains("sortableListWrapper"));
    }
}
