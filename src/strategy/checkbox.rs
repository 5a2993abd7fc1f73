//! "Exit Ticket" 自检打钩策略
//!
//! 循环点击第一个未打钩的项直到全部勾上，不需要 AI。

use anyhow::Result;
use tracing::{info, warn};

use crate::page::{selectors, PageDriver};
use crate::strategy::{SolveCtx, SolveReport};

/// 防止页面不响应点击时死循环
const MAX_CLICKS: usize = 50;

pub async fn matches(page: &PageDriver) -> Result<bool> {
    page.is_visible(selectors::TICKET_VIEW).await
}

pub async fn solve(ctx: &mut SolveCtx<'_>) -> Result<SolveReport> {
    info!("{}", "=".repeat(20));
    info!("开始执行自检打钩策略...");

    let initial_count = ctx.page.count(selectors::UNCHECKED_BOX).await?;
    if initial_count == 0 {
        info!("没有检测到未打钩的项，可能已经全部完成。");
        return Ok(SolveReport::success());
    }

    info!("发现 {} 个未打钩的项，正在逐一点击...", initial_count);
    let mut clicked = 0usize;

    // 元素列表随点击动态变化，每次都重新定位第一个未勾选的框
    while ctx.page.count(selectors::UNCHECKED_BOX).await? > 0 {
        if clicked >= MAX_CLICKS {
            warn!("点击 {} 次后仍有未打钩项，停止尝试。", clicked);
            break;
        }
        ctx.page.click(selectors::UNCHECKED_BOX).await?;
        clicked += 1;
        info!("已点击第 {} 个未打钩项。", clicked);
        ctx.page.settle(500).await;
    }

    info!("✅ 共点击 {} 个未打钩项。", clicked);
    Ok(SolveReport::success())
}
