//! 图片依赖题的防御性跳过策略
//!
//! 词云、图表分析这类严重依赖图片的题目无法可靠解答。
//! 优先级最高，在其他策略尝试之前拦截并中止当前任务。

use anyhow::Result;
use tracing::{info, warn};

use crate::page::{selectors, PageDriver};
use crate::strategy::{AbortKind, SolveCtx, SolveReport};

pub async fn matches(page: &PageDriver) -> Result<bool> {
    Ok(page.count(selectors::IMAGE_OPTION_LIST).await? > 0)
}

pub async fn solve(_ctx: &mut SolveCtx<'_>) -> Result<SolveReport> {
    info!("{}", "=".repeat(20));
    warn!("检测到图片依赖型题目（如词云），无法自动解答，将中止当前任务以跳过。");
    info!("{}", "=".repeat(20));
    Ok(SolveReport::abort(AbortKind::UnsupportedContent))
}
