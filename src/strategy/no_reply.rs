//! 无作答页面策略（兜底）
//!
//! 纯信息展示页通常带一段必须播完的媒体。不真的播放：
//! 通过 Webpack 钩子拿到页面内部的提交管理器，直接按当前
//! 页面状态提交完成记录。

use anyhow::Result;
use tracing::{error, info, warn};

use crate::page::{selectors, PageDriver};
use crate::strategy::{AbortKind, SolveCtx, SolveReport};

pub async fn matches(page: &PageDriver) -> Result<bool> {
    // 主容器必须没有作答区域
    let class_attr = match page.class_of(selectors::LAYOUT_BODY_CONTAINER).await? {
        Some(c) => c,
        None => return Ok(false),
    };
    if class_attr.contains(selectors::HAS_REPLY_CLASS) {
        return Ok(false);
    }
    // 必须有材料和可播放的媒体，排除空页/错误页
    if page.count(selectors::MATERIAL_CONTAINER).await? == 0 {
        return Ok(false);
    }
    Ok(page.media_source().await?.is_some())
}

pub async fn solve(ctx: &mut SolveCtx<'_>) -> Result<SolveReport> {
    info!("{}", "=".repeat(20));
    info!("开始执行\"无作答页面\"策略...");

    let result = ctx.page.executor().eval(SUBMISSION_SCRIPT).await?;
    let success = result
        .get("success")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let message = result
        .get("message")
        .and_then(|v| v.as_str())
        .unwrap_or("未知JS执行错误");

    if success {
        info!("✓ 成功执行了JS提交脚本: {}", message);
        Ok(SolveReport::success())
    } else {
        error!("执行JS提交脚本失败: {}", message);
        warn!("无作答页面未能自动完成。");
        Ok(SolveReport::abort(AbortKind::Internal))
    }
}

/// 基于内部路由的精准提交脚本
///
/// 1. 通过 webpackChunk 注入拿到模块加载器
/// 2. 取核心模块里的答案管理器和页面管理器
/// 3. 询问页面管理器当前 Group，按其任务 ID 列表逐个提交
const SUBMISSION_SCRIPT: &str = r#"
(async function() {
    try {
        let webpackReq;
        const chunkName = 'webpackChunkexploration_pc';
        if (!window[chunkName]) {
            return { success: false, message: "未找到 Webpack 对象: " + chunkName };
        }
        window[chunkName].push([
            ['__page_manager_probe_' + Math.random()],
            {},
            (r) => { webpackReq = r; }
        ]);

        const mod = webpackReq(66115);
        if (!mod || !mod.rM || !mod.Xf) {
            return { success: false, message: "核心模块(66115)加载失败" };
        }

        const dummyController = new mod.Xf();
        const AnswerManager = dummyController._courseAnswerManager;
        const PageManager = dummyController._pageManger;
        if (!PageManager) {
            return { success: false, message: "无法获取 PageManager" };
        }

        const pageState = PageManager.getCurPage();
        if (!pageState || !pageState.pid) {
            return { success: false, message: "无法获取当前页面状态" };
        }
        const currentGroupId = pageState.pid;

        let targetIds = pageState.ids || [];
        if (targetIds.length === 0) {
            const CourseManager = mod.rM.getInstance();
            targetIds = CourseManager.getQuesIds(currentGroupId) || [];
        }
        if (targetIds.length === 0) {
            targetIds = [currentGroupId];
        }

        for (const qid of targetIds) {
            const payload = {
                quesDatas: [],
                groupId: currentGroupId,
                isCompleted: [],
                thirdPartyJudges: "[]",
                submitType: 2,
                hideLoading: true,
                associationGroupId: "",
                version: "default"
            };
            try {
                await AnswerManager._submitDebounce(payload);
            } catch (e) {
                // 服务器对这类提交返回空响应，JSON 解析报错等同于成功
                if (!(e && (e.message.includes("Unexpected") || e.name === 'SyntaxError'))) {
                    return { success: false, message: "提交异常: " + (e && e.message) };
                }
            }
            await new Promise(r => setTimeout(r, 500));
        }

        return { success: true, message: "执行成功" };
    } catch (err) {
        return { success: false, message: err.message };
    }
})()
"#;
