//! 任务控制器 - 流程层
//!
//! 一次页面访问的状态机：
//!
//! ```text
//! 识别操作按钮 ─┬─ "提交"   → 单页作答（策略自己负责提交）
//!               ├─ "下一题" → 题中题循环
//!               ├─ 缺失     → 无按钮分发（自包含题型照常运行）
//!               └─ 其他文本 → 防御性中止
//! ```
//!
//! 题中题循环里子任务严格顺序推进：上一个子任务的策略结果和
//! 缓存写入决定落定之前，绝不会分发下一个子任务（UI 本身是单页的，
//! 点"下一题"是看到下一个子任务的唯一途径）。
//!
//! 中止从不自动重试整页；是否跳到下一个任务由上层任务循环决定。

use anyhow::Result;
use tracing::{error, info, warn};

use crate::ai::AiGateway;
use crate::cache::AnswerCache;
use crate::controller::affordance::Affordance;
use crate::controller::run_context::{self, RunContext};
use crate::controller::session::ChainSession;
use crate::error::AppError;
use crate::page::PageDriver;
use crate::strategy::{self, AbortKind, SolveCtx, SolveOutcome, SolveReport, Variant};

/// 一次任务的终态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// 已提交或串联步骤全部完成
    Completed,
    /// 中止（带分类，不自动重试）
    Aborted(AbortKind),
}

/// 任务控制器
pub struct ChainedTaskController<'a> {
    page: &'a PageDriver,
    ai: &'a AiGateway,
    cache: &'a mut AnswerCache,
    run: RunContext,
}

impl<'a> ChainedTaskController<'a> {
    pub fn new(
        page: &'a PageDriver,
        ai: &'a AiGateway,
        cache: &'a mut AnswerCache,
        run: RunContext,
    ) -> Self {
        Self {
            page,
            ai,
            cache,
            run,
        }
    }

    /// 处理当前页面上的一个任务，直到终态
    pub async fn run(&mut self) -> Result<TaskOutcome> {
        self.page.handle_common_popups().await?;

        let text = self.page.affordance_text().await?;
        let affordance = Affordance::classify(text.as_deref());
        info!("操作按钮识别结果: {:?}", affordance);

        match affordance {
            Affordance::Submit => self.single_page_solve().await,
            Affordance::Next => self.chain_loop().await,
            Affordance::Missing => self.no_affordance_solve().await,
            Affordance::Unknown(text) => {
                warn!(
                    "⚠️ 无法识别的操作按钮文本 '{}'，{}",
                    text,
                    AbortKind::UnknownUi.describe()
                );
                Ok(TaskOutcome::Aborted(AbortKind::UnknownUi))
            }
        }
    }

    // ========== 单页作答 ==========

    async fn single_page_solve(&mut self) -> Result<TaskOutcome> {
        let mut session = ChainSession::new();
        match strategy::match_variant(self.page).await? {
            None => {
                info!("页面为纯信息页，无需作答。");
                Ok(TaskOutcome::Completed)
            }
            Some(variant) => {
                info!("命中题型: {}", variant.tag());
                // 非串联：策略自己负责提交与缓存回填
                let report = self.solve_matched(variant, false, &mut session).await?;
                Ok(self.conclude(report))
            }
        }
    }

    // ========== 题中题循环 ==========

    async fn chain_loop(&mut self) -> Result<TaskOutcome> {
        info!("检测到\"下一题\"按钮，进入题中题流程。");
        let mut session = ChainSession::new();
        let abort_kind: AbortKind;

        loop {
            info!(
                "\n{} 子任务 {} {}",
                "─".repeat(10),
                session.sub_task_index + 1,
                "─".repeat(10)
            );

            match strategy::match_variant(self.page).await? {
                Some(variant) => {
                    info!("子任务命中题型: {}", variant.tag());
                    let report = self.solve_matched(variant, true, &mut session).await?;
                    match report.outcome {
                        SolveOutcome::Success => {
                            if report.cache_pending {
                                session.queue_cache_write(variant);
                            }
                        }
                        SolveOutcome::Skipped => {}
                        SolveOutcome::Abort(kind) => {
                            // 部分失败策略：放弃整条链，不重试
                            warn!(
                                "⚠️ 子任务 {} 中止: {}，放弃本条题中题。",
                                session.sub_task_index + 1,
                                kind.describe()
                            );
                            abort_kind = kind;
                            break;
                        }
                    }
                }
                None => {
                    // 无匹配策略的子任务把材料文本并入共享上下文，
                    // 供后续依赖前文的子任务使用
                    let material = self.page.collect_material_text().await.unwrap_or_default();
                    if material.is_empty() {
                        info!("子任务无匹配题型也无材料，跳过。");
                    } else {
                        info!(
                            "子任务无匹配题型，提取 {} 字符材料并入共享上下文。",
                            material.chars().count()
                        );
                        session.append_context(&material);
                    }
                }
            }

            // 子任务落定后重读操作按钮，决定推进方向
            let text = self.page.affordance_text().await?;
            match Affordance::classify(text.as_deref()) {
                Affordance::Next => {
                    self.page.click_action_button().await?;
                    self.page.settle(800).await;
                    self.page.handle_common_popups().await?;
                    session.advance();
                }
                Affordance::Submit => {
                    return self.finish_chain(&session).await;
                }
                other => {
                    warn!(
                        "⚠️ 子任务后操作按钮变为 {:?}，{}",
                        other,
                        AbortKind::UnknownUi.describe()
                    );
                    abort_kind = AbortKind::UnknownUi;
                    break;
                }
            }
        }

        // 链被放弃：已排队的缓存写入仍尽力回填
        if !session.pending_cache_writes.is_empty() {
            warn!(
                "链中止，但已排队 {} 条缓存写入，尝试回填...",
                session.pending_cache_writes.len()
            );
            self.replay_pending_writes(&session).await;
        }
        Ok(TaskOutcome::Aborted(abort_kind))
    }

    /// 最终提交 + 缓存回填
    async fn finish_chain(&mut self, session: &ChainSession) -> Result<TaskOutcome> {
        if self.run.needs_confirm() {
            let ok =
                run_context::confirm("所有子任务已完成。是否确认提交整个任务？[Y/n]: ").await?;
            if !ok {
                warn!("⚠️ {}", AbortKind::UserCancelled.describe());
                return Ok(TaskOutcome::Aborted(AbortKind::UserCancelled));
            }
        }

        self.page.click_action_button().await?;
        info!("📤 任务已提交。正在处理最终确认弹窗...");
        self.page.handle_submission_confirmation().await?;
        self.page.check_rate_limit().await?;

        self.replay_pending_writes(session).await;

        info!("✅ 题中题任务完成，共 {} 个子任务。", session.sub_task_index + 1);
        Ok(TaskOutcome::Completed)
    }

    // ========== 无操作按钮 ==========

    async fn no_affordance_solve(&mut self) -> Result<TaskOutcome> {
        let mut session = ChainSession::new();
        match strategy::match_variant(self.page).await? {
            None => {
                info!("无操作按钮且无匹配题型，视为纯媒体/信息页，跳过。");
                Ok(TaskOutcome::Completed)
            }
            Some(variant) => {
                // 角色扮演/讨论区即使没有可见提交控件也是自包含任务，
                // 其余题型按串联模式运行（不期待提交）
                let chained = !variant.self_contained();
                info!(
                    "无操作按钮，命中题型: {} (chained={})",
                    variant.tag(),
                    chained
                );
                let report = self.solve_matched(variant, chained, &mut session).await?;
                Ok(self.conclude(report))
            }
        }
    }

    // ========== 公共部分 ==========

    /// 执行策略并应用错误传播策略：
    /// 会话级致命错误继续上抛，局部错误转为"中止"信号。
    async fn solve_matched(
        &mut self,
        variant: Variant,
        chained: bool,
        session: &mut ChainSession,
    ) -> Result<SolveReport> {
        let mut ctx = SolveCtx {
            page: self.page,
            ai: self.ai,
            cache: &mut *self.cache,
            run: &self.run,
            chained,
            session,
        };
        match strategy::solve(variant, &mut ctx).await {
            Ok(report) => Ok(report),
            Err(e) => {
                let fatal = e
                    .downcast_ref::<AppError>()
                    .map(|app| app.is_session_fatal())
                    .unwrap_or(false);
                if fatal {
                    return Err(e);
                }
                error!("策略 {} 执行失败: {}", variant.tag(), e);
                Ok(SolveReport::abort(AbortKind::Internal))
            }
        }
    }

    fn conclude(&self, report: SolveReport) -> TaskOutcome {
        match report.outcome {
            SolveOutcome::Success | SolveOutcome::Skipped => TaskOutcome::Completed,
            SolveOutcome::Abort(kind) => {
                warn!("⚠️ 任务中止: {}", kind.describe());
                TaskOutcome::Aborted(kind)
            }
        }
    }

    /// 把排队的缓存写入回填进缓存
    ///
    /// 答案来源是平台解析页的标准答案，不是 AI 的猜测——
    /// 缓存命中永远是平台确认过的正确答案。回填是尽力而为，
    /// 失败只告警，不影响任务终态。
    async fn replay_pending_writes(&mut self, session: &ChainSession) {
        if session.pending_cache_writes.is_empty() {
            return;
        }
        info!(
            "正在回填 {} 条缓存写入...",
            session.pending_cache_writes.len()
        );

        let base_key = match self.page.breadcrumb_parts().await {
            Ok(parts) => parts,
            Err(e) => {
                warn!("无法获取面包屑，放弃缓存回填: {}", e);
                return;
            }
        };
        if let Err(e) = self.page.navigate_to_review().await {
            warn!("无法进入答案解析页，放弃缓存回填: {}", e);
            return;
        }

        for write in &session.pending_cache_writes {
            match self
                .page
                .harvest_review_answers_in_group(write.sub_task_index)
                .await
            {
                Ok(answers) if !answers.is_empty() => {
                    let mut key = base_key.clone();
                    key.push(write.sub_task_index.to_string());
                    if let Err(e) = self.cache.save(&key, write.variant, &answers) {
                        warn!("子任务 {} 缓存写入失败: {}", write.sub_task_index, e);
                    }
                }
                Ok(_) => {
                    warn!(
                        "子任务 {} 的解析分组为空，跳过回填。",
                        write.sub_task_index
                    );
                }
                Err(e) => {
                    warn!(
                        "提取子任务 {} 的标准答案失败: {}",
                        write.sub_task_index, e
                    );
                }
            }
        }
    }
}
