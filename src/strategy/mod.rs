//! 策略注册表与分发协议 - 业务能力层
//!
//! ## 设计
//!
//! 题型是一个封闭集合，用 `Variant` 枚举建模而不是继承体系：
//! - 每个题型模块暴露两个能力：`matches`（无副作用、限时探测）和 `solve`
//! - 注册表是一个固定优先级的有序列表，分发时取第一个命中者
//! - 防御/跳过类题型排最前，语音类居中，"无作答"兜底排最后
//!
//! 任何题型都没命中时页面被视为纯信息页，不算错误。

pub mod checkbox;
pub mod discussion;
pub mod drag_order;
pub mod fill_blank;
pub mod multiple_choice;
pub mod no_reply;
pub mod short_answer;
pub mod single_choice;
pub mod support;
pub mod unsupported_image;
pub mod voice;

use anyhow::Result;
use tracing::debug;

use crate::ai::AiGateway;
use crate::cache::AnswerCache;
use crate::controller::run_context::RunContext;
use crate::controller::session::ChainSession;
use crate::page::PageDriver;

/// 题型（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    /// 图片依赖题：无法解答，防御性跳过
    UnsupportedImage,
    /// Exit Ticket 自检打钩
    CheckboxSelfCheck,
    /// 讨论区评论
    Discussion,
    /// 角色扮演对话（语音）
    RolePlay,
    /// 文字朗读（语音）
    ReadAloud,
    /// 语音简答 / 口语陈述
    QaVoice,
    /// 单选题
    SingleChoice,
    /// 多选题
    MultipleChoice,
    /// 填空题
    FillInTheBlank,
    /// 拖拽排序题
    DragOrder,
    /// 简答题
    ShortAnswer,
    /// 无作答区域的媒体页（兜底）
    NoReply,
}

/// 固定分发优先级：防御类最前，语音类其次，常规题型在后，兜底最后
pub const DISPATCH_ORDER: &[Variant] = &[
    Variant::UnsupportedImage,
    Variant::CheckboxSelfCheck,
    Variant::Discussion,
    Variant::RolePlay,
    Variant::ReadAloud,
    Variant::QaVoice,
    Variant::SingleChoice,
    Variant::MultipleChoice,
    Variant::FillInTheBlank,
    Variant::DragOrder,
    Variant::ShortAnswer,
    Variant::NoReply,
];

/// 缓存标签 → 题型的静态映射
static VARIANT_BY_TAG: phf::Map<&'static str, Variant> = phf::phf_map! {
    "unsupported_image_question" => Variant::UnsupportedImage,
    "checkbox_self_check" => Variant::CheckboxSelfCheck,
    "discussion" => Variant::Discussion,
    "role_play" => Variant::RolePlay,
    "read_aloud" => Variant::ReadAloud,
    "qa_voice" => Variant::QaVoice,
    "single_choice" => Variant::SingleChoice,
    "multiple_choice" => Variant::MultipleChoice,
    "fill_in_the_blank" => Variant::FillInTheBlank,
    "drag_order" => Variant::DragOrder,
    "short_answer" => Variant::ShortAnswer,
    "no_reply" => Variant::NoReply,
};

impl Variant {
    /// 持久化到缓存文件里的标签
    pub fn tag(self) -> &'static str {
        match self {
            Variant::UnsupportedImage => "unsupported_image_question",
            Variant::CheckboxSelfCheck => "checkbox_self_check",
            Variant::Discussion => "discussion",
            Variant::RolePlay => "role_play",
            Variant::ReadAloud => "read_aloud",
            Variant::QaVoice => "qa_voice",
            Variant::SingleChoice => "single_choice",
            Variant::MultipleChoice => "multiple_choice",
            Variant::FillInTheBlank => "fill_in_the_blank",
            Variant::DragOrder => "drag_order",
            Variant::ShortAnswer => "short_answer",
            Variant::NoReply => "no_reply",
        }
    }

    /// 从缓存标签解析题型
    pub fn from_tag(tag: &str) -> Option<Variant> {
        VARIANT_BY_TAG.get(tag).copied()
    }

    /// 没有提交按钮时是否仍作为自包含任务运行（自带发布/完成动作）
    pub fn self_contained(self) -> bool {
        matches!(self, Variant::RolePlay | Variant::Discussion)
    }
}

/// 页面中止的分类，供日志和上层循环判断
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortKind {
    /// 用户在确认提示处取消
    UserCancelled,
    /// AI 返回内容无法解析
    AiMalformed,
    /// 语音得分触发硬性失败
    VoiceHardFail,
    /// 图片依赖题等无法处理的内容
    UnsupportedContent,
    /// 页面出现无法识别的操作按钮
    UnknownUi,
    /// 策略内部错误
    Internal,
}

impl AbortKind {
    /// 人类可读的中止原因（每条中止路径都要输出一条）
    pub fn describe(self) -> &'static str {
        match self {
            AbortKind::UserCancelled => "用户取消了操作",
            AbortKind::AiMalformed => "AI 返回内容无法解析",
            AbortKind::VoiceHardFail => "语音得分不达标",
            AbortKind::UnsupportedContent => "页面内容无法自动处理",
            AbortKind::UnknownUi => "页面处于无法识别的状态",
            AbortKind::Internal => "策略执行过程中发生内部错误",
        }
    }
}

/// 策略执行结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveOutcome {
    /// 作答完成（已提交或串联步骤已就绪）
    Success,
    /// 页面无需作答，跳过
    Skipped,
    /// 中止整页
    Abort(AbortKind),
}

/// 策略执行报告
#[derive(Debug, Clone, Copy)]
pub struct SolveReport {
    pub outcome: SolveOutcome,
    /// 本次是新鲜 AI 作答，提交后需要从解析页回填缓存
    pub cache_pending: bool,
}

impl SolveReport {
    pub fn success() -> Self {
        Self {
            outcome: SolveOutcome::Success,
            cache_pending: false,
        }
    }

    pub fn success_cache_pending() -> Self {
        Self {
            outcome: SolveOutcome::Success,
            cache_pending: true,
        }
    }

    pub fn skipped() -> Self {
        Self {
            outcome: SolveOutcome::Skipped,
            cache_pending: false,
        }
    }

    pub fn abort(kind: AbortKind) -> Self {
        Self {
            outcome: SolveOutcome::Abort(kind),
            cache_pending: false,
        }
    }
}

/// 策略执行上下文
///
/// 所有可变状态（缓存、会话）都从这里借入，策略不持有资源。
pub struct SolveCtx<'a> {
    pub page: &'a PageDriver,
    pub ai: &'a AiGateway,
    pub cache: &'a mut AnswerCache,
    pub run: &'a RunContext,
    /// 是否作为"题中题"的一个子任务运行（不负责提交）
    pub chained: bool,
    pub session: &'a mut ChainSession,
}

impl SolveCtx<'_> {
    /// 当前子任务索引
    pub fn sub_task_index(&self) -> usize {
        self.session.sub_task_index
    }

    /// 本题的缓存定位键：面包屑路径，串联模式下追加子任务索引
    pub async fn location_key(&self) -> Result<Vec<String>> {
        let mut key = self.page.breadcrumb_parts().await?;
        if self.chained {
            key.push(self.session.sub_task_index.to_string());
        }
        Ok(key)
    }
}

/// 按固定优先级探测当前页面适用的题型
///
/// 谓词都是无副作用的限时探测，命中第一个即返回；
/// 全部未命中返回 None（纯信息页）。
pub async fn match_variant(page: &PageDriver) -> Result<Option<Variant>> {
    for variant in DISPATCH_ORDER {
        let hit = match variant {
            Variant::UnsupportedImage => unsupported_image::matches(page).await?,
            Variant::CheckboxSelfCheck => checkbox::matches(page).await?,
            Variant::Discussion => discussion::matches(page).await?,
            Variant::RolePlay => voice::role_play::matches(page).await?,
            Variant::ReadAloud => voice::read_aloud::matches(page).await?,
            Variant::QaVoice => voice::qa_voice::matches(page).await?,
            Variant::SingleChoice => single_choice::matches(page).await?,
            Variant::MultipleChoice => multiple_choice::matches(page).await?,
            Variant::FillInTheBlank => fill_blank::matches(page).await?,
            Variant::DragOrder => drag_order::matches(page).await?,
            Variant::ShortAnswer => short_answer::matches(page).await?,
            Variant::NoReply => no_reply::matches(page).await?,
        };
        if hit {
            debug!("题型命中: {:?}", variant);
            return Ok(Some(*variant));
        }
    }
    Ok(None)
}

/// 执行指定题型的策略
pub async fn solve(variant: Variant, ctx: &mut SolveCtx<'_>) -> Result<SolveReport> {
    match variant {
        Variant::UnsupportedImage => unsupported_image::solve(ctx).await,
        Variant::CheckboxSelfCheck => checkbox::solve(ctx).await,
        Variant::Discussion => discussion::solve(ctx).await,
        Variant::RolePlay => voice::role_play::solve(ctx).await,
        Variant::ReadAloud => voice::read_aloud::solve(ctx).await,
        Variant::QaVoice => voice::qa_voice::solve(ctx).await,
        Variant::SingleChoice => single_choice::solve(ctx).await,
        Variant::MultipleChoice => multiple_choice::solve(ctx).await,
        Variant::FillInTheBlank => fill_blank::solve(ctx).await,
        Variant::DragOrder => drag_order::solve(ctx).await,
        Variant::ShortAnswer => short_answer::solve(ctx).await,
        Variant::NoReply => no_reply::solve(ctx).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_round_trip() {
        for variant in DISPATCH_ORDER {
            assert_eq!(Variant::from_tag(variant.tag()), Some(*variant));
        }
        assert_eq!(Variant::from_tag("nonexistent"), None);
    }

    #[test]
    fn test_dispatch_order_is_complete_and_unique() {
        use std::collections::HashSet;
        let set: HashSet<_> = DISPATCH_ORDER.iter().collect();
        assert_eq!(set.len(), DISPATCH_ORDER.len());
        assert_eq!(DISPATCH_ORDER.len(), 12);
    }

    #[test]
    fn test_defensive_variant_first_catch_all_last() {
        assert_eq!(DISPATCH_ORDER.first(), Some(&Variant::UnsupportedImage));
        assert_eq!(DISPATCH_ORDER.last(), Some(&Variant::NoReply));
    }

    #[test]
    fn test_self_contained_variants() {
        assert!(Variant::RolePlay.self_contained());
        assert!(Variant::Discussion.self_contained());
        assert!(!Variant::SingleChoice.self_contained());
        assert!(!Variant::QaVoice.self_contained());
    }
}
