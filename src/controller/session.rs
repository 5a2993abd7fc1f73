//! 题中题会话状态
//!
//! 一次页面访问期间的可变状态，由 ChainedTaskController 独占持有：
//! 当前子任务索引、共享上下文、待回填的缓存写入清单，
//! 以及"远程文章已获取"的一次性状态锁。

use crate::strategy::Variant;

/// 一条待回填的缓存写入：提交后从解析页按子任务分组取标准答案
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingCacheWrite {
    pub sub_task_index: usize,
    pub variant: Variant,
}

/// 题中题会话状态
#[derive(Debug, Default)]
pub struct ChainSession {
    /// 当前子任务索引（从 0 开始）
    pub sub_task_index: usize,
    /// 无匹配策略的子任务贡献的共享自由文本上下文，
    /// 供后续子任务的 Prompt 使用（"题目依赖前文"就是这样满足的）
    pub shared_context: String,
    /// 待回填的缓存写入清单
    pub pending_cache_writes: Vec<PendingCacheWrite>,
    /// 一次性状态锁：本次会话内是否已经跳转取过远程文章，
    /// 防止重复子任务造成无限往返
    pub remote_article_fetched: bool,
}

impl ChainSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// 进入下一个子任务
    pub fn advance(&mut self) {
        self.sub_task_index += 1;
    }

    /// 追加共享上下文
    pub fn append_context(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if !self.shared_context.is_empty() {
            self.shared_context.push('\n');
        }
        self.shared_context.push_str(text);
    }

    /// 登记一条待回填的缓存写入
    pub fn queue_cache_write(&mut self, variant: Variant) {
        self.pending_cache_writes.push(PendingCacheWrite {
            sub_task_index: self.sub_task_index,
            variant,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_and_queue() {
        let mut session = ChainSession::new();
        assert_eq!(session.sub_task_index, 0);

        session.queue_cache_write(Variant::SingleChoice);
        session.advance();
        session.advance();
        session.queue_cache_write(Variant::FillInTheBlank);

        assert_eq!(session.sub_task_index, 2);
        assert_eq!(
            session.pending_cache_writes,
            vec![
                PendingCacheWrite {
                    sub_task_index: 0,
                    variant: Variant::SingleChoice
                },
                PendingCacheWrite {
                    sub_task_index: 2,
                    variant: Variant::FillInTheBlank
                },
            ]
        );
    }

    #[test]
    fn test_append_context_skips_empty() {
        let mut session = ChainSession::new();
        session.append_context("  ");
        assert!(session.shared_context.is_empty());

        session.append_context("passage one");
        session.append_context("passage two");
        assert_eq!(session.shared_context, "passage one\npassage two");
    }
}
