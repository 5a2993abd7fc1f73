//! 运行上下文
//!
//! 每次任务调用一份不可变快照，随分发/执行调用链向下传递。
//! 取代模块级全局开关，瞬态标志不会泄漏到下一个任务。

use anyhow::Result;
use tracing::info;

use crate::config::Config;

/// 每次任务调用的不可变运行参数
#[derive(Debug, Clone, Copy)]
pub struct RunContext {
    /// 全自动模式：不预览 Prompt
    pub auto_mode: bool,
    /// 全自动模式下连确认提示也跳过
    pub auto_no_confirm: bool,
    /// 强制忽略缓存，总是调用 AI
    pub force_ai: bool,
}

impl RunContext {
    pub fn from_config(config: &Config) -> Self {
        Self {
            auto_mode: config.auto_mode,
            auto_no_confirm: config.auto_mode_no_confirm,
            force_ai: config.force_ai,
        }
    }

    /// 是否在调用 AI 前预览完整 Prompt
    pub fn preview_prompts(&self) -> bool {
        !self.auto_mode
    }

    /// 是否需要交互确认
    pub fn needs_confirm(&self) -> bool {
        !(self.auto_mode && self.auto_no_confirm)
    }
}

/// 在终端询问用户 [Y/n]，回车视为同意
///
/// 阻塞的 stdin 读取放到独立线程，不卡住浏览器事件处理。
pub async fn confirm(prompt: &str) -> Result<bool> {
    info!("{}", prompt);
    let line = tokio::task::spawn_blocking(|| {
        let mut input = String::new();
        std::io::stdin().read_line(&mut input).map(|_| input)
    })
    .await??;
    Ok(is_affirmative(&line))
}

fn is_affirmative(line: &str) -> bool {
    let trimmed = line.trim().to_uppercase();
    trimmed.is_empty() || trimmed == "Y"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_affirmative() {
        assert!(is_affirmative(""));
        assert!(is_affirmative("\n"));
        assert!(is_affirmative("y\n"));
        assert!(is_affirmative("Y\n"));
        assert!(!is_affirmative("n\n"));
        assert!(!is_affirmative("no\n"));
    }

    #[test]
    fn test_run_context_flags() {
        let ctx = RunContext {
            auto_mode: true,
            auto_no_confirm: false,
            force_ai: false,
        };
        assert!(!ctx.preview_prompts());
        assert!(ctx.needs_confirm());

        let ctx = RunContext {
            auto_mode: true,
            auto_no_confirm: true,
            force_ai: false,
        };
        assert!(!ctx.needs_confirm());
    }
}
