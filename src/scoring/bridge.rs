//! 评分通道注入桥
//!
//! 把 `splice` 模块的装载/替换/丢弃协议安装到页面的语音评分
//! WebSocket 上。页面侧的钩子只认一个一次性的 pending payload
//! 槽位，行为与 `AudioSplice` 状态机一一对应：
//!
//! - 文本/控制消息原样放行
//! - 装载后第一个二进制帧被替换为合成音频，槽位随即置空
//! - 槽位为空时所有二进制帧静默丢弃
//!
//! 两种安装模式：
//! - 一次性：每次录音尝试前装载、结束后整体拆除，尝试之间完全隔离
//! - 常驻：整页只安装一次钩子，每次尝试只装载/清空槽位，
//!   适合多句共用一条长连接的对话题，避免反复重建

use anyhow::Result;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tracing::{debug, info, warn};

use crate::page::PageDriver;
use crate::scoring::splice::SpliceError;

/// 语音评分服务的主机名，钩子只拦截发往它的连接
const SCORING_HOST: &str = "speech.unipus.cn";

/// 安装模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptMode {
    /// 每次尝试独立安装与拆除
    OneShot,
    /// 整页安装一次，按尝试装载/清空
    Persistent,
}

/// 评分 WebSocket 拦截器
///
/// Rust 侧维护装载状态镜像，强制"装载一次、清理一次"的调用约定；
/// 页面侧的消费（替换后置空）由钩子自身完成。
pub struct SpeechWsInterceptor<'a> {
    page: &'a PageDriver,
    mode: InterceptMode,
    installed: bool,
    armed: bool,
}

impl<'a> SpeechWsInterceptor<'a> {
    pub fn new(page: &'a PageDriver, mode: InterceptMode) -> Self {
        Self {
            page,
            mode,
            installed: false,
            armed: false,
        }
    }

    pub fn mode(&self) -> InterceptMode {
        self.mode
    }

    /// 安装页面侧钩子（幂等）
    pub async fn install(&mut self) -> Result<()> {
        if self.installed {
            return Ok(());
        }
        self.page.executor().eval(install_script()).await?;
        self.installed = true;
        info!("评分通道钩子已安装 ({:?})", self.mode);
        Ok(())
    }

    /// 装载一份合成音频到一次性槽位
    ///
    /// 未清理就再次装载违反单写单读约定，直接报错。
    pub async fn arm(&mut self, wav_bytes: &[u8]) -> Result<()> {
        if self.armed {
            return Err(SpliceError::AlreadyArmed.into());
        }
        self.install().await?;
        let payload_b64 = BASE64.encode(wav_bytes);
        let js = format!(
            "window.__speechSplicePending = {}; true",
            serde_json::to_string(&payload_b64).unwrap_or_default()
        );
        self.page.executor().eval(js).await?;
        self.armed = true;
        debug!("注入音频已装载，大小 {} 字节", wav_bytes.len());
        Ok(())
    }

    /// 清空槽位；一次性模式下同时拆除钩子
    ///
    /// 每次尝试结束后必须调用，无论成败，保证过期音频不会
    /// 泄漏到下一次尝试。失败只记日志（残留的钩子状态可以容忍，
    /// 串联流程中途崩溃不行）。
    pub async fn clear(&mut self) -> Result<()> {
        self.armed = false;
        let result = match self.mode {
            InterceptMode::OneShot => self.teardown_inner().await,
            InterceptMode::Persistent => self
                .page
                .executor()
                .eval("window.__speechSplicePending = null; true")
                .await
                .map(|_| ()),
        };
        if let Err(e) = result {
            warn!("清理注入状态失败（忽略）: {}", e);
        }
        Ok(())
    }

    /// 拆除钩子，恢复原始 WebSocket
    pub async fn teardown(&mut self) -> Result<()> {
        self.armed = false;
        if let Err(e) = self.teardown_inner().await {
            warn!("拆除评分通道钩子失败（忽略）: {}", e);
        }
        Ok(())
    }

    async fn teardown_inner(&mut self) -> Result<()> {
        if !self.installed {
            return Ok(());
        }
        self.page.executor().eval(TEARDOWN_SCRIPT).await?;
        self.installed = false;
        debug!("评分通道钩子已拆除");
        Ok(())
    }
}

fn install_script() -> String {
    format!(
        r#"(() => {{
            if (window.__speechSpliceInstalled) return true;
            window.__speechSpliceInstalled = true;
            window.__speechSplicePending = null;
            window.__speechSpliceOriginalWs = window.WebSocket;
            window.WebSocket = function(url, protocols) {{
                const ws = new window.__speechSpliceOriginalWs(url, protocols);
                if (typeof url === 'string' && url.includes('{host}')) {{
                    const originalSend = ws.send;
                    ws.send = function(data) {{
                        const isAudio = data instanceof ArrayBuffer
                            || (data && data.buffer instanceof ArrayBuffer);
                        if (!isAudio) {{
                            // 控制/文本消息原样放行
                            originalSend.call(this, data);
                            return;
                        }}
                        const b64 = window.__speechSplicePending;
                        if (!b64) {{
                            // 未装载：静默丢弃，宁可不发也不发真实音频
                            return;
                        }}
                        // 消费即置空，本次尝试的后续音频帧全部丢弃
                        window.__speechSplicePending = null;
                        const chars = atob(b64);
                        const bytes = new Uint8Array(chars.length);
                        for (let i = 0; i < chars.length; i++) {{
                            bytes[i] = chars.charCodeAt(i);
                        }}
                        originalSend.call(this, bytes.buffer);
                    }};
                }}
                return ws;
            }};
            return true;
        }})()"#,
        host = SCORING_HOST
    )
}

const TEARDOWN_SCRIPT: &str = r#"(() => {
    if (window.__speechSpliceInstalled) {
        window.WebSocket = window.__speechSpliceOriginalWs;
        delete window.__speechSpliceOriginalWs;
        delete window.__speechSplicePending;
        delete window.__speechSpliceInstalled;
    }
    return true;
})()"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_script_targets_scoring_host() {
        let script = install_script();
        assert!(script.contains(SCORING_HOST));
        assert!(script.contains("__speechSplicePending"));
    }

    #[test]
    fn test_teardown_restores_websocket() {
        assert!(TEARDOWN_SCRIPT.contains("window.WebSocket = window.__speechSpliceOriginalWs"));
    }
}
