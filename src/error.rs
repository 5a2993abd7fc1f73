use std::fmt;

/// 应用程序错误类型
#[derive(Debug)]
pub enum AppError {
    /// 浏览器相关错误
    Browser(BrowserError),
    /// 页面状态错误
    Page(PageError),
    /// AI 服务错误
    Ai(AiError),
    /// 缓存相关错误
    Cache(CacheError),
    /// 语音评分相关错误
    Voice(VoiceError),
    /// 业务逻辑错误
    Business(BusinessError),
    /// 配置错误
    Config(ConfigError),
    /// 其他错误（用于包装第三方库错误）
    Other(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Browser(e) => write!(f, "浏览器错误: {}", e),
            AppError::Page(e) => write!(f, "页面错误: {}", e),
            AppError::Ai(e) => write!(f, "AI错误: {}", e),
            AppError::Cache(e) => write!(f, "缓存错误: {}", e),
            AppError::Voice(e) => write!(f, "语音评分错误: {}", e),
            AppError::Business(e) => write!(f, "业务错误: {}", e),
            AppError::Config(e) => write!(f, "配置错误: {}", e),
            AppError::Other(msg) => write!(f, "错误: {}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Browser(e) => Some(e),
            AppError::Page(e) => Some(e),
            AppError::Ai(e) => Some(e),
            AppError::Cache(e) => Some(e),
            AppError::Voice(e) => Some(e),
            AppError::Business(e) => Some(e),
            AppError::Config(e) => Some(e),
            AppError::Other(_) => None,
        }
    }
}

/// 浏览器相关错误
#[derive(Debug)]
pub enum BrowserError {
    /// 连接浏览器失败
    ConnectionFailed {
        port: u16,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 创建页面失败
    PageCreationFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 导航失败
    NavigationFailed {
        url: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 执行脚本失败
    ScriptExecutionFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for BrowserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrowserError::ConnectionFailed { port, source } => {
                write!(f, "无法连接到浏览器 (端口: {}): {}", port, source)
            }
            BrowserError::PageCreationFailed { source } => {
                write!(f, "创建页面失败: {}", source)
            }
            BrowserError::NavigationFailed { url, source } => {
                write!(f, "导航到 {} 失败: {}", url, source)
            }
            BrowserError::ScriptExecutionFailed { source } => {
                write!(f, "执行脚本失败: {}", source)
            }
        }
    }
}

impl std::error::Error for BrowserError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BrowserError::ConnectionFailed { source, .. }
            | BrowserError::PageCreationFailed { source }
            | BrowserError::NavigationFailed { source, .. }
            | BrowserError::ScriptExecutionFailed { source } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
        }
    }
}

/// 页面状态错误
///
/// 页面处于无法继续自动化的状态时使用。
#[derive(Debug)]
pub enum PageError {
    /// 操作按钮文本无法归类（既不是提交也不是下一题）
    UnrecognizedAffordance {
        text: String,
    },
    /// 未能提取面包屑路径
    BreadcrumbMissing,
    /// 等待元素超时
    ElementWaitTimeout {
        selector: String,
        timeout_ms: u64,
    },
    /// 答案解析页提取失败
    ReviewExtractionFailed {
        reason: String,
    },
}

impl fmt::Display for PageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageError::UnrecognizedAffordance { text } => {
                write!(f, "无法识别的操作按钮文本: '{}'", text)
            }
            PageError::BreadcrumbMissing => write!(f, "无法获取页面面包屑路径"),
            PageError::ElementWaitTimeout {
                selector,
                timeout_ms,
            } => {
                write!(f, "等待元素 '{}' 超时 ({}ms)", selector, timeout_ms)
            }
            PageError::ReviewExtractionFailed { reason } => {
                write!(f, "从答案解析页提取答案失败: {}", reason)
            }
        }
    }
}

impl std::error::Error for PageError {}

/// AI 服务错误
#[derive(Debug)]
pub enum AiError {
    /// API 调用失败
    ApiCallFailed {
        model: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 返回内容为空
    EmptyContent {
        model: String,
    },
    /// 返回内容不是合法 JSON 或缺少必需字段
    MalformedResponse {
        detail: String,
    },
    /// 语音合成失败
    SynthesisFailed {
        reason: String,
    },
    /// 语音识别失败
    TranscriptionFailed {
        reason: String,
    },
}

impl fmt::Display for AiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AiError::ApiCallFailed { model, source } => {
                write!(f, "AI API调用失败 (模型: {}): {}", model, source)
            }
            AiError::EmptyContent { model } => {
                write!(f, "AI返回内容为空 (模型: {})", model)
            }
            AiError::MalformedResponse { detail } => {
                write!(f, "AI返回内容格式不正确: {}", detail)
            }
            AiError::SynthesisFailed { reason } => {
                write!(f, "语音合成失败: {}", reason)
            }
            AiError::TranscriptionFailed { reason } => {
                write!(f, "语音识别失败: {}", reason)
            }
        }
    }
}

impl std::error::Error for AiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AiError::ApiCallFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

/// 缓存相关错误
#[derive(Debug)]
pub enum CacheError {
    /// 写入缓存文件失败
    WriteFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 序列化缓存内容失败
    SerializeFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::WriteFailed { path, source } => {
                write!(f, "写入缓存文件失败 ({}): {}", path, source)
            }
            CacheError::SerializeFailed { source } => {
                write!(f, "序列化缓存内容失败: {}", source)
            }
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::WriteFailed { source, .. } | CacheError::SerializeFailed { source } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
        }
    }
}

/// 语音评分相关错误
#[derive(Debug)]
pub enum VoiceError {
    /// 得分低于硬性下限，整页中止
    ScoreHardFail {
        score: u32,
    },
    /// 重试参数全部用尽后分数仍不达标
    LadderExhausted {
        best_score: u32,
    },
    /// 页面上始终未出现数字分数
    ScoreUnavailable,
    /// 朗读文本缺失
    ReferenceTextMissing,
}

impl fmt::Display for VoiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoiceError::ScoreHardFail { score } => {
                write!(f, "语音得分 {} 低于硬性下限 60，中止整页", score)
            }
            VoiceError::LadderExhausted { best_score } => {
                write!(f, "所有重试参数用尽，最高得分 {} 仍低于 80", best_score)
            }
            VoiceError::ScoreUnavailable => write!(f, "页面上未出现数字分数"),
            VoiceError::ReferenceTextMissing => write!(f, "未能提取到待朗读文本"),
        }
    }
}

impl std::error::Error for VoiceError {}

/// 业务逻辑错误
#[derive(Debug)]
pub enum BusinessError {
    /// 提交触发平台频率限制，整个会话应当终止
    RateLimited,
    /// 用户取消操作
    UserCancelled,
    /// 任务列表为空
    NoPendingTasks,
}

impl fmt::Display for BusinessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusinessError::RateLimited => {
                write!(f, "检测到平台提交频率限制，会话终止")
            }
            BusinessError::UserCancelled => write!(f, "用户取消了操作"),
            BusinessError::NoPendingTasks => write!(f, "没有待处理的任务"),
        }
    }
}

impl std::error::Error for BusinessError {}

/// 配置错误
#[derive(Debug)]
pub enum ConfigError {
    /// 环境变量解析失败
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 配置文件解析失败
    FileParseFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 缺少必需的配置项
    MissingRequired {
        key: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EnvVarParseFailed {
                var_name,
                value,
                expected_type,
            } => {
                write!(
                    f,
                    "环境变量 {} 解析失败: 值 '{}' 无法转换为 {}",
                    var_name, value, expected_type
                )
            }
            ConfigError::FileParseFailed { path, source } => {
                write!(f, "配置文件解析失败 ({}): {}", path, source)
            }
            ConfigError::MissingRequired { key } => {
                write!(f, "缺少必需的配置项: {}", key)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::FileParseFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

// ========== 从常见错误类型转换 ==========
// 注意：不需要手动实现 From<AppError> for anyhow::Error，
// 因为 anyhow 已经为所有实现了 std::error::Error 的类型提供了自动实现

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AppError::Browser(BrowserError::ScriptExecutionFailed {
            source: Box::new(err),
        })
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Ai(AiError::MalformedResponse {
            detail: err.to_string(),
        })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Other(format!("IO错误: {}", err))
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建浏览器连接错误
    pub fn browser_connection_failed(
        port: u16,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Browser(BrowserError::ConnectionFailed {
            port,
            source: Box::new(source),
        })
    }

    /// 创建AI API调用错误
    pub fn ai_api_failed(
        model: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Ai(AiError::ApiCallFailed {
            model: model.into(),
            source: Box::new(source),
        })
    }

    /// 创建缓存写入错误
    pub fn cache_write_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Cache(CacheError::WriteFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 是否为会话级致命错误（频率限制等），需要一路上抛到顶层循环
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, AppError::Business(BusinessError::RateLimited))
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_is_session_fatal() {
        let err = AppError::Business(BusinessError::RateLimited);
        assert!(err.is_session_fatal());

        let err = AppError::Voice(VoiceError::ScoreHardFail { score: 42 });
        assert!(!err.is_session_fatal());
    }

    #[test]
    fn test_display_contains_context() {
        let err = AppError::Page(PageError::UnrecognizedAffordance {
            text: "返 回".to_string(),
        });
        assert!(err.to_string().contains("返 回"));

        let err = AppError::Voice(VoiceError::ScoreHardFail { score: 55 });
        assert!(err.to_string().contains("55"));
    }
}
