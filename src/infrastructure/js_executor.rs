//! JS 执行器 - 基础设施层
//!
//! 持有唯一的 page 资源，只暴露"执行 JS"的能力

use anyhow::Result;
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{AppError, PageError};

/// JS 执行器
///
/// 职责：
/// - 持有唯一的 Page 资源
/// - 暴露 eval() 能力
/// - 不认识策略 / 任务 / 缓存
/// - 不处理业务流程
pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    /// 创建新的 JS 执行器
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// 获取 page 的引用（用于导航等操作）
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 执行 JS 代码并返回 JSON 结果
    ///
    /// JS 侧的 null / undefined 统一映射为 JSON Null，不视为错误。
    pub async fn eval(&self, js_code: impl Into<String>) -> Result<JsonValue> {
        let result = self.page.evaluate(js_code.into()).await?;
        let json_value = result.into_value().unwrap_or(JsonValue::Null);
        Ok(json_value)
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> Result<T> {
        let json_value = self.eval(js_code).await?;
        let typed_value = serde_json::from_value(json_value)?;
        Ok(typed_value)
    }

    /// 执行 JS 代码并取布尔结果（非布尔值按 falsy 处理）
    pub async fn eval_bool(&self, js_code: impl Into<String>) -> Result<bool> {
        let value = self.eval(js_code).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    /// 执行 JS 代码并取字符串结果（null / 非字符串返回 None）
    pub async fn eval_string(&self, js_code: impl Into<String>) -> Result<Option<String>> {
        let value = self.eval(js_code).await?;
        Ok(value.as_str().map(|s| s.to_string()))
    }

    /// 轮询执行 JS 谓词，直到返回 true 或超时
    ///
    /// 谓词必须是一段求值为布尔的表达式。轮询间隔 200ms。
    pub async fn wait_for(
        &self,
        predicate_js: &str,
        description: &str,
        timeout_ms: u64,
    ) -> Result<()> {
        const POLL_INTERVAL_MS: u64 = 200;
        let mut elapsed = 0u64;
        loop {
            if self.eval_bool(predicate_js).await.unwrap_or(false) {
                return Ok(());
            }
            if elapsed >= timeout_ms {
                return Err(AppError::Page(PageError::ElementWaitTimeout {
                    selector: description.to_string(),
                    timeout_ms,
                })
                .into());
            }
            sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
            elapsed += POLL_INTERVAL_MS;
        }
    }

    /// 同 wait_for，但超时只返回 false 而不报错
    pub async fn wait_for_quiet(&self, predicate_js: &str, timeout_ms: u64) -> bool {
        const POLL_INTERVAL_MS: u64 = 200;
        let mut elapsed = 0u64;
        loop {
            if self.eval_bool(predicate_js).await.unwrap_or(false) {
                return true;
            }
            if elapsed >= timeout_ms {
                return false;
            }
            sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
            elapsed += POLL_INTERVAL_MS;
        }
    }
}
