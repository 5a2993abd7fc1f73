//! AI 网关 - 业务能力层
//!
//! 封装三类模型交互：聊天补全（结构化答案）、媒体转写、语音合成。
//! 核心流程只依赖这三个方法的签名，不关心引擎细节。
//!
//! ## 技术栈
//! - `async-openai` 调用兼容 OpenAI API 的聊天服务（JSON 模式）
//! - `reqwest` 下载媒体文件，本地 whisper CLI 转写
//! - 本地 piper 可执行文件做 TTS，参数由重试阶梯提供

use anyhow::Result;
use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs, ResponseFormat,
    },
    Client,
};
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::ai::prompts;
use crate::config::Config;
use crate::error::{AiError, AppError};
use crate::scoring::SynthProfile;
use crate::utils::text::clean_for_tts;

/// 下载媒体文件时伪装的 UA，部分 CDN 会拒绝空 UA 请求
const MEDIA_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// AI 网关
///
/// 职责：
/// - 提供 get_structured_answer / transcribe / synthesize_speech 三个能力
/// - 只处理单次调用，不出现任务/页面概念
/// - 不关心流程顺序
pub struct AiGateway {
    client: Client<OpenAIConfig>,
    model_name: String,
    http: reqwest::Client,
    whisper_cli: String,
    whisper_model: String,
    piper_exe: String,
    piper_model: String,
}

impl AiGateway {
    /// 创建新的 AI 网关
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);
        let client = Client::with_config(openai_config);

        Self {
            client,
            model_name: config.llm_model_name.clone(),
            http: reqwest::Client::new(),
            whisper_cli: config.whisper_cli_path.clone(),
            whisper_model: config.whisper_model.clone(),
            piper_exe: config.piper_exe_path.clone(),
            piper_model: config.piper_model_path.clone(),
        }
    }

    // ========== 聊天补全 ==========

    /// 调用聊天模型获取结构化答案（JSON 模式）
    ///
    /// 返回解析好的 JSON 对象；内容为空或无法解析时报
    /// `AiError::MalformedResponse`，调用方按"中止当前任务"处理。
    pub async fn get_structured_answer(&self, prompt: &str) -> Result<JsonValue> {
        info!("正在请求 AI 获取答案 (JSON模式)...");
        debug!("Prompt 长度: {} 字符", prompt.len());

        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(prompts::SYSTEM_PROMPT)
            .build()?;
        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(vec![
                ChatCompletionRequestMessage::System(system_msg),
                ChatCompletionRequestMessage::User(user_msg),
            ])
            .temperature(0.2)
            .response_format(ResponseFormat::JsonObject)
            .build()?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| AppError::ai_api_failed(&self.model_name, e))?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| {
                AppError::Ai(AiError::EmptyContent {
                    model: self.model_name.clone(),
                })
            })?;

        let json_data: JsonValue = serde_json::from_str(content.trim()).map_err(|e| {
            warn!("解析AI返回的JSON时失败: {}", e);
            warn!("尝试解析的字符串: {}", content);
            AppError::Ai(AiError::MalformedResponse {
                detail: e.to_string(),
            })
        })?;

        info!("已收到并解析 AI 的回复。");
        Ok(json_data)
    }

    // ========== 媒体转写 ==========

    /// 从 URL 下载媒体文件（音频或视频）并转写为文字
    pub async fn transcribe(&self, media_url: &str) -> Result<String> {
        info!("正在从URL下载媒体文件: {}", media_url);

        let response = self
            .http
            .get(media_url)
            .header(reqwest::header::USER_AGENT, MEDIA_UA)
            .send()
            .await
            .map_err(|e| {
                AppError::Ai(AiError::TranscriptionFailed {
                    reason: format!("下载媒体失败: {}", e),
                })
            })?;
        if !response.status().is_success() {
            return Err(AppError::Ai(AiError::TranscriptionFailed {
                reason: format!("下载媒体返回状态 {}", response.status()),
            })
            .into());
        }

        let suffix = media_suffix(media_url, response.headers());
        let bytes = response.bytes().await.map_err(|e| {
            AppError::Ai(AiError::TranscriptionFailed {
                reason: format!("读取媒体内容失败: {}", e),
            })
        })?;

        let temp_dir = std::env::temp_dir();
        let media_path = temp_dir.join(format!("{}{}", next_temp_name("media"), suffix));
        tokio::fs::write(&media_path, &bytes).await?;
        debug!("媒体文件已临时保存至: {}", media_path.display());

        let result = self.transcribe_file(&media_path, &temp_dir).await;

        if let Err(e) = tokio::fs::remove_file(&media_path).await {
            warn!("清理临时媒体文件失败: {}", e);
        }
        result
    }

    /// 用本地 whisper CLI 转写一个媒体文件
    async fn transcribe_file(&self, media_path: &Path, out_dir: &Path) -> Result<String> {
        info!("正在进行语音识别: {}", media_path.display());
        let output = Command::new(&self.whisper_cli)
            .arg(media_path)
            .args(["--model", &self.whisper_model])
            .args(["--output_format", "txt"])
            .arg("--output_dir")
            .arg(out_dir)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                AppError::Ai(AiError::TranscriptionFailed {
                    reason: format!("无法启动 whisper: {}", e),
                })
            })?;

        if !output.status.success() {
            return Err(AppError::Ai(AiError::TranscriptionFailed {
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
            .into());
        }

        // whisper 按输入文件名生成同名 .txt
        let transcript_path = transcript_output_path(media_path, out_dir);
        let text = tokio::fs::read_to_string(&transcript_path)
            .await
            .map_err(|e| {
                AppError::Ai(AiError::TranscriptionFailed {
                    reason: format!("读取转写结果失败: {}", e),
                })
            })?;
        if let Err(e) = tokio::fs::remove_file(&transcript_path).await {
            warn!("清理转写结果文件失败: {}", e);
        }

        info!("语音识别完成。");
        Ok(text.trim().to_string())
    }

    // ========== 语音合成 ==========

    /// 用本地 piper 引擎把文本合成为 WAV 音频
    pub async fn synthesize_speech(
        &self,
        text: &str,
        profile: &SynthProfile,
    ) -> Result<Vec<u8>> {
        let clean_text = clean_for_tts(text);
        if clean_text.is_empty() {
            return Err(AppError::Ai(AiError::SynthesisFailed {
                reason: format!(
                    "原始文本 '{}' 净化后为空",
                    crate::utils::logging::truncate_text(text, 30)
                ),
            })
            .into());
        }

        let output_path = std::env::temp_dir().join(format!("{}.wav", next_temp_name("piper")));
        debug!(
            "正在使用 Piper TTS 合成语音 (语速: {}, noise_scale: {}, noise_w: {}): '{}'",
            profile.length_scale,
            profile.noise_scale,
            profile.noise_w,
            crate::utils::logging::truncate_text(&clean_text, 30)
        );

        let result = self
            .run_piper(&clean_text, profile, &output_path)
            .await;

        let audio = match result {
            Ok(()) => tokio::fs::read(&output_path).await.map_err(|e| {
                AppError::Ai(AiError::SynthesisFailed {
                    reason: format!("读取合成结果失败: {}", e),
                })
            }),
            Err(e) => Err(e),
        };

        // 无论成败都删掉临时文件
        if output_path.exists() {
            if let Err(e) = tokio::fs::remove_file(&output_path).await {
                warn!("清理TTS临时文件失败: {}", e);
            }
        }

        let audio = audio?;
        debug!("Piper TTS 语音合成成功，返回 {} 字节数据。", audio.len());
        Ok(audio)
    }

    async fn run_piper(
        &self,
        clean_text: &str,
        profile: &SynthProfile,
        output_path: &Path,
    ) -> Result<(), AppError> {
        let mut child = Command::new(&self.piper_exe)
            .args(["--model", &self.piper_model])
            .arg("--output_file")
            .arg(output_path)
            .args(["--length_scale", &profile.length_scale.to_string()])
            .args(["--noise_scale", &profile.noise_scale.to_string()])
            .args(["--noise_w", &profile.noise_w.to_string()])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                AppError::Ai(AiError::SynthesisFailed {
                    reason: format!("无法启动 piper: {}", e),
                })
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(clean_text.as_bytes())
                .await
                .map_err(|e| {
                    AppError::Ai(AiError::SynthesisFailed {
                        reason: format!("写入 piper stdin 失败: {}", e),
                    })
                })?;
            // drop 关闭 stdin，piper 才会开始合成
        }

        let output = child.wait_with_output().await.map_err(|e| {
            AppError::Ai(AiError::SynthesisFailed {
                reason: format!("等待 piper 退出失败: {}", e),
            })
        })?;

        if !output.status.success() {
            return Err(AppError::Ai(AiError::SynthesisFailed {
                reason: format!(
                    "Piper执行失败: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            }));
        }
        Ok(())
    }
}

/// 为临时文件生成进程内唯一的名字
fn next_temp_name(prefix: &str) -> String {
    let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{}_{}_{}", prefix, std::process::id(), n)
}

/// 根据 URL 路径或 Content-Type 推断媒体文件后缀
fn media_suffix(url: &str, headers: &reqwest::header::HeaderMap) -> String {
    // 去掉查询参数和 fragment 再取后缀
    let path_part = url.split('?').next().unwrap_or(url);
    let path_part = path_part.split('#').next().unwrap_or(path_part);
    if let Some(idx) = path_part.rfind('.') {
        let ext = &path_part[idx..];
        if ext.len() <= 5 && !ext.contains('/') {
            return ext.to_string();
        }
    }
    let content_type = headers
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if content_type.contains("video") {
        ".mp4".to_string()
    } else if content_type.contains("audio") {
        ".mp3".to_string()
    } else {
        ".tmp".to_string()
    }
}

/// whisper 输出文件路径：输入文件名去后缀加 .txt
fn transcript_output_path(media_path: &Path, out_dir: &Path) -> PathBuf {
    let stem = media_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    out_dir.join(format!("{}.txt", stem))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_suffix_from_url() {
        let headers = reqwest::header::HeaderMap::new();
        assert_eq!(media_suffix("https://cdn/x/y.mp3?sign=abc", &headers), ".mp3");
        assert_eq!(media_suffix("https://cdn/x/clip.mp4#t=3", &headers), ".mp4");
    }

    #[test]
    fn test_media_suffix_from_content_type() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            "audio/mpeg".parse().unwrap(),
        );
        assert_eq!(media_suffix("https://cdn/stream", &headers), ".mp3");

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            "video/mp4".parse().unwrap(),
        );
        assert_eq!(media_suffix("https://cdn/stream", &headers), ".mp4");
    }

    #[test]
    fn test_transcript_output_path() {
        let p = transcript_output_path(Path::new("/tmp/media_1_2.mp3"), Path::new("/tmp"));
        assert_eq!(p, PathBuf::from("/tmp/media_1_2.txt"));
    }

    #[test]
    fn test_next_temp_name_unique() {
        let a = next_temp_name("x");
        let b = next_temp_name("x");
        assert_ne!(a, b);
    }
}
