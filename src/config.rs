use serde::Deserialize;
use std::path::Path;
use tracing::warn;

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 浏览器调试端口
    pub browser_debug_port: u16,
    /// 登录页面URL
    pub login_url: String,
    /// 答案缓存文件路径
    pub cache_file_path: String,
    /// 输出日志文件
    pub output_log_file: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    // --- 账号 ---
    pub username: String,
    pub password: String,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    // --- 本地语音引擎 ---
    pub piper_exe_path: String,
    pub piper_model_path: String,
    pub whisper_cli_path: String,
    pub whisper_model: String,
    // --- 运行模式 ---
    /// 全自动模式：跳过 Prompt 预览
    pub auto_mode: bool,
    /// 全自动模式下连确认提示也跳过
    pub auto_mode_no_confirm: bool,
    /// 强制忽略缓存，总是调用 AI
    pub force_ai: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browser_debug_port: 9222,
            login_url: "https://ucloud.unipus.cn/home".to_string(),
            cache_file_path: "answer_cache.json".to_string(),
            output_log_file: "output.txt".to_string(),
            verbose_logging: false,
            username: String::new(),
            password: String::new(),
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.deepseek.com/v1".to_string(),
            llm_model_name: "deepseek-chat".to_string(),
            piper_exe_path: "piper".to_string(),
            piper_model_path: ".models/en_US-libritts_r-medium.onnx".to_string(),
            whisper_cli_path: "whisper".to_string(),
            whisper_model: "base".to_string(),
            auto_mode: false,
            auto_mode_no_confirm: false,
            force_ai: false,
        }
    }
}

/// config.toml 的可选覆盖层，所有字段都可缺省
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    browser_debug_port: Option<u16>,
    login_url: Option<String>,
    cache_file_path: Option<String>,
    output_log_file: Option<String>,
    verbose_logging: Option<bool>,
    username: Option<String>,
    password: Option<String>,
    llm_api_key: Option<String>,
    llm_api_base_url: Option<String>,
    llm_model_name: Option<String>,
    piper_exe_path: Option<String>,
    piper_model_path: Option<String>,
    whisper_cli_path: Option<String>,
    whisper_model: Option<String>,
    auto_mode: Option<bool>,
    auto_mode_no_confirm: Option<bool>,
    force_ai: Option<bool>,
}

impl Config {
    /// 加载配置：默认值 <- config.toml <- 环境变量，后者覆盖前者
    pub fn load() -> Self {
        let mut config = Self::default();
        config.apply_file("config.toml");
        config.apply_env();
        config
    }

    /// 叠加 config.toml（文件缺失或解析失败时保持现状，只告警不中断）
    fn apply_file(&mut self, path: &str) {
        if !Path::new(path).exists() {
            return;
        }
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                warn!("读取配置文件 {} 失败: {}，使用默认配置", path, e);
                return;
            }
        };
        let file: ConfigFile = match toml::from_str(&content) {
            Ok(f) => f,
            Err(e) => {
                warn!("解析配置文件 {} 失败: {}，使用默认配置", path, e);
                return;
            }
        };

        macro_rules! overlay {
            ($($field:ident),* $(,)?) => {
                $(if let Some(v) = file.$field { self.$field = v; })*
            };
        }
        overlay!(
            browser_debug_port,
            login_url,
            cache_file_path,
            output_log_file,
            verbose_logging,
            username,
            password,
            llm_api_key,
            llm_api_base_url,
            llm_model_name,
            piper_exe_path,
            piper_model_path,
            whisper_cli_path,
            whisper_model,
            auto_mode,
            auto_mode_no_confirm,
            force_ai,
        );
    }

    /// 叠加环境变量
    fn apply_env(&mut self) {
        self.browser_debug_port = std::env::var("BROWSER_DEBUG_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(self.browser_debug_port);
        self.login_url = std::env::var("LOGIN_URL").unwrap_or_else(|_| self.login_url.clone());
        self.cache_file_path = std::env::var("CACHE_FILE_PATH").unwrap_or_else(|_| self.cache_file_path.clone());
        self.output_log_file = std::env::var("OUTPUT_LOG_FILE").unwrap_or_else(|_| self.output_log_file.clone());
        self.verbose_logging = std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(self.verbose_logging);
        self.username = std::env::var("U_USERNAME").unwrap_or_else(|_| self.username.clone());
        self.password = std::env::var("U_PASSWORD").unwrap_or_else(|_| self.password.clone());
        self.llm_api_key = std::env::var("LLM_API_KEY").unwrap_or_else(|_| self.llm_api_key.clone());
        self.llm_api_base_url = std::env::var("LLM_API_BASE_URL").unwrap_or_else(|_| self.llm_api_base_url.clone());
        self.llm_model_name = std::env::var("LLM_MODEL_NAME").unwrap_or_else(|_| self.llm_model_name.clone());
        self.piper_exe_path = std::env::var("PIPER_EXE_PATH").unwrap_or_else(|_| self.piper_exe_path.clone());
        self.piper_model_path = std::env::var("PIPER_MODEL_PATH").unwrap_or_else(|_| self.piper_model_path.clone());
        self.whisper_cli_path = std::env::var("WHISPER_CLI_PATH").unwrap_or_else(|_| self.whisper_cli_path.clone());
        self.whisper_model = std::env::var("WHISPER_MODEL").unwrap_or_else(|_| self.whisper_model.clone());
        self.auto_mode = std::env::var("AUTO_MODE").ok().and_then(|v| v.parse().ok()).unwrap_or(self.auto_mode);
        self.auto_mode_no_confirm = std::env::var("AUTO_MODE_NO_CONFIRM").ok().and_then(|v| v.parse().ok()).unwrap_or(self.auto_mode_no_confirm);
        self.force_ai = std::env::var("FORCE_AI").ok().and_then(|v| v.parse().ok()).unwrap_or(self.force_ai);
    }

    /// 登录所需的配置是否齐全
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty() && !self.llm_api_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.cache_file_path, "answer_cache.json");
        assert!(!config.auto_mode);
        assert!(!config.has_credentials());
    }

    #[test]
    fn test_file_overlay_partial() {
        let mut config = Config::default();
        let file: ConfigFile = toml::from_str(
            r#"
            username = "stu001"
            password = "secret"
            auto_mode = true
            "#,
        )
        .unwrap();
        if let Some(v) = file.username {
            config.username = v;
        }
        if let Some(v) = file.password {
            config.password = v;
        }
        if let Some(v) = file.auto_mode {
            config.auto_mode = v;
        }
        assert_eq!(config.username, "stu001");
        assert!(config.auto_mode);
        // 未覆盖的字段保持默认
        assert_eq!(config.llm_model_name, "deepseek-chat");
    }
}
