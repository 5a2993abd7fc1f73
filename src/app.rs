//! 应用编排 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：日志文件、浏览器连接、各服务构建
//! 2. **登录**：填写凭据、勾选协议、处理弹窗
//! 3. **任务发现**：遍历课程单元，收集未完成的必修任务
//! 4. **任务循环**：逐个导航并交给任务控制器处理
//! 5. **会话级错误**：频率限制等致命错误终止整个会话
//! 6. **统计输出**：完成/中止数量

use anyhow::Result;
use chromiumoxide::Browser;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::ai::AiGateway;
use crate::browser;
use crate::cache::AnswerCache;
use crate::config::Config;
use crate::controller::{ChainedTaskController, RunContext, TaskOutcome};
use crate::error::{AppError, ConfigError};
use crate::infrastructure::JsExecutor;
use crate::page::{selectors, PageDriver};
use crate::utils::logging;

/// 一个待完成的必修任务
#[derive(Debug, Clone, Deserialize)]
pub struct PendingTask {
    pub unit_index: String,
    pub unit_name: String,
    pub task_index: usize,
    pub task_name: String,
    #[serde(default)]
    pub course_url: String,
}

/// 处理统计
#[derive(Debug, Default)]
struct RunStats {
    completed: usize,
    aborted: usize,
}

/// 应用主结构
pub struct App {
    config: Config,
    _browser: Browser,
    page: PageDriver,
    ai: AiGateway,
    cache: AnswerCache,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        if !config.has_credentials() {
            return Err(AppError::Config(ConfigError::MissingRequired {
                key: "U_USERNAME / U_PASSWORD / LLM_API_KEY".to_string(),
            })
            .into());
        }

        logging::init_log_file(&config.output_log_file)?;
        log_startup(&config);

        let (browser, page) = browser::connect_to_browser_and_page(
            config.browser_debug_port,
            Some(&config.login_url),
            None,
        )
        .await?;

        let executor = JsExecutor::new(page);
        let page = PageDriver::new(executor);
        let ai = AiGateway::new(&config);
        let cache = AnswerCache::load(&config.cache_file_path);

        Ok(Self {
            config,
            _browser: browser,
            page,
            ai,
            cache,
        })
    }

    /// 运行主流程
    pub async fn run(&mut self) -> Result<()> {
        self.login().await?;

        let course_count = self.course_count().await?;
        if course_count == 0 {
            warn!("⚠️ 未找到任何课程，程序结束。");
            return Ok(());
        }
        info!("✓ 找到 {} 门课程。", course_count);

        let mut stats = RunStats::default();
        let run = RunContext::from_config(&self.config);

        'courses: for course_idx in 0..course_count {
            if let Err(e) = self.enter_course(course_idx).await {
                error!("进入第 {} 门课程失败: {}", course_idx + 1, e);
                continue;
            }

            let tasks = self.collect_pending_tasks().await?;
            info!("待完成任务列表获取完毕，共 {} 个任务。", tasks.len());

            for task in &tasks {
                log_task_start(task);
                if let Err(e) = self.navigate_to_task(task).await {
                    error!("导航到任务 '{}' 失败: {}", task.task_name, e);
                    stats.aborted += 1;
                    continue;
                }

                let mut controller =
                    ChainedTaskController::new(&self.page, &self.ai, &mut self.cache, run);
                match controller.run().await {
                    Ok(TaskOutcome::Completed) => {
                        info!("✅ 任务 '{}' 完成。", task.task_name);
                        stats.completed += 1;
                    }
                    Ok(TaskOutcome::Aborted(kind)) => {
                        warn!("⚠️ 任务 '{}' 中止: {}", task.task_name, kind.describe());
                        stats.aborted += 1;
                    }
                    Err(e) => {
                        stats.aborted += 1;
                        let fatal = e
                            .downcast_ref::<AppError>()
                            .map(|app| app.is_session_fatal())
                            .unwrap_or(false);
                        if fatal {
                            // 频率限制不可本地恢复，终止整个会话
                            error!("❌ 会话级致命错误: {}", e);
                            break 'courses;
                        }
                        error!("任务 '{}' 处理失败: {}", task.task_name, e);
                    }
                }
            }
        }

        log_final_stats(&stats, &self.config);
        Ok(())
    }

    // ========== 登录 ==========

    async fn login(&self) -> Result<()> {
        info!("正在导航到登录页面...");
        self.page.goto(&self.config.login_url).await?;
        self.page.settle(1500).await;

        info!("正在勾选用户协议...");
        self.page
            .click_by_text(selectors::LOGIN_AGREEMENT_TEXT)
            .await?;

        info!("正在输入凭据...");
        self.page
            .fill_by_placeholder(selectors::LOGIN_USERNAME_PLACEHOLDER, &self.config.username)
            .await?;
        self.page
            .fill_by_placeholder(selectors::LOGIN_PASSWORD_PLACEHOLDER, &self.config.password)
            .await?;

        info!("正在点击登录按钮...");
        self.page.click_by_text(selectors::LOGIN_BUTTON_TEXT).await?;
        self.page.settle(2000).await;

        if self
            .page
            .click_by_text(selectors::LOGIN_KNOWN_POPUP_TEXT)
            .await?
        {
            info!("已点击\"知道了\"弹窗。");
        }

        info!("等待主页面加载...");
        if !self.page.click_by_text(selectors::MY_COURSES_TEXT).await? {
            anyhow::bail!("登录后未找到\"我的课程\"按钮，无法继续。");
        }
        self.page.settle(1500).await;
        info!("✓ 登录流程完毕。");
        Ok(())
    }

    // ========== 课程与任务发现 ==========

    async fn course_count(&self) -> Result<usize> {
        self.page.wait_visible_quiet(selectors::COURSE_CARD, 10_000).await;
        self.page.count(selectors::COURSE_CARD).await
    }

    async fn enter_course(&self, index: usize) -> Result<()> {
        info!("正在进入第 {} 门课程...", index + 1);
        if !self.page.click_nth(selectors::COURSE_CARD, index).await? {
            anyhow::bail!("课程卡片 {} 不存在", index);
        }
        self.page.wait_visible(selectors::UNIT_TABS, 10_000).await?;
        info!("✓ 已成功进入课程页面。");
        Ok(())
    }

    /// 遍历课程单元，收集所有未完成的必修任务
    async fn collect_pending_tasks(&self) -> Result<Vec<PendingTask>> {
        info!("正在获取待完成任务列表...");
        let course_url = self.page.current_url().await?;
        let unit_count = self.page.count(selectors::UNIT_TABS).await?;
        let mut pending = Vec::new();

        for unit_idx in 0..unit_count {
            let unit_name = self
                .page
                .text_of_nth(selectors::UNIT_TABS, unit_idx)
                .await?
                .unwrap_or_default()
                .lines()
                .next()
                .unwrap_or_default()
                .to_string();
            if unit_name.contains("Test") {
                info!("检测到测试单元 '{}'，已跳过。", unit_name);
                continue;
            }

            info!("正在检查单元: {}", unit_name);
            self.page.click_nth(selectors::UNIT_TABS, unit_idx).await?;
            self.page.settle(800).await;

            let mut unit_tasks = self.probe_active_unit_tasks().await?;
            for task in &mut unit_tasks {
                task.unit_index = unit_idx.to_string();
                task.unit_name = unit_name.clone();
                task.course_url = course_url.clone();
            }
            pending.extend(unit_tasks);
        }
        Ok(pending)
    }

    /// 在当前激活的单元区域里找"必修"且未"已完成"的任务
    async fn probe_active_unit_tasks(&self) -> Result<Vec<PendingTask>> {
        let js = format!(
            r#"(() => {{
                const area = document.querySelector({area});
                if (!area) return [];
                const out = [];
                area.querySelectorAll({item}).forEach((el, i) => {{
                    const text = el.textContent;
                    if (text.includes('必修') && !text.includes('已完成')) {{
                        const nameEl = el.querySelector({name});
                        out.push({{
                            unit_index: '',
                            unit_name: '',
                            task_index: i,
                            task_name: nameEl ? nameEl.textContent.trim() : text.trim()
                        }});
                    }}
                }});
                return out;
            }})()"#,
            area = serde_json::to_string(selectors::ACTIVE_UNIT_AREA).unwrap_or_default(),
            item = serde_json::to_string(selectors::TASK_ITEM_CONTAINER).unwrap_or_default(),
            name = serde_json::to_string(selectors::TASK_ITEM_TYPE_NAME).unwrap_or_default(),
        );
        let tasks: Vec<PendingTask> = self.page.executor().eval_as(js).await?;
        Ok(tasks)
    }

    /// 导航到指定单元和索引的任务页面
    async fn navigate_to_task(&self, task: &PendingTask) -> Result<()> {
        info!(
            "正在导航到单元 {}，任务索引 {}...",
            task.unit_index, task.task_index
        );
        self.page.goto(&task.course_url).await?;
        self.page.wait_visible(selectors::UNIT_TABS, 10_000).await?;

        let unit_idx: usize = task.unit_index.parse().unwrap_or(0);
        self.page.click_nth(selectors::UNIT_TABS, unit_idx).await?;
        self.page.settle(800).await;

        if !self
            .page
            .click_inner(
                selectors::ACTIVE_UNIT_AREA,
                0,
                selectors::TASK_ITEM_CONTAINER,
                task.task_index,
            )
            .await?
        {
            anyhow::bail!("任务索引 {} 在当前单元中不存在", task.task_index);
        }
        self.page.settle(1500).await;
        self.page.handle_common_popups().await?;
        info!("✓ 已进入任务页面。");
        Ok(())
    }
}

// ========== 日志辅助函数 ==========

fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - U校园自动答题");
    info!(
        "📊 模式: auto={}, force_ai={}",
        config.auto_mode, config.force_ai
    );
    info!("{}", "=".repeat(60));
}

fn log_task_start(task: &PendingTask) {
    info!("\n{}", "=".repeat(60));
    info!(
        "📄 开始处理任务: [{}] {}",
        task.unit_name, task.task_name
    );
    info!("{}", "=".repeat(60));
}

fn log_final_stats(stats: &RunStats, config: &Config) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("✅ 完成: {}", stats.completed);
    info!("⚠️ 中止: {}", stats.aborted);
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", config.output_log_file);
}
