use ucloud_auto_answer::browser::connect_to_browser_and_page;
use ucloud_auto_answer::infrastructure::JsExecutor;
use ucloud_auto_answer::utils::logging;
use ucloud_auto_answer::{
    AnswerCache, ChainedTaskController, Config, PageDriver, RunContext,
};

use ucloud_auto_answer::ai::AiGateway;

#[tokio::test]
#[ignore] // 默认忽略，需要手动运行：cargo test -- --ignored
async fn test_browser_connection() {
    // 初始化日志
    logging::init();

    // 加载配置
    let config = Config::load();

    // 测试浏览器连接
    let result =
        connect_to_browser_and_page(config.browser_debug_port, Some(&config.login_url), None)
            .await;

    assert!(result.is_ok(), "应该能够成功连接浏览器");
}

#[tokio::test]
#[ignore]
async fn test_read_breadcrumb_on_task_page() {
    logging::init();
    let config = Config::load();

    // 注意：运行前请先手动打开一个任务页面
    let (_browser, page) =
        connect_to_browser_and_page(config.browser_debug_port, None, Some("U校园"))
            .await
            .expect("连接浏览器失败");
    let driver = PageDriver::new(JsExecutor::new(page));

    let parts = driver.breadcrumb_parts().await.expect("提取面包屑失败");
    println!("面包屑: {:?}", parts);
    assert!(!parts.is_empty());
}

#[tokio::test]
#[ignore]
async fn test_solve_current_task_page() {
    logging::init();
    let config = Config::load();

    // 注意：运行前请先手动打开一个任务页面
    let (_browser, page) =
        connect_to_browser_and_page(config.browser_debug_port, None, Some("U校园"))
            .await
            .expect("连接浏览器失败");
    let driver = PageDriver::new(JsExecutor::new(page));
    let ai = AiGateway::new(&config);
    let mut cache = AnswerCache::load(&config.cache_file_path);
    let run = RunContext::from_config(&config);

    let mut controller = ChainedTaskController::new(&driver, &ai, &mut cache, run);
    let outcome = controller.run().await.expect("任务处理失败");
    println!("任务终态: {:?}", outcome);
}
