//! 浏览器连接
//!
//! 通过调试端口附加到一个已启动的浏览器实例（用户自己的登录态
//! 和插件都还在），不另起无头进程。

use anyhow::Result;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, error, info};

/// 连接到浏览器并获取页面
///
/// 若指定了目标标题则复用匹配的已有标签页；否则在指定了 target_url
/// 时新建页面并导航过去；都没有时复用第一个已有页面。
pub async fn connect_to_browser_and_page(
    port: u16,
    target_url: Option<&str>,
    target_title: Option<&str>,
) -> Result<(Browser, Page)> {
    let browser_url = format!("http://localhost:{}", port);
    info!("正在连接到浏览器: {}", browser_url);

    let (browser, mut handler) = Browser::connect(&browser_url).await.map_err(|e| {
        error!("连接浏览器失败: {}", e);
        e
    })?;

    // 在后台处理浏览器事件
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 短暂延迟等待浏览器状态同步
    sleep(tokio::time::Duration::from_millis(300)).await;

    let pages = browser.pages().await?;
    debug!("获取到 {} 个页面", pages.len());

    if let Some(title) = target_title {
        if let Some(page) = find_page_by_title(&pages, title).await {
            return Ok((browser, page));
        }
        debug!("未找到标题包含 '{}' 的页面，将创建新页面", title);
    }

    let page = match target_url {
        Some(url) => {
            debug!("创建新页面并导航到: {}", url);
            let page = browser.new_page("about:blank").await?;
            page.goto(url).await.map_err(|e| {
                error!("导航到 {} 失败: {}", url, e);
                e
            })?;
            page
        }
        None => match pages.into_iter().next() {
            Some(p) => p,
            None => browser.new_page("about:blank").await?,
        },
    };

    info!("✓ 浏览器页面就绪");
    Ok((browser, page))
}

/// 在已打开的标签页里找标题匹配的那个
async fn find_page_by_title(pages: &[Page], title: &str) -> Option<Page> {
    for p in pages {
        if let Ok(Some(page_title)) = p.get_title().await {
            if page_title.contains(title) {
                info!("✓ 找到目标页面: {}", page_title);
                return Some(p.clone());
            }
        }
    }
    None
}
