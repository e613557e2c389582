//! 无头浏览器探测 - 打开 tcp.ping.pe 页面，等待前端完成多地区探测后取回渲染结果

use crate::error::{GuardError, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures_util::StreamExt;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// 默认探测站点
pub const DEFAULT_PROBE_URL: &str = "https://tcp.ping.pe";

/// 页面加载后由前端异步发起探测，固定等待这么久再抓取 DOM
pub const RENDER_SETTLE_DELAY: Duration = Duration::from_secs(10);

/// 单个 CDP 请求（含导航）的超时
const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// 获取某个 ip:port 的探测页面渲染结果
///
/// 返回错误表示探测本身失败，调用方不能把它当作"不可达"
pub trait Prober {
    fn probe(&self, ip: IpAddr, port: u16) -> impl Future<Output = Result<String>>;
}

/// 拼接探测地址，IPv6 自动加方括号
pub fn probe_url(base: &str, ip: IpAddr, port: u16) -> String {
    format!("{}/{}", base.trim_end_matches('/'), SocketAddr::new(ip, port))
}

pub struct BrowserProber {
    base_url: String,
    chromium_path: Option<PathBuf>,
}

impl BrowserProber {
    pub fn new(base_url: impl Into<String>, chromium_path: Option<PathBuf>) -> Self {
        Self {
            base_url: base_url.into(),
            chromium_path,
        }
    }
}

impl Prober for BrowserProber {
    async fn probe(&self, ip: IpAddr, port: u16) -> Result<String> {
        let url = probe_url(&self.base_url, ip, port);
        info!("🔎 Probing {}", url);

        let session = BrowserSession::launch(self.chromium_path.as_deref()).await?;
        // 无论渲染成功与否都要关闭浏览器，避免每次失败泄漏一个 Chromium 进程
        let outcome = session.render(&url, RENDER_SETTLE_DELAY).await;
        session.shutdown().await;

        let html = outcome?;
        debug!("Captured {} bytes of markup", html.len());
        Ok(html)
    }
}

/// 一次性的浏览器会话（独立的临时 profile）
struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    _profile: TempProfileDir,
}

impl BrowserSession {
    async fn launch(chromium_path: Option<&Path>) -> Result<Self> {
        let profile = TempProfileDir::new()?;

        let mut builder = BrowserConfig::builder()
            .new_headless_mode()
            .no_sandbox()
            .user_data_dir(&profile.path)
            .request_timeout(NAVIGATION_TIMEOUT)
            .args(vec!["--disable-gpu", "--no-first-run", "--no-default-browser-check"]);
        if let Some(path) = chromium_path {
            builder = builder.chrome_executable(path);
        }
        let config = builder
            .build()
            .map_err(|e| GuardError::Browser(format!("Failed to configure chromium: {}", e)))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| GuardError::Browser(format!("Failed to launch chromium: {}", e)))?;

        // CDP 事件循环必须持续驱动，否则页面操作会卡住
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler: {}", e);
                }
            }
        });

        Ok(Self {
            browser,
            handler,
            _profile: profile,
        })
    }

    async fn render(&self, url: &str, settle: Duration) -> Result<String> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| GuardError::Browser(format!("Failed to create page: {}", e)))?;

        page.goto(url)
            .await
            .map_err(|e| GuardError::Browser(format!("Navigation to {} failed: {}", url, e)))?;

        // TODO: 改为轮询 tcp-CN 结果单元格全部出现后再抓取，替代固定等待
        tokio::time::sleep(settle).await;

        page.content()
            .await
            .map_err(|e| GuardError::Browser(format!("Failed to read page content: {}", e)))
    }

    async fn shutdown(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Failed to close browser cleanly: {}", e);
            if let Some(Err(e)) = self.browser.kill().await {
                warn!("Failed to kill browser: {}", e);
            }
        }
        if let Err(e) = self.browser.wait().await {
            warn!("Failed to reap browser process: {}", e);
        }
        self.handler.abort();
    }
}

/// 浏览器临时 profile 目录，drop 时删除
struct TempProfileDir {
    path: PathBuf,
}

impl TempProfileDir {
    fn new() -> Result<Self> {
        let base = std::env::temp_dir();
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let pid = std::process::id();

        for attempt in 0..10 {
            let path = base.join(format!("cn-port-guard-{}-{}-{}", pid, timestamp, attempt));
            if std::fs::create_dir(&path).is_ok() {
                return Ok(Self { path });
            }
        }

        Err(GuardError::Browser(
            "Failed to create temporary browser profile directory".to_string(),
        ))
    }
}

impl Drop for TempProfileDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_url_ipv4() {
        let ip: IpAddr = "203.0.113.7".parse().unwrap();
        assert_eq!(
            probe_url(DEFAULT_PROBE_URL, ip, 63042),
            "https://tcp.ping.pe/203.0.113.7:63042"
        );
    }

    #[test]
    fn test_probe_url_ipv6_and_trailing_slash() {
        let ip: IpAddr = "2001:db8::1".parse().unwrap();
        assert_eq!(
            probe_url("https://tcp.ping.pe/", ip, 63000),
            "https://tcp.ping.pe/[2001:db8::1]:63000"
        );
    }

    #[test]
    fn test_temp_profile_removed_on_drop() {
        let profile = TempProfileDir::new().unwrap();
        let path = profile.path.clone();
        assert!(path.is_dir());
        drop(profile);
        assert!(!path.exists());
    }

    /// 需要本机 Chromium，设置 CN_PORT_GUARD_TEST_CHROMIUM 后才运行
    #[tokio::test]
    async fn test_render_local_page() {
        let Some(chromium) = std::env::var_os("CN_PORT_GUARD_TEST_CHROMIUM") else {
            return;
        };

        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "text/html; charset=utf-8")
                    .set_body_string(
                        r#"<html><body><table id="t"></table><script>
                        document.getElementById("t").innerHTML =
                          '<tr id="ping-tcp-CN-1"><td id="tcp-CN-1-result">successful</td></tr>';
                        </script></body></html>"#,
                    ),
            )
            .mount(&server)
            .await;

        let session = BrowserSession::launch(Some(Path::new(&chromium))).await.unwrap();
        let outcome = session.render(&server.uri(), Duration::from_millis(500)).await;
        session.shutdown().await;

        let html = outcome.unwrap();
        assert!(html.contains("tcp-CN-1-result"));
    }
}
