//! 公网 IP 查询 - 按顺序尝试多个纯文本 IP 服务，第一个成功即返回

use crate::error::{GuardError, Result};
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 默认查询服务（按优先级）
pub const DEFAULT_IP_ENDPOINTS: &[&str] = &[
    "http://ip.me",
    "http://ifconfig.me",
    "http://icanhazip.com",
    "http://ipinfo.io/ip",
];

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

// 部分服务按 UA 区分浏览器/命令行，伪装成 curl 拿到纯文本
const USER_AGENT: &str = "curl/8.5.0";

pub struct IpResolver {
    endpoints: Vec<String>,
    client: reqwest::Client,
}

impl IpResolver {
    pub fn new() -> Result<Self> {
        Self::with_endpoints(DEFAULT_IP_ENDPOINTS.iter().map(|s| s.to_string()).collect())
    }

    pub fn with_endpoints(endpoints: Vec<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { endpoints, client })
    }

    /// 返回第一个成功响应的公网 IP；全部失败时返回 `GuardError::IpResolution`
    pub async fn resolve_public_ip(&self) -> Result<IpAddr> {
        for url in &self.endpoints {
            match self.query(url).await {
                Ok(ip) => {
                    info!("🌍 Public IP: {} (via {})", ip, url);
                    return Ok(ip);
                }
                Err(e) => warn!("Failed to retrieve IP from {}: {}", url, e),
            }
        }

        Err(GuardError::IpResolution(self.endpoints.len()))
    }

    async fn query(&self, url: &str) -> Result<IpAddr> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(GuardError::HttpStatus(status.as_u16()));
        }

        let body = response.text().await?;
        let text = body.trim();
        debug!("{} answered {:?}", url, text);

        // 非 IP 内容（如 HTML 页面）视为该服务失败
        text.parse::<IpAddr>()
            .map_err(|_| GuardError::Parse(format!("Not an IP address: {:?}", truncate(text, 64))))
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
