//! 完整部署流程：BBR -> 浏览器 -> 公网 IP -> 端口搜索 -> 写配置 -> 部署 -> 重启 -> 复查
//!
//! 严格顺序执行，不回滚：复查失败只报告，不撤销已提交的端口

use crate::error::Result;
use crate::host::{
    self, CommandRunner, ComposeService, Firewall, FirewallBackend, PortOpener, ServiceRestarter,
};
use crate::probe::{check_reachability, BrowserProber, Extractor, IpResolver, PingPeExtractor, Prober};
use crate::provision::{PortSearch, SearchPolicy};
use crate::xray::{update_inbound_port, InboundConfig};
use rand::Rng;
use std::net::IpAddr;
use std::path::PathBuf;
use tracing::{error, info, warn};

pub const STEP_BBR: &str = "enable BBR";
pub const STEP_BROWSER: &str = "prepare browser runtime";
pub const STEP_CONFIG_CHECK: &str = "read config";
pub const STEP_PUBLIC_IP: &str = "resolve public IP";
pub const STEP_PORT_SEARCH: &str = "find reachable port";
pub const STEP_COMMIT: &str = "update config";
pub const STEP_DEPLOY: &str = "deploy config";
pub const STEP_RESTART: &str = "restart service";
pub const STEP_CONFIRM: &str = "final connectivity check";

#[derive(Debug, Clone)]
pub struct ProvisionSettings {
    pub config_path: PathBuf,
    pub deploy_path: PathBuf,
    pub compose_file: PathBuf,
    pub policy: SearchPolicy,
    pub firewall: FirewallBackend,
    pub probe_url: String,
    pub chromium_path: Option<PathBuf>,
    pub skip_bbr: bool,
    pub allow_install: bool,
}

/// 流程结果；`confirmed == false` 时端口已提交但部署后复查未通过
#[derive(Debug, Clone)]
pub struct ProvisionReport {
    pub ip: IpAddr,
    pub port: u16,
    pub bbr_enabled: Option<bool>,
    pub confirmed: bool,
}

/// 端口搜索之后各步骤依赖的外部能力
pub struct Collaborators<'a, O, P, E, S> {
    pub opener: &'a O,
    pub prober: &'a P,
    pub extractor: &'a E,
    pub service: &'a S,
}

/// 已写入配置的端口及部署后的复查结论
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Commit {
    pub port: u16,
    pub confirmed: bool,
}

pub async fn run(settings: &ProvisionSettings) -> Result<ProvisionReport> {
    let runner = CommandRunner::new();

    // 1. BBR（失败只打印，不中断）
    let bbr_enabled = if settings.skip_bbr {
        None
    } else {
        match host::enable_bbr(&runner).await {
            Ok(()) => {
                info!("✅ {}: ok", STEP_BBR);
                Some(true)
            }
            Err(e) => {
                error!("❌ {}: failed: {}", STEP_BBR, e);
                Some(false)
            }
        }
    };

    // 2. 浏览器运行时
    let chromium = host::ensure_browser(
        &runner,
        settings.chromium_path.as_deref(),
        settings.allow_install,
    )
    .await
    .map_err(|e| e.at_step(STEP_BROWSER))?;
    info!("✅ {}: {:?}", STEP_BROWSER, chromium);

    // 搜索前先确认配置可读，避免找到端口后才发现无法提交
    InboundConfig::load(&settings.config_path).map_err(|e| e.at_step(STEP_CONFIG_CHECK))?;

    // 3. 公网 IP
    let resolver = IpResolver::new().map_err(|e| e.at_step(STEP_PUBLIC_IP))?;
    let ip = resolver
        .resolve_public_ip()
        .await
        .map_err(|e| e.at_step(STEP_PUBLIC_IP))?;

    let firewall = Firewall::new(settings.firewall, runner.clone());
    let prober = BrowserProber::new(settings.probe_url.clone(), Some(chromium));
    let extractor = PingPeExtractor::new().map_err(|e| e.at_step(STEP_PORT_SEARCH))?;
    let service = ComposeService::new(runner, settings.compose_file.clone());

    let parts = Collaborators {
        opener: &firewall,
        prober: &prober,
        extractor: &extractor,
        service: &service,
    };
    let commit = commit_reachable_port(settings, ip, parts, rand::thread_rng()).await?;

    Ok(ProvisionReport {
        ip,
        port: commit.port,
        bbr_enabled,
        confirmed: commit.confirmed,
    })
}

/// 端口搜索 -> 写配置 -> 部署 -> 重启 -> 复查
///
/// 搜索失败时配置文件和部署路径都不会被触碰
pub async fn commit_reachable_port<O, P, E, S, R>(
    settings: &ProvisionSettings,
    ip: IpAddr,
    parts: Collaborators<'_, O, P, E, S>,
    rng: R,
) -> Result<Commit>
where
    O: PortOpener,
    P: Prober,
    E: Extractor,
    S: ServiceRestarter,
    R: Rng,
{
    // 4. 端口搜索
    let port = PortSearch::new(parts.opener, parts.prober, parts.extractor, rng, settings.policy)
        .provision(ip)
        .await
        .map_err(|e| e.at_step(STEP_PORT_SEARCH))?;

    // 5. 写配置
    update_inbound_port(&settings.config_path, port).map_err(|e| e.at_step(STEP_COMMIT))?;

    // 6. 部署 + 重启
    host::deploy_config(&settings.config_path, &settings.deploy_path)
        .await
        .map_err(|e| e.at_step(STEP_DEPLOY))?;
    parts
        .service
        .restart()
        .await
        .map_err(|e| e.at_step(STEP_RESTART))?;

    // 7. 复查
    let confirmed = match check_reachability(parts.prober, parts.extractor, ip, port).await {
        Ok(reachable) => reachable,
        Err(e) => {
            warn!("{} could not complete: {}", STEP_CONFIRM, e);
            false
        }
    };

    Ok(Commit { port, confirmed })
}
