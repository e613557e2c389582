use crate::error::Result;
use crate::host::CommandRunner;
use clap::ValueEnum;
use std::future::Future;
use tracing::{debug, info};

/// 打开单个 TCP 端口的能力（可重复调用）
pub trait PortOpener {
    fn open(&self, port: u16) -> impl Future<Output = Result<()>>;
}

/// 防火墙后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FirewallBackend {
    Ufw,
    Iptables,
    Firewalld,
    /// 不操作防火墙（端口已全开或由云安全组管理）
    None,
}

pub struct Firewall {
    backend: FirewallBackend,
    runner: CommandRunner,
}

impl Firewall {
    pub fn new(backend: FirewallBackend, runner: CommandRunner) -> Self {
        Self { backend, runner }
    }

    async fn open_port(&self, port: u16) -> Result<()> {
        let port_str = port.to_string();
        match self.backend {
            FirewallBackend::Ufw => {
                let rule = format!("{}/tcp", port);
                self.runner.run("ufw", &["allow", rule.as_str()]).await?;
            }
            FirewallBackend::Iptables => {
                let rule = ["INPUT", "-p", "tcp", "--dport", port_str.as_str(), "-j", "ACCEPT"];
                let mut check = vec!["-C"];
                check.extend_from_slice(&rule);
                // 规则已存在则跳过，避免重复插入
                if self.runner.succeeds("iptables", &check).await {
                    debug!("iptables rule for {} already present", port);
                    return Ok(());
                }
                let mut insert = vec!["-I"];
                insert.extend_from_slice(&rule);
                self.runner.run("iptables", &insert).await?;
            }
            FirewallBackend::Firewalld => {
                let arg = format!("--add-port={}/tcp", port);
                self.runner.run("firewall-cmd", &[arg.as_str()]).await?;
            }
            FirewallBackend::None => {
                debug!("Firewall backend disabled, not opening {}", port);
                return Ok(());
            }
        }
        info!("🔓 Opened TCP port {} ({:?})", port, self.backend);
        Ok(())
    }
}

impl PortOpener for Firewall {
    async fn open(&self, port: u16) -> Result<()> {
        self.open_port(port).await
    }
}
