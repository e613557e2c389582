use crate::error::Result;
use crate::host::CommandRunner;
use tracing::info;

const SYSCTL_SETTINGS: &[&str] = &[
    "net.core.default_qdisc=fq",
    "net.ipv4.tcp_congestion_control=bbr",
];

/// 开启 BBR 拥塞控制（sysctl -w 可重复执行）
pub async fn enable_bbr(runner: &CommandRunner) -> Result<()> {
    for setting in SYSCTL_SETTINGS.iter().copied() {
        runner.run("sysctl", &["-w", setting]).await?;
    }

    let current = runner
        .run("sysctl", &["-n", "net.ipv4.tcp_congestion_control"])
        .await?;
    info!("   tcp_congestion_control = {}", current.trim());
    Ok(())
}
