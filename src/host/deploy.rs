use crate::error::{GuardError, Result};
use crate::host::CommandRunner;
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::info;

/// 重启代理服务使新配置生效的能力
pub trait ServiceRestarter {
    fn restart(&self) -> impl Future<Output = Result<()>>;
}

/// 由 docker compose 管理的代理服务
pub struct ComposeService {
    runner: CommandRunner,
    compose_file: PathBuf,
}

impl ComposeService {
    pub fn new(runner: CommandRunner, compose_file: PathBuf) -> Self {
        Self {
            runner,
            compose_file,
        }
    }
}

impl ServiceRestarter for ComposeService {
    async fn restart(&self) -> Result<()> {
        restart_service(&self.runner, &self.compose_file).await
    }
}

/// 将提交后的配置复制到代理服务读取的系统路径
pub async fn deploy_config(source: &Path, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| GuardError::ConfigWrite {
                path: parent.to_path_buf(),
                source,
            })?;
    }

    tokio::fs::copy(source, target)
        .await
        .map_err(|source| GuardError::ConfigWrite {
            path: target.to_path_buf(),
            source,
        })?;

    info!("📋 Copied {:?} -> {:?}", source, target);
    Ok(())
}

/// 通过 docker compose 重建代理服务，使新配置生效
pub async fn restart_service(runner: &CommandRunner, compose_file: &Path) -> Result<()> {
    let compose = compose_file
        .to_str()
        .ok_or_else(|| GuardError::Config(format!("Invalid compose path: {:?}", compose_file)))?;

    if !compose_file.exists() {
        return Err(GuardError::Config(format!(
            "Compose file not found: {:?}",
            compose_file
        )));
    }

    runner
        .run("docker", &["compose", "-f", compose, "up", "-d", "--force-recreate"])
        .await?;

    info!("🐳 Service restarted from {}", compose);
    Ok(())
}
