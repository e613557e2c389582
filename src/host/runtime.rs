//! 浏览器运行时 - 探测页面依赖 Chromium 渲染

use crate::error::{GuardError, Result};
use crate::host::CommandRunner;
use std::path::{Path, PathBuf};
use tracing::info;

const CHROMIUM_CANDIDATES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
];

const CHROMIUM_FIXED_PATHS: &[&str] = &[
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    "/usr/bin/google-chrome",
];

/// 在 PATH 和常见安装位置中查找 Chromium
pub fn find_chromium() -> Option<PathBuf> {
    if let Some(path) = find_on_path(CHROMIUM_CANDIDATES) {
        return Some(path);
    }

    CHROMIUM_FIXED_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

fn find_on_path(candidates: &[&str]) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        for candidate in candidates {
            let full = dir.join(candidate);
            if full.is_file() {
                return Some(full);
            }
        }
    }
    None
}

/// 确保浏览器可用，找不到时通过 apt 安装
///
/// 任一步骤失败都会中止后续流程
pub async fn ensure_browser(
    runner: &CommandRunner,
    explicit: Option<&Path>,
    allow_install: bool,
) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(GuardError::Browser(format!(
            "Chromium not found at {:?}",
            path
        )));
    }

    if let Some(path) = find_chromium() {
        info!("   Chromium: {:?}", path);
        return Ok(path);
    }

    if !allow_install {
        return Err(GuardError::Browser(
            "Chromium not found and installation is disabled".to_string(),
        ));
    }

    info!("📦 Chromium not found, installing...");
    runner.run("apt-get", &["update"]).await?;
    runner.run("apt-get", &["install", "-y", "chromium"]).await?;

    find_chromium().ok_or_else(|| {
        GuardError::Browser("Chromium still missing after installation".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_explicit_missing_path_is_error() {
        let runner = CommandRunner::new();
        let result = ensure_browser(&runner, Some(Path::new("/nonexistent/chromium")), false).await;
        assert!(matches!(result, Err(GuardError::Browser(_))));
    }

    #[tokio::test]
    async fn test_explicit_existing_path_is_used() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let runner = CommandRunner::new();
        let path = ensure_browser(&runner, Some(file.path()), false).await.unwrap();
        assert_eq!(path, file.path());
    }
}
