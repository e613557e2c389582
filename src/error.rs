use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GuardError {
    #[error("Command error: {0}")]
    Command(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {0}")]
    HttpStatus(u16),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Failed to retrieve public IP from all {0} endpoints")]
    IpResolution(usize),

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("Failed to write config {path:?}: {source}")]
    ConfigWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid port range {0}-{1}")]
    InvalidPortRange(u16, u16),

    #[error("No reachable port found after {0} attempts")]
    RetryBudgetExhausted(u32),

    #[error("Step '{step}' failed: {source}")]
    StepFailed {
        step: &'static str,
        #[source]
        source: Box<GuardError>,
    },
}

impl GuardError {
    /// 标记失败所处的步骤
    pub fn at_step(self, step: &'static str) -> Self {
        GuardError::StepFailed {
            step,
            source: Box::new(self),
        }
    }
}

pub type Result<T> = std::result::Result<T, GuardError>;
