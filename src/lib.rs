//! cn-port-guard: 检测服务器端口在中国大陆是否可达，不可达时自动换端口并写入代理配置

pub mod error;
pub mod host;
pub mod probe;
pub mod provision;
pub mod utils;
pub mod xray;

pub use error::{GuardError, Result};
