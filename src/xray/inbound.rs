//! 代理服务配置 - 只改写 inbounds 中已有的 port 字段，其余内容原样保留

use crate::error::{GuardError, Result};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const INBOUNDS_KEY: &str = "inbounds";
const PORT_KEY: &str = "port";

/// 把所有带 port 字段的入站记录改为 `new_port`，返回修改的记录数
///
/// 没有 port 字段的记录保持不变，不会新增字段；重复调用结果相同
pub fn set_inbound_port(document: &mut Value, new_port: u16) -> usize {
    let Some(inbounds) = document.get_mut(INBOUNDS_KEY).and_then(Value::as_array_mut) else {
        warn!("Config has no '{}' list, nothing to update", INBOUNDS_KEY);
        return 0;
    };

    let mut updated = 0;
    for inbound in inbounds.iter_mut() {
        if let Some(port) = inbound.as_object_mut().and_then(|obj| obj.get_mut(PORT_KEY)) {
            *port = Value::from(new_port);
            updated += 1;
        }
    }
    updated
}

/// 一次 读取-修改-保存 事务持有的配置文档
pub struct InboundConfig {
    path: PathBuf,
    document: Value,
}

impl InboundConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let raw = std::fs::read_to_string(&path)?;
        let document: Value = serde_json::from_str(&raw)
            .map_err(|e| GuardError::Config(format!("{:?} is not valid JSON: {}", path, e)))?;
        if !document.is_object() {
            return Err(GuardError::Config(format!("{:?} is not a JSON object", path)));
        }
        Ok(Self { path, document })
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn set_port(&mut self, new_port: u16) -> usize {
        set_inbound_port(&mut self.document, new_port)
    }

    /// 写回文件（4 空格缩进）
    ///
    /// 先写同目录下的临时文件再原子替换，保留原文件权限；失败时原文件不受影响
    pub fn save(&self) -> Result<()> {
        let write_err = |source: std::io::Error| GuardError::ConfigWrite {
            path: self.path.clone(),
            source,
        };

        let mut buf = Vec::new();
        let mut ser =
            serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
        self.document
            .serialize(&mut ser)
            .map_err(|e| write_err(std::io::Error::other(e)))?;
        buf.push(b'\n');

        let parent = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };

        let mut tmp = tempfile::Builder::new()
            .prefix(".cn-port-guard-")
            .suffix(".tmp")
            .tempfile_in(parent)
            .map_err(write_err)?;

        // 配置里有客户端凭据，不能因为重写而放宽权限
        if let Ok(meta) = std::fs::metadata(&self.path) {
            tmp.as_file()
                .set_permissions(meta.permissions())
                .map_err(write_err)?;
        }

        tmp.write_all(&buf).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;
        Ok(())
    }
}

/// 更新配置文件中的入站端口并保存，返回更新后的文档
pub fn update_inbound_port(path: impl AsRef<Path>, new_port: u16) -> Result<Value> {
    let mut config = InboundConfig::load(path)?;
    let updated = config.set_port(new_port);
    config.save()?;
    info!("📝 Set port {} on {} inbound(s) in {:?}", new_port, updated, config.path);
    Ok(config.document)
}
