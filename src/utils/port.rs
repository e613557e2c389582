//! 端口工具模块 - 候选端口范围与随机抽取

use crate::error::{GuardError, Result};
use rand::Rng;

/// 默认候选端口下限
pub const DEFAULT_PORT_MIN: u16 = 63000;
/// 默认候选端口上限（含）
pub const DEFAULT_PORT_MAX: u16 = 63999;

/// 候选端口范围（闭区间）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    start: u16,
    end: u16,
}

impl PortRange {
    pub fn new(start: u16, end: u16) -> Result<Self> {
        if start == 0 || start > end {
            return Err(GuardError::InvalidPortRange(start, end));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> u16 {
        self.start
    }

    pub fn end(&self) -> u16 {
        self.end
    }

    pub fn contains(&self, port: u16) -> bool {
        (self.start..=self.end).contains(&port)
    }

    /// 均匀随机抽取一个端口，不记录历史（允许重复）
    pub fn draw<R: Rng>(&self, rng: &mut R) -> u16 {
        rng.gen_range(self.start..=self.end)
    }
}

impl Default for PortRange {
    fn default() -> Self {
        Self {
            start: DEFAULT_PORT_MIN,
            end: DEFAULT_PORT_MAX,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_default_range() {
        let range = PortRange::default();
        assert_eq!(range.start(), 63000);
        assert_eq!(range.end(), 63999);
    }

    #[test]
    fn test_draw_stays_in_range() {
        let range = PortRange::default();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let port = range.draw(&mut rng);
            assert!(range.contains(port), "port {} out of range", port);
        }
    }

    #[test]
    fn test_single_port_range() {
        let range = PortRange::new(63042, 63042).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(range.draw(&mut rng), 63042);
    }

    #[test]
    fn test_invalid_range() {
        assert!(matches!(
            PortRange::new(64000, 63000),
            Err(GuardError::InvalidPortRange(64000, 63000))
        ));
        assert!(PortRange::new(0, 10).is_err());
    }
}
