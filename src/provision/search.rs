//! 端口搜索循环 - 随机选端口、开放、探测，失败则换端口重试，直到成功或用完次数

use crate::error::{GuardError, Result};
use crate::host::PortOpener;
use crate::probe::{decide, Extractor, Prober};
use crate::utils::PortRange;
use rand::Rng;
use std::net::IpAddr;
use tracing::{info, warn};

/// 默认最大尝试次数
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// 搜索策略：候选范围 + 重试预算
#[derive(Debug, Clone, Copy)]
pub struct SearchPolicy {
    pub range: PortRange,
    pub max_attempts: u32,
}

impl Default for SearchPolicy {
    fn default() -> Self {
        Self {
            range: PortRange::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// 单次尝试的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Selecting,
    Opening(u16),
    Probing(u16),
    Deciding(u16),
}

/// 单次尝试的结果
#[derive(Debug)]
enum Outcome {
    Reachable,
    Unreachable,
    Failed(GuardError),
}

/// 搜索状态：已失败次数、当前候选端口与所处阶段
///
/// 候选端口只在一次尝试内有效，失败后即丢弃
#[derive(Debug, Clone)]
pub struct SearchContext {
    failures: u32,
    max_attempts: u32,
    candidate: Option<u16>,
    phase: Phase,
}

impl SearchContext {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            failures: 0,
            max_attempts,
            candidate: None,
            phase: Phase::Selecting,
        }
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn candidate(&self) -> Option<u16> {
        self.candidate
    }

    /// 当前是第几次尝试（从 1 开始）
    pub fn attempt(&self) -> u32 {
        self.failures + 1
    }

    fn select(&mut self, port: u16) {
        self.candidate = Some(port);
        self.phase = Phase::Selecting;
    }

    fn enter(&mut self, phase: Phase) {
        self.phase = phase;
    }

    /// 记录一次失败，丢弃当前候选端口；返回是否还能继续
    fn record_failure(&mut self) -> bool {
        self.failures += 1;
        self.candidate = None;
        self.phase = Phase::Selecting;
        self.failures < self.max_attempts
    }
}

pub struct PortSearch<'a, O, P, E, R> {
    opener: &'a O,
    prober: &'a P,
    extractor: &'a E,
    rng: R,
    policy: SearchPolicy,
}

impl<'a, O, P, E, R> PortSearch<'a, O, P, E, R>
where
    O: PortOpener,
    P: Prober,
    E: Extractor,
    R: Rng,
{
    pub fn new(opener: &'a O, prober: &'a P, extractor: &'a E, rng: R, policy: SearchPolicy) -> Self {
        Self {
            opener,
            prober,
            extractor,
            rng,
            policy,
        }
    }

    /// 找到一个中国大陆可达的端口并返回；用完预算返回 `RetryBudgetExhausted`
    pub async fn provision(&mut self, ip: IpAddr) -> Result<u16> {
        let mut ctx = SearchContext::new(self.policy.max_attempts);

        loop {
            let candidate = self.policy.range.draw(&mut self.rng);
            ctx.select(candidate);
            info!(
                "🎲 Attempt {}/{}: trying port {}",
                ctx.attempt(),
                self.policy.max_attempts,
                candidate
            );

            match self.attempt(&mut ctx, ip, candidate).await {
                Outcome::Reachable => {
                    info!("✅ Port {} is reachable from CN", candidate);
                    return Ok(candidate);
                }
                Outcome::Unreachable => {
                    warn!("Port {} is not reachable from CN", candidate);
                }
                Outcome::Failed(e) => {
                    warn!("Attempt on port {} failed in {:?}: {}", candidate, ctx.phase(), e);
                }
            }

            if !ctx.record_failure() {
                return Err(GuardError::RetryBudgetExhausted(ctx.failures()));
            }
        }
    }

    async fn attempt(&self, ctx: &mut SearchContext, ip: IpAddr, candidate: u16) -> Outcome {
        ctx.enter(Phase::Opening(candidate));
        if let Err(e) = self.opener.open(candidate).await {
            return Outcome::Failed(e);
        }

        ctx.enter(Phase::Probing(candidate));
        let html = match self.prober.probe(ip, candidate).await {
            Ok(html) => html,
            Err(e) => return Outcome::Failed(e),
        };

        ctx.enter(Phase::Deciding(candidate));
        if decide(self.extractor, &html, ip, candidate) {
            Outcome::Reachable
        } else {
            Outcome::Unreachable
        }
    }
}
