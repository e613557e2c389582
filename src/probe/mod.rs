pub mod browser;
pub mod evaluate;
pub mod extract;
pub mod ip;

pub use browser::{BrowserProber, Prober, DEFAULT_PROBE_URL};
pub use evaluate::evaluate;
pub use extract::{Extractor, PingPeExtractor, ProbeResult, ProbeResultSet};
pub use ip::IpResolver;

use crate::error::Result;
use std::net::IpAddr;
use tracing::{debug, info};

/// 探测一次并给出可达性结论（Prober -> Extractor -> Evaluator）
///
/// 探测失败返回错误；页面没有可用数据时结论为不可达
pub async fn check_reachability<P, E>(
    prober: &P,
    extractor: &E,
    ip: IpAddr,
    port: u16,
) -> Result<bool>
where
    P: Prober,
    E: Extractor,
{
    let html = prober.probe(ip, port).await?;
    Ok(decide(extractor, &html, ip, port))
}

/// 解析渲染结果并得出结论
pub fn decide<E: Extractor>(extractor: &E, html: &str, ip: IpAddr, port: u16) -> bool {
    let results = extractor.extract(html);

    if results.is_empty() {
        debug!("No probe rows found in rendered page");
    }
    for (id, text) in results.iter() {
        debug!("  {}: {}", id, text);
    }

    let reachable = evaluate(&results);
    info!(
        "{} {}:{} reachable from CN: {}",
        if reachable { "✅" } else { "❌" },
        ip,
        port,
        reachable
    );
    reachable
}
