use crate::probe::ProbeResultSet;
use tracing::debug;

/// 中国大陆 TCP 探测点的 id 前缀
pub const CN_TCP_TAG: &str = "tcp-CN";
/// 结果文本中表示成功的关键字
pub const SUCCESS_TOKEN: &str = "successful";

/// 超过半数的中国大陆探测点成功才算可达；没有任何大陆探测点时视为不可达
pub fn evaluate(results: &ProbeResultSet) -> bool {
    let (total, successful) = results
        .iter()
        .filter(|(id, _)| id.starts_with(CN_TCP_TAG))
        .fold((0usize, 0usize), |(total, ok), (_, text)| {
            (total + 1, ok + usize::from(text.contains(SUCCESS_TOKEN)))
        });

    debug!("CN probes: {}/{} successful", successful, total);

    if total == 0 {
        return false;
    }

    // 严格多数，平票算失败
    successful * 2 > total
}
