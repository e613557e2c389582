//! 探测结果提取 - 从渲染后的页面中取出每个探测点的结果单元格

use crate::error::{GuardError, Result};
use scraper::{Html, Selector};
use std::collections::HashMap;

/// 结果行 id 前缀
const ROW_ID_PREFIX: &str = "ping-";
/// 结果单元格 id 后缀
const RESULT_ID_SUFFIX: &str = "-result";

/// 单个探测点的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub id: String,
    pub text: String,
}

/// 一次探测的全部结果（id -> 文本），每次探测重新生成，不跨次合并
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeResultSet {
    entries: HashMap<String, String>,
}

impl ProbeResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, result: ProbeResult) {
        self.entries.insert(result.id, result.text);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.entries.get(id).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(id, text)| (id.as_str(), text.as_str()))
    }
}

impl FromIterator<ProbeResult> for ProbeResultSet {
    fn from_iter<I: IntoIterator<Item = ProbeResult>>(iter: I) -> Self {
        let mut set = ProbeResultSet::new();
        for result in iter {
            set.insert(result);
        }
        set
    }
}

#[cfg(test)]
impl<'a> FromIterator<(&'a str, &'a str)> for ProbeResultSet {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        iter.into_iter()
            .map(|(id, text)| ProbeResult {
                id: id.to_string(),
                text: text.to_string(),
            })
            .collect()
    }
}

/// 页面结构解析能力，更换探测站点时只需替换实现
pub trait Extractor {
    fn extract(&self, html: &str) -> ProbeResultSet;
}

/// tcp.ping.pe 页面解析器
///
/// 结果表格每行 `<tr id="ping-...">`，其中 `<td id="...-result">` 为结果文本
pub struct PingPeExtractor {
    row: Selector,
    cell: Selector,
}

impl PingPeExtractor {
    pub fn new() -> Result<Self> {
        let row = format!("tr[id^=\"{}\"]", ROW_ID_PREFIX);
        let cell = format!("td[id$=\"{}\"]", RESULT_ID_SUFFIX);
        Ok(Self {
            row: parse_selector(&row)?,
            cell: parse_selector(&cell)?,
        })
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| GuardError::Parse(format!("Invalid selector {}: {}", selector, e)))
}

impl Extractor for PingPeExtractor {
    fn extract(&self, html: &str) -> ProbeResultSet {
        let document = Html::parse_document(html);

        document
            .select(&self.row)
            .filter_map(|row| {
                // 页面可能只渲染了一部分，缺少结果单元格的行直接跳过
                let cell = row.select(&self.cell).next()?;
                let id = cell.value().id()?.to_string();
                let text = cell.text().collect::<String>().trim().to_string();
                Some(ProbeResult { id, text })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RENDERED: &str = r#"
        <html><body><table>
          <tr id="ping-tcp-CN-1"><td>Beijing</td><td id="tcp-CN-1-result"> Connection successful 12ms </td></tr>
          <tr id="ping-tcp-CN-2"><td>Shanghai</td><td id="tcp-CN-2-result">Connection timed out</td></tr>
          <tr id="ping-tcp-US-1"><td>Dallas</td><td id="tcp-US-1-result">Connection <b>successful</b></td></tr>
          <tr id="ping-tcp-CN-3"><td>Guangzhou</td><td id="tcp-CN-3-status">pending</td></tr>
          <tr id="header"><td id="header-result">ignored</td></tr>
        </table></body></html>
    "#;

    #[test]
    fn test_extract_rendered_rows() {
        let results = PingPeExtractor::new().unwrap().extract(RENDERED);

        assert_eq!(results.len(), 3);
        assert_eq!(results.get("tcp-CN-1-result"), Some("Connection successful 12ms"));
        assert_eq!(results.get("tcp-CN-2-result"), Some("Connection timed out"));
        assert_eq!(results.get("tcp-US-1-result"), Some("Connection successful"));
    }

    #[test]
    fn test_rows_without_result_cell_are_skipped() {
        let results = PingPeExtractor::new().unwrap().extract(RENDERED);
        assert!(results.iter().all(|(id, _)| !id.starts_with("tcp-CN-3")));
        assert!(results.get("header-result").is_none());
    }

    #[test]
    fn test_empty_page_yields_empty_set() {
        let results = PingPeExtractor::new().unwrap().extract("<html><body>loading...</body></html>");
        assert!(results.is_empty());
    }
}
