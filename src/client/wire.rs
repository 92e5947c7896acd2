//! Update-handler XML bodies and response excerpts.

use once_cell::sync::Lazy;
use quick_xml::escape::escape;
use regex::Regex;

use crate::index::document::SolrDocument;

/// Longest body excerpt carried by a response error.
const EXCERPT_LEN: usize = 300;

static PRE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)<pre>(.+)$").expect("valid regex"));

/// Visibility flags sent with `commit` and `optimize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitOptions {
    pub wait_flush: bool,
    pub wait_searcher: bool,
}

impl Default for CommitOptions {
    fn default() -> Self {
        Self {
            wait_flush: true,
            wait_searcher: true,
        }
    }
}

/// `<add><doc><field name="k">v</field>...</doc>...</add>`
pub fn add_body(docs: &[SolrDocument]) -> String {
    let mut out = String::from("<add>");
    for doc in docs {
        out.push_str("<doc>");
        for (name, values) in doc.iter() {
            for value in values {
                out.push_str(&format!(
                    "<field name=\"{}\">{}</field>",
                    escape(name),
                    escape(value.to_string().as_str())
                ));
            }
        }
        out.push_str("</doc>");
    }
    out.push_str("</add>");
    strip_control_chars(&out)
}

pub fn delete_by_id_body(id: &str) -> String {
    format!("<delete><id>{}</id></delete>", escape(id))
}

pub fn delete_by_query_body(query: &str) -> String {
    format!("<delete><query>{}</query></delete>", escape(query))
}

pub fn commit_body(options: CommitOptions) -> String {
    format!(
        "<commit waitFlush=\"{}\" waitSearcher=\"{}\"/>",
        options.wait_flush, options.wait_searcher
    )
}

pub fn optimize_body(options: CommitOptions) -> String {
    format!(
        "<optimize waitFlush=\"{}\" waitSearcher=\"{}\"/>",
        options.wait_flush, options.wait_searcher
    )
}

/// Drops C0 control characters and DEL, keeping tab, LF and CR.
pub fn strip_control_chars(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, '\u{0}'..='\u{8}' | '\u{b}' | '\u{c}' | '\u{e}'..='\u{1f}' | '\u{7f}'))
        .collect()
}

/// The engine's error message out of an HTML error page, or the start of
/// the body.
pub fn excerpt(body: &str) -> String {
    if let Some(caps) = PRE_BLOCK.captures(body)
        && let Some(m) = caps.get(1)
    {
        return m.as_str().trim().to_string();
    }
    let trimmed = body.trim();
    match trimmed.char_indices().nth(EXCERPT_LEN) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

/// `<result status="0"/>` style bodies carry a non-zero status on failure.
pub fn body_status(body: &str) -> Option<i64> {
    static STATUS: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r#"<int name="status">(-?\d+)</int>|<result status="(-?\d+)""#)
            .expect("valid regex")
    });
    let caps = STATUS.captures(body)?;
    caps.get(1).or_else(|| caps.get(2))?.as_str().parse().ok()
}

/// One-line description of a request for the log.
pub fn summarize(body: &str) -> String {
    const MAX: usize = 120;
    let line: String = body.split_whitespace().collect::<Vec<_>>().join(" ");
    match line.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{}...", &line[..cut]),
        None => line,
    }
}
