//! Filter expressions compiled to Lucene query strings.
//!
//! Three shapes are accepted:
//!
//! - a literal string, passed through untouched;
//! - a template with positional `?` placeholders and one argument per
//!   placeholder;
//! - field/value pairs, AND-joined as `field:?` clauses.
//!
//! Arguments are escaped; a blank argument becomes the match-all query and a
//! list becomes a parenthesized OR of its escaped terms.

use crate::error::{Result, SolrError};

pub const MATCH_ALL: &str = "*:*";

/// One placeholder argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryArg {
    Blank,
    Scalar(String),
    AnyOf(Vec<String>),
}

impl QueryArg {
    fn render(&self) -> String {
        match self {
            QueryArg::Blank => MATCH_ALL.to_string(),
            QueryArg::Scalar(s) if s.is_empty() => MATCH_ALL.to_string(),
            QueryArg::Scalar(s) => escape_term(s),
            QueryArg::AnyOf(terms) if terms.is_empty() => MATCH_ALL.to_string(),
            QueryArg::AnyOf(terms) => {
                let escaped: Vec<String> = terms.iter().map(|t| escape_term(t)).collect();
                format!("({})", escaped.join(" OR "))
            }
        }
    }
}

impl From<&str> for QueryArg {
    fn from(v: &str) -> Self {
        if v.is_empty() {
            QueryArg::Blank
        } else {
            QueryArg::Scalar(v.to_string())
        }
    }
}

impl From<String> for QueryArg {
    fn from(v: String) -> Self {
        QueryArg::from(v.as_str())
    }
}

impl From<i64> for QueryArg {
    fn from(v: i64) -> Self {
        QueryArg::Scalar(v.to_string())
    }
}

impl From<i32> for QueryArg {
    fn from(v: i32) -> Self {
        QueryArg::Scalar(v.to_string())
    }
}

impl From<f64> for QueryArg {
    fn from(v: f64) -> Self {
        QueryArg::Scalar(v.to_string())
    }
}

impl From<bool> for QueryArg {
    fn from(v: bool) -> Self {
        QueryArg::Scalar(v.to_string())
    }
}

impl<T: Into<QueryArg>> From<Option<T>> for QueryArg {
    fn from(v: Option<T>) -> Self {
        v.map_or(QueryArg::Blank, Into::into)
    }
}

impl From<Vec<String>> for QueryArg {
    fn from(v: Vec<String>) -> Self {
        if v.is_empty() {
            QueryArg::Blank
        } else {
            QueryArg::AnyOf(v)
        }
    }
}

impl From<Vec<&str>> for QueryArg {
    fn from(v: Vec<&str>) -> Self {
        QueryArg::from(v.into_iter().map(str::to_string).collect::<Vec<_>>())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterExpr {
    Literal(String),
    Template { template: String, args: Vec<QueryArg> },
    Fields(Vec<(String, QueryArg)>),
}

impl FilterExpr {
    pub fn literal(q: impl Into<String>) -> Self {
        FilterExpr::Literal(q.into())
    }

    pub fn template(template: impl Into<String>, args: Vec<QueryArg>) -> Self {
        FilterExpr::Template {
            template: template.into(),
            args,
        }
    }

    pub fn fields<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<QueryArg>,
    {
        FilterExpr::Fields(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn compile(&self) -> Result<String> {
        compile(self)
    }
}

impl From<&str> for FilterExpr {
    fn from(q: &str) -> Self {
        FilterExpr::Literal(q.to_string())
    }
}

impl From<String> for FilterExpr {
    fn from(q: String) -> Self {
        FilterExpr::Literal(q)
    }
}

pub fn compile(expr: &FilterExpr) -> Result<String> {
    match expr {
        FilterExpr::Literal(q) => Ok(q.clone()),
        FilterExpr::Template { template, args } => substitute(template, args),
        FilterExpr::Fields(pairs) => {
            let template = pairs
                .iter()
                .map(|(field, _)| format!("{field}:?"))
                .collect::<Vec<_>>()
                .join(" AND ");
            let args: Vec<QueryArg> = pairs.iter().map(|(_, v)| v.clone()).collect();
            substitute(&template, &args)
        }
    }
}

fn substitute(template: &str, args: &[QueryArg]) -> Result<String> {
    let placeholders = template.matches('?').count();
    if placeholders != args.len() {
        return Err(SolrError::argument(format!(
            "wrong number of bind variables ({} for {placeholders}) in: {template}",
            args.len()
        )));
    }
    let mut out = String::with_capacity(template.len() + 16);
    let mut args = args.iter();
    for c in template.chars() {
        if c != '?' {
            out.push(c);
        } else if let Some(arg) = args.next() {
            out.push_str(&arg.render());
        }
    }
    Ok(out)
}

/// Backslash-escapes Lucene syntax. `&&` and `||` are escaped as pairs; a
/// lone `&` or `|` is left alone.
pub fn escape_term(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 8);
    let mut chars = term.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '+' | '-' | '!' | '(' | ')' | '{' | '}' | '[' | ']' | '^' | '"' | '~' | '*' | '?'
            | ':' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '&' | '|' if chars.peek() == Some(&c) => {
                chars.next();
                out.push('\\');
                out.push(c);
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}
