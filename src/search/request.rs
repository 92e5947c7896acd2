//! Ordered select parameters.

use std::fmt;

/// A parameter value: one scalar, or a list sent as repeated keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectValue {
    One(String),
    Many(Vec<String>),
}

impl SelectValue {
    pub fn values(&self) -> Vec<&str> {
        match self {
            SelectValue::One(v) => vec![v.as_str()],
            SelectValue::Many(vs) => vs.iter().map(String::as_str).collect(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SelectValue::One(v) => Some(v),
            SelectValue::Many(_) => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            SelectValue::One(v) => v.is_empty(),
            SelectValue::Many(vs) => vs.is_empty(),
        }
    }
}

impl fmt::Display for SelectValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectValue::One(v) => f.write_str(v),
            SelectValue::Many(vs) => write!(f, "[{}]", vs.join(", ")),
        }
    }
}

impl From<&str> for SelectValue {
    fn from(v: &str) -> Self {
        SelectValue::One(v.to_string())
    }
}

impl From<String> for SelectValue {
    fn from(v: String) -> Self {
        SelectValue::One(v)
    }
}

impl From<&String> for SelectValue {
    fn from(v: &String) -> Self {
        SelectValue::One(v.clone())
    }
}

impl From<i64> for SelectValue {
    fn from(v: i64) -> Self {
        SelectValue::One(v.to_string())
    }
}

impl From<usize> for SelectValue {
    fn from(v: usize) -> Self {
        SelectValue::One(v.to_string())
    }
}

impl From<bool> for SelectValue {
    fn from(v: bool) -> Self {
        SelectValue::One(v.to_string())
    }
}

impl From<f64> for SelectValue {
    fn from(v: f64) -> Self {
        SelectValue::One(v.to_string())
    }
}

impl From<Vec<String>> for SelectValue {
    fn from(v: Vec<String>) -> Self {
        SelectValue::Many(v)
    }
}

impl From<Vec<&str>> for SelectValue {
    fn from(v: Vec<&str>) -> Self {
        SelectValue::Many(v.into_iter().map(str::to_string).collect())
    }
}

/// Parameter name → value, in insertion order. Setting an existing name
/// replaces its value where it stands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectRequest {
    params: Vec<(String, SelectValue)>,
}

impl SelectRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: impl Into<SelectValue>) -> &mut Self {
        let value = value.into();
        if let Some(slot) = self.params.iter_mut().find(|(k, _)| k == name) {
            slot.1 = value;
        } else {
            self.params.push((name.to_string(), value));
        }
        self
    }

    /// Builder-style [`SelectRequest::set`].
    pub fn with(mut self, name: &str, value: impl Into<SelectValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Appends to a repeated parameter, creating it if needed.
    pub fn append(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        let value = value.into();
        match self.params.iter_mut().find(|(k, _)| k == name) {
            Some((_, SelectValue::Many(vs))) => vs.push(value),
            Some((_, slot @ SelectValue::One(_))) => {
                let prior = std::mem::replace(slot, SelectValue::Many(Vec::new()));
                if let SelectValue::Many(vs) = slot {
                    vs.extend(prior.values().into_iter().map(str::to_string));
                    vs.push(value);
                }
            }
            None => self
                .params
                .push((name.to_string(), SelectValue::Many(vec![value]))),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&SelectValue> {
        self.params.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(SelectValue::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<SelectValue> {
        let idx = self.params.iter().position(|(k, _)| k == name)?;
        Some(self.params.remove(idx).1)
    }

    /// Copies every parameter of `other` over this request.
    pub fn merge(&mut self, other: &SelectRequest) -> &mut Self {
        for (k, v) in &other.params {
            self.set(k, v.clone());
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SelectValue)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// `k=v&k=v2&...`, percent-encoded, lists as repeated keys.
    pub fn to_query_string(&self) -> String {
        let mut pairs = Vec::new();
        for (k, v) in &self.params {
            let key = urlencoding::encode(k);
            for value in v.values() {
                pairs.push(format!("{key}={}", urlencoding::encode(value)));
            }
        }
        pairs.join("&")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_replaces_in_place() {
        let mut req = SelectRequest::new();
        req.set("q", "a").set("rows", 10usize).set("q", "b");
        let names: Vec<&str> = req.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["q", "rows"]);
        assert_eq!(req.get_str("q"), Some("b"));
    }

    #[test]
    fn lists_become_repeated_keys() {
        let req = SelectRequest::new()
            .with("q", "title:foo bar")
            .with("fq", vec!["a:1", "b:\"x y\""]);
        assert_eq!(
            req.to_query_string(),
            "q=title%3Afoo%20bar&fq=a%3A1&fq=b%3A%22x%20y%22"
        );
    }

    #[test]
    fn append_promotes_a_scalar() {
        let mut req = SelectRequest::new().with("facet.field", "city");
        req.append("facet.field", "state").append("fq", "x:1");
        assert_eq!(
            req.get("facet.field"),
            Some(&SelectValue::Many(vec!["city".into(), "state".into()]))
        );
        assert_eq!(req.get("fq").map(SelectValue::values), Some(vec!["x:1"]));
    }

    #[test]
    fn merge_overrides() {
        let mut req = SelectRequest::new().with("rows", 10usize).with("q", "x");
        req.merge(&SelectRequest::new().with("rows", 5usize).with("wt", "json"));
        assert_eq!(req.get_str("rows"), Some("5"));
        assert_eq!(req.get_str("wt"), Some("json"));
        assert_eq!(req.len(), 3);
    }
}
