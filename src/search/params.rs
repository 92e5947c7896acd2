//! Untrusted request parameters, as they arrive from a query string or form.

/// A parameter value. `key[]=a&key[]=b` gives a list and `key[sub]=v` a
/// nested map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Str(String),
    List(Vec<String>),
    Map(Params),
}

impl ParamValue {
    /// Scalar view: the string itself, or the first list entry.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            ParamValue::List(vs) => vs.first().map(String::as_str),
            ParamValue::Map(_) => None,
        }
    }

    /// Every scalar carried; a map carries none.
    pub fn values(&self) -> Vec<&str> {
        match self {
            ParamValue::Str(s) => vec![s.as_str()],
            ParamValue::List(vs) => vs.iter().map(String::as_str).collect(),
            ParamValue::Map(_) => Vec::new(),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            ParamValue::Str(s) => s.is_empty(),
            ParamValue::List(vs) => vs.is_empty(),
            ParamValue::Map(m) => m.is_empty(),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<Vec<&str>> for ParamValue {
    fn from(v: Vec<&str>) -> Self {
        ParamValue::List(v.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(v: Vec<String>) -> Self {
        ParamValue::List(v)
    }
}

impl From<Params> for ParamValue {
    fn from(v: Params) -> Self {
        ParamValue::Map(v)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(String, ParamValue)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key`, replacing an earlier value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ParamValue::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parses `a=1&b[]=2&b[]=3&c[d]=4`. Undecodable pairs are skipped.
    pub fn from_query_string(qs: &str) -> Self {
        let mut params = Params::new();
        for pair in qs.trim_start_matches('?').split('&').filter(|p| !p.is_empty()) {
            let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
            let Some(key) = decode_component(raw_key) else {
                continue;
            };
            let Some(value) = decode_component(raw_value) else {
                continue;
            };
            params.push_decoded(&key, value);
        }
        params
    }

    fn push_decoded(&mut self, key: &str, value: String) {
        if let Some(base) = key.strip_suffix("[]") {
            match self.entries.iter_mut().find(|(k, _)| k == base) {
                Some((_, ParamValue::List(vs))) => vs.push(value),
                Some((_, slot)) => *slot = ParamValue::List(vec![value]),
                None => self
                    .entries
                    .push((base.to_string(), ParamValue::List(vec![value]))),
            }
            return;
        }
        if let Some((base, rest)) = key.split_once('[')
            && let Some(sub) = rest.strip_suffix(']')
            && !base.is_empty()
        {
            match self.entries.iter_mut().find(|(k, _)| k == base) {
                Some((_, ParamValue::Map(m))) => {
                    m.push_decoded(sub, value);
                }
                Some((_, slot)) => {
                    let mut m = Params::new();
                    m.push_decoded(sub, value);
                    *slot = ParamValue::Map(m);
                }
                None => {
                    let mut m = Params::new();
                    m.push_decoded(sub, value);
                    self.entries.push((base.to_string(), ParamValue::Map(m)));
                }
            }
            return;
        }
        self.insert(key, value);
    }

    /// Drops empty strings from lists, then every blank value, recursing
    /// into maps.
    pub fn strip_blank(self) -> Params {
        let entries = self
            .entries
            .into_iter()
            .filter_map(|(k, v)| {
                let v = match v {
                    ParamValue::List(vs) => {
                        ParamValue::List(vs.into_iter().filter(|s| !s.is_empty()).collect())
                    }
                    ParamValue::Map(m) => ParamValue::Map(m.strip_blank()),
                    other => other,
                };
                (!v.is_blank()).then_some((k, v))
            })
            .collect();
        Params { entries }
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

fn decode_component(s: &str) -> Option<String> {
    let spaced = s.replace('+', " ");
    urlencoding::decode(&spaced).ok().map(|c| c.into_owned())
}

/// Integer prefix of `s`, the way form values are loosely read: leading
/// whitespace and sign are allowed, anything unparsable is 0.
pub fn leading_int(s: &str) -> i64 {
    let t = s.trim_start();
    let (sign, digits) = match t.as_bytes().first() {
        Some(b'-') => (-1, &t[1..]),
        Some(b'+') => (1, &t[1..]),
        _ => (1, t),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().map_or(0, |n| sign * n)
}
