//! Select response decoding.
//!
//! Requests ask for `wt=json`; the body is decoded as data into the shapes
//! below. Anything the engine adds beyond them is ignored.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value as Json};

use crate::error::{Result, SolrError};

pub type RawDoc = Map<String, Json>;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseHeader {
    #[serde(default)]
    pub status: i64,
    #[serde(rename = "QTime", default)]
    pub qtime: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultSet {
    #[serde(rename = "numFound")]
    pub num_found: u64,
    #[serde(default)]
    pub start: u64,
    #[serde(rename = "maxScore", default)]
    pub max_score: Option<f64>,
    #[serde(default)]
    pub docs: Vec<RawDoc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FacetCounts {
    /// Flat `[term, count, term, count, ...]` lists keyed by field.
    #[serde(default)]
    pub facet_fields: BTreeMap<String, Vec<Json>>,
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    code: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
struct Envelope {
    #[serde(rename = "responseHeader", default)]
    header: ResponseHeader,
    #[serde(default)]
    response: Option<ResultSet>,
    #[serde(default)]
    facet_counts: Option<FacetCounts>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

/// A decoded select response, with the untouched JSON alongside.
#[derive(Debug, Clone)]
pub struct SelectResponse {
    pub header: ResponseHeader,
    pub results: ResultSet,
    pub facet_counts: Option<FacetCounts>,
    pub raw: Json,
}

impl SelectResponse {
    pub fn parse(body: &str) -> Result<Self> {
        let raw: Json = serde_json::from_str(body)?;
        let envelope: Envelope = serde_json::from_value(raw.clone())?;
        if let Some(err) = envelope.error {
            return Err(SolrError::Response {
                status: err.code.unwrap_or(500),
                excerpt: err.msg.unwrap_or_else(|| "unknown error".to_string()),
            });
        }
        let results = envelope
            .response
            .ok_or_else(|| SolrError::Decode("response section missing".to_string()))?;
        Ok(Self {
            header: envelope.header,
            results,
            facet_counts: envelope.facet_counts,
            raw,
        })
    }

    pub fn num_found(&self) -> u64 {
        self.results.num_found
    }

    pub fn docs(&self) -> &[RawDoc] {
        &self.results.docs
    }

    /// `solr_id` of every doc, in response order. Docs without one are
    /// skipped.
    pub fn ids(&self) -> Vec<String> {
        self.results
            .docs
            .iter()
            .filter_map(|d| d.get(crate::schema::ID_FIELD).and_then(first_str))
            .map(str::to_string)
            .collect()
    }

    /// Facet counts per field, in the engine's order.
    pub fn facets(&self) -> BTreeMap<String, Vec<(String, u64)>> {
        let Some(counts) = &self.facet_counts else {
            return BTreeMap::new();
        };
        counts
            .facet_fields
            .iter()
            .map(|(field, flat)| {
                let pairs = flat
                    .chunks(2)
                    .filter_map(|pair| match pair {
                        [term, count] => Some((
                            term.as_str().map_or_else(|| term.to_string(), str::to_string),
                            count.as_u64()?,
                        )),
                        _ => None,
                    })
                    .collect();
                (field.clone(), pairs)
            })
            .collect()
    }
}

/// The first string of a value that may be a scalar or a list.
pub fn first_str(v: &Json) -> Option<&str> {
    match v {
        Json::String(s) => Some(s),
        Json::Array(items) => items.first().and_then(Json::as_str),
        _ => None,
    }
}
