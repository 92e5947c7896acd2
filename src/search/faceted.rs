//! Faceted search: raw request parameters to a dismax select.
//!
//! A [`FacetedQueryBuilder`] holds the static search policy (scoring knobs,
//! base filters, named sorts, page sizes, facet fields, overrides) and
//! compiles untrusted parameters against it. Parameters that are not
//! recognized are ignored; values that are out of policy fall back to the
//! defaults.

use tracing::debug;

use crate::error::{Result, SolrError};
use crate::model::types::{DATE_FORMAT, parse_loose_date};
use crate::schema::SchemaRegistry;
use crate::search::finder::{Finder, Format, Found};
use crate::search::lql::escape_term;
use crate::search::params::{Params, leading_int};
use crate::search::request::{SelectRequest, SelectValue};

/// Dismax scoring parameters. `None` or empty leaves a knob out of the
/// request.
#[derive(Debug, Clone)]
pub struct ScoringKnobs {
    pub query_type: Option<String>,
    pub query_fields: Option<String>,
    pub minimum_match: Option<String>,
    pub phrase_fields: Option<String>,
    pub phrase_slop: Option<String>,
    pub query_phrase_slop: Option<String>,
    pub tie_breaker: Option<String>,
    pub boost_query: Option<String>,
    pub boost_functions: Option<String>,
}

impl Default for ScoringKnobs {
    fn default() -> Self {
        Self {
            query_type: Some("dismax".into()),
            query_fields: None,
            minimum_match: Some("100%".into()),
            phrase_fields: None,
            phrase_slop: Some("20".into()),
            query_phrase_slop: Some("100".into()),
            tie_breaker: Some("0.1".into()),
            boost_query: None,
            boost_functions: None,
        }
    }
}

impl ScoringKnobs {
    /// Request parameter name and value, in emission order.
    fn params(&self) -> [(&'static str, Option<&str>); 9] {
        [
            ("qt", self.query_type.as_deref()),
            ("qf", self.query_fields.as_deref()),
            ("mm", self.minimum_match.as_deref()),
            ("pf", self.phrase_fields.as_deref()),
            ("ps", self.phrase_slop.as_deref()),
            ("qs", self.query_phrase_slop.as_deref()),
            ("tie", self.tie_breaker.as_deref()),
            ("bq", self.boost_query.as_deref()),
            ("bf", self.boost_functions.as_deref()),
        ]
    }
}

/// A compiled request and the filter categories that shaped it.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub request: SelectRequest,
    pub crumbs: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct FacetedQueryBuilder<'s> {
    schema: &'s SchemaRegistry,
    pub scoring: ScoringKnobs,
    /// Filters applied to every request; they restrict matches without
    /// affecting scores.
    pub filter_query: Vec<String>,
    /// Sort name → order expression.
    pub sorts: Vec<(String, String)>,
    pub default_sort: String,
    /// Allowed page sizes; the first is the default.
    pub per_pages: Vec<u64>,
    pub simple_facets: Vec<String>,
    static_select: SelectRequest,
}

impl<'s> FacetedQueryBuilder<'s> {
    pub fn new(schema: &'s SchemaRegistry) -> Self {
        Self {
            schema,
            scoring: ScoringKnobs::default(),
            filter_query: Vec::new(),
            sorts: vec![("relevancy".to_string(), "score desc".to_string())],
            default_sort: "relevancy".to_string(),
            per_pages: vec![10, 25, 50],
            simple_facets: Vec::new(),
            static_select: SelectRequest::new(),
        }
    }

    /// Adds or replaces a named sort.
    pub fn sort(&mut self, name: &str, order: &str) -> &mut Self {
        match self.sorts.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = order.to_string(),
            None => self.sorts.push((name.to_string(), order.to_string())),
        }
        self
    }

    /// A parameter forced onto every compiled request.
    pub fn set_static(&mut self, name: &str, value: impl Into<SelectValue>) -> &mut Self {
        self.static_select.set(name, value);
        self
    }

    pub fn get_static(&self, name: &str) -> Option<&SelectValue> {
        self.static_select.get(name)
    }

    fn sort_order(&self, name: &str) -> Option<&str> {
        self.sorts
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, order)| order.as_str())
    }

    pub fn compile(&self, raw: &Params) -> Result<CompiledQuery> {
        let params = raw.clone().strip_blank();
        let mut request = SelectRequest::new();
        let mut crumbs: Vec<String> = Vec::new();

        for (name, value) in self.scoring.params() {
            if let Some(v) = value
                && !v.is_empty()
            {
                request.set(name, v);
            }
        }

        if let Some(q) = params.get_str("q") {
            request.set("q", q);
            crumbs.push("q".to_string());
        }

        let page = params
            .get_str("page")
            .map(leading_int)
            .filter(|p| *p > 0)
            .unwrap_or(1) as u64;
        let default_per_page = self.per_pages.first().copied().unwrap_or(10);
        let per_page = params
            .get_str("per_page")
            .map(leading_int)
            .and_then(|n| u64::try_from(n).ok())
            .filter(|n| self.per_pages.contains(n))
            .unwrap_or(default_per_page);
        // A page past the addressable range reads as the first page.
        let start = (page - 1)
            .checked_mul(per_page)
            .and_then(|s| usize::try_from(s).ok())
            .unwrap_or(0);
        request.set("start", start).set("rows", per_page as usize);

        let sort_name = params
            .get_str("sort")
            .filter(|s| self.sort_order(s).is_some())
            .unwrap_or(self.default_sort.as_str());
        if let Some(order) = self.sort_order(sort_name) {
            request.set("sort", order);
        }

        let mut filters = self.filter_query.clone();
        for (field, value) in params.iter() {
            if !self.schema.contains(field) {
                continue;
            }
            for v in value.values() {
                let v = self.convert(field, v)?;
                filters.push(format!("{field}:{}", escape_term(&v)));
                if !crumbs.iter().any(|c| c == field) {
                    crumbs.push(field.to_string());
                }
            }
        }
        if !filters.is_empty() {
            request.set("fq", filters);
        }

        if !self.simple_facets.is_empty() {
            request
                .set("facet", true)
                .set("facet.field", self.simple_facets.clone())
                .set("facet.limit", -1i64)
                .set("facet.mincount", 1i64);
        }

        request.merge(&self.static_select);
        debug!(query = %request.to_query_string(), ?crumbs, "faceted query compiled");
        Ok(CompiledQuery { request, crumbs })
    }

    fn convert(&self, field: &str, value: &str) -> Result<String> {
        if self.schema.is_date(field) {
            return parse_loose_date(value)
                .map(|d| d.format(DATE_FORMAT).to_string())
                .ok_or_else(|| {
                    SolrError::argument(format!("'{value}' is not a date for {field}"))
                });
        }
        if field.ends_with("id") {
            return Ok(leading_int(value).to_string());
        }
        Ok(value.to_string())
    }

    /// Compiles `raw` and runs it, attaching crumbs to the results.
    pub fn find<'a>(&self, raw: &Params, finder: &Finder<'a>, format: Format) -> Result<Found<'a>> {
        let CompiledQuery { request, crumbs } = self.compile(raw)?;
        let mut found = finder.find_compiled(request, format)?;
        match &mut found {
            Found::Entities(c) => c.crumbs = crumbs,
            Found::Documents(c) => c.crumbs = crumbs,
            Found::Hash(_) | Found::Ids(_) => {}
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDefinition, FieldType};

    fn schema() -> SchemaRegistry {
        let mut s = SchemaRegistry::new();
        s.register(FieldDefinition::new("city")).unwrap();
        s.register(FieldDefinition::new("agent_id").with_type(FieldType::Integer))
            .unwrap();
        s.register(FieldDefinition::new("listed_on").with_type(FieldType::Date))
            .unwrap();
        s
    }

    #[test]
    fn defaults_emit_scoring_paging_and_sort() {
        let schema = schema();
        let builder = FacetedQueryBuilder::new(&schema);
        let compiled = builder.compile(&Params::new()).unwrap();
        assert_eq!(
            compiled.request.to_query_string(),
            "qt=dismax&mm=100%25&ps=20&qs=100&tie=0.1&start=0&rows=10&sort=score%20desc"
        );
        assert!(compiled.crumbs.is_empty());
    }

    #[test]
    fn bad_paging_falls_back() {
        let schema = schema();
        let builder = FacetedQueryBuilder::new(&schema);
        for page in ["0", "abc", "-2"] {
            let c = builder.compile(&Params::new().with("page", page)).unwrap();
            assert_eq!(c.request.get_str("start"), Some("0"), "page {page}");
        }
        let c = builder.compile(&Params::new().with("per_page", "999")).unwrap();
        assert_eq!(c.request.get_str("rows"), Some("10"));
        let c = builder
            .compile(&Params::new().with("per_page", "25").with("page", "3"))
            .unwrap();
        assert_eq!(c.request.get_str("rows"), Some("25"));
        assert_eq!(c.request.get_str("start"), Some("50"));
    }

    #[test]
    fn huge_page_numbers_read_as_the_first_page() {
        let schema = schema();
        let builder = FacetedQueryBuilder::new(&schema);
        for page in ["9223372036854775807", "99999999999999999999999"] {
            let c = builder
                .compile(&Params::new().with("page", page).with("per_page", "25"))
                .unwrap();
            assert_eq!(c.request.get_str("start"), Some("0"), "page {page}");
            assert_eq!(c.request.get_str("rows"), Some("25"));
        }
    }

    #[test]
    fn unknown_sort_uses_the_default() {
        let schema = schema();
        let mut builder = FacetedQueryBuilder::new(&schema);
        builder.sort("newest", "listed_on desc");
        let c = builder.compile(&Params::new().with("sort", "newest")).unwrap();
        assert_eq!(c.request.get_str("sort"), Some("listed_on desc"));
        let c = builder.compile(&Params::new().with("sort", "cheapest")).unwrap();
        assert_eq!(c.request.get_str("sort"), Some("score desc"));
    }

    #[test]
    fn field_params_become_filters() {
        let schema = schema();
        let mut builder = FacetedQueryBuilder::new(&schema);
        builder.filter_query.push("solr_type:Listing".into());
        let params = Params::new()
            .with("q", "loft")
            .with("city", vec!["New York", "Paris", ""])
            .with("agent_id", "42abc")
            .with("listed_on", "2024-03-09")
            .with("color", "red")
            .with("bq", "");
        let c = builder.compile(&params).unwrap();
        assert_eq!(
            c.request.get("fq"),
            Some(&SelectValue::Many(vec![
                "solr_type:Listing".into(),
                "city:New York".into(),
                "city:Paris".into(),
                "agent_id:42".into(),
                "listed_on:2024\\-03\\-09T00\\:00\\:00Z".into(),
            ]))
        );
        assert_eq!(c.request.get_str("q"), Some("loft"));
        assert_eq!(c.crumbs, vec!["q", "city", "agent_id", "listed_on"]);
    }

    #[test]
    fn facets_and_overrides() {
        let schema = schema();
        let mut builder = FacetedQueryBuilder::new(&schema);
        builder.simple_facets = vec!["city".into()];
        builder.set_static("rows", 3usize).set_static("qt", "standard");
        let c = builder.compile(&Params::new().with("per_page", "25")).unwrap();
        assert_eq!(c.request.get_str("facet"), Some("true"));
        assert_eq!(c.request.get_str("facet.limit"), Some("-1"));
        assert_eq!(c.request.get_str("facet.mincount"), Some("1"));
        assert_eq!(c.request.get_str("rows"), Some("3"));
        assert_eq!(c.request.get_str("qt"), Some("standard"));
        assert_eq!(builder.get_static("qt").and_then(SelectValue::as_str), Some("standard"));
    }

    #[test]
    fn blank_knobs_are_skipped() {
        let schema = schema();
        let mut builder = FacetedQueryBuilder::new(&schema);
        builder.scoring.minimum_match = Some(String::new());
        builder.scoring.query_fields = Some("title^2 body".into());
        let c = builder.compile(&Params::new()).unwrap();
        assert!(!c.request.contains("mm"));
        assert_eq!(c.request.get_str("qf"), Some("title^2 body"));
    }

    #[test]
    fn bad_dates_are_rejected() {
        let schema = schema();
        let builder = FacetedQueryBuilder::new(&schema);
        assert!(matches!(
            builder.compile(&Params::new().with("listed_on", "soon")),
            Err(SolrError::Argument(_))
        ));
    }
}
