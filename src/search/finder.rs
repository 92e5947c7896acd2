//! Executing queries and shaping the results.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::client::SearchBackend;
use crate::error::{Result, SolrError};
use crate::model::{EntityRef, EntityStore, parse_solr_id};
use crate::schema::{ID_FIELD, SchemaRegistry};
use crate::search::collection::ResultCollection;
use crate::search::lql::FilterExpr;
use crate::search::request::SelectRequest;
use crate::search::response::SelectResponse;
use crate::search::stored::StoredDocument;

/// What a find returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    /// Entities fetched back from the store.
    #[default]
    ActiveRecord,
    /// Schema-aware views over the stored fields.
    Document,
    /// The decoded response, untouched.
    Hash,
    /// Bare document ids.
    Ids,
}

impl Format {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "" | "active_record" => Ok(Format::ActiveRecord),
            "document" => Ok(Format::Document),
            "hash" => Ok(Format::Hash),
            "ids" => Ok(Format::Ids),
            other => Err(SolrError::argument(format!("invalid format option `{other}`"))),
        }
    }

    /// Field list requested from the engine.
    pub fn field_list(self) -> &'static str {
        match self {
            Format::ActiveRecord => "solr_id,score",
            Format::Document | Format::Hash => "*,score",
            Format::Ids => "solr_id",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub format: Format,
    /// 1-based; `None` means the first page.
    pub page: Option<i64>,
    /// `None` means 10.
    pub per_page: Option<i64>,
    pub sort: Option<String>,
    /// Fields to count facets on.
    pub facets: Vec<String>,
    /// Extra parameters sent with the select. Computed paging, sort, field
    /// list and output format take precedence.
    pub select: SelectRequest,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    pub fn page(mut self, page: i64) -> Self {
        self.page = Some(page);
        self
    }

    pub fn per_page(mut self, per_page: i64) -> Self {
        self.per_page = Some(per_page);
        self
    }

    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn facets<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.facets = fields.into_iter().map(Into::into).collect();
        self
    }
}

/// Results of a find, by format.
pub enum Found<'s> {
    Entities(ResultCollection<EntityRef>),
    Documents(ResultCollection<StoredDocument<'s>>),
    /// The decoded response body as returned.
    Hash(serde_json::Value),
    Ids(Vec<String>),
}

impl std::fmt::Debug for Found<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Found::Entities(c) => {
                let ids: Vec<String> = c.iter().map(|e| e.solr_id()).collect();
                write!(f, "Entities({c}: {ids:?})")
            }
            Found::Documents(c) => {
                let ids: Vec<&str> = c.iter().map(|d| d.solr_id()).collect();
                write!(f, "Documents({c}: {ids:?})")
            }
            Found::Hash(raw) => write!(f, "Hash({raw})"),
            Found::Ids(ids) => write!(f, "Ids({ids:?})"),
        }
    }
}

/// Runs selects against a backend and rehydrates results through a store.
pub struct Finder<'a> {
    schema: &'a SchemaRegistry,
    backend: &'a dyn SearchBackend,
    store: Option<&'a dyn EntityStore>,
}

impl<'a> Finder<'a> {
    pub fn new(schema: &'a SchemaRegistry, backend: &'a dyn SearchBackend) -> Self {
        Self {
            schema,
            backend,
            store: None,
        }
    }

    /// Store used to fetch entities for [`Format::ActiveRecord`].
    pub fn with_store(mut self, store: &'a dyn EntityStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn find(&self, query: &FilterExpr, options: &FindOptions) -> Result<Found<'a>> {
        let q = query.compile()?;
        let request = self.build_request(&q, options)?;
        self.find_compiled(request, options.format)
    }

    pub fn find_ids(&self, query: &FilterExpr, options: &FindOptions) -> Result<Vec<String>> {
        let options = FindOptions {
            format: Format::Ids,
            ..options.clone()
        };
        match self.find(query, &options)? {
            Found::Ids(ids) => Ok(ids),
            _ => Ok(Vec::new()),
        }
    }

    /// Caller-supplied select parameters, then facet knobs, then the
    /// computed query, paging, sort, output format and field list.
    pub fn build_request(&self, q: &str, options: &FindOptions) -> Result<SelectRequest> {
        let page = positive_or(options.page, 1, "page")?;
        let per_page = positive_or(options.per_page, 10, "per_page")?;
        let start = (page - 1)
            .checked_mul(per_page)
            .ok_or_else(|| SolrError::argument(format!("page {page} is out of range")))?;

        let mut request = options.select.clone();
        if !options.facets.is_empty() {
            request
                .set("facet", true)
                .set("facet.field", options.facets.clone())
                .set("facet.limit", -1i64)
                .set("facet.missing", false)
                .set("facet.zeros", false);
        }
        request
            .set("q", q)
            .set("start", start)
            .set("rows", per_page)
            .set("wt", "json")
            .set("fl", options.format.field_list());
        match &options.sort {
            Some(sort) if !sort.is_empty() => {
                request.set("sort", sort.as_str());
            }
            _ => {
                request.remove("sort");
            }
        }
        Ok(request)
    }

    /// Runs an already built request. Paging is read back from its `start`
    /// and `rows`.
    pub fn find_compiled(&self, request: SelectRequest, format: Format) -> Result<Found<'a>> {
        let mut request = request;
        request.set("wt", "json").set("fl", format.field_list());
        let per_page = request
            .get_str("rows")
            .and_then(|r| r.parse::<u64>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(10);
        let start = request
            .get_str("start")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);
        let page = start / per_page + 1;

        let body = self.backend.select(&request)?;
        let response = SelectResponse::parse(&body)?;
        let total = response.num_found();
        debug!(total, returned = response.docs().len(), ?format, "select decoded");

        let found = match format {
            Format::Ids => Found::Ids(response.ids()),
            Format::Hash => Found::Hash(response.raw),
            Format::Document => {
                let items = response
                    .docs()
                    .iter()
                    .cloned()
                    .map(|raw| StoredDocument::new(self.schema, raw))
                    .collect();
                Found::Documents(attach(
                    ResultCollection::new(items, page, per_page, total),
                    response,
                ))
            }
            Format::ActiveRecord => {
                let ids = response.ids();
                let (items, missing) = self.rehydrate(&ids)?;
                let mut collection = ResultCollection::new(items, page, per_page, total);
                collection.missing_ids = missing;
                Found::Entities(attach(collection, response))
            }
        };
        Ok(found)
    }

    /// One store fetch per type, then back into relevance order. Ids the
    /// store no longer has are returned separately.
    fn rehydrate(&self, ids: &[String]) -> Result<(Vec<EntityRef>, Vec<String>)> {
        if ids.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }
        let store = self.store.ok_or_else(|| {
            SolrError::Store("an entity store is required to rehydrate results".to_string())
        })?;

        let mut by_type: Vec<(&str, Vec<String>)> = Vec::new();
        for id in ids {
            let Some((type_name, pk)) = parse_solr_id(id) else {
                return Err(SolrError::Decode(format!("malformed {ID_FIELD} `{id}`")));
            };
            match by_type.iter_mut().find(|(t, _)| *t == type_name) {
                Some((_, pks)) => pks.push(pk.to_string()),
                None => by_type.push((type_name, vec![pk.to_string()])),
            }
        }

        let position: HashMap<&str, usize> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();
        let mut fetched = Vec::with_capacity(ids.len());
        for (type_name, pks) in &by_type {
            fetched.extend(store.find_by_ids(type_name, pks)?);
        }
        fetched.sort_by_key(|e| {
            position
                .get(e.solr_id().as_str())
                .copied()
                .unwrap_or(usize::MAX)
        });

        let found: std::collections::HashSet<String> =
            fetched.iter().map(|e| e.solr_id()).collect();
        let missing: Vec<String> = ids
            .iter()
            .filter(|id| !found.contains(id.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            warn!(
                missing = missing.len(),
                ids = ?missing,
                "index returned ids the store could not resolve; dropping them"
            );
        }
        Ok((fetched, missing))
    }
}

fn attach<T>(mut collection: ResultCollection<T>, response: SelectResponse) -> ResultCollection<T> {
    collection.facets = response.facets();
    collection.response = Some(response);
    collection
}

fn positive_or(value: Option<i64>, default: i64, name: &str) -> Result<i64> {
    match value {
        None => Ok(default),
        Some(n) if n > 0 => Ok(n),
        Some(_) => Err(SolrError::argument(format!(
            "{name} option must be blank or an integer > 0"
        ))),
    }
}
