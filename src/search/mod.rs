//! Read path: query compilation, request building and result shaping.
//!
//! - [`lql`]: filter expressions to escaped Lucene query strings.
//! - [`param_query`]: request parameters with range/prefix suffixes to a query.
//! - [`faceted`]: dismax request policy over untrusted parameters.
//! - [`finder`]: executes selects and rehydrates results.

pub mod collection;
pub mod faceted;
pub mod finder;
pub mod lql;
pub mod param_query;
pub mod params;
pub mod request;
pub mod response;
pub mod stored;

pub use collection::ResultCollection;
pub use faceted::{CompiledQuery, FacetedQueryBuilder, ScoringKnobs};
pub use finder::{FindOptions, Finder, Format, Found};
pub use lql::{FilterExpr, MATCH_ALL, QueryArg, escape_term};
pub use param_query::ParamQuery;
pub use params::{ParamValue, Params};
pub use request::{SelectRequest, SelectValue};
pub use response::SelectResponse;
pub use stored::StoredDocument;
