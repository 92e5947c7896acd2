//! Request parameters to a query string, with range/prefix/any-of suffixes.
//!
//! A parameter named after an indexed field filters on it. The name may
//! carry a suffix:
//!
//! | parameter            | clause                 |
//! |----------------------|------------------------|
//! | `price`              | `price:?`              |
//! | `price-min`          | `price:[? TO *]`       |
//! | `price-max`          | `price:[* TO ?]`       |
//! | `price-range=1,9`    | `price:[? TO ?]`       |
//! | `title-begins-with`  | `title:?*`             |
//! | `city-in`            | `(city:? OR city:?)`   |
//!
//! The default search field contributes a bare `?`. Other parameters are
//! ignored.

use crate::error::{Result, SolrError};
use crate::model::types::{DATE_FORMAT, parse_loose_date};
use crate::schema::{ID_FIELD, SchemaRegistry, TYPE_FIELD};
use crate::search::lql::{FilterExpr, MATCH_ALL, QueryArg};
use crate::search::params::Params;

#[derive(Debug, Clone)]
pub struct ParamQuery<'s> {
    schema: &'s SchemaRegistry,
    default_field: String,
    default_operator: String,
}

impl<'s> ParamQuery<'s> {
    pub fn new(schema: &'s SchemaRegistry) -> Self {
        Self {
            schema,
            default_field: "q".to_string(),
            default_operator: "AND".to_string(),
        }
    }

    pub fn default_field(mut self, field: impl Into<String>) -> Self {
        self.default_field = field.into();
        self
    }

    pub fn default_operator(mut self, op: impl Into<String>) -> Self {
        self.default_operator = op.into();
        self
    }

    fn searchable(&self, field: &str) -> bool {
        self.schema.contains(field)
            || field == ID_FIELD
            || field == TYPE_FIELD
            || field == self.default_field
    }

    pub fn to_expr(&self, params: &Params) -> Result<FilterExpr> {
        let mut clauses: Vec<String> = Vec::new();
        let mut args: Vec<QueryArg> = Vec::new();

        for (key, value) in params.iter() {
            let (field, suffix) = split_suffix(key);
            if !self.searchable(field) {
                continue;
            }
            let values = value
                .values()
                .into_iter()
                .map(|v| self.convert(field, v))
                .collect::<Result<Vec<String>>>()?;
            if values.is_empty() {
                continue;
            }

            match suffix {
                None => {
                    for v in values {
                        if field == self.default_field {
                            clauses.push("?".to_string());
                        } else {
                            clauses.push(format!("{field}:?"));
                        }
                        args.push(QueryArg::Scalar(v));
                    }
                }
                Some("min") => {
                    for v in values {
                        clauses.push(format!("{field}:[? TO *]"));
                        args.push(QueryArg::Scalar(v));
                    }
                }
                Some("max") => {
                    for v in values {
                        clauses.push(format!("{field}:[* TO ?]"));
                        args.push(QueryArg::Scalar(v));
                    }
                }
                Some("range") => {
                    for v in values {
                        let (min, max) = v.split_once(',').ok_or_else(|| {
                            SolrError::argument(format!("{key} expects 'min,max', got '{v}'"))
                        })?;
                        clauses.push(format!("{field}:[? TO ?]"));
                        args.push(QueryArg::from(min.trim()));
                        args.push(QueryArg::from(max.trim()));
                    }
                }
                Some("begins-with") => {
                    for v in values {
                        clauses.push(format!("{field}:?*"));
                        args.push(QueryArg::Scalar(v));
                    }
                }
                Some("in") => {
                    let alternatives = vec![format!("{field}:?"); values.len()];
                    clauses.push(format!("({})", alternatives.join(" OR ")));
                    args.extend(values.into_iter().map(QueryArg::Scalar));
                }
                Some(other) => {
                    return Err(SolrError::argument(format!(
                        "unknown suffix type `{other}` for parameter query"
                    )));
                }
            }
        }

        if clauses.is_empty() {
            return Ok(FilterExpr::literal(MATCH_ALL));
        }
        let joiner = format!(" {} ", self.default_operator);
        Ok(FilterExpr::template(clauses.join(&joiner), args))
    }

    pub fn compile(&self, params: &Params) -> Result<String> {
        self.to_expr(params)?.compile()
    }

    fn convert(&self, field: &str, value: &str) -> Result<String> {
        if !self.schema.is_date(field) {
            return Ok(value.to_string());
        }
        parse_loose_date(value)
            .map(|d| d.format(DATE_FORMAT).to_string())
            .ok_or_else(|| SolrError::argument(format!("'{value}' is not a date for {field}")))
    }
}

/// `price-min` → (`price`, `min`); the field is the shortest prefix before a
/// dash.
fn split_suffix(key: &str) -> (&str, Option<&str>) {
    match key.split_once('-') {
        Some((field, suffix)) if !field.is_empty() => (field, Some(suffix)),
        _ => (key, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDefinition, FieldType};

    fn schema() -> SchemaRegistry {
        let mut s = SchemaRegistry::new();
        for f in ["city", "price", "title"] {
            s.register(FieldDefinition::new(f)).unwrap();
        }
        s.register(FieldDefinition::new("listed_on").with_type(FieldType::Date))
            .unwrap();
        s
    }

    #[test]
    fn suffixes_compile_to_ranges_and_prefixes() {
        let schema = schema();
        let params = Params::new()
            .with("price-min", "10")
            .with("price-max", "90")
            .with("title-begins-with", "Lo")
            .with("city-in", vec!["Paris", "New York"])
            .with("unrelated", "x");
        let q = ParamQuery::new(&schema).compile(&params).unwrap();
        assert_eq!(
            q,
            "price:[10 TO *] AND price:[* TO 90] AND title:Lo* AND (city:Paris OR city:New York)"
        );
    }

    #[test]
    fn range_splits_on_comma() {
        let schema = schema();
        let params = Params::new().with("price-range", "5,50");
        assert_eq!(
            ParamQuery::new(&schema).compile(&params).unwrap(),
            "price:[5 TO 50]"
        );
    }

    #[test]
    fn default_field_is_bare_and_values_are_escaped() {
        let schema = schema();
        let params = Params::new().with("q", "red+barn").with("solr_type", "Listing");
        assert_eq!(
            ParamQuery::new(&schema).compile(&params).unwrap(),
            "red\\+barn AND solr_type:Listing"
        );
    }

    #[test]
    fn dates_are_normalized() {
        let schema = schema();
        let params = Params::new().with("listed_on-min", "2024-03-09");
        assert_eq!(
            ParamQuery::new(&schema).compile(&params).unwrap(),
            "listed_on:[2024\\-03\\-09T00\\:00\\:00Z TO *]"
        );
    }

    #[test]
    fn nothing_searchable_matches_all() {
        let schema = schema();
        let params = Params::new().with("page", "2");
        assert_eq!(ParamQuery::new(&schema).compile(&params).unwrap(), "*:*");
    }

    #[test]
    fn unknown_suffix_is_rejected() {
        let schema = schema();
        let params = Params::new().with("price-between", "1");
        assert!(matches!(
            ParamQuery::new(&schema).compile(&params),
            Err(SolrError::Argument(_))
        ));
    }

    #[test]
    fn or_operator_is_configurable() {
        let schema = schema();
        let params = Params::new().with("city", vec!["Paris", "Rome"]);
        assert_eq!(
            ParamQuery::new(&schema)
                .default_operator("OR")
                .compile(&params)
                .unwrap(),
            "city:Paris OR city:Rome"
        );
    }
}
