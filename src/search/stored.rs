//! Field access over stored documents returned by a select.

use serde_json::Value as Json;

use crate::error::{Result, SolrError};
use crate::model::types::parse_index_date;
use crate::model::{Value, parse_solr_id};
use crate::schema::{ID_FIELD, SchemaRegistry};
use crate::search::response::{RawDoc, first_str};

/// One result document, read through the schema: only registered, stored
/// fields can be read, single-valued fields come back as a scalar and index
/// dates come back as timestamps.
#[derive(Debug, Clone)]
pub struct StoredDocument<'s> {
    schema: &'s SchemaRegistry,
    raw: RawDoc,
}

impl<'s> StoredDocument<'s> {
    pub fn new(schema: &'s SchemaRegistry, raw: RawDoc) -> Self {
        Self { schema, raw }
    }

    pub fn solr_id(&self) -> &str {
        self.raw.get(ID_FIELD).and_then(first_str).unwrap_or_default()
    }

    pub fn type_name(&self) -> &str {
        parse_solr_id(self.solr_id()).map_or("", |(t, _)| t)
    }

    /// Primary key part of the id.
    pub fn id(&self) -> &str {
        parse_solr_id(self.solr_id()).map_or("", |(_, pk)| pk)
    }

    pub fn score(&self) -> Option<f64> {
        self.raw.get("score").and_then(Json::as_f64)
    }

    pub fn raw(&self) -> &RawDoc {
        &self.raw
    }

    /// Reads a field. A trailing `?` is ignored so `published?` reads
    /// `published`.
    pub fn get(&self, field: &str) -> Result<Value> {
        let field = field.strip_suffix('?').unwrap_or(field);
        match field {
            ID_FIELD => return Ok(Value::Str(self.solr_id().to_string())),
            "id" => return Ok(Value::Str(self.id().to_string())),
            "type_name" => return Ok(Value::Str(self.type_name().to_string())),
            "score" => return Ok(self.score().map_or(Value::Null, Value::Float)),
            _ => {}
        }

        let def = self
            .schema
            .get(field)
            .ok_or_else(|| SolrError::argument(format!("undefined solr field: {field}")))?;
        if !def.stored {
            return Err(SolrError::argument(format!(
                "solr field {field} is not stored"
            )));
        }

        let Some(raw) = self.raw.get(field) else {
            return Ok(if def.multi_valued {
                Value::List(Vec::new())
            } else {
                Value::Null
            });
        };
        let values: Vec<&Json> = match raw {
            Json::Array(items) => items.iter().collect(),
            other => vec![other],
        };
        if def.multi_valued {
            Ok(Value::List(values.into_iter().map(from_json).collect()))
        } else {
            Ok(values.first().map_or(Value::Null, |v| from_json(v)))
        }
    }
}

fn from_json(v: &Json) -> Value {
    match v {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => n
            .as_i64()
            .map(Value::Int)
            .or_else(|| n.as_f64().map(Value::Float))
            .unwrap_or(Value::Null),
        Json::String(s) => match parse_index_date(s) {
            Some(dt) => Value::Timestamp(dt.and_utc().fixed_offset()),
            None => Value::Str(s.clone()),
        },
        Json::Array(items) => Value::List(items.iter().map(from_json).collect()),
        Json::Object(_) => Value::Str(v.to_string()),
    }
}
