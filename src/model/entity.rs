//! Accessor capability over the host application's entities.
//!
//! The indexing layer never reflects on concrete types. Whatever owns the
//! entities (an ORM, an in-memory graph, a test fixture) implements
//! [`Entity`] for attribute and association reads and [`EntityStore`] for
//! the batch fetches used by rehydration and bulk reindexing.

use std::sync::Arc;

use crate::error::Result;
use crate::model::types::Value;

pub type EntityRef = Arc<dyn Entity>;

pub trait Entity {
    /// Concrete type tag, e.g. `"Widget"`.
    fn type_name(&self) -> &str;

    fn primary_key(&self) -> String;

    /// Reads an attribute or computed method. `None` means the entity has no
    /// member by that name; a nil value is `Some(Value::Null)`.
    fn read(&self, name: &str) -> Option<Value>;

    /// Follows an association. `None` means the association is undefined.
    fn related(&self, association: &str) -> Option<Related>;

    /// `"{Type}-{primaryKey}"`
    fn solr_id(&self) -> String {
        solr_id(self.type_name(), &self.primary_key())
    }
}

/// Result of following an association: nothing, a single object, or a collection.
#[derive(Clone, Default)]
pub enum Related {
    #[default]
    Nil,
    One(EntityRef),
    Many(Vec<EntityRef>),
}

impl Related {
    /// Normalizes to a list, dropping nil.
    pub fn into_members(self) -> Vec<EntityRef> {
        match self {
            Related::Nil => Vec::new(),
            Related::One(e) => vec![e],
            Related::Many(es) => es,
        }
    }
}

impl From<Option<EntityRef>> for Related {
    fn from(v: Option<EntityRef>) -> Self {
        v.map_or(Related::Nil, Related::One)
    }
}

impl From<Vec<EntityRef>> for Related {
    fn from(v: Vec<EntityRef>) -> Self {
        Related::Many(v)
    }
}

impl std::fmt::Debug for Related {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Related::Nil => f.write_str("Nil"),
            Related::One(e) => write!(f, "One({})", e.solr_id()),
            Related::Many(es) => f
                .debug_list()
                .entries(es.iter().map(|e| e.solr_id()))
                .finish(),
        }
    }
}

/// Batch access to persisted entities, one call per type.
pub trait EntityStore {
    /// Fetches the live entities among `ids`. Ids that no longer resolve are
    /// simply absent from the result; order is unspecified.
    fn find_by_ids(&self, type_name: &str, ids: &[String]) -> Result<Vec<EntityRef>>;

    /// One page of all entities of exactly `type_name`, in a stable order.
    fn find_page(&self, type_name: &str, offset: usize, limit: usize) -> Result<Vec<EntityRef>>;
}

pub fn solr_id(type_name: &str, primary_key: &str) -> String {
    format!("{type_name}-{primary_key}")
}

/// Splits `"Type-pk"` into its type tag and primary key.
pub fn parse_solr_id(id: &str) -> Option<(&str, &str)> {
    let (type_name, pk) = id.split_once('-')?;
    if type_name.is_empty() || pk.is_empty() {
        return None;
    }
    Some((type_name, pk))
}
