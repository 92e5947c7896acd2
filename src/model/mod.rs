//! Entity-facing data model: attribute values and the accessor capability
//! the indexing layer reads through.

pub mod entity;
pub mod types;

pub use entity::{Entity, EntityRef, EntityStore, Related, parse_solr_id, solr_id};
pub use types::{Scalar, Value};
