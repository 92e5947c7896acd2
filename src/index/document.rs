//! Rendering entities into index documents.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::{Result, SolrError};
use crate::index::registry::IndexRegistry;
use crate::model::{Entity, Scalar, Value};
use crate::schema::{ID_FIELD, TYPE_FIELD};

/// How a field's values are pulled out of an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldExtractor {
    /// An attribute or computed method on the entity itself.
    Direct(String),
    /// A method on every member of an association.
    Indirect {
        association: String,
        remote_method: String,
    },
}

impl FieldExtractor {
    pub fn direct(name: impl Into<String>) -> Self {
        Self::Direct(name.into())
    }

    pub fn indirect(association: impl Into<String>, remote_method: impl Into<String>) -> Self {
        Self::Indirect {
            association: association.into(),
            remote_method: remote_method.into(),
        }
    }

    fn extract(&self, entity: &dyn Entity) -> Result<Value> {
        match self {
            Self::Direct(name) => read_member(entity, name),
            Self::Indirect {
                association,
                remote_method,
            } => {
                let related = entity.related(association).ok_or_else(|| {
                    SolrError::InvalidAssociation {
                        type_name: entity.type_name().to_string(),
                        association: association.clone(),
                        reason: "association is not defined".into(),
                    }
                })?;
                let values = related
                    .into_members()
                    .iter()
                    .map(|member| read_member(member.as_ref(), remote_method))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::List(values))
            }
        }
    }
}

fn read_member(entity: &dyn Entity, name: &str) -> Result<Value> {
    entity.read(name).ok_or_else(|| SolrError::UnknownAttribute {
        type_name: entity.type_name().to_string(),
        name: name.to_string(),
    })
}

pub type Predicate = Arc<dyn Fn(&dyn Entity) -> bool + Send + Sync>;

/// Inclusion/exclusion test evaluated against an entity after it is saved.
#[derive(Clone)]
pub enum SaveCondition {
    /// Truthiness of a named attribute or method.
    Method(String),
    Predicate(Predicate),
}

impl SaveCondition {
    pub fn method(name: impl Into<String>) -> Self {
        Self::Method(name.into())
    }

    pub fn predicate(f: impl Fn(&dyn Entity) -> bool + Send + Sync + 'static) -> Self {
        Self::Predicate(Arc::new(f))
    }

    pub fn evaluate(&self, entity: &dyn Entity) -> Result<bool> {
        match self {
            Self::Method(name) => Ok(read_member(entity, name)?.is_truthy()),
            Self::Predicate(f) => Ok(f(entity)),
        }
    }
}

impl std::fmt::Debug for SaveCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Method(name) => write!(f, "Method({name})"),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Per-type indexing configuration. Built during start-up, read-only after.
#[derive(Debug, Clone, Default)]
pub struct IndexedTypeDescriptor {
    pub type_name: String,
    /// Field name to extractor, in declaration order.
    pub fields: Vec<(String, FieldExtractor)>,
    /// Local attributes whose change forces a reindex.
    pub watched_attributes: BTreeSet<String>,
    pub eager_load: Vec<String>,
    pub save_if: Option<SaveCondition>,
    pub save_unless: Option<SaveCondition>,
    pub powered: bool,
}

impl IndexedTypeDescriptor {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            ..Self::default()
        }
    }

    pub fn add_field(&mut self, field: &str, extractor: FieldExtractor) -> Result<()> {
        if self.fields.iter().any(|(name, _)| name == field) {
            return Err(SolrError::argument(format!(
                "the solr field '{field}' is already configured for {}",
                self.type_name
            )));
        }
        self.fields.push((field.to_string(), extractor));
        Ok(())
    }

    pub fn watch<I, S>(&mut self, attributes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.watched_attributes
            .extend(attributes.into_iter().map(Into::into));
    }

    pub fn eager_load(&mut self, association: &str) {
        if !self.eager_load.iter().any(|a| a == association) {
            self.eager_load.push(association.to_string());
        }
    }

    pub fn watches_any<S: AsRef<str>>(&self, dirty: &[S]) -> bool {
        dirty
            .iter()
            .any(|d| self.watched_attributes.contains(d.as_ref()))
    }
}

/// Flattened field → values snapshot of one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct SolrDocument {
    fields: Vec<(String, Vec<Scalar>)>,
}

impl SolrDocument {
    pub fn new(type_name: &str, primary_key: &str) -> Self {
        Self {
            fields: vec![
                (
                    ID_FIELD.to_string(),
                    vec![Scalar::Str(crate::model::solr_id(type_name, primary_key))],
                ),
                (TYPE_FIELD.to_string(), vec![Scalar::Str(type_name.to_string())]),
            ],
        }
    }

    pub fn id(&self) -> &str {
        self.first_str(ID_FIELD).unwrap_or_default()
    }

    pub fn type_name(&self) -> &str {
        self.first_str(TYPE_FIELD).unwrap_or_default()
    }

    fn first_str(&self, field: &str) -> Option<&str> {
        match self.get(field)?.first()? {
            Scalar::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn get(&self, field: &str) -> Option<&[Scalar]> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, values)| values.as_slice())
    }

    /// Sets a field, replacing any previous values for it.
    pub fn set(&mut self, field: &str, values: Vec<Scalar>) {
        if let Some(slot) = self.fields.iter_mut().find(|(name, _)| name == field) {
            slot.1 = values;
        } else {
            self.fields.push((field.to_string(), values));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Scalar])> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }
}

impl Serialize for SolrDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Renders entities through their type's configured extractors.
#[derive(Clone, Copy)]
pub struct DocumentBuilder<'r> {
    registry: &'r IndexRegistry,
}

impl<'r> DocumentBuilder<'r> {
    pub fn new(registry: &'r IndexRegistry) -> Self {
        Self { registry }
    }

    pub fn build(&self, entity: &dyn Entity) -> Result<SolrDocument> {
        let descriptor = self
            .registry
            .descriptor_for(entity.type_name())
            .ok_or_else(|| SolrError::UnknownType(entity.type_name().to_string()))?;

        let mut doc = SolrDocument::new(entity.type_name(), &entity.primary_key());
        for (field, extractor) in &descriptor.fields {
            let values = extractor.extract(entity)?.into_scalars();
            if !values.is_empty() {
                doc.set(field, values);
            }
        }
        Ok(doc)
    }

    /// Powered, passes `save_if` (when set) and fails `save_unless` (when set).
    pub fn saveable(&self, entity: &dyn Entity) -> Result<bool> {
        let Some(descriptor) = self.registry.descriptor_for(entity.type_name()) else {
            return Ok(false);
        };
        if !descriptor.powered {
            return Ok(false);
        }
        if let Some(cond) = &descriptor.save_if
            && !cond.evaluate(entity)?
        {
            return Ok(false);
        }
        if let Some(cond) = &descriptor.save_unless
            && cond.evaluate(entity)?
        {
            return Ok(false);
        }
        Ok(true)
    }

    pub fn is_powered(&self, type_name: &str) -> bool {
        self.registry
            .descriptor_for(type_name)
            .is_some_and(|d| d.powered)
    }
}
