//! Start-up configuration surface.
//!
//! An [`IndexRegistry`] is built once, before any change is dispatched, by the
//! code that defines each entity type. After that it is only read, and it is
//! passed by reference to the dispatcher, the document builder and the query
//! side.

use std::collections::HashMap;

use crate::error::{Result, SolrError};
use crate::index::document::{FieldExtractor, IndexedTypeDescriptor, SaveCondition};
use crate::index::observer::{ObserverGraph, ObserverRule};
use crate::index::types::{AssociationKind, TypeInfo, TypeTable};
use crate::schema::{FieldDefinition, FieldType, SchemaRegistry};

/// Options shared by every field-declaring call. Unset values take the
/// schema defaults (string, indexed, not stored, single-valued, optional).
#[derive(Debug, Clone, Default)]
pub struct FieldOptions {
    /// Index field name when it differs from the attribute/method name.
    pub as_name: Option<String>,
    pub field_type: Option<FieldType>,
    pub indexed: Option<bool>,
    pub stored: Option<bool>,
    pub multi_valued: Option<bool>,
    pub required: Option<bool>,
    pub copy_to: Option<String>,
}

impl FieldOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_name(mut self, name: impl Into<String>) -> Self {
        self.as_name = Some(name.into());
        self
    }

    pub fn with_type(mut self, field_type: FieldType) -> Self {
        self.field_type = Some(field_type);
        self
    }

    pub fn stored(mut self) -> Self {
        self.stored = Some(true);
        self
    }

    pub fn indexed(mut self, indexed: bool) -> Self {
        self.indexed = Some(indexed);
        self
    }

    pub fn multi_valued(mut self, multi_valued: bool) -> Self {
        self.multi_valued = Some(multi_valued);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = Some(true);
        self
    }

    pub fn copy_to(mut self, dest: impl Into<String>) -> Self {
        self.copy_to = Some(dest.into());
        self
    }

    fn definition(&self, name: &str) -> FieldDefinition {
        let mut def = FieldDefinition::new(name);
        if let Some(t) = &self.field_type {
            def.field_type = t.clone();
        }
        if let Some(v) = self.indexed {
            def.indexed = v;
        }
        if let Some(v) = self.stored {
            def.stored = v;
        }
        if let Some(v) = self.multi_valued {
            def.multi_valued = v;
        }
        if let Some(v) = self.required {
            def.required = v;
        }
        def.copy_to = self.copy_to.clone();
        def
    }
}

/// Watch on an association for a computed field: when `attributes` change
/// on the associated type, `return_association` leads back to the owners.
#[derive(Debug, Clone)]
pub struct AssociationWatch {
    pub name: String,
    pub attributes: Vec<String>,
    pub return_association: String,
}

#[derive(Debug, Clone, Default)]
pub struct MethodOptions {
    pub field: FieldOptions,
    /// Local attributes that feed the method.
    pub attributes: Vec<String>,
    pub associations: Vec<AssociationWatch>,
}

#[derive(Debug, Clone, Default)]
pub struct AssociationOptions {
    pub field: FieldOptions,
    /// Remote attributes to observe; defaults to the remote method alone.
    pub association_attributes: Option<Vec<String>>,
    /// Local attributes that also force a reindex.
    pub attributes: Vec<String>,
    /// Association leading from the remote type back to this one. Guessed
    /// from the type name when absent.
    pub return_association: Option<String>,
}

#[derive(Debug, Default)]
pub struct IndexRegistry {
    schema: SchemaRegistry,
    types: TypeTable,
    descriptors: HashMap<String, IndexedTypeDescriptor>,
    observers: ObserverGraph,
}

impl IndexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema(&self) -> &SchemaRegistry {
        &self.schema
    }

    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    pub fn observer_graph(&self) -> &ObserverGraph {
        &self.observers
    }

    /// Declares a type tag with its parent; add association reflections on
    /// the returned record.
    pub fn declare_type(&mut self, name: &str, parent: Option<&str>) -> &mut TypeInfo {
        self.observers.invalidate();
        self.types.declare(name, parent)
    }

    pub fn register_field(&mut self, field: FieldDefinition) -> Result<()> {
        self.schema.register(field)
    }

    /// The descriptor configured on `type_name` itself or, failing that, on
    /// its nearest ancestor.
    pub fn descriptor_for(&self, type_name: &str) -> Option<&IndexedTypeDescriptor> {
        self.types
            .ancestry(type_name)
            .iter()
            .find_map(|t| self.descriptors.get(t))
    }

    /// Observer rules that fire on changes to `type_name`.
    pub fn observers_for(&self, type_name: &str) -> std::sync::Arc<[ObserverRule]> {
        self.observers.observers_for(type_name, &self.types)
    }

    /// Every type carrying its own powered descriptor.
    pub fn indexed_types(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .descriptors
            .values()
            .filter(|d| d.powered)
            .map(|d| d.type_name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    /// A subtype starts from a copy of its nearest ancestor's configuration.
    fn descriptor_mut(&mut self, type_name: &str) -> &mut IndexedTypeDescriptor {
        if !self.descriptors.contains_key(type_name) {
            let inherited = self
                .descriptor_for(type_name)
                .map(|d| IndexedTypeDescriptor {
                    type_name: type_name.to_string(),
                    ..d.clone()
                })
                .unwrap_or_else(|| IndexedTypeDescriptor::new(type_name));
            self.descriptors.insert(type_name.to_string(), inherited);
        }
        self.descriptors
            .entry(type_name.to_string())
            .or_insert_with(|| IndexedTypeDescriptor::new(type_name))
    }

    /// Indexes plain attributes, one field each. The attributes become
    /// watched attributes of the type.
    pub fn index_attribute(
        &mut self,
        type_name: &str,
        attributes: &[&str],
        options: FieldOptions,
    ) -> Result<()> {
        if attributes.is_empty() {
            return Err(SolrError::argument("at least 1 attribute name is required"));
        }
        if options.multi_valued.is_some() {
            return Err(SolrError::argument(
                "multi_valued is assumed false for model attributes",
            ));
        }
        if attributes.len() > 1 && options.as_name.is_some() {
            return Err(SolrError::argument(
                "as option only allowed with single attribute names",
            ));
        }

        for attr in attributes {
            let field = options.as_name.clone().unwrap_or_else(|| attr.to_string());
            let mut def = options.definition(&field);
            def.multi_valued = false;
            self.schema.register(def)?;
            self.descriptor_mut(type_name)
                .add_field(&field, FieldExtractor::direct(*attr))?;
        }

        let descriptor = self.descriptor_mut(type_name);
        descriptor.powered = true;
        descriptor.watch(attributes.iter().copied());
        Ok(())
    }

    /// Indexes the return value of a computed method.
    pub fn index_method(&mut self, type_name: &str, method: &str, options: MethodOptions) -> Result<()> {
        let rules = options
            .associations
            .iter()
            .map(|watch| {
                ObserverGraph::resolve(
                    ObserverRule {
                        observing_type: type_name.to_string(),
                        association: watch.name.clone(),
                        observed_type: String::new(),
                        observed_attributes: watch.attributes.iter().cloned().collect(),
                        return_association: watch.return_association.clone(),
                    },
                    &self.types,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        let field = options
            .field
            .as_name
            .clone()
            .unwrap_or_else(|| method.to_string());
        self.schema.register(options.field.definition(&field))?;

        let descriptor = self.descriptor_mut(type_name);
        descriptor.add_field(&field, FieldExtractor::direct(method))?;
        descriptor.watch(options.attributes.iter().cloned());
        descriptor.powered = true;
        for rule in rules {
            self.observers.insert(rule);
        }
        Ok(())
    }

    /// Indexes `remote_method` of every member of `association`, and
    /// observes the associated type so its changes propagate back here.
    pub fn index_association(
        &mut self,
        type_name: &str,
        association: &str,
        remote_method: &str,
        mut options: AssociationOptions,
    ) -> Result<()> {
        let reflection = self
            .types
            .association(type_name, association)
            .ok_or_else(|| SolrError::InvalidAssociation {
                type_name: type_name.to_string(),
                association: association.to_string(),
                reason: "association is not defined".into(),
            })?;
        let kind = reflection.kind;

        // Nothing is registered until the observer rule checks out, so a
        // rejected call can be retried with corrected options.
        let observed_attributes = options
            .association_attributes
            .take()
            .unwrap_or_else(|| vec![remote_method.to_string()]);
        let return_association = options
            .return_association
            .take()
            .unwrap_or_else(|| default_return_association(type_name, kind));
        let rule = ObserverGraph::resolve(
            ObserverRule {
                observing_type: type_name.to_string(),
                association: association.to_string(),
                observed_type: String::new(),
                observed_attributes: observed_attributes.into_iter().collect(),
                return_association,
            },
            &self.types,
        )?;

        if options.field.multi_valued.is_none() {
            options.field.multi_valued = Some(kind.is_collection());
        }
        let field = options
            .field
            .as_name
            .clone()
            .unwrap_or_else(|| association.to_string());
        self.schema.register(options.field.definition(&field))?;

        let descriptor = self.descriptor_mut(type_name);
        descriptor.add_field(&field, FieldExtractor::indirect(association, remote_method))?;
        descriptor.watch(options.attributes);
        descriptor.eager_load(association);
        descriptor.powered = true;
        self.observers.insert(rule);
        Ok(())
    }

    pub fn save_if(&mut self, type_name: &str, condition: SaveCondition) {
        self.descriptor_mut(type_name).save_if = Some(condition);
    }

    pub fn save_unless(&mut self, type_name: &str, condition: SaveCondition) {
        self.descriptor_mut(type_name).save_unless = Some(condition);
    }
}

/// `Listing` observed through a has-one/has-many is reached back via
/// `listing`; through a belongs-to/many-to-many via `listings`.
fn default_return_association(type_name: &str, kind: AssociationKind) -> String {
    match kind {
        AssociationKind::HasOne | AssociationKind::HasMany => type_name.to_lowercase(),
        AssociationKind::BelongsTo | AssociationKind::HasAndBelongsToMany => {
            pluralize(&snake_case(type_name))
        }
    }
}

fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn pluralize(word: &str) -> String {
    let consonant_y = word.ends_with('y')
        && !matches!(
            word.chars().rev().nth(1),
            Some('a' | 'e' | 'i' | 'o' | 'u') | None
        );
    if consonant_y {
        format!("{}ies", &word[..word.len() - 1])
    } else if ["s", "x", "z", "ch", "sh"].iter().any(|s| word.ends_with(s)) {
        format!("{word}es")
    } else {
        format!("{word}s")
    }
}
