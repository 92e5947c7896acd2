//! Field definitions shared by every indexed type.
//!
//! Registration happens once at start-up. A name may be registered any number
//! of times with identical options (several types often index the same field),
//! but a differing definition is a [`SolrError::ConfigConflict`].

use std::collections::HashMap;

use quick_xml::escape::escape;

use crate::error::{Result, SolrError};

/// Unique key field carried by every document.
pub const ID_FIELD: &str = "solr_id";
/// Type tag field carried by every document.
pub const TYPE_FIELD: &str = "solr_type";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    String,
    Text,
    Integer,
    Long,
    Float,
    Double,
    Boolean,
    Date,
    /// Any other type name declared in the engine schema.
    Custom(String),
}

impl FieldType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::String => "string",
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Custom(name) => name,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "string" => Self::String,
            "text" => Self::Text,
            "integer" | "int" => Self::Integer,
            "long" => Self::Long,
            "float" => Self::Float,
            "double" => Self::Double,
            "boolean" | "bool" => Self::Boolean,
            "date" => Self::Date,
            _ => Self::Custom(s.to_string()),
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDefinition {
    pub name: String,
    pub field_type: FieldType,
    pub indexed: bool,
    pub stored: bool,
    pub multi_valued: bool,
    pub required: bool,
    pub copy_to: Option<String>,
}

impl FieldDefinition {
    /// A string field with the registration defaults: indexed, not stored,
    /// single-valued, optional.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: FieldType::String,
            indexed: true,
            stored: false,
            multi_valued: false,
            required: false,
            copy_to: None,
        }
    }

    pub fn with_type(mut self, field_type: FieldType) -> Self {
        self.field_type = field_type;
        self
    }

    pub fn stored(mut self, stored: bool) -> Self {
        self.stored = stored;
        self
    }

    pub fn multi_valued(mut self, multi_valued: bool) -> Self {
        self.multi_valued = multi_valued;
        self
    }

    pub fn indexed(mut self, indexed: bool) -> Self {
        self.indexed = indexed;
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn copy_to(mut self, dest: impl Into<String>) -> Self {
        self.copy_to = Some(dest.into());
        self
    }

    fn describe(&self) -> String {
        format!(
            "type={} indexed={} stored={} multi_valued={} required={} copy_to={}",
            self.field_type,
            self.indexed,
            self.stored,
            self.multi_valued,
            self.required,
            self.copy_to.as_deref().unwrap_or("-")
        )
    }
}

#[derive(Debug, Default, Clone)]
pub struct SchemaRegistry {
    fields: Vec<FieldDefinition>,
    by_name: HashMap<String, usize>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, field: FieldDefinition) -> Result<()> {
        if let Some(&idx) = self.by_name.get(&field.name) {
            let existing = &self.fields[idx];
            if *existing == field {
                return Ok(());
            }
            return Err(SolrError::ConfigConflict {
                field: field.name.clone(),
                existing: existing.describe(),
                attempted: field.describe(),
            });
        }
        self.by_name.insert(field.name.clone(), self.fields.len());
        self.fields.push(field);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&FieldDefinition> {
        self.by_name.get(name).map(|&idx| &self.fields[idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn is_date(&self, name: &str) -> bool {
        self.get(name)
            .is_some_and(|f| f.field_type == FieldType::Date)
    }

    /// Fields in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// `<field/>` and `<copyField/>` lines for the engine's schema file,
    /// starting with the two built-in fields.
    pub fn render_fields_xml(&self) -> String {
        let mut out = format!(
            "<field name=\"{ID_FIELD}\" type=\"string\" indexed=\"true\" stored=\"true\" required=\"true\"/>\n\
             <field name=\"{TYPE_FIELD}\" type=\"string\" indexed=\"true\" stored=\"true\" required=\"true\"/>\n"
        );
        for f in &self.fields {
            out.push_str(&format!(
                "<field name=\"{}\" type=\"{}\" indexed=\"{}\" stored=\"{}\" multiValued=\"{}\" required=\"{}\"/>\n",
                escape(f.name.as_str()),
                escape(f.field_type.as_str()),
                f.indexed,
                f.stored,
                f.multi_valued,
                f.required
            ));
        }
        for f in &self.fields {
            if let Some(dest) = &f.copy_to {
                out.push_str(&format!(
                    "<copyField source=\"{}\" dest=\"{}\"/>\n",
                    escape(f.name.as_str()),
                    escape(dest.as_str())
                ));
            }
        }
        out
    }
}
