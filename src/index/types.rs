//! Type tags, their declared parents, and association reflections.
//!
//! Single-table-inheritance hierarchies are modelled as a plain table from
//! type tag to parent tag. The root persistence base is never declared, so
//! walking parents stops at the topmost application type.

use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationKind {
    BelongsTo,
    HasOne,
    HasMany,
    HasAndBelongsToMany,
}

impl AssociationKind {
    /// Whether the association yields a collection.
    pub fn is_collection(self) -> bool {
        matches!(self, Self::HasMany | Self::HasAndBelongsToMany)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationReflection {
    pub name: String,
    pub kind: AssociationKind,
    /// Type tag of the related entities.
    pub target_type: String,
    pub polymorphic: bool,
    /// Name of the polymorphic interface on the other side (`as:`), if any.
    pub inverse_as: Option<String>,
    /// Intermediate association for indirect (`through:`) associations.
    pub through: Option<String>,
    /// Members removed from the collection are deleted from the store.
    pub dependent_delete_all: bool,
}

impl AssociationReflection {
    pub fn new(name: impl Into<String>, kind: AssociationKind, target_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            target_type: target_type.into(),
            polymorphic: false,
            inverse_as: None,
            through: None,
            dependent_delete_all: false,
        }
    }

    pub fn polymorphic(mut self) -> Self {
        self.polymorphic = true;
        self
    }

    pub fn inverse_as(mut self, name: impl Into<String>) -> Self {
        self.inverse_as = Some(name.into());
        self
    }

    pub fn through(mut self, name: impl Into<String>) -> Self {
        self.through = Some(name.into());
        self
    }

    pub fn dependent_delete_all(mut self) -> Self {
        self.dependent_delete_all = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct TypeInfo {
    pub name: String,
    pub parent: Option<String>,
    pub associations: Vec<AssociationReflection>,
}

impl TypeInfo {
    pub fn association(&mut self, reflection: AssociationReflection) -> &mut Self {
        self.associations.retain(|a| a.name != reflection.name);
        self.associations.push(reflection);
        self
    }
}

#[derive(Debug, Default, Clone)]
pub struct TypeTable {
    types: HashMap<String, TypeInfo>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares (or re-declares) a type; returns it for adding associations.
    pub fn declare(&mut self, name: &str, parent: Option<&str>) -> &mut TypeInfo {
        let info = self.types.entry(name.to_string()).or_insert_with(|| TypeInfo {
            name: name.to_string(),
            parent: None,
            associations: Vec::new(),
        });
        info.parent = parent.map(str::to_string);
        info
    }

    pub fn get(&self, name: &str) -> Option<&TypeInfo> {
        self.types.get(name)
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// `name` followed by its parents, nearest first.
    pub fn ancestry(&self, name: &str) -> Vec<String> {
        let mut chain = vec![name.to_string()];
        let mut seen: HashSet<&str> = HashSet::from([name]);
        let mut current = self.types.get(name);
        while let Some(parent) = current.and_then(|t| t.parent.as_deref()) {
            if !seen.insert(parent) {
                break;
            }
            chain.push(parent.to_string());
            current = self.types.get(parent);
        }
        chain
    }

    /// Finds an association on `type_name` or any of its parents.
    pub fn association(&self, type_name: &str, association: &str) -> Option<&AssociationReflection> {
        self.ancestry(type_name).iter().find_map(|t| {
            self.types
                .get(t)
                .and_then(|info| info.associations.iter().find(|a| a.name == association))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sti_table() -> TypeTable {
        let mut table = TypeTable::new();
        table
            .declare("Person", None)
            .association(AssociationReflection::new("company", AssociationKind::BelongsTo, "Company"));
        table.declare("Member", Some("Person"));
        table.declare("Staff", Some("Member"));
        table
    }

    #[test]
    fn ancestry_walks_to_the_declared_root() {
        let table = sti_table();
        assert_eq!(table.ancestry("Staff"), vec!["Staff", "Member", "Person"]);
        assert_eq!(table.ancestry("Unknown"), vec!["Unknown"]);
    }

    #[test]
    fn associations_are_inherited() {
        let table = sti_table();
        let assoc = table.association("Staff", "company").unwrap();
        assert_eq!(assoc.target_type, "Company");
        assert!(table.association("Staff", "nope").is_none());
    }

    #[test]
    fn parent_cycles_terminate() {
        let mut table = TypeTable::new();
        table.declare("A", Some("B"));
        table.declare("B", Some("A"));
        assert_eq!(table.ancestry("A"), vec!["A", "B"]);
    }
}
