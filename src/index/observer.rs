//! Who indexes whom: rules that route a change on one type to reindexing of
//! the related instances that copy its fields into their own documents.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Result, SolrError};
use crate::index::types::TypeTable;

/// Instances of `observing_type` index fields of `observed_type` through
/// `association`; when any of `observed_attributes` change on an observed
/// instance, `return_association` leads back to the instances to refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObserverRule {
    pub observing_type: String,
    pub association: String,
    pub observed_type: String,
    pub observed_attributes: BTreeSet<String>,
    pub return_association: String,
}

impl ObserverRule {
    pub fn watches_any<S: AsRef<str>>(&self, dirty: &[S]) -> bool {
        dirty
            .iter()
            .any(|d| self.observed_attributes.contains(d.as_ref()))
    }
}

/// Rules keyed by observed type tag. Keys are strings, never type handles.
#[derive(Debug, Default)]
pub struct ObserverGraph {
    rules: HashMap<String, Vec<ObserverRule>>,
    memo: RwLock<HashMap<String, Arc<[ObserverRule]>>>,
}

impl ObserverGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates `rule` and appends it under its observed type.
    pub fn register(&mut self, rule: ObserverRule, types: &TypeTable) -> Result<()> {
        let rule = Self::resolve(rule, types)?;
        self.insert(rule);
        Ok(())
    }

    /// Checks `rule.association` on the observing type and
    /// `rule.return_association` on the observed type without registering
    /// anything. `rule.observed_type` is taken from the association's
    /// reflection.
    pub fn resolve(mut rule: ObserverRule, types: &TypeTable) -> Result<ObserverRule> {
        let invalid = |reason: &str| SolrError::InvalidAssociation {
            type_name: rule.observing_type.clone(),
            association: rule.association.clone(),
            reason: reason.to_string(),
        };

        let reflection = types
            .association(&rule.observing_type, &rule.association)
            .ok_or_else(|| invalid("association is not defined"))?;
        if reflection.polymorphic || reflection.inverse_as.is_some() {
            return Err(invalid("changes to polymorphic associations cannot be observed"));
        }
        if reflection.through.is_some() {
            return Err(invalid("changes to through associations cannot be observed"));
        }

        let observed_type = reflection.target_type.clone();
        if types
            .association(&observed_type, &rule.return_association)
            .is_none()
        {
            return Err(SolrError::InvalidAssociation {
                type_name: observed_type,
                association: rule.return_association.clone(),
                reason: format!(
                    "return association for {}.{} is not defined",
                    rule.observing_type, rule.association
                ),
            });
        }
        rule.observed_type = observed_type;
        Ok(rule)
    }

    /// Appends an already resolved rule.
    pub(crate) fn insert(&mut self, rule: ObserverRule) {
        tracing::debug!(
            observing = %rule.observing_type,
            observed = %rule.observed_type,
            association = %rule.association,
            "observer registered"
        );
        self.rules
            .entry(rule.observed_type.clone())
            .or_default()
            .push(rule);
        self.invalidate();
    }

    /// Rules registered for `type_name` and each of its ancestors, nearest
    /// type first, registration order within a type.
    pub fn observers_for(&self, type_name: &str, types: &TypeTable) -> Arc<[ObserverRule]> {
        if let Some(hit) = self.memo.read().get(type_name) {
            return Arc::clone(hit);
        }
        let collected: Arc<[ObserverRule]> = types
            .ancestry(type_name)
            .iter()
            .filter_map(|t| self.rules.get(t))
            .flatten()
            .cloned()
            .collect();
        self.memo
            .write()
            .insert(type_name.to_string(), Arc::clone(&collected));
        collected
    }

    pub(crate) fn invalidate(&self) {
        self.memo.write().clear();
    }

    pub fn len(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
