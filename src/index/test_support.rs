//! In-memory entities, store and backend for unit tests.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use crate::client::SearchBackend;
use crate::error::Result;
use crate::index::document::{SaveCondition, SolrDocument};
use crate::index::registry::{AssociationOptions, FieldOptions, IndexRegistry};
use crate::index::types::{AssociationKind, AssociationReflection};
use crate::model::{Entity, EntityRef, EntityStore, Related, Value};
use crate::search::request::SelectRequest;

pub struct Record {
    type_name: String,
    pk: String,
    attrs: RefCell<HashMap<String, Value>>,
    assocs: RefCell<HashMap<String, Related>>,
}

impl Record {
    pub fn new(type_name: &str, pk: &str) -> Self {
        Self {
            type_name: type_name.into(),
            pk: pk.into(),
            attrs: RefCell::default(),
            assocs: RefCell::default(),
        }
    }

    pub fn set(&self, name: &str, value: impl Into<Value>) {
        self.attrs.borrow_mut().insert(name.into(), value.into());
    }

    pub fn relate(&self, association: &str, related: Related) {
        self.assocs.borrow_mut().insert(association.into(), related);
    }
}

impl Entity for Record {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn primary_key(&self) -> String {
        self.pk.clone()
    }

    fn read(&self, name: &str) -> Option<Value> {
        self.attrs.borrow().get(name).cloned()
    }

    fn related(&self, association: &str) -> Option<Related> {
        self.assocs.borrow().get(association).cloned()
    }
}

#[derive(Default)]
pub struct MemoryStore {
    rows: RefCell<Vec<EntityRef>>,
}

impl MemoryStore {
    pub fn insert(&self, entity: EntityRef) {
        self.rows.borrow_mut().push(entity);
    }
}

impl EntityStore for MemoryStore {
    fn find_by_ids(&self, type_name: &str, ids: &[String]) -> Result<Vec<EntityRef>> {
        Ok(self
            .rows
            .borrow()
            .iter()
            .filter(|e| e.type_name() == type_name && ids.contains(&e.primary_key()))
            .cloned()
            .collect())
    }

    fn find_page(&self, type_name: &str, offset: usize, limit: usize) -> Result<Vec<EntityRef>> {
        Ok(self
            .rows
            .borrow()
            .iter()
            .filter(|e| e.type_name() == type_name)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Records every call as a one-line string, e.g. `add Widget-1,Widget-2`.
#[derive(Default)]
pub struct RecordingBackend {
    calls: RefCell<Vec<String>>,
    responses: RefCell<Vec<String>>,
}

impl RecordingBackend {
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// Queues a body for the next `select`.
    pub fn respond_with(&self, body: impl Into<String>) {
        self.responses.borrow_mut().push(body.into());
    }
}

impl SearchBackend for RecordingBackend {
    fn add(&self, docs: &[SolrDocument]) -> Result<()> {
        let ids: Vec<&str> = docs.iter().map(SolrDocument::id).collect();
        self.calls.borrow_mut().push(format!("add {}", ids.join(",")));
        Ok(())
    }

    fn delete(&self, ids: &[String]) -> Result<()> {
        self.calls.borrow_mut().push(format!("delete {}", ids.join(",")));
        Ok(())
    }

    fn delete_all(&self, query: Option<&str>) -> Result<()> {
        self.calls
            .borrow_mut()
            .push(format!("delete_all {}", query.unwrap_or("*:*")));
        Ok(())
    }

    fn select(&self, request: &SelectRequest) -> Result<String> {
        self.calls
            .borrow_mut()
            .push(format!("select {}", request.to_query_string()));
        let mut queued = self.responses.borrow_mut();
        if queued.is_empty() {
            return Ok(r#"{"response":{"numFound":0,"start":0,"docs":[]}}"#.to_string());
        }
        Ok(queued.remove(0))
    }
}

/// `Listing` (title, published flag, agent name) observing `Agent`.
pub struct Fixture {
    pub registry: IndexRegistry,
    pub store: MemoryStore,
}

impl Fixture {
    pub fn listings() -> Self {
        let mut registry = IndexRegistry::new();
        registry.declare_type("Listing", None).association(AssociationReflection::new(
            "agent",
            AssociationKind::BelongsTo,
            "Agent",
        ));
        registry.declare_type("Agent", None).association(AssociationReflection::new(
            "listings",
            AssociationKind::HasMany,
            "Listing",
        ));
        registry
            .index_attribute("Listing", &["title"], FieldOptions::new().stored())
            .unwrap();
        registry
            .index_association(
                "Listing",
                "agent",
                "name",
                AssociationOptions {
                    field: FieldOptions::new().as_name("agent_name"),
                    ..AssociationOptions::default()
                },
            )
            .unwrap();
        registry.save_if("Listing", SaveCondition::method("published"));
        Self {
            registry,
            store: MemoryStore::default(),
        }
    }

    pub fn listing(&self, pk: &str, title: &str, published: bool) -> Arc<Record> {
        let record = Arc::new(Record::new("Listing", pk));
        record.set("title", title);
        record.set("published", published);
        record.relate("agent", Related::Nil);
        self.store.insert(record.clone());
        record
    }

    pub fn agent(&self, pk: &str, name: &str) -> Arc<Record> {
        let record = Arc::new(Record::new("Agent", pk));
        record.set("name", name);
        record.relate("listings", Related::Many(Vec::new()));
        self.store.insert(record.clone());
        record
    }

    pub fn assign_agent(&self, agent: &Arc<Record>, listings: &[&Arc<Record>]) {
        let members: Vec<EntityRef> = listings.iter().map(|l| (*l).clone() as EntityRef).collect();
        for listing in listings {
            listing.relate("agent", Related::One(agent.clone()));
        }
        agent.relate("listings", Related::Many(members));
    }
}
