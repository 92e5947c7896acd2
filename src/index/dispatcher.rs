//! Turning entity lifecycle events into index operations.
//!
//! Planning is pure: `plan_*` walk the registry and the entity graph and
//! return a [`ChangeSet`]. The `on_*` hooks apply a plan to a
//! [`BatchBuffer`], adds before deletes, and do nothing while automatic
//! indexing is switched off.

use tracing::{debug, info};

use crate::client::SearchBackend;
use crate::error::{Result, SolrError};
use crate::index::buffer::BatchBuffer;
use crate::index::document::{DocumentBuilder, SolrDocument};
use crate::index::observer::ObserverRule;
use crate::index::registry::IndexRegistry;
use crate::model::{Entity, EntityStore};
use crate::schema::TYPE_FIELD;

/// Index operations produced by one lifecycle event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub adds: Vec<SolrDocument>,
    pub deletes: Vec<String>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.adds.is_empty() && self.deletes.is_empty()
    }

    /// Keeps one document per id; a later render replaces an earlier one in
    /// place.
    fn push_add(&mut self, doc: SolrDocument) {
        if let Some(slot) = self.adds.iter_mut().find(|d| d.id() == doc.id()) {
            *slot = doc;
        } else {
            self.adds.push(doc);
        }
    }

    fn push_delete(&mut self, id: String) {
        if !self.deletes.contains(&id) {
            self.deletes.push(id);
        }
    }

    pub fn apply(self, buffer: &mut BatchBuffer<'_>) -> Result<()> {
        if !self.adds.is_empty() {
            buffer.add(self.adds)?;
        }
        if !self.deletes.is_empty() {
            buffer.delete(self.deletes)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReindexOptions {
    pub batch_size: usize,
    /// Remove every document of the type before re-adding.
    pub delete_first: bool,
}

impl Default for ReindexOptions {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            delete_first: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReindexStats {
    pub pages: usize,
    pub scanned: usize,
    pub indexed: usize,
}

pub struct ChangeDispatcher<'r> {
    registry: &'r IndexRegistry,
    auto_index: bool,
}

impl<'r> ChangeDispatcher<'r> {
    pub fn new(registry: &'r IndexRegistry) -> Self {
        Self {
            registry,
            auto_index: true,
        }
    }

    pub fn auto_index(&self) -> bool {
        self.auto_index
    }

    pub fn set_auto_index(&mut self, on: bool) {
        self.auto_index = on;
    }

    /// Runs `f` with automatic indexing off, restoring the previous setting
    /// afterwards.
    pub fn without_auto_index<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let prior = self.auto_index;
        self.auto_index = false;
        let out = f(self);
        self.auto_index = prior;
        out
    }

    fn builder(&self) -> DocumentBuilder<'r> {
        DocumentBuilder::new(self.registry)
    }

    /// The entity's own document when it qualifies, then every observing
    /// instance reachable from it.
    pub fn plan_create(&self, entity: &dyn Entity) -> Result<ChangeSet> {
        let mut plan = ChangeSet::default();
        let builder = self.builder();
        if builder.saveable(entity)? {
            plan.push_add(builder.build(entity)?);
        }
        let rules = self.registry.observers_for(entity.type_name());
        for rule in rules.iter() {
            for doc in self.observer_documents(entity, rule)? {
                plan.push_add(doc);
            }
        }
        Ok(plan)
    }

    /// `dirty` lists the attributes changed by the update. A qualifying
    /// entity is re-added only when a watched attribute changed; one that no
    /// longer qualifies is deleted whatever changed. Observing instances are
    /// refreshed when one of their observed attributes changed.
    pub fn plan_update<S: AsRef<str>>(&self, entity: &dyn Entity, dirty: &[S]) -> Result<ChangeSet> {
        let mut plan = ChangeSet::default();
        let builder = self.builder();

        if builder.is_powered(entity.type_name()) {
            if !builder.saveable(entity)? {
                plan.push_delete(entity.solr_id());
            } else if self
                .registry
                .descriptor_for(entity.type_name())
                .is_some_and(|d| d.watches_any(dirty))
            {
                plan.push_add(builder.build(entity)?);
            }
        }

        let rules = self.registry.observers_for(entity.type_name());
        for rule in rules.iter().filter(|r| r.watches_any(dirty)) {
            for doc in self.observer_documents(entity, rule)? {
                plan.push_add(doc);
            }
        }
        Ok(plan)
    }

    /// The entity's own document goes; every observing instance is
    /// re-rendered.
    pub fn plan_destroy(&self, entity: &dyn Entity) -> Result<ChangeSet> {
        let mut plan = ChangeSet::default();
        let rules = self.registry.observers_for(entity.type_name());
        for rule in rules.iter() {
            for doc in self.observer_documents(entity, rule)? {
                plan.push_add(doc);
            }
        }
        if self.builder().is_powered(entity.type_name()) {
            plan.push_delete(entity.solr_id());
        }
        Ok(plan)
    }

    fn observer_documents(&self, entity: &dyn Entity, rule: &ObserverRule) -> Result<Vec<SolrDocument>> {
        let related = entity.related(&rule.return_association).ok_or_else(|| {
            SolrError::InvalidAssociation {
                type_name: entity.type_name().to_string(),
                association: rule.return_association.clone(),
                reason: format!(
                    "entity does not provide the return association for {}.{}",
                    rule.observing_type, rule.association
                ),
            }
        })?;

        let builder = self.builder();
        let mut docs = Vec::new();
        for member in related.into_members() {
            if builder.saveable(member.as_ref())? {
                docs.push(builder.build(member.as_ref())?);
            }
        }
        debug!(
            observed = %entity.solr_id(),
            observing = %rule.observing_type,
            refreshed = docs.len(),
            "observer fired"
        );
        Ok(docs)
    }

    pub fn on_create(&self, buffer: &mut BatchBuffer<'_>, entity: &dyn Entity) -> Result<()> {
        if !self.auto_index {
            return Ok(());
        }
        self.plan_create(entity)?.apply(buffer)
    }

    pub fn on_update<S: AsRef<str>>(
        &self,
        buffer: &mut BatchBuffer<'_>,
        entity: &dyn Entity,
        dirty: &[S],
    ) -> Result<()> {
        if !self.auto_index {
            return Ok(());
        }
        self.plan_update(entity, dirty)?.apply(buffer)
    }

    pub fn on_destroy(&self, buffer: &mut BatchBuffer<'_>, entity: &dyn Entity) -> Result<()> {
        if !self.auto_index {
            return Ok(());
        }
        self.plan_destroy(entity)?.apply(buffer)
    }

    /// A member was added to or removed from one of `owner`'s many-to-many
    /// collections. The owner's document is refreshed.
    pub fn on_membership_change(&self, buffer: &mut BatchBuffer<'_>, owner: &dyn Entity) -> Result<()> {
        if !self.auto_index || !self.builder().is_powered(owner.type_name()) {
            return Ok(());
        }
        self.save(buffer, owner)
    }

    /// `removed` left `owner`'s collection `association` without passing
    /// through the usual hooks (a bulk clear). The owner's document is
    /// refreshed. On a `dependent_delete_all` collection the member is gone
    /// from the store as well, so its own document is deleted.
    pub fn on_member_removed(
        &self,
        buffer: &mut BatchBuffer<'_>,
        owner: &dyn Entity,
        association: &str,
        removed: &dyn Entity,
    ) -> Result<()> {
        let reflection = self
            .registry
            .types()
            .association(owner.type_name(), association)
            .ok_or_else(|| SolrError::InvalidAssociation {
                type_name: owner.type_name().to_string(),
                association: association.to_string(),
                reason: "association is not defined".into(),
            })?;
        if !self.auto_index {
            return Ok(());
        }

        let builder = self.builder();
        let mut plan = ChangeSet::default();
        if builder.is_powered(owner.type_name()) {
            if builder.saveable(owner)? {
                plan.push_add(builder.build(owner)?);
            } else {
                plan.push_delete(owner.solr_id());
            }
        }
        if reflection.dependent_delete_all && builder.is_powered(removed.type_name()) {
            plan.push_delete(removed.solr_id());
        }
        debug!(
            owner = %owner.solr_id(),
            association,
            removed = %removed.solr_id(),
            "collection member removed"
        );
        plan.apply(buffer)
    }

    /// Explicitly (re)indexes one entity regardless of `auto_index`: adds it
    /// when it qualifies, deletes it otherwise.
    pub fn save(&self, buffer: &mut BatchBuffer<'_>, entity: &dyn Entity) -> Result<()> {
        let builder = self.builder();
        if !builder.is_powered(entity.type_name()) {
            return Err(SolrError::argument(format!(
                "{} is not configured for indexing",
                entity.type_name()
            )));
        }
        if builder.saveable(entity)? {
            buffer.add(vec![builder.build(entity)?])
        } else {
            buffer.delete(vec![entity.solr_id()])
        }
    }

    /// Rebuilds the index documents of every stored `type_name` entity,
    /// page by page, one add batch per page.
    pub fn reindex(
        &self,
        type_name: &str,
        store: &dyn EntityStore,
        backend: &dyn SearchBackend,
        options: ReindexOptions,
    ) -> Result<ReindexStats> {
        let builder = self.builder();
        if !builder.is_powered(type_name) {
            return Err(SolrError::argument(format!(
                "{type_name} is not configured for indexing"
            )));
        }
        if options.batch_size == 0 {
            return Err(SolrError::argument("batch_size must be positive"));
        }
        if options.delete_first {
            backend.delete_all(Some(&format!("{TYPE_FIELD}:{type_name}")))?;
        }

        let mut stats = ReindexStats::default();
        loop {
            let page = store.find_page(type_name, stats.scanned, options.batch_size)?;
            let fetched = page.len();
            let mut docs = Vec::with_capacity(fetched);
            for entity in &page {
                if builder.saveable(entity.as_ref())? {
                    docs.push(builder.build(entity.as_ref())?);
                }
            }
            if !docs.is_empty() {
                backend.add(&docs)?;
            }
            stats.pages += 1;
            stats.scanned += fetched;
            stats.indexed += docs.len();
            if fetched < options.batch_size {
                break;
            }
        }
        info!(
            type_name,
            pages = stats.pages,
            scanned = stats.scanned,
            indexed = stats.indexed,
            "reindex complete"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::test_support::{Fixture, RecordingBackend};

    #[test]
    fn create_adds_qualifying_entities_only() {
        let fx = Fixture::listings();
        let dispatcher = ChangeDispatcher::new(&fx.registry);
        let listing = fx.listing("1", "Loft", true);
        let plan = dispatcher.plan_create(listing.as_ref()).unwrap();
        assert_eq!(plan.adds.len(), 1);
        assert_eq!(plan.adds[0].id(), "Listing-1");

        let hidden = fx.listing("2", "Shed", false);
        assert!(dispatcher.plan_create(hidden.as_ref()).unwrap().is_empty());

        let agent = fx.agent("9", "Ann");
        assert!(dispatcher.plan_create(agent.as_ref()).unwrap().is_empty());
    }

    #[test]
    fn update_of_unwatched_attribute_is_a_noop() {
        let fx = Fixture::listings();
        let dispatcher = ChangeDispatcher::new(&fx.registry);
        let listing = fx.listing("1", "Loft", true);
        let plan = dispatcher
            .plan_update(listing.as_ref(), &["updated_at"])
            .unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn update_that_fails_the_condition_deletes() {
        let fx = Fixture::listings();
        let dispatcher = ChangeDispatcher::new(&fx.registry);
        let listing = fx.listing("1", "Loft", false);
        let plan = dispatcher
            .plan_update(listing.as_ref(), &["updated_at"])
            .unwrap();
        assert!(plan.adds.is_empty());
        assert_eq!(plan.deletes, vec!["Listing-1".to_string()]);
    }

    #[test]
    fn qualifying_entity_is_never_deleted_on_update() {
        let fx = Fixture::listings();
        let dispatcher = ChangeDispatcher::new(&fx.registry);
        let listing = fx.listing("1", "Loft", true);
        for dirty in [vec!["title"], vec!["updated_at"], Vec::new()] {
            let plan = dispatcher
                .plan_update(listing.as_ref(), dirty.as_slice())
                .unwrap();
            assert!(plan.deletes.is_empty());
        }
        let plan = dispatcher.plan_update(listing.as_ref(), &["title"]).unwrap();
        assert_eq!(plan.adds.len(), 1);
    }

    #[test]
    fn create_of_observed_entity_refreshes_observers() {
        let fx = Fixture::listings();
        let dispatcher = ChangeDispatcher::new(&fx.registry);
        let agent = fx.agent("9", "Ann");
        let a = fx.listing("1", "Loft", true);
        fx.assign_agent(&agent, &[&a]);
        let plan = dispatcher.plan_create(agent.as_ref()).unwrap();
        let ids: Vec<&str> = plan.adds.iter().map(|d| d.id()).collect();
        assert_eq!(ids, vec!["Listing-1"]);
    }

    #[test]
    fn observed_change_refreshes_observers() {
        let fx = Fixture::listings();
        let dispatcher = ChangeDispatcher::new(&fx.registry);
        let agent = fx.agent("9", "Ann");
        let a = fx.listing("1", "Loft", true);
        let b = fx.listing("2", "Barn", true);
        let hidden = fx.listing("3", "Shed", false);
        fx.assign_agent(&agent, &[&a, &b, &hidden]);

        let plan = dispatcher.plan_update(agent.as_ref(), &["name"]).unwrap();
        let ids: Vec<&str> = plan.adds.iter().map(|d| d.id()).collect();
        assert_eq!(ids, vec!["Listing-1", "Listing-2"]);
        assert!(plan.deletes.is_empty());

        assert!(
            dispatcher
                .plan_update(agent.as_ref(), &["phone"])
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn destroy_deletes_self_and_refreshes_observers() {
        let fx = Fixture::listings();
        let dispatcher = ChangeDispatcher::new(&fx.registry);
        let agent = fx.agent("9", "Ann");
        let a = fx.listing("1", "Loft", true);
        fx.assign_agent(&agent, &[&a]);

        let plan = dispatcher.plan_destroy(a.as_ref()).unwrap();
        assert_eq!(plan.deletes, vec!["Listing-1".to_string()]);

        let plan = dispatcher.plan_destroy(agent.as_ref()).unwrap();
        assert_eq!(plan.adds.len(), 1);
        assert!(plan.deletes.is_empty());
    }

    #[test]
    fn hooks_respect_auto_index() {
        let fx = Fixture::listings();
        let backend = RecordingBackend::default();
        let mut buffer = BatchBuffer::new(&backend);
        let mut dispatcher = ChangeDispatcher::new(&fx.registry);
        let listing = fx.listing("1", "Loft", true);

        dispatcher.without_auto_index(|d| {
            assert!(!d.auto_index());
            d.on_create(&mut buffer, listing.as_ref()).unwrap();
        });
        assert!(dispatcher.auto_index());
        assert!(backend.calls().is_empty());

        dispatcher.on_create(&mut buffer, listing.as_ref()).unwrap();
        assert_eq!(backend.calls(), vec!["add Listing-1".to_string()]);
    }

    #[test]
    fn save_ignores_auto_index_but_requires_configuration() {
        let fx = Fixture::listings();
        let backend = RecordingBackend::default();
        let mut buffer = BatchBuffer::new(&backend);
        let mut dispatcher = ChangeDispatcher::new(&fx.registry);
        dispatcher.set_auto_index(false);

        let hidden = fx.listing("2", "Shed", false);
        dispatcher.save(&mut buffer, hidden.as_ref()).unwrap();
        assert_eq!(backend.calls(), vec!["delete Listing-2".to_string()]);

        let agent = fx.agent("9", "Ann");
        assert!(dispatcher.save(&mut buffer, agent.as_ref()).is_err());
    }

    #[test]
    fn reindex_pages_through_the_store() {
        let fx = Fixture::listings();
        let backend = RecordingBackend::default();
        let dispatcher = ChangeDispatcher::new(&fx.registry);
        for (pk, published) in [("1", true), ("2", false), ("3", true)] {
            fx.listing(pk, "x", published);
        }

        let stats = dispatcher
            .reindex(
                "Listing",
                &fx.store,
                &backend,
                ReindexOptions {
                    batch_size: 2,
                    delete_first: true,
                },
            )
            .unwrap();
        assert_eq!(
            stats,
            ReindexStats {
                pages: 2,
                scanned: 3,
                indexed: 2
            }
        );
        assert_eq!(
            backend.calls(),
            vec![
                "delete_all solr_type:Listing".to_string(),
                "add Listing-1".to_string(),
                "add Listing-3".to_string(),
            ]
        );
    }
}
