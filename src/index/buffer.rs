//! Scoped batching of index writes.
//!
//! A [`BatchBuffer`] belongs to one logical unit of work. Outside a scope it
//! forwards every add/delete straight to the backend. Inside
//! [`BatchBuffer::within_scope`] it keeps at most one pending operation per
//! document id, the most recent one, and flushes adds then deletes when the
//! scope completes.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::{Deref, DerefMut};

use tracing::{debug, warn};

use crate::client::SearchBackend;
use crate::error::{Result, SolrError};
use crate::index::document::SolrDocument;

/// What happens to staged operations when the scoped block fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AbortPolicy {
    /// Drop everything staged. Matches a rolled-back store transaction.
    #[default]
    Discard,
    /// Send whatever was staged before the failure.
    Flush,
}

#[derive(Debug, Default)]
struct Pending {
    adds: BTreeMap<String, SolrDocument>,
    deletes: BTreeSet<String>,
}

pub struct BatchBuffer<'b> {
    backend: &'b dyn SearchBackend,
    pending: Option<Pending>,
    abort_policy: AbortPolicy,
}

impl<'b> BatchBuffer<'b> {
    pub fn new(backend: &'b dyn SearchBackend) -> Self {
        Self {
            backend,
            pending: None,
            abort_policy: AbortPolicy::default(),
        }
    }

    pub fn with_abort_policy(mut self, policy: AbortPolicy) -> Self {
        self.abort_policy = policy;
        self
    }

    pub fn is_buffering(&self) -> bool {
        self.pending.is_some()
    }

    pub fn add(&mut self, docs: Vec<SolrDocument>) -> Result<()> {
        match &mut self.pending {
            Some(pending) => {
                for doc in docs {
                    let id = doc.id().to_string();
                    pending.deletes.remove(&id);
                    pending.adds.insert(id, doc);
                }
                Ok(())
            }
            None if docs.is_empty() => Ok(()),
            None => self.backend.add(&docs),
        }
    }

    pub fn delete(&mut self, ids: Vec<String>) -> Result<()> {
        match &mut self.pending {
            Some(pending) => {
                for id in ids {
                    pending.adds.remove(&id);
                    pending.deletes.insert(id);
                }
                Ok(())
            }
            None if ids.is_empty() => Ok(()),
            None => self.backend.delete(&ids),
        }
    }

    /// Ids with a staged add, sorted.
    pub fn pending_adds(&self) -> Vec<&str> {
        self.pending
            .as_ref()
            .map(|p| p.adds.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Ids with a staged delete, sorted.
    pub fn pending_deletes(&self) -> Vec<&str> {
        self.pending
            .as_ref()
            .map(|p| p.deletes.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Runs `f` with writes buffered. On success the staged adds are sent,
    /// then the staged deletes. On failure the abort policy decides. The
    /// buffer leaves the scope empty and unbuffered either way.
    pub fn within_scope<T, E>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, E>) -> Result<T, E>
    where
        E: From<SolrError>,
    {
        if self.is_buffering() {
            return Err(SolrError::NestedScope.into());
        }
        self.pending = Some(Pending::default());
        let (outcome, pending) = {
            let mut guard = ScopeGuard { buffer: self };
            let outcome = f(&mut *guard);
            (outcome, guard.pending.take().unwrap_or_default())
        };

        match outcome {
            Ok(value) => {
                self.flush(pending)?;
                Ok(value)
            }
            Err(err) => {
                let staged = pending.adds.len() + pending.deletes.len();
                match self.abort_policy {
                    AbortPolicy::Discard => {
                        if staged > 0 {
                            warn!(staged, "index scope failed; discarding staged operations");
                        }
                    }
                    AbortPolicy::Flush => {
                        if let Err(flush_err) = self.flush(pending) {
                            warn!(staged, error = %flush_err, "flush after failed index scope also failed");
                        }
                    }
                }
                Err(err)
            }
        }
    }

    fn flush(&self, pending: Pending) -> Result<()> {
        debug!(
            adds = pending.adds.len(),
            deletes = pending.deletes.len(),
            "flushing index scope"
        );
        let docs: Vec<SolrDocument> = pending.adds.into_values().collect();
        if !docs.is_empty() {
            self.backend.add(&docs)?;
        }
        let ids: Vec<String> = pending.deletes.into_iter().collect();
        if !ids.is_empty() {
            self.backend.delete(&ids)?;
        }
        Ok(())
    }
}

/// Closes the scope on drop, so a block that unwinds does not leave the
/// buffer stuck in it.
struct ScopeGuard<'s, 'b> {
    buffer: &'s mut BatchBuffer<'b>,
}

impl<'b> Deref for ScopeGuard<'_, 'b> {
    type Target = BatchBuffer<'b>;

    fn deref(&self) -> &Self::Target {
        self.buffer
    }
}

impl DerefMut for ScopeGuard<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.buffer
    }
}

impl Drop for ScopeGuard<'_, '_> {
    fn drop(&mut self) {
        self.buffer.pending = None;
    }
}
