//! Write path: configuration, document rendering and change propagation.

pub mod buffer;
pub mod dispatcher;
pub mod document;
pub mod observer;
pub mod registry;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use buffer::{AbortPolicy, BatchBuffer};
pub use dispatcher::{ChangeDispatcher, ChangeSet, ReindexOptions, ReindexStats};
pub use document::{
    DocumentBuilder, FieldExtractor, IndexedTypeDescriptor, SaveCondition, SolrDocument,
};
pub use observer::{ObserverGraph, ObserverRule};
pub use registry::{AssociationOptions, AssociationWatch, FieldOptions, IndexRegistry, MethodOptions};
pub use types::{AssociationKind, AssociationReflection, TypeInfo, TypeTable};
