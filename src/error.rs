//! Error taxonomy shared by the indexing and search layers.

use thiserror::Error;

pub type Result<T, E = SolrError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum SolrError {
    /// A field name was registered twice with different options.
    #[error("solr field '{field}' is already configured with different options\nexisting: {existing}\nattempted: {attempted}")]
    ConfigConflict {
        field: String,
        existing: String,
        attempted: String,
    },

    /// Malformed caller input, rejected before any network call.
    #[error("{0}")]
    Argument(String),

    /// Association cannot be observed or does not exist.
    #[error("cannot index association {type_name}#{association}: {reason}")]
    InvalidAssociation {
        type_name: String,
        association: String,
        reason: String,
    },

    #[error("unknown entity type `{0}`")]
    UnknownType(String),

    #[error("`{type_name}` has no attribute or method `{name}`")]
    UnknownAttribute { type_name: String, name: String },

    /// The engine could not be reached.
    #[error("solr unreachable at {url}: {reason}")]
    Connection { url: String, reason: String },

    /// The engine answered with a non-2xx status or an error body.
    #[error("solr responded {status}: {excerpt}")]
    Response { status: u16, excerpt: String },

    #[error("failed to decode solr response: {0}")]
    Decode(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    /// Failure reported by the entity store during rehydration or reindexing.
    #[error("entity store error: {0}")]
    Store(String),

    #[error("index batch scope is already open")]
    NestedScope,
}

impl SolrError {
    pub fn argument(msg: impl Into<String>) -> Self {
        Self::Argument(msg.into())
    }

    /// True for failures raised by the wire client.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Response { .. })
    }
}

impl From<serde_json::Error> for SolrError {
    fn from(e: serde_json::Error) -> Self {
        SolrError::Decode(e.to_string())
    }
}
