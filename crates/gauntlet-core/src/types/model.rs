//! Models under test

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a model runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Served by a backend on this machine; probed before evaluation
    Local,
    /// Hosted by a remote provider
    Remote,
}

impl ModelKind {
    /// Whether the orchestrator runs an availability probe before evaluating
    pub fn requires_probe(&self) -> bool {
        matches!(self, ModelKind::Local)
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::Local => write!(f, "local"),
            ModelKind::Remote => write!(f, "remote"),
        }
    }
}

/// A model variant evaluated by a run
///
/// Immutable once a run starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelUnderTest {
    /// Unique model identifier within a session
    pub id: String,

    /// Human readable name
    pub display_name: String,

    /// Local or remote
    pub kind: ModelKind,

    /// Name of the backend that serves this model
    pub backend_ref: String,
}

impl ModelUnderTest {
    /// Create a new model description
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        kind: ModelKind,
        backend_ref: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            kind,
            backend_ref: backend_ref.into(),
        }
    }

    /// Shorthand for a local model whose backend is keyed by its own id
    pub fn local(id: impl Into<String>) -> Self {
        let id = id.into();
        Self::new(id.clone(), id.clone(), ModelKind::Local, id)
    }

    /// Shorthand for a remote model whose backend is keyed by its own id
    pub fn remote(id: impl Into<String>) -> Self {
        let id = id.into();
        Self::new(id.clone(), id.clone(), ModelKind::Remote, id)
    }
}
