//! Provider catalog: which models are available right now.
//!
//! Discovery fails soft. Any error yields an empty list so the invoker can
//! fall back to the statically configured preferences. Results are never
//! cached; availability may change between calls.

use bolty_core::provider::{Capability, ModelBackend, ModelDescriptor};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct ProviderCatalog {
    backend: Arc<dyn ModelBackend>,
}

impl ProviderCatalog {
    pub fn new(backend: Arc<dyn ModelBackend>) -> Self {
        Self { backend }
    }

    /// All models the backend currently advertises. Never fails.
    pub async fn list_available_models(&self) -> Vec<ModelDescriptor> {
        match self.backend.list_models().await {
            Ok(models) => {
                debug!(backend = %self.backend.name(), count = models.len(), "Discovered models");
                models
            }
            Err(e) => {
                warn!(backend = %self.backend.name(), error = %e, "Model discovery failed, continuing without catalog");
                Vec::new()
            }
        }
    }

    /// Identifiers of discovered models eligible for `capability`, in catalog order.
    pub async fn supporting(&self, capability: Capability) -> Vec<String> {
        self.list_available_models()
            .await
            .into_iter()
            .filter(|m| m.supports(capability))
            .map(|m| m.identifier)
            .collect()
    }
}
