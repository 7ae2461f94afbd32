use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::aggregate::interleave;
use crate::source::{NoneSource, Source, SourceMiddleware, NONE_DESCRIPTOR};
use crate::NotFoundError;

#[derive(Clone)]
struct Site {
    source: Arc<dyn Source>,
    fixtures: bool,
}

/// Named collection of sources.
///
/// The reserved `none` site always resolves to a [`NoneSource`] unless it is
/// registered explicitly, and never appears in [`SourceRegistry::sites`].
#[derive(Clone)]
pub struct SourceRegistry {
    sites: HashMap<String, Site>,
    order: Vec<String>,
}

impl SourceRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Resolves a site identifier to its (middleware-wrapped) source.
    pub fn lookup(&self, identifier: &str) -> Result<Arc<dyn Source>, NotFoundError> {
        self.sites
            .get(identifier)
            .map(|site| Arc::clone(&site.source))
            .ok_or_else(|| NotFoundError::new(identifier))
    }

    /// Registered identifiers in registration order, excluding `none`.
    pub fn sites(&self) -> Vec<String> {
        self.order.clone()
    }

    /// One source merging every registered site.
    pub fn lookup_all(&self) -> Arc<dyn Source> {
        interleave(
            self.order
                .iter()
                .filter_map(|id| self.sites.get(id))
                .map(|site| Arc::clone(&site.source)),
        )
    }

    /// Sites whose source can record fixtures.
    pub fn fixture_sites(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|id| self.sites.get(*id).is_some_and(|site| site.fixtures))
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("sites", &self.order)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct RegistryBuilder {
    sites: HashMap<String, Site>,
    order: Vec<String>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `source` under `identifier`, wrapped by `middleware` in the
    /// given order (the first one listed ends up innermost).
    ///
    /// Registering an identifier again replaces its source but keeps its
    /// original position.
    pub fn with_source(
        mut self,
        identifier: impl Into<String>,
        source: Arc<dyn Source>,
        middleware: impl IntoIterator<Item = SourceMiddleware>,
    ) -> Self {
        let identifier = identifier.into();
        let source = middleware
            .into_iter()
            .fold(source, |wrapped, layer| layer(wrapped));
        let fixtures = source.fixtures().is_some();

        debug!(site = %identifier, descriptor = %source.descriptor(), fixtures, "registered source");

        let replaced = self
            .sites
            .insert(identifier.clone(), Site { source, fixtures })
            .is_some();
        if !replaced && identifier != NONE_DESCRIPTOR {
            self.order.push(identifier);
        }
        self
    }

    pub fn build(mut self) -> SourceRegistry {
        self.sites
            .entry(String::from(NONE_DESCRIPTOR))
            .or_insert_with(|| Site {
                source: Arc::new(NoneSource),
                fixtures: false,
            });
        SourceRegistry {
            sites: self.sites,
            order: self.order,
        }
    }
}
