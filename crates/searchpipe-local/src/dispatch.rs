//! Engine registry and dispatch.
//!
//! Providers are registered by lowercase name; adding one means registering
//! one adapter. Dispatch never fails: an unknown engine name or a provider
//! error degrades to an empty result list, so one provider's outage can
//! never take down an unrelated tool call.

use std::collections::BTreeMap;
use std::sync::Arc;

use searchpipe_core::{Error, Result, SearchProvider, SearchResult};

use crate::search::{
    BingProvider, ExaProvider, GoogleProvider, LinkupProvider, SerperProvider, TavilyProvider,
};

pub struct EngineRegistry {
    providers: BTreeMap<&'static str, Arc<dyn SearchProvider>>,
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self {
            providers: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, provider: Arc<dyn SearchProvider>) {
        self.providers.insert(provider.name(), provider);
    }

    /// Build the full fixed provider set from the environment.
    ///
    /// Startup is all-or-nothing: every missing variable is collected into a
    /// single descriptive error so the server never comes up partially
    /// configured.
    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let mut registry = Self::new();
        let mut missing: Vec<String> = Vec::new();

        match TavilyProvider::from_env(client.clone()) {
            Ok(p) => registry.register(Arc::new(p)),
            Err(e) => missing.push(e.to_string()),
        }
        match SerperProvider::from_env(client.clone()) {
            Ok(p) => registry.register(Arc::new(p)),
            Err(e) => missing.push(e.to_string()),
        }
        match BingProvider::from_env(client.clone()) {
            Ok(p) => registry.register(Arc::new(p)),
            Err(e) => missing.push(e.to_string()),
        }
        match GoogleProvider::from_env(client.clone()) {
            Ok(p) => registry.register(Arc::new(p)),
            Err(e) => missing.push(e.to_string()),
        }
        match LinkupProvider::from_env(client.clone()) {
            Ok(p) => registry.register(Arc::new(p)),
            Err(e) => missing.push(e.to_string()),
        }
        match ExaProvider::from_env(client) {
            Ok(p) => registry.register(Arc::new(p)),
            Err(e) => missing.push(e.to_string()),
        }

        if !missing.is_empty() {
            return Err(Error::NotConfigured(missing.join("; ")));
        }
        Ok(registry)
    }

    /// Registered engine names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        self.providers.keys().copied().collect()
    }

    /// Route a query to the named engine.
    ///
    /// Unknown names and provider failures both yield an empty list; callers
    /// that need to distinguish failure use the knowledge-base path, which
    /// reports it explicitly.
    pub async fn dispatch(&self, engine: &str, query: &str) -> Vec<SearchResult> {
        let Some(provider) = self.providers.get(engine) else {
            tracing::warn!(engine, "unknown search engine requested");
            return Vec::new();
        };
        match provider.search(query).await {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!(engine, error = %e, "search provider failed");
                Vec::new()
            }
        }
    }
}
