//! Module providers.
//!
//! A provider can synthesize or locate a module the loader does not know
//! about. Providers are consulted only after a loader miss. Which provider
//! resolved which module is recorded in a session-scoped [`ProviderStore`]
//! so incremental runs can skip probing and an external collaborator can
//! persist the records between sessions.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::module::Module;
use crate::loader::LoadRequest;
use crate::util::Symbol;

/// An external mechanism that can supply modules on demand.
pub trait ModuleProvider {
    /// Provider name, recorded in the store.
    fn name(&self) -> Symbol;

    /// Cheap check whether this provider could supply the module.
    fn can_provide(&self, module: Symbol) -> bool;

    /// Attempt to supply the module. `scratch` is a session-owned
    /// directory the provider may write temporary files into; it is
    /// removed when the session drops.
    fn provide(&mut self, request: &LoadRequest, scratch: &Path) -> Result<Option<Module>>;
}

/// Registered providers, consulted in registration order.
///
/// When several providers claim the same module name, the
/// first-registered one wins; callers control the tie-break by
/// registration order.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Box<dyn ModuleProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        ProviderRegistry::default()
    }

    /// Register a provider. Earlier registrations take precedence.
    pub fn register(&mut self, provider: Box<dyn ModuleProvider>) {
        self.providers.push(provider);
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Ask providers for a module.
    ///
    /// If `known` names the provider recorded for this module by an
    /// earlier session, only that provider is invoked; otherwise providers
    /// are probed in registration order and the first hit wins. Returns
    /// the module together with the supplying provider's name.
    pub fn provide(
        &mut self,
        request: &LoadRequest,
        known: Option<Symbol>,
        scratch: &Path,
    ) -> Result<Option<(Module, Symbol)>> {
        if let Some(wanted) = known {
            if let Some(provider) = self.providers.iter_mut().find(|p| p.name() == wanted) {
                tracing::debug!(
                    "module `{}`: reusing recorded provider `{}`",
                    request.name,
                    wanted
                );
                if let Some(module) = provider.provide(request, scratch)? {
                    return Ok(Some((module, wanted)));
                }
                tracing::warn!(
                    "recorded provider `{}` no longer supplies `{}`, probing all providers",
                    wanted,
                    request.name
                );
            }
        }

        for provider in &mut self.providers {
            if !provider.can_provide(request.name) {
                continue;
            }
            let name = provider.name();
            if let Some(module) = provider.provide(request, scratch)? {
                tracing::debug!("module `{}` supplied by provider `{}`", request.name, name);
                return Ok(Some((module, name)));
            }
        }

        Ok(None)
    }
}

/// One persisted provider invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderRecord {
    pub module: String,
    pub version: String,
    pub provider: String,
}

/// Session-scoped record of which provider resolved which module.
///
/// Loaded at session construction, updated during resolution, and
/// serialized at session end by whoever owns persistence. Deliberately
/// not process-wide state, so sessions stay reentrant and testable.
#[derive(Debug, Default)]
pub struct ProviderStore {
    records: HashMap<Symbol, ProviderRecord>,
}

impl ProviderStore {
    pub fn new() -> Self {
        ProviderStore::default()
    }

    /// The provider recorded for a module, if any.
    pub fn provider_for(&self, module: Symbol) -> Option<Symbol> {
        self.records
            .get(&module)
            .map(|record| Symbol::new(&record.provider))
    }

    pub fn lookup(&self, module: Symbol) -> Option<&ProviderRecord> {
        self.records.get(&module)
    }

    /// Record a provider invocation.
    pub fn record(&mut self, module: Symbol, version: &semver::Version, provider: Symbol) {
        self.records.insert(
            module,
            ProviderRecord {
                module: module.as_str().to_string(),
                version: version.to_string(),
                provider: provider.as_str().to_string(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProviderRecord> {
        self.records.values()
    }

    /// Serialize the records for external persistence.
    pub fn to_json(&self) -> Result<String> {
        let mut records: Vec<_> = self.records.values().collect();
        records.sort_by(|a, b| a.module.cmp(&b.module));
        serde_json::to_string_pretty(&records).context("failed to serialize provider records")
    }

    /// Restore records persisted by an earlier session.
    pub fn from_json(json: &str) -> Result<Self> {
        let records: Vec<ProviderRecord> =
            serde_json::from_str(json).context("failed to parse provider records")?;

        let mut store = ProviderStore::new();
        for record in records {
            store.records.insert(Symbol::new(&record.module), record);
        }
        Ok(store)
    }
}
