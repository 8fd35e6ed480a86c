//! The session-scoped module cache.
//!
//! Guarantees at-most-one load per (name, version, parameters) key within a
//! session: a hit returns the identical `Rc`, so provider side effects also
//! happen at most once per key.

use std::collections::HashMap;
use std::rc::Rc;

use semver::VersionReq;

use crate::core::item::Value;
use crate::core::module::{canonical_parameters, Module, ModuleKey};
use crate::util::Symbol;

#[derive(Debug)]
struct CacheEntry {
    parameters: Vec<(Symbol, Value)>,
    module: Rc<Module>,
}

/// Loaded modules keyed by identity.
#[derive(Debug, Default)]
pub struct ModuleCache {
    entries: HashMap<Symbol, Vec<CacheEntry>>,
    len: usize,
}

impl ModuleCache {
    pub fn new() -> Self {
        ModuleCache::default()
    }

    /// Look up a cached instance satisfying the constraint with the same
    /// canonical parameter set.
    pub fn lookup(
        &self,
        name: Symbol,
        req: &VersionReq,
        parameters: &[(Symbol, Value)],
    ) -> Option<Rc<Module>> {
        let canonical = canonical_parameters(parameters);
        let entries = self.entries.get(&name)?;
        entries
            .iter()
            .find(|e| req.matches(e.module.version()) && e.parameters == canonical)
            .map(|e| Rc::clone(&e.module))
    }

    /// Look up by exact key.
    pub fn get(&self, key: &ModuleKey) -> Option<Rc<Module>> {
        let entries = self.entries.get(&key.name())?;
        entries
            .iter()
            .find(|e| e.module.version() == key.version() && e.parameters == key.parameters())
            .map(|e| Rc::clone(&e.module))
    }

    /// Insert a freshly loaded instance and return the shared handle.
    ///
    /// If an instance with the same key raced its way in first, that one
    /// is returned instead and the new module is dropped, preserving
    /// reference identity per key.
    pub fn insert(&mut self, parameters: &[(Symbol, Value)], module: Module) -> Rc<Module> {
        let key = ModuleKey::new(module.name(), module.version().clone(), parameters);

        if let Some(existing) = self.get(&key) {
            tracing::debug!("module cache: `{}` already present, reusing", module.name());
            return existing;
        }

        let shared = Rc::new(module);
        self.entries
            .entry(key.name())
            .or_default()
            .push(CacheEntry {
                parameters: key.parameters().to_vec(),
                module: Rc::clone(&shared),
            });
        self.len += 1;
        shared
    }

    /// Number of cached instances.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
