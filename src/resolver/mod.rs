//! Dependency resolution.
//!
//! The resolver turns a project's product items into per-product resolved
//! module lists. Resolution is single-threaded and synchronous; inter-product
//! ordering is handled by deferral and fixpoint iteration rather than
//! parallelism, because module evaluation can observe another product's
//! already-published export.
//!
//! All fixpoint state lives behind the opaque [`Session`] handle; callers
//! see only the operations.

pub mod cache;
pub mod engine;
pub mod errors;
pub mod graph;
pub mod multiplex;
pub mod params;
pub mod resolution;

use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use tempfile::TempDir;

use crate::core::item::{Item, ItemType};
use crate::core::product::Product;
use crate::loader::{ModuleLoader, ProviderRegistry, ProviderStore};
use crate::util::{CancelToken, Profiler, Symbol};

pub use cache::ModuleCache;
pub use errors::ResolveError;
pub use resolution::Resolution;

/// Whether a resolution pass may postpone a product blocked on another
/// product's export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferralPolicy {
    /// Return "try again later" instead of failing
    Allowed,
    /// Fail immediately when a dependency is unavailable
    Disallowed,
}

/// Why a module is being located.
///
/// The base-module path is a separate explicit variant rather than a flag:
/// it never defers, never consults providers, and never enters the retry
/// loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveContext {
    NormalDependency,
    BaseModuleInjection,
}

/// One resolution session.
///
/// Owns the products under resolution, the module cache, the provider
/// registry and store, and the profiler. Nothing here is process-wide:
/// sessions are independent and can run side by side in tests.
pub struct Session {
    products: Vec<Product>,
    /// Instance indices by declared product name; multiplexed instances
    /// share a name
    index: HashMap<Symbol, Vec<usize>>,
    cache: ModuleCache,
    loader: Box<dyn ModuleLoader>,
    providers: ProviderRegistry,
    provider_store: ProviderStore,
    profiler: Profiler,
    cancel: CancelToken,
    fail_fast: bool,
    /// Scratch space handed to providers; removed when the session drops
    scratch: Option<TempDir>,
}

impl Session {
    /// Create a session around a module loader.
    pub fn new(loader: Box<dyn ModuleLoader>) -> Self {
        Session {
            products: Vec::new(),
            index: HashMap::new(),
            cache: ModuleCache::new(),
            loader,
            providers: ProviderRegistry::new(),
            provider_store: ProviderStore::new(),
            profiler: Profiler::new(),
            cancel: CancelToken::new(),
            fail_fast: false,
            scratch: None,
        }
    }

    /// Abort at the first product failure instead of isolating it.
    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Start from provider records persisted by an earlier session.
    pub fn with_provider_store(mut self, store: ProviderStore) -> Self {
        self.provider_store = store;
        self
    }

    /// Register a module provider. Earlier registrations win ties.
    pub fn register_provider(&mut self, provider: Box<dyn crate::loader::ModuleProvider>) {
        self.providers.register(provider);
    }

    /// A token the surrounding build session can cancel resolution with.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Add every product of a `Project` item (recursing into subprojects).
    pub fn add_project(&mut self, project: &Item) -> Result<()> {
        if project.item_type() != ItemType::Project {
            bail!(
                "expected a Project item, found {} `{}`",
                project.item_type(),
                project.name()
            );
        }

        for child in project.children() {
            match child.item_type() {
                ItemType::Product => self.add_product(child)?,
                ItemType::Project => self.add_project(child)?,
                _ => {}
            }
        }
        Ok(())
    }

    /// Add one product item, expanding multiplexed declarations into
    /// concrete instances.
    pub fn add_product(&mut self, item: &Item) -> Result<()> {
        match self.multiplexed_instances(item)? {
            Some(instances) => {
                tracing::debug!(
                    "product `{}` multiplexes into {} instance(s)",
                    item.name(),
                    instances.len()
                );
                for instance in &instances {
                    self.push_product(Product::from_item(instance)?);
                }
            }
            None => self.push_product(Product::from_item(item)?),
        }
        Ok(())
    }

    fn push_product(&mut self, product: Product) {
        let idx = self.products.len();
        self.index.entry(product.name()).or_default().push(idx);
        self.products.push(product);
    }

    /// Number of products in the session.
    pub fn product_count(&self) -> usize {
        self.products.len()
    }

    /// Read access to a product by name (first instance).
    pub fn product(&self, name: Symbol) -> Option<&Product> {
        self.index
            .get(&name)
            .and_then(|indices| indices.first())
            .map(|&idx| &self.products[idx])
    }

    /// The provider records accumulated so far, for external persistence.
    pub fn provider_store(&self) -> &ProviderStore {
        &self.provider_store
    }

    /// The module cache (visibility for tests and tooling).
    pub fn module_cache(&self) -> &ModuleCache {
        &self.cache
    }

    /// Per-phase timing report.
    pub fn profiling_report(&self, indent: usize) -> String {
        self.profiler.report(indent)
    }

    /// Dump per-phase timings through `tracing`.
    pub fn print_profiling_info(&self, indent: usize) {
        self.profiler.print_profiling_info(indent);
    }

    pub(crate) fn scratch_dir(&mut self) -> Result<std::path::PathBuf> {
        if self.scratch.is_none() {
            let dir = TempDir::new().context("failed to create provider scratch directory")?;
            self.scratch = Some(dir);
        }
        Ok(self
            .scratch
            .as_ref()
            .map(|d| d.path().to_path_buf())
            .unwrap_or_default())
    }
}
