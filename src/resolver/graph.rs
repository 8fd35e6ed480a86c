//! The dependency graph builder.
//!
//! Walks one product's declared references, locating each target in the
//! cache, the loader, or the provider registry, and attaching the resolved
//! module to the product in declaration order. Product-to-product
//! references consume the target's export and may defer.

use std::rc::Rc;
use std::time::Instant;

use semver::Version;

use crate::core::dependency::DependencyRef;
use crate::core::module::Module;
use crate::core::product::{ResolutionState, ResolvedModule};
use crate::loader::LoadRequest;
use crate::resolver::errors::ResolveError;
use crate::resolver::params;
use crate::resolver::{DeferralPolicy, ResolveContext, Session};
use crate::util::{Phase, Symbol};

/// Name of the base module injected into every product context.
pub const BASE_MODULE_NAME: &str = "base";

impl Session {
    /// Resolve the pending dependencies of a product by name.
    ///
    /// Returns `Ok(false)` when deferral is permitted and the product is
    /// blocked on another product's export. All multiplex instances of the
    /// name are processed; the product is only considered done when every
    /// instance is.
    pub fn resolve_dependencies(
        &mut self,
        product: Symbol,
        policy: DeferralPolicy,
    ) -> Result<bool, ResolveError> {
        let indices = match self.index.get(&product) {
            Some(indices) => indices.clone(),
            None => {
                return Err(ResolveError::MissingDependency {
                    dependency: product.as_str().to_string(),
                    product: product.as_str().to_string(),
                })
            }
        };

        let mut done = true;
        for idx in indices {
            match self.resolve_product_dependencies(idx, policy) {
                Ok(true) => self.products[idx].finish_resolved(),
                Ok(false) => {
                    self.products[idx].set_state(ResolutionState::Deferred);
                    done = false;
                }
                Err(err) => {
                    self.products[idx].fail(err.to_string());
                    return Err(err);
                }
            }
        }
        Ok(done)
    }

    /// Resolve the pending dependencies of the product at `idx`.
    ///
    /// `Ok(true)` means every reference is resolved; the caller commits the
    /// product. `Ok(false)` means "try again later". Partial progress is
    /// kept: references resolved before a deferral stay resolved.
    pub(crate) fn resolve_product_dependencies(
        &mut self,
        idx: usize,
        policy: DeferralPolicy,
    ) -> Result<bool, ResolveError> {
        loop {
            let dep = match self.products[idx].pending_dependency() {
                Some(dep) => dep.clone(),
                None => break,
            };

            if self.index.contains_key(&dep.name()) {
                if self.resolve_product_reference(idx, &dep, policy)? {
                    self.products[idx].advance();
                    continue;
                }
                return Ok(false);
            }

            match self.locate_module(idx, &dep, ResolveContext::NormalDependency)? {
                Some(module) => {
                    self.attach_module(idx, module, &dep)?;
                    self.products[idx].advance();
                }
                None if dep.is_required() => {
                    return Err(ResolveError::MissingDependency {
                        dependency: dep.name().as_str().to_string(),
                        product: self.products[idx].name().as_str().to_string(),
                    });
                }
                None => {
                    tracing::debug!(
                        "product `{}`: optional dependency `{}` not found, skipping",
                        self.products[idx].name(),
                        dep.name()
                    );
                    self.products[idx].advance();
                }
            }
        }

        Ok(true)
    }

    /// Handle a reference to another product.
    ///
    /// `Ok(true)` when the exports were consumed, `Ok(false)` to defer.
    fn resolve_product_reference(
        &mut self,
        idx: usize,
        dep: &DependencyRef,
        policy: DeferralPolicy,
    ) -> Result<bool, ResolveError> {
        let requester = self.products[idx].name();
        let targets = self.index[&dep.name()].clone();

        for &target in &targets {
            match self.products[target].state() {
                ResolutionState::Resolved => {}
                ResolutionState::Failed => {
                    return Err(ResolveError::DependencyFailed {
                        dependency: self.products[target].instance_key().as_str().to_string(),
                        product: requester.as_str().to_string(),
                    });
                }
                _ => {
                    return match policy {
                        DeferralPolicy::Allowed => {
                            tracing::debug!(
                                "product `{}` blocked on `{}`, deferring",
                                requester,
                                dep.name()
                            );
                            Ok(false)
                        }
                        DeferralPolicy::Disallowed => Err(ResolveError::MissingDependency {
                            dependency: dep.name().as_str().to_string(),
                            product: requester.as_str().to_string(),
                        }),
                    };
                }
            }
        }

        for &target in &targets {
            let export = match self.products[target].export() {
                Some(export) => Rc::clone(export),
                None => continue,
            };

            let start = Instant::now();
            let checked = params::check_dependency_parameter_declarations(
                dep.parameters(),
                export.declarations(),
                export.name(),
                requester,
            );
            self.profiler.record(Phase::ParameterChecks, start.elapsed());
            checked?;

            self.attach_module(idx, export, dep)?;
        }

        self.products[idx].record_product_edge(dep.name());
        Ok(true)
    }

    /// Locate a module instance for a reference: cache, then loader, then
    /// providers. Returns `None` when nobody knows the module.
    fn locate_module(
        &mut self,
        idx: usize,
        dep: &DependencyRef,
        context: ResolveContext,
    ) -> Result<Option<Rc<Module>>, ResolveError> {
        let product = self.products[idx].name();

        // Validate parameter names up front when declarations are known
        // without evaluating the module body.
        if let Some(decls) = self.loader.parameter_declarations(dep.name()) {
            let start = Instant::now();
            let checked = params::check_dependency_parameter_declarations(
                dep.parameters(),
                &decls,
                dep.name(),
                product,
            );
            self.profiler.record(Phase::ParameterChecks, start.elapsed());
            checked?;
        }

        let start = Instant::now();
        let hit = self
            .cache
            .lookup(dep.name(), dep.version_req(), dep.parameters());
        self.profiler.record(Phase::CacheLookups, start.elapsed());
        if let Some(module) = hit {
            tracing::debug!("module `{}`: cache hit", dep.name());
            return Ok(Some(module));
        }

        let request = LoadRequest {
            name: dep.name(),
            version_req: dep.version_req().clone(),
            parameters: dep.parameters().to_vec(),
            product,
        };

        let start = Instant::now();
        let loaded = self.loader.load_module(&request);
        self.profiler.record(Phase::ModuleLoads, start.elapsed());

        let loaded = loaded.map_err(|err| ResolveError::LoadFailure {
            module: dep.name().as_str().to_string(),
            product: product.as_str().to_string(),
            message: format!("{:#}", err),
        })?;

        let (module, provider) = match loaded {
            Some(module) => (Some(module), None),
            None if context == ResolveContext::BaseModuleInjection || self.providers.is_empty() => {
                (None, None)
            }
            None => {
                let known = self.provider_store.provider_for(dep.name());
                let scratch = self.scratch_dir().map_err(|err| ResolveError::LoadFailure {
                    module: dep.name().as_str().to_string(),
                    product: product.as_str().to_string(),
                    message: format!("{:#}", err),
                })?;

                let start = Instant::now();
                let provided = self.providers.provide(&request, known, &scratch);
                self.profiler
                    .record(Phase::ProviderInvocations, start.elapsed());

                match provided.map_err(|err| ResolveError::LoadFailure {
                    module: dep.name().as_str().to_string(),
                    product: product.as_str().to_string(),
                    message: format!("{:#}", err),
                })? {
                    Some((module, provider)) => (Some(module), Some(provider)),
                    None => (None, None),
                }
            }
        };

        let module = match module {
            Some(module) => module,
            None => return Ok(None),
        };

        if !dep.matches_version(module.version()) {
            tracing::warn!(
                "module `{}` version {} does not satisfy `{}`, treating as not found",
                dep.name(),
                module.version(),
                dep.version_req()
            );
            return Ok(None);
        }

        // Covers loaders that cannot answer the metadata query up front.
        let start = Instant::now();
        let checked = params::check_dependency_parameter_declarations(
            dep.parameters(),
            module.declarations(),
            module.name(),
            product,
        );
        self.profiler.record(Phase::ParameterChecks, start.elapsed());
        checked?;

        let module = match provider {
            Some(name) => {
                self.provider_store.record(dep.name(), module.version(), name);
                module.from_provider(name)
            }
            None => module,
        };

        Ok(Some(self.cache.insert(dep.parameters(), module)))
    }

    /// Attach a module instance to the product, enforcing the same-name
    /// invariant and merging parameters into an already-shared instance.
    fn attach_module(
        &mut self,
        idx: usize,
        module: Rc<Module>,
        dep: &DependencyRef,
    ) -> Result<(), ResolveError> {
        let product = self.products[idx].name();
        let name = module.name();

        let same_instance = self.products[idx]
            .module_named(name)
            .map(|existing| Rc::ptr_eq(existing.module(), &module));

        match same_instance {
            Some(true) => {
                let declarations = module.declarations().to_vec();
                if let Some(existing) = self.products[idx].module_named_mut(name) {
                    params::merge_parameters(
                        existing.parameters_mut(),
                        &declarations,
                        dep.parameters(),
                        name,
                        product,
                    );
                }
            }
            Some(false) if dep.allows_multiplex() => {
                let effective = params::effective_parameters(module.declarations(), dep.parameters());
                self.products[idx].add_module(ResolvedModule::new(module, effective));
            }
            Some(false) => {
                return Err(ResolveError::DuplicateModule {
                    module: name.as_str().to_string(),
                    product: product.as_str().to_string(),
                });
            }
            None => {
                let effective = params::effective_parameters(module.declarations(), dep.parameters());
                self.products[idx].add_module(ResolvedModule::new(module, effective));
            }
        }

        Ok(())
    }

    /// Load the base module into a product context.
    ///
    /// Used only for injecting a dummy base module into a project context
    /// and for temporarily supplying one during multiplex expansion. This
    /// path never defers and never consults providers; if the loader does
    /// not know a base module, a dummy one is synthesized.
    pub fn load_base_module(&mut self, product: Symbol) -> Result<Rc<Module>, ResolveError> {
        let idx = match self.index.get(&product).and_then(|v| v.first()) {
            Some(&idx) => idx,
            None => {
                return Err(ResolveError::MissingDependency {
                    dependency: BASE_MODULE_NAME.to_string(),
                    product: product.as_str().to_string(),
                })
            }
        };
        self.load_base_module_at(idx)
    }

    pub(crate) fn load_base_module_at(&mut self, idx: usize) -> Result<Rc<Module>, ResolveError> {
        let dep = DependencyRef::new(BASE_MODULE_NAME);

        let module = match self.locate_module(idx, &dep, ResolveContext::BaseModuleInjection)? {
            Some(module) => module,
            None => {
                tracing::debug!(
                    "product `{}`: loader has no base module, injecting a dummy",
                    self.products[idx].name()
                );
                self.cache
                    .insert(&[], Module::new(BASE_MODULE_NAME, Version::new(0, 0, 0)))
            }
        };

        self.attach_module(idx, Rc::clone(&module), &dep)?;
        Ok(module)
    }
}
